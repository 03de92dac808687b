use crossbeam_channel::{unbounded, Receiver};
use tracing::{debug, error, trace};

use crate::webcam::{self, WebcamHandle};
use crate::{still, CaptureError, CaptureEvent, EventSender, SourceFrame};

/// Which kind of source currently supplies pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveSource {
    Uninitialized,
    Webcam,
    Image,
}

/// Translated capture events handed to the render loop each frame.
#[derive(Debug)]
pub enum SourceUpdate {
    /// A source finished acquisition; the consumer should size its
    /// texture and surface for these native dimensions.
    SourceChanged { width: u32, height: u32 },
    /// A decoded frame ready for upload.
    Frame(SourceFrame),
}

/// Seam between the manager's state machine and the threads that do the
/// actual camera/decode work, so the switching semantics stay testable
/// without real hardware.
pub(crate) trait CaptureSpawner {
    fn start_webcam(
        &self,
        camera_index: u32,
        generation: u64,
        events: EventSender,
    ) -> Result<WebcamHandle, CaptureError>;

    fn start_decode(
        &self,
        bytes: Vec<u8>,
        generation: u64,
        events: EventSender,
    ) -> Result<(), CaptureError>;
}

struct NativeSpawner;

impl CaptureSpawner for NativeSpawner {
    fn start_webcam(
        &self,
        camera_index: u32,
        generation: u64,
        events: EventSender,
    ) -> Result<WebcamHandle, CaptureError> {
        webcam::start(camera_index, generation, events)
    }

    fn start_decode(
        &self,
        bytes: Vec<u8>,
        generation: u64,
        events: EventSender,
    ) -> Result<(), CaptureError> {
        still::decode(bytes, generation, events)
    }
}

enum SourceState {
    Uninitialized,
    Webcam(WebcamHandle),
    Image { width: u32, height: u32 },
}

/// Owns exactly one of {webcam stream, still image} as the current pixel
/// source and manages acquisition and teardown.
///
/// Acquisition and decoding happen on worker threads; every request is
/// stamped with a generation, and completions whose generation no longer
/// matches are discarded in [`FrameSourceManager::poll`]. Switching away
/// from the webcam always stops the capture thread (and with it the
/// camera stream) before the new source is adopted.
pub struct FrameSourceManager {
    state: SourceState,
    generation: u64,
    camera_index: u32,
    events_tx: EventSender,
    events_rx: Receiver<CaptureEvent>,
    spawner: Box<dyn CaptureSpawner>,
}

impl FrameSourceManager {
    pub fn new(camera_index: u32) -> Self {
        Self::with_spawner(camera_index, Box::new(NativeSpawner))
    }

    fn with_spawner(camera_index: u32, spawner: Box<dyn CaptureSpawner>) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            state: SourceState::Uninitialized,
            generation: 0,
            camera_index,
            events_tx,
            events_rx,
            spawner,
        }
    }

    /// Requests camera access and adopts the webcam as the current
    /// source. A failure to even spawn the capture thread is logged and
    /// leaves the manager uninitialized; open failures arrive later as
    /// events and keep whatever output was last uploaded on screen.
    pub fn activate_webcam(&mut self) {
        let generation = self.next_generation();
        self.stop_current();

        match self
            .spawner
            .start_webcam(self.camera_index, generation, self.events_tx.clone())
        {
            Ok(handle) => {
                debug!(generation, camera = self.camera_index, "webcam activation requested");
                self.state = SourceState::Webcam(handle);
            }
            Err(err) => {
                error!(error = %err, "failed to start webcam capture");
                self.state = SourceState::Uninitialized;
            }
        }
    }

    /// Adopts a still image as the current source from raw file bytes.
    ///
    /// Any running webcam stream is stopped before the decode is even
    /// attempted; this mirrors the switch semantics of the control panel
    /// and is the only place a camera stream is released on behalf of
    /// another source.
    pub fn load_image(&mut self, bytes: Vec<u8>) {
        let generation = self.next_generation();
        self.stop_current();
        self.state = SourceState::Image {
            width: 0,
            height: 0,
        };

        if let Err(err) = self
            .spawner
            .start_decode(bytes, generation, self.events_tx.clone())
        {
            error!(error = %err, "failed to start image decode");
        }
    }

    /// Drives the webcam toggle: off stops any active stream without
    /// starting a new source; on re-acquires a fresh stream.
    pub fn set_webcam_enabled(&mut self, enabled: bool) {
        if enabled {
            self.activate_webcam();
        } else {
            self.next_generation();
            self.stop_current();
        }
    }

    pub fn active_source(&self) -> ActiveSource {
        match self.state {
            SourceState::Uninitialized => ActiveSource::Uninitialized,
            SourceState::Webcam(_) => ActiveSource::Webcam,
            SourceState::Image { .. } => ActiveSource::Image,
        }
    }

    /// Drains pending capture events, discarding stale generations and
    /// logging failures, and returns the updates the render loop should
    /// apply this frame.
    pub fn poll(&mut self) -> Vec<SourceUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            if event.generation() != self.generation {
                trace!(
                    event_generation = event.generation(),
                    current = self.generation,
                    "discarding stale capture event"
                );
                continue;
            }
            match event {
                CaptureEvent::Ready {
                    width: w,
                    height: h,
                    ..
                } => {
                    if let SourceState::Image { width, height } = &mut self.state {
                        *width = w;
                        *height = h;
                    }
                    updates.push(SourceUpdate::SourceChanged {
                        width: w,
                        height: h,
                    });
                }
                CaptureEvent::Frame { frame, .. } => updates.push(SourceUpdate::Frame(frame)),
                CaptureEvent::Failed { error, .. } => {
                    error!(error = %error, "frame source failed; keeping previous output");
                }
            }
        }
        updates
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn stop_current(&mut self) {
        if let SourceState::Webcam(handle) =
            std::mem::replace(&mut self.state, SourceState::Uninitialized)
        {
            handle.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Records every spawn request and hands out inert handles whose
    /// stop flags the test can observe.
    #[derive(Clone, Default)]
    struct RecordingSpawner {
        webcams: Arc<Mutex<Vec<(u64, Arc<AtomicBool>)>>>,
        decodes: Arc<Mutex<Vec<u64>>>,
    }

    impl CaptureSpawner for RecordingSpawner {
        fn start_webcam(
            &self,
            _camera_index: u32,
            generation: u64,
            _events: EventSender,
        ) -> Result<WebcamHandle, CaptureError> {
            let stop = Arc::new(AtomicBool::new(false));
            self.webcams.lock().unwrap().push((generation, stop.clone()));
            Ok(WebcamHandle::fake(stop))
        }

        fn start_decode(
            &self,
            _bytes: Vec<u8>,
            generation: u64,
            _events: EventSender,
        ) -> Result<(), CaptureError> {
            self.decodes.lock().unwrap().push(generation);
            Ok(())
        }
    }

    fn manager_with_recorder() -> (FrameSourceManager, RecordingSpawner) {
        let spawner = RecordingSpawner::default();
        let manager = FrameSourceManager::with_spawner(0, Box::new(spawner.clone()));
        (manager, spawner)
    }

    #[test]
    fn loading_an_image_stops_the_running_webcam() {
        let (mut manager, spawner) = manager_with_recorder();
        manager.activate_webcam();
        assert_eq!(manager.active_source(), ActiveSource::Webcam);

        manager.load_image(vec![1, 2, 3]);

        let webcams = spawner.webcams.lock().unwrap();
        assert_eq!(webcams.len(), 1);
        assert!(webcams[0].1.load(Ordering::Relaxed), "stream left running");
        assert_eq!(manager.active_source(), ActiveSource::Image);
        assert_eq!(spawner.decodes.lock().unwrap().len(), 1);
    }

    #[test]
    fn toggling_webcam_off_then_on_acquires_a_fresh_stream() {
        let (mut manager, spawner) = manager_with_recorder();
        manager.activate_webcam();
        manager.set_webcam_enabled(false);
        assert_eq!(manager.active_source(), ActiveSource::Uninitialized);

        manager.set_webcam_enabled(true);

        let webcams = spawner.webcams.lock().unwrap();
        assert_eq!(webcams.len(), 2);
        assert!(webcams[0].1.load(Ordering::Relaxed));
        assert!(!webcams[1].1.load(Ordering::Relaxed));
        assert_ne!(webcams[0].0, webcams[1].0, "generation was reused");
    }

    #[test]
    fn stale_events_are_discarded() {
        let (mut manager, _spawner) = manager_with_recorder();
        manager.activate_webcam();
        let stale_generation = manager.generation;
        manager.set_webcam_enabled(false);
        manager.set_webcam_enabled(true);

        manager
            .events_tx
            .send(CaptureEvent::Ready {
                generation: stale_generation,
                width: 640,
                height: 480,
            })
            .unwrap();

        assert!(manager.poll().is_empty());
    }

    #[test]
    fn current_generation_events_pass_through() {
        let (mut manager, _spawner) = manager_with_recorder();
        manager.activate_webcam();

        manager
            .events_tx
            .send(CaptureEvent::Ready {
                generation: manager.generation,
                width: 1280,
                height: 720,
            })
            .unwrap();
        manager
            .events_tx
            .send(CaptureEvent::Frame {
                generation: manager.generation,
                frame: SourceFrame {
                    width: 1280,
                    height: 720,
                    rgba: vec![0; 4],
                },
            })
            .unwrap();

        let updates = manager.poll();
        assert_eq!(updates.len(), 2);
        assert!(matches!(
            updates[0],
            SourceUpdate::SourceChanged {
                width: 1280,
                height: 720
            }
        ));
        assert!(matches!(updates[1], SourceUpdate::Frame(_)));
    }

    #[test]
    fn failures_are_swallowed_and_leave_state_untouched() {
        let (mut manager, _spawner) = manager_with_recorder();
        manager.activate_webcam();

        manager
            .events_tx
            .send(CaptureEvent::Failed {
                generation: manager.generation,
                error: CaptureError::Thread(std::io::Error::other("boom")),
            })
            .unwrap();

        assert!(manager.poll().is_empty());
        assert_eq!(manager.active_source(), ActiveSource::Webcam);
    }

    #[test]
    fn image_ready_records_native_dimensions() {
        let (mut manager, _spawner) = manager_with_recorder();
        manager.load_image(vec![0; 8]);

        manager
            .events_tx
            .send(CaptureEvent::Ready {
                generation: manager.generation,
                width: 800,
                height: 600,
            })
            .unwrap();
        manager.poll();

        match manager.state {
            SourceState::Image { width, height } => {
                assert_eq!((width, height), (800, 600));
            }
            _ => panic!("expected image state"),
        }
    }
}
