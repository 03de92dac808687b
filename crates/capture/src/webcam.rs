use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use tracing::trace;

use crate::{CaptureError, CaptureEvent, EventSender, SourceFrame, FRAME_BACKLOG_LIMIT};

/// Handle to a running camera capture thread.
///
/// Dropping the handle without calling [`WebcamHandle::stop`] still stops
/// the thread, but `stop` is the ordinary path: it is the explicit
/// resource-release point when the user switches away from the webcam.
pub(crate) struct WebcamHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl WebcamHandle {
    pub(crate) fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }

    #[cfg(test)]
    pub(crate) fn fake(stop: Arc<AtomicBool>) -> Self {
        Self { stop, join: None }
    }
}

impl Drop for WebcamHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

/// Spawns the capture thread for the given camera.
///
/// The thread reports exactly one `Ready` event after the stream opens,
/// then a stream of `Frame` events until it is stopped or the camera
/// errors out. Open and per-frame failures surface as a single `Failed`
/// event; the thread never retries.
pub(crate) fn start(
    camera_index: u32,
    generation: u64,
    events: EventSender,
) -> Result<WebcamHandle, CaptureError> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    let join = thread::Builder::new()
        .name("camtile-capture".into())
        .spawn(move || capture_loop(camera_index, generation, flag, events))
        .map_err(CaptureError::Thread)?;

    Ok(WebcamHandle {
        stop,
        join: Some(join),
    })
}

fn capture_loop(camera_index: u32, generation: u64, stop: Arc<AtomicBool>, events: EventSender) {
    let requested =
        RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestResolution);
    let mut camera = match Camera::new(CameraIndex::Index(camera_index), requested) {
        Ok(camera) => camera,
        Err(err) => {
            let _ = events.send(CaptureEvent::Failed {
                generation,
                error: err.into(),
            });
            return;
        }
    };

    if let Err(err) = camera.open_stream() {
        let _ = events.send(CaptureEvent::Failed {
            generation,
            error: err.into(),
        });
        return;
    }

    let resolution = camera.resolution();
    let _ = events.send(CaptureEvent::Ready {
        generation,
        width: resolution.width(),
        height: resolution.height(),
    });

    while !stop.load(Ordering::Relaxed) {
        let buffer = match camera.frame() {
            Ok(buffer) => buffer,
            Err(err) => {
                let _ = events.send(CaptureEvent::Failed {
                    generation,
                    error: err.into(),
                });
                break;
            }
        };
        // A backlog means the renderer has not consumed the last
        // deliveries yet; skip the decode and drop the frame rather than
        // queue up behind it.
        if events.len() >= FRAME_BACKLOG_LIMIT {
            trace!(generation, "frame backlog full; dropping camera frame");
            continue;
        }

        let decoded = match buffer.decode_image::<RgbAFormat>() {
            Ok(decoded) => decoded,
            Err(err) => {
                let _ = events.send(CaptureEvent::Failed {
                    generation,
                    error: err.into(),
                });
                break;
            }
        };

        let frame = SourceFrame {
            width: decoded.width(),
            height: decoded.height(),
            rgba: decoded.into_raw(),
        };
        if events.send(CaptureEvent::Frame { generation, frame }).is_err() {
            break;
        }
    }

    let _ = camera.stop_stream();
}
