mod manager;
mod still;
mod webcam;

pub use manager::{ActiveSource, FrameSourceManager, SourceUpdate};

use crossbeam_channel::Sender;
use thiserror::Error;

/// Errors raised while acquiring pixels from a camera or a still image.
///
/// These never cross the manager boundary: [`FrameSourceManager::poll`]
/// logs them and keeps whatever source was previously active running.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to access camera: {0}")]
    CameraAccess(#[from] nokhwa::NokhwaError),
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("failed to spawn capture thread: {0}")]
    Thread(std::io::Error),
}

/// One decoded RGBA frame ready for texture upload.
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows, top row first.
    pub rgba: Vec<u8>,
}

/// Raw completion events flowing from capture/decode threads to the
/// manager. Every event carries the generation it was requested under so
/// stale completions from a superseded source can be discarded.
#[derive(Debug)]
pub(crate) enum CaptureEvent {
    Ready {
        generation: u64,
        width: u32,
        height: u32,
    },
    Frame {
        generation: u64,
        frame: SourceFrame,
    },
    Failed {
        generation: u64,
        error: CaptureError,
    },
}

impl CaptureEvent {
    pub(crate) fn generation(&self) -> u64 {
        match self {
            CaptureEvent::Ready { generation, .. }
            | CaptureEvent::Frame { generation, .. }
            | CaptureEvent::Failed { generation, .. } => *generation,
        }
    }
}

pub(crate) type EventSender = Sender<CaptureEvent>;

/// Soft bound on undelivered frames. Capture threads drop new frames
/// once the event backlog reaches this depth instead of queueing behind
/// a slow renderer, and never block on delivery.
pub(crate) const FRAME_BACKLOG_LIMIT: usize = 2;
