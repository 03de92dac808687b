use std::thread;

use tracing::debug;

use crate::{CaptureError, CaptureEvent, EventSender, SourceFrame};

/// Decodes user-selected image bytes on a worker thread.
///
/// A successful decode reports `Ready` followed by a single `Frame`; the
/// renderer uploads it once and keeps drawing it without further
/// deliveries. Decode failures surface as one `Failed` event.
pub(crate) fn decode(bytes: Vec<u8>, generation: u64, events: EventSender) -> Result<(), CaptureError> {
    thread::Builder::new()
        .name("camtile-decode".into())
        .spawn(move || decode_blocking(bytes, generation, events))
        .map_err(CaptureError::Thread)?;
    Ok(())
}

fn decode_blocking(bytes: Vec<u8>, generation: u64, events: EventSender) {
    let decoded = match image::load_from_memory(&bytes) {
        Ok(decoded) => decoded,
        Err(err) => {
            let _ = events.send(CaptureEvent::Failed {
                generation,
                error: CaptureError::ImageDecode(err),
            });
            return;
        }
    };

    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    debug!(width, height, "decoded still image");

    let _ = events.send(CaptureEvent::Ready {
        generation,
        width,
        height,
    });
    let _ = events.send(CaptureEvent::Frame {
        generation,
        frame: SourceFrame {
            width,
            height,
            rgba: rgba.into_raw(),
        },
    });
}
