//! Consume loop
//!
//! A periodic task drains the jitter buffer at the target cadence. Each
//! dequeued frame is decoded off the loop task so a slow decode never skews
//! the tick schedule; the surface lock serializes commits.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::media::Frame;

use super::buffer::{PlaybackBuffer, PlaybackState};
use super::surface::DoubleBuffer;

/// Decodes an extracted frame into a presentable image.
///
/// The image type is opaque to the playback core; GPU upload or rendering of
/// the committed handle is the consumer's business.
pub trait FrameDecoder: Send + Sync + 'static {
    /// Decoded image handed to the presentation boundary.
    type Image: Send + Sync + 'static;

    /// Decode failure; the offending frame is skipped.
    type Error: std::error::Error + Send + Sync;

    /// Decode one frame.
    fn decode(&self, frame: &Frame) -> Result<Self::Image, Self::Error>;
}

/// Events surfaced by the playback machinery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Enough frames buffered; playback started.
    Playing,
    /// The queue drained below the low watermark; refilling.
    Buffering,
    /// A decoded image was committed to the front surface.
    FrameCommitted,
    /// Decode of one frame failed; the frame was skipped.
    DecodeFailed(String),
    /// The transport closed; buffered state was cleared.
    SourceClosed,
}

/// Run the consume loop until cancelled. Clears the buffer on the way out.
pub(crate) async fn run<D: FrameDecoder>(
    buffer: Arc<Mutex<PlaybackBuffer>>,
    decoder: Arc<D>,
    surface: Arc<DoubleBuffer<D::Image>>,
    tick: std::time::Duration,
    events: mpsc::Sender<PlaybackEvent>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let (frame, underran) = {
            let mut buf = buffer.lock().unwrap();
            let was_playing = buf.state() == PlaybackState::Playing;
            let frame = buf.on_tick();
            (frame, was_playing && buf.state() == PlaybackState::Buffering)
        };

        if underran {
            let _ = events.try_send(PlaybackEvent::Buffering);
        }

        let Some(frame) = frame else { continue };

        // Decode runs concurrently with the loop; the surface lock
        // serializes commits
        let decoder = Arc::clone(&decoder);
        let surface = Arc::clone(&surface);
        let events = events.clone();
        tokio::task::spawn_blocking(move || match decoder.decode(&frame) {
            Ok(image) => {
                surface.commit(image);
                let _ = events.try_send(PlaybackEvent::FrameCommitted);
            }
            Err(e) => {
                tracing::warn!(seq = frame.seq, error = %e, "frame decode failed");
                let _ = events.try_send(PlaybackEvent::DecodeFailed(e.to_string()));
            }
        });
    }

    buffer.lock().unwrap().clear();
}

/// Spawn the consume loop as a background task.
pub(crate) fn spawn<D: FrameDecoder>(
    buffer: Arc<Mutex<PlaybackBuffer>>,
    decoder: Arc<D>,
    surface: Arc<DoubleBuffer<D::Image>>,
    tick: std::time::Duration,
    events: mpsc::Sender<PlaybackEvent>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(buffer, decoder, surface, tick, events, cancel))
}
