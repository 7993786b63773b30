//! Viewer-side playback session
//!
//! High-level API for replaying a relayed frame stream: pumps incoming
//! frames into the jitter buffer, runs the consume loop, and commits decoded
//! images to the double-buffered surface. The transport itself stays with
//! the caller — anything that yields one complete frame payload per message
//! (a WebSocket binary message, an in-process channel) can feed a session,
//! and reconnect policy after a close is the caller's business.

use std::future::Future;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::media::Frame;
use crate::playback::buffer::{PlaybackBuffer, PlaybackState};
use crate::playback::config::PlaybackConfig;
use crate::playback::player::{self, FrameDecoder, PlaybackEvent};
use crate::playback::surface::DoubleBuffer;
use crate::stats::PlaybackStats;

/// Frames arriving from the transport.
///
/// One item per complete frame payload; `None` signals that the transport
/// has closed. Implementations should be cancellation-safe.
pub trait FrameSource: Send + 'static {
    /// The next frame payload, or `None` once the transport has closed.
    fn next_frame(&mut self) -> impl Future<Output = Option<Bytes>> + Send;
}

/// A plain channel works as a frame source, e.g. for loopback wiring.
impl FrameSource for mpsc::Receiver<Bytes> {
    async fn next_frame(&mut self) -> Option<Bytes> {
        self.recv().await
    }
}

/// Viewer playback session
///
/// Feeds a [`FrameSource`] through the jitter buffer into the double
/// buffered surface at a fixed cadence.
///
/// # Example
/// ```no_run
/// use mjpeg_relay::client::PlaybackSession;
/// use mjpeg_relay::playback::{FrameDecoder, PlaybackConfig};
/// use mjpeg_relay::media::Frame;
///
/// struct SizeDecoder;
///
/// impl FrameDecoder for SizeDecoder {
///     type Image = usize;
///     type Error = std::io::Error;
///
///     fn decode(&self, frame: &Frame) -> Result<usize, std::io::Error> {
///         Ok(frame.size())
///     }
/// }
///
/// # async fn example() {
/// let (tx, rx) = tokio::sync::mpsc::channel(32);
/// # let _ = &tx;
/// let (session, mut events) = PlaybackSession::start(rx, SizeDecoder, PlaybackConfig::default());
///
/// tokio::spawn(async move {
///     while let Some(event) = events.recv().await {
///         println!("Event: {:?}", event);
///     }
/// });
///
/// // Hand session.surface() to the presentation layer, feed frames via tx.
/// session.stop().await;
/// # }
/// ```
pub struct PlaybackSession<D: FrameDecoder> {
    buffer: Arc<Mutex<PlaybackBuffer>>,
    surface: Arc<DoubleBuffer<D::Image>>,
    cancel: CancellationToken,
    feed: JoinHandle<()>,
    player: JoinHandle<()>,
}

impl<D: FrameDecoder> PlaybackSession<D> {
    /// Start a session over the given transport.
    ///
    /// Returns the session and a receiver for playback events.
    pub fn start<F: FrameSource>(
        source: F,
        decoder: D,
        config: PlaybackConfig,
    ) -> (Self, mpsc::Receiver<PlaybackEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);

        let buffer = Arc::new(Mutex::new(PlaybackBuffer::new(config.clone())));
        let surface = Arc::new(DoubleBuffer::new());
        let cancel = CancellationToken::new();

        let feed = tokio::spawn(feed_loop(
            source,
            Arc::clone(&buffer),
            Arc::clone(&surface),
            event_tx.clone(),
            cancel.clone(),
        ));

        let player = player::spawn(
            Arc::clone(&buffer),
            Arc::new(decoder),
            Arc::clone(&surface),
            config.tick_interval,
            event_tx,
            cancel.clone(),
        );

        let session = Self {
            buffer,
            surface,
            cancel,
            feed,
            player,
        };
        (session, event_rx)
    }

    /// The presentation surface; its front slot always holds a complete
    /// image.
    pub fn surface(&self) -> &Arc<DoubleBuffer<D::Image>> {
        &self.surface
    }

    /// Current buffer state.
    pub fn state(&self) -> PlaybackState {
        self.buffer.lock().unwrap().state()
    }

    /// Number of queued frames.
    pub fn queued_frames(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }

    /// Snapshot of playback counters.
    pub fn stats(&self) -> PlaybackStats {
        self.buffer.lock().unwrap().stats()
    }

    /// Cancel the consume loop and clear buffered state.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.feed.await;
        let _ = self.player.await;
    }
}

/// Pumps transport payloads into the jitter buffer until close or cancel.
async fn feed_loop<F: FrameSource, I>(
    mut source: F,
    buffer: Arc<Mutex<PlaybackBuffer>>,
    surface: Arc<DoubleBuffer<I>>,
    events: mpsc::Sender<PlaybackEvent>,
    cancel: CancellationToken,
) {
    let mut seq = 0u64;
    let mut offset = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            payload = source.next_frame() => match payload {
                Some(data) => {
                    let size = data.len() as u64;
                    let frame = Frame::new(seq, offset, data);
                    seq += 1;
                    offset += size;

                    let started_playing = {
                        let mut buf = buffer.lock().unwrap();
                        let was_buffering = buf.state() == PlaybackState::Buffering;
                        buf.push(frame);
                        was_buffering && buf.state() == PlaybackState::Playing
                    };
                    if started_playing {
                        let _ = events.try_send(PlaybackEvent::Playing);
                    }
                }
                None => {
                    buffer.lock().unwrap().clear();
                    surface.clear();
                    tracing::info!(frames = seq, "transport closed, playback reset");
                    let _ = events.try_send(PlaybackEvent::SourceClosed);
                    return;
                }
            }
        }
    }
}
