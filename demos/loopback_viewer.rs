//! Loopback playback demo
//!
//! Run with: cargo run --example loopback_viewer
//!
//! Wires the whole pipeline in-process with a synthetic frame generator
//! instead of a real decode process: generator -> broadcaster -> subscriber
//! -> jitter buffer -> double-buffered surface. Useful for watching the
//! buffering/playing transitions and drop accounting without yt-dlp or
//! ffmpeg installed.

use std::sync::Arc;
use std::time::Duration;

use mjpeg_relay::client::PlaybackSession;
use mjpeg_relay::media::{Frame, EOI, SOI};
use mjpeg_relay::playback::FrameDecoder;
use mjpeg_relay::source::{ByteStream, ExitNotice, MediaSource, SourceError};
use mjpeg_relay::{FanoutBroadcaster, PlaybackConfig, RelayConfig};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};

/// Emits a marker-delimited fake frame every 100ms.
struct SyntheticSource;

impl MediaSource for SyntheticSource {
    async fn start(&self) -> Result<ByteStream, SourceError> {
        let (mut writer, reader) = tokio::io::duplex(64 * 1024);
        let (exit_tx, exit_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(100));
            for i in 0u32.. {
                ticker.tick().await;
                if writer.write_all(&fake_jpeg(i)).await.is_err() {
                    break;
                }
            }
            let _ = exit_tx.send(ExitNotice {
                code: Some(0),
                reason: "generator finished".into(),
            });
        });

        Ok(ByteStream::new(reader, exit_rx))
    }

    async fn stop(&self) {}
}

fn fake_jpeg(i: u32) -> Vec<u8> {
    let mut v = SOI.to_vec();
    // Payload bytes stay below 0xFF so they can't alias a marker
    v.extend(i.to_be_bytes().iter().map(|b| b & 0x7F));
    v.extend_from_slice(&[0x20; 64]);
    v.extend_from_slice(&EOI);
    v
}

struct SizeDecoder;

impl FrameDecoder for SizeDecoder {
    type Image = usize;
    type Error = std::io::Error;

    fn decode(&self, frame: &Frame) -> Result<usize, std::io::Error> {
        Ok(frame.size())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let hub = FanoutBroadcaster::new(SyntheticSource, RelayConfig::default());
    let mut sub = hub.subscribe();
    let sub_id = sub.id();

    // Bridge the subscription into a playback session the way a WebSocket
    // client would: one payload per message
    let (tx, rx) = mpsc::channel(32);
    let bridge = tokio::spawn(async move {
        while let Some(frame) = sub.recv().await {
            if tx.send(frame.data).await.is_err() {
                break;
            }
        }
    });

    let config = PlaybackConfig::default().target_fps(10);
    let (session, mut events) = PlaybackSession::start(rx, SizeDecoder, config);

    let surface = Arc::clone(session.surface());
    let watcher = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!("Event: {:?} (front={:?})", event, surface.front().map(|i| *i));
        }
    });

    tokio::time::sleep(Duration::from_secs(5)).await;

    let stats = session.stats();
    println!(
        "Played {} of {} received frames ({} dropped, {} underruns), {} commits",
        stats.frames_played,
        stats.frames_received,
        stats.frames_dropped,
        stats.underruns,
        session.surface().swap_count(),
    );

    session.stop().await;
    hub.unsubscribe(sub_id);
    bridge.abort();
    watcher.abort();
}
