//! # mjpeg-relay
//!
//! MJPEG relay server/client library.
//!
//! An external decode process turns a live video feed into a continuous
//! MJPEG byte stream; this crate splits that stream into discrete JPEG
//! frames, fans each frame out to any number of WebSocket viewers, and — on
//! the viewer side — replays the frames smoothly despite bursty delivery.
//!
//! ```text
//! resolver/decoder ──> demuxer ──> broadcaster ──> wire channel ──> jitter
//!   (yt-dlp/ffmpeg)    (SOI/EOI)    (fanout)       (WebSocket)     buffer
//!                                                                    │
//!                                                 presentation <── double
//!                                                  (external)      buffer
//! ```
//!
//! Key properties:
//!
//! - **Congestion isolation**: every subscriber owns a bounded queue; a slow
//!   viewer loses its own frames and nothing else. The shared pipeline is
//!   never blocked by fanout.
//! - **Demand-driven decode**: the decode process starts with the first
//!   subscriber, stops with the last, and restarts after a crash while
//!   subscribers remain. The resolved source address is cached with a TTL.
//! - **Adaptive playback**: the client jitter buffer pauses and resumes via
//!   watermarks, drains at a fixed cadence, and commits complete images via
//!   double buffering.
//!
//! ## Server example
//! ```no_run
//! use mjpeg_relay::{RelayServer, ServerConfig, SourceConfig};
//!
//! # async fn example() -> mjpeg_relay::Result<()> {
//! let source = SourceConfig::url("https://www.youtube.com/watch?v=AnzVZRaujNA");
//! let server = RelayServer::new(ServerConfig::new(source));
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod media;
pub mod playback;
pub mod relay;
pub mod server;
pub mod source;
pub mod stats;

pub use client::PlaybackSession;
pub use error::{Error, Result};
pub use media::{Frame, FrameDemuxer};
pub use playback::{PlaybackBuffer, PlaybackConfig, PlaybackEvent, PlaybackState};
pub use relay::{FanoutBroadcaster, RelayConfig};
pub use server::{RelayServer, ServerConfig};
pub use source::{DecoderSupervisor, SourceConfig, SourceTarget};
