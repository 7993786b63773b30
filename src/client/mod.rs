//! Viewer-side client
//!
//! Provides the playback session that turns a relayed frame stream into
//! steady, double-buffered presentation. Transport and reconnect policy
//! stay with the caller.

pub mod viewer;

pub use viewer::{FrameSource, PlaybackSession};
