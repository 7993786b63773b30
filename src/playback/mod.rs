//! Client-side playback
//!
//! This module provides:
//! - The watermark-governed jitter buffer
//! - The fixed-cadence consume loop and decoder seam
//! - The double-buffered presentation surface

pub mod buffer;
pub mod config;
pub mod player;
pub mod surface;

pub use buffer::{PlaybackBuffer, PlaybackState};
pub use config::PlaybackConfig;
pub use player::{FrameDecoder, PlaybackEvent};
pub use surface::DoubleBuffer;
