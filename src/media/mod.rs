//! Media handling for the relay
//!
//! This module provides:
//! - The extracted `Frame` type and JPEG marker constants
//! - Marker-based demuxing of the continuous decode output

pub mod demux;
pub mod frame;

pub use demux::{FrameDemuxer, MAX_TAIL_BYTES};
pub use frame::{Frame, EOI, SOI};
