//! Statistics

pub mod metrics;

pub use metrics::{PlaybackStats, RelayStats};
