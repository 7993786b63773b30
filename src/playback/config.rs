//! Playback configuration

use std::time::Duration;

/// Jitter buffer and consume-loop configuration options
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Queued frames required to leave buffering
    pub start_watermark: usize,

    /// Queue level below which playback pauses to rebuffer
    pub low_watermark: usize,

    /// Hard cap on queued frames; overflow evicts the oldest
    pub capacity: usize,

    /// Consume-loop cadence; should match the source frame rate
    pub tick_interval: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            start_watermark: 10,
            low_watermark: 3,
            capacity: 30,
            tick_interval: Duration::from_millis(100),
        }
    }
}

impl PlaybackConfig {
    /// Set the start watermark
    pub fn start_watermark(mut self, frames: usize) -> Self {
        self.start_watermark = frames.max(1);
        self
    }

    /// Set the low watermark
    pub fn low_watermark(mut self, frames: usize) -> Self {
        self.low_watermark = frames;
        self
    }

    /// Set the queue capacity
    pub fn capacity(mut self, frames: usize) -> Self {
        self.capacity = frames.max(1);
        self
    }

    /// Set the consume cadence from a target frame rate
    pub fn target_fps(mut self, fps: u32) -> Self {
        self.tick_interval = Duration::from_millis(1000 / u64::from(fps.max(1)));
        self
    }

    /// Set the consume cadence directly
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}
