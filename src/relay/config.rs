//! Relay configuration

use std::time::Duration;

/// Fanout and pipeline configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Per-subscriber buffered-byte level at or above which new frames are
    /// skipped for that subscriber
    pub congestion_threshold: usize,

    /// Hard cap on queued frames per subscriber; overflow evicts the oldest
    pub subscriber_queue_capacity: usize,

    /// Read-buffer size for the decode pipe
    pub read_chunk_size: usize,

    /// Delay before restarting a crashed decode process
    pub restart_delay: Duration,

    /// Consecutive failed starts tolerated before the pump idles
    pub max_consecutive_failures: u32,

    /// Emit a progress log line every this many relayed frames (0 disables)
    pub log_every_frames: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            congestion_threshold: 64 * 1024,
            subscriber_queue_capacity: 16,
            read_chunk_size: 32 * 1024,
            restart_delay: Duration::from_secs(1),
            max_consecutive_failures: 5,
            log_every_frames: 100,
        }
    }
}

impl RelayConfig {
    /// Set the per-subscriber congestion threshold
    pub fn congestion_threshold(mut self, bytes: usize) -> Self {
        self.congestion_threshold = bytes;
        self
    }

    /// Set the per-subscriber queue capacity
    pub fn subscriber_queue_capacity(mut self, frames: usize) -> Self {
        self.subscriber_queue_capacity = frames.max(1);
        self
    }

    /// Set the decode pipe read-buffer size
    pub fn read_chunk_size(mut self, bytes: usize) -> Self {
        self.read_chunk_size = bytes.max(1);
        self
    }

    /// Set the restart delay
    pub fn restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Set the consecutive-failure cap
    pub fn max_consecutive_failures(mut self, failures: u32) -> Self {
        self.max_consecutive_failures = failures.max(1);
        self
    }
}
