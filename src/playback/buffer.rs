//! Adaptive jitter buffer
//!
//! Frames arrive over the wire in bursts with variable latency; the consume
//! loop wants one frame per tick. The buffer smooths the mismatch with a
//! watermark-governed state machine: it refuses to play until enough frames
//! have queued (start watermark), and drops back to buffering when a tick
//! finds the queue nearly empty (low watermark). Underrun is a state, never
//! an error.
//!
//! Latency is bounded over completeness: when the queue is full, an arriving
//! frame evicts the oldest one.

use std::collections::VecDeque;

use crate::media::Frame;
use crate::stats::PlaybackStats;

use super::config::PlaybackConfig;

/// Playback state of the jitter buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Accumulating frames until the start watermark is reached.
    Buffering,
    /// Draining one frame per consume tick.
    Playing,
}

/// Bounded ordered queue of received frames with a play/pause state machine.
#[derive(Debug)]
pub struct PlaybackBuffer {
    frames: VecDeque<Frame>,
    state: PlaybackState,
    config: PlaybackConfig,
    stats: PlaybackStats,
}

impl PlaybackBuffer {
    /// Create an empty buffer in the buffering state.
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            frames: VecDeque::with_capacity(config.capacity),
            state: PlaybackState::Buffering,
            config,
            stats: PlaybackStats::new(),
        }
    }

    /// Queue an arriving frame.
    ///
    /// At capacity the oldest queued frame is evicted. Reaching the start
    /// watermark while buffering switches the state to playing.
    pub fn push(&mut self, frame: Frame) {
        self.stats.frames_received += 1;

        if self.frames.len() >= self.config.capacity {
            self.frames.pop_front();
            self.stats.frames_dropped += 1;
        }
        self.frames.push_back(frame);

        if self.state == PlaybackState::Buffering
            && self.frames.len() >= self.config.start_watermark
        {
            self.state = PlaybackState::Playing;
            tracing::debug!(queued = self.frames.len(), "playback started");
        }
    }

    /// One scheduled consume tick.
    ///
    /// While playing, dequeues the oldest frame — unless the queue has
    /// fallen below the low watermark, in which case the buffer drops back
    /// to buffering and nothing is emitted. While buffering, always `None`.
    pub fn on_tick(&mut self) -> Option<Frame> {
        match self.state {
            PlaybackState::Buffering => None,
            PlaybackState::Playing => {
                if self.frames.len() < self.config.low_watermark {
                    self.state = PlaybackState::Buffering;
                    self.stats.underruns += 1;
                    tracing::debug!(queued = self.frames.len(), "playback underrun, rebuffering");
                    return None;
                }
                let frame = self.frames.pop_front();
                if frame.is_some() {
                    self.stats.frames_played += 1;
                }
                frame
            }
        }
    }

    /// Drop all buffered frames and return to the buffering state.
    ///
    /// Called when the transport closes; counters survive the reset.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.state = PlaybackState::Buffering;
    }

    /// Current state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Number of queued frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Snapshot of playback counters.
    pub fn stats(&self) -> PlaybackStats {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn frame(seq: u64) -> Frame {
        Frame::new(seq, seq * 4, Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]))
    }

    fn config() -> PlaybackConfig {
        PlaybackConfig::default()
            .start_watermark(3)
            .low_watermark(2)
            .capacity(5)
    }

    #[test]
    fn test_starts_buffering() {
        let buffer = PlaybackBuffer::new(config());
        assert_eq!(buffer.state(), PlaybackState::Buffering);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_start_watermark_begins_playback() {
        let mut buffer = PlaybackBuffer::new(config());

        buffer.push(frame(0));
        buffer.push(frame(1));
        assert_eq!(buffer.state(), PlaybackState::Buffering);
        assert!(buffer.on_tick().is_none());

        buffer.push(frame(2));
        assert_eq!(buffer.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_underrun_exactly_at_low_watermark() {
        let mut buffer = PlaybackBuffer::new(config());
        for seq in 0..3 {
            buffer.push(frame(seq));
        }

        // 3 queued >= low, dequeue; 2 queued >= low, dequeue; 1 < low:
        // transition back to buffering without emitting
        assert_eq!(buffer.on_tick().unwrap().seq, 0);
        assert_eq!(buffer.on_tick().unwrap().seq, 1);
        assert!(buffer.on_tick().is_none());
        assert_eq!(buffer.state(), PlaybackState::Buffering);
        assert_eq!(buffer.stats().underruns, 1);

        // Refilling past the start watermark resumes playback
        buffer.push(frame(3));
        buffer.push(frame(4));
        assert_eq!(buffer.state(), PlaybackState::Playing);
        assert_eq!(buffer.on_tick().unwrap().seq, 2);
    }

    #[test]
    fn test_nothing_emitted_while_empty() {
        let mut buffer = PlaybackBuffer::new(config().low_watermark(0).start_watermark(1));

        buffer.push(frame(0));
        assert_eq!(buffer.state(), PlaybackState::Playing);
        assert!(buffer.on_tick().is_some());

        // Empty queue with a zero low watermark stays playing but emits
        // nothing
        assert!(buffer.on_tick().is_none());
        assert!(buffer.on_tick().is_none());
        assert_eq!(buffer.stats().frames_played, 1);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut buffer = PlaybackBuffer::new(config());

        for seq in 0..12 {
            buffer.push(frame(seq));
        }

        // Drops equal arrivals beyond capacity; length never exceeds it
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.stats().frames_dropped, 7);
        assert_eq!(buffer.stats().frames_received, 12);

        // Oldest surviving frame is the first not evicted
        assert_eq!(buffer.on_tick().unwrap().seq, 7);
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = PlaybackBuffer::new(config());
        for seq in 0..4 {
            buffer.push(frame(seq));
        }
        assert_eq!(buffer.state(), PlaybackState::Playing);

        buffer.clear();
        assert_eq!(buffer.state(), PlaybackState::Buffering);
        assert!(buffer.is_empty());
        assert!(buffer.on_tick().is_none());

        // Counters survive the reset
        assert_eq!(buffer.stats().frames_received, 4);
    }

    #[test]
    fn test_frames_play_in_arrival_order() {
        let mut buffer = PlaybackBuffer::new(config().capacity(32).start_watermark(1));
        for seq in 0..6 {
            buffer.push(frame(seq));
        }
        for seq in 0..4 {
            assert_eq!(buffer.on_tick().unwrap().seq, seq);
        }
    }
}
