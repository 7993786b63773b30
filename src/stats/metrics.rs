//! Statistics for relay and playback

/// Relay-side counters
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    /// Total bytes read from the decode pipeline
    pub bytes_ingested: u64,
    /// Frames demuxed and offered to subscribers
    pub frames_relayed: u64,
    /// Frames skipped across subscribers due to congestion
    pub frames_skipped: u64,
    /// Demux tail-overflow discards
    pub tail_discards: u64,
    /// Decode pipeline restarts
    pub restarts: u64,
    /// Currently attached subscribers
    pub subscribers: usize,
}

/// Client-side playback counters
#[derive(Debug, Clone, Default)]
pub struct PlaybackStats {
    /// Frames received from the transport
    pub frames_received: u64,
    /// Frames dequeued for presentation
    pub frames_played: u64,
    /// Frames evicted by the capacity bound
    pub frames_dropped: u64,
    /// Transitions back into buffering after an underrun
    pub underruns: u64,
}

impl PlaybackStats {
    /// Create a fresh counter set
    pub fn new() -> Self {
        Self::default()
    }
}
