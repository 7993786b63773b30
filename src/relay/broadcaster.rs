//! Frame fanout and decode-pipeline lifecycle
//!
//! The broadcaster owns the subscriber map and the pump task. The pump reads
//! raw bytes from the decode pipeline, demuxes them synchronously in place,
//! and offers each frame to every subscriber without awaiting — a slow
//! viewer can only ever lose its own frames.
//!
//! Lifecycle follows demand: the pipeline starts when the first subscriber
//! arrives and stops when the last one leaves. An unexpected process exit
//! with subscribers still attached triggers a restart after a fixed delay;
//! the supervisor re-resolves the source address if its TTL has lapsed in
//! the meantime. Repeated failed starts degrade to an empty stream instead
//! of tearing the relay down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::media::{Frame, FrameDemuxer};
use crate::source::{ByteStream, MediaSource};
use crate::stats::RelayStats;

use super::config::RelayConfig;
use super::subscriber::{OfferOutcome, Subscriber, SubscriberShared};

/// How long to wait for the exit notice after the byte stream ends.
const EXIT_NOTICE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct RelayCounters {
    bytes_ingested: AtomicU64,
    frames_relayed: AtomicU64,
    frames_skipped: AtomicU64,
    tail_discards: AtomicU64,
    restarts: AtomicU64,
}

struct Pump {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Fans demuxed frames out to all subscribers and drives the decode
/// pipeline lifecycle.
pub struct FanoutBroadcaster<S: MediaSource> {
    source: S,
    config: RelayConfig,
    subscribers: Mutex<HashMap<u64, Arc<SubscriberShared>>>,
    next_subscriber_id: AtomicU64,
    pump: Mutex<Option<Pump>>,
    counters: RelayCounters,
    /// Self-handle for spawning the pump task from `&self` methods.
    weak: Weak<Self>,
}

impl<S: MediaSource> FanoutBroadcaster<S> {
    /// Create a broadcaster over the given source.
    pub fn new(source: S, config: RelayConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            source,
            config,
            subscribers: Mutex::new(HashMap::new()),
            next_subscriber_id: AtomicU64::new(1),
            pump: Mutex::new(None),
            counters: RelayCounters::default(),
            weak: weak.clone(),
        })
    }

    /// Attach a new subscriber, starting the decode pipeline if it is the
    /// first one (or if the pipeline previously went idle).
    pub fn subscribe(&self) -> Subscriber {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(SubscriberShared::new(
            self.config.congestion_threshold,
            self.config.subscriber_queue_capacity,
        ));

        let count = {
            let mut subs = self.subscribers.lock().unwrap();
            subs.insert(id, Arc::clone(&shared));
            subs.len()
        };

        tracing::info!(subscriber_id = id, subscribers = count, "subscriber added");
        self.ensure_pump();

        Subscriber::new(id, shared)
    }

    /// Detach a subscriber, stopping the decode pipeline if it was the last.
    pub fn unsubscribe(&self, id: u64) {
        let remaining = {
            let mut subs = self.subscribers.lock().unwrap();
            if let Some(shared) = subs.remove(&id) {
                shared.close();
            }
            subs.len()
        };

        tracing::info!(
            subscriber_id = id,
            subscribers = remaining,
            "subscriber removed"
        );

        if remaining == 0 {
            self.stop_pump();
        }
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// Snapshot of relay counters.
    pub fn stats(&self) -> RelayStats {
        RelayStats {
            bytes_ingested: self.counters.bytes_ingested.load(Ordering::Relaxed),
            frames_relayed: self.counters.frames_relayed.load(Ordering::Relaxed),
            frames_skipped: self.counters.frames_skipped.load(Ordering::Relaxed),
            tail_discards: self.counters.tail_discards.load(Ordering::Relaxed),
            restarts: self.counters.restarts.load(Ordering::Relaxed),
            subscribers: self.subscriber_count(),
        }
    }

    /// Spawn the pump task unless one is already running.
    fn ensure_pump(&self) {
        let Some(hub) = self.weak.upgrade() else {
            return;
        };
        let mut slot = self.pump.lock().unwrap();
        let respawn = match slot.as_ref() {
            None => true,
            Some(pump) => pump.handle.is_finished(),
        };
        if respawn {
            let cancel = CancellationToken::new();
            let handle = tokio::spawn(hub.pump_loop(cancel.clone()));
            *slot = Some(Pump { cancel, handle });
        }
    }

    fn stop_pump(&self) {
        let mut slot = self.pump.lock().unwrap();
        // A subscriber may have raced in since the caller saw zero; the
        // pipeline must keep running for it
        if self.subscriber_count() > 0 {
            return;
        }
        if let Some(pump) = slot.take() {
            pump.cancel.cancel();
        }
    }

    /// Offer one frame to every subscriber. Fire-and-forget: no await, no
    /// backpressure on the pipeline.
    fn dispatch(&self, frame: &Frame) {
        let subscriber_count;
        {
            let subs = self.subscribers.lock().unwrap();
            subscriber_count = subs.len();
            for shared in subs.values() {
                if shared.offer(frame) == OfferOutcome::Skipped {
                    self.counters.frames_skipped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let relayed = self.counters.frames_relayed.fetch_add(1, Ordering::Relaxed) + 1;
        if self.config.log_every_frames > 0 && relayed % self.config.log_every_frames == 0 {
            tracing::info!(
                frames = relayed,
                subscribers = subscriber_count,
                "relay progress"
            );
        }
    }

    async fn pump_loop(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!("decode pipeline starting");
        let mut consecutive_failures: u32 = 0;

        loop {
            if cancel.is_cancelled() || self.subscriber_count() == 0 {
                break;
            }

            match self.source.start().await {
                Ok(stream) => {
                    let relayed = self.run_stream(stream, &cancel).await;
                    if relayed > 0 {
                        consecutive_failures = 0;
                    } else {
                        consecutive_failures += 1;
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        error = %e,
                        attempt = consecutive_failures,
                        "decode pipeline start failed"
                    );
                }
            }

            if cancel.is_cancelled() || self.subscriber_count() == 0 {
                break;
            }

            if consecutive_failures >= self.config.max_consecutive_failures {
                tracing::warn!(
                    failures = consecutive_failures,
                    "source unavailable, relay idle until next subscriber"
                );
                break;
            }

            self.counters.restarts.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                delay = ?self.config.restart_delay,
                "restarting decode pipeline"
            );
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.restart_delay) => {}
            }
        }

        // Only stop the decode process when no subscribers remain; if a new
        // pump was spawned in the meantime, its start() supersedes the old
        // process instead
        if self.subscriber_count() == 0 {
            self.source.stop().await;
        }
        tracing::info!("decode pipeline stopped");
    }

    /// Pump one pipeline instance until it ends or the relay is cancelled.
    /// Returns the number of frames relayed from this instance.
    async fn run_stream(&self, stream: ByteStream, cancel: &CancellationToken) -> u64 {
        let (mut reader, exit) = stream.into_parts();
        let mut demuxer = FrameDemuxer::new();
        let mut chunk = vec![0u8; self.config.read_chunk_size];
        let mut relayed = 0u64;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return relayed,
                read = reader.read(&mut chunk) => match read {
                    Ok(0) => break,
                    Ok(n) => {
                        self.counters.bytes_ingested.fetch_add(n as u64, Ordering::Relaxed);
                        for frame in demuxer.push_chunk(&chunk[..n]) {
                            self.dispatch(&frame);
                            relayed += 1;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "decode stream read failed");
                        break;
                    }
                }
            }
        }

        self.counters
            .tail_discards
            .fetch_add(demuxer.tail_discards(), Ordering::Relaxed);

        match tokio::time::timeout(EXIT_NOTICE_TIMEOUT, exit).await {
            Ok(Ok(notice)) => {
                tracing::warn!(
                    code = ?notice.code,
                    reason = %notice.reason,
                    frames = relayed,
                    "decode process exited"
                );
            }
            _ => tracing::warn!(frames = relayed, "decode process exited without notice"),
        }

        relayed
    }
}
