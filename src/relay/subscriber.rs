//! Per-subscriber outbound queue
//!
//! Each connected viewer owns one bounded queue. The fanout path offers a
//! frame to every queue without ever blocking: a queue holding too many
//! buffered bytes skips the frame (congestion), and a queue at its hard
//! frame capacity evicts its oldest entry. Either way the damage stays local
//! to that subscriber.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::media::Frame;

/// Flow state of a subscriber's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// Frames are being delivered.
    Ok,
    /// The queue is above the congestion threshold; new frames are skipped.
    Congested,
}

/// Result of offering a frame to one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OfferOutcome {
    /// Frame queued for delivery.
    Delivered,
    /// Frame skipped because the queue is congested.
    Skipped,
    /// The subscriber is detached.
    Closed,
}

#[derive(Debug)]
struct QueueInner {
    frames: VecDeque<Frame>,
    buffered_bytes: usize,
    flow: FlowState,
    dropped: u64,
    closed: bool,
}

/// Shared half of a subscriber queue, held by the broadcaster.
#[derive(Debug)]
pub(crate) struct SubscriberShared {
    inner: Mutex<QueueInner>,
    notify: Notify,
    threshold: usize,
    capacity: usize,
}

impl SubscriberShared {
    pub(crate) fn new(threshold: usize, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                frames: VecDeque::new(),
                buffered_bytes: 0,
                flow: FlowState::Ok,
                dropped: 0,
                closed: false,
            }),
            notify: Notify::new(),
            threshold,
            capacity,
        }
    }

    /// Offer a frame. Never blocks or awaits.
    pub(crate) fn offer(&self, frame: &Frame) -> OfferOutcome {
        let mut q = self.inner.lock().unwrap();
        if q.closed {
            return OfferOutcome::Closed;
        }

        if q.buffered_bytes >= self.threshold {
            q.flow = FlowState::Congested;
            q.dropped += 1;
            return OfferOutcome::Skipped;
        }

        q.flow = FlowState::Ok;
        q.buffered_bytes += frame.size();
        q.frames.push_back(frame.clone());
        while q.frames.len() > self.capacity {
            if let Some(old) = q.frames.pop_front() {
                q.buffered_bytes -= old.size();
                q.dropped += 1;
            }
        }
        drop(q);

        self.notify.notify_one();
        OfferOutcome::Delivered
    }

    /// Detach the subscriber; pending `recv` calls return `None` once the
    /// queue drains.
    pub(crate) fn close(&self) {
        self.inner.lock().unwrap().closed = true;
        self.notify.notify_waiters();
    }
}

/// Receiving half of one subscriber, held by the connection task.
#[derive(Debug)]
pub struct Subscriber {
    id: u64,
    shared: Arc<SubscriberShared>,
}

impl Subscriber {
    pub(crate) fn new(id: u64, shared: Arc<SubscriberShared>) -> Self {
        Self { id, shared }
    }

    /// Subscriber id assigned by the broadcaster.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current flow state.
    pub fn flow_state(&self) -> FlowState {
        self.shared.inner.lock().unwrap().flow
    }

    /// Frames skipped or evicted for this subscriber.
    pub fn dropped_frames(&self) -> u64 {
        self.shared.inner.lock().unwrap().dropped
    }

    /// Frames currently queued.
    pub fn queued_frames(&self) -> usize {
        self.shared.inner.lock().unwrap().frames.len()
    }

    /// Bytes currently queued.
    pub fn buffered_bytes(&self) -> usize {
        self.shared.inner.lock().unwrap().buffered_bytes
    }

    /// The next frame for this subscriber; `None` once detached and drained.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            // Register before the check so a close/notify in between is not
            // lost
            notified.as_mut().enable();

            {
                let mut q = self.shared.inner.lock().unwrap();
                if let Some(frame) = q.frames.pop_front() {
                    q.buffered_bytes -= frame.size();
                    return Some(frame);
                }
                if q.closed {
                    return None;
                }
            }

            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn frame(seq: u64, size: usize) -> Frame {
        Frame::new(seq, seq * size as u64, Bytes::from(vec![0u8; size]))
    }

    #[test]
    fn test_offer_and_recv() {
        tokio_test::block_on(async {
            let shared = Arc::new(SubscriberShared::new(1024, 8));
            let mut sub = Subscriber::new(1, Arc::clone(&shared));

            assert_eq!(shared.offer(&frame(0, 10)), OfferOutcome::Delivered);
            assert_eq!(shared.offer(&frame(1, 10)), OfferOutcome::Delivered);

            assert_eq!(sub.recv().await.unwrap().seq, 0);
            assert_eq!(sub.recv().await.unwrap().seq, 1);
            assert_eq!(sub.buffered_bytes(), 0);
        });
    }

    #[tokio::test]
    async fn test_congestion_skips_frames() {
        let shared = Arc::new(SubscriberShared::new(100, 8));
        let sub = Subscriber::new(1, Arc::clone(&shared));

        // 40 + 40 bytes stay below the threshold; the third offer sees 80
        // buffered and is still accepted, the fourth sees 120 and is skipped
        assert_eq!(shared.offer(&frame(0, 40)), OfferOutcome::Delivered);
        assert_eq!(shared.offer(&frame(1, 40)), OfferOutcome::Delivered);
        assert_eq!(shared.offer(&frame(2, 40)), OfferOutcome::Delivered);
        assert_eq!(shared.offer(&frame(3, 40)), OfferOutcome::Skipped);

        assert_eq!(sub.flow_state(), FlowState::Congested);
        assert_eq!(sub.dropped_frames(), 1);
        assert_eq!(sub.queued_frames(), 3);
    }

    #[tokio::test]
    async fn test_congestion_recovers_after_drain() {
        let shared = Arc::new(SubscriberShared::new(50, 8));
        let mut sub = Subscriber::new(1, Arc::clone(&shared));

        shared.offer(&frame(0, 60));
        assert_eq!(shared.offer(&frame(1, 60)), OfferOutcome::Skipped);
        assert_eq!(sub.flow_state(), FlowState::Congested);

        sub.recv().await.unwrap();
        assert_eq!(shared.offer(&frame(2, 10)), OfferOutcome::Delivered);
        assert_eq!(sub.flow_state(), FlowState::Ok);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let shared = Arc::new(SubscriberShared::new(usize::MAX, 3));
        let mut sub = Subscriber::new(1, Arc::clone(&shared));

        for seq in 0..5 {
            assert_eq!(shared.offer(&frame(seq, 8)), OfferOutcome::Delivered);
        }

        // Oldest two were evicted; delivery continues in order
        assert_eq!(sub.queued_frames(), 3);
        assert_eq!(sub.dropped_frames(), 2);
        assert_eq!(sub.recv().await.unwrap().seq, 2);
        assert_eq!(sub.recv().await.unwrap().seq, 3);
        assert_eq!(sub.recv().await.unwrap().seq, 4);
    }

    #[tokio::test]
    async fn test_close_wakes_receiver() {
        let shared = Arc::new(SubscriberShared::new(1024, 8));
        let mut sub = Subscriber::new(1, Arc::clone(&shared));

        let handle = tokio::spawn(async move { sub.recv().await });
        tokio::task::yield_now().await;

        shared.close();
        assert!(handle.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_drains_pending_frames() {
        let shared = Arc::new(SubscriberShared::new(1024, 8));
        let mut sub = Subscriber::new(1, Arc::clone(&shared));

        shared.offer(&frame(0, 10));
        shared.close();

        // Queued frame is still delivered before the detach is observed
        assert_eq!(sub.recv().await.unwrap().seq, 0);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_offer_after_close() {
        let shared = Arc::new(SubscriberShared::new(1024, 8));
        shared.close();
        assert_eq!(shared.offer(&frame(0, 10)), OfferOutcome::Closed);
    }
}
