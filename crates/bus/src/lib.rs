//! Low-latency frame bus for per-session gesture processing.
//!
//! Clients push frames at their own capture rate while detection runs at model
//! speed. The queue is bounded and keeps the newest frames: a push into a full
//! queue evicts the oldest entry, so a slow model never builds up lag.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use gestura_intake::FrameMessage;
use tokio::sync::Notify;

/// Default number of frames buffered per session.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4;

/// Frame with arrival time and sequence number for ordering.
#[derive(Debug, Clone)]
pub struct FramePacket {
    /// Monotonic per-session sequence number.
    pub seq: u64,
    pub received_at: Instant,
    pub message: FrameMessage,
}

impl FramePacket {
    pub fn new(seq: u64, message: FrameMessage) -> Self {
        Self {
            seq,
            received_at: Instant::now(),
            message,
        }
    }

    /// Time spent waiting in the queue so far.
    pub fn queued_for(&self) -> Duration {
        self.received_at.elapsed()
    }
}

/// Configuration for a frame queue.
#[derive(Debug, Clone)]
pub struct FrameQueueConfig {
    /// Frames held before the oldest is evicted.
    pub capacity: usize,
}

impl Default for FrameQueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl FrameQueueConfig {
    fn effective_capacity(&self) -> usize {
        self.capacity.max(1)
    }
}

struct Shared {
    frames: Mutex<VecDeque<FramePacket>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
    seq_counter: AtomicU64,
    dropped_frames: AtomicU64,
    status: Arc<PipelineStatus>,
}

impl Shared {
    fn pop(&self) -> Option<FramePacket> {
        self.frames.lock().ok()?.pop_front()
    }
}

/// Sender half of a frame queue.
#[derive(Clone)]
pub struct FrameSender {
    shared: Arc<Shared>,
}

impl FrameSender {
    /// Enqueue a frame, evicting the oldest if the queue is full.
    ///
    /// Returns false only when the queue is closed.
    pub fn send(&self, message: FrameMessage) -> bool {
        if self.shared.closed.load(Ordering::Acquire) {
            tracing::debug!("Frame queue closed");
            return false;
        }

        let seq = self.shared.seq_counter.fetch_add(1, Ordering::Relaxed);
        let packet = FramePacket::new(seq, message);
        self.shared.status.increment_frames_received();

        let evicted = {
            let Ok(mut frames) = self.shared.frames.lock() else {
                return false;
            };
            let evicted = if frames.len() >= self.shared.capacity {
                frames.pop_front()
            } else {
                None
            };
            frames.push_back(packet);
            evicted
        };

        if let Some(old) = evicted {
            let dropped = self.shared.dropped_frames.fetch_add(1, Ordering::Relaxed) + 1;
            self.shared.status.increment_frames_dropped();
            // Rate-limit logging: only log every 10th drop
            if dropped % 10 == 1 {
                tracing::warn!(dropped, seq = old.seq, "Frame queue full, dropping oldest frames");
            }
        }

        self.shared.notify.notify_one();
        true
    }

    /// Close the queue. Buffered frames are still delivered, then `recv` returns `None`.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Get the number of frames evicted from this queue.
    pub fn dropped_frames(&self) -> u64 {
        self.shared.dropped_frames.load(Ordering::Relaxed)
    }

    /// Get the current sequence number.
    pub fn current_seq(&self) -> u64 {
        self.shared.seq_counter.load(Ordering::Relaxed)
    }

    /// Frames currently buffered.
    pub fn len(&self) -> usize {
        self.shared.frames.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receiver half of a frame queue.
pub struct FrameReceiver {
    shared: Arc<Shared>,
    last_seq: Option<u64>,
    gaps_detected: u64,
}

impl FrameReceiver {
    /// Receive the next frame in arrival order.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<FramePacket> {
        loop {
            if let Some(packet) = self.shared.pop() {
                self.track(&packet);
                return Some(packet);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                return None;
            }
            self.shared.notify.notified().await;
        }
    }

    /// Try to receive a frame without waiting.
    pub fn try_recv(&mut self) -> Option<FramePacket> {
        let packet = self.shared.pop()?;
        self.track(&packet);
        Some(packet)
    }

    /// Get the number of frames skipped between consecutive receives.
    pub fn gaps_detected(&self) -> u64 {
        self.gaps_detected
    }

    fn track(&mut self, packet: &FramePacket) {
        if let Some(last) = self.last_seq {
            if packet.seq > last + 1 {
                let gap = packet.seq - last - 1;
                self.gaps_detected += gap;
                tracing::debug!(gap, from = last, to = packet.seq, "Frame gap detected");
            }
        }
        self.last_seq = Some(packet.seq);
    }
}

/// Bounded drop-oldest frame queue for one session.
pub struct FrameQueue {
    sender: FrameSender,
    receiver: Option<FrameReceiver>,
}

impl FrameQueue {
    pub fn new(config: FrameQueueConfig) -> Self {
        Self::with_status(config, Arc::new(PipelineStatus::new()))
    }

    /// Create a queue that reports into a shared metrics block.
    pub fn with_status(config: FrameQueueConfig, status: Arc<PipelineStatus>) -> Self {
        let capacity = config.effective_capacity();
        tracing::debug!(capacity, "Created frame queue");

        let shared = Arc::new(Shared {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            seq_counter: AtomicU64::new(0),
            dropped_frames: AtomicU64::new(0),
            status,
        });

        Self {
            sender: FrameSender {
                shared: Arc::clone(&shared),
            },
            receiver: Some(FrameReceiver {
                shared,
                last_seq: None,
                gaps_detected: 0,
            }),
        }
    }

    /// Get a clone of the sender.
    pub fn sender(&self) -> FrameSender {
        self.sender.clone()
    }

    /// Take the receiver (can only be called once).
    pub fn take_receiver(&mut self) -> Option<FrameReceiver> {
        self.receiver.take()
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new(FrameQueueConfig::default())
    }
}

/// Real-time pipeline metrics with atomic fields for lock-free updates.
///
/// Shared via `Arc<PipelineStatus>` between the transport, the frame queues
/// and the detection workers.
#[derive(Debug, Default)]
pub struct PipelineStatus {
    frames_received: AtomicU64,
    /// Evicted from a full queue before processing.
    frames_dropped: AtomicU64,
    /// Rejected by intake (missing, malformed or undecodable).
    frames_rejected: AtomicU64,
    frames_processed: AtomicU64,
    frames_without_hand: AtomicU64,
    detection_failures: AtomicU64,
    gestures_emitted: AtomicU64,
    /// Classified but held back by a cooldown or latch.
    gestures_suppressed: AtomicU64,
    /// Duration of the most recent landmark detection.
    last_detection_ms: AtomicU64,
}

impl PipelineStatus {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Getters ---

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn frames_rejected(&self) -> u64 {
        self.frames_rejected.load(Ordering::Relaxed)
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn frames_without_hand(&self) -> u64 {
        self.frames_without_hand.load(Ordering::Relaxed)
    }

    pub fn detection_failures(&self) -> u64 {
        self.detection_failures.load(Ordering::Relaxed)
    }

    pub fn gestures_emitted(&self) -> u64 {
        self.gestures_emitted.load(Ordering::Relaxed)
    }

    pub fn gestures_suppressed(&self) -> u64 {
        self.gestures_suppressed.load(Ordering::Relaxed)
    }

    pub fn last_detection_ms(&self) -> u64 {
        self.last_detection_ms.load(Ordering::Relaxed)
    }

    // --- Updates ---

    pub fn increment_frames_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_frames_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_frames_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the new total, used to pace periodic logging.
    pub fn increment_frames_processed(&self) -> u64 {
        self.frames_processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn increment_frames_without_hand(&self) {
        self.frames_without_hand.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_detection_failures(&self) {
        self.detection_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_gestures_emitted(&self, n: u64) {
        self.gestures_emitted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_gestures_suppressed(&self, n: u64) {
        self.gestures_suppressed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_last_detection_ms(&self, value: u64) {
        self.last_detection_ms.store(value, Ordering::Relaxed);
    }

    /// Create a snapshot for serialization/display.
    pub fn snapshot(&self) -> PipelineStatusSnapshot {
        PipelineStatusSnapshot {
            frames_received: self.frames_received(),
            frames_dropped: self.frames_dropped(),
            frames_rejected: self.frames_rejected(),
            frames_processed: self.frames_processed(),
            frames_without_hand: self.frames_without_hand(),
            detection_failures: self.detection_failures(),
            gestures_emitted: self.gestures_emitted(),
            gestures_suppressed: self.gestures_suppressed(),
            last_detection_ms: self.last_detection_ms(),
        }
    }
}

/// Snapshot of pipeline status for serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct PipelineStatusSnapshot {
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub frames_rejected: u64,
    pub frames_processed: u64,
    pub frames_without_hand: u64,
    pub detection_failures: u64,
    pub gestures_emitted: u64,
    pub gestures_suppressed: u64,
    pub last_detection_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: &str) -> FrameMessage {
        FrameMessage::new(tag)
    }

    #[test]
    fn test_capacity_is_at_least_one() {
        let config = FrameQueueConfig { capacity: 0 };
        assert_eq!(config.effective_capacity(), 1);
    }

    #[tokio::test]
    async fn test_send_recv() {
        let mut queue = FrameQueue::default();
        let sender = queue.sender();
        let mut receiver = queue.take_receiver().unwrap();

        assert!(sender.send(frame("a")));

        let packet = receiver.recv().await.unwrap();
        assert_eq!(packet.seq, 0);
        assert_eq!(packet.message.image.as_deref(), Some("a"));
        assert!(packet.queued_for() < Duration::from_secs(5));
    }

    #[test]
    fn test_take_receiver_once() {
        let mut queue = FrameQueue::default();
        assert!(queue.take_receiver().is_some());
        assert!(queue.take_receiver().is_none());
    }

    #[tokio::test]
    async fn test_full_queue_drops_oldest() {
        let status = Arc::new(PipelineStatus::new());
        let mut queue = FrameQueue::with_status(FrameQueueConfig { capacity: 2 }, status.clone());
        let sender = queue.sender();
        let mut receiver = queue.take_receiver().unwrap();

        for tag in ["1", "2", "3", "4", "5"] {
            sender.send(frame(tag));
        }

        assert_eq!(sender.len(), 2);
        assert_eq!(sender.dropped_frames(), 3);
        assert_eq!(status.frames_received(), 5);
        assert_eq!(status.frames_dropped(), 3);

        let first = receiver.recv().await.unwrap();
        let second = receiver.recv().await.unwrap();
        assert_eq!(first.message.image.as_deref(), Some("4"));
        assert_eq!(second.message.image.as_deref(), Some("5"));
        assert_eq!(first.seq, 3);
        assert_eq!(second.seq, 4);
    }

    #[tokio::test]
    async fn test_sequence_monotonicity() {
        let mut queue = FrameQueue::new(FrameQueueConfig { capacity: 16 });
        let sender = queue.sender();
        let mut receiver = queue.take_receiver().unwrap();

        for i in 0..10 {
            sender.send(frame(&i.to_string()));
        }

        let mut last_seq = None;
        for _ in 0..10 {
            let packet = receiver.recv().await.unwrap();
            if let Some(last) = last_seq {
                assert!(packet.seq > last, "Sequence must be monotonic");
            }
            last_seq = Some(packet.seq);
        }
        assert_eq!(receiver.gaps_detected(), 0);
    }

    #[tokio::test]
    async fn test_gap_detection_after_eviction() {
        let mut queue = FrameQueue::new(FrameQueueConfig { capacity: 1 });
        let sender = queue.sender();
        let mut receiver = queue.take_receiver().unwrap();

        sender.send(frame("0"));
        let _ = receiver.recv().await.unwrap();

        sender.send(frame("1"));
        sender.send(frame("2"));
        sender.send(frame("3"));
        let packet = receiver.recv().await.unwrap();
        assert_eq!(packet.seq, 3);
        assert_eq!(receiver.gaps_detected(), 2);
    }

    #[tokio::test]
    async fn test_recv_waits_for_send() {
        let mut queue = FrameQueue::default();
        let sender = queue.sender();
        let mut receiver = queue.take_receiver().unwrap();

        let handle = tokio::spawn(async move { receiver.recv().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        sender.send(frame("late"));

        let packet = handle.await.unwrap().unwrap();
        assert_eq!(packet.message.image.as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let mut queue = FrameQueue::default();
        let sender = queue.sender();
        let mut receiver = queue.take_receiver().unwrap();

        sender.send(frame("last"));
        sender.close();
        assert!(!sender.send(frame("ignored")));

        assert!(receiver.recv().await.is_some());
        assert!(receiver.recv().await.is_none());
    }

    #[test]
    fn test_try_recv_empty() {
        let mut queue = FrameQueue::default();
        let mut receiver = queue.take_receiver().unwrap();
        assert!(receiver.try_recv().is_none());
    }

    #[test]
    fn test_status_snapshot() {
        let status = PipelineStatus::new();
        status.increment_frames_rejected();
        assert_eq!(status.increment_frames_processed(), 1);
        status.add_gestures_emitted(2);
        status.add_gestures_suppressed(1);
        status.set_last_detection_ms(12);

        let snapshot = status.snapshot();
        assert_eq!(snapshot.frames_rejected, 1);
        assert_eq!(snapshot.frames_processed, 1);
        assert_eq!(snapshot.gestures_emitted, 2);
        assert_eq!(snapshot.gestures_suppressed, 1);
        assert_eq!(snapshot.last_detection_ms, 12);
    }
}
