//! Bounded Telemetry Queue Between the Sampling and Network Workers
//!
//! ## Overview
//!
//! The queue is the only state shared between the sampling worker and the
//! network worker. It is a fixed-capacity FIFO of [`Reading`]s built on a
//! bounded `tokio::sync::mpsc` channel:
//!
//! ```text
//! Sampling worker                          Network worker
//!      |                                        |
//!  enqueue() ---> [ r0 | r1 | ... | rN-1 ] ---> dequeue(timeout)
//!      |                                        |
//!  never blocks                          blocks this worker only,
//!  (false = rejected)                    up to `timeout`
//! ```
//!
//! ## Single Producer, Single Consumer
//!
//! [`TelemetryQueue::split`] hands out exactly one [`QueueProducer`] and one
//! [`QueueConsumer`]. Neither is `Clone`, so the one-producer/one-consumer
//! architecture is enforced by the type system rather than by convention.
//!
//! ## Full Queue Policy: Reject Newest
//!
//! When the queue is full, `enqueue` returns `false` and the new reading is
//! dropped. Readings already queued are never evicted. After a long outage
//! the queue therefore holds the *earliest* readings of the outage, and
//! they are published in order once the session comes back. The producer
//! never waits on the consumer.
//!
//! No time-based expiry is applied: a reading leaves the queue only by
//! being dequeued.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use plantlink_core::Reading;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Queue statistics, shared by both ends
///
/// Counters use relaxed ordering; they never gate correctness.
#[derive(Debug)]
pub struct QueueStats {
    capacity: usize,
    enqueued: AtomicU32,
    dequeued: AtomicU32,
    dropped: AtomicU32,
    max_depth: AtomicU32,
}

/// Point-in-time copy of [`QueueStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// Fixed capacity
    pub capacity: usize,
    /// Readings currently queued
    pub depth: usize,
    /// Readings accepted
    pub enqueued: u32,
    /// Readings handed to the consumer
    pub dequeued: u32,
    /// Readings rejected because the queue was full
    pub dropped: u32,
    /// Deepest the queue has been
    pub max_depth: u32,
}

impl QueueStats {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            enqueued: AtomicU32::new(0),
            dequeued: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            max_depth: AtomicU32::new(0),
        }
    }

    /// Readings currently queued
    pub fn depth(&self) -> usize {
        let enqueued = self.enqueued.load(Ordering::Relaxed);
        let dequeued = self.dequeued.load(Ordering::Relaxed);
        enqueued.saturating_sub(dequeued) as usize
    }

    /// Readings rejected so far
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Copy all counters
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            capacity: self.capacity,
            depth: self.depth(),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            dropped: self.dropped(),
            max_depth: self.max_depth.load(Ordering::Relaxed),
        }
    }

    fn update_max_depth(&self, current: u32) {
        let mut max = self.max_depth.load(Ordering::Relaxed);
        while current > max {
            match self.max_depth.compare_exchange_weak(
                max,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => max = actual,
            }
        }
    }
}

/// Fixed-capacity FIFO of readings
///
/// Usable directly from a single context (duty-cycle mode, tests) or split
/// into its two ends for the continuous topology.
pub struct TelemetryQueue {
    producer: QueueProducer,
    consumer: QueueConsumer,
}

impl TelemetryQueue {
    /// Empty queue holding at most `capacity` readings
    ///
    /// Capacity is clamped to at least one; the configuration layer rejects
    /// zero before it gets here.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let stats = Arc::new(QueueStats::new(capacity));

        Self {
            producer: QueueProducer { tx, stats: Arc::clone(&stats) },
            consumer: QueueConsumer { rx, stats },
        }
    }

    /// Separate the two ends for two workers
    pub fn split(self) -> (QueueProducer, QueueConsumer) {
        (self.producer, self.consumer)
    }

    /// See [`QueueProducer::enqueue`]
    pub fn enqueue(&self, reading: Reading) -> bool {
        self.producer.enqueue(reading)
    }

    /// See [`QueueConsumer::dequeue`]
    pub async fn dequeue(&mut self, timeout: Duration) -> Option<Reading> {
        self.consumer.dequeue(timeout).await
    }

    /// See [`QueueConsumer::try_dequeue`]
    pub fn try_dequeue(&mut self) -> Option<Reading> {
        self.consumer.try_dequeue()
    }

    /// Readings currently queued
    pub fn len(&self) -> usize {
        self.producer.stats.depth()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fixed capacity
    pub fn capacity(&self) -> usize {
        self.producer.stats.capacity
    }

    /// Shared statistics
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.producer.stats)
    }
}

/// Sampling side of the queue
pub struct QueueProducer {
    tx: mpsc::Sender<Reading>,
    stats: Arc<QueueStats>,
}

impl QueueProducer {
    /// Offer a reading without blocking
    ///
    /// Returns `false` when the queue is full; the reading is dropped and
    /// the queued readings are left untouched.
    pub fn enqueue(&self, reading: Reading) -> bool {
        match self.tx.try_send(reading) {
            Ok(()) => {
                let enqueued = self.stats.enqueued.fetch_add(1, Ordering::Relaxed) + 1;
                let dequeued = self.stats.dequeued.load(Ordering::Relaxed);
                self.stats.update_max_depth(enqueued.saturating_sub(dequeued));
                true
            }
            Err(TrySendError::Full(rejected)) => {
                let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    "queue: full ({} readings), dropping newest reading {} (dropped so far: {})",
                    self.stats.capacity, rejected, dropped
                );
                false
            }
            Err(TrySendError::Closed(rejected)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("queue: consumer gone, dropping reading {}", rejected);
                false
            }
        }
    }

    /// Shared statistics
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

/// Network side of the queue
pub struct QueueConsumer {
    rx: mpsc::Receiver<Reading>,
    stats: Arc<QueueStats>,
}

impl QueueConsumer {
    /// Wait up to `timeout` for the oldest reading
    ///
    /// Only the calling worker is suspended. Returns `None` on timeout.
    pub async fn dequeue(&mut self, timeout: Duration) -> Option<Reading> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(reading)) => {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Some(reading)
            }
            Ok(None) => {
                // Producer gone and queue drained; keep the timeout contract
                // so a polling caller does not spin.
                debug!("queue: producer closed, nothing left to dequeue");
                tokio::time::sleep(timeout).await;
                None
            }
            Err(_elapsed) => None,
        }
    }

    /// Take the oldest reading if one is queued
    pub fn try_dequeue(&mut self) -> Option<Reading> {
        match self.rx.try_recv() {
            Ok(reading) => {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Some(reading)
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Readings currently queued
    pub fn len(&self) -> usize {
        self.stats.depth()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shared statistics
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}
