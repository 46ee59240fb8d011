//! Queue drain for the network worker
//!
//! One [`Publisher::run_once`] is one pass of the network worker:
//! connect step, keepalive, one bounded dequeue, one publish. A reading
//! whose publish fails is logged and dropped; it is never put back.

use std::time::Duration;

use log::{info, warn};
use plantlink_core::{payload, ConnectionState, NodeConfig, Reading};
use tokio::time::Instant;

use crate::connectivity::ConnectivityManager;
use crate::queue::QueueConsumer;
use crate::{NetworkLink, Session};

/// How often the run loop logs queue and connection counters
const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Result of one publisher pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// No session yet; the queue was not touched
    NotConnected(ConnectionState),
    /// Session up but nothing arrived before the dequeue timeout
    Idle,
    /// Reading handed to the session
    Published(Reading),
    /// Reading consumed but not sent
    Dropped(Reading),
}

/// Drains the queue into the broker session
pub struct Publisher<L, S> {
    manager: ConnectivityManager<L, S>,
    queue: QueueConsumer,
    topic: String,
    dequeue_timeout: Duration,
}

impl<L: NetworkLink, S: Session> Publisher<L, S> {
    /// Publisher for the configured topic
    pub fn new(manager: ConnectivityManager<L, S>, queue: QueueConsumer, config: &NodeConfig) -> Self {
        Self {
            manager,
            queue,
            topic: config.session.topic.clone(),
            dequeue_timeout: config.dequeue_timeout(),
        }
    }

    /// Connectivity manager
    pub fn manager(&self) -> &ConnectivityManager<L, S> {
        &self.manager
    }

    /// Consuming end of the queue
    pub fn queue(&self) -> &QueueConsumer {
        &self.queue
    }

    /// One pass: ensure connected, heartbeat, dequeue, publish
    pub async fn run_once(&mut self) -> PublishOutcome {
        let state = self.manager.ensure_connected().await;
        if !state.is_session_up() {
            return PublishOutcome::NotConnected(state);
        }

        if !self.manager.heartbeat().await {
            return PublishOutcome::NotConnected(self.manager.state());
        }

        let Some(reading) = self.queue.dequeue(self.dequeue_timeout).await else {
            return PublishOutcome::Idle;
        };

        let body = match payload::encode(reading) {
            Ok(body) => body,
            Err(e) => {
                warn!("publisher: dropping reading {}: {}", reading, e);
                return PublishOutcome::Dropped(reading);
            }
        };

        if self.manager.publish(&body, &self.topic).await {
            PublishOutcome::Published(reading)
        } else {
            warn!("publisher: publish failed, reading {} dropped", reading);
            PublishOutcome::Dropped(reading)
        }
    }

    /// Network worker loop; never returns
    ///
    /// While not connected the worker sleeps until the pending retry
    /// deadline. Only this worker waits; the producer keeps sampling.
    pub async fn run(mut self) {
        let mut next_report = Instant::now() + STATS_INTERVAL;

        loop {
            if let PublishOutcome::NotConnected(_) = self.run_once().await {
                let delay = self.manager.retry_delay();
                if delay.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(delay).await;
                }
            }

            if Instant::now() >= next_report {
                self.report();
                next_report += STATS_INTERVAL;
            }
        }
    }

    fn report(&self) {
        let queue = self.queue.stats().snapshot();
        let conn = self.manager.stats();
        info!(
            "publisher: state {}, queue {}/{} (dropped {}, max {}), sent {}, failed {}, sessions {}/{} lost",
            self.manager.state(),
            queue.depth,
            queue.capacity,
            queue.dropped,
            queue.max_depth,
            conn.messages_sent,
            conn.messages_failed,
            conn.sessions_established,
            conn.sessions_lost
        );
    }
}
