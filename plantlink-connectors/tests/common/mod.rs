//! Scripted collaborators shared by the integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use plantlink_connectors::power::LowPower;
use plantlink_connectors::{LinkError, NetworkLink, Session, SessionError};
use plantlink_core::{NodeConfig, Reading, SensorError, SensorSampler};
use tokio::time::Instant;

/// Everything the node did to its collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Join,
    Connect,
    Publish(Vec<u8>),
    Heartbeat,
    Flush,
    Disconnect,
    ArmWake(Duration),
    Suspend,
}

/// Shared, timestamped operation log
#[derive(Clone)]
pub struct Journal {
    start: Instant,
    entries: Arc<Mutex<Vec<(Duration, Op)>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn record(&self, op: Op) {
        self.entries.lock().unwrap().push((self.start.elapsed(), op));
    }

    pub fn ops(&self) -> Vec<Op> {
        self.entries.lock().unwrap().iter().map(|(_, op)| op.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Offsets (from journal creation) of every op matching `pred`
    pub fn times_of(&self, pred: impl Fn(&Op) -> bool) -> Vec<Duration> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, op)| pred(op))
            .map(|(at, _)| *at)
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.times_of(pred).len()
    }

    /// Published payloads decoded back to raw values, in publish order
    pub fn published_values(&self) -> Vec<u16> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Publish(body) => {
                    Some(plantlink_core::payload::decode(&body, 4095).unwrap().value())
                }
                _ => None,
            })
            .collect()
    }
}

pub fn is_publish(op: &Op) -> bool {
    matches!(op, Op::Publish(_))
}

pub fn config() -> NodeConfig {
    NodeConfig::new("broker.test", "node", "secret")
}

/// Link that fails `failures` joins, then succeeds
pub struct ScriptedLink {
    journal: Journal,
    failures: u32,
    up: bool,
}

impl ScriptedLink {
    pub fn new(journal: &Journal) -> Self {
        Self::failing(journal, 0)
    }

    pub fn failing(journal: &Journal, failures: u32) -> Self {
        Self {
            journal: journal.clone(),
            failures,
            up: false,
        }
    }
}

#[async_trait::async_trait]
impl NetworkLink for ScriptedLink {
    async fn join(&mut self) -> Result<(), LinkError> {
        self.journal.record(Op::Join);
        if self.failures > 0 {
            self.failures -= 1;
            return Err(LinkError::Timeout);
        }
        self.up = true;
        Ok(())
    }

    fn is_up(&self) -> bool {
        self.up
    }
}

/// Session whose handshakes follow a script, then follow `online`
///
/// While `online` is false every exchange fails: handshakes are refused,
/// heartbeats and publishes report a lost connection.
pub struct ScriptedSession {
    journal: Journal,
    handshakes: VecDeque<bool>,
    online: Arc<AtomicBool>,
    flaky: bool,
}

impl ScriptedSession {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            handshakes: VecDeque::new(),
            online: Arc::new(AtomicBool::new(true)),
            flaky: false,
        }
    }

    /// Fail the first `n` handshakes
    pub fn refusing(journal: &Journal, n: usize) -> Self {
        let mut session = Self::new(journal);
        session.handshakes = std::iter::repeat(false).take(n).collect();
        session
    }

    /// Session gated by a shared switch
    pub fn gated(journal: &Journal, online: Arc<AtomicBool>) -> Self {
        Self {
            journal: journal.clone(),
            handshakes: VecDeque::new(),
            online,
            flaky: false,
        }
    }

    /// Session the broker accepts and then drops at the first exchange
    pub fn flaky(journal: &Journal) -> Self {
        let mut session = Self::new(journal);
        session.flaky = true;
        session
    }

    fn online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn holds(&self) -> bool {
        self.online() && !self.flaky
    }
}

#[async_trait::async_trait]
impl Session for ScriptedSession {
    async fn connect(&mut self) -> Result<(), SessionError> {
        self.journal.record(Op::Connect);
        let scripted = self.handshakes.pop_front().unwrap_or(true);
        if scripted && self.online() {
            Ok(())
        } else {
            Err(SessionError::Handshake("not authorized".into()))
        }
    }

    async fn publish(&mut self, _topic: &str, payload: &[u8]) -> Result<(), SessionError> {
        if !self.holds() {
            return Err(SessionError::ConnectionLost("broker unreachable".into()));
        }
        self.journal.record(Op::Publish(payload.to_vec()));
        Ok(())
    }

    async fn heartbeat(&mut self) -> Result<(), SessionError> {
        self.journal.record(Op::Heartbeat);
        if self.holds() {
            Ok(())
        } else {
            Err(SessionError::ConnectionLost("ping timeout".into()))
        }
    }

    async fn flush(&mut self, window: Duration) -> Result<(), SessionError> {
        self.journal.record(Op::Flush);
        tokio::time::sleep(window).await;
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.journal.record(Op::Disconnect);
    }
}

/// Sampler producing 0, 1, 2, ... from a shared counter
#[derive(Clone, Default)]
pub struct CounterSampler {
    next: Arc<AtomicU16>,
}

impl CounterSampler {
    pub fn taken(&self) -> u16 {
        self.next.load(Ordering::SeqCst)
    }
}

impl SensorSampler for CounterSampler {
    fn sample(&mut self) -> Result<Reading, SensorError> {
        Reading::new(self.next.fetch_add(1, Ordering::SeqCst), 4095)
    }
}

/// Sampler whose channel never answers
pub struct DeadSampler;

impl SensorSampler for DeadSampler {
    fn sample(&mut self) -> Result<Reading, SensorError> {
        Err(SensorError::ChannelStale { polls: 8 })
    }
}

/// Low-power collaborator that records and sleeps the armed interval
pub struct RecordingLowPower {
    journal: Journal,
    armed: Duration,
}

impl RecordingLowPower {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            armed: Duration::ZERO,
        }
    }
}

#[async_trait::async_trait]
impl LowPower for RecordingLowPower {
    fn arm_wake(&mut self, after: Duration) {
        self.journal.record(Op::ArmWake(after));
        self.armed = after;
    }

    async fn suspend(&mut self) {
        self.journal.record(Op::Suspend);
        tokio::time::sleep(self.armed).await;
    }
}
