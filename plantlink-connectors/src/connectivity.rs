//! Connection state machine
//!
//! [`ConnectivityManager`] is the single owner of the transport link, the
//! broker session and the [`ConnectionState`]. Only the network worker
//! holds it, so no transition can race.
//!
//! ```text
//! Disconnected --ensure--> TransportConnecting --join ok--> TransportUp
//!      ^                        |  ^                            |
//!      |                   join failed (retry deadline)     deadline passed
//!      |                                                        v
//!  loss / dead heartbeat                                 SessionConnecting
//!      |                                                   |        |
//!      +------------------ SessionUp <----handshake ok-----+        |
//!                                       TransportUp <--handshake failed
//! ```
//!
//! Each call to [`ConnectivityManager::ensure_connected`] advances by at
//! most one step. A failed step records a retry deadline rather than
//! sleeping; until that deadline passes, `ensure_connected` performs no
//! transport or session operation at all.

use std::time::Duration;

use log::{debug, info, warn};
use plantlink_core::constants::{KEEP_ALIVE_GRACE_DEN, KEEP_ALIVE_GRACE_NUM};
use plantlink_core::retry::RetrySchedule;
use plantlink_core::time::{TimeSource, Timestamp};
use plantlink_core::{ConnectionState, NodeConfig};

use crate::clock::TokioClock;
use crate::{ConnectionStats, NetworkLink, Session, SessionError};

/// Owns both network layers and the connection state
pub struct ConnectivityManager<L, S> {
    link: L,
    session: S,
    clock: TokioClock,
    state: ConnectionState,
    transport_retry: RetrySchedule,
    session_retry: RetrySchedule,
    keep_alive_ms: u64,
    last_exchange: Timestamp,
    stats: ConnectionStats,
}

impl<L: NetworkLink, S: Session> ConnectivityManager<L, S> {
    /// Fresh manager in `Disconnected`
    pub fn new(link: L, session: S, config: &NodeConfig) -> Self {
        Self {
            link,
            session,
            clock: TokioClock::new(),
            state: ConnectionState::Disconnected,
            transport_retry: RetrySchedule::new(config.transport_retry()),
            session_retry: RetrySchedule::new(config.session_retry()),
            keep_alive_ms: config.keep_alive().as_millis() as u64,
            last_exchange: 0,
            stats: ConnectionStats::default(),
        }
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Counters since construction
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Transport link
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Broker session
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Advance the state machine by at most one step
    ///
    /// A no-op while `SessionUp`. Before a pending retry deadline it
    /// returns the current state without touching either layer.
    pub async fn ensure_connected(&mut self) -> ConnectionState {
        let now = self.clock.now();

        match self.state {
            ConnectionState::SessionUp => {}
            ConnectionState::Disconnected => {
                self.transition(ConnectionState::TransportConnecting);
            }
            ConnectionState::TransportConnecting => {
                if self.transport_retry.is_ready(now) {
                    self.join_transport().await;
                }
            }
            ConnectionState::TransportUp => {
                if !self.link.is_up() {
                    warn!("connectivity: transport went down before the handshake");
                    self.transition(ConnectionState::TransportConnecting);
                } else if self.session_retry.is_ready(now) {
                    self.transition(ConnectionState::SessionConnecting);
                }
            }
            ConnectionState::SessionConnecting => {
                self.handshake().await;
            }
        }

        self.state
    }

    async fn join_transport(&mut self) {
        match self.link.join().await {
            Ok(()) => {
                self.transport_retry.reset();
                self.transition(ConnectionState::TransportUp);
            }
            Err(e) => {
                let delay = self.transport_retry.record_failure(self.clock.now());
                warn!(
                    "connectivity: transport join failed ({}), attempt {}, retry in {} ms",
                    e,
                    self.transport_retry.failures(),
                    delay
                );
                self.stats.last_error = Some(e.to_string());
            }
        }
    }

    async fn handshake(&mut self) {
        match self.session.connect().await {
            Ok(()) => {
                self.session_retry.reset();
                self.last_exchange = self.clock.now();
                self.stats.sessions_established += 1;
                self.transition(ConnectionState::SessionUp);
            }
            Err(e) => {
                let delay = self.session_retry.record_failure(self.clock.now());
                warn!(
                    "connectivity: session handshake failed ({}), attempt {}, retry in {} ms",
                    e,
                    self.session_retry.failures(),
                    delay
                );
                self.stats.last_error = Some(e.to_string());
                self.transition(ConnectionState::TransportUp);
            }
        }
    }

    /// Time until the pending retry deadline, zero when none is pending
    pub fn retry_delay(&self) -> Duration {
        let now = self.clock.now();
        let remaining = match self.state {
            ConnectionState::TransportConnecting => self.transport_retry.remaining(now),
            ConnectionState::TransportUp => self.session_retry.remaining(now),
            _ => 0,
        };
        Duration::from_millis(remaining)
    }

    /// Step until `SessionUp`, one failed handshake, or `timeout`
    ///
    /// Transport joins are retried on their schedule until the timeout.
    /// The session handshake is attempted once; its failure ends the
    /// attempt and is not retried here.
    pub async fn establish(&mut self, timeout: Duration) -> ConnectionState {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let before = self.state;
            let after = self.ensure_connected().await;

            if after.is_session_up() {
                return after;
            }
            if before == ConnectionState::SessionConnecting {
                debug!("connectivity: giving up after one handshake");
                return after;
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                warn!("connectivity: no session within {:?}, state {}", timeout, after);
                return after;
            }

            let wait = self.retry_delay().min(deadline - now);
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }
    }

    /// Send one payload; `false` when not sent
    ///
    /// Only valid while `SessionUp`. A transient failure leaves the state
    /// alone; a lost connection drops it to `Disconnected`.
    pub async fn publish(&mut self, payload: &[u8], topic: &str) -> bool {
        if !self.state.is_session_up() {
            return false;
        }

        match self.session.publish(topic, payload).await {
            Ok(()) => {
                self.last_exchange = self.clock.now();
                self.stats.messages_sent += 1;
                self.stats.bytes_sent += payload.len() as u64;
                true
            }
            Err(e) => {
                self.stats.messages_failed += 1;
                self.stats.last_error = Some(e.to_string());
                if e.is_connection_lost() {
                    self.drop_session(&e).await;
                } else {
                    warn!("connectivity: publish failed, session kept: {}", e);
                }
                false
            }
        }
    }

    /// Keepalive exchange; `false` when the session is (now) down
    ///
    /// The session is presumed dead if the exchange fails or if nothing
    /// succeeded within one and a half keepalive intervals.
    pub async fn heartbeat(&mut self) -> bool {
        if !self.state.is_session_up() {
            return false;
        }

        let silent_for = self.clock.since(self.last_exchange);
        let limit = self.keep_alive_ms * KEEP_ALIVE_GRACE_NUM / KEEP_ALIVE_GRACE_DEN;
        if silent_for > limit {
            let e = SessionError::ConnectionLost(format!("no exchange for {} ms", silent_for));
            self.drop_session(&e).await;
            return false;
        }

        match self.session.heartbeat().await {
            Ok(()) => {
                self.last_exchange = self.clock.now();
                true
            }
            Err(e) => {
                self.drop_session(&e).await;
                false
            }
        }
    }

    /// Drive outgoing traffic for `window` while a session is up
    pub async fn flush(&mut self, window: Duration) {
        if !self.state.is_session_up() {
            return;
        }
        if let Err(e) = self.session.flush(window).await {
            if e.is_connection_lost() {
                self.drop_session(&e).await;
            } else {
                debug!("connectivity: flush: {}", e);
            }
        }
    }

    /// Close the session if one is up and return to `Disconnected`
    pub async fn shutdown(&mut self) {
        if self.state.is_session_up() {
            self.session.disconnect().await;
            info!("connectivity: session closed");
        }
        self.transition(ConnectionState::Disconnected);
    }

    async fn drop_session(&mut self, reason: &SessionError) {
        warn!("connectivity: session lost: {}", reason);
        self.session.disconnect().await;
        self.stats.sessions_lost += 1;
        self.stats.last_error = Some(reason.to_string());
        // A lost session counts as a failed handshake: the next one waits
        // out the session delay. Only a successful handshake clears it.
        let delay = self.session_retry.record_failure(self.clock.now());
        debug!("connectivity: next handshake in {} ms", delay);
        self.transition(ConnectionState::Disconnected);
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!("connectivity: {} -> {}", self.state, next);
            if next.is_session_up() {
                info!("connectivity: session up");
            }
            self.state = next;
        }
    }
}
