//! Networking and Runtime for the PlantLink Sensor Node
//!
//! ## Overview
//!
//! This crate bridges two independent, unreliable parties: the sampling
//! side (one analog channel read on a fixed interval) and the network side
//! (a network join plus an authenticated MQTT session over TLS). The only
//! thing they share is a bounded [`queue::TelemetryQueue`].
//!
//! ```text
//! SensorSampler -> TelemetryQueue -> Publisher -> ConnectivityManager -> broker
//!                                                  |-- NetworkLink (transport)
//!                                                  +-- Session     (MQTT)
//! ```
//!
//! ## Layering
//!
//! ### Transport ([`NetworkLink`])
//! Getting the node onto a network that can reach the broker. On a
//! microcontroller this is the radio join; on a Linux host the OS owns the
//! interface, so [`link::ResolverLink`] treats "broker host resolves" as
//! joined.
//!
//! ### Session ([`Session`])
//! The broker handshake with credentials, publishing, and keepalive.
//! [`mqtt::MqttSession`] implements it on `rumqttc` with TLS and
//! certificate validation enabled.
//!
//! ### Connection state machine ([`connectivity::ConnectivityManager`])
//! Owns both layers and the single [`ConnectionState`]. Failed transitions
//! schedule a retry deadline instead of sleeping, so a backoff on the
//! network side only ever pauses the network worker.
//!
//! ## Delivery Semantics
//!
//! Best effort, at most once:
//! - queue full: the newest reading is rejected, queued readings are kept
//! - publish failure: the reading is logged and dropped, never requeued
//! - nothing survives a power cycle
//!
//! ## Execution Topologies ([`power`])
//!
//! - **Duty cycle**: sample, connect once, publish, suspend. Every wake
//!   starts from a fresh `Disconnected` manager.
//! - **Continuous**: a sampling worker and a network worker run
//!   concurrently for the device's lifetime.

pub mod clock;
pub mod config;
pub mod connectivity;
pub mod iio;
pub mod link;
pub mod power;
pub mod publisher;
pub mod queue;

#[cfg(feature = "mqtt")]
pub mod mqtt;

// Re-export common types
pub use connectivity::ConnectivityManager;
pub use plantlink_core::ConnectionState;
pub use publisher::{PublishOutcome, Publisher};
pub use queue::{QueueConsumer, QueueProducer, TelemetryQueue};

#[cfg(feature = "mqtt")]
pub use mqtt::MqttSession;

use std::time::Duration;

use thiserror::Error;

/// Network join failures (transport layer)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("Broker host did not resolve: {0}")]
    Resolve(String),

    #[error("Broker host resolved to no addresses")]
    NoAddress,

    #[error("Network join timed out")]
    Timeout,
}

/// Session failures (handshake, publish, keepalive)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Broker refused or never answered the handshake
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Send failed but the session is still usable
    #[error("Transient send failure: {0}")]
    Transient(String),

    /// The underlying connection is gone
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Not connected")]
    NotConnected,
}

impl SessionError {
    /// Whether the session must be considered dead after this error
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost(_) | Self::NotConnected)
    }
}

/// Errors surfaced while wiring the node together
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Configuration error: {0}")]
    Config(plantlink_core::ConfigError),

    #[error("Configuration file error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<plantlink_core::ConfigError> for ConnectorError {
    fn from(err: plantlink_core::ConfigError) -> Self {
        Self::Config(err)
    }
}

/// Transport layer: joining a network that can reach the broker
#[async_trait::async_trait]
pub trait NetworkLink: Send {
    /// One join attempt
    async fn join(&mut self) -> Result<(), LinkError>;

    /// Whether the last join is still believed to hold
    fn is_up(&self) -> bool;
}

/// Session layer: authenticated publish/subscribe session
#[async_trait::async_trait]
pub trait Session: Send {
    /// One handshake attempt with the configured identity and credentials
    async fn connect(&mut self) -> Result<(), SessionError>;

    /// Send one message
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionError>;

    /// Keepalive exchange; an error means the peer should be presumed gone
    async fn heartbeat(&mut self) -> Result<(), SessionError>;

    /// Drive pending outgoing traffic for up to `window`
    async fn flush(&mut self, window: Duration) -> Result<(), SessionError>;

    /// Close the session, best effort
    async fn disconnect(&mut self);
}

/// Connection statistics kept by the connectivity manager
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Total messages sent successfully
    pub messages_sent: u64,
    /// Total messages failed to send
    pub messages_failed: u64,
    /// Total payload bytes sent
    pub bytes_sent: u64,
    /// Sessions that reached `SessionUp`
    pub sessions_established: u32,
    /// Times an established session was lost
    pub sessions_lost: u32,
    /// Last error message
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_loss_errors_kill_the_session() {
        assert!(SessionError::ConnectionLost("reset".into()).is_connection_lost());
        assert!(SessionError::NotConnected.is_connection_lost());
        assert!(!SessionError::Transient("queue full".into()).is_connection_lost());
        assert!(!SessionError::Timeout.is_connection_lost());
    }

    #[test]
    fn config_errors_convert() {
        let err: ConnectorError = plantlink_core::ConfigError::Missing("broker.host").into();
        assert_eq!(err.to_string(), "Configuration error: Missing required setting: broker.host");
    }
}
