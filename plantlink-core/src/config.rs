//! Node configuration model
//!
//! Loaded once at startup (see `plantlink_connectors::config` for the file
//! and environment loader) and never mutated afterwards. Every component
//! receives the pieces it needs by reference or by copy.
//!
//! Only the broker host and session credentials are mandatory; everything
//! else defaults to the values in [`crate::constants`].

use alloc::string::{String, ToString};
use core::time::Duration;

use serde::Deserialize;

use crate::constants::*;
use crate::errors::ConfigError;
use crate::payload;
use crate::reading::Reading;
use crate::retry::RetryPolicy;

/// Execution topology chosen at start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerMode {
    /// sample -> connect -> publish -> suspend, once per wake
    #[default]
    DutyCycle,
    /// sampling worker and network worker running concurrently
    Continuous,
}

/// Complete node configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeConfig {
    /// Execution topology
    #[serde(default)]
    pub mode: PowerMode,
    /// Network join settings
    #[serde(default)]
    pub network: NetworkConfig,
    /// Broker endpoint
    pub broker: BrokerConfig,
    /// Session identity and credentials
    pub session: SessionConfig,
    /// Intervals and delays
    #[serde(default)]
    pub timing: TimingConfig,
    /// Analog channel properties
    #[serde(default)]
    pub sensor: SensorConfig,
    /// Telemetry queue capacity in readings
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Network join credentials
///
/// On a microcontroller these drive the radio join. On a Linux host the OS
/// owns the join and both fields may be left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NetworkConfig {
    /// Network name
    #[serde(default)]
    pub ssid: String,
    /// Network secret
    #[serde(default)]
    pub passphrase: String,
}

/// Broker endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BrokerConfig {
    /// Broker host name
    pub host: String,
    /// TLS port
    #[serde(default = "default_port")]
    pub port: u16,
    /// PEM bundle of trusted CAs; platform roots when absent
    #[serde(default)]
    pub ca_file: Option<String>,
}

/// Session identity, credentials and topic
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Client identity presented to the broker
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Session user
    #[serde(default)]
    pub username: String,
    /// Session password
    #[serde(default)]
    pub password: String,
    /// Topic every reading is published to
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Keepalive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u16,
}

/// Intervals and delays, all in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Continuous mode sampling period
    pub sample_interval_ms: u64,
    /// Duty-cycle suspension length
    pub sleep_interval_ms: u64,
    /// Delay after a failed network join
    pub transport_retry_ms: u64,
    /// Delay after a failed session handshake
    pub session_retry_ms: u64,
    /// Bound on one duty-cycle connect
    pub connect_timeout_ms: u64,
    /// Bound on one publisher dequeue wait
    pub dequeue_timeout_ms: u64,
    /// Session drive window after publishing, before suspending
    pub flush_window_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            sleep_interval_ms: DEFAULT_SLEEP_INTERVAL_MS,
            transport_retry_ms: DEFAULT_TRANSPORT_RETRY_MS,
            session_retry_ms: DEFAULT_SESSION_RETRY_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            dequeue_timeout_ms: DEFAULT_DEQUEUE_TIMEOUT_MS,
            flush_window_ms: DEFAULT_FLUSH_WINDOW_MS,
        }
    }
}

/// Analog channel properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Largest legal raw value
    pub max_value: u16,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self { max_value: ADC_12BIT_MAX }
    }
}

fn default_port() -> u16 {
    DEFAULT_BROKER_PORT
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

fn default_keep_alive() -> u16 {
    DEFAULT_KEEP_ALIVE_SECS
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl NodeConfig {
    /// Configuration with reference defaults for everything but the
    /// broker host and session credentials
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        Self {
            mode: PowerMode::default(),
            network: NetworkConfig::default(),
            broker: BrokerConfig {
                host: host.to_string(),
                port: DEFAULT_BROKER_PORT,
                ca_file: None,
            },
            session: SessionConfig {
                client_id: default_client_id(),
                username: username.to_string(),
                password: password.to_string(),
                topic: default_topic(),
                keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            },
            timing: TimingConfig::default(),
            sensor: SensorConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Check every field the node depends on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.host.trim().is_empty() {
            return Err(ConfigError::Missing("broker.host"));
        }
        if self.broker.port == 0 {
            return Err(ConfigError::Invalid { field: "broker.port", reason: "must be non-zero" });
        }
        if self.session.client_id.is_empty() {
            return Err(ConfigError::Missing("session.client_id"));
        }
        if self.session.username.is_empty() {
            return Err(ConfigError::Missing("session.username"));
        }
        if self.session.password.is_empty() {
            return Err(ConfigError::Missing("session.password"));
        }
        if self.session.topic.is_empty() {
            return Err(ConfigError::Missing("session.topic"));
        }
        if self.session.topic.contains(['+', '#']) {
            return Err(ConfigError::Invalid {
                field: "session.topic",
                reason: "wildcards are not allowed in a publish topic",
            });
        }
        if self.session.keep_alive_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "session.keep_alive_secs",
                reason: "must be non-zero",
            });
        }

        let timing = &self.timing;
        for (field, value) in [
            ("timing.sample_interval_ms", timing.sample_interval_ms),
            ("timing.sleep_interval_ms", timing.sleep_interval_ms),
            ("timing.connect_timeout_ms", timing.connect_timeout_ms),
            ("timing.dequeue_timeout_ms", timing.dequeue_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid { field, reason: "must be non-zero" });
            }
        }

        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::Invalid {
                field: "queue_capacity",
                reason: "must be between 1 and 256",
            });
        }

        let widest = Reading::new(self.sensor.max_value, self.sensor.max_value)
            .map_err(|_| ConfigError::Invalid { field: "sensor.max_value", reason: "unrepresentable" })?;
        if payload::encode(widest).is_err() {
            return Err(ConfigError::Invalid {
                field: "sensor.max_value",
                reason: "payload would overflow the wire buffer",
            });
        }

        Ok(())
    }

    /// Continuous mode sampling period
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.timing.sample_interval_ms)
    }

    /// Duty-cycle suspension length
    pub fn sleep_interval(&self) -> Duration {
        Duration::from_millis(self.timing.sleep_interval_ms)
    }

    /// Bound on one duty-cycle connect
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timing.connect_timeout_ms)
    }

    /// Bound on one publisher dequeue wait
    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.timing.dequeue_timeout_ms)
    }

    /// Session drive window before suspending
    pub fn flush_window(&self) -> Duration {
        Duration::from_millis(self.timing.flush_window_ms)
    }

    /// Keepalive interval
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(u64::from(self.session.keep_alive_secs))
    }

    /// Delay policy for failed network joins
    pub fn transport_retry(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.timing.transport_retry_ms)
    }

    /// Delay policy for failed session handshakes
    pub fn session_retry(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.timing.session_retry_ms)
    }
}
