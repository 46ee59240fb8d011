//! Reference Values for the Sensor Node
//!
//! Defaults used when the configuration file leaves a setting out. Each
//! value matches the deployed node: an ESP32 class board reading a
//! capacitive soil probe on a 12-bit ADC, publishing to a hosted MQTT
//! broker over TLS.

// ===== SENSOR =====

/// Largest value a 12-bit converter can produce.
pub const ADC_12BIT_MAX: u16 = 4095;

/// Polls of a non-blocking converter before the channel is declared stale.
///
/// A single conversion completes in tens of microseconds; a converter that
/// still reports "busy" after this many polls is wedged.
pub const ADC_POLL_BUDGET: u8 = 8;

// ===== QUEUE & PAYLOAD =====

/// Default telemetry queue capacity (readings).
///
/// At a 5 s sampling interval this covers 100 s of network outage.
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;

/// Upper bound accepted for a configured queue capacity.
pub const MAX_QUEUE_CAPACITY: usize = 256;

/// Fixed wire payload buffer size in bytes.
///
/// `{"reading":65535}` is 17 bytes, so every `u16` reading fits.
pub const PAYLOAD_CAPACITY: usize = 32;

// ===== BROKER & SESSION =====

/// MQTT over TLS.
pub const DEFAULT_BROKER_PORT: u16 = 8883;

/// Session identity used by the deployed node.
pub const DEFAULT_CLIENT_ID: &str = "ESP32_Plant_Project";

/// Topic the subscriber listens on.
pub const DEFAULT_TOPIC: &str = "plantData";

/// Session keepalive in seconds (matches the subscriber side).
pub const DEFAULT_KEEP_ALIVE_SECS: u16 = 60;

// ===== TIMING (milliseconds) =====

/// Continuous mode sampling period.
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 5_000;

/// Duty-cycle suspension between wakes.
pub const DEFAULT_SLEEP_INTERVAL_MS: u64 = 10_000;

/// Delay between network join attempts.
pub const DEFAULT_TRANSPORT_RETRY_MS: u64 = 500;

/// Delay between session handshake attempts.
pub const DEFAULT_SESSION_RETRY_MS: u64 = 5_000;

/// Bound on a single duty-cycle connect (join + handshake).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

/// Bound on one publisher dequeue wait.
pub const DEFAULT_DEQUEUE_TIMEOUT_MS: u64 = 1_000;

/// Session drive window after the last publish, before suspending.
pub const DEFAULT_FLUSH_WINDOW_MS: u64 = 200;

/// Multiplier on keepalive after which a silent session is presumed dead.
pub const KEEP_ALIVE_GRACE_NUM: u64 = 3;
/// Divisor paired with [`KEEP_ALIVE_GRACE_NUM`] (3/2 = 1.5x keepalive).
pub const KEEP_ALIVE_GRACE_DEN: u64 = 2;
