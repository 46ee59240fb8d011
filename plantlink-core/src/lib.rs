//! Core data model for the PlantLink sensor node
//!
//! Everything in this crate is pure logic with no I/O, so it runs unchanged
//! on a microcontroller and on a Linux host:
//!
//! - [`reading`]: the single scalar measurement produced per sampling interval
//! - [`sampler`]: turning a raw analog channel into validated readings
//! - [`payload`]: the fixed-size JSON wire payload (`{"reading":N}`)
//! - [`connection`]: the transport/session connection states
//! - [`retry`]: delay bookkeeping for the reconnect state machine
//! - [`config`]: the immutable node configuration model
//! - [`time`]: millisecond time source abstraction
//!
//! Key constraints:
//! - Payload never exceeds 32 bytes
//! - No heap allocation on the sampling path
//! - Errors are `Copy` and carry no owned data
//!
//! ```
//! use plantlink_core::{payload, Reading};
//!
//! let reading = Reading::new(2048, 4095).unwrap();
//! let wire = payload::encode(reading).unwrap();
//! assert_eq!(wire.as_slice(), br#"{"reading":2048}"#);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

pub mod config;
pub mod connection;
pub mod constants;
pub mod errors;
pub mod payload;
pub mod reading;
pub mod retry;
pub mod sampler;
pub mod time;

// Public API
pub use config::{NodeConfig, PowerMode};
pub use connection::ConnectionState;
pub use errors::{ConfigError, PayloadError, SensorError};
pub use payload::Payload;
pub use reading::Reading;
pub use retry::{RetryPolicy, RetrySchedule};
pub use sampler::{AdcSampler, AnalogChannel, SensorSampler};
pub use time::{TimeSource, Timestamp};

/// Crate version, embedded in the startup banner
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
