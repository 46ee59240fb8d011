//! Error Types for the Sampling and Encoding Path
//!
//! ## Design Philosophy
//!
//! These errors travel through the sampling and publishing hot path of a
//! battery-powered node, so they follow the same rules as everything else
//! in this crate:
//!
//! 1. **No Heap Allocation**: error data is inline, messages are `&'static str`.
//! 2. **Copy Semantics**: errors are returned by value and logged, never boxed.
//! 3. **Never Fatal**: nothing here stops the node. The worst outcome of any
//!    of these errors is that one reading is not published.
//!
//! ## Error Categories
//!
//! ### Sensor faults ([`SensorError`])
//! - `OutOfRange`: the channel returned a value above the converter's resolution
//! - `ChannelStale`: the converter never completed a conversion within its poll budget
//! - `ChannelFault`: the converter reported a hardware error
//!
//! ### Payload faults ([`PayloadError`])
//! - `Overflow`: encoded form does not fit the fixed payload buffer
//! - `Encode` / `Decode`: JSON serialization failed
//!
//! ### Configuration faults ([`ConfigError`])
//! - `Missing`: a required field was empty
//! - `Invalid`: a field is present but unusable
//!
//! Transport and session failures live next to the networking code in
//! `plantlink-connectors`; they are recovered by the reconnect state machine
//! and never reach this crate.

use thiserror_no_std::Error;

/// Sensor read failures (the "sensor fault" kind)
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Raw value exceeds the channel's resolution
    #[error("Reading {value} outside range [0, {max}]")]
    OutOfRange {
        /// The raw value returned by the channel
        value: u16,
        /// Largest value the channel can legally produce
        max: u16,
    },

    /// Conversion did not complete within the poll budget
    #[error("Channel stale: no conversion after {polls} polls")]
    ChannelStale {
        /// Number of polls attempted
        polls: u8,
    },

    /// Converter reported a hardware error
    #[error("Channel fault: {reason}")]
    ChannelFault {
        /// Short description from the channel implementation
        reason: &'static str,
    },
}

/// Wire payload encoding failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// Encoded payload is larger than the fixed buffer
    #[error("Payload needs {needed} bytes, buffer holds {capacity}")]
    Overflow {
        /// Bytes the encoder produced
        needed: usize,
        /// Bytes available in the buffer
        capacity: usize,
    },

    /// Serializer rejected the value
    #[error("Payload encoding failed")]
    Encode,

    /// Bytes were not a valid reading payload
    #[error("Payload decoding failed")]
    Decode,
}

/// Configuration validation failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Required field is empty
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    /// Field holds an unusable value
    #[error("Invalid setting {field}: {reason}")]
    Invalid {
        /// Dotted field name, e.g. `timing.sample_interval_ms`
        field: &'static str,
        /// Why the value was rejected
        reason: &'static str,
    },
}

#[cfg(feature = "defmt")]
impl defmt::Format for SensorError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::OutOfRange { value, max } =>
                defmt::write!(fmt, "Reading {} outside [0, {}]", value, max),
            Self::ChannelStale { polls } =>
                defmt::write!(fmt, "Channel stale after {} polls", polls),
            Self::ChannelFault { reason } =>
                defmt::write!(fmt, "Channel fault: {}", reason),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PayloadError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Overflow { needed, capacity } =>
                defmt::write!(fmt, "Payload {} > {} bytes", needed, capacity),
            Self::Encode => defmt::write!(fmt, "Payload encode failed"),
            Self::Decode => defmt::write!(fmt, "Payload decode failed"),
        }
    }
}
