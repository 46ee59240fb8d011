//! Wire Payload Encoding
//!
//! Every reading leaves the node as a single JSON object with one integer
//! field:
//!
//! ```text
//! {"reading":2317}
//! ```
//!
//! ## Fixed Buffer
//!
//! The payload handed to the session is a [`heapless::Vec`] of
//! [`PAYLOAD_CAPACITY`] bytes, the size of the device's publish buffer. An encoder
//! that silently truncates would put malformed JSON on the wire, so the
//! encoder instead returns [`PayloadError::Overflow`] when the encoded form
//! does not fit. For the `u16` reading range the widest form is 17 bytes,
//! well inside the 32 byte buffer.

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::constants::PAYLOAD_CAPACITY;
use crate::errors::PayloadError;
use crate::reading::Reading;

/// Encoded payload in its fixed-size buffer
pub type Payload = Vec<u8, PAYLOAD_CAPACITY>;

#[derive(Serialize, Deserialize)]
struct WireReading {
    reading: u16,
}

/// Encode a reading into the standard payload buffer
pub fn encode(reading: Reading) -> Result<Payload, PayloadError> {
    encode_bounded::<PAYLOAD_CAPACITY>(reading)
}

/// Encode a reading into a buffer of `N` bytes
///
/// Fails with [`PayloadError::Overflow`] rather than truncating.
pub fn encode_bounded<const N: usize>(reading: Reading) -> Result<Vec<u8, N>, PayloadError> {
    let wire = WireReading { reading: reading.value() };
    let bytes = serde_json::to_vec(&wire).map_err(|_| PayloadError::Encode)?;

    Vec::from_slice(&bytes).map_err(|_| PayloadError::Overflow {
        needed: bytes.len(),
        capacity: N,
    })
}

/// Decode a payload back into a reading, checking it against `max`
pub fn decode(bytes: &[u8], max: u16) -> Result<Reading, PayloadError> {
    let wire: WireReading = serde_json::from_slice(bytes).map_err(|_| PayloadError::Decode)?;
    Reading::new(wire.reading, max).map_err(|_| PayloadError::Decode)
}
