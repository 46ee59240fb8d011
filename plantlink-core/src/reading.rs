//! Sensor reading type
//!
//! A [`Reading`] is one raw conversion from the soil probe channel. It
//! carries no timestamp: ordering is implied by queue position.

use crate::errors::SensorError;

/// Single integer measurement, `0..=max` for the channel that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading(u16);

impl Reading {
    /// Wrap a raw channel value, rejecting values above `max`
    pub fn new(raw: u16, max: u16) -> Result<Self, SensorError> {
        if raw > max {
            return Err(SensorError::OutOfRange { value: raw, max });
        }
        Ok(Self(raw))
    }

    /// Raw converter value
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Reading as a whole percentage of the channel's full scale
    ///
    /// Uses `max + 1` as the scale (4096 for a 12-bit channel), the same
    /// conversion the subscriber applies before storing a reading.
    /// Saturates at 100 when the reading exceeds `max`.
    pub fn percent_of_scale(self, max: u16) -> u8 {
        let scale = u32::from(max) + 1;
        let percent = (u32::from(self.0) * 100 / scale).min(100);
        percent as u8
    }
}

impl From<Reading> for u16 {
    fn from(reading: Reading) -> Self {
        reading.0
    }
}

impl core::fmt::Display for Reading {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ADC_12BIT_MAX;

    #[test]
    fn accepts_full_range() {
        assert_eq!(Reading::new(0, ADC_12BIT_MAX).unwrap().value(), 0);
        assert_eq!(Reading::new(4095, ADC_12BIT_MAX).unwrap().value(), 4095);
    }

    #[test]
    fn rejects_above_resolution() {
        assert_eq!(
            Reading::new(4096, ADC_12BIT_MAX),
            Err(SensorError::OutOfRange { value: 4096, max: 4095 })
        );
    }

    #[test]
    fn percent_matches_subscriber_conversion() {
        let max = ADC_12BIT_MAX;
        assert_eq!(Reading::new(0, max).unwrap().percent_of_scale(max), 0);
        assert_eq!(Reading::new(2048, max).unwrap().percent_of_scale(max), 50);
        assert_eq!(Reading::new(4095, max).unwrap().percent_of_scale(max), 99);
    }

    #[test]
    fn percent_saturates_on_a_narrower_scale() {
        let full = Reading::new(4095, ADC_12BIT_MAX).unwrap();
        assert_eq!(full.percent_of_scale(1023), 100);
        assert_eq!(full.percent_of_scale(0), 100);
        assert_eq!(Reading::new(512, ADC_12BIT_MAX).unwrap().percent_of_scale(1023), 50);
    }
}
