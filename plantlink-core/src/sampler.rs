//! Sensor sampling
//!
//! The analog front end is an external collaborator: pin setup, attenuation
//! and conversion timing belong to the board support code. This module only
//! sees a channel that can be polled for one raw conversion, in the same
//! `nb` style embedded HAL one-shot ADC drivers use.
//!
//! [`AdcSampler`] turns such a channel into validated [`Reading`]s:
//! - polls a bounded number of times, so a sample has bounded latency
//! - surfaces out-of-range values instead of publishing them
//! - reports a converter that never completes as a stale channel

use crate::constants::{ADC_12BIT_MAX, ADC_POLL_BUDGET};
use crate::errors::SensorError;
use crate::reading::Reading;

/// One raw analog input
pub trait AnalogChannel {
    /// Converter-specific error
    type Error: core::fmt::Debug;

    /// Poll for a completed conversion
    ///
    /// Returns `WouldBlock` while the conversion is still running.
    fn read(&mut self) -> nb::Result<u16, Self::Error>;
}

/// Produces one reading per call
pub trait SensorSampler {
    /// Take one sample; non-blocking, bounded latency
    fn sample(&mut self) -> Result<Reading, SensorError>;
}

impl<S: SensorSampler + ?Sized> SensorSampler for &mut S {
    fn sample(&mut self) -> Result<Reading, SensorError> {
        (**self).sample()
    }
}

#[cfg(feature = "std")]
impl<S: SensorSampler + ?Sized> SensorSampler for std::boxed::Box<S> {
    fn sample(&mut self) -> Result<Reading, SensorError> {
        (**self).sample()
    }
}

/// Sampler over a single analog channel
#[derive(Debug)]
pub struct AdcSampler<C> {
    channel: C,
    max: u16,
    poll_budget: u8,
}

impl<C: AnalogChannel> AdcSampler<C> {
    /// Sampler for a 12-bit channel
    pub fn new(channel: C) -> Self {
        Self::with_resolution(channel, ADC_12BIT_MAX)
    }

    /// Sampler for a channel whose largest legal value is `max`
    pub fn with_resolution(channel: C, max: u16) -> Self {
        Self {
            channel,
            max,
            poll_budget: ADC_POLL_BUDGET,
        }
    }

    /// Override how many polls a conversion may take
    pub fn with_poll_budget(mut self, polls: u8) -> Self {
        self.poll_budget = polls.max(1);
        self
    }

    /// Largest legal reading
    pub fn max_value(&self) -> u16 {
        self.max
    }

    /// Give back the channel
    pub fn into_inner(self) -> C {
        self.channel
    }
}

impl<C: AnalogChannel> SensorSampler for AdcSampler<C> {
    fn sample(&mut self) -> Result<Reading, SensorError> {
        for _ in 0..self.poll_budget {
            match self.channel.read() {
                Ok(raw) => return Reading::new(raw, self.max),
                Err(nb::Error::WouldBlock) => core::hint::spin_loop(),
                Err(nb::Error::Other(e)) => {
                    log::warn!("sensor: converter error {:?}", e);
                    return Err(SensorError::ChannelFault { reason: "converter error" });
                }
            }
        }

        Err(SensorError::ChannelStale { polls: self.poll_budget })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Channel that reports busy `busy` times before returning `raw`
    struct SlowChannel {
        busy: u8,
        raw: u16,
    }

    impl AnalogChannel for SlowChannel {
        type Error = ();

        fn read(&mut self) -> nb::Result<u16, ()> {
            if self.busy > 0 {
                self.busy -= 1;
                return Err(nb::Error::WouldBlock);
            }
            Ok(self.raw)
        }
    }

    struct BrokenChannel;

    impl AnalogChannel for BrokenChannel {
        type Error = &'static str;

        fn read(&mut self) -> nb::Result<u16, &'static str> {
            Err(nb::Error::Other("i2c nack"))
        }
    }

    #[test]
    fn waits_for_conversion_within_budget() {
        let mut sampler = AdcSampler::new(SlowChannel { busy: 3, raw: 1800 });
        assert_eq!(sampler.sample().unwrap().value(), 1800);
    }

    #[test]
    fn stale_channel_after_budget() {
        let mut sampler = AdcSampler::new(SlowChannel { busy: u8::MAX, raw: 0 }).with_poll_budget(4);
        assert_eq!(sampler.sample(), Err(SensorError::ChannelStale { polls: 4 }));
    }

    #[test]
    fn out_of_range_is_surfaced_not_published() {
        let mut sampler = AdcSampler::with_resolution(SlowChannel { busy: 0, raw: 1024 }, 1023);
        assert_eq!(
            sampler.sample(),
            Err(SensorError::OutOfRange { value: 1024, max: 1023 })
        );
    }

    #[test]
    fn converter_error_is_a_fault() {
        let mut sampler = AdcSampler::new(BrokenChannel);
        assert!(matches!(sampler.sample(), Err(SensorError::ChannelFault { .. })));
    }
}
