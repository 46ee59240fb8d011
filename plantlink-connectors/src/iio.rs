//! Linux IIO analog channel
//!
//! Reads one conversion from the industrial I/O sysfs interface, e.g.
//! `/sys/bus/iio/devices/iio:device0/in_voltage0_raw`. Each read of the
//! file triggers a one-shot conversion in the kernel driver.

use std::io;
use std::path::{Path, PathBuf};

use plantlink_core::AnalogChannel;

/// One `in_voltageN_raw` attribute
#[derive(Debug, Clone)]
pub struct IioChannel {
    path: PathBuf,
}

impl IioChannel {
    /// Channel backed by the given sysfs attribute
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Channel `index` of IIO device `device`
    pub fn voltage(device: u32, index: u32) -> Self {
        Self::new(format!("/sys/bus/iio/devices/iio:device{device}/in_voltage{index}_raw"))
    }

    /// Attribute path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AnalogChannel for IioChannel {
    type Error = io::Error;

    fn read(&mut self) -> nb::Result<u16, io::Error> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            // Drivers answer EAGAIN while a conversion is in flight
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Err(nb::Error::WouldBlock),
            Err(e) => return Err(nb::Error::Other(e)),
        };

        text.trim()
            .parse::<u16>()
            .map_err(|e| nb::Error::Other(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plantlink_core::{AdcSampler, SensorError, SensorSampler};

    #[test]
    fn reads_raw_attribute() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in_voltage0_raw");
        std::fs::write(&path, "2048\n").unwrap();

        let mut sampler = AdcSampler::new(IioChannel::new(&path));
        assert_eq!(sampler.sample().unwrap().value(), 2048);

        std::fs::write(&path, "17\n").unwrap();
        assert_eq!(sampler.sample().unwrap().value(), 17);
    }

    #[test]
    fn garbage_is_a_channel_fault() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in_voltage0_raw");
        std::fs::write(&path, "not a number").unwrap();

        let mut sampler = AdcSampler::new(IioChannel::new(&path));
        assert!(matches!(sampler.sample(), Err(SensorError::ChannelFault { .. })));
    }

    #[test]
    fn above_resolution_is_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in_voltage0_raw");
        std::fs::write(&path, "5000").unwrap();

        let mut sampler = AdcSampler::new(IioChannel::new(&path));
        assert_eq!(
            sampler.sample(),
            Err(SensorError::OutOfRange { value: 5000, max: 4095 })
        );
    }

    #[test]
    fn device_path_layout() {
        let channel = IioChannel::voltage(0, 3);
        assert_eq!(
            channel.path(),
            Path::new("/sys/bus/iio/devices/iio:device0/in_voltage3_raw")
        );
    }
}
