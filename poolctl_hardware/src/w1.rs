//! DS18B20 temperature sensors on the Linux 1-Wire bus.
//!
//! The kernel exposes each probe as `<base>/<device>/w1_slave`:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use poolctl_traits::{SensorError, SensorPort};

use crate::error::{HwError, Result};

pub const DEFAULT_W1_BASE: &str = "/sys/bus/w1/devices";

/// Parse the contents of a `w1_slave` file into degrees Celsius.
pub fn parse_w1_slave(device: &str, contents: &str) -> Result<f32> {
    let mut lines = contents.lines();
    let crc_line = lines.next().unwrap_or_default();
    if !crc_line.trim_end().ends_with("YES") {
        return Err(HwError::Crc(device.to_string()));
    }
    let data_line = lines
        .next()
        .ok_or_else(|| HwError::Parse(format!("{device}: missing data line")))?;
    let pos = data_line
        .find("t=")
        .ok_or_else(|| HwError::Parse(format!("{device}: no t= field")))?;
    let milli: i32 = data_line[pos + 2..]
        .trim()
        .parse()
        .map_err(|e| HwError::Parse(format!("{device}: {e}")))?;
    #[allow(clippy::cast_precision_loss)]
    Ok(milli as f32 / 1000.0)
}

/// Sensor port over the 1-Wire sysfs tree, keyed by configured sensor name.
pub struct W1Sensors {
    base: PathBuf,
    devices: HashMap<String, String>,
}

impl W1Sensors {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            devices: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_sensor(mut self, name: impl Into<String>, device: impl Into<String>) -> Self {
        self.devices.insert(name.into(), device.into());
        self
    }

    fn slave_path(&self, device: &str) -> PathBuf {
        self.base.join(device).join("w1_slave")
    }

    fn read_device(&self, device: &str) -> Result<f32> {
        let path = self.slave_path(device);
        if !Path::new(&path).exists() {
            return Err(HwError::NotFound(device.to_string()));
        }
        let contents = std::fs::read_to_string(&path)?;
        parse_w1_slave(device, &contents)
    }
}

impl SensorPort for W1Sensors {
    fn read_temperature(&self, sensor: &str, timeout: Duration) -> std::result::Result<f32, SensorError> {
        let device = self
            .devices
            .get(sensor)
            .ok_or_else(|| SensorError::NotFound(sensor.to_string()))?;
        let started = Instant::now();
        let value = self.read_device(device)?;
        // Kernel reads block for the conversion; a late answer is a failed read.
        if started.elapsed() > timeout {
            tracing::warn!(sensor, device = %device, "w1 read exceeded timeout");
            return Err(SensorError::Timeout);
        }
        tracing::trace!(sensor, celsius = value, "w1 read");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n72 01 4b 46 7f ff 0e 10 57 t=23125\n", 23.125)]
    #[case("a0 ff 4b 46 7f ff 0c 10 0c : crc=0c YES\na0 ff 4b 46 7f ff 0c 10 0c t=-6000\n", -6.0)]
    fn parses_millidegrees(#[case] contents: &str, #[case] expected: f32) {
        let c = parse_w1_slave("28-1", contents).unwrap();
        assert!((c - expected).abs() < 1e-4);
    }

    #[test]
    fn rejects_failed_crc() {
        let contents = "72 01 4b 46 7f ff 0e 10 57 : crc=57 NO\n72 01 4b 46 7f ff 0e 10 57 t=23125\n";
        assert!(matches!(parse_w1_slave("28-1", contents), Err(HwError::Crc(_))));
    }

    #[test]
    fn rejects_missing_value() {
        let contents = "72 01 : crc=57 YES\n72 01 4b 46\n";
        assert!(matches!(parse_w1_slave("28-1", contents), Err(HwError::Parse(_))));
    }
}
