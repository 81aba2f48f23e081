//! Servo driver configuration (`[driver]` table).

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default driver name.
pub const DEFAULT_DRIVER: &str = "simulation";

/// Default Linux I²C character device.
pub const DEFAULT_I2C_BUS: &str = "/dev/i2c-1";

/// Default PCA9685 7-bit bus address.
pub const DEFAULT_I2C_ADDRESS: u16 = 0x40;

/// Standard hobby servo frame rate [Hz].
pub const DEFAULT_PWM_FREQUENCY_HZ: u32 = 50;

/// PCA9685 prescaler limits translate to roughly 24..=1526 Hz.
pub const PWM_FREQUENCY_RANGE_HZ: std::ops::RangeInclusive<u32> = 24..=1526;

fn default_driver() -> String {
    DEFAULT_DRIVER.to_string()
}

fn default_i2c_bus() -> PathBuf {
    PathBuf::from(DEFAULT_I2C_BUS)
}

fn default_i2c_address() -> u16 {
    DEFAULT_I2C_ADDRESS
}

fn default_frequency_hz() -> u32 {
    DEFAULT_PWM_FREQUENCY_HZ
}

/// Driver selection and bus parameters.
///
/// # TOML Example
///
/// ```toml
/// [driver]
/// name = "pca9685"
/// i2c_bus = "/dev/i2c-1"
/// address = 0x40
/// frequency_hz = 50
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverConfig {
    /// Registered driver name.
    #[serde(default = "default_driver")]
    pub name: String,

    /// I²C character device (hardware drivers only).
    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: PathBuf,

    /// 7-bit device address (hardware drivers only).
    #[serde(default = "default_i2c_address")]
    pub address: u16,

    /// PWM frame frequency [Hz].
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            name: default_driver(),
            i2c_bus: default_i2c_bus(),
            address: default_i2c_address(),
            frequency_hz: default_frequency_hz(),
        }
    }
}

impl DriverConfig {
    /// PWM period [µs] at the configured frequency.
    pub fn period_us(&self) -> i32 {
        (1_000_000 / self.frequency_hz.max(1)) as i32
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "driver.name cannot be empty".to_string(),
            ));
        }
        if self.address > 0x7F {
            return Err(ConfigError::ValidationError(format!(
                "driver.address {:#x} is not a 7-bit I2C address",
                self.address
            )));
        }
        if !PWM_FREQUENCY_RANGE_HZ.contains(&self.frequency_hz) {
            return Err(ConfigError::ValidationError(format!(
                "driver.frequency_hz {} outside [{}, {}]",
                self.frequency_hz,
                PWM_FREQUENCY_RANGE_HZ.start(),
                PWM_FREQUENCY_RANGE_HZ.end()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_rig() {
        let c = DriverConfig::default();
        assert_eq!(c.name, "simulation");
        assert_eq!(c.address, 0x40);
        assert_eq!(c.frequency_hz, 50);
        assert_eq!(c.period_us(), 20_000);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn rejects_bad_frequency_and_address() {
        let c = DriverConfig {
            frequency_hz: 2000,
            ..Default::default()
        };
        assert!(c.validate().is_err());

        let c = DriverConfig {
            address: 0x80,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn parses_partial_table() {
        let c: DriverConfig = toml::from_str("name = \"pca9685\"\naddress = 0x41").unwrap();
        assert_eq!(c.name, "pca9685");
        assert_eq!(c.address, 0x41);
        assert_eq!(c.frequency_hz, 50);
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(toml::from_str::<DriverConfig>("bogus = 1").is_err());
    }
}
