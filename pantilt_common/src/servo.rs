//! Servo actuator interface.
//!
//! - [`driver`] - `ServoDriver` trait, `HardwareError`, driver diagnostics
//! - [`config`] - `DriverConfig` (driver selection and bus parameters)

pub mod config;
pub mod driver;
