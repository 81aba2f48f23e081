//! Servo driver implementations.
//!
//! - [`simulation`] - In-memory driver for development, tests and bench work
//! - [`pca9685`] - NXP PCA9685 16-channel PWM controller over Linux i2c-dev
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `ServoDriver` trait from `pantilt_common::servo::driver`
//! 3. Register the driver in [`register_all_drivers`]

pub mod pca9685;
pub mod simulation;

use crate::driver_registry::DriverRegistry;
use pantilt_common::servo::driver::DriverFactory;
use tracing::error;

/// Register all built-in drivers.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    let builtin: [(&'static str, DriverFactory); 2] = [
        ("simulation", simulation::create_driver),
        ("pca9685", pca9685::create_driver),
    ];
    for (name, factory) in builtin {
        if let Err(e) = registry.register(name, factory) {
            error!("Skipping built-in driver '{name}': {e}");
        }
    }
}
