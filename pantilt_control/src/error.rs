//! Fatal startup errors.
//!
//! Anything that reaches `main` as a [`StartupError`] ends the process with
//! exit code 1. Runtime faults (bad commands, failed servo writes) never
//! become one.

use pantilt_common::config::ConfigError;
use pantilt_common::servo::driver::HardwareError;
use thiserror::Error;

use crate::cycle::CycleError;

/// Reasons the controller could not start.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Configuration missing, unparsable or invalid.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// Servo driver unknown or failed to initialize.
    #[error("servo driver: {0}")]
    DriverInit(#[source] HardwareError),

    /// Control loop thread could not be armed.
    #[error("control loop: {0}")]
    Scheduler(#[from] CycleError),

    /// Command server could not bind.
    #[error("command server: {0}")]
    Server(#[from] std::io::Error),
}

impl From<HardwareError> for StartupError {
    fn from(e: HardwareError) -> Self {
        Self::DriverInit(e)
    }
}
