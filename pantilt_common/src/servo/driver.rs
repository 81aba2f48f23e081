//! Servo driver trait and error types.
//!
//! This module defines:
//! - `ServoDriver` trait - Interface for pluggable PWM servo backends
//! - `HardwareError` enum - Error types for driver operations
//! - `DriverFactory` type alias - Factory function type
//! - `DriverDiagnostics` struct - Optional driver diagnostics

use crate::servo::config::DriverConfig;
use thiserror::Error;

/// Error types for servo driver operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    /// Driver initialization failed. Fatal at startup.
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Driver configuration rejected.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Bus communication error during a pulse write.
    #[error("Hardware communication error: {0}")]
    CommunicationError(String),

    /// Channel index not supported by the driver.
    #[error("Invalid channel {channel} (driver has {available} channels)")]
    InvalidChannel {
        /// Requested channel.
        channel: u8,
        /// Number of channels the driver exposes.
        available: u8,
    },

    /// Pulse width cannot be produced at the configured PWM frequency.
    #[error("Pulse {pulse_us}us out of range [0, {max_us}]us")]
    PulseOutOfRange {
        /// Requested pulse width [µs].
        pulse_us: i32,
        /// Longest representable pulse [µs].
        max_us: i32,
    },

    /// `set_pulse` called before a successful `init`.
    #[error("Driver not initialized")]
    NotInitialized,

    /// Driver not found in the registry.
    #[error("Driver not found: {0}")]
    DriverNotFound(String),
}

/// Factory function type for creating driver instances.
pub type DriverFactory = fn() -> Box<dyn ServoDriver>;

/// Optional driver diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverDiagnostics {
    /// Successful pulse writes.
    pub writes: u64,
    /// Failed pulse writes.
    pub failures: u64,
    /// Last pulse written per channel [µs] (`None` = never written).
    pub last_pulse_us: Vec<Option<i32>>,
}

/// Trait defining the interface for servo drivers.
///
/// The control loop owns exactly one driver and calls it from the loop
/// thread only, so implementations need `Send` but not `Sync`.
///
/// # Lifecycle
///
/// 1. `init()` - Called once before the control loop starts
/// 2. `set_pulse()` - Called once per axis per tick
/// 3. `shutdown()` - Called after the loop has stopped
///
/// # Timing Contracts
///
/// | Operation     | Max Duration  | Constraint            |
/// |---------------|---------------|-----------------------|
/// | `init()`      | seconds       | None (pre-loop)       |
/// | `set_pulse()` | << tick       | Bounded, non-blocking |
/// | `shutdown()`  | 1 second      | None (post-loop)      |
pub trait ServoDriver: Send {
    /// Returns the driver's unique identifier (e.g., "simulation", "pca9685").
    fn name(&self) -> &'static str;

    /// Returns the driver's semantic version.
    fn version(&self) -> &'static str;

    /// Initialize the hardware.
    ///
    /// # Errors
    /// Return `HardwareError::InitFailed` if the device cannot be brought up.
    /// The caller treats any error here as fatal.
    fn init(&mut self, config: &DriverConfig) -> Result<(), HardwareError>;

    /// Drive `channel` with a pulse of `pulse_us` microseconds.
    ///
    /// # Errors
    /// Any `HardwareError`; the control loop logs it and carries on.
    fn set_pulse(&mut self, channel: u8, pulse_us: i32) -> Result<(), HardwareError>;

    /// Graceful shutdown of the driver.
    fn shutdown(&mut self) -> Result<(), HardwareError>;

    /// Get driver-specific diagnostics.
    /// Default: None
    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        None
    }
}
