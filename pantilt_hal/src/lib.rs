//! # Pan/Tilt HAL Library
//!
//! Servo driver implementations and the registry used to pick one at
//! startup. Drivers implement the `ServoDriver` trait defined in
//! `pantilt_common::servo::driver`.
//!
//! # Module Structure
//!
//! - [`driver_registry`] - Driver factory registration
//! - [`drivers`] - Driver implementations (`simulation`, `pca9685`)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    pantilt_hal                               │
//! │  ┌────────────────────┐        ┌───────────────────────────┐ │
//! │  │  DriverRegistry    │──────► │  Box<dyn ServoDriver>     │ │
//! │  │  name → factory    │        │  simulation | pca9685     │ │
//! │  └────────────────────┘        └─────────────┬─────────────┘ │
//! │                                              │ i2c-dev       │
//! │                                              ▼               │
//! │                                     PCA9685 16ch PWM         │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod driver_registry;
pub mod drivers;

// Re-export key types for convenience
pub use crate::driver_registry::DriverRegistry;
pub use crate::drivers::pca9685::Pca9685Driver;
pub use crate::drivers::simulation::{SimulationDriver, SimulationHandle};
