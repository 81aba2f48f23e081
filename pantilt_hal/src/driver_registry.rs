//! Driver registry for servo drivers.
//!
//! Constructed at startup, populated via `register()`, and consulted once to
//! create the driver the control loop will own. No global state.

use pantilt_common::servo::driver::{DriverFactory, HardwareError, ServoDriver};
use std::collections::BTreeMap;

use crate::drivers;

/// Registry of available servo drivers.
pub struct DriverRegistry {
    factories: BTreeMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Create a registry holding every built-in driver.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        drivers::register_all_drivers(&mut registry);
        registry
    }

    /// Register a driver factory.
    ///
    /// # Errors
    /// `HardwareError::ConfigError` if a driver with the same name exists.
    pub fn register(
        &mut self,
        name: &'static str,
        factory: DriverFactory,
    ) -> Result<(), HardwareError> {
        if self.factories.contains_key(name) {
            return Err(HardwareError::ConfigError(format!(
                "driver '{name}' is already registered"
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Get a driver factory by name.
    pub fn get_factory(&self, name: &str) -> Option<DriverFactory> {
        self.factories.get(name).copied()
    }

    /// Create a driver instance by name.
    ///
    /// # Errors
    /// Returns `HardwareError::DriverNotFound` if no driver with the given name is registered.
    pub fn create_driver(&self, name: &str) -> Result<Box<dyn ServoDriver>, HardwareError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| HardwareError::DriverNotFound(name.to_string()))?;
        Ok(factory())
    }

    /// List all registered driver names, sorted.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
