//! Simulation driver implementation.
//!
//! `SimulationDriver` accepts pulses exactly like the hardware driver would
//! (same channel count, same range check) but only records them. A cloneable
//! [`SimulationHandle`] lets tests and operators inspect the recorded
//! pulses and inject failures while the control loop owns the driver.

use pantilt_common::consts::MAX_CHANNELS;
use pantilt_common::servo::config::DriverConfig;
use pantilt_common::servo::driver::{DriverDiagnostics, HardwareError, ServoDriver};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Recorded driver state, shared with every [`SimulationHandle`].
#[derive(Debug, Default)]
struct SimState {
    initialized: bool,
    period_us: i32,
    last_pulse_us: [Option<i32>; MAX_CHANNELS as usize],
    writes: u64,
    failures: u64,
    /// Bitmask of channels whose writes fail.
    failing_channels: u16,
    fail_init: bool,
}

/// Inspection and fault-injection handle for a [`SimulationDriver`].
#[derive(Debug, Clone, Default)]
pub struct SimulationHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimulationHandle {
    /// Last pulse written to `channel`, if any.
    pub fn last_pulse(&self, channel: u8) -> Option<i32> {
        self.state
            .lock()
            .last_pulse_us
            .get(channel as usize)
            .copied()
            .flatten()
    }

    /// Number of successful writes so far.
    pub fn writes(&self) -> u64 {
        self.state.lock().writes
    }

    /// Number of failed writes so far.
    pub fn failures(&self) -> u64 {
        self.state.lock().failures
    }

    /// True between a successful `init` and `shutdown`.
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Make every write to `channel` fail (or succeed again).
    pub fn set_channel_fault(&self, channel: u8, failing: bool) {
        if channel >= MAX_CHANNELS {
            return;
        }
        let mut s = self.state.lock();
        if failing {
            s.failing_channels |= 1 << channel;
        } else {
            s.failing_channels &= !(1 << channel);
        }
    }

    /// Make the next `init` fail.
    pub fn set_init_fault(&self, failing: bool) {
        self.state.lock().fail_init = failing;
    }
}

/// Simulation driver implementing the `ServoDriver` trait.
pub struct SimulationDriver {
    handle: SimulationHandle,
}

impl SimulationDriver {
    /// Create a new simulation driver instance.
    pub fn new() -> Self {
        Self {
            handle: SimulationHandle::default(),
        }
    }

    /// Handle sharing this driver's recorded state.
    pub fn handle(&self) -> SimulationHandle {
        self.handle.clone()
    }
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ServoDriver for SimulationDriver {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn init(&mut self, config: &DriverConfig) -> Result<(), HardwareError> {
        let mut s = self.handle.state.lock();
        if s.fail_init {
            return Err(HardwareError::InitFailed(
                "simulated initialization fault".to_string(),
            ));
        }
        s.period_us = config.period_us();
        s.initialized = true;
        info!(
            "Simulation driver initialized ({} channels, {} Hz)",
            MAX_CHANNELS, config.frequency_hz
        );
        Ok(())
    }

    fn set_pulse(&mut self, channel: u8, pulse_us: i32) -> Result<(), HardwareError> {
        let mut s = self.handle.state.lock();
        if !s.initialized {
            return Err(HardwareError::NotInitialized);
        }
        if channel >= MAX_CHANNELS {
            s.failures += 1;
            return Err(HardwareError::InvalidChannel {
                channel,
                available: MAX_CHANNELS,
            });
        }
        if s.failing_channels & (1 << channel) != 0 {
            s.failures += 1;
            return Err(HardwareError::CommunicationError(format!(
                "simulated bus fault on channel {channel}"
            )));
        }
        if !(0..=s.period_us).contains(&pulse_us) {
            s.failures += 1;
            return Err(HardwareError::PulseOutOfRange {
                pulse_us,
                max_us: s.period_us,
            });
        }

        s.last_pulse_us[channel as usize] = Some(pulse_us);
        s.writes += 1;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), HardwareError> {
        let mut s = self.handle.state.lock();
        debug!(
            "Simulation driver shutdown after {} writes ({} failed)",
            s.writes, s.failures
        );
        s.initialized = false;
        Ok(())
    }

    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        let s = self.handle.state.lock();
        Some(DriverDiagnostics {
            writes: s.writes,
            failures: s.failures,
            last_pulse_us: s.last_pulse_us.to_vec(),
        })
    }
}

/// Factory function to create a simulation driver instance.
pub fn create_driver() -> Box<dyn ServoDriver> {
    Box::new(SimulationDriver::new())
}
