//! NXP PCA9685 16-channel, 12-bit PWM controller over Linux i2c-dev.
//!
//! Register writes go through the [`RegisterBus`] seam so the register
//! sequencing can be exercised without a device. On a real system the bus is
//! a `/dev/i2c-N` device driven through `linux-embedded-hal`.

use embedded_hal::i2c::I2c;
use linux_embedded_hal::I2cdev;
use pantilt_common::consts::MAX_CHANNELS;
use pantilt_common::servo::config::DriverConfig;
use pantilt_common::servo::driver::{DriverDiagnostics, HardwareError, ServoDriver};
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

// ─── Registers ──────────────────────────────────────────────────────

const MODE1: u8 = 0x00;
const MODE2: u8 = 0x01;
const LED0_ON_L: u8 = 0x06;
const PRESCALE: u8 = 0xFE;

const MODE1_RESTART: u8 = 0x80;
const MODE1_AI: u8 = 0x20;
const MODE1_SLEEP: u8 = 0x10;
const MODE2_OUTDRV: u8 = 0x04;

/// Internal oscillator frequency [Hz].
const OSC_HZ: u64 = 25_000_000;
/// PWM counter resolution.
const STEPS: u64 = 4096;

/// Byte-oriented write access to the chip.
pub trait RegisterBus: Send {
    /// Write `bytes` as one I²C transaction (register address first).
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// `/dev/i2c-N` talking to one 7-bit target address.
pub struct LinuxI2c {
    dev: I2cdev,
    address: u8,
}

impl LinuxI2c {
    /// Open the bus device.
    pub fn open(bus: &Path, address: u16) -> io::Result<Self> {
        let address = u8::try_from(address)
            .ok()
            .filter(|a| *a <= 0x7F)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{address:#x} is not a 7-bit address"),
                )
            })?;
        let dev = I2cdev::new(bus).map_err(|e| io::Error::other(e.to_string()))?;
        Ok(Self { dev, address })
    }
}

impl RegisterBus for LinuxI2c {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        I2c::write(&mut self.dev, self.address, bytes)
            .map_err(|e| io::Error::other(format!("{e:?}")))
    }
}

/// Prescaler value for a PWM frame frequency (datasheet §7.3.5).
pub fn prescale_for(frequency_hz: u32) -> u8 {
    let freq = u64::from(frequency_hz.max(1));
    // round(osc / (4096 * f)) - 1
    let value = (OSC_HZ + STEPS * freq / 2) / (STEPS * freq);
    value.saturating_sub(1).clamp(3, 255) as u8
}

/// Counter ticks for a pulse width at a PWM frame frequency.
pub fn pulse_to_ticks(pulse_us: i32, frequency_hz: u32) -> u16 {
    let us = u64::try_from(pulse_us).unwrap_or(0);
    let ticks = us * u64::from(frequency_hz) * STEPS / 1_000_000;
    ticks.min(STEPS - 1) as u16
}

/// PCA9685 driver.
pub struct Pca9685Driver {
    bus: Option<Box<dyn RegisterBus>>,
    frequency_hz: u32,
    period_us: i32,
    initialized: bool,
    writes: u64,
    failures: u64,
    last_pulse_us: [Option<i32>; MAX_CHANNELS as usize],
}

impl Pca9685Driver {
    /// Create a driver that opens the configured i2c-dev bus on `init`.
    pub fn new() -> Self {
        Self {
            bus: None,
            frequency_hz: 0,
            period_us: 0,
            initialized: false,
            writes: 0,
            failures: 0,
            last_pulse_us: [None; MAX_CHANNELS as usize],
        }
    }

    /// Create a driver over an already opened bus.
    pub fn with_bus(bus: Box<dyn RegisterBus>) -> Self {
        Self {
            bus: Some(bus),
            ..Self::new()
        }
    }

    fn write_reg(&mut self, bytes: &[u8]) -> Result<(), HardwareError> {
        let bus = self.bus.as_mut().ok_or(HardwareError::NotInitialized)?;
        bus.write(bytes)
            .map_err(|e| HardwareError::CommunicationError(format!("i2c write {:#04x}: {e}", bytes[0])))
    }
}

impl Default for Pca9685Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl ServoDriver for Pca9685Driver {
    fn name(&self) -> &'static str {
        "pca9685"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn init(&mut self, config: &DriverConfig) -> Result<(), HardwareError> {
        if self.bus.is_none() {
            let bus = LinuxI2c::open(&config.i2c_bus, config.address).map_err(|e| {
                HardwareError::InitFailed(format!(
                    "open {} @ {:#04x}: {e}",
                    config.i2c_bus.display(),
                    config.address
                ))
            })?;
            self.bus = Some(Box::new(bus));
        }

        let prescale = prescale_for(config.frequency_hz);
        debug!(
            "PCA9685 prescale={} for {} Hz",
            prescale, config.frequency_hz
        );

        let init_err = |e: HardwareError| HardwareError::InitFailed(e.to_string());
        self.write_reg(&[MODE2, MODE2_OUTDRV]).map_err(init_err)?;
        // Prescaler is only writable while the oscillator sleeps.
        self.write_reg(&[MODE1, MODE1_SLEEP | MODE1_AI]).map_err(init_err)?;
        self.write_reg(&[PRESCALE, prescale]).map_err(init_err)?;
        self.write_reg(&[MODE1, MODE1_AI]).map_err(init_err)?;
        std::thread::sleep(Duration::from_micros(500));
        self.write_reg(&[MODE1, MODE1_AI | MODE1_RESTART]).map_err(init_err)?;

        self.frequency_hz = config.frequency_hz;
        self.period_us = config.period_us();
        self.initialized = true;
        info!(
            "PCA9685 initialized on {} @ {:#04x}, {} Hz",
            config.i2c_bus.display(),
            config.address,
            config.frequency_hz
        );
        Ok(())
    }

    fn set_pulse(&mut self, channel: u8, pulse_us: i32) -> Result<(), HardwareError> {
        if !self.initialized {
            return Err(HardwareError::NotInitialized);
        }
        if channel >= MAX_CHANNELS {
            self.failures += 1;
            return Err(HardwareError::InvalidChannel {
                channel,
                available: MAX_CHANNELS,
            });
        }
        if !(0..=self.period_us).contains(&pulse_us) {
            self.failures += 1;
            return Err(HardwareError::PulseOutOfRange {
                pulse_us,
                max_us: self.period_us,
            });
        }

        let off = pulse_to_ticks(pulse_us, self.frequency_hz);
        let [off_l, off_h] = off.to_le_bytes();
        let reg = LED0_ON_L + 4 * channel;
        // ON at tick 0, OFF after `off` ticks; auto-increment covers all four.
        match self.write_reg(&[reg, 0, 0, off_l, off_h]) {
            Ok(()) => {
                self.writes += 1;
                self.last_pulse_us[channel as usize] = Some(pulse_us);
                Ok(())
            }
            Err(e) => {
                self.failures += 1;
                Err(e)
            }
        }
    }

    fn shutdown(&mut self) -> Result<(), HardwareError> {
        if self.initialized {
            // Put the oscillator to sleep; outputs stop driving the servos.
            self.write_reg(&[MODE1, MODE1_SLEEP | MODE1_AI])?;
        }
        self.initialized = false;
        info!("PCA9685 shut down after {} writes", self.writes);
        Ok(())
    }

    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        Some(DriverDiagnostics {
            writes: self.writes,
            failures: self.failures,
            last_pulse_us: self.last_pulse_us.to_vec(),
        })
    }
}

/// Factory function to create a PCA9685 driver instance.
pub fn create_driver() -> Box<dyn ServoDriver> {
    Box::new(Pca9685Driver::new())
}
