//! System-wide constants for the pan/tilt workspace.
//!
//! Single source of truth for pulse limits, channel assignments and default
//! endpoints. Imported by all crates.

/// Pulse width at -90° [µs].
pub const PULSE_MIN_US: i32 = 500;

/// Pulse width at +90° [µs].
pub const PULSE_MAX_US: i32 = 2500;

/// Lower end of the mapped angle range [deg].
pub const ANGLE_MIN_DEG: f64 = -90.0;

/// Upper end of the mapped angle range [deg].
pub const ANGLE_MAX_DEG: f64 = 90.0;

/// Default PWM channel of the pan servo.
pub const PAN_CHANNEL: u8 = 0;

/// Default PWM channel of the tilt servo.
pub const TILT_CHANNEL: u8 = 1;

/// Number of PWM channels on a PCA9685.
pub const MAX_CHANNELS: u8 = 16;

/// Default control loop period [ms] (50 Hz).
pub const DEFAULT_CYCLE_TIME_MS: u32 = 20;

/// Default slew limit [deg/tick].
pub const DEFAULT_MAX_SPEED: f64 = 3.0;

/// Default command server bind address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Longest accepted command line, newline excluded [bytes].
pub const MAX_COMMAND_LINE_BYTES: usize = 4096;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pantilt/pantilt.toml";

/// Default service name.
pub const SERVICE_NAME: &str = "pantilt";
