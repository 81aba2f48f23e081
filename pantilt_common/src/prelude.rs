//! Prelude module for common re-exports.
//!
//! ```rust
//! use pantilt_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{DEFAULT_CYCLE_TIME_MS, PAN_CHANNEL, TILT_CHANNEL};

// ─── Positions & Wire Format ────────────────────────────────────────
pub use crate::command::{ParseError, Response, decode_command};
pub use crate::position::{Axis, PanTilt, TargetUpdate};

// ─── Servo Drivers ──────────────────────────────────────────────────
pub use crate::servo::config::DriverConfig;
pub use crate::servo::driver::{DriverDiagnostics, DriverFactory, HardwareError, ServoDriver};
