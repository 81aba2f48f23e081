//! Angle to pulse width mapping.
//!
//! Linear map of [`ANGLE_MIN_DEG`, `ANGLE_MAX_DEG`] onto
//! [`PULSE_MIN_US`, `PULSE_MAX_US`], truncated toward zero. Inputs outside
//! the angle range extrapolate; range enforcement is the driver's job.

use pantilt_common::consts::{ANGLE_MAX_DEG, ANGLE_MIN_DEG, PULSE_MAX_US, PULSE_MIN_US};

/// Pulse width [µs] for an angle [deg].
#[inline]
pub fn angle_to_pulse(angle_deg: f64) -> i32 {
    let span_deg = ANGLE_MAX_DEG - ANGLE_MIN_DEG;
    let span_us = f64::from(PULSE_MAX_US - PULSE_MIN_US);
    let pulse = f64::from(PULSE_MIN_US) + (angle_deg - ANGLE_MIN_DEG) / span_deg * span_us;
    // `as` truncates toward zero and saturates at the i32 bounds.
    pulse as i32
}
