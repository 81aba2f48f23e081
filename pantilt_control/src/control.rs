//! Control engine root.
//!
//! Per-axis feedback filter, per-tick step limiter and the angle to pulse
//! width mapping used on the output stage.

pub mod filter;
pub mod pulse;
pub mod slew;
