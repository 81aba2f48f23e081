//! # Pan/Tilt Control
//!
//! Closed-loop position controller for a two-axis hobby-servo gimbal.
//!
//! A fixed-period control loop pulls the current position toward the most
//! recently commanded target through one feedback filter per axis, limits
//! the per-tick step, and writes the result to the servo driver as pulse
//! widths. Targets arrive over a line-delimited JSON TCP channel and are
//! handed to the loop through [`state::SharedPosition`].
//!
//! ```text
//!  TCP clients ──► server ──► command ──► SharedPosition ◄── cycle (ControlLoop)
//!                                              target            │
//!                                              current           ▼
//!                                                         ServoDriver (pulses)
//! ```
//!
//! The loop thread is the only writer of the current position; command
//! handlers are the only writers of the target.

pub mod command;
pub mod config;
pub mod control;
pub mod cycle;
pub mod error;
pub mod server;
pub mod state;
