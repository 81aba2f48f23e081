//! Pan/Tilt Common Library
//!
//! Shared constants, position types, wire format and configuration loading
//! utilities for all pan/tilt workspace crates.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - System-wide constants (pulse range, channels, defaults)
//! - [`position`] - `PanTilt` pairs, `Axis`, partial `TargetUpdate`
//! - [`command`] - Inbound command / outbound response wire types
//! - [`servo`] - Servo driver trait, driver config and hardware errors
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use pantilt_common::prelude::*;
//!
//! let update = TargetUpdate { pan: Some(45.0), tilt: None };
//! let mut target = PanTilt::default();
//! target.apply(update);
//! assert_eq!(target, PanTilt::new(45.0, 0.0));
//! ```

pub mod command;
pub mod config;
pub mod consts;
pub mod position;
pub mod prelude;
pub mod servo;
