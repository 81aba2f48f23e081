//! Position types shared between the control loop and command ingestion.
//!
//! - `PanTilt` - an angle pair in degrees, always read and written as a unit
//! - `Axis` - selects one degree of freedom
//! - `TargetUpdate` - partial target write; `None` leaves the axis unchanged

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

/// One independently controlled degree of freedom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Horizontal rotation.
    Pan,
    /// Vertical rotation.
    Tilt,
}

impl Axis {
    /// Both axes in tick order.
    pub const ALL: [Axis; 2] = [Axis::Pan, Axis::Tilt];

    /// Lowercase name, as used in config tables and on the wire.
    pub const fn name(self) -> &'static str {
        match self {
            Axis::Pan => "pan",
            Axis::Tilt => "tilt",
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Pan/tilt angle pair [deg].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PanTilt {
    /// Pan angle [deg].
    pub pan: f64,
    /// Tilt angle [deg].
    pub tilt: f64,
}

// Two plain f64 fields; copied under a lock as a single value.
const_assert_eq!(core::mem::size_of::<PanTilt>(), 16);

impl PanTilt {
    /// Create a new pair.
    pub const fn new(pan: f64, tilt: f64) -> Self {
        Self { pan, tilt }
    }

    /// Value of one axis.
    #[inline]
    pub const fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Pan => self.pan,
            Axis::Tilt => self.tilt,
        }
    }

    /// Overwrite one axis.
    #[inline]
    pub fn set(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::Pan => self.pan = value,
            Axis::Tilt => self.tilt = value,
        }
    }

    /// Apply a partial update in place. Absent fields are left untouched.
    #[inline]
    pub fn apply(&mut self, update: TargetUpdate) {
        if let Some(pan) = update.pan {
            self.pan = pan;
        }
        if let Some(tilt) = update.tilt {
            self.tilt = tilt;
        }
    }
}

/// Partial target write coming from command ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetUpdate {
    /// New pan target [deg], or `None` to keep the current one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan: Option<f64>,
    /// New tilt target [deg], or `None` to keep the current one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tilt: Option<f64>,
}

impl TargetUpdate {
    /// Update both axes.
    pub const fn both(pan: f64, tilt: f64) -> Self {
        Self {
            pan: Some(pan),
            tilt: Some(tilt),
        }
    }

    /// Update a single axis.
    pub const fn axis(axis: Axis, value: f64) -> Self {
        match axis {
            Axis::Pan => Self {
                pan: Some(value),
                tilt: None,
            },
            Axis::Tilt => Self {
                pan: None,
                tilt: Some(value),
            },
        }
    }

    /// True if neither axis is set (a pure status query).
    pub const fn is_empty(&self) -> bool {
        self.pan.is_none() && self.tilt.is_none()
    }
}
