//! Shared target / current position.
//!
//! Command handlers write the target; the control loop is the only writer of
//! the current position. Both pairs are always read and written whole, so a
//! reader never sees the pan of one write combined with the tilt of another.

use pantilt_common::position::{PanTilt, TargetUpdate};
use parking_lot::Mutex;
use static_assertions::assert_impl_all;

/// Target and current position shared between the loop and command handlers.
#[derive(Debug)]
pub struct SharedPosition {
    target: Mutex<PanTilt>,
    current: Mutex<PanTilt>,
}

assert_impl_all!(SharedPosition: Send, Sync);

impl SharedPosition {
    /// Start with target and current both at `home`.
    pub fn new(home: PanTilt) -> Self {
        Self {
            target: Mutex::new(home),
            current: Mutex::new(home),
        }
    }

    /// Apply a partial target update; absent axes keep their value.
    ///
    /// Returns the resulting target.
    pub fn set_target(&self, update: TargetUpdate) -> PanTilt {
        let mut target = self.target.lock();
        target.apply(update);
        *target
    }

    /// Snapshot of the current position.
    pub fn get_position(&self) -> PanTilt {
        *self.current.lock()
    }

    /// Snapshot of the target.
    pub fn read_target(&self) -> PanTilt {
        *self.target.lock()
    }

    /// Publish a new current position. Called by the control loop only.
    pub fn write_current(&self, current: PanTilt) {
        *self.current.lock() = current;
    }
}

impl Default for SharedPosition {
    fn default() -> Self {
        Self::new(PanTilt::default())
    }
}
