//! Per-axis feedback filter: PID with a deadband, a snap-to-target zone,
//! a clamped integral and a damped derivative.
//!
//! Each [`FeedbackFilter::update`] call handles the error in a fixed order:
//!
//! 1. `|error| < snap_threshold` (checked on the raw error) clears the
//!    integral and the previous error and returns `0.0`.
//! 2. `|error| < deadband` makes the error exactly zero.
//! 3. `P + I + D` is returned on that error, where the integral is clamped to
//!    `±integral_clamp` after every accumulation and the derivative is scaled
//!    by [`DERIVATIVE_DAMPING`].
//!
//! Zero `ki` disables the integral contribution; zero `kd` disables the
//! derivative contribution. Neither changes the bookkeeping.

use pantilt_common::config::ConfigError;

/// Fixed scaling applied to the raw derivative before `kd`.
pub const DERIVATIVE_DAMPING: f64 = 0.2;

/// Default integral clamp [deg·s].
pub const DEFAULT_INTEGRAL_CLAMP: f64 = 30.0;

/// Default deadband [deg].
pub const DEFAULT_DEADBAND: f64 = 1.0;

/// Default snap-to-target threshold [deg].
pub const DEFAULT_SNAP_THRESHOLD: f64 = 2.0;

/// Filter parameters, fixed for the lifetime of a filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain (0 = disabled).
    pub ki: f64,
    /// Derivative gain (0 = disabled).
    pub kd: f64,
    /// Update period [s]. Must be positive.
    pub dt: f64,
    /// Symmetric bound on the integral accumulator.
    pub integral_clamp: f64,
    /// Errors smaller than this are treated as zero.
    pub deadband: f64,
    /// Errors smaller than this reset the filter and produce no output.
    pub snap_threshold: f64,
}

impl FilterParams {
    /// Gains and period with the default clamp, deadband and snap threshold.
    pub const fn new(kp: f64, ki: f64, kd: f64, dt: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            dt,
            integral_clamp: DEFAULT_INTEGRAL_CLAMP,
            deadband: DEFAULT_DEADBAND,
            snap_threshold: DEFAULT_SNAP_THRESHOLD,
        }
    }

    /// Check the parameters.
    ///
    /// # Errors
    /// `ConfigError::ValidationError` when `dt` is not a positive finite
    /// number, a gain is not finite, or a threshold is negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "filter dt must be positive and finite, got {}",
                self.dt
            )));
        }
        for (name, gain) in [("kp", self.kp), ("ki", self.ki), ("kd", self.kd)] {
            if !gain.is_finite() {
                return Err(ConfigError::ValidationError(format!(
                    "filter {name} must be finite, got {gain}"
                )));
            }
        }
        for (name, value) in [
            ("integral_clamp", self.integral_clamp),
            ("deadband", self.deadband),
            ("snap_threshold", self.snap_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "filter {name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Integral accumulator and previous error, carried across updates.
#[derive(Debug, Clone, Copy, Default)]
struct FilterState {
    integral: f64,
    prev_error: f64,
}

impl FilterState {
    #[inline]
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One axis worth of feedback filter.
#[derive(Debug, Clone)]
pub struct FeedbackFilter {
    params: FilterParams,
    state: FilterState,
}

impl FeedbackFilter {
    /// Create a filter with zeroed state.
    ///
    /// # Errors
    /// See [`FilterParams::validate`].
    pub fn new(params: FilterParams) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self {
            params,
            state: FilterState::default(),
        })
    }

    /// Compute the correction that moves `current` toward `target`.
    #[inline]
    pub fn update(&mut self, target: f64, current: f64) -> f64 {
        let p = &self.params;
        let raw_error = target - current;

        // Snap is judged on the raw error, before deadband shaping.
        if raw_error.abs() < p.snap_threshold {
            self.state.reset();
            return 0.0;
        }

        let error = if raw_error.abs() < p.deadband {
            0.0
        } else {
            raw_error
        };

        let p_term = p.kp * error;

        self.state.integral =
            (self.state.integral + error * p.dt).clamp(-p.integral_clamp, p.integral_clamp);
        let i_term = p.ki * self.state.integral;

        let derivative = (error - self.state.prev_error) / p.dt * DERIVATIVE_DAMPING;
        let d_term = p.kd * derivative;

        self.state.prev_error = error;

        p_term + i_term + d_term
    }

    /// Zero the integral and the previous error.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Current integral accumulator.
    pub fn integral(&self) -> f64 {
        self.state.integral
    }

    /// Deadband-shaped error seen by the previous non-snapped update.
    pub fn prev_error(&self) -> f64 {
        self.state.prev_error
    }

    /// Parameters this filter was built with.
    pub fn params(&self) -> &FilterParams {
        &self.params
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
