//! Controller configuration: TOML parsing and validation.
//!
//! One file describes the whole controller. Every table is optional and falls
//! back to the defaults below, so an empty file yields a working 50 Hz
//! controller on the simulation driver.
//!
//! ```toml
//! [shared]
//! log_level = "info"
//!
//! [control]
//! cycle_time_ms = 20
//! max_speed = 3.0
//!
//! [filter]
//! kp = 0.6
//! ki = 0.05
//! kd = 0.1
//! integral_clamp = 30.0
//! deadband = 1.0
//! snap_threshold = 2.0
//!
//! [axes.pan]
//! channel = 0
//! min_angle = -90.0
//! max_angle = 90.0
//!
//! [axes.tilt]
//! channel = 1
//! min_angle = -45.0
//! max_angle = 60.0
//! kp = 0.4          # per-axis override
//!
//! [driver]
//! name = "pca9685"
//! i2c_bus = "/dev/i2c-1"
//! address = 0x40
//! frequency_hz = 50
//!
//! [server]
//! bind = "0.0.0.0:8080"
//! ```

use std::path::Path;
use std::time::Duration;

use pantilt_common::config::{ConfigError, ConfigLoader, SharedConfig};
use pantilt_common::consts::{
    ANGLE_MAX_DEG, ANGLE_MIN_DEG, DEFAULT_BIND_ADDR, DEFAULT_CYCLE_TIME_MS, DEFAULT_MAX_SPEED,
    MAX_CHANNELS, PAN_CHANNEL, TILT_CHANNEL,
};
use pantilt_common::position::{Axis, PanTilt};
use pantilt_common::servo::config::DriverConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::control::filter::{
    DEFAULT_DEADBAND, DEFAULT_INTEGRAL_CLAMP, DEFAULT_SNAP_THRESHOLD, FilterParams,
};

// ─── Defaults ───────────────────────────────────────────────────────

/// Default proportional gain.
pub const DEFAULT_KP: f64 = 0.6;
/// Default integral gain.
pub const DEFAULT_KI: f64 = 0.05;
/// Default derivative gain.
pub const DEFAULT_KD: f64 = 0.1;

fn default_cycle_time_ms() -> u32 {
    DEFAULT_CYCLE_TIME_MS
}
fn default_max_speed() -> f64 {
    DEFAULT_MAX_SPEED
}
fn default_kp() -> f64 {
    DEFAULT_KP
}
fn default_ki() -> f64 {
    DEFAULT_KI
}
fn default_kd() -> f64 {
    DEFAULT_KD
}
fn default_integral_clamp() -> f64 {
    DEFAULT_INTEGRAL_CLAMP
}
fn default_deadband() -> f64 {
    DEFAULT_DEADBAND
}
fn default_snap_threshold() -> f64 {
    DEFAULT_SNAP_THRESHOLD
}
fn default_min_angle() -> f64 {
    ANGLE_MIN_DEG
}
fn default_max_angle() -> f64 {
    ANGLE_MAX_DEG
}
fn default_bind() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

// ─── Sections ───────────────────────────────────────────────────────

/// `[control]`: loop timing and slew limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoopConfig {
    /// Tick period [ms].
    #[serde(default = "default_cycle_time_ms")]
    pub cycle_time_ms: u32,
    /// Maximum position change per tick [deg].
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            cycle_time_ms: DEFAULT_CYCLE_TIME_MS,
            max_speed: DEFAULT_MAX_SPEED,
        }
    }
}

impl LoopConfig {
    /// Tick period.
    pub fn cycle_time(&self) -> Duration {
        Duration::from_millis(u64::from(self.cycle_time_ms))
    }

    /// Tick period [s], used as the filter `dt`.
    pub fn dt(&self) -> f64 {
        f64::from(self.cycle_time_ms) / 1000.0
    }
}

/// `[filter]`: gains shared by both axes unless overridden per axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    /// Proportional gain.
    #[serde(default = "default_kp")]
    pub kp: f64,
    /// Integral gain.
    #[serde(default = "default_ki")]
    pub ki: f64,
    /// Derivative gain.
    #[serde(default = "default_kd")]
    pub kd: f64,
    /// Integral accumulator bound.
    #[serde(default = "default_integral_clamp")]
    pub integral_clamp: f64,
    /// Error deadband [deg].
    #[serde(default = "default_deadband")]
    pub deadband: f64,
    /// Snap-to-target threshold [deg].
    #[serde(default = "default_snap_threshold")]
    pub snap_threshold: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            kp: DEFAULT_KP,
            ki: DEFAULT_KI,
            kd: DEFAULT_KD,
            integral_clamp: DEFAULT_INTEGRAL_CLAMP,
            deadband: DEFAULT_DEADBAND,
            snap_threshold: DEFAULT_SNAP_THRESHOLD,
        }
    }
}

/// `[axes.pan]` / `[axes.tilt]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisConfig {
    /// PWM channel; defaults to 0 for pan and 1 for tilt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u8>,
    /// Lower travel limit [deg].
    #[serde(default = "default_min_angle")]
    pub min_angle: f64,
    /// Upper travel limit [deg].
    #[serde(default = "default_max_angle")]
    pub max_angle: f64,
    /// Start-up target and current position [deg].
    #[serde(default)]
    pub home: f64,
    /// Overrides `[filter].kp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kp: Option<f64>,
    /// Overrides `[filter].ki`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ki: Option<f64>,
    /// Overrides `[filter].kd`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kd: Option<f64>,
    /// Overrides `[filter].integral_clamp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integral_clamp: Option<f64>,
    /// Overrides `[filter].deadband`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadband: Option<f64>,
    /// Overrides `[filter].snap_threshold`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snap_threshold: Option<f64>,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            channel: None,
            min_angle: ANGLE_MIN_DEG,
            max_angle: ANGLE_MAX_DEG,
            home: 0.0,
            kp: None,
            ki: None,
            kd: None,
            integral_clamp: None,
            deadband: None,
            snap_threshold: None,
        }
    }
}

impl AxisConfig {
    /// Effective PWM channel for `axis`.
    pub fn channel_for(&self, axis: Axis) -> u8 {
        self.channel.unwrap_or(match axis {
            Axis::Pan => PAN_CHANNEL,
            Axis::Tilt => TILT_CHANNEL,
        })
    }
}

/// `[axes]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxesConfig {
    /// Pan axis.
    #[serde(default)]
    pub pan: AxisConfig,
    /// Tilt axis.
    #[serde(default)]
    pub tilt: AxisConfig,
}

impl AxesConfig {
    /// Configuration of one axis.
    pub fn get(&self, axis: Axis) -> &AxisConfig {
        match axis {
            Axis::Pan => &self.pan,
            Axis::Tilt => &self.tilt,
        }
    }

    /// Start-up position of both axes.
    pub fn home(&self) -> PanTilt {
        PanTilt::new(self.pan.home, self.tilt.home)
    }
}

/// `[server]`: command channel listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address, `host:port`.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

// ─── Root ───────────────────────────────────────────────────────────

/// Complete controller configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    /// Log level and service name.
    #[serde(default)]
    pub shared: SharedConfig,
    /// Loop timing.
    #[serde(default)]
    pub control: LoopConfig,
    /// Default filter parameters.
    #[serde(default)]
    pub filter: FilterConfig,
    /// Per-axis limits, channels and overrides.
    #[serde(default)]
    pub axes: AxesConfig,
    /// Servo driver selection.
    #[serde(default)]
    pub driver: DriverConfig,
    /// Command channel.
    #[serde(default)]
    pub server: ServerConfig,
}

impl ControllerConfig {
    /// Effective filter parameters for `axis`, with per-axis overrides applied.
    pub fn filter_params(&self, axis: Axis) -> FilterParams {
        let f = &self.filter;
        let a = self.axes.get(axis);
        FilterParams {
            kp: a.kp.unwrap_or(f.kp),
            ki: a.ki.unwrap_or(f.ki),
            kd: a.kd.unwrap_or(f.kd),
            dt: self.control.dt(),
            integral_clamp: a.integral_clamp.unwrap_or(f.integral_clamp),
            deadband: a.deadband.unwrap_or(f.deadband),
            snap_threshold: a.snap_threshold.unwrap_or(f.snap_threshold),
        }
    }

    /// Validate every section.
    ///
    /// # Errors
    /// `ConfigError::ValidationError` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.control.cycle_time_ms == 0 {
            return Err(invalid("control.cycle_time_ms must be greater than 0"));
        }
        if !self.control.max_speed.is_finite() || self.control.max_speed <= 0.0 {
            return Err(invalid(format!(
                "control.max_speed must be positive and finite, got {}",
                self.control.max_speed
            )));
        }

        let mut channels = Vec::with_capacity(Axis::ALL.len());
        for axis in Axis::ALL {
            let a = self.axes.get(axis);

            let params = self.filter_params(axis);
            params.validate().map_err(|e| match e {
                ConfigError::ValidationError(msg) => invalid(format!("axes.{axis}: {msg}")),
                other => other,
            })?;
            // Zero snap would let a zero error feed the integral.
            if params.snap_threshold <= 0.0 {
                return Err(invalid(format!(
                    "axes.{axis}: snap_threshold must be greater than 0"
                )));
            }

            if !a.min_angle.is_finite() || !a.max_angle.is_finite() || a.min_angle >= a.max_angle {
                return Err(invalid(format!(
                    "axes.{axis}: min_angle ({}) must be below max_angle ({})",
                    a.min_angle, a.max_angle
                )));
            }
            if !(a.min_angle..=a.max_angle).contains(&a.home) {
                return Err(invalid(format!(
                    "axes.{axis}: home {} is outside [{}, {}]",
                    a.home, a.min_angle, a.max_angle
                )));
            }

            let channel = a.channel_for(axis);
            if channel >= MAX_CHANNELS {
                return Err(invalid(format!(
                    "axes.{axis}: channel {channel} exceeds the {MAX_CHANNELS} available"
                )));
            }
            if channels.contains(&channel) {
                return Err(invalid(format!(
                    "axes.{axis}: channel {channel} is already used by another axis"
                )));
            }
            channels.push(channel);
        }

        self.driver.validate()?;

        if self.server.bind.trim().is_empty() {
            return Err(invalid("server.bind cannot be empty"));
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

/// Parse and validate an in-memory TOML document.
///
/// # Errors
/// `ConfigError::ParseError` on TOML errors, `ConfigError::ValidationError`
/// on semantic errors.
pub fn parse_config(content: &str) -> Result<ControllerConfig, ConfigError> {
    let config = ControllerConfig::from_toml_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load and validate a configuration file.
///
/// # Errors
/// `ConfigError::FileNotFound`, `ConfigError::ParseError` or
/// `ConfigError::ValidationError`.
pub fn load_config(path: &Path) -> Result<ControllerConfig, ConfigError> {
    let config = ControllerConfig::load(path)?;
    config.validate()?;
    info!(
        "Loaded {}: cycle_time={}ms, max_speed={}, driver={}",
        path.display(),
        config.control.cycle_time_ms,
        config.control.max_speed,
        config.driver.name
    );
    Ok(config)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.control.cycle_time(), Duration::from_millis(20));
        assert!((config.control.dt() - 0.02).abs() < 1e-12);
        assert_eq!(config.axes.pan.channel_for(Axis::Pan), 0);
        assert_eq!(config.axes.tilt.channel_for(Axis::Tilt), 1);
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.driver.name, "simulation");
    }

    #[test]
    fn default_filter_params() {
        let params = ControllerConfig::default().filter_params(Axis::Pan);
        assert_eq!(params, FilterParams::new(0.6, 0.05, 0.1, 0.02));
    }

    #[test]
    fn per_axis_override() {
        let config = parse_config(
            r#"
[filter]
kp = 0.5

[axes.tilt]
kp = 0.3
snap_threshold = 1.5
"#,
        )
        .unwrap();
        assert_eq!(config.filter_params(Axis::Pan).kp, 0.5);
        assert_eq!(config.filter_params(Axis::Tilt).kp, 0.3);
        assert_eq!(config.filter_params(Axis::Tilt).snap_threshold, 1.5);
        assert_eq!(config.filter_params(Axis::Tilt).ki, DEFAULT_KI);
    }

    #[test]
    fn tilt_section_keeps_tilt_channel() {
        let config = parse_config("[axes.tilt]\nhome = 10.0\n").unwrap();
        assert_eq!(config.axes.tilt.channel_for(Axis::Tilt), 1);
        assert_eq!(config.axes.home(), PanTilt::new(0.0, 10.0));
    }

    #[test]
    fn rejects_zero_cycle_time() {
        let err = parse_config("[control]\ncycle_time_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("cycle_time_ms"));
    }

    #[test]
    fn rejects_non_positive_max_speed() {
        assert!(parse_config("[control]\nmax_speed = 0.0\n").is_err());
        assert!(parse_config("[control]\nmax_speed = -1.0\n").is_err());
    }

    #[test]
    fn rejects_zero_snap_threshold() {
        let err = parse_config("[filter]\nsnap_threshold = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("snap_threshold"));
    }

    #[test]
    fn rejects_negative_deadband() {
        assert!(parse_config("[axes.pan]\ndeadband = -1.0\n").is_err());
    }

    #[test]
    fn rejects_inverted_range_and_home_outside() {
        assert!(parse_config("[axes.pan]\nmin_angle = 10.0\nmax_angle = -10.0\n").is_err());
        let err = parse_config("[axes.tilt]\nmax_angle = 45.0\nhome = 60.0\n").unwrap_err();
        assert!(err.to_string().contains("home"));
    }

    #[test]
    fn rejects_shared_channel() {
        let err = parse_config("[axes.tilt]\nchannel = 0\n").unwrap_err();
        assert!(err.to_string().contains("already used"));
    }

    #[test]
    fn rejects_channel_out_of_range() {
        assert!(parse_config("[axes.pan]\nchannel = 16\n").is_err());
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(matches!(
            parse_config("[control]\ncycle_ms = 20\n"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn rejects_bad_driver_frequency() {
        assert!(parse_config("[driver]\nfrequency_hz = 5\n").is_err());
    }

    #[test]
    fn rejects_empty_bind() {
        assert!(parse_config("[server]\nbind = \"\"\n").is_err());
    }
}
