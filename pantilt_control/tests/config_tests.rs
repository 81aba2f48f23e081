//! Configuration file loading tests.

use std::io::Write;
use std::path::Path;

use pantilt_common::config::{ConfigError, LogLevel};
use pantilt_common::position::Axis;
use pantilt_control::config::{ControllerConfig, load_config, parse_config};
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn shipped_config_is_valid() {
    let config = parse_config(include_str!("../../config/pantilt.toml")).unwrap();
    assert_eq!(config.driver.name, "pca9685");
    assert_eq!(config.driver.address, 0x40);
    assert_eq!(config.axes.tilt.min_angle, -45.0);
    assert_eq!(config.filter_params(Axis::Tilt).kd, 0.05);
    assert_eq!(config.filter_params(Axis::Pan).kd, 0.1);
}

#[test]
fn loads_from_file() {
    let file = write_config(
        r#"
[shared]
log_level = "debug"

[control]
cycle_time_ms = 10
max_speed = 1.5

[server]
bind = "127.0.0.1:9000"
"#,
    );

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.shared.log_level, LogLevel::Debug);
    assert_eq!(config.control.cycle_time_ms, 10);
    assert!((config.filter_params(Axis::Pan).dt - 0.01).abs() < 1e-12);
    assert_eq!(config.control.max_speed, 1.5);
    assert_eq!(config.server.bind, "127.0.0.1:9000");
}

#[test]
fn empty_file_is_the_default_config() {
    let file = write_config("");
    assert_eq!(load_config(file.path()).unwrap(), ControllerConfig::default());
}

#[test]
fn missing_file() {
    assert!(matches!(
        load_config(Path::new("/nonexistent/pantilt.toml")),
        Err(ConfigError::FileNotFound)
    ));
}

#[test]
fn syntax_error_is_a_parse_error() {
    let file = write_config("[control\ncycle_time_ms = 20\n");
    assert!(matches!(
        load_config(file.path()),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn semantic_error_is_a_validation_error() {
    let file = write_config("[axes.pan]\nmin_angle = 0.0\nmax_angle = 0.0\n");
    match load_config(file.path()) {
        Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("axes.pan")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn wrong_value_type_is_a_parse_error() {
    let file = write_config("[filter]\nkp = \"fast\"\n");
    assert!(matches!(
        load_config(file.path()),
        Err(ConfigError::ParseError(_))
    ));
}
