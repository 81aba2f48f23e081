//! Command channel wire format.
//!
//! Inbound: a JSON object with optional numeric `pan` / `tilt` fields
//! (degrees). Unknown fields are ignored, `null` counts as absent.
//!
//! Outbound:
//!
//! ```json
//! {"status":"ok","position":{"pan":12.0,"tilt":-3.0}}
//! {"status":"error","message":"..."}
//! ```

use crate::position::{PanTilt, TargetUpdate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inbound command decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Payload was empty or whitespace only.
    #[error("empty command")]
    Empty,

    /// Payload is not a JSON object with numeric `pan` / `tilt` fields.
    #[error("malformed command: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Decode one inbound payload into a partial target update.
///
/// # Errors
/// `ParseError::Empty` for blank input, `ParseError::Malformed` for anything
/// that is not an object or carries a non-numeric `pan` / `tilt`.
pub fn decode_command(raw: &str) -> Result<TargetUpdate, ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ParseError::Empty);
    }
    let value: serde_json::Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Err(ParseError::Malformed(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    }
    Ok(TargetUpdate::deserialize(value)?)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Outbound response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    /// Command applied; `position` is the current (not target) position.
    Ok {
        /// Current position at response time.
        position: PanTilt,
    },
    /// Command rejected.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl Response {
    /// Success envelope carrying the current position.
    pub fn ok(position: PanTilt) -> Self {
        Self::Ok { position }
    }

    /// Error envelope from any displayable error.
    pub fn error(err: impl std::fmt::Display) -> Self {
        Self::Error {
            message: err.to_string(),
        }
    }

    /// Serialize to a single JSON line (without the trailing newline).
    pub fn to_json(&self) -> String {
        // Only non-string map keys make serde_json fail; none are emitted here.
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"status":"error","message":"response encoding failed: {e}"}}"#)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_both_axes() {
        let u = decode_command(r#"{"pan": 45, "tilt": -10.5}"#).unwrap();
        assert_eq!(u, TargetUpdate::both(45.0, -10.5));
    }

    #[test]
    fn decode_ignores_unknown_fields() {
        let u = decode_command(r#"{"tilt": 3, "speed": 9, "note": "x"}"#).unwrap();
        assert_eq!(u.pan, None);
        assert_eq!(u.tilt, Some(3.0));
    }

    #[test]
    fn decode_null_is_absent() {
        let u = decode_command(r#"{"pan": null}"#).unwrap();
        assert!(u.is_empty());
    }

    #[test]
    fn decode_empty_object_is_status_query() {
        assert!(decode_command("{}").unwrap().is_empty());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode_command("not json"), Err(ParseError::Malformed(_))));
        assert!(matches!(decode_command(r#"{"pan": "left"}"#), Err(ParseError::Malformed(_))));
        assert!(matches!(decode_command("[1, 2]"), Err(ParseError::Malformed(_))));
        assert_eq!(decode_command("   "), Err(ParseError::Empty));
    }

    #[test]
    fn ok_response_shape() {
        let json = Response::ok(PanTilt::new(1.5, -2.0)).to_json();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["position"]["pan"], 1.5);
        assert_eq!(v["position"]["tilt"], -2.0);
    }

    #[test]
    fn error_response_shape() {
        let json = Response::error(ParseError::Empty).to_json();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["status"], "error");
        assert_eq!(v["message"], "empty command");
    }

    #[test]
    fn response_parses_back() {
        let line = r#"{"status":"ok","position":{"pan":0.0,"tilt":3.0}}"#;
        let r: Response = serde_json::from_str(line).unwrap();
        assert_eq!(r, Response::ok(PanTilt::new(0.0, 3.0)));
    }
}
