//! Reusable field validators
//!
//! Each validator receives the field name and its (already filtered) value
//! and returns a human-readable message on failure.

use serde_json::Value;
use validator::ValidateLength;

/// Validator: field is present, is text and is not empty
pub fn required() -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    |field: &str, value: &Value| match value {
        Value::Null => Err(format!("{} is required", field)),
        Value::String(s) if s.is_empty() => Err(format!("{} is required", field)),
        Value::String(_) => Ok(()),
        _ => Err(format!("{} must be a string", field)),
    }
}

/// Validator: string length (in characters) must be within range
pub fn string_length(
    min: u64,
    max: u64,
) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| {
        if let Some(s) = value.as_str() {
            if s.validate_length(Some(min), Some(max), None) {
                Ok(())
            } else {
                Err(format!(
                    "{} must be between {} and {} characters",
                    field, min, max
                ))
            }
        } else {
            Ok(())
        }
    }
}

/// Validator: string must have exactly `len` characters
pub fn exact_length(
    len: u64,
    message: &'static str,
) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |_: &str, value: &Value| {
        if let Some(s) = value.as_str() {
            if s.validate_length(None, None, Some(len)) {
                Ok(())
            } else {
                Err(message.to_string())
            }
        } else {
            Ok(())
        }
    }
}

/// Validator: value must be in allowed list
pub fn in_list(
    allowed: Vec<&'static str>,
) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| {
        if let Some(s) = value.as_str() {
            if allowed.contains(&s) {
                Ok(())
            } else {
                Err(format!("{} must be one of: {}", field, allowed.join(", ")))
            }
        } else {
            Ok(())
        }
    }
}
