//! Reusable field filters
//!
//! These filters transform field values before validation

use serde_json::Value;

/// Filter: trim whitespace from string
pub fn trim() -> impl Fn(&str, Value) -> Value + Send + Sync + Clone {
    |_: &str, value: Value| match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trim_removes_whitespace() {
        let f = trim();
        assert_eq!(f("pizza", json!("  Margherita  ")), json!("Margherita"));
    }

    #[test]
    fn test_trim_non_string_passthrough() {
        let f = trim();
        assert_eq!(f("age", json!(42)), json!(42));
    }

    #[test]
    fn test_trim_empty_string() {
        let f = trim();
        assert_eq!(f("pizza", json!("   ")), json!(""));
    }

    #[test]
    fn test_trim_null_passthrough() {
        let f = trim();
        assert_eq!(f("pizza", json!(null)), json!(null));
    }
}
