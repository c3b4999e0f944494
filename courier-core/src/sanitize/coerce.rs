//! Type coercion for well-known settings.
//!
//! The builder expects some settings to have a fixed JSON type. Payloads
//! produced by other tools (or by older builder versions) sometimes carry
//! the right value in the wrong type, e.g. `"_column_size": "50"`.

use serde_json::{Number, Value};

/// Type a known setting must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// A JSON number.
    Number,
    /// A JSON number or null.
    NumberOrNull,
    /// A JSON string.
    Text,
}

/// Expected type for a settings key, if the key is known.
#[must_use]
pub fn expected_type(key: &str) -> Option<Expected> {
    match key {
        "_column_size" => Some(Expected::Number),
        "_inline_size" => Some(Expected::NumberOrNull),
        "title" | "editor" | "text" | "html" | "header_size" | "align" | "description_text"
        | "title_text" => Some(Expected::Text),
        _ => None,
    }
}

fn number_from_str(s: &str) -> Option<Value> {
    let s = s.trim().trim_end_matches('%');
    if let Ok(int) = s.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Coerce `value` to the expected type.
///
/// Returns `None` when the value cannot be represented in that type; the
/// caller drops the setting.
#[must_use]
pub fn coerce(value: &Value, expected: Expected) -> Option<Value> {
    match (expected, value) {
        (Expected::Number, Value::Number(_)) => Some(value.clone()),
        (Expected::Number, Value::String(s)) => number_from_str(s),
        (Expected::Number, _) => None,

        (Expected::NumberOrNull, Value::Number(_) | Value::Null) => Some(value.clone()),
        (Expected::NumberOrNull, Value::String(s)) if s.trim().is_empty() => Some(Value::Null),
        (Expected::NumberOrNull, Value::String(s)) => number_from_str(s),
        (Expected::NumberOrNull, _) => None,

        (Expected::Text, Value::String(_)) => Some(value.clone()),
        (Expected::Text, Value::Number(n)) => Some(Value::String(n.to_string())),
        (Expected::Text, Value::Bool(true)) => Some(Value::String("yes".into())),
        (Expected::Text, Value::Bool(false) | Value::Null) => Some(Value::String(String::new())),
        (Expected::Text, _) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers() {
        assert_eq!(coerce(&json!("50"), Expected::Number), Some(json!(50)));
        assert_eq!(coerce(&json!(" 33.5% "), Expected::Number), Some(json!(33.5)));
        assert_eq!(coerce(&json!(25), Expected::Number), Some(json!(25)));
        assert_eq!(coerce(&json!("wide"), Expected::Number), None);
        assert_eq!(coerce(&json!(null), Expected::Number), None);
    }

    #[test]
    fn test_nullable_numbers() {
        assert_eq!(coerce(&json!(null), Expected::NumberOrNull), Some(json!(null)));
        assert_eq!(coerce(&json!(""), Expected::NumberOrNull), Some(json!(null)));
        assert_eq!(coerce(&json!("40"), Expected::NumberOrNull), Some(json!(40)));
        assert_eq!(coerce(&json!([1]), Expected::NumberOrNull), None);
    }

    #[test]
    fn test_text() {
        assert_eq!(coerce(&json!(12), Expected::Text), Some(json!("12")));
        assert_eq!(coerce(&json!(true), Expected::Text), Some(json!("yes")));
        assert_eq!(coerce(&json!(false), Expected::Text), Some(json!("")));
        assert_eq!(coerce(&json!({"a": 1}), Expected::Text), None);
    }

    #[test]
    fn test_known_keys() {
        assert_eq!(expected_type("_column_size"), Some(Expected::Number));
        assert_eq!(expected_type("title"), Some(Expected::Text));
        assert_eq!(expected_type("image"), None);
    }
}
