//! Input limits for untrusted payloads.
//!
//! Everything read from a clipboard is untrusted. These validators are the
//! narrow checks the sanitizer applies before it looks at content.

use thiserror::Error;

/// Maximum length for node ids.
pub const MAX_NODE_ID_LEN: usize = 64;
/// Maximum length for widget type names.
pub const MAX_WIDGET_TYPE_LEN: usize = 64;
/// Maximum length for a settings key.
pub const MAX_SETTING_KEY_LEN: usize = 128;
/// Maximum length of any string setting value.
pub const MAX_TEXT_LEN: usize = 1_048_576; // 1MB
/// Maximum nodes per tree.
pub const MAX_NODES_PER_TREE: usize = 10_000;
/// Maximum size of clipboard text accepted for decoding.
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1_048_576;

/// Setting keys that would poison a JavaScript object prototype on the
/// target page.
const FORBIDDEN_KEYS: &[&str] = &["__proto__", "constructor", "prototype"];

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    /// Node id is empty, too long or has invalid characters.
    #[error("invalid node id (1-{MAX_NODE_ID_LEN} chars of [A-Za-z0-9_-])")]
    InvalidNodeId,
    /// Widget type is empty, too long or has invalid characters.
    #[error("invalid widget type (1-{MAX_WIDGET_TYPE_LEN} chars of [A-Za-z0-9_.-])")]
    InvalidWidgetType,
    /// Setting key is empty, too long or reserved.
    #[error("invalid setting key")]
    InvalidSettingKey,
    /// Payload text too large.
    #[error("payload too large (max {MAX_PAYLOAD_SIZE} bytes)")]
    PayloadTooLarge,
}

fn is_valid_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Validate a node id.
///
/// # Errors
///
/// Returns [`LimitError::InvalidNodeId`] if the id is empty, longer than
/// 64 characters, or contains anything besides ASCII alphanumerics, `-`, `_`.
pub fn validate_node_id(id: &str) -> Result<(), LimitError> {
    if id.is_empty() || id.len() > MAX_NODE_ID_LEN || !id.chars().all(is_valid_id_char) {
        return Err(LimitError::InvalidNodeId);
    }
    Ok(())
}

/// Validate a widget type name.
///
/// # Errors
///
/// Returns [`LimitError::InvalidWidgetType`] for empty, oversized or
/// non `[A-Za-z0-9_.-]` names.
pub fn validate_widget_type(widget_type: &str) -> Result<(), LimitError> {
    if widget_type.is_empty()
        || widget_type.len() > MAX_WIDGET_TYPE_LEN
        || !widget_type
            .chars()
            .all(|c| is_valid_id_char(c) || c == '.')
    {
        return Err(LimitError::InvalidWidgetType);
    }
    Ok(())
}

/// Validate a settings key.
///
/// # Errors
///
/// Returns [`LimitError::InvalidSettingKey`] for empty, oversized or
/// prototype-polluting keys, and for keys with control characters or angle
/// brackets.
pub fn validate_setting_key(key: &str) -> Result<(), LimitError> {
    if key.is_empty()
        || key.len() > MAX_SETTING_KEY_LEN
        || key.chars().any(|c| c.is_control() || c == '<' || c == '>')
        || FORBIDDEN_KEYS.contains(&key)
    {
        return Err(LimitError::InvalidSettingKey);
    }
    Ok(())
}

/// Validate payload size before parsing.
///
/// # Errors
///
/// Returns [`LimitError::PayloadTooLarge`] above 16MB.
pub fn validate_payload_size(size: usize) -> Result<(), LimitError> {
    if size > MAX_PAYLOAD_SIZE {
        return Err(LimitError::PayloadTooLarge);
    }
    Ok(())
}

/// Truncate a string to at most `max` bytes on a char boundary.
#[must_use]
pub fn truncate_text(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
