//! WebAssembly bindings for courier-core.
//!
//! Exposes the pure pipeline stages to a browser extension. Everything
//! crosses the boundary as JSON text.

use serde_json::json;
use wasm_bindgen::prelude::*;

use crate::{ClipboardPayload, Sanitizer, VersionResolver};

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn decode_ours(text: &str) -> Result<ClipboardPayload, String> {
    ClipboardPayload::decode(text)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "Not an element-courier payload".to_string())
}

/// Decode clipboard text. Returns the payload as JSON, or `"null"` for
/// foreign clipboard content.
///
/// # Errors
///
/// Returns an error string for a marked payload without usable data.
#[wasm_bindgen(js_name = decodePayload)]
pub fn decode_payload(text: &str) -> Result<String, String> {
    match ClipboardPayload::decode(text).map_err(|e| e.to_string())? {
        Some(payload) => payload.encode().map_err(|e| e.to_string()),
        None => Ok("null".to_string()),
    }
}

/// Sanitize a payload. Returns `{ payload, report }`.
///
/// # Errors
///
/// Returns an error string if the text is not one of our payloads.
#[wasm_bindgen(js_name = sanitizePayload)]
pub fn sanitize_payload(text: &str) -> Result<String, String> {
    let payload = decode_ours(text)?;
    let (payload, report) = Sanitizer::new().sanitize_payload(&payload);
    serde_json::to_string(&json!({ "payload": payload, "report": report }))
        .map_err(|e| e.to_string())
}

/// Sanitize and convert a payload for `target_version`. Returns
/// `{ payload, rulesApplied, compatibility, noticeLevel }`.
///
/// # Errors
///
/// Returns an error string if the text is not one of our payloads.
#[wasm_bindgen(js_name = convertPayload)]
pub fn convert_payload(text: &str, target_version: &str) -> Result<String, String> {
    let payload = decode_ours(text)?;
    let (mut payload, _) = Sanitizer::new().sanitize_payload(&payload);
    let result = VersionResolver::new().convert(
        &payload.data,
        &payload.metadata.source_builder_version,
        target_version,
    );
    let notice_level = result.notice_level();
    payload.data = result.tree;
    // The tree is now in the target's dialect.
    payload.metadata.source_builder_version = target_version.to_string();
    serde_json::to_string(&json!({
        "payload": payload,
        "rulesApplied": result.rules_applied,
        "compatibility": result.compatibility,
        "noticeLevel": notice_level,
    }))
    .map_err(|e| e.to_string())
}

/// Check version compatibility. Returns `{ compatible, warning, message,
/// classification }`.
#[wasm_bindgen(js_name = checkCompatibility)]
#[must_use]
pub fn check_compatibility(source_version: &str, target_version: &str) -> String {
    let compatibility = VersionResolver::new().is_compatible(source_version, target_version);
    serde_json::to_string(&compatibility).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ElementNode, PayloadMetadata};

    fn payload_text(version: &str) -> String {
        let tree = ElementNode::widget("icon")
            .with_id("w1")
            .with_setting("icon", "fa fa-star")
            .with_setting("title", "<b>x</b><script>alert(1)</script>");
        ClipboardPayload::new(tree, vec![], PayloadMetadata::now("https://a.example", version))
            .encode()
            .expect("encode")
    }

    #[test]
    fn decode_payload_returns_null_for_foreign_text() {
        assert_eq!(decode_payload("hello").expect("decode"), "null");
    }

    #[test]
    fn decode_payload_returns_payload_json() {
        let json = decode_payload(&payload_text("3.1.0")).expect("decode");
        assert!(json.contains("\"elementKind\":\"widget\""));
    }

    #[test]
    fn sanitize_payload_strips_script() {
        let json = sanitize_payload(&payload_text("3.1.0")).expect("sanitize");
        assert!(!json.contains("<script"));
        assert!(json.contains("\"report\""));
    }

    #[test]
    fn sanitize_payload_rejects_foreign_text() {
        assert!(sanitize_payload("{}").is_err());
    }

    #[test]
    fn convert_payload_applies_rules() {
        let json = convert_payload(&payload_text("2.9.0"), "3.2.0").expect("convert");
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(value["rulesApplied"], 1);
        assert_eq!(value["noticeLevel"], "warning");
        assert!(value["payload"]["data"]["settings"]["selected_icon"].is_string());
        assert_eq!(value["payload"]["metadata"]["sourceBuilderVersion"], "3.2.0");

        let again = convert_payload(&value["payload"].to_string(), "3.2.0").expect("convert");
        let again: serde_json::Value = serde_json::from_str(&again).expect("json");
        assert_eq!(again["rulesApplied"], 0);
    }

    #[test]
    fn check_compatibility_returns_json() {
        let json = check_compatibility("3.0.0", "3.4.1");
        assert!(json.contains("\"compatible\":true"));
    }
}
