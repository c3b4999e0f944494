//! Clipboard payload: the versioned, self-describing wire unit.
//!
//! ```json
//! {
//!   "formatVersion": "1.0.0",
//!   "marker": { "source": "element-courier", "schemaVersion": "1.0.0", "timestampMs": 0 },
//!   "elementKind": "section",
//!   "data": { "id": "...", "elType": "section", "settings": {}, "elements": [] },
//!   "media": [],
//!   "metadata": { "sourceOrigin": "https://...", "capturedAtIso8601": "...", "sourceBuilderVersion": "3.21.0" }
//! }
//! ```
//!
//! The marker is how our own clipboard writes are told apart from anything
//! else on the clipboard. Text without it is foreign and decodes to `None`.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::element::{ElementKind, ElementNode, Settings};
use crate::error::PayloadError;
use crate::limits::validate_payload_size;
use crate::media::MediaReference;

/// Payload schema version, independent of any builder version.
pub const FORMAT_VERSION: &str = "1.0.0";
/// Marker schema version.
pub const SCHEMA_VERSION: &str = "1.0.0";
/// Constant source tag stamped into every payload we write.
pub const MARKER_SOURCE: &str = "element-courier";

/// Sentinel sub-object identifying our payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    /// Always [`MARKER_SOURCE`] for payloads we wrote.
    pub source: String,
    /// Marker schema version.
    pub schema_version: String,
    /// Write time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl Marker {
    /// Stamp a fresh marker.
    #[must_use]
    pub fn stamp() -> Self {
        Self {
            source: MARKER_SOURCE.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            timestamp_ms: current_timestamp_ms(),
        }
    }

    /// Whether this marker carries our exact source tag.
    #[must_use]
    pub fn is_ours(&self) -> bool {
        self.source == MARKER_SOURCE
    }
}

/// Where and when a payload was captured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMetadata {
    /// Origin URL of the source page.
    #[serde(default)]
    pub source_origin: String,
    /// Capture time as RFC 3339 / ISO 8601.
    #[serde(default, rename = "capturedAtIso8601")]
    pub captured_at_iso8601: String,
    /// Builder version on the source site (may be empty when unknown).
    #[serde(default)]
    pub source_builder_version: String,
}

impl PayloadMetadata {
    /// Metadata captured now.
    #[must_use]
    pub fn now(source_origin: impl Into<String>, source_builder_version: impl Into<String>) -> Self {
        Self {
            source_origin: source_origin.into(),
            captured_at_iso8601: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            source_builder_version: source_builder_version.into(),
        }
    }
}

/// The clipboard transport unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardPayload {
    /// Payload schema version.
    pub format_version: String,
    /// Ownership marker.
    pub marker: Marker,
    /// Kind of the root node.
    pub element_kind: ElementKind,
    /// The element tree.
    pub data: ElementNode,
    /// Media referenced by the tree.
    #[serde(default)]
    pub media: Vec<MediaReference>,
    /// Capture metadata.
    #[serde(default)]
    pub metadata: PayloadMetadata,
    /// Content scraped from rendered output, keyed by node id, kept for
    /// manual recovery.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rendered_content: BTreeMap<String, Settings>,
}

impl ClipboardPayload {
    /// Wrap a tree in a freshly stamped payload.
    #[must_use]
    pub fn new(data: ElementNode, media: Vec<MediaReference>, metadata: PayloadMetadata) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            marker: Marker::stamp(),
            element_kind: data.element_kind(),
            data,
            media,
            metadata,
            rendered_content: BTreeMap::new(),
        }
    }

    /// Attach rendered-content scrapes.
    #[must_use]
    pub fn with_rendered_content(mut self, rendered: BTreeMap<String, Settings>) -> Self {
        self.rendered_content = rendered;
        self
    }

    /// Serialize to clipboard text.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<String, PayloadError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize for a human-readable manual export.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode_pretty(&self) -> Result<String, PayloadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode clipboard text.
    ///
    /// Returns `Ok(None)` for anything that is not one of our payloads:
    /// non-JSON text, JSON without the marker, or a marker with a different
    /// source tag. A payload that carries our marker but has no usable
    /// element data is an error.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::InvalidData`] for a marked payload whose
    /// `data` cannot be lifted into an element tree.
    pub fn decode(text: &str) -> Result<Option<Self>, PayloadError> {
        if validate_payload_size(text.len()).is_err() {
            tracing::debug!("Clipboard text too large to be a payload ({} bytes)", text.len());
            return Ok(None);
        }
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return Ok(None);
        };
        Self::from_value(&value)
    }

    /// Decode an already parsed JSON value. See [`ClipboardPayload::decode`].
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::InvalidData`] for a marked payload without
    /// usable element data.
    pub fn from_value(value: &Value) -> Result<Option<Self>, PayloadError> {
        let Some(marker) = read_marker(value) else {
            return Ok(None);
        };

        let data = value
            .get("data")
            .ok_or_else(|| PayloadError::InvalidData("missing data".into()))?;
        let lifted = ElementNode::from_value_lossy(data)
            .ok_or_else(|| PayloadError::InvalidData("data is not an element".into()))?;
        if lifted.degraded > 0 {
            tracing::warn!(
                "Payload data degraded while decoding ({} members dropped)",
                lifted.degraded
            );
        }
        let data = lifted.node;

        let media = value
            .get("media")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|m| serde_json::from_value::<MediaReference>(m.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        let metadata = value
            .get("metadata")
            .cloned()
            .and_then(|m| serde_json::from_value::<PayloadMetadata>(m).ok())
            .unwrap_or_default();

        let rendered_content = value
            .get("renderedContent")
            .cloned()
            .and_then(|r| serde_json::from_value::<BTreeMap<String, Settings>>(r).ok())
            .unwrap_or_default();

        let element_kind = value
            .get("elementKind")
            .and_then(Value::as_str)
            .and_then(ElementKind::parse)
            .filter(|k| *k == data.element_kind())
            .unwrap_or_else(|| data.element_kind());

        let format_version = value
            .get("formatVersion")
            .and_then(Value::as_str)
            .unwrap_or(FORMAT_VERSION)
            .to_string();

        Ok(Some(Self {
            format_version,
            marker,
            element_kind,
            data,
            media,
            metadata,
            rendered_content,
        }))
    }
}

/// Read the marker, returning `None` unless it is an object with our exact
/// source tag.
fn read_marker(value: &Value) -> Option<Marker> {
    let marker = value.get("marker")?.as_object()?;
    let source = marker.get("source")?.as_str()?;
    if source != MARKER_SOURCE {
        return None;
    }
    Some(Marker {
        source: source.to_string(),
        schema_version: marker
            .get("schemaVersion")
            .and_then(Value::as_str)
            .unwrap_or(SCHEMA_VERSION)
            .to_string(),
        timestamp_ms: marker
            .get("timestampMs")
            .and_then(Value::as_u64)
            .unwrap_or(0),
    })
}

/// Get the current Unix timestamp in milliseconds.
#[must_use]
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| {
        // Timestamp will not exceed u64 max for millennia
        #[allow(clippy::cast_possible_truncation)]
        {
            d.as_millis() as u64
        }
    })
}
