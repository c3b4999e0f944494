//! # Element Courier Core
//!
//! Portable interchange of page-builder elements between sites through the
//! system clipboard. Pure, synchronous, no I/O; compiles to WASM.
//!
//! ## Pipeline
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌───────────┐   ┌──────────────┐
//! │ Extractor │──▶│ Clipboard    │──▶│ Sanitizer │──▶│ Version      │──▶ injector
//! │ native →  │   │ payload      │   │ untrusted │   │ resolver     │   (courier-
//! │ tree      │   │ encode/decode│   │ → safe    │   │ rules, notice│    transport)
//! └───────────┘   └──────────────┘   └───────────┘   └──────────────┘
//!        ElementNode trees flow downstream; every stage returns a new tree.
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod element;
pub mod error;
pub mod extract;
pub mod limits;
pub mod media;
pub mod payload;
pub mod sanitize;
pub mod version;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use element::{ElementKind, ElementNode, LiftedNode, NodeId, NodeKind, Settings, MAX_DEPTH};
pub use error::{ExtractionError, ExtractionResult, PayloadError};
pub use extract::{Extraction, Extractor, ExtractorConfig, Locator, NativeNode, SettingsSource};
pub use limits::LimitError;
pub use media::{collect_media, foreign_media, rewrite_media_urls, MediaReference, MediaType};
pub use payload::{
    ClipboardPayload, Marker, PayloadMetadata, FORMAT_VERSION, MARKER_SOURCE, SCHEMA_VERSION,
};
pub use sanitize::{SanitizeReport, Sanitized, Sanitizer, SanitizerConfig};
pub use version::{
    BuilderVersion, Classification, Compatibility, CompatibilityMatrix, ConversionResult,
    MigrationRule, NoticeLevel, RuleSet, VersionResolver,
};

/// Courier core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
