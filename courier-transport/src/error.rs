//! Error types for the transport layer.

use courier_core::ExtractionError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inject::InjectionFailure;

/// Clipboard access errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    /// Writing to the clipboard failed.
    #[error("Clipboard write failed: {0}")]
    WriteFailed(String),

    /// Reading the clipboard failed, or it holds one of our payloads that
    /// cannot be used.
    #[error("Clipboard read failed: {0}")]
    ReadFailed(String),

    /// The host refused access because the requesting context has no focus.
    #[error("Clipboard access denied without focus: {0}")]
    FocusDenied(String),

    /// A single clipboard operation did not finish in time.
    #[error("Clipboard operation timed out after {0}ms")]
    Timeout(u64),
}

impl ClipboardError {
    /// Returns true if another attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FocusDenied(_) | Self::Timeout(_))
    }
}

/// Category of an injection failure. Drives user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// The target runtime never became ready.
    TargetNotReady,
    /// No selection, container or document root to insert into.
    NoInsertionPoint,
    /// An operation exceeded its time budget.
    Timeout,
    /// The target does not expose the API a strategy needs.
    ApiUnavailable,
    /// Cross-context messaging failed.
    BridgeFailure,
    /// Anything else.
    Unknown,
}

impl FailureKind {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TargetNotReady => "target-not-ready",
            Self::NoInsertionPoint => "no-insertion-point",
            Self::Timeout => "timeout",
            Self::ApiUnavailable => "api-unavailable",
            Self::BridgeFailure => "bridge-failure",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a wire name; anything unrecognised is [`FailureKind::Unknown`].
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "target-not-ready" => Self::TargetNotReady,
            "no-insertion-point" => Self::NoInsertionPoint,
            "timeout" => Self::Timeout,
            "api-unavailable" => Self::ApiUnavailable,
            "bridge-failure" => Self::BridgeFailure,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the target runtime or an injection strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectionError {
    /// The target runtime is not ready.
    #[error("Target runtime not ready: {0}")]
    TargetNotReady(String),

    /// No insertion point could be resolved.
    #[error("No valid insertion point")]
    NoInsertionPoint,

    /// The operation exceeded its time budget.
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// The target does not provide the required API.
    #[error("Target API unavailable: {0}")]
    ApiUnavailable(String),

    /// Cross-context messaging failed.
    #[error("Bridge failure: {0}")]
    BridgeFailure(String),

    /// Anything else, including panics inside a strategy.
    #[error("Injection failed: {0}")]
    Unknown(String),
}

impl InjectionError {
    /// Failure category.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::TargetNotReady(_) => FailureKind::TargetNotReady,
            Self::NoInsertionPoint => FailureKind::NoInsertionPoint,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::ApiUnavailable(_) => FailureKind::ApiUnavailable,
            Self::BridgeFailure(_) => FailureKind::BridgeFailure,
            Self::Unknown(_) => FailureKind::Unknown,
        }
    }
}

/// Request/response bridge errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// No response arrived in time.
    #[error("Bridge request '{action}' timed out after {timeout_ms}ms")]
    Timeout {
        /// Action that was requested.
        action: String,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// The transport could not deliver the request.
    #[error("Bridge transport error: {0}")]
    Transport(String),

    /// The other side answered with an error.
    #[error("Remote error {code}: {message}")]
    Remote {
        /// Error code (a [`FailureKind`] wire name when the remote knows it).
        code: String,
        /// Human readable message.
        message: String,
    },

    /// The bridge was dropped while the request was pending.
    #[error("Bridge closed")]
    Closed,
}

impl From<BridgeError> for InjectionError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Remote { code, message } => match FailureKind::from_code(&code) {
                FailureKind::TargetNotReady => Self::TargetNotReady(message),
                FailureKind::NoInsertionPoint => Self::NoInsertionPoint,
                FailureKind::ApiUnavailable => Self::ApiUnavailable(message),
                FailureKind::Timeout => Self::Timeout(0),
                FailureKind::BridgeFailure => Self::BridgeFailure(message),
                FailureKind::Unknown => Self::Unknown(message),
            },
            other => Self::BridgeFailure(other.to_string()),
        }
    }
}

/// Durable storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors of the copy pipeline.
#[derive(Debug, Error)]
pub enum CopyError {
    /// Nothing usable at the requested location.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The payload could not be handed to the clipboard.
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
}

/// Errors of the paste pipeline.
#[derive(Debug, Error)]
pub enum PasteError {
    /// The clipboard could not be read.
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),

    /// The clipboard does not hold one of our payloads.
    #[error("Clipboard does not contain an element-courier payload")]
    NothingToPaste,

    /// Every strategy failed. The tree is kept in the failure for manual
    /// recovery.
    #[error("All injection strategies failed ({})", .0.kind)]
    Injection(Box<InjectionFailure>),
}
