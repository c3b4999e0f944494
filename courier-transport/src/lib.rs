//! # Element Courier Transport
//!
//! The asynchronous half of element-courier: clipboard access with retry
//! and fallbacks, durable backup, the correlated request bridge and the
//! cascading injector.
//!
//! ## Paste path
//!
//! ```text
//! HostClipboard ──▶ ClipboardCodec::read ──▶ Sanitizer ──▶ VersionResolver
//!                   (marker check)                              │
//!                                                               ▼
//!  NotificationSink ◀── Notice ◀── Injector ──▶ TargetRuntime (direct or
//!                                  │            BridgedRuntime over
//!                                  │            RequestBridge)
//!                                  └─ all strategies failed ─▶ ManualExport
//! ```
//!
//! Every collaborator is a trait object handed to [`CopyPipeline`] or
//! [`PastePipeline`] at construction.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod inject;
pub mod notify;
pub mod pipeline;
pub mod retry;
pub mod storage;
pub mod target;

pub use bridge::{BridgeRequest, BridgeResponse, BridgeTransport, BridgedRuntime, RequestBridge};
pub use clipboard::{ClipboardCodec, CopyContext, HostClipboard, WriteMethod, WriteReport};
pub use config::{BridgeConfig, ClipboardConfig, InjectorConfig, TransportConfig};
pub use error::{
    BridgeError, ClipboardError, CopyError, FailureKind, InjectionError, PasteError, StorageError,
};
pub use inject::{
    ClipboardChannel, DirectViewInsertion, InjectionFailure, InjectionReport, InjectionStrategy,
    Injector, InjectorState, ManualExport, Progress, StrategyAttempt, StructuredCreate,
};
pub use notify::{Notice, NoticeAction, NotificationSink, TracingSink};
pub use pipeline::{CopyOutcome, CopyPipeline, PasteOutcome, PasteParts, PastePipeline};
pub use retry::RetryConfig;
pub use storage::{ErrorLog, ErrorLogEntry, FileStorage, MemoryStorage, Storage};
pub use target::{InsertionPoint, InsertionSource, TargetHandle, TargetRuntime};

/// Courier transport version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
