//! User-facing notices for copy and paste outcomes.

use courier_core::{Classification, ConversionResult, NoticeLevel};
use serde::Serialize;

use crate::clipboard::{WriteMethod, WriteReport};
use crate::error::FailureKind;
use crate::inject::InjectionReport;

/// Follow-up the UI can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoticeAction {
    /// Run the paste again.
    Retry,
    /// Reload the target page.
    Refresh,
    /// Paste the exported JSON through the builder's own import.
    ManualPaste,
    /// Save the exported JSON.
    DownloadJson,
}

/// External UI layer.
pub trait NotificationSink: Send + Sync {
    /// Show a notice.
    fn show(&self, level: NoticeLevel, title: &str, message: &str, actions: &[NoticeAction]);
}

/// Sink that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn show(&self, level: NoticeLevel, title: &str, message: &str, actions: &[NoticeAction]) {
        match level {
            NoticeLevel::Silent => tracing::debug!("{title}: {message}"),
            NoticeLevel::Info => tracing::info!("{title}: {message}"),
            NoticeLevel::Warning | NoticeLevel::Error => {
                tracing::warn!(?actions, "{title}: {message}");
            }
        }
    }
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Suggested follow-ups.
    pub actions: Vec<NoticeAction>,
}

impl Notice {
    fn new(level: NoticeLevel, title: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.to_string(),
            message: message.into(),
            actions: Vec::new(),
        }
    }

    /// Version notice proportionate to what the conversion did. `None` when
    /// both sides share a family and nothing was rewritten.
    #[must_use]
    pub fn for_conversion(result: &ConversionResult) -> Option<Self> {
        let level = result.notice_level();
        let c = &result.compatibility;
        let notice = match level {
            NoticeLevel::Silent => return None,
            NoticeLevel::Info => {
                let message = if result.rules_applied > 0 {
                    format!("{} ({} migrations applied)", c.message, result.rules_applied)
                } else {
                    c.message.clone()
                };
                Self::new(level, "Content converted", message)
            }
            NoticeLevel::Warning => {
                let title = if c.classification == Classification::Unknown {
                    "Unknown source version"
                } else {
                    "Version mismatch"
                };
                Self::new(level, title, c.message.clone())
            }
            NoticeLevel::Error => Self::new(level, "Incompatible versions", c.message.clone())
                .with_actions(&[NoticeAction::DownloadJson]),
        };
        Some(notice)
    }

    /// Paste failure with the next step that fits the failure.
    #[must_use]
    pub fn for_failure(kind: FailureKind) -> Self {
        let message = match kind {
            FailureKind::TargetNotReady => "The editor has not finished loading.",
            FailureKind::NoInsertionPoint => "Select a section or column to paste into.",
            FailureKind::Timeout => "The editor took too long to respond.",
            FailureKind::ApiUnavailable => "This editor does not accept pasted elements.",
            FailureKind::BridgeFailure => "Lost contact with the editor page.",
            FailureKind::Unknown => "Something went wrong while pasting.",
        };
        Self::new(NoticeLevel::Error, "Paste failed", message).with_actions(&suggested_actions(kind))
    }

    /// Successful paste.
    #[must_use]
    pub fn for_injection(report: &InjectionReport) -> Self {
        Self::new(
            NoticeLevel::Info,
            "Pasted",
            format!("{} element(s) pasted via {}", report.count, report.method),
        )
    }

    /// Copy outcome.
    #[must_use]
    pub fn for_write(report: &WriteReport) -> Self {
        match &report.method {
            WriteMethod::Clipboard | WriteMethod::LegacyCommand => {
                Self::new(NoticeLevel::Info, "Copied", "Element copied to the clipboard")
            }
            WriteMethod::ManualCopy { .. } => Self::new(
                NoticeLevel::Warning,
                "Copy needs your help",
                "The clipboard refused the element. Copy the JSON manually.",
            )
            .with_actions(&[NoticeAction::DownloadJson]),
        }
    }

    #[must_use]
    fn with_actions(mut self, actions: &[NoticeAction]) -> Self {
        self.actions.extend_from_slice(actions);
        self
    }

    /// Hand the notice to a sink. Silent notices are not shown.
    pub fn deliver(&self, sink: &dyn NotificationSink) {
        if self.level != NoticeLevel::Silent {
            sink.show(self.level, &self.title, &self.message, &self.actions);
        }
    }
}

/// Next steps for a failure category. Downloading the JSON is always offered.
#[must_use]
pub fn suggested_actions(kind: FailureKind) -> Vec<NoticeAction> {
    let primary = match kind {
        FailureKind::TargetNotReady | FailureKind::BridgeFailure => NoticeAction::Refresh,
        FailureKind::NoInsertionPoint | FailureKind::Timeout => NoticeAction::Retry,
        FailureKind::ApiUnavailable | FailureKind::Unknown => NoticeAction::ManualPaste,
    };
    vec![primary, NoticeAction::DownloadJson]
}
