//! Copy and paste entry points.
//!
//! All collaborators are passed in at construction; nothing is looked up
//! from ambient state.

use std::collections::HashSet;
use std::sync::Arc;

use courier_core::{
    collect_media, ClipboardPayload, Compatibility, Extraction, Extractor, Locator, NativeNode,
    NoticeLevel, SanitizeReport, Sanitizer, VersionResolver,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clipboard::{ClipboardCodec, CopyContext, WriteReport};
use crate::error::{CopyError, PasteError};
use crate::inject::{InjectionFailure, InjectionReport, Injector, ManualExport};
use crate::notify::{Notice, NoticeAction, NotificationSink};
use crate::storage::{ErrorLog, ErrorLogEntry};
use crate::target::TargetRuntime;

/// Source-page side: extract, stamp, write.
pub struct CopyPipeline {
    extractor: Extractor,
    codec: ClipboardCodec,
    sink: Arc<dyn NotificationSink>,
    error_log: ErrorLog,
}

impl std::fmt::Debug for CopyPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyPipeline")
            .field("extractor", &self.extractor)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

/// Result of a copy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyOutcome {
    /// Nodes in the copied tree.
    pub node_count: usize,
    /// Media references collected.
    pub media_count: usize,
    /// Nodes whose content was scraped from rendered output.
    pub rendered_count: usize,
    /// How the clipboard write went.
    pub write: WriteReport,
}

impl CopyPipeline {
    /// Assemble a copy pipeline.
    #[must_use]
    pub fn new(
        extractor: Extractor,
        codec: ClipboardCodec,
        sink: Arc<dyn NotificationSink>,
        error_log: ErrorLog,
    ) -> Self {
        Self {
            extractor,
            codec,
            sink,
            error_log,
        }
    }

    /// Copy the node found for `role`.
    ///
    /// # Errors
    ///
    /// See [`CopyPipeline::copy`].
    pub async fn copy_role<L: Locator>(
        &self,
        locator: &L,
        role: &str,
        context: &CopyContext,
    ) -> Result<CopyOutcome, CopyError> {
        match self.extractor.extract_role(locator, role) {
            Ok(extraction) => self.finish(extraction, context).await,
            Err(e) => Err(self.fail(e.into()).await),
        }
    }

    /// Extract `native` and write it to the clipboard.
    ///
    /// # Errors
    ///
    /// Returns [`CopyError::Extraction`] if nothing usable was found and
    /// [`CopyError::Clipboard`] if the payload could not be serialized.
    /// Clipboard refusals are not errors: they end in a manual-copy report.
    pub async fn copy<N: NativeNode>(
        &self,
        native: &N,
        context: &CopyContext,
    ) -> Result<CopyOutcome, CopyError> {
        match self.extractor.extract(native) {
            Ok(extraction) => self.finish(extraction, context).await,
            Err(e) => Err(self.fail(e.into()).await),
        }
    }

    #[tracing::instrument(name = "copy", skip_all, fields(origin = %context.source_origin))]
    async fn finish(
        &self,
        extraction: Extraction,
        context: &CopyContext,
    ) -> Result<CopyOutcome, CopyError> {
        for warning in &extraction.warnings {
            warn!("Extraction: {warning}");
        }
        let rendered_count = extraction.rendered_content.len();
        let payload = extraction.into_payload(context.metadata());
        let node_count = payload.data.node_count();
        let media_count = payload.media.len();

        let write = match self.codec.write_payload(&payload).await {
            Ok(write) => write,
            Err(e) => return Err(self.fail(e.into()).await),
        };
        Notice::for_write(&write).deliver(self.sink.as_ref());
        info!("Copied {node_count} nodes with {media_count} media references");
        Ok(CopyOutcome {
            node_count,
            media_count,
            rendered_count,
            write,
        })
    }

    async fn fail(&self, error: CopyError) -> CopyError {
        warn!("Copy failed: {error}");
        self.error_log
            .record(ErrorLogEntry::new("copy", None, error.to_string()))
            .await;
        self.sink.show(
            NoticeLevel::Error,
            "Copy failed",
            &error.to_string(),
            &[NoticeAction::Retry],
        );
        error
    }
}

/// Result of a paste.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasteOutcome {
    /// What the injector did.
    pub injection: InjectionReport,
    /// What the sanitizer changed.
    pub sanitize: SanitizeReport,
    /// Migration rules that fired.
    pub rules_applied: usize,
    /// Version compatibility of source and target.
    pub compatibility: Compatibility,
}

/// Target-page side: read, sanitize, convert, inject.
pub struct PastePipeline {
    codec: ClipboardCodec,
    sanitizer: Sanitizer,
    resolver: VersionResolver,
    injector: Injector,
    runtime: Arc<dyn TargetRuntime>,
    sink: Arc<dyn NotificationSink>,
    error_log: ErrorLog,
    target_version: String,
}

impl std::fmt::Debug for PastePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PastePipeline")
            .field("injector", &self.injector)
            .field("target_version", &self.target_version)
            .finish_non_exhaustive()
    }
}

/// Collaborators of a [`PastePipeline`].
pub struct PasteParts {
    /// Clipboard access.
    pub codec: ClipboardCodec,
    /// Payload sanitizer.
    pub sanitizer: Sanitizer,
    /// Version resolver.
    pub resolver: VersionResolver,
    /// Injection cascade.
    pub injector: Injector,
    /// Target runtime.
    pub runtime: Arc<dyn TargetRuntime>,
    /// UI layer.
    pub sink: Arc<dyn NotificationSink>,
    /// Failure log.
    pub error_log: ErrorLog,
}

impl PastePipeline {
    /// Assemble a paste pipeline for a target running `target_version`.
    #[must_use]
    pub fn new(parts: PasteParts, target_version: impl Into<String>) -> Self {
        Self {
            codec: parts.codec,
            sanitizer: parts.sanitizer,
            resolver: parts.resolver,
            injector: parts.injector,
            runtime: parts.runtime,
            sink: parts.sink,
            error_log: parts.error_log,
            target_version: target_version.into(),
        }
    }

    /// Paste the payload the clipboard holds.
    ///
    /// # Errors
    ///
    /// Returns [`PasteError::Clipboard`] if the clipboard cannot be read,
    /// [`PasteError::NothingToPaste`] if it holds no payload of ours and
    /// [`PasteError::Injection`] with the manual export if every strategy
    /// fails.
    pub async fn paste(&self) -> Result<PasteOutcome, PasteError> {
        let payload = match self.codec.read().await {
            Ok(Some(payload)) => payload,
            Ok(None) => return Err(self.nothing_to_paste()),
            Err(e) => {
                warn!("Clipboard read failed: {e}");
                self.error_log
                    .record(ErrorLogEntry::new("paste", None, e.to_string()))
                    .await;
                self.sink.show(
                    NoticeLevel::Error,
                    "Clipboard unavailable",
                    &e.to_string(),
                    &[NoticeAction::Retry],
                );
                return Err(e.into());
            }
        };
        self.paste_payload(&payload).await
    }

    /// Paste the last-copy backup instead of the clipboard.
    ///
    /// # Errors
    ///
    /// As [`PastePipeline::paste`].
    pub async fn paste_backup(&self) -> Result<PasteOutcome, PasteError> {
        match self.codec.read_backup().await? {
            Some(payload) => self.paste_payload(&payload).await,
            None => Err(self.nothing_to_paste()),
        }
    }

    /// Sanitize, convert and inject a decoded payload.
    ///
    /// # Errors
    ///
    /// Returns [`PasteError::Injection`] if every strategy fails.
    #[tracing::instrument(name = "paste", skip_all, fields(source = %payload.metadata.source_builder_version, target = %self.target_version))]
    pub async fn paste_payload(&self, payload: &ClipboardPayload) -> Result<PasteOutcome, PasteError> {
        let (clean, sanitize) = self.sanitizer.sanitize_payload(payload);
        if !sanitize.is_clean() {
            warn!(?sanitize, "Payload sanitized with changes");
        }

        let conversion = self.resolver.convert(
            &clean.data,
            &clean.metadata.source_builder_version,
            &self.target_version,
        );
        debug!(
            "Converted with {} rules ({:?})",
            conversion.rules_applied, conversion.compatibility.classification
        );
        if let Some(notice) = Notice::for_conversion(&conversion) {
            notice.deliver(self.sink.as_ref());
        }

        match self.injector.inject(&conversion.tree, self.runtime.as_ref()).await {
            Ok(injection) => {
                Notice::for_injection(&injection).deliver(self.sink.as_ref());
                Ok(PasteOutcome {
                    injection,
                    sanitize,
                    rules_applied: conversion.rules_applied,
                    compatibility: conversion.compatibility,
                })
            }
            Err(mut failure) => {
                failure.manual_export =
                    ManualExport::for_payload(&self.export_payload(&failure, clean));
                self.error_log
                    .record(ErrorLogEntry::new(
                        "paste",
                        Some(failure.kind),
                        failure
                            .attempts
                            .iter()
                            .map(|a| format!("{}: {}", a.method, a.message))
                            .collect::<Vec<_>>()
                            .join("; "),
                    ))
                    .await;
                Notice::for_failure(failure.kind).deliver(self.sink.as_ref());
                Err(PasteError::Injection(failure))
            }
        }
    }

    /// Payload for the manual export of what a failed injection left
    /// unplaced. The tree has already been converted, so it is stamped with
    /// the target version and a re-import does not migrate it again.
    fn export_payload(&self, failure: &InjectionFailure, clean: ClipboardPayload) -> ClipboardPayload {
        let unplaced = &failure.tree;
        let (media, rendered) = if failure.placed == 0 {
            (clean.media, clean.rendered_content)
        } else {
            let urls: HashSet<String> = collect_media(unplaced).into_iter().map(|m| m.url).collect();
            (
                clean.media.into_iter().filter(|m| urls.contains(&m.url)).collect(),
                clean
                    .rendered_content
                    .into_iter()
                    .filter(|(id, _)| unplaced.find(id).is_some())
                    .collect(),
            )
        };
        let mut metadata = clean.metadata;
        metadata.source_builder_version.clone_from(&self.target_version);
        ClipboardPayload::new(unplaced.clone(), media, metadata).with_rendered_content(rendered)
    }

    fn nothing_to_paste(&self) -> PasteError {
        debug!("Clipboard holds no element-courier payload");
        self.sink.show(
            NoticeLevel::Info,
            "Nothing to paste",
            "Copy an element first.",
            &[],
        );
        PasteError::NothingToPaste
    }
}
