//! Clipboard read/write with focus acquisition, retry and fallbacks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_core::{collect_media, ClipboardPayload, ElementNode, PayloadMetadata};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ClipboardConfig;
use crate::error::ClipboardError;
use crate::storage::{Storage, LAST_COPY_KEY};

/// The host clipboard API.
#[async_trait]
pub trait HostClipboard: Send + Sync {
    /// Write text to the system clipboard.
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;

    /// Read text from the system clipboard. An empty clipboard is `Ok(None)`.
    async fn read_text(&self) -> Result<Option<String>, ClipboardError>;

    /// Try to give the requesting context input focus (simulated
    /// interaction, a transient focused input). Best effort.
    async fn acquire_focus(&self) -> bool {
        false
    }

    /// Selection-based copy command used when the clipboard API refuses.
    async fn legacy_copy(&self, _text: &str) -> Result<(), ClipboardError> {
        Err(ClipboardError::WriteFailed("legacy copy unavailable".into()))
    }
}

/// Where a copy comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyContext {
    /// Origin URL of the source page.
    pub source_origin: String,
    /// Builder version on the source page, empty when unknown.
    pub builder_version: String,
}

impl CopyContext {
    /// Context for the given origin and builder version.
    #[must_use]
    pub fn new(source_origin: impl Into<String>, builder_version: impl Into<String>) -> Self {
        Self {
            source_origin: source_origin.into(),
            builder_version: builder_version.into(),
        }
    }

    /// Metadata stamped now.
    #[must_use]
    pub fn metadata(&self) -> PayloadMetadata {
        PayloadMetadata::now(&self.source_origin, &self.builder_version)
    }
}

/// How the payload ended up with the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum WriteMethod {
    /// The clipboard API accepted it.
    Clipboard,
    /// The legacy copy command accepted it.
    LegacyCommand,
    /// Nothing accepted it; the text must be shown for manual copy.
    ManualCopy {
        /// Serialized payload.
        text: String,
    },
}

/// Outcome of [`ClipboardCodec::write`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    /// Which path delivered the payload.
    #[serde(flatten)]
    pub method: WriteMethod,
    /// Clipboard API attempts made.
    pub attempts: u32,
    /// Whether the backup copy was stored.
    pub backed_up: bool,
}

/// Reads and writes [`ClipboardPayload`]s through a [`HostClipboard`],
/// keeping a backup of the last write in [`Storage`].
#[derive(Clone)]
pub struct ClipboardCodec {
    host: Arc<dyn HostClipboard>,
    storage: Arc<dyn Storage>,
    config: ClipboardConfig,
}

impl std::fmt::Debug for ClipboardCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipboardCodec")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClipboardCodec {
    /// Codec with default configuration.
    #[must_use]
    pub fn new(host: Arc<dyn HostClipboard>, storage: Arc<dyn Storage>) -> Self {
        Self::with_config(host, storage, ClipboardConfig::default())
    }

    /// Codec with custom configuration.
    #[must_use]
    pub fn with_config(
        host: Arc<dyn HostClipboard>,
        storage: Arc<dyn Storage>,
        config: ClipboardConfig,
    ) -> Self {
        Self {
            host,
            storage,
            config,
        }
    }

    /// Build a payload for `tree`, collecting its media, and write it.
    ///
    /// # Errors
    ///
    /// See [`ClipboardCodec::write_payload`].
    pub async fn write(
        &self,
        tree: ElementNode,
        context: &CopyContext,
    ) -> Result<WriteReport, ClipboardError> {
        let media = collect_media(&tree);
        let payload = ClipboardPayload::new(tree, media, context.metadata());
        self.write_payload(&payload).await
    }

    /// Write a payload.
    ///
    /// Focus is acquired before the first attempt. Focus denials and
    /// timeouts are retried with backoff; after that the legacy copy command
    /// is tried, and finally the text is handed back for manual copy. The
    /// payload is stored as the last-copy backup in every case.
    ///
    /// # Errors
    ///
    /// Returns [`ClipboardError::WriteFailed`] only if the payload cannot be
    /// serialized.
    pub async fn write_payload(
        &self,
        payload: &ClipboardPayload,
    ) -> Result<WriteReport, ClipboardError> {
        let text = payload
            .encode()
            .map_err(|e| ClipboardError::WriteFailed(e.to_string()))?;
        let backed_up = self.store_backup(payload).await;

        if !self.host.acquire_focus().await {
            debug!("Focus acquisition before clipboard write did not succeed");
        }

        let mut attempts = 0;
        let result = self
            .retrying("write", |attempt| {
                attempts = attempt + 1;
                let host = Arc::clone(&self.host);
                let text = text.as_str();
                async move {
                    if attempt > 0 {
                        host.acquire_focus().await;
                    }
                    host.write_text(text).await
                }
            })
            .await;

        let method = match result {
            Ok(()) => WriteMethod::Clipboard,
            Err(error) => {
                warn!("Clipboard write failed after {attempts} attempts: {error}");
                match self.timed(self.host.legacy_copy(&text)).await {
                    Ok(()) => WriteMethod::LegacyCommand,
                    Err(legacy) => {
                        warn!("Legacy copy failed, falling back to manual copy: {legacy}");
                        WriteMethod::ManualCopy { text }
                    }
                }
            }
        };
        info!(
            "Payload of {} nodes delivered via {} after {attempts} attempts",
            payload.data.node_count(),
            method_name(&method)
        );
        Ok(WriteReport {
            method,
            attempts,
            backed_up,
        })
    }

    /// Read our payload from the clipboard.
    ///
    /// Returns `Ok(None)` for an empty clipboard, non-JSON text or JSON
    /// without our marker.
    ///
    /// # Errors
    ///
    /// Returns [`ClipboardError::ReadFailed`] if the clipboard cannot be read
    /// or holds a marked payload without usable data.
    pub async fn read(&self) -> Result<Option<ClipboardPayload>, ClipboardError> {
        let text = self
            .retrying("read", |_| {
                let host = Arc::clone(&self.host);
                async move { host.read_text().await }
            })
            .await?;
        let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
            debug!("Clipboard is empty");
            return Ok(None);
        };
        match ClipboardPayload::decode(&text) {
            Ok(Some(payload)) => Ok(Some(payload)),
            Ok(None) => {
                debug!("Clipboard holds foreign content ({} bytes)", text.len());
                Ok(None)
            }
            Err(e) => Err(ClipboardError::ReadFailed(e.to_string())),
        }
    }

    /// The last payload written, from durable storage.
    ///
    /// # Errors
    ///
    /// Returns [`ClipboardError::ReadFailed`] if storage fails or the stored
    /// backup is unusable.
    pub async fn read_backup(&self) -> Result<Option<ClipboardPayload>, ClipboardError> {
        let stored = self
            .storage
            .get(LAST_COPY_KEY)
            .await
            .map_err(|e| ClipboardError::ReadFailed(e.to_string()))?;
        match stored {
            Some(value) => ClipboardPayload::from_value(&value)
                .map_err(|e| ClipboardError::ReadFailed(e.to_string())),
            None => Ok(None),
        }
    }

    async fn store_backup(&self, payload: &ClipboardPayload) -> bool {
        let value = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize clipboard backup: {e}");
                return false;
            }
        };
        match self.storage.set(LAST_COPY_KEY, value).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to persist clipboard backup: {e}");
                false
            }
        }
    }

    async fn timed<T>(
        &self,
        op: impl Future<Output = Result<T, ClipboardError>>,
    ) -> Result<T, ClipboardError> {
        let timeout_ms = self.config.op_timeout_ms;
        tokio::time::timeout(Duration::from_millis(timeout_ms), op)
            .await
            .unwrap_or(Err(ClipboardError::Timeout(timeout_ms)))
    }

    async fn retrying<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ClipboardError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ClipboardError>>,
    {
        let config = &self.config.retry;
        let max_attempts = config.max_attempts.max(1);
        let mut last_error: Option<ClipboardError> = None;

        for attempt in 0..max_attempts {
            match self.timed(op(attempt)).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if error.is_retryable() && attempt + 1 < max_attempts {
                        let delay = config.delay_for_attempt(attempt);
                        warn!(
                            "Clipboard {} failed (attempt {}/{}), retrying in {}ms: {}",
                            what,
                            attempt + 1,
                            max_attempts,
                            delay,
                            error
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        last_error = Some(error);
                        continue;
                    }
                    return Err(error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ClipboardError::WriteFailed("retry loop exited without result".into())))
    }
}

fn method_name(method: &WriteMethod) -> &'static str {
    match method {
        WriteMethod::Clipboard => "clipboard",
        WriteMethod::LegacyCommand => "legacy-command",
        WriteMethod::ManualCopy { .. } => "manual-copy",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryConfig;
    use crate::storage::MemoryStorage;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Denies focus a fixed number of times, then stores writes.
    #[derive(Default)]
    struct FlakyHost {
        denials: u32,
        writes: AtomicU32,
        focus_calls: AtomicU32,
        stored: Mutex<Option<String>>,
    }

    #[async_trait]
    impl HostClipboard for FlakyHost {
        async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
            let n = self.writes.fetch_add(1, Ordering::Relaxed);
            if n < self.denials {
                return Err(ClipboardError::FocusDenied("document not focused".into()));
            }
            *self.stored.lock().expect("lock") = Some(text.to_string());
            Ok(())
        }

        async fn read_text(&self) -> Result<Option<String>, ClipboardError> {
            Ok(self.stored.lock().expect("lock").clone())
        }

        async fn acquire_focus(&self) -> bool {
            self.focus_calls.fetch_add(1, Ordering::Relaxed);
            true
        }
    }

    fn fast_config() -> ClipboardConfig {
        ClipboardConfig {
            retry: RetryConfig::new(4, 1, 5, 2.0),
            op_timeout_ms: 200,
        }
    }

    #[tokio::test]
    async fn test_retries_focus_denials() {
        let host = Arc::new(FlakyHost {
            denials: 2,
            ..FlakyHost::default()
        });
        let codec = ClipboardCodec::with_config(host.clone(), Arc::new(MemoryStorage::new()), fast_config());
        let report = codec
            .write(ElementNode::widget("heading"), &CopyContext::default())
            .await
            .expect("write");
        assert_eq!(report.method, WriteMethod::Clipboard);
        assert_eq!(report.attempts, 3);
        assert!(report.backed_up);
        // once up front, then before each retry
        assert_eq!(host.focus_calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_falls_back_to_manual_copy() {
        let host = Arc::new(FlakyHost {
            denials: u32::MAX,
            ..FlakyHost::default()
        });
        let codec = ClipboardCodec::with_config(host.clone(), Arc::new(MemoryStorage::new()), fast_config());
        let report = codec
            .write(ElementNode::widget("heading"), &CopyContext::default())
            .await
            .expect("write");
        assert_eq!(report.attempts, 4);
        match report.method {
            WriteMethod::ManualCopy { text } => {
                assert!(ClipboardPayload::decode(&text).expect("decode").is_some());
            }
            other => panic!("expected manual copy, got {other:?}"),
        }
        let backup = codec.read_backup().await.expect("backup").expect("present");
        assert_eq!(backup.data.widget_type(), Some("heading"));
    }

    #[tokio::test]
    async fn test_read_round_trip_and_foreign_text() {
        let host = Arc::new(FlakyHost::default());
        let codec = ClipboardCodec::with_config(host.clone(), Arc::new(MemoryStorage::new()), fast_config());
        assert!(codec.read().await.expect("read").is_none());

        let tree = ElementNode::section().with_id("s1");
        codec
            .write(tree.clone(), &CopyContext::new("https://a.example", "3.5.0"))
            .await
            .expect("write");
        let payload = codec.read().await.expect("read").expect("ours");
        assert_eq!(payload.data, tree);
        assert_eq!(payload.metadata.source_builder_version, "3.5.0");

        *host.stored.lock().expect("lock") = Some("just some text".into());
        assert!(codec.read().await.expect("read").is_none());
    }

    #[tokio::test]
    async fn test_marked_garbage_is_read_failure() {
        let host = Arc::new(FlakyHost::default());
        *host.stored.lock().expect("lock") =
            Some(r#"{"marker": {"source": "element-courier"}, "data": 42}"#.into());
        let codec = ClipboardCodec::with_config(host, Arc::new(MemoryStorage::new()), fast_config());
        assert!(matches!(codec.read().await, Err(ClipboardError::ReadFailed(_))));
    }
}
