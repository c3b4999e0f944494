//! Durable key/value storage for the last-copy backup and the error log.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FailureKind, StorageError};

/// Key holding the last successfully written payload.
pub const LAST_COPY_KEY: &str = "courier.last_copy";

/// Key holding the error log.
pub const ERROR_LOG_KEY: &str = "courier.error_log";

/// Entries kept in the error log before the oldest are dropped.
pub const MAX_ERROR_LOG_ENTRIES: usize = 50;

/// External persistence.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a value. A missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Store a value, replacing any previous one.
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

/// In-process storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// One JSON file per key under a data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    data_dir: PathBuf,
}

impl FileStorage {
    /// Use `data_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    /// The data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", sanitize_filename(key)))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(&value)?;
        tokio::fs::write(self.path_for(key), json).await?;
        Ok(())
    }
}

/// Keep alphanumerics, `-` and `_`; everything else becomes `_`.
fn sanitize_filename(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// One recorded copy or paste failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLogEntry {
    /// Correlation id of the failed operation.
    pub operation_id: String,
    /// Capture time as RFC 3339.
    pub timestamp: String,
    /// `copy` or `paste`.
    pub operation: String,
    /// Injection failure category, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    /// Error message.
    pub message: String,
}

impl ErrorLogEntry {
    /// Entry stamped now with a fresh operation id.
    #[must_use]
    pub fn new(operation: impl Into<String>, kind: Option<FailureKind>, message: impl Into<String>) -> Self {
        Self {
            operation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            operation: operation.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Capped failure log kept in [`Storage`] under [`ERROR_LOG_KEY`].
#[derive(Clone)]
pub struct ErrorLog {
    storage: Arc<dyn Storage>,
    capacity: usize,
}

impl std::fmt::Debug for ErrorLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorLog")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl ErrorLog {
    /// Log backed by `storage` with the default capacity.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_capacity(storage, MAX_ERROR_LOG_ENTRIES)
    }

    /// Log with a custom capacity.
    #[must_use]
    pub fn with_capacity(storage: Arc<dyn Storage>, capacity: usize) -> Self {
        Self {
            storage,
            capacity: capacity.max(1),
        }
    }

    /// Stored entries, oldest first. An unreadable log reads as empty.
    pub async fn entries(&self) -> Vec<ErrorLogEntry> {
        match self.storage.get(ERROR_LOG_KEY).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!("Discarding unreadable error log: {e}");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read error log: {e}");
                Vec::new()
            }
        }
    }

    /// Append an entry, dropping the oldest when full.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written back.
    pub async fn append(&self, entry: ErrorLogEntry) -> Result<(), StorageError> {
        let mut entries: VecDeque<ErrorLogEntry> = self.entries().await.into();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
        self.storage
            .set(ERROR_LOG_KEY, serde_json::to_value(entries)?)
            .await
    }

    /// Append, logging instead of failing.
    pub async fn record(&self, entry: ErrorLogEntry) {
        if let Err(e) = self.append(entry).await {
            tracing::warn!("Failed to persist error log entry: {e}");
        }
    }
}
