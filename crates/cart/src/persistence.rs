//! Durable client-side storage for the cart.
//!
//! The cart is written as a versioned, timestamped record:
//!
//! ```json
//! { "version": "2", "data": { ... }, "timestamp": 1718000000000 }
//! ```
//!
//! Records written by an older schema or older than the retention window are
//! discarded on load so returning shoppers are not shown stale prices or stock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use grocer_core::{CartLineItem, SessionToken};

use crate::store::PendingAction;

/// Schema version of [`PersistedCart`]. Bump when its shape changes.
pub const CART_SCHEMA_VERSION: &str = "2";

/// Errors raised by a [`CartStorage`] backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem or device error.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend refused the write because it is full.
    #[error("storage quota exceeded ({needed} bytes needed, {available} available)")]
    QuotaExceeded { needed: usize, available: usize },

    /// The cart could not be encoded.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A string key/value store, shaped like a browser's `localStorage`.
pub trait CartStorage: Send + Sync {
    /// Read the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects the write.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value under `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be modified.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// Backends
// =============================================================================

/// In-memory storage with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    /// Create an unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects values larger than `quota` bytes.
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota: Some(quota),
        }
    }
}

impl CartStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota
            && value.len() > quota
        {
            return Err(StorageError::QuotaExceeded {
                needed: value.len(),
                available: quota,
            });
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// Storage that keeps one JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir` for storage, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory backing this store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl CartStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // Write-then-rename so a crash never leaves a half-written record
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Persistence Adapter
// =============================================================================

/// The part of the cart that survives a reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCart {
    pub items: Vec<CartLineItem>,
    pub session_token: SessionToken,
    #[serde(default)]
    pub pending: Vec<PendingAction>,
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct RecordRef<'a> {
    version: &'a str,
    data: &'a PersistedCart,
    timestamp: i64,
}

/// Data is kept as raw JSON until the version has been checked.
#[derive(Deserialize)]
struct RawRecord {
    version: String,
    data: serde_json::Value,
    timestamp: i64,
}

/// Reads and writes the versioned cart record.
///
/// Never fails towards its callers: storage errors are logged and the cart
/// keeps working in memory.
#[derive(Clone)]
pub struct PersistenceAdapter {
    storage: Arc<dyn CartStorage>,
    key: String,
    retention: Duration,
}

impl std::fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAdapter")
            .field("key", &self.key)
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

impl PersistenceAdapter {
    /// Create an adapter writing under `key` in `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn CartStorage>, key: impl Into<String>, retention: Duration) -> Self {
        Self {
            storage,
            key: key.into(),
            retention,
        }
    }

    /// Snapshot the cart. Failures are logged, never returned.
    pub fn save(&self, data: &PersistedCart) {
        self.save_at(data, Utc::now());
    }

    /// Load the cart if it is current; otherwise clear storage and return `None`.
    #[must_use]
    pub fn load(&self) -> Option<PersistedCart> {
        self.load_at(Utc::now())
    }

    /// Remove the stored record.
    pub fn clear(&self) {
        if let Err(e) = self.storage.remove(&self.key) {
            warn!(key = %self.key, error = %e, "Failed to clear persisted cart");
        }
    }

    pub(crate) fn save_at(&self, data: &PersistedCart, now: DateTime<Utc>) {
        let record = RecordRef {
            version: CART_SCHEMA_VERSION,
            data,
            timestamp: now.timestamp_millis(),
        };

        let result = serde_json::to_string(&record)
            .map_err(StorageError::from)
            .and_then(|json| self.storage.write(&self.key, &json));

        if let Err(e) = result {
            warn!(key = %self.key, error = %e, "Failed to persist cart; continuing in memory");
        }
    }

    pub(crate) fn load_at(&self, now: DateTime<Utc>) -> Option<PersistedCart> {
        let raw = match self.storage.read(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read persisted cart");
                return None;
            }
        };

        let record: RawRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Discarding unreadable cart record");
                self.clear();
                return None;
            }
        };

        if record.version != CART_SCHEMA_VERSION {
            debug!(
                found = %record.version,
                expected = CART_SCHEMA_VERSION,
                "Discarding cart record from another schema version"
            );
            self.clear();
            return None;
        }

        let age_ms = now.timestamp_millis().saturating_sub(record.timestamp);
        let retention_ms = i64::try_from(self.retention.as_millis()).unwrap_or(i64::MAX);
        if age_ms > retention_ms {
            debug!(age_ms, retention_ms, "Discarding expired cart record");
            self.clear();
            return None;
        }

        match serde_json::from_value(record.data) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Discarding malformed cart data");
                self.clear();
                None
            }
        }
    }
}
