use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use thiserror::Error;

/// Errors produced by key-value backends.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    /// Underlying medium failed (filesystem, permissions, ...).
    #[error("storage failure: {reason}")]
    Io { reason: String },
    /// Write rejected because the backend is full.
    #[error("quota exceeded writing {key}: {needed} bytes needed, {available} available")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },
    /// Key cannot be represented by this backend.
    #[error("invalid key: {key}")]
    InvalidKey { key: String },
    /// A shared lock was poisoned by a panicking writer.
    #[error("lock poisoned: {reason}")]
    Poisoned { reason: String },
}

/// Synchronous string key-value medium, durable or session-scoped.
///
/// Implementations must treat `remove` of an absent key as success and must
/// report write failures as [`StorageError`] values rather than panicking.
pub trait StorageBackend: Send + Sync {
    /// Raw record stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `record` under `key`, overwriting any existing entry.
    fn set(&self, key: &str, record: &str) -> Result<(), StorageError>;

    /// Remove a key and its record (idempotent).
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every key in this backend's namespace.
    fn clear(&self) -> Result<(), StorageError>;

    /// Presence check that does not read the record.
    fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key)?.is_some())
    }

    /// All keys currently stored, in ascending order.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for Arc<B> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, record: &str) -> Result<(), StorageError> {
        (**self).set(key, record)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }

    fn clear(&self) -> Result<(), StorageError> {
        (**self).clear()
    }

    fn contains(&self, key: &str) -> Result<bool, StorageError> {
        (**self).contains(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        (**self).keys()
    }
}

/// In-memory backend for tests and smoke runs. Clones share the same map.
///
/// An optional byte quota (keys plus records) mimics browser storage limits.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    inner: Arc<Mutex<BTreeMap<String, String>>>,
    quota: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that rejects writes once `bytes` would be exceeded.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            inner: Arc::default(),
            quota: Some(bytes),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().map(|map| map.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, StorageError> {
        self.inner.lock().map_err(|err| StorageError::Poisoned {
            reason: err.to_string(),
        })
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, record: &str) -> Result<(), StorageError> {
        let mut map = self.lock()?;

        if let Some(quota) = self.quota {
            let used: usize = map
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = key.len() + record.len();
            let available = quota.saturating_sub(used);
            if needed > available {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available,
                });
            }
        }

        map.insert(key.to_string(), record.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.lock()?.clear();
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.lock()?.contains_key(key))
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}
