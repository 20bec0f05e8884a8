use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::debug;
use tradelog_core::storage::{StorageBackend, StorageError};
use uuid::Uuid;

#[derive(Debug)]
struct Session {
    id: Uuid,
    entries: BTreeMap<String, String>,
}

impl Session {
    fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            entries: BTreeMap::new(),
        }
    }
}

/// Session-scoped backend. Entries live in process memory for the lifetime of
/// one session and are dropped by [`SessionBackend::end`] or when the last
/// handle goes away. Clones share the session.
#[derive(Debug, Clone)]
pub struct SessionBackend {
    inner: Arc<Mutex<Session>>,
}

impl Default for SessionBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBackend {
    pub fn new() -> Self {
        let session = Session::start();
        debug!(session = %session.id, "session storage started");
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Identifier of the current session.
    pub fn session_id(&self) -> Result<Uuid, StorageError> {
        Ok(self.lock()?.id)
    }

    /// End the current session, discarding its entries, and start a fresh one.
    pub fn end(&self) -> Result<Uuid, StorageError> {
        let mut session = self.lock()?;
        debug!(session = %session.id, entries = session.entries.len(), "session storage ended");
        *session = Session::start();
        Ok(session.id)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session>, StorageError> {
        self.inner.lock().map_err(|err| StorageError::Poisoned {
            reason: err.to_string(),
        })
    }
}

impl StorageBackend for SessionBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.entries.get(key).cloned())
    }

    fn set(&self, key: &str, record: &str) -> Result<(), StorageError> {
        self.lock()?
            .entries
            .insert(key.to_string(), record.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.lock()?.entries.clear();
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.lock()?.entries.contains_key(key))
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.lock()?.entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ending_a_session_drops_entries() {
        let backend = SessionBackend::new();
        let first = backend.session_id().expect("id");
        backend.set("draft-trade", "{}").expect("set");

        let second = backend.end().expect("end");
        assert_ne!(first, second);
        assert_eq!(backend.get("draft-trade").expect("get"), None);
        assert!(backend.keys().expect("keys").is_empty());
    }

    #[test]
    fn separate_sessions_do_not_share_entries() {
        let tab_a = SessionBackend::new();
        let tab_b = SessionBackend::new();
        tab_a.set("k", "v").expect("set");

        assert!(tab_a.contains("k").expect("contains"));
        assert!(!tab_b.contains("k").expect("contains"));
    }
}
