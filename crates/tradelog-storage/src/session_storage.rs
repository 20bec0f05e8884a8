use serde::{de::DeserializeOwned, Serialize};
use tracing::{instrument, warn};
use tradelog_core::storage::StorageBackend;

use crate::session_backend::SessionBackend;

/// Plain JSON facade over a session-scoped backend. No encoding layer, so a
/// record that fails to parse reads back as `None` with no second attempt.
/// Errors are logged, never returned.
#[derive(Debug, Clone)]
pub struct SessionStorage<B = SessionBackend> {
    backend: B,
}

impl SessionStorage {
    /// Facade over a freshly started session.
    pub fn start() -> Self {
        Self::new(SessionBackend::new())
    }
}

impl<B: StorageBackend> SessionStorage<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[instrument(skip_all, fields(key))]
    pub fn set_item<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let record = match serde_json::to_string(value) {
            Ok(record) => record,
            Err(err) => {
                warn!(%key, error = %err, "session value is not serializable; write dropped");
                return;
            }
        };
        if let Err(err) = self.backend.set(key, &record) {
            warn!(%key, error = %err, "session write failed; write dropped");
        }
    }

    #[instrument(skip_all, fields(key))]
    pub fn get_item<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let record = match self.backend.get(key) {
            Ok(record) => record?,
            Err(err) => {
                warn!(%key, error = %err, "session read failed");
                return None;
            }
        };
        match serde_json::from_str(&record) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%key, error = %err, "session record is unreadable");
                None
            }
        }
    }

    pub fn remove_item(&self, key: &str) {
        if let Err(err) = self.backend.remove(key) {
            warn!(%key, error = %err, "session remove failed");
        }
    }

    pub fn clear(&self) {
        if let Err(err) = self.backend.clear() {
            warn!(error = %err, "session clear failed");
        }
    }

    pub fn has_item(&self, key: &str) -> bool {
        self.backend.contains(key).unwrap_or_else(|err| {
            warn!(%key, error = %err, "session presence check failed");
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use tradelog_core::storage::MemoryBackend;

    use super::*;

    #[test]
    fn stores_plain_json() {
        let storage = SessionStorage::start();
        storage.set_item("filters", &json!({ "tag": "fomo", "page": 2 }));

        let raw = storage
            .backend()
            .get("filters")
            .expect("get")
            .expect("record present");
        assert_eq!(raw, r#"{"page":2,"tag":"fomo"}"#);
        assert_eq!(
            storage.get_item::<Value>("filters"),
            Some(json!({ "tag": "fomo", "page": 2 }))
        );
    }

    #[test]
    fn unparseable_record_reads_as_none() {
        let backend = MemoryBackend::new();
        let storage = SessionStorage::new(backend.clone());
        backend.set("filters", "{not json").expect("raw write");

        assert_eq!(storage.get_item::<Value>("filters"), None);
        assert!(storage.has_item("filters"));
    }

    #[test]
    fn remove_and_clear() {
        let storage = SessionStorage::start();
        storage.set_item("a", &1);
        storage.set_item("b", &2);

        storage.remove_item("a");
        storage.remove_item("a");
        assert!(!storage.has_item("a"));

        storage.clear();
        assert_eq!(storage.get_item::<i32>("b"), None);
    }

    #[test]
    fn entries_do_not_outlive_the_session() {
        let storage = SessionStorage::start();
        storage.set_item("draft", "half-written journal entry");

        storage.backend().end().expect("end session");
        assert_eq!(storage.get_item::<String>("draft"), None);
    }

    #[test]
    fn failed_writes_are_dropped_quietly() {
        let storage = SessionStorage::new(MemoryBackend::with_quota(2));
        storage.set_item("draft", "too long for the quota");
        assert!(!storage.has_item("draft"));
    }
}
