use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use tradelog_core::{
    codec::{
        decode_with_fallback, encode_with_fallback, DecodeOutcome, EncodeOutcome, Encoder,
        ObfuscatingEncoder, PlainJsonEncoder,
    },
    storage::StorageBackend,
};

/// Key-value facade that obfuscates records before they reach the backend.
///
/// Despite the name this is not a confidentiality boundary: the default
/// [`ObfuscatingEncoder`] is reversible by anyone who can read the backend.
///
/// No operation returns an error. Failed encodes fall back to plain JSON,
/// failed writes are retried once as plain JSON and then dropped, and
/// unreadable records read back as `None`. Every recovery is logged.
#[derive(Debug, Clone)]
pub struct SecureStorage<B, E = ObfuscatingEncoder> {
    backend: B,
    encoder: E,
}

impl<B: StorageBackend> SecureStorage<B> {
    pub fn new(backend: B) -> Self {
        Self::with_encoder(backend, ObfuscatingEncoder)
    }
}

impl<B: StorageBackend, E: Encoder> SecureStorage<B, E> {
    pub fn with_encoder(backend: B, encoder: E) -> Self {
        Self { backend, encoder }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Encode and store `value`. Never fails; see the type docs.
    #[instrument(skip_all, fields(key))]
    pub fn set_item<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                warn!(%key, error = %err, "value is not serializable; write dropped");
                return;
            }
        };

        match encode_with_fallback(&self.encoder, &value) {
            EncodeOutcome::Encoded(record) => {
                if let Err(err) = self.backend.set(key, &record) {
                    warn!(%key, error = %err, "encoded write failed; retrying as plain json");
                    self.write_plain(key, &value);
                }
            }
            EncodeOutcome::Plain { record, cause } => {
                warn!(%key, encoder = self.encoder.name(), error = %cause, "encode failed; storing plain json");
                if let Err(err) = self.backend.set(key, &record) {
                    warn!(%key, error = %err, "plain write failed; write dropped");
                }
            }
            EncodeOutcome::Dropped { cause } => {
                warn!(%key, error = %cause, "value could not be encoded; write dropped");
            }
        }
    }

    /// Read and decode the value under `key`.
    ///
    /// Returns `None` when the key is absent, the record is unreadable by
    /// both the encoder and the plain JSON fallback, or it does not match `T`.
    #[instrument(skip_all, fields(key))]
    pub fn get_item<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(err) => {
                warn!(%key, error = %err, "stored value has unexpected shape");
                None
            }
        }
    }

    /// Untyped variant of [`SecureStorage::get_item`].
    pub fn get_value(&self, key: &str) -> Option<Value> {
        let record = match self.backend.get(key) {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(err) => {
                warn!(%key, error = %err, "backend read failed");
                return None;
            }
        };

        match decode_with_fallback(&self.encoder, &record) {
            DecodeOutcome::Decoded(value) => Some(value),
            DecodeOutcome::RecoveredPlain { value, cause } => {
                warn!(%key, encoder = self.encoder.name(), error = %cause, "decode failed; read record as plain json");
                Some(value)
            }
            DecodeOutcome::Unreadable { cause } => {
                warn!(%key, error = %cause, "stored record is unreadable");
                None
            }
        }
    }

    /// Remove `key`. Removing an absent key is not an error.
    #[instrument(skip_all, fields(key))]
    pub fn remove_item(&self, key: &str) {
        if let Err(err) = self.backend.remove(key) {
            warn!(%key, error = %err, "remove failed");
        }
    }

    /// Remove every key in the backend namespace, including keys written by
    /// other facades sharing it.
    #[instrument(skip_all)]
    pub fn clear(&self) {
        if let Err(err) = self.backend.clear() {
            warn!(error = %err, "clear failed");
        }
    }

    /// Presence check that does not decode the record.
    pub fn has_item(&self, key: &str) -> bool {
        self.backend.contains(key).unwrap_or_else(|err| {
            warn!(%key, error = %err, "presence check failed");
            false
        })
    }

    /// Keys in the backend namespace; empty when the backend cannot list them.
    pub fn keys(&self) -> Vec<String> {
        self.backend.keys().unwrap_or_else(|err| {
            warn!(error = %err, "listing keys failed");
            Vec::new()
        })
    }

    fn write_plain(&self, key: &str, value: &Value) {
        let record = match PlainJsonEncoder.encode(value) {
            Ok(record) => record,
            Err(err) => {
                warn!(%key, error = %err, "plain encode failed; write dropped");
                return;
            }
        };
        match self.backend.set(key, &record) {
            Ok(()) => debug!(%key, "stored plain json fallback"),
            Err(err) => warn!(%key, error = %err, "plain write failed; write dropped"),
        }
    }
}
