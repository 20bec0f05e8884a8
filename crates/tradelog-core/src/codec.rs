//! Reversible record encoders and the recovery chain used by the storage facades.
//!
//! [`ObfuscatingEncoder`] only keeps stored records from being readable at a
//! glance. It is base64 over JSON, not encryption: anyone with access to the
//! backend can recover every value.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use thiserror::Error;

/// Failures raised while turning values into records and back.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("serialize failed: {reason}")]
    Serialize { reason: String },
    #[error("deserialize failed: {reason}")]
    Deserialize { reason: String },
    /// The text transform layer (base64, UTF-8) rejected the record.
    #[error("transform failed: {reason}")]
    Transform { reason: String },
}

/// Reversible transform between a JSON value and a stored record.
pub trait Encoder: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &'static str;

    fn encode(&self, value: &Value) -> Result<String, CodecError>;

    fn decode(&self, record: &str) -> Result<Value, CodecError>;
}

/// JSON text wrapped in standard base64. Obfuscation only.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObfuscatingEncoder;

impl Encoder for ObfuscatingEncoder {
    fn name(&self) -> &'static str {
        "base64-json"
    }

    fn encode(&self, value: &Value) -> Result<String, CodecError> {
        let json = serde_json::to_string(value).map_err(|e| CodecError::Serialize {
            reason: e.to_string(),
        })?;
        Ok(STANDARD.encode(json))
    }

    fn decode(&self, record: &str) -> Result<Value, CodecError> {
        let bytes = STANDARD
            .decode(record.trim())
            .map_err(|e| CodecError::Transform {
                reason: e.to_string(),
            })?;
        let json = String::from_utf8(bytes).map_err(|e| CodecError::Transform {
            reason: e.to_string(),
        })?;
        serde_json::from_str(&json).map_err(|e| CodecError::Deserialize {
            reason: e.to_string(),
        })
    }
}

/// Plain JSON text. This is the fallback record format.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainJsonEncoder;

impl Encoder for PlainJsonEncoder {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, value: &Value) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(|e| CodecError::Serialize {
            reason: e.to_string(),
        })
    }

    fn decode(&self, record: &str) -> Result<Value, CodecError> {
        serde_json::from_str(record).map_err(|e| CodecError::Deserialize {
            reason: e.to_string(),
        })
    }
}

/// Result of running the write-side recovery chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeOutcome {
    /// Primary encoder succeeded.
    Encoded(String),
    /// Primary encoder failed; record is plain JSON.
    Plain { record: String, cause: CodecError },
    /// Nothing could be produced; the write must be dropped.
    Dropped { cause: CodecError },
}

impl EncodeOutcome {
    pub fn record(&self) -> Option<&str> {
        match self {
            EncodeOutcome::Encoded(record) | EncodeOutcome::Plain { record, .. } => {
                Some(record.as_str())
            }
            EncodeOutcome::Dropped { .. } => None,
        }
    }
}

/// Result of running the read-side recovery chain.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// Primary encoder decoded the record.
    Decoded(Value),
    /// Primary decode failed but the record parsed as plain JSON.
    RecoveredPlain { value: Value, cause: CodecError },
    /// Neither strategy could read the record.
    Unreadable { cause: CodecError },
}

impl DecodeOutcome {
    pub fn into_value(self) -> Option<Value> {
        match self {
            DecodeOutcome::Decoded(value) | DecodeOutcome::RecoveredPlain { value, .. } => {
                Some(value)
            }
            DecodeOutcome::Unreadable { .. } => None,
        }
    }
}

/// Primary encode, then plain JSON, then give up.
pub fn encode_with_fallback(primary: &dyn Encoder, value: &Value) -> EncodeOutcome {
    match primary.encode(value) {
        Ok(record) => EncodeOutcome::Encoded(record),
        Err(cause) => match PlainJsonEncoder.encode(value) {
            Ok(record) => EncodeOutcome::Plain { record, cause },
            Err(cause) => EncodeOutcome::Dropped { cause },
        },
    }
}

/// Primary decode, then plain JSON, then give up.
pub fn decode_with_fallback(primary: &dyn Encoder, record: &str) -> DecodeOutcome {
    match primary.decode(record) {
        Ok(value) => DecodeOutcome::Decoded(value),
        Err(cause) => match PlainJsonEncoder.decode(record) {
            Ok(value) => DecodeOutcome::RecoveredPlain { value, cause },
            Err(_) => DecodeOutcome::Unreadable { cause },
        },
    }
}
