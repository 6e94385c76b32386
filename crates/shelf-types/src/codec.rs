//! Pluggable value codecs.
//!
//! A codec turns one scalar [`Value`] into the bytes stored under a field's
//! key and back. Decoding is driven by the field's declared [`ScalarKind`],
//! never by the stored bytes, so a codec does not need to be self-describing.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::value::{ScalarKind, Value};

/// Marshals a single field value to bytes and back.
///
/// Implementations must round-trip every value they accept: for any `v`
/// where `encode(&v)` succeeds, `decode(&encode(&v)?, v.kind())` yields `v`.
pub trait ValueCodec: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Encode a value.
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes into a value of the given kind.
    fn decode(&self, bytes: &[u8], kind: ScalarKind) -> Result<Value, CodecError>;
}

/// JSON codec: each value is stored as a standalone JSON document.
///
/// Human-readable and the default. Non-finite floats have no JSON
/// representation and are rejected on encode.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let encoded = match value {
            Value::Bool(v) => serde_json::to_vec(v),
            Value::Int(v) => serde_json::to_vec(v),
            Value::UInt(v) => serde_json::to_vec(v),
            Value::Float(v) => {
                if !v.is_finite() {
                    return Err(CodecError::Encode(format!(
                        "non-finite float {v} cannot be represented in JSON"
                    )));
                }
                serde_json::to_vec(v)
            }
            Value::Text(v) => serde_json::to_vec(v),
            Value::Bytes(v) => serde_json::to_vec(v),
        };
        encoded.map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8], kind: ScalarKind) -> Result<Value, CodecError> {
        let decoded = match kind {
            ScalarKind::Bool => serde_json::from_slice(bytes).map(Value::Bool),
            ScalarKind::Int => serde_json::from_slice(bytes).map(Value::Int),
            ScalarKind::UInt => serde_json::from_slice(bytes).map(Value::UInt),
            ScalarKind::Float => serde_json::from_slice(bytes).map(Value::Float),
            ScalarKind::Text => serde_json::from_slice(bytes).map(Value::Text),
            ScalarKind::Bytes => serde_json::from_slice(bytes).map(Value::Bytes),
        };
        decoded.map_err(|e| CodecError::Decode(format!("{kind}: {e}")))
    }
}

/// Compact binary codec backed by `bincode`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCodec;

impl ValueCodec for BincodeCodec {
    fn name(&self) -> &'static str {
        "bincode"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let encoded = match value {
            Value::Bool(v) => bincode::serialize(v),
            Value::Int(v) => bincode::serialize(v),
            Value::UInt(v) => bincode::serialize(v),
            Value::Float(v) => bincode::serialize(v),
            Value::Text(v) => bincode::serialize(v),
            Value::Bytes(v) => bincode::serialize(v),
        };
        encoded.map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8], kind: ScalarKind) -> Result<Value, CodecError> {
        let decoded = match kind {
            ScalarKind::Bool => bincode::deserialize(bytes).map(Value::Bool),
            ScalarKind::Int => bincode::deserialize(bytes).map(Value::Int),
            ScalarKind::UInt => bincode::deserialize(bytes).map(Value::UInt),
            ScalarKind::Float => bincode::deserialize(bytes).map(Value::Float),
            ScalarKind::Text => bincode::deserialize(bytes).map(Value::Text),
            ScalarKind::Bytes => bincode::deserialize(bytes).map(Value::Bytes),
        };
        decoded.map_err(|e| CodecError::Decode(format!("{kind}: {e}")))
    }
}

/// Codec selection for configuration files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Json,
    Bincode,
}

impl CodecKind {
    /// Instantiate the selected codec.
    pub fn build(self) -> Box<dyn ValueCodec> {
        match self {
            Self::Json => Box::new(JsonCodec),
            Self::Bincode => Box::new(BincodeCodec),
        }
    }
}
