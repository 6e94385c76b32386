use thiserror::Error;

use crate::value::ScalarKind;

/// Errors produced by a [`ValueCodec`](crate::ValueCodec).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

/// Errors converting between a [`Value`](crate::Value) and a Rust field type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        expected: ScalarKind,
        found: ScalarKind,
    },

    #[error("{kind} value does not fit in {target}")]
    OutOfRange {
        kind: ScalarKind,
        target: &'static str,
    },
}
