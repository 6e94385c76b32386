use shelf_store::StoreError;
use thiserror::Error;

use crate::path::BucketPath;
use crate::schema::SchemaError;

/// Errors surfaced by [`Shelf`](crate::Shelf) operations.
#[derive(Debug, Error)]
pub enum OdmError {
    #[error("invalid record shape: {0}")]
    InvalidShape(#[from] SchemaError),

    #[error("{type_name} record has an empty identifier")]
    MissingIdentifier { type_name: &'static str },

    #[error("not found: {path}")]
    NotFound { path: BucketPath },

    #[error("cannot encode {type_name}.{field}: {reason}")]
    Encoding {
        type_name: &'static str,
        field: &'static str,
        reason: String,
    },

    #[error("cannot decode {type_name}.{field}: {reason}")]
    Decoding {
        type_name: &'static str,
        field: &'static str,
        reason: String,
    },

    #[error("corrupt record at {path}: {reason}")]
    Corruption { path: BucketPath, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl OdmError {
    /// True for [`OdmError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, OdmError::NotFound { .. })
    }
}

/// Convenience alias for ODM results.
pub type OdmResult<T> = Result<T, OdmError>;
