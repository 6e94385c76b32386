/// Errors from store and transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A bucket name was empty.
    #[error("bucket name required")]
    BucketNameRequired,

    /// A value key was empty.
    #[error("key required")]
    KeyRequired,

    /// `create_bucket` found a bucket already present under the name.
    #[error("bucket already exists: {0}")]
    BucketExists(String),

    /// `delete_bucket` found nothing under the name.
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    /// A key holds a value where a bucket was expected, or the reverse.
    #[error("incompatible value at key {0}")]
    IncompatibleValue(String),

    /// A write transaction was requested on a read-only store.
    #[error("store is read-only")]
    ReadOnly,

    /// I/O error around the database file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The database file or a record in it failed validation.
    #[error("corrupt store: {0}")]
    Corrupt(String),

    /// Error reported by the redb engine.
    #[error("storage engine error: {0}")]
    Backend(#[source] Box<redb::Error>),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

macro_rules! from_redb {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for StoreError {
                fn from(e: $source) -> Self {
                    StoreError::Backend(Box::new(e.into()))
                }
            }
        )*
    };
}

from_redb!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

/// Render a key for error messages: UTF-8 when possible, hex otherwise.
pub(crate) fn display_key(key: &[u8]) -> String {
    match std::str::from_utf8(key) {
        Ok(s) => s.to_string(),
        Err(_) => format!("0x{}", hex::encode(key)),
    }
}
