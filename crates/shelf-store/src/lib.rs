//! Embedded ordered hierarchical key-value store for Shelf.
//!
//! Data lives in a tree of named buckets. A bucket maps byte keys either to
//! byte values or to nested buckets, and always iterates its keys in
//! lexicographic byte order.
//!
//! # Transactions
//!
//! All access goes through a transaction:
//!
//! - [`Store::view`] runs a closure over a [`ReadTx`], an immutable snapshot
//!   of the last commit. Readers never block each other or the writer.
//! - [`Store::update`] runs a closure over a [`WriteTx`]. Returning `Ok`
//!   commits atomically; returning `Err` aborts. Writers serialize.
//!
//! # Durability
//!
//! [`Store::in_memory`] keeps everything in process memory.
//! [`Store::open`] backs the tree with a single [redb](https://docs.rs/redb)
//! file. The whole hierarchy lives in one table whose keys are encoded bucket
//! paths, so a commit only writes the pages it touched. Each commit also
//! bumps a generation counter kept in a second table.

pub mod bucket;
pub mod error;
mod keys;
pub mod store;
pub mod tx;

// Re-export primary types at crate root for ergonomic imports.
pub use bucket::{BucketMut, BucketRef, Cursor, Entry};
pub use error::{StoreError, StoreResult};
pub use store::{Store, StoreOptions};
pub use tx::{ReadTx, WriteTx};
