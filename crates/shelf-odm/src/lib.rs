//! Object-document mapper for Shelf.
//!
//! Persists plain Rust structs into a [`shelf_store::Store`]. Each record
//! type describes its fields once through [`Record::schema`]; a [`Shelf`]
//! then stores every record as a bucket of codec-encoded field values under a
//! per-type bucket, keyed by the record's string identifier.
//!
//! ```ignore
//! let shelf = Shelf::in_memory()?;
//! let mut person = Person { name: "ada".into(), ..Default::default() };
//! shelf.save(&mut person)?;           // assigns person.id
//!
//! let mut loaded = Person { id: person.id.clone(), ..Default::default() };
//! shelf.get(&mut loaded)?;
//! ```
//!
//! # Key Types
//!
//! - [`Record`] / [`Schema`] — the per-type field descriptor table
//! - [`Shelf`] — save, get, first, all, keys, exists
//! - [`ShelfConfig`] — TOML-loadable settings
//! - [`OdmError`] — every failure an operation can report

pub mod config;
pub mod error;
mod mapper;
pub mod path;
pub mod registry;
pub mod repository;
pub mod schema;

pub use config::ShelfConfig;
pub use error::{OdmError, OdmResult};
pub use path::{instance_bucket_path, type_bucket_path, BucketPath};
pub use registry::SchemaRegistry;
pub use repository::Shelf;
pub use schema::{Field, FieldKind, Record, Schema, SchemaBuilder, SchemaError};

pub use shelf_store::{Store, StoreOptions};
pub use shelf_types::{
    BincodeCodec, CodecKind, IdGenerator, IdKind, JsonCodec, ScalarKind, ScalarValue,
    SequentialIds, UuidGenerator, ValueCodec,
};
