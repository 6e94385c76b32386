//! Foundation types for Shelf.
//!
//! This crate provides the leaf components every other Shelf crate builds on:
//! the closed set of field values a record may persist, the pluggable codecs
//! that turn those values into bytes, and the pluggable identifier generators
//! that name new records.
//!
//! # Key Types
//!
//! - [`Value`] / [`ScalarKind`] — the supported scalar field variants
//! - [`ScalarValue`] — maps Rust field types onto a [`ScalarKind`]
//! - [`ValueCodec`] — encode/decode contract, with [`JsonCodec`] and [`BincodeCodec`]
//! - [`IdGenerator`] — identifier contract, with [`UuidGenerator`] and [`SequentialIds`]

pub mod codec;
pub mod error;
pub mod id;
pub mod value;

pub use codec::{BincodeCodec, CodecKind, JsonCodec, ValueCodec};
pub use error::{CodecError, ValueError};
pub use id::{IdGenerator, IdKind, SequentialIds, UuidGenerator, UuidVersion};
pub use value::{ScalarKind, ScalarValue, Value};
