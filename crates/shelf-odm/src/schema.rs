//! Record schemas: the field descriptor table of a record type.
//!
//! A record type describes itself once, through [`Record::schema`], as an
//! ordered list of named field slots. Each slot is a pair of plain accessor
//! functions that address one field of a record in place, so the mapper can
//! serialize the field and later overwrite it without copying the record.
//!
//! ```ignore
//! #[derive(Default)]
//! struct Person {
//!     id: String,
//!     name: String,
//!     age: u32,
//!     pets: Vec<Pet>,
//! }
//!
//! impl Record for Person {
//!     fn schema() -> Schema<Self> {
//!         Schema::<Self>::builder("Person")
//!             .id("ID", |p| &p.id, |p| &mut p.id)
//!             .scalar("Name", |p| &p.name, |p| &mut p.name)
//!             .scalar("Age", |p| &p.age, |p| &mut p.age)
//!             .records("Pets", |p| &p.pets, |p| &mut p.pets)
//!             .build()
//!     }
//! }
//! ```

use std::collections::HashSet;

use shelf_store::{BucketMut, BucketRef};
use shelf_types::{ScalarKind, ScalarValue, Value, ValueError};
use thiserror::Error;

use crate::error::OdmResult;
use crate::mapper::{self, ReadContext, WriteContext};

/// A type that can be persisted by a [`Shelf`](crate::Shelf).
///
/// `Default` provides the blank value that reads are staged into and that
/// nested collection elements are allocated from.
pub trait Record: Default + Send + Sync + 'static {
    /// Describe the record's fields.
    fn schema() -> Schema<Self>;
}

/// A malformed record definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("record type name must not be empty")]
    EmptyTypeName,

    #[error("{type_name}: field name must not be empty")]
    EmptyFieldName { type_name: &'static str },

    #[error("{type_name}: no identifier field declared")]
    MissingIdField { type_name: &'static str },

    #[error("{type_name}: identifier field declared {count} times")]
    DuplicateIdField {
        type_name: &'static str,
        count: usize,
    },

    #[error("{type_name}: duplicate field {field}")]
    DuplicateField {
        type_name: &'static str,
        field: &'static str,
    },

    #[error("type name {type_name} is already used by {existing}")]
    DuplicateTypeName {
        type_name: &'static str,
        existing: &'static str,
    },
}

/// What a field stores, as seen from outside the schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// A single codec-encoded value.
    Scalar(ScalarKind),
    /// A sequence of nested records, stored as a collection of buckets.
    Records,
}

pub(crate) trait ScalarSlot<T>: Send + Sync {
    fn kind(&self) -> ScalarKind;
    fn load(&self, record: &T) -> Value;
    fn store(&self, record: &mut T, value: Value) -> Result<(), ValueError>;
}

struct ScalarAccessor<T, V> {
    get: fn(&T) -> &V,
    get_mut: fn(&mut T) -> &mut V,
}

impl<T: 'static, V: ScalarValue> ScalarSlot<T> for ScalarAccessor<T, V> {
    fn kind(&self) -> ScalarKind {
        V::KIND
    }

    fn load(&self, record: &T) -> Value {
        (self.get)(record).to_value()
    }

    fn store(&self, record: &mut T, value: Value) -> Result<(), ValueError> {
        *(self.get_mut)(record) = V::from_value(value)?;
        Ok(())
    }
}

/// Writes and reads one record-collection field against its collection bucket.
pub(crate) trait RecordsSlot<T>: Send + Sync {
    fn write(
        &self,
        cx: &WriteContext<'_>,
        record: &T,
        collection: &mut BucketMut<'_>,
    ) -> OdmResult<()>;

    fn read(
        &self,
        cx: &ReadContext<'_>,
        record: &mut T,
        collection: BucketRef<'_>,
    ) -> OdmResult<()>;
}

struct RecordsAccessor<T, E> {
    get: fn(&T) -> &Vec<E>,
    get_mut: fn(&mut T) -> &mut Vec<E>,
}

impl<T: 'static, E: Record> RecordsSlot<T> for RecordsAccessor<T, E> {
    fn write(
        &self,
        cx: &WriteContext<'_>,
        record: &T,
        collection: &mut BucketMut<'_>,
    ) -> OdmResult<()> {
        mapper::write_elements(cx, collection, (self.get)(record))
    }

    fn read(&self, cx: &ReadContext<'_>, record: &mut T, collection: BucketRef<'_>) -> OdmResult<()> {
        let elements = mapper::read_elements::<E>(cx, collection)?;
        *(self.get_mut)(record) = elements;
        Ok(())
    }
}

pub(crate) enum Slot<T> {
    Scalar(Box<dyn ScalarSlot<T>>),
    Records(Box<dyn RecordsSlot<T>>),
}

/// One named field slot.
pub struct Field<T> {
    name: &'static str,
    slot: Slot<T>,
}

impl<T> Field<T> {
    /// Field name, also the key it is stored under.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> FieldKind {
        match &self.slot {
            Slot::Scalar(slot) => FieldKind::Scalar(slot.kind()),
            Slot::Records(_) => FieldKind::Records,
        }
    }

    pub(crate) fn slot(&self) -> &Slot<T> {
        &self.slot
    }
}

impl<T> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}

/// The identifier slot of a record type.
pub(crate) struct IdSlot<T> {
    get: fn(&T) -> &String,
    get_mut: fn(&mut T) -> &mut String,
}

impl<T> IdSlot<T> {
    pub(crate) fn get<'r>(&self, record: &'r T) -> &'r str {
        (self.get)(record)
    }

    pub(crate) fn set(&self, record: &mut T, id: String) {
        *(self.get_mut)(record) = id;
    }
}

/// The field descriptor table of one record type.
pub struct Schema<T> {
    type_name: &'static str,
    fields: Vec<Field<T>>,
    id: Option<IdSlot<T>>,
    id_field: Option<&'static str>,
    id_declarations: usize,
}

impl<T: Record> Schema<T> {
    /// Start describing a record type stored under `type_name`.
    pub fn builder(type_name: &'static str) -> SchemaBuilder<T> {
        SchemaBuilder {
            schema: Schema {
                type_name,
                fields: Vec::new(),
                id: None,
                id_field: None,
                id_declarations: 0,
            },
        }
    }
}

impl<T> Schema<T> {
    /// Name of the type bucket records of this type live in.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Fields in declaration order, identifier included.
    pub fn fields(&self) -> &[Field<T>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field<T>> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Name of the identifier field, if one was declared.
    pub fn id_field(&self) -> Option<&'static str> {
        self.id_field
    }

    /// Check the table for shape violations.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let type_name = self.type_name;
        if type_name.is_empty() {
            return Err(SchemaError::EmptyTypeName);
        }
        match self.id_declarations {
            0 => return Err(SchemaError::MissingIdField { type_name }),
            1 => {}
            count => return Err(SchemaError::DuplicateIdField { type_name, count }),
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(SchemaError::EmptyFieldName { type_name });
            }
            if !seen.insert(field.name) {
                return Err(SchemaError::DuplicateField {
                    type_name,
                    field: field.name,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn identity(&self) -> Result<&IdSlot<T>, SchemaError> {
        self.id.as_ref().ok_or(SchemaError::MissingIdField {
            type_name: self.type_name,
        })
    }
}

impl<T> std::fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("type_name", &self.type_name)
            .field("id_field", &self.id_field)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Builder returned by [`Schema::builder`].
pub struct SchemaBuilder<T> {
    schema: Schema<T>,
}

impl<T: Record> SchemaBuilder<T> {
    /// Declare the identifier field. Exactly one is required.
    pub fn id(
        mut self,
        name: &'static str,
        get: fn(&T) -> &String,
        get_mut: fn(&mut T) -> &mut String,
    ) -> Self {
        self.schema.id_declarations += 1;
        self.schema.id = Some(IdSlot { get, get_mut });
        self.schema.id_field = Some(name);
        self.push(name, Slot::Scalar(Box::new(ScalarAccessor { get, get_mut })))
    }

    /// Declare a scalar field.
    pub fn scalar<V: ScalarValue>(
        self,
        name: &'static str,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Self {
        self.push(name, Slot::Scalar(Box::new(ScalarAccessor { get, get_mut })))
    }

    /// Declare a field holding a sequence of nested records.
    pub fn records<E: Record>(
        self,
        name: &'static str,
        get: fn(&T) -> &Vec<E>,
        get_mut: fn(&mut T) -> &mut Vec<E>,
    ) -> Self {
        self.push(
            name,
            Slot::Records(Box::new(RecordsAccessor { get, get_mut })),
        )
    }

    fn push(mut self, name: &'static str, slot: Slot<T>) -> Self {
        self.schema.fields.push(Field { name, slot });
        self
    }

    pub fn build(self) -> Schema<T> {
        self.schema
    }
}
