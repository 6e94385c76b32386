//! Validated schema cache.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::{OdmError, OdmResult};
use crate::schema::{Record, Schema, SchemaError};

type ErasedSchema = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct Inner {
    schemas: HashMap<TypeId, ErasedSchema>,
    /// Type bucket name -> Rust type that claimed it.
    names: HashMap<&'static str, (TypeId, &'static str)>,
}

/// Builds each record type's schema once, validates it, and hands out shared
/// copies afterwards.
///
/// Two distinct Rust types that declare the same type name are rejected:
/// they would share one type bucket.
#[derive(Default)]
pub struct SchemaRegistry {
    inner: RwLock<Inner>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The validated schema of `T`, building it on first use.
    pub fn schema<T: Record>(&self) -> OdmResult<Arc<Schema<T>>> {
        let key = TypeId::of::<T>();
        {
            let inner = self.inner.read().map_err(|_| poisoned())?;
            if let Some(entry) = inner.schemas.get(&key) {
                return downcast(entry);
            }
        }

        let schema = T::schema();
        schema.validate()?;

        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        // Another thread may have registered it while the lock was released.
        if let Some(entry) = inner.schemas.get(&key) {
            return downcast(entry);
        }
        let type_name = schema.type_name();
        if let Some((owner, existing)) = inner.names.get(type_name) {
            if *owner != key {
                return Err(SchemaError::DuplicateTypeName {
                    type_name,
                    existing: *existing,
                }
                .into());
            }
        }

        let schema = Arc::new(schema);
        inner
            .names
            .insert(type_name, (key, std::any::type_name::<T>()));
        inner.schemas.insert(key, schema.clone() as ErasedSchema);
        debug!(
            type_name,
            fields = schema.fields().len(),
            "record type registered"
        );
        Ok(schema)
    }

    pub fn is_registered<T: Record>(&self) -> bool {
        self.inner
            .read()
            .map(|inner| inner.schemas.contains_key(&TypeId::of::<T>()))
            .unwrap_or(false)
    }

    /// Number of registered record types.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.schemas.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&'static str> = self
            .inner
            .read()
            .map(|inner| inner.names.keys().copied().collect())
            .unwrap_or_default();
        f.debug_struct("SchemaRegistry")
            .field("types", &names)
            .finish()
    }
}

fn downcast<T: Record>(entry: &ErasedSchema) -> OdmResult<Arc<Schema<T>>> {
    Arc::clone(entry)
        .downcast::<Schema<T>>()
        .map_err(|_| {
            OdmError::Internal(format!(
                "schema cache holds the wrong type for {}",
                std::any::type_name::<T>()
            ))
        })
}

fn poisoned() -> OdmError {
    OdmError::Internal("schema registry lock poisoned".into())
}
