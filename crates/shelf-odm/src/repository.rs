//! The record repository: save, get, first, all, keys and exists over a
//! [`Store`].
//!
//! Records of a type live under a top-level bucket named after the type, one
//! instance bucket per identifier. Each operation runs in a single store
//! transaction, and reads decode into scratch values so a failure leaves the
//! caller's record or vector untouched.

use std::path::Path;

use shelf_store::{Store, StoreOptions};
use shelf_types::{IdGenerator, JsonCodec, UuidGenerator, ValueCodec};
use tracing::debug;

use crate::config::ShelfConfig;
use crate::error::{OdmError, OdmResult};
use crate::mapper::{self, ReadContext, WriteContext};
use crate::path::{instance_bucket_path, type_bucket_path};
use crate::registry::SchemaRegistry;
use crate::schema::{Record, Schema};

/// Record repository over a [`Store`].
///
/// Every operation runs as exactly one store transaction, so it either takes
/// full effect or none. A `Shelf` is `Send + Sync`; share it behind an `Arc`
/// to use it from several threads.
pub struct Shelf {
    store: Store,
    codec: Box<dyn ValueCodec>,
    ids: Box<dyn IdGenerator>,
    registry: SchemaRegistry,
}

impl Shelf {
    /// Wrap an open store, using the JSON codec and random UUID identifiers.
    pub fn new(store: Store) -> Self {
        Self {
            store,
            codec: Box::new(JsonCodec),
            ids: Box::new(UuidGenerator::v4()),
            registry: SchemaRegistry::new(),
        }
    }

    /// Open (or create) a file-backed shelf.
    pub fn open(path: impl AsRef<Path>, mode: u32, options: StoreOptions) -> OdmResult<Self> {
        Ok(Self::new(Store::open(path, mode, options)?))
    }

    /// Create an empty shelf that lives only in memory.
    pub fn in_memory() -> OdmResult<Self> {
        Ok(Self::new(Store::in_memory()?))
    }

    /// Open a shelf as described by `config`.
    pub fn open_with_config(config: &ShelfConfig) -> OdmResult<Self> {
        let store = match &config.path {
            Some(path) => Store::open(path, config.file_mode, config.store_options())?,
            None => Store::in_memory()?,
        };
        let shelf = Self {
            store,
            codec: config.codec.build(),
            ids: config.ids.build(),
            registry: SchemaRegistry::new(),
        };
        debug!(
            codec = shelf.codec.name(),
            ids = ?config.ids,
            path = ?config.path,
            "shelf configured"
        );
        Ok(shelf)
    }

    /// Replace the value codec.
    ///
    /// Data written with one codec is not readable through another.
    pub fn with_codec(mut self, codec: impl ValueCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// The underlying store, for raw bucket access.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Validate `T`'s schema now rather than on first use.
    pub fn register<T: Record>(&self) -> OdmResult<()> {
        self.registry.schema::<T>().map(|_| ())
    }

    // ---- Write ----

    /// Insert or overwrite `record`.
    ///
    /// An empty identifier is replaced with a freshly generated one before
    /// anything is written; if the save then fails, the identifier is reset
    /// to empty again.
    pub fn save<T: Record>(&self, record: &mut T) -> OdmResult<()> {
        let schema = self.registry.schema::<T>()?;
        let identity = schema.identity()?;

        let assigned = identity.get(record).is_empty();
        if assigned {
            identity.set(record, self.ids.new_id());
        }
        let id = identity.get(record).to_owned();
        let path = instance_bucket_path(schema.type_name(), &id);

        let cx = self.write_context();
        let saved: &T = record;
        let result = self.store.update(|tx| {
            let mut bucket = tx.create_bucket_path(path.segments())?;
            mapper::write_instance(&cx, &schema, &mut bucket, saved)
        });

        match result {
            Ok(()) => {
                debug!(type_name = schema.type_name(), id = %id, assigned, "record saved");
                Ok(())
            }
            Err(e) => {
                if assigned {
                    identity.set(record, String::new());
                }
                debug!(type_name = schema.type_name(), id = %id, error = %e, "save rolled back");
                Err(e)
            }
        }
    }

    // ---- Read ----

    /// Overwrite `record` with the stored record that has the same identifier.
    ///
    /// On failure `record` is left as it was.
    pub fn get<T: Record>(&self, record: &mut T) -> OdmResult<()> {
        let schema = self.registry.schema::<T>()?;
        let id = require_id(&schema, record)?;
        let type_path = type_bucket_path(schema.type_name());
        let path = type_path.child(&id);

        let cx = self.read_context();
        let loaded = self.store.view(|tx| {
            let records = tx
                .bucket_at(type_path.segments())?
                .ok_or_else(|| OdmError::NotFound {
                    path: type_path.clone(),
                })?;
            let bucket = records
                .bucket(id.as_bytes())?
                .ok_or_else(|| OdmError::NotFound { path: path.clone() })?;
            mapper::load_record(&cx, &schema, &path, bucket, &id)
        })?;

        *record = loaded;
        debug!(type_name = schema.type_name(), id = %id, "record loaded");
        Ok(())
    }

    /// Overwrite `record` with the stored record whose identifier sorts first.
    pub fn first<T: Record>(&self, record: &mut T) -> OdmResult<()> {
        let schema = self.registry.schema::<T>()?;
        let type_path = type_bucket_path(schema.type_name());

        let cx = self.read_context();
        let (id, loaded) = self.store.view(|tx| {
            let not_found = || OdmError::NotFound {
                path: type_path.clone(),
            };
            let records = tx.bucket_at(type_path.segments())?.ok_or_else(not_found)?;
            let (key, bucket) = records.first_bucket()?.ok_or_else(not_found)?;
            let id = mapper::key_to_id(&type_path, &key)?;
            let loaded = mapper::load_record(&cx, &schema, &type_path.child(&key), bucket, &id)?;
            Ok::<_, OdmError>((id, loaded))
        })?;

        *record = loaded;
        debug!(type_name = schema.type_name(), id = %id, "first record loaded");
        Ok(())
    }

    /// Replace the contents of `out` with every stored record of type `T`,
    /// ordered by identifier.
    pub fn all<T: Record>(&self, out: &mut Vec<T>) -> OdmResult<()> {
        let schema = self.registry.schema::<T>()?;
        let type_path = type_bucket_path(schema.type_name());

        let cx = self.read_context();
        let records = self.store.view(|tx| {
            let Some(records) = tx.bucket_at(type_path.segments())? else {
                return Ok(Vec::new());
            };
            records
                .buckets()
                .map(|item| {
                    let (key, bucket) = item?;
                    let id = mapper::key_to_id(&type_path, &key)?;
                    mapper::load_record(&cx, &schema, &type_path.child(&key), bucket, &id)
                })
                .collect::<OdmResult<Vec<T>>>()
        })?;

        debug!(type_name = schema.type_name(), count = records.len(), "records loaded");
        *out = records;
        Ok(())
    }

    /// Identifiers of every stored record of type `T`, in order.
    pub fn keys<T: Record>(&self) -> OdmResult<Vec<String>> {
        let schema = self.registry.schema::<T>()?;
        let type_path = type_bucket_path(schema.type_name());

        let keys = self.store.view(|tx| {
            let Some(records) = tx.bucket_at(type_path.segments())? else {
                return Ok(Vec::new());
            };
            records
                .buckets()
                .map(|item| {
                    let (key, _) = item?;
                    mapper::key_to_id(&type_path, &key)
                })
                .collect::<OdmResult<Vec<String>>>()
        })?;

        debug!(type_name = schema.type_name(), count = keys.len(), "keys listed");
        Ok(keys)
    }

    /// Whether a record with `record`'s identifier is stored.
    pub fn exists<T: Record>(&self, record: &T) -> OdmResult<bool> {
        let schema = self.registry.schema::<T>()?;
        let id = require_id(&schema, record)?;
        let path = instance_bucket_path(schema.type_name(), &id);

        let found = self
            .store
            .view(|tx| Ok::<_, OdmError>(tx.bucket_at(path.segments())?.is_some()))?;
        debug!(type_name = schema.type_name(), id = %id, found, "existence checked");
        Ok(found)
    }

    /// Close the shelf and its store.
    pub fn close(self) -> OdmResult<()> {
        self.store.close()?;
        Ok(())
    }

    fn write_context(&self) -> WriteContext<'_> {
        WriteContext {
            codec: self.codec.as_ref(),
            ids: self.ids.as_ref(),
            registry: &self.registry,
        }
    }

    fn read_context(&self) -> ReadContext<'_> {
        ReadContext {
            codec: self.codec.as_ref(),
            registry: &self.registry,
        }
    }
}

impl std::fmt::Debug for Shelf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shelf")
            .field("store", &self.store)
            .field("codec", &self.codec.name())
            .field("registry", &self.registry)
            .finish()
    }
}

fn require_id<T: Record>(schema: &Schema<T>, record: &T) -> OdmResult<String> {
    let id = schema.identity()?.get(record);
    if id.is_empty() {
        return Err(OdmError::MissingIdentifier {
            type_name: schema.type_name(),
        });
    }
    Ok(id.to_owned())
}
