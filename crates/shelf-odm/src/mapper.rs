//! Document mapper: walks a record's schema and moves each field between the
//! record and its instance bucket.
//!
//! Scalar fields become one key each, holding the codec's bytes. A
//! record-collection field becomes a child bucket with one grandchild bucket
//! per element. Element buckets are keyed `"{position:020}-{sub id}"` so the
//! store's byte ordering hands them back in their original order; twenty
//! digits cover every `usize` position.

use shelf_store::{BucketMut, BucketRef};
use shelf_types::{IdGenerator, ValueCodec};

use crate::error::{OdmError, OdmResult};
use crate::path::BucketPath;
use crate::registry::SchemaRegistry;
use crate::schema::{Record, Schema, Slot};

pub(crate) struct WriteContext<'a> {
    pub(crate) codec: &'a dyn ValueCodec,
    pub(crate) ids: &'a dyn IdGenerator,
    pub(crate) registry: &'a SchemaRegistry,
}

pub(crate) struct ReadContext<'a> {
    pub(crate) codec: &'a dyn ValueCodec,
    pub(crate) registry: &'a SchemaRegistry,
}

/// Write every field of `record` into `bucket`.
///
/// Existing record-collection buckets are dropped and rebuilt so that a
/// shorter collection does not leave stale elements behind.
pub(crate) fn write_instance<T: Record>(
    cx: &WriteContext<'_>,
    schema: &Schema<T>,
    bucket: &mut BucketMut<'_>,
    record: &T,
) -> OdmResult<()> {
    for field in schema.fields() {
        let key = field.name().as_bytes();
        match field.slot() {
            Slot::Scalar(slot) => {
                let value = slot.load(record);
                let bytes = cx.codec.encode(&value).map_err(|e| OdmError::Encoding {
                    type_name: schema.type_name(),
                    field: field.name(),
                    reason: e.to_string(),
                })?;
                bucket.put(key, &bytes)?;
            }
            Slot::Records(slot) => {
                if bucket.contains_bucket(key)? {
                    bucket.delete_bucket(key)?;
                }
                let mut collection = bucket.create_bucket(key)?;
                slot.write(cx, record, &mut collection)?;
            }
        }
    }
    Ok(())
}

/// Write one element bucket per entry of `elements`.
pub(crate) fn write_elements<E: Record>(
    cx: &WriteContext<'_>,
    collection: &mut BucketMut<'_>,
    elements: &[E],
) -> OdmResult<()> {
    let schema = cx.registry.schema::<E>()?;
    for (position, element) in elements.iter().enumerate() {
        let key = element_key(position, &cx.ids.new_id());
        let mut bucket = collection.create_bucket(key.as_bytes())?;
        write_instance(cx, &schema, &mut bucket, element)?;
    }
    Ok(())
}

/// Overwrite every field of `record` from `bucket`.
///
/// Fails on the first missing or undecodable field; fields before it have
/// already been overwritten, so callers that need all-or-nothing semantics
/// read into a scratch record.
pub(crate) fn read_instance<T: Record>(
    cx: &ReadContext<'_>,
    schema: &Schema<T>,
    bucket: BucketRef<'_>,
    record: &mut T,
) -> OdmResult<()> {
    for field in schema.fields() {
        let key = field.name().as_bytes();
        let decoding = |reason: String| OdmError::Decoding {
            type_name: schema.type_name(),
            field: field.name(),
            reason,
        };
        match field.slot() {
            Slot::Scalar(slot) => {
                let bytes = bucket
                    .get(key)?
                    .ok_or_else(|| decoding("no stored value".into()))?;
                let value = cx
                    .codec
                    .decode(&bytes, slot.kind())
                    .map_err(|e| decoding(e.to_string()))?;
                slot.store(record, value)
                    .map_err(|e| decoding(e.to_string()))?;
            }
            Slot::Records(slot) => {
                let collection = bucket
                    .bucket(key)?
                    .ok_or_else(|| decoding("no stored collection".into()))?;
                slot.read(cx, record, collection)?;
            }
        }
    }
    Ok(())
}

/// Read every element bucket of `collection`, in key order.
pub(crate) fn read_elements<E: Record>(
    cx: &ReadContext<'_>,
    collection: BucketRef<'_>,
) -> OdmResult<Vec<E>> {
    let schema = cx.registry.schema::<E>()?;
    collection
        .buckets()
        .map(|item| {
            let (_, bucket) = item?;
            let mut element = E::default();
            read_instance(cx, &schema, bucket, &mut element)?;
            Ok(element)
        })
        .collect()
}

/// Read a top-level record stored under `key` into a fresh value.
///
/// The stored identifier must equal the bucket key it was found under.
pub(crate) fn load_record<T: Record>(
    cx: &ReadContext<'_>,
    schema: &Schema<T>,
    path: &BucketPath,
    bucket: BucketRef<'_>,
    key: &str,
) -> OdmResult<T> {
    let mut staged = T::default();
    read_instance(cx, schema, bucket, &mut staged)?;
    let stored = schema.identity()?.get(&staged);
    if stored != key {
        return Err(OdmError::Corruption {
            path: path.clone(),
            reason: format!("stored identifier {stored:?} does not match bucket key {key:?}"),
        });
    }
    Ok(staged)
}

/// Decode an instance bucket key as an identifier.
pub(crate) fn key_to_id(parent: &BucketPath, key: &[u8]) -> OdmResult<String> {
    String::from_utf8(key.to_vec()).map_err(|_| OdmError::Corruption {
        path: parent.child(key),
        reason: "instance bucket key is not valid UTF-8".into(),
    })
}

fn element_key(position: usize, sub_id: &str) -> String {
    format!("{position:020}-{sub_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_store::{Store, StoreError};
    use shelf_types::{JsonCodec, SequentialIds};
    use proptest::prelude::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Step {
        id: String,
        label: String,
    }

    impl Record for Step {
        fn schema() -> Schema<Self> {
            Schema::<Self>::builder("Step")
                .id("ID", |s| &s.id, |s| &mut s.id)
                .scalar("Label", |s| &s.label, |s| &mut s.label)
                .build()
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Recipe {
        id: String,
        title: String,
        serves: u16,
        steps: Vec<Step>,
    }

    impl Record for Recipe {
        fn schema() -> Schema<Self> {
            Schema::<Self>::builder("Recipe")
                .id("ID", |r| &r.id, |r| &mut r.id)
                .scalar("Title", |r| &r.title, |r| &mut r.title)
                .scalar("Serves", |r| &r.serves, |r| &mut r.serves)
                .records("Steps", |r| &r.steps, |r| &mut r.steps)
                .build()
        }
    }

    fn recipe(steps: usize) -> Recipe {
        Recipe {
            id: "r-1".into(),
            title: "bread".into(),
            serves: 4,
            steps: (0..steps)
                .map(|i| Step {
                    id: String::new(),
                    label: format!("step {i}"),
                })
                .collect(),
        }
    }

    fn write(store: &Store, registry: &SchemaRegistry, ids: &SequentialIds, record: &Recipe) {
        let cx = WriteContext {
            codec: &JsonCodec,
            ids,
            registry,
        };
        let schema = registry.schema::<Recipe>().unwrap();
        store
            .update(|tx| {
                let mut bucket = tx.create_bucket_path(&["Recipe", record.id.as_str()])?;
                write_instance(&cx, &schema, &mut bucket, record)
            })
            .unwrap();
    }

    fn read(store: &Store, registry: &SchemaRegistry) -> OdmResult<Recipe> {
        let cx = ReadContext {
            codec: &JsonCodec,
            registry,
        };
        let schema = registry.schema::<Recipe>()?;
        let path = BucketPath::new().child("Recipe").child("r-1");
        store.view(|tx| {
            let bucket = tx
                .bucket_at(path.segments())?
                .ok_or_else(|| OdmError::NotFound { path: path.clone() })?;
            load_record(&cx, &schema, &path, bucket, "r-1")
        })
    }

    #[test]
    fn scalars_are_stored_as_codec_bytes() {
        let store = Store::in_memory().unwrap();
        let registry = SchemaRegistry::new();
        let ids = SequentialIds::default();
        write(&store, &registry, &ids, &recipe(0));

        store
            .view(|tx| {
                let bucket = tx.bucket_at(&["Recipe", "r-1"])?.unwrap();
                assert_eq!(bucket.get(b"ID")?, Some(b"\"r-1\"".to_vec()));
                assert_eq!(bucket.get(b"Title")?, Some(b"\"bread\"".to_vec()));
                assert_eq!(bucket.get(b"Serves")?, Some(b"4".to_vec()));
                assert!(bucket.bucket(b"Steps")?.unwrap().is_empty()?);
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn element_keys_sort_by_position() {
        let store = Store::in_memory().unwrap();
        let registry = SchemaRegistry::new();
        let ids = SequentialIds::default();
        write(&store, &registry, &ids, &recipe(12));

        store
            .view(|tx| {
                let steps = tx.bucket_at(&["Recipe", "r-1", "Steps"])?.unwrap();
                let keys: Vec<String> = steps
                    .buckets()
                    .map(|item| item.map(|(k, _)| String::from_utf8(k).unwrap()))
                    .collect::<Result<_, _>>()?;
                assert_eq!(keys.len(), 12);
                assert!(keys[0].starts_with("00000000000000000000-"));
                assert!(keys[11].starts_with("00000000000000000011-"));
                Ok::<_, StoreError>(())
            })
            .unwrap();

        let loaded = read(&store, &registry).unwrap();
        assert_eq!(loaded, recipe(12));
    }

    #[test]
    fn rewrite_drops_stale_elements() {
        let store = Store::in_memory().unwrap();
        let registry = SchemaRegistry::new();
        let ids = SequentialIds::default();
        write(&store, &registry, &ids, &recipe(5));
        write(&store, &registry, &ids, &recipe(2));

        let loaded = read(&store, &registry).unwrap();
        assert_eq!(loaded.steps.len(), 2);
        assert_eq!(loaded, recipe(2));
    }

    #[test]
    fn missing_scalar_is_a_decoding_error() {
        let store = Store::in_memory().unwrap();
        let registry = SchemaRegistry::new();
        let ids = SequentialIds::default();
        write(&store, &registry, &ids, &recipe(1));
        store
            .update(|tx| {
                tx.bucket_mut(b"Recipe")?
                    .unwrap()
                    .bucket_mut(b"r-1")?
                    .unwrap()
                    .delete(b"Serves")
                    .map(|_| ())
            })
            .unwrap();

        let err = read(&store, &registry).unwrap_err();
        assert!(matches!(
            err,
            OdmError::Decoding { type_name: "Recipe", field: "Serves", .. }
        ));
    }

    #[test]
    fn undecodable_scalar_is_a_decoding_error() {
        let store = Store::in_memory().unwrap();
        let registry = SchemaRegistry::new();
        let ids = SequentialIds::default();
        write(&store, &registry, &ids, &recipe(0));
        store
            .update(|tx| {
                tx.create_bucket_path(&["Recipe", "r-1"])?
                    .put(b"Serves", b"\"many\"")
            })
            .unwrap();

        let err = read(&store, &registry).unwrap_err();
        assert!(matches!(err, OdmError::Decoding { field: "Serves", .. }));
    }

    #[test]
    fn identifier_must_match_bucket_key() {
        let store = Store::in_memory().unwrap();
        let registry = SchemaRegistry::new();
        let ids = SequentialIds::default();
        write(&store, &registry, &ids, &recipe(0));
        store
            .update(|tx| {
                tx.create_bucket_path(&["Recipe", "r-1"])?
                    .put(b"ID", b"\"r-2\"")
            })
            .unwrap();

        let err = read(&store, &registry).unwrap_err();
        assert!(matches!(err, OdmError::Corruption { .. }));
        assert!(err.to_string().contains("Recipe/r-1"));
    }

    #[test]
    fn non_utf8_key_is_corruption() {
        let parent = BucketPath::new().child("Recipe");
        assert_eq!(key_to_id(&parent, b"r-1").unwrap(), "r-1");
        let err = key_to_id(&parent, &[0xfe, 0xff]).unwrap_err();
        assert!(err.to_string().contains("Recipe/0xfeff"));
    }

    proptest! {
        #[test]
        fn element_keys_order_by_position(
            a in 0usize..usize::MAX,
            b in 0usize..usize::MAX,
            x in "[0-9a-f-]{1,36}",
            y in "[0-9a-f-]{1,36}",
        ) {
            prop_assume!(a != b);
            let (ka, kb) = (element_key(a, &x), element_key(b, &y));
            prop_assert_eq!(a < b, ka.as_bytes() < kb.as_bytes());
        }
    }
}
