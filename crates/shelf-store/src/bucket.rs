//! Buckets: ordered containers of values and nested buckets.
//!
//! A key inside a bucket names either a value or a sub-bucket, never both.
//! Keys are ordered by their raw bytes, so cursors always walk a bucket in
//! lexicographic order. Handles are cheap: a bucket is addressed by its
//! encoded path and every operation is a lookup or range scan on the data
//! table of the enclosing transaction.

use redb::{ReadOnlyTable, ReadableTable, WriteTransaction};

use crate::error::{display_key, StoreError, StoreResult};
use crate::keys::{
    child_key, child_name, decode_node, encode_value, subtree_end, Node, BUCKET_MARKER, DATA_TABLE,
};

pub(crate) type DataTable = ReadOnlyTable<&'static [u8], &'static [u8]>;

fn node_at<T>(table: &T, key: &[u8]) -> StoreResult<Option<Node>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let node = match table.get(key)? {
        Some(record) => Some(decode_node(key, record.value())?),
        None => None,
    };
    Ok(node)
}

/// First raw record at or after `lower`, stopping before `upper` when given.
fn first_from<T>(table: &T, lower: &[u8], upper: Option<&[u8]>) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let item = match upper {
        Some(upper) => table.range(lower..upper)?.next(),
        None => table.range(lower..)?.next(),
    };
    match item {
        Some(item) => {
            let (key, record) = item?;
            Ok(Some((key.value().to_vec(), record.value().to_vec())))
        }
        None => Ok(None),
    }
}

/// One item yielded by a [`Cursor`].
#[derive(Clone, Debug)]
pub enum Entry<'a> {
    Value(Vec<u8>),
    Bucket(BucketRef<'a>),
}

impl<'a> Entry<'a> {
    pub fn is_bucket(&self) -> bool {
        matches!(self, Self::Bucket(_))
    }

    pub fn into_bucket(self) -> Option<BucketRef<'a>> {
        match self {
            Self::Bucket(bucket) => Some(bucket),
            Self::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&[u8]> {
        match self {
            Self::Value(value) => Some(value.as_slice()),
            Self::Bucket(_) => None,
        }
    }
}

/// Ordered iterator over the direct entries of one bucket.
///
/// Yields `(key, entry)` pairs in ascending key-byte order. Each step seeks
/// past the subtree of the entry it just returned, so nested buckets cost one
/// seek no matter how much they hold. The first error ends the iteration.
pub struct Cursor<'a> {
    table: &'a DataTable,
    prefix: Vec<u8>,
    lower: Vec<u8>,
    upper: Option<Vec<u8>>,
    done: bool,
}

impl<'a> Cursor<'a> {
    fn new(table: &'a DataTable, prefix: &[u8]) -> Self {
        let mut lower = prefix.to_vec();
        lower.push(0);
        Self {
            table,
            prefix: prefix.to_vec(),
            lower,
            upper: (!prefix.is_empty()).then(|| subtree_end(prefix)),
            done: false,
        }
    }

    fn step(&mut self) -> StoreResult<Option<(Vec<u8>, Entry<'a>)>> {
        let Some((key, record)) = first_from(self.table, &self.lower, self.upper.as_deref())? else {
            return Ok(None);
        };
        let name = child_name(&self.prefix, &key).ok_or_else(|| {
            StoreError::Corrupt(format!("key {} has no parent bucket", display_key(&key)))
        })?;
        self.lower = subtree_end(&key);
        let entry = match decode_node(&key, &record)? {
            Node::Bucket => Entry::Bucket(BucketRef { table: self.table, key }),
            Node::Value(value) => Entry::Value(value),
        };
        Ok(Some((name, entry)))
    }
}

impl<'a> Iterator for Cursor<'a> {
    type Item = StoreResult<(Vec<u8>, Entry<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let step = self.step();
        if !matches!(step, Ok(Some(_))) {
            self.done = true;
        }
        step.transpose()
    }
}

/// Read-only handle to a bucket inside a [`ReadTx`](crate::ReadTx).
#[derive(Clone)]
pub struct BucketRef<'a> {
    table: &'a DataTable,
    key: Vec<u8>,
}

impl<'a> BucketRef<'a> {
    pub(crate) fn root(table: &'a DataTable) -> Self {
        Self {
            table,
            key: Vec::new(),
        }
    }

    /// Value stored under `key`. `None` if absent or if `key` names a bucket.
    pub fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        match node_at(self.table, &child_key(&self.key, key))? {
            Some(Node::Value(value)) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// Open the nested bucket `name`. `None` if absent or if `name` is a value.
    pub fn bucket(&self, name: &[u8]) -> StoreResult<Option<BucketRef<'a>>> {
        let key = child_key(&self.key, name);
        match node_at(self.table, &key)? {
            Some(Node::Bucket) => Ok(Some(BucketRef {
                table: self.table,
                key,
            })),
            _ => Ok(None),
        }
    }

    /// Open a nested bucket by walking `path` one segment at a time.
    pub fn bucket_at<K: AsRef<[u8]>>(&self, path: &[K]) -> StoreResult<Option<BucketRef<'a>>> {
        let mut current = self.clone();
        for segment in path {
            match current.bucket(segment.as_ref())? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    pub fn contains_bucket(&self, name: &[u8]) -> StoreResult<bool> {
        Ok(self.bucket(name)?.is_some())
    }

    /// Cursor over every direct entry, values and buckets alike.
    pub fn cursor(&self) -> Cursor<'a> {
        Cursor::new(self.table, &self.key)
    }

    /// Nested buckets only, in key order.
    pub fn buckets(&self) -> impl Iterator<Item = StoreResult<(Vec<u8>, BucketRef<'a>)>> + 'a {
        self.cursor().filter_map(|item| match item {
            Ok((key, Entry::Bucket(bucket))) => Some(Ok((key, bucket))),
            Ok((_, Entry::Value(_))) => None,
            Err(e) => Some(Err(e)),
        })
    }

    /// The first nested bucket in key order.
    pub fn first_bucket(&self) -> StoreResult<Option<(Vec<u8>, BucketRef<'a>)>> {
        self.buckets().next().transpose()
    }

    /// Number of direct entries (values and buckets).
    pub fn len(&self) -> StoreResult<usize> {
        self.cursor().try_fold(0, |n, item| item.map(|_| n + 1))
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.cursor().next().transpose()?.is_none())
    }
}

impl std::fmt::Debug for BucketRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketRef")
            .field("key", &hex::encode(&self.key))
            .finish()
    }
}

// Write-side primitives shared by `BucketMut` and `WriteTx`. They take the
// transaction directly so the returned handle borrows only the transaction.

fn read_node(txn: &WriteTransaction, key: &[u8]) -> StoreResult<Option<Node>> {
    let table = txn.open_table(DATA_TABLE)?;
    node_at(&table, key)
}

pub(crate) fn open_child<'t>(
    txn: &'t WriteTransaction,
    parent: &[u8],
    name: &[u8],
) -> StoreResult<Option<BucketMut<'t>>> {
    let key = child_key(parent, name);
    match read_node(txn, &key)? {
        Some(Node::Bucket) => Ok(Some(BucketMut { txn, key })),
        _ => Ok(None),
    }
}

pub(crate) fn create_child<'t>(
    txn: &'t WriteTransaction,
    parent: &[u8],
    name: &[u8],
    exist_ok: bool,
) -> StoreResult<BucketMut<'t>> {
    if name.is_empty() {
        return Err(StoreError::BucketNameRequired);
    }
    let key = child_key(parent, name);
    let mut table = txn.open_table(DATA_TABLE)?;
    match node_at(&table, &key)? {
        Some(Node::Bucket) if exist_ok => {}
        Some(Node::Bucket) => return Err(StoreError::BucketExists(display_key(name))),
        Some(Node::Value(_)) => return Err(StoreError::IncompatibleValue(display_key(name))),
        None => {
            table.insert(key.as_slice(), BUCKET_MARKER)?;
        }
    }
    Ok(BucketMut { txn, key })
}

pub(crate) fn create_path<'t, K: AsRef<[u8]>>(
    txn: &'t WriteTransaction,
    parent: &[u8],
    path: &[K],
) -> StoreResult<BucketMut<'t>> {
    let mut current = BucketMut {
        txn,
        key: parent.to_vec(),
    };
    for segment in path {
        current = create_child(txn, &current.key, segment.as_ref(), true)?;
    }
    Ok(current)
}

pub(crate) fn remove_child(txn: &WriteTransaction, parent: &[u8], name: &[u8]) -> StoreResult<()> {
    let key = child_key(parent, name);
    let mut table = txn.open_table(DATA_TABLE)?;
    match node_at(&table, &key)? {
        Some(Node::Bucket) => {}
        Some(Node::Value(_)) => return Err(StoreError::IncompatibleValue(display_key(name))),
        None => return Err(StoreError::BucketNotFound(display_key(name))),
    }

    // Collect first: the table cannot be mutated while a range is open.
    let end = subtree_end(&key);
    let doomed = table
        .range(key.as_slice()..end.as_slice())?
        .map(|item| {
            let (key, _) = item?;
            Ok::<_, StoreError>(key.value().to_vec())
        })
        .collect::<Result<Vec<_>, _>>()?;
    for key in &doomed {
        table.remove(key.as_slice())?;
    }
    Ok(())
}

/// Mutable handle to a bucket inside a [`WriteTx`](crate::WriteTx).
///
/// Reads through a `BucketMut` see every change made earlier in the same
/// transaction.
pub struct BucketMut<'a> {
    txn: &'a WriteTransaction,
    key: Vec<u8>,
}

impl<'a> BucketMut<'a> {
    pub(crate) fn root(txn: &'a WriteTransaction) -> Self {
        Self {
            txn,
            key: Vec::new(),
        }
    }

    pub fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        match read_node(self.txn, &child_key(&self.key, key))? {
            Some(Node::Value(value)) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    pub fn contains_bucket(&self, name: &[u8]) -> StoreResult<bool> {
        Ok(matches!(
            read_node(self.txn, &child_key(&self.key, name))?,
            Some(Node::Bucket)
        ))
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        let table = self.txn.open_table(DATA_TABLE)?;
        let mut lower = self.key.clone();
        lower.push(0);
        let upper = (!self.key.is_empty()).then(|| subtree_end(&self.key));
        Ok(first_from(&table, &lower, upper.as_deref())?.is_none())
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::KeyRequired);
        }
        let path = child_key(&self.key, key);
        let mut table = self.txn.open_table(DATA_TABLE)?;
        if let Some(Node::Bucket) = node_at(&table, &path)? {
            return Err(StoreError::IncompatibleValue(display_key(key)));
        }
        table.insert(path.as_slice(), encode_value(value).as_slice())?;
        Ok(())
    }

    /// Remove the value under `key`. Returns `true` if a value was removed.
    pub fn delete(&mut self, key: &[u8]) -> StoreResult<bool> {
        let path = child_key(&self.key, key);
        let mut table = self.txn.open_table(DATA_TABLE)?;
        match node_at(&table, &path)? {
            Some(Node::Bucket) => Err(StoreError::IncompatibleValue(display_key(key))),
            Some(Node::Value(_)) => {
                table.remove(path.as_slice())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Open the nested bucket `name` for writing.
    pub fn bucket_mut(&mut self, name: &[u8]) -> StoreResult<Option<BucketMut<'_>>> {
        open_child(self.txn, &self.key, name)
    }

    /// Create the nested bucket `name`; fails if anything already uses the key.
    pub fn create_bucket(&mut self, name: &[u8]) -> StoreResult<BucketMut<'_>> {
        create_child(self.txn, &self.key, name, false)
    }

    /// Open the nested bucket `name`, creating it when absent.
    pub fn create_bucket_if_not_exists(&mut self, name: &[u8]) -> StoreResult<BucketMut<'_>> {
        create_child(self.txn, &self.key, name, true)
    }

    /// Open or create every bucket along `path`.
    pub fn create_bucket_path<K: AsRef<[u8]>>(&mut self, path: &[K]) -> StoreResult<BucketMut<'_>> {
        create_path(self.txn, &self.key, path)
    }

    /// Remove the nested bucket `name` and everything below it.
    pub fn delete_bucket(&mut self, name: &[u8]) -> StoreResult<()> {
        remove_child(self.txn, &self.key, name)
    }
}

impl std::fmt::Debug for BucketMut<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketMut")
            .field("key", &hex::encode(&self.key))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Store, StoreError};
    use proptest::prelude::*;

    fn write(store: &Store, f: impl FnOnce(&mut BucketMut<'_>) -> StoreResult<()>) {
        store.update(|tx| f(&mut tx.root())).unwrap();
    }

    fn names<'a>(items: impl Iterator<Item = StoreResult<(Vec<u8>, BucketRef<'a>)>>) -> Vec<Vec<u8>> {
        items.map(|item| item.unwrap().0).collect()
    }

    #[test]
    fn put_and_get_value() {
        let store = Store::in_memory().unwrap();
        store
            .update(|tx| {
                let mut root = tx.root();
                root.put(b"name", b"shelf")?;
                assert_eq!(root.get(b"name")?, Some(b"shelf".to_vec()));
                root.put(b"name", b"again")?;
                Ok::<_, StoreError>(())
            })
            .unwrap();

        store
            .view(|tx| {
                assert_eq!(tx.root().get(b"name")?, Some(b"again".to_vec()));
                assert_eq!(tx.root().len()?, 1);
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn empty_keys_are_rejected() {
        let store = Store::in_memory().unwrap();
        store
            .update(|tx| {
                let mut root = tx.root();
                assert!(matches!(root.put(b"", b"x"), Err(StoreError::KeyRequired)));
                assert!(matches!(
                    root.create_bucket_if_not_exists(b""),
                    Err(StoreError::BucketNameRequired)
                ));
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn values_and_buckets_do_not_mix() {
        let store = Store::in_memory().unwrap();
        store
            .update(|tx| {
                let mut root = tx.root();
                root.put(b"leaf", b"1")?;
                root.create_bucket(b"branch")?;

                assert!(matches!(
                    root.create_bucket_if_not_exists(b"leaf"),
                    Err(StoreError::IncompatibleValue(_))
                ));
                assert!(matches!(
                    root.put(b"branch", b"2"),
                    Err(StoreError::IncompatibleValue(_))
                ));
                assert!(matches!(
                    root.delete(b"branch"),
                    Err(StoreError::IncompatibleValue(_))
                ));
                assert!(matches!(
                    root.delete_bucket(b"leaf"),
                    Err(StoreError::IncompatibleValue(_))
                ));
                assert!(root.get(b"branch")?.is_none());
                assert!(!root.contains_bucket(b"leaf")?);
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn create_bucket_rejects_existing() {
        let store = Store::in_memory().unwrap();
        write(&store, |root| {
            root.create_bucket(b"b")?;
            assert!(matches!(
                root.create_bucket(b"b"),
                Err(StoreError::BucketExists(name)) if name == "b"
            ));
            // The lenient variant opens the existing bucket.
            root.create_bucket_if_not_exists(b"b")?.put(b"k", b"v")
        });
        store
            .view(|tx| {
                assert_eq!(tx.bucket(b"b")?.unwrap().get(b"k")?, Some(b"v".to_vec()));
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn nested_paths() {
        let store = Store::in_memory().unwrap();
        write(&store, |root| {
            root.create_bucket_path(&["a", "b", "c"])?.put(b"deep", b"yes")
        });
        store
            .view(|tx| {
                let deep = tx.bucket_at(&["a", "b", "c"])?.unwrap();
                assert_eq!(deep.get(b"deep")?, Some(b"yes".to_vec()));
                assert!(tx.bucket_at(&["a", "x"])?.is_none());
                assert!(tx.bucket_at(&["a", "b", "c", "deep"])?.is_none());
                assert!(tx.bucket_at::<&str>(&[])?.is_some());
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn delete_bucket_removes_subtree() {
        let store = Store::in_memory().unwrap();
        write(&store, |root| {
            root.create_bucket_path(&["t", "1"])?.put(b"k", b"v")?;
            root.create_bucket_path(&["u"])?.put(b"k", b"kept")
        });
        write(&store, |root| {
            root.delete_bucket(b"t")?;
            assert!(!root.contains_bucket(b"t")?);
            assert!(matches!(
                root.delete_bucket(b"t"),
                Err(StoreError::BucketNotFound(_))
            ));
            Ok(())
        });
        store
            .view(|tx| {
                assert!(tx.bucket_at(&["t", "1"])?.is_none());
                assert_eq!(tx.root().len()?, 1);
                assert_eq!(tx.bucket(b"u")?.unwrap().get(b"k")?, Some(b"kept".to_vec()));
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn delete_value() {
        let store = Store::in_memory().unwrap();
        write(&store, |root| {
            root.put(b"k", b"v")?;
            assert!(root.delete(b"k")?);
            assert!(!root.delete(b"k")?);
            assert!(root.is_empty()?);
            Ok(())
        });
    }

    #[test]
    fn cursor_walks_in_byte_order() {
        let store = Store::in_memory().unwrap();
        write(&store, |root| {
            root.put(b"b", b"2")?;
            root.create_bucket(b"c")?.put(b"inner", b"skipped")?;
            root.put(b"a", b"1")
        });

        store
            .view(|tx| {
                let entries = tx.root().cursor().collect::<StoreResult<Vec<_>>>()?;
                let keys: Vec<&[u8]> = entries.iter().map(|(k, _)| k.as_slice()).collect();
                assert_eq!(keys, vec![&b"a"[..], &b"b"[..], &b"c"[..]]);

                let kinds: Vec<bool> = entries.iter().map(|(_, e)| e.is_bucket()).collect();
                assert_eq!(kinds, vec![false, false, true]);
                assert_eq!(entries[1].1.as_value(), Some(&b"2"[..]));
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn buckets_skips_values() {
        let store = Store::in_memory().unwrap();
        write(&store, |root| {
            root.put(b"0-value", b"v")?;
            root.create_bucket(b"1-bucket")?;
            root.create_bucket(b"2-bucket")?;
            Ok(())
        });
        store
            .view(|tx| {
                let root = tx.root();
                let names: Vec<Vec<u8>> = root
                    .buckets()
                    .map(|item| item.map(|(k, _)| k))
                    .collect::<StoreResult<_>>()?;
                assert_eq!(names, vec![b"1-bucket".to_vec(), b"2-bucket".to_vec()]);
                assert_eq!(root.first_bucket()?.unwrap().0, b"1-bucket");
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn first_bucket_of_empty_is_none() {
        let store = Store::in_memory().unwrap();
        write(&store, |root| root.create_bucket(b"empty").map(|_| ()));
        store
            .view(|tx| {
                let empty = tx.bucket(b"empty")?.unwrap();
                assert!(empty.is_empty()?);
                assert!(empty.first_bucket()?.is_none());
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn names_with_zero_bytes_stay_distinct() {
        let store = Store::in_memory().unwrap();
        write(&store, |root| {
            root.create_bucket(b"a")?.put(b"k", b"1")?;
            root.create_bucket(b"a\x00")?.put(b"k", b"2")?;
            root.create_bucket(b"a\x00\x01")?;
            Ok(())
        });
        store
            .view(|tx| {
                let root = tx.root();
                let walked: Vec<Vec<u8>> = root
                    .buckets()
                    .map(|item| item.map(|(k, _)| k))
                    .collect::<StoreResult<_>>()?;
                assert_eq!(walked, vec![b"a".to_vec(), b"a\x00".to_vec(), b"a\x00\x01".to_vec()]);
                assert_eq!(root.bucket(b"a\x00")?.unwrap().get(b"k")?, Some(b"2".to_vec()));
                assert!(root.bucket(b"a")?.unwrap().first_bucket()?.is_none());
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn debug_shows_encoded_key() {
        let store = Store::in_memory().unwrap();
        write(&store, |root| root.create_bucket(b"b").map(|_| ()));
        store
            .view(|tx| {
                let debug = format!("{:?}", tx.bucket(b"b")?.unwrap());
                assert!(debug.contains("BucketRef"));
                assert!(debug.contains("620001"));
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    proptest! {
        #[test]
        fn cursor_order_is_sorted_and_complete(keys in proptest::collection::btree_set(proptest::collection::vec(any::<u8>(), 1..8), 0..32)) {
            let store = Store::in_memory().unwrap();
            store.update(|tx| {
                let mut root = tx.root();
                for key in keys.iter().rev() {
                    root.create_bucket_if_not_exists(key)?.put(b"v", key)?;
                }
                Ok::<_, StoreError>(())
            }).unwrap();

            let walked = store.view(|tx| {
                let root = tx.root();
                Ok::<_, StoreError>(names(root.buckets()))
            });
            let expected: Vec<Vec<u8>> = keys.into_iter().collect();
            prop_assert_eq!(walked.unwrap(), expected);
        }
    }
}
