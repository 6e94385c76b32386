use redb::{ReadTransaction, WriteTransaction};

use crate::bucket::{self, BucketMut, BucketRef, DataTable};
use crate::error::StoreResult;
use crate::keys::{DATA_TABLE, META_TABLE};
use crate::store::read_generation;

/// A read-only transaction over one committed snapshot.
///
/// The snapshot never changes underneath the transaction: writers that
/// commit while it is open publish new pages instead of touching these.
pub struct ReadTx {
    table: DataTable,
    _txn: ReadTransaction,
    generation: u64,
}

impl ReadTx {
    pub(crate) fn open(txn: ReadTransaction) -> StoreResult<Self> {
        let generation = read_generation(&txn.open_table(META_TABLE)?)?;
        let table = txn.open_table(DATA_TABLE)?;
        Ok(Self {
            table,
            _txn: txn,
            generation,
        })
    }

    /// Generation of the commit this transaction observes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The top-level bucket.
    pub fn root(&self) -> BucketRef<'_> {
        BucketRef::root(&self.table)
    }

    /// Open a top-level bucket.
    pub fn bucket(&self, name: &[u8]) -> StoreResult<Option<BucketRef<'_>>> {
        self.root().bucket(name)
    }

    /// Open a bucket by path from the top level.
    pub fn bucket_at<K: AsRef<[u8]>>(&self, path: &[K]) -> StoreResult<Option<BucketRef<'_>>> {
        self.root().bucket_at(path)
    }
}

impl std::fmt::Debug for ReadTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadTx")
            .field("generation", &self.generation)
            .finish()
    }
}

/// A write transaction.
///
/// Nothing done through a `WriteTx` is visible to other transactions until
/// the closure passed to [`Store::update`](crate::Store::update) returns
/// `Ok`; on `Err` the transaction is aborted.
pub struct WriteTx {
    txn: WriteTransaction,
    generation: u64,
}

impl WriteTx {
    pub(crate) fn new(txn: WriteTransaction, generation: u64) -> Self {
        Self { txn, generation }
    }

    pub(crate) fn into_inner(self) -> WriteTransaction {
        self.txn
    }

    /// Generation this transaction will publish when it commits.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Mutable handle to the top level.
    pub fn root(&mut self) -> BucketMut<'_> {
        BucketMut::root(&self.txn)
    }

    pub fn contains_bucket(&self, name: &[u8]) -> StoreResult<bool> {
        Ok(bucket::open_child(&self.txn, &[], name)?.is_some())
    }

    /// Open a top-level bucket for writing.
    pub fn bucket_mut(&mut self, name: &[u8]) -> StoreResult<Option<BucketMut<'_>>> {
        bucket::open_child(&self.txn, &[], name)
    }

    pub fn create_bucket(&mut self, name: &[u8]) -> StoreResult<BucketMut<'_>> {
        bucket::create_child(&self.txn, &[], name, false)
    }

    pub fn create_bucket_if_not_exists(&mut self, name: &[u8]) -> StoreResult<BucketMut<'_>> {
        bucket::create_child(&self.txn, &[], name, true)
    }

    /// Open or create every bucket along `path`.
    pub fn create_bucket_path<K: AsRef<[u8]>>(&mut self, path: &[K]) -> StoreResult<BucketMut<'_>> {
        bucket::create_path(&self.txn, &[], path)
    }

    pub fn delete_bucket(&mut self, name: &[u8]) -> StoreResult<()> {
        bucket::remove_child(&self.txn, &[], name)
    }
}

impl std::fmt::Debug for WriteTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTx")
            .field("generation", &self.generation)
            .finish()
    }
}
