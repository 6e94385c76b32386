use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use redb::backends::InMemoryBackend;
use redb::{Database, DatabaseError, Durability, ReadableTable, StorageError, WriteTransaction};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::keys::{DATA_TABLE, GENERATION_KEY, META_TABLE};
use crate::tx::{ReadTx, WriteTx};

/// Options controlling how a file-backed store is opened.
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// Reject write transactions.
    pub read_only: bool,
    /// Create the data file (and missing parent directories) when absent.
    pub create_if_missing: bool,
    /// `fsync` every commit before it becomes visible.
    pub sync_writes: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            create_if_missing: true,
            sync_writes: true,
        }
    }
}

impl StoreOptions {
    /// Options for opening an existing file without ever writing to it.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            create_if_missing: false,
            ..Self::default()
        }
    }
}

pub(crate) fn read_generation<T>(meta: &T) -> StoreResult<u64>
where
    T: ReadableTable<&'static str, u64>,
{
    let generation = meta.get(GENERATION_KEY)?.map(|value| value.value());
    Ok(generation.unwrap_or(0))
}

fn commit(txn: WriteTransaction, generation: u64) -> StoreResult<()> {
    {
        let mut meta = txn.open_table(META_TABLE)?;
        meta.insert(GENERATION_KEY, generation)?;
    }
    txn.commit()?;
    Ok(())
}

/// Embedded ordered hierarchical key-value store on top of redb.
///
/// Concurrency follows redb's single-writer/multi-reader discipline:
/// - any number of [`ReadTx`] may run at once, each on an immutable snapshot;
/// - write transactions serialize;
/// - a writer's changes become visible atomically when its closure returns
///   `Ok`, and are discarded when it returns `Err`.
///
/// A store is either purely in memory or backed by a single redb file.
pub struct Store {
    db: Database,
    path: Option<PathBuf>,
    options: StoreOptions,
}

impl Store {
    /// Open or create a file-backed store.
    ///
    /// `mode` holds the Unix permission bits applied to the data file; it is
    /// ignored on other platforms.
    pub fn open(path: impl AsRef<Path>, mode: u32, options: StoreOptions) -> StoreResult<Self> {
        let path = path.as_ref();

        if !path.try_exists()? {
            if options.read_only || !options.create_if_missing {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("store file not found: {}", path.display()),
                )));
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(path).map_err(|e| match e {
            DatabaseError::Storage(StorageError::Corrupted(reason)) => {
                StoreError::Corrupt(format!("{}: {reason}", path.display()))
            }
            DatabaseError::UpgradeRequired(version) => StoreError::Corrupt(format!(
                "{}: unsupported file format version {version}",
                path.display()
            )),
            other => other.into(),
        })?;

        if !options.read_only {
            set_mode(path, mode)?;
        }

        let store = Self::init(db, Some(path.to_path_buf()), options)?;
        info!(
            path = %path.display(),
            generation = store.generation()?,
            read_only = store.options.read_only,
            "store opened"
        );
        Ok(store)
    }

    /// Create an empty store that lives only in memory.
    pub fn in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::init(db, None, StoreOptions::default())
    }

    /// Make sure both tables exist so read transactions can always open them.
    fn init(db: Database, path: Option<PathBuf>, options: StoreOptions) -> StoreResult<Self> {
        if !options.read_only {
            let txn = db.begin_write()?;
            {
                txn.open_table(DATA_TABLE)?;
                txn.open_table(META_TABLE)?;
            }
            txn.commit()?;
        }
        Ok(Self { db, path, options })
    }

    /// Path of the data file, if the store is file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.options.read_only
    }

    /// Generation of the latest commit.
    pub fn generation(&self) -> StoreResult<u64> {
        let txn = self.db.begin_read()?;
        let meta = txn.open_table(META_TABLE)?;
        read_generation(&meta)
    }

    /// Run `f` inside a read-only transaction.
    pub fn view<R, E>(&self, f: impl FnOnce(&ReadTx) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let txn = self.db.begin_read().map_err(StoreError::from)?;
        let tx = ReadTx::open(txn)?;
        f(&tx)
    }

    /// Run `f` inside a write transaction.
    ///
    /// The transaction commits if `f` returns `Ok` and rolls back otherwise;
    /// either way the result of `f` is returned unchanged. Commit failures
    /// surface as `E::from(StoreError)` and leave the previously committed
    /// state in place.
    pub fn update<R, E>(&self, f: impl FnOnce(&mut WriteTx) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        if self.options.read_only {
            return Err(StoreError::ReadOnly.into());
        }

        let mut txn = self.db.begin_write().map_err(StoreError::from)?;
        if !self.options.sync_writes {
            txn.set_durability(Durability::Eventual);
        }
        let generation = {
            let meta = txn.open_table(META_TABLE).map_err(StoreError::from)?;
            read_generation(&meta)? + 1
        };

        let mut tx = WriteTx::new(txn, generation);
        let out = f(&mut tx);
        let txn = tx.into_inner();

        match out {
            Ok(out) => {
                commit(txn, generation)?;
                debug!(generation, "write transaction committed");
                Ok(out)
            }
            Err(e) => {
                if let Err(abort) = txn.abort() {
                    warn!(generation, error = %abort, "abort failed");
                }
                debug!(generation, "write transaction rolled back");
                Err(e)
            }
        }
    }

    /// Close the store.
    ///
    /// With `sync_writes` off, commits so far are flushed by one final
    /// durable commit; otherwise every commit is already durable and this
    /// only releases the handle.
    pub fn close(self) -> StoreResult<()> {
        if !self.options.sync_writes && !self.options.read_only {
            self.db.begin_write()?.commit()?;
        }
        let generation = self.generation()?;
        match self.path() {
            Some(path) => info!(path = %path.display(), generation, "store closed"),
            None => info!(generation, "in-memory store closed"),
        }
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path())
            .field("read_only", &self.options.read_only)
            .finish()
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
