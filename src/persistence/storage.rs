//! RocksDB storage layer implementation
//!
//! Backs the graph with an `OptimisticTransactionDB`. Each transaction takes a
//! snapshot at start and every read, point or range, is served from it. Point
//! reads and every row a scan returns go through `get_for_update`, so a commit
//! fails with `Busy` when one of those keys was changed by another committed
//! transaction in the meantime. RocksDB does not track the gaps of a scanned
//! range: a row inserted into the range by another transaction is only caught
//! when that transaction also wrote a key this one read.

use super::{KeyValue, KvStore, KvTransaction, StoreResult};
use crate::codec::tuple::{covers, range_end};
use rocksdb::{
    DBCompressionType, DBRecoveryMode, Direction, IteratorMode, OptimisticTransactionDB,
    OptimisticTransactionOptions, Options, ReadOptions, Transaction, WriteOptions,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Block compression for the RocksDB column family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    None,
    Lz4,
    Zstd,
}

impl From<Compression> for DBCompressionType {
    fn from(compression: Compression) -> Self {
        match compression {
            Compression::None => DBCompressionType::None,
            Compression::Lz4 => DBCompressionType::Lz4,
            Compression::Zstd => DBCompressionType::Zstd,
        }
    }
}

/// RocksDB tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database directory
    pub path: PathBuf,
    pub create_if_missing: bool,
    /// Memtable size in bytes
    pub write_buffer_size: usize,
    pub max_write_buffer_number: i32,
    pub compression: Compression,
}

impl StorageConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./kvgraph_data"),
            create_if_missing: true,
            write_buffer_size: 64 * 1024 * 1024, // 64 MB
            max_write_buffer_number: 3,
            compression: Compression::Lz4,
        }
    }
}

/// RocksDB-based persistent storage
pub struct PersistentStorage {
    db: Arc<OptimisticTransactionDB>,
    path: PathBuf,
}

impl PersistentStorage {
    /// Open or create a store with default tuning
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with(&StorageConfig::new(path))
    }

    pub fn open_with(config: &StorageConfig) -> StoreResult<Self> {
        info!("Opening persistent storage at: {:?}", config.path);

        let mut opts = Options::default();
        opts.create_if_missing(config.create_if_missing);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_min_write_buffer_number_to_merge(1);
        opts.set_compression_type(config.compression.into());
        opts.set_wal_recovery_mode(DBRecoveryMode::PointInTime);

        let db: OptimisticTransactionDB = OptimisticTransactionDB::open(&opts, &config.path)?;

        info!("Persistent storage opened successfully");

        Ok(Self {
            db: Arc::new(db),
            path: config.path.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush memtables to disk
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl KvStore for PersistentStorage {
    fn begin(&self) -> StoreResult<Box<dyn KvTransaction + '_>> {
        let mut txn_opts = OptimisticTransactionOptions::new();
        txn_opts.set_snapshot(true);
        let txn = self.db.transaction_opt(&WriteOptions::default(), &txn_opts);
        Ok(Box::new(RocksTransaction { txn }))
    }
}

struct RocksTransaction<'db> {
    txn: Transaction<'db, OptimisticTransactionDB>,
}

impl RocksTransaction<'_> {
    /// Read options pinned to the transaction's start snapshot
    fn snapshot_read(&self) -> ReadOptions {
        let mut opts = ReadOptions::default();
        opts.set_snapshot(&self.txn.snapshot());
        opts
    }
}

impl KvTransaction for RocksTransaction<'_> {
    fn get(&mut self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let opts = self.snapshot_read();
        Ok(self.txn.get_for_update_opt(key, true, &opts)?)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.txn.put(key, value)?;
        Ok(())
    }

    fn clear(&mut self, key: &[u8]) -> StoreResult<()> {
        self.txn.delete(key)?;
        Ok(())
    }

    fn scan_prefix(&mut self, prefix: &[u8]) -> StoreResult<Vec<KeyValue>> {
        let mut opts = self.snapshot_read();
        opts.set_iterate_upper_bound(range_end(prefix));
        let mut rows = Vec::new();
        for item in self
            .txn
            .iterator_opt(IteratorMode::From(prefix, Direction::Forward), opts)
        {
            let (key, value) = item?;
            // Bound check for pending writes merged into the iterator
            if !covers(prefix, &key) {
                break;
            }
            rows.push((key.into_vec(), value.into_vec()));
        }
        // Register every returned row for commit-time validation
        let opts = self.snapshot_read();
        for (key, _) in &rows {
            self.txn.get_for_update_opt(key, true, &opts)?;
        }
        Ok(rows)
    }

    fn commit(self: Box<Self>) -> StoreResult<()> {
        self.txn.commit()?;
        Ok(())
    }
}
