//! Ordered transactional key-value stores
//!
//! The graph layer only needs a small contract from its store:
//! - transactions with point get, set, clear
//! - tuple-prefix range scans and clears
//! - all-or-nothing commit that reports conflicts instead of retrying
//!
//! Two implementations are provided:
//! - `MemoryStore`: in-process, optimistic snapshot transactions
//! - `PersistentStorage`: RocksDB `OptimisticTransactionDB`

pub mod memory;
pub mod storage;

pub use memory::MemoryStore;
pub use storage::{PersistentStorage, StorageConfig};

use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Another transaction committed an overlapping write first
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    /// RocksDB error
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// A panic left shared store state unusable
    #[error("Store state poisoned")]
    Poisoned,
}

impl StoreError {
    /// Whether retrying the whole operation may succeed
    pub fn is_conflict(&self) -> bool {
        match self {
            StoreError::Conflict(_) => true,
            StoreError::RocksDb(e) => matches!(
                e.kind(),
                rocksdb::ErrorKind::Busy | rocksdb::ErrorKind::TryAgain
            ),
            StoreError::Poisoned => false,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Ordered key/value pair returned by range scans
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// A store that hands out transactions
pub trait KvStore: Send + Sync {
    /// Open a new transaction
    fn begin(&self) -> StoreResult<Box<dyn KvTransaction + '_>>;
}

/// One atomic unit of reads and writes.
///
/// Reads observe the transaction's own uncommitted writes. Dropping a
/// transaction without committing discards it.
pub trait KvTransaction {
    fn get(&mut self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    fn set(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Clearing an absent key is a no-op
    fn clear(&mut self, key: &[u8]) -> StoreResult<()>;

    /// Every row under the packed tuple `prefix`, in key order.
    ///
    /// That is the key range `[prefix, range_end(prefix))`: keys that merely
    /// share the bytes of `prefix` by continuing its last string with an
    /// escaped NUL are not returned.
    fn scan_prefix(&mut self, prefix: &[u8]) -> StoreResult<Vec<KeyValue>>;

    fn clear_prefix(&mut self, prefix: &[u8]) -> StoreResult<()> {
        for (key, _) in self.scan_prefix(prefix)? {
            self.clear(&key)?;
        }
        Ok(())
    }

    fn commit(self: Box<Self>) -> StoreResult<()>;
}
