//! In-process ordered store
//!
//! Rows live in a `BTreeMap` stamped with the commit version that last wrote
//! them. Transactions read at their start version and abort with a conflict
//! as soon as they meet a row committed after it; at commit time every key
//! read and every prefix scanned is validated again before the buffered
//! writes are applied under one new version. Deleted rows stay behind as
//! tombstones until no running transaction can still observe them.

use super::{KeyValue, KvStore, KvTransaction, StoreError, StoreResult};
use crate::codec::tuple::covers;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ops::Bound;
use std::sync::{Mutex, RwLock};
use tracing::debug;

#[derive(Debug, Clone)]
struct Versioned {
    version: u64,
    value: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    rows: BTreeMap<Vec<u8>, Versioned>,
    /// Clears in commit order, pruned once no reader predates them
    tombstones: VecDeque<(u64, Vec<u8>)>,
    version: u64,
}

impl MemoryState {
    fn prune_tombstones(&mut self, horizon: u64) {
        while let Some((version, _)) = self.tombstones.front() {
            if *version > horizon {
                break;
            }
            if let Some((version, key)) = self.tombstones.pop_front() {
                let dead = self
                    .rows
                    .get(&key)
                    .map_or(false, |row| row.version == version && row.value.is_none());
                if dead {
                    self.rows.remove(&key);
                }
            }
        }
    }

    fn range<'a>(&'a self, prefix: &'a [u8]) -> impl Iterator<Item = (&'a Vec<u8>, &'a Versioned)> + 'a {
        self.rows
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(key, _)| covers(prefix, key))
    }
}

/// In-memory `KvStore`
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    /// Start versions of running transactions, with multiplicity
    active: Mutex<BTreeMap<u64, usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live rows (tombstones excluded)
    pub fn len(&self) -> usize {
        self.state
            .read()
            .map(|state| state.rows.values().filter(|v| v.value.is_some()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn register(&self, version: u64) -> StoreResult<()> {
        let mut active = self.active.lock().map_err(|_| StoreError::Poisoned)?;
        *active.entry(version).or_insert(0) += 1;
        Ok(())
    }

    fn unregister(&self, version: u64) {
        if let Ok(mut active) = self.active.lock() {
            if let Some(count) = active.get_mut(&version) {
                *count -= 1;
                if *count == 0 {
                    active.remove(&version);
                }
            }
        }
    }

    fn oldest_active(&self) -> Option<u64> {
        self.active
            .lock()
            .ok()
            .and_then(|active| active.keys().next().copied())
    }
}

impl KvStore for MemoryStore {
    fn begin(&self) -> StoreResult<Box<dyn KvTransaction + '_>> {
        let read_version = self.state.read().map_err(|_| StoreError::Poisoned)?.version;
        self.register(read_version)?;
        Ok(Box::new(MemoryTransaction {
            store: self,
            read_version,
            reads: BTreeSet::new(),
            scans: Vec::new(),
            writes: BTreeMap::new(),
            finished: false,
        }))
    }
}

struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    read_version: u64,
    reads: BTreeSet<Vec<u8>>,
    scans: Vec<Vec<u8>>,
    /// Buffered writes; `None` marks a clear
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    finished: bool,
}

impl MemoryTransaction<'_> {
    fn stale(&self, key: &[u8], version: u64) -> StoreError {
        StoreError::Conflict(format!(
            "key {:02x?} changed at version {} after read version {}",
            key, version, self.read_version
        ))
    }

    /// First read or scanned row overwritten since this transaction started
    fn validate(&self, state: &MemoryState) -> Option<StoreError> {
        for key in &self.reads {
            if let Some(row) = state.rows.get(key) {
                if row.version > self.read_version {
                    return Some(self.stale(key, row.version));
                }
            }
        }
        for prefix in &self.scans {
            if let Some((key, row)) = state
                .range(prefix)
                .find(|(_, row)| row.version > self.read_version)
            {
                return Some(self.stale(key, row.version));
            }
        }
        None
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.store.unregister(self.read_version);
        }
    }
}

impl KvTransaction for MemoryTransaction<'_> {
    fn get(&mut self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(pending.clone());
        }
        self.reads.insert(key.to_vec());
        let state = self.store.state.read().map_err(|_| StoreError::Poisoned)?;
        match state.rows.get(key) {
            Some(row) if row.version > self.read_version => Err(self.stale(key, row.version)),
            Some(row) => Ok(row.value.clone()),
            None => Ok(None),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn clear(&mut self, key: &[u8]) -> StoreResult<()> {
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }

    fn scan_prefix(&mut self, prefix: &[u8]) -> StoreResult<Vec<KeyValue>> {
        self.scans.push(prefix.to_vec());
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        {
            let state = self.store.state.read().map_err(|_| StoreError::Poisoned)?;
            for (key, row) in state.range(prefix) {
                if row.version > self.read_version {
                    return Err(self.stale(key, row.version));
                }
                if let Some(value) = &row.value {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        let pending = self
            .writes
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| covers(prefix, key));
        for (key, value) in pending {
            match value {
                Some(value) => merged.insert(key.clone(), value.clone()),
                None => merged.remove(key),
            };
        }
        Ok(merged.into_iter().collect())
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        if self.writes.is_empty() {
            self.finish();
            return Ok(());
        }

        let mut state = self.store.state.write().map_err(|_| StoreError::Poisoned)?;
        if let Some(err) = self.validate(&state) {
            drop(state);
            self.finish();
            return Err(err);
        }

        state.version += 1;
        let version = state.version;
        let writes = std::mem::take(&mut self.writes);
        let count = writes.len();
        for (key, value) in writes {
            if value.is_none() {
                state.tombstones.push_back((version, key.clone()));
            }
            state.rows.insert(key, Versioned { version, value });
        }
        drop(state);
        self.finish();

        let horizon = self.store.oldest_active().unwrap_or(version);
        if let Ok(mut state) = self.store.state.write() {
            state.prune_tombstones(horizon);
        }

        debug!("Committed {} writes at version {}", count, version);
        Ok(())
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}
