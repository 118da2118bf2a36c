//! MemTable implementation
//!
//! Pairs a skip list with a WAL. Mutable until the entry count reaches the
//! configured threshold; thereafter frozen (read-only) and queued for
//! flushing to level 0.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::entry::{Entry, Lookup};
use crate::error::Result;
use crate::wal::{Wal, FROZEN_EXT};
use crate::StrataError;

use super::{SkipList, SkipListIter};

/// In-memory table for recent writes.
///
/// The WAL mutex serializes mutations end to end (log append, then index
/// insert), so two racing writers cannot commit to the log in one order and
/// the index in the other. Lookups take only the skip list's read lock.
pub struct Memtable {
    list: SkipList,
    wal: Mutex<Wal>,
    threshold: usize,
    frozen: AtomicBool,
}

impl Memtable {
    /// Open a memtable backed by the log at `path`, replaying any existing
    /// records into the skip list.
    ///
    /// The file extension decides the table's state: a `.imm` log belongs to
    /// a frozen generation awaiting flush, anything else is active.
    pub fn open(path: &Path, threshold: usize) -> Result<Self> {
        let mut wal = Wal::open(path)?;
        let list = wal.recover()?;
        let frozen = path
            .extension()
            .map(|e| e == FROZEN_EXT)
            .unwrap_or(false);
        if !list.is_empty() {
            debug!(
                path = %path.display(),
                entries = list.len(),
                frozen,
                "memtable recovered from WAL"
            );
        }
        Ok(Self {
            list,
            wal: Mutex::new(wal),
            threshold,
            frozen: AtomicBool::new(frozen),
        })
    }

    /// Insert or update an entry: log first, then index.
    ///
    /// A WAL error aborts the operation before the skip list is touched; the
    /// crash window between log success and index insert is reconciled by
    /// replay on the next open.
    pub fn add(&self, entry: Entry) -> Result<()> {
        let mut wal = self.wal.lock();
        if self.frozen.load(Ordering::Acquire) {
            return Err(StrataError::Storage("memtable is frozen".to_string()));
        }
        wal.append(&entry)?;
        self.list.insert(entry);
        Ok(())
    }

    /// Record a tombstone for `key`, same path as `add`.
    pub fn delete(&self, key: impl Into<Vec<u8>>, version: u64) -> Result<()> {
        self.add(Entry::tombstone(key, version))
    }

    /// Point lookup with tombstone discrimination.
    pub fn search(&self, key: &[u8]) -> Lookup {
        self.list.search(key)
    }

    /// Whether the mutation count has reached the freeze threshold.
    pub fn is_full(&self) -> bool {
        !self.is_frozen() && self.list.len() >= self.threshold
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Number of distinct keys (tombstones included).
    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Freeze this table: mark it read-only and rename its log to the
    /// frozen `wal_<id>.imm` name.
    ///
    /// Errors if the table is already frozen.
    pub fn freeze(&self, id: u64) -> Result<()> {
        let mut wal = self.wal.lock();
        if self.frozen.swap(true, Ordering::AcqRel) {
            return Err(StrataError::Storage(
                "memtable is already frozen".to_string(),
            ));
        }
        let frozen_path = match wal.freeze(id) {
            Ok(path) => path,
            Err(e) => {
                // The table must stay writable if the rename never happened
                self.frozen.store(false, Ordering::Release);
                return Err(e);
            }
        };
        debug!(path = %frozen_path.display(), entries = self.list.len(), "memtable frozen");
        Ok(())
    }

    /// Sorted forward iterator over all entries.
    pub fn iter(&self) -> SkipListIter<'_> {
        self.list.iter()
    }

    /// Drain all entries into a sorted batch (flush input).
    pub fn entries(&self) -> Vec<Entry> {
        self.list.iter().collect()
    }

    /// Delete the backing WAL once the table's contents are durable in an
    /// SSTable.
    pub fn discard_wal(&self) -> Result<()> {
        self.wal.lock().reset()
    }

    /// Path of the backing WAL.
    pub fn wal_path(&self) -> std::path::PathBuf {
        self.wal.lock().path().to_path_buf()
    }
}
