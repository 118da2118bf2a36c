//! Level: one tier of the tree
//!
//! An append-ordered list of SSTables. Later tables shadow earlier ones for
//! the same key, because flush and compaction always append newer output at
//! the tail — so search walks the list back to front.

use crate::entry::Lookup;
use crate::error::Result;

use super::SSTable;

/// An append-ordered list of SSTable handles.
pub struct Level {
    tables: Vec<SSTable>,
}

impl Level {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    /// Append a table at the tail (newest position).
    pub fn push(&mut self, table: SSTable) {
        self.tables.push(table);
    }

    /// Search most-recently-appended first.
    ///
    /// A tombstone hit returns `Deleted` immediately: it shadows any older
    /// data for that key in this level and every level below.
    pub fn search(&self, key: &[u8]) -> Result<Lookup> {
        for table in self.tables.iter().rev() {
            if !table.may_contain(key) {
                continue;
            }
            match table.get(key)? {
                // Bloom false positive or out-of-map key; keep looking
                Lookup::NotFound => continue,
                conclusive => return Ok(conclusive),
            }
        }
        Ok(Lookup::NotFound)
    }

    /// Number of tables in this level.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Cumulative byte size of all tables.
    pub fn total_bytes(&self) -> u64 {
        self.tables.iter().map(|t| t.size()).sum()
    }

    /// Tables in append order.
    pub fn tables(&self) -> &[SSTable] {
        &self.tables
    }

    /// Remove and return every table (compaction source drain).
    pub fn take_tables(&mut self) -> Vec<SSTable> {
        std::mem::take(&mut self.tables)
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::new()
    }
}
