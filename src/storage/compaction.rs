//! Compaction merge
//!
//! K-way merge of every SSTable in an over-full level into one sorted,
//! de-duplicated run. A binary min-heap holds one cursor per source table,
//! seeded with each table's first entry; the minimum key is popped, duplicate
//! keys are resolved by recency, and the drained cursor advances.
//!
//! Duplicate resolution: the entry with the higher version wins; an exact
//! version tie falls back to the higher source-table append index (append
//! order encodes recency within a level). Tombstones are retained in the
//! output — they may still shadow older data in levels below.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::entry::Entry;
use crate::error::Result;

use super::SSTable;

/// One heap element: a cursor's current entry plus its source table index.
struct HeapItem {
    entry: Entry,
    table: usize,
}

// BinaryHeap is a max-heap; invert the comparison for min-by-key ordering.
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .entry
            .key
            .cmp(&self.entry.key)
            .then_with(|| other.table.cmp(&self.table))
    }
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.entry.key == other.entry.key && self.table == other.table
    }
}

impl Eq for HeapItem {}

/// Newer of two entries for the same key.
fn newer(a_version: u64, a_table: usize, b: &HeapItem) -> bool {
    match b.entry.version.cmp(&a_version) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => b.table > a_table,
    }
}

/// Merge all tables of a level into one sorted run with one entry per
/// distinct key.
pub(super) fn merge_tables(tables: &[SSTable]) -> Result<Vec<Entry>> {
    let mut heap = BinaryHeap::with_capacity(tables.len());
    let mut cursors = vec![0usize; tables.len()];

    for (i, table) in tables.iter().enumerate() {
        if table.entry_count() > 0 {
            heap.push(HeapItem {
                entry: table.entry_at(0)?,
                table: i,
            });
            cursors[i] = 1;
        }
    }

    // (entry, source table) pairs; the table index is needed to break
    // exact version ties against later duplicates
    let mut merged: Vec<(Entry, usize)> = Vec::new();

    while let Some(item) = heap.pop() {
        match merged.last_mut() {
            Some((last, last_table)) if last.key == item.entry.key => {
                if newer(last.version, *last_table, &item) {
                    *last = item.entry;
                    *last_table = item.table;
                }
            }
            _ => merged.push((item.entry, item.table)),
        }

        let table = item.table;
        if cursors[table] < tables[table].entry_count() {
            heap.push(HeapItem {
                entry: tables[table].entry_at(cursors[table])?,
                table,
            });
            cursors[table] += 1;
        }
    }

    Ok(merged.into_iter().map(|(entry, _)| entry).collect())
}
