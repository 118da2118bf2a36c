//! MemTable Module
//!
//! Mutable in-memory staging area for recent writes: one skip list for
//! ordered lookups, one write-ahead log for durability.
//!
//! ## Responsibilities
//! - Log-then-index write path (a WAL failure never mutates the index)
//! - Tri-state point lookup with tombstone discrimination
//! - Threshold tracking and freezing into a read-only generation
//! - Sorted iteration for SSTable creation

mod skiplist;
mod table;

pub use skiplist::{SkipList, SkipListIter};
pub use table::Memtable;
