//! Entry definitions
//!
//! The atomic unit of storage, shared by the skip list, WAL and SSTables.

use serde::{Deserialize, Serialize};

/// A single key-value record.
///
/// Entries are immutable once written to a WAL or SSTable; an update is a new
/// entry with a higher version. Deletes are entries with the tombstone flag
/// set, which shadow older values until compacted away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Ordered byte key
    pub key: Vec<u8>,

    /// Opaque value payload (empty for tombstones)
    pub value: Vec<u8>,

    /// Tombstone flag
    pub deleted: bool,

    /// Monotonically assigned sequence number, used to break ties when the
    /// same key appears in multiple sources
    pub version: u64,
}

impl Entry {
    /// Create a live entry
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, version: u64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            deleted: false,
            version,
        }
    }

    /// Create a tombstone entry
    pub fn tombstone(key: impl Into<Vec<u8>>, version: u64) -> Self {
        Self {
            key: key.into(),
            value: Vec::new(),
            deleted: true,
            version,
        }
    }
}

/// Result of a point lookup.
///
/// `Deleted` is distinguished from `NotFound` so callers can short-circuit:
/// a tombstone in the memtable must stop the search from falling through to
/// disk, and a tombstone in a newer table shadows all older tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Key present with a live value
    Found(Vec<u8>),

    /// Key present as a tombstone; stop searching
    Deleted,

    /// Key absent from this source; keep searching older sources
    NotFound,
}

impl Lookup {
    /// Collapse to the external `Option` view: tombstones read as absent
    pub fn into_option(self) -> Option<Vec<u8>> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::Deleted | Lookup::NotFound => None,
        }
    }

    /// Whether this result ends a multi-source search
    pub fn is_conclusive(&self) -> bool {
        !matches!(self, Lookup::NotFound)
    }
}
