//! SSTable implementation
//!
//! Immutable on-disk sorted run: a data area of raw value bytes, an index
//! area (bloom filter + sorted key list + key→Position map), and a fixed
//! 40-byte meta footer. Once created a table is never mutated; it is deleted
//! wholesale when superseded by compaction.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bloom::BloomFilter;
use crate::entry::{Entry, Lookup};
use crate::error::Result;
use crate::io::MmapFile;
use crate::StrataError;

/// Meta footer size: five 8-byte big-endian integers
pub(crate) const FOOTER_SIZE: u64 = 40;

/// Current SSTable format version
const FORMAT_VERSION: u64 = 1;

/// Location of one entry's value within the data area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Offset of the value bytes, relative to the data area start
    pub offset: u64,

    /// Value length in bytes (0 for tombstones)
    pub len: u32,

    /// Tombstone flag
    pub deleted: bool,

    /// Entry version, preserved across the flush so compaction can break
    /// duplicate-key ties by recency
    pub version: u64,
}

/// Serialized index area: everything needed to locate any key in the table.
#[derive(Serialize, Deserialize)]
struct IndexArea {
    /// Bloom filter over all keys
    door: BloomFilter,

    /// All keys in ascending order
    keys: Vec<Vec<u8>>,

    /// Key → value location
    positions: BTreeMap<Vec<u8>, Position>,
}

/// Area offsets and lengths stored in the footer.
#[derive(Debug, Clone, Copy)]
struct MetaFooter {
    data_start: u64,
    data_len: u64,
    idx_start: u64,
    idx_len: u64,
    version: u64,
}

impl MetaFooter {
    fn encode(&self) -> [u8; FOOTER_SIZE as usize] {
        let mut buf = [0u8; FOOTER_SIZE as usize];
        buf[0..8].copy_from_slice(&self.data_start.to_be_bytes());
        buf[8..16].copy_from_slice(&self.data_len.to_be_bytes());
        buf[16..24].copy_from_slice(&self.idx_start.to_be_bytes());
        buf[24..32].copy_from_slice(&self.idx_len.to_be_bytes());
        buf[32..40].copy_from_slice(&self.version.to_be_bytes());
        buf
    }

    fn decode(buf: &[u8; FOOTER_SIZE as usize]) -> Self {
        Self {
            data_start: u64::from_be_bytes(buf[0..8].try_into().unwrap()),
            data_len: u64::from_be_bytes(buf[8..16].try_into().unwrap()),
            idx_start: u64::from_be_bytes(buf[16..24].try_into().unwrap()),
            idx_len: u64::from_be_bytes(buf[24..32].try_into().unwrap()),
            version: u64::from_be_bytes(buf[32..40].try_into().unwrap()),
        }
    }
}

/// Immutable on-disk sorted table.
pub struct SSTable {
    file: MmapFile,
    path: PathBuf,
    idx: IndexArea,
    meta: MetaFooter,
    min_key: Vec<u8>,
    max_key: Vec<u8>,
    size: u64,
}

impl SSTable {
    /// Write a new table from pre-sorted, unique-keyed entries.
    ///
    /// The backing file is sized exactly (data + index + footer) up front.
    /// A bloom-filter insert failure is logged and that entry is skipped
    /// from the filter only; its data and index entry are still written, so
    /// the key stays lookupable without the fast-skip benefit.
    pub fn create(entries: &[Entry], path: &Path, fp_rate: f64) -> Result<Self> {
        if entries.is_empty() {
            return Err(StrataError::Storage(
                "cannot create an SSTable from zero entries".to_string(),
            ));
        }

        let mut door = BloomFilter::new(entries.len(), fp_rate);
        let mut keys = Vec::with_capacity(entries.len());
        let mut positions = BTreeMap::new();
        let mut cursor = 0u64;

        for entry in entries {
            if !door.insert(&entry.key) {
                warn!(
                    path = %path.display(),
                    key_len = entry.key.len(),
                    "bloom filter insert failed; entry stored without fast-skip"
                );
            }
            positions.insert(
                entry.key.clone(),
                Position {
                    offset: cursor,
                    len: entry.value.len() as u32,
                    deleted: entry.deleted,
                    version: entry.version,
                },
            );
            keys.push(entry.key.clone());
            cursor += entry.value.len() as u64;
        }

        let idx = IndexArea {
            door,
            keys,
            positions,
        };
        let idx_bytes = bincode::serialize(&idx)?;

        let meta = MetaFooter {
            data_start: 0,
            data_len: cursor,
            idx_start: cursor,
            idx_len: idx_bytes.len() as u64,
            version: FORMAT_VERSION,
        };
        let total = meta.data_len + meta.idx_len + FOOTER_SIZE;

        let mut file = MmapFile::create_fixed(path, total)?;
        let mut pos = 0u64;
        for entry in entries {
            pos += file.write(&entry.value, pos)? as u64;
        }
        file.write(&idx_bytes, meta.idx_start)?;
        file.write(&meta.encode(), meta.idx_start + meta.idx_len)?;
        file.sync()?;

        let min_key = idx.keys.first().cloned().unwrap_or_default();
        let max_key = idx.keys.last().cloned().unwrap_or_default();

        debug!(
            path = %path.display(),
            entries = entries.len(),
            bytes = total,
            "SSTable created"
        );

        Ok(Self {
            file,
            path: path.to_path_buf(),
            idx,
            meta,
            min_key,
            max_key,
            size: total,
        })
    }

    /// Open an existing table: read the footer, then the index area.
    pub fn open(path: &Path) -> Result<Self> {
        let file = MmapFile::open_fixed(path)?;
        let size = file.size()?;
        if size < FOOTER_SIZE {
            return Err(StrataError::Corruption(format!(
                "SSTable {} is {} bytes, smaller than its footer",
                path.display(),
                size
            )));
        }

        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read(&mut footer, size - FOOTER_SIZE)?;
        let meta = MetaFooter::decode(&footer);

        if meta.version != FORMAT_VERSION {
            return Err(StrataError::Corruption(format!(
                "SSTable {} has unsupported format version {}",
                path.display(),
                meta.version
            )));
        }
        if meta.idx_start + meta.idx_len + FOOTER_SIZE > size {
            return Err(StrataError::Corruption(format!(
                "SSTable {} footer offsets exceed file size",
                path.display()
            )));
        }

        let mut idx_bytes = vec![0u8; meta.idx_len as usize];
        let n = file.read(&mut idx_bytes, meta.idx_start)?;
        if n < idx_bytes.len() {
            return Err(StrataError::Corruption(format!(
                "SSTable {} index area truncated",
                path.display()
            )));
        }
        let idx: IndexArea = bincode::deserialize(&idx_bytes)?;

        let min_key = idx.keys.first().cloned().ok_or_else(|| {
            StrataError::Corruption(format!("SSTable {} has an empty key list", path.display()))
        })?;
        let max_key = idx.keys.last().cloned().unwrap_or_default();

        Ok(Self {
            file,
            path: path.to_path_buf(),
            idx,
            meta,
            min_key,
            max_key,
            size,
        })
    }

    /// Cheap pre-check: key range, then bloom filter.
    ///
    /// `false` means the key is definitely absent from this table.
    pub fn may_contain(&self, key: &[u8]) -> bool {
        if key < self.min_key.as_slice() || key > self.max_key.as_slice() {
            return false;
        }
        self.idx.door.contains(key)
    }

    /// Point lookup: binary search of the sorted key list, then one
    /// positioned read of the value.
    pub fn get(&self, key: &[u8]) -> Result<Lookup> {
        let found = self
            .idx
            .keys
            .binary_search_by(|probe| probe.as_slice().cmp(key));
        let Ok(i) = found else {
            return Ok(Lookup::NotFound);
        };
        let pos = match self.idx.positions.get(&self.idx.keys[i]) {
            Some(pos) => pos,
            None => {
                return Err(StrataError::Corruption(format!(
                    "SSTable {} key present in list but not in position map",
                    self.path.display()
                )))
            }
        };
        if pos.deleted {
            return Ok(Lookup::Deleted);
        }
        Ok(Lookup::Found(self.read_value(pos)?))
    }

    /// Reconstruct the i-th entry (compaction cursor access).
    pub fn entry_at(&self, i: usize) -> Result<Entry> {
        let key = self.idx.keys.get(i).ok_or_else(|| {
            StrataError::Storage(format!(
                "entry index {} out of range for SSTable {}",
                i,
                self.path.display()
            ))
        })?;
        let pos = self.idx.positions.get(key).ok_or_else(|| {
            StrataError::Corruption(format!(
                "SSTable {} key present in list but not in position map",
                self.path.display()
            ))
        })?;
        Ok(Entry {
            key: key.clone(),
            value: self.read_value(pos)?,
            deleted: pos.deleted,
            version: pos.version,
        })
    }

    fn read_value(&self, pos: &Position) -> Result<Vec<u8>> {
        let mut value = vec![0u8; pos.len as usize];
        let n = self.file.read(&mut value, self.meta.data_start + pos.offset)?;
        if n < value.len() {
            return Err(StrataError::Corruption(format!(
                "SSTable {} value read short: {} of {} bytes",
                self.path.display(),
                n,
                value.len()
            )));
        }
        Ok(value)
    }

    /// Number of entries in the table.
    pub fn entry_count(&self) -> usize {
        self.idx.keys.len()
    }

    /// Smallest key in the table.
    pub fn min_key(&self) -> &[u8] {
        &self.min_key
    }

    /// Largest key in the table.
    pub fn max_key(&self) -> &[u8] {
        &self.max_key
    }

    /// File size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the backing file; used once the table is superseded by
    /// compaction.
    pub fn remove(self) -> Result<()> {
        let path = self.path.clone();
        self.file.delete()?;
        debug!(path = %path.display(), "SSTable removed");
        Ok(())
    }
}
