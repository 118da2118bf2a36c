//! Write-Ahead Log (WAL)
//!
//! Append-only durable record of mutations for one memtable generation.
//! Every acknowledged write is synced to stable storage before the in-memory
//! index is touched, so recovery never replays an index mutation whose log
//! record is missing.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ Record 1                                 │
//! │ ┌──────────────────┬───────────────────┐ │
//! │ │ Length (8, BE)   │ bincode(Entry)    │ │
//! │ └──────────────────┴───────────────────┘ │
//! ├──────────────────────────────────────────┤
//! │ Record 2                                 │
//! │ ...                                      │
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## File Naming
//! The active log is `wal.log`; freezing a memtable renames its log to
//! `wal_<id>.imm`. Restart recovery rebuilds the active memtable from
//! `wal.log` and one frozen memtable per `.imm` file.

use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};
use tracing::{debug, warn};

use crate::entry::Entry;
use crate::error::Result;
use crate::io::MmapFile;
use crate::memtable::SkipList;
use crate::StrataError;

/// Length prefix size
const LEN_SIZE: u64 = 8;

/// Initial capacity for a fresh log file
const MIN_CAPACITY: u64 = 4096;

/// Extension marking a frozen memtable's log
pub const FROZEN_EXT: &str = "imm";

/// Append-only durable log of entries.
pub struct Wal {
    /// Backing buffer; `None` once the log has been reset
    file: Option<MmapFile>,
    path: PathBuf,
    /// Append cursor (end of valid data)
    pos: u64,
}

impl Wal {
    /// Open or create a log at `path`.
    ///
    /// The append cursor starts at 0; `recover()` scans existing records and
    /// repositions it at the end of valid data.
    pub fn open(path: &Path) -> Result<Self> {
        let file = MmapFile::open_growable(path, MIN_CAPACITY)?;
        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
            pos: 0,
        })
    }

    /// Replay all records from offset 0 into a fresh skip list.
    ///
    /// A zero or short read is end of valid data, not an error: a torn
    /// trailing record from a crash mid-write is silently dropped. A record
    /// with intact framing that fails to deserialize is logged and skipped —
    /// the length prefix preserves framing for the records after it.
    ///
    /// Leaves the append cursor at the end of valid data.
    pub fn recover(&mut self) -> Result<SkipList> {
        let file = self.file()?;
        let list = SkipList::new();
        let mut pos = 0u64;
        let mut records = 0usize;

        loop {
            let mut len_buf = [0u8; LEN_SIZE as usize];
            let n = file.read(&mut len_buf, pos)?;
            if n < len_buf.len() {
                break;
            }
            let len = u64::from_be_bytes(len_buf);
            // A zeroed or nonsense length means we ran off the end of
            // valid data into the preallocated tail
            if len == 0 || pos + LEN_SIZE + len > file.capacity() {
                break;
            }

            let mut payload = vec![0u8; len as usize];
            let n = file.read(&mut payload, pos + LEN_SIZE)?;
            if n < payload.len() {
                break;
            }

            match bincode::deserialize::<Entry>(&payload) {
                Ok(entry) => {
                    if entry.deleted {
                        list.delete(entry.key, entry.version);
                    } else {
                        list.insert(entry);
                    }
                    records += 1;
                }
                Err(e) => {
                    warn!(
                        offset = pos,
                        error = %e,
                        "skipping undecodable WAL record"
                    );
                }
            }
            pos += LEN_SIZE + len;
        }

        self.pos = pos;
        debug!(
            path = %self.path.display(),
            records,
            bytes = pos,
            "WAL recovered"
        );
        Ok(list)
    }

    /// Append one entry and force it to stable storage.
    pub fn append(&mut self, entry: &Entry) -> Result<()> {
        let payload = bincode::serialize(entry)?;
        let mut record = BytesMut::with_capacity(LEN_SIZE as usize + payload.len());
        record.put_u64(payload.len() as u64);
        record.put_slice(&payload);

        let pos = self.pos;
        let file = self.file_mut()?;
        let n = file.write(&record, pos)?;
        file.sync()?;
        self.pos += n as u64;
        Ok(())
    }

    /// Delete the underlying file.
    ///
    /// Used once a memtable has been flushed into an SSTable and its log is
    /// no longer needed for recovery. The log accepts no writes afterwards.
    pub fn reset(&mut self) -> Result<()> {
        match self.file.take() {
            Some(file) => {
                file.delete()?;
                self.pos = 0;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Rename the log to its frozen name `wal_<id>.imm`.
    pub fn freeze(&mut self, id: u64) -> Result<PathBuf> {
        let frozen = self
            .path
            .with_file_name(format!("wal_{:06}.{}", id, FROZEN_EXT));
        self.file_mut()?.rename(&frozen)?;
        self.path = frozen.clone();
        Ok(frozen)
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes of valid data.
    pub fn len(&self) -> u64 {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    fn file(&self) -> Result<&MmapFile> {
        self.file
            .as_ref()
            .ok_or_else(|| StrataError::WalWrite(format!("log {} was reset", self.path.display())))
    }

    fn file_mut(&mut self) -> Result<&mut MmapFile> {
        self.file
            .as_mut()
            .ok_or_else(|| StrataError::WalWrite(format!("log {} was reset", self.path.display())))
    }
}

/// Parse the id out of a frozen log filename (`wal_000042.imm` → 42).
pub fn parse_frozen_id(path: &Path) -> Option<u64> {
    if path.extension()?.to_str()? != FROZEN_EXT {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix("wal_")?.parse().ok()
}
