//! Persistent buffer layer
//!
//! A byte-addressable, memory-mapped file used as the backing store for WALs
//! and SSTables. One concrete type, no trait indirection.
//!
//! Two capacity modes:
//! - **Growable** (WAL path): a write past the current capacity grows the
//!   backing file in bounded increments, then retries.
//! - **Fixed** (SSTable path): capacity is set exactly at creation; a write
//!   past it is an error. SSTable size is known up front.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use crate::error::Result;
use crate::StrataError;

/// Upper bound on a single capacity-growth step
const MAX_GROW_STEP: u64 = 16 * 1024 * 1024;

/// A memory-mapped file exposing positioned reads and writes.
///
/// Reads past the mapped capacity return a short (possibly zero) count rather
/// than an error; WAL recovery relies on this to detect end-of-log.
pub struct MmapFile {
    file: File,
    path: PathBuf,
    map: MmapMut,
    cap: u64,
    growable: bool,
}

impl MmapFile {
    /// Create a new file of exactly `size` bytes, fixed capacity.
    ///
    /// Truncates any existing file at `path`.
    pub fn create_fixed(path: &Path, size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Self::init(file, path, size, false)
    }

    /// Open an existing file, fixed capacity equal to its current length.
    pub fn open_fixed(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let size = file.metadata()?.len();
        Self::init(file, path, size, false)
    }

    /// Open or create a file with growable capacity of at least `min_size`.
    ///
    /// Existing content is preserved; capacity starts at the larger of the
    /// current file length and `min_size`.
    pub fn open_growable(path: &Path, min_size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        let size = file.metadata()?.len().max(min_size);
        Self::init(file, path, size, true)
    }

    fn init(file: File, path: &Path, size: u64, growable: bool) -> Result<Self> {
        // A zero-length mapping is invalid on some platforms
        let cap = size.max(1);
        file.set_len(cap)?;
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self {
            file,
            path: path.to_path_buf(),
            map,
            cap,
            growable,
        })
    }

    /// Read up to `buf.len()` bytes at `offset`; returns the count copied.
    ///
    /// A read past capacity is short, not an error.
    pub fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        if offset >= self.cap {
            return Ok(0);
        }
        let available = (self.cap - offset) as usize;
        let n = buf.len().min(available);
        buf[..n].copy_from_slice(&self.map[offset as usize..offset as usize + n]);
        Ok(n)
    }

    /// Write `data` at `offset`; returns the count written.
    ///
    /// Growable buffers expand as needed; fixed buffers error past capacity.
    pub fn write(&mut self, data: &[u8], offset: u64) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let end = offset + data.len() as u64;
        while end > self.cap {
            if !self.growable {
                return Err(StrataError::Storage(format!(
                    "write of {} bytes at offset {} exceeds fixed capacity {} ({})",
                    data.len(),
                    offset,
                    self.cap,
                    self.path.display()
                )));
            }
            let step = self.cap.min(MAX_GROW_STEP).max(1);
            self.truncate(self.cap + step)?;
        }
        self.map[offset as usize..end as usize].copy_from_slice(data);
        Ok(data.len())
    }

    /// Resize the backing file to `size` and remap.
    pub fn truncate(&mut self, size: u64) -> Result<()> {
        self.map.flush()?;
        let cap = size.max(1);
        self.file.set_len(cap)?;
        self.map = unsafe { MmapMut::map_mut(&self.file)? };
        self.cap = cap;
        Ok(())
    }

    /// Force mapped contents to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.map.flush()?;
        Ok(())
    }

    /// Move the backing file to a new path.
    ///
    /// The mapping stays valid across the rename; only the name changes.
    pub fn rename(&mut self, new_path: &Path) -> Result<()> {
        self.map.flush()?;
        std::fs::rename(&self.path, new_path)?;
        self.path = new_path.to_path_buf();
        Ok(())
    }

    /// Unmap and remove the backing file.
    pub fn delete(self) -> Result<()> {
        let MmapFile {
            map, file, path, ..
        } = self;
        drop(map);
        drop(file);
        std::fs::remove_file(&path)?;
        Ok(())
    }

    /// Current file size in bytes.
    pub fn size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Current mapped capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.cap
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fixed_capacity_rejects_overflow() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fixed.buf");
        let mut f = MmapFile::create_fixed(&path, 8).unwrap();

        assert_eq!(f.write(b"12345678", 0).unwrap(), 8);
        assert!(f.write(b"9", 8).is_err());
    }

    #[test]
    fn growable_expands_on_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grow.buf");
        let mut f = MmapFile::open_growable(&path, 4).unwrap();

        let data = vec![7u8; 1024];
        assert_eq!(f.write(&data, 0).unwrap(), 1024);
        assert!(f.capacity() >= 1028);

        let mut back = vec![0u8; 1024];
        assert_eq!(f.read(&mut back, 0).unwrap(), 1024);
        assert_eq!(back, data);
    }

    #[test]
    fn read_past_capacity_is_short() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.buf");
        let f = MmapFile::create_fixed(&path, 4).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(f.read(&mut buf, 0).unwrap(), 4);
        assert_eq!(f.read(&mut buf, 100).unwrap(), 0);
    }

    #[test]
    fn delete_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.buf");
        let f = MmapFile::create_fixed(&path, 16).unwrap();
        assert!(path.exists());

        f.delete().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn reopen_preserves_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keep.buf");
        {
            let mut f = MmapFile::open_growable(&path, 64).unwrap();
            f.write(b"persist", 0).unwrap();
            f.sync().unwrap();
        }
        let f = MmapFile::open_growable(&path, 64).unwrap();
        let mut buf = [0u8; 7];
        f.read(&mut buf, 0).unwrap();
        assert_eq!(&buf, b"persist");
    }
}
