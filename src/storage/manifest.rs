//! Manifest: durable record of level membership
//!
//! One file listing every level's SSTable paths, rewritten wholesale after
//! each structural change (append or clear). Rewrites go through a temp file
//! and rename, and must be durable before superseded table files are
//! deleted — a crash between the two leaves recoverable, merely redundant
//! state rather than a gap.
//!
//! ## File Format
//! `bincode(Vec<Vec<String>>)` (one path list per level) followed by a
//! 4-byte little-endian CRC32 of the blob.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::StrataError;

const CRC_SIZE: usize = 4;

/// Persisted level membership.
pub struct Manifest {
    path: PathBuf,
    levels: Vec<Vec<String>>,
}

impl Manifest {
    /// Load the manifest at `path`, or start empty if none exists.
    ///
    /// A manifest that fails its CRC or decode is treated as absent (logged):
    /// the engine starts with empty levels rather than refusing to open.
    pub fn load(path: &Path, num_levels: usize) -> Result<Self> {
        let mut levels = match std::fs::read(path) {
            Ok(bytes) => match Self::decode(&bytes) {
                Ok(levels) => levels,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "discarding unreadable manifest");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        levels.resize_with(num_levels, Vec::new);
        Ok(Self {
            path: path.to_path_buf(),
            levels,
        })
    }

    fn decode(bytes: &[u8]) -> Result<Vec<Vec<String>>> {
        if bytes.len() < CRC_SIZE {
            return Err(StrataError::Corruption(
                "manifest shorter than its checksum".to_string(),
            ));
        }
        let (blob, crc_bytes) = bytes.split_at(bytes.len() - CRC_SIZE);
        let stored = u32::from_le_bytes(crc_bytes.try_into().unwrap());
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(blob);
        if hasher.finalize() != stored {
            return Err(StrataError::Corruption(
                "manifest checksum mismatch".to_string(),
            ));
        }
        Ok(bincode::deserialize(blob)?)
    }

    /// Table paths for each level, in append order.
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// Replace one level's path list.
    pub fn set_level(&mut self, level: usize, paths: Vec<String>) {
        if level < self.levels.len() {
            self.levels[level] = paths;
        }
    }

    /// Rewrite the manifest file wholesale: temp file, checksum, rename,
    /// sync.
    pub fn sync(&self) -> Result<()> {
        let blob = bincode::serialize(&self.levels)?;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&blob);
        let crc = hasher.finalize();

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&blob)?;
            file.write_all(&crc.to_le_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "manifest rewritten");
        Ok(())
    }
}
