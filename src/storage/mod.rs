//! Storage Module
//!
//! Persistent layer: immutable sorted tables (SSTables), the leveled table
//! manager with its durable manifest, and the compaction merge that keeps
//! level sizes bounded.
//!
//! ## SSTable File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Data Area (variable)                                     │
//! │   value bytes, back-to-back, no delimiters               │
//! │   (lengths recovered from the index)                     │
//! ├──────────────────────────────────────────────────────────┤
//! │ Index Area (variable)                                    │
//! │   bincode(IndexArea {                                    │
//! │     door:      bloom filter bits + hash count            │
//! │     keys:      sorted key list                           │
//! │     positions: key → {offset, len, deleted, version}     │
//! │   })                                                     │
//! ├──────────────────────────────────────────────────────────┤
//! │ Meta Footer (40 bytes, five u64 big-endian)              │
//! │   dataStart │ dataLen │ idxStart │ idxLen │ version      │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod compaction;
mod level;
mod manager;
mod manifest;
mod sstable;

pub use level::Level;
pub use manager::LevelManager;
pub use sstable::{Position, SSTable};
