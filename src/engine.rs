//! Engine Module
//!
//! The orchestrator that ties the tree together: one active memtable, a
//! queue of frozen memtables awaiting flush, the level manager, and a
//! background task that flushes and compacts.
//!
//! ## Concurrency Model
//!
//! - **Writes** (put/delete): serialized per memtable by its WAL lock; the
//!   engine-level lock guards only the active/frozen swap and is held for
//!   the pointer exchange, never across WAL I/O
//! - **Reads** (get): lock-free at the engine level — active memtable, then
//!   frozen memtables newest-first, then the level manager, stopping at the
//!   first conclusive result
//! - **Background task**: wakes on a fixed interval or an explicit signal;
//!   the signal channel holds one slot, so a trigger arriving while work is
//!   in flight leaves the flag set instead of queueing or getting lost
//! - **Close**: stops the background task and waits (bounded handshake) for
//!   it to drain; no in-flight compaction is interrupted

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{bounded, tick, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::entry::Entry;
use crate::error::Result;
use crate::memtable::Memtable;
use crate::storage::LevelManager;
use crate::wal::parse_frozen_id;
use crate::StrataError;

/// How long `close` waits for the background task to acknowledge
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// The storage engine handle.
///
/// An explicit handle constructed by the caller — no process-wide singleton.
/// Keys and values are opaque bytes; typed (de)serialization belongs to the
/// caller.
pub struct Engine {
    inner: Arc<Shared>,
    stop_tx: Sender<()>,
    ack_rx: Receiver<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// State shared with the background task.
struct Shared {
    config: Config,
    wal_dir: PathBuf,

    /// The single mutable memtable
    active: RwLock<Arc<Memtable>>,

    /// Frozen memtables awaiting flush, oldest first
    frozen: RwLock<Vec<Arc<Memtable>>>,

    levels: LevelManager,

    /// IDs for frozen WAL names
    next_wal_id: AtomicU64,

    /// Single-slot pending-work flag
    check_tx: Sender<()>,

    /// Keeps maintenance passes from overlapping
    maintenance: Mutex<()>,

    closed: AtomicBool,
}

impl Engine {
    const WAL_DIR: &'static str = "wal";
    const ACTIVE_WAL: &'static str = "wal.log";

    /// Open or create an engine under `config.data_dir`.
    ///
    /// On startup:
    /// 1. Reopen levels from the manifest
    /// 2. Rebuild the active memtable from `wal.log`
    /// 3. Rebuild one frozen memtable per `wal_*.imm` file
    /// 4. Start the background flush/compaction task
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;
        let wal_dir = config.data_dir.join(Self::WAL_DIR);
        std::fs::create_dir_all(&wal_dir)?;

        let levels = LevelManager::open(&config)?;

        let active = Memtable::open(&wal_dir.join(Self::ACTIVE_WAL), config.threshold)?;

        // Frozen logs, oldest first
        let mut frozen_paths: Vec<(u64, PathBuf)> = Vec::new();
        for dirent in std::fs::read_dir(&wal_dir)? {
            let path = dirent?.path();
            if let Some(id) = parse_frozen_id(&path) {
                frozen_paths.push((id, path));
            }
        }
        frozen_paths.sort();

        let mut frozen = Vec::with_capacity(frozen_paths.len());
        let mut max_wal_id = 0u64;
        for (id, path) in &frozen_paths {
            frozen.push(Arc::new(Memtable::open(path, config.threshold)?));
            max_wal_id = max_wal_id.max(*id);
        }
        if !frozen.is_empty() {
            info!(count = frozen.len(), "recovered frozen memtables awaiting flush");
        }

        let (check_tx, check_rx) = bounded(1);
        let (stop_tx, stop_rx) = bounded(1);
        let (ack_tx, ack_rx) = bounded(1);

        let inner = Arc::new(Shared {
            wal_dir,
            active: RwLock::new(Arc::new(active)),
            frozen: RwLock::new(frozen),
            levels,
            next_wal_id: AtomicU64::new(max_wal_id + 1),
            check_tx,
            maintenance: Mutex::new(()),
            closed: AtomicBool::new(false),
            config,
        });

        let worker = {
            let inner = Arc::clone(&inner);
            std::thread::Builder::new()
                .name("stratakv-maintenance".to_string())
                .spawn(move || background_loop(inner, stop_rx, check_rx, ack_tx))?
        };

        info!(data_dir = %inner.config.data_dir.display(), "engine opened");

        Ok(Self {
            inner,
            stop_tx,
            ack_rx,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Store a key-value pair.
    pub fn put(&self, key: &[u8], value: &[u8], version: u64) -> Result<()> {
        self.write(Entry::new(key, value, version))
    }

    /// Record a tombstone for `key`.
    ///
    /// The tombstone is a real entry even if the key was never written here:
    /// it must stay visible to flushing and compaction to shadow older data
    /// in lower levels.
    pub fn delete(&self, key: &[u8], version: u64) -> Result<()> {
        self.write(Entry::tombstone(key, version))
    }

    fn write(&self, entry: Entry) -> Result<()> {
        self.check_open()?;
        let mut attempts = 0;
        loop {
            let memtable = self.inner.active.read().clone();
            match memtable.add(entry.clone()) {
                Ok(()) => break,
                // Lost the race against a rotation; the next read of
                // `active` sees the fresh table
                Err(StrataError::Storage(_)) if memtable.is_frozen() && attempts < 8 => {
                    attempts += 1;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        let memtable = self.inner.active.read().clone();
        if memtable.is_full() {
            self.inner.rotate(false)?;
            self.inner.signal_check();
        }
        Ok(())
    }

    /// Get a value by key.
    ///
    /// Search order: active memtable, frozen memtables newest-first, then
    /// the levels. Tombstones read as absent.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_open()?;

        let result = self.inner.active.read().clone().search(key);
        if result.is_conclusive() {
            return Ok(result.into_option());
        }

        {
            let frozen = self.inner.frozen.read();
            for memtable in frozen.iter().rev() {
                let result = memtable.search(key);
                if result.is_conclusive() {
                    return Ok(result.into_option());
                }
            }
        }

        Ok(self.inner.levels.search(key)?.into_option())
    }

    /// Force a full flush: freeze the active memtable (even below
    /// threshold), flush every frozen memtable to level 0, and check
    /// compaction. Synchronous.
    pub fn flush(&self) -> Result<()> {
        self.check_open()?;
        self.inner.rotate(true)?;
        self.inner.run_maintenance()
    }

    /// Stop the background task and drain pending flushes.
    ///
    /// The active memtable's WAL stays on disk; the next `open` replays it.
    pub fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let _ = self.stop_tx.send(());
        if self.ack_rx.recv_timeout(CLOSE_TIMEOUT).is_err() {
            warn!("background task did not acknowledge shutdown in time");
        }
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
        info!("engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Entry count of the active memtable.
    pub fn memtable_len(&self) -> usize {
        self.inner.active.read().len()
    }

    /// Number of frozen memtables awaiting flush.
    pub fn frozen_count(&self) -> usize {
        self.inner.frozen.read().len()
    }

    /// Total number of SSTables across all levels.
    pub fn table_count(&self) -> usize {
        self.inner.levels.table_count()
    }

    /// Number of SSTables in one level.
    pub fn level_len(&self, lv: usize) -> usize {
        self.inner.levels.level_len(lv)
    }

    /// Engine configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    fn check_open(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(StrataError::Storage("engine is closed".to_string()));
        }
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl Shared {
    /// Swap in a fresh active memtable, queueing the old one for flush.
    ///
    /// Holds the engine lock only for the swap; double-checks the threshold
    /// under the lock so concurrent writers trigger exactly one rotation.
    fn rotate(&self, force: bool) -> Result<()> {
        let mut active = self.active.write();
        if active.is_frozen() {
            return Ok(());
        }
        if force {
            if active.is_empty() {
                return Ok(());
            }
        } else if !active.is_full() {
            return Ok(());
        }

        let id = self.next_wal_id.fetch_add(1, Ordering::SeqCst);
        active.freeze(id)?;
        self.frozen.write().push(Arc::clone(&active));

        let fresh = Memtable::open(&self.wal_dir.join(Engine::ACTIVE_WAL), self.config.threshold)?;
        *active = Arc::new(fresh);
        Ok(())
    }

    /// Set the single-slot pending-work flag. A full slot means a check is
    /// already pending; the trigger is absorbed, not lost.
    fn signal_check(&self) {
        let _ = self.check_tx.try_send(());
    }

    /// One maintenance pass: flush every frozen memtable to level 0, then
    /// check every level for compaction.
    fn run_maintenance(&self) -> Result<()> {
        let _guard = self.maintenance.lock();

        let pending: Vec<Arc<Memtable>> = self.frozen.read().clone();
        for memtable in pending {
            let entries = memtable.entries();
            if !entries.is_empty() {
                self.levels.flush_to_level0(&entries)?;
            }
            // Table and manifest are durable; the WAL is no longer needed
            memtable.discard_wal()?;
            self.frozen
                .write()
                .retain(|m| !Arc::ptr_eq(m, &memtable));
        }

        self.levels.check_compaction()
    }
}

fn background_loop(
    inner: Arc<Shared>,
    stop_rx: Receiver<()>,
    check_rx: Receiver<()>,
    ack_tx: Sender<()>,
) {
    let ticker = tick(inner.config.check_interval);
    loop {
        crossbeam::select! {
            recv(stop_rx) -> _ => break,
            recv(ticker) -> _ => {
                if let Err(e) = inner.run_maintenance() {
                    error!(error = %e, "maintenance pass failed");
                }
            }
            recv(check_rx) -> _ => {
                if let Err(e) = inner.run_maintenance() {
                    error!(error = %e, "maintenance pass failed");
                }
            }
        }
    }

    // Drain rather than interrupt: one final pass before acknowledging
    if let Err(e) = inner.run_maintenance() {
        error!(error = %e, "final maintenance pass failed");
    }
    let _ = ack_tx.send(());
}
