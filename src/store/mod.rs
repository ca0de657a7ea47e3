//! Store Module
//!
//! The log-structured key/value engine.
//!
//! ## Responsibilities
//! - Lifecycle: init / deinit / reset
//! - CRUD on keys, with write-once protection
//! - Garbage collection when the active Area fills up
//! - Prefix iteration kept consistent under concurrent mutation
//! - Streamed (incremental) writes
//! - One-time Reserved Slot
//!
//! ## Concurrency Model
//!
//! Two locks, always taken in this order:
//!
//! - **Incremental-set lock** (`inc_set_lock`): taken by every mutating
//!   operation and held by an [`IncrementalSet`] for its whole lifetime.
//! - **Instance lock** (`inner`): taken by every operation for its duration.
//!
//! Reads (`get`, `get_info`, iteration, `reserved_data_get`) only take the
//! instance lock, so they run between the chunks of a streamed write and
//! see the previous value until it is finalized. A thread holding an
//! [`IncrementalSet`] must not call mutating operations on the same store:
//! they would wait for the session it owns.
//!
//! ## State Machine
//! ```text
//!            init()                 deinit()
//!  Uninitialized ───────► Ready ───────────► Uninitialized
//!                          │  ▲
//!                          └──┘ reset(), set(), remove(), GC
//! ```

mod gc;
mod incremental;
mod inner;
mod iterator;
mod reserved;

use parking_lot::Mutex;

use crate::area::AreaManager;
use crate::config::Config;
use crate::device::BlockDevice;
use crate::error::Result;
use crate::record::{CreateFlags, FLAG_DELETE};

pub use incremental::IncrementalSet;
pub use iterator::KeyIterator;

use inner::Inner;

/// Size and flags of a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KvInfo {
    /// Value size in bytes
    pub size: usize,
    /// Flags the value was created with
    pub flags: CreateFlags,
}

/// Snapshot of engine bookkeeping (for testing and debugging)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Live keys in the RAM index
    pub num_keys: usize,
    /// Area currently holding the log
    pub active_area: u8,
    /// Master Record version of the active Area
    pub version: u16,
    /// Offset where the next record will be written
    pub free_space_offset: u64,
    /// Size of each Area
    pub area_size: u64,
    /// Garbage collections run since the store was constructed
    pub gc_count: u64,
    /// Iterators currently open
    pub open_iterators: usize,
}

/// Log-structured key/value store over a block device
pub struct TdbStore<D> {
    /// Engine state (instance lock)
    inner: Mutex<Inner<D>>,

    /// Serializes mutations, held for the length of a streamed write
    inc_set_lock: Mutex<()>,
}

impl<D: BlockDevice> TdbStore<D> {
    /// Wrap a device. Validates its geometry; nothing is read or written
    /// until `init`.
    pub fn new(device: D, config: Config) -> Result<Self> {
        let areas = AreaManager::new(device, config.work_buf_size)?;
        Ok(Self {
            inner: Mutex::new(Inner::new(areas, config)),
            inc_set_lock: Mutex::new(()),
        })
    }

    /// Wrap a device with the default configuration
    pub fn with_device(device: D) -> Result<Self> {
        Self::new(device, Config::default())
    }

    /// Hand the device back, e.g. to simulate a power cycle
    pub fn into_device(self) -> D {
        self.inner.into_inner().areas.into_device()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Select the active Area and rebuild the RAM index.
    ///
    /// Idempotent: a Ready store returns immediately without rescanning.
    pub fn init(&self) -> Result<()> {
        let _session = self.inc_set_lock.lock();
        self.inner.lock().init()
    }

    /// Drop the RAM index and close all iterators. Always succeeds.
    pub fn deinit(&self) -> Result<()> {
        let _session = self.inc_set_lock.lock();
        self.inner.lock().deinit();
        Ok(())
    }

    /// Erase every key and the Reserved Slot, leaving an empty Ready store.
    pub fn reset(&self) -> Result<()> {
        let _session = self.inc_set_lock.lock();
        self.inner.lock().reset()
    }

    // =========================================================================
    // Key/Value Operations
    // =========================================================================

    /// Store `data` under `key`, replacing any previous value.
    pub fn set(&self, key: &str, data: &[u8], flags: CreateFlags) -> Result<()> {
        let flags = CreateFlags::from_bits(flags.bits())?;
        let _session = self.inc_set_lock.lock();
        self.inner.lock().set(key, data, flags.bits())
    }

    /// Copy the value of `key`, starting at `offset`, into `buf`.
    ///
    /// Returns the number of bytes copied: the smaller of `buf.len()` and
    /// what the value holds past `offset`.
    pub fn get(&self, key: &str, buf: &mut [u8], offset: usize) -> Result<usize> {
        self.inner.lock().get(key, buf, offset)
    }

    /// Whole value of `key`
    pub fn get_vec(&self, key: &str) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        let info = inner.get_info(key)?;
        let mut buf = vec![0u8; info.size];
        let n = inner.get(key, &mut buf, 0)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Size and flags of `key` without reading its value
    pub fn get_info(&self, key: &str) -> Result<KvInfo> {
        self.inner.lock().get_info(key)
    }

    /// Remove `key`. Write-once keys cannot be removed.
    pub fn remove(&self, key: &str) -> Result<()> {
        let _session = self.inc_set_lock.lock();
        self.inner.lock().set(key, &[], FLAG_DELETE)
    }

    // =========================================================================
    // Incremental Set
    // =========================================================================

    /// Start streaming a value of exactly `final_data_size` bytes into `key`.
    ///
    /// Blocks while another session is open.
    pub fn set_start(
        &self,
        key: &str,
        final_data_size: usize,
        flags: CreateFlags,
    ) -> Result<IncrementalSet<'_, D>> {
        let flags = CreateFlags::from_bits(flags.bits())?;
        let lock = self.inc_set_lock.lock();
        let session = self
            .inner
            .lock()
            .begin_set(key, final_data_size, flags.bits())?;
        Ok(IncrementalSet::new(self, session, lock))
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Iterate over keys starting with `prefix` (all keys for `""`)
    pub fn iterator_open(&self, prefix: &str) -> Result<KeyIterator<'_, D>> {
        let id = self.inner.lock().iterator_open(prefix)?;
        Ok(KeyIterator::new(self, id))
    }

    // =========================================================================
    // Reserved Slot
    // =========================================================================

    /// Write the one-time Reserved Slot (at most 64 bytes)
    pub fn reserved_data_set(&self, data: &[u8]) -> Result<()> {
        let _session = self.inc_set_lock.lock();
        self.inner.lock().reserved_data_set(data)
    }

    /// Read the Reserved Slot into `buf`, returning its size
    pub fn reserved_data_get(&self, buf: &mut [u8]) -> Result<usize> {
        self.inner.lock().reserved_data_get(buf)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn stats(&self) -> Result<StoreStats> {
        self.inner.lock().stats()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.lock().ready
    }

    pub fn config(&self) -> Config {
        self.inner.lock().config.clone()
    }

    /// Force a garbage collection
    pub fn compact(&self) -> Result<()> {
        let _session = self.inc_set_lock.lock();
        let mut inner = self.inner.lock();
        inner.ensure_ready()?;
        inner.garbage_collection()
    }
}

impl<D> std::fmt::Debug for TdbStore<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TdbStore").finish_non_exhaustive()
    }
}

