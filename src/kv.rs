//! Key/Value Store Contract
//!
//! The named-blob-store capability this engine provides. Other backends
//! (filesystem-backed, RAM-only) implement the same traits and are picked
//! at construction time.

use crate::device::BlockDevice;
use crate::error::Result;
use crate::record::CreateFlags;
use crate::store::{IncrementalSet, KeyIterator, KvInfo, TdbStore};

/// Streamed write of one value
pub trait IncrementalWrite {
    fn add_data(&mut self, data: &[u8]) -> Result<()>;
    fn finalize(self) -> Result<()>;
}

/// Enumeration of keys under a prefix
pub trait KeyIter {
    /// Next key, or `ItemNotFound` when exhausted
    fn next_key(&mut self) -> Result<String>;
}

/// Named blob store
pub trait KvStore {
    type SetHandle<'a>: IncrementalWrite
    where
        Self: 'a;
    type Iter<'a>: KeyIter
    where
        Self: 'a;

    fn init(&self) -> Result<()>;
    fn deinit(&self) -> Result<()>;
    fn reset(&self) -> Result<()>;

    fn set(&self, key: &str, data: &[u8], flags: CreateFlags) -> Result<()>;
    fn get(&self, key: &str, buf: &mut [u8], offset: usize) -> Result<usize>;
    fn get_info(&self, key: &str) -> Result<KvInfo>;
    fn remove(&self, key: &str) -> Result<()>;

    fn set_start(&self, key: &str, final_data_size: usize, flags: CreateFlags) -> Result<Self::SetHandle<'_>>;
    fn iterator_open(&self, prefix: &str) -> Result<Self::Iter<'_>>;

    fn reserved_data_set(&self, data: &[u8]) -> Result<()>;
    fn reserved_data_get(&self, buf: &mut [u8]) -> Result<usize>;
}

// =============================================================================
// TdbStore
// =============================================================================

impl<D: BlockDevice> IncrementalWrite for IncrementalSet<'_, D> {
    fn add_data(&mut self, data: &[u8]) -> Result<()> {
        IncrementalSet::add_data(self, data)
    }

    fn finalize(self) -> Result<()> {
        IncrementalSet::finalize(self)
    }
}

impl<D: BlockDevice> KeyIter for KeyIterator<'_, D> {
    fn next_key(&mut self) -> Result<String> {
        KeyIterator::next_key(self)
    }
}

impl<D: BlockDevice> KvStore for TdbStore<D> {
    type SetHandle<'a> = IncrementalSet<'a, D> where Self: 'a;
    type Iter<'a> = KeyIterator<'a, D> where Self: 'a;

    fn init(&self) -> Result<()> {
        TdbStore::init(self)
    }

    fn deinit(&self) -> Result<()> {
        TdbStore::deinit(self)
    }

    fn reset(&self) -> Result<()> {
        TdbStore::reset(self)
    }

    fn set(&self, key: &str, data: &[u8], flags: CreateFlags) -> Result<()> {
        TdbStore::set(self, key, data, flags)
    }

    fn get(&self, key: &str, buf: &mut [u8], offset: usize) -> Result<usize> {
        TdbStore::get(self, key, buf, offset)
    }

    fn get_info(&self, key: &str) -> Result<KvInfo> {
        TdbStore::get_info(self, key)
    }

    fn remove(&self, key: &str) -> Result<()> {
        TdbStore::remove(self, key)
    }

    fn set_start(&self, key: &str, final_data_size: usize, flags: CreateFlags) -> Result<Self::SetHandle<'_>> {
        TdbStore::set_start(self, key, final_data_size, flags)
    }

    fn iterator_open(&self, prefix: &str) -> Result<Self::Iter<'_>> {
        TdbStore::iterator_open(self, prefix)
    }

    fn reserved_data_set(&self, data: &[u8]) -> Result<()> {
        TdbStore::reserved_data_set(self, data)
    }

    fn reserved_data_get(&self, buf: &mut [u8]) -> Result<usize> {
        TdbStore::reserved_data_get(self, buf)
    }
}
