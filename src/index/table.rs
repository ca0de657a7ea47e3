//! RAM index table
//!
//! Sorted `Vec` of (hash, offset) entries with explicit doubling growth.

use std::ops::Range;

/// One live key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RamEntry {
    /// CRC32 of the key bytes
    pub hash: u32,
    /// Offset of the key's current record in the active Area
    pub offset: u64,
}

/// RAM index of all live keys, sorted by hash
#[derive(Debug)]
pub struct RamTable {
    entries: Vec<RamEntry>,
    /// Logical capacity: doubles when an insert would exceed it
    max_keys: usize,
}

impl RamTable {
    /// Create an empty table with room for `initial_max_keys` entries
    pub fn new(initial_max_keys: usize) -> Self {
        let max_keys = initial_max_keys.max(1);
        Self {
            entries: Vec::with_capacity(max_keys),
            max_keys,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current capacity in entries
    pub fn capacity(&self) -> usize {
        self.max_keys
    }

    pub fn get(&self, pos: usize) -> Option<&RamEntry> {
        self.entries.get(pos)
    }

    pub fn entries(&self) -> &[RamEntry] {
        &self.entries
    }

    /// Positions of all entries sharing `hash`.
    ///
    /// An empty range starts at the position where `hash` would be inserted.
    pub fn hash_range(&self, hash: u32) -> Range<usize> {
        let start = self.entries.partition_point(|e| e.hash < hash);
        let end = self.entries.partition_point(|e| e.hash <= hash);
        start..end
    }

    /// Insert at `pos`, which must keep the table sorted by hash
    pub fn insert(&mut self, pos: usize, entry: RamEntry) {
        debug_assert!(pos == 0 || self.entries[pos - 1].hash <= entry.hash);
        debug_assert!(pos == self.entries.len() || entry.hash <= self.entries[pos].hash);

        if self.entries.len() == self.max_keys {
            self.max_keys *= 2;
            self.entries.reserve_exact(self.max_keys - self.entries.len());
            tracing::debug!(capacity = self.max_keys, "RAM index grown");
        }
        self.entries.insert(pos, entry);
    }

    pub fn remove(&mut self, pos: usize) -> RamEntry {
        self.entries.remove(pos)
    }

    pub fn set_offset(&mut self, pos: usize, offset: u64) {
        self.entries[pos].offset = offset;
    }

    /// Drop every entry; capacity is kept
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
