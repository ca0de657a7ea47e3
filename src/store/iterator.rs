//! Key Iterator
//!
//! Prefix-filtered enumeration over the RAM index.
//!
//! Each open iterator is a cursor (a RAM index position) kept in an arena
//! inside the engine. Inserts and removals shift table positions, so every
//! mutation moves the cursors behind it: keys present when the iterator was
//! opened are yielded exactly once unless they are removed first, and keys
//! added at or after a cursor are still yielded.

use crate::device::BlockDevice;
use crate::error::{Result, TdbError};
use crate::record::{read_record, ReadRequest};

use super::inner::Inner;
use super::TdbStore;

/// Handle to an entry in the iterator arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IteratorId {
    slot: usize,
    generation: u64,
}

#[derive(Debug)]
struct Cursor {
    generation: u64,
    prefix: String,
    position: usize,
}

/// Arena of open iterator cursors
#[derive(Debug, Default)]
pub(crate) struct IteratorRegistry {
    slots: Vec<Option<Cursor>>,
    next_generation: u64,
}

impl IteratorRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn open(&mut self, prefix: &str) -> IteratorId {
        self.next_generation += 1;
        let cursor = Cursor {
            generation: self.next_generation,
            prefix: prefix.to_string(),
            position: 0,
        };

        let slot = match self.slots.iter().position(Option::is_none) {
            Some(slot) => {
                self.slots[slot] = Some(cursor);
                slot
            }
            None => {
                self.slots.push(Some(cursor));
                self.slots.len() - 1
            }
        };

        IteratorId {
            slot,
            generation: self.next_generation,
        }
    }

    pub(crate) fn close(&mut self, id: IteratorId) {
        if self.cursor_mut(id).is_some() {
            self.slots[id.slot] = None;
        }
    }

    /// Number of open iterators
    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Forget every cursor; outstanding handles become stale
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }

    /// Move every cursor back to the start (the table was emptied)
    pub(crate) fn rewind_all(&mut self) {
        for cursor in self.slots.iter_mut().flatten() {
            cursor.position = 0;
        }
    }

    /// A key was inserted at table position `pos`
    fn on_insert(&mut self, pos: usize) {
        for cursor in self.slots.iter_mut().flatten() {
            if pos < cursor.position {
                cursor.position += 1;
            }
        }
    }

    /// The key at table position `pos` was removed
    fn on_remove(&mut self, pos: usize) {
        for cursor in self.slots.iter_mut().flatten() {
            if pos < cursor.position {
                cursor.position -= 1;
            }
        }
    }

    fn cursor_mut(&mut self, id: IteratorId) -> Option<&mut Cursor> {
        self.slots
            .get_mut(id.slot)
            .and_then(Option::as_mut)
            .filter(|c| c.generation == id.generation)
    }
}

impl<D: BlockDevice> Inner<D> {
    pub(crate) fn iterator_open(&mut self, prefix: &str) -> Result<IteratorId> {
        self.ensure_ready()?;
        Ok(self.iterators.open(prefix))
    }

    /// Next key matching the iterator's prefix; `ItemNotFound` once exhausted.
    pub(crate) fn iterator_next(&mut self, id: IteratorId) -> Result<String> {
        self.ensure_ready()?;

        loop {
            let cursor = self
                .iterators
                .cursor_mut(id)
                .ok_or_else(|| TdbError::InvalidArgument("iterator is closed".to_string()))?;
            let pos = cursor.position;
            let Some(entry) = self.table.get(pos).copied() else {
                return Err(TdbError::ItemNotFound);
            };
            cursor.position += 1;

            let info = read_record(
                &mut self.areas,
                self.active_area,
                entry.offset,
                self.free_space_offset,
                ReadRequest::key(),
            )?;
            let key = String::from_utf8(info.key).map_err(|_| {
                TdbError::DataCorrupt(format!("key at {:#x} is not UTF-8", entry.offset))
            })?;

            let matches = match self.iterators.cursor_mut(id) {
                Some(cursor) => key.starts_with(cursor.prefix.as_str()),
                None => false,
            };
            if matches {
                return Ok(key);
            }
        }
    }

    pub(crate) fn iterator_close(&mut self, id: IteratorId) {
        self.iterators.close(id);
    }

    /// Keep open cursors pointing at the same keys after a table mutation.
    pub(crate) fn update_all_iterators(&mut self, pos: usize, added: bool) {
        if added {
            self.iterators.on_insert(pos);
        } else {
            self.iterators.on_remove(pos);
        }
    }
}

/// Open iterator over the keys of a store
///
/// Yields keys starting with the prefix given to `iterator_open`. The
/// iterator is closed when dropped.
pub struct KeyIterator<'a, D: BlockDevice> {
    store: &'a TdbStore<D>,
    id: IteratorId,
}

impl<'a, D: BlockDevice> KeyIterator<'a, D> {
    pub(crate) fn new(store: &'a TdbStore<D>, id: IteratorId) -> Self {
        Self { store, id }
    }

    /// Next matching key, or `ItemNotFound` when the iteration is exhausted
    pub fn next_key(&mut self) -> Result<String> {
        self.store.inner.lock().iterator_next(self.id)
    }

    /// Close the iterator
    pub fn close(self) {
        // Drop does the work
    }
}

impl<D: BlockDevice> Iterator for KeyIterator<'_, D> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_key() {
            Err(TdbError::ItemNotFound) => None,
            other => Some(other),
        }
    }
}

impl<D: BlockDevice> Drop for KeyIterator<'_, D> {
    fn drop(&mut self) {
        self.store.inner.lock().iterator_close(self.id);
    }
}
