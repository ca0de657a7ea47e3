//! Garbage Collector
//!
//! Compacts the live records of the active Area into the standby Area and
//! flips which one is active.
//!
//! ## Sequence
//! 1. Erase the standby Area
//! 2. Carry the Reserved Slot across
//! 3. Copy every live record, in RAM index order, verbatim
//! 4. Write the standby Master Record with `version + 1`
//! 5. Flip the active Area in memory
//! 6. Erase the old Area's first erase unit (its Master Record)
//!
//! Until step 4 completes the old Master Record is the only valid one, so a
//! power loss anywhere before it just reselects the old Area at next init.

use tracing::{debug, error};

use crate::area::{copy_reserved, write_master};
use crate::device::BlockDevice;
use crate::error::{Result, TdbError};
use crate::record::{RecordHeader, HEADER_SIZE};

use super::inner::Inner;

impl<D: BlockDevice> Inner<D> {
    /// Run a full compaction. Any device failure is fatal: the store drops
    /// to Uninitialized and must be re-initialized.
    pub(crate) fn garbage_collection(&mut self) -> Result<()> {
        let from = self.active_area;
        let to = self.standby_area();
        let new_version = self.active_version.wrapping_add(1);

        let (new_offsets, free_space_offset) = match self.compact_into(from, to, new_version) {
            Ok(result) => result,
            Err(e) => return Err(self.gc_failed(e)),
        };

        // Flip: the new Master Record is on flash, the standby is now active
        for (pos, offset) in new_offsets.into_iter().enumerate() {
            self.table.set_offset(pos, offset);
        }
        self.active_area = to;
        self.active_version = new_version;
        self.free_space_offset = free_space_offset;
        self.gc_count += 1;

        if let Err(e) = self.areas.erase_first_unit(from) {
            return Err(self.gc_failed(e));
        }

        debug!(
            from,
            to,
            version = new_version,
            keys = self.table.len(),
            free_space_offset,
            "Garbage collection complete"
        );
        Ok(())
    }

    /// Steps 1-4. Returns the new offset of every table entry and the new
    /// free space offset; nothing in memory changes here.
    fn compact_into(&mut self, from: u8, to: u8, new_version: u16) -> Result<(Vec<u64>, u64)> {
        let layout = *self.areas.layout();

        self.areas.erase_area(to)?;
        copy_reserved(&mut self.areas, from, to)?;

        let mut to_offset = layout.first_record_offset;
        let mut new_offsets = Vec::with_capacity(self.table.len());
        for pos in 0..self.table.len() {
            let from_offset = self.table.entries()[pos].offset;

            let mut raw = [0u8; HEADER_SIZE];
            self.areas.read(from, from_offset, &mut raw)?;
            let size = RecordHeader::decode(&raw).record_size(layout.program_size);

            self.areas.copy(from, from_offset, to, to_offset, size)?;
            new_offsets.push(to_offset);
            to_offset += size;
        }

        write_master(&mut self.areas, to, new_version)?;
        Ok((new_offsets, to_offset))
    }

    fn gc_failed(&mut self, err: TdbError) -> TdbError {
        error!(error = %err, "Garbage collection failed, store needs re-init");
        self.ready = false;
        self.table.clear();
        err
    }
}
