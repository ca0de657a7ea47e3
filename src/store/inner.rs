//! Engine state behind the instance lock
//!
//! Everything here runs with the instance lock held. Mutating entry points
//! additionally run with the incremental-set lock held by the caller.

use tracing::{debug, info, warn};

use crate::area::{is_newer_version, read_master, write_master, AreaManager, NUM_AREAS};
use crate::config::Config;
use crate::device::BlockDevice;
use crate::error::{Result, TdbError};
use crate::index::{RamEntry, RamTable};
use crate::record::{
    key_hash, read_record, record_size, validate_key, CreateFlags, ReadRequest, RecordHeader,
    RecordWriter, FLAG_DELETE, FLAG_DISCARDED, HEADER_SIZE,
};

use super::iterator::IteratorRegistry;
use super::{KvInfo, StoreStats};

/// Outcome of a RAM index lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookup {
    /// Key is live: table position, record offset and the header read
    /// while confirming the key
    Found {
        pos: usize,
        offset: u64,
        header: RecordHeader,
    },
    /// Key is absent; this is where it would be inserted
    Missing(usize),
}

/// A record being written between reservation and commit
#[derive(Debug)]
pub(crate) struct SetSession {
    pub(crate) key: String,
    pub(crate) writer: RecordWriter,
}

pub(crate) struct Inner<D> {
    pub(crate) areas: AreaManager<D>,
    pub(crate) config: Config,
    pub(crate) ready: bool,
    pub(crate) active_area: u8,
    pub(crate) active_version: u16,
    pub(crate) free_space_offset: u64,
    pub(crate) table: RamTable,
    pub(crate) iterators: IteratorRegistry,
    pub(crate) gc_count: u64,
}

impl<D: BlockDevice> Inner<D> {
    pub(crate) fn new(areas: AreaManager<D>, config: Config) -> Self {
        let table = RamTable::new(config.initial_max_keys);
        let first_record_offset = areas.layout().first_record_offset;
        Self {
            areas,
            config,
            ready: false,
            active_area: 0,
            active_version: 0,
            free_space_offset: first_record_offset,
            table,
            iterators: IteratorRegistry::new(),
            gc_count: 0,
        }
    }

    pub(crate) fn ensure_ready(&self) -> Result<()> {
        if self.ready {
            Ok(())
        } else {
            Err(TdbError::NotReady)
        }
    }

    pub(crate) fn standby_area(&self) -> u8 {
        NUM_AREAS - 1 - self.active_area
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Select the active Area, rebuild the RAM index and go Ready.
    pub(crate) fn init(&mut self) -> Result<()> {
        if self.ready {
            return Ok(());
        }

        // Step 1: Pick the active Area from the two Master Records
        let versions = [read_master(&mut self.areas, 0)?, read_master(&mut self.areas, 1)?];
        match versions {
            [None, None] => {
                warn!("No valid master record in either area, formatting store");
                self.format()?;
            }
            [Some(version), None] => self.activate(0, version),
            [None, Some(version)] => self.activate(1, version),
            [Some(v0), Some(v1)] => {
                let active = if is_newer_version(v1, v0) { 1 } else { 0 };
                let version = if active == 0 { v0 } else { v1 };
                self.activate(active, version);

                // A GC was cut short after the flip; retire the stale Area
                debug!(area = 1 - active, "Erasing stale master record");
                self.areas.erase_first_unit(1 - active)?;
            }
        }

        // Step 2: Rebuild the RAM index from the active log
        self.build_ram_table()?;

        // Step 3: A torn write may have left garbage past the log end
        if !self
            .areas
            .unit_tail_is_erased(self.active_area, self.free_space_offset)?
        {
            warn!(
                offset = self.free_space_offset,
                "Unerased bytes past end of log, compacting"
            );
            self.garbage_collection()?;
        }

        self.ready = true;
        info!(
            area = self.active_area,
            version = self.active_version,
            keys = self.table.len(),
            free_space_offset = self.free_space_offset,
            "Store initialized"
        );
        Ok(())
    }

    /// Release the RAM index and go Uninitialized.
    pub(crate) fn deinit(&mut self) {
        self.ready = false;
        self.table = RamTable::new(self.config.initial_max_keys);
        self.iterators.clear();
        debug!("Store deinitialized");
    }

    /// Erase both Areas (Reserved Slot included) and start an empty log.
    pub(crate) fn reset(&mut self) -> Result<()> {
        self.ready = false;
        self.format()?;
        self.iterators.rewind_all();
        self.ready = true;
        info!("Store reset");
        Ok(())
    }

    /// Erase everything and write a first Master Record into Area 0.
    fn format(&mut self) -> Result<()> {
        for area in 0..NUM_AREAS {
            self.areas.erase_area(area)?;
        }
        write_master(&mut self.areas, 0, 1)?;
        self.activate(0, 1);
        self.table.clear();
        Ok(())
    }

    fn activate(&mut self, area: u8, version: u16) {
        self.active_area = area;
        self.active_version = version;
        self.free_space_offset = self.areas.layout().first_record_offset;
        self.table.clear();
    }

    // =========================================================================
    // RAM Index
    // =========================================================================

    /// Scan the active Area once, front to back, replaying every record
    /// into the RAM index. The first unreadable record ends the log.
    fn build_ram_table(&mut self) -> Result<()> {
        let layout = *self.areas.layout();
        let area = self.active_area;
        let mut offset = layout.first_record_offset;
        let mut records = 0u64;

        self.table.clear();
        loop {
            let request = ReadRequest {
                copy_key: true,
                verify: true,
                data: None,
            };
            let info = match read_record(&mut self.areas, area, offset, layout.area_size, request) {
                Ok(info) => info,
                Err(TdbError::DataCorrupt(reason)) => {
                    let header_end = (offset + HEADER_SIZE as u64).min(layout.area_size);
                    if !self.areas.is_erased(area, offset, header_end)? {
                        warn!(offset, %reason, "Log truncated at corrupt record");
                    }
                    break;
                }
                Err(e) => return Err(e),
            };

            // Lookups only trust records before the one being replayed
            self.free_space_offset = offset;
            records += 1;

            if !info.header.is_discarded() {
                match self.find_record(&info.key)? {
                    Lookup::Found { pos, .. } if info.header.is_tombstone() => {
                        self.table.remove(pos);
                    }
                    Lookup::Found { pos, .. } => self.table.set_offset(pos, offset),
                    Lookup::Missing(_) if info.header.is_tombstone() => {}
                    Lookup::Missing(pos) => self.table.insert(
                        pos,
                        RamEntry {
                            hash: info.hash,
                            offset,
                        },
                    ),
                }
            }

            offset = info.next_offset;
        }

        self.free_space_offset = offset;
        debug!(
            records,
            keys = self.table.len(),
            free_space_offset = offset,
            "RAM index rebuilt"
        );
        Ok(())
    }

    /// Find a key in the RAM index.
    ///
    /// A hash match is only a candidate: the key bytes stored on flash are
    /// read back and compared before the entry is accepted.
    pub(crate) fn find_record(&mut self, key: &[u8]) -> Result<Lookup> {
        let range = self.table.hash_range(key_hash(key));
        for pos in range.clone() {
            let offset = self.table.entries()[pos].offset;
            let info = read_record(
                &mut self.areas,
                self.active_area,
                offset,
                self.free_space_offset,
                ReadRequest::key(),
            )?;
            if info.key == key {
                return Ok(Lookup::Found {
                    pos,
                    offset,
                    header: info.header,
                });
            }
        }
        Ok(Lookup::Missing(range.end))
    }

    /// Offset and header of the current record of a live key
    fn live_record(&mut self, key: &str) -> Result<(u64, RecordHeader)> {
        match self.find_record(key.as_bytes())? {
            Lookup::Found { offset, header, .. } => Ok((offset, header)),
            Lookup::Missing(_) => Err(TdbError::ItemNotFound),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub(crate) fn get(&mut self, key: &str, buf: &mut [u8], offset: usize) -> Result<usize> {
        self.ensure_ready()?;
        validate_key(key)?;

        let (record_offset, _) = self.live_record(key)?;
        let request = ReadRequest {
            copy_key: false,
            verify: true,
            data: Some((buf, offset)),
        };
        let info = read_record(
            &mut self.areas,
            self.active_area,
            record_offset,
            self.free_space_offset,
            request,
        )?;
        Ok(info.copied)
    }

    pub(crate) fn get_info(&mut self, key: &str) -> Result<KvInfo> {
        self.ensure_ready()?;
        validate_key(key)?;

        let (record_offset, _) = self.live_record(key)?;
        let info = read_record(
            &mut self.areas,
            self.active_area,
            record_offset,
            self.free_space_offset,
            ReadRequest::verify(),
        )?;
        Ok(KvInfo {
            size: info.header.data_size as usize,
            flags: info.header.create_flags(),
        })
    }

    pub(crate) fn stats(&self) -> Result<StoreStats> {
        self.ensure_ready()?;
        Ok(StoreStats {
            num_keys: self.table.len(),
            active_area: self.active_area,
            version: self.active_version,
            free_space_offset: self.free_space_offset,
            area_size: self.areas.layout().area_size,
            gc_count: self.gc_count,
            open_iterators: self.iterators.len(),
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Validate a write, make room for it and reserve its space.
    ///
    /// `record_flags` is `FLAG_DELETE` for a removal, otherwise the caller's
    /// create flags.
    pub(crate) fn begin_set(&mut self, key: &str, data_size: usize, record_flags: u32) -> Result<SetSession> {
        self.ensure_ready()?;
        validate_key(key)?;
        if data_size > u32::MAX as usize {
            return Err(TdbError::InvalidSize(format!(
                "value of {} bytes exceeds the {} byte record limit",
                data_size,
                u32::MAX
            )));
        }

        let is_delete = record_flags & FLAG_DELETE != 0;
        match self.live_record(key) {
            Ok((_, header)) if header.create_flags().contains(CreateFlags::WRITE_ONCE) => {
                return Err(TdbError::WriteProtected);
            }
            Ok(_) => {}
            Err(TdbError::ItemNotFound) if is_delete => return Err(TdbError::ItemNotFound),
            Err(TdbError::ItemNotFound) => {}
            Err(e) => return Err(e),
        }

        let layout = *self.areas.layout();
        let size = record_size(key.len(), data_size, layout.program_size);
        if size > layout.max_record_size() {
            return Err(TdbError::MediaFull);
        }
        if self.free_space_offset + size > layout.area_size {
            self.garbage_collection()?;
            if self.free_space_offset + size > layout.area_size {
                return Err(TdbError::MediaFull);
            }
        }

        let offset = self.free_space_offset;
        self.areas
            .check_erase_before_write(self.active_area, offset, size)?;
        self.free_space_offset += size;

        let header = RecordHeader::new(record_flags, key.len(), data_size);
        let writer = match RecordWriter::begin(&mut self.areas, self.active_area, offset, header, key.as_bytes()) {
            Ok(writer) => writer,
            Err(e) => {
                // Space is burnt and possibly half programmed; let init sort it out
                self.ready = false;
                return Err(e);
            }
        };

        Ok(SetSession {
            key: key.to_string(),
            writer,
        })
    }

    pub(crate) fn write_data(&mut self, session: &mut SetSession, data: &[u8]) -> Result<()> {
        self.ensure_ready()?;
        session.writer.append(&mut self.areas, data)
    }

    /// Program the header and publish the record in the RAM index.
    pub(crate) fn commit_set(&mut self, session: SetSession) -> Result<()> {
        self.ensure_ready()?;

        let SetSession { key, writer } = session;
        let offset = writer.offset();
        let header = match writer.finish(&mut self.areas) {
            Ok(header) => header,
            Err(e) => {
                self.ready = false;
                return Err(e);
            }
        };

        match self.find_record(key.as_bytes())? {
            Lookup::Found { pos, .. } if header.is_tombstone() => {
                self.table.remove(pos);
                self.update_all_iterators(pos, false);
            }
            Lookup::Found { pos, .. } => self.table.set_offset(pos, offset),
            Lookup::Missing(_) if header.is_tombstone() => {}
            Lookup::Missing(pos) => {
                self.table.insert(
                    pos,
                    RamEntry {
                        hash: key_hash(key.as_bytes()),
                        offset,
                    },
                );
                self.update_all_iterators(pos, true);
            }
        }
        Ok(())
    }

    /// Close out a session that will not be committed, keeping the log
    /// contiguous.
    pub(crate) fn abandon_set(&mut self, session: SetSession) -> Result<()> {
        if !self.ready {
            return Ok(());
        }
        warn!(key = %session.key, "Discarding unfinished write");
        if let Err(e) = session.writer.discard(&mut self.areas, FLAG_DISCARDED) {
            self.ready = false;
            return Err(e);
        }
        Ok(())
    }

    /// Plain `set`/`remove`: one session, all data at once.
    pub(crate) fn set(&mut self, key: &str, data: &[u8], record_flags: u32) -> Result<()> {
        let mut session = self.begin_set(key, data.len(), record_flags)?;
        if let Err(e) = self.write_data(&mut session, data) {
            self.abandon_set(session)?;
            return Err(e);
        }
        self.commit_set(session)
    }
}
