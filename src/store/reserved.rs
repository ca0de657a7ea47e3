//! Reserved Area operations
//!
//! One-time provisioning slot, written into both Areas at once.
//!
//! The active Area's copy is authoritative. The standby Area is scratch space
//! while the store is Ready (GC erases it before use), so its copy only
//! counts when it checks out as `Valid`; anything else found there is stale.

use tracing::{debug, info};

use crate::area::{read_reserved, write_reserved, ReservedSlot, RESERVED_AREA_SIZE};
use crate::device::BlockDevice;
use crate::error::{Result, TdbError};

use super::inner::Inner;

impl<D: BlockDevice> Inner<D> {
    /// Write the slot. Fails with `ReservedAreaWritten` once it has been
    /// written, until the next `reset`.
    pub(crate) fn reserved_data_set(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_ready()?;
        if data.len() > RESERVED_AREA_SIZE {
            return Err(TdbError::InvalidSize(format!(
                "reserved data is {} bytes, max is {}",
                data.len(),
                RESERVED_AREA_SIZE
            )));
        }

        let active = self.active_area;
        let standby = self.standby_area();

        // A corrupt active copy was still written; the standby only counts if valid
        let active_slot = read_reserved(&mut self.areas, active)?;
        let standby_slot = read_reserved(&mut self.areas, standby)?;
        if active_slot.is_occupied() || matches!(standby_slot, ReservedSlot::Valid(_)) {
            return Err(TdbError::ReservedAreaWritten);
        }

        // Leftovers in the standby slot region would be programmed over
        let slot_end = self.areas.layout().master_offset;
        if !self.areas.is_erased(standby, 0, slot_end)? {
            debug!(area = standby, "Erasing stale standby slot");
            self.areas.erase_first_unit(standby)?;
        }

        write_reserved(&mut self.areas, active, data)?;
        write_reserved(&mut self.areas, standby, data)?;
        info!(size = data.len(), "Reserved data written");
        Ok(())
    }

    /// Copy the slot into `buf`, returning its size. The active Area's copy
    /// wins; a valid standby copy is the fallback.
    pub(crate) fn reserved_data_get(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_ready()?;

        let data = match read_reserved(&mut self.areas, self.active_area)? {
            ReservedSlot::Valid(data) => data,
            active => {
                let standby = self.standby_area();
                match read_reserved(&mut self.areas, standby)? {
                    ReservedSlot::Valid(data) => data,
                    _ if active == ReservedSlot::Corrupt => {
                        return Err(TdbError::DataCorrupt(
                            "reserved data checksum mismatch".to_string(),
                        ));
                    }
                    _ => return Err(TdbError::ItemNotFound),
                }
            }
        };

        if buf.len() < data.len() {
            return Err(TdbError::InvalidSize(format!(
                "buffer of {} bytes cannot hold {} bytes of reserved data",
                buf.len(),
                data.len()
            )));
        }
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }
}
