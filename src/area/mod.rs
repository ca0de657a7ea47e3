//! Area Module
//!
//! Splits the device into two equal Areas and mediates every device access.
//!
//! ## Responsibilities
//! - Lay out two Areas in whole erase units
//! - Translate (Area, offset) into device addresses
//! - Erase an erase unit before the first write that starts it
//! - Read, write and select Master Records
//! - Store the Reserved Slot at the start of each Area
//!
//! ## Area Layout
//! ```text
//! ┌──────────────────────────────────────────────┐ offset 0
//! │ Reserved Slot data (64 bytes)                │
//! ├──────────────────────────────────────────────┤ 64
//! │ Reserved trailer (size, data size, crc)      │
//! ├──────────────────────────────────────────────┤ align(72, prog)
//! │ Master Record  key "TDBS" { version, fmt }   │
//! ├──────────────────────────────────────────────┤ first record offset
//! │ Record │ Record │ Record │ ...  (append only)│
//! ├──────────────────────────────────────────────┤ free space offset
//! │ erased                                       │
//! └──────────────────────────────────────────────┘ area size
//! ```

mod master;
mod reserved;

use crate::device::BlockDevice;
use crate::error::{Result, TdbError};
use crate::record::{align_up, record_size};

pub use master::{is_newer_version, read_master, write_master, MASTER_DATA_SIZE, MASTER_KEY};
pub use reserved::{
    copy_reserved, read_reserved, write_reserved, ReservedSlot, RESERVED_AREA_SIZE,
    RESERVED_TRAILER_SIZE,
};

/// Number of Areas the device is split into
pub const NUM_AREAS: u8 = 2;

/// Geometry derived from the block device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaLayout {
    pub area_size: u64,
    pub erase_size: u64,
    pub program_size: u64,
    pub erase_value: u8,
    /// Offset of the Master Record in each Area
    pub master_offset: u64,
    /// Offset of the first log record in each Area
    pub first_record_offset: u64,
}

impl AreaLayout {
    /// Derive the layout from a device, rejecting geometry the engine cannot use.
    pub fn for_device<D: BlockDevice>(device: &D) -> Result<Self> {
        let erase_size = device.erase_size();
        let program_size = device.program_size();

        if program_size == 0 || erase_size == 0 || erase_size % program_size != 0 {
            return Err(TdbError::InvalidArgument(format!(
                "erase size {} is not a multiple of program size {}",
                erase_size, program_size
            )));
        }

        let units = device.size() / erase_size;
        if units < NUM_AREAS as u64 {
            return Err(TdbError::InvalidArgument(format!(
                "device holds {} erase units, need at least {}",
                units, NUM_AREAS
            )));
        }

        let area_size = (units / NUM_AREAS as u64) * erase_size;
        let master_offset = align_up(
            (RESERVED_AREA_SIZE + RESERVED_TRAILER_SIZE) as u64,
            program_size,
        );
        let first_record_offset =
            master_offset + record_size(MASTER_KEY.len(), MASTER_DATA_SIZE, program_size);

        // Erasing the first unit must wipe the Master Record
        if first_record_offset > erase_size || first_record_offset >= area_size {
            return Err(TdbError::InvalidArgument(format!(
                "erase unit of {} bytes cannot hold the {} byte Area header",
                erase_size, first_record_offset
            )));
        }

        Ok(Self {
            area_size,
            erase_size,
            program_size,
            erase_value: device.erase_value(),
            master_offset,
            first_record_offset,
        })
    }

    /// Largest record that fits in an otherwise empty Area
    pub fn max_record_size(&self) -> u64 {
        self.area_size - self.first_record_offset
    }
}

/// Owns the block device and exposes it as two Areas
pub struct AreaManager<D> {
    device: D,
    layout: AreaLayout,
    work_buf_size: usize,
}

impl<D: BlockDevice> AreaManager<D> {
    pub fn new(device: D, work_buf_size: usize) -> Result<Self> {
        let layout = AreaLayout::for_device(&device)?;
        let work_buf_size = align_up(work_buf_size.max(1) as u64, layout.program_size) as usize;
        Ok(Self {
            device,
            layout,
            work_buf_size,
        })
    }

    pub fn layout(&self) -> &AreaLayout {
        &self.layout
    }

    /// Scratch buffer size, a multiple of the program size
    pub fn work_buf_size(&self) -> usize {
        self.work_buf_size
    }

    /// Give the device back
    pub fn into_device(self) -> D {
        self.device
    }

    // =========================================================================
    // Raw Area Access
    // =========================================================================

    pub fn read(&mut self, area: u8, offset: u64, buf: &mut [u8]) -> Result<()> {
        let addr = self.address(area, offset, buf.len() as u64)?;
        self.device.read(addr, buf).map_err(TdbError::read)
    }

    pub fn program(&mut self, area: u8, offset: u64, buf: &[u8]) -> Result<()> {
        let addr = self.address(area, offset, buf.len() as u64)?;
        self.device.program(addr, buf).map_err(TdbError::write)
    }

    pub fn erase(&mut self, area: u8, offset: u64, len: u64) -> Result<()> {
        let addr = self.address(area, offset, len)?;
        self.device.erase(addr, len).map_err(TdbError::write)
    }

    /// Erase a whole Area
    pub fn erase_area(&mut self, area: u8) -> Result<()> {
        self.erase(area, 0, self.layout.area_size)
    }

    /// Erase the first erase unit of an Area, which invalidates its Master Record
    pub fn erase_first_unit(&mut self, area: u8) -> Result<()> {
        self.erase(area, 0, self.layout.erase_size)
    }

    // =========================================================================
    // Erase Bookkeeping
    // =========================================================================

    /// Erase every erase unit that begins inside `[offset, offset + len)`.
    ///
    /// The unit holding `offset` itself is left alone when `offset` is not on
    /// a unit boundary: the log already lives in it, and its tail past the
    /// free space offset is known to be erased.
    pub fn check_erase_before_write(&mut self, area: u8, offset: u64, len: u64) -> Result<()> {
        let erase_size = self.layout.erase_size;
        let start = align_up(offset, erase_size);
        let end = align_up(offset + len, erase_size).min(self.layout.area_size);
        if start < end {
            self.erase(area, start, end - start)?;
        }
        Ok(())
    }

    /// True if every byte in `[from, to)` reads as the erase value
    pub fn is_erased(&mut self, area: u8, from: u64, to: u64) -> Result<bool> {
        let erase_value = self.layout.erase_value;
        let mut chunk = vec![0u8; self.work_buf_size];
        let mut pos = from;
        while pos < to {
            let n = chunk.len().min((to - pos) as usize);
            self.read(area, pos, &mut chunk[..n])?;
            if chunk[..n].iter().any(|&b| b != erase_value) {
                return Ok(false);
            }
            pos += n as u64;
        }
        Ok(true)
    }

    /// True if the rest of the erase unit holding `offset` is still erased
    pub fn unit_tail_is_erased(&mut self, area: u8, offset: u64) -> Result<bool> {
        let end = align_up(offset, self.layout.erase_size).min(self.layout.area_size);
        self.is_erased(area, offset, end)
    }

    /// Copy `len` bytes between Areas, chunked through the scratch buffer
    pub fn copy(
        &mut self,
        from_area: u8,
        from_offset: u64,
        to_area: u8,
        to_offset: u64,
        len: u64,
    ) -> Result<()> {
        let mut chunk = vec![0u8; self.work_buf_size];
        let mut done = 0;
        while done < len {
            let n = chunk.len().min((len - done) as usize);
            self.read(from_area, from_offset + done, &mut chunk[..n])?;
            self.program(to_area, to_offset + done, &chunk[..n])?;
            done += n as u64;
        }
        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Device address of an Area offset, bounds-checked against the Area
    fn address(&self, area: u8, offset: u64, len: u64) -> Result<u64> {
        if area >= NUM_AREAS || offset + len > self.layout.area_size {
            return Err(TdbError::InvalidArgument(format!(
                "access to area {} at {:#x}+{} is outside the area",
                area, offset, len
            )));
        }
        Ok(area as u64 * self.layout.area_size + offset)
    }
}
