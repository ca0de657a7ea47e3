//! Reserved Slot
//!
//! A fixed-size, write-once region at the start of each Area, outside the
//! record log. Both Areas carry a copy; GC carries it across.

use serde::{Deserialize, Serialize};

use crate::device::BlockDevice;
use crate::error::{Result, TdbError};

use super::AreaManager;

/// Capacity of the Reserved Slot
pub const RESERVED_AREA_SIZE: usize = 64;

/// Encoded size of `ReservedTrailer`
pub const RESERVED_TRAILER_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ReservedTrailer {
    trailer_size: u16,
    data_size: u16,
    crc: u32,
}

/// Contents of one Area's Reserved Slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservedSlot {
    /// Never written
    Empty,
    /// Written and checksum-valid
    Valid(Vec<u8>),
    /// Written, but the trailer or checksum does not hold up
    Corrupt,
}

impl ReservedSlot {
    /// True if the slot holds anything, valid or not
    pub fn is_occupied(&self) -> bool {
        !matches!(self, ReservedSlot::Empty)
    }
}

pub fn read_reserved<D: BlockDevice>(areas: &mut AreaManager<D>, area: u8) -> Result<ReservedSlot> {
    let erase_value = areas.layout().erase_value;
    let mut raw = [0u8; RESERVED_AREA_SIZE + RESERVED_TRAILER_SIZE];
    areas.read(area, 0, &mut raw)?;

    if raw.iter().all(|&b| b == erase_value) {
        return Ok(ReservedSlot::Empty);
    }

    let trailer = match bincode::deserialize::<ReservedTrailer>(&raw[RESERVED_AREA_SIZE..]) {
        Ok(trailer) => trailer,
        Err(_) => return Ok(ReservedSlot::Corrupt),
    };

    let size = trailer.data_size as usize;
    if trailer.trailer_size as usize != RESERVED_TRAILER_SIZE || size > RESERVED_AREA_SIZE {
        return Ok(ReservedSlot::Corrupt);
    }

    let data = &raw[..size];
    if crc32fast::hash(data) != trailer.crc {
        return Ok(ReservedSlot::Corrupt);
    }

    Ok(ReservedSlot::Valid(data.to_vec()))
}

/// Program the slot of an Area whose slot region is erased.
pub fn write_reserved<D: BlockDevice>(areas: &mut AreaManager<D>, area: u8, data: &[u8]) -> Result<()> {
    if data.len() > RESERVED_AREA_SIZE {
        return Err(TdbError::InvalidSize(format!(
            "reserved data is {} bytes, max is {}",
            data.len(),
            RESERVED_AREA_SIZE
        )));
    }

    let layout = *areas.layout();
    let trailer = bincode::serialize(&ReservedTrailer {
        trailer_size: RESERVED_TRAILER_SIZE as u16,
        data_size: data.len() as u16,
        crc: crc32fast::hash(data),
    })
    .map_err(|e| TdbError::InvalidArgument(format!("reserved trailer encoding: {}", e)))?;

    // Slot, trailer and alignment padding go out in one program
    let mut block = vec![layout.erase_value; layout.master_offset as usize];
    block[..data.len()].copy_from_slice(data);
    block[RESERVED_AREA_SIZE..RESERVED_AREA_SIZE + RESERVED_TRAILER_SIZE].copy_from_slice(&trailer);

    areas.program(area, 0, &block)
}

/// Carry the raw slot from one Area to another whose slot region is erased.
pub fn copy_reserved<D: BlockDevice>(areas: &mut AreaManager<D>, from: u8, to: u8) -> Result<()> {
    let len = areas.layout().master_offset;
    if areas.is_erased(from, 0, len)? {
        return Ok(());
    }
    areas.copy(from, 0, to, 0, len)
}
