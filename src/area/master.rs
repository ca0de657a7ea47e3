//! Master Record
//!
//! The header record at the start of each Area's log. A valid Master Record
//! marks its Area as holding a usable log; the higher version (modulo 2^16)
//! marks the active one.

use serde::{Deserialize, Serialize};

use crate::device::BlockDevice;
use crate::error::{Result, TdbError};
use crate::record::{read_record, ReadRequest, RecordHeader, RecordWriter};

use super::AreaManager;

/// Key of the Master Record
pub const MASTER_KEY: &[u8] = b"TDBS";

/// Encoded size of `MasterRecordData`
pub const MASTER_DATA_SIZE: usize = 4;

/// Layout revision written into every Master Record
const FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct MasterRecordData {
    version: u16,
    format_version: u16,
}

/// Write a Master Record carrying `version` into an Area whose first erase
/// unit is erased.
pub fn write_master<D: BlockDevice>(areas: &mut AreaManager<D>, area: u8, version: u16) -> Result<()> {
    let data = bincode::serialize(&MasterRecordData {
        version,
        format_version: FORMAT_VERSION,
    })
    .map_err(|e| TdbError::InvalidArgument(format!("master record encoding: {}", e)))?;

    let offset = areas.layout().master_offset;
    let header = RecordHeader::new(0, MASTER_KEY.len(), data.len());
    let mut writer = RecordWriter::begin(areas, area, offset, header, MASTER_KEY)?;
    writer.append(areas, &data)?;
    writer.finish(areas)?;
    Ok(())
}

/// Read an Area's Master Record.
///
/// Returns `None` when it is missing or corrupt. Device errors propagate.
pub fn read_master<D: BlockDevice>(areas: &mut AreaManager<D>, area: u8) -> Result<Option<u16>> {
    let layout = *areas.layout();
    let mut data = [0u8; MASTER_DATA_SIZE];

    let request = ReadRequest {
        copy_key: true,
        verify: true,
        data: Some((&mut data[..], 0)),
    };
    let info = match read_record(areas, area, layout.master_offset, layout.first_record_offset, request) {
        Ok(info) => info,
        Err(TdbError::DataCorrupt(_)) => return Ok(None),
        Err(e) => return Err(e),
    };

    if info.key != MASTER_KEY || info.header.data_size as usize != MASTER_DATA_SIZE {
        return Ok(None);
    }

    match bincode::deserialize::<MasterRecordData>(&data) {
        Ok(master) if master.format_version == FORMAT_VERSION => Ok(Some(master.version)),
        _ => Ok(None),
    }
}

/// True if version `a` is newer than version `b`.
///
/// Versions are compared as serial numbers: `b + 1` is newer than `b`, which
/// keeps the order right across the `u16::MAX` → `0` wraparound. The two
/// Areas never drift apart by more than one GC, so the half-range window is
/// never reached.
pub fn is_newer_version(a: u16, b: u16) -> bool {
    (a.wrapping_sub(b) as i16) > 0
}
