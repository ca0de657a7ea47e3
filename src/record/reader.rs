//! Record Reader
//!
//! Reads one record from an Area. The caller decides how much of it to
//! touch: the RAM-table scan only needs the hash and the next offset, a
//! `get` needs a window of the data, a key lookup needs the key bytes.

use crate::area::AreaManager;
use crate::device::BlockDevice;
use crate::error::{Result, TdbError};

use super::{key_hash, RecordHeader, HEADER_SIZE};

/// What `read_record` should do beyond decoding the header
#[derive(Debug, Default)]
pub struct ReadRequest<'a> {
    /// Return the key bytes in `RecordInfo::key`
    pub copy_key: bool,

    /// Recompute the CRC over the whole record and fail on mismatch
    pub verify: bool,

    /// Copy data bytes starting at the given data offset into the buffer
    pub data: Option<(&'a mut [u8], usize)>,
}

impl<'a> ReadRequest<'a> {
    /// Scan mode: verify, no copies
    pub fn verify() -> Self {
        Self {
            verify: true,
            ..Self::default()
        }
    }

    /// Key lookup mode: copy the key, no verification
    pub fn key() -> Self {
        Self {
            copy_key: true,
            ..Self::default()
        }
    }
}

/// Result of reading one record
#[derive(Debug, Clone)]
pub struct RecordInfo {
    pub header: RecordHeader,
    /// Key bytes, empty unless `copy_key` was requested
    pub key: Vec<u8>,
    /// RAM-index hash of the key
    pub hash: u32,
    /// Offset right after this record (program-size aligned)
    pub next_offset: u64,
    /// Number of data bytes copied into the caller buffer
    pub copied: usize,
}

/// Read the record at `offset` in `area`.
///
/// `limit` is the first offset that does not belong to the log (the free
/// space offset during normal operation, the Area end while scanning).
/// Structural violations and checksum mismatches come back as
/// `DataCorrupt`; the caller decides whether that is fatal.
pub fn read_record<D: BlockDevice>(
    areas: &mut AreaManager<D>,
    area: u8,
    offset: u64,
    limit: u64,
    request: ReadRequest<'_>,
) -> Result<RecordInfo> {
    let program_size = areas.layout().program_size;

    // Step 1: Header
    if offset + HEADER_SIZE as u64 > limit {
        return Err(TdbError::DataCorrupt(format!(
            "record header at {:#x} runs past {:#x}",
            offset, limit
        )));
    }
    let mut raw = [0u8; HEADER_SIZE];
    areas.read(area, offset, &mut raw)?;
    let header = RecordHeader::decode(&raw);

    if !header.is_well_formed() {
        return Err(TdbError::DataCorrupt(format!(
            "malformed record header at {:#x}",
            offset
        )));
    }

    let size = header.record_size(program_size);
    if offset + size > limit {
        return Err(TdbError::DataCorrupt(format!(
            "record at {:#x} of {} bytes runs past {:#x}",
            offset, size, limit
        )));
    }

    // Step 2: Key (always read, the index needs its hash)
    let mut key = vec![0u8; header.key_size as usize];
    let key_offset = offset + HEADER_SIZE as u64;
    areas.read(area, key_offset, &mut key)?;
    let hash = key_hash(&key);

    let mut body = crc32fast::Hasher::new();
    if request.verify {
        body.update(&key);
    }

    // Step 3: Data
    let data_offset = key_offset + header.key_size as u64;
    let data_size = header.data_size as usize;
    let mut copied = 0;

    let (mut out, window_start) = match request.data {
        Some((buf, start)) => {
            if start > data_size {
                return Err(TdbError::InvalidSize(format!(
                    "offset {} past data size {}",
                    start, data_size
                )));
            }
            (Some(buf), start)
        }
        None => (None, 0),
    };

    if request.verify {
        // Stream everything through the hasher, copying the window on the way
        let mut chunk = vec![0u8; areas.work_buf_size()];
        let mut pos = 0;
        while pos < data_size {
            let n = chunk.len().min(data_size - pos);
            areas.read(area, data_offset + pos as u64, &mut chunk[..n])?;
            body.update(&chunk[..n]);

            if let Some(buf) = out.as_deref_mut() {
                let window_end = window_start + buf.len();
                let lo = pos.max(window_start);
                let hi = (pos + n).min(window_end);
                if lo < hi {
                    buf[lo - window_start..hi - window_start]
                        .copy_from_slice(&chunk[lo - pos..hi - pos]);
                    copied += hi - lo;
                }
            }
            pos += n;
        }

        let mut sealed = header;
        sealed.seal(&body);
        if sealed.crc != header.crc {
            return Err(TdbError::DataCorrupt(format!(
                "checksum mismatch at {:#x}: stored {:#010x}, computed {:#010x}",
                offset, header.crc, sealed.crc
            )));
        }
    } else if let Some(buf) = out {
        let n = buf.len().min(data_size - window_start);
        areas.read(area, data_offset + window_start as u64, &mut buf[..n])?;
        copied = n;
    }

    Ok(RecordInfo {
        header,
        key: if request.copy_key { key } else { Vec::new() },
        hash,
        next_offset: offset + size,
        copied,
    })
}
