//! Record Module
//!
//! The on-flash unit of the log: one (key, value, flags, checksum) tuple.
//!
//! ## Responsibilities
//! - Fixed-layout record header
//! - Program-size aligned record sizing
//! - Checksum (CRC32) over header, key and data
//! - Key validation and key hashing for the RAM index
//! - Streaming reads that can skip, copy or verify the payload
//! - Streaming writes that commit the header last
//!
//! ## Record Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (24 bytes, little-endian)                             │
//! │ ┌─────────┬────────┬────────┬─────────┬────────┬──────┬────┐ │
//! │ │Magic (4)│HdrSz(2)│ Rev (2)│Flags (4)│KeyLen 2│Rsv(2)│... │ │
//! │ └─────────┴────────┴────────┴─────────┴────────┴──────┴────┘ │
//! │   ... DataLen (4) │ CRC (4)                                  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Key bytes (KeyLen)                                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Data bytes (DataLen)                                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Padding up to program size                                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! CRC covers header bytes 0..20, then key, then data.

mod header;
mod reader;
mod writer;

use std::ops::BitOr;

use crate::error::{Result, TdbError};

pub use header::RecordHeader;
pub use reader::{read_record, ReadRequest, RecordInfo};
pub use writer::RecordWriter;

// =============================================================================
// Format Constants
// =============================================================================

/// Magic number opening every record header ("TDBR")
pub const RECORD_MAGIC: u32 = 0x5444_4252;

/// Size of the encoded record header
pub const HEADER_SIZE: usize = 24;

/// Offset of the CRC field inside the header
pub const CRC_OFFSET: usize = 20;

/// Current record layout revision
pub const RECORD_REVISION: u16 = 1;

/// Maximum key length in bytes
pub const MAX_KEY_SIZE: usize = 128;

/// Characters a key may not contain
pub const INVALID_KEY_CHARS: &[char] = &['*', '/', '?', ':', ';', '"', '|', ' ', '<', '>', '\\'];

// =============================================================================
// Flags
// =============================================================================

/// Record is a tombstone
pub(crate) const FLAG_DELETE: u32 = 1 << 7;

/// Record belongs to an abandoned incremental set and carries no value
pub(crate) const FLAG_DISCARDED: u32 = 1 << 6;

/// Caller-visible creation flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CreateFlags(u32);

impl CreateFlags {
    /// Key can be written once and never modified or removed
    pub const WRITE_ONCE: CreateFlags = CreateFlags(1 << 0);

    const SUPPORTED: u32 = Self::WRITE_ONCE.0;

    pub const fn empty() -> Self {
        CreateFlags(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Build from raw bits, rejecting anything this store does not support.
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !Self::SUPPORTED != 0 {
            return Err(TdbError::InvalidArgument(format!(
                "unsupported create flags {:#x}",
                bits
            )));
        }
        Ok(CreateFlags(bits))
    }

    /// Keep only the caller-visible bits of on-flash flags.
    pub(crate) fn from_record_flags(flags: u32) -> Self {
        CreateFlags(flags & Self::SUPPORTED)
    }

    pub const fn contains(self, other: CreateFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CreateFlags {
    type Output = CreateFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        CreateFlags(self.0 | rhs.0)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Round `value` up to a multiple of `align`, saturating at `u64::MAX`
pub fn align_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        return value;
    }
    value.div_ceil(align).saturating_mul(align)
}

/// On-flash footprint of a record: header + key + data, padded to `program_size`.
///
/// Saturates instead of overflowing, so an absurd size still compares as
/// larger than any Area.
pub fn record_size(key_len: usize, data_len: usize, program_size: u64) -> u64 {
    let unpadded = (HEADER_SIZE as u64)
        .saturating_add(key_len as u64)
        .saturating_add(data_len as u64);
    align_up(unpadded, program_size)
}

/// 32-bit hash used by the RAM index
pub fn key_hash(key: &[u8]) -> u32 {
    crc32fast::hash(key)
}

/// Check a caller key: non-empty, at most `MAX_KEY_SIZE` bytes, no reserved characters.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(TdbError::InvalidArgument("key is empty".to_string()));
    }
    if key.len() > MAX_KEY_SIZE {
        return Err(TdbError::InvalidArgument(format!(
            "key is {} bytes, max is {}",
            key.len(),
            MAX_KEY_SIZE
        )));
    }
    if let Some(c) = key.chars().find(|c| INVALID_KEY_CHARS.contains(c)) {
        return Err(TdbError::InvalidArgument(format!(
            "key contains reserved character {:?}",
            c
        )));
    }
    Ok(())
}
