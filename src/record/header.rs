//! Record header encoding

use super::{
    record_size, CreateFlags, CRC_OFFSET, FLAG_DELETE, FLAG_DISCARDED, HEADER_SIZE, MAX_KEY_SIZE,
    RECORD_MAGIC, RECORD_REVISION,
};

/// Decoded record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub magic: u32,
    pub header_size: u16,
    pub revision: u16,
    pub flags: u32,
    pub key_size: u16,
    pub data_size: u32,
    pub crc: u32,
}

impl RecordHeader {
    /// Header for a new record; the CRC is filled in when the record is committed.
    pub fn new(flags: u32, key_size: usize, data_size: usize) -> Self {
        Self {
            magic: RECORD_MAGIC,
            header_size: HEADER_SIZE as u16,
            revision: RECORD_REVISION,
            flags,
            key_size: key_size as u16,
            data_size: data_size as u32,
            crc: 0,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..6].copy_from_slice(&self.header_size.to_le_bytes());
        buf[6..8].copy_from_slice(&self.revision.to_le_bytes());
        buf[8..12].copy_from_slice(&self.flags.to_le_bytes());
        buf[12..14].copy_from_slice(&self.key_size.to_le_bytes());
        // 14..16 reserved, left zero
        buf[16..20].copy_from_slice(&self.data_size.to_le_bytes());
        buf[20..24].copy_from_slice(&self.crc.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([buf[i], buf[i + 1]]);
        let u32_at = |i: usize| u32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        Self {
            magic: u32_at(0),
            header_size: u16_at(4),
            revision: u16_at(6),
            flags: u32_at(8),
            key_size: u16_at(12),
            data_size: u32_at(16),
            crc: u32_at(20),
        }
    }

    /// Structural check; does not look at the payload.
    pub fn is_well_formed(&self) -> bool {
        self.magic == RECORD_MAGIC
            && self.header_size as usize == HEADER_SIZE
            && self.revision == RECORD_REVISION
            && self.key_size > 0
            && self.key_size as usize <= MAX_KEY_SIZE
    }

    /// CRC of the header prefix (everything before the CRC field)
    pub fn prefix_hasher(&self) -> crc32fast::Hasher {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.encode()[..CRC_OFFSET]);
        hasher
    }

    /// Fold a key+data checksum into the header checksum.
    pub fn seal(&mut self, body: &crc32fast::Hasher) {
        let mut hasher = self.prefix_hasher();
        hasher.combine(body);
        self.crc = hasher.finalize();
    }

    pub fn record_size(&self, program_size: u64) -> u64 {
        record_size(self.key_size as usize, self.data_size as usize, program_size)
    }

    pub fn is_tombstone(&self) -> bool {
        self.flags & FLAG_DELETE != 0
    }

    pub fn is_discarded(&self) -> bool {
        self.flags & FLAG_DISCARDED != 0
    }

    pub fn create_flags(&self) -> CreateFlags {
        CreateFlags::from_record_flags(self.flags)
    }
}
