//! Block Device Module
//!
//! The contract the engine consumes from block-erasable media.
//!
//! ## Responsibilities
//! - Byte-granular reads
//! - Programs aligned to `program_size`
//! - Erases aligned to `erase_size`
//! - Erased bytes read back as `erase_value`
//!
//! The engine never retries a failed device call; errors travel up verbatim
//! as `MediaRead`/`MediaWrite`.

mod file;
mod heap;

use thiserror::Error;

pub use file::FileBlockDevice;
pub use heap::HeapBlockDevice;

/// Result type for device operations
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Errors raised by a block device
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("access out of bounds: addr={addr:#x} len={len}")]
    OutOfBounds { addr: u64, len: u64 },

    #[error("misaligned access: addr={addr:#x} len={len}")]
    Misaligned { addr: u64, len: u64 },

    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Erase/program/read access to a block-erasable device
///
/// Addresses are byte offsets from the start of the device. A device is
/// owned exclusively by one store; nothing else may mutate it concurrently.
pub trait BlockDevice {
    /// Read `buf.len()` bytes starting at `addr`.
    fn read(&mut self, addr: u64, buf: &mut [u8]) -> DeviceResult<()>;

    /// Program `buf` at `addr`. Both must be aligned to `program_size()`,
    /// and the target range must have been erased.
    fn program(&mut self, addr: u64, buf: &[u8]) -> DeviceResult<()>;

    /// Erase `len` bytes at `addr`. Both must be aligned to `erase_size()`.
    fn erase(&mut self, addr: u64, len: u64) -> DeviceResult<()>;

    /// Smallest programmable unit in bytes
    fn program_size(&self) -> u64;

    /// Smallest erasable unit in bytes
    fn erase_size(&self) -> u64;

    /// Total device size in bytes
    fn size(&self) -> u64;

    /// Value every byte reads back as after an erase
    fn erase_value(&self) -> u8 {
        0xFF
    }
}

/// Reject accesses that run past the end of a device or break alignment.
pub(crate) fn check_access(size: u64, align: u64, addr: u64, len: u64) -> DeviceResult<()> {
    if addr.checked_add(len).map_or(true, |end| end > size) {
        return Err(DeviceError::OutOfBounds { addr, len });
    }
    if align > 1 && (addr % align != 0 || len % align != 0) {
        return Err(DeviceError::Misaligned { addr, len });
    }
    Ok(())
}
