//! Heap Block Device
//!
//! RAM-backed device with flash geometry. Used by tests and benchmarks.

use super::{check_access, BlockDevice, DeviceError, DeviceResult};

/// Block device backed by a `Vec<u8>`
#[derive(Debug, Clone)]
pub struct HeapBlockDevice {
    data: Vec<u8>,
    program_size: u64,
    erase_size: u64,
    erase_value: u8,
}

impl HeapBlockDevice {
    /// Create an erased device of `size` bytes.
    ///
    /// `size` must be a multiple of `erase_size`, which must be a multiple
    /// of `program_size`.
    pub fn new(size: u64, erase_size: u64, program_size: u64) -> DeviceResult<Self> {
        if program_size == 0 || erase_size == 0 || erase_size % program_size != 0 {
            return Err(DeviceError::Misaligned {
                addr: 0,
                len: erase_size,
            });
        }
        if size % erase_size != 0 {
            return Err(DeviceError::Misaligned { addr: 0, len: size });
        }
        Ok(Self {
            data: vec![0xFF; size as usize],
            program_size,
            erase_size,
            erase_value: 0xFF,
        })
    }

    /// Raw device contents
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Raw device contents, writable without erase or alignment rules.
    /// Used to inject corruption.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl BlockDevice for HeapBlockDevice {
    fn read(&mut self, addr: u64, buf: &mut [u8]) -> DeviceResult<()> {
        check_access(self.size(), 1, addr, buf.len() as u64)?;
        let start = addr as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    fn program(&mut self, addr: u64, buf: &[u8]) -> DeviceResult<()> {
        check_access(self.size(), self.program_size, addr, buf.len() as u64)?;
        let start = addr as usize;
        self.data[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn erase(&mut self, addr: u64, len: u64) -> DeviceResult<()> {
        check_access(self.size(), self.erase_size, addr, len)?;
        let start = addr as usize;
        self.data[start..start + len as usize].fill(self.erase_value);
        Ok(())
    }

    fn program_size(&self) -> u64 {
        self.program_size
    }

    fn erase_size(&self) -> u64 {
        self.erase_size
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn erase_value(&self) -> u8 {
        self.erase_value
    }
}
