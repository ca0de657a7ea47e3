//! File Block Device
//!
//! A flash image kept in a regular file. Lets the CLI keep a store across
//! process runs.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{check_access, BlockDevice, DeviceError, DeviceResult};

/// Block device backed by an image file
#[derive(Debug)]
pub struct FileBlockDevice {
    path: PathBuf,
    file: File,
    size: u64,
    program_size: u64,
    erase_size: u64,
}

impl FileBlockDevice {
    /// Open an existing image, or create an erased one of `size` bytes.
    ///
    /// An existing image keeps its own length; `size` only applies when the
    /// file is created.
    pub fn open(
        path: &Path,
        size: u64,
        erase_size: u64,
        program_size: u64,
    ) -> DeviceResult<Self> {
        if program_size == 0 || erase_size == 0 || erase_size % program_size != 0 {
            return Err(DeviceError::Misaligned {
                addr: 0,
                len: erase_size,
            });
        }

        let existed = path.exists();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let size = if existed {
            file.metadata()?.len()
        } else {
            // Fresh image: every byte starts erased
            let chunk = vec![0xFFu8; erase_size as usize];
            let mut written = 0;
            while written < size {
                let n = chunk.len().min((size - written) as usize);
                file.write_all(&chunk[..n])?;
                written += n as u64;
            }
            file.sync_all()?;
            size
        };

        if size % erase_size != 0 {
            return Err(DeviceError::Misaligned { addr: 0, len: size });
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
            program_size,
            erase_size,
        })
    }

    /// Path of the backing image
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockDevice for FileBlockDevice {
    fn read(&mut self, addr: u64, buf: &mut [u8]) -> DeviceResult<()> {
        check_access(self.size, 1, addr, buf.len() as u64)?;
        self.file.seek(SeekFrom::Start(addr))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn program(&mut self, addr: u64, buf: &[u8]) -> DeviceResult<()> {
        check_access(self.size, self.program_size, addr, buf.len() as u64)?;
        self.file.seek(SeekFrom::Start(addr))?;
        self.file.write_all(buf)?;
        self.file.sync_data()?;
        Ok(())
    }

    fn erase(&mut self, addr: u64, len: u64) -> DeviceResult<()> {
        check_access(self.size, self.erase_size, addr, len)?;
        let chunk = vec![self.erase_value(); self.erase_size as usize];
        self.file.seek(SeekFrom::Start(addr))?;
        let mut erased = 0;
        while erased < len {
            self.file.write_all(&chunk)?;
            erased += self.erase_size;
        }
        self.file.sync_data()?;
        Ok(())
    }

    fn program_size(&self) -> u64 {
        self.program_size
    }

    fn erase_size(&self) -> u64 {
        self.erase_size
    }

    fn size(&self) -> u64 {
        self.size
    }
}
