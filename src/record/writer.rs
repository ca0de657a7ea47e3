//! Record Writer
//!
//! Streams a record into space that was already reserved and erased.
//!
//! The first program-aligned block (which holds the header) stays in RAM
//! and is programmed after every other byte of the record. Until then the
//! header reads as erased, so a power loss mid-record can only ever leave
//! an unreadable tail.

use bytes::BytesMut;

use crate::area::AreaManager;
use crate::device::BlockDevice;
use crate::error::{Result, TdbError};

use super::{align_up, RecordHeader, HEADER_SIZE};

/// In-progress record write
#[derive(Debug)]
pub struct RecordWriter {
    area: u8,
    offset: u64,
    total_size: u64,
    header: RecordHeader,
    /// First program-aligned block, header included
    head: Vec<u8>,
    /// Bytes past `head` not yet programmed
    staging: BytesMut,
    /// Program granularity of staged flushes
    chunk: usize,
    /// Record-relative offset of the next staged flush
    flushed: u64,
    /// Record-relative count of bytes accepted so far
    cursor: u64,
    /// CRC over key and data
    body: crc32fast::Hasher,
    data_written: usize,
}

impl RecordWriter {
    /// Start a record at `offset` and stream its key.
    ///
    /// The caller has reserved `header.record_size()` bytes at `offset` and
    /// made sure they are erased.
    pub fn begin<D: BlockDevice>(
        areas: &mut AreaManager<D>,
        area: u8,
        offset: u64,
        header: RecordHeader,
        key: &[u8],
    ) -> Result<Self> {
        let program_size = areas.layout().program_size;
        let head_len = align_up(HEADER_SIZE as u64, program_size) as usize;
        let chunk = areas.work_buf_size();

        let mut writer = Self {
            area,
            offset,
            total_size: header.record_size(program_size),
            header,
            head: vec![0u8; head_len],
            staging: BytesMut::with_capacity(chunk * 2),
            chunk,
            flushed: head_len as u64,
            cursor: HEADER_SIZE as u64,
            body: crc32fast::Hasher::new(),
            data_written: 0,
        };

        writer.body.update(key);
        writer.push(areas, key)?;
        Ok(writer)
    }

    /// Append data bytes.
    pub fn append<D: BlockDevice>(&mut self, areas: &mut AreaManager<D>, data: &[u8]) -> Result<()> {
        if data.len() > self.data_remaining() {
            return Err(TdbError::InvalidSize(format!(
                "{} bytes exceed the {} bytes left in the record",
                data.len(),
                self.data_remaining()
            )));
        }
        self.body.update(data);
        self.data_written += data.len();
        self.push(areas, data)
    }

    /// Data bytes still expected before the record is complete
    pub fn data_remaining(&self) -> usize {
        self.header.data_size as usize - self.data_written
    }

    /// Offset of the record in its Area
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    /// Commit the record: flush the tail, then program the header block.
    ///
    /// Every declared data byte must have been appended.
    pub fn finish<D: BlockDevice>(mut self, areas: &mut AreaManager<D>) -> Result<RecordHeader> {
        if self.data_remaining() != 0 {
            return Err(TdbError::InvalidSize(format!(
                "record is missing {} data bytes",
                self.data_remaining()
            )));
        }

        // Pad the head block (tiny records) and then the tail up to alignment
        let head_len = self.head.len() as u64;
        if self.cursor < head_len {
            self.cursor = head_len;
        }
        let padding = (self.total_size - self.cursor) as usize;
        self.staging.resize(self.staging.len() + padding, 0);
        self.cursor = self.total_size;

        if !self.staging.is_empty() {
            let tail = self.staging.split();
            areas.program(self.area, self.offset + self.flushed, &tail)?;
            self.flushed += tail.len() as u64;
        }

        self.header.seal(&self.body);
        self.head[..HEADER_SIZE].copy_from_slice(&self.header.encode());
        areas.program(self.area, self.offset, &self.head)?;

        Ok(self.header)
    }

    /// Commit the reserved space as a discarded record: remaining data is
    /// zero-filled and the record is flagged so the scan skips it.
    pub fn discard<D: BlockDevice>(
        mut self,
        areas: &mut AreaManager<D>,
        discard_flag: u32,
    ) -> Result<RecordHeader> {
        let zeros = vec![0u8; self.chunk];
        while self.data_remaining() > 0 {
            let n = zeros.len().min(self.data_remaining());
            self.append(areas, &zeros[..n])?;
        }
        self.header.flags |= discard_flag;
        self.finish(areas)
    }

    /// Route bytes into the head block or the staging buffer, flushing
    /// whole chunks as they fill.
    fn push<D: BlockDevice>(&mut self, areas: &mut AreaManager<D>, mut bytes: &[u8]) -> Result<()> {
        let head_len = self.head.len() as u64;
        if self.cursor < head_len {
            let start = self.cursor as usize;
            let n = (head_len as usize - start).min(bytes.len());
            self.head[start..start + n].copy_from_slice(&bytes[..n]);
            self.cursor += n as u64;
            bytes = &bytes[n..];
        }

        self.staging.extend_from_slice(bytes);
        self.cursor += bytes.len() as u64;

        while self.staging.len() >= self.chunk {
            let block = self.staging.split_to(self.chunk);
            areas.program(self.area, self.offset + self.flushed, &block)?;
            self.flushed += self.chunk as u64;
        }
        Ok(())
    }
}
