//! Error types for tdbstore
//!
//! Every layer owns its error enum. Device failures cross into the engine
//! through [`TdbError::read`] and [`TdbError::write`], since the same
//! [`DeviceError`] means a read failure or a write failure depending on the
//! call that produced it.

use thiserror::Error;

use crate::device::DeviceError;

/// Result type alias using TdbError
pub type Result<T> = std::result::Result<T, TdbError>;

/// Unified error type for store operations
#[derive(Debug, Error)]
pub enum TdbError {
    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Store is not initialized")]
    NotReady,

    // -------------------------------------------------------------------------
    // Media Errors
    // -------------------------------------------------------------------------
    #[error("Media read failed: {0}")]
    MediaRead(#[source] DeviceError),

    #[error("Media write failed: {0}")]
    MediaWrite(#[source] DeviceError),

    #[error("Media full")]
    MediaFull,

    // -------------------------------------------------------------------------
    // Caller Contract Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    // -------------------------------------------------------------------------
    // Data Errors
    // -------------------------------------------------------------------------
    #[error("Item not found")]
    ItemNotFound,

    #[error("Data corruption detected: {0}")]
    DataCorrupt(String),

    // -------------------------------------------------------------------------
    // Write-Once Errors
    // -------------------------------------------------------------------------
    /// A write-once key was the target of `set` or `remove`.
    #[error("Item is write protected")]
    WriteProtected,

    /// The reserved slot already holds data.
    #[error("Reserved area already written")]
    ReservedAreaWritten,
}

impl TdbError {
    /// Wrap a device error raised by a read.
    pub fn read(err: DeviceError) -> Self {
        TdbError::MediaRead(err)
    }

    /// Wrap a device error raised by a program or erase.
    pub fn write(err: DeviceError) -> Self {
        TdbError::MediaWrite(err)
    }

    /// True for both flavours of write-once denial.
    pub fn is_write_protection(&self) -> bool {
        matches!(self, TdbError::WriteProtected | TdbError::ReservedAreaWritten)
    }

    /// True for physical I/O failures reported by the device.
    pub fn is_media_error(&self) -> bool {
        matches!(self, TdbError::MediaRead(_) | TdbError::MediaWrite(_))
    }
}
