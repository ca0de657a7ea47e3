//! Index Module
//!
//! In-memory map from live keys to their current record offsets.
//!
//! ## Responsibilities
//! - One entry per live key: (key hash, record offset)
//! - Entries kept sorted by hash, so equal hashes are adjacent
//! - Capacity doubles when full and never shrinks during a session
//!
//! The table only stores hashes. Two keys can share a hash, so identity is
//! always settled by comparing the key bytes stored on flash; that check
//! lives with the store, which owns the device.

mod table;

pub use table::{RamEntry, RamTable};
