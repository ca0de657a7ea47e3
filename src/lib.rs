//! # tdbstore
//!
//! A log-structured key/value store for block-erasable flash, with:
//! - Two-area ping-pong log with versioned Master Records
//! - CRC32-checked, program-size aligned records
//! - Recovery from torn writes at the log tail
//! - Garbage collection by compaction into the standby area
//! - Write-once keys and a write-once Reserved Slot
//! - Prefix iteration and streamed (incremental) writes
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TdbStore (façade)                       │
//! │        set / get / remove / iterate / set_start / ...       │
//! └──────────┬───────────────────────────────┬──────────────────┘
//!            │                               │
//!            ▼                               ▼
//!   ┌─────────────────┐             ┌─────────────────┐
//!   │    RAM Index    │             │ Garbage Collector│
//!   │ (hash, offset)  │             │ active → standby │
//!   └────────┬────────┘             └────────┬────────┘
//!            │                               │
//!            ▼                               ▼
//!   ┌─────────────────────────────────────────────────┐
//!   │   Record Codec  (header │ key │ data │ pad)     │
//!   └────────────────────────┬────────────────────────┘
//!                            ▼
//!   ┌─────────────────────────────────────────────────┐
//!   │   Area Manager  (Area 0 │ Area 1, Master Recs)  │
//!   └────────────────────────┬────────────────────────┘
//!                            ▼
//!   ┌─────────────────────────────────────────────────┐
//!   │   BlockDevice  (erase / program / read)         │
//!   └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use tdbstore::{CreateFlags, HeapBlockDevice, TdbStore};
//!
//! let device = HeapBlockDevice::new(64 * 1024, 4096, 8).unwrap();
//! let store = TdbStore::with_device(device).unwrap();
//! store.init().unwrap();
//!
//! store.set("key", b"data\0", CreateFlags::empty()).unwrap();
//! let mut buf = [0u8; 100];
//! let size = store.get("key", &mut buf, 0).unwrap();
//! assert_eq!(&buf[..size], b"data\0");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod device;
pub mod record;
pub mod area;
pub mod index;
pub mod store;
pub mod kv;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, TdbError};
pub use config::Config;
pub use device::{BlockDevice, DeviceError, FileBlockDevice, HeapBlockDevice};
pub use kv::{IncrementalWrite, KeyIter, KvStore};
pub use record::CreateFlags;
pub use store::{IncrementalSet, KeyIterator, KvInfo, StoreStats, TdbStore};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tdbstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
