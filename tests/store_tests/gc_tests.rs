//! Tests for garbage collection and recovery
//!
//! These tests verify:
//! - Sustained churn triggers GC instead of MediaFull
//! - MediaFull when live data no longer fits
//! - Area selection from the two Master Records
//! - Recovery from torn writes at the log tail
//! - Reset

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tdbstore::area::is_newer_version;
use tdbstore::device::DeviceResult;
use tdbstore::{BlockDevice, CreateFlags, DeviceError, HeapBlockDevice, TdbError, TdbStore};

// =============================================================================
// Helper Functions
// =============================================================================

const DEVICE_SIZE: u64 = 64 * 1024;
const AREA_SIZE: usize = 32 * 1024;

fn new_device() -> HeapBlockDevice {
    HeapBlockDevice::new(DEVICE_SIZE, 4096, 8).unwrap()
}

fn open_on(device: HeapBlockDevice) -> TdbStore<HeapBlockDevice> {
    let store = TdbStore::with_device(device).unwrap();
    store.init().unwrap();
    store
}

fn open_store() -> TdbStore<HeapBlockDevice> {
    open_on(new_device())
}

fn get_string(store: &TdbStore<HeapBlockDevice>, key: &str) -> String {
    String::from_utf8(store.get_vec(key).unwrap()).unwrap()
}

/// Heap device whose erases and reads can be made to fail on demand
struct FlakyDevice {
    inner: HeapBlockDevice,
    fail_erase: Arc<AtomicBool>,
    fail_read: Arc<AtomicBool>,
}

impl FlakyDevice {
    fn new() -> (Self, Arc<AtomicBool>, Arc<AtomicBool>) {
        let fail_erase = Arc::new(AtomicBool::new(false));
        let fail_read = Arc::new(AtomicBool::new(false));
        let device = Self {
            inner: new_device(),
            fail_erase: Arc::clone(&fail_erase),
            fail_read: Arc::clone(&fail_read),
        };
        (device, fail_erase, fail_read)
    }

    fn injected() -> DeviceError {
        DeviceError::Io(std::io::Error::new(std::io::ErrorKind::Other, "injected"))
    }
}

impl BlockDevice for FlakyDevice {
    fn read(&mut self, addr: u64, buf: &mut [u8]) -> DeviceResult<()> {
        if self.fail_read.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.read(addr, buf)
    }

    fn program(&mut self, addr: u64, buf: &[u8]) -> DeviceResult<()> {
        self.inner.program(addr, buf)
    }

    fn erase(&mut self, addr: u64, len: u64) -> DeviceResult<()> {
        if self.fail_erase.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.erase(addr, len)
    }

    fn program_size(&self) -> u64 {
        self.inner.program_size()
    }

    fn erase_size(&self) -> u64 {
        self.inner.erase_size()
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }
}

// =============================================================================
// Churn Tests
// =============================================================================

#[test]
fn test_churn_triggers_gc() {
    let store = open_store();
    let value = [0x5Au8; 100];

    for i in 0..1000 {
        let key = format!("key_{}", i % 20);
        store.set(&key, &value, CreateFlags::empty()).unwrap();
        if i % 7 == 0 {
            store.remove(&key).unwrap();
        }
    }

    let stats = store.stats().unwrap();
    assert!(stats.gc_count > 0);
    assert!(stats.free_space_offset <= stats.area_size);

    for i in 980..1000 {
        let key = format!("key_{}", i % 20);
        if i % 7 == 0 {
            assert!(matches!(store.get_info(&key), Err(TdbError::ItemNotFound)));
        } else {
            assert_eq!(store.get_vec(&key).unwrap(), value);
        }
    }
}

#[test]
fn test_gc_preserves_values_across_power_cycle() {
    let store = open_store();
    for round in 0..50 {
        for k in 0..10 {
            let value = format!("round {} key {}", round, k);
            store.set(&format!("k{}", k), value.as_bytes(), CreateFlags::empty()).unwrap();
        }
    }
    assert!(store.stats().unwrap().gc_count > 0);

    let store = open_on(store.into_device());
    assert_eq!(store.stats().unwrap().num_keys, 10);
    for k in 0..10 {
        assert_eq!(get_string(&store, &format!("k{}", k)), format!("round 49 key {}", k));
    }
}

#[test]
fn test_compact_flips_area_and_bumps_version() {
    let store = open_store();
    store.set("a", b"1", CreateFlags::WRITE_ONCE).unwrap();
    store.set("b", b"2", CreateFlags::empty()).unwrap();
    store.set("b", b"3", CreateFlags::empty()).unwrap();
    let before = store.stats().unwrap();

    store.compact().unwrap();
    let after = store.stats().unwrap();

    assert_eq!(after.active_area, 1 - before.active_area);
    assert_eq!(after.version, before.version + 1);
    assert_eq!(after.gc_count, before.gc_count + 1);
    assert!(after.free_space_offset < before.free_space_offset);

    assert_eq!(get_string(&store, "a"), "1");
    assert_eq!(get_string(&store, "b"), "3");
    assert!(matches!(
        store.set("a", b"x", CreateFlags::empty()),
        Err(TdbError::WriteProtected)
    ));

    // The new area is picked up again after a restart
    let store = open_on(store.into_device());
    assert_eq!(store.stats().unwrap().active_area, after.active_area);
    assert_eq!(store.stats().unwrap().version, after.version);
}

#[test]
fn test_media_full_when_live_data_does_not_fit() {
    let store = open_store();
    let value = vec![0x11u8; 1000];

    let mut stored = 0;
    let err = loop {
        match store.set(&format!("big_{}", stored), &value, CreateFlags::empty()) {
            Ok(()) => stored += 1,
            Err(e) => break e,
        }
        assert!(stored < 100, "area never filled up");
    };

    assert!(matches!(err, TdbError::MediaFull));
    assert!(store.is_ready());
    for i in 0..stored {
        assert_eq!(store.get_vec(&format!("big_{}", i)).unwrap(), value);
    }

    // Freeing space makes room again
    store.remove("big_0").unwrap();
    store.set("after", &value, CreateFlags::empty()).unwrap();
}

// =============================================================================
// Area Selection Tests
// =============================================================================

#[test]
fn test_version_comparison_wraps() {
    assert!(is_newer_version(2, 1));
    assert!(!is_newer_version(1, 2));
    assert!(is_newer_version(0, u16::MAX));
    assert!(!is_newer_version(u16::MAX, 0));
    assert!(!is_newer_version(5, 5));
}

#[test]
fn test_garbage_in_standby_area_is_ignored() {
    let store = open_store();
    store.set("key", b"value", CreateFlags::empty()).unwrap();

    let mut device = store.into_device();
    device.as_mut_slice()[AREA_SIZE..].fill(0x00);

    let store = open_on(device);
    assert_eq!(store.stats().unwrap().active_area, 0);
    assert_eq!(get_string(&store, "key"), "value");

    // GC erases the standby area before using it
    store.compact().unwrap();
    assert_eq!(store.stats().unwrap().active_area, 1);
    assert_eq!(get_string(&store, "key"), "value");
}

#[test]
fn test_interrupted_gc_picks_newer_area() {
    let store = open_store();
    store.set("key", b"old", CreateFlags::empty()).unwrap();
    let before = store.into_device();

    // Finish a GC on a copy, then put the pre-GC area 0 back: both masters valid
    let store = open_on(before.clone());
    store.set("key", b"new", CreateFlags::empty()).unwrap();
    store.compact().unwrap();
    let mut device = store.into_device();
    device.as_mut_slice()[..AREA_SIZE].copy_from_slice(&before.as_slice()[..AREA_SIZE]);

    let store = open_on(device);
    let stats = store.stats().unwrap();
    assert_eq!(stats.active_area, 1);
    assert_eq!(stats.version, 2);
    assert_eq!(get_string(&store, "key"), "new");

    // The stale master was erased
    let mut device = store.into_device();
    let mut head = [0u8; 4096];
    device.read(0, &mut head).unwrap();
    assert!(head.iter().all(|&b| b == 0xFF));

    let store = open_on(device);
    assert_eq!(store.stats().unwrap().active_area, 1);
    assert_eq!(get_string(&store, "key"), "new");
}

// =============================================================================
// Torn Write Tests
// =============================================================================

#[test]
fn test_corrupt_last_record_is_dropped() {
    let store = open_store();
    store.set("a", b"alpha", CreateFlags::empty()).unwrap();
    let tail = store.stats().unwrap().free_space_offset as usize;
    store.set("b", b"bravo", CreateFlags::empty()).unwrap();

    // Flip a data byte of "b" (header 24 bytes, key 1 byte)
    let mut device = store.into_device();
    device.as_mut_slice()[tail + 25] ^= 0xFF;

    let store = open_on(device);
    assert_eq!(get_string(&store, "a"), "alpha");
    assert!(matches!(store.get_info("b"), Err(TdbError::ItemNotFound)));

    // Dirty tail forced a compaction
    assert_eq!(store.stats().unwrap().gc_count, 1);

    store.set("b", b"again", CreateFlags::empty()).unwrap();
    let store = open_on(store.into_device());
    assert_eq!(get_string(&store, "b"), "again");
}

#[test]
fn test_record_without_header_is_dropped() {
    let store = open_store();
    store.set("a", b"alpha", CreateFlags::empty()).unwrap();
    let tail = store.stats().unwrap().free_space_offset as usize;
    store.set("b", &[0x42u8; 200], CreateFlags::empty()).unwrap();

    // Power lost before the header block was programmed
    let mut device = store.into_device();
    device.as_mut_slice()[tail..tail + 24].fill(0xFF);

    let store = open_on(device);
    assert_eq!(get_string(&store, "a"), "alpha");
    assert!(matches!(store.get_info("b"), Err(TdbError::ItemNotFound)));
    assert_eq!(store.stats().unwrap().num_keys, 1);
}

#[test]
fn test_corrupt_middle_record_truncates_log() {
    let store = open_store();
    store.set("a", b"alpha", CreateFlags::empty()).unwrap();
    let middle = store.stats().unwrap().free_space_offset as usize;
    store.set("b", b"bravo", CreateFlags::empty()).unwrap();
    store.set("c", b"charlie", CreateFlags::empty()).unwrap();

    let mut device = store.into_device();
    device.as_mut_slice()[middle + 25] ^= 0xFF;

    let store = open_on(device);
    assert_eq!(get_string(&store, "a"), "alpha");
    assert!(matches!(store.get_info("b"), Err(TdbError::ItemNotFound)));
    assert!(matches!(store.get_info("c"), Err(TdbError::ItemNotFound)));
}

// =============================================================================
// Device Failure Tests
// =============================================================================

#[test]
fn test_gc_failure_is_fatal_until_reinit() {
    let (device, fail_erase, _) = FlakyDevice::new();
    let store = TdbStore::with_device(device).unwrap();
    store.init().unwrap();
    store.set("key", b"value", CreateFlags::empty()).unwrap();

    fail_erase.store(true, Ordering::SeqCst);
    let err = store.compact().unwrap_err();
    assert!(matches!(err, TdbError::MediaWrite(_)));
    assert!(err.is_media_error());
    assert!(!store.is_ready());
    assert!(matches!(store.get_info("key"), Err(TdbError::NotReady)));

    fail_erase.store(false, Ordering::SeqCst);
    store.init().unwrap();
    let mut buf = [0u8; 8];
    let n = store.get("key", &mut buf, 0).unwrap();
    assert_eq!(&buf[..n], b"value");
}

#[test]
fn test_read_failure_surfaces_at_init() {
    let (device, _, fail_read) = FlakyDevice::new();
    let store = TdbStore::with_device(device).unwrap();
    store.init().unwrap();
    store.deinit().unwrap();

    fail_read.store(true, Ordering::SeqCst);
    assert!(matches!(store.init(), Err(TdbError::MediaRead(_))));
    assert!(!store.is_ready());

    fail_read.store(false, Ordering::SeqCst);
    store.init().unwrap();
}

// =============================================================================
// Reset Tests
// =============================================================================

#[test]
fn test_reset_clears_everything() {
    let store = open_store();
    store.set("a", b"1", CreateFlags::WRITE_ONCE).unwrap();
    store.set("b", b"2", CreateFlags::empty()).unwrap();
    store.compact().unwrap();

    store.reset().unwrap();
    let stats = store.stats().unwrap();
    assert_eq!(stats.num_keys, 0);
    assert_eq!(stats.active_area, 0);
    assert_eq!(stats.version, 1);
    assert!(matches!(store.get_info("a"), Err(TdbError::ItemNotFound)));

    // Write-once keys are gone too
    store.set("a", b"fresh", CreateFlags::empty()).unwrap();

    let store = open_on(store.into_device());
    assert_eq!(get_string(&store, "a"), "fresh");
    assert!(matches!(store.get_info("b"), Err(TdbError::ItemNotFound)));
}

#[test]
fn test_reset_before_init() {
    let store = TdbStore::with_device(new_device()).unwrap();
    store.reset().unwrap();
    assert!(store.is_ready());
    assert_eq!(store.stats().unwrap().num_keys, 0);
}
