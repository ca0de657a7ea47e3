//! Tests for the record codec
//!
//! These tests verify:
//! - Record sizing and program-size alignment
//! - Header encoding layout
//! - Checksum sealing
//! - Key validation rules
//! - Create flag parsing

use tdbstore::record::{
    align_up, key_hash, record_size, validate_key, RecordHeader, CRC_OFFSET, HEADER_SIZE,
    MAX_KEY_SIZE, RECORD_MAGIC,
};
use tdbstore::{CreateFlags, TdbError};

// =============================================================================
// Sizing Tests
// =============================================================================

#[test]
fn test_align_up() {
    assert_eq!(align_up(0, 8), 0);
    assert_eq!(align_up(1, 8), 8);
    assert_eq!(align_up(8, 8), 8);
    assert_eq!(align_up(9, 8), 16);
    assert_eq!(align_up(13, 1), 13);
}

#[test]
fn test_record_size_is_aligned() {
    // 24 header + 3 key + 5 data = 32
    assert_eq!(record_size(3, 5, 8), 32);
    // 24 + 3 + 6 = 33 -> 40
    assert_eq!(record_size(3, 6, 8), 40);
    assert_eq!(record_size(3, 6, 1), 33);
    assert_eq!(record_size(3, 6, 256), 256);
}

#[test]
fn test_record_size_saturates() {
    assert_eq!(align_up(u64::MAX, 8), u64::MAX);
    assert!(record_size(3, usize::MAX, 8) >= u32::MAX as u64);
    assert!(record_size(MAX_KEY_SIZE, u32::MAX as usize, 256) > u32::MAX as u64);
}

// =============================================================================
// Header Tests
// =============================================================================

#[test]
fn test_header_encode_layout() {
    let header = RecordHeader::new(1, 3, 300);
    let raw = header.encode();

    assert_eq!(raw.len(), HEADER_SIZE);
    assert_eq!(&raw[0..4], &RECORD_MAGIC.to_le_bytes());
    assert_eq!(&raw[4..6], &(HEADER_SIZE as u16).to_le_bytes());
    assert_eq!(&raw[8..12], &1u32.to_le_bytes());
    assert_eq!(&raw[12..14], &3u16.to_le_bytes());
    assert_eq!(&raw[14..16], &[0, 0]);
    assert_eq!(&raw[16..20], &300u32.to_le_bytes());

    assert_eq!(RecordHeader::decode(&raw), header);
}

#[test]
fn test_header_well_formed() {
    assert!(RecordHeader::new(0, 3, 0).is_well_formed());

    let erased = RecordHeader::decode(&[0xFF; HEADER_SIZE]);
    assert!(!erased.is_well_formed());

    assert!(!RecordHeader::new(0, 0, 4).is_well_formed());
    assert!(!RecordHeader::new(0, MAX_KEY_SIZE + 1, 4).is_well_formed());
}

#[test]
fn test_seal_covers_header_key_and_data() {
    let mut body = crc32fast::Hasher::new();
    body.update(b"key");
    body.update(b"data");

    let mut header = RecordHeader::new(0, 3, 4);
    header.seal(&body);

    let mut expected = crc32fast::Hasher::new();
    expected.update(&header.encode()[..CRC_OFFSET]);
    expected.update(b"key");
    expected.update(b"data");
    assert_eq!(header.crc, expected.finalize());

    // Flags are covered too
    let mut other = RecordHeader::new(1, 3, 4);
    other.seal(&body);
    assert_ne!(other.crc, header.crc);
}

#[test]
fn test_header_create_flags() {
    let header = RecordHeader::new(CreateFlags::WRITE_ONCE.bits() | 1 << 7, 3, 0);
    assert!(header.is_tombstone());
    assert!(!header.is_discarded());
    assert_eq!(header.create_flags(), CreateFlags::WRITE_ONCE);
}

// =============================================================================
// Key Tests
// =============================================================================

#[test]
fn test_validate_key_accepts_plain_keys() {
    validate_key("key").unwrap();
    validate_key("primary_key.v2-x").unwrap();
    validate_key(&"k".repeat(MAX_KEY_SIZE)).unwrap();
}

#[test]
fn test_validate_key_rejects_bad_keys() {
    assert!(matches!(validate_key(""), Err(TdbError::InvalidArgument(_))));
    assert!(matches!(
        validate_key(&"k".repeat(MAX_KEY_SIZE + 1)),
        Err(TdbError::InvalidArgument(_))
    ));

    for bad in ["a*b", "a/b", "a?b", "a:b", "a;b", "a\"b", "a|b", "a b", "a<b", "a>b", "a\\b"] {
        assert!(
            matches!(validate_key(bad), Err(TdbError::InvalidArgument(_))),
            "{} should be rejected",
            bad
        );
    }
}

#[test]
fn test_key_hash_collision_pair() {
    // Distinct keys, same CRC32
    assert_eq!(key_hash(b"plumless"), key_hash(b"buckeroo"));
    assert_ne!(key_hash(b"key"), key_hash(b"kez"));
}

// =============================================================================
// Flag Tests
// =============================================================================

#[test]
fn test_create_flags_from_bits() {
    assert_eq!(CreateFlags::from_bits(0).unwrap(), CreateFlags::empty());
    assert_eq!(CreateFlags::from_bits(1).unwrap(), CreateFlags::WRITE_ONCE);
    assert!(matches!(
        CreateFlags::from_bits(1 << 3),
        Err(TdbError::InvalidArgument(_))
    ));
    assert!(CreateFlags::WRITE_ONCE.contains(CreateFlags::empty()));
    assert!(!CreateFlags::empty().contains(CreateFlags::WRITE_ONCE));
}
