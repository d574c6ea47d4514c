//! Tests for the codec module
//!
//! These tests verify:
//! - Packed coordinate keys are a bijection and order-independent of sign
//! - Block positions decompose correctly, negatives included
//! - Varint encoding matches LEB128
//! - The byte reader reports truncation as corruption

use bytes::{BufMut, BytesMut};
use mantle::codec::{pack, put_utf, put_var_u32, put_var_u64, unpack, var_u64_len, BlockPos, ByteReader};
use mantle::MantleError;

// =============================================================================
// Helper Functions
// =============================================================================

fn encode_var(value: u64) -> Vec<u8> {
    let mut buf = BytesMut::new();
    put_var_u64(&mut buf, value);
    buf.to_vec()
}

// =============================================================================
// Key Packing Tests
// =============================================================================

#[test]
fn test_pack_unpack_extremes() {
    let cases = [
        (0, 0),
        (1, -1),
        (-1, 1),
        (i32::MIN, i32::MAX),
        (i32::MAX, i32::MIN),
        (-12, 73),
    ];

    for (x, z) in cases {
        assert_eq!(unpack(pack(x, z)), (x, z), "round trip of ({}, {})", x, z);
    }
}

#[test]
fn test_pack_layout() {
    assert_eq!(pack(1, 0), 1i64 << 32);
    assert_eq!(pack(0, -1), 0xffff_ffff);
    assert_eq!(pack(-1, -1), -1);
}

#[test]
fn test_pack_distinct_for_neighbours() {
    let mut keys = std::collections::HashSet::new();
    for x in -4..4 {
        for z in -4..4 {
            assert!(keys.insert(pack(x, z)));
        }
    }
    assert_eq!(keys.len(), 64);
}

// =============================================================================
// BlockPos Tests
// =============================================================================

#[test]
fn test_block_pos_positive() {
    let pos = BlockPos::new(33, 225, 2344);

    assert_eq!(pos.chunk_x(), 2);
    assert_eq!(pos.chunk_z(), 146);
    assert_eq!(pos.region_x(), 0);
    assert_eq!(pos.region_z(), 4);
    assert_eq!(pos.region_local_x(), 2);
    assert_eq!(pos.region_local_z(), 18);
    assert_eq!(pos.section(), 14);
    assert_eq!((pos.local_x(), pos.local_y(), pos.local_z()), (1, 1, 8));
}

#[test]
fn test_block_pos_negative_floors() {
    let pos = BlockPos::new(-385, 23, -1);

    // -385 >> 4 = -25, -25 >> 5 = -1
    assert_eq!(pos.chunk_x(), -25);
    assert_eq!(pos.region_x(), -1);
    assert_eq!(pos.region_local_x(), 7);
    assert_eq!(pos.local_x(), 15);

    assert_eq!(pos.chunk_z(), -1);
    assert_eq!(pos.region_z(), -1);
    assert_eq!(pos.region_local_z(), 31);
    assert_eq!(pos.local_z(), 15);

    assert_eq!(pos.region_key(), pack(-1, -1));
    assert_eq!(pos.chunk_key(), pack(-25, -1));
}

#[test]
fn test_block_pos_region_boundary() {
    let last = BlockPos::new(511, 0, 0);
    let first = BlockPos::new(512, 0, 0);

    assert_eq!(last.region_x(), 0);
    assert_eq!(last.region_local_x(), 31);
    assert_eq!(first.region_x(), 1);
    assert_eq!(first.region_local_x(), 0);
}

// =============================================================================
// Varint Tests
// =============================================================================

#[test]
fn test_varint_known_encodings() {
    assert_eq!(encode_var(0), vec![0x00]);
    assert_eq!(encode_var(127), vec![0x7f]);
    assert_eq!(encode_var(128), vec![0x80, 0x01]);
    assert_eq!(encode_var(300), vec![0xac, 0x02]);
    assert_eq!(encode_var(u64::MAX).len(), 10);
}

#[test]
fn test_varint_len_matches_encoding() {
    for value in [0, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
        assert_eq!(var_u64_len(value), encode_var(value).len(), "length of {}", value);
    }
}

#[test]
fn test_varint_read_back() {
    let mut buf = BytesMut::new();
    put_var_u32(&mut buf, 300);
    put_var_u64(&mut buf, u64::MAX);
    put_var_u32(&mut buf, 0);

    let mut reader = ByteReader::new(&buf);
    assert_eq!(reader.read_var_u32().unwrap(), 300);
    assert_eq!(reader.read_var_u64().unwrap(), u64::MAX);
    assert_eq!(reader.read_var_u32().unwrap(), 0);
    assert!(reader.is_empty());
}

#[test]
fn test_varint_u32_overflow_is_corrupt() {
    let bytes = encode_var(u32::MAX as u64 + 1);
    let mut reader = ByteReader::new(&bytes);

    assert!(matches!(reader.read_var_u32(), Err(MantleError::Corrupt(_))));
}

#[test]
fn test_varint_too_long_is_corrupt() {
    let bytes = [0xffu8; 11];
    let mut reader = ByteReader::new(&bytes);

    assert!(matches!(reader.read_var_u64(), Err(MantleError::Corrupt(_))));
}

// =============================================================================
// ByteReader Tests
// =============================================================================

#[test]
fn test_reader_big_endian() {
    let mut buf = BytesMut::new();
    buf.put_i32(-2);
    buf.put_u16(0x0102);
    buf.put_f64(4.2);

    assert_eq!(&buf[..6], &[0xff, 0xff, 0xff, 0xfe, 0x01, 0x02]);

    let mut reader = ByteReader::new(&buf);
    assert_eq!(reader.read_i32().unwrap(), -2);
    assert_eq!(reader.read_u16().unwrap(), 0x0102);
    assert_eq!(reader.read_f64().unwrap(), 4.2);
}

#[test]
fn test_reader_truncated_is_corrupt() {
    let bytes = [0x00, 0x01, 0x02];
    let mut reader = ByteReader::new(&bytes);

    let result = reader.read_i32();

    assert!(matches!(result, Err(MantleError::Corrupt(_))));
    assert_eq!(reader.position(), 0);
}

#[test]
fn test_reader_utf() {
    let mut buf = BytesMut::new();
    put_utf(&mut buf, "héllo").unwrap();

    assert_eq!(&buf[..2], &[0x00, 0x06]);

    let mut reader = ByteReader::new(&buf);
    assert_eq!(reader.read_utf().unwrap(), "héllo");
}

#[test]
fn test_reader_invalid_bool() {
    let bytes = [0x02];
    let mut reader = ByteReader::new(&bytes);

    assert!(matches!(reader.read_bool(), Err(MantleError::Corrupt(_))));
}

#[test]
fn test_put_utf_too_long() {
    let long = "x".repeat(u16::MAX as usize + 1);
    let mut buf = BytesMut::new();

    assert!(put_utf(&mut buf, &long).is_err());
}
