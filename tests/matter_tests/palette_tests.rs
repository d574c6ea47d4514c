//! Tests for the value palette
//!
//! These tests verify:
//! - Repeated values share one palette entry
//! - Indices follow insertion order
//! - Written slices stay compact regardless of how often a value repeats

use std::sync::Arc;

use bytes::BytesMut;
use mantle::codec::ByteReader;
use mantle::matter::{Palette, Slice, SliceRegistry, TypedSlice};
use mantle::Matter;

// =============================================================================
// Palette Tests
// =============================================================================

#[test]
fn test_palette_deduplicates() {
    let palette = Palette::<String>::new();

    assert_eq!(palette.index_of(&"stone".to_string()), 0);
    assert_eq!(palette.index_of(&"dirt".to_string()), 1);
    assert_eq!(palette.index_of(&"stone".to_string()), 0);

    assert_eq!(palette.len(), 2);
    assert_eq!(palette.get(1), Some("dirt".to_string()));
    assert_eq!(palette.get(2), None);
}

#[test]
fn test_palette_write_read() {
    let palette = Palette::<i64>::new();
    for value in [7, -3, 7, 1 << 40] {
        palette.index_of(&value);
    }

    let mut buf = BytesMut::new();
    palette.write(&mut buf).unwrap();
    let restored = Palette::<i64>::read(&mut ByteReader::new(&buf)).unwrap();

    assert_eq!(restored.len(), 3);
    assert_eq!(restored.get(0), Some(7));
    assert_eq!(restored.get(1), Some(-3));
    assert_eq!(restored.get(2), Some(1 << 40));
}

#[test]
fn test_palette_empty() {
    let palette = Palette::<bool>::default();
    assert!(palette.is_empty());

    let mut buf = BytesMut::new();
    palette.write(&mut buf).unwrap();
    assert_eq!(buf.to_vec(), vec![0x00]);
}

#[test]
fn test_palette_keeps_signed_zero_apart() {
    let palette = Palette::<f64>::new();

    assert_eq!(palette.index_of(&0.0), 0);
    assert_eq!(palette.index_of(&-0.0), 1);
    assert_eq!(palette.index_of(&0.0), 0);

    assert_eq!(palette.len(), 2);
    assert!(palette.get(1).unwrap().is_sign_negative());
}

#[test]
fn test_palette_nan_matches_itself() {
    let palette = Palette::<f32>::new();

    assert_eq!(palette.index_of(&f32::NAN), 0);
    assert_eq!(palette.index_of(&1.0), 1);
    assert_eq!(palette.index_of(&f32::NAN), 0);
    assert_eq!(palette.len(), 2);
}

// =============================================================================
// Compactness Tests
// =============================================================================

/// Slice body: palette count, palette values, node count, nodes
fn body_of(slice: &TypedSlice<i32>) -> Vec<u8> {
    let mut buf = BytesMut::new();
    slice.write_body(&mut buf).unwrap();
    buf.to_vec()
}

#[test]
fn test_repeated_value_single_palette_entry() {
    for k in [1usize, 10, 200] {
        let mut slice = TypedSlice::<i32>::new(16, 16, 16);
        for i in 0..k {
            slice.set(i % 16, (i / 16) % 16, i / 256, 42);
        }

        let body = body_of(&slice);
        let mut reader = ByteReader::new(&body);

        assert_eq!(reader.read_var_u32().unwrap(), 1, "palette entries for k={}", k);
        assert_eq!(reader.read_i32().unwrap(), 42);
        assert_eq!(reader.read_var_u32().unwrap() as usize, k, "node records for k={}", k);
    }
}

#[test]
fn test_distinct_values_grow_palette() {
    let mut slice = TypedSlice::<i32>::new(4, 4, 4);
    slice.set(0, 0, 0, 1);
    slice.set(1, 0, 0, 2);
    slice.set(2, 0, 0, 1);

    let body = body_of(&slice);
    let mut reader = ByteReader::new(&body);

    assert_eq!(reader.read_var_u32().unwrap(), 2);
}

#[test]
fn test_matter_size_independent_of_repeats() {
    let registry = Arc::new(SliceRegistry::default());

    let mut few = Matter::new(8, 8, 8, Arc::clone(&registry)).unwrap();
    let mut many = Matter::new(8, 8, 8, Arc::clone(&registry)).unwrap();
    few.set(0, 0, 0, "a long repeated string value".to_string()).unwrap();
    for x in 0..8 {
        many.set(x, 0, 0, "a long repeated string value".to_string()).unwrap();
    }

    let few_len = few.to_bytes().unwrap().len();
    let many_len = many.to_bytes().unwrap().len();

    // 7 extra nodes of one-byte position and one-byte index
    assert_eq!(many_len - few_len, 14);
}

#[test]
fn test_float_edge_values_survive_round_trip() {
    let registry = Arc::new(SliceRegistry::default());
    let mut matter = Matter::new(4, 4, 4, Arc::clone(&registry)).unwrap();
    matter.set(0, 0, 0, 0.0f64).unwrap();
    matter.set(1, 0, 0, -0.0f64).unwrap();
    matter.set(2, 0, 0, f64::NAN).unwrap();
    matter.set(3, 0, 0, f64::NAN).unwrap();
    matter.set(0, 0, 1, -0.0f32).unwrap();
    matter.set(1, 0, 1, 0.0f32).unwrap();

    let restored = Matter::read(&matter.to_bytes().unwrap(), &registry).unwrap();

    assert!(restored.get::<f64>(0, 0, 0).unwrap().is_sign_positive());
    assert!(restored.get::<f64>(1, 0, 0).unwrap().is_sign_negative());
    assert!(restored.get::<f64>(2, 0, 0).unwrap().is_nan());
    assert!(restored.get::<f64>(3, 0, 0).unwrap().is_nan());
    assert!(restored.get::<f32>(0, 0, 1).unwrap().is_sign_negative());
    assert!(restored.get::<f32>(1, 0, 1).unwrap().is_sign_positive());
}
