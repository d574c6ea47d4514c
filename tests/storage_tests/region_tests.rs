//! Tests for Region
//!
//! These tests verify:
//! - Lazy chunk creation and shared chunk handles
//! - Region file round trip
//! - Untouched and blank chunks are not stored
//! - Corruption is detected, never partially loaded

use std::fs;
use std::sync::Arc;
use std::thread;

use mantle::matter::SliceRegistry;
use mantle::storage::{MantleFlag, Region, SectionFactory, REGION_CHUNKS};
use mantle::MantleError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const HEIGHT: usize = 64;

fn factory() -> Arc<SectionFactory> {
    Arc::new(SectionFactory::new(Arc::new(SliceRegistry::default()), "region-tests"))
}

fn setup_region(x: i32, z: i32) -> Region {
    Region::new(HEIGHT, x, z, factory())
}

// =============================================================================
// Chunk Tests
// =============================================================================

#[test]
fn test_new_region_is_empty() {
    let region = setup_region(0, 0);

    assert!(region.is_empty());
    assert_eq!(region.chunk_count(), 0);
    assert!(region.get(0, 0).is_none());
}

#[test]
fn test_get_or_create_returns_same_chunk() {
    let region = setup_region(0, 0);

    let first = region.get_or_create(4, 31);
    let second = region.get_or_create(4, 31);

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!((first.x(), first.z()), (4, 31));
    assert!(region.get(4, 31).is_some());
}

#[test]
fn test_concurrent_get_or_create_single_chunk() {
    let region = Arc::new(setup_region(0, 0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let region = Arc::clone(&region);
            thread::spawn(move || region.get_or_create(10, 10))
        })
        .collect();
    let chunks: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for chunk in &chunks[1..] {
        assert!(Arc::ptr_eq(&chunks[0], chunk));
    }
}

#[test]
fn test_delete_blanks_chunk() {
    let region = setup_region(0, 0);
    region
        .get_or_create(1, 1)
        .get_or_create(0)
        .unwrap()
        .set(0, 0, 0, 1i32)
        .unwrap();
    assert_eq!(region.chunk_count(), 1);

    region.delete(1, 1);

    assert_eq!(region.chunk_count(), 0);
    assert!(region.is_empty());
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_region_file_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("p.test.ttp");
    let factory = factory();

    let region = Region::new(HEIGHT, -3, 7, Arc::clone(&factory));
    region
        .get_or_create(0, 0)
        .get_or_create(3)
        .unwrap()
        .set(1, 2, 3, 4.2f64)
        .unwrap();
    region
        .get_or_create(31, 31)
        .get_or_create(0)
        .unwrap()
        .set(15, 15, 15, "corner".to_string())
        .unwrap();
    region.get_or_create(5, 6).flag(MantleFlag::Generated, true);
    region.get_or_create(20, 20); // touched, never written
    region.write_file(&path).unwrap();

    let restored = Region::read_file(HEIGHT, &path, factory).unwrap();

    assert_eq!((restored.x(), restored.z()), (-3, 7));
    assert_eq!(restored.chunk_count(), 3);
    assert!(restored.get(20, 20).is_none());
    assert!(restored.get(5, 6).unwrap().is_flagged(MantleFlag::Generated));
    assert_eq!(
        restored.get(0, 0).unwrap().get(3).unwrap().get::<f64>(1, 2, 3),
        Some(&4.2)
    );
    assert_eq!(
        restored
            .get(31, 31)
            .unwrap()
            .get(0)
            .unwrap()
            .get::<String>(15, 15, 15)
            .map(String::as_str),
        Some("corner")
    );
}

#[test]
fn test_write_leaves_no_temp_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("p.0.ttp");

    setup_region(0, 0).write_file(&path).unwrap();

    let names: Vec<String> = fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["p.0.ttp".to_string()]);
}

#[test]
fn test_chunk_index_layout() {
    let region = setup_region(0, 0);
    region.get_or_create(1, 2).flag(MantleFlag::Real, true);

    let populated = region.populated_chunks();

    assert_eq!(populated.len(), 1);
    assert_eq!(populated[0].0, 2 * 32 + 1);
    assert!(populated[0].0 < REGION_CHUNKS);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_flipped_byte_fails_checksum() {
    let region = setup_region(1, 1);
    region
        .get_or_create(2, 2)
        .get_or_create(1)
        .unwrap()
        .set(0, 0, 0, 99i64)
        .unwrap();
    let mut bytes = region.to_bytes().unwrap();

    let middle = bytes.len() / 2;
    bytes[middle] ^= 0xff;

    let result = Region::read(HEIGHT, &bytes, factory());
    assert!(matches!(result, Err(MantleError::Corrupt(_))));
}

#[test]
fn test_truncated_file_fails() {
    let region = setup_region(1, 1);
    region.get_or_create(2, 2).flag(MantleFlag::Jigsaw, true);
    let bytes = region.to_bytes().unwrap();

    for len in [0, 4, bytes.len() - 1] {
        let result = Region::read(HEIGHT, &bytes[..len], factory());
        assert!(matches!(result, Err(MantleError::Corrupt(_))), "length {}", len);
    }
}

#[test]
fn test_garbage_file_fails() {
    let result = Region::read(HEIGHT, b"definitely not a region file", factory());

    assert!(matches!(result, Err(MantleError::Corrupt(_))));
}
