//! Tests for BoundedWriter
//!
//! These tests verify:
//! - The chunk window is pre-resolved
//! - Writes outside the window or world height are dropped
//! - Infinite writers accept any column
//! - Written data is visible through the engine and persists

use std::time::Duration;

use mantle::{Mantle, MantleConfig, MantleError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const HEIGHT: usize = 128;

fn setup_temp_mantle() -> (TempDir, Mantle) {
    let temp_dir = TempDir::new().unwrap();
    let config = MantleConfig::builder()
        .data_dir(temp_dir.path())
        .world_height(HEIGHT)
        .build();
    let mantle = Mantle::open(config).unwrap();
    (temp_dir, mantle)
}

// =============================================================================
// Bounded Tests
// =============================================================================

#[test]
fn test_bounded_writer_preresolves_window() {
    let (_temp, mantle) = setup_temp_mantle();

    let writer = mantle.write(0, 0, 2).unwrap();

    assert_eq!(writer.chunk_count(), 25);
    assert_eq!(writer.radius(), 2);
    assert!(!writer.is_infinite());
    assert!(mantle.is_chunk_loaded(-2, 2));
    // chunks -2..=2 span regions -1 and 0 on both axes
    assert_eq!(mantle.loaded_region_count(), 4);
}

#[test]
fn test_is_within() {
    let (_temp, mantle) = setup_temp_mantle();
    let writer = mantle.write(10, -10, 1).unwrap();

    // chunk 9..=11 on x, -11..=-9 on z
    assert!(writer.is_within(144, 0, -160));
    assert!(writer.is_within(191, 10, -145));
    assert!(!writer.is_within(192, 10, -160));
    assert!(!writer.is_within(143, 10, -160));
    assert!(!writer.is_within(160, -1, -160));
    assert!(!writer.is_within(160, HEIGHT as i32, -160));
}

#[test]
fn test_set_data_inside_window() {
    let (_temp, mantle) = setup_temp_mantle();
    let mut writer = mantle.write(0, 0, 1).unwrap();

    writer.set_data(-16, 5, 31, 1i32).unwrap();
    writer.set_data(0, 6, 0, "centre".to_string()).unwrap();

    assert_eq!(writer.get_data::<i32>(-16, 5, 31).unwrap(), Some(1));
    assert_eq!(mantle.get::<i32>(-16, 5, 31).unwrap(), Some(1));
    assert_eq!(mantle.get::<String>(0, 6, 0).unwrap(), Some("centre".to_string()));
}

#[test]
fn test_set_data_outside_window_is_dropped() {
    let (_temp, mantle) = setup_temp_mantle();
    let mut writer = mantle.write(0, 0, 0).unwrap();

    writer.set_data(16, 0, 0, 1i32).unwrap();
    writer.set_data(0, -1, 0, 1i32).unwrap();
    writer.set_data(0, HEIGHT as i32, 0, 1i32).unwrap();

    assert_eq!(writer.chunk_count(), 1);
    assert_eq!(writer.get_data::<i32>(16, 0, 0).unwrap(), None);
    assert_eq!(mantle.get::<i32>(16, 0, 0).unwrap(), None);
}

#[test]
fn test_writer_data_survives_trim_and_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = MantleConfig::builder()
        .data_dir(temp_dir.path())
        .world_height(HEIGHT)
        .build();

    {
        let mantle = Mantle::open(config.clone()).unwrap();
        {
            let mut writer = mantle.write(31, 31, 1).unwrap();
            for x in 480..528 {
                writer.set_data(x, 64, 500, x as i64).unwrap();
            }
        }
        mantle.trim(Duration::ZERO).unwrap();
        assert_eq!(mantle.loaded_region_count(), 0);
        mantle.close().unwrap();
    }

    let mantle = Mantle::open(config).unwrap();
    for x in 480..528 {
        assert_eq!(mantle.get::<i64>(x, 64, 500).unwrap(), Some(x as i64));
    }
}

// =============================================================================
// Infinite Tests
// =============================================================================

#[test]
fn test_infinite_writer_resolves_lazily() {
    let (_temp, mantle) = setup_temp_mantle();
    let mut writer = mantle.write_infinite().unwrap();

    assert_eq!(writer.chunk_count(), 0);
    assert!(writer.is_within(1_000_000, 0, -1_000_000));

    writer.set_data(1_000_000, 0, -1_000_000, true).unwrap();
    writer.set_data(1_000_001, 1, -1_000_000, false).unwrap();
    writer.set_data(0, 0, 0, true).unwrap();

    assert_eq!(writer.chunk_count(), 2);
    assert_eq!(mantle.get::<bool>(1_000_001, 1, -1_000_000).unwrap(), Some(false));
}

#[test]
fn test_writer_after_close_fails() {
    let (_temp, mantle) = setup_temp_mantle();
    let mut writer = mantle.write_infinite().unwrap();
    writer.set_data(0, 0, 0, 1i32).unwrap();
    drop(writer);

    mantle.close().unwrap();

    assert!(matches!(mantle.write_infinite(), Err(MantleError::Closed)));
}
