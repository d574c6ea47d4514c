//! Error types for Mantle
//!
//! Provides a unified error type for all operations.
//!
//! Misses are not errors: a read outside the world height or at a coordinate
//! with no backing data returns `Ok(None)`, and writes outside the world
//! height are dropped with `Ok(())`.

use thiserror::Error;

/// Result type alias using MantleError
pub type Result<T> = std::result::Result<T, MantleError>;

/// Unified error type for Mantle operations
#[derive(Debug, Error)]
pub enum MantleError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// One or more regions could not be written during a flush
    #[error("Flush failed for {failed} of {total} regions")]
    Flush { failed: usize, total: usize },

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("The Mantle is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Type Registry Errors
    // -------------------------------------------------------------------------
    #[error("Unknown slice type '{0}' (register it on the slice registry)")]
    UnknownType(String),

    #[error("Slice type '{tag}' is registered for a different value type than {expected}")]
    TypeMismatch {
        tag: String,
        expected: &'static str,
    },

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt data: {0}")]
    Corrupt(String),

    #[error("Invalid matter size {width}x{height}x{depth}")]
    InvalidDimensions {
        width: usize,
        height: usize,
        depth: usize,
    },

    #[error("Section {index} is outside of 0..{count}")]
    SectionOutOfRange { index: usize, count: usize },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}
