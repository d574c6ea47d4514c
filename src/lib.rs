//! # Mantle
//!
//! A sparse, unbounded 3D typed key-value store with:
//! - Per-type slices with palette compression
//! - Paged region files, loaded on first touch
//! - Per-region locking (regions never block each other)
//! - Idle eviction and parallel flushes
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Mantle (engine)                           │
//! │        get / set / remove / trim / save_all / close         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ pack(x >> 9, z >> 9)
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  HyperLock  │          │ Region cache│
//!   │ (per key)   │          │  (RwLock)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                  Region (32×32 chunks, one file)
//!                                   │
//!                                   ▼
//!                  Chunk (sections of 16×16×16 + flags)
//!                                   │
//!                                   ▼
//!                  Matter (one palette-encoded slice per type)
//! ```
//!
//! ## Example
//! ```no_run
//! use mantle::Mantle;
//!
//! # fn main() -> mantle::Result<()> {
//! let mantle = Mantle::new("./world", 256)?;
//! mantle.set(33, 225, 2344, 69i32)?;
//! assert_eq!(mantle.get::<i32>(33, 225, 2344)?, Some(69));
//! mantle.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod matter;
pub mod storage;
pub mod parallel;
pub mod engine;
pub mod writer;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{MantleError, Result};
pub use config::{MantleConfig, MantleConfigBuilder};
pub use codec::{pack, unpack, BlockPos};
pub use matter::{Matter, MatterHeader, MatterValue, SliceRegistry, TypedSlice};
pub use storage::{MantleChunk, MantleFlag, Region};
pub use engine::Mantle;
pub use writer::BoundedWriter;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Mantle
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
