//! Storage Module
//!
//! The persisted page hierarchy: a region owns a 32×32 grid of chunks, a
//! chunk owns a vertical stack of 16×16×16 Matter sections plus a flag set.
//!
//! ## Region File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Header                                                   │
//! │   Magic: "MNTL" (4) | Version: u16 | RegionX: i32 | Z: i32│
//! │   ChunkCount (var)                                       │
//! ├──────────────────────────────────────────────────────────┤
//! │ Chunk × ChunkCount                                       │
//! │   Index: u16 (localZ * 32 + localX)                      │
//! │   Flags (var) | Sections (var)                           │
//! │   Section × Sections: Index (var) | Matter               │
//! ├──────────────────────────────────────────────────────────┤
//! │ Footer                                                   │
//! │   CRC32 of everything above: u32                         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Chunks that were never touched, or hold no data and no flags, are not
//! stored.

mod chunk;
mod flag;
mod region;

use std::sync::Arc;

pub use chunk::MantleChunk;
pub use flag::MantleFlag;
pub use region::{Region, REGION_CHUNKS, REGION_SIZE};

use crate::matter::{Matter, SliceRegistry};

/// Builds fresh chunk sections with the engine's registry and author
#[derive(Debug)]
pub struct SectionFactory {
    registry: Arc<SliceRegistry>,
    author: String,
}

impl SectionFactory {
    pub fn new(registry: Arc<SliceRegistry>, author: impl Into<String>) -> Self {
        Self {
            registry,
            author: author.into(),
        }
    }

    pub fn registry(&self) -> &Arc<SliceRegistry> {
        &self.registry
    }

    /// An empty 16×16×16 section
    pub fn create(&self) -> Matter {
        let mut matter = Matter::section(Arc::clone(&self.registry));
        matter.header_mut().author.clone_from(&self.author);
        matter
    }
}
