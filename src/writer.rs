//! Bounded Writer
//!
//! Write-side cache of chunk handles for bulk edits around a center chunk.
//! Every chunk in the window is resolved once up front, so a long run of
//! `set_data` calls skips region resolution entirely.
//!
//! ```text
//!          radius = 1
//!   ┌─────┬─────┬─────┐
//!   │     │     │     │   cached chunks: (2r + 1)²
//!   ├─────┼─────┼─────┤   writes outside the window are dropped
//!   │     │  C  │     │
//!   ├─────┼─────┼─────┤
//!   │     │     │     │
//!   └─────┴─────┴─────┘
//! ```
//!
//! The writer holds its regions alive, so `trim` never evicts a region a
//! writer is still using.

use std::collections::HashMap;
use std::sync::Arc;

use crate::codec::{pack, BlockPos};
use crate::engine::Mantle;
use crate::error::Result;
use crate::matter::MatterValue;
use crate::storage::{MantleChunk, Region};

pub struct BoundedWriter<'m> {
    mantle: &'m Mantle,
    center_x: i32,
    center_z: i32,
    radius: u32,
    infinite: bool,
    chunks: HashMap<i64, Arc<MantleChunk>>,
    regions: HashMap<i64, Arc<Region>>,
}

impl<'m> BoundedWriter<'m> {
    pub(crate) fn bounded(mantle: &'m Mantle, center_x: i32, center_z: i32, radius: u32) -> Result<Self> {
        let mut writer = Self {
            mantle,
            center_x,
            center_z,
            radius,
            infinite: false,
            chunks: HashMap::new(),
            regions: HashMap::new(),
        };

        let r = radius as i64;
        for dx in -r..=r {
            for dz in -r..=r {
                let (Ok(cx), Ok(cz)) = (
                    i32::try_from(center_x as i64 + dx),
                    i32::try_from(center_z as i64 + dz),
                ) else {
                    continue;
                };
                writer.chunk(cx, cz)?;
            }
        }

        tracing::debug!(
            "Bounded writer at {},{} r={} cached {} chunks in {} regions",
            center_x,
            center_z,
            radius,
            writer.chunks.len(),
            writer.regions.len()
        );

        Ok(writer)
    }

    pub(crate) fn infinite(mantle: &'m Mantle) -> Result<Self> {
        mantle.ensure_open()?;

        Ok(Self {
            mantle,
            center_x: 0,
            center_z: 0,
            radius: 0,
            infinite: true,
            chunks: HashMap::new(),
            regions: HashMap::new(),
        })
    }

    pub fn center(&self) -> (i32, i32) {
        (self.center_x, self.center_z)
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn is_infinite(&self) -> bool {
        self.infinite
    }

    /// Chunks currently cached
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Whether a write at `(x, y, z)` would land
    pub fn is_within(&self, x: i32, y: i32, z: i32) -> bool {
        if !self.mantle.in_height(y) {
            return false;
        }
        if self.infinite {
            return true;
        }

        let pos = BlockPos::new(x, y, z);
        let dx = (pos.chunk_x() as i64 - self.center_x as i64).unsigned_abs();
        let dz = (pos.chunk_z() as i64 - self.center_z as i64).unsigned_abs();
        dx <= self.radius as u64 && dz <= self.radius as u64
    }

    /// Store `value`; silently dropped outside the window or world height
    pub fn set_data<T: MatterValue>(&mut self, x: i32, y: i32, z: i32, value: T) -> Result<()> {
        self.mantle.ensure_open()?;
        self.mantle.config().registry.require::<T>()?;

        if !self.is_within(x, y, z) {
            return Ok(());
        }

        let pos = BlockPos::new(x, y, z);
        let chunk = self.chunk(pos.chunk_x(), pos.chunk_z())?;
        let mut section = chunk.get_or_create(pos.section())?;
        section.set(pos.local_x(), pos.local_y(), pos.local_z(), value)
    }

    /// Read through the cached chunks; `None` outside the window
    pub fn get_data<T: MatterValue>(&mut self, x: i32, y: i32, z: i32) -> Result<Option<T>> {
        self.mantle.ensure_open()?;
        self.mantle.config().registry.require::<T>()?;

        if !self.is_within(x, y, z) {
            return Ok(None);
        }

        let pos = BlockPos::new(x, y, z);
        let chunk = self.chunk(pos.chunk_x(), pos.chunk_z())?;
        let Some(section) = chunk.get(pos.section()) else {
            return Ok(None);
        };

        let value = section
            .get::<T>(pos.local_x(), pos.local_y(), pos.local_z())
            .cloned();
        Ok(value)
    }

    fn chunk(&mut self, cx: i32, cz: i32) -> Result<Arc<MantleChunk>> {
        let key = pack(cx, cz);
        if let Some(chunk) = self.chunks.get(&key) {
            return Ok(Arc::clone(chunk));
        }

        let (region, chunk) = self.mantle.resolve_chunk(cx, cz)?;
        self.regions.entry(region.key()).or_insert(region);
        self.chunks.insert(key, Arc::clone(&chunk));
        Ok(chunk)
    }
}

impl std::fmt::Debug for BoundedWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedWriter")
            .field("center", &(self.center_x, self.center_z))
            .field("radius", &self.radius)
            .field("infinite", &self.infinite)
            .field("chunks", &self.chunks.len())
            .finish()
    }
}
