//! Region
//!
//! A fixed 32×32 grid of chunks persisted as one file; the unit of disk I/O.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use parking_lot::RwLock;

use crate::codec::{pack, put_var_u32, ByteReader};
use crate::error::{MantleError, Result};

use super::{MantleChunk, SectionFactory};

/// Chunks per region edge
pub const REGION_SIZE: usize = 32;

/// Chunks per region
pub const REGION_CHUNKS: usize = REGION_SIZE * REGION_SIZE;

/// Magic bytes identifying a region file
const MAGIC: &[u8; 4] = b"MNTL";

/// Current region format version
const VERSION: u16 = 1;

/// Magic (4) + Version (2) + RegionX (4) + RegionZ (4)
const HEADER_SIZE: usize = 14;

/// CRC32 (4)
const FOOTER_SIZE: usize = 4;

/// A 32×32 page of lazily created chunks
///
/// ## Concurrency:
/// - Each chunk slot has its own RwLock; lookups of existing chunks only
///   take the read side
/// - Chunks are handed out as `Arc<MantleChunk>` so callers can keep a
///   handle without holding any region lock
pub struct Region {
    x: i32,
    z: i32,
    world_height: usize,
    chunks: Box<[RwLock<Option<Arc<MantleChunk>>>]>,
    factory: Arc<SectionFactory>,
}

impl Region {
    /// Create an empty region
    pub fn new(world_height: usize, x: i32, z: i32, factory: Arc<SectionFactory>) -> Self {
        let chunks = (0..REGION_CHUNKS).map(|_| RwLock::new(None)).collect();

        Self {
            x,
            z,
            world_height,
            chunks,
            factory,
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn z(&self) -> i32 {
        self.z
    }

    /// Packed region coordinate
    pub fn key(&self) -> i64 {
        pack(self.x, self.z)
    }

    pub fn world_height(&self) -> usize {
        self.world_height
    }

    fn index(x: usize, z: usize) -> usize {
        debug_assert!(x < REGION_SIZE && z < REGION_SIZE, "chunk ({}, {}) outside region", x, z);
        (z % REGION_SIZE) * REGION_SIZE + (x % REGION_SIZE)
    }

    // =========================================================================
    // Chunks
    // =========================================================================

    /// The chunk at region-local `(x, z)`, created if absent
    pub fn get_or_create(&self, x: usize, z: usize) -> Arc<MantleChunk> {
        let slot = &self.chunks[Self::index(x, z)];

        if let Some(chunk) = slot.read().as_ref() {
            return Arc::clone(chunk);
        }

        let mut slot = slot.write();
        let chunk = slot.get_or_insert_with(|| {
            Arc::new(MantleChunk::new(x, z, self.world_height, Arc::clone(&self.factory)))
        });
        Arc::clone(chunk)
    }

    /// The chunk at region-local `(x, z)` if it was ever created
    pub fn get(&self, x: usize, z: usize) -> Option<Arc<MantleChunk>> {
        self.chunks[Self::index(x, z)].read().as_ref().map(Arc::clone)
    }

    /// Blank the chunk at region-local `(x, z)`
    pub fn delete(&self, x: usize, z: usize) {
        if let Some(chunk) = self.get(x, z) {
            chunk.delete();
        }
    }

    /// Chunks that hold data or flags
    pub fn populated_chunks(&self) -> Vec<(usize, Arc<MantleChunk>)> {
        self.chunks
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.read().as_ref().map(|c| (index, Arc::clone(c))))
            .filter(|(_, chunk)| !chunk.is_empty())
            .collect()
    }

    pub fn chunk_count(&self) -> usize {
        self.populated_chunks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(|slot| {
            slot.read()
                .as_ref()
                .map(|chunk| chunk.is_empty())
                .unwrap_or(true)
        })
    }

    /// Whether any chunk handle is held outside this region
    pub fn has_chunk_handles(&self) -> bool {
        self.chunks.iter().any(|slot| {
            slot.read()
                .as_ref()
                .map(|chunk| Arc::strong_count(chunk) > 1)
                .unwrap_or(false)
        })
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Serialize header, populated chunks and checksum footer
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let chunks = self.populated_chunks();

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + FOOTER_SIZE + chunks.len() * 64);
        buf.put_slice(MAGIC);
        buf.put_u16(VERSION);
        buf.put_i32(self.x);
        buf.put_i32(self.z);
        put_var_u32(&mut buf, chunks.len() as u32);

        for (index, chunk) in &chunks {
            buf.put_u16(*index as u16);
            chunk.write_to(&mut buf)?;
        }

        let crc = crc32fast::hash(&buf);
        buf.put_u32(crc);

        Ok(buf.to_vec())
    }

    /// Write to `path` through a temporary sibling file
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        let tmp = path.with_extension("ttp.tmp");

        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }

        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Rebuild a region from bytes written by [`Region::to_bytes`].
    ///
    /// Any structural problem fails the whole read; there is no partial
    /// recovery.
    pub fn read(world_height: usize, bytes: &[u8], factory: Arc<SectionFactory>) -> Result<Self> {
        if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(MantleError::Corrupt(format!(
                "region file of {} bytes is shorter than header and footer",
                bytes.len()
            )));
        }

        let (body, footer) = bytes.split_at(bytes.len() - FOOTER_SIZE);
        let expected = u32::from_be_bytes([footer[0], footer[1], footer[2], footer[3]]);
        let actual = crc32fast::hash(body);
        if expected != actual {
            return Err(MantleError::Corrupt(format!(
                "region checksum mismatch: stored {:08x}, computed {:08x}",
                expected, actual
            )));
        }

        let mut reader = ByteReader::new(body);
        if reader.read_bytes(4)? != MAGIC {
            return Err(MantleError::Corrupt("invalid region magic".to_string()));
        }

        let version = reader.read_u16()?;
        if version != VERSION {
            return Err(MantleError::Corrupt(format!(
                "unsupported region version: {}",
                version
            )));
        }

        let x = reader.read_i32()?;
        let z = reader.read_i32()?;
        let region = Self::new(world_height, x, z, factory);

        let count = reader.read_var_u32()? as usize;
        for _ in 0..count {
            let index = reader.read_u16()? as usize;
            if index >= REGION_CHUNKS {
                return Err(MantleError::Corrupt(format!(
                    "chunk index {} outside region",
                    index
                )));
            }

            let (local_x, local_z) = (index % REGION_SIZE, index / REGION_SIZE);
            let chunk = MantleChunk::read_from(
                local_x,
                local_z,
                &mut reader,
                world_height,
                Arc::clone(&region.factory),
            )?;
            *region.chunks[index].write() = Some(Arc::new(chunk));
        }

        if !reader.is_empty() {
            return Err(MantleError::Corrupt(format!(
                "{} trailing bytes after last chunk",
                reader.remaining()
            )));
        }

        Ok(region)
    }

    pub fn read_file(world_height: usize, path: &Path, factory: Arc<SectionFactory>) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::read(world_height, &bytes, factory)
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("x", &self.x)
            .field("z", &self.z)
            .field("world_height", &self.world_height)
            .finish()
    }
}
