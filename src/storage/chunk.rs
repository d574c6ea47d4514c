//! Mantle Chunk
//!
//! One 16×16 column of Matter sections plus a flag set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::codec::{put_var_u32, put_var_u64, ByteReader, SECTION_HEIGHT};
use crate::error::{MantleError, Result};
use crate::matter::{Matter, MatterValue};

use super::{MantleFlag, SectionFactory};

/// A vertical column of lazily created sections
///
/// ## Concurrency:
/// - Each section sits behind its own mutex, so writers to different
///   sections of one chunk never contend
/// - Flags are a single atomic bitset
/// - All methods use `&self`; chunks are shared as `Arc<MantleChunk>`
pub struct MantleChunk {
    /// Chunk x inside the owning region (0..32)
    x: usize,
    /// Chunk z inside the owning region (0..32)
    z: usize,
    sections: Box<[Mutex<Option<Matter>>]>,
    flags: AtomicU64,
    factory: Arc<SectionFactory>,
}

impl MantleChunk {
    /// Create an empty chunk tall enough for `world_height` blocks
    pub fn new(x: usize, z: usize, world_height: usize, factory: Arc<SectionFactory>) -> Self {
        let section_count = (world_height + SECTION_HEIGHT - 1) / SECTION_HEIGHT;
        let sections = (0..section_count).map(|_| Mutex::new(None)).collect();

        Self {
            x,
            z,
            sections,
            flags: AtomicU64::new(0),
            factory,
        }
    }

    pub fn x(&self) -> usize {
        self.x
    }

    pub fn z(&self) -> usize {
        self.z
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    // =========================================================================
    // Sections
    // =========================================================================

    /// Lock section `index`, creating an empty Matter on first access
    pub fn get_or_create(&self, index: usize) -> Result<MappedMutexGuard<'_, Matter>> {
        let slot = self.slot(index)?;
        let factory = &self.factory;
        Ok(MutexGuard::map(slot.lock(), |section| {
            section.get_or_insert_with(|| factory.create())
        }))
    }

    /// Lock section `index` only if it exists
    pub fn get(&self, index: usize) -> Option<MappedMutexGuard<'_, Matter>> {
        let slot = self.sections.get(index)?;
        MutexGuard::try_map(slot.lock(), |section| section.as_mut()).ok()
    }

    pub fn exists(&self, index: usize) -> bool {
        self.sections
            .get(index)
            .map(|slot| slot.lock().is_some())
            .unwrap_or(false)
    }

    fn slot(&self, index: usize) -> Result<&Mutex<Option<Matter>>> {
        self.sections
            .get(index)
            .ok_or(MantleError::SectionOutOfRange {
                index,
                count: self.sections.len(),
            })
    }

    /// Detach every section and lower every flag. The chunk stays in its
    /// region as a blank placeholder.
    pub fn delete(&self) {
        for slot in self.sections.iter() {
            *slot.lock() = None;
        }
        self.flags.store(0, Ordering::SeqCst);
    }

    /// Drop the `T` slice from every section
    pub fn delete_slices<T: MatterValue>(&self) {
        for slot in self.sections.iter() {
            if let Some(matter) = slot.lock().as_mut() {
                matter.delete_slice::<T>();
            }
        }
    }

    /// Visit every occupied `T` cell as `(x, y, z, value)` with chunk-local
    /// x/z and absolute y, ascending by section then by position
    pub fn iterate<T, F>(&self, mut visitor: F)
    where
        T: MatterValue,
        F: FnMut(usize, usize, usize, &T),
    {
        for (index, slot) in self.sections.iter().enumerate() {
            let section = slot.lock();
            let Some(slice) = section.as_ref().and_then(|m| m.get_slice::<T>()) else {
                continue;
            };

            let base_y = index * SECTION_HEIGHT;
            for (x, y, z, value) in slice.iter() {
                visitor(x, base_y + y, z, value);
            }
        }
    }

    /// True when no section holds data and no flag is raised
    pub fn is_empty(&self) -> bool {
        self.flags.load(Ordering::SeqCst) == 0
            && self.sections.iter().all(|slot| {
                slot.lock()
                    .as_ref()
                    .map(|matter| matter.total_count() == 0)
                    .unwrap_or(true)
            })
    }

    // =========================================================================
    // Flags
    // =========================================================================

    pub fn flag(&self, flag: MantleFlag, flagged: bool) {
        if flagged {
            self.flags.fetch_or(flag.bit(), Ordering::SeqCst);
        } else {
            self.flags.fetch_and(!flag.bit(), Ordering::SeqCst);
        }
    }

    pub fn is_flagged(&self, flag: MantleFlag) -> bool {
        self.flags.load(Ordering::SeqCst) & flag.bit() != 0
    }

    /// Raise `flag`, returning true if it was lowered before
    pub fn raise_flag(&self, flag: MantleFlag) -> bool {
        self.flags.fetch_or(flag.bit(), Ordering::SeqCst) & flag.bit() == 0
    }

    /// Lower `flag`, returning true if it was raised before
    pub fn lower_flag(&self, flag: MantleFlag) -> bool {
        self.flags.fetch_and(!flag.bit(), Ordering::SeqCst) & flag.bit() != 0
    }

    /// Raw flag bitset
    pub fn flag_bits(&self) -> u64 {
        self.flags.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Write flags and every non-empty section
    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        // Lock every section up front so the count matches what is written
        let mut sections: Vec<(usize, MutexGuard<'_, Option<Matter>>)> = self
            .sections
            .iter()
            .enumerate()
            .map(|(index, slot)| (index, slot.lock()))
            .filter(|(_, section)| {
                section
                    .as_ref()
                    .map(|matter| matter.total_count() > 0)
                    .unwrap_or(false)
            })
            .collect();

        put_var_u64(buf, self.flags.load(Ordering::SeqCst));
        put_var_u32(buf, sections.len() as u32);

        for (index, section) in sections.iter_mut() {
            if let Some(matter) = section.as_mut() {
                put_var_u32(buf, *index as u32);
                matter.write_to(buf)?;
            }
        }

        Ok(())
    }

    /// Read a chunk written by [`MantleChunk::write_to`]
    pub fn read_from(
        x: usize,
        z: usize,
        reader: &mut ByteReader<'_>,
        world_height: usize,
        factory: Arc<SectionFactory>,
    ) -> Result<Self> {
        let chunk = Self::new(x, z, world_height, factory);
        chunk.flags.store(reader.read_var_u64()?, Ordering::SeqCst);

        let count = reader.read_var_u32()? as usize;
        for _ in 0..count {
            let index = reader.read_var_u32()? as usize;
            let slot = chunk.slot(index).map_err(|_| {
                MantleError::Corrupt(format!(
                    "chunk ({}, {}) section {} beyond world height {}",
                    x, z, index, world_height
                ))
            })?;

            let matter = Matter::read_from(reader, chunk.factory.registry())?;
            if !matter.is_section() {
                return Err(MantleError::Corrupt(format!(
                    "chunk ({}, {}) section {} is {}×{}×{}, expected {}³",
                    x,
                    z,
                    index,
                    matter.width(),
                    matter.height(),
                    matter.depth(),
                    SECTION_HEIGHT
                )));
            }
            *slot.lock() = Some(matter);
        }

        Ok(chunk)
    }
}

impl std::fmt::Debug for MantleChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MantleChunk")
            .field("x", &self.x)
            .field("z", &self.z)
            .field("flags", &MantleFlag::decode(self.flag_bits()).collect::<Vec<_>>())
            .finish()
    }
}
