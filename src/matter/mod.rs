//! Matter Module
//!
//! A Matter is a fixed-size 3D grid holding independent per-type slices.
//! A slice for a type exists only after the first write of that type, and
//! empty slices are pruned before serialization.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Width: i32 | Height: i32 | Depth: i32 | SliceCount: u8  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Header: Author (utf) | CreatedAt (var) | Version (var)  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Slice × SliceCount                                      │
//! │   TypeTag (utf) | Palette | Nodes (var) | Node × Nodes  │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod header;
mod palette;
mod registry;
mod slice;
mod value;

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};

use crate::codec::{put_utf, ByteReader, SECTION_HEIGHT};
use crate::error::{MantleError, Result};

pub use header::{MatterHeader, DEFAULT_AUTHOR, MATTER_VERSION};
pub use palette::Palette;
pub use registry::{SliceFactory, SliceRegistry};
pub use slice::{Slice, TypedSlice};
pub use value::MatterValue;

/// Largest cell count accepted when reading untrusted bytes
pub const MAX_READ_VOLUME: usize = 1 << 26;

/// Typed multi-slice 3D grid
pub struct Matter {
    header: MatterHeader,
    width: usize,
    height: usize,
    depth: usize,
    /// Keyed by type tag; a BTreeMap keeps the serialized slice order stable
    slices: BTreeMap<&'static str, Box<dyn Slice>>,
    registry: Arc<SliceRegistry>,
}

impl Matter {
    /// Create an empty Matter. Every dimension must be at least 1.
    pub fn new(width: usize, height: usize, depth: usize, registry: Arc<SliceRegistry>) -> Result<Self> {
        if width < 1 || height < 1 || depth < 1 {
            return Err(MantleError::InvalidDimensions {
                width,
                height,
                depth,
            });
        }

        Ok(Self::with_dimensions(width, height, depth, registry))
    }

    /// A 16×16×16 chunk section
    pub fn section(registry: Arc<SliceRegistry>) -> Self {
        Self::with_dimensions(SECTION_HEIGHT, SECTION_HEIGHT, SECTION_HEIGHT, registry)
    }

    fn with_dimensions(width: usize, height: usize, depth: usize, registry: Arc<SliceRegistry>) -> Self {
        Self {
            header: MatterHeader::default(),
            width,
            height,
            depth,
            slices: BTreeMap::new(),
            registry,
        }
    }

    /// Whether this Matter has chunk section dimensions
    pub fn is_section(&self) -> bool {
        self.width == SECTION_HEIGHT && self.height == SECTION_HEIGHT && self.depth == SECTION_HEIGHT
    }

    pub fn header(&self) -> &MatterHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut MatterHeader {
        &mut self.header
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn registry(&self) -> &Arc<SliceRegistry> {
        &self.registry
    }

    // =========================================================================
    // Slices
    // =========================================================================

    /// The slice for `T`, created on first use.
    ///
    /// Fails with [`MantleError::UnknownType`] if `T` is not registered.
    pub fn slice<T: MatterValue>(&mut self) -> Result<&mut TypedSlice<T>> {
        let slice = match self.slices.entry(T::TAG) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let created = self
                    .registry
                    .create(T::TAG, self.width, self.height, self.depth)?;
                entry.insert(created)
            }
        };

        slice
            .as_any_mut()
            .downcast_mut::<TypedSlice<T>>()
            .ok_or_else(|| MantleError::TypeMismatch {
                tag: T::TAG.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// The slice for `T` if one exists, without creating it
    pub fn get_slice<T: MatterValue>(&self) -> Option<&TypedSlice<T>> {
        self.slices
            .get(T::TAG)
            .and_then(|slice| slice.as_any().downcast_ref::<TypedSlice<T>>())
    }

    fn get_slice_mut<T: MatterValue>(&mut self) -> Option<&mut TypedSlice<T>> {
        self.slices
            .get_mut(T::TAG)
            .and_then(|slice| slice.as_any_mut().downcast_mut::<TypedSlice<T>>())
    }

    pub fn has_slice<T: MatterValue>(&self) -> bool {
        self.slices.contains_key(T::TAG)
    }

    /// Drop the slice for `T`, returning whether it existed
    pub fn delete_slice<T: MatterValue>(&mut self) -> bool {
        self.slices.remove(T::TAG).is_some()
    }

    pub fn clear_slices(&mut self) {
        self.slices.clear();
    }

    /// Tags of every slice currently held
    pub fn slice_tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slices.keys().copied()
    }

    /// Number of slices currently held, empty ones included
    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    /// Drop every slice with no occupied cells
    pub fn trim_slices(&mut self) {
        self.slices.retain(|_, slice| slice.entry_count() > 0);
    }

    /// Occupied cells across all slices
    pub fn total_count(&self) -> usize {
        self.slices.values().map(|slice| slice.entry_count()).sum()
    }

    // =========================================================================
    // Cells
    // =========================================================================

    pub fn set<T: MatterValue>(&mut self, x: usize, y: usize, z: usize, value: T) -> Result<()> {
        self.slice::<T>()?.set(x, y, z, value);
        Ok(())
    }

    pub fn get<T: MatterValue>(&self, x: usize, y: usize, z: usize) -> Option<&T> {
        self.get_slice::<T>().and_then(|slice| slice.get(x, y, z))
    }

    /// Empty one cell of `T`. Does not create the slice.
    pub fn remove<T: MatterValue>(&mut self, x: usize, y: usize, z: usize) -> Option<T> {
        self.get_slice_mut::<T>()
            .and_then(|slice| slice.remove(x, y, z))
    }

    /// Deep copy sharing the same registry
    pub fn copy(&self) -> Matter {
        Matter {
            header: self.header.clone(),
            width: self.width,
            height: self.height,
            depth: self.depth,
            slices: self
                .slices
                .iter()
                .map(|(tag, slice)| (*tag, slice.box_clone()))
                .collect(),
            registry: Arc::clone(&self.registry),
        }
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Append the serialized Matter to `buf`. Empty slices are trimmed first.
    pub fn write_to(&mut self, buf: &mut BytesMut) -> Result<()> {
        self.trim_slices();

        let slice_count = u8::try_from(self.slices.len()).map_err(|_| {
            MantleError::Corrupt(format!(
                "{} slices exceed the per-matter limit of {}",
                self.slices.len(),
                u8::MAX
            ))
        })?;

        buf.put_i32(dimension(self.width)?);
        buf.put_i32(dimension(self.height)?);
        buf.put_i32(dimension(self.depth)?);
        buf.put_u8(slice_count);
        self.header.write(buf)?;

        for (tag, slice) in &self.slices {
            put_utf(buf, tag)?;
            slice.write_body(buf)?;
        }

        Ok(())
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::new();
        self.write_to(&mut buf)?;
        Ok(buf.to_vec())
    }

    pub fn write_file(&mut self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Read one Matter from the reader's current position.
    ///
    /// Any slice tag missing from `registry` aborts the whole read.
    pub fn read_from(reader: &mut ByteReader<'_>, registry: &Arc<SliceRegistry>) -> Result<Self> {
        let width = read_dimension(reader)?;
        let height = read_dimension(reader)?;
        let depth = read_dimension(reader)?;
        let volume = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(depth))
            .filter(|v| *v <= MAX_READ_VOLUME);
        if volume.is_none() {
            return Err(MantleError::Corrupt(format!(
                "matter size {}x{}x{} exceeds the readable volume of {}",
                width, height, depth, MAX_READ_VOLUME
            )));
        }

        let slice_count = reader.read_u8()?;

        let mut matter = Matter::new(width, height, depth, Arc::clone(registry))?;
        matter.header = MatterHeader::read(reader)?;

        for _ in 0..slice_count {
            let tag = reader.read_utf()?;
            let mut slice = registry.create(&tag, width, height, depth)?;
            slice.read_body(reader)?;

            if matter.slices.insert(slice.tag(), slice).is_some() {
                return Err(MantleError::Corrupt(format!("duplicate slice '{}'", tag)));
            }
        }

        Ok(matter)
    }

    pub fn read(bytes: &[u8], registry: &Arc<SliceRegistry>) -> Result<Self> {
        Self::read_from(&mut ByteReader::new(bytes), registry)
    }

    pub fn read_file(path: &Path, registry: &Arc<SliceRegistry>) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::read(&bytes, registry)
    }
}

impl std::fmt::Debug for Matter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matter")
            .field("size", &(self.width, self.height, self.depth))
            .field("slices", &self.slices.keys().collect::<Vec<_>>())
            .field("total_count", &self.total_count())
            .finish()
    }
}

fn dimension(value: usize) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| MantleError::Corrupt(format!("dimension {} does not fit in i32", value)))
}

fn read_dimension(reader: &mut ByteReader<'_>) -> Result<usize> {
    let offset = reader.position();
    let value = reader.read_i32()?;
    if value < 1 {
        return Err(MantleError::Corrupt(format!(
            "invalid matter dimension {} at offset {}",
            value, offset
        )));
    }
    Ok(value as usize)
}
