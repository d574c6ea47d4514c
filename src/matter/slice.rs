//! Slices
//!
//! A slice is one dense layer of a Matter holding values of a single type.
//!
//! ## Body Format
//! ```text
//! ┌───────────┬──────────────┬────────────────────────────────────────┐
//! │ Palette   │ Nodes (var)  │ (Position (var), PaletteIndex (var))×N │
//! └───────────┴──────────────┴────────────────────────────────────────┘
//! position = z * (width * height) + y * width + x
//! ```

use std::any::Any;

use bytes::BytesMut;

use crate::codec::{put_var_u32, ByteReader};
use crate::error::{MantleError, Result};

use super::{MatterValue, Palette};

/// Type-erased view of a slice, used by [`Matter`](super::Matter) to hold
/// heterogeneous layers in one map
pub trait Slice: Send + Sync + 'static {
    /// Canonical type identifier of the values held
    fn tag(&self) -> &'static str;

    /// Number of occupied cells
    fn entry_count(&self) -> usize;

    /// Empty every cell
    fn clear(&mut self);

    /// Write palette, node count and nodes
    fn write_body(&self, buf: &mut BytesMut) -> Result<()>;

    /// Replace the contents with a body written by [`Slice::write_body`]
    fn read_body(&mut self, reader: &mut ByteReader<'_>) -> Result<()>;

    fn box_clone(&self) -> Box<dyn Slice>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Dense 3D array of one value type
#[derive(Debug, Clone)]
pub struct TypedSlice<T> {
    width: usize,
    height: usize,
    depth: usize,
    cells: Vec<Option<T>>,
    count: usize,
}

impl<T: MatterValue> TypedSlice<T> {
    /// Create an empty slice. Dimensions are validated by the owning Matter.
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        let mut cells = Vec::new();
        cells.resize_with(width * height * depth, || None);
        Self {
            width,
            height,
            depth,
            cells,
            count: 0,
        }
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

    /// Number of occupied cells
    pub fn entry_count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Linear position of a cell, or `None` outside the slice
    pub fn position(&self, x: usize, y: usize, z: usize) -> Option<usize> {
        if x >= self.width || y >= self.height || z >= self.depth {
            return None;
        }
        Some(z * self.width * self.height + y * self.width + x)
    }

    fn coordinates(&self, position: usize) -> (usize, usize, usize) {
        let x = position % self.width;
        let y = (position / self.width) % self.height;
        let z = position / (self.width * self.height);
        (x, y, z)
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<&T> {
        self.position(x, y, z)
            .and_then(|p| self.cells[p].as_ref())
    }

    /// Store `value`, returning the previous one. Cells outside the slice
    /// are ignored.
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: T) -> Option<T> {
        let position = self.position(x, y, z)?;
        self.put(position, value)
    }

    /// Empty a cell, returning what was there
    pub fn remove(&mut self, x: usize, y: usize, z: usize) -> Option<T> {
        let position = self.position(x, y, z)?;
        let previous = self.cells[position].take();
        if previous.is_some() {
            self.count -= 1;
        }
        previous
    }

    fn put(&mut self, position: usize, value: T) -> Option<T> {
        let previous = self.cells[position].replace(value);
        if previous.is_none() {
            self.count += 1;
        }
        previous
    }

    /// Occupied cells as `(x, y, z, value)` in ascending position order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, usize, &T)> + '_ {
        self.cells.iter().enumerate().filter_map(move |(position, cell)| {
            cell.as_ref().map(|value| {
                let (x, y, z) = self.coordinates(position);
                (x, y, z, value)
            })
        })
    }
}

impl<T: MatterValue> Slice for TypedSlice<T> {
    fn tag(&self) -> &'static str {
        T::TAG
    }

    fn entry_count(&self) -> usize {
        self.count
    }

    fn clear(&mut self) {
        self.cells.iter_mut().for_each(|cell| *cell = None);
        self.count = 0;
    }

    fn write_body(&self, buf: &mut BytesMut) -> Result<()> {
        // Pass 1: build the palette and remember each node's index
        let palette = Palette::new();
        let nodes: Vec<(u32, u32)> = self
            .cells
            .iter()
            .enumerate()
            .filter_map(|(position, cell)| {
                cell.as_ref()
                    .map(|value| (position as u32, palette.index_of(value)))
            })
            .collect();

        // Pass 2: palette first so the reader can resolve indices
        palette.write(buf)?;
        put_var_u32(buf, nodes.len() as u32);
        for (position, index) in nodes {
            put_var_u32(buf, position);
            put_var_u32(buf, index);
        }

        Ok(())
    }

    fn read_body(&mut self, reader: &mut ByteReader<'_>) -> Result<()> {
        self.clear();

        let palette = Palette::<T>::read(reader)?;
        let node_count = reader.read_var_u32()? as usize;
        if node_count > self.cells.len() {
            return Err(MantleError::Corrupt(format!(
                "slice '{}' claims {} nodes for a volume of {}",
                T::TAG,
                node_count,
                self.cells.len()
            )));
        }

        for _ in 0..node_count {
            let position = reader.read_var_u32()? as usize;
            let index = reader.read_var_u32()?;

            if position >= self.cells.len() {
                return Err(MantleError::Corrupt(format!(
                    "slice '{}' node position {} outside volume {}",
                    T::TAG,
                    position,
                    self.cells.len()
                )));
            }

            let value = palette.get(index).ok_or_else(|| {
                MantleError::Corrupt(format!(
                    "slice '{}' palette index {} out of {} entries",
                    T::TAG,
                    index,
                    palette.len()
                ))
            })?;

            self.put(position, value);
        }

        Ok(())
    }

    fn box_clone(&self) -> Box<dyn Slice> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
