//! Value Palette
//!
//! Deduplicated, insertion-ordered table of values of one type. A slice
//! builds a fresh palette every time it is written and writes cell values as
//! palette indices, so K copies of one value cost one palette entry.
//! Identity is [`MatterValue::palette_eq`], not `==`.
//!
//! ## Format
//! ```text
//! ┌──────────────┬──────────────────────────────┐
//! │ Count (var)  │ Value × Count (slice codec)  │
//! └──────────────┴──────────────────────────────┘
//! ```

use bytes::BytesMut;
use parking_lot::Mutex;

use crate::codec::{put_var_u32, ByteReader};
use crate::error::{MantleError, Result};

use super::MatterValue;

/// Ordered table of unique values; index = insertion position
pub struct Palette<T> {
    values: Mutex<Vec<T>>,
}

impl<T: MatterValue> Palette<T> {
    /// Create an empty palette
    pub fn new() -> Self {
        Self {
            values: Mutex::new(Vec::with_capacity(16)),
        }
    }

    /// Index of `value`, appending it if it is not present yet
    pub fn index_of(&self, value: &T) -> u32 {
        let mut values = self.values.lock();
        match values.iter().position(|v| v.palette_eq(value)) {
            Some(index) => index as u32,
            None => {
                values.push(value.clone());
                (values.len() - 1) as u32
            }
        }
    }

    /// Value at `index`, if it exists
    pub fn get(&self, index: u32) -> Option<T> {
        self.values.lock().get(index as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }

    /// Write the count followed by every value in index order
    pub fn write(&self, buf: &mut BytesMut) -> Result<()> {
        let values = self.values.lock();
        let count = u32::try_from(values.len()).map_err(|_| {
            MantleError::Corrupt(format!("palette of {} entries is too large", values.len()))
        })?;
        put_var_u32(buf, count);
        for value in values.iter() {
            value.write_node(buf)?;
        }
        Ok(())
    }

    /// Read a palette written by [`Palette::write`]
    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        let count = reader.read_var_u32()? as usize;

        let mut values = Vec::with_capacity(count.min(reader.remaining()));
        for _ in 0..count {
            values.push(T::read_node(reader)?);
        }

        Ok(Self {
            values: Mutex::new(values),
        })
    }
}

impl<T: MatterValue> Default for Palette<T> {
    fn default() -> Self {
        Self::new()
    }
}
