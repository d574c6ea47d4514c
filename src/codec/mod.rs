//! Codec Module
//!
//! Low-level binary building blocks shared by the Matter and region formats.
//!
//! ## Conventions
//! - Fixed-width integers and floats are big-endian
//! - Strings are a `u16` byte length followed by UTF-8 bytes
//! - Varints are unsigned LEB128: 7 bits per byte, low group first,
//!   high bit set on every byte except the last
//!
//! ```text
//! 300 (0b1_0010_1100) → [0xAC, 0x02]
//! ```

mod key;
mod reader;
mod varint;

pub use key::{pack, unpack, BlockPos, CHUNK_MASK, REGION_MASK, SECTION_HEIGHT};
pub use reader::ByteReader;
pub use varint::{put_var_u32, put_var_u64, var_u64_len};

use bytes::{BufMut, BytesMut};

use crate::error::{MantleError, Result};

/// Write a length-prefixed UTF-8 string
pub fn put_utf(buf: &mut BytesMut, value: &str) -> Result<()> {
    let len = u16::try_from(value.len()).map_err(|_| {
        MantleError::Corrupt(format!(
            "string of {} bytes exceeds the {} byte limit",
            value.len(),
            u16::MAX
        ))
    })?;
    buf.put_u16(len);
    buf.put_slice(value.as_bytes());
    Ok(())
}
