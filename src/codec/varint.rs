//! Unsigned LEB128 varints.
//!
//! Decoding lives on [`super::ByteReader`] so that truncated input surfaces
//! as a corruption error instead of a panic.

use bytes::{BufMut, BytesMut};

/// Write a `u32` as a varint (1 to 5 bytes)
pub fn put_var_u32(buf: &mut BytesMut, value: u32) {
    put_var_u64(buf, value as u64);
}

/// Write a `u64` as a varint (1 to 10 bytes)
pub fn put_var_u64(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Number of bytes `value` occupies once encoded
pub fn var_u64_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}
