//! Value types storable in a Matter slice.

use bytes::{BufMut, BytesMut};

use crate::codec::{put_utf, ByteReader};
use crate::error::Result;

/// A value type that can live in a [`TypedSlice`](super::TypedSlice).
///
/// `TAG` is the canonical type identifier written into every serialized
/// slice header. It must be stable across versions and identical on the
/// writing and reading side, and no two registered types may share one.
pub trait MatterValue: Clone + PartialEq + Send + Sync + 'static {
    /// Canonical type identifier
    const TAG: &'static str;

    /// Encode one value
    fn write_node(&self, buf: &mut BytesMut) -> Result<()>;

    /// Decode one value
    fn read_node(reader: &mut ByteReader<'_>) -> Result<Self>;

    /// Whether two values share one palette entry. Must be reflexive, so a
    /// value always finds itself again after a write/read cycle.
    fn palette_eq(&self, other: &Self) -> bool {
        self == other
    }
}

macro_rules! fixed_width_value {
    ($ty:ty, $tag:literal, $put:ident, $read:ident) => {
        impl MatterValue for $ty {
            const TAG: &'static str = $tag;

            fn write_node(&self, buf: &mut BytesMut) -> Result<()> {
                buf.$put(*self);
                Ok(())
            }

            fn read_node(reader: &mut ByteReader<'_>) -> Result<Self> {
                reader.$read()
            }
        }
    };
}

/// Floats compare by bit pattern: `-0.0` keeps its sign and NaN matches itself
macro_rules! float_value {
    ($ty:ty, $tag:literal, $put:ident, $read:ident) => {
        impl MatterValue for $ty {
            const TAG: &'static str = $tag;

            fn write_node(&self, buf: &mut BytesMut) -> Result<()> {
                buf.$put(*self);
                Ok(())
            }

            fn read_node(reader: &mut ByteReader<'_>) -> Result<Self> {
                reader.$read()
            }

            fn palette_eq(&self, other: &Self) -> bool {
                self.to_bits() == other.to_bits()
            }
        }
    };
}

fixed_width_value!(i8, "i8", put_i8, read_i8);
fixed_width_value!(i16, "i16", put_i16, read_i16);
fixed_width_value!(i32, "i32", put_i32, read_i32);
fixed_width_value!(i64, "i64", put_i64, read_i64);
float_value!(f32, "f32", put_f32, read_f32);
float_value!(f64, "f64", put_f64, read_f64);

impl MatterValue for bool {
    const TAG: &'static str = "bool";

    fn write_node(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(*self as u8);
        Ok(())
    }

    fn read_node(reader: &mut ByteReader<'_>) -> Result<Self> {
        reader.read_bool()
    }
}

impl MatterValue for String {
    const TAG: &'static str = "string";

    fn write_node(&self, buf: &mut BytesMut) -> Result<()> {
        put_utf(buf, self)
    }

    fn read_node(reader: &mut ByteReader<'_>) -> Result<Self> {
        reader.read_utf()
    }
}
