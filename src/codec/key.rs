//! Coordinate packing and block coordinate decomposition.

/// Blocks per chunk edge and per vertical section
pub const SECTION_HEIGHT: usize = 16;

/// Mask for a block offset inside its chunk (`& 15`)
pub const CHUNK_MASK: i32 = 15;

/// Mask for a chunk offset inside its region (`& 31`)
pub const REGION_MASK: i32 = 31;

/// Pack two signed 32-bit coordinates into one 64-bit key.
///
/// `x` occupies the high half and `z` the low half, so the mapping is a
/// bijection between `(i32, i32)` and `i64`.
#[inline]
pub fn pack(x: i32, z: i32) -> i64 {
    ((x as i64) << 32) | (z as u32 as i64)
}

/// Inverse of [`pack`]
#[inline]
pub fn unpack(key: i64) -> (i32, i32) {
    ((key >> 32) as i32, key as i32)
}

/// A block position and its place in the chunk / section / region hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn chunk_x(&self) -> i32 {
        self.x >> 4
    }

    pub fn chunk_z(&self) -> i32 {
        self.z >> 4
    }

    pub fn region_x(&self) -> i32 {
        self.chunk_x() >> 5
    }

    pub fn region_z(&self) -> i32 {
        self.chunk_z() >> 5
    }

    /// Chunk x inside its region (0..32)
    pub fn region_local_x(&self) -> usize {
        (self.chunk_x() & REGION_MASK) as usize
    }

    /// Chunk z inside its region (0..32)
    pub fn region_local_z(&self) -> usize {
        (self.chunk_z() & REGION_MASK) as usize
    }

    /// Vertical section index. Only meaningful for `y >= 0`.
    pub fn section(&self) -> usize {
        (self.y >> 4) as usize
    }

    pub fn local_x(&self) -> usize {
        (self.x & CHUNK_MASK) as usize
    }

    pub fn local_y(&self) -> usize {
        (self.y & CHUNK_MASK) as usize
    }

    pub fn local_z(&self) -> usize {
        (self.z & CHUNK_MASK) as usize
    }

    /// Packed key of the owning region
    pub fn region_key(&self) -> i64 {
        pack(self.region_x(), self.region_z())
    }

    /// Packed key of the owning chunk
    pub fn chunk_key(&self) -> i64 {
        pack(self.chunk_x(), self.chunk_z())
    }
}
