//! Per-chunk boolean markers.

/// A boolean marker stored in a chunk's flag set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MantleFlag {
    Generated = 0,
    Decorated = 1,
    Planned = 2,
    Updated = 3,
    Real = 4,
    Feature = 5,
    Object = 6,
    Jigsaw = 7,
    Discovered = 8,
    Custom0 = 9,
    Custom1 = 10,
    Custom2 = 11,
    Custom3 = 12,
}

impl MantleFlag {
    pub const ALL: [MantleFlag; 13] = [
        MantleFlag::Generated,
        MantleFlag::Decorated,
        MantleFlag::Planned,
        MantleFlag::Updated,
        MantleFlag::Real,
        MantleFlag::Feature,
        MantleFlag::Object,
        MantleFlag::Jigsaw,
        MantleFlag::Discovered,
        MantleFlag::Custom0,
        MantleFlag::Custom1,
        MantleFlag::Custom2,
        MantleFlag::Custom3,
    ];

    /// Bit of this flag in a chunk's flag set
    pub fn bit(self) -> u64 {
        1u64 << (self as u8)
    }

    /// Flags set in `bits`
    pub fn decode(bits: u64) -> impl Iterator<Item = MantleFlag> {
        Self::ALL.into_iter().filter(move |flag| bits & flag.bit() != 0)
    }
}
