use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Fixed-width primitive stored in game memory.
///
/// Names follow the profile format (`byte`, `sbyte`, `short`, ...). Width and
/// signedness are static properties of the kind.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PrimitiveType {
    Byte,
    SByte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
}

impl PrimitiveType {
    pub fn byte_count(&self) -> usize {
        match self {
            Self::Byte | Self::SByte => 1,
            Self::Short | Self::UShort => 2,
            Self::Int | Self::UInt | Self::Float => 4,
            Self::Long | Self::ULong | Self::Double => 8,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            Self::SByte | Self::Short | Self::Int | Self::Long | Self::Float | Self::Double
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Hex digits needed to print a full-width value (used for mask display).
    pub fn nibble_count(&self) -> usize {
        self.byte_count() * 2
    }

    /// All bits of the storage cell set.
    pub fn width_mask(&self) -> u64 {
        match self.byte_count() {
            8 => u64::MAX,
            n => (1u64 << (n * 8)) - 1,
        }
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }
}
