//! Parallel universe (PU) coordinates.
//!
//! The game truncates positions to 16 bits for collision, so the world repeats
//! every 65536 units. A PU index identifies which copy a float coordinate is
//! in, with PU 0 centred on the origin.

use tracing::debug;

use super::SpecialVariable;
use crate::address::Context;
use crate::memory::{Addressing, Number, PrimitiveType};

pub const PU_SIZE: f64 = 65536.0;
pub const PU_OFFSET: f64 = 32768.0;

/// PU index of a coordinate. Each PU spans `[-32768, 32768)` around its
/// centre, so a lower boundary such as -98304 belongs to PU -1.
pub fn pu_from_coord(coord: f32) -> i32 {
    ((coord as f64 + PU_OFFSET) / PU_SIZE).floor() as i32
}

/// Position inside the coordinate's own PU.
pub fn relative_pu_position(coord: f32) -> f32 {
    (coord as f64 - pu_from_coord(coord) as f64 * PU_SIZE) as f32
}

/// Quarter PU index (QPU), used for speed-based PU movement.
pub fn qpu_from_coord(coord: f32) -> f64 {
    pu_from_coord(coord) as f64 / 4.0
}

/// Built-in handlers over a float coordinate stored at the variable address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PuAxis {
    /// PU index; setting moves the coordinate to that PU keeping its relative position.
    Index,
    /// Position relative to the current PU; setting keeps the PU.
    Relative,
    /// PU index divided by four. Read-only.
    QuarterIndex,
}

impl PuAxis {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Index => "PuIndex",
            Self::Relative => "PuRelative",
            Self::QuarterIndex => "QpuIndex",
        }
    }
}

fn read_coord(ctx: &Context<'_>, address: u32) -> Option<f32> {
    ctx.stream
        .read_raw(PrimitiveType::Float, address, Addressing::Ram)
        .map(|bits| f32::from_bits(bits as u32))
        .map_err(|e| debug!("PU coordinate read at 0x{:08X} failed: {}", address, e))
        .ok()
}

fn write_coord(ctx: &Context<'_>, address: u32, coord: f64) -> bool {
    let bits = (coord as f32).to_bits() as u64;
    ctx.stream
        .write_raw(PrimitiveType::Float, bits, address, Addressing::Ram)
        .map_err(|e| debug!("PU coordinate write at 0x{:08X} failed: {}", address, e))
        .is_ok()
}

impl SpecialVariable for PuAxis {
    fn get(&self, ctx: &Context<'_>, address: u32) -> Option<String> {
        let coord = read_coord(ctx, address)?;
        Some(match self {
            Self::Index => pu_from_coord(coord).to_string(),
            Self::Relative => relative_pu_position(coord).to_string(),
            Self::QuarterIndex => qpu_from_coord(coord).to_string(),
        })
    }

    fn set(&self, ctx: &Context<'_>, value: &str, address: u32) -> bool {
        let Some(number) = Number::parse(value) else {
            return false;
        };
        let Some(coord) = read_coord(ctx, address) else {
            return false;
        };

        let target = match self {
            Self::Index => {
                let pu = number.as_f64().round_ties_even();
                relative_pu_position(coord) as f64 + pu * PU_SIZE
            }
            Self::Relative => number.as_f64() + pu_from_coord(coord) as f64 * PU_SIZE,
            Self::QuarterIndex => return false,
        };
        if !target.is_finite() {
            return false;
        }
        write_coord(ctx, address, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::BaseAddressTable;
    use crate::memory::{BufferStream, MemoryStream};
    use crate::version::GameVersion;

    #[test]
    fn test_pu_from_coord() {
        assert_eq!(pu_from_coord(0.0), 0);
        assert_eq!(pu_from_coord(32767.0), 0);
        assert_eq!(pu_from_coord(32768.0), 1);
        assert_eq!(pu_from_coord(-32768.0), 0);
        assert_eq!(pu_from_coord(-32769.0), -1);
        assert_eq!(pu_from_coord(-65536.0), -1);
        assert_eq!(pu_from_coord(131072.0), 2);
    }

    #[test]
    fn test_pu_lower_boundaries_stay_in_range() {
        assert_eq!(pu_from_coord(-98304.0), -1);
        assert_eq!(pu_from_coord(-98305.0), -2);
        assert_eq!(relative_pu_position(-98304.0), -32768.0);
        assert_eq!(pu_from_coord(98304.0), 2);
        assert_eq!(relative_pu_position(98304.0), -32768.0);
    }

    #[test]
    fn test_relative_position() {
        assert_eq!(relative_pu_position(65636.0), 100.0);
        assert_eq!(relative_pu_position(-65636.0), -100.0);
        assert_eq!(relative_pu_position(500.0), 500.0);
    }

    #[test]
    fn test_qpu() {
        assert_eq!(qpu_from_coord(4.0 * 65536.0), 1.0);
        assert_eq!(qpu_from_coord(65536.0), 0.25);
    }

    #[test]
    fn test_handlers_move_coordinate() {
        let stream = BufferStream::new(0x10);
        let bases = BaseAddressTable::new();
        let ctx = Context::new(GameVersion::Us, &stream, &bases);
        stream
            .write_raw(
                PrimitiveType::Float,
                (1000.0f32).to_bits() as u64,
                4,
                Addressing::Ram,
            )
            .unwrap();

        assert_eq!(PuAxis::Index.get(&ctx, 4).as_deref(), Some("0"));
        assert!(PuAxis::Index.set(&ctx, "2", 4));
        assert_eq!(PuAxis::Index.get(&ctx, 4).as_deref(), Some("2"));
        assert_eq!(PuAxis::Relative.get(&ctx, 4).as_deref(), Some("1000"));
        assert_eq!(PuAxis::QuarterIndex.get(&ctx, 4).as_deref(), Some("0.5"));

        assert!(PuAxis::Relative.set(&ctx, "-250", 4));
        let bits = stream
            .read_raw(PrimitiveType::Float, 4, Addressing::Ram)
            .unwrap();
        assert_eq!(f32::from_bits(bits as u32), 2.0 * 65536.0 - 250.0);

        assert!(!PuAxis::QuarterIndex.set(&ctx, "1", 4));
        assert!(!PuAxis::Index.set(&ctx, "north", 4));
    }
}
