//! Per-address get/set for the two kinds of watch variable.

use std::sync::Arc;

use tracing::debug;

use crate::address::Context;
use crate::memory::{Addressing, PrimitiveType};
use crate::special::SpecialVariable;

/// Text returned for an address that could not be read.
pub const UNREADABLE: &str = "?";

/// Reads and writes one variable at one resolved address.
///
/// Failures are reported as `None` / `false`; they are expected whenever the
/// game frees a slot or the emulator exits.
pub trait Accessor {
    fn get(&self, ctx: &Context<'_>, address: u32) -> Option<String>;

    fn set(&self, ctx: &Context<'_>, value: &str, address: u32) -> bool;
}

/// A typed memory cell, optionally restricted to the bits of a mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedAccessor {
    pub ty: PrimitiveType,
    pub mask: Option<u64>,
    pub addressing: Addressing,
}

impl TypedAccessor {
    pub fn new(ty: PrimitiveType, mask: Option<u64>, addressing: Addressing) -> Self {
        Self {
            ty,
            mask,
            addressing,
        }
    }

    /// Masked storage bits at `address`.
    pub fn get_bits(&self, ctx: &Context<'_>, address: u32) -> Option<u64> {
        ctx.stream
            .read_raw(self.ty, address, self.addressing)
            .map(|bits| bits & self.mask.unwrap_or(u64::MAX))
            .map_err(|e| debug!("Read of {} at 0x{:08X} failed: {}", self.ty, address, e))
            .ok()
    }

    /// Write already-encoded bits, honouring the mask.
    pub fn set_bits(&self, ctx: &Context<'_>, bits: u64, address: u32) -> bool {
        ctx.stream
            .set_raw_masked(self.ty, bits, address, self.addressing, self.mask)
            .map_err(|e| debug!("Write of {} at 0x{:08X} failed: {}", self.ty, address, e))
            .is_ok()
    }
}

impl Accessor for TypedAccessor {
    fn get(&self, ctx: &Context<'_>, address: u32) -> Option<String> {
        self.get_bits(ctx, address)
            .map(|bits| self.ty.decode(bits).to_string())
    }

    fn set(&self, ctx: &Context<'_>, value: &str, address: u32) -> bool {
        ctx.stream
            .set_value_rounding_wrapping(self.ty, value, address, self.addressing, self.mask)
    }
}

/// A computed quantity bound to a registered handler.
#[derive(Clone)]
pub struct SpecialAccessor {
    pub id: String,
    pub handler: Arc<dyn SpecialVariable>,
}

impl Accessor for SpecialAccessor {
    fn get(&self, ctx: &Context<'_>, address: u32) -> Option<String> {
        self.handler.get(ctx, address)
    }

    fn set(&self, ctx: &Context<'_>, value: &str, address: u32) -> bool {
        self.handler.set(ctx, value, address)
    }
}

impl std::fmt::Debug for SpecialAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecialAccessor")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::BaseAddressTable;
    use crate::memory::{BufferStream, MemoryStream};
    use crate::version::GameVersion;

    #[test]
    fn test_typed_get_set() {
        let stream = BufferStream::new(0x20);
        let bases = BaseAddressTable::new();
        let ctx = Context::new(GameVersion::Us, &stream, &bases);
        let accessor = TypedAccessor::new(PrimitiveType::Short, None, Addressing::Ram);

        assert!(accessor.set(&ctx, "-5", 0x8000_0004));
        assert_eq!(accessor.get(&ctx, 0x8000_0004).as_deref(), Some("-5"));
    }

    #[test]
    fn test_typed_get_out_of_range_is_none() {
        let stream = BufferStream::new(0x20);
        let bases = BaseAddressTable::new();
        let ctx = Context::new(GameVersion::Us, &stream, &bases);
        let accessor = TypedAccessor::new(PrimitiveType::Int, None, Addressing::Ram);

        assert_eq!(accessor.get(&ctx, 0x8000_1000), None);
        assert!(!accessor.set(&ctx, "1", 0x8000_1000));
    }

    #[test]
    fn test_masked_bits_round_trip() {
        let stream = BufferStream::new(0x20);
        let bases = BaseAddressTable::new();
        let ctx = Context::new(GameVersion::Us, &stream, &bases);
        stream
            .write_raw(PrimitiveType::Byte, 0xA5, 0x10, Addressing::Ram)
            .unwrap();

        let accessor = TypedAccessor::new(PrimitiveType::Byte, Some(0x0F), Addressing::Ram);
        assert_eq!(accessor.get_bits(&ctx, 0x10), Some(0x05));
        assert!(accessor.set_bits(&ctx, 0x03, 0x10));
        assert_eq!(
            stream.read_raw(PrimitiveType::Byte, 0x10, Addressing::Ram).unwrap(),
            0xA3
        );
    }
}
