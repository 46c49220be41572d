//! Scoped access to emulated game memory inside a host process.
//!
//! The emulator keeps game RAM as an array of little-endian 32-bit words, so a
//! big-endian game address has to be "swizzled" before sub-word accesses. The
//! stream offers two addressing modes:
//!
//! - [`Addressing::Ram`]: game RAM addresses (`0x80xxxxxx`), translated through
//!   the process memory offset and byte-swizzled.
//! - [`Addressing::Absolute`]: raw process addresses, read verbatim.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use tracing::debug;

use crate::error::Result;
use crate::memory::value::apply_mask;
use crate::memory::{PrimitiveType, Value};

/// Bits of a game address that select a byte of physical RAM.
pub const RAM_ADDRESS_MASK: u32 = 0x0FFF_FFFF;

/// Bit set on addresses in the cached kernel segment.
pub const RAM_ADDRESS_AREA: u32 = 0x8000_0000;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Addressing {
    #[default]
    Ram,
    Absolute,
}

/// Byte swizzle for a sub-word access inside little-endian stored words.
pub fn convert_address_endianness(address: u64, byte_count: usize) -> u64 {
    match byte_count {
        1 => address ^ 0x3,
        2 => address ^ 0x2,
        _ => address,
    }
}

/// Live memory of the emulator process.
///
/// Implementors provide raw process I/O and the suspend/resume pair; typed
/// access is layered on top by the provided methods. All methods take `&self`
/// because the stream is shared by every variable and lock of a session.
pub trait MemoryStream {
    /// Read `len` bytes at a process address.
    fn read_process(&self, address: u64, len: usize) -> Result<Vec<u8>>;

    /// Write bytes at a process address.
    fn write_process(&self, address: u64, bytes: &[u8]) -> Result<()>;

    /// Process address of game RAM address 0.
    fn process_memory_offset(&self) -> u64;

    fn is_suspended(&self) -> bool;

    fn suspend(&self) -> Result<()>;

    fn resume(&self) -> Result<()>;

    fn ram_to_process(&self, address: u32, byte_count: usize) -> u64 {
        let physical = (address & RAM_ADDRESS_MASK) as u64;
        convert_address_endianness(physical, byte_count) + self.process_memory_offset()
    }

    fn process_to_ram(&self, address: u64, byte_count: usize) -> u32 {
        let physical = address.wrapping_sub(self.process_memory_offset());
        convert_address_endianness(physical, byte_count) as u32
    }

    /// Read raw storage bits of `ty` (not masked).
    fn read_raw(&self, ty: PrimitiveType, address: u32, addressing: Addressing) -> Result<u64> {
        let count = ty.byte_count();
        match addressing {
            Addressing::Absolute => {
                let bytes = self.read_process(address as u64, count)?;
                Ok(le_bits(&bytes))
            }
            Addressing::Ram if count == 8 => {
                let bytes = self.read_process(self.ram_to_process(address, 4), 8)?;
                let high = le_bits(&bytes[..4]);
                let low = le_bits(&bytes[4..]);
                Ok((high << 32) | low)
            }
            Addressing::Ram => {
                let bytes = self.read_process(self.ram_to_process(address, count), count)?;
                Ok(le_bits(&bytes))
            }
        }
    }

    /// Write raw storage bits of `ty`, replacing the whole cell.
    fn write_raw(
        &self,
        ty: PrimitiveType,
        bits: u64,
        address: u32,
        addressing: Addressing,
    ) -> Result<()> {
        let count = ty.byte_count();
        match addressing {
            Addressing::Absolute => {
                self.write_process(address as u64, &bits.to_le_bytes()[..count])
            }
            Addressing::Ram if count == 8 => {
                let mut bytes = [0u8; 8];
                bytes[..4].copy_from_slice(&((bits >> 32) as u32).to_le_bytes());
                bytes[4..].copy_from_slice(&(bits as u32).to_le_bytes());
                self.write_process(self.ram_to_process(address, 4), &bytes)
            }
            Addressing::Ram => self.write_process(
                self.ram_to_process(address, count),
                &bits.to_le_bytes()[..count],
            ),
        }
    }

    /// Write `bits`, touching only the bits selected by `mask`.
    fn set_raw_masked(
        &self,
        ty: PrimitiveType,
        bits: u64,
        address: u32,
        addressing: Addressing,
        mask: Option<u64>,
    ) -> Result<()> {
        let bits = match mask {
            Some(mask) => {
                let old = self.read_raw(ty, address, addressing)?;
                apply_mask(old, bits, mask & ty.width_mask())
            }
            None => bits,
        };
        self.write_raw(ty, bits, address, addressing)
    }

    fn get_value(
        &self,
        ty: PrimitiveType,
        address: u32,
        addressing: Addressing,
        mask: Option<u64>,
    ) -> Result<Value> {
        let bits = self.read_raw(ty, address, addressing)?;
        Ok(ty.decode(bits & mask.unwrap_or(u64::MAX)))
    }

    /// Parse `input`, fit it into `ty` and write it. Returns `false` when the
    /// text cannot be converted or the write fails.
    fn set_value_rounding_wrapping(
        &self,
        ty: PrimitiveType,
        input: &str,
        address: u32,
        addressing: Addressing,
        mask: Option<u64>,
    ) -> bool {
        let result = ty
            .encode_rounding_wrapping(input)
            .and_then(|bits| self.set_raw_masked(ty, bits, address, addressing, mask));

        match result {
            Ok(()) => true,
            Err(e) => {
                debug!("Write of '{}' to 0x{:08X} failed: {}", input, address, e);
                false
            }
        }
    }

    /// Raw bytes of game RAM as stored by the emulator (no swizzling).
    fn read_ram_little_endian(&self, address: u32, len: usize) -> Result<Vec<u8>> {
        let start = (address & RAM_ADDRESS_MASK) as u64 + self.process_memory_offset();
        self.read_process(start, len)
    }

    fn write_ram_little_endian(&self, bytes: &[u8], address: u32) -> Result<()> {
        let start = (address & RAM_ADDRESS_MASK) as u64 + self.process_memory_offset();
        self.write_process(start, bytes)
    }
}

fn le_bits(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0u64, |acc, &byte| (acc << 8) | byte as u64)
}

/// Scoped write batch over a stream.
///
/// Suspends the stream on creation unless it is already suspended, and
/// resumes it on drop only if this guard performed the suspend. Nested
/// batches therefore reach the stream with exactly one suspend/resume pair.
pub struct BatchGuard<'a> {
    stream: &'a dyn MemoryStream,
    owns_suspend: bool,
}

impl<'a> BatchGuard<'a> {
    pub fn begin(stream: &'a dyn MemoryStream) -> Self {
        let owns_suspend = if stream.is_suspended() {
            false
        } else {
            match stream.suspend() {
                Ok(()) => true,
                Err(e) => {
                    debug!("Failed to suspend stream for batch: {}", e);
                    false
                }
            }
        };

        Self {
            stream,
            owns_suspend,
        }
    }

    pub fn owns_suspend(&self) -> bool {
        self.owns_suspend
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if self.owns_suspend
            && let Err(e) = self.stream.resume()
        {
            debug!("Failed to resume stream after batch: {}", e);
        }
    }
}
