//! Hexdump command implementation.
//!
//! Displays raw RAM bytes exactly as the emulator stores them (little-endian
//! words), useful for checking struct layouts and masks.
//!
//! # Output Format
//!
//! ```text
//! 0x80339E00: 48 65 6C 6C 6F 20 57 6F  72 6C 64 00 00 00 00 00  |Hello World.....|
//! ```

use anyhow::{Context, Result};
use memwatch_core::memory::{RAM_ADDRESS_AREA, RAM_ADDRESS_MASK};

use super::hex_utils::parse_ram_address;
use crate::workspace::Workspace;

/// Run the hexdump command
pub fn run(workspace: &Workspace, address: &str, size: usize, ascii: bool) -> Result<()> {
    let address = parse_ram_address(address)? & RAM_ADDRESS_MASK;
    let bytes = workspace
        .stream
        .read_ram_little_endian(address, size)
        .with_context(|| format!("Failed to read {} bytes at 0x{:08X}", size, address))?;

    println!(
        "Hexdump at 0x{:08X} ({} bytes):",
        address | RAM_ADDRESS_AREA,
        size
    );
    println!();
    for line in format_rows(address, &bytes, ascii) {
        println!("{}", line);
    }

    Ok(())
}

fn format_rows(start: u32, bytes: &[u8], ascii: bool) -> Vec<String> {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            let address = start.wrapping_add(i as u32 * 16) | RAM_ADDRESS_AREA;
            let mut line = format!("0x{:08X}: ", address);

            for j in 0..16 {
                if j == 8 {
                    line.push(' ');
                }
                match chunk.get(j) {
                    Some(byte) => line.push_str(&format!("{:02X} ", byte)),
                    None => line.push_str("   "),
                }
            }

            if ascii {
                line.push_str(" |");
                for &byte in chunk {
                    line.push(if (0x20..0x7F).contains(&byte) {
                        byte as char
                    } else {
                        '.'
                    });
                }
                for _ in chunk.len()..16 {
                    line.push(' ');
                }
                line.push('|');
            }
            line
        })
        .collect()
}
