//! Disassembly command implementation.

use anyhow::{Context, Result};
use memwatch_core::{DisassemblyLine, MipsDisassembler, disassemble};
use owo_colors::OwoColorize;

use super::hex_utils::parse_ram_address;
use crate::workspace::Workspace;

pub fn run(workspace: &Workspace, address: &str, lines: usize) -> Result<()> {
    let address = parse_ram_address(address)?;
    let listing = disassemble(
        workspace.stream.as_ref(),
        address,
        lines,
        &MipsDisassembler,
    )
    .with_context(|| format!("Failed to read code at 0x{:08X}", address))?;

    for line in &listing {
        println!(
            "{} {}\t{}",
            format!("0x{:08X}:", line.address).blue(),
            line.byte_text().bright_black(),
            line.text.red()
        );
    }
    if let Some(next) = listing.last().map(next_address) {
        println!();
        println!("next: 0x{:08X}", next);
    }

    Ok(())
}

fn next_address(line: &DisassemblyLine) -> u32 {
    line.address.wrapping_add(4)
}
