//! Hex address parsing for command arguments.

use anyhow::{Result, bail};
use memwatch_core::hex::parse_hex;

/// Parse a hex address string (with or without 0x prefix).
pub fn parse_hex_address(s: &str) -> Result<u64> {
    match parse_hex(s) {
        Some(address) => Ok(address),
        None => bail!("Invalid hex address: {}", s),
    }
}

/// Parse a game RAM address such as `80339E00` or `0x80339E00`.
pub fn parse_ram_address(s: &str) -> Result<u32> {
    let address = parse_hex_address(s)?;
    match u32::try_from(address) {
        Ok(address) => Ok(address),
        Err(_) => bail!("RAM address out of range: {}", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_address_with_prefix() {
        assert_eq!(parse_hex_address("0x1000").unwrap(), 0x1000);
        assert_eq!(parse_hex_address("0X1000").unwrap(), 0x1000);
    }

    #[test]
    fn test_parse_hex_address_without_prefix() {
        assert_eq!(parse_hex_address("1000").unwrap(), 0x1000);
        assert_eq!(parse_hex_address("DEADBEEF").unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_parse_hex_address_invalid() {
        assert!(parse_hex_address("GHIJK").is_err());
        assert!(parse_hex_address("0xZZZ").is_err());
    }

    #[test]
    fn test_parse_ram_address() {
        assert_eq!(parse_ram_address("80339E00").unwrap(), 0x8033_9E00);
        assert!(parse_ram_address("0x1DFE40000").is_err());
    }
}
