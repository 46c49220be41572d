//! CLI command implementations.

pub mod disasm;
pub mod get;
pub mod hex_utils;
pub mod hexdump;
pub mod list;
pub mod set;
pub mod watch;
