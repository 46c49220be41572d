//! Command-line definitions.

use clap::{Args, Parser, Subcommand};
use memwatch_core::GameVersion;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "memwatch")]
#[command(about = "Watch, edit and lock variables in emulated game memory", long_about = None)]
pub struct Cli {
    /// Config file (defaults to <config dir>/memwatch/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Watch profile (JSON)
    #[arg(short, long, global = true, env = "MEMWATCH_PROFILE")]
    pub profile: Option<PathBuf>,

    /// Game version used for offset lookups
    #[arg(short = 'g', long, global = true)]
    pub game_version: Option<GameVersion>,

    #[command(flatten)]
    pub target: TargetArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where game memory comes from.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Attach to a process by ID
    #[arg(long, global = true, conflicts_with_all = ["process", "dump"])]
    pub pid: Option<u32>,

    /// Attach to a process by executable name
    #[arg(long, global = true, conflicts_with = "dump")]
    pub process: Option<String>,

    /// Use a raw RAM image file instead of a live process
    #[arg(long, global = true)]
    pub dump: Option<PathBuf>,

    /// Process address where emulated RAM begins (hex)
    #[arg(long, global = true)]
    pub ram_start: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every variable of the profile with its resolved addresses
    #[command(visible_alias = "ls")]
    List,

    /// Print the current values of a variable
    Get {
        /// Variable name
        name: String,
    },

    /// Write a value to every address of a variable
    Set {
        /// Variable name
        name: String,

        /// Value (decimal, 0x hex or floating point)
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Poll and print every variable until Esc, q or Ctrl+C
    #[command(visible_alias = "w")]
    Watch {
        /// Lock these variables at their current values
        #[arg(short, long)]
        lock: Vec<String>,

        /// Poll interval in milliseconds (overrides config)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stop after this many ticks
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Disassemble code in RAM
    #[command(visible_alias = "d")]
    Disasm {
        /// RAM address (hex)
        address: String,

        /// Number of instructions
        #[arg(short = 'n', long, default_value = "16")]
        lines: usize,
    },

    /// Dump raw RAM bytes as stored by the emulator
    Hexdump {
        /// RAM address (hex)
        address: String,

        /// Number of bytes
        #[arg(default_value = "256")]
        size: usize,

        /// Hide the ASCII column
        #[arg(long)]
        no_ascii: bool,
    },
}
