//! # memwatch-core
//!
//! Core library for the memwatch game memory inspector.
//!
//! This crate provides:
//! - Typed, endian-correct access to emulated game RAM inside a host process
//! - Watch variables resolved from version-dependent base/offset tables
//! - Masked partial writes with suspend/resume batching
//! - Value locks reasserted on every tick
//! - A small MIPS disassembler for code in RAM

pub mod accessor;
pub mod address;
pub mod disasm;
pub mod error;
pub mod hex;
pub mod lock;
pub mod memory;
pub mod profile;
pub mod session;
pub mod special;
pub mod version;
pub mod watch;

pub use accessor::{Accessor, SpecialAccessor, TypedAccessor, UNREADABLE};
pub use address::{
    BaseAddressKind, BaseAddressProvider, BaseAddressTable, Context, DynamicBase, SlotPool,
    resolve,
};
pub use disasm::{Disassembler, DisassemblyLine, MipsDisassembler, disassemble};
pub use error::{Error, Result};
pub use lock::{LockRegistry, LockReport, LockState, LockTarget, VariableLock};
pub use memory::{
    Addressing, BatchGuard, BufferStream, MemoryStream, PrimitiveType, ProcessHandle,
    ProcessInfo, ProcessStream, Value, find_process,
};
pub use profile::{Profile, load_profile, save_profile};
pub use session::{TickReport, WatchEntry, WatchRow, WatchSession};
pub use special::{FnSpecial, PuAxis, SpecialRegistry, SpecialVariable};
pub use version::{GameVersion, OffsetTable, VersionTable};
pub use watch::{NO_ADDRESS, VariableDefinition, VariableKind, WatchVariable};
