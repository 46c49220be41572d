//! Disassembly of game code held in emulated RAM.
//!
//! RAM is stored as little-endian words, so the bytes of each instruction are
//! decoded with [`u32::from_le_bytes`] to recover the big-endian word the
//! game CPU executes.

use serde::Serialize;

use crate::error::Result;
use crate::memory::{MemoryStream, RAM_ADDRESS_AREA, RAM_ADDRESS_MASK};

/// Maps one instruction word at `address` to text. Must be pure.
pub trait Disassembler {
    fn disassemble_instruction(&self, address: u32, word: u32) -> String;
}

const REGISTERS: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp",
    "fp", "ra",
];

fn reg(index: u32) -> &'static str {
    REGISTERS[(index & 0x1F) as usize]
}

fn freg(index: u32) -> String {
    format!("f{}", index & 0x1F)
}

fn signed_hex(value: i32) -> String {
    if value < 0 {
        format!("-0x{:X}", value.unsigned_abs())
    } else {
        format!("0x{:X}", value)
    }
}

/// Fields of a MIPS instruction word.
#[derive(Debug, Clone, Copy)]
struct Fields {
    op: u32,
    rs: u32,
    rt: u32,
    rd: u32,
    sa: u32,
    funct: u32,
    imm: u32,
    simm: i32,
    index: u32,
}

impl Fields {
    fn new(word: u32) -> Self {
        Self {
            op: word >> 26,
            rs: (word >> 21) & 0x1F,
            rt: (word >> 16) & 0x1F,
            rd: (word >> 11) & 0x1F,
            sa: (word >> 6) & 0x1F,
            funct: word & 0x3F,
            imm: word & 0xFFFF,
            simm: (word & 0xFFFF) as u16 as i16 as i32,
            index: word & 0x03FF_FFFF,
        }
    }
}

/// Decoder for the common MIPS R4300 integer, load/store and COP1 opcodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MipsDisassembler;

impl MipsDisassembler {
    fn branch_target(address: u32, f: &Fields) -> u32 {
        address
            .wrapping_add(4)
            .wrapping_add((f.simm << 2) as u32)
    }

    fn special(f: &Fields) -> Option<String> {
        let (rs, rt, rd) = (reg(f.rs), reg(f.rt), reg(f.rd));
        let text = match f.funct {
            0x00 => format!("sll {}, {}, {}", rd, rt, f.sa),
            0x02 => format!("srl {}, {}, {}", rd, rt, f.sa),
            0x03 => format!("sra {}, {}, {}", rd, rt, f.sa),
            0x04 => format!("sllv {}, {}, {}", rd, rt, rs),
            0x06 => format!("srlv {}, {}, {}", rd, rt, rs),
            0x07 => format!("srav {}, {}, {}", rd, rt, rs),
            0x08 => format!("jr {}", rs),
            0x09 if f.rd == 31 => format!("jalr {}", rs),
            0x09 => format!("jalr {}, {}", rd, rs),
            0x0C => "syscall".to_string(),
            0x0D => "break".to_string(),
            0x10 => format!("mfhi {}", rd),
            0x12 => format!("mflo {}", rd),
            0x18 => format!("mult {}, {}", rs, rt),
            0x19 => format!("multu {}, {}", rs, rt),
            0x1A => format!("div {}, {}", rs, rt),
            0x1B => format!("divu {}, {}", rs, rt),
            0x20 => format!("add {}, {}, {}", rd, rs, rt),
            0x21 => format!("addu {}, {}, {}", rd, rs, rt),
            0x22 => format!("sub {}, {}, {}", rd, rs, rt),
            0x23 => format!("subu {}, {}, {}", rd, rs, rt),
            0x24 => format!("and {}, {}, {}", rd, rs, rt),
            0x25 => format!("or {}, {}, {}", rd, rs, rt),
            0x26 => format!("xor {}, {}, {}", rd, rs, rt),
            0x27 => format!("nor {}, {}, {}", rd, rs, rt),
            0x2A => format!("slt {}, {}, {}", rd, rs, rt),
            0x2B => format!("sltu {}, {}, {}", rd, rs, rt),
            _ => return None,
        };
        Some(text)
    }

    fn cop1(f: &Fields, address: u32) -> Option<String> {
        let text = match f.rs {
            0x00 => format!("mfc1 {}, {}", reg(f.rt), freg(f.rd)),
            0x04 => format!("mtc1 {}, {}", reg(f.rt), freg(f.rd)),
            0x08 => {
                let mnemonic = match f.rt & 0x3 {
                    0 => "bc1f",
                    1 => "bc1t",
                    2 => "bc1fl",
                    _ => "bc1tl",
                };
                format!("{} 0x{:08X}", mnemonic, Self::branch_target(address, f))
            }
            0x10 | 0x11 => {
                let fmt = if f.rs == 0x10 { "s" } else { "d" };
                // COP1 arithmetic reuses the R-type slots: ft=rt, fs=rd, fd=sa
                let (ft, fs, fd) = (freg(f.rt), freg(f.rd), freg(f.sa));
                match f.funct {
                    0x00 => format!("add.{} {}, {}, {}", fmt, fd, fs, ft),
                    0x01 => format!("sub.{} {}, {}, {}", fmt, fd, fs, ft),
                    0x02 => format!("mul.{} {}, {}, {}", fmt, fd, fs, ft),
                    0x03 => format!("div.{} {}, {}, {}", fmt, fd, fs, ft),
                    0x04 => format!("sqrt.{} {}, {}", fmt, fd, fs),
                    0x05 => format!("abs.{} {}, {}", fmt, fd, fs),
                    0x06 => format!("mov.{} {}, {}", fmt, fd, fs),
                    0x07 => format!("neg.{} {}, {}", fmt, fd, fs),
                    0x0D => format!("trunc.w.{} {}, {}", fmt, fd, fs),
                    0x21 => format!("cvt.d.{} {}, {}", fmt, fd, fs),
                    0x20 => format!("cvt.s.{} {}, {}", fmt, fd, fs),
                    0x24 => format!("cvt.w.{} {}, {}", fmt, fd, fs),
                    0x32 => format!("c.eq.{} {}, {}", fmt, fs, ft),
                    0x3C => format!("c.lt.{} {}, {}", fmt, fs, ft),
                    0x3E => format!("c.le.{} {}, {}", fmt, fs, ft),
                    _ => return None,
                }
            }
            0x14 => match f.funct {
                0x20 => format!("cvt.s.w {}, {}", freg(f.sa), freg(f.rd)),
                0x21 => format!("cvt.d.w {}, {}", freg(f.sa), freg(f.rd)),
                _ => return None,
            },
            _ => return None,
        };
        Some(text)
    }

    fn decode(address: u32, word: u32) -> Option<String> {
        if word == 0 {
            return Some("nop".to_string());
        }

        let f = Fields::new(word);
        let (rs, rt) = (reg(f.rs), reg(f.rt));
        let memory = |mnemonic: &str, target: &str| {
            format!("{} {}, {}({})", mnemonic, target, signed_hex(f.simm), rs)
        };

        let text = match f.op {
            0x00 => return Self::special(&f),
            0x01 => {
                let mnemonic = match f.rt {
                    0x00 => "bltz",
                    0x01 => "bgez",
                    0x02 => "bltzl",
                    0x03 => "bgezl",
                    0x10 => "bltzal",
                    0x11 => "bgezal",
                    _ => return None,
                };
                format!("{} {}, 0x{:08X}", mnemonic, rs, Self::branch_target(address, &f))
            }
            0x02 | 0x03 => {
                let target = (address.wrapping_add(4) & 0xF000_0000) | (f.index << 2);
                let mnemonic = if f.op == 0x02 { "j" } else { "jal" };
                format!("{} 0x{:08X}", mnemonic, target)
            }
            0x04 if f.rs == 0 && f.rt == 0 => {
                format!("b 0x{:08X}", Self::branch_target(address, &f))
            }
            0x04 | 0x05 | 0x14 | 0x15 => {
                let mnemonic = match f.op {
                    0x04 => "beq",
                    0x05 => "bne",
                    0x14 => "beql",
                    _ => "bnel",
                };
                format!(
                    "{} {}, {}, 0x{:08X}",
                    mnemonic,
                    rs,
                    rt,
                    Self::branch_target(address, &f)
                )
            }
            0x06 => format!("blez {}, 0x{:08X}", rs, Self::branch_target(address, &f)),
            0x07 => format!("bgtz {}, 0x{:08X}", rs, Self::branch_target(address, &f)),
            0x08 => format!("addi {}, {}, {}", rt, rs, signed_hex(f.simm)),
            0x09 => format!("addiu {}, {}, {}", rt, rs, signed_hex(f.simm)),
            0x0A => format!("slti {}, {}, {}", rt, rs, signed_hex(f.simm)),
            0x0B => format!("sltiu {}, {}, {}", rt, rs, signed_hex(f.simm)),
            0x0C => format!("andi {}, {}, 0x{:X}", rt, rs, f.imm),
            0x0D => format!("ori {}, {}, 0x{:X}", rt, rs, f.imm),
            0x0E => format!("xori {}, {}, 0x{:X}", rt, rs, f.imm),
            0x0F => format!("lui {}, 0x{:X}", rt, f.imm),
            0x11 => return Self::cop1(&f, address),
            0x20 => memory("lb", rt),
            0x21 => memory("lh", rt),
            0x23 => memory("lw", rt),
            0x24 => memory("lbu", rt),
            0x25 => memory("lhu", rt),
            0x27 => memory("lwu", rt),
            0x28 => memory("sb", rt),
            0x29 => memory("sh", rt),
            0x2B => memory("sw", rt),
            0x2F => format!("cache 0x{:X}, {}({})", f.rt, signed_hex(f.simm), rs),
            0x31 => memory("lwc1", freg(f.rt).as_str()),
            0x35 => memory("ldc1", freg(f.rt).as_str()),
            0x37 => memory("ld", rt),
            0x39 => memory("swc1", freg(f.rt).as_str()),
            0x3D => memory("sdc1", freg(f.rt).as_str()),
            0x3F => memory("sd", rt),
            _ => return None,
        };
        Some(text)
    }
}

impl Disassembler for MipsDisassembler {
    fn disassemble_instruction(&self, address: u32, word: u32) -> String {
        Self::decode(address, word).unwrap_or_else(|| format!(".word 0x{:08X}", word))
    }
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisassemblyLine {
    /// RAM address with the segment bit set.
    pub address: u32,
    pub word: u32,
    pub text: String,
}

impl DisassemblyLine {
    /// Instruction bytes in execution order, e.g. `27 BD FF E8`.
    pub fn byte_text(&self) -> String {
        self.word
            .to_be_bytes()
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Decode `count` instructions starting at RAM address `start`, aligned down
/// to a word boundary.
pub fn disassemble(
    stream: &dyn MemoryStream,
    start: u32,
    count: usize,
    disassembler: &dyn Disassembler,
) -> Result<Vec<DisassemblyLine>> {
    let start = (start & !0x3) & RAM_ADDRESS_MASK;
    let bytes = stream.read_ram_little_endian(start, count * 4)?;

    Ok(bytes
        .chunks_exact(4)
        .enumerate()
        .map(|(i, chunk)| {
            let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let address = start.wrapping_add(i as u32 * 4) | RAM_ADDRESS_AREA;
            DisassemblyLine {
                address,
                word,
                text: disassembler.disassemble_instruction(address, word),
            }
        })
        .collect())
}
