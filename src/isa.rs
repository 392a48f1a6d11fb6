//! Instruction set: mnemonics, opcode layout, decoding and disassembly.
//!
//! Opcodes with a register embed its index in the low nibble, e.g. `LDI R2, #7` is `0x12 0x07`.
//! Addresses are stored little-endian.

use std::fmt;
use std::str::FromStr;

use crate::error::FaultKind;
use crate::symbol::Register;

pub const OP_NOP: u8 = 0x00;
pub const OP_LDI: u8 = 0x10;
pub const OP_LD: u8 = 0x20;
pub const OP_ST: u8 = 0x30;
pub const OP_ADD_IMM: u8 = 0x40;
pub const OP_ADD_REG: u8 = 0x50;
pub const OP_SUB: u8 = 0x60;
pub const OP_AND: u8 = 0x70;
pub const OP_OR: u8 = 0x80;
pub const OP_XOR: u8 = 0x90;
pub const OP_JMP: u8 = 0xA0;
pub const OP_JZ: u8 = 0xA1;
pub const OP_JNZ: u8 = 0xA2;
pub const OP_HLT: u8 = 0xFF;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mnemonic {
    Nop,
    Hlt,
    Ldi,
    Ld,
    St,
    Add,
    Sub,
    And,
    Or,
    Xor,
    Jmp,
    Jz,
    Jnz,
}

impl Mnemonic {
    /// Encoded size in bytes, opcode included.
    pub fn len(self) -> u32 {
        use Mnemonic::*;
        match self {
            Nop | Hlt => 1,
            Ldi | Add | Sub | And | Or | Xor => 2,
            Ld | St | Jmp | Jz | Jnz => 3,
        }
    }
}

impl FromStr for Mnemonic {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use Mnemonic::*;
        let mnemonic = match s.to_ascii_uppercase().as_str() {
            "NOP" => Nop,
            "HLT" => Hlt,
            "LDI" => Ldi,
            "LD" => Ld,
            "ST" => St,
            "ADD" => Add,
            "SUB" => Sub,
            "AND" => And,
            "OR" => Or,
            "XOR" => Xor,
            "JMP" => Jmp,
            "JZ" => Jz,
            "JNZ" => Jnz,
            _ => return Err(()),
        };
        Ok(mnemonic)
    }
}

/// Number of operand bytes following an opcode.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Shape {
    /// Opcode only
    Bare,
    /// One immediate or register byte
    Byte,
    /// Two-byte little-endian address
    Addr,
}

impl Shape {
    pub fn of(opcode: u8) -> Shape {
        match opcode {
            OP_NOP | OP_HLT => Shape::Bare,
            OP_JMP | OP_JZ | OP_JNZ => Shape::Addr,
            op if matches!(op & 0xF0, OP_LD | OP_ST) => Shape::Addr,
            _ => Shape::Byte,
        }
    }

    pub fn len(self) -> u16 {
        match self {
            Shape::Bare => 0,
            Shape::Byte => 1,
            Shape::Addr => 2,
        }
    }
}

/// Fully decoded instruction. Address operands take the place of a memory address register.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Instruction {
    Nop,
    Hlt,
    Ldi { dest: Register, imm: u8 },
    Ld { dest: Register, addr: u16 },
    St { src: Register, addr: u16 },
    AddImm { dest: Register, imm: u8 },
    AddReg { dest: Register, src: Register },
    Sub { dest: Register, imm: u8 },
    And { dest: Register, imm: u8 },
    Or { dest: Register, imm: u8 },
    Xor { dest: Register, imm: u8 },
    Jmp { addr: u16 },
    Jz { addr: u16 },
    Jnz { addr: u16 },
}

impl Instruction {
    /// Decode an opcode together with the operand its [`Shape`] calls for.
    ///
    /// `operand` holds the immediate/register byte or the assembled address; it is ignored for
    /// bare opcodes.
    pub fn decode(opcode: u8, operand: u16) -> Result<Instruction, FaultKind> {
        let addr = operand;
        let imm = operand as u8;
        match opcode {
            OP_NOP => return Ok(Instruction::Nop),
            OP_HLT => return Ok(Instruction::Hlt),
            OP_JMP => return Ok(Instruction::Jmp { addr }),
            OP_JZ => return Ok(Instruction::Jz { addr }),
            OP_JNZ => return Ok(Instruction::Jnz { addr }),
            _ => {}
        }

        let family = opcode & 0xF0;
        if !(OP_LDI..=OP_XOR).contains(&family) {
            return Err(FaultKind::UnknownOpcode);
        }
        let reg = |idx: u8| Register::from_index(idx).ok_or(FaultKind::InvalidRegister(idx));
        let r = reg(opcode & 0x0F)?;

        let instr = match family {
            OP_LDI => Instruction::Ldi { dest: r, imm },
            OP_LD => Instruction::Ld { dest: r, addr },
            OP_ST => Instruction::St { src: r, addr },
            OP_ADD_IMM => Instruction::AddImm { dest: r, imm },
            OP_ADD_REG => Instruction::AddReg {
                dest: r,
                src: reg(imm & 0x0F)?,
            },
            OP_SUB => Instruction::Sub { dest: r, imm },
            OP_AND => Instruction::And { dest: r, imm },
            OP_OR => Instruction::Or { dest: r, imm },
            OP_XOR => Instruction::Xor { dest: r, imm },
            _ => unreachable!("family was checked to be within LDI..=XOR"),
        };
        Ok(instr)
    }

    pub fn mnemonic(&self) -> Mnemonic {
        use Instruction::*;
        match self {
            Nop => Mnemonic::Nop,
            Hlt => Mnemonic::Hlt,
            Ldi { .. } => Mnemonic::Ldi,
            Ld { .. } => Mnemonic::Ld,
            St { .. } => Mnemonic::St,
            AddImm { .. } | AddReg { .. } => Mnemonic::Add,
            Sub { .. } => Mnemonic::Sub,
            And { .. } => Mnemonic::And,
            Or { .. } => Mnemonic::Or,
            Xor { .. } => Mnemonic::Xor,
            Jmp { .. } => Mnemonic::Jmp,
            Jz { .. } => Mnemonic::Jz,
            Jnz { .. } => Mnemonic::Jnz,
        }
    }

    /// Gives instruction in binary form.
    pub fn emit(&self) -> Vec<u8> {
        use Instruction::*;
        let with_reg = |base: u8, r: &Register| base + r.index() as u8;
        let addr_bytes = |op: u8, addr: &u16| {
            let [lo, hi] = addr.to_le_bytes();
            vec![op, lo, hi]
        };
        match self {
            Nop => vec![OP_NOP],
            Hlt => vec![OP_HLT],
            Ldi { dest, imm } => vec![with_reg(OP_LDI, dest), *imm],
            Ld { dest, addr } => addr_bytes(with_reg(OP_LD, dest), addr),
            St { src, addr } => addr_bytes(with_reg(OP_ST, src), addr),
            AddImm { dest, imm } => vec![with_reg(OP_ADD_IMM, dest), *imm],
            AddReg { dest, src } => vec![with_reg(OP_ADD_REG, dest), src.index() as u8],
            Sub { dest, imm } => vec![with_reg(OP_SUB, dest), *imm],
            And { dest, imm } => vec![with_reg(OP_AND, dest), *imm],
            Or { dest, imm } => vec![with_reg(OP_OR, dest), *imm],
            Xor { dest, imm } => vec![with_reg(OP_XOR, dest), *imm],
            Jmp { addr } => addr_bytes(OP_JMP, addr),
            Jz { addr } => addr_bytes(OP_JZ, addr),
            Jnz { addr } => addr_bytes(OP_JNZ, addr),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match self {
            Nop => write!(f, "NOP"),
            Hlt => write!(f, "HLT"),
            Ldi { dest, imm } => write!(f, "LDI {dest}, #{imm:#04x}"),
            Ld { dest, addr } => write!(f, "LD {dest}, [{addr:#06x}]"),
            St { src, addr } => write!(f, "ST {src}, [{addr:#06x}]"),
            AddImm { dest, imm } => write!(f, "ADD {dest}, #{imm:#04x}"),
            AddReg { dest, src } => write!(f, "ADD {dest}, {src}"),
            Sub { dest, imm } => write!(f, "SUB {dest}, #{imm:#04x}"),
            And { dest, imm } => write!(f, "AND {dest}, #{imm:#04x}"),
            Or { dest, imm } => write!(f, "OR {dest}, #{imm:#04x}"),
            Xor { dest, imm } => write!(f, "XOR {dest}, #{imm:#04x}"),
            Jmp { addr } => write!(f, "JMP {addr:#06x}"),
            Jz { addr } => write!(f, "JZ {addr:#06x}"),
            Jnz { addr } => write!(f, "JNZ {addr:#06x}"),
        }
    }
}

/// Single disassembled statement.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DisasmLine {
    pub addr: u16,
    pub bytes: Vec<u8>,
    /// `None` if the bytes at `addr` do not decode.
    pub instr: Option<Instruction>,
}

impl fmt::Display for DisasmLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex: Vec<String> = self.bytes.iter().map(|b| format!("{b:02X}")).collect();
        write!(f, "{:04X}:  {:<10}", self.addr, hex.join(" "))?;
        match &self.instr {
            Some(instr) => write!(f, "{instr}"),
            None => write!(f, ".BYTE {:#04x}", self.bytes[0]),
        }
    }
}

/// Disassemble `count` statements of `mem` from `start`, wrapping around the address space.
///
/// Bytes that do not decode are shown as single `.BYTE` statements.
pub fn disassemble(mem: &[u8], start: u16, count: usize) -> Vec<DisasmLine> {
    let read = |addr: u16| mem.get(addr as usize).copied().unwrap_or(0);
    let mut res = Vec::with_capacity(count);
    let mut addr = start;
    for _ in 0..count {
        let opcode = read(addr);
        let shape = Shape::of(opcode);
        let lo = read(addr.wrapping_add(1));
        let hi = read(addr.wrapping_add(2));
        let operand = match shape {
            Shape::Bare => 0,
            Shape::Byte => lo as u16,
            Shape::Addr => u16::from_le_bytes([lo, hi]),
        };
        let line = match Instruction::decode(opcode, operand) {
            Ok(instr) => DisasmLine {
                addr,
                bytes: [opcode, lo, hi][..=shape.len() as usize].to_vec(),
                instr: Some(instr),
            },
            Err(_) => DisasmLine {
                addr,
                bytes: vec![opcode],
                instr: None,
            },
        };
        addr = addr.wrapping_add(line.bytes.len() as u16);
        res.push(line);
    }
    res
}
