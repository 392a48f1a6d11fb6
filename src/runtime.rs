use std::fmt;

use crate::error::Fault;
use crate::image::MEMORY_SIZE;
use crate::isa::{Instruction, Shape};
use crate::symbol::Register;

/// Represents complete machine state during runtime.
pub struct Cpu {
    /// System memory - 64KB in size. Code and data share it.
    mem: Box<[u8; MEMORY_SIZE]>,
    /// Program counter
    pc: u16,
    /// 4x 8-bit registers
    reg: [u8; 4],
    /// Last fetched opcode, kept for tracing only
    ir: u8,
    /// Zero flag
    z: bool,
    /// Carry flag. Set on overflow by ADD, but cleared on borrow by SUB
    c: bool,
    halted: bool,
}

impl Cpu {
    pub fn new() -> Self {
        Cpu {
            mem: Box::new([0; MEMORY_SIZE]),
            pc: 0,
            reg: [0; 4],
            ir: 0,
            z: false,
            c: false,
            halted: false,
        }
    }

    /// Copy `program` into memory from `origin`, wrapping past the last address.
    ///
    /// Does not move the program counter.
    pub fn load(&mut self, program: &[u8], origin: u16) {
        for (i, byte) in program.iter().enumerate() {
            *self.mem(origin.wrapping_add(i as u16)) = *byte;
        }
    }

    /// Execute exactly one instruction. Does nothing once halted.
    ///
    /// A fault halts the machine before it is returned.
    pub fn step(&mut self) -> Result<(), Fault> {
        if self.halted {
            return Ok(());
        }
        log::trace!("{}", self);

        let addr = self.pc;
        let opcode = self.fetch();
        self.ir = opcode;
        let operand = match Shape::of(opcode) {
            Shape::Bare => 0,
            Shape::Byte => self.fetch() as u16,
            Shape::Addr => {
                let lo = self.fetch();
                let hi = self.fetch();
                u16::from_le_bytes([lo, hi])
            }
        };

        match Instruction::decode(opcode, operand) {
            Ok(instr) => {
                self.execute(instr);
                Ok(())
            }
            Err(kind) => {
                self.halted = true;
                let fault = Fault { kind, opcode, addr };
                log::debug!("{fault}");
                Err(fault)
            }
        }
    }

    /// Step until halted or `max_cycles` instructions have run, returning the amount executed.
    pub fn run(&mut self, max_cycles: usize) -> Result<usize, Fault> {
        let mut cycles = 0;
        while !self.halted && cycles < max_cycles {
            self.step()?;
            cycles += 1;
        }
        Ok(cycles)
    }

    /// Read byte at PC and move past it.
    fn fetch(&mut self) -> u8 {
        let byte = *self.mem(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    fn execute(&mut self, instr: Instruction) {
        use Instruction::*;
        match instr {
            Nop => {}
            Hlt => self.halted = true,
            Ldi { dest, imm } => self.set_reg(dest, imm),
            Ld { dest, addr } => {
                let val = *self.mem(addr);
                self.set_reg(dest, val);
            }
            St { src, addr } => {
                let val = self.reg(src);
                *self.mem(addr) = val;
            }
            AddImm { dest, imm } => self.add(dest, imm),
            AddReg { dest, src } => self.add(dest, self.reg(src)),
            Sub { dest, imm } => {
                let diff = self.reg(dest) as i16 - imm as i16;
                self.c = diff >= 0;
                self.set_reg(dest, diff as u8);
            }
            And { dest, imm } => self.set_reg(dest, self.reg(dest) & imm),
            Or { dest, imm } => self.set_reg(dest, self.reg(dest) | imm),
            Xor { dest, imm } => self.set_reg(dest, self.reg(dest) ^ imm),
            Jmp { addr } => self.pc = addr,
            Jz { addr } => {
                if self.z {
                    self.pc = addr
                }
            }
            Jnz { addr } => {
                if !self.z {
                    self.pc = addr
                }
            }
        }
    }

    fn add(&mut self, dest: Register, val: u8) {
        let sum = self.reg(dest) as u16 + val as u16;
        self.c = sum > 0xFF;
        self.set_reg(dest, sum as u8);
    }

    /// Write a register and update the zero flag from it.
    #[inline]
    fn set_reg(&mut self, reg: Register, val: u8) {
        self.reg[reg.index()] = val;
        self.z = val == 0;
    }

    #[inline]
    fn mem(&mut self, addr: u16) -> &mut u8 {
        // Memory fits any u16 index
        &mut self.mem[addr as usize]
    }

    pub fn reg(&self, reg: Register) -> u8 {
        self.reg[reg.index()]
    }

    pub fn regs(&self) -> [u8; 4] {
        self.reg
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, addr: u16) {
        self.pc = addr;
    }

    pub fn ir(&self) -> u8 {
        self.ir
    }

    pub fn z(&self) -> bool {
        self.z
    }

    pub fn c(&self) -> bool {
        self.c
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }

    pub fn memory(&self) -> &[u8] {
        &self.mem[..]
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

/// One-line register dump, as used for tracing.
impl fmt::Display for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r0, r1, r2, r3] = self.reg;
        write!(
            f,
            "PC={:04X} IR={:02X} R0={:02X} R1={:02X} R2={:02X} R3={:02X} Z={} C={}",
            self.pc, self.ir, r0, r1, r2, r3, self.z as u8, self.c as u8
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble;
    use crate::error::FaultKind;
    use Register::*;

    fn boot(src: &str) -> Cpu {
        let image = assemble(src).unwrap();
        let mut cpu = Cpu::new();
        cpu.load(image.as_bytes(), 0);
        cpu
    }

    #[test]
    fn add_program() {
        let mut cpu = boot("LDI R0, #5\nADD R0, #3\nHLT");
        assert_eq!(cpu.run(100), Ok(3));
        assert_eq!(cpu.reg(R0), 8);
        assert!(!cpu.z());
        assert!(cpu.halted());
        assert_eq!(cpu.ir(), 0xFF);
    }

    #[test]
    fn sub_borrow_convention() {
        let mut cpu = boot("SUB R0, #1\nHLT");
        cpu.run(10).unwrap();
        assert_eq!(cpu.reg(R0), 0xFF);
        assert!(!cpu.c(), "borrow clears carry");
        assert!(!cpu.z());

        let mut cpu = boot("LDI R0, #5\nSUB R0, #1\nHLT");
        cpu.run(10).unwrap();
        assert_eq!(cpu.reg(R0), 4);
        assert!(cpu.c(), "no borrow sets carry");

        let mut cpu = boot("LDI R0, #5\nSUB R0, #5\nHLT");
        cpu.run(10).unwrap();
        assert!(cpu.z());
        assert!(cpu.c());
    }

    #[test]
    fn add_carry() {
        let mut cpu = boot("LDI R1, #0xFF\nADD R1, #1\nHLT");
        cpu.run(10).unwrap();
        assert_eq!(cpu.reg(R1), 0);
        assert!(cpu.c());
        assert!(cpu.z());

        let mut cpu = boot("LDI R1, #0x80\nLDI R2, #0x7F\nADD R1, R2\nHLT");
        cpu.run(10).unwrap();
        assert_eq!(cpu.reg(R1), 0xFF);
        assert!(!cpu.c());
        assert!(!cpu.z());
    }

    #[test]
    fn bitwise_leaves_carry() {
        let mut cpu = boot("LDI R0, #0xFF\nADD R0, #1\nLDI R0, #0b1100\nAND R0, #0b1010\nHLT");
        cpu.run(10).unwrap();
        assert_eq!(cpu.reg(R0), 0b1000);
        assert!(cpu.c());

        let mut cpu = boot("LDI R3, #0xF0\nOR R3, #0x0F\nXOR R3, #0xFF\nHLT");
        cpu.run(10).unwrap();
        assert_eq!(cpu.reg(R3), 0);
        assert!(cpu.z());
        assert!(!cpu.c());
    }

    #[test]
    fn load_and_store() {
        let src = r#"
            LD R0, [value]
            ADD R0, #1
            ST R0, [result]
            ST R1, [value]   ; store does not touch flags
            HLT
        value:
            .BYTE 41
        result:
            .BYTE 0
        "#;
        let mut cpu = boot(src);
        cpu.run(10).unwrap();
        // value at 12, result at 13
        assert_eq!(cpu.read(12), 0);
        assert_eq!(cpu.read(13), 42);
        assert_eq!(cpu.reg(R0), 42);
        assert!(!cpu.z());
    }

    #[test]
    fn countdown_loop() {
        let src = r#"
            LDI R0, #3
            LDI R1, #0
        loop:
            ADD R1, #2
            SUB R0, #1
            JNZ loop
            HLT
        "#;
        let mut cpu = boot(src);
        // 2 setup + 3 iterations of 3 + HLT
        assert_eq!(cpu.run(1000), Ok(12));
        assert_eq!(cpu.reg(R1), 6);
        assert!(cpu.z());
    }

    #[test]
    fn jz_taken_and_not_taken() {
        let src = r#"
            LDI R0, #0
            JZ zero
            LDI R1, #1
        zero:
            LDI R2, #1
            JZ never
            HLT
        never:
            LDI R3, #1
            HLT
        "#;
        let mut cpu = boot(src);
        cpu.run(100).unwrap();
        assert_eq!(cpu.regs(), [0, 0, 1, 0]);
    }

    #[test]
    fn cycle_budget_on_infinite_loop() {
        let mut cpu = boot("here: JMP here");
        assert_eq!(cpu.run(3), Ok(3));
        assert!(!cpu.halted());
        assert_eq!(cpu.pc(), 0);
    }

    #[test]
    fn halted_step_is_noop() {
        let mut cpu = boot("HLT\nLDI R0, #1");
        cpu.step().unwrap();
        assert!(cpu.halted());
        let pc = cpu.pc();
        cpu.step().unwrap();
        assert_eq!(cpu.pc(), pc);
        assert_eq!(cpu.reg(R0), 0);
        assert_eq!(cpu.run(10), Ok(0));
    }

    #[test]
    fn unknown_opcode_faults() {
        let mut cpu = Cpu::new();
        cpu.load(&[0x00, 0xB3, 0x00], 0);
        let fault = cpu.run(10).unwrap_err();
        assert_eq!(
            fault,
            Fault {
                kind: FaultKind::UnknownOpcode,
                opcode: 0xB3,
                addr: 1
            }
        );
        assert!(cpu.halted());
        // Operand byte consumed before the fault
        assert_eq!(cpu.pc(), 3);
    }

    #[test]
    fn invalid_register_faults() {
        let mut cpu = Cpu::new();
        cpu.load(&[0x14, 0x01], 0);
        assert_eq!(
            cpu.step().unwrap_err().kind,
            FaultKind::InvalidRegister(4)
        );
        assert!(cpu.halted());

        let mut cpu = Cpu::new();
        cpu.load(&[0x50, 0x06], 0);
        assert_eq!(
            cpu.step().unwrap_err().kind,
            FaultKind::InvalidRegister(6)
        );
    }

    #[test]
    fn load_wraps_and_pc_wraps() {
        let mut cpu = Cpu::new();
        // LDI R0, #7 straddling the end of memory, then HLT at 0x0000
        cpu.load(&[0x10, 0x07, 0xFF], 0xFFFE);
        assert_eq!(cpu.read(0xFFFF), 0x07);
        assert_eq!(cpu.read(0x0000), 0xFF);
        cpu.set_pc(0xFFFE);
        assert_eq!(cpu.run(10), Ok(2));
        assert_eq!(cpu.reg(R0), 7);
        assert_eq!(cpu.pc(), 1);
    }

    #[test]
    fn address_operand_wraps() {
        let mut cpu = Cpu::new();
        // JMP 0x0040 with its high byte at address 0x0000
        cpu.load(&[0xA0, 0x40], 0xFFFE);
        cpu.set_pc(0xFFFE);
        cpu.step().unwrap();
        assert_eq!(cpu.pc(), 0x0040);
    }

    #[test]
    fn trace_line() {
        let mut cpu = boot("LDI R2, #0x1F\nHLT");
        cpu.step().unwrap();
        assert_eq!(
            cpu.to_string(),
            "PC=0002 IR=12 R0=00 R1=00 R2=1F R3=00 Z=0 C=0"
        );
    }
}
