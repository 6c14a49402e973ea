//! Instruction decoding for traces and debuggers.
//!
//! Everything here reads through [`Memory6502::peek`], so disassembling or
//! tracing never disturbs device registers.

use std::fmt;

use super::{opcodes, AddrMode, Cpu6502, Memory6502, Opcode};

/// One decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub pc: u16,
    pub opcode: u8,
    /// Operand bytes; only the first `desc.mode.operand_len()` are meaningful.
    pub operands: [u8; 2],
    pub desc: &'static Opcode,
}

impl Instruction {
    /// Decode from raw bytes starting at the opcode. Missing operand bytes
    /// read as zero.
    pub fn decode(pc: u16, bytes: &[u8]) -> Self {
        let opcode = bytes.first().copied().unwrap_or(0);
        Self {
            pc,
            opcode,
            operands: [
                bytes.get(1).copied().unwrap_or(0),
                bytes.get(2).copied().unwrap_or(0),
            ],
            desc: opcodes::lookup(opcode),
        }
    }

    /// Decode the instruction at `pc` without read side effects.
    pub fn fetch<M: Memory6502 + ?Sized>(memory: &M, pc: u16) -> Self {
        let bytes = [
            memory.peek(pc),
            memory.peek(pc.wrapping_add(1)),
            memory.peek(pc.wrapping_add(2)),
        ];
        Self::decode(pc, &bytes)
    }

    pub fn len(&self) -> u16 {
        self.desc.len()
    }

    /// Address of the following instruction in program order.
    pub fn next_pc(&self) -> u16 {
        self.pc.wrapping_add(self.len())
    }

    /// Opcode and operand bytes, e.g. `4C F5 C5`.
    pub fn hex_bytes(&self) -> String {
        let mut out = format!("{:02X}", self.opcode);
        for b in &self.operands[..self.desc.mode.operand_len() as usize] {
            out.push_str(&format!(" {:02X}", b));
        }
        out
    }

    fn word(&self) -> u16 {
        u16::from_le_bytes(self.operands)
    }

    fn operand_text(&self) -> String {
        let b = self.operands[0];
        match self.desc.mode {
            AddrMode::Implied => String::new(),
            AddrMode::Accumulator => "A".to_string(),
            AddrMode::Immediate => format!("#${:02X}", b),
            AddrMode::ZeroPage => format!("${:02X}", b),
            AddrMode::ZeroPageX => format!("${:02X},X", b),
            AddrMode::ZeroPageY => format!("${:02X},Y", b),
            AddrMode::Absolute => format!("${:04X}", self.word()),
            AddrMode::AbsoluteX => format!("${:04X},X", self.word()),
            AddrMode::AbsoluteY => format!("${:04X},Y", self.word()),
            AddrMode::Indirect => format!("(${:04X})", self.word()),
            AddrMode::IndirectX => format!("(${:02X},X)", b),
            AddrMode::IndirectY => format!("(${:02X}),Y", b),
            AddrMode::Relative => {
                let target = self.next_pc().wrapping_add_signed(b as i8 as i16);
                format!("${:04X}", target)
            }
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operand = self.operand_text();
        if operand.is_empty() {
            write!(f, "{}", self.desc.mnemonic)
        } else {
            write!(f, "{} {}", self.desc.mnemonic, operand)
        }
    }
}

/// Disassemble `count` consecutive instructions starting at `start`.
pub fn disassemble<M: Memory6502 + ?Sized>(memory: &M, start: u16, count: usize) -> Vec<Instruction> {
    let mut pc = start;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let ins = Instruction::fetch(memory, pc);
        pc = ins.next_pc();
        out.push(ins);
    }
    out
}

impl<M: Memory6502> Cpu6502<M> {
    /// One nestest-style trace line for the instruction at PC, e.g.
    /// `C000  4C F5 C5  JMP $C5F5    ...    A:00 X:00 Y:00 P:24 SP:FD CYC:7`.
    pub fn trace_line(&self) -> String {
        let ins = Instruction::fetch(&self.memory, self.pc);
        let marker = if ins.desc.legal { ' ' } else { '*' };
        format!(
            "{:04X}  {:<8} {}{:<32}A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} CYC:{}",
            self.pc,
            ins.hex_bytes(),
            marker,
            ins.to_string(),
            self.a,
            self.x,
            self.y,
            self.status(),
            self.sp,
            self.cycles
        )
    }

    pub fn disassemble(&self, start: u16, count: usize) -> Vec<Instruction> {
        disassemble(&self.memory, start, count)
    }
}
