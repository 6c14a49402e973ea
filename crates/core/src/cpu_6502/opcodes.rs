//! Static opcode table covering all 256 byte values.
//!
//! Each entry is plain data: the operation, its addressing mode, the base
//! cycle cost and whether an indexed page crossing adds a cycle. The engine
//! dispatches on [`Mnemonic`] with a single `match`, so there is no per-opcode
//! code outside `execute.rs`.

use serde::{Deserialize, Serialize};

/// Operation identifier. Upper-case names follow the usual assembler
/// mnemonics; the undocumented ones use the names from the NESdev wiki.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mnemonic {
    ADC,
    AND,
    ASL,
    BCC,
    BCS,
    BEQ,
    BIT,
    BMI,
    BNE,
    BPL,
    BRK,
    BVC,
    BVS,
    CLC,
    CLD,
    CLI,
    CLV,
    CMP,
    CPX,
    CPY,
    DEC,
    DEX,
    DEY,
    EOR,
    INC,
    INX,
    INY,
    JMP,
    JSR,
    LDA,
    LDX,
    LDY,
    LSR,
    NOP,
    ORA,
    PHA,
    PHP,
    PLA,
    PLP,
    ROL,
    ROR,
    RTI,
    RTS,
    SBC,
    SEC,
    SED,
    SEI,
    STA,
    STX,
    STY,
    TAX,
    TAY,
    TSX,
    TXA,
    TXS,
    TYA,
    // Undocumented
    ALR,
    ANC,
    ANE,
    ARR,
    DCP,
    ISC,
    JAM,
    LAS,
    LAX,
    LXA,
    RLA,
    RRA,
    SAX,
    SBX,
    SHA,
    SHX,
    SHY,
    SLO,
    SRE,
    TAS,
}

impl std::fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // nestest prints ISC as ISB
        match self {
            Mnemonic::ISC => f.write_str("ISB"),
            other => write!(f, "{:?}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddrMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
    Relative,
}

impl AddrMode {
    /// Number of operand bytes following the opcode.
    pub const fn operand_len(self) -> u16 {
        match self {
            AddrMode::Implied | AddrMode::Accumulator => 0,
            AddrMode::Immediate
            | AddrMode::ZeroPage
            | AddrMode::ZeroPageX
            | AddrMode::ZeroPageY
            | AddrMode::IndirectX
            | AddrMode::IndirectY
            | AddrMode::Relative => 1,
            AddrMode::Absolute | AddrMode::AbsoluteX | AddrMode::AbsoluteY | AddrMode::Indirect => {
                2
            }
        }
    }
}

/// Immutable description of one opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub mnemonic: Mnemonic,
    pub mode: AddrMode,
    /// Cycles consumed without page-cross or branch penalties.
    pub cycles: u8,
    /// Add one cycle when the indexed address computation crosses a page.
    pub page_penalty: bool,
    /// Part of the documented instruction set.
    pub legal: bool,
}

impl Opcode {
    /// Total instruction length in bytes, opcode included.
    pub const fn len(&self) -> u16 {
        1 + self.mode.operand_len()
    }

    pub const fn is_jam(&self) -> bool {
        matches!(self.mnemonic, Mnemonic::JAM)
    }
}

/// Look up the descriptor for an opcode byte.
#[inline]
pub fn lookup(op: u8) -> &'static Opcode {
    &OPCODES[op as usize]
}

const fn doc(mnemonic: Mnemonic, mode: AddrMode, cycles: u8) -> Opcode {
    Opcode {
        mnemonic,
        mode,
        cycles,
        page_penalty: false,
        legal: true,
    }
}

const fn doc_px(mnemonic: Mnemonic, mode: AddrMode, cycles: u8) -> Opcode {
    Opcode {
        mnemonic,
        mode,
        cycles,
        page_penalty: true,
        legal: true,
    }
}

const fn undoc(mnemonic: Mnemonic, mode: AddrMode, cycles: u8) -> Opcode {
    Opcode {
        mnemonic,
        mode,
        cycles,
        page_penalty: false,
        legal: false,
    }
}

const fn undoc_px(mnemonic: Mnemonic, mode: AddrMode, cycles: u8) -> Opcode {
    Opcode {
        mnemonic,
        mode,
        cycles,
        page_penalty: true,
        legal: false,
    }
}

const fn jam() -> Opcode {
    undoc(Mnemonic::JAM, AddrMode::Implied, 2)
}

use AddrMode::{
    Absolute as ABS, AbsoluteX as ABX, AbsoluteY as ABY, Accumulator as ACC, Immediate as IMM,
    Implied as IMP, Indirect as IND, IndirectX as IZX, IndirectY as IZY, Relative as REL,
    ZeroPage as ZP, ZeroPageX as ZPX, ZeroPageY as ZPY,
};
use Mnemonic::*;

/// The full table, indexed by opcode byte.
pub static OPCODES: [Opcode; 256] = [
    // 0x00
    doc(BRK, IMP, 7),
    doc(ORA, IZX, 6),
    jam(),
    undoc(SLO, IZX, 8),
    undoc(NOP, ZP, 3),
    doc(ORA, ZP, 3),
    doc(ASL, ZP, 5),
    undoc(SLO, ZP, 5),
    doc(PHP, IMP, 3),
    doc(ORA, IMM, 2),
    doc(ASL, ACC, 2),
    undoc(ANC, IMM, 2),
    undoc(NOP, ABS, 4),
    doc(ORA, ABS, 4),
    doc(ASL, ABS, 6),
    undoc(SLO, ABS, 6),
    // 0x10
    doc(BPL, REL, 2),
    doc_px(ORA, IZY, 5),
    jam(),
    undoc(SLO, IZY, 8),
    undoc(NOP, ZPX, 4),
    doc(ORA, ZPX, 4),
    doc(ASL, ZPX, 6),
    undoc(SLO, ZPX, 6),
    doc(CLC, IMP, 2),
    doc_px(ORA, ABY, 4),
    undoc(NOP, IMP, 2),
    undoc(SLO, ABY, 7),
    undoc_px(NOP, ABX, 4),
    doc_px(ORA, ABX, 4),
    doc(ASL, ABX, 7),
    undoc(SLO, ABX, 7),
    // 0x20
    doc(JSR, ABS, 6),
    doc(AND, IZX, 6),
    jam(),
    undoc(RLA, IZX, 8),
    doc(BIT, ZP, 3),
    doc(AND, ZP, 3),
    doc(ROL, ZP, 5),
    undoc(RLA, ZP, 5),
    doc(PLP, IMP, 4),
    doc(AND, IMM, 2),
    doc(ROL, ACC, 2),
    undoc(ANC, IMM, 2),
    doc(BIT, ABS, 4),
    doc(AND, ABS, 4),
    doc(ROL, ABS, 6),
    undoc(RLA, ABS, 6),
    // 0x30
    doc(BMI, REL, 2),
    doc_px(AND, IZY, 5),
    jam(),
    undoc(RLA, IZY, 8),
    undoc(NOP, ZPX, 4),
    doc(AND, ZPX, 4),
    doc(ROL, ZPX, 6),
    undoc(RLA, ZPX, 6),
    doc(SEC, IMP, 2),
    doc_px(AND, ABY, 4),
    undoc(NOP, IMP, 2),
    undoc(RLA, ABY, 7),
    undoc_px(NOP, ABX, 4),
    doc_px(AND, ABX, 4),
    doc(ROL, ABX, 7),
    undoc(RLA, ABX, 7),
    // 0x40
    doc(RTI, IMP, 6),
    doc(EOR, IZX, 6),
    jam(),
    undoc(SRE, IZX, 8),
    undoc(NOP, ZP, 3),
    doc(EOR, ZP, 3),
    doc(LSR, ZP, 5),
    undoc(SRE, ZP, 5),
    doc(PHA, IMP, 3),
    doc(EOR, IMM, 2),
    doc(LSR, ACC, 2),
    undoc(ALR, IMM, 2),
    doc(JMP, ABS, 3),
    doc(EOR, ABS, 4),
    doc(LSR, ABS, 6),
    undoc(SRE, ABS, 6),
    // 0x50
    doc(BVC, REL, 2),
    doc_px(EOR, IZY, 5),
    jam(),
    undoc(SRE, IZY, 8),
    undoc(NOP, ZPX, 4),
    doc(EOR, ZPX, 4),
    doc(LSR, ZPX, 6),
    undoc(SRE, ZPX, 6),
    doc(CLI, IMP, 2),
    doc_px(EOR, ABY, 4),
    undoc(NOP, IMP, 2),
    undoc(SRE, ABY, 7),
    undoc_px(NOP, ABX, 4),
    doc_px(EOR, ABX, 4),
    doc(LSR, ABX, 7),
    undoc(SRE, ABX, 7),
    // 0x60
    doc(RTS, IMP, 6),
    doc(ADC, IZX, 6),
    jam(),
    undoc(RRA, IZX, 8),
    undoc(NOP, ZP, 3),
    doc(ADC, ZP, 3),
    doc(ROR, ZP, 5),
    undoc(RRA, ZP, 5),
    doc(PLA, IMP, 4),
    doc(ADC, IMM, 2),
    doc(ROR, ACC, 2),
    undoc(ARR, IMM, 2),
    doc(JMP, IND, 5),
    doc(ADC, ABS, 4),
    doc(ROR, ABS, 6),
    undoc(RRA, ABS, 6),
    // 0x70
    doc(BVS, REL, 2),
    doc_px(ADC, IZY, 5),
    jam(),
    undoc(RRA, IZY, 8),
    undoc(NOP, ZPX, 4),
    doc(ADC, ZPX, 4),
    doc(ROR, ZPX, 6),
    undoc(RRA, ZPX, 6),
    doc(SEI, IMP, 2),
    doc_px(ADC, ABY, 4),
    undoc(NOP, IMP, 2),
    undoc(RRA, ABY, 7),
    undoc_px(NOP, ABX, 4),
    doc_px(ADC, ABX, 4),
    doc(ROR, ABX, 7),
    undoc(RRA, ABX, 7),
    // 0x80
    undoc(NOP, IMM, 2),
    doc(STA, IZX, 6),
    undoc(NOP, IMM, 2),
    undoc(SAX, IZX, 6),
    doc(STY, ZP, 3),
    doc(STA, ZP, 3),
    doc(STX, ZP, 3),
    undoc(SAX, ZP, 3),
    doc(DEY, IMP, 2),
    undoc(NOP, IMM, 2),
    doc(TXA, IMP, 2),
    undoc(ANE, IMM, 2),
    doc(STY, ABS, 4),
    doc(STA, ABS, 4),
    doc(STX, ABS, 4),
    undoc(SAX, ABS, 4),
    // 0x90
    doc(BCC, REL, 2),
    doc(STA, IZY, 6),
    jam(),
    undoc(SHA, IZY, 6),
    doc(STY, ZPX, 4),
    doc(STA, ZPX, 4),
    doc(STX, ZPY, 4),
    undoc(SAX, ZPY, 4),
    doc(TYA, IMP, 2),
    doc(STA, ABY, 5),
    doc(TXS, IMP, 2),
    undoc(TAS, ABY, 5),
    undoc(SHY, ABX, 5),
    doc(STA, ABX, 5),
    undoc(SHX, ABY, 5),
    undoc(SHA, ABY, 5),
    // 0xA0
    doc(LDY, IMM, 2),
    doc(LDA, IZX, 6),
    doc(LDX, IMM, 2),
    undoc(LAX, IZX, 6),
    doc(LDY, ZP, 3),
    doc(LDA, ZP, 3),
    doc(LDX, ZP, 3),
    undoc(LAX, ZP, 3),
    doc(TAY, IMP, 2),
    doc(LDA, IMM, 2),
    doc(TAX, IMP, 2),
    undoc(LXA, IMM, 2),
    doc(LDY, ABS, 4),
    doc(LDA, ABS, 4),
    doc(LDX, ABS, 4),
    undoc(LAX, ABS, 4),
    // 0xB0
    doc(BCS, REL, 2),
    doc_px(LDA, IZY, 5),
    jam(),
    undoc_px(LAX, IZY, 5),
    doc(LDY, ZPX, 4),
    doc(LDA, ZPX, 4),
    doc(LDX, ZPY, 4),
    undoc(LAX, ZPY, 4),
    doc(CLV, IMP, 2),
    doc_px(LDA, ABY, 4),
    doc(TSX, IMP, 2),
    undoc_px(LAS, ABY, 4),
    doc_px(LDY, ABX, 4),
    doc_px(LDA, ABX, 4),
    doc_px(LDX, ABY, 4),
    undoc_px(LAX, ABY, 4),
    // 0xC0
    doc(CPY, IMM, 2),
    doc(CMP, IZX, 6),
    undoc(NOP, IMM, 2),
    undoc(DCP, IZX, 8),
    doc(CPY, ZP, 3),
    doc(CMP, ZP, 3),
    doc(DEC, ZP, 5),
    undoc(DCP, ZP, 5),
    doc(INY, IMP, 2),
    doc(CMP, IMM, 2),
    doc(DEX, IMP, 2),
    undoc(SBX, IMM, 2),
    doc(CPY, ABS, 4),
    doc(CMP, ABS, 4),
    doc(DEC, ABS, 6),
    undoc(DCP, ABS, 6),
    // 0xD0
    doc(BNE, REL, 2),
    doc_px(CMP, IZY, 5),
    jam(),
    undoc(DCP, IZY, 8),
    undoc(NOP, ZPX, 4),
    doc(CMP, ZPX, 4),
    doc(DEC, ZPX, 6),
    undoc(DCP, ZPX, 6),
    doc(CLD, IMP, 2),
    doc_px(CMP, ABY, 4),
    undoc(NOP, IMP, 2),
    undoc(DCP, ABY, 7),
    undoc_px(NOP, ABX, 4),
    doc_px(CMP, ABX, 4),
    doc(DEC, ABX, 7),
    undoc(DCP, ABX, 7),
    // 0xE0
    doc(CPX, IMM, 2),
    doc(SBC, IZX, 6),
    undoc(NOP, IMM, 2),
    undoc(ISC, IZX, 8),
    doc(CPX, ZP, 3),
    doc(SBC, ZP, 3),
    doc(INC, ZP, 5),
    undoc(ISC, ZP, 5),
    doc(INX, IMP, 2),
    doc(SBC, IMM, 2),
    doc(NOP, IMP, 2),
    undoc(SBC, IMM, 2),
    doc(CPX, ABS, 4),
    doc(SBC, ABS, 4),
    doc(INC, ABS, 6),
    undoc(ISC, ABS, 6),
    // 0xF0
    doc(BEQ, REL, 2),
    doc_px(SBC, IZY, 5),
    jam(),
    undoc(ISC, IZY, 8),
    undoc(NOP, ZPX, 4),
    doc(SBC, ZPX, 4),
    doc(INC, ZPX, 6),
    undoc(ISC, ZPX, 6),
    doc(SED, IMP, 2),
    doc_px(SBC, ABY, 4),
    undoc(NOP, IMP, 2),
    undoc(ISC, ABY, 7),
    undoc_px(NOP, ABX, 4),
    doc_px(SBC, ABX, 4),
    doc(INC, ABX, 7),
    undoc(ISC, ABX, 7),
];
