//! Addressing-mode resolution.
//!
//! The resolver consumes the operand bytes after the opcode and produces the
//! effective address, plus whether indexing crossed a 256-byte page. It never
//! reads the operand itself: the operation does that, once, if it needs it.

use super::{AddrMode, Cpu6502, Memory6502};

/// Where an instruction's operand lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// No operand (register-only and stack instructions).
    Implied,
    Accumulator,
    /// Effective address. For immediate mode it is the operand byte's address;
    /// for relative mode it is the branch destination.
    Address(u16),
}

/// Result of resolving one instruction's addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub target: Target,
    pub page_crossed: bool,
}

impl Resolved {
    const fn at(addr: u16) -> Self {
        Self {
            target: Target::Address(addr),
            page_crossed: false,
        }
    }

    const fn indexed(base: u16, addr: u16) -> Self {
        Self {
            target: Target::Address(addr),
            page_crossed: pages_differ(base, addr),
        }
    }

    pub fn address(&self) -> Option<u16> {
        match self.target {
            Target::Address(a) => Some(a),
            _ => None,
        }
    }
}

#[inline]
pub const fn pages_differ(a: u16, b: u16) -> bool {
    (a & 0xFF00) != (b & 0xFF00)
}

impl<M: Memory6502> Cpu6502<M> {
    /// Resolve `mode` at the current PC, advancing PC past the operand bytes.
    pub(super) fn resolve(&mut self, mode: AddrMode) -> Resolved {
        match mode {
            AddrMode::Implied => Resolved {
                target: Target::Implied,
                page_crossed: false,
            },
            AddrMode::Accumulator => Resolved {
                target: Target::Accumulator,
                page_crossed: false,
            },
            AddrMode::Immediate => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                Resolved::at(addr)
            }
            AddrMode::ZeroPage => {
                let zp = self.fetch_u8();
                Resolved::at(zp as u16)
            }
            // Index overflow stays inside page zero.
            AddrMode::ZeroPageX => {
                let zp = self.fetch_u8();
                Resolved::at(zp.wrapping_add(self.x) as u16)
            }
            AddrMode::ZeroPageY => {
                let zp = self.fetch_u8();
                Resolved::at(zp.wrapping_add(self.y) as u16)
            }
            AddrMode::Absolute => {
                let addr = self.fetch_u16();
                Resolved::at(addr)
            }
            AddrMode::AbsoluteX => {
                let base = self.fetch_u16();
                Resolved::indexed(base, base.wrapping_add(self.x as u16))
            }
            AddrMode::AbsoluteY => {
                let base = self.fetch_u16();
                Resolved::indexed(base, base.wrapping_add(self.y as u16))
            }
            AddrMode::Indirect => {
                let ptr = self.fetch_u16();
                Resolved::at(self.read_indirect_u16_bug(ptr))
            }
            // (Indirect,X): zero-page operand plus X, pointer read from page zero.
            AddrMode::IndirectX => {
                let zp = self.fetch_u8().wrapping_add(self.x);
                Resolved::at(self.read_zero_page_u16(zp))
            }
            // (Indirect),Y: pointer read from page zero, then Y added.
            AddrMode::IndirectY => {
                let zp = self.fetch_u8();
                let base = self.read_zero_page_u16(zp);
                Resolved::indexed(base, base.wrapping_add(self.y as u16))
            }
            AddrMode::Relative => {
                let offset = self.fetch_u8() as i8;
                let next = self.pc;
                Resolved::indexed(next, next.wrapping_add_signed(offset as i16))
            }
        }
    }

    /// Pointer stored in page zero; the high byte wraps from $FF to $00.
    #[inline]
    fn read_zero_page_u16(&mut self, zp: u8) -> u16 {
        let lo = self.read(zp as u16) as u16;
        let hi = self.read(zp.wrapping_add(1) as u16) as u16;
        (hi << 8) | lo
    }

    /// Read a 16-bit pointer for JMP (indirect) with the 6502 page-wrapping bug.
    #[inline]
    fn read_indirect_u16_bug(&mut self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi_addr = (addr & 0xFF00) | (addr.wrapping_add(1) & 0x00FF);
        let hi = self.read(hi_addr) as u16;
        (hi << 8) | lo
    }
}
