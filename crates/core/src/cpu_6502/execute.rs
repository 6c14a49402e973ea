//! Operation dispatch.
//!
//! `execute` receives an already-resolved operand and applies the register,
//! flag and bus effects of one instruction. It returns only the cycles the
//! descriptor cannot know in advance (taken-branch penalties); base cycles and
//! the indexed page-cross penalty are accounted by `step`.

use super::{
    status, Cpu6502, Memory6502, Mnemonic, Opcode, Resolved, Target, IRQ_VECTOR,
    NMI_VECTOR,
};
use crate::logging::{log, LogCategory, LogLevel};

impl<M: Memory6502> Cpu6502<M> {
    pub(super) fn execute(&mut self, desc: &Opcode, operand: Resolved) -> u32 {
        use Mnemonic::*;

        match desc.mnemonic {
            // Loads and stores
            LDA => {
                self.a = self.load(operand);
                self.set_zero_and_negative(self.a);
            }
            LDX => {
                self.x = self.load(operand);
                self.set_zero_and_negative(self.x);
            }
            LDY => {
                self.y = self.load(operand);
                self.set_zero_and_negative(self.y);
            }
            STA => self.store(operand, self.a),
            STX => self.store(operand, self.x),
            STY => self.store(operand, self.y),

            // Transfers
            TAX => {
                self.x = self.a;
                self.set_zero_and_negative(self.x);
            }
            TAY => {
                self.y = self.a;
                self.set_zero_and_negative(self.y);
            }
            TXA => {
                self.a = self.x;
                self.set_zero_and_negative(self.a);
            }
            TYA => {
                self.a = self.y;
                self.set_zero_and_negative(self.a);
            }
            TSX => {
                self.x = self.sp;
                self.set_zero_and_negative(self.x);
            }
            TXS => self.sp = self.x,

            // Stack
            PHA => self.push_u8(self.a),
            PHP => self.push_u8(status::pushed(self.status, true)),
            PLA => {
                self.a = self.pop_u8();
                self.set_zero_and_negative(self.a);
            }
            PLP => {
                let previous = self.flag(status::IRQ_DISABLE);
                self.status = status::pulled(self.pop_u8());
                self.irq_mask_delay = Some(previous);
            }

            // Logic and arithmetic
            AND => {
                let v = self.load(operand);
                self.a &= v;
                self.set_zero_and_negative(self.a);
            }
            ORA => {
                let v = self.load(operand);
                self.a |= v;
                self.set_zero_and_negative(self.a);
            }
            EOR => {
                let v = self.load(operand);
                self.a ^= v;
                self.set_zero_and_negative(self.a);
            }
            ADC => {
                let v = self.load(operand);
                self.adc(v);
            }
            SBC => {
                let v = self.load(operand);
                self.sbc(v);
            }
            CMP => {
                let v = self.load(operand);
                self.compare(self.a, v);
            }
            CPX => {
                let v = self.load(operand);
                self.compare(self.x, v);
            }
            CPY => {
                let v = self.load(operand);
                self.compare(self.y, v);
            }
            BIT => {
                let v = self.load(operand);
                self.set_flag(status::ZERO, self.a & v == 0);
                self.set_flag(status::OVERFLOW, v & 0x40 != 0);
                self.set_flag(status::NEGATIVE, v & 0x80 != 0);
            }

            // Increments and decrements
            INC => {
                let r = self.modify(operand, |_, v| v.wrapping_add(1));
                self.set_zero_and_negative(r);
            }
            DEC => {
                let r = self.modify(operand, |_, v| v.wrapping_sub(1));
                self.set_zero_and_negative(r);
            }
            INX => {
                self.x = self.x.wrapping_add(1);
                self.set_zero_and_negative(self.x);
            }
            INY => {
                self.y = self.y.wrapping_add(1);
                self.set_zero_and_negative(self.y);
            }
            DEX => {
                self.x = self.x.wrapping_sub(1);
                self.set_zero_and_negative(self.x);
            }
            DEY => {
                self.y = self.y.wrapping_sub(1);
                self.set_zero_and_negative(self.y);
            }

            // Shifts and rotates
            ASL => {
                self.modify(operand, Self::asl);
            }
            LSR => {
                self.modify(operand, Self::lsr);
            }
            ROL => {
                self.modify(operand, Self::rol);
            }
            ROR => {
                self.modify(operand, Self::ror);
            }

            // Jumps and subroutines
            JMP => self.pc = self.target_address(operand),
            JSR => {
                let target = self.target_address(operand);
                self.push_u16(self.pc.wrapping_sub(1));
                self.pc = target;
            }
            RTS => self.pc = self.pop_u16().wrapping_add(1),
            RTI => {
                self.status = status::pulled(self.pop_u8());
                self.pc = self.pop_u16();
                self.irq_mask_delay = None;
            }
            BRK => self.brk(),

            // Branches
            BCC => return self.branch(!self.flag(status::CARRY), operand),
            BCS => return self.branch(self.flag(status::CARRY), operand),
            BNE => return self.branch(!self.flag(status::ZERO), operand),
            BEQ => return self.branch(self.flag(status::ZERO), operand),
            BPL => return self.branch(!self.flag(status::NEGATIVE), operand),
            BMI => return self.branch(self.flag(status::NEGATIVE), operand),
            BVC => return self.branch(!self.flag(status::OVERFLOW), operand),
            BVS => return self.branch(self.flag(status::OVERFLOW), operand),

            // Flags
            CLC => self.set_flag(status::CARRY, false),
            SEC => self.set_flag(status::CARRY, true),
            CLD => self.set_flag(status::DECIMAL, false),
            SED => self.set_flag(status::DECIMAL, true),
            CLV => self.set_flag(status::OVERFLOW, false),
            CLI => {
                self.irq_mask_delay = Some(self.flag(status::IRQ_DISABLE));
                self.set_flag(status::IRQ_DISABLE, false);
            }
            SEI => {
                self.irq_mask_delay = Some(self.flag(status::IRQ_DISABLE));
                self.set_flag(status::IRQ_DISABLE, true);
            }

            // Multi-byte NOPs still perform their operand read.
            NOP => {
                if let Target::Address(addr) = operand.target {
                    self.read(addr);
                }
            }

            // Combined read-modify-write + ALU
            SLO => {
                let m = self.modify(operand, Self::asl);
                self.a |= m;
                self.set_zero_and_negative(self.a);
            }
            RLA => {
                let m = self.modify(operand, Self::rol);
                self.a &= m;
                self.set_zero_and_negative(self.a);
            }
            SRE => {
                let m = self.modify(operand, Self::lsr);
                self.a ^= m;
                self.set_zero_and_negative(self.a);
            }
            RRA => {
                let m = self.modify(operand, Self::ror);
                self.adc(m);
            }
            DCP => {
                let m = self.modify(operand, |_, v| v.wrapping_sub(1));
                self.compare(self.a, m);
            }
            ISC => {
                let m = self.modify(operand, |_, v| v.wrapping_add(1));
                self.sbc(m);
            }

            LAX => {
                let v = self.load(operand);
                self.a = v;
                self.x = v;
                self.set_zero_and_negative(v);
            }
            SAX => self.store(operand, self.a & self.x),

            // Immediate-only combinations
            ANC => {
                let v = self.load(operand);
                self.a &= v;
                self.set_zero_and_negative(self.a);
                self.set_flag(status::CARRY, self.a & 0x80 != 0);
            }
            ALR => {
                let v = self.load(operand);
                self.a = self.lsr(self.a & v);
            }
            ARR => {
                let v = self.load(operand);
                let carry_in = (self.status & status::CARRY) << 7;
                self.a = ((self.a & v) >> 1) | carry_in;
                self.set_zero_and_negative(self.a);
                let bit6 = self.a & 0x40 != 0;
                let bit5 = self.a & 0x20 != 0;
                self.set_flag(status::CARRY, bit6);
                self.set_flag(status::OVERFLOW, bit6 != bit5);
            }
            SBX => {
                let v = self.load(operand);
                let t = self.a & self.x;
                self.set_flag(status::CARRY, t >= v);
                self.x = t.wrapping_sub(v);
                self.set_zero_and_negative(self.x);
            }
            ANE => {
                let v = self.load(operand);
                self.a = (self.a | 0xEE) & self.x & v;
                self.set_zero_and_negative(self.a);
            }
            LXA => {
                let v = self.load(operand);
                self.a = (self.a | 0xEE) & v;
                self.x = self.a;
                self.set_zero_and_negative(self.a);
            }

            // Unstable high-byte stores
            SHA => self.store_high_and(operand, self.y, self.a & self.x),
            SHX => self.store_high_and(operand, self.y, self.x),
            SHY => self.store_high_and(operand, self.x, self.y),
            TAS => {
                self.sp = self.a & self.x;
                self.store_high_and(operand, self.y, self.sp);
            }
            LAS => {
                let v = self.load(operand) & self.sp;
                self.a = v;
                self.x = v;
                self.sp = v;
                self.set_zero_and_negative(v);
            }

            // Handled by `step` before dispatch.
            JAM => {}
        }
        0
    }

    /// Read the operand value: the accumulator or one bus read.
    fn load(&mut self, operand: Resolved) -> u8 {
        match operand.target {
            Target::Address(addr) => self.read(addr),
            Target::Accumulator => self.a,
            // The table never pairs a reading operation with implied mode.
            Target::Implied => 0,
        }
    }

    fn store(&mut self, operand: Resolved, val: u8) {
        match operand.target {
            Target::Address(addr) => self.write(addr, val),
            Target::Accumulator => self.a = val,
            Target::Implied => {}
        }
    }

    /// Read-modify-write: one read, one write of the result. Returns the result.
    fn modify(&mut self, operand: Resolved, f: impl FnOnce(&mut Self, u8) -> u8) -> u8 {
        let old = self.load(operand);
        let new = f(self, old);
        self.store(operand, new);
        new
    }

    fn target_address(&self, operand: Resolved) -> u16 {
        operand.address().unwrap_or(self.pc)
    }

    fn adc(&mut self, val: u8) {
        let carry = (self.status & status::CARRY) as u16;
        let sum = self.a as u16 + val as u16 + carry;
        let result = sum as u8;
        self.set_flag(status::CARRY, sum > 0xFF);
        self.set_flag(
            status::OVERFLOW,
            (self.a ^ result) & (val ^ result) & 0x80 != 0,
        );
        self.a = result;
        self.set_zero_and_negative(result);
    }

    /// Binary subtract with borrow; D is ignored.
    fn sbc(&mut self, val: u8) {
        self.adc(!val);
    }

    fn compare(&mut self, reg: u8, val: u8) {
        self.set_flag(status::CARRY, reg >= val);
        self.set_zero_and_negative(reg.wrapping_sub(val));
    }

    fn asl(&mut self, v: u8) -> u8 {
        self.set_flag(status::CARRY, v & 0x80 != 0);
        let r = v << 1;
        self.set_zero_and_negative(r);
        r
    }

    fn lsr(&mut self, v: u8) -> u8 {
        self.set_flag(status::CARRY, v & 0x01 != 0);
        let r = v >> 1;
        self.set_zero_and_negative(r);
        r
    }

    fn rol(&mut self, v: u8) -> u8 {
        let carry_in = self.status & status::CARRY;
        self.set_flag(status::CARRY, v & 0x80 != 0);
        let r = (v << 1) | carry_in;
        self.set_zero_and_negative(r);
        r
    }

    fn ror(&mut self, v: u8) -> u8 {
        let carry_in = (self.status & status::CARRY) << 7;
        self.set_flag(status::CARRY, v & 0x01 != 0);
        let r = (v >> 1) | carry_in;
        self.set_zero_and_negative(r);
        r
    }

    /// Taken branches cost one cycle, two when the target is on another page.
    fn branch(&mut self, taken: bool, operand: Resolved) -> u32 {
        if !taken {
            return 0;
        }
        self.pc = self.target_address(operand);
        if operand.page_crossed {
            2
        } else {
            1
        }
    }

    /// SHA/SHX/SHY/TAS: store `value & (base_hi + 1)`. When indexing crossed a
    /// page the stored value also replaces the address high byte.
    fn store_high_and(&mut self, operand: Resolved, index: u8, value: u8) {
        let Some(addr) = operand.address() else {
            return;
        };
        let base = addr.wrapping_sub(index as u16);
        let base_hi = (base >> 8) as u8;
        let v = value & base_hi.wrapping_add(1);
        let addr = if operand.page_crossed {
            ((v as u16) << 8) | (addr & 0x00FF)
        } else {
            addr
        };
        self.write(addr, v);
    }

    /// BRK: push PC+2 of the opcode and P with B set, then vector. A latched
    /// NMI takes over the vector fetch and is consumed.
    fn brk(&mut self) {
        let brk_pc = self.pc.wrapping_sub(1);
        let return_pc = self.pc.wrapping_add(1);
        self.push_u16(return_pc);
        self.push_u8(status::pushed(self.status, true));
        self.status |= status::IRQ_DISABLE;

        let hijacked = self.lines.take_nmi();
        let vector = if hijacked { NMI_VECTOR } else { IRQ_VECTOR };
        self.pc = self.read_u16(vector);
        log(LogCategory::Interrupts, LogLevel::Debug, || {
            format!(
                "CPU: BRK at PC={:04X}, pushed {:04X}, {} vector -> {:04X}",
                brk_pc,
                return_pc,
                if hijacked { "NMI" } else { "IRQ" },
                self.pc
            )
        });
    }
}
