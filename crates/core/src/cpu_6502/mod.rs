//! MOS 6502 CPU core implementation
//!
//! A reusable, cycle-counted 6502 (NMOS, no decimal mode, as found in the
//! NES's 2A03) that works with any system through the [`Memory6502`] trait.
//!
//! Every one of the 256 opcode bytes is defined: the documented instruction
//! set, the stable and unstable undocumented opcodes, and the twelve JAM
//! opcodes that halt the processor until the next reset.
//!
//! Execution is table driven: [`opcodes::OPCODES`] describes each byte as
//! plain data, [`addressing`] turns the mode into an effective address, and
//! `execute.rs` holds the single dispatch `match` over [`Mnemonic`].

mod addressing;
mod debugger;
mod disassembly;
mod execute;
mod interrupts;
mod memory;
pub mod opcodes;
mod state;
pub mod status;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::logging::{log, LogCategory, LogLevel};

pub use addressing::{Resolved, Target};
pub use debugger::{Backtrace, ExecutionState};
pub use disassembly::Instruction;
pub use interrupts::{Interrupt, InterruptLines, IrqSource, INTERRUPT_CYCLES};
pub use memory::{ArrayMemory, Memory6502};
pub use opcodes::{AddrMode, Mnemonic, Opcode};
pub use state::CpuState;

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Base address of the hardware stack page.
const STACK_BASE: u16 = 0x0100;

/// Whether the core is fetching instructions or stuck on a JAM opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecState {
    Running,
    Halted,
}

/// MOS 6502 CPU state and execution engine
///
/// This is a generic, reusable 6502 CPU implementation that works with any
/// system through the `Memory6502` trait.
#[derive(Debug)]
pub struct Cpu6502<M: Memory6502> {
    /// Accumulator register
    pub a: u8,
    /// X index register
    pub x: u8,
    /// Y index register
    pub y: u8,
    /// Stack pointer (points to 0x0100 + sp)
    pub sp: u8,
    /// Status register (NV-BDIZC)
    pub status: u8,
    /// Program counter
    pub pc: u16,
    /// Total cycles executed
    pub cycles: u64,
    /// Memory interface
    pub memory: M,
    state: ExecState,
    lines: Arc<InterruptLines>,
    /// I flag value the next IRQ poll must use instead of the live flag.
    irq_mask_delay: Option<bool>,
}

impl<M: Memory6502> Cpu6502<M> {
    /// Create a new 6502 CPU with the given memory interface
    ///
    /// Registers hold their power-up values; call [`reset`](Self::reset) to
    /// load PC from the reset vector.
    pub fn new(memory: M) -> Self {
        Self::with_lines(memory, Arc::new(InterruptLines::new()))
    }

    /// Create a CPU whose interrupt lines are shared with other components.
    pub fn with_lines(memory: M, lines: Arc<InterruptLines>) -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            status: status::POWER_ON,
            pc: 0,
            cycles: 0,
            memory,
            state: ExecState::Running,
            lines,
            irq_mask_delay: None,
        }
    }

    /// Reset the CPU (preserves memory)
    ///
    /// Loads power-up register values, sets I, reads PC from $FFFC/$FFFD and
    /// charges the 7-cycle startup sequence. Nothing is pushed.
    pub fn reset(&mut self) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = 0xFD;
        self.status = status::POWER_ON;
        self.state = ExecState::Running;
        self.irq_mask_delay = None;
        self.lines.clear_latches();

        self.pc = self.read_u16(RESET_VECTOR);
        self.cycles = self.cycles.wrapping_add(INTERRUPT_CYCLES as u64);
        log(LogCategory::Interrupts, LogLevel::Debug, || {
            format!("CPU: reset, PC={:04X}", self.pc)
        });
    }

    /// Replace the memory interface while preserving CPU state
    pub fn with_memory<N: Memory6502>(self, new_memory: N) -> Cpu6502<N> {
        Cpu6502 {
            a: self.a,
            x: self.x,
            y: self.y,
            sp: self.sp,
            status: self.status,
            pc: self.pc,
            cycles: self.cycles,
            memory: new_memory,
            state: self.state,
            lines: self.lines,
            irq_mask_delay: self.irq_mask_delay,
        }
    }

    /// Execute one instruction and return cycles used.
    ///
    /// A pending reset, NMI or unmasked IRQ is serviced instead of fetching;
    /// that call returns the 7 cycles of the entry sequence. A halted CPU
    /// returns 0 until it is reset.
    pub fn step(&mut self) -> u32 {
        if let Some(used) = self.service_reset_request() {
            return used;
        }
        if self.state == ExecState::Halted {
            return 0;
        }
        if let Some(used) = self.service_interrupts() {
            return used;
        }

        log(LogCategory::Cpu, LogLevel::Trace, || self.trace_line());

        let opcode_pc = self.pc;
        let op = self.fetch_u8();
        let desc = opcodes::lookup(op);
        if desc.is_jam() {
            self.halt(opcode_pc, op);
            self.cycles = self.cycles.wrapping_add(desc.cycles as u64);
            return desc.cycles as u32;
        }

        let operand = self.resolve(desc.mode);
        let mut used = desc.cycles as u32;
        if desc.page_penalty && operand.page_crossed {
            used += 1;
        }
        used += self.execute(desc, operand);

        self.cycles = self.cycles.wrapping_add(used as u64);
        used
    }

    /// Handle shared with components that raise or drop interrupt requests.
    pub fn interrupt_lines(&self) -> Arc<InterruptLines> {
        Arc::clone(&self.lines)
    }

    /// Terminal JAM state; only a reset leaves it.
    pub fn is_halted(&self) -> bool {
        self.state == ExecState::Halted
    }

    pub fn exec_state(&self) -> ExecState {
        self.state
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn status(&self) -> u8 {
        self.status | status::UNUSED
    }

    /// Test one status bit, e.g. `cpu.flag(status::CARRY)`.
    pub fn flag(&self, bit: u8) -> bool {
        self.status & bit != 0
    }

    pub fn total_cycles(&self) -> u64 {
        self.cycles
    }

    #[inline]
    fn set_flag(&mut self, bit: u8, on: bool) {
        if on {
            self.status |= bit;
        } else {
            self.status &= !bit;
        }
    }

    fn set_zero_and_negative(&mut self, v: u8) {
        self.set_flag(status::ZERO, v == 0);
        self.set_flag(status::NEGATIVE, v & 0x80 != 0);
    }

    /// Read a byte from memory
    #[inline]
    fn read(&mut self, addr: u16) -> u8 {
        self.memory.read(addr)
    }

    /// Write a byte to memory
    #[inline]
    fn write(&mut self, addr: u16, val: u8) {
        self.memory.write(addr, val);
    }

    fn read_u16(&mut self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    #[inline]
    fn fetch_u8(&mut self) -> u8 {
        let v = self.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        v
    }

    #[inline]
    fn fetch_u16(&mut self) -> u16 {
        let lo = self.fetch_u8() as u16;
        let hi = self.fetch_u8() as u16;
        (hi << 8) | lo
    }

    #[inline]
    fn push_u8(&mut self, v: u8) {
        let addr = STACK_BASE | self.sp as u16;
        self.write(addr, v);
        self.sp = self.sp.wrapping_sub(1);
    }

    #[inline]
    fn pop_u8(&mut self) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        let addr = STACK_BASE | self.sp as u16;
        self.read(addr)
    }

    #[inline]
    fn push_u16(&mut self, v: u16) {
        let [lo, hi] = v.to_le_bytes();
        self.push_u8(hi);
        self.push_u8(lo);
    }

    #[inline]
    fn pop_u16(&mut self) -> u16 {
        let lo = self.pop_u8() as u16;
        let hi = self.pop_u8() as u16;
        (hi << 8) | lo
    }
}

impl<M: Memory6502> crate::Cpu for Cpu6502<M> {
    fn reset(&mut self) {
        Cpu6502::reset(self);
    }

    fn step(&mut self) -> u32 {
        Cpu6502::step(self)
    }
}
