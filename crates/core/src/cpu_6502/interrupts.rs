//! Interrupt request lines and the reset/NMI/IRQ entry sequences.
//!
//! The lines live behind an `Arc` so that components other than the CPU (a
//! mapper IRQ counter, the frame-timing source, a reset button) can hold a
//! handle and raise or drop requests at any time, including from inside a bus
//! callback while `step()` is running. The engine only looks at them at
//! instruction boundaries.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use super::{status, Cpu6502, Memory6502, ExecState, IRQ_VECTOR, NMI_VECTOR};
use crate::logging::{log, LogCategory, LogLevel};

/// Cycles taken by the reset, NMI, IRQ and BRK entry sequences.
pub const INTERRUPT_CYCLES: u32 = 7;

/// Devices that can hold the shared IRQ line low.
///
/// IRQ is level triggered and wired-OR: the line stays asserted while any
/// source holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrqSource {
    /// Generic external request (test harnesses, expansion port).
    External,
    ApuFrameCounter,
    ApuDmc,
    Mapper,
}

impl IrqSource {
    pub const ALL: [IrqSource; 4] = [
        IrqSource::External,
        IrqSource::ApuFrameCounter,
        IrqSource::ApuDmc,
        IrqSource::Mapper,
    ];

    pub const fn mask(self) -> u8 {
        match self {
            IrqSource::External => 0x01,
            IrqSource::ApuFrameCounter => 0x02,
            IrqSource::ApuDmc => 0x04,
            IrqSource::Mapper => 0x08,
        }
    }
}

/// Which entry sequence is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Reset,
    Nmi,
    Irq,
}

/// Shared interrupt line state.
#[derive(Debug, Default)]
pub struct InterruptLines {
    reset: AtomicBool,
    nmi_latch: AtomicBool,
    nmi_level: AtomicBool,
    irq: AtomicU8,
}

impl InterruptLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a reset at the next instruction boundary.
    pub fn request_reset(&self) {
        self.reset.store(true, Ordering::SeqCst);
    }

    pub fn reset_pending(&self) -> bool {
        self.reset.load(Ordering::SeqCst)
    }

    /// Latch an NMI edge. It stays latched until serviced.
    pub fn raise_nmi(&self) {
        self.nmi_latch.store(true, Ordering::SeqCst);
    }

    /// Drive the NMI input level; only a low-to-high transition latches.
    pub fn set_nmi_line(&self, high: bool) {
        let was_high = self.nmi_level.swap(high, Ordering::SeqCst);
        if high && !was_high {
            self.raise_nmi();
        }
    }

    pub fn nmi_pending(&self) -> bool {
        self.nmi_latch.load(Ordering::SeqCst)
    }

    pub fn raise_irq(&self, source: IrqSource) {
        self.irq.fetch_or(source.mask(), Ordering::SeqCst);
    }

    pub fn clear_irq(&self, source: IrqSource) {
        self.irq.fetch_and(!source.mask(), Ordering::SeqCst);
    }

    /// True while at least one source holds IRQ asserted.
    pub fn irq_asserted(&self) -> bool {
        self.irq.load(Ordering::SeqCst) != 0
    }

    pub fn irq_asserted_by(&self, source: IrqSource) -> bool {
        self.irq.load(Ordering::SeqCst) & source.mask() != 0
    }

    /// Sources currently holding the line, in [`IrqSource::ALL`] order.
    pub fn asserting_sources(&self) -> Vec<IrqSource> {
        let bits = self.irq_sources();
        IrqSource::ALL
            .into_iter()
            .filter(|source| bits & source.mask() != 0)
            .collect()
    }

    /// Raw source bitmask, see [`IrqSource::mask`].
    pub fn irq_sources(&self) -> u8 {
        self.irq.load(Ordering::SeqCst)
    }

    pub(crate) fn set_irq_sources(&self, bits: u8) {
        self.irq.store(bits, Ordering::SeqCst);
    }

    pub(crate) fn take_reset(&self) -> bool {
        self.reset.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn take_nmi(&self) -> bool {
        self.nmi_latch.swap(false, Ordering::SeqCst)
    }

    /// Drop edge latches. IRQ levels belong to their sources and are kept.
    pub(crate) fn clear_latches(&self) {
        self.reset.store(false, Ordering::SeqCst);
        self.nmi_latch.store(false, Ordering::SeqCst);
    }
}

impl<M: Memory6502> Cpu6502<M> {
    /// Latch an NMI; serviced at the next instruction boundary even if I is set.
    pub fn raise_nmi(&mut self) {
        self.lines.raise_nmi();
    }

    /// Assert IRQ on behalf of `source`.
    pub fn raise_irq(&mut self, source: IrqSource) {
        self.lines.raise_irq(source);
    }

    /// Release the IRQ held by `source`.
    pub fn clear_irq(&mut self, source: IrqSource) {
        self.lines.clear_irq(source);
    }

    /// Whether IRQs are masked for the poll at the coming boundary.
    ///
    /// CLI, SEI and PLP change I after the poll of their last cycle, so the
    /// poll that follows them still sees the previous value.
    pub(super) fn irq_masked(&mut self) -> bool {
        match self.irq_mask_delay.take() {
            Some(previous) => previous,
            None => self.status & status::IRQ_DISABLE != 0,
        }
    }

    /// Run an NMI or IRQ entry sequence if one is due. Returns the cycles used.
    pub(super) fn service_interrupts(&mut self) -> Option<u32> {
        let masked = self.irq_masked();
        if self.lines.take_nmi() {
            return Some(self.enter_interrupt(Interrupt::Nmi));
        }
        if self.lines.irq_asserted() && !masked {
            return Some(self.enter_interrupt(Interrupt::Irq));
        }
        None
    }

    /// Push PC and P (B clear), set I and jump through the vector.
    pub(super) fn enter_interrupt(&mut self, kind: Interrupt) -> u32 {
        if kind == Interrupt::Reset {
            self.reset();
            return INTERRUPT_CYCLES;
        }
        let vector = match kind {
            Interrupt::Nmi => NMI_VECTOR,
            _ => IRQ_VECTOR,
        };
        let return_pc = self.pc;
        self.push_u16(return_pc);
        self.push_u8(status::pushed(self.status, false));
        self.status |= status::IRQ_DISABLE;
        self.pc = self.read_u16(vector);
        self.cycles = self.cycles.wrapping_add(INTERRUPT_CYCLES as u64);
        log(LogCategory::Interrupts, LogLevel::Debug, || {
            let sources = match kind {
                Interrupt::Irq => format!(" from {:?}", self.lines.asserting_sources()),
                _ => String::new(),
            };
            format!(
                "CPU: {:?} taken at PC={:04X}{}, vector {:04X} -> {:04X}",
                kind, return_pc, sources, vector, self.pc
            )
        });
        INTERRUPT_CYCLES
    }

    /// Service a reset request raised through the shared lines.
    pub(super) fn service_reset_request(&mut self) -> Option<u32> {
        if self.lines.take_reset() {
            log(LogCategory::Interrupts, LogLevel::Info, || {
                format!(
                    "CPU: reset requested (state {:?}, PC={:04X})",
                    self.state, self.pc
                )
            });
            return Some(self.enter_interrupt(Interrupt::Reset));
        }
        None
    }

    pub(super) fn halt(&mut self, opcode_pc: u16, opcode: u8) {
        self.state = ExecState::Halted;
        self.pc = opcode_pc;
        log(LogCategory::Cpu, LogLevel::Warn, || {
            format!(
                "CPU: JAM opcode {:02X} at PC={:04X}, halted until reset",
                opcode, opcode_pc
            )
        });
    }
}
