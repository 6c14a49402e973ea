//! Serializable CPU snapshot for save states.
//!
//! Memory is not included; the owning system saves its own RAM and mapper
//! state alongside this.

use serde::{Deserialize, Serialize};

use super::{status, Cpu6502, ExecState, Memory6502};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuState {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub status: u8,
    pub pc: u16,
    pub cycles: u64,
    pub exec_state: ExecState,
    /// I value the next IRQ poll uses after CLI/SEI/PLP.
    #[serde(default)]
    pub irq_mask_delay: Option<bool>,
    #[serde(default)]
    pub nmi_pending: bool,
    #[serde(default)]
    pub reset_pending: bool,
    /// Bitmask of asserting IRQ sources.
    #[serde(default)]
    pub irq_sources: u8,
}

impl CpuState {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl<M: Memory6502> Cpu6502<M> {
    pub fn save_state(&self) -> CpuState {
        CpuState {
            a: self.a,
            x: self.x,
            y: self.y,
            sp: self.sp,
            status: self.status(),
            pc: self.pc,
            cycles: self.cycles,
            exec_state: self.state,
            irq_mask_delay: self.irq_mask_delay,
            nmi_pending: self.lines.nmi_pending(),
            reset_pending: self.lines.reset_pending(),
            irq_sources: self.lines.irq_sources(),
        }
    }

    /// Restore registers and line state. Memory is left untouched.
    pub fn load_state(&mut self, state: &CpuState) {
        self.a = state.a;
        self.x = state.x;
        self.y = state.y;
        self.sp = state.sp;
        self.status = status::pulled(state.status);
        self.pc = state.pc;
        self.cycles = state.cycles;
        self.state = state.exec_state;
        self.irq_mask_delay = state.irq_mask_delay;

        self.lines.clear_latches();
        if state.nmi_pending {
            self.lines.raise_nmi();
        }
        if state.reset_pending {
            self.lines.request_reset();
        }
        self.lines.set_irq_sources(state.irq_sources);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_6502::{ArrayMemory, IrqSource};

    #[test]
    fn save_and_restore_through_json() {
        let mut mem = ArrayMemory::new();
        mem.load_program(0x0600, &[0xA9, 0x80, 0x38, 0x02]);
        let mut cpu = Cpu6502::new(mem);
        cpu.reset();
        cpu.step();
        cpu.step();
        cpu.step();
        assert!(cpu.is_halted());
        cpu.raise_irq(IrqSource::Mapper);
        cpu.raise_nmi();

        let json = cpu.save_state().to_json().unwrap();
        let restored = CpuState::from_json(&json).unwrap();

        let mut other = Cpu6502::new(ArrayMemory::new());
        other.load_state(&restored);
        assert_eq!(other.a, 0x80);
        assert_eq!(other.pc, 0x0603);
        assert!(other.flag(status::CARRY));
        assert!(other.flag(status::NEGATIVE));
        assert!(other.is_halted());
        assert_eq!(other.total_cycles(), cpu.total_cycles());
        assert!(other.interrupt_lines().nmi_pending());
        assert!(other.interrupt_lines().irq_asserted_by(IrqSource::Mapper));
        assert_eq!(other.save_state(), cpu.save_state());
    }

    #[test]
    fn missing_line_fields_default_to_idle() {
        let json = r#"{"a":1,"x":2,"y":3,"sp":253,"status":36,"pc":49152,"cycles":7,"exec_state":"Running"}"#;
        let state = CpuState::from_json(json).unwrap();
        assert!(!state.nmi_pending);
        assert_eq!(state.irq_sources, 0);
        assert_eq!(state.irq_mask_delay, None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(CpuState::from_json("{\"a\":").is_err());
    }
}
