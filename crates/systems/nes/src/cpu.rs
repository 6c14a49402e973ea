//! NES CPU wrapper around the reusable 6502 core

use std::sync::Arc;

use r6502_core::cpu_6502::{Cpu6502, CpuState, InterruptLines, RESET_VECTOR};
use r6502_core::logging::{log, LogCategory, LogLevel};
use r6502_core::Memory6502;
use serde::{Deserialize, Serialize};

use crate::bus::NesBus;
use crate::cartridge::{Cartridge, CartridgeError};

/// NTSC CPU clock in Hz.
pub const CPU_CLOCK_NTSC: u64 = 1_789_773;

/// Console save state: CPU snapshot, internal RAM, cartridge PRG RAM and
/// the open-bus latch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NesSaveState {
    pub cpu: CpuState,
    pub ram: Vec<u8>,
    /// Empty when no cartridge, or a board without PRG RAM, is inserted.
    #[serde(default)]
    pub prg_ram: Vec<u8>,
    #[serde(default)]
    pub open_bus: u8,
}

impl NesSaveState {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// NES CPU - 6502 core wired to the console bus
#[derive(Debug)]
pub struct NesCpu {
    cpu: Cpu6502<NesBus>,
}

impl NesCpu {
    pub fn new(bus: NesBus) -> Self {
        Self {
            cpu: Cpu6502::new(bus),
        }
    }

    /// Build a console around `cart` and run the reset sequence.
    pub fn power_on(cart: Cartridge) -> Result<Self, CartridgeError> {
        let mut nes = Self::new(NesBus::with_cartridge(cart)?);
        nes.reset();
        log(LogCategory::Cpu, LogLevel::Info, || {
            format!("NES: powered on, reset vector ${:04X}", nes.cpu.pc)
        });
        Ok(nes)
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    /// Execute one instruction
    pub fn step(&mut self) -> u32 {
        self.cpu.step()
    }

    /// Run whole instructions until at least `budget` cycles have elapsed or
    /// the CPU jams. Returns the cycles actually spent.
    pub fn run_cycles(&mut self, budget: u64) -> u64 {
        let start = self.cpu.total_cycles();
        while self.cpu.total_cycles() - start < budget {
            if self.cpu.step() == 0 && self.cpu.is_halted() {
                break;
            }
        }
        self.cpu.total_cycles() - start
    }

    /// Handle for raising NMI/IRQ/reset from other components.
    pub fn interrupt_lines(&self) -> Arc<InterruptLines> {
        self.cpu.interrupt_lines()
    }

    pub fn cpu(&self) -> &Cpu6502<NesBus> {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu6502<NesBus> {
        &mut self.cpu
    }

    pub fn bus(&self) -> &NesBus {
        &self.cpu.memory
    }

    pub fn bus_mut(&mut self) -> &mut NesBus {
        &mut self.cpu.memory
    }

    pub fn pc(&self) -> u16 {
        self.cpu.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.cpu.pc = pc;
    }

    pub fn reset_vector(&self) -> u16 {
        self.cpu.memory.peek_u16(RESET_VECTOR)
    }

    pub fn trace_line(&self) -> String {
        self.cpu.trace_line()
    }

    pub fn save_state(&self) -> NesSaveState {
        let bus = &self.cpu.memory;
        NesSaveState {
            cpu: self.cpu.save_state(),
            ram: bus.ram().to_vec(),
            prg_ram: bus
                .cartridge()
                .and_then(|c| c.mapper.prg_ram())
                .map(<[u8]>::to_vec)
                .unwrap_or_default(),
            open_bus: bus.open_bus(),
        }
    }

    /// Restore a snapshot. Memory images whose size does not match the
    /// console's are skipped with a warning.
    pub fn load_state(&mut self, state: &NesSaveState) {
        self.cpu.load_state(&state.cpu);
        let bus = &mut self.cpu.memory;
        bus.set_open_bus(state.open_bus);
        restore_image("RAM", bus.ram_mut(), &state.ram);

        if let Some(prg_ram) = bus.cartridge_mut().and_then(|c| c.mapper.prg_ram_mut()) {
            if !state.prg_ram.is_empty() {
                restore_image("PRG RAM", prg_ram, &state.prg_ram);
            }
        }
    }
}

fn restore_image(name: &str, dest: &mut [u8], saved: &[u8]) {
    if dest.len() == saved.len() {
        dest.copy_from_slice(saved);
    } else {
        log(LogCategory::Cpu, LogLevel::Warn, || {
            format!(
                "NES: save state {} is {} bytes, expected {}; not restored",
                name,
                saved.len(),
                dest.len()
            )
        });
    }
}
