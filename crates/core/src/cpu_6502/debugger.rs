//! Execution history for post-mortem debugging.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{opcodes, Cpu6502, Memory6502};

/// Registers at an instruction boundary, plus the opcode about to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub pc: u16,
    pub opcode: u8,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub status: u8,
    pub cycles: u64,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04X}  {:02X} {:<4} A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} CYC:{}",
            self.pc,
            self.opcode,
            opcodes::lookup(self.opcode).mnemonic.to_string(),
            self.a,
            self.x,
            self.y,
            self.status,
            self.sp,
            self.cycles
        )
    }
}

/// Fixed-size ring of the most recent execution states.
#[derive(Debug, Clone)]
pub struct Backtrace {
    entries: VecDeque<ExecutionState>,
    capacity: usize,
}

impl Backtrace {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a state, dropping the oldest once full.
    pub fn record(&mut self, state: ExecutionState) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(state);
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ExecutionState> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&ExecutionState> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for Backtrace {
    fn default() -> Self {
        Self::new(64)
    }
}

impl fmt::Display for Backtrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for state in &self.entries {
            writeln!(f, "{}", state)?;
        }
        Ok(())
    }
}

impl<M: Memory6502> Cpu6502<M> {
    /// Snapshot of the current boundary, read with `peek`.
    pub fn execution_state(&self) -> ExecutionState {
        ExecutionState {
            pc: self.pc,
            opcode: self.memory.peek(self.pc),
            a: self.a,
            x: self.x,
            y: self.y,
            sp: self.sp,
            status: self.status(),
            cycles: self.cycles,
        }
    }

    /// Record the current boundary, then step.
    pub fn step_recorded(&mut self, backtrace: &mut Backtrace) -> u32 {
        backtrace.record(self.execution_state());
        self.step()
    }
}
