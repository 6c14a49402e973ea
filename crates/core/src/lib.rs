//! 6502 CPU core for NES emulation.
//!
//! The [`cpu_6502`] module holds the processor; [`logging`] is the shared
//! category/level logger used by this crate and by the console crates built
//! on top of it.

pub mod cpu_6502;
pub mod logging;

pub use cpu_6502::{ArrayMemory, Cpu6502, Memory6502};

/// A CPU-like component that can be stepped; returns cycles consumed.
pub trait Cpu {
    fn reset(&mut self);
    fn step(&mut self) -> u32;
}
