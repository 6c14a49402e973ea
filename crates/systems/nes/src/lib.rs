//! Console-side collaborators for the 6502 core: iNES loading, NROM
//! mapping and the CPU address bus.

pub mod bus;
pub mod cartridge;
pub mod cpu;
pub mod mappers;

pub use bus::{BusDevice, IoHandler, IoWindow, NesBus, OpenBusIo, Region, WorkRam};
pub use cartridge::{Cartridge, CartridgeError, CartridgeHeader, Mirroring};
pub use cpu::{NesCpu, NesSaveState};
pub use mappers::{InstalledCartridge, Mapper};
