//! NES Mapper implementations
//!
//! Mappers own the cartridge side of the CPU address space ($4020-$FFFF).
//! Only NROM is implemented; the enum keeps the dispatch point for boards
//! that bank PRG.

mod nrom;

pub use nrom::Nrom;

use crate::bus::BusDevice;
use crate::cartridge::{Cartridge, CartridgeError, Mirroring};

/// Unified mapper enum that dispatches to specific implementations
#[derive(Debug)]
pub enum Mapper {
    Nrom(Nrom),
}

impl Mapper {
    pub fn from_cart(cart: Cartridge) -> Result<Self, CartridgeError> {
        match cart.mapper() {
            0 => Ok(Mapper::Nrom(Nrom::new(cart))),
            other => Err(CartridgeError::UnsupportedMapper(other)),
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Mapper::Nrom(_) => 0,
        }
    }

    /// Read from PRG ROM/RAM address space; `None` leaves the bus floating.
    pub fn read_prg(&self, addr: u16) -> Option<u8> {
        match self {
            Mapper::Nrom(m) => m.read_prg(addr),
        }
    }

    /// Write to PRG address space; returns whether anything accepted it.
    pub fn write_prg(&mut self, addr: u16, val: u8) -> bool {
        match self {
            Mapper::Nrom(m) => m.write_prg(addr, val),
        }
    }

    pub fn prg_rom(&self) -> &[u8] {
        match self {
            Mapper::Nrom(m) => m.prg_rom(),
        }
    }

    /// Work RAM on the board, if it has any.
    pub fn prg_ram(&self) -> Option<&[u8]> {
        match self {
            Mapper::Nrom(m) => Some(m.prg_ram()),
        }
    }

    pub fn prg_ram_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            Mapper::Nrom(m) => Some(m.prg_ram_mut()),
        }
    }
}

/// Mapper plus the cartridge facts the bus reports.
#[derive(Debug)]
pub struct InstalledCartridge {
    pub mapper: Mapper,
    pub mirroring: Mirroring,
    pub battery: bool,
    pub chr_len: usize,
}

impl InstalledCartridge {
    pub fn new(cart: Cartridge) -> Result<Self, CartridgeError> {
        let mirroring = cart.mirroring();
        let battery = cart.has_battery();
        let chr_len = cart.chr_rom.len();
        Ok(Self {
            mapper: Mapper::from_cart(cart)?,
            mirroring,
            battery,
            chr_len,
        })
    }
}

impl BusDevice for InstalledCartridge {
    fn read(&mut self, addr: u16) -> Option<u8> {
        self.mapper.read_prg(addr)
    }

    fn write(&mut self, addr: u16, val: u8) -> bool {
        self.mapper.write_prg(addr, val)
    }

    fn peek(&self, addr: u16) -> Option<u8> {
        self.mapper.read_prg(addr)
    }
}
