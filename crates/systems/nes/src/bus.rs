//! CPU-side address decoding for the console.
//!
//! | Range         | Target                                   |
//! |---------------|------------------------------------------|
//! | `$0000-$1FFF` | 2 KiB internal RAM, mirrored every $800  |
//! | `$2000-$3FFF` | I/O window, 8 registers mirrored         |
//! | `$4000-$401F` | I/O window                               |
//! | `$4020-$FFFF` | cartridge                                |
//!
//! Reads of anything that does not drive the data bus return the last value
//! seen on it.

use std::fmt;

use r6502_core::logging::{log, LogCategory, LogLevel};
use r6502_core::cpu_6502::{IRQ_VECTOR, NMI_VECTOR, RESET_VECTOR};
use r6502_core::Memory6502;
use serde_json::json;

use crate::cartridge::{Cartridge, CartridgeError};
use crate::mappers::InstalledCartridge;

pub const RAM_LEN: usize = 0x800;

/// One region of the CPU address space.
///
/// `read` and `peek` return `None` when the device does not drive the data
/// bus for `addr`; `write` returns false when nothing latched the value.
pub trait BusDevice: fmt::Debug + Send {
    fn read(&mut self, addr: u16) -> Option<u8>;

    fn write(&mut self, addr: u16, val: u8) -> bool;

    /// Read without side effects, for tracing and debugging.
    fn peek(&self, addr: u16) -> Option<u8>;
}

/// Registers mapped into `$2000-$3FFF` and `$4000-$401F`.
///
/// Addresses in the `$2000` block arrive already folded onto `$2000-$2007`.
/// Returning `None` from a read, or `false` from a write, means the handler
/// did not respond and the bus floats.
pub trait IoHandler: fmt::Debug + Send {
    fn read_register(&mut self, addr: u16) -> Option<u8>;

    fn write_register(&mut self, addr: u16, val: u8) -> bool;

    fn peek_register(&self, _addr: u16) -> Option<u8> {
        None
    }
}

/// Handler for a board with nothing behind the register window.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenBusIo;

impl IoHandler for OpenBusIo {
    fn read_register(&mut self, _addr: u16) -> Option<u8> {
        None
    }

    fn write_register(&mut self, _addr: u16, _val: u8) -> bool {
        false
    }
}

/// Fold the mirrored register block onto its eight canonical addresses.
#[inline]
pub const fn io_register(addr: u16) -> u16 {
    match addr {
        0x2000..=0x3FFF => 0x2000 | (addr & 0x0007),
        _ => addr,
    }
}

/// 2 KiB of internal RAM, repeated four times across `$0000-$1FFF`.
#[derive(Debug, Clone)]
pub struct WorkRam {
    bytes: [u8; RAM_LEN],
}

impl Default for WorkRam {
    fn default() -> Self {
        Self { bytes: [0; RAM_LEN] }
    }
}

impl WorkRam {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    #[inline]
    fn index(addr: u16) -> usize {
        addr as usize & (RAM_LEN - 1)
    }
}

impl BusDevice for WorkRam {
    fn read(&mut self, addr: u16) -> Option<u8> {
        Some(self.bytes[Self::index(addr)])
    }

    fn write(&mut self, addr: u16, val: u8) -> bool {
        self.bytes[Self::index(addr)] = val;
        true
    }

    fn peek(&self, addr: u16) -> Option<u8> {
        Some(self.bytes[Self::index(addr)])
    }
}

/// The register window, forwarding folded addresses to an [`IoHandler`].
#[derive(Debug)]
pub struct IoWindow {
    handler: Box<dyn IoHandler>,
}

impl Default for IoWindow {
    fn default() -> Self {
        Self::new(Box::new(OpenBusIo))
    }
}

impl IoWindow {
    pub fn new(handler: Box<dyn IoHandler>) -> Self {
        Self { handler }
    }

    /// Replace the handler, returning the previous one.
    pub fn replace(&mut self, handler: Box<dyn IoHandler>) -> Box<dyn IoHandler> {
        std::mem::replace(&mut self.handler, handler)
    }
}

impl BusDevice for IoWindow {
    fn read(&mut self, addr: u16) -> Option<u8> {
        self.handler.read_register(io_register(addr))
    }

    fn write(&mut self, addr: u16, val: u8) -> bool {
        self.handler.write_register(io_register(addr), val)
    }

    fn peek(&self, addr: u16) -> Option<u8> {
        self.handler.peek_register(io_register(addr))
    }
}

/// Which device answers an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Ram,
    Io,
    Cartridge,
}

impl Region {
    pub const fn of(addr: u16) -> Self {
        match addr {
            0x0000..=0x1FFF => Region::Ram,
            0x2000..=0x401F => Region::Io,
            _ => Region::Cartridge,
        }
    }
}

/// The CPU bus: work RAM, the register window and the cartridge slot.
#[derive(Debug, Default)]
pub struct NesBus {
    ram: WorkRam,
    io: IoWindow,
    cartridge: Option<InstalledCartridge>,
    open_bus: u8,
}

impl NesBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cartridge(cart: Cartridge) -> Result<Self, CartridgeError> {
        let mut bus = Self::new();
        bus.insert_cartridge(cart)?;
        Ok(bus)
    }

    pub fn insert_cartridge(&mut self, cart: Cartridge) -> Result<(), CartridgeError> {
        self.cartridge = Some(InstalledCartridge::new(cart)?);
        Ok(())
    }

    pub fn cartridge(&self) -> Option<&InstalledCartridge> {
        self.cartridge.as_ref()
    }

    pub fn cartridge_mut(&mut self) -> Option<&mut InstalledCartridge> {
        self.cartridge.as_mut()
    }

    /// Replace the register handler, returning the previous one.
    pub fn set_io_handler(&mut self, handler: Box<dyn IoHandler>) -> Box<dyn IoHandler> {
        self.io.replace(handler)
    }

    pub fn ram(&self) -> &[u8] {
        self.ram.as_slice()
    }

    pub fn ram_mut(&mut self) -> &mut [u8] {
        self.ram.as_mut_slice()
    }

    /// Last value driven on the data bus.
    pub fn open_bus(&self) -> u8 {
        self.open_bus
    }

    pub(crate) fn set_open_bus(&mut self, val: u8) {
        self.open_bus = val;
    }

    /// JSON snapshot for debugging: vectors, zero page sample and cartridge.
    pub fn debug_state(&self) -> serde_json::Value {
        let cartridge = self.cartridge.as_ref().map(|c| {
            json!({
                "mapper": c.mapper.number(),
                "prg_rom_len": c.mapper.prg_rom().len(),
                "chr_rom_len": c.chr_len,
                "mirroring": c.mirroring,
                "battery": c.battery,
            })
        });
        json!({
            "vectors": {
                "nmi": format!("{:04X}", self.peek_u16(NMI_VECTOR)),
                "reset": format!("{:04X}", self.peek_u16(RESET_VECTOR)),
                "irq": format!("{:04X}", self.peek_u16(IRQ_VECTOR)),
            },
            "ram_sample": &self.ram()[..64],
            "open_bus": self.open_bus,
            "cartridge": cartridge,
        })
    }
}

impl Memory6502 for NesBus {
    fn read(&mut self, addr: u16) -> u8 {
        let driven = match Region::of(addr) {
            Region::Ram => self.ram.read(addr),
            Region::Io => self.io.read(addr),
            Region::Cartridge => self.cartridge.as_mut().and_then(|c| c.read(addr)),
        };
        match driven {
            Some(val) => {
                self.open_bus = val;
                val
            }
            None => self.open_bus,
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.open_bus = val;
        let region = Region::of(addr);
        let accepted = match region {
            Region::Ram => self.ram.write(addr, val),
            Region::Io => self.io.write(addr, val),
            Region::Cartridge => self
                .cartridge
                .as_mut()
                .map_or(false, |c| c.write(addr, val)),
        };
        if !accepted {
            log(LogCategory::Bus, LogLevel::Debug, || {
                format!(
                    "Bus: write ${:02X} to ${:04X} ({:?}) ignored",
                    val, addr, region
                )
            });
        }
    }

    fn peek(&self, addr: u16) -> u8 {
        let driven = match Region::of(addr) {
            Region::Ram => self.ram.peek(addr),
            Region::Io => self.io.peek(addr),
            Region::Cartridge => self.cartridge.as_ref().and_then(|c| c.peek(addr)),
        };
        driven.unwrap_or(self.open_bus)
    }
}
