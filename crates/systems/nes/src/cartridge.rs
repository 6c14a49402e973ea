//! iNES image loading.

use std::path::Path;

use r6502_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const HEADER_LEN: usize = 16;
pub const TRAINER_LEN: usize = 512;
pub const PRG_BANK_LEN: usize = 16 * 1024;
pub const CHR_BANK_LEN: usize = 8 * 1024;

const SIGNATURE: &[u8; 4] = b"NES\x1A";

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("not an iNES image (bad signature)")]
    BadSignature,
    #[error("image truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("NES 2.0 headers are not supported")]
    Nes2Unsupported,
    #[error("mapper {0} is not supported")]
    UnsupportedMapper(u8),
    #[error("image has no PRG ROM")]
    EmptyPrgRom,
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    FourScreen,
}

/// Decoded 16-byte iNES 1.0 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartridgeHeader {
    /// PRG ROM size in 16 KiB units.
    pub prg_banks: u8,
    /// CHR ROM size in 8 KiB units; 0 means the board uses CHR RAM.
    pub chr_banks: u8,
    pub mapper: u8,
    pub mirroring: Mirroring,
    pub battery: bool,
    pub trainer: bool,
}

impl CartridgeHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, CartridgeError> {
        if bytes.len() < HEADER_LEN {
            if bytes.len() >= 4 && &bytes[0..4] != SIGNATURE {
                return Err(CartridgeError::BadSignature);
            }
            return Err(CartridgeError::Truncated {
                expected: HEADER_LEN,
                found: bytes.len(),
            });
        }
        if &bytes[0..4] != SIGNATURE {
            return Err(CartridgeError::BadSignature);
        }

        let flags6 = bytes[6];
        let flags7 = bytes[7];
        // Bits 2-3 of byte 7 equal to 0b10 identify NES 2.0.
        if flags7 & 0x0C == 0x08 {
            return Err(CartridgeError::Nes2Unsupported);
        }

        let mirroring = if flags6 & 0x08 != 0 {
            Mirroring::FourScreen
        } else if flags6 & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        Ok(Self {
            prg_banks: bytes[4],
            chr_banks: bytes[5],
            mapper: (flags6 >> 4) | (flags7 & 0xF0),
            mirroring,
            battery: flags6 & 0x02 != 0,
            trainer: flags6 & 0x04 != 0,
        })
    }

    pub fn prg_len(&self) -> usize {
        self.prg_banks as usize * PRG_BANK_LEN
    }

    pub fn chr_len(&self) -> usize {
        self.chr_banks as usize * CHR_BANK_LEN
    }

    /// Total file size the header describes.
    pub fn image_len(&self) -> usize {
        HEADER_LEN + if self.trainer { TRAINER_LEN } else { 0 } + self.prg_len() + self.chr_len()
    }
}

#[derive(Debug, Clone)]
pub struct Cartridge {
    pub header: CartridgeHeader,
    pub prg_rom: Vec<u8>,
    pub chr_rom: Vec<u8>,
}

impl Cartridge {
    pub fn mapper(&self) -> u8 {
        self.header.mapper
    }

    pub fn mirroring(&self) -> Mirroring {
        self.header.mirroring
    }

    /// Whether the board keeps its PRG RAM alive on a battery.
    pub fn has_battery(&self) -> bool {
        self.header.battery
    }

    /// Parse an in-memory iNES image. Only mapper 0 (NROM) is accepted.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CartridgeError> {
        let header = CartridgeHeader::parse(bytes)?;
        if header.mapper != 0 {
            return Err(CartridgeError::UnsupportedMapper(header.mapper));
        }
        if header.prg_banks == 0 {
            return Err(CartridgeError::EmptyPrgRom);
        }
        let expected = header.image_len();
        if bytes.len() < expected {
            return Err(CartridgeError::Truncated {
                expected,
                found: bytes.len(),
            });
        }

        // The trainer is skipped, nothing maps it on an NROM board.
        let prg_start = HEADER_LEN + if header.trainer { TRAINER_LEN } else { 0 };
        let chr_start = prg_start + header.prg_len();
        let prg_rom = bytes[prg_start..chr_start].to_vec();
        let chr_rom = bytes[chr_start..chr_start + header.chr_len()].to_vec();

        log(LogCategory::Cartridge, LogLevel::Info, || {
            format!(
                "Cartridge: mapper {}, PRG {} KiB, CHR {} KiB, {:?} mirroring{}{}",
                header.mapper,
                prg_rom.len() / 1024,
                chr_rom.len() / 1024,
                header.mirroring,
                if header.battery { ", battery" } else { "" },
                if header.trainer { ", trainer skipped" } else { "" }
            )
        });

        Ok(Self {
            header,
            prg_rom,
            chr_rom,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CartridgeError> {
        let bytes = std::fs::read(path.as_ref())?;
        log(LogCategory::Cartridge, LogLevel::Debug, || {
            format!(
                "Cartridge: read {} bytes from {}",
                bytes.len(),
                path.as_ref().display()
            )
        });
        Self::from_bytes(&bytes)
    }
}
