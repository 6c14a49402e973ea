use crate::cartridge::Cartridge;

pub const PRG_RAM_LEN: usize = 0x2000;

/// NROM (Mapper 0) - Basic mapper with no banking
///
/// 16 or 32 KiB of PRG ROM at $8000-$FFFF (a 16 KiB image is mirrored into
/// $C000) and 8 KiB of PRG RAM at $6000-$7FFF.
#[derive(Debug)]
pub struct Nrom {
    prg_rom: Vec<u8>,
    prg_ram: Box<[u8; PRG_RAM_LEN]>,
}

impl Nrom {
    pub fn new(cart: Cartridge) -> Self {
        Self {
            prg_rom: cart.prg_rom,
            prg_ram: Box::new([0; PRG_RAM_LEN]),
        }
    }

    /// `None` for addresses the board leaves unconnected ($4020-$5FFF).
    pub fn read_prg(&self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF => Some(self.prg_ram[(addr - 0x6000) as usize]),
            0x8000..=0xFFFF => {
                let len = self.prg_rom.len();
                if len == 0 {
                    return None;
                }
                Some(self.prg_rom[(addr as usize - 0x8000) % len])
            }
            _ => None,
        }
    }

    /// Returns false when nothing on the board latched the write.
    pub fn write_prg(&mut self, addr: u16, val: u8) -> bool {
        match addr {
            0x6000..=0x7FFF => {
                self.prg_ram[(addr - 0x6000) as usize] = val;
                true
            }
            _ => false,
        }
    }

    pub fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }

    pub fn prg_ram(&self) -> &[u8] {
        &self.prg_ram[..]
    }

    pub fn prg_ram_mut(&mut self) -> &mut [u8] {
        &mut self.prg_ram[..]
    }
}
