//! Bus contract consumed by the 6502 core, plus a flat 64 KiB implementation
//! used by tests, benches and conformance programs.

/// Memory interface trait for the 6502 CPU
///
/// Systems using the 6502 must implement this trait to provide memory access.
/// Both `read` and `write` are total over the 16-bit address space: unmapped
/// regions return whatever the owning component decides (open bus, a fixed
/// value) and never fail.
pub trait Memory6502 {
    /// Read a byte from memory at the given address.
    ///
    /// Takes `&mut self` because device registers may change state when read.
    /// The CPU issues exactly one call per logical access.
    fn read(&mut self, addr: u16) -> u8;

    /// Write a byte to memory at the given address
    fn write(&mut self, addr: u16, val: u8);

    /// Inspect a byte without triggering read side effects.
    ///
    /// Only used for tracing and disassembly, never by instruction execution.
    fn peek(&self, addr: u16) -> u8;

    /// Side-effect-free little-endian word, wrapping at $FFFF.
    fn peek_u16(&self, addr: u16) -> u16 {
        let lo = self.peek(addr) as u16;
        let hi = self.peek(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }
}

impl<M: Memory6502 + ?Sized> Memory6502 for &mut M {
    fn read(&mut self, addr: u16) -> u8 {
        (**self).read(addr)
    }

    fn write(&mut self, addr: u16, val: u8) {
        (**self).write(addr, val)
    }

    fn peek(&self, addr: u16) -> u8 {
        (**self).peek(addr)
    }
}

impl<M: Memory6502 + ?Sized> Memory6502 for Box<M> {
    fn read(&mut self, addr: u16) -> u8 {
        (**self).read(addr)
    }

    fn write(&mut self, addr: u16, val: u8) {
        (**self).write(addr, val)
    }

    fn peek(&self, addr: u16) -> u8 {
        (**self).peek(addr)
    }
}

/// Simple array-based memory implementation for testing
///
/// A full 16-bit address space without mirroring or mapping.
#[derive(Debug, Clone)]
pub struct ArrayMemory {
    pub data: Box<[u8; 0x10000]>,
}

impl ArrayMemory {
    pub fn new() -> Self {
        Self {
            data: Box::new([0; 0x10000]),
        }
    }

    /// Load a program into memory and point the reset vector at it
    pub fn load_program(&mut self, offset: u16, data: &[u8]) {
        self.load(offset, data);
        self.write_u16(super::RESET_VECTOR, offset);
    }

    /// Copy `data` to `offset`, wrapping at the top of the address space.
    pub fn load(&mut self, offset: u16, data: &[u8]) {
        for (i, &b) in data.iter().enumerate() {
            self.data[offset.wrapping_add(i as u16) as usize] = b;
        }
    }

    pub fn write_u16(&mut self, addr: u16, val: u16) {
        let [lo, hi] = val.to_le_bytes();
        self.data[addr as usize] = lo;
        self.data[addr.wrapping_add(1) as usize] = hi;
    }

    pub fn read_u16(&self, addr: u16) -> u16 {
        self.peek_u16(addr)
    }
}

impl Default for ArrayMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory6502 for ArrayMemory {
    fn read(&mut self, addr: u16) -> u8 {
        self.data[addr as usize]
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.data[addr as usize] = val;
    }

    fn peek(&self, addr: u16) -> u8 {
        self.data[addr as usize]
    }
}
