//! Processor status register bits (NV1BDIZC).

pub const CARRY: u8 = 0x01;
pub const ZERO: u8 = 0x02;
pub const IRQ_DISABLE: u8 = 0x04;
/// Stored and restored like any other flag but never consulted by ADC/SBC.
pub const DECIMAL: u8 = 0x08;
/// Only exists in copies of P pushed to the stack.
pub const BREAK: u8 = 0x10;
/// Always reads as set.
pub const UNUSED: u8 = 0x20;
pub const OVERFLOW: u8 = 0x40;
pub const NEGATIVE: u8 = 0x80;

/// P after power-up and reset: I and the unused bit set.
pub const POWER_ON: u8 = IRQ_DISABLE | UNUSED;

/// Value of P as pushed by an interrupt or instruction.
#[inline]
pub fn pushed(status: u8, brk: bool) -> u8 {
    let s = status | UNUSED;
    if brk {
        s | BREAK
    } else {
        s & !BREAK
    }
}

/// Value of P after pulling it from the stack (PLP/RTI).
#[inline]
pub fn pulled(value: u8) -> u8 {
    (value | UNUSED) & !BREAK
}

/// Render P the way debuggers do, e.g. `Nv-bdIzc`.
pub fn describe(status: u8) -> String {
    const NAMES: [(u8, char); 8] = [
        (NEGATIVE, 'N'),
        (OVERFLOW, 'V'),
        (UNUSED, '-'),
        (BREAK, 'B'),
        (DECIMAL, 'D'),
        (IRQ_DISABLE, 'I'),
        (ZERO, 'Z'),
        (CARRY, 'C'),
    ];
    NAMES
        .iter()
        .map(|&(bit, c)| {
            if status & bit != 0 || bit == UNUSED {
                c
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}
