use std::sync::Arc;

use super::*;

/// Published NMOS cycle counts (JAM listed as 0, charged as 2 by the core).
#[rustfmt::skip]
const BASE_CYCLES: [u8; 256] = [
    7,6,0,8,3,3,5,5,3,2,2,2,4,4,6,6,
    2,5,0,8,4,4,6,6,2,4,2,7,4,4,7,7,
    6,6,0,8,3,3,5,5,4,2,2,2,4,4,6,6,
    2,5,0,8,4,4,6,6,2,4,2,7,4,4,7,7,
    6,6,0,8,3,3,5,5,3,2,2,2,3,4,6,6,
    2,5,0,8,4,4,6,6,2,4,2,7,4,4,7,7,
    6,6,0,8,3,3,5,5,4,2,2,2,5,4,6,6,
    2,5,0,8,4,4,6,6,2,4,2,7,4,4,7,7,
    2,6,2,6,3,3,3,3,2,2,2,2,4,4,4,4,
    2,6,0,6,4,4,4,4,2,5,2,5,5,5,5,5,
    2,6,2,6,3,3,3,3,2,2,2,2,4,4,4,4,
    2,5,0,5,4,4,4,4,2,4,2,4,4,4,4,4,
    2,6,2,8,3,3,5,5,2,2,2,2,4,4,6,6,
    2,5,0,8,4,4,6,6,2,4,2,7,4,4,7,7,
    2,6,2,8,3,3,5,5,2,2,2,2,4,4,6,6,
    2,5,0,8,4,4,6,6,2,4,2,7,4,4,7,7,
];

const JAMS: [u8; 12] = [
    0x02, 0x12, 0x22, 0x32, 0x42, 0x52, 0x62, 0x72, 0x92, 0xB2, 0xD2, 0xF2,
];

/// Load `program` at $8000 and reset.
fn cpu_with(program: &[u8]) -> Cpu6502<ArrayMemory> {
    let mut mem = ArrayMemory::new();
    mem.load_program(0x8000, program);
    let mut cpu = Cpu6502::new(mem);
    cpu.reset();
    cpu
}

/// Flat memory that records every bus access.
#[derive(Default)]
struct CountingBus {
    mem: ArrayMemory,
    reads: Vec<u16>,
    writes: Vec<(u16, u8)>,
}

impl Memory6502 for CountingBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.reads.push(addr);
        self.mem.read(addr)
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.writes.push((addr, val));
        self.mem.write(addr, val);
    }

    fn peek(&self, addr: u16) -> u8 {
        self.mem.peek(addr)
    }
}

/// Raises NMI on the shared lines when `trigger` is read.
struct NmiOnReadBus {
    mem: ArrayMemory,
    lines: Arc<InterruptLines>,
    trigger: u16,
}

impl Memory6502 for NmiOnReadBus {
    fn read(&mut self, addr: u16) -> u8 {
        if addr == self.trigger {
            self.lines.raise_nmi();
        }
        self.mem.read(addr)
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.mem.write(addr, val);
    }

    fn peek(&self, addr: u16) -> u8 {
        self.mem.peek(addr)
    }
}

fn is_branch(m: Mnemonic) -> bool {
    matches!(
        m,
        Mnemonic::BCC
            | Mnemonic::BCS
            | Mnemonic::BEQ
            | Mnemonic::BNE
            | Mnemonic::BMI
            | Mnemonic::BPL
            | Mnemonic::BVC
            | Mnemonic::BVS
    )
}

// --- Loads, stores and flags ---

#[test]
fn lda_immediate_sets_a_and_flags() {
    let mut cpu = cpu_with(&[0xA9, 0x05, 0xEA]);
    assert_eq!(cpu.step(), 2);
    assert_eq!(cpu.a, 5);
    assert!(!cpu.flag(status::ZERO));
    assert_eq!(cpu.step(), 2);
}

#[test]
fn loads_and_transfers_set_zero_and_negative_for_every_value() {
    // LDA #v; TAX; TAY; LDX #v; TXA; LDY #v; TYA
    for v in 0..=255u8 {
        let program = [0xA9, v, 0xAA, 0xA8, 0xA2, v, 0x8A, 0xA0, v, 0x98];
        let mut cpu = cpu_with(&program);
        for _ in 0..7 {
            cpu.step();
            assert_eq!(cpu.flag(status::ZERO), v == 0, "Z for {:02X}", v);
            assert_eq!(cpu.flag(status::NEGATIVE), v & 0x80 != 0, "N for {:02X}", v);
        }
        assert_eq!((cpu.a, cpu.x, cpu.y), (v, v, v));
    }
}

#[test]
fn tsx_sets_flags_but_txs_does_not() {
    let mut cpu = cpu_with(&[0xA2, 0x00, 0x9A, 0xBA]);
    cpu.step();
    assert!(cpu.flag(status::ZERO));
    cpu.x = 0x80;
    cpu.status &= !status::ZERO;
    cpu.step(); // TXS
    assert_eq!(cpu.sp, 0x80);
    assert!(!cpu.flag(status::NEGATIVE));
    cpu.step(); // TSX
    assert_eq!(cpu.x, 0x80);
    assert!(cpu.flag(status::NEGATIVE));
}

#[test]
fn lda_zero_page_and_sta_zero_page() {
    let mut cpu = cpu_with(&[0xA9, 0x42, 0x85, 0x10]);
    assert_eq!(cpu.step(), 2);
    assert_eq!(cpu.step(), 3);
    assert_eq!(cpu.memory.read(0x0010), 0x42);
}

#[test]
fn lda_absolute_reads_memory() {
    let mut cpu = cpu_with(&[0xAD, 0x34, 0x12]);
    cpu.memory.write(0x1234, 0x99);
    assert_eq!(cpu.step(), 4);
    assert_eq!(cpu.a, 0x99);
}

#[test]
fn lda_indirect_x_and_indirect_y() {
    let mut cpu = cpu_with(&[0xA1, 0x0A, 0xB1, 0x20]);
    cpu.memory.write(0x0010, 0x00);
    cpu.memory.write(0x0011, 0x20);
    cpu.memory.write(0x0020, 0x00);
    cpu.memory.write(0x0021, 0x20);
    cpu.memory.write(0x2000, 0xAB);
    cpu.memory.write(0x2003, 0xCD);

    cpu.x = 6;
    assert_eq!(cpu.step(), 6);
    assert_eq!(cpu.a, 0xAB);

    cpu.y = 3;
    assert_eq!(cpu.step(), 5);
    assert_eq!(cpu.a, 0xCD);
}

// --- Arithmetic ---

#[test]
fn end_to_end_load_and_add() {
    // LDA #$00; LDA #$FF; LDA #$7F; CLC; ADC #$01
    let mut cpu = cpu_with(&[0xA9, 0x00, 0xA9, 0xFF, 0xA9, 0x7F, 0x18, 0x69, 0x01]);
    cpu.step();
    assert!(cpu.flag(status::ZERO));
    assert!(!cpu.flag(status::NEGATIVE));
    cpu.step();
    assert!(!cpu.flag(status::ZERO));
    assert!(cpu.flag(status::NEGATIVE));
    cpu.step();
    cpu.step();
    cpu.step();
    assert_eq!(cpu.a, 0x80);
    assert!(cpu.flag(status::OVERFLOW));
    assert!(cpu.flag(status::NEGATIVE));
    assert!(!cpu.flag(status::CARRY));
}

#[test]
fn adc_and_sbc_follow_twos_complement_rules() {
    const EDGES: [u8; 5] = [0, 1, 127, 128, 255];
    for &a in &EDGES {
        for &m in &EDGES {
            for carry in [false, true] {
                let c = carry as i16;

                let mut cpu = cpu_with(&[0x69, m]);
                cpu.a = a;
                cpu.status = (cpu.status & !status::CARRY) | carry as u8;
                cpu.step();
                let unsigned = a as i16 + m as i16 + c;
                let signed = a as i8 as i16 + m as i8 as i16 + c;
                assert_eq!(cpu.a, unsigned as u8, "ADC {a:02X}+{m:02X}+{c}");
                assert_eq!(cpu.flag(status::CARRY), unsigned > 0xFF);
                assert_eq!(cpu.flag(status::OVERFLOW), !(-128..=127).contains(&signed));
                assert_eq!(cpu.flag(status::ZERO), unsigned as u8 == 0);
                assert_eq!(cpu.flag(status::NEGATIVE), unsigned as u8 & 0x80 != 0);

                let mut cpu = cpu_with(&[0xE9, m]);
                cpu.a = a;
                cpu.status = (cpu.status & !status::CARRY) | carry as u8;
                cpu.step();
                let unsigned = a as i16 - m as i16 - (1 - c);
                let signed = a as i8 as i16 - m as i8 as i16 - (1 - c);
                assert_eq!(cpu.a, unsigned as u8, "SBC {a:02X}-{m:02X} C={c}");
                assert_eq!(cpu.flag(status::CARRY), unsigned >= 0);
                assert_eq!(cpu.flag(status::OVERFLOW), !(-128..=127).contains(&signed));
            }
        }
    }
}

#[test]
fn decimal_flag_does_not_change_arithmetic() {
    // SED; CLC; LDA #$09; ADC #$09
    let mut cpu = cpu_with(&[0xF8, 0x18, 0xA9, 0x09, 0x69, 0x09]);
    for _ in 0..4 {
        cpu.step();
    }
    assert!(cpu.flag(status::DECIMAL));
    assert_eq!(cpu.a, 0x12);
}

#[test]
fn adc_all_addressing_modes() {
    let cases: &[(&[u8], u32)] = &[
        (&[0x75, 0x10], 4),       // ADC $10,X
        (&[0x7D, 0x00, 0x20], 4), // ADC $2000,X
        (&[0x79, 0x00, 0x20], 4), // ADC $2000,Y
        (&[0x61, 0x10], 6),       // ADC ($10,X)
        (&[0x71, 0x20], 5),       // ADC ($20),Y
    ];
    for (program, cycles) in cases {
        let mut cpu = cpu_with(program);
        // $15 doubles as the ($10,X) pointer to $2020.
        cpu.memory.write(0x0015, 0x20);
        cpu.memory.write(0x0016, 0x20);
        cpu.memory.write(0x2020, 0x20);
        cpu.memory.write(0x0020, 0x00);
        cpu.memory.write(0x0021, 0x20);
        cpu.memory.write(0x2005, 0x20);
        cpu.a = 0x10;
        cpu.x = 0x05;
        cpu.y = 0x05;
        cpu.status &= !status::CARRY;
        assert_eq!(cpu.step(), *cycles, "{:02X?}", program);
        assert_eq!(cpu.a, 0x30, "{:02X?}", program);
    }
}

#[test]
fn compares_set_carry_zero_and_negative() {
    let mut cpu = cpu_with(&[0xC9, 0x0F, 0xE0, 0x05, 0xC0, 0x04]);
    cpu.a = 0x10;
    cpu.x = 0x05;
    cpu.y = 0x03;
    cpu.step();
    assert!(cpu.flag(status::CARRY));
    assert!(!cpu.flag(status::ZERO));
    cpu.step();
    assert!(cpu.flag(status::CARRY));
    assert!(cpu.flag(status::ZERO));
    cpu.step();
    assert!(!cpu.flag(status::CARRY));
    assert!(cpu.flag(status::NEGATIVE));
}

#[test]
fn bit_copies_operand_bits_and_tests_against_a() {
    let mut cpu = cpu_with(&[0x24, 0x10]);
    cpu.memory.write(0x0010, 0xC0);
    cpu.a = 0x3F;
    assert_eq!(cpu.step(), 3);
    assert!(cpu.flag(status::ZERO));
    assert!(cpu.flag(status::OVERFLOW));
    assert!(cpu.flag(status::NEGATIVE));
    assert_eq!(cpu.a, 0x3F);
}

#[test]
fn shifts_and_rotates() {
    // ASL A; LSR A; ROL A; ROR A
    let mut cpu = cpu_with(&[0x0A, 0x4A, 0x2A, 0x6A]);
    cpu.a = 0x81;
    cpu.step();
    assert_eq!(cpu.a, 0x02);
    assert!(cpu.flag(status::CARRY));
    cpu.step();
    assert_eq!(cpu.a, 0x01);
    assert!(!cpu.flag(status::CARRY));
    cpu.status |= status::CARRY;
    cpu.step();
    assert_eq!(cpu.a, 0x03);
    assert!(!cpu.flag(status::CARRY));
    cpu.status |= status::CARRY;
    cpu.step();
    assert_eq!(cpu.a, 0x81);
    assert!(cpu.flag(status::CARRY));
    assert!(cpu.flag(status::NEGATIVE));
}

#[test]
fn shift_memory_indexed_modes() {
    // ASL $10,X; ROR $2000,X
    let mut cpu = cpu_with(&[0x16, 0x10, 0x7E, 0x00, 0x20]);
    cpu.x = 0x05;
    cpu.memory.write(0x0015, 0x40);
    cpu.memory.write(0x2005, 0x02);
    assert_eq!(cpu.step(), 6);
    assert_eq!(cpu.memory.read(0x0015), 0x80);
    assert!(cpu.flag(status::NEGATIVE));
    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.memory.read(0x2005), 0x01);
}

#[test]
fn read_modify_write_touches_target_once_each_way() {
    let mut bus = CountingBus::default();
    bus.mem.load_program(0x8000, &[0xEE, 0x00, 0x30]); // INC $3000
    bus.mem.write(0x3000, 0x7F);
    let mut cpu = Cpu6502::new(bus);
    cpu.reset();
    cpu.memory.reads.clear();

    assert_eq!(cpu.step(), 6);
    let target_reads = cpu.memory.reads.iter().filter(|&&a| a == 0x3000).count();
    assert_eq!(target_reads, 1);
    assert_eq!(cpu.memory.writes, vec![(0x3000, 0x80)]);
}

// --- Stack, jumps and subroutines ---

#[test]
fn pha_pla_roundtrip() {
    let mut cpu = cpu_with(&[0x48, 0xA9, 0x00, 0x68]);
    cpu.a = 0x7F;
    assert_eq!(cpu.step(), 3);
    assert_eq!(cpu.step(), 2);
    assert_eq!(cpu.step(), 4);
    assert_eq!(cpu.a, 0x7F);
    assert_eq!(cpu.sp, 0xFD);
}

#[test]
fn php_pushes_break_and_plp_ignores_it() {
    // PHP; PLA; LDA #$FF; PHA; PLP
    let mut cpu = cpu_with(&[0x08, 0x68, 0xA9, 0xFF, 0x48, 0x28]);
    cpu.step();
    cpu.step();
    assert_eq!(cpu.a, 0x34);
    cpu.step();
    cpu.step();
    assert_eq!(cpu.step(), 4);
    assert_eq!(cpu.status(), 0xEF);
    assert!(!cpu.flag(status::BREAK));
}

#[test]
fn jsr_rts_returns() {
    let mut cpu = cpu_with(&[0x20, 0x10, 0x80, 0xA9, 0x01]);
    cpu.memory.write(0x8010, 0x60);
    assert_eq!(cpu.step(), 6);
    assert_eq!(cpu.pc, 0x8010);
    // Return address minus one, high byte first.
    assert_eq!(cpu.memory.peek(0x01FD), 0x80);
    assert_eq!(cpu.memory.peek(0x01FC), 0x02);
    assert_eq!(cpu.step(), 6);
    assert_eq!(cpu.pc, 0x8003);
    assert_eq!(cpu.step(), 2);
    assert_eq!(cpu.a, 1);
}

#[test]
fn jmp_indirect_page_wrap_bug() {
    let mut mem = ArrayMemory::new();
    mem.load_program(0x8100, &[0x6C, 0xFF, 0x80]);
    mem.write(0x80FF, 0x34);
    mem.write(0x8000, 0x12);
    let mut cpu = Cpu6502::new(mem);
    cpu.reset();
    assert_eq!(cpu.step(), 5);
    assert_eq!(cpu.pc, 0x1234);
}

#[test]
fn stack_pointer_wraps_within_page_one() {
    let mut cpu = cpu_with(&[0x48, 0x68]);
    cpu.sp = 0x00;
    cpu.a = 0x5A;
    cpu.step();
    assert_eq!(cpu.sp, 0xFF);
    assert_eq!(cpu.memory.peek(0x0100), 0x5A);
    cpu.step();
    assert_eq!(cpu.sp, 0x00);
}

// --- Cycle accounting ---

#[test]
fn base_cycles_match_published_table() {
    for op in 0..=255u8 {
        let desc = opcodes::lookup(op);
        if desc.is_jam() || is_branch(desc.mnemonic) {
            continue;
        }
        let mut cpu = cpu_with(&[op, 0x00, 0x00]);
        assert_eq!(
            cpu.step(),
            BASE_CYCLES[op as usize] as u32,
            "opcode {:02X} {}",
            op,
            desc.mnemonic
        );
    }
}

#[test]
fn indexed_reads_pay_for_page_crossing() {
    // LDA $20F0,X with and without a carry into the high byte.
    let mut cpu = cpu_with(&[0xBD, 0xF0, 0x20, 0xBD, 0x00, 0x20]);
    cpu.x = 0x20;
    assert_eq!(cpu.step(), 5);
    assert_eq!(cpu.step(), 4);

    // LDA ($10),Y
    let mut cpu = cpu_with(&[0xB1, 0x10, 0xB1, 0x10]);
    cpu.memory.write(0x0010, 0xF0);
    cpu.memory.write(0x0011, 0x20);
    cpu.y = 0x10;
    assert_eq!(cpu.step(), 6);
    cpu.y = 0x0F;
    assert_eq!(cpu.step(), 5);

    // LAX $20F0,Y and NOP $20F0,X are undocumented but penalised the same way.
    let mut cpu = cpu_with(&[0xBF, 0xF0, 0x20, 0x1C, 0xF0, 0x20]);
    cpu.x = 0x20;
    cpu.y = 0x20;
    assert_eq!(cpu.step(), 5);
    // LAX loaded X from $2110; restore the index so the NOP crosses too.
    assert_eq!(cpu.x, 0x00);
    cpu.x = 0x20;
    assert_eq!(cpu.step(), 5);
}

#[test]
fn stores_and_rmw_never_pay_page_penalty() {
    // STA $20F0,X; INC $20F0,X; STA ($10),Y; SLO $20F0,Y
    let mut cpu = cpu_with(&[0x9D, 0xF0, 0x20, 0xFE, 0xF0, 0x20, 0x91, 0x10, 0x1B, 0xF0, 0x20]);
    cpu.memory.write(0x0010, 0xF0);
    cpu.memory.write(0x0011, 0x20);
    cpu.x = 0x20;
    cpu.y = 0x20;
    assert_eq!(cpu.step(), 5);
    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.step(), 6);
    assert_eq!(cpu.step(), 7);
}

#[test]
fn branch_penalties_depend_on_outcome_and_page() {
    // Not taken.
    let mut cpu = cpu_with(&[0xF0, 0x10]);
    assert_eq!(cpu.step(), 2);
    assert_eq!(cpu.pc, 0x8002);

    // Taken, same page.
    let mut cpu = cpu_with(&[0xD0, 0x10]);
    assert_eq!(cpu.step(), 3);
    assert_eq!(cpu.pc, 0x8012);

    // Taken backwards across a page.
    let mut cpu = cpu_with(&[0xD0, 0xF0]);
    assert_eq!(cpu.step(), 4);
    assert_eq!(cpu.pc, 0x7FF2);
}

#[test]
fn beq_branches_when_zero() {
    let mut cpu = cpu_with(&[0xA9, 0x00, 0xF0, 0x02, 0xA9, 0x01, 0xA9, 0x02]);
    assert_eq!(cpu.step(), 2);
    assert_eq!(cpu.step(), 3);
    assert_eq!(cpu.step(), 2);
    assert_eq!(cpu.a, 2);
}

#[test]
fn cycle_counter_accumulates_step_results() {
    let mut cpu = cpu_with(&[0xA9, 0x01, 0x8D, 0x00, 0x02, 0xEA]);
    let start = cpu.total_cycles();
    let used: u32 = (0..3).map(|_| cpu.step()).sum();
    assert_eq!(used, 2 + 4 + 2);
    assert_eq!(cpu.total_cycles(), start + used as u64);
}

// --- Opcode coverage and JAM ---

#[test]
fn every_opcode_dispatches_or_halts() {
    for op in 0..=255u8 {
        let mut cpu = cpu_with(&[op, 0x00, 0x00]);
        let used = cpu.step();
        assert!(used > 0, "opcode {:02X} consumed no cycles", op);
        assert_eq!(cpu.is_halted(), JAMS.contains(&op), "opcode {:02X}", op);
    }
}

#[test]
fn jam_halts_until_reset() {
    for &op in &JAMS {
        let mut cpu = cpu_with(&[0xEA, op, 0xEA]);
        cpu.step();
        assert_eq!(cpu.step(), 2);
        assert!(cpu.is_halted());
        assert_eq!(cpu.exec_state(), ExecState::Halted);
        assert_eq!(cpu.pc, 0x8001);

        let cycles = cpu.total_cycles();
        cpu.raise_irq(IrqSource::External);
        cpu.raise_nmi();
        for _ in 0..3 {
            assert_eq!(cpu.step(), 0);
        }
        assert_eq!(cpu.total_cycles(), cycles);
        assert_eq!(cpu.pc, 0x8001);

        cpu.interrupt_lines().request_reset();
        assert_eq!(cpu.step(), 7);
        assert!(!cpu.is_halted());
        assert_eq!(cpu.pc, 0x8000);
    }
}

// --- Undocumented opcodes ---

#[test]
fn lax_and_sax() {
    // LAX $10; SAX $11
    let mut cpu = cpu_with(&[0xA7, 0x10, 0x87, 0x11]);
    cpu.memory.write(0x0010, 0x8F);
    assert_eq!(cpu.step(), 3);
    assert_eq!((cpu.a, cpu.x), (0x8F, 0x8F));
    assert!(cpu.flag(status::NEGATIVE));
    cpu.x = 0xF1;
    cpu.status &= !status::NEGATIVE;
    assert_eq!(cpu.step(), 3);
    assert_eq!(cpu.memory.peek(0x0011), 0x81);
    assert!(!cpu.flag(status::NEGATIVE));
}

#[test]
fn combined_read_modify_write_ops() {
    // SLO $10: M = M << 1, A |= M
    let mut cpu = cpu_with(&[0x07, 0x10]);
    cpu.memory.write(0x0010, 0x81);
    cpu.a = 0x01;
    assert_eq!(cpu.step(), 5);
    assert_eq!(cpu.memory.peek(0x0010), 0x02);
    assert_eq!(cpu.a, 0x03);
    assert!(cpu.flag(status::CARRY));

    // RLA $10: rotate left then AND
    let mut cpu = cpu_with(&[0x27, 0x10]);
    cpu.memory.write(0x0010, 0x40);
    cpu.a = 0xFF;
    cpu.status |= status::CARRY;
    cpu.step();
    assert_eq!(cpu.memory.peek(0x0010), 0x81);
    assert_eq!(cpu.a, 0x81);
    assert!(!cpu.flag(status::CARRY));

    // SRE $10: shift right then EOR
    let mut cpu = cpu_with(&[0x47, 0x10]);
    cpu.memory.write(0x0010, 0x03);
    cpu.a = 0xFF;
    cpu.step();
    assert_eq!(cpu.memory.peek(0x0010), 0x01);
    assert_eq!(cpu.a, 0xFE);
    assert!(cpu.flag(status::CARRY));

    // RRA $10: rotate right then ADC using the rotated-out carry
    let mut cpu = cpu_with(&[0x67, 0x10]);
    cpu.memory.write(0x0010, 0x03);
    cpu.a = 0x10;
    cpu.step();
    assert_eq!(cpu.memory.peek(0x0010), 0x01);
    assert_eq!(cpu.a, 0x12);

    // DCP $10: decrement then compare
    let mut cpu = cpu_with(&[0xC7, 0x10]);
    cpu.memory.write(0x0010, 0x43);
    cpu.a = 0x42;
    cpu.step();
    assert_eq!(cpu.memory.peek(0x0010), 0x42);
    assert!(cpu.flag(status::ZERO));
    assert!(cpu.flag(status::CARRY));

    // ISC $10: increment then subtract
    let mut cpu = cpu_with(&[0xE7, 0x10]);
    cpu.memory.write(0x0010, 0x0F);
    cpu.a = 0x20;
    cpu.status |= status::CARRY;
    cpu.step();
    assert_eq!(cpu.memory.peek(0x0010), 0x10);
    assert_eq!(cpu.a, 0x10);
}

#[test]
fn immediate_combinations() {
    // ANC #$80: carry mirrors bit 7
    let mut cpu = cpu_with(&[0x0B, 0x80]);
    cpu.a = 0xC0;
    cpu.step();
    assert_eq!(cpu.a, 0x80);
    assert!(cpu.flag(status::CARRY));
    assert!(cpu.flag(status::NEGATIVE));

    // ALR #$03: AND then LSR
    let mut cpu = cpu_with(&[0x4B, 0x03]);
    cpu.a = 0xFF;
    cpu.step();
    assert_eq!(cpu.a, 0x01);
    assert!(cpu.flag(status::CARRY));

    // ARR #$FF with C=1: C from bit 6, V from bit 6 ^ bit 5
    let mut cpu = cpu_with(&[0x6B, 0xFF]);
    cpu.a = 0x80;
    cpu.status |= status::CARRY;
    cpu.step();
    assert_eq!(cpu.a, 0xC0);
    assert!(cpu.flag(status::CARRY));
    assert!(cpu.flag(status::OVERFLOW));
    assert!(cpu.flag(status::NEGATIVE));

    // SBX #$01: X = (A & X) - imm, compare-style carry
    let mut cpu = cpu_with(&[0xCB, 0x01]);
    cpu.a = 0x0F;
    cpu.x = 0xF3;
    cpu.step();
    assert_eq!(cpu.x, 0x02);
    assert!(cpu.flag(status::CARRY));

    // $EB behaves exactly like SBC #imm
    let mut cpu = cpu_with(&[0xEB, 0x01]);
    cpu.a = 0x10;
    cpu.status |= status::CARRY;
    assert_eq!(cpu.step(), 2);
    assert_eq!(cpu.a, 0x0F);
}

#[test]
fn unstable_immediate_ops_use_magic_constant() {
    // ANE #$FF: A = (A | $EE) & X & imm
    let mut cpu = cpu_with(&[0x8B, 0xFF]);
    cpu.a = 0x00;
    cpu.x = 0x0F;
    cpu.step();
    assert_eq!(cpu.a, 0x0E);

    // LXA #$F0: A = X = (A | $EE) & imm
    let mut cpu = cpu_with(&[0xAB, 0xF0]);
    cpu.a = 0x01;
    cpu.step();
    assert_eq!((cpu.a, cpu.x), (0xE0, 0xE0));
    assert!(cpu.flag(status::NEGATIVE));
}

#[test]
fn high_byte_stores_without_page_cross() {
    // SHX $2010,Y stores X & ($20 + 1)
    let mut cpu = cpu_with(&[0x9E, 0x10, 0x20]);
    cpu.x = 0xFF;
    cpu.y = 0x01;
    assert_eq!(cpu.step(), 5);
    assert_eq!(cpu.memory.peek(0x2011), 0x21);

    // SHY $2010,X stores Y & $21
    let mut cpu = cpu_with(&[0x9C, 0x10, 0x20]);
    cpu.y = 0x3F;
    cpu.x = 0x02;
    cpu.step();
    assert_eq!(cpu.memory.peek(0x2012), 0x21);

    // SHA ($10),Y stores A & X & (hi + 1)
    let mut cpu = cpu_with(&[0x93, 0x10]);
    cpu.memory.write(0x0010, 0x00);
    cpu.memory.write(0x0011, 0x06);
    cpu.a = 0xFF;
    cpu.x = 0x0F;
    cpu.y = 0x04;
    assert_eq!(cpu.step(), 6);
    assert_eq!(cpu.memory.peek(0x0604), 0x07);
}

#[test]
fn high_byte_stores_redirect_on_page_cross() {
    // SHX $20FF,Y with Y=1: value = X & $21, address high byte replaced.
    let mut cpu = cpu_with(&[0x9E, 0xFF, 0x20]);
    cpu.x = 0x05;
    cpu.y = 0x01;
    cpu.step();
    assert_eq!(cpu.memory.peek(0x0100), 0x01);
    assert_eq!(cpu.memory.peek(0x2100), 0x00);
}

#[test]
fn tas_and_las_share_stack_pointer() {
    // TAS $3000,Y: SP = A & X, store SP & $31
    let mut cpu = cpu_with(&[0x9B, 0x00, 0x30, 0xBB, 0x00, 0x30]);
    cpu.a = 0xF3;
    cpu.x = 0x3F;
    cpu.y = 0x00;
    assert_eq!(cpu.step(), 5);
    assert_eq!(cpu.sp, 0x33);
    assert_eq!(cpu.memory.peek(0x3000), 0x31);

    // LAS $3000,Y: A = X = SP = M & SP
    assert_eq!(cpu.step(), 4);
    assert_eq!((cpu.a, cpu.x, cpu.sp), (0x31, 0x31, 0x31));
}

#[test]
fn undocumented_nops_read_their_operand_once() {
    let mut bus = CountingBus::default();
    // NOP $3000; NOP $10,X; NOP #$55; NOP (implied)
    bus.mem
        .load_program(0x8000, &[0x0C, 0x00, 0x30, 0x14, 0x10, 0x80, 0x55, 0x1A]);
    let mut cpu = Cpu6502::new(bus);
    cpu.reset();
    cpu.x = 0x01;
    cpu.memory.reads.clear();

    assert_eq!(cpu.step(), 4);
    assert_eq!(cpu.memory.reads, vec![0x8000, 0x8001, 0x8002, 0x3000]);
    cpu.memory.reads.clear();
    assert_eq!(cpu.step(), 4);
    assert_eq!(cpu.memory.reads, vec![0x8003, 0x8004, 0x0011]);
    assert_eq!(cpu.step(), 2);
    assert_eq!(cpu.step(), 2);
    assert_eq!(cpu.pc, 0x8008);
    assert!(cpu.memory.writes.is_empty());
    assert_eq!((cpu.a, cpu.x, cpu.y), (0, 1, 0));
}

// --- Reset and interrupts ---

#[test]
fn reset_loads_vector_and_costs_seven_cycles() {
    let mut mem = ArrayMemory::new();
    mem.load_program(0xC123, &[0xEA]);
    let mut cpu = Cpu6502::new(mem);
    cpu.a = 0x55;
    cpu.status = 0xFF;
    cpu.reset();
    assert_eq!(cpu.pc, 0xC123);
    assert_eq!(cpu.total_cycles(), 7);
    assert_eq!((cpu.a, cpu.x, cpu.y, cpu.sp), (0, 0, 0, 0xFD));
    assert_eq!(cpu.status(), 0x24);
}

#[test]
fn reset_request_is_serviced_at_boundary() {
    let mut cpu = cpu_with(&[0xE8, 0xE8, 0xE8]);
    cpu.step();
    cpu.step();
    let lines = cpu.interrupt_lines();
    lines.request_reset();
    assert!(lines.reset_pending());
    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.pc, 0x8000);
    assert_eq!(cpu.x, 0);
    assert!(!lines.reset_pending());
}

#[test]
fn reset_keeps_irq_levels_and_drops_nmi_latch() {
    let mut cpu = cpu_with(&[0xEA]);
    cpu.raise_nmi();
    cpu.raise_irq(IrqSource::Mapper);
    cpu.reset();
    let lines = cpu.interrupt_lines();
    assert!(!lines.nmi_pending());
    assert!(lines.irq_asserted_by(IrqSource::Mapper));
}

#[test]
fn nmi_is_taken_even_with_interrupts_disabled() {
    let mut cpu = cpu_with(&[0xEA, 0xEA]);
    cpu.memory.write_u16(NMI_VECTOR, 0x9000);
    assert!(cpu.flag(status::IRQ_DISABLE));
    cpu.step();
    cpu.raise_nmi();
    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.pc, 0x9000);
    assert_eq!(cpu.sp, 0xFA);
    assert_eq!(cpu.memory.peek(0x01FD), 0x80);
    assert_eq!(cpu.memory.peek(0x01FC), 0x01);
    // B clear, U set
    assert_eq!(cpu.memory.peek(0x01FB), 0x24);
    assert!(!cpu.interrupt_lines().nmi_pending());
}

#[test]
fn nmi_line_latches_only_rising_edges() {
    let lines = InterruptLines::new();
    lines.set_nmi_line(true);
    assert!(lines.nmi_pending());
    assert!(lines.take_nmi());
    lines.set_nmi_line(true);
    assert!(!lines.nmi_pending());
    lines.set_nmi_line(false);
    lines.set_nmi_line(true);
    assert!(lines.nmi_pending());
}

#[test]
fn irq_waits_for_cli_plus_one_instruction() {
    // CLI; NOP; NOP
    let mut cpu = cpu_with(&[0x58, 0xEA, 0xEA]);
    cpu.memory.write_u16(IRQ_VECTOR, 0x9000);
    cpu.raise_irq(IrqSource::External);

    assert_eq!(cpu.step(), 2); // CLI, IRQ masked
    assert_eq!(cpu.step(), 2); // NOP, poll still sees the old I
    assert_eq!(cpu.pc, 0x8002);
    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.pc, 0x9000);
    assert!(cpu.flag(status::IRQ_DISABLE));
    // Return address is the second NOP.
    assert_eq!(cpu.memory.peek(0x01FC), 0x02);
    assert_eq!(cpu.memory.peek(0x01FB) & status::BREAK, 0);
}

#[test]
fn irq_can_slip_through_right_after_sei() {
    // SEI; NOP
    let mut cpu = cpu_with(&[0x78, 0xEA]);
    cpu.memory.write_u16(IRQ_VECTOR, 0x9000);
    cpu.status &= !status::IRQ_DISABLE;
    assert_eq!(cpu.step(), 2);
    cpu.raise_irq(IrqSource::ApuFrameCounter);
    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.pc, 0x9000);
}

#[test]
fn rti_restores_i_without_delay() {
    let mut cpu = cpu_with(&[0x40]);
    cpu.memory.write_u16(IRQ_VECTOR, 0x9000);
    // Stack frame: P with I clear, return to $8100.
    cpu.memory.write(0x01FB, 0x00);
    cpu.memory.write(0x01FC, 0x00);
    cpu.memory.write(0x01FD, 0x81);
    cpu.sp = 0xFA;
    cpu.raise_irq(IrqSource::External);

    assert_eq!(cpu.step(), 6);
    assert_eq!(cpu.pc, 0x8100);
    assert_eq!(cpu.status(), 0x20);
    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.pc, 0x9000);
}

#[test]
fn irq_stays_pending_while_any_source_holds_it() {
    let mut cpu = cpu_with(&[0xEA, 0xEA, 0xEA]);
    cpu.status &= !status::IRQ_DISABLE;
    cpu.raise_irq(IrqSource::Mapper);
    cpu.raise_irq(IrqSource::ApuDmc);
    let lines = cpu.interrupt_lines();
    assert_eq!(
        lines.asserting_sources(),
        vec![IrqSource::ApuDmc, IrqSource::Mapper]
    );
    cpu.clear_irq(IrqSource::Mapper);
    assert_eq!(lines.asserting_sources(), vec![IrqSource::ApuDmc]);
    assert!(lines.irq_asserted());
    assert_eq!(lines.irq_sources(), IrqSource::ApuDmc.mask());
    cpu.clear_irq(IrqSource::ApuDmc);
    assert!(!lines.irq_asserted());
    assert_eq!(cpu.step(), 2);
}

#[test]
fn nmi_wins_over_irq() {
    let mut cpu = cpu_with(&[0xEA]);
    cpu.memory.write_u16(NMI_VECTOR, 0x9000);
    cpu.memory.write_u16(IRQ_VECTOR, 0xA000);
    cpu.status &= !status::IRQ_DISABLE;
    cpu.raise_irq(IrqSource::External);
    cpu.raise_nmi();
    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.pc, 0x9000);
    // I is now set, so the IRQ waits.
    cpu.memory.write(0x9000, 0xEA);
    assert_eq!(cpu.step(), 2);
}

#[test]
fn brk_pushes_return_address_and_break_flag() {
    let mut cpu = cpu_with(&[0xEA, 0x00, 0xFF, 0xEA]);
    cpu.memory.write_u16(IRQ_VECTOR, 0x9000);
    cpu.step();
    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.pc, 0x9000);
    assert_eq!(cpu.memory.peek(0x01FD), 0x80);
    assert_eq!(cpu.memory.peek(0x01FC), 0x03);
    assert_eq!(cpu.memory.peek(0x01FB), 0x34);
    assert!(cpu.flag(status::IRQ_DISABLE));

    // RTI lands after the padding byte.
    cpu.memory.write(0x9000, 0x40);
    cpu.step();
    assert_eq!(cpu.pc, 0x8003);
    assert!(!cpu.flag(status::BREAK));
}

#[test]
fn brk_vector_is_hijacked_by_nmi_raised_during_it() {
    let lines = Arc::new(InterruptLines::new());
    let mut mem = ArrayMemory::new();
    mem.load_program(0x8000, &[0x00, 0x00]);
    mem.write_u16(NMI_VECTOR, 0x9000);
    mem.write_u16(IRQ_VECTOR, 0xA000);
    let bus = NmiOnReadBus {
        mem,
        lines: Arc::clone(&lines),
        trigger: 0x8000,
    };
    let mut cpu = Cpu6502::with_lines(bus, lines);
    cpu.reset();

    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.pc, 0x9000);
    assert!(!cpu.interrupt_lines().nmi_pending());
    // B is still set in the pushed copy.
    assert_eq!(cpu.memory.peek(0x01FB) & status::BREAK, status::BREAK);
}

#[test]
fn lines_can_be_raised_from_another_thread() {
    let mut cpu = cpu_with(&[0xEA, 0xEA]);
    cpu.memory.write_u16(NMI_VECTOR, 0x9000);
    let lines = cpu.interrupt_lines();
    std::thread::spawn(move || lines.raise_nmi())
        .join()
        .unwrap();
    assert_eq!(cpu.step(), 7);
    assert_eq!(cpu.pc, 0x9000);
}

#[test]
fn flags_from_independent_instances_do_not_interfere() {
    let mut a = cpu_with(&[0xA9, 0x00]);
    let mut b = cpu_with(&[0xA9, 0x80]);
    a.step();
    b.step();
    assert!(a.flag(status::ZERO));
    assert!(b.flag(status::NEGATIVE));
    a.raise_nmi();
    assert!(!b.interrupt_lines().nmi_pending());
}

#[test]
fn with_memory_preserves_registers() {
    let mut cpu = cpu_with(&[0xA9, 0x42]);
    cpu.step();
    let cpu = cpu.with_memory(CountingBus::default());
    assert_eq!(cpu.a, 0x42);
    assert_eq!(cpu.pc, 0x8002);
}
