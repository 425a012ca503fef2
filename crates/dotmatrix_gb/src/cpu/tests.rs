use super::*;

struct TestBus {
    memory: [u8; 0x10000],
}

impl Default for TestBus {
    fn default() -> Self {
        Self {
            memory: [0; 0x10000],
        }
    }
}

impl Bus for TestBus {
    fn read8(&mut self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    fn write8(&mut self, addr: u16, value: u8) {
        self.memory[addr as usize] = value;
    }
}

/// CPU + bus with the program placed at 0x1000 and SP in high WRAM.
fn setup(program: &[u8]) -> (Cpu, TestBus) {
    let mut cpu = Cpu::new();
    let mut bus = TestBus::default();
    cpu.regs.pc = 0x1000;
    cpu.regs.sp = 0xD000;
    bus.memory[0x1000..0x1000 + program.len()].copy_from_slice(program);
    (cpu, bus)
}

#[test]
fn reset_state_matches_post_boot_values() {
    let cpu = Cpu::new();
    assert_eq!(cpu.regs.a, 0x01);
    assert_eq!(cpu.regs.f, 0xB0);
    assert_eq!(cpu.regs.bc(), 0x0013);
    assert_eq!(cpu.regs.de(), 0x00D8);
    assert_eq!(cpu.regs.hl(), 0x014D);
    assert_eq!(cpu.regs.sp, 0xFFFE);
    assert_eq!(cpu.regs.pc, 0x0100);
    assert!(!cpu.ime);
    assert!(!cpu.halted);
}

#[test]
fn flag_register_low_nibble_is_always_zero() {
    let mut regs = Registers::default();
    regs.set_af(0x12FF);
    assert_eq!(regs.af(), 0x12F0);
    assert_eq!(regs.f & 0x0F, 0);
}

#[test]
fn ld_r_r_is_a_no_op_on_registers_and_flags() {
    // LD B,B
    let (mut cpu, mut bus) = setup(&[0x40]);
    cpu.regs.b = 0x42;
    cpu.regs.f = 0xF0;
    let before = cpu.regs;
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 4);
    assert_eq!(cpu.regs.b, before.b);
    assert_eq!(cpu.regs.f, before.f);
    assert_eq!(cpu.regs.af(), before.af());
}

#[test]
fn push_pop_round_trips_and_pop_af_masks_low_nibble() {
    // PUSH BC; POP DE
    let (mut cpu, mut bus) = setup(&[0xC5, 0xD1]);
    cpu.regs.set_bc(0xBEEF);
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.de(), 0xBEEF);

    // POP AF with a stacked value whose low nibble is set.
    let (mut cpu, mut bus) = setup(&[0xF1]);
    cpu.regs.sp = 0xCFF0;
    bus.memory[0xCFF0] = 0xFF; // F
    bus.memory[0xCFF1] = 0x12; // A
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x12);
    assert_eq!(cpu.regs.f, 0xF0);
}

#[test]
fn cpl_twice_restores_a_and_sets_n_h() {
    // CPL; CPL
    let (mut cpu, mut bus) = setup(&[0x2F, 0x2F]);
    cpu.regs.a = 0x3C;
    cpu.regs.f = 0x90; // Z and C set
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0xC3);
    assert!(cpu.get_flag(Flag::N));
    assert!(cpu.get_flag(Flag::H));
    assert!(cpu.get_flag(Flag::Z));
    assert!(cpu.get_flag(Flag::C));
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x3C);
    assert!(cpu.get_flag(Flag::N));
    assert!(cpu.get_flag(Flag::H));
    assert!(cpu.get_flag(Flag::Z));
    assert!(cpu.get_flag(Flag::C));
}

#[test]
fn swap_twice_restores_value_and_clears_nhc() {
    // SWAP A; SWAP A
    let (mut cpu, mut bus) = setup(&[0xCB, 0x37, 0xCB, 0x37]);
    cpu.regs.a = 0xAB;
    cpu.regs.f = 0xF0;
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 8);
    assert_eq!(cpu.regs.a, 0xBA);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0xAB);
    assert!(!cpu.get_flag(Flag::Z));
    assert!(!cpu.get_flag(Flag::N));
    assert!(!cpu.get_flag(Flag::H));
    assert!(!cpu.get_flag(Flag::C));
}

#[test]
fn daa_adjusts_bcd_addition() {
    // ADD A,0x05; DAA
    let (mut cpu, mut bus) = setup(&[0xC6, 0x05, 0x27]);
    cpu.regs.a = 0x05;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x0A);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x10);
    assert!(!cpu.get_flag(Flag::Z));
    assert!(!cpu.get_flag(Flag::H));
    assert!(!cpu.get_flag(Flag::C));
}

#[test]
fn add_hl_hl_at_0x8000_sets_carry_without_half_carry() {
    // ADD HL,HL
    let (mut cpu, mut bus) = setup(&[0x29]);
    cpu.regs.set_hl(0x8000);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.hl(), 0x0000);
    assert!(cpu.get_flag(Flag::C));
    assert!(!cpu.get_flag(Flag::H));
    assert!(!cpu.get_flag(Flag::N));
}

#[test]
fn jr_minus_two_forms_an_infinite_loop() {
    // JR -2 (0x18 0xFE): lands back on the JR itself.
    let (mut cpu, mut bus) = setup(&[0x18, 0xFE]);
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 12);
    assert_eq!(cpu.regs.pc, 0x1000);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x1000);
}

#[test]
fn ldh_with_offset_zero_reaches_the_joypad_register() {
    // LD (0xFF00+0x00), A
    let (mut cpu, mut bus) = setup(&[0xE0, 0x00]);
    cpu.regs.a = 0x30;
    cpu.step(&mut bus);
    assert_eq!(bus.memory[0xFF00], 0x30);
}

#[test]
fn halt_with_pending_interrupt_and_ime_clear_triggers_halt_bug() {
    // HALT; INC A
    let (mut cpu, mut bus) = setup(&[0x76, 0x3C]);
    cpu.ime = false;
    bus.memory[0xFFFF] = 0x01;
    bus.memory[0xFF0F] = 0x01;
    cpu.regs.a = 0;

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 4);
    assert!(!cpu.halted, "HALT must not enter the halted state");

    // The byte after HALT is fetched twice: INC A runs twice while PC
    // only advances once.
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 1);
    assert_eq!(cpu.regs.pc, 0x1001);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 2);
    assert_eq!(cpu.regs.pc, 0x1002);
}

#[test]
fn halt_with_ime_clear_wakes_without_service() {
    // HALT; INC A
    let (mut cpu, mut bus) = setup(&[0x76, 0x3C]);
    cpu.ime = false;
    bus.memory[0xFFFF] = 0x04;
    bus.memory[0xFF0F] = 0x00;

    cpu.step(&mut bus);
    assert!(cpu.halted);

    // Halted steps cost 4 T-cycles and do not move PC.
    assert_eq!(cpu.step(&mut bus), 4);
    assert_eq!(cpu.regs.pc, 0x1001);
    assert!(cpu.halted);

    // A pending enabled interrupt wakes the CPU but is not serviced;
    // execution resumes at the instruction after HALT within this step.
    bus.memory[0xFF0F] = 0x04;
    cpu.step(&mut bus);
    assert!(!cpu.halted);
    assert_eq!(cpu.regs.a, 0x02); // boot A=0x01, one INC A
    assert_eq!(cpu.regs.pc, 0x1002);
    assert_eq!(bus.memory[0xFF0F], 0x04, "interrupt must not be consumed");
}

#[test]
fn halt_with_ime_set_services_the_waking_interrupt() {
    let (mut cpu, mut bus) = setup(&[0x76]);
    cpu.ime = true;
    bus.memory[0xFFFF] = 0x01;

    cpu.step(&mut bus);
    assert!(cpu.halted);
    assert_eq!(cpu.step(&mut bus), 4);

    bus.memory[0xFF0F] = 0x01;
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 20);
    assert_eq!(cpu.regs.pc, 0x0040);
    assert!(!cpu.halted);
    assert!(!cpu.ime);
}

#[test]
fn ei_enables_ime_only_after_the_next_instruction() {
    // EI; NOP; NOP
    let (mut cpu, mut bus) = setup(&[0xFB, 0x00, 0x00]);
    cpu.step(&mut bus);
    assert!(!cpu.ime, "IME must stay clear right after EI");
    cpu.step(&mut bus);
    assert!(cpu.ime, "IME must be set once the following instruction completed");
}

#[test]
fn ei_then_di_never_enables_ime() {
    // EI; DI; NOP
    let (mut cpu, mut bus) = setup(&[0xFB, 0xF3, 0x00]);
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert!(!cpu.ime);
    cpu.step(&mut bus);
    assert!(!cpu.ime);
}

#[test]
fn reti_enables_ime_immediately() {
    let (mut cpu, mut bus) = setup(&[0xD9]);
    cpu.regs.sp = 0xCFFE;
    bus.memory[0xCFFE] = 0x00;
    bus.memory[0xCFFF] = 0x20;
    cpu.step(&mut bus);
    assert!(cpu.ime);
    assert_eq!(cpu.regs.pc, 0x2000);
}

#[test]
fn interrupt_service_costs_20_cycles_and_pushes_pc() {
    let (mut cpu, mut bus) = setup(&[0x00]);
    cpu.ime = true;
    cpu.regs.pc = 0x1234;
    cpu.regs.sp = 0xFFFE;
    bus.memory[0xFFFF] = 0x04;
    bus.memory[0xFF0F] = 0x04;

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 20);
    assert_eq!(cpu.regs.pc, 0x0050);
    assert_eq!(cpu.regs.sp, 0xFFFC);
    assert_eq!(bus.memory[0xFFFC], 0x34);
    assert_eq!(bus.memory[0xFFFD], 0x12);
    assert_eq!(bus.memory[0xFF0F], 0x00);
    assert!(!cpu.ime);
}

#[test]
fn interrupts_are_serviced_in_priority_order() {
    let (mut cpu, mut bus) = setup(&[0x00]);
    cpu.ime = true;
    bus.memory[0xFFFF] = 0x1F;
    bus.memory[0xFF0F] = 0x14; // Joypad and Timer pending

    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x0050, "timer outranks joypad");
    assert_eq!(bus.memory[0xFF0F], 0x10);
}

#[test]
fn invalid_opcodes_behave_like_nop() {
    for opcode in [0xD3u8, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD] {
        let (mut cpu, mut bus) = setup(&[opcode, 0x3C]);
        let before = cpu.regs;
        let cycles = cpu.step(&mut bus);
        assert_eq!(cycles, 4, "opcode 0x{opcode:02X}");
        assert_eq!(cpu.regs.pc, 0x1001);
        assert_eq!(cpu.regs.af(), before.af());
    }
}

#[test]
fn flags_low_nibble_stays_zero_after_every_opcode() {
    for opcode in 0u16..=0xFF {
        let opcode = opcode as u8;
        let (mut cpu, mut bus) = setup(&[opcode, 0x00, 0x00]);
        cpu.regs.f = 0xB0;
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.f & 0x0F, 0, "opcode 0x{opcode:02X}");
    }
}

/// Flags that force a conditional opcode's condition to the given truth
/// value. Non-conditional opcodes ignore the result.
fn flags_for_condition(opcode: u8, taken: bool) -> u8 {
    match ((opcode >> 3) & 0x03, taken) {
        (0, true) => 0x00,  // NZ taken: Z clear
        (0, false) => 0x80, // NZ not taken: Z set
        (1, true) => 0x80,  // Z
        (1, false) => 0x00,
        (2, true) => 0x00,  // NC taken: C clear
        (2, false) => 0x10, // NC not taken: C set
        (3, true) => 0x10,  // C
        (3, false) => 0x00,
        _ => unreachable!(),
    }
}

#[test]
fn every_primary_opcode_matches_the_cycle_table() {
    for opcode in 0u16..=0xFF {
        let opcode = opcode as u8;
        if opcode == 0xCB {
            continue;
        }

        let conditional = cycles::taken_bonus(opcode) != 0;
        let variants: &[(bool, u32)] = if conditional {
            &[
                (false, cycles::BASE[opcode as usize]),
                (true, cycles::BASE[opcode as usize] + cycles::taken_bonus(opcode)),
            ]
        } else {
            &[(false, cycles::BASE[opcode as usize])]
        };

        for &(taken, expected) in variants {
            let (mut cpu, mut bus) = setup(&[opcode, 0x00, 0x00]);
            cpu.regs.f = flags_for_condition(opcode, taken);
            let got = cpu.step(&mut bus);
            assert_eq!(
                got, expected,
                "opcode 0x{opcode:02X} taken={taken}: expected {expected} cycles, got {got}"
            );
        }
    }
}

#[test]
fn every_cb_opcode_matches_the_cycle_table() {
    for cb in 0u16..=0xFF {
        let cb = cb as u8;
        let (mut cpu, mut bus) = setup(&[0xCB, cb]);
        let got = cpu.step(&mut bus);
        assert_eq!(got, cycles::cb_cycles(cb), "CB opcode 0x{cb:02X}");
    }
}

#[test]
fn bit_preserves_carry_and_sets_half_carry() {
    // BIT 7,A with bit clear
    let (mut cpu, mut bus) = setup(&[0xCB, 0x7F]);
    cpu.regs.a = 0x00;
    cpu.regs.f = 0x10; // C set
    cpu.step(&mut bus);
    assert!(cpu.get_flag(Flag::Z));
    assert!(cpu.get_flag(Flag::H));
    assert!(!cpu.get_flag(Flag::N));
    assert!(cpu.get_flag(Flag::C), "BIT must not touch carry");
}

#[test]
fn stop_freezes_until_a_joypad_line_goes_low() {
    // STOP (with padding byte); INC A
    let (mut cpu, mut bus) = setup(&[0x10, 0x00, 0x3C]);
    bus.memory[0xFF00] = 0xFF;
    cpu.step(&mut bus);
    assert!(cpu.is_stopped());
    assert_eq!(cpu.regs.pc, 0x1002);

    // Still stopped while all input lines read high.
    cpu.step(&mut bus);
    assert!(cpu.is_stopped());
    assert_eq!(cpu.regs.pc, 0x1002);

    // A low input line resumes execution.
    bus.memory[0xFF00] = 0xF7;
    cpu.step(&mut bus);
    assert!(!cpu.is_stopped());
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x1003);
}

#[test]
fn ld_hl_sp_plus_offset_computes_half_and_full_carry_from_low_byte() {
    // LD HL, SP+0x01 with SP=0xC0FF: carry out of bits 3 and 7.
    let (mut cpu, mut bus) = setup(&[0xF8, 0x01]);
    cpu.regs.sp = 0xC0FF;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.hl(), 0xC100);
    assert!(cpu.get_flag(Flag::H));
    assert!(cpu.get_flag(Flag::C));
    assert!(!cpu.get_flag(Flag::Z));
    assert!(!cpu.get_flag(Flag::N));
}

#[test]
fn sbc_chains_borrow_through_carry() {
    // SBC A,B with A=0x00, B=0x00, C=1 -> 0xFF, borrow out.
    let (mut cpu, mut bus) = setup(&[0x98]);
    cpu.regs.a = 0x00;
    cpu.regs.b = 0x00;
    cpu.regs.f = 0x10;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0xFF);
    assert!(cpu.get_flag(Flag::C));
    assert!(cpu.get_flag(Flag::H));
    assert!(cpu.get_flag(Flag::N));
    assert!(!cpu.get_flag(Flag::Z));
}

#[test]
fn interrupt_dispatch_reselects_after_high_byte_push_lands_on_ie() {
    // SP=0x0000: the high-byte push writes to 0xFFFF (IE). If that wipes
    // the only enabled interrupt, the dispatch is cancelled and PC falls
    // back to 0x0000.
    let (mut cpu, mut bus) = setup(&[0x00]);
    cpu.ime = true;
    cpu.regs.pc = 0x0034; // high byte 0x00 clears IE when pushed
    cpu.regs.sp = 0x0000;
    bus.memory[0xFFFF] = 0x01;
    bus.memory[0xFF0F] = 0x01;

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 20);
    assert_eq!(cpu.regs.pc, 0x0000);
    assert_eq!(bus.memory[0xFF0F] & 0x1F, 0x01, "IF must stay pending");
}

#[test]
fn add_sets_zero_half_and_full_carry() {
    // ADD A,B with 0x3A + 0xC6 = 0x00: every flag except N.
    let (mut cpu, mut bus) = setup(&[0x80]);
    cpu.regs.a = 0x3A;
    cpu.regs.b = 0xC6;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x00);
    assert!(cpu.get_flag(Flag::Z));
    assert!(!cpu.get_flag(Flag::N));
    assert!(cpu.get_flag(Flag::H));
    assert!(cpu.get_flag(Flag::C));
}

#[test]
fn adc_includes_the_incoming_carry_in_both_carries() {
    // ADC A,C with A=0xE1, C=0x0F, carry=1 -> 0xF1, half carry only.
    let (mut cpu, mut bus) = setup(&[0x89]);
    cpu.regs.a = 0xE1;
    cpu.regs.c = 0x0F;
    cpu.regs.f = 0x10;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0xF1);
    assert!(!cpu.get_flag(Flag::Z));
    assert!(cpu.get_flag(Flag::H));
    assert!(!cpu.get_flag(Flag::C));
}

#[test]
fn sub_of_equal_values_sets_zero_and_subtract() {
    let (mut cpu, mut bus) = setup(&[0x90]);
    cpu.regs.a = 0x3E;
    cpu.regs.b = 0x3E;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x00);
    assert!(cpu.get_flag(Flag::Z));
    assert!(cpu.get_flag(Flag::N));
    assert!(!cpu.get_flag(Flag::H));
    assert!(!cpu.get_flag(Flag::C));
}

#[test]
fn sub_borrow_sets_both_carries() {
    // SUB A,B with 0x00 - 0x01 = 0xFF.
    let (mut cpu, mut bus) = setup(&[0x90]);
    cpu.regs.a = 0x00;
    cpu.regs.b = 0x01;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0xFF);
    assert!(cpu.get_flag(Flag::H));
    assert!(cpu.get_flag(Flag::C));
    assert!(cpu.get_flag(Flag::N));
}

#[test]
fn cp_compares_without_modifying_a() {
    // CP 0x40 with A=0x3C: borrow, no half borrow.
    let (mut cpu, mut bus) = setup(&[0xFE, 0x40]);
    cpu.regs.a = 0x3C;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x3C);
    assert!(!cpu.get_flag(Flag::Z));
    assert!(cpu.get_flag(Flag::N));
    assert!(!cpu.get_flag(Flag::H));
    assert!(cpu.get_flag(Flag::C));
}

#[test]
fn and_always_sets_half_carry() {
    let (mut cpu, mut bus) = setup(&[0xE6, 0x38]);
    cpu.regs.a = 0x5A;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x18);
    assert!(!cpu.get_flag(Flag::Z));
    assert!(cpu.get_flag(Flag::H));
    assert!(!cpu.get_flag(Flag::N));
    assert!(!cpu.get_flag(Flag::C));

    let (mut cpu, mut bus) = setup(&[0xE6, 0x00]);
    cpu.regs.a = 0x5A;
    cpu.step(&mut bus);
    assert!(cpu.get_flag(Flag::Z));
    assert!(cpu.get_flag(Flag::H));
}

#[test]
fn or_and_xor_clear_every_flag_but_zero() {
    // XOR A: the canonical "clear A" idiom.
    let (mut cpu, mut bus) = setup(&[0xAF]);
    cpu.regs.a = 0x5A;
    cpu.regs.f = 0xF0;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x00);
    assert_eq!(cpu.regs.f, 0x80);

    // OR B with a nonzero result clears everything.
    let (mut cpu, mut bus) = setup(&[0xB0]);
    cpu.regs.a = 0x00;
    cpu.regs.b = 0x04;
    cpu.regs.f = 0xF0;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x04);
    assert_eq!(cpu.regs.f, 0x00);
}

#[test]
fn inc_preserves_carry_and_tracks_half_carry() {
    // INC B with carry set beforehand: C survives.
    let (mut cpu, mut bus) = setup(&[0x04]);
    cpu.regs.b = 0x0F;
    cpu.regs.f = 0x10;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.b, 0x10);
    assert!(cpu.get_flag(Flag::H));
    assert!(!cpu.get_flag(Flag::N));
    assert!(cpu.get_flag(Flag::C));

    // INC wrapping 0xFF -> 0x00 sets Z.
    let (mut cpu, mut bus) = setup(&[0x04]);
    cpu.regs.b = 0xFF;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.b, 0x00);
    assert!(cpu.get_flag(Flag::Z));
    assert!(cpu.get_flag(Flag::H));
}

#[test]
fn dec_tracks_half_borrow_and_preserves_carry() {
    let (mut cpu, mut bus) = setup(&[0x05]);
    cpu.regs.b = 0x10;
    cpu.regs.f = 0x10;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.b, 0x0F);
    assert!(cpu.get_flag(Flag::H));
    assert!(cpu.get_flag(Flag::N));
    assert!(cpu.get_flag(Flag::C));

    let (mut cpu, mut bus) = setup(&[0x05]);
    cpu.regs.b = 0x01;
    cpu.step(&mut bus);
    assert!(cpu.get_flag(Flag::Z));
    assert!(!cpu.get_flag(Flag::H));
}

#[test]
fn inc_and_dec_reach_memory_through_hl() {
    // INC (HL); DEC (HL)
    let (mut cpu, mut bus) = setup(&[0x34, 0x35]);
    cpu.regs.set_hl(0xC100);
    bus.memory[0xC100] = 0x41;
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 12);
    assert_eq!(bus.memory[0xC100], 0x42);
    cpu.step(&mut bus);
    assert_eq!(bus.memory[0xC100], 0x41);
}

#[test]
fn post_increment_and_post_decrement_loads_move_hl() {
    // LD (HL+),A; LD (HL-),A; LD A,(HL+); LD A,(HL-)
    let (mut cpu, mut bus) = setup(&[0x22, 0x32]);
    cpu.regs.a = 0x77;
    cpu.regs.set_hl(0xC200);
    cpu.step(&mut bus);
    assert_eq!(bus.memory[0xC200], 0x77);
    assert_eq!(cpu.regs.hl(), 0xC201);
    cpu.step(&mut bus);
    assert_eq!(bus.memory[0xC201], 0x77);
    assert_eq!(cpu.regs.hl(), 0xC200);

    let (mut cpu, mut bus) = setup(&[0x2A, 0x3A]);
    cpu.regs.set_hl(0xC300);
    bus.memory[0xC300] = 0x11;
    bus.memory[0xC301] = 0x22;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x11);
    assert_eq!(cpu.regs.hl(), 0xC301);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x22);
    assert_eq!(cpu.regs.hl(), 0xC300);
}

#[test]
fn ld_a16_sp_stores_low_byte_first() {
    // LD (0xC400), SP
    let (mut cpu, mut bus) = setup(&[0x08, 0x00, 0xC4]);
    cpu.regs.sp = 0xBEEF;
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 20);
    assert_eq!(bus.memory[0xC400], 0xEF);
    assert_eq!(bus.memory[0xC401], 0xBE);
}

#[test]
fn accumulator_rotates_always_clear_zero() {
    // RLCA with A=0 would set Z under CB rules; here Z stays 0.
    let (mut cpu, mut bus) = setup(&[0x07]);
    cpu.regs.a = 0x00;
    cpu.regs.f = 0x80;
    cpu.step(&mut bus);
    assert!(!cpu.get_flag(Flag::Z));

    // RRA shifts the carry into bit 7.
    let (mut cpu, mut bus) = setup(&[0x1F]);
    cpu.regs.a = 0x01;
    cpu.regs.f = 0x10;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x80);
    assert!(cpu.get_flag(Flag::C));
    assert!(!cpu.get_flag(Flag::Z));

    // RLA shifts the carry into bit 0.
    let (mut cpu, mut bus) = setup(&[0x17]);
    cpu.regs.a = 0x80;
    cpu.regs.f = 0x00;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x00);
    assert!(cpu.get_flag(Flag::C));
    assert!(!cpu.get_flag(Flag::Z));
}

#[test]
fn rst_pushes_and_jumps_to_its_vector() {
    let (mut cpu, mut bus) = setup(&[0xEF]); // RST 0x28
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 16);
    assert_eq!(cpu.regs.pc, 0x0028);
    assert_eq!(cpu.regs.sp, 0xCFFE);
    assert_eq!(bus.memory[0xCFFE], 0x01);
    assert_eq!(bus.memory[0xCFFF], 0x10);
}

#[test]
fn jp_hl_jumps_without_reading_memory_operands() {
    let (mut cpu, mut bus) = setup(&[0xE9]);
    cpu.regs.set_hl(0x2345);
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 4);
    assert_eq!(cpu.regs.pc, 0x2345);
}

#[test]
fn add_sp_applies_a_negative_offset() {
    // ADD SP, -1
    let (mut cpu, mut bus) = setup(&[0xE8, 0xFF]);
    cpu.regs.sp = 0xD000;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.sp, 0xCFFF);
    assert!(!cpu.get_flag(Flag::Z));
    assert!(!cpu.get_flag(Flag::N));
}

#[test]
fn conditional_call_and_ret_only_act_when_taken() {
    // CALL NZ with Z set: falls through in 12 cycles, stack untouched.
    let (mut cpu, mut bus) = setup(&[0xC4, 0x00, 0x30]);
    cpu.regs.f = 0x80;
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 12);
    assert_eq!(cpu.regs.pc, 0x1003);
    assert_eq!(cpu.regs.sp, 0xD000);

    // CALL NZ with Z clear: full call.
    let (mut cpu, mut bus) = setup(&[0xC4, 0x00, 0x30]);
    cpu.regs.f = 0x00;
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 24);
    assert_eq!(cpu.regs.pc, 0x3000);
    assert_eq!(cpu.regs.sp, 0xCFFE);

    // RET C with carry set pops the return address.
    let (mut cpu, mut bus) = setup(&[0xD8]);
    cpu.regs.f = 0x10;
    cpu.regs.sp = 0xCF00;
    bus.memory[0xCF00] = 0x34;
    bus.memory[0xCF01] = 0x12;
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 20);
    assert_eq!(cpu.regs.pc, 0x1234);
}

#[test]
fn cb_rotates_and_bit_ops_decode_registers_and_memory() {
    // RLC B
    let (mut cpu, mut bus) = setup(&[0xCB, 0x00]);
    cpu.regs.b = 0x85;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.b, 0x0B);
    assert!(cpu.get_flag(Flag::C));

    // SRL (HL)
    let (mut cpu, mut bus) = setup(&[0xCB, 0x3E]);
    cpu.regs.set_hl(0xC500);
    bus.memory[0xC500] = 0x01;
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 16);
    assert_eq!(bus.memory[0xC500], 0x00);
    assert!(cpu.get_flag(Flag::Z));
    assert!(cpu.get_flag(Flag::C));

    // SET 3,(HL) and RES 3,(HL)
    let (mut cpu, mut bus) = setup(&[0xCB, 0xDE, 0xCB, 0x9E]);
    cpu.regs.set_hl(0xC600);
    cpu.step(&mut bus);
    assert_eq!(bus.memory[0xC600], 0x08);
    cpu.step(&mut bus);
    assert_eq!(bus.memory[0xC600], 0x00);

    // SRA keeps the sign bit.
    let (mut cpu, mut bus) = setup(&[0xCB, 0x28]);
    cpu.regs.b = 0x81;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.b, 0xC0);
    assert!(cpu.get_flag(Flag::C));
}

#[test]
fn scf_and_ccf_clear_subtract_and_half_carry() {
    let (mut cpu, mut bus) = setup(&[0x37, 0x3F]);
    cpu.regs.f = 0xE0; // Z, N, H set
    cpu.step(&mut bus);
    assert!(cpu.get_flag(Flag::C));
    assert!(!cpu.get_flag(Flag::N));
    assert!(!cpu.get_flag(Flag::H));
    assert!(cpu.get_flag(Flag::Z), "SCF leaves Z alone");

    cpu.step(&mut bus);
    assert!(!cpu.get_flag(Flag::C), "CCF complements carry");
}

#[test]
fn daa_after_bcd_subtraction_uses_the_subtract_path() {
    // 0x42 - 0x09 = 0x39 in BCD: SUB sets H, DAA corrects 0x39.
    let (mut cpu, mut bus) = setup(&[0xD6, 0x09, 0x27]);
    cpu.regs.a = 0x42;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x39);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x33);
    assert!(cpu.get_flag(Flag::N), "DAA leaves N unchanged");
    assert!(!cpu.get_flag(Flag::H));
}

#[test]
fn high_page_loads_via_c_register() {
    // LDH (C),A and LDH A,(C)
    let (mut cpu, mut bus) = setup(&[0xE2, 0xF2]);
    cpu.regs.a = 0x5A;
    cpu.regs.c = 0x80;
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 8);
    assert_eq!(bus.memory[0xFF80], 0x5A);

    bus.memory[0xFF80] = 0xA5;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0xA5);
}
