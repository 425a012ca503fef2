//! Canonical per-opcode T-cycle costs.
//!
//! `BASE` holds the cost of every primary opcode with conditional branches
//! counted as *not taken*; `taken_bonus` is the extra cost a conditional
//! branch pays when its condition holds. CB-prefixed costs come from
//! `cb_cycles`. The execution paths and the conformance test in
//! `cpu/tests.rs` both read from here, so a mismatch between decode and
//! accounting cannot go unnoticed.

pub type Cycles = u32;

/// T-cycles consumed by a maskable interrupt entry (5 machine cycles).
pub const INTERRUPT_ENTRY: Cycles = 20;

#[rustfmt::skip]
pub const BASE: [Cycles; 256] = [
    //  x0  x1  x2  x3  x4  x5  x6  x7  x8  x9  xA  xB  xC  xD  xE  xF
        4, 12,  8,  8,  4,  4,  8,  4, 20,  8,  8,  8,  4,  4,  8,  4, // 0x
        4, 12,  8,  8,  4,  4,  8,  4, 12,  8,  8,  8,  4,  4,  8,  4, // 1x
        8, 12,  8,  8,  4,  4,  8,  4,  8,  8,  8,  8,  4,  4,  8,  4, // 2x
        8, 12,  8,  8, 12, 12, 12,  4,  8,  8,  8,  8,  4,  4,  8,  4, // 3x
        4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 4x
        4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 5x
        4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 6x
        8,  8,  8,  8,  8,  8,  4,  8,  4,  4,  4,  4,  4,  4,  8,  4, // 7x
        4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 8x
        4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 9x
        4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // Ax
        4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // Bx
        8, 12, 12, 16, 12, 16,  8, 16,  8, 16, 12,  4, 12, 24,  8, 16, // Cx
        8, 12, 12,  4, 12, 16,  8, 16,  8, 16, 12,  4, 12,  4,  8, 16, // Dx
       12, 12,  8,  4,  4, 16,  8, 16, 16,  4, 16,  4,  4,  4,  8, 16, // Ex
       12, 12,  8,  4,  4, 16,  8, 16, 12,  8, 16,  4,  4,  4,  8, 16, // Fx
];

/// Extra T-cycles charged when a conditional branch is taken.
#[inline]
pub fn taken_bonus(opcode: u8) -> Cycles {
    match opcode {
        // JR cc, r8
        0x20 | 0x28 | 0x30 | 0x38 => 4,
        // JP cc, a16
        0xC2 | 0xCA | 0xD2 | 0xDA => 4,
        // RET cc
        0xC0 | 0xC8 | 0xD0 | 0xD8 => 12,
        // CALL cc, a16
        0xC4 | 0xCC | 0xD4 | 0xDC => 12,
        _ => 0,
    }
}

/// T-cycles for a CB-prefixed opcode, including the 0xCB fetch.
///
/// Register forms cost 8; (HL) forms cost 16, except BIT n,(HL) which only
/// reads and costs 12.
#[inline]
pub fn cb_cycles(cb_opcode: u8) -> Cycles {
    let uses_hl = cb_opcode & 0x07 == 6;
    let is_bit = cb_opcode >> 6 == 1;
    match (uses_hl, is_bit) {
        (false, _) => 8,
        (true, true) => 12,
        (true, false) => 16,
    }
}
