//! Pure flag and ALU helpers.
//!
//! Every function here is a function of its operands alone. Results carry
//! only the six documented flag bits; the caller decides which of them an
//! instruction is allowed to change (see `Registers::update_flags`).

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.

use crate::flags::{CF, HF, NF, PF, SF, ZF, parity, sz, szp};

/// Result of an 8-bit ALU operation with its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u8,
    pub flags: u8,
}

const fn bit(on: bool, flag: u8) -> u8 {
    if on { flag } else { 0 }
}

// ---------------------------------------------------------------------------
// Flag predicates
// ---------------------------------------------------------------------------

/// Signed overflow of `a + b`: both operands share a sign that the result
/// does not.
#[must_use]
pub const fn overflow_add8(a: u8, b: u8, result: u8) -> bool {
    (a ^ b) & 0x80 == 0 && (a ^ result) & 0x80 != 0
}

/// Signed overflow of `a - b`: the same test with `b`'s sign inverted.
#[must_use]
pub const fn overflow_sub8(a: u8, b: u8, result: u8) -> bool {
    overflow_add8(a, b ^ 0x80, result)
}

#[must_use]
pub const fn overflow_add16(a: u16, b: u16, result: u16) -> bool {
    (a ^ b) & 0x8000 == 0 && (a ^ result) & 0x8000 != 0
}

#[must_use]
pub const fn overflow_sub16(a: u16, b: u16, result: u16) -> bool {
    overflow_add16(a, b ^ 0x8000, result)
}

/// Carry out of bit 3.
#[must_use]
pub const fn half_carry_add8(a: u8, b: u8, carry: bool) -> bool {
    (a & 0x0F) + (b & 0x0F) + carry as u8 > 0x0F
}

/// Borrow into bit 3.
#[must_use]
pub const fn half_carry_sub8(a: u8, b: u8, carry: bool) -> bool {
    (a & 0x0F) < (b & 0x0F) + carry as u8
}

/// Carry out of bit 11.
#[must_use]
pub const fn half_carry_add16(a: u16, b: u16, carry: bool) -> bool {
    (a & 0x0FFF) + (b & 0x0FFF) + carry as u16 > 0x0FFF
}

/// Borrow into bit 11.
#[must_use]
pub const fn half_carry_sub16(a: u16, b: u16, carry: bool) -> bool {
    (a & 0x0FFF) < (b & 0x0FFF) + carry as u16
}

/// S and Z of a 16-bit result.
#[must_use]
pub const fn sz16(value: u16) -> u8 {
    bit(value & 0x8000 != 0, SF) | bit(value == 0, ZF)
}

// ---------------------------------------------------------------------------
// 8-bit arithmetic and logic
// ---------------------------------------------------------------------------

/// ADD / ADC.
#[must_use]
pub fn add8(a: u8, b: u8, carry: bool) -> AluResult {
    let wide = u16::from(a) + u16::from(b) + u16::from(carry);
    let value = wide as u8;
    let flags = sz(value)
        | bit(half_carry_add8(a, b, carry), HF)
        | bit(overflow_add8(a, b, value), PF)
        | bit(wide > 0xFF, CF);
    AluResult { value, flags }
}

/// SUB / SBC. CP uses this and throws the value away.
#[must_use]
pub fn sub8(a: u8, b: u8, carry: bool) -> AluResult {
    let value = a.wrapping_sub(b).wrapping_sub(u8::from(carry));
    let flags = NF
        | sz(value)
        | bit(half_carry_sub8(a, b, carry), HF)
        | bit(overflow_sub8(a, b, value), PF)
        | bit(u16::from(a) < u16::from(b) + u16::from(carry), CF);
    AluResult { value, flags }
}

#[must_use]
pub fn and8(a: u8, b: u8) -> AluResult {
    let value = a & b;
    AluResult { value, flags: szp(value) | HF }
}

#[must_use]
pub fn or8(a: u8, b: u8) -> AluResult {
    let value = a | b;
    AluResult { value, flags: szp(value) }
}

#[must_use]
pub fn xor8(a: u8, b: u8) -> AluResult {
    let value = a ^ b;
    AluResult { value, flags: szp(value) }
}

/// INC: carry is not affected, so the result's C bit is always clear.
#[must_use]
pub fn inc8(a: u8) -> AluResult {
    let value = a.wrapping_add(1);
    let flags = sz(value) | bit(a & 0x0F == 0x0F, HF) | bit(a == 0x7F, PF);
    AluResult { value, flags }
}

/// DEC: carry is not affected.
#[must_use]
pub fn dec8(a: u8) -> AluResult {
    let value = a.wrapping_sub(1);
    let flags = NF | sz(value) | bit(a & 0x0F == 0x00, HF) | bit(a == 0x80, PF);
    AluResult { value, flags }
}

/// NEG is `0 - a`.
#[must_use]
pub fn neg8(a: u8) -> AluResult {
    sub8(0, a, false)
}

/// Decimal adjust after BCD add or subtract.
///
/// `flags` is the current F register; N selects add or subtract mode and
/// passes through unchanged.
#[must_use]
pub fn daa(a: u8, flags: u8) -> AluResult {
    let n = flags & NF != 0;
    let h = flags & HF != 0;
    let c = flags & CF != 0;
    let low = a & 0x0F;

    let mut correction = 0u8;
    let mut carry = c;
    if h || low > 9 {
        correction |= 0x06;
    }
    if c || a > 0x99 {
        correction |= 0x60;
        carry = true;
    }

    let value = if n {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    let half = if n { h && low < 6 } else { low > 9 };

    let flags = szp(value) | bit(half, HF) | bit(carry, CF) | (flags & NF);
    AluResult { value, flags }
}

// ---------------------------------------------------------------------------
// Rotates and shifts (CB forms: S, Z, P/V, C updated; H and N cleared)
// ---------------------------------------------------------------------------

fn shifted(value: u8, carry_out: bool) -> AluResult {
    AluResult { value, flags: szp(value) | bit(carry_out, CF) }
}

#[must_use]
pub fn rlc8(a: u8) -> AluResult {
    shifted(a.rotate_left(1), a & 0x80 != 0)
}

#[must_use]
pub fn rrc8(a: u8) -> AluResult {
    shifted(a.rotate_right(1), a & 0x01 != 0)
}

#[must_use]
pub fn rl8(a: u8, carry: bool) -> AluResult {
    shifted(a << 1 | u8::from(carry), a & 0x80 != 0)
}

#[must_use]
pub fn rr8(a: u8, carry: bool) -> AluResult {
    shifted(a >> 1 | u8::from(carry) << 7, a & 0x01 != 0)
}

#[must_use]
pub fn sla8(a: u8) -> AluResult {
    shifted(a << 1, a & 0x80 != 0)
}

/// Arithmetic right shift: bit 7 is kept.
#[must_use]
pub fn sra8(a: u8) -> AluResult {
    shifted(a >> 1 | (a & 0x80), a & 0x01 != 0)
}

/// Undocumented shift left that feeds a 1 into bit 0.
#[must_use]
pub fn sll8(a: u8) -> AluResult {
    shifted(a << 1 | 0x01, a & 0x80 != 0)
}

#[must_use]
pub fn srl8(a: u8) -> AluResult {
    shifted(a >> 1, a & 0x01 != 0)
}

/// Dispatch a CB rotate/shift by its 3-bit operation field.
#[must_use]
pub fn rotate_shift(op: u8, a: u8, carry: bool) -> AluResult {
    match op & 7 {
        0 => rlc8(a),
        1 => rrc8(a),
        2 => rl8(a, carry),
        3 => rr8(a, carry),
        4 => sla8(a),
        5 => sra8(a),
        6 => sll8(a),
        _ => srl8(a),
    }
}

/// Accumulator rotates (RLCA, RRCA, RLA, RRA) change only H, N and C.
/// The returned flags hold just the carry; H and N come back clear.
#[must_use]
pub fn rotate_accumulator(op: u8, a: u8, carry: bool) -> AluResult {
    let r = rotate_shift(op & 3, a, carry);
    AluResult { value: r.value, flags: r.flags & CF }
}

// ---------------------------------------------------------------------------
// 16-bit arithmetic
// ---------------------------------------------------------------------------

/// ADD HL/IX/IY,rr. Only H, N and C are meaningful.
#[must_use]
pub fn add16(a: u16, b: u16) -> (u16, u8) {
    let wide = u32::from(a) + u32::from(b);
    let flags = bit(half_carry_add16(a, b, false), HF) | bit(wide > 0xFFFF, CF);
    (wide as u16, flags)
}

/// ADC HL,rr. All documented flags.
#[must_use]
pub fn adc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let wide = u32::from(a) + u32::from(b) + u32::from(carry);
    let value = wide as u16;
    let flags = sz16(value)
        | bit(half_carry_add16(a, b, carry), HF)
        | bit(overflow_add16(a, b, value), PF)
        | bit(wide > 0xFFFF, CF);
    (value, flags)
}

/// SBC HL,rr. All documented flags.
#[must_use]
pub fn sbc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let value = a.wrapping_sub(b).wrapping_sub(u16::from(carry));
    let flags = NF
        | sz16(value)
        | bit(half_carry_sub16(a, b, carry), HF)
        | bit(overflow_sub16(a, b, value), PF)
        | bit(u32::from(a) < u32::from(b) + u32::from(carry), CF);
    (value, flags)
}

/// Flags for IN r,(C), LD A,I and friends: S, Z, P from the value, H and N
/// clear.
#[must_use]
pub fn in_flags(value: u8) -> u8 {
    sz(value) | bit(parity(value), PF)
}
