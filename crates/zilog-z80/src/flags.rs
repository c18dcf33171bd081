//! Z80 flag register bits.

/// Sign flag (bit 7) - copy of the result's top bit.
pub const SF: u8 = 0b1000_0000;

/// Zero flag (bit 6) - set if result is zero.
pub const ZF: u8 = 0b0100_0000;

/// Undocumented bit 5. Flag-producing instructions leave it alone.
pub const YF: u8 = 0b0010_0000;

/// Half-carry flag (bit 4) - carry from bit 3 to bit 4.
pub const HF: u8 = 0b0001_0000;

/// Undocumented bit 3. Flag-producing instructions leave it alone.
pub const XF: u8 = 0b0000_1000;

/// Parity/Overflow flag (bit 2) - parity or overflow depending on instruction.
pub const PF: u8 = 0b0000_0100;

/// Add/Subtract flag (bit 1) - set if last operation was subtraction.
pub const NF: u8 = 0b0000_0010;

/// Carry flag (bit 0) - carry out of bit 7.
pub const CF: u8 = 0b0000_0001;

/// The six flags the Z80 documents. Only these bits are ever computed.
pub const DOCUMENTED: u8 = SF | ZF | HF | PF | NF | CF;

/// Even-parity lookup: `PARITY[v]` is `PF` when `v` has an even number of
/// set bits.
static PARITY: [u8; 256] = build_parity_table();

const fn build_parity_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        #[allow(clippy::cast_possible_truncation)] // i < 256
        let v = i as u8;
        if v.count_ones() % 2 == 0 {
            table[i] = PF;
        }
        i += 1;
    }
    table
}

/// True if `value` has even parity.
#[must_use]
pub fn parity(value: u8) -> bool {
    PARITY[usize::from(value)] != 0
}

/// S and Z for an 8-bit result.
#[must_use]
pub const fn sz(value: u8) -> u8 {
    let mut f = value & SF;
    if value == 0 {
        f |= ZF;
    }
    f
}

/// S, Z and even parity for an 8-bit result.
#[must_use]
pub fn szp(value: u8) -> u8 {
    sz(value) | PARITY[usize::from(value)]
}
