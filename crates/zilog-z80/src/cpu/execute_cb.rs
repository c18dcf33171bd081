//! CB-prefixed bit instructions, including the DDCB/FDCB indexed forms.

#![allow(clippy::cast_possible_wrap)] // Displacement bytes are signed.

use emu_core::IoBus;

use crate::alu;
use crate::flags::{CF, DOCUMENTED, HF, NF, PF, SF, ZF};

use super::{Prefix, Z80};

impl Z80 {
    /// Execute a CB-prefixed instruction. Decoded by range:
    /// 00-3F rotate/shift, 40-7F BIT, 80-BF RES, C0-FF SET.
    pub(super) fn execute_cb<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        if self.prefix != Prefix::None {
            return self.execute_index_cb(bus);
        }

        let op = self.fetch_opcode(bus);
        let r = op & 7;
        let bit = (op >> 3) & 7;
        let on_memory = r == 6;
        let addr = self.regs.hl();
        let value = if on_memory { bus.read(addr) } else { self.get_reg8_plain(r) };

        let result = match op >> 6 {
            0 => {
                let shifted = alu::rotate_shift(bit, value, self.regs.flag(CF));
                self.regs.update_flags(DOCUMENTED, shifted.flags);
                shifted.value
            }
            1 => {
                self.bit_test(bit, value);
                return if on_memory { 12 } else { 8 };
            }
            2 => value & !(1 << bit),
            _ => value | (1 << bit),
        };

        if on_memory {
            bus.write(addr, result);
            15
        } else {
            self.set_reg8_plain(r, result);
            8
        }
    }

    /// DDCB d op / FDCB d op. The displacement precedes the sub-opcode,
    /// and neither byte is an M1 fetch.
    fn execute_index_cb<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        let d = self.fetch8(bus) as i8;
        let op = self.fetch8(bus);
        let addr = self.hl_or_index().wrapping_add_signed(i16::from(d));
        let value = bus.read(addr);
        let bit = (op >> 3) & 7;

        let result = match op >> 6 {
            0 => {
                let shifted = alu::rotate_shift(bit, value, self.regs.flag(CF));
                self.regs.update_flags(DOCUMENTED, shifted.flags);
                shifted.value
            }
            1 => {
                self.bit_test(bit, value);
                return 16;
            }
            2 => value & !(1 << bit),
            _ => value | (1 << bit),
        };

        bus.write(addr, result);
        // Undocumented: the result is also copied to the register named by
        // the low bits, unless they select (HL).
        let r = op & 7;
        if r != 6 {
            self.set_reg8_plain(r, result);
        }
        19
    }

    /// BIT b: Z and P/V set when the bit is clear, S only for a set bit 7,
    /// H set, N clear, C untouched.
    fn bit_test(&mut self, bit: u8, value: u8) {
        let set = value & (1 << bit) != 0;
        let mut flags = HF;
        if !set {
            flags |= ZF | PF;
        }
        if bit == 7 && set {
            flags |= SF;
        }
        self.regs.update_flags(SF | ZF | HF | PF | NF, flags);
    }
}
