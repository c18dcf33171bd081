//! ED-prefixed extended instructions and the block transfer/search/I/O
//! group.

use emu_core::IoBus;

use crate::alu;
use crate::flags::{CF, DOCUMENTED, HF, NF, PF, SF, ZF, sz, szp};

use super::{Prefix, Z80};

impl Z80 {
    /// Execute an ED-prefixed instruction. Returns cycles.
    pub(super) fn execute_ed<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        // A DD/FD before ED has no effect.
        self.prefix = Prefix::None;

        let op = self.fetch_opcode(bus);
        match op {
            // IN r, (C). ED 70 only sets flags.
            0x40 | 0x48 | 0x50 | 0x58 | 0x60 | 0x68 | 0x70 | 0x78 => {
                let value = bus.read_io(self.regs.bc());
                if op != 0x70 {
                    self.set_reg8_plain((op >> 3) & 7, value);
                }
                self.regs.update_flags(DOCUMENTED & !CF, alu::in_flags(value));
                12
            }

            // OUT (C), r. ED 71 outputs zero.
            0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x71 | 0x79 => {
                let value = if op == 0x71 { 0 } else { self.get_reg8_plain((op >> 3) & 7) };
                bus.write_io(self.regs.bc(), value);
                12
            }

            // SBC HL, rr
            0x42 | 0x52 | 0x62 | 0x72 => {
                let (value, flags) =
                    alu::sbc16(self.regs.hl(), self.get_reg16(op >> 4), self.regs.flag(CF));
                self.regs.set_hl(value);
                self.regs.update_flags(DOCUMENTED, flags);
                15
            }

            // ADC HL, rr
            0x4A | 0x5A | 0x6A | 0x7A => {
                let (value, flags) =
                    alu::adc16(self.regs.hl(), self.get_reg16(op >> 4), self.regs.flag(CF));
                self.regs.set_hl(value);
                self.regs.update_flags(DOCUMENTED, flags);
                15
            }

            // LD (nn), rr
            0x43 | 0x53 | 0x63 | 0x73 => {
                let addr = self.fetch16(bus);
                bus.write_word(addr, self.get_reg16(op >> 4));
                20
            }

            // LD rr, (nn)
            0x4B | 0x5B | 0x6B | 0x7B => {
                let addr = self.fetch16(bus);
                let value = bus.read_word(addr);
                self.set_reg16(op >> 4, value);
                20
            }

            // NEG (and its mirrors)
            0x44 | 0x4C | 0x54 | 0x5C | 0x64 | 0x6C | 0x74 | 0x7C => {
                let result = alu::neg8(self.regs.a);
                self.regs.a = result.value;
                self.regs.update_flags(DOCUMENTED, result.flags);
                8
            }

            // RETN / RETI (and mirrors): IFF1 is restored from IFF2.
            0x45 | 0x4D | 0x55 | 0x5D | 0x65 | 0x6D | 0x75 | 0x7D => {
                self.regs.pc = self.pop(bus);
                self.regs.iff1 = self.regs.iff2;
                14
            }

            // IM 0 / IM 1 / IM 2
            0x46 | 0x4E | 0x66 | 0x6E => {
                self.regs.im = 0;
                8
            }
            0x56 | 0x76 => {
                self.regs.im = 1;
                8
            }
            0x5E | 0x7E => {
                self.regs.im = 2;
                8
            }

            // LD I, A
            0x47 => {
                self.regs.i = self.regs.a;
                9
            }

            // LD R, A
            0x4F => {
                self.regs.r = self.regs.a;
                9
            }

            // LD A, I / LD A, R: P/V reports IFF2.
            0x57 | 0x5F => {
                let value = if op == 0x57 { self.regs.i } else { self.regs.r };
                self.regs.a = value;
                let flags = sz(value) | if self.regs.iff2 { PF } else { 0 };
                self.regs.update_flags(DOCUMENTED & !CF, flags);
                9
            }

            // RRD: low nibble of (HL) into A, A's low nibble into (HL)'s top.
            0x67 => {
                let addr = self.regs.hl();
                let m = bus.read(addr);
                let a = self.regs.a;
                bus.write(addr, (a << 4) | (m >> 4));
                self.regs.a = (a & 0xF0) | (m & 0x0F);
                self.regs.update_flags(DOCUMENTED & !CF, szp(self.regs.a));
                18
            }

            // RLD
            0x6F => {
                let addr = self.regs.hl();
                let m = bus.read(addr);
                let a = self.regs.a;
                bus.write(addr, (m << 4) | (a & 0x0F));
                self.regs.a = (a & 0xF0) | (m >> 4);
                self.regs.update_flags(DOCUMENTED & !CF, szp(self.regs.a));
                18
            }

            // LDI LDD LDIR LDDR, CPI CPD CPIR CPDR, INI IND INIR INDR,
            // OUTI OUTD OTIR OTDR
            0xA0..=0xA3 | 0xA8..=0xAB | 0xB0..=0xB3 | 0xB8..=0xBB => self.execute_block(bus, op),

            _ => {
                log::warn!(
                    "undefined opcode ED {op:02X} at {:04X}, treated as NOP",
                    self.regs.pc.wrapping_sub(2)
                );
                8
            }
        }
    }

    /// Run a block instruction. Repeating forms loop here until they
    /// terminate: 21 cycles per repeated iteration, 16 for the last.
    fn execute_block<B: IoBus>(&mut self, bus: &mut B, op: u8) -> u32 {
        let decrement = op & 0x08 != 0;
        let repeat = op & 0x10 != 0;
        let mut cycles = 0;
        loop {
            let again = match op & 3 {
                0 => self.block_ld(bus, decrement),
                1 => self.block_cp(bus, decrement),
                2 => self.block_in(bus, decrement),
                _ => self.block_out(bus, decrement),
            };
            if !(repeat && again) {
                return cycles + 16;
            }
            cycles += 21;
        }
    }

    fn step_hl(&mut self, decrement: bool) {
        let hl = self.regs.hl();
        self.regs.set_hl(if decrement { hl.wrapping_sub(1) } else { hl.wrapping_add(1) });
    }

    /// LDI/LDD. Returns true while BC is non-zero.
    fn block_ld<B: IoBus>(&mut self, bus: &mut B, decrement: bool) -> bool {
        let value = bus.read(self.regs.hl());
        bus.write(self.regs.de(), value);
        self.step_hl(decrement);
        let de = self.regs.de();
        self.regs.set_de(if decrement { de.wrapping_sub(1) } else { de.wrapping_add(1) });
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);
        self.regs.update_flags(HF | PF | NF, if bc != 0 { PF } else { 0 });
        bc != 0
    }

    /// CPI/CPD. Returns true while BC is non-zero and A has not matched.
    fn block_cp<B: IoBus>(&mut self, bus: &mut B, decrement: bool) -> bool {
        let value = bus.read(self.regs.hl());
        let result = alu::sub8(self.regs.a, value, false);
        self.step_hl(decrement);
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);
        let flags = (result.flags & (SF | ZF | HF)) | NF | if bc != 0 { PF } else { 0 };
        self.regs.update_flags(SF | ZF | HF | PF | NF, flags);
        bc != 0 && result.value != 0
    }

    /// INI/IND. The port is read with the counter still in B.
    fn block_in<B: IoBus>(&mut self, bus: &mut B, decrement: bool) -> bool {
        let value = bus.read_io(self.regs.bc());
        bus.write(self.regs.hl(), value);
        self.step_hl(decrement);
        self.regs.b = self.regs.b.wrapping_sub(1);
        self.regs.update_flags(ZF | NF, if self.regs.b == 0 { ZF | NF } else { NF });
        self.regs.b != 0
    }

    /// OUTI/OUTD. B is decremented before it reaches the address bus.
    fn block_out<B: IoBus>(&mut self, bus: &mut B, decrement: bool) -> bool {
        let value = bus.read(self.regs.hl());
        self.regs.b = self.regs.b.wrapping_sub(1);
        bus.write_io(self.regs.bc(), value);
        self.step_hl(decrement);
        self.regs.update_flags(ZF | NF, if self.regs.b == 0 { ZF | NF } else { NF });
        self.regs.b != 0
    }
}
