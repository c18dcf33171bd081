//! Unprefixed instruction execution.
//!
//! Under a DD/FD prefix the same handlers run with HL redirected to IX/IY
//! (and H/L to the index halves). The prefix byte's 4 cycles belong to the
//! step that fetched it, so each arm returns the unprefixed cost plus any
//! displacement overhead.

#![allow(clippy::cast_possible_wrap)] // Displacement bytes are signed.

use emu_core::IoBus;

use crate::alu;
use crate::flags::{CF, DOCUMENTED, HF, NF};

use super::{Prefix, Z80};

impl Z80 {
    /// Execute an opcode from the base table. Returns cycles.
    pub(super) fn execute_unprefixed<B: IoBus>(&mut self, bus: &mut B, op: u8) -> u32 {
        match op {
            // NOP
            0x00 => 4,

            // LD rr, nn (01=BC, 11=DE, 21=HL, 31=SP)
            0x01 | 0x11 | 0x21 | 0x31 => {
                let value = self.fetch16(bus);
                self.set_reg16(op >> 4, value);
                10
            }

            // LD (BC), A
            0x02 => {
                bus.write(self.regs.bc(), self.regs.a);
                7
            }

            // LD (DE), A
            0x12 => {
                bus.write(self.regs.de(), self.regs.a);
                7
            }

            // INC rr
            0x03 | 0x13 | 0x23 | 0x33 => {
                let rp = op >> 4;
                self.set_reg16(rp, self.get_reg16(rp).wrapping_add(1));
                6
            }

            // DEC rr
            0x0B | 0x1B | 0x2B | 0x3B => {
                let rp = op >> 4;
                self.set_reg16(rp, self.get_reg16(rp).wrapping_sub(1));
                6
            }

            // INC r
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x3C => {
                let r = (op >> 3) & 7;
                let result = alu::inc8(self.get_reg8(r));
                self.set_reg8(r, result.value);
                self.regs.update_flags(DOCUMENTED & !CF, result.flags);
                4
            }

            // DEC r
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x3D => {
                let r = (op >> 3) & 7;
                let result = alu::dec8(self.get_reg8(r));
                self.set_reg8(r, result.value);
                self.regs.update_flags(DOCUMENTED & !CF, result.flags);
                4
            }

            // INC (HL) / INC (IX+d)
            0x34 => {
                let addr = self.mem_operand_addr(bus);
                let result = alu::inc8(bus.read(addr));
                bus.write(addr, result.value);
                self.regs.update_flags(DOCUMENTED & !CF, result.flags);
                11 + self.displacement_cycles()
            }

            // DEC (HL) / DEC (IX+d)
            0x35 => {
                let addr = self.mem_operand_addr(bus);
                let result = alu::dec8(bus.read(addr));
                bus.write(addr, result.value);
                self.regs.update_flags(DOCUMENTED & !CF, result.flags);
                11 + self.displacement_cycles()
            }

            // LD r, n
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x3E => {
                let value = self.fetch8(bus);
                self.set_reg8((op >> 3) & 7, value);
                7
            }

            // LD (HL), n / LD (IX+d), n: displacement comes before the immediate.
            0x36 => {
                let addr = self.mem_operand_addr(bus);
                let value = self.fetch8(bus);
                bus.write(addr, value);
                if self.prefix == Prefix::None { 10 } else { 15 }
            }

            // RLCA, RRCA, RLA, RRA
            0x07 | 0x0F | 0x17 | 0x1F => {
                let result = alu::rotate_accumulator(op >> 3, self.regs.a, self.regs.flag(CF));
                self.regs.a = result.value;
                self.regs.update_flags(HF | NF | CF, result.flags);
                4
            }

            // EX AF, AF'
            0x08 => {
                std::mem::swap(&mut self.regs.a, &mut self.regs.a_alt);
                std::mem::swap(&mut self.regs.f, &mut self.regs.f_alt);
                4
            }

            // ADD HL, rr / ADD IX, rr
            0x09 | 0x19 | 0x29 | 0x39 => {
                let (value, flags) = alu::add16(self.hl_or_index(), self.get_reg16(op >> 4));
                self.set_hl_or_index(value);
                self.regs.update_flags(HF | NF | CF, flags);
                11
            }

            // LD A, (BC)
            0x0A => {
                self.regs.a = bus.read(self.regs.bc());
                7
            }

            // LD A, (DE)
            0x1A => {
                self.regs.a = bus.read(self.regs.de());
                7
            }

            // DJNZ e
            0x10 => {
                let offset = self.fetch8(bus) as i8;
                self.regs.b = self.regs.b.wrapping_sub(1);
                if self.regs.b != 0 {
                    self.relative_jump(offset);
                    13
                } else {
                    8
                }
            }

            // JR e
            0x18 => {
                let offset = self.fetch8(bus) as i8;
                self.relative_jump(offset);
                12
            }

            // JR cc, e (NZ, Z, NC, C)
            0x20 | 0x28 | 0x30 | 0x38 => {
                let offset = self.fetch8(bus) as i8;
                if self.condition((op >> 3) & 3) {
                    self.relative_jump(offset);
                    12
                } else {
                    7
                }
            }

            // LD (nn), HL
            0x22 => {
                let addr = self.fetch16(bus);
                bus.write_word(addr, self.hl_or_index());
                16
            }

            // LD HL, (nn)
            0x2A => {
                let addr = self.fetch16(bus);
                let value = bus.read_word(addr);
                self.set_hl_or_index(value);
                16
            }

            // DAA
            0x27 => {
                let result = alu::daa(self.regs.a, self.regs.f);
                self.regs.a = result.value;
                self.regs.update_flags(DOCUMENTED, result.flags);
                4
            }

            // CPL
            0x2F => {
                self.regs.a = !self.regs.a;
                self.regs.update_flags(HF | NF, HF | NF);
                4
            }

            // LD (nn), A
            0x32 => {
                let addr = self.fetch16(bus);
                bus.write(addr, self.regs.a);
                13
            }

            // LD A, (nn)
            0x3A => {
                let addr = self.fetch16(bus);
                self.regs.a = bus.read(addr);
                13
            }

            // SCF
            0x37 => {
                self.regs.update_flags(HF | NF | CF, CF);
                4
            }

            // CCF: H takes the old carry.
            0x3F => {
                let flags = if self.regs.flag(CF) { HF } else { CF };
                self.regs.update_flags(HF | NF | CF, flags);
                4
            }

            // HALT: PC stays on the opcode until an interrupt moves it on.
            0x76 => {
                self.regs.halted = true;
                self.regs.pc = self.regs.pc.wrapping_sub(1);
                4
            }

            // LD r, r' / LD r, (HL) / LD (HL), r
            0x40..=0x7F => {
                let dst = (op >> 3) & 7;
                let src = op & 7;
                if src == 6 {
                    let addr = self.mem_operand_addr(bus);
                    let value = bus.read(addr);
                    self.set_reg8_plain(dst, value);
                    7 + self.displacement_cycles()
                } else if dst == 6 {
                    let addr = self.mem_operand_addr(bus);
                    bus.write(addr, self.get_reg8_plain(src));
                    7 + self.displacement_cycles()
                } else {
                    let value = self.get_reg8(src);
                    self.set_reg8(dst, value);
                    4
                }
            }

            // ADD/ADC/SUB/SBC/AND/XOR/OR/CP A, r
            0x80..=0xBF => {
                let src = op & 7;
                let (value, cycles) = if src == 6 {
                    let addr = self.mem_operand_addr(bus);
                    (bus.read(addr), 7 + self.displacement_cycles())
                } else {
                    (self.get_reg8(src), 4)
                };
                self.alu_op(op >> 3, value);
                cycles
            }

            // RET cc
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                if self.condition(op >> 3) {
                    self.regs.pc = self.pop(bus);
                    11
                } else {
                    5
                }
            }

            // POP rr (C1=BC, D1=DE, E1=HL, F1=AF)
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let value = self.pop(bus);
                self.set_reg16_af(op >> 4, value);
                10
            }

            // JP cc, nn
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                let addr = self.fetch16(bus);
                if self.condition(op >> 3) {
                    self.regs.pc = addr;
                }
                10
            }

            // JP nn
            0xC3 => {
                self.regs.pc = self.fetch16(bus);
                10
            }

            // CALL cc, nn
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                let addr = self.fetch16(bus);
                if self.condition(op >> 3) {
                    self.call(bus, addr);
                    17
                } else {
                    10
                }
            }

            // PUSH rr (C5=BC, D5=DE, E5=HL, F5=AF)
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                let value = self.get_reg16_af(op >> 4);
                self.push(bus, value);
                11
            }

            // ADD/ADC/SUB/SBC/AND/XOR/OR/CP A, n
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let value = self.fetch8(bus);
                self.alu_op(op >> 3, value);
                7
            }

            // RST p
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.call(bus, u16::from(op & 0x38));
                11
            }

            // RET
            0xC9 => {
                self.regs.pc = self.pop(bus);
                10
            }

            // CALL nn
            0xCD => {
                let addr = self.fetch16(bus);
                self.call(bus, addr);
                17
            }

            // OUT (n), A: A drives the upper address lines.
            0xD3 => {
                let port = u16::from_be_bytes([self.regs.a, self.fetch8(bus)]);
                bus.write_io(port, self.regs.a);
                11
            }

            // IN A, (n): no flags affected.
            0xDB => {
                let port = u16::from_be_bytes([self.regs.a, self.fetch8(bus)]);
                self.regs.a = bus.read_io(port);
                11
            }

            // EXX
            0xD9 => {
                let regs = &mut self.regs;
                std::mem::swap(&mut regs.b, &mut regs.b_alt);
                std::mem::swap(&mut regs.c, &mut regs.c_alt);
                std::mem::swap(&mut regs.d, &mut regs.d_alt);
                std::mem::swap(&mut regs.e, &mut regs.e_alt);
                std::mem::swap(&mut regs.h, &mut regs.h_alt);
                std::mem::swap(&mut regs.l, &mut regs.l_alt);
                4
            }

            // EX (SP), HL / EX (SP), IX
            0xE3 => {
                let sp = self.regs.sp;
                let stacked = bus.read_word(sp);
                bus.write_word(sp, self.hl_or_index());
                self.set_hl_or_index(stacked);
                19
            }

            // JP (HL) / JP (IX)
            0xE9 => {
                self.regs.pc = self.hl_or_index();
                4
            }

            // EX DE, HL: never redirected by a prefix.
            0xEB => {
                let regs = &mut self.regs;
                std::mem::swap(&mut regs.d, &mut regs.h);
                std::mem::swap(&mut regs.e, &mut regs.l);
                4
            }

            // DI
            0xF3 => {
                self.regs.iff1 = false;
                4
            }

            // EI
            0xFB => {
                self.regs.iff1 = true;
                4
            }

            // LD SP, HL / LD SP, IX
            0xF9 => {
                self.regs.sp = self.hl_or_index();
                6
            }

            // CB, DD, ED and FD are routed by the dispatch loop.
            0xCB | 0xDD | 0xED | 0xFD => 4,
        }
    }

    /// The eight accumulator operations, selected by bits 3-5 of the opcode.
    fn alu_op(&mut self, op: u8, value: u8) {
        let a = self.regs.a;
        let carry = self.regs.flag(CF);
        let result = match op & 7 {
            0 => alu::add8(a, value, false),
            1 => alu::add8(a, value, carry),
            2 => alu::sub8(a, value, false),
            3 => alu::sub8(a, value, carry),
            4 => alu::and8(a, value),
            5 => alu::xor8(a, value),
            6 => alu::or8(a, value),
            _ => alu::sub8(a, value, false),
        };
        // CP only sets flags.
        if op & 7 != 7 {
            self.regs.a = result.value;
        }
        self.regs.update_flags(DOCUMENTED, result.flags);
    }

    fn relative_jump(&mut self, offset: i8) {
        self.regs.pc = self.regs.pc.wrapping_add_signed(i16::from(offset));
    }

    fn call<B: IoBus>(&mut self, bus: &mut B, addr: u16) {
        self.push(bus, self.regs.pc);
        self.regs.pc = addr;
    }
}
