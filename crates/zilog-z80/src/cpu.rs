//! Z80 CPU core with per-instruction execution.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.
#![allow(clippy::cast_possible_wrap)] // Intentional i8 casts for displacements.

mod execute;
mod execute_cb;
mod execute_ed;

use emu_core::{Cpu, IoBus, Observable, Ticks, Value};

use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
use crate::registers::Registers;
use crate::trace::{Fetched, TraceEvent};

/// Which index register, if any, replaces HL for the opcode being decoded.
///
/// Set by a DD or FD byte. It applies to exactly one following opcode and
/// is reset once that opcode has executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Prefix {
    #[default]
    None,
    Ix,
    Iy,
}

type TraceHook = Box<dyn FnMut(&TraceEvent)>;

/// Z80 CPU.
///
/// The CPU does not own the bus. The machine passes it to `step()` for each
/// instruction so it can inspect and patch memory between steps.
pub struct Z80 {
    regs: Registers,
    prefix: Prefix,
    /// Maskable interrupt request. Survives until accepted.
    int_pending: bool,
    nmi_pending: bool,
    /// Bytes fetched by the current instruction, for tracing.
    fetched: Fetched,
    /// Address of the current instruction's first byte, prefixes included.
    insn_start: u16,
    /// Cycles spent on prefix bytes of the current instruction.
    prefix_cycles: u32,
    total_ticks: Ticks,
    trace: Option<TraceHook>,
}

impl Z80 {
    /// Create a new Z80 in its power-on state.
    #[must_use]
    pub fn new() -> Self {
        let mut cpu = Self {
            regs: Registers::default(),
            prefix: Prefix::None,
            int_pending: false,
            nmi_pending: false,
            fetched: Fetched::default(),
            insn_start: 0,
            prefix_cycles: 0,
            total_ticks: Ticks::ZERO,
            trace: None,
        };
        cpu.power_on();
        cpu
    }

    fn power_on(&mut self) {
        // All registers zeroed, PC at 0x0000, IM 0, interrupts disabled.
        self.regs = Registers::default();
        self.prefix = Prefix::None;
        self.int_pending = false;
        self.nmi_pending = false;
    }

    #[must_use]
    pub const fn regs(&self) -> &Registers {
        &self.regs
    }

    /// Mutable register access for loaders, traps and tests.
    pub fn regs_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    #[must_use]
    pub const fn prefix(&self) -> Prefix {
        self.prefix
    }

    #[must_use]
    pub const fn int_pending(&self) -> bool {
        self.int_pending
    }

    /// Total cycles executed since creation.
    #[must_use]
    pub const fn total_ticks(&self) -> Ticks {
        self.total_ticks
    }

    /// Install a callback that receives every executed instruction.
    ///
    /// With no callback installed, instructions are reported through
    /// `log::trace!` when that level is enabled.
    pub fn set_trace(&mut self, hook: Option<TraceHook>) {
        self.trace = hook;
    }

    /// Reset to the power-on state. Pending requests are dropped.
    pub fn reset(&mut self) {
        self.power_on();
    }

    /// Raise the maskable interrupt request.
    pub fn interrupt(&mut self) {
        self.int_pending = true;
    }

    /// Raise a non-maskable interrupt request.
    pub fn nmi(&mut self) {
        self.nmi_pending = true;
    }

    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.regs.pc
    }

    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.regs.halted
    }

    /// Pop the return address into PC, as a RET would.
    pub fn force_ret<B: IoBus>(&mut self, bus: &mut B) {
        self.regs.pc = self.pop(bus);
    }

    /// Execute one opcode or accept one pending interrupt.
    ///
    /// A DD or FD byte is a step of its own: it costs 4 cycles and leaves
    /// `prefix()` set for the opcode fetched by the next step. Interrupts
    /// are not accepted while a prefix is pending.
    pub fn step<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        let cycles = self.step_inner(bus);
        self.total_ticks += Ticks::from(cycles);
        cycles
    }

    fn step_inner<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        // Interrupts are only sampled at an instruction boundary.
        if self.prefix == Prefix::None {
            if self.nmi_pending {
                return self.accept_nmi(bus);
            }
            if self.int_pending && self.regs.iff1 {
                return self.accept_interrupt(bus);
            }
        }

        let op_pc = self.regs.pc;
        if self.prefix == Prefix::None {
            self.insn_start = op_pc;
            self.prefix_cycles = 0;
            self.fetched.clear();
        }

        let op = self.fetch_opcode(bus);
        if op == 0xDD || op == 0xFD {
            // DD DD / DD FD chains: only the last prefix counts.
            if self.prefix != Prefix::None {
                self.insn_start = op_pc;
                self.fetched.restart(op);
            }
            self.prefix = if op == 0xDD { Prefix::Ix } else { Prefix::Iy };
            self.prefix_cycles += 4;
            return 4;
        }

        let cycles = match op {
            0xCB => self.execute_cb(bus),
            0xED => self.execute_ed(bus),
            _ => self.execute_unprefixed(bus, op),
        };
        self.prefix = Prefix::None;

        self.report(self.insn_start, self.prefix_cycles + cycles);
        cycles
    }

    fn report(&mut self, pc: u16, cycles: u32) {
        if let Some(hook) = self.trace.as_mut() {
            hook(&TraceEvent::new(pc, self.fetched.bytes(), cycles));
        } else if log::log_enabled!(log::Level::Trace) {
            log::trace!("{}", TraceEvent::new(pc, self.fetched.bytes(), cycles));
        }
    }

    // =========================================================================
    // Interrupt acceptance
    // =========================================================================

    /// Leave a HALT before the return address is pushed, so the RETI/RET
    /// returns past it.
    fn leave_halt<B: IoBus>(&mut self, bus: &mut B) {
        if bus.read(self.regs.pc) == 0x76 {
            self.regs.pc = self.regs.pc.wrapping_add(1);
        }
        self.regs.halted = false;
    }

    fn accept_interrupt<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        self.int_pending = false;
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.regs.bump_r();
        self.leave_halt(bus);
        self.push(bus, self.regs.pc);

        if self.regs.im == 2 {
            let vector = u16::from(self.regs.i) << 8;
            self.regs.pc = bus.read_word(vector);
            log::trace!("IM 2 interrupt via {vector:#06X} to {:#06X}", self.regs.pc);
            19
        } else {
            self.regs.pc = 0x0038;
            13
        }
    }

    fn accept_nmi<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        self.nmi_pending = false;
        self.regs.iff1 = false;
        self.regs.bump_r();
        self.leave_halt(bus);
        self.push(bus, self.regs.pc);
        self.regs.pc = 0x0066;
        11
    }

    // =========================================================================
    // Fetch and stack helpers
    // =========================================================================

    /// M1 fetch: bumps R.
    fn fetch_opcode<B: IoBus>(&mut self, bus: &mut B) -> u8 {
        self.regs.bump_r();
        self.fetch8(bus)
    }

    fn fetch8<B: IoBus>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.fetched.push(value);
        value
    }

    fn fetch16<B: IoBus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch8(bus);
        let hi = self.fetch8(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn push<B: IoBus>(&mut self, bus: &mut B, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, lo);
    }

    fn pop<B: IoBus>(&mut self, bus: &mut B) -> u16 {
        let lo = bus.read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = bus.read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }

    // =========================================================================
    // Register helpers
    // =========================================================================

    /// 8-bit register by its 3-bit encoding (B C D E H L - A). H and L
    /// become the index register halves under a DD/FD prefix.
    fn get_reg8(&self, r: u8) -> u8 {
        match (r, self.prefix) {
            (4, Prefix::Ix) => self.regs.ixh(),
            (5, Prefix::Ix) => self.regs.ixl(),
            (4, Prefix::Iy) => self.regs.iyh(),
            (5, Prefix::Iy) => self.regs.iyl(),
            _ => self.get_reg8_plain(r),
        }
    }

    fn set_reg8(&mut self, r: u8, value: u8) {
        match (r, self.prefix) {
            (4, Prefix::Ix) => self.regs.set_ixh(value),
            (5, Prefix::Ix) => self.regs.set_ixl(value),
            (4, Prefix::Iy) => self.regs.set_iyh(value),
            (5, Prefix::Iy) => self.regs.set_iyl(value),
            _ => self.set_reg8_plain(r, value),
        }
    }

    /// 8-bit register ignoring any prefix. Used alongside an (IX+d) operand,
    /// where H and L keep their usual meaning.
    fn get_reg8_plain(&self, r: u8) -> u8 {
        match r & 7 {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            7 => self.regs.a,
            _ => 0xFF,
        }
    }

    fn set_reg8_plain(&mut self, r: u8, value: u8) {
        match r & 7 {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            7 => self.regs.a = value,
            _ => {}
        }
    }

    /// HL, or IX/IY under a prefix.
    fn hl_or_index(&self) -> u16 {
        match self.prefix {
            Prefix::None => self.regs.hl(),
            Prefix::Ix => self.regs.ix,
            Prefix::Iy => self.regs.iy,
        }
    }

    fn set_hl_or_index(&mut self, value: u16) {
        match self.prefix {
            Prefix::None => self.regs.set_hl(value),
            Prefix::Ix => self.regs.ix = value,
            Prefix::Iy => self.regs.iy = value,
        }
    }

    /// Register pair by 2-bit encoding: BC, DE, HL/IX/IY, SP.
    fn get_reg16(&self, rp: u8) -> u16 {
        match rp & 3 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.hl_or_index(),
            _ => self.regs.sp,
        }
    }

    fn set_reg16(&mut self, rp: u8, value: u16) {
        match rp & 3 {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.set_hl_or_index(value),
            _ => self.regs.sp = value,
        }
    }

    /// Register pair for PUSH/POP: BC, DE, HL/IX/IY, AF.
    fn get_reg16_af(&self, rp: u8) -> u16 {
        if rp & 3 == 3 {
            self.regs.af()
        } else {
            self.get_reg16(rp)
        }
    }

    fn set_reg16_af(&mut self, rp: u8, value: u16) {
        if rp & 3 == 3 {
            self.regs.set_af(value);
        } else {
            self.set_reg16(rp, value);
        }
    }

    /// Address of the memory operand: (HL), or (IX+d)/(IY+d) with the
    /// displacement fetched from the instruction stream.
    fn mem_operand_addr<B: IoBus>(&mut self, bus: &mut B) -> u16 {
        match self.prefix {
            Prefix::None => self.regs.hl(),
            Prefix::Ix | Prefix::Iy => {
                let d = self.fetch8(bus) as i8;
                self.hl_or_index().wrapping_add_signed(i16::from(d))
            }
        }
    }

    /// Extra cycles an (IX+d) operand costs over (HL), not counting the
    /// prefix byte itself.
    const fn displacement_cycles(&self) -> u32 {
        match self.prefix {
            Prefix::None => 0,
            Prefix::Ix | Prefix::Iy => 8,
        }
    }

    /// Condition codes: NZ Z NC C PO PE P M.
    fn condition(&self, cc: u8) -> bool {
        match cc & 7 {
            0 => !self.regs.flag(ZF),
            1 => self.regs.flag(ZF),
            2 => !self.regs.flag(CF),
            3 => self.regs.flag(CF),
            4 => !self.regs.flag(PF),
            5 => self.regs.flag(PF),
            6 => !self.regs.flag(SF),
            _ => self.regs.flag(SF),
        }
    }
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: IoBus> Cpu<B> for Z80 {
    fn step(&mut self, bus: &mut B) -> u32 {
        Z80::step(self, bus)
    }

    fn reset(&mut self) {
        Z80::reset(self);
    }

    fn interrupt(&mut self) {
        Z80::interrupt(self);
    }

    fn nmi(&mut self) {
        Z80::nmi(self);
    }

    fn pc(&self) -> u16 {
        Z80::pc(self)
    }

    fn is_halted(&self) -> bool {
        Z80::is_halted(self)
    }
}

/// All query paths supported by the Z80.
#[rustfmt::skip]
const Z80_QUERY_PATHS: &[&str] = &[
    "a", "f", "b", "c", "d", "e", "h", "l",
    "af", "bc", "de", "hl",
    "af'", "bc'", "de'", "hl'",
    "ix", "iy", "ixh", "ixl", "iyh", "iyl",
    "sp", "pc", "i", "r",
    "flags.s", "flags.z", "flags.y", "flags.h",
    "flags.x", "flags.p", "flags.n", "flags.c",
    "iff1", "iff2", "im", "halted",
    "int_pending", "ticks",
];

impl Observable for Z80 {
    fn query(&self, path: &str) -> Option<Value> {
        let r = &self.regs;
        let value: Value = match path {
            "a" => r.a.into(),
            "f" => r.f.into(),
            "b" => r.b.into(),
            "c" => r.c.into(),
            "d" => r.d.into(),
            "e" => r.e.into(),
            "h" => r.h.into(),
            "l" => r.l.into(),

            "af" => r.af().into(),
            "bc" => r.bc().into(),
            "de" => r.de().into(),
            "hl" => r.hl().into(),
            "af'" => r.af_alt().into(),
            "bc'" => r.bc_alt().into(),
            "de'" => r.de_alt().into(),
            "hl'" => r.hl_alt().into(),

            "ix" => r.ix.into(),
            "iy" => r.iy.into(),
            "ixh" => r.ixh().into(),
            "ixl" => r.ixl().into(),
            "iyh" => r.iyh().into(),
            "iyl" => r.iyl().into(),

            "sp" => r.sp.into(),
            "pc" => r.pc.into(),
            "i" => r.i.into(),
            "r" => r.r.into(),

            "flags.s" => r.flag(SF).into(),
            "flags.z" => r.flag(ZF).into(),
            "flags.y" => r.flag(YF).into(),
            "flags.h" => r.flag(HF).into(),
            "flags.x" => r.flag(XF).into(),
            "flags.p" => r.flag(PF).into(),
            "flags.n" => r.flag(NF).into(),
            "flags.c" => r.flag(CF).into(),

            "iff1" => r.iff1.into(),
            "iff2" => r.iff2.into(),
            "im" => r.im.into(),
            "halted" => r.halted.into(),
            "int_pending" => self.int_pending.into(),
            "ticks" => self.total_ticks.get().into(),

            _ => return None,
        };
        Some(value)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        Z80_QUERY_PATHS
    }
}
