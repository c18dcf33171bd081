//! Instruction-stepped Zilog Z80 CPU emulator.
//!
//! Each call to `step()` executes one whole instruction (prefix bytes
//! included) and returns the documented clock-cycle cost. Repeating block
//! instructions run to completion inside a single step.

pub mod alu;
mod cpu;
mod disasm;
mod flags;
mod registers;
mod trace;

pub use cpu::{Prefix, Z80};
pub use disasm::disassemble;
pub use flags::{CF, DOCUMENTED, HF, NF, PF, SF, XF, YF, ZF, parity};
pub use registers::Registers;
pub use trace::TraceEvent;
