//! CPU core trait.

use crate::IoBus;

/// A CPU that executes whole instructions.
///
/// The bus is passed in, not owned, so the machine keeps control of memory
/// and peripherals between steps (ROM traps, snapshot loading, display
/// reads).
pub trait Cpu<B: IoBus> {
    /// Execute one instruction (or accept one interrupt). Returns the clock
    /// cycles consumed. A CPU may split an instruction over several steps,
    /// as the Z80 does for prefix bytes.
    fn step(&mut self, bus: &mut B) -> u32;

    /// Reset the CPU to its power-on state.
    fn reset(&mut self);

    /// Raise the maskable interrupt request. It is sampled at the next
    /// instruction boundary.
    fn interrupt(&mut self);

    /// Raise a non-maskable interrupt request.
    fn nmi(&mut self);

    /// Current program counter.
    fn pc(&self) -> u16;

    /// True while the CPU is parked on a HALT instruction.
    fn is_halted(&self) -> bool;
}
