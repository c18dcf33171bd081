//! Core traits and types for instruction-stepped emulation.
//!
//! CPUs execute one instruction per `step()` and report how many clock
//! cycles it took. Machines accumulate those cycles to drive their timers.

mod bus;
mod clock;
mod cpu;
mod observable;
mod ticks;

pub use bus::{Bus, IoBus};
pub use clock::MasterClock;
pub use cpu::Cpu;
pub use observable::{Observable, Value};
pub use ticks::Ticks;
