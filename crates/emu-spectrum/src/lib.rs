//! ZX Spectrum 48K/128K emulator.
//!
//! The Z80 is stepped one instruction at a time against a banked memory
//! and a partially decoded I/O space. A cycle-driven scheduler raises the
//! 50 Hz interrupt and paces the machine to wall-clock speed. Tape access
//! goes through traps on the ROM's own load/save routines.

mod bus;
mod config;
mod error;
mod keyboard;
mod memory;
mod scheduler;
mod serial;
pub mod snapshot;
mod spectrum;
pub mod tape;

pub use bus::{AyLatch, SpectrumBus};
pub use config::{CPU_CLOCK, DEFAULT_CYCLES_PER_TICK, SpectrumConfig, SpectrumModel};
pub use error::{MachineError, SnapshotError};
pub use keyboard::{Key, Keyboard};
pub use memory::{BankedMemory, PAGE_SIZE, Page};
pub use scheduler::Scheduler;
pub use serial::SerialPort;
pub use snapshot::Snapshot;
pub use spectrum::{LOAD_TRAP_ADDR, SAVE_TRAP_ADDR, Spectrum};
pub use tape::{DirTape, TapeBlock, TapeDeck, TapeDevice};
