//! Shared test harness: flat 64 KB RAM with scripted I/O ports.

#![allow(dead_code)]

use std::collections::HashMap;

use emu_core::{Bus, IoBus};
use zilog_z80::{Prefix, Z80};

pub struct TestBus {
    pub memory: Vec<u8>,
    /// Values returned by IN, keyed by full 16-bit port.
    pub io_read_values: HashMap<u16, u8>,
    /// Every OUT, in order.
    pub io_writes: Vec<(u16, u8)>,
}

impl TestBus {
    pub fn new() -> Self {
        Self {
            memory: vec![0; 0x10000],
            io_read_values: HashMap::new(),
            io_writes: Vec::new(),
        }
    }

    pub fn load(&mut self, addr: u16, bytes: &[u8]) {
        let start = usize::from(addr);
        self.memory[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn peek(&self, addr: u16) -> u8 {
        self.memory[usize::from(addr)]
    }
}

impl Bus for TestBus {
    fn read(&mut self, address: u16) -> u8 {
        self.memory[usize::from(address)]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory[usize::from(address)] = value;
    }
}

impl IoBus for TestBus {
    fn read_io(&mut self, port: u16) -> u8 {
        self.io_read_values.get(&port).copied().unwrap_or(0xFF)
    }

    fn write_io(&mut self, port: u16, value: u8) {
        self.io_writes.push((port, value));
    }
}

/// A fresh CPU and a bus with `code` loaded at 0x0000. SP starts at 0xFFF0.
pub fn setup(code: &[u8]) -> (Z80, TestBus) {
    let mut bus = TestBus::new();
    bus.load(0, code);
    let mut cpu = Z80::new();
    cpu.regs_mut().sp = 0xFFF0;
    (cpu, bus)
}

/// Step until the instruction at PC, prefixes included, has executed.
/// Returns its total cycles.
pub fn run_instruction(cpu: &mut Z80, bus: &mut TestBus) -> u32 {
    let mut cycles = cpu.step(bus);
    while cpu.prefix() != Prefix::None {
        cycles += cpu.step(bus);
    }
    cycles
}
