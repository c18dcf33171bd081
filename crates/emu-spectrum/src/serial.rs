//! Memory-mapped character I/O for custom ROMs.
//!
//! A ROM that carries `Z80SERIAL` at offset $3FE0 gets a simple serial port
//! in the top of its own address range:
//!
//! - read $3FFE: status, bit 0 = input byte waiting, bit 1 = ready to send
//! - read $3FFF: next input byte (0 when none)
//! - write $3FFF: send a byte

use std::collections::VecDeque;

/// ROM signature that enables the port.
pub const SERIAL_SIGNATURE: &[u8] = b"Z80SERIAL";
pub const SIGNATURE_OFFSET: usize = 0x3FE0;

pub const STATUS_ADDR: u16 = 0x3FFE;
pub const DATA_ADDR: u16 = 0x3FFF;

const STATUS_INPUT_READY: u8 = 0x01;
const STATUS_OUTPUT_READY: u8 = 0x02;

/// Whether a ROM page carries the serial signature.
#[must_use]
pub fn has_signature(rom_page: &[u8]) -> bool {
    rom_page
        .get(SIGNATURE_OFFSET..SIGNATURE_OFFSET + SERIAL_SIGNATURE.len())
        .is_some_and(|bytes| bytes == SERIAL_SIGNATURE)
}

#[derive(Debug, Default)]
pub struct SerialPort {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl SerialPort {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the running program to read.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    /// Drain everything the program has sent.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    #[must_use]
    pub fn status(&self) -> u8 {
        let input = if self.input.is_empty() { 0 } else { STATUS_INPUT_READY };
        input | STATUS_OUTPUT_READY
    }

    pub fn read_data(&mut self) -> u8 {
        self.input.pop_front().unwrap_or(0)
    }

    pub fn write_data(&mut self, value: u8) {
        self.output.push(value);
    }
}
