//! Structured per-instruction trace records.

use std::fmt;

use crate::disasm::disassemble;

/// Longest Z80 instruction once redundant prefixes are dropped.
const MAX_INSTRUCTION_LEN: usize = 4;

/// Bytes fetched by the instruction currently executing.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Fetched {
    bytes: [u8; MAX_INSTRUCTION_LEN],
    len: usize,
}

impl Fetched {
    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }

    /// Start over from a superseding prefix byte.
    pub(crate) fn restart(&mut self, prefix: u8) {
        self.bytes[0] = prefix;
        self.len = 1;
    }

    pub(crate) fn push(&mut self, byte: u8) {
        if self.len < MAX_INSTRUCTION_LEN {
            self.bytes[self.len] = byte;
            self.len += 1;
        }
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// One executed instruction, handed to the trace callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// Address of the first byte (including prefixes).
    pub pc: u16,
    /// Raw instruction bytes.
    pub bytes: Vec<u8>,
    /// Decoded mnemonic with operands, e.g. `LD (IX+5),A`.
    pub mnemonic: String,
    /// Clock cycles the instruction took.
    pub cycles: u32,
}

impl TraceEvent {
    pub(crate) fn new(pc: u16, bytes: &[u8], cycles: u32) -> Self {
        Self {
            pc,
            bytes: bytes.to_vec(),
            mnemonic: disassemble(bytes),
            cycles,
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}  ", self.pc)?;
        for i in 0..MAX_INSTRUCTION_LEN {
            match self.bytes.get(i) {
                Some(b) => write!(f, "{b:02X} ")?,
                None => f.write_str("   ")?,
            }
        }
        write!(f, " {:<16} ; {}", self.mnemonic, self.cycles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetched_caps_at_four_bytes() {
        let mut f = Fetched::default();
        for b in [0xDD, 0x36, 0x05, 0x42, 0x99] {
            f.push(b);
        }
        assert_eq!(f.bytes(), &[0xDD, 0x36, 0x05, 0x42]);
        f.restart(0xFD);
        assert_eq!(f.bytes(), &[0xFD]);
    }

    #[test]
    fn display_lines_up_columns() {
        let event = TraceEvent::new(0x8000, &[0x3E, 0x42], 7);
        let line = event.to_string();
        assert!(line.starts_with("8000  3E 42       "));
        assert!(line.contains(" LD A,$42 "));
        assert!(line.ends_with("; 7"));
    }
}
