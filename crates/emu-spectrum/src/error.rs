//! Loader errors for ROM images and snapshots.

use std::fmt;

use crate::memory::PAGE_SIZE;

#[derive(Debug, PartialEq, Eq)]
pub enum MachineError {
    /// ROM image is neither 16K (48K machine) nor 32K (128K machine).
    InvalidRomSize(usize),
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRomSize(size) => write!(
                f,
                "invalid ROM size: {} bytes (expected {} for 48K or {} for 128K)",
                size,
                PAGE_SIZE,
                2 * PAGE_SIZE,
            ),
        }
    }
}

impl std::error::Error for MachineError {}

#[derive(Debug, PartialEq, Eq)]
pub enum SnapshotError {
    /// Fewer bytes than the header needs.
    Truncated { needed: usize, got: usize },
    /// A memory block runs past the end of the file.
    BadBlock { page: u8 },
    /// Hardware mode this machine cannot run.
    UnsupportedHardware(u8),
    /// Snapshot needs a 128K machine but only the 48K ROM is loaded.
    ModelMismatch,
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { needed, got } => {
                write!(f, "snapshot too short: need {needed} bytes, got {got}")
            }
            Self::BadBlock { page } => write!(f, "snapshot memory block for page {page} is truncated"),
            Self::UnsupportedHardware(mode) => write!(f, "unsupported snapshot hardware mode {mode}"),
            Self::ModelMismatch => write!(f, "128K snapshot needs a 128K ROM"),
        }
    }
}

impl std::error::Error for SnapshotError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rom_size_message_names_both_sizes() {
        let msg = MachineError::InvalidRomSize(100).to_string();
        assert!(msg.contains("100"));
        assert!(msg.contains("16384"));
        assert!(msg.contains("32768"));
    }

    #[test]
    fn truncated_message() {
        let msg = SnapshotError::Truncated { needed: 30, got: 10 }.to_string();
        assert_eq!(msg, "snapshot too short: need 30 bytes, got 10");
    }
}
