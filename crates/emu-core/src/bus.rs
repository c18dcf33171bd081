//! Memory and I/O bus interfaces.

/// A bus that supports memory read/write operations.
///
/// The CPU reaches memory exclusively through this trait. The bus handles
/// address decoding (banking, ROM protection, memory-mapped hooks).
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte to the given address.
    ///
    /// Writes that land on read-only memory are silently discarded.
    fn write(&mut self, address: u16, value: u8);

    /// Read a little-endian word (low byte at `address`).
    fn read_word(&mut self, address: u16) -> u16 {
        let lo = self.read(address);
        let hi = self.read(address.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    /// Write a little-endian word (low byte at `address`).
    fn write_word(&mut self, address: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write(address, lo);
        self.write(address.wrapping_add(1), hi);
    }
}

/// A bus that also supports separate I/O port operations.
///
/// The Z80 has a separate 16-bit I/O address space accessed via IN and OUT
/// instructions. The high byte of the port address carries whatever the
/// instruction put on the upper address lines (A, B or the high byte of the
/// block counter), which the Spectrum uses for keyboard half-row selection.
pub trait IoBus: Bus {
    /// Read a byte from the given I/O port.
    fn read_io(&mut self, port: u16) -> u8;

    /// Write a byte to the given I/O port.
    fn write_io(&mut self, port: u16, value: u8);
}
