//! Spectrum bus: memory and I/O routing.
//!
//! Memory accesses go through the banked memory, except for the serial
//! port addresses when a signature ROM is mapped. I/O decoding is partial,
//! as on the real machine:
//!
//! - even ports: ULA (keyboard in; border, MIC and beeper out)
//! - $7FFD (A15 and A1 low, so $7FFC too): 128K paging
//! - $FFFD / $BFFD: AY register select / data (128K only)
//! - $1F: Kempston joystick
//!
//! Anything else reads as $FF.

use emu_core::{Bus, IoBus};

use crate::keyboard::Keyboard;
use crate::memory::{BankedMemory, Page};
use crate::serial::{self, SerialPort};

/// AY register file latch. The chip itself is not emulated; the 128K ROM
/// and snapshots only need the registers to read back.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AyLatch {
    pub selected: u8,
    pub registers: [u8; 16],
}

impl AyLatch {
    pub fn select(&mut self, register: u8) {
        self.selected = register & 0x0F;
    }

    #[must_use]
    pub fn read(&self) -> u8 {
        self.registers[usize::from(self.selected)]
    }

    pub fn write(&mut self, value: u8) {
        self.registers[usize::from(self.selected)] = value;
    }
}

/// The Spectrum bus, implementing `emu_core::Bus` and `emu_core::IoBus`.
pub struct SpectrumBus {
    pub memory: BankedMemory,
    pub keyboard: Keyboard,
    /// Kempston state: bits 0-4 = right, left, down, up, fire (active high).
    pub kempston: u8,
    pub ay: AyLatch,
    /// Enabled when the loaded ROM carries the serial signature.
    pub serial: Option<SerialPort>,
    /// Last value written to the ULA port.
    last_fe_write: u8,
    border: u8,
}

impl SpectrumBus {
    #[must_use]
    pub fn new(memory: BankedMemory) -> Self {
        Self {
            memory,
            keyboard: Keyboard::new(),
            kempston: 0,
            ay: AyLatch::default(),
            serial: None,
            last_fe_write: 0,
            border: 0,
        }
    }

    /// Border colour (0-7) from the last ULA write.
    #[must_use]
    pub fn border(&self) -> u8 {
        self.border
    }

    pub fn set_border(&mut self, colour: u8) {
        self.border = colour & 0x07;
    }

    /// Beeper output level (bit 4 of the last ULA write).
    #[must_use]
    pub fn beeper(&self) -> bool {
        self.last_fe_write & 0x10 != 0
    }

    /// MIC output level (bit 3 of the last ULA write).
    #[must_use]
    pub fn mic(&self) -> bool {
        self.last_fe_write & 0x08 != 0
    }

    /// Re-check the ROM signature after a ROM load.
    pub fn detect_serial(&mut self) {
        let present = serial::has_signature(self.memory.rom_page(0));
        match (present, self.serial.is_some()) {
            (true, false) => {
                log::debug!("serial signature found, enabling serial port");
                self.serial = Some(SerialPort::new());
            }
            (false, true) => self.serial = None,
            _ => {}
        }
    }

    fn serial_mapped(&self, addr: u16) -> bool {
        (addr == serial::STATUS_ADDR || addr == serial::DATA_ADDR)
            && self.serial.is_some()
            && self.memory.window(0) == Page::Rom(0)
    }
}

impl Bus for SpectrumBus {
    fn read(&mut self, address: u16) -> u8 {
        if self.serial_mapped(address)
            && let Some(port) = self.serial.as_mut()
        {
            return if address == serial::STATUS_ADDR {
                port.status()
            } else {
                port.read_data()
            };
        }
        self.memory.read8(address)
    }

    fn write(&mut self, address: u16, value: u8) {
        if address == serial::DATA_ADDR
            && self.serial_mapped(address)
            && let Some(port) = self.serial.as_mut()
        {
            port.write_data(value);
            return;
        }
        self.memory.write8(address, value);
    }
}

impl IoBus for SpectrumBus {
    fn read_io(&mut self, port: u16) -> u8 {
        if port & 0x0001 == 0 {
            let keys = self.keyboard.scan((port >> 8) as u8) & 0x1F;
            // No tape signal: EAR follows the MIC output.
            let ear = (self.last_fe_write & 0x08) << 3;
            return keys | 0xA0 | ear;
        }
        if port & 0x00FF == 0x1F {
            return self.kempston;
        }
        if self.memory.paging_enabled() && port & 0xC002 == 0xC000 {
            return self.ay.read();
        }
        0xFF
    }

    fn write_io(&mut self, port: u16, value: u8) {
        // Each device decodes its own address lines, so one write can reach
        // more than one of them.
        if port & 0x0001 == 0 {
            self.last_fe_write = value;
            self.border = value & 0x07;
        }
        if port & 0x8002 == 0x0000 {
            self.memory.write_paging(value);
        }
        if self.memory.paging_enabled() {
            match port & 0xC002 {
                0xC000 => self.ay.select(value),
                0x8000 => self.ay.write(value),
                _ => {}
            }
        }
    }
}
