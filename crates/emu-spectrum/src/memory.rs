//! Banked Spectrum memory.
//!
//! The 64K address space is four 16K windows. Each window points at one of
//! two ROM pages or one of eight RAM pages.
//!
//! | Window | Address       | 48K   | 128K (power-on)       |
//! |--------|---------------|-------|-----------------------|
//! | 0      | $0000-$3FFF   | ROM 0 | ROM 0 (bit 4 of $7FFD) |
//! | 1      | $4000-$7FFF   | RAM 5 | RAM 5                 |
//! | 2      | $8000-$BFFF   | RAM 2 | RAM 2                 |
//! | 3      | $C000-$FFFF   | RAM 0 | RAM 0 (bits 0-2)      |
//!
//! In 48K mode the layout never changes. The ULA always renders from RAM 5,
//! or from RAM 7 when bit 3 of $7FFD selects the shadow screen, regardless
//! of what the CPU sees at $4000.

#![allow(clippy::cast_possible_truncation)]

use crate::error::MachineError;

/// Size of one ROM or RAM page.
pub const PAGE_SIZE: usize = 0x4000;

const ROM_PAGES: usize = 2;
const RAM_PAGES: usize = 8;

/// Bitmap plus attributes.
const SCREEN_SIZE: usize = 0x1B00;

/// What a 16K window is mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Rom(u8),
    Ram(u8),
}

const DEFAULT_LAYOUT: [Page; 4] = [Page::Rom(0), Page::Ram(5), Page::Ram(2), Page::Ram(0)];

pub struct BankedMemory {
    rom: Vec<u8>,
    ram: Vec<u8>,
    windows: [Page; 4],
    /// False in 48K mode: $7FFD writes are ignored.
    paging_enabled: bool,
    /// Set by bit 5 of $7FFD; cleared only by reset.
    paging_locked: bool,
    last_7ffd: u8,
    /// RAM page the ULA renders from (5 or 7).
    screen_page: u8,
    video_ram_changed: bool,
}

impl BankedMemory {
    /// Create memory with no ROM loaded, in 48K mode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rom: vec![0; ROM_PAGES * PAGE_SIZE],
            ram: vec![0; RAM_PAGES * PAGE_SIZE],
            windows: DEFAULT_LAYOUT,
            paging_enabled: false,
            paging_locked: false,
            last_7ffd: 0,
            screen_page: 5,
            video_ram_changed: false,
        }
    }

    /// Copy a 16K or 32K ROM image into the ROM pages and reset the layout.
    pub fn load_rom(&mut self, image: &[u8]) -> Result<(), MachineError> {
        if image.len() != PAGE_SIZE && image.len() != 2 * PAGE_SIZE {
            return Err(MachineError::InvalidRomSize(image.len()));
        }
        self.rom.fill(0);
        self.rom[..image.len()].copy_from_slice(image);
        self.reset(image.len());
        log::debug!("loaded {}K ROM", image.len() / 1024);
        Ok(())
    }

    /// Restore the default window layout. A 16K ROM means 48K mode, where
    /// paging is disabled. RAM contents are kept.
    pub fn reset(&mut self, rom_size: usize) {
        self.windows = DEFAULT_LAYOUT;
        self.paging_enabled = rom_size != PAGE_SIZE;
        self.paging_locked = false;
        self.last_7ffd = 0;
        self.screen_page = 5;
        self.video_ram_changed = true;
    }

    fn locate(&self, addr: u16) -> (Page, usize) {
        let window = usize::from(addr >> 14);
        (self.windows[window], usize::from(addr) & (PAGE_SIZE - 1))
    }

    #[must_use]
    pub fn read8(&self, addr: u16) -> u8 {
        match self.locate(addr) {
            (Page::Rom(page), offset) => self.rom[usize::from(page) * PAGE_SIZE + offset],
            (Page::Ram(page), offset) => self.ram[usize::from(page) * PAGE_SIZE + offset],
        }
    }

    /// Write a byte. Writes to a ROM-backed window are discarded.
    pub fn write8(&mut self, addr: u16, value: u8) {
        if let (Page::Ram(page), offset) = self.locate(addr) {
            self.ram[usize::from(page) * PAGE_SIZE + offset] = value;
            if page == self.screen_page && offset < SCREEN_SIZE {
                self.video_ram_changed = true;
            }
        }
    }

    /// Little-endian word read, wrapping at $FFFF.
    #[must_use]
    pub fn read16(&self, addr: u16) -> u16 {
        let lo = self.read8(addr);
        let hi = self.read8(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    pub fn write16(&mut self, addr: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write8(addr, lo);
        self.write8(addr.wrapping_add(1), hi);
    }

    /// Point a window at a page. Out-of-range windows or pages are ignored.
    pub fn set_page(&mut self, window: usize, page: Page) {
        let valid = match page {
            Page::Rom(n) => usize::from(n) < ROM_PAGES,
            Page::Ram(n) => usize::from(n) < RAM_PAGES,
        };
        if window < self.windows.len() && valid {
            self.windows[window] = page;
        } else {
            log::warn!("ignoring invalid mapping of window {window} to {page:?}");
        }
    }

    #[must_use]
    pub fn window(&self, window: usize) -> Page {
        self.windows[window & 3]
    }

    /// Write to the 128K paging port ($7FFD).
    ///
    /// Bits 0-2 select the RAM page at $C000, bit 3 the shadow screen,
    /// bit 4 the ROM, bit 5 locks paging until reset.
    pub fn write_paging(&mut self, value: u8) {
        if !self.paging_enabled || self.paging_locked {
            return;
        }
        self.last_7ffd = value;
        self.windows[3] = Page::Ram(value & 0x07);
        self.windows[0] = Page::Rom((value >> 4) & 1);
        let screen_page = if value & 0x08 != 0 { 7 } else { 5 };
        if screen_page != self.screen_page {
            self.screen_page = screen_page;
            self.video_ram_changed = true;
        }
        self.paging_locked = value & 0x20 != 0;
        log::debug!("paging $7FFD = ${value:02X}");
    }

    /// Last value accepted by the paging port.
    #[must_use]
    pub fn paging_register(&self) -> u8 {
        self.last_7ffd
    }

    #[must_use]
    pub fn paging_enabled(&self) -> bool {
        self.paging_enabled
    }

    #[must_use]
    pub fn paging_locked(&self) -> bool {
        self.paging_locked
    }

    /// Read display memory ($4000-$5AFF) from the page the ULA renders,
    /// ignoring the CPU's mapping at $4000.
    #[must_use]
    pub fn read_screen_byte(&self, addr: u16) -> u8 {
        let offset = usize::from(addr.wrapping_sub(0x4000)) % SCREEN_SIZE;
        self.ram[usize::from(self.screen_page) * PAGE_SIZE + offset]
    }

    #[must_use]
    pub fn screen_page(&self) -> u8 {
        self.screen_page
    }

    #[must_use]
    pub fn video_ram_changed(&self) -> bool {
        self.video_ram_changed
    }

    /// Return and clear the display-changed flag.
    pub fn take_video_ram_changed(&mut self) -> bool {
        std::mem::take(&mut self.video_ram_changed)
    }

    /// Whether the ROM holding the BASIC tape routines is at $0000. That is
    /// ROM 0 on a 48K machine and ROM 1 on a 128K machine.
    #[must_use]
    pub fn basic_rom_mapped(&self) -> bool {
        let basic = u8::from(self.paging_enabled);
        self.windows[0] == Page::Rom(basic)
    }

    #[must_use]
    pub fn rom_page(&self, page: u8) -> &[u8] {
        let start = usize::from(page & 1) * PAGE_SIZE;
        &self.rom[start..start + PAGE_SIZE]
    }

    #[must_use]
    pub fn ram_page(&self, page: u8) -> &[u8] {
        let start = usize::from(page & 7) * PAGE_SIZE;
        &self.ram[start..start + PAGE_SIZE]
    }

    /// Replace a whole RAM page, as a snapshot load does.
    pub fn load_ram_page(&mut self, page: u8, data: &[u8]) {
        let start = usize::from(page & 7) * PAGE_SIZE;
        let len = data.len().min(PAGE_SIZE);
        self.ram[start..start + len].copy_from_slice(&data[..len]);
        if page & 7 == self.screen_page {
            self.video_ram_changed = true;
        }
    }
}

impl Default for BankedMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_rom(size: usize) -> Vec<u8> {
        let mut rom = vec![0u8; size];
        rom[0] = 0xF3;
        if size > PAGE_SIZE {
            rom[PAGE_SIZE] = 0xAF;
        }
        rom
    }

    fn memory_48k() -> BankedMemory {
        let mut mem = BankedMemory::new();
        mem.load_rom(&make_rom(PAGE_SIZE)).expect("16K ROM");
        mem
    }

    fn memory_128k() -> BankedMemory {
        let mut mem = BankedMemory::new();
        mem.load_rom(&make_rom(2 * PAGE_SIZE)).expect("32K ROM");
        mem
    }

    #[test]
    fn rejects_odd_rom_size() {
        let mut mem = BankedMemory::new();
        assert_eq!(mem.load_rom(&[0; 100]), Err(MachineError::InvalidRomSize(100)));
    }

    #[test]
    fn memory_48k_rom_read() {
        let mem = memory_48k();
        assert_eq!(mem.read8(0x0000), 0xF3);
    }

    #[test]
    fn memory_48k_rom_write_ignored() {
        let mut mem = memory_48k();
        mem.write8(0x0000, 0x00);
        assert_eq!(mem.read8(0x0000), 0xF3);
    }

    #[test]
    fn memory_48k_ram_read_write() {
        let mut mem = memory_48k();
        mem.write8(0x8000, 0x42);
        assert_eq!(mem.read8(0x8000), 0x42);
        assert_eq!(mem.ram_page(2)[0], 0x42);
    }

    #[test]
    fn word_access_wraps() {
        let mut mem = memory_48k();
        mem.write16(0xFFFF, 0x1234);
        assert_eq!(mem.read8(0xFFFF), 0x34);
        // High byte lands on ROM and is dropped.
        assert_eq!(mem.read8(0x0000), 0xF3);
        mem.write16(0x9000, 0xBEEF);
        assert_eq!(mem.read16(0x9000), 0xBEEF);
        assert_eq!(mem.read8(0x9000), 0xEF);
    }

    #[test]
    fn memory_48k_ignores_paging() {
        let mut mem = memory_48k();
        mem.write_paging(0x17);
        assert_eq!(mem.window(3), Page::Ram(0));
        assert_eq!(mem.window(0), Page::Rom(0));
        assert_eq!(mem.paging_register(), 0);
    }

    #[test]
    fn memory_128k_ram_paging() {
        let mut mem = memory_128k();
        mem.write8(0xC000, 0x11);
        mem.write_paging(0x03);
        assert_eq!(mem.window(3), Page::Ram(3));
        assert_eq!(mem.read8(0xC000), 0x00);
        mem.write8(0xC000, 0x33);
        mem.write_paging(0x00);
        assert_eq!(mem.read8(0xC000), 0x11);
        assert_eq!(mem.ram_page(3)[0], 0x33);
    }

    #[test]
    fn memory_128k_rom_switching() {
        let mut mem = memory_128k();
        assert_eq!(mem.read8(0x0000), 0xF3);
        mem.write_paging(0x10);
        assert_eq!(mem.read8(0x0000), 0xAF);
    }

    #[test]
    fn memory_128k_lock_bit() {
        let mut mem = memory_128k();
        mem.write_paging(0x21);
        assert!(mem.paging_locked());
        mem.write_paging(0x04);
        assert_eq!(mem.window(3), Page::Ram(1));

        mem.reset(2 * PAGE_SIZE);
        mem.write_paging(0x04);
        assert_eq!(mem.window(3), Page::Ram(4));
    }

    #[test]
    fn bank5_mirrors_at_c000() {
        let mut mem = memory_128k();
        mem.write8(0x4000, 0x55);
        mem.write_paging(0x05);
        assert_eq!(mem.read8(0xC000), 0x55);
    }

    #[test]
    fn screen_reads_follow_shadow_page() {
        let mut mem = memory_128k();
        mem.write8(0x4000, 0x55);
        mem.write_paging(0x07);
        mem.write8(0xC000, 0x77);
        assert_eq!(mem.read_screen_byte(0x4000), 0x55);

        mem.write_paging(0x0F);
        assert_eq!(mem.screen_page(), 7);
        assert_eq!(mem.read_screen_byte(0x4000), 0x77);
        // The CPU still sees RAM 5 at $4000.
        assert_eq!(mem.read8(0x4000), 0x55);
    }

    #[test]
    fn video_ram_changed_tracks_screen_writes() {
        let mut mem = memory_48k();
        let _ = mem.take_video_ram_changed();

        mem.write8(0x8000, 1);
        assert!(!mem.video_ram_changed());

        mem.write8(0x5800, 0x38);
        assert!(mem.take_video_ram_changed());
        assert!(!mem.video_ram_changed());

        // Past the attribute area.
        mem.write8(0x5B00, 1);
        assert!(!mem.video_ram_changed());
    }

    #[test]
    fn basic_rom_detection() {
        let mem = memory_48k();
        assert!(mem.basic_rom_mapped());

        let mut mem = memory_128k();
        assert!(!mem.basic_rom_mapped());
        mem.write_paging(0x10);
        assert!(mem.basic_rom_mapped());
    }

    #[test]
    fn set_page_remaps_window() {
        let mut mem = memory_48k();
        mem.set_page(2, Page::Ram(6));
        mem.write8(0x8000, 0x66);
        assert_eq!(mem.ram_page(6)[0], 0x66);
        mem.set_page(2, Page::Ram(9));
        assert_eq!(mem.window(2), Page::Ram(6));
    }
}
