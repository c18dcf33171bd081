//! Top-level Spectrum system.
//!
//! The machine steps the Z80 one instruction at a time and feeds the cycle
//! cost to the scheduler, which raises the 50 Hz interrupt and throttles to
//! wall-clock speed.
//!
//! # Tape traps
//!
//! With a tape device attached and the BASIC ROM paged in, the ROM's own
//! tape routines are intercepted before the opcode fetch:
//!
//! - $0562 (inside LD-BYTES, after `EX AF,AF'`): load or verify a block
//! - $04C2 (SA-BYTES entry): save a block
//!
//! Register contract: IX = address, DE = length, A = flag byte ($00
//! header, $FF data), Carry = load (set) or verify (clear). For loads the
//! flag byte and Carry come from A'/F' when `use_shadow_regs` is on. On
//! return Carry reports success and the routine's return address is popped.

use emu_core::{Observable, Value};
use zilog_z80::{CF, Prefix, Z80};

use crate::bus::SpectrumBus;
use crate::config::{CPU_CLOCK, SpectrumConfig, SpectrumModel};
use crate::error::{MachineError, SnapshotError};
use crate::keyboard::Key;
use crate::memory::BankedMemory;
use crate::scheduler::Scheduler;
use crate::snapshot::{Hardware, Snapshot};
use crate::tape::TapeDevice;

/// LD-BYTES, just after the ROM swaps in A'/F' and pushes SA/LD-RET.
pub const LOAD_TRAP_ADDR: u16 = 0x0562;
/// SA-BYTES entry.
pub const SAVE_TRAP_ADDR: u16 = 0x04C2;

/// Cycles charged for a trapped tape call (the cost of the RET it ends with).
const TRAP_CYCLES: u32 = 10;

/// ZX Spectrum system.
pub struct Spectrum {
    cpu: Z80,
    bus: SpectrumBus,
    scheduler: Scheduler,
    model: SpectrumModel,
    tape: Option<Box<dyn TapeDevice>>,
    tape_traps: bool,
    use_shadow_regs: bool,
    /// Interrupts raised so far (one per 50 Hz frame).
    frame_count: u64,
}

impl Spectrum {
    /// Create a Spectrum from the given configuration.
    pub fn new(config: &SpectrumConfig) -> Result<Self, MachineError> {
        if config.rom.len() != config.model.rom_size() {
            return Err(MachineError::InvalidRomSize(config.rom.len()));
        }
        let mut memory = BankedMemory::new();
        memory.load_rom(&config.rom)?;
        let mut bus = SpectrumBus::new(memory);
        bus.detect_serial();

        Ok(Self {
            cpu: Z80::new(),
            bus,
            scheduler: Scheduler::new(CPU_CLOCK, config.cycles_per_tick, config.turbo),
            model: config.model,
            tape: None,
            tape_traps: config.tape_traps,
            use_shadow_regs: config.use_shadow_regs,
            frame_count: 0,
        })
    }

    /// Hardware reset: registers zeroed, default page layout, paging lock
    /// released. RAM contents survive.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.memory.reset(self.model.rom_size());
        self.scheduler.reset();
    }

    /// Replace the ROM. The model follows the image size (16K = 48K,
    /// 32K = 128K) and the machine is reset.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), MachineError> {
        self.bus.memory.load_rom(rom)?;
        self.model = if rom.len() == SpectrumModel::Spectrum48K.rom_size() {
            SpectrumModel::Spectrum48K
        } else {
            SpectrumModel::Spectrum128K
        };
        self.bus.detect_serial();
        self.cpu.reset();
        self.scheduler.reset();
        Ok(())
    }

    /// Execute one instruction (or accept an interrupt, or service a tape
    /// trap). Returns the cycles it took.
    pub fn step(&mut self) -> u32 {
        let cycles = if self.check_tape_trap() {
            TRAP_CYCLES
        } else {
            self.cpu.step(&mut self.bus)
        };
        if self.scheduler.advance(cycles) {
            self.cpu.interrupt();
            self.frame_count += 1;
        }
        cycles
    }

    /// Run until the next interrupt is raised. Returns the cycles executed.
    pub fn run_frame(&mut self) -> u64 {
        let target = self.frame_count + 1;
        let mut cycles = 0;
        while self.frame_count < target {
            cycles += u64::from(self.step());
        }
        cycles
    }

    /// Run at least `budget` cycles, stopping at an instruction boundary.
    pub fn run_cycles(&mut self, budget: u64) -> u64 {
        let mut cycles = 0;
        while cycles < budget {
            cycles += u64::from(self.step());
        }
        cycles
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Load a .Z80 snapshot. The machine is only touched if the file parses
    /// and matches the model.
    pub fn load_snapshot(&mut self, data: &[u8]) -> Result<(), SnapshotError> {
        let snapshot = Snapshot::parse(data)?;
        if snapshot.hardware == Hardware::Spectrum128K
            && self.model == SpectrumModel::Spectrum48K
        {
            return Err(SnapshotError::ModelMismatch);
        }
        self.reset();
        snapshot.apply(&mut self.cpu, &mut self.bus)
    }

    /// Save the current state as a version 3 .Z80 snapshot.
    #[must_use]
    pub fn save_snapshot(&self) -> Vec<u8> {
        Snapshot::capture(&self.cpu, &self.bus).to_bytes()
    }

    // =========================================================================
    // Tape traps
    // =========================================================================

    /// Attach a tape device, replacing any previous one.
    pub fn attach_tape(&mut self, tape: Box<dyn TapeDevice>) {
        self.tape = Some(tape);
    }

    pub fn detach_tape(&mut self) -> Option<Box<dyn TapeDevice>> {
        self.tape.take()
    }

    #[must_use]
    pub fn has_tape(&self) -> bool {
        self.tape.is_some()
    }

    fn check_tape_trap(&mut self) -> bool {
        if !self.tape_traps
            || self.tape.is_none()
            || self.cpu.prefix() != Prefix::None
            || !self.bus.memory.basic_rom_mapped()
        {
            return false;
        }
        match self.cpu.pc() {
            LOAD_TRAP_ADDR => self.trap_load(),
            SAVE_TRAP_ADDR => self.trap_save(),
            _ => return false,
        }
        true
    }

    fn trap_load(&mut self) {
        let regs = *self.cpu.regs();
        let (flag, flags) = if self.use_shadow_regs {
            (regs.a_alt, regs.f_alt)
        } else {
            (regs.a, regs.f)
        };
        let verify = flags & CF == 0;
        let len = usize::from(regs.de());
        let block = self
            .tape
            .as_mut()
            .and_then(|tape| tape.load(flag, len, verify));

        let ok = block.filter(|data| data.len() == len).is_some_and(|data| {
            let addrs = (0..len).map(|i| regs.ix.wrapping_add(i as u16));
            if verify {
                addrs.zip(&data).all(|(addr, &byte)| self.bus.memory.read8(addr) == byte)
            } else {
                for (addr, &byte) in addrs.zip(&data) {
                    self.bus.memory.write8(addr, byte);
                }
                true
            }
        });
        log::info!(
            "tape {} of {len} bytes (flag ${flag:02X}) at ${:04X}: {}",
            if verify { "verify" } else { "load" },
            regs.ix,
            if ok { "ok" } else { "failed" }
        );
        self.finish_trap(ok, len);
    }

    fn trap_save(&mut self) {
        let regs = *self.cpu.regs();
        let len = usize::from(regs.de());
        let data: Vec<u8> = (0..len)
            .map(|i| self.bus.memory.read8(regs.ix.wrapping_add(i as u16)))
            .collect();
        let ok = self
            .tape
            .as_mut()
            .is_some_and(|tape| tape.save(regs.a, &data));
        log::info!(
            "tape save of {len} bytes (flag ${:02X}) from ${:04X}: {}",
            regs.a,
            regs.ix,
            if ok { "ok" } else { "failed" }
        );
        self.finish_trap(ok, len);
    }

    /// Report the result in Carry and return from the ROM routine.
    fn finish_trap(&mut self, ok: bool, len: usize) {
        let regs = self.cpu.regs_mut();
        if ok {
            regs.ix = regs.ix.wrapping_add(len as u16);
            regs.set_de(0);
        }
        regs.set_flag(CF, ok);
        self.cpu.force_ret(&mut self.bus);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[must_use]
    pub fn cpu(&self) -> &Z80 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Z80 {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &SpectrumBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SpectrumBus {
        &mut self.bus
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn set_turbo(&mut self, turbo: bool) {
        self.scheduler.set_turbo(turbo);
    }

    #[must_use]
    pub fn model(&self) -> SpectrumModel {
        self.model
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Border colour (0-7) for the display collaborator.
    #[must_use]
    pub fn border_color(&self) -> u8 {
        self.bus.border()
    }

    /// Read display memory from the page the ULA is showing.
    #[must_use]
    pub fn read_screen_byte(&self, addr: u16) -> u8 {
        self.bus.memory.read_screen_byte(addr)
    }

    /// Return and clear the display-changed flag.
    pub fn take_video_ram_changed(&mut self) -> bool {
        self.bus.memory.take_video_ram_changed()
    }

    pub fn press_key(&mut self, key: Key) {
        self.bus.keyboard.set(key, true);
    }

    pub fn release_key(&mut self, key: Key) {
        self.bus.keyboard.set(key, false);
    }

    pub fn release_all_keys(&mut self) {
        self.bus.keyboard.release_all();
    }

    /// Queue input for the serial port. Ignored if the ROM has none.
    pub fn serial_feed(&mut self, bytes: &[u8]) {
        if let Some(port) = self.bus.serial.as_mut() {
            port.feed(bytes);
        }
    }

    /// Drain serial output.
    pub fn serial_output(&mut self) -> Vec<u8> {
        self.bus
            .serial
            .as_mut()
            .map(crate::serial::SerialPort::take_output)
            .unwrap_or_default()
    }
}

fn parse_address(text: &str) -> Option<u16> {
    if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_prefix('$'))
    {
        u16::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

impl Observable for Spectrum {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            return self.cpu.query(rest);
        }
        if let Some(rest) = path.strip_prefix("memory.") {
            return parse_address(rest).map(|addr| Value::U8(self.bus.memory.read8(addr)));
        }
        if let Some(rest) = path.strip_prefix("screen.") {
            return parse_address(rest).map(|addr| Value::U8(self.read_screen_byte(addr)));
        }
        let value: Value = match path {
            "border" => self.bus.border().into(),
            "paging.7ffd" => self.bus.memory.paging_register().into(),
            "paging.locked" => self.bus.memory.paging_locked().into(),
            "scheduler.cycles" => self.scheduler.accumulated().get().into(),
            "scheduler.ticks" => self.scheduler.idle_ticks().into(),
            "frame_count" => self.frame_count.into(),
            "model" => match self.model {
                SpectrumModel::Spectrum48K => "48k".into(),
                SpectrumModel::Spectrum128K => "128k".into(),
            },
            _ => return None,
        };
        Some(value)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.<z80_paths>",
            "memory.<address>",
            "screen.<address>",
            "border",
            "paging.7ffd",
            "paging.locked",
            "scheduler.cycles",
            "scheduler.ticks",
            "frame_count",
            "model",
        ]
    }
}
