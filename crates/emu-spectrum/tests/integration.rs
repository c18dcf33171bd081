//! Machine-level tests: interrupt timing, paging, snapshots, tape traps and
//! the serial hook, driven through the public `Spectrum` API with small
//! hand-assembled ROMs.

use std::cell::RefCell;
use std::rc::Rc;

use emu_core::Observable;
use emu_spectrum::{
    Key, LOAD_TRAP_ADDR, Page, SAVE_TRAP_ADDR, Spectrum, SpectrumConfig, SpectrumModel,
    TapeDeck, TapeDevice,
};
use zilog_z80::{CF, Prefix, Registers};

fn make_spectrum(model: SpectrumModel, program: &[u8]) -> Spectrum {
    let mut rom = vec![0u8; model.rom_size()];
    rom[..program.len()].copy_from_slice(program);
    make_spectrum_with_rom(model, rom)
}

fn make_spectrum_with_rom(model: SpectrumModel, rom: Vec<u8>) -> Spectrum {
    let mut config = SpectrumConfig::new(model, rom);
    config.turbo = true;
    Spectrum::new(&config).expect("valid config")
}

fn run_steps(spectrum: &mut Spectrum, steps: usize) {
    for _ in 0..steps {
        spectrum.step();
    }
}

// ---------------------------------------------------------------------------
// Interrupt timing
// ---------------------------------------------------------------------------

#[test]
fn interrupt_after_two_ticks_of_nops() {
    // IM 1; EI; then NOPs through ROM and zeroed RAM.
    let mut spectrum = make_spectrum(SpectrumModel::Spectrum48K, &[0xED, 0x56, 0xFB]);

    // The request is raised by the instruction that takes the count past
    // 2 x 33,588 cycles and accepted at the boundary after it, so the
    // accepting step starts within one NOP of the two-tick mark.
    let mut cycles = 0u64;
    let mut interrupted_pc;
    loop {
        interrupted_pc = spectrum.cpu().pc();
        let step = spectrum.step();
        if step == 13 && spectrum.cpu().pc() == 0x0038 {
            break;
        }
        cycles += u64::from(step);
        assert!(cycles < 100_000, "interrupt never accepted");
    }
    assert!(cycles > 2 * 33_588, "accepted early after {cycles} cycles");
    assert!(cycles <= 2 * 33_588 + 4, "accepted late after {cycles} cycles");
    assert!(!spectrum.cpu().regs().iff1);
    assert_eq!(spectrum.frame_count(), 1);

    let sp = spectrum.cpu().regs().sp;
    let memory = &spectrum.bus().memory;
    let pushed = u16::from_le_bytes([memory.read8(sp), memory.read8(sp.wrapping_add(1))]);
    assert_eq!(pushed, interrupted_pc);
}

#[test]
fn prefix_filled_memory_keeps_time_moving() {
    let mut spectrum = make_spectrum_with_rom(SpectrumModel::Spectrum48K, vec![0xDD; 0x4000]);
    for addr in 0x4000..=0xFFFFu16 {
        spectrum.bus_mut().memory.write8(addr, 0xDD);
    }
    assert_eq!(spectrum.step(), 4);
    assert_eq!(spectrum.cpu().prefix(), Prefix::Ix);

    let cycles = spectrum.run_frame();
    assert!(cycles > 2 * 33_588 - 4, "got {cycles}");
    assert_eq!(spectrum.frame_count(), 1);
}

#[test]
fn interrupt_waits_for_ei() {
    // DI, then a NOP sled that runs on into RAM.
    let mut spectrum = make_spectrum(SpectrumModel::Spectrum48K, &[0xF3]);
    spectrum.run_frame();
    assert!(spectrum.cpu().int_pending());

    // Plant an EI just ahead of the CPU.
    let pc = spectrum.cpu().pc();
    assert!(pc >= 0x4000);
    spectrum.bus_mut().memory.write8(pc, 0xFB);
    spectrum.step();
    spectrum.step();
    assert_eq!(spectrum.cpu().pc(), 0x0038);
}

#[test]
fn halt_wakes_on_interrupt() {
    // IM 1; EI; HALT, with RET at $0038.
    let mut program = vec![0u8; 0x40];
    program[..4].copy_from_slice(&[0xED, 0x56, 0xFB, 0x76]);
    program[0x38] = 0xC9;
    let mut spectrum = make_spectrum(SpectrumModel::Spectrum48K, &program);
    spectrum.cpu_mut().regs_mut().sp = 0x8000;

    run_steps(&mut spectrum, 3);
    assert!(spectrum.cpu().is_halted());
    spectrum.run_frame();
    // Still halted until the interrupt is accepted on the next step.
    spectrum.step();
    assert_eq!(spectrum.cpu().pc(), 0x0038);
    spectrum.step();
    assert_eq!(spectrum.cpu().pc(), 0x0004);
    assert!(!spectrum.cpu().is_halted());
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

#[test]
fn port_7ffd_pages_ram_and_rom() {
    let program = [
        0x01, 0xFD, 0x7F, // LD BC,$7FFD
        0x3E, 0x03, //       LD A,3
        0xED, 0x79, //       OUT (C),A
        0x3A, 0x00, 0xC0, // LD A,($C000)
        0x3E, 0x10, //       LD A,$10
        0xED, 0x79, //       OUT (C),A
        0x76, //             HALT
    ];
    let mut rom = vec![0u8; 0x8000];
    rom[..program.len()].copy_from_slice(&program);
    // Same code in ROM 1 so execution continues after the switch.
    rom[0x4000..0x4000 + program.len()].copy_from_slice(&program);
    rom[0x7FFF] = 0xA5;
    let mut spectrum = make_spectrum_with_rom(SpectrumModel::Spectrum128K, rom);

    let mut page3 = vec![0u8; 0x4000];
    page3[0] = 0x33;
    spectrum.bus_mut().memory.load_ram_page(3, &page3);

    run_steps(&mut spectrum, 4);
    assert_eq!(spectrum.cpu().regs().a, 0x33);
    assert_eq!(spectrum.bus().memory.window(3), Page::Ram(3));

    run_steps(&mut spectrum, 2);
    assert_eq!(spectrum.bus().memory.window(0), Page::Rom(1));
    assert_eq!(spectrum.bus().memory.window(3), Page::Ram(0));
    assert_eq!(spectrum.bus().memory.read8(0x3FFF), 0xA5);
    assert_eq!(spectrum.query("paging.7ffd"), Some(0x10u8.into()));
}

#[test]
fn port_7ffd_ignored_on_48k() {
    let program = [0x01, 0xFD, 0x7F, 0x3E, 0x17, 0xED, 0x79, 0x76];
    let mut spectrum = make_spectrum(SpectrumModel::Spectrum48K, &program);
    run_steps(&mut spectrum, 3);
    assert_eq!(spectrum.bus().memory.window(0), Page::Rom(0));
    assert_eq!(spectrum.bus().memory.window(3), Page::Ram(0));
}

#[test]
fn reset_releases_paging_lock() {
    let mut spectrum = make_spectrum(SpectrumModel::Spectrum128K, &[]);
    spectrum.bus_mut().memory.write_paging(0x27);
    assert!(spectrum.bus().memory.paging_locked());
    spectrum.reset();
    assert!(!spectrum.bus().memory.paging_locked());
    assert_eq!(spectrum.bus().memory.window(3), Page::Ram(0));
}

// ---------------------------------------------------------------------------
// Display collaborator
// ---------------------------------------------------------------------------

#[test]
fn screen_writes_flag_video_change() {
    let program = [
        0x3E, 0x07, //       LD A,7
        0xD3, 0xFE, //       OUT ($FE),A
        0x32, 0x00, 0x58, // LD ($5800),A
        0x76,
    ];
    let mut spectrum = make_spectrum(SpectrumModel::Spectrum48K, &program);
    let _ = spectrum.take_video_ram_changed();
    run_steps(&mut spectrum, 2);
    assert_eq!(spectrum.border_color(), 7);
    assert!(!spectrum.take_video_ram_changed());
    spectrum.step();
    assert!(spectrum.take_video_ram_changed());
    assert_eq!(spectrum.read_screen_byte(0x5800), 0x07);
}

#[test]
fn keyboard_scan_through_in() {
    let program = [
        0x3E, 0xFD, // LD A,$FD
        0xDB, 0xFE, // IN A,($FE)
        0x76,
    ];
    let mut spectrum = make_spectrum(SpectrumModel::Spectrum48K, &program);
    spectrum.press_key(Key::A);
    run_steps(&mut spectrum, 2);
    assert_eq!(spectrum.cpu().regs().a & 0x1F, 0x1E);
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

fn sample_registers() -> Registers {
    let mut regs = Registers {
        a: 0x12,
        f: 0xFF,
        a_alt: 0x9A,
        f_alt: 0x01,
        ix: 0x1357,
        iy: 0x5C3A,
        sp: 0xFF4A,
        pc: 0x8123,
        i: 0x3F,
        r: 0xA5,
        iff1: true,
        iff2: true,
        im: 1,
        ..Registers::default()
    };
    regs.set_bc(0x3456);
    regs.set_de(0x789A);
    regs.set_hl(0xBCDE);
    regs.set_bc_alt(0x1111);
    regs.set_de_alt(0x2222);
    regs.set_hl_alt(0x3333);
    regs
}

fn fill_page(spectrum: &mut Spectrum, page: u8) {
    let contents: Vec<u8> = (0..0x4000u32)
        .map(|i| if i % 97 < 40 { page } else { (i * 7 + u32::from(page)) as u8 })
        .collect();
    spectrum.bus_mut().memory.load_ram_page(page, &contents);
}

#[test]
fn snapshot_round_trip_48k() {
    let mut source = make_spectrum(SpectrumModel::Spectrum48K, &[]);
    for page in [5, 2, 0] {
        fill_page(&mut source, page);
    }
    *source.cpu_mut().regs_mut() = sample_registers();
    source.bus_mut().set_border(3);

    let bytes = source.save_snapshot();

    let mut target = make_spectrum(SpectrumModel::Spectrum48K, &[]);
    target.load_snapshot(&bytes).expect("snapshot loads");

    assert_eq!(target.cpu().regs(), source.cpu().regs());
    assert_eq!(target.border_color(), 3);
    for page in [5, 2, 0] {
        assert_eq!(
            target.bus().memory.ram_page(page),
            source.bus().memory.ram_page(page),
            "RAM page {page}"
        );
    }
    // Saving again gives the same file.
    assert_eq!(target.save_snapshot(), bytes);
}

#[test]
fn snapshot_round_trip_128k() {
    let mut source = make_spectrum(SpectrumModel::Spectrum128K, &[]);
    for page in 0..8 {
        fill_page(&mut source, page);
    }
    source.bus_mut().memory.write_paging(0x1B);
    *source.cpu_mut().regs_mut() = sample_registers();
    source.bus_mut().set_border(5);
    source.bus_mut().ay.registers[7] = 0x38;
    source.bus_mut().ay.select(14);

    let bytes = source.save_snapshot();

    let mut target = make_spectrum(SpectrumModel::Spectrum128K, &[]);
    target.load_snapshot(&bytes).expect("snapshot loads");

    assert_eq!(target.cpu().regs(), source.cpu().regs());
    assert_eq!(target.border_color(), 5);
    assert_eq!(target.bus().memory.paging_register(), 0x1B);
    assert_eq!(target.bus().memory.window(0), Page::Rom(1));
    assert_eq!(target.bus().memory.window(3), Page::Ram(3));
    assert_eq!(target.bus().memory.screen_page(), 7);
    assert_eq!(target.bus().ay, source.bus().ay);
    for page in 0..8 {
        assert_eq!(
            target.bus().memory.ram_page(page),
            source.bus().memory.ram_page(page),
            "RAM page {page}"
        );
    }
}

#[test]
fn snapshot_128k_rejected_by_48k() {
    let source = make_spectrum(SpectrumModel::Spectrum128K, &[]);
    let bytes = source.save_snapshot();
    let mut target = make_spectrum(SpectrumModel::Spectrum48K, &[]);
    target.cpu_mut().regs_mut().a = 0x42;
    assert!(target.load_snapshot(&bytes).is_err());
    assert_eq!(target.cpu().regs().a, 0x42);
}

#[test]
fn snapshot_between_prefix_and_opcode_resumes_at_prefix() {
    // LD IX,$1234 split after its DD byte.
    let mut spectrum = make_spectrum(SpectrumModel::Spectrum48K, &[0xDD, 0x21, 0x34, 0x12]);
    spectrum.step();
    assert_eq!(spectrum.cpu().prefix(), Prefix::Ix);
    let bytes = spectrum.save_snapshot();

    let mut restored = make_spectrum(SpectrumModel::Spectrum48K, &[0xDD, 0x21, 0x34, 0x12]);
    restored.load_snapshot(&bytes).expect("snapshot loads");
    assert_eq!(restored.cpu().pc(), 0);
    restored.step();
    restored.step();
    assert_eq!(restored.cpu().regs().ix, 0x1234);
}

#[test]
fn snapshot_48k_on_128k_locks_to_basic_rom() {
    let source = make_spectrum(SpectrumModel::Spectrum48K, &[]);
    let bytes = source.save_snapshot();
    let mut target = make_spectrum(SpectrumModel::Spectrum128K, &[]);
    target.load_snapshot(&bytes).expect("snapshot loads");
    assert_eq!(target.bus().memory.window(0), Page::Rom(1));
    assert!(target.bus().memory.paging_locked());
}

// ---------------------------------------------------------------------------
// Tape traps
// ---------------------------------------------------------------------------

/// Records saved blocks where the test can still see them.
struct RecordingTape(Rc<RefCell<Vec<(u8, Vec<u8>)>>>);

impl TapeDevice for RecordingTape {
    fn load(&mut self, _flag: u8, _len: usize, _verify: bool) -> Option<Vec<u8>> {
        None
    }

    fn save(&mut self, flag: u8, data: &[u8]) -> bool {
        self.0.borrow_mut().push((flag, data.to_vec()));
        true
    }
}

/// Position the CPU at a trap address with a return address on the stack.
fn enter_trap(spectrum: &mut Spectrum, pc: u16) {
    spectrum.bus_mut().memory.write16(0x7FFE, 0x1234);
    let regs = spectrum.cpu_mut().regs_mut();
    regs.pc = pc;
    regs.sp = 0x7FFE;
    regs.ix = 0x9000;
    regs.set_de(3);
}

#[test]
fn load_trap_copies_block() {
    let mut spectrum = make_spectrum(SpectrumModel::Spectrum48K, &[]);
    let mut deck = TapeDeck::new();
    deck.push(0xFF, vec![1, 2, 3]);
    spectrum.attach_tape(Box::new(deck));

    enter_trap(&mut spectrum, LOAD_TRAP_ADDR);
    let regs = spectrum.cpu_mut().regs_mut();
    regs.a_alt = 0xFF;
    regs.f_alt = CF;

    spectrum.step();

    let regs = spectrum.cpu().regs();
    assert_eq!(regs.pc, 0x1234);
    assert_eq!(regs.sp, 0x8000);
    assert_eq!(regs.ix, 0x9003);
    assert_eq!(regs.de(), 0);
    assert!(regs.flag(CF));
    let memory = &spectrum.bus().memory;
    assert_eq!([memory.read8(0x9000), memory.read8(0x9001), memory.read8(0x9002)], [1, 2, 3]);
}

#[test]
fn load_trap_flag_mismatch_fails() {
    let mut spectrum = make_spectrum(SpectrumModel::Spectrum48K, &[]);
    let mut deck = TapeDeck::new();
    deck.push(0x00, vec![1, 2, 3]);
    spectrum.attach_tape(Box::new(deck));

    enter_trap(&mut spectrum, LOAD_TRAP_ADDR);
    let regs = spectrum.cpu_mut().regs_mut();
    regs.a_alt = 0xFF;
    regs.f_alt = CF;
    regs.f = CF;

    spectrum.step();

    let regs = spectrum.cpu().regs();
    assert_eq!(regs.pc, 0x1234);
    assert_eq!(regs.ix, 0x9000);
    assert!(!regs.flag(CF));
    assert_eq!(spectrum.bus().memory.read8(0x9000), 0);
}

/// Hands back one byte less than asked for.
struct ShortTape;

impl TapeDevice for ShortTape {
    fn load(&mut self, _flag: u8, len: usize, _verify: bool) -> Option<Vec<u8>> {
        Some(vec![0xAA; len.saturating_sub(1)])
    }

    fn save(&mut self, _flag: u8, _data: &[u8]) -> bool {
        false
    }
}

#[test]
fn load_trap_rejects_short_block() {
    let mut spectrum = make_spectrum(SpectrumModel::Spectrum48K, &[]);
    spectrum.attach_tape(Box::new(ShortTape));

    enter_trap(&mut spectrum, LOAD_TRAP_ADDR);
    let regs = spectrum.cpu_mut().regs_mut();
    regs.a_alt = 0xFF;
    regs.f_alt = CF;

    spectrum.step();

    let regs = spectrum.cpu().regs();
    assert_eq!(regs.pc, 0x1234);
    assert_eq!(regs.ix, 0x9000);
    assert_eq!(regs.de(), 3);
    assert!(!regs.flag(CF));
    assert_eq!(spectrum.bus().memory.read8(0x9000), 0);
}

#[test]
fn load_trap_verify_compares_memory() {
    let mut spectrum = make_spectrum(SpectrumModel::Spectrum48K, &[]);
    let mut deck = TapeDeck::new();
    deck.push(0xFF, vec![7, 8, 9]);
    deck.push(0xFF, vec![7, 8, 0]);
    spectrum.attach_tape(Box::new(deck));
    for (i, byte) in [7u8, 8, 9].into_iter().enumerate() {
        spectrum.bus_mut().memory.write8(0x9000 + i as u16, byte);
    }

    for expect_ok in [true, false] {
        enter_trap(&mut spectrum, LOAD_TRAP_ADDR);
        let regs = spectrum.cpu_mut().regs_mut();
        regs.a_alt = 0xFF;
        regs.f_alt = 0;
        spectrum.step();
        assert_eq!(spectrum.cpu().regs().flag(CF), expect_ok);
        assert_eq!(spectrum.bus().memory.read8(0x9002), 9);
    }
}

#[test]
fn load_trap_live_registers() {
    let mut rom = vec![0u8; 0x4000];
    rom[0] = 0x00;
    let mut config = SpectrumConfig::new(SpectrumModel::Spectrum48K, rom);
    config.turbo = true;
    config.use_shadow_regs = false;
    let mut spectrum = Spectrum::new(&config).expect("valid config");
    let mut deck = TapeDeck::new();
    deck.push(0x00, vec![4, 5, 6]);
    spectrum.attach_tape(Box::new(deck));

    enter_trap(&mut spectrum, LOAD_TRAP_ADDR);
    let regs = spectrum.cpu_mut().regs_mut();
    regs.a = 0x00;
    regs.f = CF;
    regs.a_alt = 0xFF;

    spectrum.step();
    assert!(spectrum.cpu().regs().flag(CF));
    assert_eq!(spectrum.bus().memory.read8(0x9001), 5);
}

#[test]
fn save_trap_hands_block_to_device() {
    let saved = Rc::new(RefCell::new(Vec::new()));
    let mut spectrum = make_spectrum(SpectrumModel::Spectrum48K, &[]);
    spectrum.attach_tape(Box::new(RecordingTape(Rc::clone(&saved))));
    for (i, byte) in [0xAAu8, 0xBB, 0xCC].into_iter().enumerate() {
        spectrum.bus_mut().memory.write8(0x9000 + i as u16, byte);
    }

    enter_trap(&mut spectrum, SAVE_TRAP_ADDR);
    spectrum.cpu_mut().regs_mut().a = 0xFF;
    spectrum.step();

    assert_eq!(saved.borrow().as_slice(), &[(0xFF, vec![0xAA, 0xBB, 0xCC])]);
    let regs = spectrum.cpu().regs();
    assert_eq!(regs.pc, 0x1234);
    assert!(regs.flag(CF));
    assert_eq!(regs.ix, 0x9003);
}

#[test]
fn traps_need_basic_rom_and_device() {
    // No device: the ROM code at $0562 runs.
    let mut spectrum = make_spectrum(SpectrumModel::Spectrum48K, &[]);
    enter_trap(&mut spectrum, LOAD_TRAP_ADDR);
    spectrum.step();
    assert_eq!(spectrum.cpu().pc(), LOAD_TRAP_ADDR + 1);

    // 128K with the editor ROM (ROM 0) paged in.
    let mut spectrum = make_spectrum(SpectrumModel::Spectrum128K, &[]);
    spectrum.attach_tape(Box::new(TapeDeck::new()));
    enter_trap(&mut spectrum, LOAD_TRAP_ADDR);
    spectrum.step();
    assert_eq!(spectrum.cpu().pc(), LOAD_TRAP_ADDR + 1);

    // Once the BASIC ROM is paged in the trap fires.
    spectrum.bus_mut().memory.write_paging(0x10);
    enter_trap(&mut spectrum, LOAD_TRAP_ADDR);
    spectrum.step();
    assert_eq!(spectrum.cpu().pc(), 0x1234);
}

// ---------------------------------------------------------------------------
// Serial hook
// ---------------------------------------------------------------------------

#[test]
fn serial_echo_program() {
    let mut rom = vec![0u8; 0x4000];
    let program = [
        0x3A, 0xFE, 0x3F, // LD A,($3FFE)
        0x47, //             LD B,A
        0x3A, 0xFF, 0x3F, // LD A,($3FFF)
        0x32, 0xFF, 0x3F, // LD ($3FFF),A
        0x76,
    ];
    rom[..program.len()].copy_from_slice(&program);
    rom[0x3FE0..0x3FE9].copy_from_slice(b"Z80SERIAL");
    let mut spectrum = make_spectrum_with_rom(SpectrumModel::Spectrum48K, rom);
    spectrum.serial_feed(b"Q");

    run_steps(&mut spectrum, 4);
    assert_eq!(spectrum.cpu().regs().b & 0x03, 0x03);
    assert_eq!(spectrum.serial_output(), b"Q");
}

#[test]
fn no_serial_without_signature() {
    let mut spectrum = make_spectrum(SpectrumModel::Spectrum48K, &[]);
    spectrum.serial_feed(b"Q");
    assert!(spectrum.bus().serial.is_none());
    assert!(spectrum.serial_output().is_empty());
}
