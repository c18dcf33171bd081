//! .Z80 snapshots (v1, v2, v3 load; v3 save).
//!
//! **Version 1** (PC at offset 6 non-zero): 30-byte header and one 48K
//! memory image, optionally compressed.
//!
//! **Version 2/3** (PC at offset 6 zero): 30-byte header, extended header
//! (23 bytes for v2, 54 or 55 for v3) and a list of 16K page blocks:
//! `len` (u16, $FFFF = uncompressed 16K), page number, data.
//!
//! Compression replaces runs with `ED ED count byte`. A run of two `ED`
//! bytes is always encoded, and the byte after a lone `ED` is never the
//! start of a run.

use zilog_z80::{Prefix, Registers, Z80};

use crate::bus::{AyLatch, SpectrumBus};
use crate::error::SnapshotError;
use crate::memory::PAGE_SIZE;

const V1_HEADER_SIZE: usize = 30;
const V3_EXTENSION: u16 = 54;

/// $7FFD value that pins a 128K machine to the 48K ROM with paging locked.
const LOCKED_48K_PAGING: u8 = 0x30;

/// Hardware type recorded in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hardware {
    Spectrum48K,
    Spectrum128K,
}

/// Decoded snapshot contents, independent of a running machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub hardware: Hardware,
    pub regs: Registers,
    pub border: u8,
    /// Last $7FFD write (128K only).
    pub paging: u8,
    pub ay: AyLatch,
    /// RAM page number and its 16K contents.
    pub pages: Vec<(u8, Vec<u8>)>,
}

impl Snapshot {
    /// Parse a .Z80 file.
    pub fn parse(data: &[u8]) -> Result<Self, SnapshotError> {
        if data.len() < V1_HEADER_SIZE {
            return Err(SnapshotError::Truncated {
                needed: V1_HEADER_SIZE,
                got: data.len(),
            });
        }
        let (mut regs, flags1) = parse_base_header(data);
        let border = (flags1 >> 1) & 0x07;
        let header_pc = u16::from_le_bytes([data[6], data[7]]);

        if header_pc != 0 {
            regs.pc = header_pc;
            let body = &data[V1_HEADER_SIZE..];
            let image = if flags1 & 0x20 != 0 {
                decompress(body, 3 * PAGE_SIZE)
            } else {
                let mut image = body.to_vec();
                image.resize(3 * PAGE_SIZE, 0);
                image
            };
            // $4000 = RAM 5, $8000 = RAM 2, $C000 = RAM 0.
            let pages = [5, 2, 0]
                .iter()
                .zip(image.chunks(PAGE_SIZE))
                .map(|(&page, chunk)| (page, chunk.to_vec()))
                .collect();
            log::debug!("parsed v1 snapshot, PC=${header_pc:04X}");
            return Ok(Self {
                hardware: Hardware::Spectrum48K,
                regs,
                border,
                paging: 0,
                ay: AyLatch::default(),
                pages,
            });
        }

        let ext_start = V1_HEADER_SIZE + 2;
        if data.len() < ext_start {
            return Err(SnapshotError::Truncated {
                needed: ext_start,
                got: data.len(),
            });
        }
        let ext_len = u16::from_le_bytes([data[30], data[31]]);
        let ext_end = ext_start + usize::from(ext_len);
        if data.len() < ext_end || ext_len < 23 {
            return Err(SnapshotError::Truncated {
                needed: ext_end.max(ext_start + 23),
                got: data.len(),
            });
        }
        let ext = &data[ext_start..ext_end];
        regs.pc = u16::from_le_bytes([ext[0], ext[1]]);
        let hardware = hardware_from_mode(ext[2], ext_len == 23)?;

        let mut ay = AyLatch::default();
        ay.select(ext[6]);
        ay.registers.copy_from_slice(&ext[7..23]);

        let mut pages = Vec::new();
        let mut pos = ext_end;
        while pos + 3 <= data.len() {
            let block_len = u16::from_le_bytes([data[pos], data[pos + 1]]);
            let page = data[pos + 2];
            pos += 3;
            let (raw_len, compressed) = if block_len == 0xFFFF {
                (PAGE_SIZE, false)
            } else {
                (usize::from(block_len), true)
            };
            let block = data
                .get(pos..pos + raw_len)
                .ok_or(SnapshotError::BadBlock { page })?;
            pos += raw_len;

            let Some(ram_page) = ram_page_for(hardware, page) else {
                log::debug!("skipping snapshot page {page}");
                continue;
            };
            let contents = if compressed {
                decompress(block, PAGE_SIZE)
            } else {
                block.to_vec()
            };
            pages.push((ram_page, contents));
        }

        log::debug!(
            "parsed v{} {hardware:?} snapshot, PC=${:04X}, {} pages",
            if ext_len == 23 { 2 } else { 3 },
            regs.pc,
            pages.len()
        );
        Ok(Self {
            hardware,
            regs,
            border,
            paging: ext[3],
            ay,
            pages,
        })
    }

    /// Capture the state of a running machine.
    #[must_use]
    pub fn capture(cpu: &Z80, bus: &SpectrumBus) -> Self {
        let memory = &bus.memory;
        let (hardware, page_numbers): (Hardware, &[u8]) = if memory.paging_enabled() {
            (Hardware::Spectrum128K, &[0, 1, 2, 3, 4, 5, 6, 7])
        } else {
            (Hardware::Spectrum48K, &[5, 2, 0])
        };
        let mut regs = *cpu.regs();
        if cpu.prefix() != Prefix::None {
            // The format has no prefix state: resume from the prefix byte.
            regs.pc = regs.pc.wrapping_sub(1);
        }
        Self {
            hardware,
            regs,
            border: bus.border(),
            paging: memory.paging_register(),
            ay: bus.ay.clone(),
            pages: page_numbers
                .iter()
                .map(|&page| (page, memory.ram_page(page).to_vec()))
                .collect(),
        }
    }

    /// Load this snapshot into a machine whose CPU and memory layout have
    /// just been reset.
    pub fn apply(&self, cpu: &mut Z80, bus: &mut SpectrumBus) -> Result<(), SnapshotError> {
        let machine_128k = bus.memory.paging_enabled();
        match (self.hardware, machine_128k) {
            (Hardware::Spectrum128K, false) => return Err(SnapshotError::ModelMismatch),
            (Hardware::Spectrum128K, true) => bus.memory.write_paging(self.paging),
            (Hardware::Spectrum48K, true) => bus.memory.write_paging(LOCKED_48K_PAGING),
            (Hardware::Spectrum48K, false) => {}
        }
        for (page, contents) in &self.pages {
            bus.memory.load_ram_page(*page, contents);
        }
        *cpu.regs_mut() = self.regs;
        cpu.regs_mut().halted = false;
        bus.set_border(self.border);
        if self.hardware == Hardware::Spectrum128K {
            bus.ay = self.ay.clone();
        }
        Ok(())
    }

    /// Encode as a version 3 .Z80 file with compressed pages.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let regs = &self.regs;
        let mut out = Vec::with_capacity(0x4000);

        out.extend_from_slice(&[regs.a, regs.f, regs.c, regs.b, regs.l, regs.h]);
        // PC zero marks a v2/v3 file.
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&regs.sp.to_le_bytes());
        out.push(regs.i);
        out.push(regs.r & 0x7F);
        out.push((regs.r >> 7) | (self.border << 1));
        out.extend_from_slice(&[regs.e, regs.d]);
        out.extend_from_slice(&[regs.c_alt, regs.b_alt, regs.e_alt, regs.d_alt]);
        out.extend_from_slice(&[regs.l_alt, regs.h_alt, regs.a_alt, regs.f_alt]);
        out.extend_from_slice(&regs.iy.to_le_bytes());
        out.extend_from_slice(&regs.ix.to_le_bytes());
        out.push(u8::from(regs.iff1));
        out.push(u8::from(regs.iff2));
        out.push(regs.im & 0x03);

        out.extend_from_slice(&V3_EXTENSION.to_le_bytes());
        let mut ext = [0u8; V3_EXTENSION as usize];
        ext[0..2].copy_from_slice(&regs.pc.to_le_bytes());
        let paged_128k = self.hardware == Hardware::Spectrum128K;
        ext[2] = if paged_128k { 4 } else { 0 };
        ext[3] = if paged_128k { self.paging } else { 0 };
        ext[6] = self.ay.selected;
        ext[7..23].copy_from_slice(&self.ay.registers);
        out.extend_from_slice(&ext);

        for (page, contents) in &self.pages {
            let Some(number) = snapshot_page_for(self.hardware, *page) else {
                continue;
            };
            let packed = compress(contents);
            if packed.len() >= PAGE_SIZE {
                out.extend_from_slice(&0xFFFFu16.to_le_bytes());
                out.push(number);
                out.extend_from_slice(contents);
            } else {
                out.extend_from_slice(&(packed.len() as u16).to_le_bytes());
                out.push(number);
                out.extend_from_slice(&packed);
            }
        }
        out
    }
}

/// Registers from the 30-byte base header, plus flags byte 1.
fn parse_base_header(data: &[u8]) -> (Registers, u8) {
    // Byte 12 = 255 is treated as 1 for compatibility with old writers.
    let flags1 = if data[12] == 0xFF { 1 } else { data[12] };
    let regs = Registers {
        a: data[0],
        f: data[1],
        c: data[2],
        b: data[3],
        l: data[4],
        h: data[5],
        sp: u16::from_le_bytes([data[8], data[9]]),
        i: data[10],
        r: (data[11] & 0x7F) | ((flags1 & 0x01) << 7),
        e: data[13],
        d: data[14],
        c_alt: data[15],
        b_alt: data[16],
        e_alt: data[17],
        d_alt: data[18],
        l_alt: data[19],
        h_alt: data[20],
        a_alt: data[21],
        f_alt: data[22],
        iy: u16::from_le_bytes([data[23], data[24]]),
        ix: u16::from_le_bytes([data[25], data[26]]),
        iff1: data[27] != 0,
        iff2: data[28] != 0,
        im: data[29] & 0x03,
        ..Registers::default()
    };
    (regs, flags1)
}

fn hardware_from_mode(mode: u8, v2: bool) -> Result<Hardware, SnapshotError> {
    match (mode, v2) {
        (0 | 1, _) | (3, false) => Ok(Hardware::Spectrum48K),
        (3 | 4, true) | (4..=7 | 12 | 13, false) => Ok(Hardware::Spectrum128K),
        _ => Err(SnapshotError::UnsupportedHardware(mode)),
    }
}

/// Snapshot page number to RAM page.
fn ram_page_for(hardware: Hardware, page: u8) -> Option<u8> {
    match hardware {
        Hardware::Spectrum48K => match page {
            4 => Some(2),
            5 => Some(0),
            8 => Some(5),
            _ => None,
        },
        Hardware::Spectrum128K => page.checked_sub(3).filter(|&ram| ram < 8),
    }
}

/// RAM page to snapshot page number.
fn snapshot_page_for(hardware: Hardware, ram_page: u8) -> Option<u8> {
    match hardware {
        Hardware::Spectrum48K => match ram_page {
            2 => Some(4),
            0 => Some(5),
            5 => Some(8),
            _ => None,
        },
        Hardware::Spectrum128K => (ram_page < 8).then_some(ram_page + 3),
    }
}

/// Expand `ED ED count byte` runs into exactly `size` bytes. Missing input
/// leaves zeros; surplus input is ignored.
#[must_use]
pub fn decompress(src: &[u8], size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(size);
    let mut i = 0;
    while i < src.len() && out.len() < size {
        if src[i] == 0xED && src.get(i + 1) == Some(&0xED) && i + 3 < src.len() {
            let count = usize::from(src[i + 2]);
            let value = src[i + 3];
            let take = count.min(size - out.len());
            out.extend(std::iter::repeat_n(value, take));
            i += 4;
        } else {
            out.push(src[i]);
            i += 1;
        }
    }
    out.resize(size, 0);
    out
}

/// Compress with `ED ED count byte` runs.
#[must_use]
pub fn compress(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len() / 2);
    let mut i = 0;
    while i < src.len() {
        let value = src[i];
        let run = src[i..]
            .iter()
            .take(255)
            .take_while(|&&b| b == value)
            .count();
        if run >= 5 || (value == 0xED && run >= 2) {
            out.extend_from_slice(&[0xED, 0xED, run as u8, value]);
            i += run;
        } else {
            out.push(value);
            i += 1;
            if value == 0xED && i < src.len() {
                out.push(src[i]);
                i += 1;
            }
        }
    }
    out
}
