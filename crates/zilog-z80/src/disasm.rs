//! Instruction decoder used for trace output.
//!
//! Decodes by the usual x/y/z field split of the opcode byte. Relative
//! jumps are shown as `$+n` from the instruction's own address.

#![allow(clippy::cast_possible_wrap)] // Displacement bytes are signed.

const R: [&str; 8] = ["B", "C", "D", "E", "H", "L", "(HL)", "A"];
const RP: [&str; 4] = ["BC", "DE", "HL", "SP"];
const RP2: [&str; 4] = ["BC", "DE", "HL", "AF"];
const CC: [&str; 8] = ["NZ", "Z", "NC", "C", "PO", "PE", "P", "M"];
const ALU: [&str; 8] = ["ADD A,", "ADC A,", "SUB ", "SBC A,", "AND ", "XOR ", "OR ", "CP "];
const ROT: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SLL", "SRL"];
const BLOCK: [[&str; 4]; 4] = [
    ["LDI", "CPI", "INI", "OUTI"],
    ["LDD", "CPD", "IND", "OUTD"],
    ["LDIR", "CPIR", "INIR", "OTIR"],
    ["LDDR", "CPDR", "INDR", "OTDR"],
];

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    /// "IX" or "IY" under a DD/FD prefix.
    index: Option<&'static str>,
}

impl Decoder<'_> {
    /// Next byte; missing bytes decode as zero.
    fn byte(&mut self) -> u8 {
        let b = self.bytes.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        b
    }

    fn imm8(&mut self) -> String {
        format!("${:02X}", self.byte())
    }

    fn imm16(&mut self) -> String {
        let lo = self.byte();
        let hi = self.byte();
        format!("${:04X}", u16::from_le_bytes([lo, hi]))
    }

    fn relative(&mut self) -> String {
        let d = i16::from(self.byte() as i8) + 2;
        if d >= 0 { format!("$+{d}") } else { format!("${d}") }
    }

    fn hl(&self) -> &'static str {
        self.index.unwrap_or("HL")
    }

    /// (HL), or (IX+d) consuming the displacement byte.
    fn mem(&mut self) -> String {
        match self.index {
            None => "(HL)".to_owned(),
            Some(ix) => {
                let d = self.byte() as i8;
                if d < 0 {
                    format!("({ix}-{})", d.unsigned_abs())
                } else {
                    format!("({ix}+{d})")
                }
            }
        }
    }

    /// Register operand with H/L mapped to the index halves.
    fn reg(&mut self, r: u8) -> String {
        match (r, self.index) {
            (6, _) => self.mem(),
            (4 | 5, Some(ix)) => format!("{ix}{}", if r == 4 { 'H' } else { 'L' }),
            _ => R[usize::from(r)].to_owned(),
        }
    }

    fn rp(&self, p: u8) -> &'static str {
        if p == 2 { self.hl() } else { RP[usize::from(p)] }
    }

    fn rp2(&self, p: u8) -> &'static str {
        if p == 2 { self.hl() } else { RP2[usize::from(p)] }
    }

    fn base(&mut self, op: u8) -> String {
        let (x, y, z) = (op >> 6, (op >> 3) & 7, op & 7);
        let (p, q) = (y >> 1, y & 1);
        let hl = self.hl();
        match (x, z) {
            (0, 0) => match y {
                0 => "NOP".to_owned(),
                1 => "EX AF,AF'".to_owned(),
                2 => format!("DJNZ {}", self.relative()),
                3 => format!("JR {}", self.relative()),
                _ => format!("JR {},{}", CC[usize::from(y - 4)], self.relative()),
            },
            (0, 1) if q == 0 => format!("LD {},{}", self.rp(p), self.imm16()),
            (0, 1) => format!("ADD {hl},{}", self.rp(p)),
            (0, 2) => match y {
                0 => "LD (BC),A".to_owned(),
                1 => "LD A,(BC)".to_owned(),
                2 => "LD (DE),A".to_owned(),
                3 => "LD A,(DE)".to_owned(),
                4 => format!("LD ({}),{hl}", self.imm16()),
                5 => format!("LD {hl},({})", self.imm16()),
                6 => format!("LD ({}),A", self.imm16()),
                _ => format!("LD A,({})", self.imm16()),
            },
            (0, 3) => format!("{} {}", if q == 0 { "INC" } else { "DEC" }, self.rp(p)),
            (0, 4) => format!("INC {}", self.reg(y)),
            (0, 5) => format!("DEC {}", self.reg(y)),
            (0, 6) => {
                let dst = self.reg(y);
                format!("LD {dst},{}", self.imm8())
            }
            (0, _) => ["RLCA", "RRCA", "RLA", "RRA", "DAA", "CPL", "SCF", "CCF"][usize::from(y)]
                .to_owned(),
            (1, 6) if y == 6 => "HALT".to_owned(),
            (1, _) => {
                // With an (IX+d) operand the other side keeps plain H/L.
                if y == 6 || z == 6 {
                    let mem = self.mem();
                    if y == 6 {
                        format!("LD {mem},{}", R[usize::from(z)])
                    } else {
                        format!("LD {},{mem}", R[usize::from(y)])
                    }
                } else {
                    format!("LD {},{}", self.reg(y), self.reg(z))
                }
            }
            (2, _) => format!("{}{}", ALU[usize::from(y)], self.reg(z)),
            (_, 0) => format!("RET {}", CC[usize::from(y)]),
            (_, 1) if q == 0 => format!("POP {}", self.rp2(p)),
            (_, 1) => match p {
                0 => "RET".to_owned(),
                1 => "EXX".to_owned(),
                2 => format!("JP ({hl})"),
                _ => format!("LD SP,{hl}"),
            },
            (_, 2) => format!("JP {},{}", CC[usize::from(y)], self.imm16()),
            (_, 3) => match y {
                0 => format!("JP {}", self.imm16()),
                2 => format!("OUT ({}),A", self.imm8()),
                3 => format!("IN A,({})", self.imm8()),
                4 => format!("EX (SP),{hl}"),
                5 => "EX DE,HL".to_owned(),
                6 => "DI".to_owned(),
                7 => "EI".to_owned(),
                _ => "CB".to_owned(),
            },
            (_, 4) => format!("CALL {},{}", CC[usize::from(y)], self.imm16()),
            (_, 5) if q == 0 => format!("PUSH {}", self.rp2(p)),
            (_, 5) if p == 0 => format!("CALL {}", self.imm16()),
            (_, 5) => "PREFIX".to_owned(),
            (_, 6) => format!("{}{}", ALU[usize::from(y)], self.imm8()),
            _ => format!("RST ${:02X}", y * 8),
        }
    }

    fn cb(&mut self) -> String {
        // Indexed forms put the displacement before the sub-opcode.
        let (op, target) = if self.index.is_some() {
            let mem = self.mem();
            (self.byte(), mem)
        } else {
            let op = self.byte();
            (op, R[usize::from(op & 7)].to_owned())
        };
        let y = (op >> 3) & 7;
        match op >> 6 {
            0 => format!("{} {target}", ROT[usize::from(y)]),
            1 => format!("BIT {y},{target}"),
            2 => format!("RES {y},{target}"),
            _ => format!("SET {y},{target}"),
        }
    }

    fn ed(&mut self) -> String {
        let op = self.byte();
        let (x, y, z) = (op >> 6, (op >> 3) & 7, op & 7);
        let (p, q) = (y >> 1, y & 1);
        match (x, z) {
            (1, 0) if y == 6 => "IN (C)".to_owned(),
            (1, 0) => format!("IN {},(C)", R[usize::from(y)]),
            (1, 1) if y == 6 => "OUT (C),0".to_owned(),
            (1, 1) => format!("OUT (C),{}", R[usize::from(y)]),
            (1, 2) => format!("{} HL,{}", if q == 0 { "SBC" } else { "ADC" }, RP[usize::from(p)]),
            (1, 3) if q == 0 => format!("LD ({}),{}", self.imm16(), RP[usize::from(p)]),
            (1, 3) => format!("LD {},({})", RP[usize::from(p)], self.imm16()),
            (1, 4) => "NEG".to_owned(),
            (1, 5) => (if y == 1 { "RETI" } else { "RETN" }).to_owned(),
            (1, 6) => format!("IM {}", [0, 0, 1, 2][usize::from(y & 3)]),
            (1, 7) if y < 6 => ["LD I,A", "LD R,A", "LD A,I", "LD A,R", "RRD", "RLD"][usize::from(y)]
                .to_owned(),
            (2, 0..=3) if y >= 4 => BLOCK[usize::from(y - 4)][usize::from(z)].to_owned(),
            _ => format!("NOP ; ED {op:02X}"),
        }
    }
}

/// Decode one instruction to assembler text, e.g. `LD (IX+5),$42`.
///
/// Redundant leading DD/FD bytes are skipped; the last one wins.
#[must_use]
pub fn disassemble(bytes: &[u8]) -> String {
    let mut d = Decoder { bytes, pos: 0, index: None };
    let mut op = d.byte();
    while op == 0xDD || op == 0xFD {
        d.index = Some(if op == 0xDD { "IX" } else { "IY" });
        op = d.byte();
    }
    match op {
        0xCB => d.cb(),
        0xED => {
            d.index = None;
            d.ed()
        }
        _ => d.base(op),
    }
}
