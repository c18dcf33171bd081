//! Spectrum keyboard matrix.
//!
//! Forty keys in eight half-rows of five. A read of an even port selects
//! half-rows with the cleared bits of the high address byte; pressed keys
//! read as 0 in bits 0-4.

/// A key on the 48K keyboard, in matrix order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    // Half-row 0 (A8)
    CapsShift,
    Z,
    X,
    C,
    V,
    // Half-row 1 (A9)
    A,
    S,
    D,
    F,
    G,
    // Half-row 2 (A10)
    Q,
    W,
    E,
    R,
    T,
    // Half-row 3 (A11)
    N1,
    N2,
    N3,
    N4,
    N5,
    // Half-row 4 (A12)
    N0,
    N9,
    N8,
    N7,
    N6,
    // Half-row 5 (A13)
    P,
    O,
    I,
    U,
    Y,
    // Half-row 6 (A14)
    Enter,
    L,
    K,
    J,
    H,
    // Half-row 7 (A15)
    Space,
    SymbolShift,
    M,
    N,
    B,
}

/// Character printed on each matrix position. Shift keys have none.
const LEGENDS: &[u8; 40] = b"\0ZXCVASDFGQWERT1234509876POIUY\nLKJH \0MNB";

#[rustfmt::skip]
const ALL_KEYS: [Key; 40] = [
    Key::CapsShift, Key::Z, Key::X, Key::C, Key::V,
    Key::A, Key::S, Key::D, Key::F, Key::G,
    Key::Q, Key::W, Key::E, Key::R, Key::T,
    Key::N1, Key::N2, Key::N3, Key::N4, Key::N5,
    Key::N0, Key::N9, Key::N8, Key::N7, Key::N6,
    Key::P, Key::O, Key::I, Key::U, Key::Y,
    Key::Enter, Key::L, Key::K, Key::J, Key::H,
    Key::Space, Key::SymbolShift, Key::M, Key::N, Key::B,
];

impl Key {
    /// Half-row (0-7) and bit (0-4) of this key.
    #[must_use]
    pub fn matrix(self) -> (usize, u8) {
        let index = self as usize;
        (index / 5, (index % 5) as u8)
    }

    /// Map a character to a key: digits, letters, space and newline.
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        let byte = u8::try_from(c.to_ascii_uppercase()).ok().filter(|&b| b != 0)?;
        let index = LEGENDS.iter().position(|&legend| legend == byte)?;
        ALL_KEYS.get(index).copied()
    }
}

/// Pressed-key state. Bit set = pressed.
#[derive(Debug, Default, Clone)]
pub struct Keyboard {
    rows: [u8; 8],
}

impl Keyboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: Key, pressed: bool) {
        let (row, bit) = key.matrix();
        if pressed {
            self.rows[row] |= 1 << bit;
        } else {
            self.rows[row] &= !(1 << bit);
        }
    }

    pub fn release_all(&mut self) {
        self.rows = [0; 8];
    }

    /// Scan the half-rows selected by the cleared bits of `addr_high`.
    /// Returns bits 0-4 active low with bits 5-7 set.
    #[must_use]
    pub fn scan(&self, addr_high: u8) -> u8 {
        let pressed = self
            .rows
            .iter()
            .enumerate()
            .filter(|&(row, _)| addr_high & (1 << row) == 0)
            .fold(0, |acc, (_, &bits)| acc | bits);
        (!pressed & 0x1F) | 0xE0
    }
}
