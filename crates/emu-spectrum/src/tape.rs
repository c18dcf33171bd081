//! Tape devices behind the ROM load/save traps.
//!
//! The machine does not parse tape images. It asks a `TapeDevice` for the
//! next block with a given flag byte, or hands it a block to store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Storage the ROM tape traps talk to.
pub trait TapeDevice {
    /// Next block for a LOAD or VERIFY of `len` bytes with flag byte `flag`.
    ///
    /// Returns `None` when no matching block is available; the ROM then
    /// reports a loading error.
    fn load(&mut self, flag: u8, len: usize, verify: bool) -> Option<Vec<u8>>;

    /// Store a block. Returns false if the device could not accept it.
    fn save(&mut self, flag: u8, data: &[u8]) -> bool;
}

/// One tape block: flag byte plus payload, without length or checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapeBlock {
    pub flag: u8,
    pub data: Vec<u8>,
}

/// In-memory tape: a list of blocks and a play cursor. Saves append.
#[derive(Debug, Default)]
pub struct TapeDeck {
    blocks: Vec<TapeBlock>,
    cursor: usize,
}

impl TapeDeck {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_blocks(blocks: Vec<TapeBlock>) -> Self {
        Self { blocks, cursor: 0 }
    }

    pub fn push(&mut self, flag: u8, data: Vec<u8>) {
        self.blocks.push(TapeBlock { flag, data });
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    #[must_use]
    pub fn blocks(&self) -> &[TapeBlock] {
        &self.blocks
    }

    /// Index of the block the next load will read.
    #[must_use]
    pub fn position(&self) -> usize {
        self.cursor
    }
}

impl TapeDevice for TapeDeck {
    fn load(&mut self, flag: u8, len: usize, _verify: bool) -> Option<Vec<u8>> {
        let block = self.blocks.get(self.cursor)?;
        // A mismatched block is still consumed, as the ROM skips it.
        self.cursor += 1;
        if block.flag != flag || block.data.len() < len {
            log::debug!(
                "tape block {} rejected: flag ${:02X} len {} (wanted ${flag:02X} len {len})",
                self.cursor - 1,
                block.flag,
                block.data.len()
            );
            return None;
        }
        Some(block.data[..len].to_vec())
    }

    fn save(&mut self, flag: u8, data: &[u8]) -> bool {
        self.push(flag, data.to_vec());
        true
    }
}

/// Tape backed by a directory of block files.
///
/// Each file holds the flag byte followed by the payload. Files are played
/// in name order; saves are written as `NNNN.blk` after the highest
/// existing number.
#[derive(Debug)]
pub struct DirTape {
    dir: PathBuf,
    played: usize,
}

impl DirTape {
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, played: 0 })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn block_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "blk"))
            .collect();
        files.sort();
        Ok(files)
    }

    fn next_save_path(&self) -> io::Result<PathBuf> {
        let next = self
            .block_files()?
            .iter()
            .filter_map(|path| path.file_stem()?.to_str()?.parse::<u32>().ok())
            .max()
            .map_or(0, |n| n + 1);
        Ok(self.dir.join(format!("{next:04}.blk")))
    }
}

impl TapeDevice for DirTape {
    fn load(&mut self, flag: u8, len: usize, _verify: bool) -> Option<Vec<u8>> {
        let files = match self.block_files() {
            Ok(files) => files,
            Err(err) => {
                log::warn!("cannot list tape directory {}: {err}", self.dir.display());
                return None;
            }
        };
        let path = files.get(self.played)?;
        self.played += 1;
        let bytes = fs::read(path)
            .map_err(|err| log::warn!("cannot read {}: {err}", path.display()))
            .ok()?;
        let (&block_flag, data) = bytes.split_first()?;
        if block_flag != flag || data.len() < len {
            log::debug!("{} rejected: flag ${block_flag:02X} len {}", path.display(), data.len());
            return None;
        }
        Some(data[..len].to_vec())
    }

    fn save(&mut self, flag: u8, data: &[u8]) -> bool {
        let result = self.next_save_path().and_then(|path| {
            let mut bytes = Vec::with_capacity(data.len() + 1);
            bytes.push(flag);
            bytes.extend_from_slice(data);
            fs::write(&path, bytes).map(|()| path)
        });
        match result {
            Ok(path) => {
                log::info!("saved {} byte block to {}", data.len(), path.display());
                true
            }
            Err(err) => {
                log::warn!("tape save failed: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("emu-spectrum-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn deck_plays_blocks_in_order() {
        let mut deck = TapeDeck::new();
        deck.push(0x00, vec![1, 2, 3]);
        deck.push(0xFF, vec![4, 5]);

        assert_eq!(deck.load(0x00, 3, false), Some(vec![1, 2, 3]));
        assert_eq!(deck.load(0xFF, 2, false), Some(vec![4, 5]));
        assert_eq!(deck.load(0xFF, 2, false), None);

        deck.rewind();
        assert_eq!(deck.position(), 0);
        assert!(deck.load(0x00, 1, false).is_some());
    }

    #[test]
    fn deck_skips_mismatched_flag() {
        let mut deck = TapeDeck::new();
        deck.push(0x00, vec![1]);
        deck.push(0xFF, vec![2]);

        assert_eq!(deck.load(0xFF, 1, false), None);
        assert_eq!(deck.position(), 1);
        assert_eq!(deck.load(0xFF, 1, false), Some(vec![2]));
    }

    #[test]
    fn deck_rejects_short_block() {
        let mut deck = TapeDeck::with_blocks(vec![TapeBlock { flag: 0xFF, data: vec![1, 2] }]);
        assert_eq!(deck.load(0xFF, 5, false), None);
    }

    #[test]
    fn deck_save_appends() {
        let mut deck = TapeDeck::new();
        assert!(deck.save(0x00, &[9, 9]));
        assert_eq!(deck.blocks(), &[TapeBlock { flag: 0x00, data: vec![9, 9] }]);
    }

    #[test]
    fn dir_tape_round_trip() {
        let dir = scratch_dir("dir-tape");
        let mut tape = DirTape::open(&dir).expect("create dir");
        assert!(tape.save(0x00, &[1, 2, 3]));
        assert!(tape.save(0xFF, &[4, 5]));
        assert!(dir.join("0000.blk").exists());
        assert!(dir.join("0001.blk").exists());

        let mut player = DirTape::open(&dir).expect("open dir");
        assert_eq!(player.load(0x00, 3, false), Some(vec![1, 2, 3]));
        assert_eq!(player.load(0xFF, 2, true), Some(vec![4, 5]));
        assert_eq!(player.load(0xFF, 2, false), None);

        let _ = fs::remove_dir_all(&dir);
    }
}
