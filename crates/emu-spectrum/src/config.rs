//! Spectrum model configuration.

use emu_core::MasterClock;
use serde::Deserialize;

/// Z80 clock the scheduler paces against.
pub const CPU_CLOCK: MasterClock = MasterClock::new(3_358_800);

/// Default cycles per scheduler tick: 10 ms of Z80 time.
pub const DEFAULT_CYCLES_PER_TICK: u64 = CPU_CLOCK.ticks_per_millis(10).get();

/// Supported Spectrum models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectrumModel {
    #[default]
    #[serde(alias = "48k")]
    Spectrum48K,
    #[serde(alias = "128k")]
    Spectrum128K,
}

impl SpectrumModel {
    /// ROM image size this model expects.
    #[must_use]
    pub const fn rom_size(self) -> usize {
        match self {
            Self::Spectrum48K => 0x4000,
            Self::Spectrum128K => 0x8000,
        }
    }
}

/// Configuration for creating a Spectrum instance.
#[derive(Debug, Clone)]
pub struct SpectrumConfig {
    pub model: SpectrumModel,
    /// ROM data: 16,384 bytes for 48K, 32,768 bytes for 128K.
    pub rom: Vec<u8>,
    /// Run without the wall-clock throttle.
    pub turbo: bool,
    /// Intercept the ROM tape routines when a tape device is attached.
    pub tape_traps: bool,
    /// Take the tape flag byte and load/verify carry from A'/F' instead of A/F.
    pub use_shadow_regs: bool,
    /// Cycles between idle ticks. Two ticks make one 50 Hz frame.
    pub cycles_per_tick: u64,
}

impl SpectrumConfig {
    #[must_use]
    pub fn new(model: SpectrumModel, rom: Vec<u8>) -> Self {
        Self {
            model,
            rom,
            turbo: false,
            tape_traps: true,
            use_shadow_regs: true,
            cycles_per_tick: DEFAULT_CYCLES_PER_TICK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SpectrumConfig::new(SpectrumModel::Spectrum48K, vec![0; 0x4000]);
        assert!(!config.turbo);
        assert!(config.tape_traps);
        assert!(config.use_shadow_regs);
        assert_eq!(config.cycles_per_tick, 33_588);
    }

    #[test]
    fn rom_sizes() {
        assert_eq!(SpectrumModel::Spectrum48K.rom_size(), 16_384);
        assert_eq!(SpectrumModel::Spectrum128K.rom_size(), 32_768);
    }
}
