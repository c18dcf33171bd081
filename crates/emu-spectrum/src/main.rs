//! ZX Spectrum emulator binary.
//!
//! Runs the machine headless for a number of frames, optionally loading a
//! .Z80 snapshot first and saving one afterwards. Settings come from an
//! optional TOML file; command-line flags override it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use serde::Deserialize;

use emu_spectrum::{DirTape, Spectrum, SpectrumConfig, SpectrumModel};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    #[value(name = "48k")]
    Spectrum48K,
    #[value(name = "128k")]
    Spectrum128K,
}

impl From<ModelArg> for SpectrumModel {
    fn from(model: ModelArg) -> Self {
        match model {
            ModelArg::Spectrum48K => Self::Spectrum48K,
            ModelArg::Spectrum128K => Self::Spectrum128K,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "emu-spectrum", version, about = "ZX Spectrum 48K/128K emulator")]
struct Cli {
    /// Machine model (default: from the ROM size)
    #[arg(long, value_enum)]
    model: Option<ModelArg>,

    /// ROM image: 16K for the 48K, 32K for the 128K
    #[arg(long)]
    rom: Option<PathBuf>,

    /// .Z80 snapshot to load after reset
    #[arg(long)]
    z80: Option<PathBuf>,

    /// Write a .Z80 snapshot here when the run ends
    #[arg(long)]
    save_z80: Option<PathBuf>,

    /// Directory of tape blocks for the ROM load/save traps
    #[arg(long)]
    tap_dir: Option<PathBuf>,

    /// Number of 50 Hz frames to run
    #[arg(long)]
    frames: Option<u64>,

    /// Run as fast as possible
    #[arg(long)]
    turbo: bool,

    /// TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Settings file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    model: Option<SpectrumModel>,
    rom: Option<PathBuf>,
    tap_dir: Option<PathBuf>,
    frames: Option<u64>,
    turbo: Option<bool>,
    tape_traps: Option<bool>,
    use_shadow_regs: Option<bool>,
    cycles_per_tick: Option<u64>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

const DEFAULT_FRAMES: u64 = 50;

fn build_config(cli: &Cli, file: &FileConfig) -> Result<SpectrumConfig> {
    let Some(rom_path) = cli.rom.as_ref().or(file.rom.as_ref()) else {
        bail!("no ROM given: pass --rom or set `rom` in the config file");
    };
    let rom = fs::read(rom_path).with_context(|| format!("reading ROM {}", rom_path.display()))?;

    let model = cli
        .model
        .map(SpectrumModel::from)
        .or(file.model)
        .unwrap_or(if rom.len() == SpectrumModel::Spectrum128K.rom_size() {
            SpectrumModel::Spectrum128K
        } else {
            SpectrumModel::Spectrum48K
        });

    let mut config = SpectrumConfig::new(model, rom);
    config.turbo = cli.turbo || file.turbo.unwrap_or(false);
    if let Some(traps) = file.tape_traps {
        config.tape_traps = traps;
    }
    if let Some(shadow) = file.use_shadow_regs {
        config.use_shadow_regs = shadow;
    }
    if let Some(cycles) = file.cycles_per_tick {
        config.cycles_per_tick = cycles;
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let config = build_config(&cli, &file)?;
    log::info!(
        "starting {:?}{}",
        config.model,
        if config.turbo { " (turbo)" } else { "" }
    );

    let mut spectrum = Spectrum::new(&config).context("creating machine")?;

    if let Some(dir) = cli.tap_dir.as_ref().or(file.tap_dir.as_ref()) {
        let tape = DirTape::open(dir).with_context(|| format!("opening tape dir {}", dir.display()))?;
        spectrum.attach_tape(Box::new(tape));
    }

    if let Some(path) = &cli.z80 {
        let data = fs::read(path).with_context(|| format!("reading snapshot {}", path.display()))?;
        spectrum
            .load_snapshot(&data)
            .with_context(|| format!("loading snapshot {}", path.display()))?;
        log::info!("loaded snapshot {}, PC=${:04X}", path.display(), spectrum.cpu().pc());
    }

    let frames = cli.frames.or(file.frames).unwrap_or(DEFAULT_FRAMES);
    let mut stdout = std::io::stdout().lock();
    for _ in 0..frames {
        spectrum.run_frame();
        let output = spectrum.serial_output();
        if !output.is_empty() {
            stdout.write_all(&output).context("writing serial output")?;
            stdout.flush().context("writing serial output")?;
        }
    }
    log::info!(
        "ran {frames} frames, {} cycles, PC=${:04X}",
        spectrum.cpu().total_ticks().get(),
        spectrum.cpu().pc()
    );

    if let Some(path) = &cli.save_z80 {
        fs::write(path, spectrum.save_snapshot())
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        log::info!("saved snapshot {}", path.display());
    }

    Ok(())
}
