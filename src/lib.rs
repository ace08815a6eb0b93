//! DMF module compiler for the NeoGeo MLM sound driver
//!
//! Converts DefleMask (DMF) tracker modules targeting the NeoGeo hardware
//! profile (4 FM + 3 SSG + 6 ADPCM-A channels) into the two binary images the
//! on-target MLM playback driver consumes:
//!
//! - **SDATA** (`m1_sdata.bin`): a bank-layout-aware program image holding a
//!   global header, a sound-effect sample table and one compiled body per
//!   song (instruments, auxiliary data, per-channel event bytecode).
//! - **VROM** (`vrom.bin`): a 16 MiB-bounded ADPCM-A sample image with
//!   256-byte-aligned samples that never cross a 4 KiB page.
//!
//! # Pipeline
//! 1. [`dmf::Module::from_dmf`] inflates and parses the container.
//! 2. [`dmf::Module::patch_for_mzs`] rewrites the module into a form the
//!    event assembler can compile directly (matrix unroll, row expansion,
//!    position-jump broadcast).
//! 3. [`dmf::Module::optimize`] merges structurally equal patterns and marks
//!    silent channels.
//! 4. [`mzs::Song::from_dmf`] assembles per-channel event lists, instruments
//!    and sample layouts; [`mzs::SoundData`] packs everything into the final
//!    bank-conformant images.
//!
//! # Quick start
//! ```no_run
//! use mlmc::dmf::Module;
//! use mlmc::mzs::{AdpcmaEncoder, SoundData};
//!
//! # fn run() -> mlmc::Result<()> {
//! let data = std::fs::read("song.dmf")?;
//! let mut module = Module::from_dmf(&data)?;
//! module.patch_for_mzs()?;
//! module.optimize();
//!
//! let encoder = AdpcmaEncoder::default();
//! let mut sound_data = SoundData::new();
//! sound_data.add_modules(vec![module], &encoder)?;
//! std::fs::write("m1_sdata.bin", sound_data.compile_sdata()?)?;
//! std::fs::write("vrom.bin", sound_data.compile_vrom()?)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod bits;
pub mod dmf;
pub mod mzs;
pub mod sfx;
pub mod sym_table;

/// Error type for all compiler operations
///
/// Every variant is terminal: errors surface to the CLI driver and abort the
/// run. Informational warnings (sub-C2 SSG notes, unknown effect codes) are
/// printed to stderr instead and never affect the exit status.
#[derive(thiserror::Error, Debug)]
pub enum MlmError {
    /// Corrupted or truncated DMF input
    #[error("Parse error: {0}")]
    Parse(String),

    /// Input uses a DMF feature outside the NeoGeo profile
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// A value fell outside its hardware-imposed range
    #[error("Domain error: {0}")]
    Domain(String),

    /// Conflicting broadcast effects on the same row
    #[error("Clashing effect: {0}")]
    ClashingEffect(String),

    /// Compiled output exceeds a bank, VROM or table limit
    #[error("Overflow: {0}")]
    Overflow(String),

    /// Undefined or doubly-defined assembler symbol
    #[error("Symbol error: {0}")]
    Symbol(String),

    /// The external ADPCM-A encoder failed
    #[error("ADPCM-A encoder error: {0}")]
    ExternalTool(String),

    /// IO error from the filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, MlmError>;

pub use dmf::Module;
pub use mzs::{AdpcmaEncoder, SoundData, Song};
pub use sfx::SfxSamples;
pub use sym_table::SymbolTable;
