//! MLM driver sound data: songs, samples and the final binary images.
//!
//! [`SoundData`] aggregates every compiled song plus the global SFX sample
//! table and emits the two artifacts the driver consumes:
//!
//! - **SDATA**: a global header (sample-list pointer, song count, per-song
//!   offsets), the SFX sample list, then each song compiled into its own
//!   bank window. Bank 0 spans the fixed 0x2000-byte region plus one
//!   0x7800-byte switchable window minus the header; every further bank is a
//!   0x7800-byte window separated by 0x800 bytes of padding.
//! - **VROM**: all ADPCM-A samples at their 256-byte-unit addresses, filled
//!   with `0x80` and capped at 16 MiB.

mod event;
mod instrument;
mod other_data;
mod pa_encoder;
mod sample;
mod song;

pub use event::{wait_codes, EventKind, Panning, SongEvent, FIRST_SSG_DRIVER_CHANNEL};
pub use instrument::{
    AdpcmaInstrument, FmInstrument, FmOperator, Instrument, SsgInstrument, SsgMixing,
    MLM_INSTRUMENT_SIZE,
};
pub use other_data::{odata_sym_name, ControlMacro, MacroKind, OtherData, SampleList};
pub use pa_encoder::{AdpcmaEncoder, DEFAULT_ENCODER_COMMAND};
pub use sample::{Sample, PAGE_SIZE, PA_PAD_BYTE};
pub use song::{
    dmfnote_to_mlmnote, dmfnote_to_ympitch, dmfnote_to_ympitch_range, mlmvol_to_ymvol,
    ymvol_to_mlmvol, EventList, PlacedSample, Song, Warnings,
};

use crate::dmf;
use crate::sfx::SfxSamples;
use crate::{MlmError, Result};

/// Fixed program bank size.
const FBANK_SIZE: usize = 0x2000;

/// Payload size of one switchable bank.
const SBANK_SIZE: usize = 0x7800;

/// Padding between switchable banks.
const BANK_PAD: usize = 0x800;

/// Hard VROM ceiling.
const VROM_MAX_SIZE: usize = 16 * 1024 * 1024;

/// Everything needed to reproduce music and sound effects: all songs, the
/// SFX samples and the running VROM cursor.
#[derive(Debug, Default)]
pub struct SoundData {
    /// Compiled songs, in input order.
    pub songs: Vec<Song>,
    /// SFX samples with their VROM placement.
    pub sfx: Vec<PlacedSample>,
    vrom_ofs: usize,
    warnings: Warnings,
}

impl SoundData {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble every module into a song, laying samples out one after
    /// another in VROM.
    pub fn add_modules(&mut self, modules: Vec<dmf::Module>, encoder: &AdpcmaEncoder) -> Result<()> {
        for module in &modules {
            let song = Song::from_dmf(module, self.vrom_ofs, encoder, &mut self.warnings)?;
            if let Some(last) = song.samples.last() {
                self.vrom_ofs = last.end_addr + 1;
            }
            self.songs.push(song);
        }
        Ok(())
    }

    /// Encode and place every SFX sample after the song samples.
    pub fn add_sfx(&mut self, sfx: &SfxSamples, encoder: &AdpcmaEncoder) -> Result<()> {
        use std::io::Write as _;

        let mut current = self.vrom_ofs;
        for path in &sfx.paths {
            print!("Converting SFX '{}'...", path.display());
            std::io::stdout().flush().ok();
            let pcm = std::fs::read(path)?;
            let sample = Sample::from_raw_pcm(&pcm, encoder)?;
            self.sfx.push(song::place_sample(&mut current, sample)?);
            println!(" OK");
        }
        self.vrom_ofs = current;
        Ok(())
    }

    /// Compile the SDATA image.
    pub fn compile_sdata(&mut self) -> Result<Vec<u8>> {
        let header_size = self.songs.len() * 2 + 3;
        let mut sdata = vec![0u8; header_size];

        // The SFX sample list sits immediately after the header.
        sdata[0] = (header_size & 0xFF) as u8;
        sdata[1] = (header_size >> 8) as u8;
        sdata[2] = self.songs.len() as u8;

        let sfx_addrs = self
            .sfx
            .iter()
            .map(|p| (p.start_addr, p.end_addr))
            .collect();
        sdata.extend_from_slice(&SampleList::new(sfx_addrs).compile());

        let mut compiled_songs = Vec::with_capacity(self.songs.len());
        for song in &mut self.songs {
            compiled_songs.push(song.compile()?);
        }

        let mut bank = 0;
        for (i, mut compiled) in compiled_songs.into_iter().enumerate() {
            if sdata.len() + compiled.len() > bank_content_limit(bank) {
                // The song opens the next bank; pad the seam with zeros.
                sdata.resize(next_bank_start(bank), 0);
                bank += 1;
            }
            if compiled.len() > bank_budget(bank, header_size) {
                return Err(MlmError::Overflow(format!(
                    "song {} is too big ({} bytes > {} bytes, bank {bank})",
                    i + 1,
                    compiled.len(),
                    bank_budget(bank, header_size),
                )));
            }

            let song_ofs = sdata.len();
            sdata[3 + i * 2] = (song_ofs & 0xFF) as u8;
            sdata[3 + i * 2 + 1] = ((song_ofs >> 8) & 0xFF) as u8;

            self.songs[i].finalize_symbols(&mut compiled, song_ofs)?;
            sdata.extend_from_slice(&compiled);
        }

        Ok(sdata)
    }

    /// Compile the VROM image.
    pub fn compile_vrom(&self) -> Result<Vec<u8>> {
        let mut vrom_units = self.sfx.last().map_or(0, |p| p.end_addr);
        for song in &self.songs {
            if let Some(last) = song.samples.last() {
                vrom_units = vrom_units.max(last.end_addr);
            }
        }

        let vrom_size = vrom_units * PAGE_SIZE;
        if vrom_size > VROM_MAX_SIZE {
            return Err(MlmError::Overflow(
                "VROM size exceeds allowed maximum of 16MiB".into(),
            ));
        }

        let mut vrom = vec![PA_PAD_BYTE; vrom_size];
        let placed = self
            .songs
            .iter()
            .flat_map(|song| song.samples.iter())
            .chain(self.sfx.iter());
        for p in placed {
            let start = p.start_addr * PAGE_SIZE;
            vrom[start..start + p.sample.data.len()].copy_from_slice(&p.sample.data);
        }

        Ok(vrom)
    }
}

/// Maximum compiled size of a song placed in `bank`.
fn bank_budget(bank: usize, header_size: usize) -> usize {
    if bank == 0 {
        FBANK_SIZE + SBANK_SIZE - header_size
    } else {
        SBANK_SIZE
    }
}

/// Last usable SDATA offset (exclusive) of `bank`.
fn bank_content_limit(bank: usize) -> usize {
    FBANK_SIZE + (bank + 1) * SBANK_SIZE + bank.saturating_sub(1) * BANK_PAD
}

/// SDATA offset where the bank after `bank` begins.
fn next_bank_start(bank: usize) -> usize {
    FBANK_SIZE + (bank + 1) * SBANK_SIZE + bank * BANK_PAD
}
