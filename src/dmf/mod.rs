//! DMF container reader.
//!
//! Parses the zlib-deflated DefleMask module format (NeoGeo system profile
//! only) into an in-memory [`Module`]: time info, the 13-channel pattern
//! matrix, instruments, patterns and PCM samples.
//!
//! Field order is fixed by the container; every read is bounds-checked so a
//! truncated file surfaces as a parse error instead of a panic.

mod instrument;
mod pattern;
pub mod patch;
mod sample;

pub use instrument::{
    FmInstrument, FmOperator, Instrument, StdArpeggioMode, StdInstrument, StdMacro, FM_OP_COUNT,
};
pub use pattern::{Effect, EffectCode, Note, Pattern, PatternRow};
pub use sample::{Sample, SampleWidth};

use crate::{MlmError, Result};
use std::io::Read;

/// Channel count of the NeoGeo system profile (4 FM + 3 SSG + 6 ADPCM-A).
pub const SYSTEM_TOTAL_CHANNELS: usize = 13;

/// First ADPCM-A channel in DMF order.
pub const FIRST_ADPCMA_CHANNEL: usize = 7;

/// First SSG channel in DMF order.
pub const FIRST_SSG_CHANNEL: usize = 4;

const FORMAT_MAGIC: &[u8; 16] = b".DelekDefleMask.";

/// Synthesis family of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// ADPCM-A sample channel.
    Adpcma,
    /// Four-operator FM channel.
    Fm,
    /// SSG square-wave channel.
    Ssg,
}

/// Synthesis family of a DMF-order channel index.
pub fn channel_kind(channel: usize) -> ChannelKind {
    if channel < FIRST_SSG_CHANNEL {
        ChannelKind::Fm
    } else if channel < FIRST_ADPCMA_CHANNEL {
        ChannelKind::Ssg
    } else {
        ChannelKind::Adpcma
    }
}

/// Target system byte of the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum System {
    Genesis,
    GenesisExt,
    Sms,
    GameBoy,
    PcEngine,
    Nes,
    C64_8580,
    C64_6581,
    Ym2151,
    NeoGeo,
    NeoGeoExt,
}

impl System {
    fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0x02 => System::Genesis,
            0x42 => System::GenesisExt,
            0x03 => System::Sms,
            0x04 => System::GameBoy,
            0x05 => System::PcEngine,
            0x06 => System::Nes,
            0x07 => System::C64_8580,
            0x47 => System::C64_6581,
            0x08 => System::Ym2151,
            0x09 => System::NeoGeo,
            0x49 => System::NeoGeoExt,
            other => return Err(MlmError::Parse(format!("unknown system byte 0x{other:02X}"))),
        })
    }
}

/// Module timing information.
#[derive(Debug, Clone, Copy)]
pub struct TimeInfo {
    /// Global speed multiplier (1-based).
    pub time_base: u32,
    /// Ticks per even row.
    pub tick_time_1: u32,
    /// Ticks per odd row.
    pub tick_time_2: u32,
    /// Refresh rate in Hz.
    pub hz_value: f64,
}

/// The pattern matrix: which pattern each channel plays at each position.
#[derive(Debug, Clone, Default)]
pub struct PatternMatrix {
    /// Rows in every pattern.
    pub rows_per_pattern: usize,
    /// Positions in the matrix.
    pub rows_in_pattern_matrix: usize,
    /// `matrix[channel][position]` → pattern id; `None` marks a channel the
    /// optimizer found to be silent.
    pub matrix: Vec<Option<Vec<usize>>>,
}

/// A parsed DMF module.
#[derive(Debug, Clone)]
pub struct Module {
    /// Container format version byte.
    pub version: u8,
    /// Target system (always NeoGeo here).
    pub system: System,
    /// Song title.
    pub song_name: String,
    /// Song author.
    pub song_author: String,
    /// Timing information.
    pub time_info: TimeInfo,
    /// Pattern matrix.
    pub pattern_matrix: PatternMatrix,
    /// Instruments, indexed by the pattern rows.
    pub instruments: Vec<Instrument>,
    /// `patterns[channel][id]` pattern storage.
    pub patterns: Vec<Vec<Pattern>>,
    /// PCM samples (pitch/amplitude rewrites already applied).
    pub samples: Vec<Sample>,
}

impl Module {
    /// Inflate and parse a DMF file.
    pub fn from_dmf(compressed: &[u8]) -> Result<Self> {
        let mut data = Vec::new();
        flate2::read::ZlibDecoder::new(compressed)
            .read_to_end(&mut data)
            .map_err(|e| MlmError::Parse(format!("zlib inflate failed: {e}")))?;
        Self::from_bytes(&data)
    }

    /// Parse an already-decompressed DMF byte stream.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(data);

        if r.take(16)? != FORMAT_MAGIC {
            return Err(MlmError::Parse("corrupted DMF file (bad magic)".into()));
        }

        let version = r.u8()?;
        let system = System::from_u8(r.u8()?)?;
        if system != System::NeoGeo {
            return Err(MlmError::Unsupported(
                "unsupported system (must be NeoGeo)".into(),
            ));
        }

        let name_len = r.u8()? as usize;
        let song_name = r.ascii(name_len)?;
        let author_len = r.u8()? as usize;
        let song_author = r.ascii(author_len)?;
        r.skip(2)?; // pattern highlight information

        let time_info = Self::parse_time_info(&mut r)?;
        let rows_per_pattern = r.u32_le()? as usize;
        let rows_in_pattern_matrix = r.u8()? as usize;

        let mut matrix = Vec::with_capacity(SYSTEM_TOTAL_CHANNELS);
        for _ in 0..SYSTEM_TOTAL_CHANNELS {
            let mut rows = Vec::with_capacity(rows_in_pattern_matrix);
            for _ in 0..rows_in_pattern_matrix {
                rows.push(r.u8()? as usize);
            }
            matrix.push(Some(rows));
        }

        let instrument_count = r.u8()? as usize;
        let mut instruments = Vec::with_capacity(instrument_count);
        for _ in 0..instrument_count {
            instruments.push(Instrument::parse(&mut r)?);
        }

        if r.u8()? != 0 {
            return Err(MlmError::Unsupported("wavetables aren't supported".into()));
        }

        let mut patterns = Vec::with_capacity(SYSTEM_TOTAL_CHANNELS);
        for _ in 0..SYSTEM_TOTAL_CHANNELS {
            let effect_count = r.u8()? as usize;
            let mut channel_patterns = Vec::with_capacity(rows_in_pattern_matrix);
            for _ in 0..rows_in_pattern_matrix {
                channel_patterns.push(Pattern::parse(&mut r, rows_per_pattern, effect_count)?);
            }
            patterns.push(channel_patterns);
        }

        let sample_count = r.u8()? as usize;
        let mut samples = Vec::with_capacity(sample_count);
        for _ in 0..sample_count {
            samples.push(Sample::parse(&mut r)?);
        }

        Ok(Module {
            version,
            system,
            song_name,
            song_author,
            time_info,
            pattern_matrix: PatternMatrix {
                rows_per_pattern,
                rows_in_pattern_matrix,
                matrix,
            },
            instruments,
            patterns,
            samples,
        })
    }

    fn parse_time_info(r: &mut ByteReader<'_>) -> Result<TimeInfo> {
        let time_base = r.u8()? as u32 + 1;
        let tick_time_1 = r.u8()? as u32;
        let tick_time_2 = r.u8()? as u32;

        let frames_mode = r.u8()?;
        let using_custom_hz = r.u8()? != 0;
        let hz_bytes = r.take(3)?;

        let hz_value = if using_custom_hz {
            // NUL-terminated ASCII decimal digits.
            let digits: Vec<u8> = hz_bytes.iter().copied().take_while(|&b| b != 0).collect();
            let text = std::str::from_utf8(&digits)
                .ok()
                .map(str::trim)
                .unwrap_or("");
            text.parse::<u32>()
                .map_err(|_| MlmError::Parse(format!("invalid custom refresh rate {text:?}")))?
                as f64
        } else {
            match frames_mode {
                0 => 50.0, // PAL
                1 => 60.0, // NTSC
                other => {
                    return Err(MlmError::Parse(format!("invalid frames mode {other}")));
                }
            }
        };

        Ok(TimeInfo {
            time_base,
            tick_time_1,
            tick_time_2,
            hz_value,
        })
    }
}

/// Bounds-checked little-endian cursor over a byte slice.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    fn truncated(&self) -> MlmError {
        MlmError::Parse(format!("truncated DMF data at offset 0x{:X}", self.pos))
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or_else(|| self.truncated())?;
        let slice = self.data.get(self.pos..end).ok_or_else(|| self.truncated())?;
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16_le(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u24_le(&mut self) -> Result<u32> {
        let b = self.take(3)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], 0]))
    }

    pub(crate) fn u32_le(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn ascii(&mut self, len: usize) -> Result<String> {
        let bytes = self.take(len)?;
        Ok(bytes.iter().map(|&b| b as char).collect())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ModuleBuilder;
    use super::*;

    #[test]
    fn test_parse_minimal_module() {
        let mut builder = ModuleBuilder::new(2, 1);
        builder.rows = vec![vec![vec![
            ModuleBuilder::note_row(12, 3, 1),
            ModuleBuilder::empty_row(1),
        ]]];
        let module = Module::from_bytes(&builder.build()).unwrap();

        assert_eq!(module.song_name, "test");
        assert_eq!(module.song_author, "");
        assert_eq!(module.system, System::NeoGeo);
        assert_eq!(module.time_info.time_base, 1);
        assert_eq!(module.time_info.hz_value, 60.0);
        assert_eq!(module.pattern_matrix.rows_per_pattern, 2);
        assert_eq!(module.patterns.len(), SYSTEM_TOTAL_CHANNELS);

        let row = &module.patterns[0][0].rows[0];
        assert_eq!(row.note, Some(Note::C));
        assert_eq!(row.octave, Some(3));
        assert!(module.patterns[0][0].rows[1].is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        let mut data = ModuleBuilder::new(1, 1).build();
        data[0] = b'X';
        assert!(matches!(
            Module::from_bytes(&data),
            Err(MlmError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_rejects_other_systems() {
        let mut data = ModuleBuilder::new(1, 1).build();
        data[17] = 0x02; // GENESIS
        assert!(matches!(
            Module::from_bytes(&data),
            Err(MlmError::Unsupported(_))
        ));
    }

    #[test]
    fn test_parse_rejects_wavetables() {
        let builder = ModuleBuilder::new(1, 1);
        let mut data = builder.build();
        // The wavetable count byte sits right before the 13 pattern blocks;
        // locate it from the start: header + matrix + instrument count.
        let wavetable_ofs = 16 + 2 + 5 + 1 + 2 + 13 + 13 + 1;
        data[wavetable_ofs] = 1;
        assert!(matches!(
            Module::from_bytes(&data),
            Err(MlmError::Unsupported(_))
        ));
    }

    #[test]
    fn test_parse_truncated_input_fails_cleanly() {
        let data = ModuleBuilder::new(4, 2).build();
        for len in [10, 20, 40, data.len() - 1] {
            assert!(Module::from_bytes(&data[..len]).is_err());
        }
    }

    #[test]
    fn test_parse_samples_with_rewrites_applied() {
        let mut builder = ModuleBuilder::new(1, 1);
        builder.samples = vec![vec![0x10, 0x00, 0x20, 0x00]]; // two i16 samples
        let module = Module::from_bytes(&builder.build()).unwrap();

        assert_eq!(module.samples.len(), 1);
        assert_eq!(module.samples[0].name, "smp");
        assert_eq!(module.samples[0].pitch, 0);
        assert_eq!(module.samples[0].amplitude, 0);
        assert_eq!(module.samples[0].data, vec![0x10, 0x20]);
    }

    #[test]
    fn test_channel_kind_split() {
        assert_eq!(channel_kind(0), ChannelKind::Fm);
        assert_eq!(channel_kind(3), ChannelKind::Fm);
        assert_eq!(channel_kind(4), ChannelKind::Ssg);
        assert_eq!(channel_kind(6), ChannelKind::Ssg);
        assert_eq!(channel_kind(7), ChannelKind::Adpcma);
        assert_eq!(channel_kind(12), ChannelKind::Adpcma);
    }

    #[test]
    fn test_zlib_round_trip() {
        use std::io::Write;

        let raw = ModuleBuilder::new(1, 1).build();
        let mut enc =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(&raw).unwrap();
        let compressed = enc.finish().unwrap();

        let module = Module::from_dmf(&compressed).unwrap();
        assert_eq!(module.song_name, "test");
    }
}
