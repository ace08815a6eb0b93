//! DMF pattern data: notes, effects and rows.
//!
//! Structural equality and hashing on [`Pattern`] drive the optimizer's
//! pattern merging, so every field that affects playback participates in the
//! derived `PartialEq`/`Hash` implementations.

use super::ByteReader;
use crate::{MlmError, Result};

/// A semitone as stored in the DMF container.
///
/// C is encoded as 12 rather than 0; `NoteOff` is a sentinel row value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Note {
    Empty = 0,
    Cs = 1,
    D = 2,
    Ds = 3,
    E = 4,
    F = 5,
    Fs = 6,
    G = 7,
    Gs = 8,
    A = 9,
    As = 10,
    B = 11,
    C = 12,
    NoteOff = 100,
}

impl Note {
    /// Decode a 16-bit note field.
    pub fn from_u16(value: u16) -> Result<Self> {
        Ok(match value {
            0 => Note::Empty,
            1 => Note::Cs,
            2 => Note::D,
            3 => Note::Ds,
            4 => Note::E,
            5 => Note::F,
            6 => Note::Fs,
            7 => Note::G,
            8 => Note::Gs,
            9 => Note::A,
            10 => Note::As,
            11 => Note::B,
            12 => Note::C,
            100 => Note::NoteOff,
            other => return Err(MlmError::Parse(format!("invalid note value {other}"))),
        })
    }

    /// The raw semitone value (C = 12).
    pub fn value(self) -> u8 {
        self as u8
    }
}

/// DMF effect column codes.
///
/// Only a subset converts to MLM driver commands; the rest are preserved
/// through parsing so the assembler can keep row timing consistent and warn
/// about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum EffectCode {
    Empty,
    Arpeggio,
    PortamentoUp,
    PortamentoDown,
    PortaToNote,
    Vibrato,
    PortaToNoteAndVolSlide,
    VibratoAndVolSlide,
    Tremolo,
    Panning,
    SetSpeed1,
    VolSlide,
    PosJump,
    Retrig,
    PatternBreak,
    SetSpeed2,
    LfoControl,
    FeedbackControl,
    FmTlOp1Control,
    FmTlOp2Control,
    FmTlOp3Control,
    FmTlOp4Control,
    FmMultControl,
    FmDacEnable,
    FmExtCh2Enable,
    FmGlobalArControl,
    FmArOp1Control,
    FmArOp2Control,
    FmArOp3Control,
    FmArOp4Control,
    SsgSetChannelMode,
    SsgSetNoiseTone,
    ArpeggioTickSpeed,
    NoteSlideUp,
    NoteSlideDown,
    SetVibratoMode,
    SetFineVibratoDepth,
    SetFineTune,
    SetLegatoMode,
    SetSamplesBank,
    NoteCut,
    NoteDelay,
    SyncSignal,
    SetGlobalFineTune,
}

impl EffectCode {
    /// Decode a 16-bit effect code field.
    pub fn from_u16(value: u16) -> Result<Self> {
        Ok(match value {
            0xFFFF => EffectCode::Empty,
            0x00 => EffectCode::Arpeggio,
            0x01 => EffectCode::PortamentoUp,
            0x02 => EffectCode::PortamentoDown,
            0x03 => EffectCode::PortaToNote,
            0x04 => EffectCode::Vibrato,
            0x05 => EffectCode::PortaToNoteAndVolSlide,
            0x06 => EffectCode::VibratoAndVolSlide,
            0x07 => EffectCode::Tremolo,
            0x08 => EffectCode::Panning,
            0x09 => EffectCode::SetSpeed1,
            0x0A => EffectCode::VolSlide,
            0x0B => EffectCode::PosJump,
            0x0C => EffectCode::Retrig,
            0x0D => EffectCode::PatternBreak,
            0x0F => EffectCode::SetSpeed2,
            0x10 => EffectCode::LfoControl,
            0x11 => EffectCode::FeedbackControl,
            0x12 => EffectCode::FmTlOp1Control,
            0x13 => EffectCode::FmTlOp2Control,
            0x14 => EffectCode::FmTlOp3Control,
            0x15 => EffectCode::FmTlOp4Control,
            0x16 => EffectCode::FmMultControl,
            0x17 => EffectCode::FmDacEnable,
            0x18 => EffectCode::FmExtCh2Enable,
            0x19 => EffectCode::FmGlobalArControl,
            0x1A => EffectCode::FmArOp1Control,
            0x1B => EffectCode::FmArOp2Control,
            0x1C => EffectCode::FmArOp3Control,
            0x1D => EffectCode::FmArOp4Control,
            0x20 => EffectCode::SsgSetChannelMode,
            0x21 => EffectCode::SsgSetNoiseTone,
            0xE0 => EffectCode::ArpeggioTickSpeed,
            0xE1 => EffectCode::NoteSlideUp,
            0xE2 => EffectCode::NoteSlideDown,
            0xE3 => EffectCode::SetVibratoMode,
            0xE4 => EffectCode::SetFineVibratoDepth,
            0xE5 => EffectCode::SetFineTune,
            0xEA => EffectCode::SetLegatoMode,
            0xEB => EffectCode::SetSamplesBank,
            0xEC => EffectCode::NoteCut,
            0xED => EffectCode::NoteDelay,
            0xEE => EffectCode::SyncSignal,
            0xEF => EffectCode::SetGlobalFineTune,
            other => {
                return Err(MlmError::Parse(format!(
                    "invalid effect code 0x{other:04X}"
                )))
            }
        })
    }
}

/// One effect column entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Effect {
    /// Effect code.
    pub code: EffectCode,
    /// Effect parameter; `0xFFFF` in the container means absent.
    pub value: Option<u16>,
}

impl Effect {
    /// Build an effect, mapping the `0xFFFF` sentinel to an absent value.
    pub fn new(code: EffectCode, raw_value: u16) -> Self {
        let value = if raw_value == 0xFFFF {
            None
        } else {
            Some(raw_value)
        };
        Effect { code, value }
    }
}

/// One row of a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PatternRow {
    /// Semitone, if the row triggers or releases a note.
    pub note: Option<Note>,
    /// Octave of the note.
    pub octave: Option<u16>,
    /// Channel volume change.
    pub volume: Option<u16>,
    /// Instrument change.
    pub instrument: Option<u16>,
    /// Effect columns.
    pub effects: Vec<Effect>,
}

impl PatternRow {
    pub(crate) fn parse(r: &mut ByteReader<'_>, effect_count: usize) -> Result<Self> {
        let note_raw = r.u16_le()?;
        let octave = r.u16_le()?;
        let volume = r.u16_le()?;

        let mut effects = Vec::with_capacity(effect_count);
        for _ in 0..effect_count {
            let code = EffectCode::from_u16(r.u16_le()?)?;
            let value = r.u16_le()?;
            effects.push(Effect::new(code, value));
        }

        let instrument = r.u16_le()?;

        let note = Note::from_u16(note_raw)?;
        let (note, octave) = if note == Note::Empty && octave == 0 {
            (None, None)
        } else {
            (Some(note), Some(octave))
        };

        Ok(PatternRow {
            note,
            octave,
            volume: if volume == 0xFFFF { None } else { Some(volume) },
            instrument: if instrument == 0xFFFF {
                None
            } else {
                Some(instrument)
            },
            effects,
        })
    }

    /// A fully blank row, as inserted by the row-expansion pass.
    pub fn empty() -> Self {
        PatternRow::default()
    }

    /// True when no field is set and every effect is the empty sentinel.
    pub fn is_empty(&self) -> bool {
        self.note.is_none()
            && self.octave.is_none()
            && self.volume.is_none()
            && self.instrument.is_none()
            && self
                .effects
                .iter()
                .all(|fx| fx.code == EffectCode::Empty && fx.value.is_none())
    }
}

/// A fixed-length block of rows for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    /// Rows, in playback order.
    pub rows: Vec<PatternRow>,
}

impl Pattern {
    pub(crate) fn parse(
        r: &mut ByteReader<'_>,
        rows_per_pattern: usize,
        effect_count: usize,
    ) -> Result<Self> {
        let mut rows = Vec::with_capacity(rows_per_pattern);
        for _ in 0..rows_per_pattern {
            rows.push(PatternRow::parse(r, effect_count)?);
        }
        Ok(Pattern { rows })
    }

    /// True when every row is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(PatternRow::is_empty)
    }
}
