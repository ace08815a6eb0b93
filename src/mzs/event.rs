//! MLM driver event bytecode.
//!
//! Every event carries a `timing` field: the number of ticks the driver
//! waits after the event's effective byte before the next event fires. Most
//! commands encode their operands first and append trailing wait codes; the
//! flow-control commands (end-of-list, jumps, return) wait *before* their
//! opcode so the jump itself happens on the right tick.
//!
//! Address operands are emitted as `0xFF 0xFF` placeholders and registered
//! with the song's symbol table for the finalize pass.

use crate::bits::clamp;
use crate::sym_table::SymbolTable;
use crate::{MlmError, Result};

bitflags::bitflags! {
    /// ADPCM-A/FM output mask, as packed into the set-panning command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Panning: u8 {
        /// Right speaker enable.
        const RIGHT = 0x40;
        /// Left speaker enable.
        const LEFT = 0x80;
    }
}

impl Panning {
    /// Map a DMF panning effect value (`0x01`/`0x10`/`0x11`) to the driver
    /// mask. Anything else mutes both sides.
    pub fn from_dffx(value: u16) -> Self {
        match value {
            0x01 => Panning::RIGHT,
            0x10 => Panning::LEFT,
            0x11 => Panning::RIGHT | Panning::LEFT,
            _ => Panning::empty(),
        }
    }
}

/// Driver-order channel index of the first SSG channel.
///
/// SSG channels use the short `0x30 | nibble` volume form and reject the
/// volume-offset command; the split is decided on this boundary.
pub const FIRST_SSG_DRIVER_CHANNEL: usize = 0x0A;

/// Event payload; one variant per driver command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Stop playback on this channel.
    EndOfList,
    /// Play a note (FM/SSG) or a sample index (ADPCM-A).
    Note(u8),
    /// Release the playing note or sample.
    NoteOff,
    /// Select another instrument slot.
    ChangeInstrument(u8),
    /// Pure delay; serializes to wait codes only.
    WaitTicks,
    /// Set the channel volume in the driver's 0x00-0xFF range.
    SetChannelVol(u8),
    /// Set the stereo output mask.
    SetPanning(Panning),
    /// Call a sub-event list (no nesting).
    JumpToSubEl(usize),
    /// Jump to the given jump-to-sub site of the main list.
    PositionJump(usize),
    /// Return from a sub-event list.
    ReturnFromSubEl,
    /// Continuous upward pitch slide; zero resets the slide.
    PitchSlideUp(u8),
    /// Continuous downward pitch slide; zero resets the slide.
    PitchSlideDown(u8),
    /// Cancel any running pitch slide.
    ResetPitchSlide,
    /// Nudge the channel pitch by a signed fine-tune delta.
    IncPitchOfs(i32),
    /// Overwrite the total level of FM operator `op` (0-3).
    FmTlSet {
        /// Operator index in register order.
        op: usize,
        /// New total level.
        tl: u8,
    },
    /// Short-form relative volume change, ±1..±8 (FM/ADPCM-A only).
    OffsetChannelVol(i32),
}

/// One event with its trailing tick count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongEvent {
    /// Ticks to wait after this event.
    pub timing: u32,
    /// Command payload.
    pub kind: EventKind,
}

impl SongEvent {
    /// An event with zero timing.
    pub fn new(kind: EventKind) -> Self {
        SongEvent { timing: 0, kind }
    }

    /// Serialize this event at `head_ofs` within the song image,
    /// registering address placeholders on `symbols`.
    pub fn compile(&self, ch: usize, symbols: &mut SymbolTable, head_ofs: usize) -> Result<Vec<u8>> {
        let t = self.timing;
        let mut data = Vec::new();

        match self.kind {
            EventKind::EndOfList => {
                data.extend(wait_codes(t));
                data.push(0x00);
            }
            EventKind::Note(note) => {
                data.push(0x80 | clamp(t, 0, 0x7F) as u8);
                data.push(note);
                data.extend(wait_codes(t.saturating_sub(0x7F)));
            }
            EventKind::NoteOff => {
                data.push(0x01);
                data.push(clamp(t, 0, 0xFF) as u8);
                data.extend(wait_codes(t.saturating_sub(0xFF)));
            }
            EventKind::ChangeInstrument(instrument) => {
                data.push(0x02);
                data.push(instrument);
                data.extend(wait_codes(t));
            }
            EventKind::WaitTicks => {
                data.extend(wait_codes(t));
            }
            EventKind::SetChannelVol(volume) => {
                if ch < FIRST_SSG_DRIVER_CHANNEL {
                    data.push(0x05);
                    data.push(volume);
                } else {
                    data.push(0x30 | (volume >> 4));
                }
                data.extend(wait_codes(t));
            }
            EventKind::SetPanning(panning) => {
                data.push(0x06);
                data.push((t & 0x3F) as u8 | panning.bits());
                data.extend(wait_codes(t.saturating_sub(0x3F)));
            }
            EventKind::JumpToSubEl(sub_el_idx) => {
                data.extend(wait_codes(t));
                data.push(0x09);
                symbols.add_ref(&sub_el_sym_name(ch, sub_el_idx), head_ofs + data.len());
                data.extend_from_slice(&[0xFF, 0xFF]);
            }
            EventKind::PositionJump(jsel_idx) => {
                data.extend(wait_codes(t));
                data.push(0x23); // a jump must not carry a slide across
                data.push(0x0B);
                symbols.add_ref(&jsel_sym_name(ch, jsel_idx), head_ofs + data.len());
                data.extend_from_slice(&[0xFF, 0xFF]);
            }
            EventKind::ReturnFromSubEl => {
                data.extend(wait_codes(t));
                data.push(0x20);
            }
            EventKind::PitchSlideUp(ofs) => {
                if ofs > 0 {
                    data.push(0x21);
                    data.push(ofs);
                } else {
                    data.push(0x23);
                }
                data.extend(wait_codes(t));
            }
            EventKind::PitchSlideDown(ofs) => {
                if ofs > 0 {
                    data.push(0x22);
                    data.push(ofs);
                } else {
                    data.push(0x23);
                }
                data.extend(wait_codes(t));
            }
            EventKind::ResetPitchSlide => {
                data.push(0x23);
                data.extend(wait_codes(t));
            }
            EventKind::IncPitchOfs(delta) => {
                if delta > 0 {
                    data.push(0x21);
                    data.push(clamp(delta, 0, 0xFF) as u8);
                } else if delta < 0 {
                    data.push(0x22);
                    data.push(clamp(-delta, 0, 0xFF) as u8);
                } else {
                    data.push(0x23);
                }
                data.extend(wait_codes(t));
            }
            EventKind::FmTlSet { op, tl } => {
                debug_assert!(op < 4);
                data.push(0x24 + op as u8);
                data.push(tl);
                data.extend(wait_codes(t));
            }
            EventKind::OffsetChannelVol(ofs) => {
                if ch >= FIRST_SSG_DRIVER_CHANNEL {
                    return Err(MlmError::Domain(
                        "volume offset command is incompatible with SSG channels".into(),
                    ));
                }
                if ofs == 0 || !(-8..=8).contains(&ofs) {
                    return Err(MlmError::Domain(format!(
                        "invalid volume offset {ofs} (must be ±1..±8)"
                    )));
                }
                let mut nibble = (ofs.unsigned_abs() - 1) as u8;
                if ofs < 0 {
                    nibble |= 8;
                }
                data.push(0x30 | nibble);
                data.extend(wait_codes(t));
            }
        }

        Ok(data)
    }
}

/// Encode a tick count as wait commands.
///
/// Counts up to 0x10 fit the nibble form `0x10 | (t-1)`; longer waits chain
/// byte-form `0x03 tt` commands.
pub fn wait_codes(mut t: u32) -> Vec<u8> {
    let mut data = Vec::new();
    while t > 0 {
        if t > 0x10 {
            data.push(0x03);
            data.push(((t - 1) & 0xFF) as u8);
            t = t.saturating_sub(0x100);
        } else {
            data.push(0x10 | ((t - 1) & 0x0F) as u8);
            t = t.saturating_sub(0x10);
        }
    }
    data
}

/// Symbol name of a channel's main event list.
pub(crate) fn main_el_sym_name(ch: usize) -> String {
    format!("EL:{ch:02X}")
}

/// Symbol name of a sub-event list body.
pub(crate) fn sub_el_sym_name(ch: usize, idx: usize) -> String {
    format!("SUBEL:CH{ch:X};{idx:02X}")
}

/// Symbol name of a jump-to-sub command site (position-jump target).
pub(crate) fn jsel_sym_name(ch: usize, idx: usize) -> String {
    format!("JSEL:CH{ch:X};{idx:02X}")
}
