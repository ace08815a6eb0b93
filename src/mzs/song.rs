//! Song assembly: normalized DMF modules → per-channel event bytecode.
//!
//! A [`Song`] owns 13 channel slots in the driver's order, one sub-event
//! list per distinct pattern on each channel, the converted instrument bank,
//! auxiliary data and the song's VROM sample layout. [`Song::compile`]
//! flattens all of it into a relocatable byte image whose addresses are
//! resolved by the song-local symbol table.

use super::event::{
    jsel_sym_name, main_el_sym_name, sub_el_sym_name, EventKind, Panning, SongEvent,
};
use super::instrument::{
    AdpcmaInstrument, FmInstrument, Instrument, SsgInstrument, MLM_INSTRUMENT_SIZE,
};
use super::other_data::{odata_sym_name, OtherData, SampleList};
use super::pa_encoder::AdpcmaEncoder;
use super::sample::Sample;
use crate::dmf::{self, channel_kind, ChannelKind, EffectCode, Note, SYSTEM_TOTAL_CHANNELS};
use crate::sym_table::SymbolTable;
use crate::{MlmError, Result};
use std::collections::{BTreeSet, HashSet};

/// Highest refresh rate Timer A can express (Hz).
const TMA_MAX_FREQ: f64 = 55560.0;

/// Lowest refresh rate Timer A can express (Hz).
const TMA_MIN_FREQ: f64 = 54.25;

/// Largest driver-side time base multiplier.
const MAX_TIME_BASE: u32 = 255;

/// DMF channel order (FM 0-3, SSG 4-6, ADPCM-A 7-12) → driver channel
/// order (ADPCM-A 0-5, FM 6-9, SSG 10-12).
const DMF2MLM_CH_ORDER: [usize; SYSTEM_TOTAL_CHANNELS] =
    [6, 7, 8, 9, 10, 11, 12, 0, 1, 2, 3, 4, 5];

/// YM2610 F-numbers for C..B within one octave.
const FM_PITCH_LUT: [i32; 12] = [
    0x269, 0x28E, 0x2B5, 0x2DE, 0x30A, 0x338, 0x369, 0x39D, 0x3D4, 0x40E, 0x44C, 0x48D,
];

/// SSG base frequencies for C2..B2 (Hz).
const SSG_BASE_PITCHES: [f64; 12] = [
    65.41, 69.30, 73.42, 77.78, 82.41, 87.31, 92.50, 98.00, 103.83, 110.00, 116.54, 123.47,
];

/// Per-run warning dedup; warnings go to stderr and never fail the run.
#[derive(Debug, Default)]
pub struct Warnings {
    unknown_effects: HashSet<EffectCode>,
    ssg_below_c2: bool,
}

impl Warnings {
    /// A fresh warning tracker for one compiler run.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn unknown_effect(&mut self, code: EffectCode) {
        if self.unknown_effects.insert(code) {
            eprintln!("WARNING: {code:?} effect conversion isn't implemented and will be ignored");
        }
    }

    pub(crate) fn ssg_note_below_c2(&mut self) {
        if !self.ssg_below_c2 {
            self.ssg_below_c2 = true;
            eprintln!("WARNING: SSG notes lower than C2 present, they have been clamped to C2");
        }
    }
}

/// A sequence of driver events for one channel or pattern.
#[derive(Debug, Default, Clone)]
pub struct EventList {
    /// Events in playback order.
    pub events: Vec<SongEvent>,
}

/// An encoded sample with its VROM placement, in 256-byte units.
#[derive(Debug, Clone)]
pub struct PlacedSample {
    /// Encoded ADPCM-A data.
    pub sample: Sample,
    /// First occupied 256-byte unit.
    pub start_addr: usize,
    /// One past the last occupied 256-byte unit.
    pub end_addr: usize,
}

/// One compiled song.
#[derive(Debug)]
pub struct Song {
    /// Main event lists in driver channel order; `None` means silent.
    pub channels: Vec<Option<EventList>>,
    /// `sub_event_lists[channel][idx]`, mirroring `channels` nullability.
    pub sub_event_lists: Vec<Option<Vec<EventList>>>,
    /// Instrument bank (module instruments plus the ADPCM-A slot).
    pub instruments: Vec<Instrument>,
    /// Auxiliary data records (control macros, sample list).
    pub other_data: Vec<OtherData>,
    /// Timer A preload for the song's refresh rate.
    pub tma_counter: u16,
    /// Driver time-base multiplier.
    pub time_base: u8,
    /// VROM sample layout.
    pub samples: Vec<PlacedSample>,
    symbols: SymbolTable,
}

impl Song {
    /// Assemble a song from a normalized, optimized module.
    ///
    /// `vrom_ofs` is the first free VROM unit; samples are encoded through
    /// `encoder` and laid out from there.
    pub fn from_dmf(
        module: &dmf::Module,
        vrom_ofs: usize,
        encoder: &AdpcmaEncoder,
        warnings: &mut Warnings,
    ) -> Result<Self> {
        let (hz_eff, time_base) = select_time_base(module.time_info.hz_value)?;
        let tma_counter = calculate_tma_counter(hz_eff)?;

        let mut song = Song {
            channels: (0..SYSTEM_TOTAL_CHANNELS).map(|_| None).collect(),
            sub_event_lists: (0..SYSTEM_TOTAL_CHANNELS).map(|_| None).collect(),
            instruments: Vec::new(),
            other_data: Vec::new(),
            tma_counter,
            time_base,
            samples: Vec::new(),
            symbols: SymbolTable::new(),
        };

        song.samples_from_dmf(module, vrom_ofs, encoder)?;
        song.instruments_from_dmf(module)?;

        for ch in 0..SYSTEM_TOTAL_CHANNELS {
            let Some(matrix_rows) = &module.pattern_matrix.matrix[ch] else {
                continue;
            };

            // Distinct pattern ids in ascending order; their rank is the
            // sub-event-list index.
            let unique: Vec<usize> = matrix_rows
                .iter()
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            let mut main = EventList::default();
            if channel_kind(ch) == ChannelKind::Adpcma {
                let pa_inst = (song.instruments.len() - 1) as u8;
                main.events
                    .push(SongEvent::new(EventKind::ChangeInstrument(pa_inst)));
            }
            for pat in matrix_rows {
                let sub_el_idx = unique
                    .binary_search(pat)
                    .map_err(|_| MlmError::Domain("pattern matrix references a missing pattern".into()))?;
                main.events
                    .push(SongEvent::new(EventKind::JumpToSubEl(sub_el_idx)));
            }
            main.events.push(SongEvent::new(EventKind::EndOfList));

            let mut subs = Vec::with_capacity(unique.len());
            for &pat in &unique {
                subs.push(song.sub_el_from_pattern(
                    &module.patterns[ch][pat],
                    ch,
                    &module.time_info,
                    warnings,
                )?);
            }

            song.channels[ch] = Some(main);
            song.sub_event_lists[ch] = Some(subs);
        }

        song.reorder_channels();
        Ok(song)
    }

    fn samples_from_dmf(
        &mut self,
        module: &dmf::Module,
        vrom_ofs: usize,
        encoder: &AdpcmaEncoder,
    ) -> Result<()> {
        let mut current = vrom_ofs;
        for dsmp in &module.samples {
            let sample = Sample::from_dmf_sample(dsmp, encoder)?;
            self.samples.push(place_sample(&mut current, sample)?);
        }
        Ok(())
    }

    fn instruments_from_dmf(&mut self, module: &dmf::Module) -> Result<()> {
        if module.instruments.len() > 254 {
            return Err(MlmError::Overflow(
                "maximum supported instrument count is 254".into(),
            ));
        }

        for dinst in &module.instruments {
            match dinst {
                dmf::Instrument::Fm(inst) => self
                    .instruments
                    .push(Instrument::Fm(FmInstrument::from_dmf_inst(inst))),
                dmf::Instrument::Std(inst) => {
                    let (ssg, new_odata) =
                        SsgInstrument::from_dmf_inst(inst, self.other_data.len())?;
                    self.instruments.push(Instrument::Ssg(ssg));
                    self.other_data.extend(new_odata);
                }
            }
        }

        // The ADPCM-A slot always comes last and points at the sample list.
        self.instruments.push(Instrument::Adpcma(AdpcmaInstrument {
            sample_list: self.other_data.len(),
        }));
        let addresses = self
            .samples
            .iter()
            .map(|p| (p.start_addr, p.end_addr))
            .collect();
        self.other_data
            .push(OtherData::SampleList(SampleList::new(addresses)));
        Ok(())
    }

    /// Translate one pattern into a sub-event list: scan rows in order,
    /// coalesce empty-row time into the previous event's timing, track the
    /// running channel state and map DMF effects onto driver commands.
    fn sub_el_from_pattern(
        &self,
        pattern: &dmf::Pattern,
        ch: usize,
        time_info: &dmf::TimeInfo,
        warnings: &mut Warnings,
    ) -> Result<EventList> {
        let ch_kind = channel_kind(ch);
        let mut sub_el = EventList::default();
        // Sentinel that absorbs leading ticks before the first command.
        sub_el.events.push(SongEvent::new(EventKind::WaitTicks));

        let mut ticks_since_last_com: u32 = 0;
        let mut current_instrument: Option<u16> = None;
        let mut current_volume: Option<u16> = None;
        let mut current_note: Option<Note> = None;
        let mut current_octave: Option<u16> = None;
        let mut current_fine_tune: i32 = 0;
        let mut sample_bank: u16 = 0;
        let mut do_end_pattern = false;

        for (i, row) in pattern.rows.iter().enumerate() {
            do_end_pattern = false;

            if !row.is_empty() {
                add_ticks_to_last(&mut sub_el.events, ticks_since_last_com);
                ticks_since_last_com = 0;

                // Bank switches apply before any note on this row can use
                // the samples.
                for fx in &row.effects {
                    if fx.code == EffectCode::SetSamplesBank {
                        if let Some(bank) = fx.value {
                            let bank_count = (self.samples.len() + 11) / 12;
                            if (bank as usize) < bank_count {
                                sample_bank = bank;
                            }
                        }
                    }
                }

                if row.note == Some(Note::NoteOff) {
                    sub_el.events.push(SongEvent::new(EventKind::NoteOff));
                    current_note = None;
                    current_octave = None;
                }

                if let Some(volume) = row.volume {
                    if Some(volume) != current_volume {
                        let mlm_volume = ymvol_to_mlmvol(ch_kind, volume);
                        sub_el
                            .events
                            .push(SongEvent::new(EventKind::SetChannelVol(mlm_volume)));
                        current_volume = Some(volume);
                    }
                }

                if let Some(instrument) = row.instrument {
                    if Some(instrument) != current_instrument && ch_kind != ChannelKind::Adpcma {
                        current_instrument = Some(instrument);
                        sub_el
                            .events
                            .push(SongEvent::new(EventKind::ChangeInstrument(instrument as u8)));
                    }
                }

                if let (Some(note), Some(octave)) = (row.note, row.octave) {
                    if note != Note::NoteOff {
                        current_note = Some(note);
                        current_octave = Some(octave);
                        current_fine_tune = 0;
                        let mut mlm_note = dmfnote_to_mlmnote(ch_kind, note, octave, warnings);
                        if ch_kind == ChannelKind::Adpcma {
                            mlm_note = mlm_note.wrapping_add((sample_bank as u8).wrapping_mul(12));
                        }
                        sub_el.events.push(SongEvent::new(EventKind::Note(mlm_note)));
                    }
                }

                for fx in &row.effects {
                    match fx.code {
                        EffectCode::SetSamplesBank => {}
                        EffectCode::SetFineTune => {
                            let (Some(value), Some(note), Some(octave)) =
                                (fx.value, current_note, current_octave)
                            else {
                                continue;
                            };
                            let (middle, lower, higher) =
                                dmfnote_to_ympitch_range(ch_kind, note, octave)?;
                            let value = value as i32;
                            let new_ftune = if value > 0x80 {
                                (higher - middle) as f64 * (value - 128) as f64 / 127.0
                            } else if value < 0x80 {
                                (lower - middle) as f64 * (128 - value) as f64 / -128.0
                            } else {
                                0.0
                            };
                            let new_ftune = new_ftune.round() as i32;
                            sub_el.events.push(SongEvent::new(EventKind::IncPitchOfs(
                                new_ftune - current_fine_tune,
                            )));
                            current_fine_tune = new_ftune;
                        }
                        code => {
                            let Some(value) = fx.value else { continue };
                            let kind = match code {
                                EffectCode::PortamentoUp => {
                                    Some(EventKind::PitchSlideUp(value as u8))
                                }
                                EffectCode::PortamentoDown => {
                                    Some(EventKind::PitchSlideDown(value as u8))
                                }
                                EffectCode::Panning => {
                                    Some(EventKind::SetPanning(Panning::from_dffx(value)))
                                }
                                EffectCode::PosJump => {
                                    do_end_pattern = true;
                                    Some(EventKind::PositionJump(value as usize))
                                }
                                EffectCode::FmTlOp1Control => {
                                    Some(EventKind::FmTlSet { op: 0, tl: value as u8 })
                                }
                                EffectCode::FmTlOp2Control => {
                                    Some(EventKind::FmTlSet { op: 1, tl: value as u8 })
                                }
                                EffectCode::FmTlOp3Control => {
                                    Some(EventKind::FmTlSet { op: 2, tl: value as u8 })
                                }
                                EffectCode::FmTlOp4Control => {
                                    Some(EventKind::FmTlSet { op: 3, tl: value as u8 })
                                }
                                _ => None,
                            };
                            match kind {
                                Some(kind) => sub_el.events.push(SongEvent::new(kind)),
                                None => {
                                    // Keep the row's duration without any
                                    // audible change.
                                    sub_el.events.push(SongEvent::new(EventKind::WaitTicks));
                                    warnings.unknown_effect(code);
                                }
                            }
                        }
                    }
                }
            }

            ticks_since_last_com += if i % 2 == 0 {
                time_info.tick_time_1 * time_info.time_base
            } else {
                time_info.tick_time_2 * time_info.time_base
            };
            if do_end_pattern {
                break;
            }
        }

        add_ticks_to_last(&mut sub_el.events, ticks_since_last_com);

        // A position jump already left the pattern; a return would be
        // unreachable.
        if !do_end_pattern {
            sub_el
                .events
                .push(SongEvent::new(EventKind::ReturnFromSubEl));
        }
        Ok(sub_el)
    }

    fn reorder_channels(&mut self) {
        let old_channels = std::mem::take(&mut self.channels);
        let old_subs = std::mem::take(&mut self.sub_event_lists);
        self.channels = (0..SYSTEM_TOTAL_CHANNELS).map(|_| None).collect();
        self.sub_event_lists = (0..SYSTEM_TOTAL_CHANNELS).map(|_| None).collect();

        for (i, el) in old_channels.into_iter().enumerate() {
            self.channels[DMF2MLM_CH_ORDER[i]] = el;
        }
        for (i, subs) in old_subs.into_iter().enumerate() {
            self.sub_event_lists[DMF2MLM_CH_ORDER[i]] = subs;
        }
    }

    /// Compile the song into a relocatable byte image.
    ///
    /// Layout: header, instrument bank, auxiliary data, then per channel the
    /// main event list (with a `JSEL` symbol at every jump-to-sub site)
    /// followed by its sub-event lists.
    pub fn compile(&mut self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let symbols = &mut self.symbols;

        symbols.define("HEADER", 0)?;
        compile_header(
            &mut data,
            symbols,
            &self.channels,
            self.tma_counter,
            self.time_base,
        );

        symbols.define("INSTRUMENTS", data.len())?;
        for inst in &self.instruments {
            let slot = inst.compile(symbols, data.len());
            debug_assert_eq!(slot.len(), MLM_INSTRUMENT_SIZE);
            data.extend_from_slice(&slot);
        }

        for (i, odata) in self.other_data.iter().enumerate() {
            symbols.define(&odata_sym_name(i), data.len())?;
            data.extend_from_slice(&odata.compile());
        }

        for ch in 0..SYSTEM_TOTAL_CHANNELS {
            let Some(el) = &self.channels[ch] else { continue };

            symbols.define(&main_el_sym_name(ch), data.len())?;
            let mut jsel_count = 0;
            for event in &el.events {
                if matches!(event.kind, EventKind::JumpToSubEl(_)) {
                    // Position jumps land on the jump command itself, so the
                    // symbol covers the event's leading wait bytes too.
                    symbols.define(&jsel_sym_name(ch, jsel_count), data.len())?;
                    jsel_count += 1;
                }
                let bytes = event.compile(ch, symbols, data.len())?;
                data.extend_from_slice(&bytes);
            }

            if let Some(sub_els) = &self.sub_event_lists[ch] {
                for (idx, sub_el) in sub_els.iter().enumerate() {
                    symbols.define(&sub_el_sym_name(ch, idx), data.len())?;
                    for event in &sub_el.events {
                        let bytes = event.compile(ch, symbols, data.len())?;
                        data.extend_from_slice(&bytes);
                    }
                }
            }
        }

        Ok(data)
    }

    /// Patch every address placeholder of a compiled image, with the song
    /// placed at `base_ofs` inside SDATA.
    pub fn finalize_symbols(&self, image: &mut [u8], base_ofs: usize) -> Result<()> {
        self.symbols.finalize(image, base_ofs)
    }
}

fn add_ticks_to_last(events: &mut [SongEvent], ticks: u32) {
    if let Some(last) = events.last_mut() {
        last.timing += ticks;
    }
}

fn compile_header(
    data: &mut Vec<u8>,
    symbols: &mut SymbolTable,
    channels: &[Option<EventList>],
    tma_counter: u16,
    time_base: u8,
) {
    for (ch, channel) in channels.iter().enumerate() {
        if channel.is_some() {
            symbols.add_ref(&main_el_sym_name(ch), data.len());
            data.extend_from_slice(&[0xFF, 0xFF]);
        } else {
            data.extend_from_slice(&[0x00, 0x00]);
        }
    }

    data.push((tma_counter & 0xFF) as u8);
    data.push((tma_counter >> 8) as u8);
    data.push(time_base);

    symbols.add_ref("INSTRUMENTS", data.len());
    data.extend_from_slice(&[0xFF, 0xFF]);
}

/// Lay a sample out at the running cursor, bumping it to the next 4 KiB
/// page when it would otherwise cross one. Addresses are 256-byte units.
pub(crate) fn place_sample(current: &mut usize, sample: Sample) -> Result<PlacedSample> {
    let pages = sample.pages();
    if pages > 0x10 {
        return Err(MlmError::Overflow(format!(
            "sample of {} bytes cannot fit a single 4KiB page",
            sample.data.len()
        )));
    }

    let mut start_addr = *current;
    let mut end_addr = start_addr + pages;
    if (start_addr >> 4) != (end_addr >> 4) {
        start_addr = (end_addr >> 4) << 4;
        end_addr = start_addr + pages;
    }

    *current = end_addr + 1;
    Ok(PlacedSample {
        sample,
        start_addr,
        end_addr,
    })
}

/// Find the driver time base that brings `hz` into Timer A's range.
///
/// Returns the effective refresh rate and the time base.
fn select_time_base(hz: f64) -> Result<(f64, u8)> {
    if hz > TMA_MAX_FREQ {
        return Err(MlmError::Domain(format!(
            "invalid refresh rate {hz}Hz (higher than 55.56kHz)"
        )));
    }

    if hz >= TMA_MIN_FREQ {
        return Ok((hz, 1));
    }

    for time_base in 2..=MAX_TIME_BASE {
        let candidate = hz * time_base as f64;
        if candidate > TMA_MAX_FREQ {
            break;
        }
        if candidate > TMA_MIN_FREQ {
            return Ok((candidate, time_base as u8));
        }
    }

    Err(MlmError::Domain(format!(
        "invalid refresh rate {hz}Hz (no time base reaches {TMA_MIN_FREQ}Hz)"
    )))
}

/// Timer A preload for an effective refresh rate.
fn calculate_tma_counter(frequency: f64) -> Result<u16> {
    let counter = 1024.0 - (1.0 / frequency / 72.0 * 4_000_000.0);
    if !(0.0..=0x3FF as f64).contains(&counter) {
        return Err(MlmError::Domain(format!(
            "timer A counter {counter:.1} out of range for {frequency}Hz"
        )));
    }
    Ok(counter.round() as u16)
}

/// Convert a YM register-range volume into the driver's 0x00-0xFF range.
pub fn ymvol_to_mlmvol(ch_kind: ChannelKind, volume: u16) -> u8 {
    (volume << ym_vol_shift(ch_kind)) as u8
}

/// Convert a driver-range volume back into the YM register range.
pub fn mlmvol_to_ymvol(ch_kind: ChannelKind, volume: u8) -> u8 {
    volume >> ym_vol_shift(ch_kind)
}

fn ym_vol_shift(ch_kind: ChannelKind) -> u8 {
    match ch_kind {
        ChannelKind::Adpcma => 3,
        ChannelKind::Fm => 1,
        ChannelKind::Ssg => 4,
    }
}

/// C is stored as semitone 12 of the previous octave; fold it to 0.
fn normalize_note(note: u8, octave: i32) -> (usize, i32) {
    if note == 12 {
        (0, octave + 1)
    } else {
        (note as usize, octave)
    }
}

/// Convert a DMF note to the driver's per-family note encoding.
pub fn dmfnote_to_mlmnote(
    ch_kind: ChannelKind,
    note: Note,
    octave: u16,
    warnings: &mut Warnings,
) -> u8 {
    let (n, oct) = normalize_note(note.value(), octave as i32);
    match ch_kind {
        ChannelKind::Fm => ((n as i32 | (oct << 4)) & 0xFF) as u8,
        ChannelKind::Ssg => {
            if oct < 2 {
                warnings.ssg_note_below_c2();
                0
            } else {
                ((oct - 2) * 12 + n as i32) as u8
            }
        }
        // The "note" of an ADPCM-A channel is a sample index.
        ChannelKind::Adpcma => n as u8,
    }
}

/// Absolute pitch of a note for fine-tune interpolation: the FM F-number
/// with its block, or the SSG tone divisor.
pub fn dmfnote_to_ympitch(ch_kind: ChannelKind, note: u8, octave: i32) -> Result<i32> {
    let (n, oct) = normalize_note(note, octave);
    match ch_kind {
        ChannelKind::Fm => Ok(FM_PITCH_LUT[n % 12] | (oct << 11)),
        ChannelKind::Ssg => {
            if oct < 2 {
                return Err(MlmError::Unsupported(
                    "SSG pitch queries below C2 are not representable".into(),
                ));
            }
            let pitch = SSG_BASE_PITCHES[n % 12] * f64::powi(2.0, oct - 2);
            Ok((250_000.0 / pitch).round() as i32)
        }
        ChannelKind::Adpcma => Ok(0),
    }
}

/// Pitch of a note plus its lower and upper semitone neighbours, as
/// `(middle, lower, higher)`.
pub fn dmfnote_to_ympitch_range(
    ch_kind: ChannelKind,
    note: Note,
    octave: u16,
) -> Result<(i32, i32, i32)> {
    let note = note.value() as i32;
    let octave = octave as i32;

    let (mut lower_note, mut lower_octave) = (note - 1, octave);
    if lower_note < 1 {
        lower_note += 12;
        lower_octave -= 1;
    }
    let (mut higher_note, mut higher_octave) = (note + 1, octave);
    if higher_note > 12 {
        higher_note -= 12;
        higher_octave += 1;
    }

    let middle = dmfnote_to_ympitch(ch_kind, note as u8, octave)?;
    let lower = dmfnote_to_ympitch(ch_kind, lower_note as u8, lower_octave)?;
    let higher = dmfnote_to_ympitch(ch_kind, higher_note as u8, higher_octave)?;
    Ok((middle, lower, higher))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_base_selection() {
        assert_eq!(select_time_base(60.0).unwrap(), (60.0, 1));

        // 25Hz needs a time base of 3 (50Hz is still below the floor).
        let (hz, tb) = select_time_base(25.0).unwrap();
        assert_eq!(tb, 3);
        assert_eq!(hz, 75.0);

        assert!(select_time_base(60_000.0).is_err());
        assert!(select_time_base(0.1).is_err());
    }

    #[test]
    fn test_tma_counter_range() {
        let counter = calculate_tma_counter(60.0).unwrap();
        assert!(counter <= 0x3FF);
        assert_eq!(counter, 98); // 1024 - 1/60/72*4e6

        let (hz, _) = select_time_base(25.0).unwrap();
        let counter = calculate_tma_counter(hz).unwrap();
        assert!(counter <= 0x3FF);

        assert!(calculate_tma_counter(50.0).is_err()); // below Timer A floor
    }

    #[test]
    fn test_volume_conversion_round_trip() {
        for kind in [ChannelKind::Adpcma, ChannelKind::Fm, ChannelKind::Ssg] {
            let max: u16 = match kind {
                ChannelKind::Adpcma => 31,
                ChannelKind::Fm => 127,
                ChannelKind::Ssg => 15,
            };
            for v in 0..=max {
                assert_eq!(mlmvol_to_ymvol(kind, ymvol_to_mlmvol(kind, v)), v as u8);
            }
        }
    }

    #[test]
    fn test_fm_note_packing() {
        let mut w = Warnings::new();
        assert_eq!(
            dmfnote_to_mlmnote(ChannelKind::Fm, Note::Cs, 4, &mut w),
            0x41
        );
        // C folds into the next octave.
        assert_eq!(
            dmfnote_to_mlmnote(ChannelKind::Fm, Note::C, 3, &mut w),
            0x40
        );
    }

    #[test]
    fn test_ssg_note_mapping_boundaries() {
        let mut w = Warnings::new();
        // C2 (stored as semitone 12, octave 1) maps to 0.
        assert_eq!(dmfnote_to_mlmnote(ChannelKind::Ssg, Note::C, 1, &mut w), 0);
        // B7 maps to 71.
        assert_eq!(
            dmfnote_to_mlmnote(ChannelKind::Ssg, Note::B, 7, &mut w),
            71
        );
        // Below C2 clamps to 0 with a warning.
        assert_eq!(dmfnote_to_mlmnote(ChannelKind::Ssg, Note::B, 1, &mut w), 0);
    }

    #[test]
    fn test_adpcma_note_is_sample_index() {
        let mut w = Warnings::new();
        assert_eq!(
            dmfnote_to_mlmnote(ChannelKind::Adpcma, Note::Cs, 0, &mut w),
            1
        );
        assert_eq!(
            dmfnote_to_mlmnote(ChannelKind::Adpcma, Note::C, 0, &mut w),
            0
        );
    }

    #[test]
    fn test_fm_pitch_range_around_c() {
        // C4 is stored as (12, 3); its upper neighbour is C#4.
        let (middle, lower, higher) =
            dmfnote_to_ympitch_range(ChannelKind::Fm, Note::C, 3).unwrap();
        assert_eq!(middle, 0x269 | (4 << 11));
        assert_eq!(higher, 0x28E | (4 << 11));
        assert_eq!(lower, 0x48D | (3 << 11)); // B3
        assert_eq!(higher - middle, 37);
    }

    #[test]
    fn test_ssg_pitch_divisor() {
        // C2 divisor: 250000 / 65.41 ≈ 3822.
        assert_eq!(dmfnote_to_ympitch(ChannelKind::Ssg, 12, 1).unwrap(), 3822);
        // One octave up halves the divisor.
        assert_eq!(dmfnote_to_ympitch(ChannelKind::Ssg, 12, 2).unwrap(), 1911);
        // Below C2 is not representable.
        assert!(dmfnote_to_ympitch(ChannelKind::Ssg, 11, 1).is_err());
    }

    #[test]
    fn test_place_sample_page_bump() {
        let sample_of_pages = |pages: usize| Sample {
            data: vec![0; pages * 256],
        };

        let mut current = 0x0E;
        // 4 pages from 0x0E would end at 0x12, crossing the 4KiB boundary at
        // 0x10; the sample snaps to the boundary instead.
        let placed = place_sample(&mut current, sample_of_pages(4)).unwrap();
        assert_eq!((placed.start_addr, placed.end_addr), (0x10, 0x14));
        assert_eq!(current, 0x15);
        assert_eq!(placed.start_addr >> 4, (placed.end_addr - 1) >> 4);

        // A fitting sample stays where the cursor is.
        let placed = place_sample(&mut current, sample_of_pages(2)).unwrap();
        assert_eq!((placed.start_addr, placed.end_addr), (0x15, 0x17));

        // More than one page's worth of data can never satisfy the
        // no-crossing rule.
        assert!(place_sample(&mut current, sample_of_pages(17)).is_err());
    }

    #[test]
    fn test_empty_sample_advances_cursor_by_one() {
        let mut current = 3;
        let placed = place_sample(&mut current, Sample { data: vec![] }).unwrap();
        assert_eq!((placed.start_addr, placed.end_addr), (3, 3));
        assert_eq!(current, 4);
    }
}
