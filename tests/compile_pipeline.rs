//! End-to-end pipeline tests: hand-built modules through normalization,
//! optimization, song assembly and the SDATA/VROM packers.
//!
//! The external ADPCM-A encoder is substituted with `cp`, which honours the
//! same `<in> <out>` contract and makes the "encoded" bytes equal the PCM
//! input, so VROM contents stay predictable.

#![cfg(unix)]

use mlmc::dmf::{
    Effect, EffectCode, Module, Note, Pattern, PatternMatrix, PatternRow, Sample, SampleWidth,
    System, TimeInfo, SYSTEM_TOTAL_CHANNELS,
};
use mlmc::mzs::{AdpcmaEncoder, EventKind, SoundData};

fn encoder() -> AdpcmaEncoder {
    AdpcmaEncoder::new("cp")
}

fn empty_pattern(rows: usize) -> Pattern {
    Pattern {
        rows: vec![PatternRow::default(); rows],
    }
}

/// A silent NeoGeo module: every channel plays pattern 0 of `rows` empty
/// rows at every matrix position.
fn blank_module(matrix_rows: usize, rows_per_pattern: usize) -> Module {
    Module {
        version: 24,
        system: System::NeoGeo,
        song_name: "pipeline".into(),
        song_author: "tests".into(),
        time_info: TimeInfo {
            time_base: 1,
            tick_time_1: 1,
            tick_time_2: 1,
            hz_value: 60.0,
        },
        pattern_matrix: PatternMatrix {
            rows_per_pattern,
            rows_in_pattern_matrix: matrix_rows,
            matrix: vec![Some(vec![0; matrix_rows]); SYSTEM_TOTAL_CHANNELS],
        },
        instruments: Vec::new(),
        patterns: vec![vec![empty_pattern(rows_per_pattern)]; SYSTEM_TOTAL_CHANNELS],
        samples: Vec::new(),
    }
}

fn note_row(note: Note, octave: u16) -> PatternRow {
    PatternRow {
        note: Some(note),
        octave: Some(octave),
        ..PatternRow::default()
    }
}

fn compile(module: Module) -> SoundData {
    let mut module = module;
    module.patch_for_mzs().unwrap();
    module.optimize();
    let mut sound_data = SoundData::new();
    sound_data.add_modules(vec![module], &encoder()).unwrap();
    sound_data
}

#[test]
fn silent_module_produces_header_only_sdata_and_empty_vrom() {
    let mut sound_data = compile(blank_module(1, 1));
    let sdata = sound_data.compile_sdata().unwrap();

    // Global header: sample list pointer (= header size), song count, one
    // song offset slot; the empty SFX list is a single zero byte after it.
    assert_eq!(&sdata[0..3], &[0x05, 0x00, 0x01]);
    assert_eq!(&sdata[3..5], &[0x06, 0x00]);
    assert_eq!(sdata[5], 0x00);

    // All channels were optimized away: 13 null channel pointers.
    let song = &sdata[6..];
    assert_eq!(&song[0..26], &[0u8; 26]);
    // TMA counter for 60Hz, time base 1.
    assert_eq!(&song[26..29], &[98, 0, 1]);

    assert_eq!(sound_data.compile_vrom().unwrap().len(), 0);
}

#[test]
fn one_note_adpcma_song_lays_out_events_and_vrom() {
    let mut module = blank_module(1, 1);
    // 128 PCM frames = 256 bytes = exactly one VROM unit through `cp`.
    module.samples.push(Sample {
        name: "hit".into(),
        pitch: 0,
        amplitude: 0,
        bits: SampleWidth::Word,
        data: vec![0x0102; 128],
    });
    // ADPCM-A channel 7 (DMF order) plays sample index 1.
    module.patterns[7][0].rows[0] = note_row(Note::Cs, 0);

    let mut sound_data = compile(module);
    let song = &sound_data.songs[0];

    // After the channel reorder, DMF channel 7 is driver channel 0.
    let main = song.channels[0].as_ref().unwrap();
    let kinds: Vec<EventKind> = main.events.iter().map(|e| e.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::ChangeInstrument(0),
            EventKind::JumpToSubEl(0),
            EventKind::EndOfList
        ]
    );

    let sub = &song.sub_event_lists[0].as_ref().unwrap()[0];
    let kinds: Vec<EventKind> = sub.events.iter().map(|e| e.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::WaitTicks,
            EventKind::Note(1),
            EventKind::ReturnFromSubEl
        ]
    );

    // The sample occupies VROM units [0, 1).
    assert_eq!(
        (song.samples[0].start_addr, song.samples[0].end_addr),
        (0, 1)
    );

    let sdata = sound_data.compile_sdata().unwrap();
    let song_ofs = sdata[3] as usize | ((sdata[4] as usize) << 8);
    assert_eq!(song_ofs, 6);
    let song_bytes = &sdata[song_ofs..];

    // Header: channel 0 pointer is patched to the main event list (at song
    // offset 68 → SDATA 74), every other channel is null.
    assert_eq!(&song_bytes[0..2], &[74, 0]);
    assert_eq!(&song_bytes[2..26], &[0u8; 24]);
    // Instruments pointer: the single ADPCM-A slot at song offset 31.
    assert_eq!(&song_bytes[29..31], &[37, 0]);
    // The ADPCM-A slot points at the sample list record.
    assert_eq!(&song_bytes[31..33], &[69, 0]);
    // ODATA sample list: one sample, start 0, end 1 (256-byte units).
    assert_eq!(&song_bytes[63..68], &[1, 0, 0, 1, 0]);
    // Main event list: change instrument, jump (patched to the sub list at
    // SDATA 80), end of list.
    assert_eq!(&song_bytes[68..74], &[0x02, 0x00, 0x09, 80, 0, 0x00]);
    // Sub event list: note 1 with one trailing tick, return.
    assert_eq!(&song_bytes[74..77], &[0x81, 0x01, 0x20]);

    // VROM holds the "encoded" bytes at offset 0.
    let vrom = sound_data.compile_vrom().unwrap();
    assert_eq!(vrom.len(), 256);
    assert_eq!(&vrom[0..2], &[0x02, 0x01]);
}

#[test]
fn fine_tune_interpolates_against_the_adjacent_semitone() {
    let mut module = blank_module(1, 2);
    // FM channel 0: C4, then a fine tune of 0xC0 (halfway to C#4).
    module.patterns[0][0].rows[0] = note_row(Note::C, 3);
    module.patterns[0][0].rows[1].effects.push(Effect {
        code: EffectCode::SetFineTune,
        value: Some(0xC0),
    });

    let sound_data = compile(module);
    // FM channel 0 lands on driver channel 6.
    let sub = &sound_data.songs[0].sub_event_lists[6].as_ref().unwrap()[0];

    let deltas: Vec<i32> = sub
        .events
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::IncPitchOfs(d) => Some(d),
            _ => None,
        })
        .collect();
    // round((0x28E - 0x269) * (0xC0 - 128) / 127) = round(37 * 64 / 127)
    assert_eq!(deltas, vec![19]);
}

#[test]
fn position_jump_ends_the_pattern_without_a_return() {
    let mut module = blank_module(2, 2);
    module.patterns[0][0].rows[0] = note_row(Note::E, 4);
    module.patterns[0][0].rows[0].effects.push(Effect {
        code: EffectCode::PosJump,
        value: Some(1),
    });

    let sound_data = compile(module);
    let sub = &sound_data.songs[0].sub_event_lists[6].as_ref().unwrap()[0];
    let last = sub.events.last().unwrap();
    assert!(matches!(last.kind, EventKind::PositionJump(1)));
}

#[test]
fn position_jump_resolves_to_the_jump_site() {
    let mut module = blank_module(2, 1);
    let mut looping = empty_pattern(1);
    looping.rows[0] = note_row(Note::Cs, 4);
    let mut jumping = empty_pattern(1);
    jumping.rows[0].effects.push(Effect {
        code: EffectCode::PosJump,
        value: Some(0),
    });
    module.patterns[0] = vec![looping, jumping];
    *module.pattern_matrix.matrix[0].as_mut().unwrap() = vec![0, 1];

    let mut sound_data = compile(module);
    let sdata = sound_data.compile_sdata().unwrap();
    let song_bytes = &sdata[6..];

    // Song layout: header (31), one ADPCM-A instrument slot (32), empty
    // sample list (1), then driver channel 6's main event list at 64.
    // Its first jump-to-sub command is the position-jump target.
    assert_eq!(&song_bytes[12..14], &[70, 0]); // channel 6 header pointer
    assert_eq!(song_bytes[64], 0x09);
    // Sub list 1: one tick of wait, pitch-slide reset, position jump whose
    // address operand resolves to the first jump site (64 + 6).
    assert_eq!(&song_bytes[74..79], &[0x10, 0x23, 0x0B, 70, 0]);
}

#[test]
fn songs_spill_into_bank_one_over_a_zero_padded_seam() {
    let sized_module = |rows: usize| {
        let mut module = blank_module(1, rows);
        module.patterns[0] = vec![Pattern {
            rows: vec![note_row(Note::E, 4); rows],
        }];
        module.patch_for_mzs().unwrap();
        module.optimize();
        module
    };

    let mut sound_data = SoundData::new();
    sound_data
        .add_modules(vec![sized_module(15500), sized_module(15300)], &encoder())
        .unwrap();
    let sdata = sound_data.compile_sdata().unwrap();

    let first_ofs = sdata[3] as usize | ((sdata[4] as usize) << 8);
    let second_ofs = sdata[5] as usize | ((sdata[6] as usize) << 8);
    assert_eq!(first_ofs, 8);
    // The second song does not fit the rest of bank 0 and starts exactly at
    // the bank 1 boundary, with the seam zero-filled.
    assert_eq!(second_ofs, 0x9800);
    let first_end = first_ofs + 31069;
    assert!(sdata[first_end..0x9800].iter().all(|&b| b == 0));
    assert_eq!(sdata.len(), 0x9800 + 30669);
}

#[test]
fn second_song_overflowing_its_bank_fails() {
    // Each song compiles to ~31k bytes: it fits bank 0's budget but not the
    // 0x7800-byte window of bank 1.
    let big_module = || {
        let rows = 15500;
        let mut module = blank_module(1, rows);
        module.patterns[0] = vec![Pattern {
            rows: vec![note_row(Note::E, 4); rows],
        }];
        module
    };

    let mut first = big_module();
    first.patch_for_mzs().unwrap();
    first.optimize();
    let mut second = big_module();
    second.patch_for_mzs().unwrap();
    second.optimize();

    let mut sound_data = SoundData::new();
    sound_data
        .add_modules(vec![first, second], &encoder())
        .unwrap();

    let err = sound_data.compile_sdata().unwrap_err().to_string();
    assert!(err.contains("too big"), "unexpected error: {err}");
    assert!(err.contains("bank 1"), "unexpected error: {err}");
}

#[test]
fn two_small_songs_share_bank_zero() {
    let song_module = |note: Note| {
        let mut module = blank_module(1, 1);
        module.patterns[0][0].rows[0] = note_row(note, 4);
        module
    };

    let mut first = song_module(Note::C);
    first.patch_for_mzs().unwrap();
    first.optimize();
    let mut second = song_module(Note::D);
    second.patch_for_mzs().unwrap();
    second.optimize();

    let mut sound_data = SoundData::new();
    sound_data
        .add_modules(vec![first, second], &encoder())
        .unwrap();
    let sdata = sound_data.compile_sdata().unwrap();

    assert_eq!(sdata[2], 2);
    let first_ofs = sdata[3] as usize | ((sdata[4] as usize) << 8);
    let second_ofs = sdata[5] as usize | ((sdata[6] as usize) << 8);
    assert_eq!(first_ofs, 8); // header (7) + empty SFX list (1)
    assert!(second_ofs > first_ofs);
    assert!(sdata.len() <= 0x9800);
}

#[test]
fn song_samples_and_sfx_share_the_vrom_cursor() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("boom.raw"), vec![0x7Fu8; 512]).unwrap();

    let mut module = blank_module(1, 1);
    module.samples.push(Sample {
        name: "kick".into(),
        pitch: 0,
        amplitude: 0,
        bits: SampleWidth::Word,
        data: vec![0x0203; 128],
    });
    module.patterns[7][0].rows[0] = note_row(Note::Cs, 0);

    module.patch_for_mzs().unwrap();
    module.optimize();

    let mut sound_data = SoundData::new();
    sound_data.add_modules(vec![module], &encoder()).unwrap();
    let sfx = mlmc::sfx::SfxSamples::from_directory(dir.path()).unwrap();
    sound_data.add_sfx(&sfx, &encoder()).unwrap();

    // Song sample at [0,1), SFX placed after the cursor advance.
    assert_eq!(sound_data.sfx[0].start_addr, 2);
    assert_eq!(sound_data.sfx[0].end_addr, 4);

    let vrom = sound_data.compile_vrom().unwrap();
    assert_eq!(vrom.len(), 4 * 256);
    assert_eq!(vrom[0], 0x03); // song sample PCM, little-endian
    assert_eq!(vrom[256], 0x80); // gap unit keeps the fill byte
    assert_eq!(vrom[512], 0x7F); // SFX bytes
}
