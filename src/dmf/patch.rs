//! Module rewrites that make the event assembler straightforward.
//!
//! The normalizer (`patch_for_mzs`) runs three sub-steps per channel:
//!
//! 1. **Matrix unroll** — rewrites `matrix[ch][i] = i` by physically
//!    duplicating patterns, so a matrix cell can be edited without affecting
//!    other positions.
//! 2. **Row expansion** — bakes the module speed into blank filler rows and
//!    resets the time counters to 1/1/1. Effects the driver evaluates at
//!    tick-end (position jump) move onto the last inserted blank row.
//! 3. **Position-jump broadcast** — copies every position jump onto the same
//!    cell of all non-empty channels; the driver's jump state is
//!    per-channel, so all channels must agree per row.
//!
//! The optimizer (`optimize`) then merges structurally equal patterns per
//! channel and nulls out channels that never play anything.
//!
//! Both passes are idempotent after their first application.

use super::{Effect, EffectCode, Module, Pattern, PatternRow, SYSTEM_TOTAL_CHANNELS};
use crate::{MlmError, Result};
use std::collections::HashMap;

impl Module {
    /// Normalize the module for event-list compilation.
    pub fn patch_for_mzs(&mut self) -> Result<()> {
        self.unroll_matrix();
        self.expand_rows();
        self.broadcast_position_jumps()
    }

    /// Rewrite the matrix to the identity mapping, duplicating patterns so
    /// that `patterns[ch][i]` is exactly what plays at position `i`.
    fn unroll_matrix(&mut self) {
        for ch in 0..SYSTEM_TOTAL_CHANNELS {
            let Some(rows) = &mut self.pattern_matrix.matrix[ch] else {
                continue;
            };
            let unrolled: Vec<Pattern> = rows
                .iter()
                .map(|&id| self.patterns[ch][id].clone())
                .collect();
            self.patterns[ch] = unrolled;
            for (i, cell) in rows.iter_mut().enumerate() {
                *cell = i;
            }
        }
    }

    /// Expand every row into `speed` rows (the row itself plus blanks) and
    /// reset the module speed to one tick per row.
    fn expand_rows(&mut self) {
        let t = &self.time_info;
        let speed_even = (t.tick_time_1 * t.time_base).max(1) as usize;
        let speed_odd = (t.tick_time_2 * t.time_base).max(1) as usize;

        if speed_even != 1 || speed_odd != 1 {
            for channel_patterns in &mut self.patterns {
                for pattern in channel_patterns.iter_mut() {
                    pattern.rows = expand_pattern_rows(&pattern.rows, speed_even, speed_odd);
                }
            }

            let old_rows = self.pattern_matrix.rows_per_pattern;
            self.pattern_matrix.rows_per_pattern = (0..old_rows)
                .map(|i| if i % 2 == 0 { speed_even } else { speed_odd })
                .sum();
        }

        self.time_info.time_base = 1;
        self.time_info.tick_time_1 = 1;
        self.time_info.tick_time_2 = 1;
    }

    /// Copy every position jump onto the same cell of all non-empty
    /// channels. Only valid after the matrix unroll, when pattern ids and
    /// matrix positions coincide.
    fn broadcast_position_jumps(&mut self) -> Result<()> {
        let non_empty: Vec<bool> = (0..SYSTEM_TOTAL_CHANNELS)
            .map(|ch| {
                self.pattern_matrix.matrix[ch].is_some()
                    && self.patterns[ch].iter().any(|p| !p.is_empty())
            })
            .collect();

        // Gather all jumps first so cross-channel conflicts are caught
        // before any cell is rewritten.
        let mut jumps: HashMap<(usize, usize), u16> = HashMap::new();
        for ch in 0..SYSTEM_TOTAL_CHANNELS {
            if self.pattern_matrix.matrix[ch].is_none() {
                continue;
            }
            for (pat_idx, pattern) in self.patterns[ch].iter().enumerate() {
                for (row_idx, row) in pattern.rows.iter().enumerate() {
                    for fx in &row.effects {
                        if fx.code != EffectCode::PosJump {
                            continue;
                        }
                        let Some(value) = fx.value else { continue };
                        match jumps.insert((pat_idx, row_idx), value) {
                            Some(prev) if prev != value => {
                                return Err(MlmError::ClashingEffect(format!(
                                    "position jumps to {prev} and {value} \
                                     on pattern {pat_idx}, row {row_idx}"
                                )));
                            }
                            _ => {}
                        }
                    }
                }
            }
        }

        for (&(pat_idx, row_idx), &value) in &jumps {
            for ch in 0..SYSTEM_TOTAL_CHANNELS {
                if !non_empty[ch] {
                    continue;
                }
                let row = &mut self.patterns[ch][pat_idx].rows[row_idx];
                let already_there = row
                    .effects
                    .iter()
                    .any(|fx| fx.code == EffectCode::PosJump && fx.value == Some(value));
                if !already_there {
                    row.effects.push(Effect {
                        code: EffectCode::PosJump,
                        value: Some(value),
                    });
                }
            }
        }

        Ok(())
    }

    /// Merge structurally equal patterns and drop channels that never play.
    pub fn optimize(&mut self) {
        for ch in 0..SYSTEM_TOTAL_CHANNELS {
            self.merge_equal_patterns(ch);
        }
        self.drop_empty_channels();
    }

    /// Compact `patterns[ch]` to its unique members (lowest original id
    /// wins) and remap the matrix into the compacted list.
    fn merge_equal_patterns(&mut self, ch: usize) {
        if self.pattern_matrix.matrix[ch].is_none() {
            return;
        }

        let mut compacted: Vec<Pattern> = Vec::new();
        let mut new_ids: HashMap<Pattern, usize> = HashMap::new();
        let mut remap = Vec::with_capacity(self.patterns[ch].len());

        for pattern in &self.patterns[ch] {
            let next_id = compacted.len();
            let id = *new_ids.entry(pattern.clone()).or_insert_with(|| {
                compacted.push(pattern.clone());
                next_id
            });
            remap.push(id);
        }

        self.patterns[ch] = compacted;
        if let Some(rows) = &mut self.pattern_matrix.matrix[ch] {
            for cell in rows.iter_mut() {
                *cell = remap[*cell];
            }
        }
    }

    /// Null the matrix of any channel whose referenced patterns are all
    /// empty; downstream treats those channels as silent.
    fn drop_empty_channels(&mut self) {
        for ch in 0..SYSTEM_TOTAL_CHANNELS {
            let silent = match &self.pattern_matrix.matrix[ch] {
                Some(rows) => rows.iter().all(|&id| self.patterns[ch][id].is_empty()),
                None => continue,
            };
            if silent {
                self.pattern_matrix.matrix[ch] = None;
            }
        }
    }
}

/// Expand one pattern's rows by the per-row speeds, relocating tick-end
/// effects (currently only the position jump) onto the last blank row.
fn expand_pattern_rows(
    rows: &[PatternRow],
    speed_even: usize,
    speed_odd: usize,
) -> Vec<PatternRow> {
    let mut expanded = Vec::with_capacity(rows.len() * speed_even.max(speed_odd));

    for (i, row) in rows.iter().enumerate() {
        let speed = if i % 2 == 0 { speed_even } else { speed_odd };
        let blanks = speed - 1;

        if blanks == 0 {
            expanded.push(row.clone());
            continue;
        }

        let mut head = row.clone();
        let tick_end_fx: Vec<Effect> = head
            .effects
            .iter()
            .copied()
            .filter(|fx| fx.code == EffectCode::PosJump)
            .collect();
        head.effects.retain(|fx| fx.code != EffectCode::PosJump);
        expanded.push(head);

        for _ in 0..blanks - 1 {
            expanded.push(PatternRow::empty());
        }
        let mut tail = PatternRow::empty();
        tail.effects = tick_end_fx;
        expanded.push(tail);
    }

    expanded
}
