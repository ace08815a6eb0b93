//! DMF PCM sample data and its pre-encoding rewrites.

use super::ByteReader;
use crate::bits::unsigned2signed_16;
use crate::{MlmError, Result};

/// Bit width of the stored PCM data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleWidth {
    /// 8-bit samples.
    Byte,
    /// 16-bit samples.
    Word,
}

/// A PCM sample attached to a module.
///
/// The pitch and amplitude fields are consumed at parse time by
/// [`Sample::apply_pitch`] and [`Sample::apply_amplitude`]; afterwards the
/// data is immutable and both fields read as neutral.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Sample name from the container.
    pub name: String,
    /// Resampling factor, biased by −5 at parse (0 is neutral).
    pub pitch: i32,
    /// Gain in percent points, biased at parse (0 is neutral).
    pub amplitude: i32,
    /// Stored bit width.
    pub bits: SampleWidth,
    /// Signed 16-bit PCM data.
    pub data: Vec<i16>,
}

impl Sample {
    pub(crate) fn parse(r: &mut ByteReader<'_>) -> Result<Self> {
        let sample_size = r.u24_le()? as usize;
        r.skip(1)?;
        let name_len = r.u8()? as usize;
        let name = r.ascii(name_len)?;
        r.skip(1)?; // sample rate, always 18.5kHz for ADPCM-A

        let pitch = r.u8()? as i32 - 5;
        let amplitude = (r.u8()? as i32 - 50) * 2;
        let bits = match r.u8()? {
            8 => SampleWidth::Byte,
            16 => SampleWidth::Word,
            other => {
                return Err(MlmError::Parse(format!(
                    "invalid sample bit width {other} for '{name}'"
                )))
            }
        };

        let mut data = Vec::with_capacity(sample_size);
        for _ in 0..sample_size {
            data.push(unsigned2signed_16(r.u16_le()?) as i16);
        }

        let mut sample = Sample {
            name,
            pitch,
            amplitude,
            bits,
            data,
        };
        sample.apply_pitch();
        sample.apply_amplitude();
        Ok(sample)
    }

    /// Resample according to the pitch field, then reset it.
    ///
    /// Positive pitch keeps every (pitch+1)-th sample; negative pitch
    /// duplicates each sample (|pitch|+1) times.
    pub fn apply_pitch(&mut self) {
        if self.pitch > 0 {
            let step = self.pitch as usize + 1;
            self.data = self.data.iter().copied().step_by(step).collect();
        } else if self.pitch < 0 {
            let repeat = (-self.pitch) as usize + 1;
            let mut data = Vec::with_capacity(self.data.len() * repeat);
            for &s in &self.data {
                for _ in 0..repeat {
                    data.push(s);
                }
            }
            self.data = data;
        }
        self.pitch = 0;
    }

    /// Scale by `(100 + amplitude) / 100` with signed-16 clamping, then
    /// reset the amplitude field.
    pub fn apply_amplitude(&mut self) {
        if self.amplitude != 0 {
            let multiplier = (self.amplitude as f64 + 100.0) / 100.0;
            for s in &mut self.data {
                *s = (f64::from(*s) * multiplier).clamp(-32768.0, 32767.0) as i16;
            }
        }
        self.amplitude = 0;
    }
}
