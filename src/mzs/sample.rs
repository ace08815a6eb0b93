//! Encoded ADPCM-A samples.

use super::pa_encoder::AdpcmaEncoder;
use crate::dmf;
use crate::{MlmError, Result};

/// VROM fill byte; also pads encoded samples to whole pages.
pub const PA_PAD_BYTE: u8 = 0x80;

/// Bytes per VROM address unit.
pub const PAGE_SIZE: usize = 256;

/// An ADPCM-A encoded sample, padded to a 256-byte multiple.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Encoded ADPCM-A data.
    pub data: Vec<u8>,
}

impl Sample {
    /// Encode a parsed DMF sample.
    pub fn from_dmf_sample(dsmp: &dmf::Sample, encoder: &AdpcmaEncoder) -> Result<Self> {
        let mut pcm = Vec::with_capacity(dsmp.data.len() * 2);
        for &s in &dsmp.data {
            pcm.extend_from_slice(&s.to_le_bytes());
        }
        Ok(Sample {
            data: pad_to_page(encoder.encode(&pcm)?),
        })
    }

    /// Encode a raw 18.5 kHz mono 16-bit little-endian PCM buffer.
    pub fn from_raw_pcm(pcm: &[u8], encoder: &AdpcmaEncoder) -> Result<Self> {
        if pcm.len() % 2 != 0 {
            return Err(MlmError::Parse(
                "raw PCM length is odd (expected 16-bit little-endian mono)".into(),
            ));
        }
        Ok(Sample {
            data: pad_to_page(encoder.encode(pcm)?),
        })
    }

    /// Sample length in 256-byte VROM units.
    pub fn pages(&self) -> usize {
        self.data.len() / PAGE_SIZE
    }
}

fn pad_to_page(mut data: Vec<u8>) -> Vec<u8> {
    let rem = data.len() % PAGE_SIZE;
    if rem != 0 {
        data.resize(data.len() + PAGE_SIZE - rem, PA_PAD_BYTE);
    }
    data
}
