//! External ADPCM-A encoder wrapper.
//!
//! The YM2610's ADPCM-A format is produced by an external tool with the
//! contract `<encoder> <pcm_in> <pcma_out>`, exit code 0 on success. The
//! wrapper feeds it through temporary files that are cleaned up on every
//! exit path, success and failure alike.

use crate::{MlmError, Result};
use std::io::Write;
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;

/// Default encoder command name, resolved through `PATH`.
pub const DEFAULT_ENCODER_COMMAND: &str = "adpcma";

/// Spawn-and-wait driver for the external ADPCM-A encoder.
#[derive(Debug, Clone)]
pub struct AdpcmaEncoder {
    command: String,
}

impl Default for AdpcmaEncoder {
    fn default() -> Self {
        AdpcmaEncoder::new(DEFAULT_ENCODER_COMMAND)
    }
}

impl AdpcmaEncoder {
    /// Use a specific encoder command.
    pub fn new(command: impl Into<String>) -> Self {
        AdpcmaEncoder {
            command: command.into(),
        }
    }

    /// Encode interleaved little-endian i16 mono PCM into ADPCM-A bytes.
    pub fn encode(&self, pcm: &[u8]) -> Result<Vec<u8>> {
        let mut pcm_file = NamedTempFile::new()?;
        pcm_file.write_all(pcm)?;
        pcm_file.flush()?;

        let pcma_file = NamedTempFile::new()?;

        let status = Command::new(&self.command)
            .arg(pcm_file.path())
            .arg(pcma_file.path())
            .stdout(Stdio::null())
            .status()
            .map_err(|e| {
                MlmError::ExternalTool(format!("failed to run '{}': {e}", self.command))
            })?;

        if !status.success() {
            return Err(MlmError::ExternalTool(format!(
                "'{}' exited with {status}",
                self.command
            )));
        }

        let data = std::fs::read(pcma_file.path())?;
        // Both NamedTempFiles drop here, removing the files.
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // `cp` honours the same `<in> <out>` contract as the real encoder, so
    // the wrapper can be exercised without the tool installed.
    #[cfg(unix)]
    #[test]
    fn test_encode_round_trips_through_temp_files() {
        let encoder = AdpcmaEncoder::new("cp");
        let out = encoder.encode(&[1, 2, 3, 4]).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_fatal() {
        let encoder = AdpcmaEncoder::new("false");
        assert!(matches!(
            encoder.encode(&[0, 0]),
            Err(MlmError::ExternalTool(_))
        ));
    }

    #[test]
    fn test_missing_encoder_is_fatal() {
        let encoder = AdpcmaEncoder::new("definitely-not-a-real-encoder");
        assert!(matches!(
            encoder.encode(&[0, 0]),
            Err(MlmError::ExternalTool(_))
        ));
    }
}
