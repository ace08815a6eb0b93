//! Sound-effect sample discovery and C header generation.
//!
//! SFX samples are raw 18.5 kHz mono 16-bit little-endian PCM files
//! (`*.raw`) collected non-recursively from a directory, sorted by file
//! name. The generated C header gives game code one `SFX_*` constant per
//! sample plus a small helper to queue them on the driver.

use crate::{MlmError, Result};
use std::path::{Path, PathBuf};

/// Most SFX samples a sound data image can carry.
pub const MAX_SAMPLE_COUNT: usize = 128;

const CONST_PREFIX: &str = "SFX_";

/// The SFX sample files of one compiler run.
#[derive(Debug, Default)]
pub struct SfxSamples {
    /// Sample file paths, sorted by file name.
    pub paths: Vec<PathBuf>,
}

impl SfxSamples {
    /// Collect `*.raw` files from `dir` (non-recursive, sorted by name).
    pub fn from_directory(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().is_some_and(|ext| ext == "raw")
            })
            .collect();
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        if paths.len() > MAX_SAMPLE_COUNT {
            return Err(MlmError::Overflow(format!(
                "too many SFX samples ({}, maximum is {MAX_SAMPLE_COUNT})",
                paths.len()
            )));
        }

        Ok(SfxSamples { paths })
    }

    /// Number of collected samples.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// True when the directory held no samples.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Generate the C header with one `SFX_*` index constant per sample.
    pub fn generate_c_header(&self) -> String {
        let mut header = String::from(
            "/*\n  [SFX CONSTANTS]\n  Header generated by mlmc\n*/\n\
             #ifndef MLM_SFX_H\n#define MLM_SFX_H\n\n\
             /* Queue a sound effect on the MLM driver's user command port. */\n\
             #define MLM_PLAY_SFX(id) mlm_user_command(0x01, (unsigned char)(id))\n\n",
        );

        for (i, path) in self.paths.iter().enumerate() {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            header.push_str(&format!(
                "#define {CONST_PREFIX}{} ({i})\n",
                constant_case(&stem)
            ));
        }

        header.push_str("\n#endif\n");
        header
    }
}

/// `"kick drum 2"` → `"KICK_DRUM_2"`.
fn constant_case(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_constant_case() {
        assert_eq!(constant_case("kick drum 2"), "KICK_DRUM_2");
        assert_eq!(constant_case("laser-shot"), "LASER_SHOT");
        assert_eq!(constant_case("jump"), "JUMP");
    }

    #[test]
    fn test_directory_scan_sorts_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.raw"), [0u8; 4]).unwrap();
        fs::write(dir.path().join("a.raw"), [0u8; 4]).unwrap();
        fs::write(dir.path().join("notes.txt"), b"not a sample").unwrap();

        let sfx = SfxSamples::from_directory(dir.path()).unwrap();
        assert_eq!(sfx.len(), 2);
        assert_eq!(sfx.paths[0].file_name().unwrap(), "a.raw");
        assert_eq!(sfx.paths[1].file_name().unwrap(), "b.raw");
    }

    #[test]
    fn test_directory_scan_rejects_too_many_samples() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..=MAX_SAMPLE_COUNT {
            fs::write(dir.path().join(format!("s{i:03}.raw")), [0u8; 2]).unwrap();
        }
        assert!(matches!(
            SfxSamples::from_directory(dir.path()),
            Err(MlmError::Overflow(_))
        ));
    }

    #[test]
    fn test_header_contains_indexed_constants() {
        let sfx = SfxSamples {
            paths: vec![PathBuf::from("coin get.raw"), PathBuf::from("jump.raw")],
        };
        let header = sfx.generate_c_header();
        assert!(header.contains("#define SFX_COIN_GET (0)"));
        assert!(header.contains("#define SFX_JUMP (1)"));
        assert!(header.contains("MLM_PLAY_SFX"));
    }
}
