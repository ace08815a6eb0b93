//! Command-line driver: DMF modules in, `m1_sdata.bin` + `vrom.bin` out.

use anyhow::{Context, Result};
use mlmc::dmf::Module;
use mlmc::mzs::{AdpcmaEncoder, SoundData};
use mlmc::sfx::SfxSamples;
use std::env;
use std::fs;
use std::path::Path;

const SDATA_FILE_NAME: &str = "m1_sdata.bin";
const VROM_FILE_NAME: &str = "vrom.bin";

fn print_usage() {
    eprintln!(
        "Usage:\n  mlmc [--sfx-directory <dir>] [--sfx-header <path>] <module.dmf>...\n\n\
         Flags:\n  --sfx-directory <dir>  Convert every *.raw file in <dir> (18.5kHz mono\n\
         \x20                        16-bit LE PCM, sorted by name) into the SFX table\n\
         \x20 --sfx-header <path>    Write a C header with SFX_* index constants\n\
         \x20 -h, --help             Show this help\n\n\
         Outputs {SDATA_FILE_NAME} and {VROM_FILE_NAME} in the working directory."
    );
}

fn main() -> Result<()> {
    let mut module_paths: Vec<String> = Vec::new();
    let mut sfx_directory: Option<String> = None;
    let mut sfx_header: Option<String> = None;
    let mut show_help = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => show_help = true,
            "--sfx-directory" => match args.next() {
                Some(value) => sfx_directory = Some(value),
                None => {
                    eprintln!("--sfx-directory requires an argument");
                    show_help = true;
                }
            },
            _ if arg.starts_with("--sfx-directory=") => {
                sfx_directory = Some(arg["--sfx-directory=".len()..].to_string());
            }
            "--sfx-header" => match args.next() {
                Some(value) => sfx_header = Some(value),
                None => {
                    eprintln!("--sfx-header requires an argument");
                    show_help = true;
                }
            },
            _ if arg.starts_with("--sfx-header=") => {
                sfx_header = Some(arg["--sfx-header=".len()..].to_string());
            }
            _ if arg.starts_with('-') => {
                eprintln!("Unknown flag: {arg}");
                show_help = true;
            }
            _ => module_paths.push(arg),
        }
    }

    if show_help || (module_paths.is_empty() && sfx_directory.is_none()) {
        print_usage();
        return Ok(());
    }

    let encoder = AdpcmaEncoder::default();
    let mut sound_data = SoundData::new();

    let mut modules = Vec::with_capacity(module_paths.len());
    for path in &module_paths {
        println!("Compiling '{path}'...");
        let data = fs::read(path).with_context(|| format!("failed to read '{path}'"))?;
        let mut module =
            Module::from_dmf(&data).with_context(|| format!("failed to parse '{path}'"))?;
        println!("  \"{}\" by {}", module.song_name, module.song_author);

        module.patch_for_mzs()?;
        module.optimize();
        modules.push(module);
    }
    sound_data.add_modules(modules, &encoder)?;

    if let Some(dir) = &sfx_directory {
        let sfx = SfxSamples::from_directory(Path::new(dir))
            .with_context(|| format!("failed to scan SFX directory '{dir}'"))?;
        sound_data.add_sfx(&sfx, &encoder)?;

        if let Some(header_path) = &sfx_header {
            fs::write(header_path, sfx.generate_c_header())
                .with_context(|| format!("failed to write SFX header '{header_path}'"))?;
            println!("Wrote SFX header '{header_path}' ({} samples)", sfx.len());
        }
    } else if sfx_header.is_some() {
        eprintln!("--sfx-header has no effect without --sfx-directory");
    }

    let sdata = sound_data.compile_sdata()?;
    fs::write(SDATA_FILE_NAME, &sdata)
        .with_context(|| format!("failed to write '{SDATA_FILE_NAME}'"))?;
    let vrom = sound_data.compile_vrom()?;
    fs::write(VROM_FILE_NAME, &vrom).with_context(|| format!("failed to write '{VROM_FILE_NAME}'"))?;

    println!(
        "Wrote {SDATA_FILE_NAME} ({} bytes) and {VROM_FILE_NAME} ({} bytes)",
        sdata.len(),
        vrom.len()
    );
    Ok(())
}
