// SPDX-FileCopyrightText: Copyright 2015-2022 TimVideos.us
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::process;

mod board;

use board::BoardDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Standalone container at the start of a dedicated EEPROM.
    Tofe,
    /// 256-byte composite image shared with the FX2 USB controller.
    Opsis,
}

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Image format to generate.
    #[clap(long, value_enum, default_value_t = Format::Tofe)]
    format: Format,
    /// FX2 stage-2 bootloader blob; required with `--format opsis`.
    #[clap(long, value_parser, value_name = "STAGE2")]
    stage2: Option<PathBuf>,
    /// EEPROM capacity in bytes for standalone images.
    #[clap(long, default_value_t = 16384)]
    size: usize,
    /// Board definition in JSON format
    #[clap(value_parser, value_name = "CONFIG")]
    config: PathBuf,
    /// Output file name
    #[clap(value_parser, value_name = "OUTPUT", default_value = "out.eep")]
    outfile: PathBuf,
}

fn build(cli: &Cli) -> anyhow::Result<Vec<u8>> {
    let config = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("can't read config file `{}'", cli.config.to_string_lossy()))?;
    let board = BoardDefinition::from_json(&config)
        .with_context(|| format!("invalid config file `{}'", cli.config.to_string_lossy()))?;

    match cli.format {
        Format::Tofe => board.build_tofe_image(cli.size),
        Format::Opsis => {
            let stage2_path = cli
                .stage2
                .as_ref()
                .context("`--format opsis' needs a `--stage2' bootloader blob")?;
            let stage2 = std::fs::read(stage2_path).with_context(|| {
                format!("can't read stage-2 blob `{}'", stage2_path.to_string_lossy())
            })?;
            board.build_opsis_image(&stage2)
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let bytes = match build(&cli) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            process::exit(1);
        }
    };

    let mut output_file = match OpenOptions::new()
        .read(false)
        .write(true)
        .truncate(true)
        .create(true)
        .open(&cli.outfile)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "ERROR: Can't open output file: `{}': {e}",
                cli.outfile.to_string_lossy()
            );
            process::exit(1);
        }
    };

    if let Err(e) = output_file.write_all(&bytes) {
        eprintln!(
            "ERROR: Can't write data to the output file: `{}': {e}",
            cli.outfile.to_string_lossy()
        );
        process::exit(1);
    }
}
