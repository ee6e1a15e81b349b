//! Thin CLI wrapper around the registration/assembly library (spec §1
//! "Deliberately out of scope": the wrapper itself carries no
//! algorithmic logic, only argument parsing, logging setup, and exit
//! codes per spec §6).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};

use nornir_imageregistration::align::{self, AlignmentOptions};
use nornir_imageregistration::context::RuntimeContext;
use nornir_imageregistration::raster::io;
use nornir_imageregistration::stos::{self, StosPair};
use nornir_imageregistration::transform::AnyTransform;
use nornir_imageregistration::workers::Workers;

#[derive(Parser, Debug)]
#[command(author, version, about = "Phase-correlation image registration and mosaic assembly")]
struct Args {
    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbosity: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Brute-force slice-to-slice rigid alignment, writing a .stos file.
    Align {
        /// Fixed (target) image path.
        target: PathBuf,
        /// Moving (source) image path.
        source: PathBuf,
        /// Output .stos path.
        #[arg(short = 'o', long)]
        output: PathBuf,
        /// Minimum fractional overlap accepted when picking a peak.
        #[arg(long, default_value_t = 0.5)]
        min_overlap: f64,
        /// Also search a vertically-flipped source.
        #[arg(long)]
        test_flip: bool,
        /// Worker thread count (defaults to the number of CPUs).
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Print the transform line of a .stos file and probe it at the origin.
    Inspect {
        /// .stos file to read.
        path: PathBuf,
    },
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.to_string()))
        .format_timestamp_millis()
        .init();
}

fn run(args: Args) -> nornir_imageregistration::Result<()> {
    match args.command {
        Command::Align { target, source, output, min_overlap, test_flip, workers } => {
            let ctx = RuntimeContext::default();
            let target_raster = io::load(&target, None, Some(&ctx))?;
            let source_raster = io::load(&source, None, Some(&ctx))?;

            let pool = Workers::new(workers.unwrap_or_else(num_cpus::get));
            let options = AlignmentOptions { min_overlap, try_flip: test_flip, ..AlignmentOptions::default() };
            info!("aligning {} onto {}", source.display(), target.display());
            let transform = align::slice_to_slice(&target_raster, &source_raster, options, &pool)?;

            let pair = StosPair {
                source_image_path: source.display().to_string(),
                target_image_path: target.display().to_string(),
                target_mask_path: None,
                source_mask_path: None,
                downsample: 1,
                target_size: (target_raster.width() as u32, target_raster.height() as u32),
                source_size: (source_raster.width() as u32, source_raster.height() as u32),
                transform: AnyTransform::Rigid(transform),
            };
            std::fs::write(&output, stos::write_stos(&pair))
                .map_err(|e| nornir_imageregistration::RegistrationError::io(output.display().to_string(), e))?;
            info!("wrote {}", output.display());
            Ok(())
        }
        Command::Inspect { path } => {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| nornir_imageregistration::RegistrationError::io(path.display().to_string(), e))?;
            let pair = stos::parse_stos(&text)?;
            println!("target: {}", pair.target_image_path);
            println!("source: {}", pair.source_image_path);
            println!("downsample: {}", pair.downsample);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbosity);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            match err {
                nornir_imageregistration::RegistrationError::Io { .. } => ExitCode::from(3),
                nornir_imageregistration::RegistrationError::DegenerateStats(_)
                | nornir_imageregistration::RegistrationError::InsufficientEvidence { .. } => ExitCode::from(4),
                _ => ExitCode::from(2),
            }
        }
    }
}
