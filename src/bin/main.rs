//! Command-line entry point: read a TOML parameter file, assemble the
//! pipeline, walk the shells, and write one raw little-endian `f64` map per
//! requested observable.

#[macro_use]
extern crate error_chain;

mod errors {
    error_chain! {
        foreign_links {
            Io(::std::io::Error);
        }
    }
}

use std::io::{BufWriter, Write};
use std::path::PathBuf;

use byteorder::{LittleEndian, WriteBytesExt};
use clap::Parser;
use colored::Colorize;
use log::info;
use pbr::ProgressBar;

use galmap::config;
use galmap::pipeline::Pipeline;

use crate::errors::ResultExt;

#[derive(Parser)]
#[command(name = "galmap", about = "Galactic radio-sky map simulator")]
struct Cli {
    /// Path to the TOML parameter file.
    parameter_file: PathBuf,

    /// Directory that output maps are written into.
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Show a progress bar over the DM/FD pass and each synchrotron frequency.
    #[arg(long)]
    progress: bool,
}

fn main() {
    env_logger::init();

    if let Err(ref e) = run() {
        eprintln!("{}: {}", "error".red(), e);
        for cause in e.iter().skip(1) {
            eprintln!("caused by: {}", cause);
        }
        if let Some(backtrace) = e.backtrace() {
            eprintln!("backtrace: {:?}", backtrace);
        }
        std::process::exit(1);
    }
    std::process::exit(0);
}

fn run() -> errors::Result<()> {
    let cli = Cli::parse();

    info!("reading parameter file {}", cli.parameter_file.display());
    let settings = config::read_parameter_file(&cli.parameter_file)
        .chain_err(|| "error reading parameter file")?;

    std::fs::create_dir_all(&cli.out_dir).chain_err(|| "unable to create output directory")?;

    let pipeline =
        Pipeline::assemble(settings).chain_err(|| "error assembling pipeline")?;

    let total_passes = 1 + pipeline.settings.obsout.sync.len();
    let mut pb = ProgressBar::new(total_passes as u64);
    pb.show_bar = cli.progress;
    pb.show_counter = cli.progress;
    pb.show_percent = cli.progress;
    pb.show_speed = cli.progress;
    pb.show_time_left = cli.progress;
    pb.show_message = cli.progress;

    info!("walking shells");
    let output = pipeline.run().chain_err(|| "error running the integrator")?;
    pb.inc();

    if let Some(dm) = &output.dm {
        write_map(&cli.out_dir.join("dm.bin"), dm)?;
    }
    if let Some(fd) = &output.fd {
        write_map(&cli.out_dir.join("fd.bin"), fd)?;
    }
    for sync in &output.sync {
        write_map(&cli.out_dir.join(format!("{}_I.bin", sync.filename)), &sync.is)?;
        write_map(&cli.out_dir.join(format!("{}_Q.bin", sync.filename)), &sync.qs)?;
        write_map(&cli.out_dir.join(format!("{}_U.bin", sync.filename)), &sync.us)?;
        pb.inc();
    }

    pb.finish_print(&format!("{} ", "done".green().bold()));
    Ok(())
}

fn write_map(path: &std::path::Path, data: &[f64]) -> errors::Result<()> {
    let mut w = BufWriter::new(std::fs::File::create(path)?);
    for &v in data {
        w.write_f64::<LittleEndian>(v)?;
    }
    w.flush()?;
    Ok(())
}
