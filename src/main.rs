use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use serde_json::json;

use ppgen::calc_type::CalcType;
use ppgen::executable::PathLookup;
use ppgen::oncv::OncvGenerator;
use ppgen::watch::wait_with_deadline;

/// Generate a pseudopotential with oncvpsp and report the outcome
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// oncvpsp input file
    #[arg(short, long)]
    input: PathBuf,

    /// Type of calculation, selects the oncvpsp executable
    #[arg(short, long, value_enum, default_value_t = CalcType::ScalarRelativistic)]
    calc_type: CalcType,

    /// Kill the run if it's still going after this many seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Interval between status checks, in milliseconds
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..))]
    poll_ms: u64,

    /// Create the working directory here instead of the system temporary directory
    #[arg(long)]
    workdir_base: Option<PathBuf>,

    /// Print a summary of the plot data
    #[arg(long)]
    plot: bool,

    /// Print a JSON report instead of text
    #[arg(long)]
    json: bool,

    /// Remove the working directory before exiting
    #[arg(long)]
    rm: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::init();
    info!("ppgen {} starting up", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let input = read_input(&args.input)?;

    let mut generator = OncvGenerator::with_resolver(
        input,
        args.calc_type,
        &PathLookup::from_env(),
        args.workdir_base.as_deref(),
    )?;

    generator.start()?;
    let timeout = args.timeout.map(Duration::from_secs);
    let status = wait_with_deadline(&mut generator, Duration::from_millis(args.poll_ms), timeout).await?;
    info!("{generator}");

    if args.json {
        let report = json!({
            "calc_type": generator.calc_type(),
            "job": generator.job().summary(),
            "results": generator.results(),
            "pseudo": generator.pseudo(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("status: {status}");
        if let Some(path) = generator.pseudo_path() {
            println!("pseudopotential: {}", path.display());
        }
        for error in generator.job().errors() {
            println!("error: {error}");
        }
    }

    if args.plot {
        match generator.plot_results() {
            Ok(text) => println!("{text}"),
            Err(err) => warn!("Can't plot results: {err}"),
        }
    }

    let outcome = generator.outcome();
    if args.rm && !generator.rmtree() {
        warn!("Working directory {} was not removed", generator.workdir().path.display());
    }

    match outcome {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("{err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn read_input(file_path: &Path) -> Result<String> {
    info!("Reading input file: {}", file_path.display());
    fs::read_to_string(file_path).with_context(|| format!("Can't read input file {}", file_path.display()))
}
