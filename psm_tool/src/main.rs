use std::fs::File;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use glob::glob;
use kdam::tqdm;
use log::{error, info, warn};

use psm_index::config::SearchTolerance;
use psm_index::{Arborist, ArboristConfig, BackendKind, Error, Psm, Result};

// Returns an Iterator to the Reader of the lines of the file.
fn read_lines<P>(filename: P) -> io::Result<io::Lines<io::BufReader<File>>>
where
    P: AsRef<Path>,
{
    let file = File::open(filename)?;
    Ok(io::BufReader::new(file).lines())
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Build and query per-charge PSM indexes", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default configuration file
    InitConfig {
        #[arg(short, long)]
        output: PathBuf,

        /// Backend name, e.g. kd, hashtable, avl, interval
        #[arg(short, long)]
        backend: Option<String>,

        /// Directory the index is saved to
        #[arg(short, long)]
        directory: Option<String>,
    },

    /// Index every record line in the files matching `input` and save the result
    Build {
        #[arg(short, long)]
        config: PathBuf,

        /// Glob pattern of record files
        #[arg(short, long)]
        input: String,
    },

    /// Print records inside the tolerance window around a point
    Search {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(long, allow_negative_numbers = true)]
        charge: i32,

        #[arg(long)]
        mz: f64,

        #[arg(long)]
        rt: f64,

        #[arg(long)]
        ook0: f64,

        #[arg(long)]
        ppm: Option<f64>,

        #[arg(long)]
        rt_offset: Option<f64>,

        #[arg(long)]
        ook0_tolerance: Option<f64>,
    },

    /// Print record counts per charge
    Stats {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> ExitCode {

    env_logger::init();
    let args = Args::parse();

    let result = match args.command {
        Command::InitConfig { output, backend, directory } => init_config(&output, backend, directory),
        Command::Build { config, input } => build(&config, &input),
        Command::Search { config, charge, mz, rt, ook0, ppm, rt_offset, ook0_tolerance } => {
            search(&config, charge, mz, rt, ook0, ppm, rt_offset, ook0_tolerance)
        }
        Command::Stats { config } => stats(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_config(output: &Path, backend: Option<String>, directory: Option<String>) -> Result<()> {

    let mut config = ArboristConfig::default();
    if let Some(name) = backend {
        config.backend = name.parse::<BackendKind>()?;
    }
    if let Some(directory) = directory {
        config.directory = directory;
    }

    config.to_file(output)?;
    info!("wrote {}", output.display());

    Ok(())
}

/// Good records of one file; bad lines are logged and skipped
fn read_records(path: &Path) -> Result<Vec<Psm>> {

    let mut psms = Vec::new();
    for (number, line) in read_lines(path)?.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match Psm::deserialize(&line) {
            Ok(psm) => psms.push(psm),
            Err(e) => warn!("{}:{}: skipping line: {}", path.display(), number + 1, e),
        }
    }

    Ok(psms)
}

fn build(config_path: &Path, input: &str) -> Result<()> {

    let config = ArboristConfig::from_file(config_path)?;
    let arborist = Arborist::from_config(&config)?;

    let filenames: Vec<PathBuf> = glob(input)
        .map_err(|e| Error::Configuration(format!("bad input pattern {}: {}", input, e)))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("skipping unreadable path: {}", e);
                None
            }
        })
        .collect();

    if filenames.is_empty() {
        warn!("no files match {}", input);
    }

    for filename in tqdm!(filenames.iter()) {
        let psms = read_records(filename)?;
        arborist.bulk_add(psms);
    }

    info!("indexed {} records over charges {:?}", arborist.len(), arborist.charges());
    arborist.save(Path::new(&config.directory))?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn search(
    config_path: &Path,
    charge: i32,
    mz: f64,
    rt: f64,
    ook0: f64,
    ppm: Option<f64>,
    rt_offset: Option<f64>,
    ook0_tolerance: Option<f64>,
) -> Result<()> {

    let config = ArboristConfig::from_file(config_path)?;
    let arborist = Arborist::from_config(&config)?;
    arborist.load(Path::new(&config.directory))?;

    let tolerance = SearchTolerance {
        ppm: ppm.unwrap_or(config.tolerance.ppm),
        rt_offset: rt_offset.unwrap_or(config.tolerance.rt_offset),
        ook0_tolerance: ook0_tolerance.unwrap_or(config.tolerance.ook0_tolerance),
    };

    let found = arborist.search(charge, mz, rt, ook0, &tolerance);
    for psm in found.iter() {
        println!("{}", psm);
    }
    info!("{} matches", found.len());

    Ok(())
}

fn stats(config_path: &Path) -> Result<()> {

    let config = ArboristConfig::from_file(config_path)?;
    let arborist = Arborist::from_config(&config)?;
    arborist.load(Path::new(&config.directory))?;

    println!("backend: {:?}", arborist.backend_kind());
    for charge in arborist.charges() {
        println!("charge {}: {}", charge, arborist.partition_len(charge).unwrap_or(0));
    }
    println!("total: {}", arborist.len());

    Ok(())
}
