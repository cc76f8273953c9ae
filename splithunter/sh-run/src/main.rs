//! Core module for running the Splithunter split-read caller per sample
//!
//! This binary parses the target loci of each input alignment through
//! the external caller, extracting split reads and split read pairs,
//! and writes one JSON record per sample to the working directory.

use clap::Parser;
use config::ArgCheck;
use log::{error, info};
use simple_logger::init_with_level;

use sh_run::{cli::Args, run_samples};

fn main() {
    let start = std::time::Instant::now();
    let args: Args = Args::parse();

    init_with_level(args.level()).expect("ERROR: Failed to initialize logger");
    log::debug!("Commandline arguments: {:?}", args);

    args.check().unwrap_or_else(|e| {
        error!("{}", e);
        std::process::exit(1);
    });

    let summary = run_samples(&args).unwrap_or_else(|e| {
        error!("{}", e);
        std::process::exit(1);
    });

    info!("{}", summary.stats);

    let elapsed = start.elapsed();
    info!("Elapsed time: {:.3?}", elapsed);
}
