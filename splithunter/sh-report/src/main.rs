//! Core module for compiling splithunter records into reports
//!
//! This binary aggregates per-sample JSON records into a tsv table and
//! writes the locus-filtered rates next to it. Without records it
//! re-reads an existing table.

use clap::{CommandFactory, Parser};
use config::ArgCheck;
use log::{error, info};
use simple_logger::init_with_level;

use sh_report::{cli::Args, report, ReportError};

fn main() {
    let start = std::time::Instant::now();
    let args: Args = Args::parse();

    init_with_level(args.level()).expect("ERROR: Failed to initialize logger");
    log::debug!("Commandline arguments: {:?}", args);

    args.check().unwrap_or_else(|e| {
        error!("{}", e);
        std::process::exit(1);
    });

    let summary = report(&args).unwrap_or_else(|e| {
        if let ReportError::NoInput = e {
            let _ = Args::command().print_help();
        }
        error!("{}", e);
        std::process::exit(1);
    });

    info!(
        "Reported {} samples into {:?}",
        summary.samples, summary.metrics
    );

    let elapsed = start.elapsed();
    info!("Elapsed time: {:.3?}", elapsed);
}
