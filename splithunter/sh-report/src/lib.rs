//! Core module for compiling splithunter records into reports
//!
//! This module merges per-sample JSON records into one tsv table, sorted
//! by sample key with columns in a fixed order, and filters one locus of
//! that table into split-read rates per million.
//!
//! Split alignments are given as `chr:start-end(strand)|chr:start-end(strand);`
//! and reduced to their midpoints before the locus rule is applied.

pub mod cli;
pub mod core;

pub use crate::core::{report, report_existing, report_files, ReportError, ReportSummary};

use config::ArgCheck;

pub fn lib_sh_report(args: Vec<String>) -> Result<ReportSummary, ReportError> {
    let args = cli::Args::from(args);
    args.check()?;

    report(&args)
}
