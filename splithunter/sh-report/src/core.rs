//! Core module for compiling splithunter records into tsv reports
//!
//! The report stage reads every per-sample JSON record into one table,
//! writes it as tsv and then filters one locus for downstream scoring
//! into `<stem>.<LOCUS>.tsv`.

pub mod aggregate;
pub mod filter;
pub mod parse;

use std::path::{Path, PathBuf};

use config::{CliError, Locus, TAB};
use log::info;
use thiserror::Error;

use crate::cli::Args;
use crate::core::aggregate::{aggregate, AggregatedTable};
use crate::core::filter::{filter_locus, render_metrics, LocusRule, MetricRow};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("ERROR: could not parse `{input}`: {reason}")]
    Parse { input: String, reason: String },
    #[error("{0}")]
    InvalidArgs(#[from] CliError),
    #[error("ERROR: no sample records to report, check input files")]
    EmptyResult,
    #[error("ERROR: {sample_key}: {metric} requested with a zero total")]
    DivisionByZero { sample_key: String, metric: String },
    #[error("ERROR: {sample_key}: missing field `{field}`")]
    MissingField { sample_key: String, field: String },
    #[error("ERROR: no filtering rule for locus {0}")]
    MissingRule(Locus),
    #[error("ERROR: no JSON records given and no existing tsv to re-read")]
    NoInput,
    #[error("ERROR: malformed record {path:?}: {reason}")]
    Json { path: PathBuf, reason: String },
    #[error("ERROR: could not build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
pub struct ReportSummary {
    /// aggregated table, only written when records were given
    pub table: Option<PathBuf>,
    pub metrics: PathBuf,
    pub samples: usize,
}

/// `out.tsv` -> `out.TRA.tsv`
pub fn metrics_path(tsv: &Path, locus: Locus) -> PathBuf {
    tsv.with_extension(format!("{}.tsv", locus))
}

/// aggregate `files` into `tsv`, then filter `locus` next to it
pub fn report_files(
    files: &[PathBuf],
    tsv: &Path,
    locus: Locus,
    threads: usize,
) -> Result<ReportSummary, ReportError> {
    let rule = LocusRule::for_locus(locus)?;

    info!(
        "Using {} cpus to parse {} JSON files",
        threads.clamp(1, files.len().max(1)),
        files.len()
    );
    let table = aggregate(files, threads)?;

    std::fs::write(tsv, table.render(TAB))?;
    info!(
        "TSV output written to {:?} (# samples={})",
        tsv,
        table.len()
    );

    let metrics = filter_table(&table, tsv, &rule, threads)?;

    Ok(ReportSummary {
        table: Some(tsv.to_path_buf()),
        metrics,
        samples: table.len(),
    })
}

/// filter `locus` out of an aggregated tsv written by an earlier report
pub fn report_existing(tsv: &Path, locus: Locus, threads: usize) -> Result<ReportSummary, ReportError> {
    let rule = LocusRule::for_locus(locus)?;

    let text = std::fs::read_to_string(tsv)?;
    let table = AggregatedTable::from_delimited(&text, TAB)?;
    if table.is_empty() {
        return Err(ReportError::EmptyResult);
    }
    info!("Re-read {} samples from {:?}", table.len(), tsv);

    let metrics = filter_table(&table, tsv, &rule, threads)?;

    Ok(ReportSummary {
        table: None,
        metrics,
        samples: table.len(),
    })
}

fn filter_table(
    table: &AggregatedTable,
    tsv: &Path,
    rule: &LocusRule,
    threads: usize,
) -> Result<PathBuf, ReportError> {
    info!("Filtering {} locus", rule.locus);
    let metrics: Vec<MetricRow> = filter_locus(table, rule, threads)?;

    let path = metrics_path(tsv, rule.locus);
    std::fs::write(&path, render_metrics(&metrics, rule, TAB))?;
    info!(
        "TSV output written to {:?} (# samples={})",
        path,
        metrics.len()
    );

    Ok(path)
}

pub fn report(args: &Args) -> Result<ReportSummary, ReportError> {
    if !args.files.is_empty() {
        report_files(&args.files, &args.tsv, args.locus, args.threads)
    } else if args.tsv.is_file() {
        report_existing(&args.tsv, args.locus, args.threads)
    } else {
        Err(ReportError::NoInput)
    }
}
