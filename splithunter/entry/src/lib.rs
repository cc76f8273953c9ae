use anyhow::{bail, Context, Result};
use config::{ArgCheck, Locus, TSV};
use log::{info, warn};
use sh_report::{report_files, ReportSummary};
use sh_run::cli::Args as RunArgs;
use sh_run::run_samples;
use sh_run::utils::has_valid_record;

use std::path::PathBuf;

const TSV_FLAG: &str = "--tsv";

/// pull `--tsv PATH` (or `--tsv=PATH`) out of the forwarded arguments;
/// everything else belongs to the run stage
pub fn split_report_args(args: Vec<String>) -> Result<(Vec<String>, Option<PathBuf>)> {
    let mut rest = Vec::with_capacity(args.len());
    let mut tsv = None;
    let mut iter = args.into_iter();

    while let Some(arg) = iter.next() {
        if arg == TSV_FLAG {
            let path = iter
                .next()
                .with_context(|| format!("ERROR: {} needs a value", TSV_FLAG))?;
            tsv = Some(PathBuf::from(path));
        } else if let Some(path) = arg.strip_prefix("--tsv=") {
            tsv = Some(PathBuf::from(path));
        } else {
            rest.push(arg);
        }
    }

    Ok((rest, tsv))
}

/// run every sample, then report over the records that succeeded
///
/// A relative `tsv` lands in the working directory. The report locus is
/// the run locus, or TRA when all loci were computed.
pub fn pipeline(args: &RunArgs, tsv: Option<PathBuf>) -> Result<ReportSummary> {
    let summary = run_samples(args)?;
    info!("Run stage finished: {}", summary.stats);

    let records: Vec<PathBuf> = summary
        .tasks
        .iter()
        .filter(|task| {
            let ok = has_valid_record(&summary.sink, &task.sample_key);
            if !ok {
                warn!("{} has no successful record, leaving it out", task.sample_key);
            }
            ok
        })
        .map(|task| summary.sink.join(task.record_name()))
        .collect();

    if records.is_empty() {
        bail!("ERROR: no sample finished successfully, nothing to report");
    }

    let tsv = tsv.unwrap_or_else(|| PathBuf::from(TSV));
    let tsv = if tsv.is_relative() {
        summary.sink.join(tsv)
    } else {
        tsv
    };

    let locus = args.locus.unwrap_or(Locus::Tra);
    let report = report_files(&records, &tsv, locus, args.threads)?;

    Ok(report)
}

pub fn lib(args: Vec<String>) -> Result<ReportSummary> {
    let (args, tsv) = split_report_args(args)?;
    let args = RunArgs::from(args);
    args.check()?;

    pipeline(&args, tsv)
}
