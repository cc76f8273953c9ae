//! Core module for dispatching the split-read caller over many samples
//!
//! The run stage resolves the input descriptor into sample tasks, checks
//! once that the external caller exists, and then schedules one isolated
//! task per sample with bounded parallelism. Records land in the working
//! directory, one `<sampleKey>.json` each, so re-running the same command
//! only processes the samples that are still missing.

pub mod resolve;
pub mod runner;
pub mod scheduler;

use std::path::PathBuf;

use config::{which, CliError, SampleTask, EXEC};
use log::info;
use thiserror::Error;

use crate::cli::Args;
use crate::core::resolve::{resolve, ResolveOptions};
use crate::core::runner::{RunnerConfig, SampleRunner};
use crate::core::scheduler::{run_all, Statistics};

/// per-task working directories live under this folder of the workdir
pub const WORKSPACES: &str = ".splithunter";

#[derive(Debug, Error)]
pub enum RunError {
    #[error("ERROR: {0:?} not found or not executable. Please check or recompile.")]
    FatalPrecondition(PathBuf),
    #[error("{0}")]
    InvalidArgs(#[from] CliError),
    #[error("ERROR: could not resolve input: {0}")]
    InputResolution(String),
    #[error("ERROR: could not build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// what a finished run stage hands to the report stage
#[derive(Debug)]
pub struct RunSummary {
    pub tasks: Vec<SampleTask>,
    pub sink: PathBuf,
    pub stats: Statistics,
}

impl RunSummary {
    /// records of every resolved sample, in input order
    pub fn records(&self) -> Vec<PathBuf> {
        self.tasks
            .iter()
            .map(|task| self.sink.join(task.record_name()))
            .collect()
    }
}

/// locate the external caller: --exec, else PATH, else next to this binary
pub fn find_exec(exec: Option<&PathBuf>) -> Result<PathBuf, RunError> {
    if let Some(exec) = exec {
        return Ok(exec.clone());
    }

    let beside = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        .into_iter()
        .collect::<Vec<_>>();

    which(EXEC, &beside).ok_or_else(|| RunError::FatalPrecondition(PathBuf::from(EXEC)))
}

pub fn run_samples(args: &Args) -> Result<RunSummary, RunError> {
    let exec = find_exec(args.exec.as_ref())?;

    std::fs::create_dir_all(&args.workdir)?;
    let sink = std::path::absolute(&args.workdir)?;

    let runner = SampleRunner::new(RunnerConfig {
        exec,
        scratch: sink.join(WORKSPACES),
    })?;
    info!("Using caller {:?}", runner.config().exec);

    let descriptor = args
        .descriptor()
        .ok_or_else(|| RunError::InputResolution("no input provided".to_string()))?;

    let opts = ResolveOptions {
        reference: args.reference.as_deref(),
        workflow_execution_id: args.workflow_execution_id.as_deref(),
        sample_id: args.sample_id.as_deref(),
        locus: args.locus,
    };
    let tasks = resolve(descriptor, &opts)?;

    let stats = run_all(&runner, &tasks, &sink, args.threads)?;

    if let Some(output) = &args.output_path {
        info!(
            "Records in {:?} are ready to be pushed to {}",
            sink, output
        );
    }

    Ok(RunSummary { tasks, sink, stats })
}
