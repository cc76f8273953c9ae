//! Core module for running the Splithunter split-read caller per sample
//!
//! This module resolves heterogeneous input descriptors [a single
//! alignment, a list of alignments, a sampleKey,bamPath manifest or an
//! @sampleKey lookup] into sample tasks and runs the external caller
//! once per sample in parallel.
//!
//! In short, every task gets its own working directory, its failures are
//! recorded instead of propagated, and each finished record is written
//! right away. Re-running with the same working directory skips the
//! samples that already have a valid record.

pub mod cli;
pub mod core;
pub mod utils;

pub use crate::core::{run_samples, RunError, RunSummary};

use config::ArgCheck;

pub fn lib_sh_run(args: Vec<String>) -> Result<RunSummary, RunError> {
    let args = cli::Args::from(args);
    args.check()?;

    run_samples(&args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lib_rejects_zero_cpus_before_running() {
        let result = lib_sh_run(vec!["x.bam".to_string(), "--cpus".to_string(), "0".to_string()]);
        assert!(matches!(result, Err(RunError::InvalidArgs(_))));
    }
}
