//! Resumable, bounded-parallel dispatch of sample tasks.
//!
//! Tasks whose record already sits in the sink are skipped, so a crashed
//! or partial run resumes by running again with the same sink. Every
//! result is persisted as soon as its task finishes.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use config::{get_progress_bar, SampleResult, SampleTask, TaskFailure};
use log::{debug, error, info, warn};
use rayon::prelude::*;

use crate::core::runner::TaskRunner;
use crate::core::RunError;
use crate::utils::{has_valid_record, write_record};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    pub total: u32,
    pub skipped: u32,
    pub succeeded: u32,
    pub failed: u32,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} skipped={} succeeded={} failed={}",
            self.total, self.skipped, self.succeeded, self.failed
        )
    }
}

#[derive(Default)]
struct ParallelCounter {
    succeeded: AtomicU32,
    failed: AtomicU32,
}

impl ParallelCounter {
    fn inc_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// run every task without a valid record in `sink` on at most
/// `concurrency` workers; zero is treated as one
pub fn run_all<R>(
    runner: &R,
    tasks: &[SampleTask],
    sink: &Path,
    concurrency: usize,
) -> Result<Statistics, RunError>
where
    R: TaskRunner + ?Sized,
{
    std::fs::create_dir_all(sink)?;

    let (done, pending): (Vec<&SampleTask>, Vec<&SampleTask>) = tasks
        .iter()
        .partition(|task| has_valid_record(sink, &task.sample_key));

    for task in done.iter() {
        debug!("Skipping {}: record already exists", task.sample_key);
    }

    let mut stats = Statistics {
        total: tasks.len() as u32,
        skipped: done.len() as u32,
        ..Default::default()
    };

    let workers = concurrency.max(1).min(pending.len());
    if workers == 0 {
        info!("All jobs already completed.");
        return Ok(stats);
    }

    info!("Starting {} workers for {} jobs.", workers, pending.len());
    let pb = get_progress_bar(pending.len() as u64, "Running samples...");
    let counter = ParallelCounter::default();

    let work = |task: &SampleTask| {
        let result = run_isolated(runner, task);
        persist(sink, &result, &counter);
        pb.inc(1);
    };

    if workers == 1 {
        pending.iter().for_each(|&task| work(task));
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;

        pool.install(|| pending.par_iter().for_each(|&task| work(task)));
    }

    pb.finish_and_clear();

    stats.succeeded = counter.succeeded.load(Ordering::Relaxed);
    stats.failed = counter.failed.load(Ordering::Relaxed);
    info!("Jobs finished: {}", stats);

    Ok(stats)
}

/// a panic inside one task becomes that task's failure
fn run_isolated<R>(runner: &R, task: &SampleTask) -> SampleResult
where
    R: TaskRunner + ?Sized,
{
    info!("Working on {} `{}`", task.sample_key, task.bam);

    catch_unwind(AssertUnwindSafe(|| runner.run(task))).unwrap_or_else(|payload| {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());

        SampleResult::failure(&task.sample_key, TaskFailure::Panicked(msg))
    })
}

fn persist(sink: &Path, result: &SampleResult, counter: &ParallelCounter) {
    match &result.outcome {
        Ok(_) => info!("{} done", result.sample_key),
        Err(failure) => warn!("{} failed: {}", result.sample_key, failure),
    }

    match write_record(sink, result) {
        Ok(path) => {
            debug!("Record written to {:?}", path);
            if result.is_success() {
                counter.inc_succeeded();
            } else {
                counter.inc_failed();
            }
        }
        Err(e) => {
            error!("Could not persist record of {}: {}", result.sample_key, e);
            counter.inc_failed();
        }
    }
}
