//! Runs the external caller for a single sample.
//!
//! Every task owns a fresh working directory named after its sample key.
//! The caller is started with that directory as its current directory,
//! so no process-wide state is touched and tasks can run side by side.
//! The directory is removed when the task finishes, whatever the outcome.

use std::path::{Path, PathBuf};
use std::process::Command;

use config::{
    is_exe, record_name, Fields, SampleResult, SampleTask, TaskFailure, SAMPLE_KEY,
};
use log::{debug, warn};
use serde_json::Value;

use crate::core::RunError;
use crate::utils::clear_stale_indices;

const STDERR_TAIL: usize = 5;

/// anything that can turn a task into a result; failures live in the result
pub trait TaskRunner: Send + Sync {
    fn run(&self, task: &SampleTask) -> SampleResult;
}

/// explicit runner configuration, built once per run
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// path to the external split-read caller
    pub exec: PathBuf,
    /// parent of the per-task working directories
    pub scratch: PathBuf,
}

#[derive(Debug)]
pub struct SampleRunner {
    config: RunnerConfig,
}

impl SampleRunner {
    /// checks the external binary once, before any work is scheduled
    pub fn new(config: RunnerConfig) -> Result<Self, RunError> {
        if !is_exe(&config.exec) {
            return Err(RunError::FatalPrecondition(config.exec));
        }

        std::fs::create_dir_all(&config.scratch)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn execute(&self, task: &SampleTask, workspace: &Workspace) -> Result<Fields, TaskFailure> {
        clear_stale_indices(workspace.path(), &task.bam)?;

        let mut cmd = Command::new(&self.config.exec);
        cmd.arg(task.bam.as_string())
            .arg("-s")
            .arg(&task.sample_key)
            .current_dir(workspace.path());

        if let Some(locus) = task.locus {
            cmd.arg("-l").arg(locus.as_str());
        }

        debug!("{:?}", cmd);
        let output = cmd.output().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => TaskFailure::MissingBinary(self.config.exec.clone()),
            _ => TaskFailure::Io(e),
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(TaskFailure::Process {
                code: output.status.code(),
                stderr: tail(&stderr, STDERR_TAIL),
            });
        }
        debug!("[{}] caller stderr:\n{}", task.sample_key, stderr);

        let json = workspace.path().join(record_name(&task.sample_key));
        let contents = std::fs::read_to_string(&json).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => TaskFailure::MissingOutput(json.clone()),
            _ => TaskFailure::Io(e),
        })?;

        let fields = match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => map.into_iter().collect::<Fields>(),
            Ok(_) => {
                return Err(TaskFailure::MalformedJson {
                    path: json,
                    reason: "expected a JSON object".to_string(),
                })
            }
            Err(e) => {
                return Err(TaskFailure::MalformedJson {
                    path: json,
                    reason: e.to_string(),
                })
            }
        };

        Ok(with_sample_key(fields, &task.sample_key))
    }
}

impl TaskRunner for SampleRunner {
    fn run(&self, task: &SampleTask) -> SampleResult {
        let workspace = match Workspace::claim(&self.config.scratch, &task.sample_key) {
            Ok(ws) => ws,
            Err(failure) => return SampleResult::failure(&task.sample_key, failure),
        };

        let outcome = self.execute(task, &workspace);
        drop(workspace);

        SampleResult {
            sample_key: task.sample_key.clone(),
            outcome,
        }
    }
}

fn with_sample_key(mut fields: Fields, sample_key: &str) -> Fields {
    fields.insert(SAMPLE_KEY.to_string(), Value::String(sample_key.to_string()));
    fields
}

fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

/// task-exclusive working directory, removed on drop
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    /// create `<root>/<sample_key>`; an existing directory means another
    /// run (live or crashed) owns this sample
    pub fn claim(root: &Path, sample_key: &str) -> Result<Self, TaskFailure> {
        let path = root.join(sample_key);

        match std::fs::create_dir(&path) {
            Ok(()) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(TaskFailure::DuplicateWorkspace(path))
            }
            Err(e) => Err(TaskFailure::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!("Could not remove working directory {:?}: {}", self.path, e);
        }
    }
}
