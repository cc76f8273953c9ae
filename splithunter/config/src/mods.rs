use serde_json::{Map, Value};
use thiserror::Error;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{is_remote, ERROR, SAMPLE_KEY, SUCCESS};

/// scalar fields of one per-sample record, sorted by key
pub type Fields = BTreeMap<String, Value>;

/// genomic region class the external caller can be scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Locus {
    Tra,
    Trb,
    Trg,
    Igh,
    Igk,
    Igl,
}

impl Locus {
    pub const ALL: [Locus; 6] = [
        Locus::Tra,
        Locus::Trb,
        Locus::Trg,
        Locus::Igh,
        Locus::Igk,
        Locus::Igl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Locus::Tra => "TRA",
            Locus::Trb => "TRB",
            Locus::Trg => "TRG",
            Locus::Igh => "IGH",
            Locus::Igk => "IGK",
            Locus::Igl => "IGL",
        }
    }

    /// record key of a per-locus field, e.g. `TRA.SR-DETAILS`
    pub fn key(&self, field: &str) -> String {
        format!("{}.{}", self.as_str(), field)
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locus::ALL
            .iter()
            .find(|locus| locus.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("locus must be one of {}, got '{}'", crate::LOCI, s))
    }
}

/// where an alignment file lives; remote URIs are passed through untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlignmentPath {
    Local(PathBuf),
    Remote(String),
}

impl AlignmentPath {
    /// remote URIs are kept verbatim, everything else becomes absolute
    pub fn resolve(path: &str) -> std::io::Result<Self> {
        if is_remote(path) {
            Ok(AlignmentPath::Remote(path.to_string()))
        } else {
            Ok(AlignmentPath::Local(std::path::absolute(Path::new(path))?))
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            AlignmentPath::Local(path) => path.display().to_string(),
            AlignmentPath::Remote(uri) => uri.clone(),
        }
    }

    /// base name of the alignment file, e.g. `NA12878.bam`
    pub fn file_name(&self) -> String {
        let full = self.as_string();
        full.trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

impl fmt::Display for AlignmentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

/// one unit of work: a single sample and its alignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleTask {
    pub sample_key: String,
    pub bam: AlignmentPath,
    pub locus: Option<Locus>,
}

impl SampleTask {
    pub fn new(sample_key: impl Into<String>, bam: AlignmentPath, locus: Option<Locus>) -> Self {
        Self {
            sample_key: sample_key.into(),
            bam,
            locus,
        }
    }

    /// name of the persisted record for this task
    pub fn record_name(&self) -> String {
        record_name(&self.sample_key)
    }
}

/// `<sampleKey>.json`
pub fn record_name(sample_key: &str) -> String {
    format!("{}.{}", sample_key, crate::JSON)
}

/// why a single task did not produce a result
#[derive(Debug, Error)]
pub enum TaskFailure {
    #[error("working directory {0:?} already exists; a concurrent or crashed run owns it")]
    DuplicateWorkspace(PathBuf),
    #[error("external caller {0:?} could not be started")]
    MissingBinary(PathBuf),
    #[error("external caller exited with status {code:?}: {stderr}")]
    Process { code: Option<i32>, stderr: String },
    #[error("external caller did not write {0:?}")]
    MissingOutput(PathBuf),
    #[error("malformed JSON in {path:?}: {reason}")]
    MalformedJson { path: PathBuf, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("task panicked: {0}")]
    Panicked(String),
}

/// outcome of one task: the caller's fields or a typed failure
#[derive(Debug)]
pub struct SampleResult {
    pub sample_key: String,
    pub outcome: Result<Fields, TaskFailure>,
}

impl SampleResult {
    pub fn success(sample_key: impl Into<String>, fields: Fields) -> Self {
        Self {
            sample_key: sample_key.into(),
            outcome: Ok(fields),
        }
    }

    pub fn failure(sample_key: impl Into<String>, failure: TaskFailure) -> Self {
        Self {
            sample_key: sample_key.into(),
            outcome: Err(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// JSON document persisted for this sample; `SampleKey` is always set
    pub fn to_record(&self) -> Value {
        let mut record = Map::new();

        match &self.outcome {
            Ok(fields) => {
                for (k, v) in fields {
                    record.insert(k.clone(), v.clone());
                }
            }
            Err(failure) => {
                record.insert(SUCCESS.to_string(), Value::Bool(false));
                record.insert(ERROR.to_string(), Value::String(failure.to_string()));
            }
        }

        record.insert(
            SAMPLE_KEY.to_string(),
            Value::String(self.sample_key.clone()),
        );

        Value::Object(record)
    }
}

/// a persisted record counts as complete only if it is a JSON object
/// carrying its sample key and not flagged as a failure
pub fn is_complete_record(record: &Value, sample_key: &str) -> bool {
    let Some(obj) = record.as_object() else {
        return false;
    };

    let key_matches = obj.get(SAMPLE_KEY).and_then(Value::as_str) == Some(sample_key);
    let failed = obj.get(SUCCESS).and_then(Value::as_bool) == Some(false);

    key_matches && !failed
}

/// is a persisted record a failure marker?
pub fn is_failure_record(record: &Map<String, Value>) -> bool {
    record.get(SUCCESS).and_then(Value::as_bool) == Some(false)
}
