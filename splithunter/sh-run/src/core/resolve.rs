//! Expands an input descriptor into the samples to process.
//!
//! Four modes are tried in order: `@sampleKey` lookup in a reference
//! table, a single alignment file, a bare list of alignment files, and a
//! `sampleKey,bamPath[,...]` manifest.

use std::io::BufRead;
use std::path::Path;

use config::{is_alignment, sample_key_from_path, AlignmentPath, Locus, SampleTask, COMMA};
use hashbrown::HashSet;
use log::{debug, info, warn};

use crate::core::RunError;
use crate::utils::{lookup_reference, reader};

const LOOKUP_PREFIX: char = '@';

/// everything besides the descriptor that shapes resolution
#[derive(Debug, Default, Clone)]
pub struct ResolveOptions<'a> {
    pub reference: Option<&'a Path>,
    pub workflow_execution_id: Option<&'a str>,
    pub sample_id: Option<&'a str>,
    pub locus: Option<Locus>,
}

pub fn resolve(descriptor: &str, opts: &ResolveOptions) -> Result<Vec<SampleTask>, RunError> {
    let tasks = if let Some(key) = descriptor.strip_prefix(LOOKUP_PREFIX) {
        vec![from_lookup(key, opts)?]
    } else if is_alignment(descriptor) {
        vec![from_alignment(descriptor, opts)?]
    } else {
        from_file(descriptor, opts)?
    };

    if tasks.is_empty() {
        return Err(RunError::InputResolution(format!(
            "no alignment files found in `{}`",
            descriptor
        )));
    }

    let mut seen = HashSet::new();
    for task in tasks.iter() {
        check_sample_key(&task.sample_key)?;

        if !seen.insert(task.sample_key.as_str()) {
            warn!(
                "Sample key `{}` appears more than once; its record will be overwritten",
                task.sample_key
            );
        }
    }
    drop(seen);

    info!("Total samples: {}", tasks.len());
    Ok(tasks)
}

/// sample keys name a working directory and a record in the sink,
/// so they must be a single plain path component
fn check_sample_key(sample_key: &str) -> Result<(), RunError> {
    let plain = !sample_key.is_empty()
        && sample_key != "."
        && sample_key != ".."
        && !sample_key.contains(['/', '\\']);

    if plain {
        Ok(())
    } else {
        Err(RunError::InputResolution(format!(
            "sample key `{}` is not a plain file name",
            sample_key
        )))
    }
}

fn from_lookup(key: &str, opts: &ResolveOptions) -> Result<SampleTask, RunError> {
    let table = opts.reference.ok_or_else(|| {
        RunError::InputResolution(format!(
            "`@{}` needs a reference table, use --reference",
            key
        ))
    })?;

    if !table.is_file() {
        return Err(RunError::InputResolution(format!(
            "reference table {:?} does not exist",
            table
        )));
    }

    let bam = lookup_reference(table, key)?.ok_or_else(|| {
        RunError::InputResolution(format!("sample key `{}` not found in {:?}", key, table))
    })?;

    debug!("Resolved @{} to {}", key, bam);
    Ok(SampleTask::new(key, AlignmentPath::resolve(&bam)?, opts.locus))
}

fn from_alignment(path: &str, opts: &ResolveOptions) -> Result<SampleTask, RunError> {
    let bam = AlignmentPath::resolve(path)?;

    let sample_key = match (opts.workflow_execution_id, opts.sample_id) {
        (Some(workflow), Some(sample)) => format!("{}_{}", workflow, sample),
        _ => sample_key_from_path(path),
    };

    Ok(SampleTask::new(sample_key, bam, opts.locus))
}

fn from_file(descriptor: &str, opts: &ResolveOptions) -> Result<Vec<SampleTask>, RunError> {
    let path = Path::new(descriptor);
    if !path.is_file() {
        return Err(RunError::InputResolution(format!(
            "`{}` does not exist or is not a recognized input",
            descriptor
        )));
    }

    let lines = reader(path)?
        .lines()
        .collect::<Result<Vec<String>, _>>()?;

    let Some(header) = lines.iter().map(|l| l.trim()).find(|l| !l.is_empty()) else {
        return Err(RunError::InputResolution(format!("`{}` is empty", descriptor)));
    };

    if is_alignment(header) && !header.contains(COMMA) {
        debug!("Reading `{}` as a list of alignments", descriptor);
        from_list(&lines, opts)
    } else {
        debug!("Reading `{}` as a sampleKey,bamPath manifest", descriptor);
        from_manifest(&lines, opts)
    }
}

fn from_list(lines: &[String], opts: &ResolveOptions) -> Result<Vec<SampleTask>, RunError> {
    lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|bam| -> Result<SampleTask, RunError> {
            Ok(SampleTask::new(
                sample_key_from_path(bam),
                AlignmentPath::resolve(bam)?,
                opts.locus,
            ))
        })
        .collect()
}

fn from_manifest(lines: &[String], opts: &ResolveOptions) -> Result<Vec<SampleTask>, RunError> {
    let mut tasks = Vec::new();

    for line in lines {
        let mut atoms = line.trim().split(COMMA).map(str::trim);
        let (Some(sample_key), Some(bam)) = (atoms.next(), atoms.next()) else {
            continue;
        };

        // INFO: header rows and non-alignment rows are dropped here
        if sample_key.is_empty() || !is_alignment(bam) {
            debug!("Skipping manifest row `{}`", line.trim());
            continue;
        }

        tasks.push(SampleTask::new(
            sample_key,
            AlignmentPath::resolve(bam)?,
            opts.locus,
        ));
    }

    Ok(tasks)
}
