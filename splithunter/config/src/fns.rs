use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{ALIGNMENT_SUFFIXES, MIN_THREADS, REMOTE_SCHEMES};

// os
#[cfg(not(windows))]
const TICK_SETTINGS: (&str, u64) = ("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ", 80);
#[cfg(windows)]
const TICK_SETTINGS: (&str, u64) = (r"+-x| ", 200);

/// return a pre-configured progress bar
pub fn get_progress_bar(length: u64, msg: &str) -> ProgressBar {
    let progressbar_style = ProgressStyle::default_spinner()
        .tick_chars(TICK_SETTINGS.0)
        .template(" {spinner} {msg:<30} {wide_bar} {pos}/{len} ETA {eta_precise} ")
        .expect("no template error");

    let progress_bar = ProgressBar::new(length);

    progress_bar.set_style(progressbar_style);
    progress_bar.enable_steady_tick(Duration::from_millis(TICK_SETTINGS.1));
    progress_bar.set_message(msg.to_owned());

    progress_bar
}

/// is the path network-based?
pub fn is_remote(path: &str) -> bool {
    REMOTE_SCHEMES.iter().any(|scheme| path.starts_with(scheme))
}

/// does the path name an alignment file [.bam/.cram]?
pub fn is_alignment(path: &str) -> bool {
    ALIGNMENT_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
}

/// derive a sample key from the base name of a local path or remote URI,
/// dropping the last extension
///
/// # Example
///
/// ```rust
/// use config::sample_key_from_path;
///
/// assert_eq!(sample_key_from_path("s3://bucket/run/NA12878.bam"), "NA12878");
/// assert_eq!(sample_key_from_path("/data/a.sorted.cram"), "a.sorted");
/// ```
pub fn sample_key_from_path(path: &str) -> String {
    let base = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path);

    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => base.to_string(),
    }
}

/// emulates the unix `which` command, searching PATH first and then
/// any extra directories
pub fn which(program: &str, extra: &[PathBuf]) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_exe(candidate).then(|| candidate.to_path_buf());
    }

    let paths = std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect::<Vec<_>>())
        .unwrap_or_default();

    let found = paths
        .iter()
        .chain(extra.iter())
        .map(|dir| dir.join(program))
        .find(|exe| is_exe(exe))
        .map(|exe| std::path::absolute(&exe).unwrap_or(exe));

    match &found {
        Some(exe) => log::info!("Found {} at {:?}", program, exe),
        None => log::warn!(
            "{} not found on PATH or in {} extra directories",
            program,
            extra.len()
        ),
    }

    found
}

/// determines if a file is executable
pub fn is_exe(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        true
    }
}

/// argument checker for all subcommands
pub trait ArgCheck {
    fn check(&self) -> Result<(), CliError> {
        self.validate_args()
    }

    fn validate_args(&self) -> Result<(), CliError> {
        self.check_inputs()?;

        if self.get_threads() < MIN_THREADS {
            return Err(CliError::InvalidInput(format!(
                "ERROR: --cpus must be at least {}",
                MIN_THREADS
            )));
        }

        Ok(())
    }

    fn check_inputs(&self) -> Result<(), CliError> {
        for input in self.get_inputs() {
            validate(input, self.get_extension())?;
        }

        Ok(())
    }

    fn get_inputs(&self) -> Vec<&PathBuf>;
    fn get_extension(&self) -> &str;
    fn get_threads(&self) -> usize;
}

/// error handling for CLI
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// argument validation
pub fn validate(arg: &PathBuf, extension: &str) -> Result<(), CliError> {
    if !arg.exists() {
        return Err(CliError::InvalidInput(format!(
            "ERROR: {:?} does not exist",
            arg
        )));
    }

    if !arg.is_file() {
        return Err(CliError::InvalidInput(format!(
            "ERROR: {:?} is not a file",
            arg
        )));
    }

    match arg.extension() {
        Some(ext) if ext == extension => (),
        _ => {
            return Err(CliError::InvalidInput(format!(
                "ERROR: file {:?} is not a .{} file",
                arg, extension
            )))
        }
    }

    match std::fs::metadata(arg) {
        Ok(metadata) if metadata.len() == 0 => Err(CliError::InvalidInput(format!(
            "ERROR: file {:?} is empty",
            arg
        ))),
        Ok(_) => Ok(()),
        Err(e) => Err(CliError::IoError(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_remote_schemes_are_detected() {
        assert!(is_remote("s3://bucket/a.bam"));
        assert!(is_remote("https://host/a.bam"));
        assert!(is_remote("ftp://host/a.bam"));
        assert!(!is_remote("/data/s3://a.bam"));
        assert!(!is_remote("a.bam"));
    }

    #[test]
    fn test_sample_key_drops_last_extension() {
        assert_eq!(sample_key_from_path("NA12878.bam"), "NA12878");
        assert_eq!(sample_key_from_path("/a/b/c.final.bam"), "c.final");
        assert_eq!(sample_key_from_path("https://h/x/y.cram"), "y");
        assert_eq!(sample_key_from_path("noext"), "noext");
    }

    #[test]
    fn test_validate_rejects_wrong_extension_and_empty() {
        let dir = tempfile::tempdir().unwrap();

        let empty = dir.path().join("a.json");
        std::fs::File::create(&empty).unwrap();
        assert!(validate(&empty, "json").is_err());

        let wrong = dir.path().join("a.txt");
        let mut f = std::fs::File::create(&wrong).unwrap();
        writeln!(f, "{{}}").unwrap();
        assert!(validate(&wrong, "json").is_err());

        let good = dir.path().join("b.json");
        let mut f = std::fs::File::create(&good).unwrap();
        writeln!(f, "{{}}").unwrap();
        assert!(validate(&good, "json").is_ok());

        assert!(validate(&dir.path().join("missing.json"), "json").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_which_finds_executables_in_extra_dirs() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("splithunter-fake-caller");
        std::fs::write(&exe, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let found = which("splithunter-fake-caller", &[dir.path().to_path_buf()]);
        assert_eq!(found, Some(exe.clone()));

        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(which("splithunter-fake-caller", &[dir.path().to_path_buf()]).is_none());
    }
}
