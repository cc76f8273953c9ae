use clap::Parser;
use config::{validate, ArgCheck, CliError, Locus};
use std::path::PathBuf;

pub const LOG_LEVELS: [&str; 2] = ["INFO", "DEBUG"];
const GZ: &str = "gz";

#[derive(Debug, Parser)]
#[command(
    version,
    about = "Parse the target loci from each input alignment, extract split reads and split read pairs"
)]
pub struct Args {
    #[arg(
        value_name = "INPUT",
        help = "Input descriptor: @SAMPLEKEY, a .bam/.cram file, a list of alignments or a sampleKey,bamPath csv"
    )]
    pub infile: Option<String>,

    #[arg(
        short = 'l',
        long = "locus",
        required = false,
        value_name = "LOCUS",
        help = "Compute only one locus, one of TRA|TRB|TRG|IGH|IGK|IGL"
    )]
    pub locus: Option<Locus>,

    #[arg(
        short = 't',
        long = "cpus",
        help = "Number of CPUs to use",
        value_name = "CPUS",
        default_value_t = num_cpus::get()
    )]
    pub threads: usize,

    #[arg(
        short = 'w',
        long = "workdir",
        value_name = "DIR",
        help = "Working directory, also the sink for per-sample JSON records",
        default_value(".")
    )]
    pub workdir: PathBuf,

    #[arg(
        short = 'e',
        long = "exec",
        required = false,
        value_name = "PATH",
        help = "Path to the Splithunter binary [default: looked up on PATH]"
    )]
    pub exec: Option<PathBuf>,

    #[arg(
        short = 'r',
        long = "reference",
        required = false,
        value_name = "PATH",
        help = "sampleKey,bamPath table [.csv or .csv.gz] used to resolve @SAMPLEKEY inputs"
    )]
    pub reference: Option<PathBuf>,

    #[arg(
        long = "log",
        value_name = "LEVEL",
        help = "Log level, DEBUG=verbose",
        default_value("INFO"),
        value_parser = LOG_LEVELS
    )]
    pub log: String,

    #[arg(long = "sample-id", value_name = "ID", help = "Sample ID")]
    pub sample_id: Option<String>,

    #[arg(
        long = "workflow-execution-id",
        value_name = "ID",
        help = "Workflow execution ID"
    )]
    pub workflow_execution_id: Option<String>,

    #[arg(
        long = "input-bam-path",
        value_name = "URI",
        help = "Input object-store path, overrides INPUT"
    )]
    pub input_bam_path: Option<String>,

    #[arg(long = "output-path", value_name = "URI", help = "Output object-store path")]
    pub output_path: Option<String>,
}

impl ArgCheck for Args {
    /// the descriptor is free-form, so only its presence is checked; the
    /// reference table may also be gzip-compressed
    fn check_inputs(&self) -> Result<(), CliError> {
        if self.descriptor().is_none() {
            let err = "ERROR: no input provided, use INPUT or --input-bam-path".to_string();
            return Err(CliError::InvalidInput(err));
        }

        for reference in self.get_inputs() {
            let extension = match reference.extension() {
                Some(ext) if ext == GZ => GZ,
                _ => self.get_extension(),
            };
            validate(reference, extension)?;
        }

        Ok(())
    }

    fn get_inputs(&self) -> Vec<&PathBuf> {
        self.reference.iter().collect()
    }

    fn get_extension(&self) -> &str {
        "csv"
    }

    fn get_threads(&self) -> usize {
        self.threads
    }
}

impl Args {
    pub fn from(args: Vec<String>) -> Self {
        let mut full_args = vec![env!("CARGO_PKG_NAME").to_string()];
        full_args.extend(args);

        Args::parse_from(full_args)
    }

    /// --input-bam-path wins over the positional input
    pub fn descriptor(&self) -> Option<&str> {
        self.input_bam_path
            .as_deref()
            .or(self.infile.as_deref())
            .filter(|d| !d.is_empty())
    }

    pub fn level(&self) -> log::Level {
        match self.log.as_str() {
            "DEBUG" => log::Level::Debug,
            _ => log::Level::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_bam_path_overrides_infile() {
        let args = Args::from(vec![
            "samples.csv".to_string(),
            "--input-bam-path".to_string(),
            "s3://bucket/a.bam".to_string(),
            "--locus".to_string(),
            "TRA".to_string(),
            "--cpus".to_string(),
            "2".to_string(),
        ]);

        assert_eq!(args.descriptor(), Some("s3://bucket/a.bam"));
        assert_eq!(args.locus, Some(Locus::Tra));
        assert_eq!(args.threads, 2);
        assert!(args.check().is_ok());
    }

    #[test]
    fn test_missing_descriptor_is_rejected() {
        let args = Args::from(vec!["--cpus".to_string(), "1".to_string()]);
        assert!(args.check().is_err());
    }

    #[test]
    fn test_reference_table_may_be_gzipped() {
        let dir = tempfile::tempdir().unwrap();
        let with = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            Args::from(vec![
                "@s1".to_string(),
                "--reference".to_string(),
                path.display().to_string(),
            ])
        };

        assert!(with("bams.csv", "s1,s3://b/s1.bam\n").check().is_ok());
        assert!(with("bams.csv.gz", "not really gzip").check().is_ok());
        assert!(with("bams.txt", "s1,s3://b/s1.bam\n").check().is_err());
        assert!(with("empty.csv", "").check().is_err());

        let missing = Args::from(vec![
            "@s1".to_string(),
            "--reference".to_string(),
            dir.path().join("nope.csv").display().to_string(),
        ]);
        assert!(missing.check().is_err());
    }

    #[test]
    fn test_zero_cpus_is_rejected() {
        let args = Args::from(vec!["a.bam".to_string(), "--cpus".to_string(), "0".to_string()]);
        assert!(args.check().is_err());
    }
}
