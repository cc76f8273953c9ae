use clap::Parser;
use config::{ArgCheck, Locus, JSON, TSV};
use std::path::PathBuf;

pub const LOG_LEVELS: [&str; 2] = ["INFO", "DEBUG"];

#[derive(Debug, Parser)]
#[command(
    version,
    about = "Compile splithunter calls into a tsv file from a set of JSON files"
)]
pub struct Args {
    #[arg(
        value_name = "JSON",
        help = "Per-sample JSON records; without any, re-read --tsv and only filter"
    )]
    pub files: Vec<PathBuf>,

    #[arg(
        long = "tsv",
        value_name = "PATH",
        help = "Path to the tsv file",
        default_value(TSV)
    )]
    pub tsv: PathBuf,

    #[arg(
        short = 't',
        long = "cpus",
        help = "Number of threads",
        value_name = "CPUS",
        default_value_t = num_cpus::get()
    )]
    pub threads: usize,

    #[arg(
        short = 'l',
        long = "locus",
        value_name = "LOCUS",
        help = "Locus to filter for scoring",
        default_value_t = Locus::Tra
    )]
    pub locus: Locus,

    #[arg(
        long = "log",
        value_name = "LEVEL",
        help = "Log level, DEBUG=verbose",
        default_value("INFO"),
        value_parser = LOG_LEVELS
    )]
    pub log: String,
}

impl ArgCheck for Args {
    fn get_inputs(&self) -> Vec<&PathBuf> {
        self.files.iter().collect()
    }

    fn get_extension(&self) -> &str {
        JSON
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
    fn test_defaults() {
        let args = Args::from(vec![]);

        assert!(args.files.is_empty());
        assert_eq!(args.tsv, PathBuf::from("out.tsv"));
        assert_eq!(args.locus, Locus::Tra);
        assert_eq!(args.level(), log::Level::Info);
        assert!(args.check().is_ok());
    }

    #[test]
    fn test_records_must_be_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("s1.json");
        let other = dir.path().join("s1.txt");
        std::fs::write(&record, "{}").unwrap();
        std::fs::write(&other, "{}").unwrap();

        let ok = Args::from(vec![record.display().to_string()]);
        assert!(ok.check().is_ok());

        let bad = Args::from(vec![record.display().to_string(), other.display().to_string()]);
        assert!(bad.check().is_err());

        let missing = Args::from(vec![dir.path().join("nope.json").display().to_string()]);
        assert!(missing.check().is_err());
    }
}
