//! Shared configuration for the splithunter tools
//!
//! This crate holds the universal constants used across the
//! splithunter pipeline [loci, alignment suffixes, remote schemes,
//! column names and filtering thresholds], the per-sample record
//! schema exchanged between the run and report stages, and a handful
//! of helpers [progress bars, binary discovery, argument checks].

pub mod fns;
pub mod mods;

pub use fns::*;
pub use mods::*;

// numeric values
pub const MIN_THREADS: usize = 1;
pub const PPM_SCALE: f64 = 1e6;
pub const SLICING_BOUNDARY: i64 = 800_000;
pub const TRA_START: i64 = 21_621_904;
pub const SP_WEIGHT: f64 = 2.0; // INFO: split-read pairs count twice in the combined rate

// external caller
pub const EXEC: &str = "Splithunter";
pub const LOCI: &str = "TRA|TRB|TRG|IGH|IGK|IGL";

// file names and suffixes
pub const JSON: &str = "json";
pub const TSV: &str = "out.tsv";
pub const ALIGNMENT_SUFFIXES: [&str; 2] = [".bam", ".cram"];
pub const REMOTE_SCHEMES: [&str; 4] = ["s3://", "http://", "https://", "ftp://"];

// record keys
pub const SAMPLE_KEY: &str = "SampleKey";
pub const SUCCESS: &str = "Success";
pub const ERROR: &str = "Error";

// delimiters
pub const TAB: char = '\t';
pub const COMMA: char = ',';
