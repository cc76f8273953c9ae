/// splithunter: split-read analysis of immune receptor loci
///
/// This is the entry point for the splithunter CLI. It parses the
/// subcommand and forwards the remaining arguments to the matching
/// stage:
/// - run: call every sample with the external Splithunter binary
/// - report: compile JSON records into tsv and filter one locus
/// - pipeline: run, then report over the successful records
///
/// To get help on the subcommands, you can run:
///
/// ```shell
/// splithunter run -- --help
/// ```
///
use clap::{Args, Parser, Subcommand};
use config::ArgCheck;
use log::{error, info, Level};
use simple_logger::init_with_level;

use splithunter::{pipeline, split_report_args};

#[derive(Parser)]
#[command(name = "splithunter")]
#[command(about = "splithunter: split-read analysis of immune receptor loci")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(name = "run")]
    Run(StageArgs),
    #[command(name = "report")]
    Report(StageArgs),
    #[command(name = "pipeline")]
    Pipeline(StageArgs),
}

#[derive(Args)]
struct StageArgs {
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() {
    let start = std::time::Instant::now();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(stage) => {
            let args = sh_run::cli::Args::from(stage.args);
            init(args.level(), &args);

            let summary = sh_run::run_samples(&args).unwrap_or_else(|e| exit(e));
            info!("{}", summary.stats);
        }
        Commands::Report(stage) => {
            let args = sh_report::cli::Args::from(stage.args);
            init(args.level(), &args);

            let summary = sh_report::report(&args).unwrap_or_else(|e| exit(e));
            info!(
                "Reported {} samples into {:?}",
                summary.samples, summary.metrics
            );
        }
        Commands::Pipeline(stage) => {
            let (rest, tsv) = split_report_args(stage.args).unwrap_or_else(|e| {
                eprintln!("{}", e);
                std::process::exit(1);
            });
            let args = sh_run::cli::Args::from(rest);
            init(args.level(), &args);

            let summary = pipeline(&args, tsv).unwrap_or_else(|e| exit(e));
            info!(
                "Reported {} samples into {:?}",
                summary.samples, summary.metrics
            );
        }
    }

    let elapsed = start.elapsed();
    info!("Elapsed time: {:.3?}", elapsed);
}

fn init<A: ArgCheck + std::fmt::Debug>(level: Level, args: &A) {
    init_with_level(level).expect("ERROR: Failed to initialize logger");
    log::debug!("Commandline arguments: {:?}", args);

    args.check().unwrap_or_else(|e| exit(e));
}

fn exit<E: std::fmt::Display>(e: E) -> ! {
    error!("{}", e);
    std::process::exit(1);
}
