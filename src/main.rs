#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use automl_bench::run_cmd;

#[derive(Parser, Debug)]
#[command(name = "automl-bench")]
#[command(about = "Run AutoML frameworks under a uniform benchmark protocol", long_about = None)]
struct Cli {
    /// Enable verbose logging (or set AUTOML_BENCH_LOG)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train (or reload) a model and predict on the test set
    Run {
        /// Registered framework name (see `frameworks`)
        #[arg(long)]
        framework: String,
        /// Task configuration (.json, .toml, .yaml)
        #[arg(long)]
        config: PathBuf,
        /// Training split (CSV with header)
        #[arg(long)]
        train: PathBuf,
        /// Test split (CSV with header)
        #[arg(long)]
        test: PathBuf,
        /// Target column name; defaults to the last column
        #[arg(long)]
        target: Option<String>,
    },

    /// List registered frameworks and their metric tables
    Frameworks {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let env = std::env::var("AUTOML_BENCH_LOG").unwrap_or_else(|_| {
        if verbose { "automl_bench=debug".to_string() } else { "automl_bench=info".to_string() }
    });
    let _ = tracing_subscriber::fmt()
        .with_span_events(FmtSpan::ACTIVE)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_env_filter(EnvFilter::new(env))
        .try_init();
}

fn main() {
    automl_bench::core::init_process();
    color_eyre::install().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run { framework, config, train, test, target } => {
            run_cmd::run(framework, config, train, test, target)
        }
        Commands::Frameworks { json } => run_cmd::list(json),
    };

    if let Err(e) = result {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
