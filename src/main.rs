#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use perf_gate::bench::DEFAULT_CONFIG;
use perf_gate::continuous_cmd::{self, ContinuousOptions, DEFAULT_FACTOR, OutputOptions};
use perf_gate::report::RowOrder;

#[derive(Parser, Debug)]
#[command(name = "perf-gate")]
#[command(about = "Compare benchmarks of a branch head against its parent commit", long_about = None)]
struct Cli {
    /// Enable verbose logging (or set PERF_GATE_LOG)
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a side-by-side comparison of a branch head and its parent for CI
    Continuous {
        /// Branch to test; its tip and the tip's parent are compared
        branch: String,
        /// Ratio above which (or below whose reciprocal) a change is reported
        #[arg(short, long, default_value_t = DEFAULT_FACTOR)]
        factor: f64,
        /// Regular expression(s) selecting benchmarks to run; all when omitted
        #[arg(short, long, num_args = 1..)]
        bench: Vec<String>,
        /// Detect machine information instead of reading the machine file
        #[arg(long)]
        machine_defaults: bool,
        /// Path to the project configuration
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
        /// List slowdowns first, then speedups, each most significant first
        #[arg(long)]
        grouped: bool,
        /// Write machine-readable JSON report to this file
        #[arg(long)]
        json: Option<PathBuf>,
        /// Write the significant rows as CSV to this file
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
}

fn init_tracing(verbose: bool) {
    let env = std::env::var("PERF_GATE_LOG").unwrap_or_else(|_| {
        if verbose { "perf_gate=debug".to_string() } else { "perf_gate=info".to_string() }
    });
    let _ = tracing_subscriber::fmt()
        .with_span_events(FmtSpan::ACTIVE)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_env_filter(EnvFilter::new(env))
        .try_init();
}

fn main() {
    color_eyre::install().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Continuous { branch, factor, bench, machine_defaults, config, grouped, json, csv, no_color } => {
            let options = ContinuousOptions {
                branch,
                factor,
                bench,
                machine_defaults,
                order: if grouped { RowOrder::Grouped } else { RowOrder::ByRatio },
            };
            let outputs = OutputOptions { json, csv, color: !no_color };
            continuous_cmd::run(&config, &options, &outputs)
        }
    };

    match result {
        Ok(false) => {}
        Ok(true) => std::process::exit(1),
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(2);
        }
    }
}
