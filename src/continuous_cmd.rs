//! Continuous comparison of a branch head against its parent commit.
//!
//! resolve -> run -> aggregate head -> aggregate parent -> compare -> render.
//! Any failure aborts the whole comparison; no report is produced.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::bench::config::load_config;
use crate::core::machine::MachineInfo;
use crate::core::schema::{BenchmarkSet, CommitPair, EnvironmentId};
use crate::engine::{
    BenchmarkRunner, Checkout, GitRepo, Repo, RunRequest, aggregate_from_store, compile_patterns,
};
use crate::report::{
    Comparison, RegressionReport, RenderedReport, RowOrder, TerminalSink, compare, render,
    sorted_rows, write_json_report,
};
use crate::storage::{CsvExporter, FsResultStore, ResultStore};
use crate::{BenchError, BenchResult};

/// Default significance factor
pub const DEFAULT_FACTOR: f64 = 2.0;

/// Options of one comparison run
#[derive(Debug, Clone)]
pub struct ContinuousOptions {
    pub branch: String,
    pub factor: f64,
    /// Benchmark name patterns; empty runs everything
    pub bench: Vec<String>,
    pub machine_defaults: bool,
    pub order: RowOrder,
}

impl ContinuousOptions {
    pub fn new(branch: impl Into<String>) -> Self {
        ContinuousOptions {
            branch: branch.into(),
            factor: DEFAULT_FACTOR,
            bench: Vec::new(),
            machine_defaults: false,
            order: RowOrder::ByRatio,
        }
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }
}

/// Everything a successful comparison produced.
#[derive(Debug, Clone)]
pub struct ContinuousOutcome {
    pub commits: CommitPair,
    pub machine: MachineInfo,
    pub benchmarks: BenchmarkSet,
    pub environments: Vec<EnvironmentId>,
    pub comparison: Comparison,
}

impl ContinuousOutcome {
    pub fn render(&self, order: RowOrder) -> RenderedReport {
        render(&self.comparison.rows, self.comparison.regressed, order)
    }

    pub fn regression_report(&self, branch: &str, order: RowOrder) -> RegressionReport {
        let environments: Vec<String> =
            self.environments.iter().map(|e| e.to_string()).collect();
        RegressionReport::new(
            branch,
            &self.commits,
            &self.machine,
            &environments,
            self.benchmarks.len(),
            &self.comparison,
            sorted_rows(&self.comparison.rows, order),
        )
    }
}

/// Reject factors that make every change significant.
pub fn validate_factor(factor: f64) -> BenchResult<()> {
    if !factor.is_finite() || factor <= 1.0 {
        return Err(BenchError::Config(format!(
            "factor must be a finite number greater than 1.0, got {factor}"
        )));
    }
    Ok(())
}

/// Run a comparison against injected collaborators.
///
/// The checkout session is held until the comparison finishes, since runners
/// may use the working tree.
pub fn run_continuous<R, B, S>(
    checkout: &Checkout<R>,
    remote: &str,
    runner: &B,
    store: &S,
    machine: &MachineInfo,
    options: &ContinuousOptions,
) -> BenchResult<ContinuousOutcome>
where
    R: Repo,
    B: BenchmarkRunner + ?Sized,
    S: ResultStore,
{
    validate_factor(options.factor)?;
    let patterns = compile_patterns(&options.bench)?;

    let mut session = checkout.session()?;
    let commits = session.resolve(remote, &options.branch)?;

    let commit_ids = commits.ids();
    let request = RunRequest {
        commits: &commit_ids,
        patterns: &patterns,
        machine,
    };
    let output = runner.run(&request, store)?;
    info!(
        benchmarks = output.benchmarks.len(),
        environments = output.environments.len(),
        "benchmark run finished"
    );

    let machine_name = output.machine.machine.as_str();
    let after = aggregate_from_store(
        store,
        machine_name,
        &commits.head.id,
        &output.environments,
        &output.benchmarks,
    )?;
    let before = aggregate_from_store(
        store,
        machine_name,
        &commits.parent.id,
        &output.environments,
        &output.benchmarks,
    )?;
    drop(session);

    let comparison = compare(&before, &after, &output.benchmarks, options.factor)?;
    info!(
        significant = comparison.rows.len(),
        regressed = comparison.regressed,
        "comparison finished"
    );

    Ok(ContinuousOutcome {
        commits,
        machine: output.machine,
        benchmarks: output.benchmarks,
        environments: output.environments,
        comparison,
    })
}

/// Output destinations of the `continuous` command
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    pub json: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    pub color: bool,
}

/// Main entry point for the `continuous` command. Returns the verdict.
pub fn run(
    config_path: &Path,
    options: &ContinuousOptions,
    outputs: &OutputOptions,
) -> BenchResult<bool> {
    let config = load_config(config_path)?;
    let machine = MachineInfo::resolve(&config.machine_file, options.machine_defaults)?;
    info!(machine = %machine.machine, "using machine");

    let checkout = Checkout::new(GitRepo::open(&config.repo)?);
    let runner = config.command_runner();
    let store = FsResultStore::new(&config.results_dir);

    let outcome = run_continuous(&checkout, &config.remote, &runner, &store, &machine, options)?;

    let rendered = outcome.render(options.order);
    rendered
        .write_to(&mut TerminalSink::stdout(outputs.color))
        .map_err(|e| BenchError::Message(format!("failed to write report: {e}")))?;

    if let Some(ref json_path) = outputs.json {
        let report = outcome.regression_report(&options.branch, options.order);
        write_json_report(json_path, &report)?;
        eprintln!("Wrote regression report to {}", json_path.display());
    }

    if let Some(ref csv_path) = outputs.csv {
        let rows = sorted_rows(&outcome.comparison.rows, options.order);
        CsvExporter::new().export(&rows, csv_path)?;
        eprintln!("Wrote comparison rows to {}", csv_path.display());
    }

    Ok(rendered.regressed)
}
