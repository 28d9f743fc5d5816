//! Benchmark execution.
//!
//! A `BenchmarkRunner` runs the suite for each (commit, environment) pair,
//! persists one `MeasurementRecord` per pair through the `ResultStore`, and
//! reports the benchmark set and environments it used.

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use regex::Regex;
use serde::Deserialize;
use shlex::Shlex;
use tracing::{info, warn};

use crate::core::machine::MachineInfo;
use crate::core::schema::{BenchmarkMeta, BenchmarkSet, EnvironmentId, MeasurementRecord};
use crate::storage::ResultStore;
use crate::{BenchError, BenchResult};

/// What to run.
#[derive(Debug, Clone)]
pub struct RunRequest<'a> {
    /// Commit ids in run order
    pub commits: &'a [String],
    /// Benchmark name filters; empty keeps every benchmark
    pub patterns: &'a [Regex],
    pub machine: &'a MachineInfo,
}

/// What was run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub benchmarks: BenchmarkSet,
    pub environments: Vec<EnvironmentId>,
    pub machine: MachineInfo,
}

pub trait BenchmarkRunner {
    /// Run every commit of the request in every environment.
    ///
    /// # Errors
    /// Returns `BenchError::Execution` if any run fails; nothing should be
    /// aggregated afterwards.
    fn run(&self, request: &RunRequest<'_>, store: &dyn ResultStore) -> BenchResult<RunOutput>;
}

/// Compile `--bench` patterns.
pub fn compile_patterns(patterns: &[String]) -> BenchResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p)
                .map_err(|e| BenchError::Config(format!("invalid benchmark pattern `{p}`: {e}")))
        })
        .collect()
}

/// True if no patterns are given or any pattern matches somewhere in `name`.
pub fn matches_patterns(name: &str, patterns: &[Regex]) -> bool {
    patterns.is_empty() || patterns.iter().any(|re| re.is_match(name))
}

/// Benchmark listing printed by a suite run
#[derive(Debug, Clone, Deserialize)]
pub struct BenchmarkListing {
    pub benchmarks: Vec<MeasuredBenchmark>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeasuredBenchmark {
    pub name: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub value: f64,
}

fn default_unit() -> String {
    "seconds".to_string()
}

/// Turns listings into records while fixing the benchmark set from the first listing.
struct RunCollector<'a> {
    machine: &'a MachineInfo,
    patterns: &'a [Regex],
    benchmarks: Option<BenchmarkSet>,
}

impl<'a> RunCollector<'a> {
    fn new(request: &RunRequest<'a>) -> Self {
        RunCollector {
            machine: request.machine,
            patterns: request.patterns,
            benchmarks: None,
        }
    }

    fn record(
        &mut self,
        commit: &str,
        env: &EnvironmentId,
        listing: BenchmarkListing,
    ) -> BenchResult<MeasurementRecord> {
        let kept: Vec<MeasuredBenchmark> = listing
            .benchmarks
            .into_iter()
            .filter(|b| matches_patterns(&b.name, self.patterns))
            .collect();

        if let Some(set) = &self.benchmarks {
            for b in kept.iter().filter(|b| !set.contains(&b.name)) {
                warn!(benchmark = %b.name, %commit, %env, "benchmark not in first run; ignoring");
            }
        } else {
            let metas = kept
                .iter()
                .map(|b| BenchmarkMeta::new(b.name.clone(), b.unit.clone()))
                .collect();
            let set = BenchmarkSet::new(metas).map_err(|e| {
                BenchError::Execution(format!("commit {commit} in {env}: {e}"))
            })?;
            self.benchmarks = Some(set);
        }

        let results: BTreeMap<String, f64> = kept.into_iter().map(|b| (b.name, b.value)).collect();
        Ok(MeasurementRecord::new(
            self.machine.machine.clone(),
            commit,
            env.clone(),
            results,
        ))
    }

    /// Fix the benchmark set up front instead of from the first listing.
    fn fix_set(&mut self, metas: Vec<BenchmarkMeta>) -> BenchResult<()> {
        let kept = metas
            .into_iter()
            .filter(|m| matches_patterns(&m.name, self.patterns))
            .collect();
        self.benchmarks = Some(BenchmarkSet::new(kept)?);
        Ok(())
    }

    fn finish(self, environments: Vec<EnvironmentId>) -> RunOutput {
        RunOutput {
            benchmarks: self.benchmarks.unwrap_or_default(),
            environments,
            machine: self.machine.clone(),
        }
    }
}

/// Runs a configured command once per (commit, environment).
///
/// The command template is split with shell rules; `{commit}`, `{env}` and
/// `{repo}` are substituted in every word. The command prints a
/// `BenchmarkListing` as JSON on stdout.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    template: String,
    environments: Vec<EnvironmentId>,
    repo_dir: PathBuf,
    /// Zero disables the timeout
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(
        template: impl Into<String>,
        environments: Vec<EnvironmentId>,
        repo_dir: impl Into<PathBuf>,
    ) -> Self {
        CommandRunner {
            template: template.into(),
            environments,
            repo_dir: repo_dir.into(),
            timeout: Duration::ZERO,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_command(&self, commit: &str, env: &EnvironmentId) -> BenchResult<Command> {
        let mut parts: Vec<String> = Shlex::new(&self.template).collect();
        if parts.is_empty() {
            return Err(BenchError::Config("empty runner command".into()));
        }
        let repo = self.repo_dir.to_string_lossy();
        for p in &mut parts {
            *p = p
                .replace("{commit}", commit)
                .replace("{env}", env.as_str())
                .replace("{repo}", &repo);
        }
        let mut cmd = Command::new(&parts[0]);
        cmd.args(&parts[1..]).current_dir(&self.repo_dir);
        Ok(cmd)
    }

    fn run_one(&self, commit: &str, env: &EnvironmentId) -> BenchResult<BenchmarkListing> {
        let exec_err = |msg: String| BenchError::Execution(format!("commit {commit} in {env}: {msg}"));

        let mut stdout = tempfile::tempfile().map_err(|e| exec_err(e.to_string()))?;
        let sink = stdout.try_clone().map_err(|e| exec_err(e.to_string()))?;

        let mut cmd = self.build_command(commit, env)?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(sink))
            .stderr(Stdio::inherit());

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| exec_err(format!("failed to spawn runner: {e}")))?;

        let status = loop {
            if let Some(status) = child.try_wait().map_err(|e| exec_err(e.to_string()))? {
                break status;
            }
            if !self.timeout.is_zero() && start.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(exec_err(format!("timed out after {:?}", self.timeout)));
            }
            std::thread::sleep(Duration::from_millis(20));
        };

        if !status.success() {
            return Err(exec_err(format!("runner exited with {status}")));
        }

        let mut out = String::new();
        stdout
            .seek(SeekFrom::Start(0))
            .and_then(|_| stdout.read_to_string(&mut out))
            .map_err(|e| exec_err(format!("failed to read runner output: {e}")))?;

        serde_json::from_str(&out).map_err(|e| exec_err(format!("invalid runner output: {e}")))
    }
}

impl BenchmarkRunner for CommandRunner {
    fn run(&self, request: &RunRequest<'_>, store: &dyn ResultStore) -> BenchResult<RunOutput> {
        let mut collector = RunCollector::new(request);
        for commit in request.commits {
            for env in &self.environments {
                info!(%commit, %env, "running benchmarks");
                let listing = self.run_one(commit, env)?;
                let record = collector.record(commit, env, listing)?;
                store.save(&record)?;
            }
        }
        Ok(collector.finish(self.environments.clone()))
    }
}

/// Runner serving canned values, for tests.
///
/// A (commit, environment) pair without values is skipped, so its record is
/// missing from the store afterwards.
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    benchmarks: Vec<BenchmarkMeta>,
    environments: Vec<EnvironmentId>,
    values: HashMap<(String, EnvironmentId), Vec<(String, f64)>>,
    fails: bool,
}

impl MockRunner {
    pub fn new(benchmarks: Vec<BenchmarkMeta>, environments: &[&str]) -> Self {
        MockRunner {
            benchmarks,
            environments: environments.iter().map(|e| EnvironmentId::new(*e)).collect(),
            values: HashMap::new(),
            fails: false,
        }
    }

    /// Values measured for `commit` in `env`.
    pub fn with_values(mut self, commit: &str, env: &str, values: &[(&str, f64)]) -> Self {
        self.values.insert(
            (commit.to_string(), EnvironmentId::new(env)),
            values.iter().map(|(n, v)| (n.to_string(), *v)).collect(),
        );
        self
    }

    /// Make the run fail.
    pub fn fails(mut self) -> Self {
        self.fails = true;
        self
    }
}

impl BenchmarkRunner for MockRunner {
    fn run(&self, request: &RunRequest<'_>, store: &dyn ResultStore) -> BenchResult<RunOutput> {
        if self.fails {
            return Err(BenchError::Execution("mock run failed".into()));
        }

        let mut collector = RunCollector::new(request);
        collector.fix_set(self.benchmarks.clone())?;

        for commit in request.commits {
            for env in &self.environments {
                let Some(values) = self.values.get(&(commit.clone(), env.clone())) else {
                    continue;
                };
                let listing = BenchmarkListing {
                    benchmarks: values
                        .iter()
                        .map(|(name, value)| MeasuredBenchmark {
                            name: name.clone(),
                            unit: default_unit(),
                            value: *value,
                        })
                        .collect(),
                };
                let record = collector.record(commit, env, listing)?;
                store.save(&record)?;
            }
        }
        Ok(collector.finish(self.environments.clone()))
    }
}
