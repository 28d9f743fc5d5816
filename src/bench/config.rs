use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::core::schema::EnvironmentId;
use crate::engine::{CommandRunner, DEFAULT_REMOTE};
use crate::{BenchError, BenchResult};

pub const DEFAULT_CONFIG: &str = "perf-gate.toml";
const DEFAULT_RESULTS_DIR: &str = ".perf-gate/results";
const DEFAULT_MACHINE_FILE: &str = ".perf-gate-machine.json";

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Command template; `{commit}`, `{env}` and `{repo}` are substituted
    pub command: String,
    #[serde(default)]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    repo: Option<PathBuf>,
    #[serde(default)]
    remote: Option<String>,
    #[serde(default)]
    results_dir: Option<PathBuf>,
    #[serde(default)]
    machine_file: Option<PathBuf>,
    #[serde(default)]
    environments: Vec<String>,
    runner: RunnerConfig,
}

/// Project configuration with paths resolved against the config file's directory.
#[derive(Debug, Clone)]
pub struct ContinuousConfig {
    pub repo: PathBuf,
    pub remote: String,
    pub results_dir: PathBuf,
    pub machine_file: PathBuf,
    pub environments: Vec<EnvironmentId>,
    pub runner: RunnerConfig,
}

impl ContinuousConfig {
    pub fn command_runner(&self) -> CommandRunner {
        CommandRunner::new(
            self.runner.command.clone(),
            self.environments.clone(),
            self.repo.clone(),
        )
        .with_timeout(Duration::from_secs(self.runner.timeout_secs))
    }
}

pub fn load_config(path: &Path) -> BenchResult<ContinuousConfig> {
    let s = std::fs::read_to_string(path).map_err(|e| {
        BenchError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    parse_config(&s, base)
}

pub fn parse_config(s: &str, base: &Path) -> BenchResult<ContinuousConfig> {
    let raw: RawConfig =
        toml::from_str(s).map_err(|e| BenchError::Config(format!("failed to parse config: {e}")))?;

    if raw.runner.command.trim().is_empty() {
        return Err(BenchError::Config("runner.command is empty".into()));
    }
    let mut environments: Vec<EnvironmentId> = Vec::new();
    for name in raw.environments {
        let env = EnvironmentId::new(name);
        if environments.contains(&env) {
            return Err(BenchError::Config(format!("duplicate environment `{env}`")));
        }
        environments.push(env);
    }

    let resolve = |p: Option<PathBuf>, default: &str| {
        let p = p.unwrap_or_else(|| PathBuf::from(default));
        if p.is_absolute() { p } else { base.join(p) }
    };

    Ok(ContinuousConfig {
        repo: resolve(raw.repo, "."),
        remote: raw.remote.unwrap_or_else(|| DEFAULT_REMOTE.to_string()),
        results_dir: resolve(raw.results_dir, DEFAULT_RESULTS_DIR),
        machine_file: resolve(raw.machine_file, DEFAULT_MACHINE_FILE),
        environments,
        runner: raw.runner,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_defaults() {
        let cfg = parse_config(
            r#"
environments = ["release"]

[runner]
command = "./bench.sh {commit} {env}"
"#,
            Path::new("/work"),
        )
        .unwrap();

        assert_eq!(cfg.repo, Path::new("/work/."));
        assert_eq!(cfg.remote, "origin");
        assert_eq!(cfg.results_dir, Path::new("/work/.perf-gate/results"));
        assert_eq!(cfg.machine_file, Path::new("/work/.perf-gate-machine.json"));
        assert_eq!(cfg.environments, vec![EnvironmentId::new("release")]);
        assert_eq!(cfg.runner.timeout_secs, 0);
    }

    #[test]
    fn test_parse_config_explicit_values() {
        let cfg = parse_config(
            r#"
repo = "/src/project"
remote = "upstream"
results_dir = "out"
environments = ["a", "b"]

[runner]
command = "run {env}"
timeout_secs = 60
"#,
            Path::new("/work"),
        )
        .unwrap();

        assert_eq!(cfg.repo, Path::new("/src/project"));
        assert_eq!(cfg.remote, "upstream");
        assert_eq!(cfg.results_dir, Path::new("/work/out"));
        assert_eq!(cfg.environments.len(), 2);
        assert_eq!(cfg.runner.timeout_secs, 60);
    }

    #[test]
    fn test_parse_config_requires_runner() {
        let err = parse_config("environments = []", Path::new("")).unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }

    #[test]
    fn test_parse_config_rejects_duplicate_environment() {
        let err = parse_config(
            "environments = [\"a\", \"a\"]\n[runner]\ncommand = \"x\"\n",
            Path::new(""),
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate environment"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/definitely/not/here/perf-gate.toml")).unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }
}
