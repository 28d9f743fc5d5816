pub mod bench;
pub mod continuous_cmd;
pub mod core;
pub mod engine;
pub mod report;
pub mod storage;

use std::path::PathBuf;

use thiserror::Error;

pub use storage::{FsResultStore, ResultStore};

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("vcs error: {0}")]
    Vcs(String),
    #[error("benchmark execution failed: {0}")]
    Execution(String),
    #[error("failed to load results from {}: {reason}", path.display())]
    ResultLoad { path: PathBuf, reason: String },
    #[error("benchmark `{benchmark}` missing from results of commit {commit} in environment {environment}")]
    MissingBenchmark {
        benchmark: String,
        commit: String,
        environment: String,
    },
    #[error("benchmark `{benchmark}` has a zero or near-zero value at commit {commit}; ratio is undefined")]
    DegenerateRatio { benchmark: String, commit: String },
    #[error("no environments configured; nothing to aggregate")]
    NoEnvironments,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("checkout is busy: {0}")]
    CheckoutBusy(String),
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type BenchResult<T> = Result<T, BenchError>;

pub(crate) fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
