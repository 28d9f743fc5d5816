//! Core types for perf-gate.
//!
//! Commits, environments, the benchmark set and persisted measurement records.

pub mod machine;
pub mod schema;

// Re-export key types for convenience
pub use machine::MachineInfo;
pub use schema::{
    BenchmarkMeta, BenchmarkSet, Commit, CommitPair, CommitRole, EnvironmentId,
    MeasurementRecord, RESULTS_SCHEMA_VERSION,
};
