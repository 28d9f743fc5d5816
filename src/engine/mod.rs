//! Engine module: the collaborators and stages of a continuous comparison.
//!
//! # Architecture
//!
//! - **Checkout**: exclusive access to the version-control working tree
//!   (`Repo` trait; `GitRepo` shells out to `git`, `MockRepo` for tests).
//! - **Resolver**: branch -> (head, parent) through a `CheckoutSession`.
//! - **Runner**: executes the benchmark suite per commit and environment and
//!   persists records (`BenchmarkRunner` trait; `CommandRunner`, `MockRunner`).
//! - **Aggregate**: mean of each benchmark over all environments of a commit.
//!
//! # Boundaries
//!
//! - Runners never aggregate; they only write records through a `ResultStore`.
//! - Aggregation only reads records; a missing record aborts the commit.

pub mod aggregate;
pub mod checkout;
pub mod resolver;
pub mod runner;

// Re-export key types for convenience
pub use aggregate::{AggregatedValues, aggregate, aggregate_from_store};
pub use checkout::{Checkout, CheckoutSession, GitRepo, MockRepo, Repo};
pub use resolver::DEFAULT_REMOTE;
pub use runner::{
    BenchmarkListing, BenchmarkRunner, CommandRunner, MeasuredBenchmark, MockRunner, RunOutput,
    RunRequest, compile_patterns, matches_patterns,
};
