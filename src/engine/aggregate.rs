//! Per-commit aggregation of measurement records across environments.

use std::collections::HashMap;

use crate::core::schema::{BenchmarkSet, EnvironmentId, MeasurementRecord};
use crate::storage::ResultStore;
use crate::{BenchError, BenchResult};

/// Mean value of every benchmark of a set for one commit.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedValues {
    commit: String,
    values: HashMap<String, f64>,
}

impl AggregatedValues {
    /// Build from explicit pairs, bypassing aggregation.
    pub fn from_pairs(
        commit: impl Into<String>,
        pairs: impl IntoIterator<Item = (String, f64)>,
    ) -> Self {
        AggregatedValues {
            commit: commit.into(),
            values: pairs.into_iter().collect(),
        }
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }

    pub fn get(&self, benchmark: &str) -> Option<f64> {
        self.values.get(benchmark).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Average each benchmark over all environments of a commit.
///
/// Records are loaded in environment order and values are summed in that
/// order before dividing by the environment count.
///
/// # Errors
/// - `BenchError::NoEnvironments` if `environments` is empty
/// - whatever `load` returns for the first environment that fails
/// - `BenchError::MissingBenchmark` if a record lacks a benchmark of the set
pub fn aggregate<F>(
    commit: &str,
    environments: &[EnvironmentId],
    benchmarks: &BenchmarkSet,
    mut load: F,
) -> BenchResult<AggregatedValues>
where
    F: FnMut(&str, &EnvironmentId) -> BenchResult<MeasurementRecord>,
{
    if environments.is_empty() {
        return Err(BenchError::NoEnvironments);
    }

    let mut sums = vec![0.0_f64; benchmarks.len()];
    for env in environments {
        let record = load(commit, env)?;
        for (sum, meta) in sums.iter_mut().zip(benchmarks.iter()) {
            let value = record
                .value(&meta.name)
                .ok_or_else(|| BenchError::MissingBenchmark {
                    benchmark: meta.name.clone(),
                    commit: commit.to_string(),
                    environment: env.to_string(),
                })?;
            *sum += value;
        }
    }

    let count = environments.len() as f64;
    let values = benchmarks
        .names()
        .zip(sums)
        .map(|(name, sum)| (name.to_string(), sum / count))
        .collect();

    tracing::debug!(commit, environments = environments.len(), "aggregated results");

    Ok(AggregatedValues {
        commit: commit.to_string(),
        values,
    })
}

/// `aggregate` with records loaded from a `ResultStore`.
pub fn aggregate_from_store<S: ResultStore + ?Sized>(
    store: &S,
    machine: &str,
    commit: &str,
    environments: &[EnvironmentId],
    benchmarks: &BenchmarkSet,
) -> BenchResult<AggregatedValues> {
    aggregate(commit, environments, benchmarks, |commit, env| {
        store.load(machine, commit, env)
    })
}
