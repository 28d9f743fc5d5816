//! Commit, benchmark and measurement record types shared by every stage of a comparison.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::{BenchError, BenchResult};

/// Schema version of persisted measurement records
pub const RESULTS_SCHEMA_VERSION: u32 = 1;

/// Which side of the comparison a commit is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitRole {
    Head,
    Parent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    pub role: CommitRole,
}

impl Commit {
    pub fn head(id: impl Into<String>) -> Self {
        Commit {
            id: id.into(),
            role: CommitRole::Head,
        }
    }

    pub fn parent(id: impl Into<String>) -> Self {
        Commit {
            id: id.into(),
            role: CommitRole::Parent,
        }
    }
}

/// Head commit of a branch and its immediate parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPair {
    pub head: Commit,
    pub parent: Commit,
}

impl CommitPair {
    pub fn new(head: impl Into<String>, parent: impl Into<String>) -> Self {
        CommitPair {
            head: Commit::head(head),
            parent: Commit::parent(parent),
        }
    }

    /// Commit ids in run order: head first, then parent.
    pub fn ids(&self) -> Vec<String> {
        vec![self.head.id.clone(), self.parent.id.clone()]
    }
}

/// Identifier of one execution environment (toolchain/platform combination).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentId(pub String);

impl EnvironmentId {
    pub fn new(name: impl Into<String>) -> Self {
        EnvironmentId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Benchmark metadata supplied by the execution step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkMeta {
    pub name: String,
    /// Display unit, e.g. "seconds" or "bytes"
    pub unit: String,
}

impl BenchmarkMeta {
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        BenchmarkMeta {
            name: name.into(),
            unit: unit.into(),
        }
    }
}

/// Ordered set of benchmarks shared by both commits and all environments.
///
/// Insertion order is kept; it is the encounter order used to break ties
/// when the report is sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkSet {
    entries: Vec<BenchmarkMeta>,
    index: HashMap<String, usize>,
}

impl BenchmarkSet {
    /// Build a set, rejecting duplicate names.
    pub fn new(entries: Vec<BenchmarkMeta>) -> BenchResult<Self> {
        let mut set = BenchmarkSet::default();
        for meta in entries {
            set.insert(meta)?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, meta: BenchmarkMeta) -> BenchResult<()> {
        if self.index.contains_key(&meta.name) {
            return Err(BenchError::Message(format!(
                "duplicate benchmark name `{}`",
                meta.name
            )));
        }
        self.index.insert(meta.name.clone(), self.entries.len());
        self.entries.push(meta);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&BenchmarkMeta> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BenchmarkMeta> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|m| m.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Measured values of one commit in one environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub schema_version: u32,
    pub machine: String,
    pub commit: String,
    pub environment: EnvironmentId,
    /// ISO 8601 timestamp
    pub date: String,
    pub results: BTreeMap<String, f64>,
}

impl MeasurementRecord {
    pub fn new(
        machine: impl Into<String>,
        commit: impl Into<String>,
        environment: EnvironmentId,
        results: BTreeMap<String, f64>,
    ) -> Self {
        MeasurementRecord {
            schema_version: RESULTS_SCHEMA_VERSION,
            machine: machine.into(),
            commit: commit.into(),
            environment,
            date: crate::now_rfc3339(),
            results,
        }
    }

    pub fn value(&self, benchmark: &str) -> Option<f64> {
        self.results.get(benchmark).copied()
    }
}
