//! Regression analysis of two aggregated commits.
//!
//! `compare` is a pure function of its inputs: it computes the after/before
//! ratio of every benchmark, keeps the significant ones and derives the verdict.
//! `RegressionReport` is the stable machine-readable form of a comparison:
//! - Serialized to JSON for CI consumption
//! - Used to determine CI exit codes

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::machine::MachineInfo;
use crate::core::schema::{BenchmarkMeta, BenchmarkSet, CommitPair};
use crate::engine::aggregate::AggregatedValues;
use crate::{BenchError, BenchResult};

/// Schema version for RegressionReport
pub const REGRESSION_REPORT_VERSION: u32 = 1;

/// Direction of a significant change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Ratio above the factor
    Slower,
    /// Ratio below the reciprocal of the factor
    Faster,
}

impl ChangeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::Slower => "slower",
            ChangeKind::Faster => "faster",
        }
    }
}

/// One significantly changed benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub name: String,
    /// Aggregated value at the parent commit
    pub before: f64,
    /// Aggregated value at the head commit
    pub after: f64,
    /// after / before
    pub ratio: f64,
    pub change: ChangeKind,
    pub meta: BenchmarkMeta,
}

/// Significant rows plus the verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub factor: f64,
    /// Rows in benchmark-set order
    pub rows: Vec<ComparisonRow>,
    /// True iff at least one row got slower by more than the factor
    pub regressed: bool,
}

impl Comparison {
    pub fn slowdowns(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.change == ChangeKind::Slower)
            .count()
    }

    pub fn speedups(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.change == ChangeKind::Faster)
            .count()
    }
}

/// Classify a ratio against the factor; `None` means not significant.
pub fn classify_ratio(ratio: f64, factor: f64) -> Option<ChangeKind> {
    if ratio > factor {
        Some(ChangeKind::Slower)
    } else if ratio < 1.0 / factor {
        Some(ChangeKind::Faster)
    } else {
        None
    }
}

/// Compare the parent (`before`) and head (`after`) aggregates.
///
/// # Errors
/// - `BenchError::DegenerateRatio` if a `before` value is zero or the ratio is not finite
/// - `BenchError::Message` if either aggregate lacks a benchmark of the set
pub fn compare(
    before: &AggregatedValues,
    after: &AggregatedValues,
    benchmarks: &BenchmarkSet,
    factor: f64,
) -> BenchResult<Comparison> {
    let mut rows = Vec::new();
    let mut regressed = false;

    for meta in benchmarks.iter() {
        let b = lookup(before, &meta.name)?;
        let a = lookup(after, &meta.name)?;

        let ratio = a / b;
        if b == 0.0 || !ratio.is_finite() {
            return Err(BenchError::DegenerateRatio {
                benchmark: meta.name.clone(),
                commit: before.commit().to_string(),
            });
        }
        if let Some(change) = classify_ratio(ratio, factor) {
            if change == ChangeKind::Slower {
                regressed = true;
            }
            rows.push(ComparisonRow {
                name: meta.name.clone(),
                before: b,
                after: a,
                ratio,
                change,
                meta: meta.clone(),
            });
        }
    }

    Ok(Comparison {
        factor,
        rows,
        regressed,
    })
}

fn lookup(values: &AggregatedValues, name: &str) -> BenchResult<f64> {
    values.get(name).ok_or_else(|| {
        BenchError::Message(format!(
            "aggregate of commit {} has no value for benchmark `{name}`",
            values.commit()
        ))
    })
}

/// A complete regression report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionReport {
    /// Schema version for forward compatibility
    pub version: u32,
    pub metadata: ReportMetadata,
    /// Significant rows in report order
    pub rows: Vec<ComparisonRow>,
    pub summary: ReportSummary,
}

/// Metadata about the regression report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub branch: String,
    pub head: String,
    pub parent: String,
    pub machine: MachineInfo,
    pub environments: Vec<String>,
    pub factor: f64,
    /// ISO 8601 timestamp when report was generated
    pub generated_at: String,
}

/// Summary statistics for the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Benchmarks compared
    pub total_benchmarks: usize,
    pub slowdowns: usize,
    pub speedups: usize,
    pub regressed: bool,
    /// Recommended CI exit code (0 = pass, 1 = regressions)
    pub ci_exit_code: i32,
}

impl RegressionReport {
    /// Build a report from a comparison; `rows` should already be in display order.
    pub fn new(
        branch: impl Into<String>,
        commits: &CommitPair,
        machine: &MachineInfo,
        environments: &[String],
        total_benchmarks: usize,
        comparison: &Comparison,
        rows: Vec<ComparisonRow>,
    ) -> Self {
        RegressionReport {
            version: REGRESSION_REPORT_VERSION,
            metadata: ReportMetadata {
                branch: branch.into(),
                head: commits.head.id.clone(),
                parent: commits.parent.id.clone(),
                machine: machine.clone(),
                environments: environments.to_vec(),
                factor: comparison.factor,
                generated_at: crate::now_rfc3339(),
            },
            rows,
            summary: ReportSummary {
                total_benchmarks,
                slowdowns: comparison.slowdowns(),
                speedups: comparison.speedups(),
                regressed: comparison.regressed,
                ci_exit_code: if comparison.regressed { 1 } else { 0 },
            },
        }
    }
}

/// Write a report as pretty-printed JSON, creating parent directories.
pub fn write_json_report(path: &Path, report: &RegressionReport) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(report).context("failed to serialize regression report")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BenchmarkSet {
        BenchmarkSet::new(
            names
                .iter()
                .map(|n| BenchmarkMeta::new(*n, "seconds"))
                .collect(),
        )
        .unwrap()
    }

    fn values(commit: &str, pairs: &[(&str, f64)]) -> AggregatedValues {
        AggregatedValues::from_pairs(
            commit,
            pairs.iter().map(|(n, v)| (n.to_string(), *v)),
        )
    }

    #[test]
    fn test_classify_ratio() {
        assert_eq!(classify_ratio(3.0, 2.0), Some(ChangeKind::Slower));
        assert_eq!(classify_ratio(0.4, 2.0), Some(ChangeKind::Faster));
        assert_eq!(classify_ratio(1.5, 2.0), None);
        // Boundaries are exclusive
        assert_eq!(classify_ratio(2.0, 2.0), None);
        assert_eq!(classify_ratio(0.5, 2.0), None);
    }

    #[test]
    fn test_compare_slowdown_and_speedup() {
        let before = values("parent", &[("A", 1.0), ("B", 1.0)]);
        let after = values("head", &[("A", 3.0), ("B", 0.4)]);

        let cmp = compare(&before, &after, &set(&["A", "B"]), 2.0).unwrap();

        assert_eq!(cmp.rows.len(), 2);
        assert_eq!(cmp.rows[0].name, "A");
        assert_eq!(cmp.rows[0].ratio, 3.0);
        assert_eq!(cmp.rows[0].change, ChangeKind::Slower);
        assert_eq!(cmp.rows[1].change, ChangeKind::Faster);
        assert!(cmp.regressed);
        assert_eq!(cmp.slowdowns(), 1);
        assert_eq!(cmp.speedups(), 1);
    }

    #[test]
    fn test_compare_insignificant_change_is_excluded() {
        let before = values("parent", &[("A", 1.0)]);
        let after = values("head", &[("A", 1.5)]);

        let cmp = compare(&before, &after, &set(&["A"]), 2.0).unwrap();
        assert!(cmp.rows.is_empty());
        assert!(!cmp.regressed);
    }

    #[test]
    fn test_compare_pure_speedup_does_not_regress() {
        let before = values("parent", &[("A", 1.0)]);
        let after = values("head", &[("A", 0.1)]);

        let cmp = compare(&before, &after, &set(&["A"]), 2.0).unwrap();
        assert_eq!(cmp.rows.len(), 1);
        assert!(!cmp.regressed);
    }

    #[test]
    fn test_compare_zero_before_is_degenerate() {
        let before = values("parent", &[("A", 0.0)]);
        let after = values("head", &[("A", 1.0)]);

        let err = compare(&before, &after, &set(&["A"]), 2.0).unwrap_err();
        match err {
            BenchError::DegenerateRatio { benchmark, commit } => {
                assert_eq!(benchmark, "A");
                assert_eq!(commit, "parent");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_compare_overflowing_ratio_is_degenerate() {
        let before = values("parent", &[("A", 1.0), ("B", 1.0)]);
        let after = values("head", &[("A", 1.0), ("B", 1.0)]);
        let tiny = values("parent", &[("A", 1e-310), ("B", 1.0)]);
        let huge = values("head", &[("A", 1.0), ("B", f64::MAX)]);

        let err = compare(&tiny, &after, &set(&["A", "B"]), 2.0).unwrap_err();
        assert!(matches!(err, BenchError::DegenerateRatio { ref benchmark, .. } if benchmark == "A"));

        let cmp = compare(&before, &huge, &set(&["A", "B"]), 2.0).unwrap();
        assert!(cmp.regressed);

        let overflow = values("head", &[("A", 1.0), ("B", 1e300)]);
        let small = values("parent", &[("A", 1.0), ("B", 1e-10)]);
        let err = compare(&small, &overflow, &set(&["A", "B"]), 2.0).unwrap_err();
        assert!(matches!(err, BenchError::DegenerateRatio { ref benchmark, .. } if benchmark == "B"));

        let err = compare(&tiny, &huge, &set(&["B", "A"]), 2.0).unwrap_err();
        assert!(matches!(err, BenchError::DegenerateRatio { ref benchmark, .. } if benchmark == "A"));
    }

    #[test]
    fn test_compare_missing_key_is_error() {
        let before = values("parent", &[("A", 1.0)]);
        let after = values("head", &[("B", 1.0)]);

        assert!(compare(&before, &after, &set(&["A"]), 2.0).is_err());
    }

    #[test]
    fn test_compare_is_idempotent() {
        let before = values("parent", &[("A", 1.0), ("B", 2.0), ("C", 4.0)]);
        let after = values("head", &[("A", 9.0), ("B", 2.1), ("C", 0.5)]);
        let benchmarks = set(&["A", "B", "C"]);

        let first = compare(&before, &after, &benchmarks, 2.0).unwrap();
        let second = compare(&before, &after, &benchmarks, 2.0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_regression_report_summary() {
        let before = values("parent", &[("A", 1.0), ("B", 1.0)]);
        let after = values("head", &[("A", 3.0), ("B", 0.4)]);
        let cmp = compare(&before, &after, &set(&["A", "B"]), 2.0).unwrap();

        let report = RegressionReport::new(
            "main",
            &CommitPair::new("head", "parent"),
            &MachineInfo::named("ci-box"),
            &["release".to_string()],
            2,
            &cmp,
            cmp.rows.clone(),
        );

        assert_eq!(report.version, REGRESSION_REPORT_VERSION);
        assert_eq!(report.metadata.head, "head");
        assert_eq!(report.summary.slowdowns, 1);
        assert_eq!(report.summary.speedups, 1);
        assert_eq!(report.summary.ci_exit_code, 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["rows"][0]["change"], "slower");
        assert_eq!(json["metadata"]["factor"], 2.0);
    }

    #[test]
    fn test_write_json_report_creates_parent_dirs() {
        let cmp = compare(
            &values("parent", &[("A", 1.0)]),
            &values("head", &[("A", 1.0)]),
            &set(&["A"]),
            2.0,
        )
        .unwrap();
        let report = RegressionReport::new(
            "main",
            &CommitPair::new("head", "parent"),
            &MachineInfo::named("ci-box"),
            &[],
            1,
            &cmp,
            Vec::new(),
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/report.json");
        write_json_report(&path, &report).unwrap();

        let back: RegressionReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(back.rows.is_empty());
        assert!(!back.summary.regressed);
    }
}
