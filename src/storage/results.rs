//! JSON file storage for measurement records.
//!
//! Records live under `<results_dir>/<machine>/<commit[..8]>-<env>.json`.

use std::path::{Path, PathBuf};

use crate::core::schema::{EnvironmentId, MeasurementRecord, RESULTS_SCHEMA_VERSION};
use crate::{BenchError, BenchResult};

/// Number of leading commit id characters used in result filenames
pub const COMMIT_PREFIX_LEN: usize = 8;

/// Derive the storage key of a (machine, commit, environment) triple.
///
/// The key is deterministic and relative to the results directory.
pub fn result_filename(machine: &str, commit: &str, environment: &EnvironmentId) -> PathBuf {
    let short: String = commit.chars().take(COMMIT_PREFIX_LEN).collect();
    let env = path_component(environment.as_str());
    Path::new(&path_component(machine)).join(format!("{short}-{env}.json"))
}

/// Make `name` a single path component that stays inside its parent.
fn path_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => cleaned.replace('.', "_") + "_",
        _ => cleaned,
    }
}

/// Persisted measurement records keyed by (machine, commit, environment).
pub trait ResultStore {
    /// Load the record for a triple.
    ///
    /// # Errors
    /// Returns `BenchError::ResultLoad` if the record is absent or unreadable.
    fn load(
        &self,
        machine: &str,
        commit: &str,
        environment: &EnvironmentId,
    ) -> BenchResult<MeasurementRecord>;

    /// Persist a record, replacing any earlier record for the same triple.
    fn save(&self, record: &MeasurementRecord) -> BenchResult<()>;
}

/// Filesystem-backed `ResultStore`
#[derive(Debug, Clone)]
pub struct FsResultStore {
    results_dir: PathBuf,
}

impl FsResultStore {
    pub fn new(results_dir: impl AsRef<Path>) -> Self {
        FsResultStore {
            results_dir: results_dir.as_ref().to_path_buf(),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Absolute location of the record for a triple.
    pub fn path_for(&self, machine: &str, commit: &str, environment: &EnvironmentId) -> PathBuf {
        self.results_dir
            .join(result_filename(machine, commit, environment))
    }
}

impl ResultStore for FsResultStore {
    fn load(
        &self,
        machine: &str,
        commit: &str,
        environment: &EnvironmentId,
    ) -> BenchResult<MeasurementRecord> {
        let path = self.path_for(machine, commit, environment);
        let load_err = |reason: String| BenchError::ResultLoad {
            path: path.clone(),
            reason,
        };

        let bytes = std::fs::read(&path).map_err(|e| load_err(e.to_string()))?;
        let record: MeasurementRecord =
            serde_json::from_slice(&bytes).map_err(|e| load_err(format!("invalid JSON: {e}")))?;

        if record.schema_version != RESULTS_SCHEMA_VERSION {
            return Err(load_err(format!(
                "schema version mismatch: record has v{}, expected v{}",
                record.schema_version, RESULTS_SCHEMA_VERSION
            )));
        }

        Ok(record)
    }

    fn save(&self, record: &MeasurementRecord) -> BenchResult<()> {
        let path = self.path_for(&record.machine, &record.commit, &record.environment);

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    BenchError::Message(format!("failed to create directory: {e}"))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| BenchError::Message(format!("failed to serialize record: {e}")))?;
        std::fs::write(&path, json).map_err(|e| {
            BenchError::Message(format!("failed to write {}: {e}", path.display()))
        })?;

        tracing::debug!(path = %path.display(), "saved measurement record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn record(commit: &str, env: &str) -> MeasurementRecord {
        let mut results = BTreeMap::new();
        results.insert("time_sort".to_string(), 0.25);
        MeasurementRecord::new("ci-box", commit, EnvironmentId::new(env), results)
    }

    #[test]
    fn test_result_filename_uses_short_commit() {
        let name = result_filename(
            "ci-box",
            "0123456789abcdef",
            &EnvironmentId::new("py3.12-numpy"),
        );
        assert_eq!(name, Path::new("ci-box").join("01234567-py3.12-numpy.json"));
    }

    #[test]
    fn test_result_filename_short_commit_and_separators() {
        let name = result_filename("m", "abc", &EnvironmentId::new("linux/x86"));
        assert_eq!(name, Path::new("m").join("abc-linux_x86.json"));
    }

    #[test]
    fn test_result_filename_keeps_machine_inside_results_dir() {
        let env = EnvironmentId::new("e");
        assert_eq!(
            result_filename("../x", "abc", &env),
            Path::new(".._x").join("abc-e.json")
        );
        assert_eq!(result_filename("..", "abc", &env), Path::new("___").join("abc-e.json"));
        assert_eq!(result_filename("", "abc", &env), Path::new("_").join("abc-e.json"));

        let dir = tempfile::tempdir().unwrap();
        let store = FsResultStore::new(dir.path().join("results"));
        let mut rec = record("deadbeef", "release");
        rec.machine = "../escaped".to_string();
        store.save(&rec).unwrap();
        assert!(!dir.path().join("escaped").exists());
        assert!(dir.path().join("results/.._escaped/deadbeef-release.json").exists());
        assert!(store.load("../escaped", "deadbeef", &EnvironmentId::new("release")).is_ok());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsResultStore::new(dir.path());

        store.save(&record("deadbeefcafe", "release")).unwrap();
        let loaded = store
            .load("ci-box", "deadbeefcafe", &EnvironmentId::new("release"))
            .unwrap();
        assert_eq!(loaded.value("time_sort"), Some(0.25));
        assert!(dir.path().join("ci-box").join("deadbeef-release.json").exists());
    }

    #[test]
    fn test_load_missing_is_result_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsResultStore::new(dir.path());

        let err = store
            .load("ci-box", "deadbeef", &EnvironmentId::new("release"))
            .unwrap_err();
        assert!(matches!(err, BenchError::ResultLoad { .. }));
    }

    #[test]
    fn test_load_corrupt_is_result_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsResultStore::new(dir.path());
        let path = store.path_for("ci-box", "deadbeef", &EnvironmentId::new("release"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        let err = store
            .load("ci-box", "deadbeef", &EnvironmentId::new("release"))
            .unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn test_load_rejects_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsResultStore::new(dir.path());
        let mut rec = record("deadbeef", "release");
        rec.schema_version = 999;
        store.save(&rec).unwrap();

        let err = store
            .load("ci-box", "deadbeef", &EnvironmentId::new("release"))
            .unwrap_err();
        assert!(err.to_string().contains("schema version mismatch"));
    }
}
