//! Machine description used to key stored results.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{BenchError, BenchResult};

/// Description of the machine the benchmarks run on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineInfo {
    /// Machine name; also the top-level directory of its stored results
    pub machine: String,

    pub os: String,

    pub arch: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_cpu: Option<u32>,

    /// Total RAM in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram: Option<u64>,
}

impl MachineInfo {
    pub fn named(machine: impl Into<String>) -> Self {
        MachineInfo {
            machine: machine.into(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpu: None,
            num_cpu: None,
            ram: None,
        }
    }

    /// Detect machine information from the current host
    pub fn detect() -> Self {
        use sysinfo::System;

        let mut sys = System::new_all();
        sys.refresh_all();

        let machine = System::host_name().unwrap_or_else(|| "unknown".to_string());
        let cpu = sys.cpus().first().map(|c| c.brand().to_string());
        let num_cpu = sys.physical_core_count().map(|c| c as u32);
        let ram = Some(sys.total_memory());
        let os = System::long_os_version().unwrap_or_else(|| std::env::consts::OS.to_string());

        MachineInfo {
            machine,
            os,
            arch: std::env::consts::ARCH.to_string(),
            cpu,
            num_cpu,
            ram,
        }
    }

    /// Load a machine file written by an earlier run or by hand.
    pub fn load(path: &Path) -> BenchResult<Self> {
        let s = std::fs::read_to_string(path).map_err(|e| {
            BenchError::Config(format!(
                "failed to read machine file {}: {e} (use --machine-defaults to detect it)",
                path.display()
            ))
        })?;
        let info: MachineInfo = serde_json::from_str(&s).map_err(|e| {
            BenchError::Config(format!("invalid machine file {}: {e}", path.display()))
        })?;
        if info.machine.trim().is_empty() {
            return Err(BenchError::Config(format!(
                "machine file {} has an empty machine name",
                path.display()
            )));
        }
        Ok(info)
    }

    /// Detected defaults, or the machine file.
    pub fn resolve(machine_file: &Path, use_defaults: bool) -> BenchResult<Self> {
        if use_defaults {
            Ok(Self::detect())
        } else {
            Self::load(machine_file)
        }
    }
}
