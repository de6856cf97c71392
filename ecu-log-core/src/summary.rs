//! Batch-level statistics over parsed logs

use crate::types::ParsedLog;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// CPU load statistics across a batch
///
/// Only files that carry a core load sample count as valid, and only valid
/// files contribute projects and baselines.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadStatistics {
    pub total_files: usize,
    pub valid_files: usize,
    pub projects: Vec<String>,
    pub baseline_versions: Vec<String>,
    /// Widest core load sample in the batch
    pub core_count: usize,
    /// Per-core mean, rounded to two decimals
    pub avg_loads: Vec<f64>,
    pub max_loads: Vec<f64>,
    pub min_loads: Vec<f64>,
}

impl LoadStatistics {
    pub fn from_logs(logs: &[ParsedLog]) -> Self {
        let valid: Vec<&ParsedLog> = logs.iter().filter(|l| !l.core_loads.is_empty()).collect();

        let projects: BTreeSet<&str> = valid
            .iter()
            .filter_map(|l| l.project_name.as_deref())
            .collect();
        let baselines: BTreeSet<&str> = valid
            .iter()
            .filter_map(|l| l.baseline_version.as_deref())
            .collect();

        let mut stats = LoadStatistics {
            total_files: logs.len(),
            valid_files: valid.len(),
            projects: projects.into_iter().map(String::from).collect(),
            baseline_versions: baselines.into_iter().map(String::from).collect(),
            ..Default::default()
        };

        stats.core_count = valid.iter().map(|l| l.core_loads.len()).max().unwrap_or(0);
        for core in 0..stats.core_count {
            let samples: Vec<f64> = valid
                .iter()
                .filter_map(|l| l.core_loads.get(core).copied())
                .collect();
            if samples.is_empty() {
                continue;
            }

            let mean = samples.iter().sum::<f64>() / samples.len() as f64;
            stats.avg_loads.push((mean * 100.0).round() / 100.0);
            stats.max_loads.push(samples.iter().copied().fold(f64::MIN, f64::max));
            stats.min_loads.push(samples.iter().copied().fold(f64::MAX, f64::min));
        }

        stats
    }
}

/// One TRAP event with the file it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrapDetail {
    pub file_path: PathBuf,
    pub reset_type: Option<u32>,
    pub fault_address: Option<String>,
    pub function_name: Option<String>,
    pub variable_name: Option<String>,
    pub diagnosis: String,
}

/// TRAP events across a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrapSummary {
    pub total_count: usize,
    pub reset_types: Vec<u32>,
    pub function_names: Vec<String>,
    pub details: Vec<TrapDetail>,
}

impl TrapSummary {
    /// `None` if no file carries a TRAP event
    pub fn from_logs(logs: &[ParsedLog]) -> Option<Self> {
        let details: Vec<TrapDetail> = logs
            .iter()
            .flat_map(|log| {
                log.trap_events.iter().map(|event| TrapDetail {
                    file_path: log.file_path.clone(),
                    reset_type: event.reset_type,
                    fault_address: event.fault_address.clone(),
                    function_name: event.resolved_function_name.clone(),
                    variable_name: event.resolved_variable_name.clone(),
                    diagnosis: event.diagnosis.clone(),
                })
            })
            .collect();

        if details.is_empty() {
            return None;
        }

        let reset_types: BTreeSet<u32> = details.iter().filter_map(|d| d.reset_type).collect();
        let function_names: BTreeSet<&str> = details
            .iter()
            .filter_map(|d| d.function_name.as_deref())
            .collect();

        Some(TrapSummary {
            total_count: details.len(),
            reset_types: reset_types.into_iter().collect(),
            function_names: function_names.into_iter().map(String::from).collect(),
            details,
        })
    }
}
