//! Core types for the ECU log analyzer library
//!
//! This module defines the plain data records the analyzers emit. They carry no
//! behaviour beyond small accessors: the reporting layer serializes them and
//! decides how to render them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Result type for analyzer operations
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Errors that can occur while analyzing logs
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("File not found: {0:?}")]
    FileNotFound(PathBuf),

    #[error("File too large: {path:?} ({size} bytes, limit {limit} bytes)")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid channel manifest: {0}")]
    Manifest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A linker symbol: one address/name pair from a map file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Absolute 32-bit address
    pub address: u32,
    /// Symbol name as written in the map file
    pub name: String,
}

impl Symbol {
    /// Normalized address string (`0x` + 8 lower-case hex digits)
    pub fn address_hex(&self) -> String {
        format!("0x{:08x}", self.address)
    }
}

/// Which sub-index a symbol was classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Function,
    Variable,
}

/// One TRAP/reset occurrence extracted from a log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrapEvent {
    /// Reset type code from the `Reset Type:` line
    pub reset_type: Option<u32>,
    /// Faulting data address (`DEADD`), normalized with a `0x` prefix
    pub fault_address: Option<String>,
    /// Call-stack frame ordinal -> return address (`FuncN`)
    pub candidate_return_addresses: BTreeMap<u32, String>,
    /// Name of the function at the selected return address
    pub resolved_function_name: Option<String>,
    /// Name of the variable at the fault address
    pub resolved_variable_name: Option<String>,
    /// 1-based line where the block starts
    pub start_line: usize,
    /// 1-based line where the block ends
    pub end_line: usize,
    /// Human-readable restart reason
    pub diagnosis: String,
}

impl TrapEvent {
    /// The return address with the highest frame ordinal, if any
    pub fn selected_return_address(&self) -> Option<(u32, &str)> {
        self.candidate_return_addresses
            .iter()
            .next_back()
            .map(|(index, addr)| (*index, addr.as_str()))
    }
}

/// Parse result for a single log file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedLog {
    pub file_path: PathBuf,
    pub project_name: Option<String>,
    pub baseline_version: Option<String>,
    /// Last CPU load sample seen in the file, one value per core
    pub core_loads: Vec<f64>,
    pub timestamp: Option<String>,
    pub trap_events: Vec<TrapEvent>,
}

impl ParsedLog {
    /// Create an empty record for a file
    pub fn empty(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Default::default()
        }
    }
}

/// Kind of SOA counter dump line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterKind {
    /// `SOA cnt on` - send/receive counters
    Count,
    /// `SOA ASW drop cnt on` - drop counters
    Drop,
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterKind::Count => write!(f, "cnt"),
            CounterKind::Drop => write!(f, "drop"),
        }
    }
}

/// One parsed SOA counter dump line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCounterSample {
    /// `YYYY-MM-DD HH:MM:SS.mmm`
    pub timestamp: String,
    /// Index of the first counter slot in `values`
    pub base_offset: usize,
    pub values: Vec<u64>,
    pub kind: CounterKind,
    pub source_file: PathBuf,
    /// 1-based line number in `source_file`
    pub source_line: usize,
    /// Trimmed line, cut to 200 characters for display
    pub raw_text: String,
}

/// One `(timestamp, count)` point
pub type CounterPoint = (String, u64);

/// Reconstructed time series for one SOA channel (topic)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub sent: Vec<CounterPoint>,
    pub received: Vec<CounterPoint>,
    pub dropped: Vec<CounterPoint>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// True if any series holds a strictly positive value
    pub fn has_data(&self) -> bool {
        [&self.received, &self.sent, &self.dropped]
            .iter()
            .any(|series| series.iter().any(|(_, count)| *count > 0))
    }

    /// Number of points across all three series
    pub fn data_points(&self) -> usize {
        self.received.len() + self.sent.len() + self.dropped.len()
    }

    /// Sum of all drop counters
    pub fn total_dropped(&self) -> u64 {
        self.dropped.iter().map(|(_, count)| *count).sum()
    }
}

/// Aggregate SOA statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoaStatistics {
    /// Manifest length, duplicates included
    pub topic_count: usize,
    pub data_points: usize,
    pub topics_with_data: usize,
    pub topics_without_data: usize,
    pub total_lost_data: u64,
}

/// SOA output handed to the reporting layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoaReport {
    /// Channels in manifest (first occurrence) order
    pub channels: Vec<Channel>,
    pub statistics: SoaStatistics,
}

impl SoaReport {
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected_return_address_uses_highest_ordinal() {
        let mut candidates = BTreeMap::new();
        candidates.insert(0, "0x00001000".to_string());
        candidates.insert(2, "0x00002000".to_string());
        candidates.insert(1, "0x00003000".to_string());

        let event = TrapEvent {
            reset_type: None,
            fault_address: None,
            candidate_return_addresses: candidates,
            resolved_function_name: None,
            resolved_variable_name: None,
            start_line: 1,
            end_line: 1,
            diagnosis: "unknown reason".to_string(),
        };

        assert_eq!(event.selected_return_address(), Some((2, "0x00002000")));
    }

    #[test]
    fn test_channel_has_data() {
        let mut channel = Channel::new("Topic");
        assert!(!channel.has_data());

        channel.received.push(("t".to_string(), 0));
        channel.dropped.push(("t".to_string(), 0));
        assert!(!channel.has_data());
        assert_eq!(channel.data_points(), 2);

        channel.dropped.push(("t2".to_string(), 3));
        assert!(channel.has_data());
        assert_eq!(channel.total_dropped(), 3);
    }

    #[test]
    fn test_counter_kind_display() {
        assert_eq!(CounterKind::Count.to_string(), "cnt");
        assert_eq!(CounterKind::Drop.to_string(), "drop");
    }
}
