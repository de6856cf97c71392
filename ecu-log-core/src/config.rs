//! Analyzer configuration types
//!
//! Every tunable the analyzers read lives here: size thresholds, cache limits,
//! marker patterns and the toolchain-specific naming defaults. All structs
//! deserialize with defaults for missing fields, so a partial TOML file only
//! needs to name what it overrides.

use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// Top-level configuration for all analyzers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub symbols: SymbolConfig,
    #[serde(default)]
    pub trap: TrapConfig,
    #[serde(default)]
    pub soa: SoaConfig,
    #[serde(default)]
    pub parser: ParserConfig,
}

impl AnalyzerConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the per-file size limit in megabytes
    pub fn with_max_file_size_mb(mut self, megabytes: u64) -> Self {
        self.parser.max_file_size = megabytes * MIB;
        self
    }

    /// Builder method: set the symbol cache cap
    pub fn with_symbol_cache_size(mut self, entries: usize) -> Self {
        self.symbols.cache_max_size = entries;
        self
    }

    /// Builder method: set the number of workers for directory batches
    pub fn with_batch_workers(mut self, workers: usize) -> Self {
        self.parser.max_workers = workers;
        self
    }

    /// Builder method: set accepted log file extensions
    pub fn with_log_extensions(mut self, extensions: Vec<String>) -> Self {
        self.parser.log_extensions = extensions;
        self
    }
}

/// Map file parsing and lookup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolConfig {
    /// Maximum entries per lookup cache before eviction
    #[serde(default = "default_cache_max_size")]
    pub cache_max_size: usize,

    /// Nearest-match lookups must be strictly closer than this
    #[serde(default = "default_range_search_limit")]
    pub range_search_limit: u64,

    /// Map content above this size (bytes) is parsed in parallel chunks
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: u64,

    /// Upper bound on parallel map chunks
    #[serde(default = "default_map_workers")]
    pub max_parallel_workers: usize,

    /// Fields starting with one of these are never taken as symbol names
    #[serde(default = "default_noise_prefixes")]
    pub noise_prefixes: Vec<String>,

    /// Case-insensitive substrings that mark a symbol as a function
    #[serde(default = "default_function_keywords")]
    pub function_keywords: Vec<String>,

    /// Placeholder naming used when a lookup fails
    #[serde(default)]
    pub fallback: FallbackConfig,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            cache_max_size: default_cache_max_size(),
            range_search_limit: default_range_search_limit(),
            parallel_threshold: default_parallel_threshold(),
            max_parallel_workers: default_map_workers(),
            noise_prefixes: default_noise_prefixes(),
            function_keywords: default_function_keywords(),
            fallback: FallbackConfig::default(),
        }
    }
}

fn default_cache_max_size() -> usize {
    10_000
}

fn default_range_search_limit() -> u64 {
    0x1000
}

fn default_parallel_threshold() -> u64 {
    MIB
}

fn default_map_workers() -> usize {
    4
}

fn default_noise_prefixes() -> Vec<String> {
    vec!["mpe:".to_string()]
}

fn default_function_keywords() -> Vec<String> {
    ["func", "handler", "init", "main", "process", "task", "isr", "os_"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Inclusive address range mapped to a placeholder name prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBucket {
    pub start: u64,
    pub end: u64,
    pub prefix: String,
}

impl AddressBucket {
    pub fn new(start: u64, end: u64, prefix: impl Into<String>) -> Self {
        Self {
            start,
            end,
            prefix: prefix.into(),
        }
    }

    pub fn contains(&self, address: u64) -> bool {
        (self.start..=self.end).contains(&address)
    }
}

/// Address-range buckets for synthesized names
///
/// The default ranges match the TriCore memory layout used by the ECUs these
/// logs come from (PFlash at 0x8000_0000, DSPR at 0xD000_0000).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_function_buckets")]
    pub function_buckets: Vec<AddressBucket>,
    #[serde(default = "default_function_prefix")]
    pub unknown_function_prefix: String,
    #[serde(default = "default_variable_buckets")]
    pub variable_buckets: Vec<AddressBucket>,
    #[serde(default = "default_variable_prefix")]
    pub unknown_variable_prefix: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            function_buckets: default_function_buckets(),
            unknown_function_prefix: default_function_prefix(),
            variable_buckets: default_variable_buckets(),
            unknown_variable_prefix: default_variable_prefix(),
        }
    }
}

fn default_function_buckets() -> Vec<AddressBucket> {
    vec![
        AddressBucket::new(0x8000_0000, 0x8FFF_FFFF, "func_at_"),
        AddressBucket::new(0x9000_0000, 0x9FFF_FFFF, "interrupt_handler_"),
    ]
}

fn default_function_prefix() -> String {
    "unknown_func_".to_string()
}

fn default_variable_buckets() -> Vec<AddressBucket> {
    vec![
        AddressBucket::new(0xD000_0000, 0xDFFF_FFFF, "ram_var_"),
        AddressBucket::new(0x8000_0000, 0x8FFF_FFFF, "rom_const_"),
    ]
}

fn default_variable_prefix() -> String {
    "unknown_var_".to_string()
}

/// TRAP block markers and segmentation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrapConfig {
    #[serde(default = "default_reset_info_pattern")]
    pub reset_info_pattern: String,
    #[serde(default = "default_diear_pattern")]
    pub diear_pattern: String,
    #[serde(default = "default_reset_type_pattern")]
    pub reset_type_pattern: String,
    #[serde(default = "default_deadd_pattern")]
    pub deadd_pattern: String,
    #[serde(default = "default_func_pattern")]
    pub func_pattern: String,

    /// Bytes kept after the DIEAR marker so its line is inside the block
    #[serde(default = "default_diear_window")]
    pub diear_window: usize,

    /// Maximum span of the final block when no DIEAR marker follows it
    #[serde(default = "default_max_block_span")]
    pub max_block_span: usize,
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self {
            reset_info_pattern: default_reset_info_pattern(),
            diear_pattern: default_diear_pattern(),
            reset_type_pattern: default_reset_type_pattern(),
            deadd_pattern: default_deadd_pattern(),
            func_pattern: default_func_pattern(),
            diear_window: default_diear_window(),
            max_block_span: default_max_block_span(),
        }
    }
}

fn default_reset_info_pattern() -> String {
    r"\{TRAP-RST\}:Reset Info:".to_string()
}

fn default_diear_pattern() -> String {
    r"\{TRAP-RST\}:DIEAR:".to_string()
}

fn default_reset_type_pattern() -> String {
    r"\{TRAP-RST\}:Reset Type:\s*(\d+)".to_string()
}

fn default_deadd_pattern() -> String {
    r"\{TRAP-RST\}:DEADD:\s*(?:0[xX])?([0-9a-fA-F]+)".to_string()
}

fn default_func_pattern() -> String {
    r"\{TRAP-RST\}:Func(\d+):\s*0x([0-9a-fA-F]+)".to_string()
}

fn default_diear_window() -> usize {
    200
}

fn default_max_block_span() -> usize {
    5000
}

/// SOA counter line patterns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoaConfig {
    /// Groups: timestamp, base offset, comma-separated counters
    #[serde(default = "default_count_pattern")]
    pub count_pattern: String,
    #[serde(default = "default_drop_pattern")]
    pub drop_pattern: String,
    /// Characters of the raw line kept for display
    #[serde(default = "default_raw_text_limit")]
    pub raw_text_limit: usize,
    /// Lines whose counters reach past this slot count are rejected
    #[serde(default = "default_max_slot_index")]
    pub max_slot_index: usize,
}

impl Default for SoaConfig {
    fn default() -> Self {
        Self {
            count_pattern: default_count_pattern(),
            drop_pattern: default_drop_pattern(),
            raw_text_limit: default_raw_text_limit(),
            max_slot_index: default_max_slot_index(),
        }
    }
}

fn default_count_pattern() -> String {
    r"(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3}).*?(?:\([A-Za-z0-9_]+\)\s*)?SOA cnt on(\d+):([\d,]+)"
        .to_string()
}

fn default_drop_pattern() -> String {
    r"(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3}).*?(?:\([A-Za-z0-9_]+\)\s*)?SOA ASW drop cnt on(\d+):([\d,]+)"
        .to_string()
}

fn default_raw_text_limit() -> usize {
    200
}

fn default_max_slot_index() -> usize {
    65_536
}

/// Per-file parsing and batch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Files above this size (bytes) are rejected
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Files above this size (bytes) are streamed line by line
    #[serde(default = "default_streaming_threshold")]
    pub streaming_threshold: u64,

    /// Extensions accepted when scanning a directory (extension-less files are always accepted)
    #[serde(default = "default_log_extensions")]
    pub log_extensions: Vec<String>,

    /// Upper bound on parallel workers for directory batches
    #[serde(default = "default_batch_workers")]
    pub max_workers: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            streaming_threshold: default_streaming_threshold(),
            log_extensions: default_log_extensions(),
            max_workers: default_batch_workers(),
        }
    }
}

fn default_max_file_size() -> u64 {
    100 * MIB
}

fn default_streaming_threshold() -> u64 {
    10 * MIB
}

fn default_log_extensions() -> Vec<String> {
    vec![".log".to_string(), ".txt".to_string(), ".out".to_string()]
}

fn default_batch_workers() -> usize {
    8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalyzerConfig::new();
        assert_eq!(config.symbols.cache_max_size, 10_000);
        assert_eq!(config.symbols.range_search_limit, 0x1000);
        assert_eq!(config.symbols.max_parallel_workers, 4);
        assert_eq!(config.parser.max_file_size, 100 * MIB);
        assert_eq!(config.parser.max_workers, 8);
        assert_eq!(config.trap.diear_window, 200);
        assert_eq!(config.soa.raw_text_limit, 200);
    }

    #[test]
    fn test_builder() {
        let config = AnalyzerConfig::new()
            .with_max_file_size_mb(5)
            .with_symbol_cache_size(10)
            .with_batch_workers(2)
            .with_log_extensions(vec![".log".to_string()]);

        assert_eq!(config.parser.max_file_size, 5 * MIB);
        assert_eq!(config.symbols.cache_max_size, 10);
        assert_eq!(config.parser.max_workers, 2);
        assert_eq!(config.parser.log_extensions, vec![".log".to_string()]);
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let json = r#"{ "symbols": { "cache_max_size": 42 } }"#;
        let config: AnalyzerConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.symbols.cache_max_size, 42);
        assert_eq!(config.symbols.noise_prefixes, vec!["mpe:".to_string()]);
        assert_eq!(config.trap.max_block_span, 5000);
    }

    #[test]
    fn test_address_bucket_is_inclusive() {
        let bucket = AddressBucket::new(0x8000_0000, 0x8FFF_FFFF, "func_at_");
        assert!(bucket.contains(0x8000_0000));
        assert!(bucket.contains(0x8FFF_FFFF));
        assert!(!bucket.contains(0x9000_0000));
    }
}
