//! ECU Log Analyzer Library
//!
//! Extraction and symbol resolution for automotive ECU diagnostic logs.
//!
//! # Architecture
//!
//! - [`SymbolTable`] parses a linker map file and resolves addresses to names
//! - [`TrapEventExtractor`] finds TRAP/reset dumps and diagnoses them against
//!   the symbol table
//! - [`LogRecordParser`] extracts per-file metadata (project, baseline, CPU
//!   load, capture time) and runs the TRAP extractor, one file or a whole
//!   directory at a time
//! - [`ServiceBusReconstructor`] rebuilds per-channel SOA counter series from
//!   positional counter dumps and a channel manifest
//!
//! The library does NOT render reports. Every output record is a plain
//! serializable struct; presentation is left to the application layer
//! (ecu-log-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use ecu_log_core::{AnalyzerConfig, LogRecordParser, ServiceBusReconstructor};
//! use std::path::Path;
//!
//! let config = AnalyzerConfig::new().with_max_file_size_mb(50);
//!
//! // TRAP diagnosis with symbol names from the map file
//! let parser = LogRecordParser::with_map_file(&config, Some(Path::new("app.map"))).unwrap();
//! for log in parser.parse_directory(Path::new("logs"), true) {
//!     for event in &log.trap_events {
//!         println!("{:?}: {}", log.file_path, event.diagnosis);
//!     }
//! }
//!
//! // SOA channel series
//! let mut soa = ServiceBusReconstructor::new(&config.soa).unwrap();
//! soa.load_manifest(Path::new("logs/Summary_Report.json"));
//! soa.parse_log_file(Path::new("logs/bus.log"));
//! if soa.process() {
//!     println!("{:?}", soa.statistics());
//! }
//! ```

// Public modules
pub mod config;
pub mod parser;
pub mod soa;
pub mod summary;
pub mod symbols;
pub mod trap;
pub mod types;

// Re-export main types for convenience
pub use config::{
    AddressBucket, AnalyzerConfig, FallbackConfig, ParserConfig, SoaConfig, SymbolConfig,
    TrapConfig,
};
pub use parser::LogRecordParser;
pub use soa::{ChannelSeries, LogDetail, ServiceBusReconstructor, SummarySeries};
pub use summary::{LoadStatistics, TrapDetail, TrapSummary};
pub use symbols::{CacheStats, FallbackNamer, KeywordClassifier, SymbolClassifier, SymbolTable};
pub use trap::{ExtractorStats, TrapEventExtractor};
pub use types::{
    AnalyzerError, Channel, ChannelCounterSample, CounterKind, CounterPoint, ParsedLog, Result,
    SoaReport, SoaStatistics, Symbol, SymbolKind, TrapEvent,
};

// Internal modules (not exposed in public API)
mod text;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
