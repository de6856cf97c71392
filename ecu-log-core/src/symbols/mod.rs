//! Linker map symbol table
//!
//! Parses pipe-delimited map file tables (TASKING-style `| name | ... | 0x80001234 |`
//! rows) into an address index and answers exact and nearest-neighbor lookups.

pub mod cache;
pub mod classify;
pub mod fallback;
pub mod map_parser;
pub mod table;

// Re-export key types for convenience
pub use cache::CacheStats;
pub use classify::{KeywordClassifier, SymbolClassifier};
pub use fallback::FallbackNamer;
pub use table::SymbolTable;

/// Normalize an address string: `0x` prefix, lower-case
pub fn normalize_address(address: &str) -> String {
    let trimmed = address.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("0x") {
        lower
    } else {
        format!("0x{}", lower)
    }
}

/// Parse a hex address with or without `0x` prefix
pub fn parse_address(address: &str) -> Option<u64> {
    let trimmed = address.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(digits, 16).ok()
}
