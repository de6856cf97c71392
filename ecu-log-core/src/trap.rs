//! TRAP/reset dump extraction
//!
//! The ECU prints a fault record on every TRAP-triggered reset:
//!
//! ```text
//! 2025-08-25 16:53:41.276 BZCU I 02c5 {TRAP-RST}:Reset Info:
//! 2025-08-25 16:53:41.276 BZCU I 02c6 {TRAP-RST}:Reset Type: 3
//! 2025-08-25 16:53:41.276 BZCU I 02c7 {TRAP-RST}:DEADD: d0001234
//! 2025-08-25 16:53:41.276 BZCU I 02c8 {TRAP-RST}:Func0: 0x80001000
//! 2025-08-25 16:53:41.276 BZCU I 02c9 {TRAP-RST}:Func1: 0x80002000
//! 2025-08-25 16:53:41.276 BZCU I 02ca {TRAP-RST}:DIEAR: 0x00000000
//! ```
//!
//! Each block becomes one [`TrapEvent`]. The faulting data address (`DEADD`) and
//! the deepest return address (`FuncN` with the largest N) are resolved against
//! the map file to produce a readable restart reason.

use crate::config::{AnalyzerConfig, TrapConfig};
use crate::symbols::{normalize_address, FallbackNamer, SymbolTable};
use crate::text;
use crate::types::{Result, TrapEvent};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Compiled TRAP markers
#[derive(Debug, Clone)]
struct TrapPatterns {
    reset_info: Regex,
    diear: Regex,
    reset_type: Regex,
    deadd: Regex,
    func: Regex,
}

impl TrapPatterns {
    fn compile(config: &TrapConfig) -> Result<Self> {
        Ok(Self {
            reset_info: text::compile_pattern(&config.reset_info_pattern)?,
            diear: text::compile_pattern(&config.diear_pattern)?,
            reset_type: text::compile_pattern(&config.reset_type_pattern)?,
            deadd: text::compile_pattern(&config.deadd_pattern)?,
            func: text::compile_pattern(&config.func_pattern)?,
        })
    }
}

/// Raw fields of one block before symbol resolution
#[derive(Debug, Default)]
struct TrapFields {
    reset_type: Option<u32>,
    fault_address: Option<String>,
    candidates: BTreeMap<u32, String>,
}

/// Counters for one extractor instance
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractorStats {
    pub events_found: usize,
    pub symbols_resolved: usize,
    pub symbols_unresolved: usize,
    pub map_parse_time: Duration,
    pub cache: Option<crate::symbols::CacheStats>,
}

/// Finds TRAP blocks in log text and diagnoses them
#[derive(Debug)]
pub struct TrapEventExtractor {
    patterns: TrapPatterns,
    diear_window: usize,
    max_block_span: usize,
    symbols: Option<Arc<SymbolTable>>,
    fallback: FallbackNamer,
    map_parse_time: Duration,
    events_found: AtomicUsize,
    symbols_resolved: AtomicUsize,
    symbols_unresolved: AtomicUsize,
}

impl TrapEventExtractor {
    /// Create an extractor
    ///
    /// Without a symbol table every address gets a `func_at_`/`param_at_` placeholder.
    pub fn new(config: &AnalyzerConfig, symbols: Option<Arc<SymbolTable>>) -> Result<Self> {
        Ok(Self {
            patterns: TrapPatterns::compile(&config.trap)?,
            diear_window: config.trap.diear_window,
            max_block_span: config.trap.max_block_span,
            symbols,
            fallback: FallbackNamer::new(config.symbols.fallback.clone()),
            map_parse_time: Duration::ZERO,
            events_found: AtomicUsize::new(0),
            symbols_resolved: AtomicUsize::new(0),
            symbols_unresolved: AtomicUsize::new(0),
        })
    }

    /// Create an extractor, loading the map file if one is given and exists
    pub fn with_map_file(config: &AnalyzerConfig, map_file: Option<&Path>) -> Result<Self> {
        let (symbols, elapsed) = match map_file {
            Some(path) if path.exists() => {
                let started = Instant::now();
                let table = SymbolTable::from_file(path, &config.symbols);
                let elapsed = started.elapsed();
                log::info!("Map file loaded in {:.2}s", elapsed.as_secs_f64());
                (Some(Arc::new(table)), elapsed)
            }
            Some(path) => {
                log::warn!("Map file not found: {:?}, using placeholder symbol names", path);
                (None, Duration::ZERO)
            }
            None => {
                log::warn!("No map file configured, using placeholder symbol names");
                (None, Duration::ZERO)
            }
        };

        let mut extractor = Self::new(config, symbols)?;
        extractor.map_parse_time = elapsed;
        Ok(extractor)
    }

    pub fn symbol_table(&self) -> Option<&Arc<SymbolTable>> {
        self.symbols.as_ref()
    }

    /// Extract and diagnose every TRAP block in `content`
    pub fn extract(&self, content: &str) -> Vec<TrapEvent> {
        let mut lines = text::LineCounter::new(content);
        let starts: Vec<(usize, usize)> = self
            .patterns
            .reset_info
            .find_iter(content)
            .map(|m| (m.start(), lines.line_at(m.start())))
            .collect();
        if starts.is_empty() {
            return Vec::new();
        }

        let ends: Vec<(usize, usize)> = self
            .patterns
            .diear
            .find_iter(content)
            .map(|m| (m.start(), lines.line_at(m.start())))
            .collect();

        log::info!("Found {} TRAP reset events", starts.len());
        let total_lines = content.split('\n').count();

        let mut events = Vec::new();
        for (i, &(start, start_line)) in starts.iter().enumerate() {
            let (end, end_line) = match ends.iter().find(|(pos, _)| *pos > start) {
                Some(&(pos, line)) => (pos + self.diear_window, line),
                None => match starts.get(i + 1) {
                    Some(&(next, next_line)) => (next, next_line - 1),
                    None => (start + self.max_block_span, total_lines),
                },
            };
            let end = text::floor_char_boundary(content, end);

            let Some(fields) = self.parse_block(&content[start..end]) else {
                log::debug!("TRAP block at line {} carries no fields, skipping", start_line);
                continue;
            };

            events.push(self.diagnose(fields, start_line, end_line));
        }

        self.events_found.fetch_add(events.len(), Ordering::Relaxed);
        events
    }

    fn parse_block(&self, block: &str) -> Option<TrapFields> {
        let mut fields = TrapFields::default();

        fields.reset_type = self
            .patterns
            .reset_type
            .captures(block)
            .and_then(|c| c[1].parse().ok());

        fields.fault_address = self
            .patterns
            .deadd
            .captures(block)
            .map(|c| normalize_address(&c[1]));

        for caps in self.patterns.func.captures_iter(block) {
            if let Ok(index) = caps[1].parse::<u32>() {
                fields.candidates.insert(index, normalize_address(&caps[2]));
            }
        }

        if fields.reset_type.is_none() && fields.fault_address.is_none() && fields.candidates.is_empty() {
            return None;
        }
        Some(fields)
    }

    fn diagnose(&self, fields: TrapFields, start_line: usize, end_line: usize) -> TrapEvent {
        let selected = fields.candidates.values().next_back().cloned();
        let (function, variable) = self.resolve(fields.fault_address.as_deref(), selected.as_deref());

        let diagnosis = diagnosis_text(
            function.as_deref(),
            variable.as_deref(),
            fields.reset_type,
            fields.fault_address.is_some() || selected.is_some(),
        );

        TrapEvent {
            reset_type: fields.reset_type,
            fault_address: fields.fault_address,
            candidate_return_addresses: fields.candidates,
            resolved_function_name: function,
            resolved_variable_name: variable,
            start_line,
            end_line,
            diagnosis,
        }
    }

    /// Returns `(function, variable)` names
    fn resolve(
        &self,
        fault_address: Option<&str>,
        return_address: Option<&str>,
    ) -> (Option<String>, Option<String>) {
        let Some(table) = &self.symbols else {
            let variable = fault_address.map(FallbackNamer::unmapped_variable_name);
            let function = return_address.map(FallbackNamer::unmapped_function_name);
            if let Some(name) = &variable {
                log::warn!("No map file, using placeholder variable name {}", name);
            }
            if let Some(name) = &function {
                log::warn!("No map file, using placeholder function name {}", name);
            }
            return (function, variable);
        };

        let variable = fault_address.map(|addr| {
            self.lookup(table, addr, "variable", |a| self.fallback.variable_name(a))
        });
        let function = return_address.map(|addr| {
            self.lookup(table, addr, "function", |a| self.fallback.function_name(a))
        });
        (function, variable)
    }

    fn lookup(
        &self,
        table: &SymbolTable,
        address: &str,
        what: &str,
        fallback: impl Fn(&str) -> String,
    ) -> String {
        match table.find_symbol_by_address(address) {
            Some(name) => {
                self.symbols_resolved.fetch_add(1, Ordering::Relaxed);
                log::info!("Resolved {} {} at {}", what, name, address);
                name
            }
            None => {
                self.symbols_unresolved.fetch_add(1, Ordering::Relaxed);
                let name = fallback(address);
                log::warn!("No symbol for {} at {}, using {}", what, address, name);
                name
            }
        }
    }

    /// Counters since construction
    pub fn stats(&self) -> ExtractorStats {
        ExtractorStats {
            events_found: self.events_found.load(Ordering::Relaxed),
            symbols_resolved: self.symbols_resolved.load(Ordering::Relaxed),
            symbols_unresolved: self.symbols_unresolved.load(Ordering::Relaxed),
            map_parse_time: self.map_parse_time,
            cache: self.symbols.as_ref().map(|t| t.cache_stats()),
        }
    }
}

/// Build the restart reason for a TRAP event
///
/// `has_address` tells the last-resort message whether any fault or return
/// address was seen.
pub fn diagnosis_text(
    function: Option<&str>,
    variable: Option<&str>,
    reset_type: Option<u32>,
    has_address: bool,
) -> String {
    match (function, variable) {
        (Some(f), Some(v)) => format!("Restart reason: [{}] accessing [{}] triggered a fault", f, v),
        (Some(f), None) => format!("Restart reason: [{}] hit a memory access fault", f),
        (None, Some(v)) => {
            format!("Restart reason: unknown function accessing [{}] triggered a fault", v)
        }
        (None, None) => {
            let mut parts = Vec::new();
            if let Some(code) = reset_type {
                parts.push(format!("Reset type: {}", code));
            }
            if has_address {
                parts.push("entered TRAP".to_string());
            }
            if parts.is_empty() {
                "unknown reason".to_string()
            } else {
                parts.join(" ")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: &str = "\
2025-08-25 16:53:41.276 BZCU I 02c5 {TRAP-RST}:Reset Info:
2025-08-25 16:53:41.276 BZCU I 02c6 {TRAP-RST}:Reset Type: 3
2025-08-25 16:53:41.276 BZCU I 02c7 {TRAP-RST}:DEADD: D0001234
2025-08-25 16:53:41.276 BZCU I 02c8 {TRAP-RST}:Func0: 0x80001000
2025-08-25 16:53:41.276 BZCU I 02c9 {TRAP-RST}:Func1: 0x80002010
2025-08-25 16:53:41.276 BZCU I 02ca {TRAP-RST}:DIEAR: 0x00000000
";

    const MAP: &str = "\
| Can_MainFunction | 0x80002000 |
| 0xd0001230 | can_rx_buffer |
";

    fn extractor_with_map() -> TrapEventExtractor {
        let config = AnalyzerConfig::default();
        let table = SymbolTable::from_map_str(MAP, &config.symbols);
        TrapEventExtractor::new(&config, Some(Arc::new(table))).unwrap()
    }

    fn extractor_without_map() -> TrapEventExtractor {
        TrapEventExtractor::new(&AnalyzerConfig::default(), None).unwrap()
    }

    #[test]
    fn test_extract_resolves_symbols() {
        let events = extractor_with_map().extract(BLOCK);
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.reset_type, Some(3));
        assert_eq!(event.fault_address.as_deref(), Some("0xd0001234"));
        assert_eq!(event.candidate_return_addresses.len(), 2);
        assert_eq!(event.resolved_function_name.as_deref(), Some("Can_MainFunction"));
        assert_eq!(event.resolved_variable_name.as_deref(), Some("can_rx_buffer"));
        assert_eq!(event.start_line, 1);
        assert_eq!(event.end_line, 6);
        assert_eq!(
            event.diagnosis,
            "Restart reason: [Can_MainFunction] accessing [can_rx_buffer] triggered a fault"
        );
    }

    #[test]
    fn test_highest_func_index_is_selected() {
        let log = "\
{TRAP-RST}:Reset Info:
{TRAP-RST}:Func0: 0x1000
{TRAP-RST}:Func2: 0x2000
{TRAP-RST}:Func1: 0x3000
";
        let events = extractor_without_map().extract(log);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].selected_return_address(), Some((2, "0x2000")));
        assert_eq!(events[0].resolved_function_name.as_deref(), Some("func_at_0x2000"));
    }

    #[test]
    fn test_without_map_uses_placeholders() {
        let events = extractor_without_map().extract(BLOCK);
        let event = &events[0];
        assert_eq!(event.resolved_function_name.as_deref(), Some("func_at_0x80002010"));
        assert_eq!(event.resolved_variable_name.as_deref(), Some("param_at_0xd0001234"));
    }

    #[test]
    fn test_lookup_miss_uses_address_buckets() {
        let config = AnalyzerConfig::default();
        let table = SymbolTable::from_map_str("| far_away_sym | 0x10000000 |\n", &config.symbols);
        let extractor = TrapEventExtractor::new(&config, Some(Arc::new(table))).unwrap();

        let event = &extractor.extract(BLOCK)[0];
        assert_eq!(event.resolved_function_name.as_deref(), Some("func_at_0x80002010"));
        assert_eq!(event.resolved_variable_name.as_deref(), Some("ram_var_0xd0001234"));

        let stats = extractor.stats();
        assert_eq!(stats.events_found, 1);
        assert_eq!(stats.symbols_unresolved, 2);
        assert_eq!(stats.symbols_resolved, 0);
        assert!(stats.cache.is_some());
    }

    #[test]
    fn test_blocks_without_fields_are_dropped() {
        let log = "{TRAP-RST}:Reset Info:\nnothing here\n{TRAP-RST}:DIEAR: 0x0\n";
        assert!(extractor_without_map().extract(log).is_empty());
    }

    #[test]
    fn test_block_bounds_without_diear() {
        let log = "\
boot
{TRAP-RST}:Reset Info:
{TRAP-RST}:Reset Type: 1
{TRAP-RST}:Reset Info:
{TRAP-RST}:Reset Type: 2
tail";
        let events = extractor_without_map().extract(log);
        assert_eq!(events.len(), 2);

        assert_eq!(events[0].reset_type, Some(1));
        assert_eq!((events[0].start_line, events[0].end_line), (2, 3));
        assert_eq!(events[0].diagnosis, "Reset type: 1");

        assert_eq!(events[1].reset_type, Some(2));
        assert_eq!((events[1].start_line, events[1].end_line), (4, 6));
    }

    #[test]
    fn test_final_block_is_bounded() {
        let config = AnalyzerConfig {
            trap: TrapConfig {
                max_block_span: 40,
                ..TrapConfig::default()
            },
            ..AnalyzerConfig::default()
        };
        let extractor = TrapEventExtractor::new(&config, None).unwrap();

        let log = format!("{{TRAP-RST}}:Reset Info:\n{}\n{{TRAP-RST}}:Reset Type: 9\n", "x".repeat(100));
        assert!(extractor.extract(&log).is_empty());
    }

    #[test]
    fn test_multibyte_text_near_block_end() {
        let log = "{TRAP-RST}:Reset Info:\n{TRAP-RST}:Reset Type: 4\n{TRAP-RST}:DIEAR: 0\n重启重启重启重启";
        let config = AnalyzerConfig {
            trap: TrapConfig {
                diear_window: 22,
                ..TrapConfig::default()
            },
            ..AnalyzerConfig::default()
        };
        let extractor = TrapEventExtractor::new(&config, None).unwrap();
        assert_eq!(extractor.extract(log).len(), 1);
    }

    #[test]
    fn test_diagnosis_shapes() {
        assert_eq!(
            diagnosis_text(Some("f"), Some("v"), None, true),
            "Restart reason: [f] accessing [v] triggered a fault"
        );
        assert_eq!(
            diagnosis_text(Some("f"), None, None, true),
            "Restart reason: [f] hit a memory access fault"
        );
        assert_eq!(
            diagnosis_text(None, Some("v"), None, true),
            "Restart reason: unknown function accessing [v] triggered a fault"
        );
        assert_eq!(diagnosis_text(None, None, Some(5), true), "Reset type: 5 entered TRAP");
        assert_eq!(diagnosis_text(None, None, None, true), "entered TRAP");
        assert_eq!(diagnosis_text(None, None, None, false), "unknown reason");
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let config = AnalyzerConfig {
            trap: TrapConfig {
                func_pattern: "(".to_string(),
                ..TrapConfig::default()
            },
            ..AnalyzerConfig::default()
        };
        assert!(TrapEventExtractor::new(&config, None).is_err());
    }
}
