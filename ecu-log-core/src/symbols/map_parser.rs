//! Map file row parser
//!
//! Map files are table dumps, one symbol per row, with varying column layouts:
//!
//! ```text
//! | Rte_Runnable_10ms | 0x80012340 | 0x00000120 | .text |
//! | 0xd0001000 | 0x00000004 | can_rx_counter |
//! ```
//!
//! A row is a definition if one column is a full-width address and another
//! column looks like an identifier. Large files are split into contiguous chunks
//! parsed on the rayon pool; chunk results are merged in file order so the
//! outcome is identical to a serial pass.

use super::classify::SymbolClassifier;
use crate::config::SymbolConfig;
use crate::types::{Symbol, SymbolKind};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;

/// Symbol indices built from (part of) a map file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolMaps {
    pub symbols: BTreeMap<u32, Symbol>,
    pub functions: BTreeMap<u32, String>,
    pub variables: BTreeMap<u32, String>,
    /// Rows that produced a symbol (duplicates included)
    pub parsed_rows: usize,
}

impl SymbolMaps {
    fn insert(&mut self, address: u32, name: String, kind: SymbolKind) {
        match kind {
            SymbolKind::Function => self.functions.insert(address, name.clone()),
            SymbolKind::Variable => self.variables.insert(address, name.clone()),
        };
        self.symbols.insert(address, Symbol { address, name });
        self.parsed_rows += 1;
    }

    /// Fold a later chunk into this one; later rows overwrite earlier ones
    fn merge(&mut self, later: SymbolMaps) {
        self.symbols.extend(later.symbols);
        self.functions.extend(later.functions);
        self.variables.extend(later.variables);
        self.parsed_rows += later.parsed_rows;
    }
}

/// Parse map file content, choosing the serial or parallel path by size
pub fn parse_map_content(
    content: &str,
    config: &SymbolConfig,
    classifier: &dyn SymbolClassifier,
) -> SymbolMaps {
    let size = content.len() as u64;
    let size_mb = size as f64 / (1024.0 * 1024.0);
    let started = Instant::now();

    let maps = if size > config.parallel_threshold {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(config.max_parallel_workers)
            .max(1);
        log::info!("Map file is {:.1}MB, parsing in {} chunks", size_mb, workers);
        parse_parallel(content, workers, config, classifier)
    } else {
        log::info!("Map file is {:.1}MB, parsing serially", size_mb);
        let lines: Vec<&str> = content.split('\n').collect();
        parse_lines(&lines, config, classifier)
    };

    log::info!(
        "Map parsed: {} functions, {} variables, {} symbols ({} rows, {:.2}s)",
        maps.functions.len(),
        maps.variables.len(),
        maps.symbols.len(),
        maps.parsed_rows,
        started.elapsed().as_secs_f64()
    );
    maps
}

/// Split the lines into `workers` contiguous chunks and parse them concurrently
///
/// The last chunk takes the remainder of an uneven split.
pub fn parse_parallel(
    content: &str,
    workers: usize,
    config: &SymbolConfig,
    classifier: &dyn SymbolClassifier,
) -> SymbolMaps {
    let lines: Vec<&str> = content.split('\n').collect();
    let workers = workers.max(1);
    let chunk_size = lines.len() / workers;

    let chunks: Vec<SymbolMaps> = (0..workers)
        .into_par_iter()
        .map(|i| {
            let start = i * chunk_size;
            let end = if i + 1 < workers { start + chunk_size } else { lines.len() };
            parse_lines(&lines[start..end], config, classifier)
        })
        .collect();

    chunks
        .into_iter()
        .fold(SymbolMaps::default(), |mut merged, chunk| {
            merged.merge(chunk);
            merged
        })
}

/// Parse a run of lines in order
pub fn parse_lines(
    lines: &[&str],
    config: &SymbolConfig,
    classifier: &dyn SymbolClassifier,
) -> SymbolMaps {
    let mut maps = SymbolMaps::default();
    for line in lines {
        if let Some((address, name)) = parse_map_row(line, &config.noise_prefixes) {
            let kind = classifier.classify(&name);
            maps.insert(address, name, kind);
        }
    }
    maps
}

/// Extract `(address, name)` from one table row
///
/// The first full-width address column wins. The name is the first
/// identifier-like column before it, or failing that, after it.
pub fn parse_map_row(line: &str, noise_prefixes: &[String]) -> Option<(u32, String)> {
    let line = line.trim();
    if !line.starts_with('|') {
        return None;
    }

    let fields: Vec<&str> = line.split('|').map(str::trim).collect();
    if fields.len() < 3 {
        return None;
    }

    let addr_idx = fields.iter().position(|f| is_full_address(f))?;
    let address = u32::from_str_radix(&fields[addr_idx][2..], 16).ok()?;

    let is_name = |f: &&&str| is_symbol_name(f, noise_prefixes);
    let name = fields[..addr_idx]
        .iter()
        .find(is_name)
        .or_else(|| fields[addr_idx + 1..].iter().find(is_name))?;

    Some((address, name.to_string()))
}

/// `0x` followed by exactly eight hex digits
fn is_full_address(field: &str) -> bool {
    field.len() == 10
        && (field.starts_with("0x") || field.starts_with("0X"))
        && field[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_symbol_name(field: &str, noise_prefixes: &[String]) -> bool {
    let starts_like_identifier = field
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');

    starts_like_identifier
        && field.chars().count() > 2
        && !field.starts_with("0x")
        && !noise_prefixes.iter().any(|p| field.starts_with(p.as_str()))
}
