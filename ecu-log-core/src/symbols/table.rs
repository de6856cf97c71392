//! Address-indexed symbol table with cached lookups

use super::cache::{BoundedCache, CacheStats};
use super::classify::{KeywordClassifier, SymbolClassifier};
use super::map_parser::{self, SymbolMaps};
use super::{normalize_address, parse_address};
use crate::config::SymbolConfig;
use crate::text;
use crate::types::Symbol;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Symbol table parsed from a linker map file
///
/// Lookups take `&self`; the memo caches sit behind a mutex so one table can be
/// shared as `Arc<SymbolTable>` between threads.
pub struct SymbolTable {
    maps: SymbolMaps,
    range_search_limit: u64,
    caches: Mutex<LookupCaches>,
}

struct LookupCaches {
    /// Exact lookups and remembered misses (`None`)
    exact: BoundedCache<Option<String>>,
    /// Nearest-match results
    range: BoundedCache<String>,
    hits: u64,
    misses: u64,
    range_hits: u64,
    range_misses: u64,
}

impl LookupCaches {
    fn new(max_size: usize) -> Self {
        Self {
            exact: BoundedCache::new(max_size),
            range: BoundedCache::new(max_size),
            hits: 0,
            misses: 0,
            range_hits: 0,
            range_misses: 0,
        }
    }
}

impl SymbolTable {
    /// Create an empty table (every lookup misses)
    pub fn empty(config: &SymbolConfig) -> Self {
        Self::from_maps(SymbolMaps::default(), config)
    }

    /// Parse map file content with the default keyword classifier
    pub fn from_map_str(content: &str, config: &SymbolConfig) -> Self {
        let classifier = KeywordClassifier::from_config(config);
        Self::from_map_str_with(content, config, &classifier)
    }

    /// Parse map file content with a custom classifier
    pub fn from_map_str_with(
        content: &str,
        config: &SymbolConfig,
        classifier: &dyn SymbolClassifier,
    ) -> Self {
        let maps = map_parser::parse_map_content(content, config, classifier);
        Self::from_maps(maps, config)
    }

    /// Load a map file
    ///
    /// A missing or unreadable file yields an empty table; the failure is only logged.
    pub fn from_file(path: &Path, config: &SymbolConfig) -> Self {
        log::info!("Loading map file: {:?}", path);

        if !path.exists() {
            log::warn!("Map file not found: {:?}", path);
            return Self::empty(config);
        }

        match text::read_to_string_lossy(path) {
            Ok(content) => Self::from_map_str(&content, config),
            Err(e) => {
                log::error!("Failed to read map file {:?}: {}", path, e);
                Self::empty(config)
            }
        }
    }

    fn from_maps(maps: SymbolMaps, config: &SymbolConfig) -> Self {
        Self {
            maps,
            range_search_limit: config.range_search_limit,
            caches: Mutex::new(LookupCaches::new(config.cache_max_size)),
        }
    }

    /// Number of distinct symbol addresses
    pub fn len(&self) -> usize {
        self.maps.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.symbols.is_empty()
    }

    pub fn symbols(&self) -> &BTreeMap<u32, Symbol> {
        &self.maps.symbols
    }

    pub fn functions(&self) -> &BTreeMap<u32, String> {
        &self.maps.functions
    }

    pub fn variables(&self) -> &BTreeMap<u32, String> {
        &self.maps.variables
    }

    /// Resolve an address to a symbol name
    ///
    /// Exact matches win. Otherwise the nearest symbol strictly closer than the
    /// range limit (0x1000 by default) is returned. Misses are remembered.
    pub fn find_symbol_by_address(&self, address: &str) -> Option<String> {
        let key = normalize_address(address);
        let mut caches = self.lock_caches();

        if let Some(cached) = caches.exact.get(&key) {
            caches.hits += 1;
            return cached;
        }

        let Some(target) = parse_address(&key) else {
            log::warn!("Malformed address in lookup: {}", address);
            caches.exact.insert(key, None);
            caches.misses += 1;
            return None;
        };

        if let Some(symbol) = u32::try_from(target).ok().and_then(|a| self.maps.symbols.get(&a)) {
            caches.exact.insert(key, Some(symbol.name.clone()));
            caches.hits += 1;
            return Some(symbol.name.clone());
        }

        if let Some(cached) = caches.range.get(&key) {
            caches.range_hits += 1;
            return Some(cached);
        }

        match self.nearest_symbol(target) {
            Some((symbol, distance)) => {
                log::debug!(
                    "No exact symbol at {}, using nearest {} (distance {:#x})",
                    key,
                    symbol.name,
                    distance
                );
                caches.range.insert(key, symbol.name.clone());
                caches.range_hits += 1;
                Some(symbol.name.clone())
            }
            None => {
                caches.exact.insert(key, None);
                caches.misses += 1;
                caches.range_misses += 1;
                None
            }
        }
    }

    /// Closest symbol within the range limit
    ///
    /// Equidistant neighbours resolve to the lower address.
    fn nearest_symbol(&self, target: u64) -> Option<(&Symbol, u64)> {
        let below = match u32::try_from(target) {
            Ok(t) => self.maps.symbols.range(..=t).next_back(),
            Err(_) => self.maps.symbols.iter().next_back(),
        };
        let above = u32::try_from(target)
            .ok()
            .and_then(|t| t.checked_add(1))
            .and_then(|t| self.maps.symbols.range(t..).next());

        let below = below.map(|(_, s)| (s, target - u64::from(s.address)));
        let above = above.map(|(_, s)| (s, u64::from(s.address) - target));

        let nearest = match (below, above) {
            (Some(b), Some(a)) => Some(if a.1 < b.1 { a } else { b }),
            (b, a) => b.or(a),
        };

        nearest.filter(|(_, distance)| *distance < self.range_search_limit)
    }

    /// Snapshot of cache counters
    pub fn cache_stats(&self) -> CacheStats {
        let caches = self.lock_caches();
        let total = caches.hits + caches.misses;
        let hit_rate = if total > 0 {
            (caches.hits as f64 / total as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        CacheStats {
            cache_size: caches.exact.len(),
            range_cache_size: caches.range.len(),
            hits: caches.hits,
            misses: caches.misses,
            range_hits: caches.range_hits,
            range_misses: caches.range_misses,
            hit_rate,
        }
    }

    /// Drop all memoized lookups
    pub fn clear_caches(&self) {
        let mut caches = self.lock_caches();
        caches.exact.clear();
        caches.range.clear();
    }

    fn lock_caches(&self) -> MutexGuard<'_, LookupCaches> {
        // The caches hold derived data only, so a poisoned lock is still usable.
        self.caches.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolTable")
            .field("symbols", &self.maps.symbols.len())
            .field("functions", &self.maps.functions.len())
            .field("variables", &self.maps.variables.len())
            .finish()
    }
}
