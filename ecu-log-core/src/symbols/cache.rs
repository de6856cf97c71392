//! Bounded lookup memo for symbol resolution

use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Insertion-ordered map that drops its oldest fifth once it grows past `max_size`
#[derive(Debug)]
pub(crate) struct BoundedCache<V> {
    entries: HashMap<String, V>,
    order: VecDeque<String>,
    max_size: usize,
}

impl<V: Clone> BoundedCache<V> {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_size,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: String, value: V) {
        if !self.entries.contains_key(&key) {
            self.order.push_back(key.clone());
        }
        self.entries.insert(key, value);

        if self.entries.len() > self.max_size {
            self.evict();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn evict(&mut self) {
        let count = (self.max_size / 5).max(1);
        for _ in 0..count {
            match self.order.pop_front() {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
        log::debug!("Evicted {} symbol cache entries", count);
    }
}

/// Hit/miss counters for the symbol lookup caches
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub cache_size: usize,
    pub range_cache_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub range_hits: u64,
    pub range_misses: u64,
    /// Percentage of exact lookups answered without a nearest-match scan
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_entries() {
        let mut cache = BoundedCache::new(10);
        for i in 0..11 {
            cache.insert(format!("0x{:x}", i), i);
        }

        // 11 > 10 triggers eviction of the two oldest entries
        assert_eq!(cache.len(), 9);
        assert_eq!(cache.get("0x0"), None);
        assert_eq!(cache.get("0x1"), None);
        assert_eq!(cache.get("0x2"), Some(2));
        assert_eq!(cache.get("0xa"), Some(10));
    }

    #[test]
    fn test_reinsert_does_not_duplicate_order() {
        let mut cache = BoundedCache::new(2);
        cache.insert("a".to_string(), None::<String>);
        cache.insert("a".to_string(), Some("x".to_string()));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some(Some("x".to_string())));
    }

    #[test]
    fn test_tiny_cache_still_evicts() {
        let mut cache = BoundedCache::new(1);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b"), Some(2));
    }
}
