//! Latest-Value Caches
//!
//! Last-write-wins stores for the most recent payload per instrument.
//! Reads never touch the network; a `get` is a map lookup under a read
//! lock, nothing more.

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::domain::market_data::{DepthTick, QuoteTick};
use crate::domain::subscription::SymbolKey;

/// Last-write-wins cache of one payload per [`SymbolKey`].
///
/// Entries are overwritten, never merged; only the latest value is kept.
pub struct LatestValueCache<T> {
    entries: RwLock<HashMap<SymbolKey, T>>,
}

impl<T> Default for LatestValueCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestValueCache<T> {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Overwrite the entry for `key`.
    pub fn insert(&self, key: SymbolKey, value: T) {
        self.entries.write().insert(key, value);
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<T: Clone> LatestValueCache<T> {
    /// Latest value for `key`, if one has been received.
    #[must_use]
    pub fn get(&self, key: &SymbolKey) -> Option<T> {
        self.entries.read().get(key).cloned()
    }
}

/// The three per-kind caches owned by one streaming session.
#[derive(Default)]
pub struct TickCaches {
    /// Last traded price per instrument.
    pub ltp: LatestValueCache<Decimal>,
    /// Latest quote per instrument.
    pub quote: LatestValueCache<QuoteTick>,
    /// Latest order book snapshot per instrument.
    pub depth: LatestValueCache<DepthTick>,
}

impl TickCaches {
    /// Create empty caches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn key(symbol: &str) -> SymbolKey {
        SymbolKey::new("NSE", symbol).unwrap()
    }

    #[test]
    fn get_returns_latest_write() {
        let cache = LatestValueCache::new();

        cache.insert(key("INFY"), 1);
        cache.insert(key("INFY"), 2);

        assert_eq!(cache.get(&key("INFY")), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn get_missing_key_is_none() {
        let cache: LatestValueCache<Decimal> = LatestValueCache::new();
        assert_eq!(cache.get(&key("INFY")), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_reads_see_some_written_value() {
        use std::thread;

        let cache = Arc::new(LatestValueCache::new());
        cache.insert(key("INFY"), 0u64);

        let writer = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 1..=1_000u64 {
                    cache.insert(key("INFY"), i);
                }
            })
        };

        let reader = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let mut last = 0u64;
                for _ in 0..1_000 {
                    let value = cache.get(&key("INFY")).unwrap();
                    // Values only ever move forward.
                    assert!(value >= last);
                    last = value;
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();

        assert_eq!(cache.get(&key("INFY")), Some(1_000));
    }
}
