//! LRU cache for tool results.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::ToolOutput;

/// Counters and capacity snapshot for a tool cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheInfo {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub maxsize: usize,
}

/// Thread-safe LRU cache keyed by canonical argument encoding.
///
/// Two calls with equal keys must return equal results; callers that need
/// freshness disable caching.
pub struct ToolCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<String, CacheSlot>,
    maxsize: usize,
    hits: u64,
    misses: u64,
    tick: u64,
}

struct CacheSlot {
    value: ToolOutput,
    last_used: u64,
}

impl ToolCache {
    pub fn new(maxsize: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                maxsize: maxsize.max(1),
                hits: 0,
                misses: 0,
                tick: 0,
            }),
        }
    }

    /// Look up a value, recording a hit or miss.
    pub fn get(&self, key: &str) -> Option<ToolOutput> {
        let mut inner = self.inner.lock().unwrap();
        inner.tick += 1;
        let tick = inner.tick;
        match inner.entries.get_mut(key) {
            Some(slot) => {
                slot.last_used = tick;
                let value = slot.value.clone();
                inner.hits += 1;
                Some(value)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert a value, evicting the least-recently-used slot at capacity.
    pub fn insert(&self, key: String, value: ToolOutput) {
        let mut inner = self.inner.lock().unwrap();
        inner.tick += 1;
        let tick = inner.tick;

        if !inner.entries.contains_key(&key) && inner.entries.len() >= inner.maxsize {
            if let Some(lru_key) = inner
                .entries
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&lru_key);
            }
        }

        inner.entries.insert(
            key,
            CacheSlot {
                value,
                last_used: tick,
            },
        );
    }

    /// Evict all entries. Hit/miss counters are retained.
    pub fn clear(&self) {
        self.inner.lock().unwrap().entries.clear();
    }

    pub fn info(&self) -> CacheInfo {
        let inner = self.inner.lock().unwrap();
        CacheInfo {
            hits: inner.hits,
            misses: inner.misses,
            size: inner.entries.len(),
            maxsize: inner.maxsize,
        }
    }
}

/// Canonical cache key: JSON with object keys sorted at every level, so
/// structurally equal arguments always map to the same entry.
pub fn canonical_key(value: &serde_json::Value) -> String {
    fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(map) => {
                let sorted: std::collections::BTreeMap<_, _> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect();
                serde_json::to_value(sorted).unwrap_or_default()
            }
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(canonicalize).collect())
            }
            other => other.clone(),
        }
    }
    canonicalize(value).to_string()
}
