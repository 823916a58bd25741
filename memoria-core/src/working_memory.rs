use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::Mutex;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lru::LruCache;
use serde_json::Value;
use uuid::Uuid;

/// A cached, minimal representation of a recently-touched memory (spec §4.7).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Value,
    pub cached_at: DateTime<Utc>,
    pub access_count: u64,
}

/// `key -> {value, last_touched, ttl}`. Reading a non-expired entry refreshes
/// `last_touched`; reading an expired one removes it.
#[derive(Debug, Clone)]
struct ContextEntry {
    value: Value,
    last_touched: DateTime<Utc>,
    ttl: Option<ChronoDuration>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HistoryEntry {
    pub action: String,
    pub ts: DateTime<Utc>,
    pub details: Value,
}

struct Inner {
    cache: LruCache<Uuid, CacheEntry>,
    context: HashMap<String, ContextEntry>,
    history: VecDeque<HistoryEntry>,
}

/// Bounded LRU cache of recent memories, a TTL'd key/value scratchpad, and a
/// bounded action history (spec §4.7). Every operation is O(1) under a single
/// internal mutex.
pub struct WorkingMemory {
    history_max: usize,
    inner: Mutex<Inner>,
}

impl WorkingMemory {
    pub fn new(max_size: usize, history_max: usize) -> Self {
        let capacity = NonZeroUsize::new(max_size.max(1)).expect("max_size.max(1) is never zero");
        Self {
            history_max,
            inner: Mutex::new(Inner {
                cache: LruCache::new(capacity),
                context: HashMap::new(),
                history: VecDeque::new(),
            }),
        }
    }

    /// Insert or refresh `memory_id`, evicting the least-recently-used entry
    /// once over capacity.
    pub fn put(&self, memory_id: Uuid, data: Value) {
        let mut inner = self.inner.lock().expect("working memory mutex poisoned");
        let access_count = inner.cache.peek(&memory_id).map(|e| e.access_count).unwrap_or(0);
        inner.cache.put(
            memory_id,
            CacheEntry {
                data,
                cached_at: Utc::now(),
                access_count,
            },
        );
    }

    /// Look up `memory_id`, bumping `access_count` and marking it
    /// most-recently-used on hit.
    pub fn get(&self, memory_id: Uuid) -> Option<CacheEntry> {
        let mut inner = self.inner.lock().expect("working memory mutex poisoned");
        let entry = inner.cache.get_mut(&memory_id)?;
        entry.access_count += 1;
        Some(entry.clone())
    }

    pub fn invalidate(&self, memory_id: Uuid) {
        let mut inner = self.inner.lock().expect("working memory mutex poisoned");
        inner.cache.pop(&memory_id);
    }

    pub fn cache_len(&self) -> usize {
        self.inner.lock().expect("working memory mutex poisoned").cache.len()
    }

    /// Store a context value, optionally with a TTL, resetting its clock.
    pub fn set_context(&self, key: impl Into<String>, value: Value, ttl: Option<ChronoDuration>) {
        let mut inner = self.inner.lock().expect("working memory mutex poisoned");
        inner.context.insert(
            key.into(),
            ContextEntry {
                value,
                last_touched: Utc::now(),
                ttl,
            },
        );
    }

    /// Read a context value. Expired entries (`now > last_touched + ttl`) are
    /// removed and `None` is returned; a live read refreshes `last_touched`.
    pub fn get_context(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock().expect("working memory mutex poisoned");
        let expired = match inner.context.get(key) {
            Some(entry) => match entry.ttl {
                Some(ttl) => Utc::now() > entry.last_touched + ttl,
                None => false,
            },
            None => return None,
        };

        if expired {
            inner.context.remove(key);
            return None;
        }

        let entry = inner.context.get_mut(key).expect("checked present above");
        entry.last_touched = Utc::now();
        Some(entry.value.clone())
    }

    pub fn clear_context(&self, key: &str) {
        let mut inner = self.inner.lock().expect("working memory mutex poisoned");
        inner.context.remove(key);
    }

    /// Append an action to the bounded history, dropping the oldest entry
    /// once length exceeds `history_max`.
    pub fn add_to_history(&self, action: impl Into<String>, details: Value) {
        let mut inner = self.inner.lock().expect("working memory mutex poisoned");
        inner.history.push_back(HistoryEntry {
            action: action.into(),
            ts: Utc::now(),
            details,
        });
        while inner.history.len() > self.history_max {
            inner.history.pop_front();
        }
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner
            .lock()
            .expect("working memory mutex poisoned")
            .history
            .iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(n: u8) -> Uuid {
        Uuid::from_bytes([n; 16])
    }

    #[test]
    fn put_evicts_oldest_beyond_max_size() {
        let wm = WorkingMemory::new(2, 100);
        wm.put(id(1), json!({"n": 1}));
        wm.put(id(2), json!({"n": 2}));
        wm.put(id(3), json!({"n": 3}));
        assert_eq!(wm.cache_len(), 2);
        assert!(wm.get(id(1)).is_none());
        assert!(wm.get(id(2)).is_some());
        assert!(wm.get(id(3)).is_some());
    }

    #[test]
    fn get_moves_entry_to_most_recently_used() {
        let wm = WorkingMemory::new(2, 100);
        wm.put(id(1), json!({"n": 1}));
        wm.put(id(2), json!({"n": 2}));
        wm.get(id(1));
        wm.put(id(3), json!({"n": 3}));
        assert!(wm.get(id(2)).is_none(), "2 should have been evicted as least recently used");
        assert!(wm.get(id(1)).is_some());
        assert!(wm.get(id(3)).is_some());
    }

    #[test]
    fn get_bumps_access_count() {
        let wm = WorkingMemory::new(10, 100);
        wm.put(id(1), json!({"n": 1}));
        let first = wm.get(id(1)).unwrap();
        assert_eq!(first.access_count, 1);
        let second = wm.get(id(1)).unwrap();
        assert_eq!(second.access_count, 2);
    }

    #[test]
    fn context_without_ttl_never_expires() {
        let wm = WorkingMemory::new(10, 100);
        wm.set_context("k", json!("v"), None);
        assert_eq!(wm.get_context("k"), Some(json!("v")));
    }

    #[test]
    fn context_expires_past_ttl() {
        let wm = WorkingMemory::new(10, 100);
        wm.set_context("k", json!("v"), Some(ChronoDuration::milliseconds(-1)));
        assert_eq!(wm.get_context("k"), None);
    }

    #[test]
    fn history_is_bounded() {
        let wm = WorkingMemory::new(10, 3);
        for i in 0..5 {
            wm.add_to_history("store", json!({"i": i}));
        }
        let history = wm.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].details, json!({"i": 2}));
        assert_eq!(history[2].details, json!({"i": 4}));
    }
}
