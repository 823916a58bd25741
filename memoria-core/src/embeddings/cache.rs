use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::error::{MemoriaError, Result};

const PREVIEW_BYTES: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    vector: Vec<f32>,
    dims: usize,
    model: String,
    text_preview: String,
    created_at: DateTime<Utc>,
    last_access: DateTime<Utc>,
    access_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MostAccessedEntry {
    pub text_preview: String,
    pub access_count: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub total_entries: usize,
    pub by_model: HashMap<String, usize>,
    pub total_size_bytes: usize,
    pub most_accessed: Vec<MostAccessedEntry>,
}

/// Content-addressed `(text, model) -> vector` cache (spec §4.2). Key is
/// `sha256(model || ":" || prefixed_text)`. Optional, process-owned: the
/// Embedder must function with no cache configured.
pub struct EmbeddingCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    cache_path: Option<PathBuf>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            cache_path: None,
        }
    }

    pub fn with_path(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            cache_path: Some(cache_path.into()),
        }
    }

    /// Load a file-backed cache from disk; an absent file starts empty.
    pub async fn load(cache_path: impl Into<PathBuf>) -> Result<Self> {
        let cache_path = cache_path.into();
        let entries = match tokio::fs::read(&cache_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| MemoriaError::StoreError(format!("cache load: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(MemoriaError::StoreError(format!("cache load: {e}"))),
        };
        Ok(Self {
            entries: Mutex::new(entries),
            cache_path: Some(cache_path),
        })
    }

    pub async fn persist(&self) -> Result<()> {
        let Some(path) = &self.cache_path else {
            return Ok(());
        };
        let entries = self.entries.lock().await;
        let bytes = serde_json::to_vec(&*entries)
            .map_err(|e| MemoriaError::StoreError(format!("cache persist: {e}")))?;
        write_atomic(path, &bytes).await
    }

    pub async fn get(&self, text: &str, model: &str) -> Option<Vec<f32>> {
        let key = cache_key(text, model);
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(&key)?;
        entry.last_access = Utc::now();
        entry.access_count += 1;
        Some(entry.vector.clone())
    }

    pub async fn set(&self, text: &str, model: &str, vector: Vec<f32>) {
        let key = cache_key(text, model);
        let now = Utc::now();
        let dims = vector.len();
        let entry = CacheEntry {
            vector,
            dims,
            model: model.to_string(),
            text_preview: preview(text),
            created_at: now,
            last_access: now,
            access_count: 0,
        };
        self.entries.lock().await.insert(key, entry);
    }

    pub async fn delete(&self, text: &str, model: &str) {
        let key = cache_key(text, model);
        self.entries.lock().await.remove(&key);
    }

    /// Remove every entry, or only those for `model` if given.
    pub async fn clear(&self, model: Option<&str>) {
        let mut entries = self.entries.lock().await;
        match model {
            Some(model) => entries.retain(|_, e| e.model != model),
            None => entries.clear(),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        let mut by_model: HashMap<String, usize> = HashMap::new();
        let mut total_size_bytes = 0usize;
        for entry in entries.values() {
            *by_model.entry(entry.model.clone()).or_insert(0) += 1;
            total_size_bytes += entry.dims * std::mem::size_of::<f32>();
        }

        let mut ranked: Vec<&CacheEntry> = entries.values().collect();
        ranked.sort_by(|a, b| b.access_count.cmp(&a.access_count));
        let most_accessed = ranked
            .into_iter()
            .take(5)
            .map(|e| MostAccessedEntry {
                text_preview: e.text_preview.clone(),
                access_count: e.access_count,
            })
            .collect();

        CacheStats {
            total_entries: entries.len(),
            by_model,
            total_size_bytes,
            most_accessed,
        }
    }

    /// Drop entries older than `max_age` or, if the cache exceeds
    /// `max_entries`, the least-recently-accessed overflow.
    pub async fn prune(&self, max_age: chrono::Duration, max_entries: usize) -> usize {
        let mut entries = self.entries.lock().await;
        let cutoff = Utc::now() - max_age;
        let before = entries.len();
        entries.retain(|_, e| e.last_access >= cutoff);

        if entries.len() > max_entries {
            let mut by_access: Vec<(String, DateTime<Utc>)> = entries
                .iter()
                .map(|(k, e)| (k.clone(), e.last_access))
                .collect();
            by_access.sort_by_key(|(_, last_access)| *last_access);
            let overflow = entries.len() - max_entries;
            for (key, _) in by_access.into_iter().take(overflow) {
                entries.remove(&key);
            }
        }

        before - entries.len()
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}

fn cache_key(text: &str, model: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update(b":");
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn preview(text: &str) -> String {
    if text.len() <= PREVIEW_BYTES {
        return text.to_string();
    }
    let mut end = PREVIEW_BYTES;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| MemoriaError::StoreError(format!("cache dir: {e}")))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| MemoriaError::StoreError(format!("cache write: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let cache = EmbeddingCache::new();
        cache.set("hello", "model-a", vec![1.0, 2.0, 3.0]).await;
        let got = cache.get("hello", "model-a").await;
        assert_eq!(got, Some(vec![1.0, 2.0, 3.0]));
    }

    #[tokio::test]
    async fn different_models_are_distinct_keys() {
        let cache = EmbeddingCache::new();
        cache.set("hello", "model-a", vec![1.0]).await;
        assert_eq!(cache.get("hello", "model-b").await, None);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = EmbeddingCache::new();
        cache.set("hello", "model-a", vec![1.0]).await;
        cache.delete("hello", "model-a").await;
        assert_eq!(cache.get("hello", "model-a").await, None);
    }

    #[tokio::test]
    async fn clear_with_model_only_removes_that_model() {
        let cache = EmbeddingCache::new();
        cache.set("a", "model-a", vec![1.0]).await;
        cache.set("b", "model-b", vec![2.0]).await;
        cache.clear(Some("model-a")).await;
        assert_eq!(cache.get("a", "model-a").await, None);
        assert_eq!(cache.get("b", "model-b").await, Some(vec![2.0]));
    }

    #[tokio::test]
    async fn stats_report_counts_and_most_accessed() {
        let cache = EmbeddingCache::new();
        cache.set("a", "model-a", vec![1.0, 2.0]).await;
        cache.set("b", "model-a", vec![1.0, 2.0]).await;
        cache.get("a", "model-a").await;
        cache.get("a", "model-a").await;

        let stats = cache.stats().await;
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.by_model.get("model-a"), Some(&2));
        assert_eq!(stats.most_accessed[0].access_count, 2);
    }

    #[tokio::test]
    async fn prune_drops_entries_older_than_max_age() {
        let cache = EmbeddingCache::new();
        cache.set("a", "model-a", vec![1.0]).await;
        {
            let mut entries = cache.entries.lock().await;
            for entry in entries.values_mut() {
                entry.last_access = Utc::now() - chrono::Duration::days(10);
            }
        }
        let pruned = cache.prune(chrono::Duration::days(1), 1000).await;
        assert_eq!(pruned, 1);
        assert_eq!(cache.get("a", "model-a").await, None);
    }

    #[tokio::test]
    async fn load_persist_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = EmbeddingCache::load(&path).await.unwrap();
        cache.set("hello", "model-a", vec![1.0, 2.0]).await;
        cache.persist().await.unwrap();

        let reloaded = EmbeddingCache::load(&path).await.unwrap();
        assert_eq!(reloaded.get("hello", "model-a").await, Some(vec![1.0, 2.0]));
    }
}
