use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::ConsolidationConfig;
use crate::error::Result;
use crate::models::{chunk_point_id, StoredPoint};
use crate::vector_store::{Filter, FilterValue, VectorStoreAdapter};

#[derive(Debug, Clone)]
pub struct ConsolidationResult {
    pub merged_count: u64,
    pub total_processed: u64,
    pub duration: StdDuration,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct ForgettingResult {
    pub forgotten_count: u64,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct DecayResult {
    pub updated_count: u64,
    pub dry_run: bool,
}

/// Merges near-duplicate memories, ages out stale ones, decays importance,
/// and boosts importance on access (spec §4.5). Owns its own vector-store
/// adapter clone, same as the Lifecycle Manager (spec §5 ambient note).
pub struct ConsolidationEngine {
    vector_store: Arc<dyn VectorStoreAdapter>,
    config: ConsolidationConfig,
}

impl ConsolidationEngine {
    pub fn new(vector_store: Arc<dyn VectorStoreAdapter>, config: ConsolidationConfig) -> Self {
        Self { vector_store, config }
    }

    pub async fn consolidate(
        &self,
        collection: &str,
        similarity_threshold: f32,
        max_cluster_size: usize,
        dry_run: bool,
    ) -> Result<ConsolidationResult> {
        let start = Instant::now();
        let representatives = self.scroll_representatives(collection).await?;

        let mut processed: HashSet<Uuid> = HashSet::new();
        let mut merged_count = 0u64;
        let mut total_processed = 0u64;

        for representative in &representatives {
            let logical_id = representative.logical_id();
            if processed.contains(&logical_id) {
                continue;
            }
            total_processed += 1;

            let Some(vector) = representative.vector.clone() else {
                processed.insert(logical_id);
                continue;
            };

            let similar = self
                .vector_store
                .search(collection, vector, max_cluster_size.max(1) + 1, Some(similarity_threshold), None, false)
                .await?;

            let duplicates: Vec<StoredPoint> = similar
                .into_iter()
                .map(|s| s.point)
                .filter(|p| p.id != representative.id)
                .filter(|p| p.is_representative())
                .filter(|p| !processed.contains(&p.logical_id()))
                .filter(|p| p.logical_id() != logical_id)
                .take(max_cluster_size.saturating_sub(1))
                .collect();

            if duplicates.is_empty() {
                processed.insert(logical_id);
                continue;
            }

            if !dry_run {
                let merged_payload = merge_payloads(representative, &duplicates);
                self.vector_store
                    .update_payload(collection, representative.id, merged_payload, false)
                    .await?;

                for dup in &duplicates {
                    let point_set = self.point_set(collection, dup.logical_id()).await?;
                    let ids: Vec<Uuid> = point_set.iter().map(|p| p.id).collect();
                    if !ids.is_empty() {
                        self.vector_store.delete(collection, Some(ids), None).await?;
                    }
                }
            }

            merged_count += duplicates.len() as u64;
            processed.insert(logical_id);
            for dup in &duplicates {
                processed.insert(dup.logical_id());
            }
        }

        Ok(ConsolidationResult {
            merged_count,
            total_processed,
            duration: start.elapsed(),
            dry_run,
        })
    }

    pub async fn apply_forgetting(
        &self,
        collection: &str,
        max_age_days: i64,
        min_importance: f32,
        min_access_count: i64,
        dry_run: bool,
    ) -> Result<ForgettingResult> {
        let representatives = self.scroll_representatives(collection).await?;
        let now = Utc::now();

        let mut candidates: HashSet<Uuid> = HashSet::new();
        for point in &representatives {
            let last_touch = payload_time(&point.payload, "accessed_at")
                .or_else(|| payload_time(&point.payload, "created_at"))
                .unwrap_or(now);
            let importance = payload_f32(&point.payload, "importance").unwrap_or(0.5);
            let access_count = payload_u64(&point.payload, "access_count").unwrap_or(0);

            let stale = (now - last_touch).num_days() > max_age_days;
            if stale && importance < min_importance && (access_count as i64) < min_access_count {
                candidates.insert(point.logical_id());
            }
        }

        if !dry_run {
            for logical_id in &candidates {
                let mut filter = Filter::new();
                filter.insert("parent_id".into(), FilterValue::Eq(json!(logical_id.to_string())));
                self.vector_store.delete(collection, None, Some(filter)).await?;
                self.vector_store.delete(collection, Some(vec![*logical_id]), None).await?;
            }
        }

        Ok(ForgettingResult {
            forgotten_count: candidates.len() as u64,
            dry_run,
        })
    }

    pub async fn decay_importance(
        &self,
        collection: &str,
        decay_rate: f64,
        min_days_since_access: i64,
        dry_run: bool,
    ) -> Result<DecayResult> {
        let representatives = self.scroll_representatives(collection).await?;
        let now = Utc::now();
        let mut updated_count = 0u64;

        for point in &representatives {
            let accessed_at = payload_time(&point.payload, "accessed_at").unwrap_or(now);
            let days_since = (now - accessed_at).num_days();
            if days_since < min_days_since_access {
                continue;
            }

            let current = payload_f32(&point.payload, "importance").unwrap_or(0.5) as f64;
            let new_importance = (current * decay_rate.powi(days_since as i32)).max(0.1);
            if (new_importance - current).abs() <= 0.01 {
                continue;
            }

            updated_count += 1;
            if !dry_run {
                let mut payload = HashMap::new();
                payload.insert("importance".into(), json!(new_importance));
                self.vector_store
                    .update_payload(collection, point.id, payload, true)
                    .await?;
            }
        }

        Ok(DecayResult { updated_count, dry_run })
    }

    /// Fetch the representative point for `memory_id` (direct id, falling
    /// back to the deterministic chunk-0 id), bump its importance/access
    /// count/accessed_at, and propagate the same triple to every sibling
    /// chunk so Invariant C1 stays stable under boosting.
    pub async fn boost_on_access(&self, collection: &str, memory_id: Uuid, boost: f32, max: f32) -> Result<f32> {
        let Some(representative) = self.fetch_representative(collection, memory_id).await? else {
            return Ok(0.0);
        };

        let current = payload_f32(&representative.payload, "importance").unwrap_or(0.5);
        let access_count = payload_u64(&representative.payload, "access_count").unwrap_or(0);
        let new_importance = (current + boost).min(max);
        let now = Utc::now();

        self.apply_boost_payload(collection, &representative, new_importance, access_count + 1, now)
            .await?;

        Ok(new_importance)
    }

    /// Latency optimization over repeated `boost_on_access` calls; semantics
    /// are identical to calling `boost_on_access` once per item.
    pub async fn boost_on_access_batch(&self, items: &[(String, Uuid)], boost: f32, max: f32) -> Result<()> {
        let mut by_collection: HashMap<&str, Vec<Uuid>> = HashMap::new();
        for (collection, memory_id) in items {
            by_collection.entry(collection.as_str()).or_default().push(*memory_id);
        }

        for (collection, memory_ids) in by_collection {
            let direct = self.vector_store.get(collection, &memory_ids, false).await?;
            let mut found: HashMap<Uuid, StoredPoint> =
                direct.into_iter().map(|p| (p.id, p)).collect();

            for memory_id in &memory_ids {
                if found.contains_key(memory_id) {
                    continue;
                }
                if let Some(rep) = self.fetch_representative(collection, *memory_id).await? {
                    found.insert(*memory_id, rep);
                }
            }

            for memory_id in &memory_ids {
                let Some(representative) = found.get(memory_id) else { continue };
                let current = payload_f32(&representative.payload, "importance").unwrap_or(0.5);
                let access_count = payload_u64(&representative.payload, "access_count").unwrap_or(0);
                let new_importance = (current + boost).min(max);
                let now = Utc::now();
                self.apply_boost_payload(collection, representative, new_importance, access_count + 1, now)
                    .await?;
            }
        }

        Ok(())
    }

    async fn apply_boost_payload(
        &self,
        collection: &str,
        representative: &StoredPoint,
        new_importance: f32,
        new_access_count: u64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut payload: HashMap<String, Value> = HashMap::new();
        payload.insert("importance".into(), json!(new_importance));
        payload.insert("access_count".into(), json!(new_access_count));
        payload.insert("accessed_at".into(), json!(now.to_rfc3339()));

        self.vector_store
            .update_payload(collection, representative.id, payload.clone(), true)
            .await?;

        if representative.is_chunk() {
            let logical_id = representative.logical_id();
            let siblings = self.point_set(collection, logical_id).await?;
            for sibling in siblings.iter().filter(|s| s.id != representative.id) {
                self.vector_store
                    .update_payload(collection, sibling.id, payload.clone(), true)
                    .await?;
            }
        }

        Ok(())
    }

    async fn fetch_representative(&self, collection: &str, memory_id: Uuid) -> Result<Option<StoredPoint>> {
        let direct = self.vector_store.get(collection, &[memory_id], false).await?;
        if let Some(point) = direct.into_iter().next() {
            return Ok(Some(point));
        }
        let chunk_0 = chunk_point_id(memory_id, 0);
        let via_chunk = self.vector_store.get(collection, &[chunk_0], false).await?;
        Ok(via_chunk.into_iter().next())
    }

    async fn scroll_representatives(&self, collection: &str) -> Result<Vec<StoredPoint>> {
        let mut points = Vec::new();
        let mut offset = None;
        loop {
            let (page, next_offset) = self
                .vector_store
                .scroll(collection, 200, offset, None, true)
                .await?;
            if page.is_empty() {
                break;
            }
            points.extend(page.into_iter().filter(|p| p.is_representative()));
            match next_offset {
                Some(o) => offset = Some(o),
                None => break,
            }
        }
        Ok(points)
    }

    async fn point_set(&self, collection: &str, logical_id: Uuid) -> Result<Vec<StoredPoint>> {
        let mut filter = Filter::new();
        filter.insert("parent_id".into(), FilterValue::Eq(json!(logical_id.to_string())));

        let mut points = Vec::new();
        let mut offset = None;
        loop {
            let (page, next_offset) = self
                .vector_store
                .scroll(collection, 200, offset, Some(filter.clone()), false)
                .await?;
            if page.is_empty() {
                break;
            }
            points.extend(page);
            match next_offset {
                Some(o) => offset = Some(o),
                None => break,
            }
        }
        Ok(points)
    }
}

fn merge_payloads(representative: &StoredPoint, duplicates: &[StoredPoint]) -> HashMap<String, Value> {
    let mut payload = representative.payload.clone();

    let mut tags: HashSet<String> = payload
        .get("tags")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let mut importance = payload_f32(&payload, "importance").unwrap_or(0.5);
    let mut access_count = payload_u64(&payload, "access_count").unwrap_or(0);
    let mut merged_from: Vec<String> = payload
        .get("merged_from")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    for dup in duplicates {
        if let Some(dup_tags) = dup.payload.get("tags").and_then(|v| v.as_array()) {
            tags.extend(dup_tags.iter().filter_map(|v| v.as_str().map(str::to_string)));
        }
        importance = importance.max(payload_f32(&dup.payload, "importance").unwrap_or(0.5));
        access_count += payload_u64(&dup.payload, "access_count").unwrap_or(0);
        merged_from.push(dup.logical_id().to_string());
    }

    payload.insert(
        "tags".into(),
        Value::Array(tags.into_iter().map(Value::String).collect()),
    );
    payload.insert("importance".into(), json!(importance));
    payload.insert("access_count".into(), json!(access_count));
    payload.insert(
        "merged_from".into(),
        Value::Array(merged_from.into_iter().map(Value::String).collect()),
    );
    payload.insert("merged_at".into(), json!(Utc::now().to_rfc3339()));

    payload
}

fn payload_f32(payload: &HashMap<String, Value>, key: &str) -> Option<f32> {
    payload.get(key).and_then(|v| v.as_f64()).map(|v| v as f32)
}

fn payload_u64(payload: &HashMap<String, Value>, key: &str) -> Option<u64> {
    payload.get(key).and_then(|v| v.as_u64())
}

fn payload_time(payload: &HashMap<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
