use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::chunking::TextChunker;
use crate::config::{ChunkingConfig, ConsolidationConfig, RecallConfig};
use crate::consolidation::ConsolidationEngine;
use crate::embeddings::{Embedder, EmbeddingKind};
use crate::error::Result;
use crate::models::{chunk_point_id, Memory, MemoryKind, Metadata, StoredPoint};
use crate::vector_store::{Filter, FilterValue, UpsertItem, VectorStoreAdapter};
use crate::working_memory::WorkingMemory;

/// One recalled memory plus the similarity score that surfaced it.
#[derive(Debug, Clone)]
pub struct RecallHit {
    pub memory: Memory,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct RecallQuery {
    pub query: Option<String>,
    pub kinds: Option<Vec<MemoryKind>>,
    pub limit: Option<usize>,
    pub min_score: Option<f32>,
    pub filters: Filter,
    pub text_match: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Relevance,
    Date,
    Importance,
    AccessCount,
}

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub kind: Option<MemoryKind>,
    pub tags: Vec<String>,
    pub importance_min: Option<f32>,
    pub project: Option<String>,
    pub limit: usize,
    pub sort_by: Option<SortBy>,
    pub text_match: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryUpdate {
    pub content: Option<String>,
    pub tags: Option<HashSet<String>>,
    pub importance: Option<f32>,
    pub metadata: Option<Metadata>,
}

/// Owns the memory ⇄ point-set mapping: only this manager creates, updates,
/// or deletes points (spec §4.4). Holds its own clones of the shared adapter
/// and embedder rather than a separate owning struct (spec §5 ambient note).
pub struct MemoryLifecycleManager {
    vector_store: Arc<dyn VectorStoreAdapter>,
    embedder: Arc<dyn Embedder>,
    working_memory: Arc<WorkingMemory>,
    consolidation: Arc<ConsolidationEngine>,
    chunker: TextChunker,
    recall_config: RecallConfig,
    consolidation_config: ConsolidationConfig,
}

impl MemoryLifecycleManager {
    pub fn new(
        vector_store: Arc<dyn VectorStoreAdapter>,
        embedder: Arc<dyn Embedder>,
        working_memory: Arc<WorkingMemory>,
        consolidation: Arc<ConsolidationEngine>,
        chunking_config: ChunkingConfig,
        recall_config: RecallConfig,
        consolidation_config: ConsolidationConfig,
    ) -> Self {
        Self {
            vector_store,
            embedder,
            working_memory,
            consolidation,
            chunker: TextChunker::new(chunking_config),
            recall_config,
            consolidation_config,
        }
    }

    pub async fn store(&self, memory: Memory) -> Result<Memory> {
        memory.validate()?;
        let collection = memory.kind().collection_name();
        let base_payload = memory.to_base_payload();

        if self.chunker.needs_chunking(&memory.content) {
            let chunks = self.chunker.chunk(&memory.content);
            let mut items = Vec::with_capacity(chunks.len());
            for chunk in &chunks {
                let embedding = self.embedder.embed(&chunk.text, EmbeddingKind::Document).await?;
                let mut payload = base_payload.clone();
                payload.insert("is_chunk".into(), json!(true));
                payload.insert("parent_id".into(), json!(memory.id.to_string()));
                payload.insert("chunk_index".into(), json!(chunk.index));
                payload.insert("chunk_count".into(), json!(chunks.len()));
                payload.insert("full_content".into(), json!(memory.content));
                payload.insert("content".into(), json!(chunk.text));
                items.push(UpsertItem {
                    id: Some(chunk_point_id(memory.id, chunk.index)),
                    vector: embedding.vector,
                    payload,
                });
            }
            self.vector_store.upsert_batch(collection, items).await?;
        } else {
            let embedding = self.embedder.embed(&memory.content, EmbeddingKind::Document).await?;
            let mut payload = base_payload;
            payload.insert("is_chunk".into(), json!(false));
            payload.insert("parent_id".into(), json!(memory.id.to_string()));
            self.vector_store
                .upsert(collection, embedding.vector, payload, Some(memory.id))
                .await?;
        }

        self.working_memory.put(
            memory.id,
            json!({"id": memory.id, "kind": memory.kind().to_string(), "content_preview": preview(&memory.content)}),
        );
        self.working_memory.add_to_history(
            "store",
            json!({"memory_id": memory.id, "kind": memory.kind().to_string()}),
        );

        Ok(memory)
    }

    pub async fn recall(&self, query: RecallQuery) -> Result<Vec<RecallHit>> {
        let kinds = query.kinds.unwrap_or_else(|| MemoryKind::ALL.to_vec());
        let limit = query.limit.unwrap_or(self.recall_config.default_recall_limit);
        let min_score = query.min_score.unwrap_or(self.recall_config.min_similarity_score);

        let mut filters = query.filters;
        if let Some(text_match) = query.text_match {
            filters.insert("__text_match".into(), FilterValue::TextMatch(text_match));
        }

        let mut by_logical_id: HashMap<Uuid, (MemoryKind, StoredPoint, f32)> = HashMap::new();
        for kind in &kinds {
            let query_text = query.query.as_deref().unwrap_or_default();
            let embedding = self.embedder.embed(query_text, EmbeddingKind::Query).await?;
            let over_fetch = limit.saturating_mul(3).max(limit);
            let results = self
                .vector_store
                .search(
                    kind.collection_name(),
                    embedding.vector,
                    over_fetch,
                    Some(min_score),
                    Some(filters.clone()),
                    false,
                )
                .await?;

            for scored in results {
                let logical_id = scored.point.logical_id();
                let entry = by_logical_id.entry(logical_id).or_insert_with(|| {
                    (*kind, scored.point.clone(), scored.score)
                });
                if scored.score > entry.2 {
                    *entry = (*kind, scored.point, scored.score);
                }
            }
        }

        let mut hits: Vec<RecallHit> = by_logical_id
            .into_values()
            .filter_map(|(kind, point, score)| {
                Memory::from_payload(kind, &point.payload).ok().map(|memory| RecallHit { memory, score })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);

        for hit in &hits {
            self.enqueue_boost(hit.memory.kind(), hit.memory.id);
        }

        Ok(hits)
    }

    pub async fn search(&self, query: SearchQuery) -> Result<Vec<RecallHit>> {
        if let Some(q) = &query.query {
            let mut filters = Filter::new();
            if !query.tags.is_empty() {
                filters.insert(
                    "tags".into(),
                    FilterValue::AnyOf(query.tags.iter().map(|t| json!(t)).collect()),
                );
            }
            if let Some(min) = query.importance_min {
                filters.insert(
                    "importance".into(),
                    FilterValue::Range { gte: Some(min as f64), lte: None, gt: None, lt: None },
                );
            }
            if let Some(project) = &query.project {
                filters.insert("project".into(), FilterValue::Eq(json!(project)));
            }

            return self
                .recall(RecallQuery {
                    query: Some(q.clone()),
                    kinds: query.kind.map(|k| vec![k]),
                    limit: Some(query.limit),
                    min_score: None,
                    filters,
                    text_match: query.text_match.clone().or_else(|| Some(q.clone())),
                })
                .await;
        }

        let kinds = query.kind.map(|k| vec![k]).unwrap_or_else(|| MemoryKind::ALL.to_vec());
        let mut filters = Filter::new();
        if !query.tags.is_empty() {
            filters.insert(
                "tags".into(),
                FilterValue::AnyOf(query.tags.iter().map(|t| json!(t)).collect()),
            );
        }
        if let Some(min) = query.importance_min {
            filters.insert(
                "importance".into(),
                FilterValue::Range { gte: Some(min as f64), lte: None, gt: None, lt: None },
            );
        }
        if let Some(project) = &query.project {
            filters.insert("project".into(), FilterValue::Eq(json!(project)));
        }
        if let Some(text_match) = &query.text_match {
            filters.insert("__text_match".into(), FilterValue::TextMatch(text_match.clone()));
        }

        let mut by_logical_id: HashMap<Uuid, (MemoryKind, StoredPoint)> = HashMap::new();
        for kind in &kinds {
            let mut offset = None;
            loop {
                let (points, next_offset) = self
                    .vector_store
                    .scroll(kind.collection_name(), 200, offset, Some(filters.clone()), false)
                    .await?;
                if points.is_empty() {
                    break;
                }
                for point in points {
                    let logical_id = point.logical_id();
                    if point.is_representative() || !by_logical_id.contains_key(&logical_id) {
                        by_logical_id.insert(logical_id, (*kind, point));
                    }
                }
                match next_offset {
                    Some(o) => offset = Some(o),
                    None => break,
                }
            }
        }

        let mut hits: Vec<RecallHit> = by_logical_id
            .into_values()
            .filter_map(|(kind, point)| {
                Memory::from_payload(kind, &point.payload).ok().map(|memory| RecallHit { memory, score: 0.0 })
            })
            .collect();

        match query.sort_by.unwrap_or(SortBy::Date) {
            SortBy::Relevance | SortBy::Date => {
                hits.sort_by(|a, b| b.memory.created_at.cmp(&a.memory.created_at))
            }
            SortBy::Importance => {
                hits.sort_by(|a, b| b.memory.importance.partial_cmp(&a.memory.importance).unwrap_or(std::cmp::Ordering::Equal))
            }
            SortBy::AccessCount => hits.sort_by(|a, b| b.memory.access_count.cmp(&a.memory.access_count)),
        }
        hits.truncate(query.limit);
        Ok(hits)
    }

    pub async fn get(&self, memory_id: Uuid, kind: MemoryKind) -> Result<Option<Memory>> {
        if let Some(cached) = self.working_memory.get(memory_id) {
            if let Some(content_preview) = cached.data.get("content_preview") {
                tracing::trace!(%memory_id, ?content_preview, "working memory hit, falling through to full fetch");
            }
        }

        let collection = kind.collection_name();
        let direct = self.vector_store.get(collection, &[memory_id], false).await?;
        if let Some(point) = direct.into_iter().next() {
            return Ok(Some(Memory::from_payload(kind, &point.payload)?));
        }

        let chunk_0 = chunk_point_id(memory_id, 0);
        let via_chunk = self.vector_store.get(collection, &[chunk_0], false).await?;
        match via_chunk.into_iter().next() {
            Some(point) => Ok(Some(Memory::from_payload(kind, &point.payload)?)),
            None => Ok(None),
        }
    }

    pub async fn update(&self, memory_id: Uuid, kind: MemoryKind, update: MemoryUpdate) -> Result<Option<Memory>> {
        let Some(mut current) = self.get(memory_id, kind).await? else {
            return Ok(None);
        };
        let collection = kind.collection_name();

        if let Some(tags) = update.tags {
            current.tags = tags;
        }
        if let Some(importance) = update.importance {
            current.importance = importance;
        }
        if let Some(metadata) = update.metadata {
            current.metadata = metadata;
        }

        if let Some(content) = update.content {
            let point_set = self.point_set(collection, memory_id).await?;
            let ids: Vec<Uuid> = point_set.iter().map(|p| p.id).collect();
            if !ids.is_empty() {
                self.vector_store.delete(collection, Some(ids), None).await?;
            }

            current.content = content;
            current.updated_at = chrono::Utc::now();
            let created_at = current.created_at;
            let base_payload = current.to_base_payload();

            if self.chunker.needs_chunking(&current.content) {
                let chunks = self.chunker.chunk(&current.content);
                let mut items = Vec::with_capacity(chunks.len());
                for chunk in &chunks {
                    let embedding = self.embedder.embed(&chunk.text, EmbeddingKind::Document).await?;
                    let mut payload = base_payload.clone();
                    payload.insert("is_chunk".into(), json!(true));
                    payload.insert("parent_id".into(), json!(memory_id.to_string()));
                    payload.insert("chunk_index".into(), json!(chunk.index));
                    payload.insert("chunk_count".into(), json!(chunks.len()));
                    payload.insert("full_content".into(), json!(current.content));
                    payload.insert("content".into(), json!(chunk.text));
                    payload.insert("created_at".into(), json!(created_at.to_rfc3339()));
                    items.push(UpsertItem {
                        id: Some(chunk_point_id(memory_id, chunk.index)),
                        vector: embedding.vector,
                        payload,
                    });
                }
                self.vector_store.upsert_batch(collection, items).await?;
            } else {
                let embedding = self.embedder.embed(&current.content, EmbeddingKind::Document).await?;
                let mut payload = base_payload;
                payload.insert("is_chunk".into(), json!(false));
                payload.insert("parent_id".into(), json!(memory_id.to_string()));
                payload.insert("created_at".into(), json!(created_at.to_rfc3339()));
                self.vector_store
                    .upsert(collection, embedding.vector, payload, Some(memory_id))
                    .await?;
            }
        } else {
            current.updated_at = chrono::Utc::now();
            let payload = current.to_base_payload();
            let point_set = self.point_set(collection, memory_id).await?;
            for point in point_set {
                self.vector_store
                    .update_payload(collection, point.id, payload.clone(), true)
                    .await?;
            }
        }

        self.working_memory.invalidate(memory_id);
        self.working_memory.add_to_history("update", json!({"memory_id": memory_id}));

        self.get(memory_id, kind).await
    }

    pub async fn delete(&self, ids: &[Uuid], kind: MemoryKind, filters: Option<Filter>) -> Result<u64> {
        let collection = kind.collection_name();
        let mut count = 0u64;

        for &id in ids {
            let point_set = self.point_set(collection, id).await?;
            if point_set.is_empty() {
                continue;
            }
            let point_ids: Vec<Uuid> = point_set.iter().map(|p| p.id).collect();
            self.vector_store.delete(collection, Some(point_ids), None).await?;
            self.working_memory.invalidate(id);
            count += 1;
        }

        if let Some(filters) = filters {
            count += self.vector_store.delete(collection, None, Some(filters)).await?;
        }

        self.working_memory.add_to_history("delete", json!({"kind": kind.to_string(), "count": count}));
        Ok(count)
    }

    /// The direct-id point plus every point whose `parent_id == memory_id`.
    async fn point_set(&self, collection: &str, memory_id: Uuid) -> Result<Vec<StoredPoint>> {
        let mut points = self.vector_store.get(collection, &[memory_id], false).await?;

        let mut filter = Filter::new();
        filter.insert("parent_id".into(), FilterValue::Eq(json!(memory_id.to_string())));
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

        let mut seen = HashSet::new();
        points.retain(|p| seen.insert(p.id));

        let has_non_chunk_at_id = points.iter().any(|p| p.id == memory_id && !p.is_chunk());
        let has_chunks = points.iter().any(|p| p.is_chunk() && p.parent_id() == Some(memory_id));
        if has_non_chunk_at_id && has_chunks {
            return Err(crate::error::MemoriaError::ChunkInvariantViolation {
                memory_id,
                detail: "point set contains both a non-chunk point at id and chunk points with the same parent_id".into(),
            });
        }

        Ok(points)
    }

    fn enqueue_boost(&self, kind: MemoryKind, memory_id: Uuid) {
        let consolidation = self.consolidation.clone();
        let collection = kind.collection_name().to_string();
        let boost_amount = self.consolidation_config.boost_amount;
        let max_importance = self.consolidation_config.max_importance;
        tokio::spawn(async move {
            if let Err(e) = consolidation
                .boost_on_access(&collection, memory_id, boost_amount, max_importance)
                .await
            {
                tracing::warn!(%memory_id, error = %e, "importance boost on recall failed");
            }
        });
    }
}

fn preview(content: &str) -> String {
    if content.len() <= 200 {
        content.to_string()
    } else {
        let mut end = 200;
        while !content.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &content[..end])
    }
}
