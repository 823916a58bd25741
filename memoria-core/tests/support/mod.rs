//! In-memory test doubles for the three external collaborators the core
//! depends on (spec §1 "out of scope" collaborators): vector store,
//! relational store, embedder. Grounded on the same trait-based seam the
//! crate itself defines (`VectorStoreAdapter`/`RelationalStoreAdapter`/
//! `Embedder`) — these are plain in-process fakes, not mocks of a specific
//! client library, in the spirit of the pack's own `InMemoryVectorStore`
//! (see `examples/other_examples` for the analogous pattern).

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use memoria_core::{
    BulkRelation, BulkResult, CollectionInfo, CreatedBy, Distance, EmbeddingKind, EmbeddingResult,
    Embedder, Filter, FilterValue, HnswConfig, MemoriaError, NeighborRow, PathResult,
    PayloadIndexKind, Payload, Relation, RelationType, RelationalDirection as Direction,
    RelationalPathStep as PathStep, RelationalStoreAdapter, Result, ScoredPoint, StoredPoint,
    UpsertItem, VectorStoreAdapter,
};
use serde_json::Value;
use uuid::Uuid;

/// A single-process, in-memory stand-in for the external vector database.
/// Cosine similarity is computed directly against stored vectors; filtering
/// mirrors the same `Filter`/`FilterValue` algebra `translate_filter` speaks.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: Mutex<HashMap<String, HashMap<Uuid, StoredPoint>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: point count across one collection, no filter.
    pub fn collection_len(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        (dot / (na * nb)).clamp(-1.0, 1.0)
    }
}

fn matches_filter(payload: &Payload, filter: &Filter) -> bool {
    filter.iter().all(|(field, value)| match value {
        FilterValue::Eq(v) => payload.get(field) == Some(v),
        FilterValue::AnyOf(values) => match payload.get(field) {
            Some(Value::Array(arr)) => arr.iter().any(|item| values.contains(item)),
            Some(other) => values.contains(other),
            None => false,
        },
        FilterValue::Range { gte, lte, gt, lt } => match payload.get(field).and_then(|v| v.as_f64()) {
            Some(n) => {
                gte.is_none_or(|b| n >= b)
                    && lte.is_none_or(|b| n <= b)
                    && gt.is_none_or(|b| n > b)
                    && lt.is_none_or(|b| n < b)
            }
            None => false,
        },
        FilterValue::TextMatch(text) => {
            let content = payload
                .get("content")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_lowercase();
            text.split_whitespace().all(|tok| content.contains(&tok.to_lowercase()))
        }
    })
}

#[async_trait]
impl VectorStoreAdapter for InMemoryVectorStore {
    async fn create_collection(
        &self,
        name: &str,
        _dim: usize,
        _distance: Distance,
        recreate: bool,
        _hnsw: HnswConfig,
    ) -> Result<()> {
        let mut collections = self.collections.lock().unwrap();
        if recreate {
            collections.insert(name.to_string(), HashMap::new());
        } else {
            collections.entry(name.to_string()).or_default();
        }
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.lock().unwrap().contains_key(name))
    }

    async fn get_collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let collections = self.collections.lock().unwrap();
        let points = collections.get(name).cloned().unwrap_or_default();
        Ok(CollectionInfo {
            name: name.to_string(),
            points_count: points.len() as u64,
            dim: points.values().next().and_then(|p| p.vector.as_ref()).map(|v| v.len()).unwrap_or(0),
            distance: Distance::Cosine,
        })
    }

    async fn create_payload_index(&self, _collection: &str, _field: &str, _kind: PayloadIndexKind) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, collection: &str, vector: Vec<f32>, payload: Payload, id: Option<Uuid>) -> Result<Uuid> {
        let ids = self
            .upsert_batch(collection, vec![UpsertItem { id, vector, payload }])
            .await?;
        Ok(ids[0])
    }

    async fn upsert_batch(&self, collection: &str, items: Vec<UpsertItem>) -> Result<Vec<Uuid>> {
        let mut collections = self.collections.lock().unwrap();
        let store = collections.entry(collection.to_string()).or_default();
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let id = item.id.unwrap_or_else(Uuid::new_v4);
            store.insert(
                id,
                StoredPoint {
                    id,
                    payload: item.payload,
                    vector: Some(item.vector),
                },
            );
            ids.push(id);
        }
        Ok(ids)
    }

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
        score_threshold: Option<f32>,
        filter: Option<Filter>,
        with_vectors: bool,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.lock().unwrap();
        let Some(store) = collections.get(collection) else { return Ok(Vec::new()) };

        let mut scored: Vec<ScoredPoint> = store
            .values()
            .filter(|p| filter.as_ref().is_none_or(|f| matches_filter(&p.payload, f)))
            .filter_map(|p| {
                let score = cosine(&vector, p.vector.as_deref().unwrap_or(&[]));
                if score_threshold.is_none_or(|t| score >= t) {
                    let mut point = p.clone();
                    if !with_vectors {
                        point.vector = None;
                    }
                    Some(ScoredPoint { point, score })
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn get(&self, collection: &str, ids: &[Uuid], with_vectors: bool) -> Result<Vec<StoredPoint>> {
        let collections = self.collections.lock().unwrap();
        let Some(store) = collections.get(collection) else { return Ok(Vec::new()) };
        Ok(ids
            .iter()
            .filter_map(|id| store.get(id))
            .map(|p| {
                let mut point = p.clone();
                if !with_vectors {
                    point.vector = None;
                }
                point
            })
            .collect())
    }

    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        offset: Option<Uuid>,
        filter: Option<Filter>,
        with_vectors: bool,
    ) -> Result<(Vec<StoredPoint>, Option<Uuid>)> {
        let collections = self.collections.lock().unwrap();
        let Some(store) = collections.get(collection) else { return Ok((Vec::new(), None)) };

        let mut ids: Vec<Uuid> = store
            .values()
            .filter(|p| filter.as_ref().is_none_or(|f| matches_filter(&p.payload, f)))
            .map(|p| p.id)
            .collect();
        ids.sort();

        let start = match offset {
            Some(o) => ids.iter().position(|id| *id == o).map(|i| i + 1).unwrap_or(ids.len()),
            None => 0,
        };
        let page: Vec<Uuid> = ids.into_iter().skip(start).take(limit).collect();
        let next_offset = page.last().copied().filter(|_| page.len() == limit);

        let points = page
            .into_iter()
            .filter_map(|id| store.get(&id))
            .map(|p| {
                let mut point = p.clone();
                if !with_vectors {
                    point.vector = None;
                }
                point
            })
            .collect();
        Ok((points, next_offset))
    }

    async fn count(&self, collection: &str, filter: Option<Filter>, _exact: bool) -> Result<u64> {
        let collections = self.collections.lock().unwrap();
        let Some(store) = collections.get(collection) else { return Ok(0) };
        Ok(store
            .values()
            .filter(|p| filter.as_ref().is_none_or(|f| matches_filter(&p.payload, f)))
            .count() as u64)
    }

    async fn update_payload(&self, collection: &str, id: Uuid, payload: Payload, merge: bool) -> Result<()> {
        let mut collections = self.collections.lock().unwrap();
        let Some(store) = collections.get_mut(collection) else {
            return Err(MemoriaError::NotFound(format!("collection {collection}")));
        };
        let Some(point) = store.get_mut(&id) else {
            return Err(MemoriaError::NotFound(format!("point {id}")));
        };
        if merge {
            for (k, v) in payload {
                point.payload.insert(k, v);
            }
        } else {
            point.payload = payload;
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: Option<Vec<Uuid>>, filter: Option<Filter>) -> Result<u64> {
        let mut collections = self.collections.lock().unwrap();
        let Some(store) = collections.get_mut(collection) else { return Ok(0) };

        let to_remove: Vec<Uuid> = match (ids, filter) {
            (Some(ids), _) => ids,
            (None, Some(filter)) => store
                .values()
                .filter(|p| matches_filter(&p.payload, &filter))
                .map(|p| p.id)
                .collect(),
            (None, None) => return Err(MemoriaError::InvalidInput("delete requires ids or filter".into())),
        };

        let mut removed = 0u64;
        for id in to_remove {
            if store.remove(&id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Deterministic bag-of-words embedder: each whitespace token is hashed into
/// one of `DIMS` buckets and accumulated, then L2-normalized. Texts sharing
/// vocabulary score a high cosine similarity; disjoint vocabularies land near
/// orthogonal. Good enough to exercise recall/consolidation/suggestion
/// thresholds deterministically without a real model.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in text.to_lowercase().split_whitespace() {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            std::hash::Hash::hash(&token, &mut hasher);
            let bucket = (std::hash::Hasher::finish(&hasher) as usize) % self.dims;
            v[bucket] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str, _kind: EmbeddingKind) -> Result<EmbeddingResult> {
        let vector = self.vectorize(text);
        Ok(EmbeddingResult {
            dims: vector.len(),
            vector,
            model: "hash-test-embedder".to_string(),
            cached: false,
        })
    }

    async fn check_connection(&self) -> Result<bool> {
        Ok(true)
    }

    async fn ensure_model(&self) -> Result<bool> {
        Ok(true)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "hash-test-embedder"
    }
}

/// In-memory stand-in for the relational store: relation rows plus a
/// rejected-suggestions set, with the same unique-triple and self-loop rules
/// `PostgresAdapter` enforces.
#[derive(Default)]
pub struct InMemoryRelationalStore {
    relations: Mutex<Vec<Relation>>,
    rejected: Mutex<HashSet<(Uuid, Uuid, RelationType)>>,
}

impl InMemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationalStoreAdapter for InMemoryRelationalStore {
    async fn run_migrations(&self) -> Result<()> {
        Ok(())
    }

    async fn add_relation(&self, relation: &Relation) -> Result<()> {
        let mut relations = self.relations.lock().unwrap();
        if relations
            .iter()
            .any(|r| r.source_id == relation.source_id && r.target_id == relation.target_id && r.relation_type == relation.relation_type)
        {
            return Err(MemoriaError::DuplicateRelation {
                source_id: relation.source_id,
                target_id: relation.target_id,
                relation_type: relation.relation_type.to_string(),
            });
        }
        relations.push(relation.clone());
        Ok(())
    }

    async fn remove_relation(&self, source_id: Uuid, target_id: Uuid, relation_type: Option<RelationType>) -> Result<u64> {
        let mut relations = self.relations.lock().unwrap();
        let before = relations.len();
        relations.retain(|r| {
            !(r.source_id == source_id
                && r.target_id == target_id
                && relation_type.is_none_or(|t| r.relation_type == t))
        });
        Ok((before - relations.len()) as u64)
    }

    async fn get_relations(&self, memory_id: Uuid, direction: Direction, relation_type: Option<RelationType>) -> Result<Vec<Relation>> {
        let relations = self.relations.lock().unwrap();
        Ok(relations
            .iter()
            .filter(|r| match direction {
                Direction::Out => r.source_id == memory_id,
                Direction::In => r.target_id == memory_id,
                Direction::Both => r.source_id == memory_id || r.target_id == memory_id,
            })
            .filter(|r| relation_type.is_none_or(|t| r.relation_type == t))
            .cloned()
            .collect())
    }

    async fn get_neighbors(&self, memory_id: Uuid, depth: u32, types: Option<&[RelationType]>) -> Result<Vec<NeighborRow>> {
        let relations = self.relations.lock().unwrap();
        let mut out = Vec::new();
        let mut visited: HashSet<Uuid> = HashSet::from([memory_id]);
        let mut frontier: Vec<(Uuid, Vec<Uuid>)> = vec![(memory_id, vec![memory_id])];

        for d in 1..=depth {
            let mut next_frontier = Vec::new();
            for (node, path) in &frontier {
                for r in relations.iter() {
                    let neighbor = if r.source_id == *node {
                        Some(r.target_id)
                    } else if r.target_id == *node {
                        Some(r.source_id)
                    } else {
                        None
                    };
                    let Some(neighbor) = neighbor else { continue };
                    if visited.contains(&neighbor) || path.contains(&neighbor) {
                        continue;
                    }
                    if let Some(types) = types {
                        if !types.contains(&r.relation_type) {
                            continue;
                        }
                    }
                    let mut new_path = path.clone();
                    new_path.push(neighbor);
                    out.push(NeighborRow {
                        memory_id: neighbor,
                        depth: d,
                        path: new_path.clone(),
                        relation_type: Some(r.relation_type),
                    });
                    visited.insert(neighbor);
                    next_frontier.push((neighbor, new_path));
                }
            }
            frontier = next_frontier;
            if frontier.is_empty() {
                break;
            }
        }
        Ok(out)
    }

    async fn find_path(&self, from_id: Uuid, to_id: Uuid, max_depth: u32) -> Result<Option<PathResult>> {
        if from_id == to_id {
            return Ok(None);
        }
        let relations = self.relations.lock().unwrap();
        let mut visited: HashSet<Uuid> = HashSet::from([from_id]);
        let mut frontier: Vec<Vec<(Uuid, RelationType, Direction, f32)>> =
            vec![vec![(from_id, RelationType::Related, Direction::Out, 0.0)]];

        for _ in 0..max_depth {
            let mut next_frontier = Vec::new();
            for path in &frontier {
                let (node, _, _, _) = *path.last().unwrap();
                for r in relations.iter() {
                    let (neighbor, direction) = if r.source_id == node {
                        (r.target_id, Direction::Out)
                    } else if r.target_id == node {
                        (r.source_id, Direction::In)
                    } else {
                        continue;
                    };
                    if visited.contains(&neighbor) {
                        continue;
                    }
                    let mut new_path = path.clone();
                    new_path.push((neighbor, r.relation_type, direction, r.weight));
                    if neighbor == to_id {
                        let total_weight = new_path.iter().skip(1).map(|(_, _, _, w)| w).sum();
                        let steps = new_path
                            .into_iter()
                            .skip(1)
                            .map(|(memory_id, relation_type, direction, _)| PathStep { memory_id, relation_type, direction })
                            .collect();
                        return Ok(Some(PathResult { steps, total_weight }));
                    }
                    visited.insert(neighbor);
                    next_frontier.push(new_path);
                }
            }
            frontier = next_frontier;
            if frontier.is_empty() {
                break;
            }
        }
        Ok(None)
    }

    async fn memory_ids_with_relations(&self) -> Result<HashSet<Uuid>> {
        let relations = self.relations.lock().unwrap();
        let mut ids = HashSet::new();
        for r in relations.iter() {
            ids.insert(r.source_id);
            ids.insert(r.target_id);
        }
        Ok(ids)
    }

    async fn top_relation_hubs(&self, limit: usize) -> Result<Vec<(Uuid, u64)>> {
        let relations = self.relations.lock().unwrap();
        let mut counts: HashMap<Uuid, u64> = HashMap::new();
        for r in relations.iter() {
            *counts.entry(r.source_id).or_default() += 1;
            *counts.entry(r.target_id).or_default() += 1;
        }
        let mut hubs: Vec<(Uuid, u64)> = counts.into_iter().collect();
        hubs.sort_by(|a, b| b.1.cmp(&a.1));
        hubs.truncate(limit);
        Ok(hubs)
    }

    async fn is_rejected(&self, source_id: Uuid, target_id: Uuid, relation_type: RelationType) -> Result<bool> {
        Ok(self.rejected.lock().unwrap().contains(&(source_id, target_id, relation_type)))
    }

    async fn reject_suggestion(&self, source_id: Uuid, target_id: Uuid, relation_type: RelationType) -> Result<()> {
        self.rejected.lock().unwrap().insert((source_id, target_id, relation_type));
        Ok(())
    }

    async fn add_relations_bulk(&self, relations: Vec<BulkRelation>, created_by: CreatedBy) -> Result<BulkResult> {
        let mut result = BulkResult::default();
        for rel in relations {
            let relation = Relation::new(rel.source_id, rel.target_id, rel.relation_type, rel.weight, created_by, rel.metadata);
            match self.add_relation(&relation).await {
                Ok(()) => result.created += 1,
                Err(MemoriaError::DuplicateRelation { .. }) => result.duplicates += 1,
                Err(_) => result.errors += 1,
            }
        }
        Ok(result)
    }
}
