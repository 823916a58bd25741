//! Knowledge Graph Manager (spec §4.6): CRUD over typed relations, bounded
//! traversal, heuristic relation suggestion, and global discovery. Owns a
//! `RelationalStoreAdapter` for relation rows and a `VectorStoreAdapter` for
//! memory payload lookups; never writes points (spec §3 ownership note) save
//! for the best-effort `has_relations` advisory flag.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::error::{MemoriaError, Result};
use crate::keywords::{composite_confidence, explain_suggestion, infer_relation_type, KeywordSets};
use crate::models::{chunk_point_id, CreatedBy, Memory, MemoryKind, Metadata, Relation, RelationType, StoredPoint, Suggestion};
use crate::relational_store::{
    BulkRelation, BulkResult, Direction as RsDirection, RelationalStoreAdapter,
};
use crate::vector_store::{Filter, FilterValue, VectorStoreAdapter};

/// Re-exported at the crate root as `graph::Direction` for callers; mirrors
/// `models::Direction` but is the one this module's public API speaks.
pub use crate::models::Direction;

/// One row of `get_neighbors`, including the implicit `same_project` rows
/// the relational store never sees (spec §4.6, §9 design note).
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub memory_id: Uuid,
    pub depth: u32,
    pub path: Vec<Uuid>,
    pub relation_type: Option<RelationType>,
    pub implicit: bool,
}

/// `get_relations(..., include_context=true)` decoration (spec §4.6). When
/// `include_context` is false the context fields are left `None`/empty.
#[derive(Debug, Clone)]
pub struct RelationContext {
    pub relation: Relation,
    pub linked_memory_id: Option<Uuid>,
    pub content: Option<String>,
    pub type_hint: Option<String>,
    pub tags: Vec<String>,
    pub importance: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct PathStep {
    pub memory_id: Uuid,
    pub relation_type: RelationType,
    pub direction: Direction,
}

/// `find_path` result (spec §4.6): `found=false` when no path exists within
/// `max_depth`, matching §9's note that batch boost return-value bugs are
/// not inherited — here the shape is explicit rather than relying on a
/// sentinel.
#[derive(Debug, Clone)]
pub struct PathOutcome {
    pub steps: Vec<PathStep>,
    pub found: bool,
    pub total_weight: f32,
}

#[derive(Debug, Clone)]
pub struct SubgraphNode {
    pub id: Uuid,
    pub label: String,
    pub kind: MemoryKind,
    pub importance: f32,
    pub tags: Vec<String>,
    pub is_center: bool,
    pub depth: u32,
}

#[derive(Debug, Clone)]
pub struct SubgraphEdge {
    pub source: Uuid,
    pub target: Uuid,
    pub relation_type: RelationType,
    pub weight: f32,
    pub created_by: CreatedBy,
}

#[derive(Debug, Clone)]
pub struct Subgraph {
    pub center_id: Uuid,
    pub depth: u32,
    pub nodes: Vec<SubgraphNode>,
    pub edges: Vec<SubgraphEdge>,
}

#[derive(Debug, Clone)]
pub struct DiscoveryResult {
    pub suggestions: Vec<Suggestion>,
    pub auto_accepted: u64,
    pub scanned_count: u64,
    pub total_without_relations: u64,
}

/// An item to insert via `add_relations_bulk`.
pub struct RelationInput {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub relation_type: RelationType,
    pub weight: f32,
    pub metadata: Metadata,
}

/// Constructed with `Option<Arc<dyn RelationalStoreAdapter>>` (spec §4.10,
/// §9 "Lazy PostgreSQL features"): when absent, every operation fails fast
/// with `GraphUnavailable` and the Memory Lifecycle Manager continues
/// serving store/recall/search/get/update/delete unaffected.
pub struct GraphManager {
    relational_store: Option<Arc<dyn RelationalStoreAdapter>>,
    vector_store: Arc<dyn VectorStoreAdapter>,
    keywords: KeywordSets,
}

impl GraphManager {
    pub fn new(
        relational_store: Option<Arc<dyn RelationalStoreAdapter>>,
        vector_store: Arc<dyn VectorStoreAdapter>,
        keywords: KeywordSets,
    ) -> Self {
        Self { relational_store, vector_store, keywords }
    }

    fn store(&self) -> Result<&Arc<dyn RelationalStoreAdapter>> {
        self.relational_store.as_ref().ok_or(MemoriaError::GraphUnavailable)
    }

    pub async fn add_relation(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        relation_type: RelationType,
        weight: f32,
        created_by: CreatedBy,
        metadata: Metadata,
    ) -> Result<Relation> {
        if source_id == target_id {
            return Err(MemoriaError::InvalidInput(
                "relation source and target must differ".to_string(),
            ));
        }
        let store = self.store()?;
        let relation = Relation::new(source_id, target_id, relation_type, weight, created_by, metadata);
        store.add_relation(&relation).await?;
        self.mark_has_relations(&[source_id, target_id]).await;
        Ok(relation)
    }

    pub async fn remove_relation(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        relation_type: Option<RelationType>,
    ) -> Result<u64> {
        self.store()?.remove_relation(source_id, target_id, relation_type).await
    }

    pub async fn get_relations(
        &self,
        memory_id: Uuid,
        direction: Direction,
        relation_type: Option<RelationType>,
        include_context: bool,
    ) -> Result<Vec<RelationContext>> {
        let relations = self.store()?.get_relations(memory_id, direction.into(), relation_type).await?;

        if !include_context {
            return Ok(relations
                .into_iter()
                .map(|relation| RelationContext {
                    relation,
                    linked_memory_id: None,
                    content: None,
                    type_hint: None,
                    tags: Vec::new(),
                    importance: None,
                })
                .collect());
        }

        let mut linked_ids: HashSet<Uuid> = HashSet::new();
        for r in &relations {
            if r.source_id != memory_id {
                linked_ids.insert(r.source_id);
            }
            if r.target_id != memory_id {
                linked_ids.insert(r.target_id);
            }
        }
        let points = self.batch_fetch(&linked_ids.into_iter().collect::<Vec<_>>()).await?;

        Ok(relations
            .into_iter()
            .map(|r| {
                let linked_id = if r.source_id == memory_id { r.target_id } else { r.source_id };
                let (tags, importance, type_hint, content) = match points.get(&linked_id) {
                    Some((_, point)) => (
                        payload_tags(point),
                        payload_f32(point, "importance"),
                        point.payload.get("memory_type").and_then(|v| v.as_str()).map(str::to_string),
                        point
                            .payload
                            .get("full_content")
                            .or_else(|| point.payload.get("content"))
                            .and_then(|v| v.as_str())
                            .map(|s| truncate(s, 500)),
                    ),
                    None => (Vec::new(), None, None, None),
                };
                RelationContext {
                    relation: r,
                    linked_memory_id: Some(linked_id),
                    content,
                    type_hint,
                    tags,
                    importance,
                }
            })
            .collect())
    }

    pub async fn get_neighbors(
        &self,
        memory_id: Uuid,
        depth: u32,
        types: Option<&[RelationType]>,
    ) -> Result<Vec<Neighbor>> {
        let depth = depth.clamp(1, 5);
        let rows = self.store()?.get_neighbors(memory_id, depth, types).await?;

        let mut neighbors: Vec<Neighbor> = rows
            .into_iter()
            .map(|row| Neighbor {
                memory_id: row.memory_id,
                depth: row.depth,
                path: row.path,
                relation_type: row.relation_type,
                implicit: false,
            })
            .collect();

        let mut exclude: HashSet<Uuid> = neighbors.iter().map(|n| n.memory_id).collect();
        exclude.insert(memory_id);

        let implicit = self.implicit_project_neighbors(memory_id, &exclude).await?;
        neighbors.extend(implicit);
        Ok(neighbors)
    }

    /// Scan all three collections for memories sharing the source memory's
    /// `project` field, emitted as depth-1 `same_project` pseudo-neighbors
    /// (spec §4.6, §9: does not participate in pathfinding or subgraph edges).
    async fn implicit_project_neighbors(&self, memory_id: Uuid, exclude: &HashSet<Uuid>) -> Result<Vec<Neighbor>> {
        let Some((_, source_point)) = self.fetch_any(memory_id, false).await? else {
            return Ok(Vec::new());
        };
        let Some(project) = source_point.payload.get("project").and_then(|v| v.as_str()).map(str::to_string) else {
            return Ok(Vec::new());
        };

        let mut filter = Filter::new();
        filter.insert("project".to_string(), FilterValue::Eq(json!(project)));

        let mut seen = exclude.clone();
        let mut out = Vec::new();
        for kind in MemoryKind::ALL {
            let mut offset = None;
            loop {
                let (points, next_offset) = self
                    .vector_store
                    .scroll(kind.collection_name(), 200, offset, Some(filter.clone()), false)
                    .await?;
                if points.is_empty() {
                    break;
                }
                for point in &points {
                    let logical_id = point.logical_id();
                    if seen.insert(logical_id) {
                        out.push(Neighbor {
                            memory_id: logical_id,
                            depth: 1,
                            path: vec![memory_id, logical_id],
                            relation_type: None,
                            implicit: true,
                        });
                    }
                }
                match next_offset {
                    Some(o) => offset = Some(o),
                    None => break,
                }
            }
        }
        Ok(out)
    }

    pub async fn find_path(&self, from_id: Uuid, to_id: Uuid, max_depth: u32) -> Result<PathOutcome> {
        let max_depth = max_depth.clamp(1, 10);
        match self.store()?.find_path(from_id, to_id, max_depth).await? {
            Some(result) => Ok(PathOutcome {
                steps: result
                    .steps
                    .into_iter()
                    .map(|s| PathStep {
                        memory_id: s.memory_id,
                        relation_type: s.relation_type,
                        direction: s.direction.into(),
                    })
                    .collect(),
                found: true,
                total_weight: result.total_weight,
            }),
            None => Ok(PathOutcome { steps: Vec::new(), found: false, total_weight: 0.0 }),
        }
    }

    pub async fn get_subgraph(&self, center_id: Uuid, depth: u32, types: Option<&[RelationType]>) -> Result<Subgraph> {
        let depth = depth.clamp(1, 4);
        let neighbors = self.get_neighbors(center_id, depth, types).await?;

        let mut ids: HashSet<Uuid> = neighbors.iter().map(|n| n.memory_id).collect();
        ids.insert(center_id);
        let depth_map: HashMap<Uuid, u32> = neighbors.iter().map(|n| (n.memory_id, n.depth)).collect();

        let id_list: Vec<Uuid> = ids.iter().copied().collect();
        let points = self.batch_fetch(&id_list).await?;

        let nodes = ids
            .iter()
            .filter_map(|id| {
                points.get(id).map(|(kind, point)| SubgraphNode {
                    id: *id,
                    label: truncate(&node_label(point), 50),
                    kind: *kind,
                    importance: payload_f32(point, "importance").unwrap_or(0.5),
                    tags: payload_tags(point),
                    is_center: *id == center_id,
                    depth: if *id == center_id { 0 } else { *depth_map.get(id).unwrap_or(&0) },
                })
            })
            .collect();

        let edges = self.build_edges(&ids).await?;
        Ok(Subgraph { center_id, depth, nodes, edges })
    }

    pub async fn get_graph_overview(&self, limit: usize, depth: u32) -> Result<Subgraph> {
        let depth = depth.clamp(1, 3);
        let hubs = self.store()?.top_relation_hubs(limit).await?;
        let Some((center, _)) = hubs.first().copied() else {
            return Ok(Subgraph { center_id: Uuid::nil(), depth, nodes: Vec::new(), edges: Vec::new() });
        };

        let mut ids: HashSet<Uuid> = hubs.iter().map(|(id, _)| *id).collect();
        let mut all_neighbors: Vec<Neighbor> = Vec::new();
        for &(hub, _) in hubs.iter().take(5) {
            let neighbors = self.get_neighbors(hub, depth.min(1), None).await?;
            ids.extend(neighbors.iter().map(|n| n.memory_id));
            all_neighbors.extend(neighbors);
        }
        let depth_map: HashMap<Uuid, u32> = all_neighbors.iter().map(|n| (n.memory_id, n.depth)).collect();

        let id_list: Vec<Uuid> = ids.iter().copied().collect();
        let points = self.batch_fetch(&id_list).await?;

        let nodes = ids
            .iter()
            .filter_map(|id| {
                points.get(id).map(|(kind, point)| SubgraphNode {
                    id: *id,
                    label: truncate(&node_label(point), 50),
                    kind: *kind,
                    importance: payload_f32(point, "importance").unwrap_or(0.5),
                    tags: payload_tags(point),
                    is_center: *id == center,
                    depth: if *id == center { 0 } else { *depth_map.get(id).unwrap_or(&0) },
                })
            })
            .collect();

        let edges = self.build_edges(&ids).await?;
        Ok(Subgraph { center_id: center, depth, nodes, edges })
    }

    async fn build_edges(&self, ids: &HashSet<Uuid>) -> Result<Vec<SubgraphEdge>> {
        let store = self.store()?;
        let mut edges = Vec::new();
        for &id in ids {
            let relations = store.get_relations(id, RsDirection::Out, None).await?;
            for r in relations {
                if ids.contains(&r.target_id) {
                    edges.push(SubgraphEdge {
                        source: r.source_id,
                        target: r.target_id,
                        relation_type: r.relation_type,
                        weight: r.weight,
                        created_by: r.created_by,
                    });
                }
            }
        }
        Ok(edges)
    }

    /// Two-phase similarity search (project-scoped then global), heuristic
    /// classification, and composite confidence per candidate (spec §4.6).
    pub async fn suggest_relations(&self, memory_id: Uuid, limit: usize, min_similarity: f32) -> Result<Vec<Suggestion>> {
        let Some((source_kind, source_point)) = self.fetch_any(memory_id, true).await? else {
            return Ok(Vec::new());
        };
        let Some(source_vector) = source_point.vector.clone() else {
            return Ok(Vec::new());
        };
        let source_memory = Memory::from_payload(source_kind, &source_point.payload)?;

        let existing = self.store()?.get_relations(memory_id, RsDirection::Both, None).await?;
        let mut exclude: HashSet<Uuid> = HashSet::new();
        for r in &existing {
            exclude.insert(r.source_id);
            exclude.insert(r.target_id);
        }
        exclude.insert(memory_id);

        let search_limit = (limit + exclude.len() + 5).max(limit);
        let collection = source_kind.collection_name();

        let mut all_hits = Vec::new();
        let mut seen_point_ids: HashSet<Uuid> = HashSet::new();

        if let Some(project) = source_memory.project() {
            let mut filter = Filter::new();
            filter.insert("project".to_string(), FilterValue::Eq(json!(project)));
            let hits = self
                .vector_store
                .search(collection, source_vector.clone(), search_limit, Some(min_similarity), Some(filter), false)
                .await?;
            for hit in hits {
                if seen_point_ids.insert(hit.point.id) {
                    all_hits.push(hit);
                }
            }
        }

        let global_hits = self
            .vector_store
            .search(collection, source_vector, search_limit, Some(min_similarity), None, false)
            .await?;
        for hit in global_hits {
            if seen_point_ids.insert(hit.point.id) {
                all_hits.push(hit);
            }
        }

        let mut suggestions = Vec::new();
        let mut seen_candidates: HashSet<Uuid> = HashSet::new();
        for hit in all_hits {
            let candidate_logical_id = hit.point.logical_id();
            if exclude.contains(&candidate_logical_id) || !seen_candidates.insert(candidate_logical_id) {
                continue;
            }
            let Ok(candidate) = Memory::from_payload(source_kind, &hit.point.payload) else {
                continue;
            };

            let relation_type = infer_relation_type(
                &self.keywords,
                &source_memory.content,
                &candidate.content,
                &source_memory.tags,
                &candidate.tags,
                source_memory.created_at,
                candidate.created_at,
            );
            let shared_tags: Vec<String> = source_memory.tags.intersection(&candidate.tags).cloned().collect();
            let confidence = composite_confidence(
                hit.score,
                relation_type,
                shared_tags.len(),
                source_kind,
                source_kind,
                source_memory.project(),
                candidate.project(),
            );
            let reason = explain_suggestion(relation_type, &shared_tags, source_memory.project(), candidate.project());

            suggestions.push(Suggestion {
                source_id: memory_id,
                source_preview: truncate(&source_memory.content, 500),
                source_kind: source_kind.to_string(),
                source_project: source_memory.project().map(str::to_string),
                target_id: candidate.id,
                target_preview: truncate(&candidate.content, 500),
                target_kind: source_kind.to_string(),
                target_project: candidate.project().map(str::to_string),
                relation_type,
                confidence,
                reason,
                shared_tags,
            });
        }

        suggestions.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        suggestions.truncate(limit);
        Ok(suggestions)
    }

    /// Global sweep for undiscovered relations, with auto-accept above
    /// `auto_accept_threshold` (spec §4.6). `rejected_pairs` makes rejection
    /// sticky across runs (Testable Property 11).
    pub async fn discover_relations_global(
        &self,
        limit: usize,
        min_confidence: f32,
        auto_accept_threshold: f32,
        skip_with_relations: bool,
        kinds: Option<&[MemoryKind]>,
        rejected_pairs: &HashSet<(Uuid, Uuid, RelationType)>,
    ) -> Result<DiscoveryResult> {
        let store = self.store()?;
        let kinds: Vec<MemoryKind> = kinds.map(|k| k.to_vec()).unwrap_or_else(|| MemoryKind::ALL.to_vec());

        let mut all_memories: Vec<Uuid> = Vec::new();
        for kind in &kinds {
            let mut offset = None;
            loop {
                let (points, next_offset) = self
                    .vector_store
                    .scroll(kind.collection_name(), 500, offset, None, false)
                    .await?;
                if points.is_empty() {
                    break;
                }
                all_memories.extend(points.iter().filter(|p| p.is_representative()).map(|p| p.logical_id()));
                match next_offset {
                    Some(o) => offset = Some(o),
                    None => break,
                }
            }
        }

        let with_relations: HashSet<Uuid> =
            if skip_with_relations { store.memory_ids_with_relations().await? } else { HashSet::new() };

        let to_scan: Vec<Uuid> = all_memories
            .into_iter()
            .filter(|id| !skip_with_relations || !with_relations.contains(id))
            .collect();
        let total_without_relations = to_scan.len() as u64;

        let mut suggestions: Vec<Suggestion> = Vec::new();
        let mut auto_accepted = 0u64;
        let mut scanned_count = 0u64;
        let mut seen_pairs: HashSet<(Uuid, Uuid)> = HashSet::new();

        for memory_id in to_scan {
            if suggestions.len() >= limit * 2 {
                break;
            }
            scanned_count += 1;

            let candidate_suggestions = match self.suggest_relations(memory_id, 5, min_confidence).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::debug!(%memory_id, error = %e, "discover_relations_global: suggest_relations failed for candidate");
                    continue;
                }
            };

            for suggestion in candidate_suggestions {
                if rejected_pairs.contains(&(memory_id, suggestion.target_id, suggestion.relation_type)) {
                    continue;
                }
                let pair = ordered_pair(memory_id, suggestion.target_id);
                if !seen_pairs.insert(pair) {
                    continue;
                }

                if suggestion.confidence >= auto_accept_threshold {
                    match self
                        .add_relation(memory_id, suggestion.target_id, suggestion.relation_type, 1.0, CreatedBy::Auto, Metadata::new())
                        .await
                    {
                        Ok(_) => {
                            auto_accepted += 1;
                            continue;
                        }
                        Err(e) => {
                            tracing::debug!(%memory_id, error = %e, "discover_relations_global: auto-accept failed");
                        }
                    }
                }

                suggestions.push(suggestion);
            }
        }

        suggestions.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        suggestions.truncate(limit);

        Ok(DiscoveryResult { suggestions, auto_accepted, scanned_count, total_without_relations })
    }

    pub async fn add_relations_bulk(&self, rels: Vec<RelationInput>, created_by: CreatedBy) -> Result<BulkResult> {
        let mut result = BulkResult::default();
        for rel in rels {
            match self.add_relation(rel.source_id, rel.target_id, rel.relation_type, rel.weight, created_by, rel.metadata).await {
                Ok(_) => result.created += 1,
                Err(MemoriaError::DuplicateRelation { .. }) => result.duplicates += 1,
                Err(e) => {
                    tracing::debug!(error = %e, "add_relations_bulk item failed");
                    result.errors += 1;
                }
            }
        }
        Ok(result)
    }

    /// Present mainly so callers can push a direct `BulkRelation` list straight
    /// to the relational adapter when self-loop checking was already done.
    pub async fn add_relations_bulk_raw(&self, rels: Vec<BulkRelation>, created_by: CreatedBy) -> Result<BulkResult> {
        self.store()?.add_relations_bulk(rels, created_by).await
    }

    pub async fn reject_suggestion(&self, source_id: Uuid, target_id: Uuid, relation_type: RelationType) -> Result<()> {
        self.store()?.reject_suggestion(source_id, target_id, relation_type).await
    }

    pub async fn is_rejected(&self, source_id: Uuid, target_id: Uuid, relation_type: RelationType) -> Result<bool> {
        self.store()?.is_rejected(source_id, target_id, relation_type).await
    }

    /// Best-effort advisory flag (spec §3 ownership note, §4.6): failures are
    /// logged, never surfaced.
    async fn mark_has_relations(&self, ids: &[Uuid]) {
        for &id in ids {
            for kind in MemoryKind::ALL {
                let mut payload = Metadata::new();
                payload.insert("has_relations".to_string(), json!(true));
                if let Err(e) = self.vector_store.update_payload(kind.collection_name(), id, payload, true).await {
                    tracing::debug!(%id, %kind, error = %e, "best-effort has_relations flag failed");
                }
            }
        }
    }

    async fn fetch_any(&self, memory_id: Uuid, with_vectors: bool) -> Result<Option<(MemoryKind, StoredPoint)>> {
        for kind in MemoryKind::ALL {
            let direct = self.vector_store.get(kind.collection_name(), &[memory_id], with_vectors).await?;
            if let Some(point) = direct.into_iter().next() {
                return Ok(Some((kind, point)));
            }
            let chunk_0 = chunk_point_id(memory_id, 0);
            let via_chunk = self.vector_store.get(kind.collection_name(), &[chunk_0], with_vectors).await?;
            if let Some(point) = via_chunk.into_iter().next() {
                return Ok(Some((kind, point)));
            }
        }
        Ok(None)
    }

    /// Batched lookup across all three collections, falling back to the
    /// deterministic chunk-0 id for any id not found directly.
    async fn batch_fetch(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, (MemoryKind, StoredPoint)>> {
        let mut found: HashMap<Uuid, (MemoryKind, StoredPoint)> = HashMap::new();
        let mut remaining: Vec<Uuid> = ids.to_vec();

        for kind in MemoryKind::ALL {
            if remaining.is_empty() {
                break;
            }
            let direct = self.vector_store.get(kind.collection_name(), &remaining, false).await?;
            for point in direct {
                found.insert(point.id, (kind, point));
            }
            remaining.retain(|id| !found.contains_key(id));
        }

        if !remaining.is_empty() {
            for kind in MemoryKind::ALL {
                if remaining.is_empty() {
                    break;
                }
                let chunk_ids: Vec<Uuid> = remaining.iter().map(|id| chunk_point_id(*id, 0)).collect();
                let via_chunk = self.vector_store.get(kind.collection_name(), &chunk_ids, false).await?;
                for point in via_chunk {
                    if let Some(logical) = point.parent_id() {
                        found.insert(logical, (kind, point));
                    }
                }
                remaining.retain(|id| !found.contains_key(id));
            }
        }

        Ok(found)
    }
}

fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b { (a, b) } else { (b, a) }
}

fn node_label(point: &StoredPoint) -> String {
    point
        .payload
        .get("full_content")
        .or_else(|| point.payload.get("content"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn payload_tags(point: &StoredPoint) -> Vec<String> {
    point
        .payload
        .get("tags")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn payload_f32(point: &StoredPoint, key: &str) -> Option<f32> {
    point.payload.get(key).and_then(|v| v.as_f64()).map(|v| v as f32)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect()
}
