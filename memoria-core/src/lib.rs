//! Long-term memory engine for AI assistants: chunked storage and recall
//! over an external vector store, consolidation/forgetting/decay, a bounded
//! working-memory cache, and an optional knowledge graph layer backed by a
//! relational store. See `SPEC_FULL.md` for the full module-by-module
//! contract this crate implements.

mod backup;
mod chunking;
mod config;
mod consolidation;
mod embeddings;
mod error;
mod graph;
mod keywords;
mod lifecycle;
mod models;
mod relational_store;
mod resilience;
mod vector_store;
mod working_memory;

pub use backup::{project_for_export, ExportEntry};
pub use chunking::{Chunk, TextChunker};
pub use config::{
    ChunkingConfig, CircuitBreakerTunings, Config, ConsolidationConfig, EmbedderConfig,
    RateLimiterTunings, RecallConfig, RelationalStoreConfig, VectorStoreConfig, WorkingMemoryConfig,
};
pub use consolidation::{ConsolidationEngine, ConsolidationResult, DecayResult, ForgettingResult};
pub use embeddings::{CacheStats, Embedder, EmbeddingCache, EmbeddingKind, EmbeddingResult, FastEmbedProvider, MostAccessedEntry};
pub use error::{MemoriaError, RelationalError, Result};
pub use graph::{
    Direction, DiscoveryResult, GraphManager, Neighbor, PathOutcome, PathStep, RelationContext,
    RelationInput, Subgraph, SubgraphEdge, SubgraphNode,
};
pub use keywords::{composite_confidence, explain_suggestion, infer_relation_type, KeywordSets};
pub use lifecycle::{MemoryLifecycleManager, MemoryUpdate, RecallHit, RecallQuery, SearchQuery, SortBy};
pub use models::*;
pub use relational_store::{
    BulkRelation, BulkResult, Direction as RelationalDirection, NeighborRow, PathResult,
    PathStep as RelationalPathStep, PostgresAdapter, RelationalStoreAdapter,
};
pub use resilience::{guarded, CircuitBreaker, RateLimiter};
pub use vector_store::{
    overwrite_payload, CollectionInfo, Distance, Filter, FilterValue, HnswConfig, PayloadIndexKind,
    QdrantAdapter, UpsertItem, VectorStoreAdapter,
};
pub use working_memory::{CacheEntry, HistoryEntry, WorkingMemory};

use std::sync::Arc;

/// Per-collection Qdrant bootstrap knobs: the extra payload-index fields
/// unique to that `MemoryKind`, grounded in
/// `original_source/src/mcp_memoria/storage/collections.py::COLLECTION_CONFIGS`.
/// HNSW `m`/`ef_construct` tuning lives in `kind_hnsw_config` below.
fn kind_payload_indexes(kind: MemoryKind) -> Vec<(&'static str, PayloadIndexKind)> {
    let mut indexes = vec![
        ("tags", PayloadIndexKind::Keyword),
        ("importance", PayloadIndexKind::Float),
        ("project", PayloadIndexKind::Keyword),
    ];
    match kind {
        MemoryKind::Episodic => {
            indexes.push(("created_at", PayloadIndexKind::Datetime));
            indexes.push(("session_id", PayloadIndexKind::Keyword));
        }
        MemoryKind::Semantic => {
            indexes.push(("domain", PayloadIndexKind::Keyword));
            indexes.push(("source", PayloadIndexKind::Keyword));
            indexes.push(("confidence", PayloadIndexKind::Float));
        }
        MemoryKind::Procedural => {
            indexes.push(("category", PayloadIndexKind::Keyword));
            indexes.push(("success_rate", PayloadIndexKind::Float));
            indexes.push(("frequency", PayloadIndexKind::Float));
        }
    }
    indexes
}

/// Per-collection HNSW tuning (spec §6: semantic uses `m=32,
/// ef_construct=200`; episodic/procedural use `m=16, ef_construct=100`).
fn kind_hnsw_config(kind: MemoryKind) -> HnswConfig {
    match kind {
        MemoryKind::Semantic => HnswConfig {
            m: Some(32),
            ef_construct: Some(200),
        },
        MemoryKind::Episodic | MemoryKind::Procedural => HnswConfig {
            m: Some(16),
            ef_construct: Some(100),
        },
    }
}

/// Top-level facade wiring the Lifecycle Manager, Consolidation Engine,
/// Graph Manager, and Working Memory over one shared vector-store handle
/// (spec §5 "single shared handle, no cycle"), mirroring how the teacher's
/// `AppState` composes its services from shared adapters.
pub struct MemoriaCore {
    pub config: Arc<Config>,
    pub lifecycle: MemoryLifecycleManager,
    pub consolidation: Arc<ConsolidationEngine>,
    pub graph: GraphManager,
    pub working_memory: Arc<WorkingMemory>,
}

impl MemoriaCore {
    pub fn new(
        config: Config,
        vector_store: Arc<dyn VectorStoreAdapter>,
        embedder: Arc<dyn Embedder>,
        relational_store: Option<Arc<dyn RelationalStoreAdapter>>,
    ) -> Self {
        let config = Arc::new(config);

        let working_memory = Arc::new(WorkingMemory::new(
            config.working_memory.max_size,
            config.working_memory.history_max,
        ));
        let consolidation = Arc::new(ConsolidationEngine::new(
            vector_store.clone(),
            config.consolidation.clone(),
        ));
        let lifecycle = MemoryLifecycleManager::new(
            vector_store.clone(),
            embedder,
            working_memory.clone(),
            consolidation.clone(),
            config.chunking.clone(),
            config.recall.clone(),
            config.consolidation.clone(),
        );
        let graph = GraphManager::new(relational_store, vector_store, KeywordSets::default());

        Self {
            config,
            lifecycle,
            consolidation,
            graph,
            working_memory,
        }
    }

    /// Create (or recreate) all three `MemoryKind` collections with cosine
    /// distance and the payload indexes their per-kind query paths need.
    /// Best-effort per index: an index that already exists is not an error.
    pub async fn init_collections(
        &self,
        vector_store: &dyn VectorStoreAdapter,
        dim: usize,
        recreate: bool,
    ) -> Result<()> {
        for kind in MemoryKind::ALL {
            let name = kind.collection_name();
            vector_store
                .create_collection(name, dim, Distance::Cosine, recreate, kind_hnsw_config(kind))
                .await?;
            for (field, index_kind) in kind_payload_indexes(kind) {
                if let Err(e) = vector_store.create_payload_index(name, field, index_kind).await {
                    tracing::debug!(collection = name, field, error = %e, "payload index create failed (may already exist)");
                }
            }
            if let Err(e) = vector_store.create_payload_index(name, "content", PayloadIndexKind::Text).await {
                tracing::debug!(collection = name, error = %e, "content text index create failed (may already exist)");
            }
        }
        Ok(())
    }
}
