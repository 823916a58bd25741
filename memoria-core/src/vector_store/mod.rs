mod filter;
mod qdrant;

pub use filter::{translate_filter, Filter, FilterValue};
pub use qdrant::QdrantAdapter;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Payload, ScoredPoint, StoredPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    Cosine,
    Euclid,
    Dot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadIndexKind {
    Keyword,
    Float,
    Datetime,
    Text,
    Bool,
}

#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub name: String,
    pub points_count: u64,
    pub dim: usize,
    pub distance: Distance,
}

/// HNSW index tuning for a collection (spec §6: "HNSW parameters differ per
/// kind"). `None` fields fall back to the vector store's own defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct HnswConfig {
    pub m: Option<u64>,
    pub ef_construct: Option<u64>,
}

/// One item of an `upsert_batch` call: vector, payload, and an optional
/// caller-chosen id (chunk points use a deterministic id; representative
/// points use the memory id).
pub struct UpsertItem {
    pub id: Option<Uuid>,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// Thin async facade over the external vector database (spec §4.3). The
/// core depends only on this trait; `QdrantAdapter` is the one concrete,
/// shipped implementation.
#[async_trait]
pub trait VectorStoreAdapter: Send + Sync {
    async fn create_collection(
        &self,
        name: &str,
        dim: usize,
        distance: Distance,
        recreate: bool,
        hnsw: HnswConfig,
    ) -> Result<()>;

    async fn collection_exists(&self, name: &str) -> Result<bool>;

    async fn get_collection_info(&self, name: &str) -> Result<CollectionInfo>;

    async fn create_payload_index(
        &self,
        collection: &str,
        field: &str,
        kind: PayloadIndexKind,
    ) -> Result<()>;

    async fn upsert(
        &self,
        collection: &str,
        vector: Vec<f32>,
        payload: Payload,
        id: Option<Uuid>,
    ) -> Result<Uuid>;

    async fn upsert_batch(&self, collection: &str, items: Vec<UpsertItem>) -> Result<Vec<Uuid>>;

    #[allow(clippy::too_many_arguments)]
    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
        score_threshold: Option<f32>,
        filter: Option<Filter>,
        with_vectors: bool,
    ) -> Result<Vec<ScoredPoint>>;

    async fn get(&self, collection: &str, ids: &[Uuid], with_vectors: bool) -> Result<Vec<StoredPoint>>;

    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        offset: Option<Uuid>,
        filter: Option<Filter>,
        with_vectors: bool,
    ) -> Result<(Vec<StoredPoint>, Option<Uuid>)>;

    async fn count(&self, collection: &str, filter: Option<Filter>, exact: bool) -> Result<u64>;

    async fn update_payload(
        &self,
        collection: &str,
        id: Uuid,
        payload: Payload,
        merge: bool,
    ) -> Result<()>;

    async fn delete(
        &self,
        collection: &str,
        ids: Option<Vec<Uuid>>,
        filter: Option<Filter>,
    ) -> Result<u64>;
}

/// Convenience default implementation of `update_payload` with `merge =
/// false`, matching the distinction §4.3 draws between `update_payload` and
/// `overwrite_payload`.
pub async fn overwrite_payload(
    adapter: &dyn VectorStoreAdapter,
    collection: &str,
    id: Uuid,
    payload: Payload,
) -> Result<()> {
    adapter.update_payload(collection, id, payload, false).await
}
