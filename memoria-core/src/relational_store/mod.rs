mod postgres;

pub use postgres::PostgresAdapter;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{CreatedBy, Metadata, Relation, RelationType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
    Both,
}

impl From<crate::models::Direction> for Direction {
    fn from(d: crate::models::Direction) -> Self {
        match d {
            crate::models::Direction::In => Direction::In,
            crate::models::Direction::Out => Direction::Out,
            crate::models::Direction::Both => Direction::Both,
        }
    }
}

/// One row of a `get_neighbors` traversal (spec §4.6).
#[derive(Debug, Clone)]
pub struct NeighborRow {
    pub memory_id: Uuid,
    pub depth: u32,
    pub path: Vec<Uuid>,
    pub relation_type: Option<RelationType>,
}

#[derive(Debug, Clone)]
pub struct PathStep {
    pub memory_id: Uuid,
    pub relation_type: RelationType,
    pub direction: Direction,
}

#[derive(Debug, Clone)]
pub struct PathResult {
    pub steps: Vec<PathStep>,
    pub total_weight: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResult {
    pub created: u64,
    pub duplicates: u64,
    pub errors: u64,
}

/// A single relation to insert in `add_relations_bulk`.
pub struct BulkRelation {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub relation_type: RelationType,
    pub weight: f32,
    pub metadata: Metadata,
}

/// Thin async facade over the external SQL store (spec §4.3/§4.6): pool,
/// transactions, a recursive-CTE traversal, and an embedded migration
/// runner. The Graph Manager depends only on this trait;
/// `PostgresAdapter` is the one concrete, shipped implementation.
#[async_trait]
pub trait RelationalStoreAdapter: Send + Sync {
    async fn run_migrations(&self) -> Result<()>;

    async fn add_relation(&self, relation: &Relation) -> Result<()>;

    async fn remove_relation(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        relation_type: Option<RelationType>,
    ) -> Result<u64>;

    async fn get_relations(
        &self,
        memory_id: Uuid,
        direction: Direction,
        relation_type: Option<RelationType>,
    ) -> Result<Vec<Relation>>;

    async fn get_neighbors(
        &self,
        memory_id: Uuid,
        depth: u32,
        types: Option<&[RelationType]>,
    ) -> Result<Vec<NeighborRow>>;

    async fn find_path(&self, from_id: Uuid, to_id: Uuid, max_depth: u32) -> Result<Option<PathResult>>;

    /// Every memory id appearing as `source_id` or `target_id` of any relation.
    async fn memory_ids_with_relations(&self) -> Result<std::collections::HashSet<Uuid>>;

    /// The `limit` memory ids with the highest `incoming + outgoing` relation
    /// counts, descending, for `get_graph_overview`.
    async fn top_relation_hubs(&self, limit: usize) -> Result<Vec<(Uuid, u64)>>;

    async fn is_rejected(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        relation_type: RelationType,
    ) -> Result<bool>;

    async fn reject_suggestion(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        relation_type: RelationType,
    ) -> Result<()>;

    async fn add_relations_bulk(
        &self,
        relations: Vec<BulkRelation>,
        created_by: CreatedBy,
    ) -> Result<BulkResult>;
}
