use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{BulkRelation, BulkResult, Direction, NeighborRow, PathResult, PathStep, RelationalStoreAdapter};
use crate::config::RelationalStoreConfig;
use crate::error::{MemoriaError, RelationalError, Result};
use crate::models::{CreatedBy, Metadata, Relation, RelationType};

/// Concrete adapter over PostgreSQL (spec §4.3/§6 `[AMBIENT]`), with pool,
/// transactions, and an embedded migration runner.
pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    pub async fn connect(config: &RelationalStoreConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| MemoriaError::RelationalError(RelationalError::ConnectionError(
                "missing DATABASE_URL".into(),
            )))?;

        let pool = PgPoolOptions::new()
            .min_connections(config.pool_min)
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await
            .map_err(|e| MemoriaError::RelationalError(RelationalError::ConnectionError(e.to_string())))?;

        let adapter = Self { pool };
        if config.run_migrations {
            adapter.run_migrations().await?;
        }
        Ok(adapter)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RelationalStoreAdapter for PostgresAdapter {
    async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn add_relation(&self, relation: &Relation) -> Result<()> {
        let metadata = Value::Object(relation.metadata.clone().into_iter().collect());
        let outcome = sqlx::query(
            "INSERT INTO memory_relations
                (id, source_id, target_id, relation_type, weight, created_by, metadata, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(relation.id)
        .bind(relation.source_id)
        .bind(relation.target_id)
        .bind(relation.relation_type.to_string())
        .bind(relation.weight)
        .bind(relation.created_by.to_string())
        .bind(metadata)
        .bind(relation.created_at)
        .execute(&self.pool)
        .await;

        match outcome {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(MemoriaError::DuplicateRelation {
                    source_id: relation.source_id,
                    target_id: relation.target_id,
                    relation_type: relation.relation_type.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_relation(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        relation_type: Option<RelationType>,
    ) -> Result<u64> {
        let result = match relation_type {
            Some(rt) => {
                sqlx::query(
                    "DELETE FROM memory_relations
                     WHERE source_id = $1 AND target_id = $2 AND relation_type = $3",
                )
                .bind(source_id)
                .bind(target_id)
                .bind(rt.to_string())
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query("DELETE FROM memory_relations WHERE source_id = $1 AND target_id = $2")
                    .bind(source_id)
                    .bind(target_id)
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(result.rows_affected())
    }

    async fn get_relations(
        &self,
        memory_id: Uuid,
        direction: Direction,
        relation_type: Option<RelationType>,
    ) -> Result<Vec<Relation>> {
        let predicate = match direction {
            Direction::Out => "source_id = $1",
            Direction::In => "target_id = $1",
            Direction::Both => "(source_id = $1 OR target_id = $1)",
        };
        let query = match &relation_type {
            Some(_) => format!(
                "SELECT id, source_id, target_id, relation_type, weight, created_by, metadata, created_at
                 FROM memory_relations WHERE {predicate} AND relation_type = $2"
            ),
            None => format!(
                "SELECT id, source_id, target_id, relation_type, weight, created_by, metadata, created_at
                 FROM memory_relations WHERE {predicate}"
            ),
        };

        let mut q = sqlx::query(&query).bind(memory_id);
        if let Some(rt) = &relation_type {
            q = q.bind(rt.to_string());
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_relation).collect()
    }

    async fn get_neighbors(
        &self,
        memory_id: Uuid,
        depth: u32,
        types: Option<&[RelationType]>,
    ) -> Result<Vec<NeighborRow>> {
        let type_filter: Option<Vec<String>> =
            types.map(|ts| ts.iter().map(|t| t.to_string()).collect());

        let rows = sqlx::query(
            r#"
            WITH RECURSIVE traversal AS (
                SELECT $1::uuid AS memory_id, 0 AS depth, ARRAY[$1::uuid] AS path,
                       NULL::text AS relation_type
                UNION ALL
                SELECT
                    CASE WHEN r.source_id = t.memory_id THEN r.target_id ELSE r.source_id END,
                    t.depth + 1,
                    t.path || (CASE WHEN r.source_id = t.memory_id THEN r.target_id ELSE r.source_id END),
                    r.relation_type
                FROM memory_relations r
                JOIN traversal t ON (r.source_id = t.memory_id OR r.target_id = t.memory_id)
                WHERE t.depth < $2
                  AND NOT ((CASE WHEN r.source_id = t.memory_id THEN r.target_id ELSE r.source_id END) = ANY(t.path))
                  AND ($3::text[] IS NULL OR r.relation_type = ANY($3::text[]))
            )
            SELECT DISTINCT ON (memory_id) memory_id, depth, path, relation_type
            FROM traversal
            WHERE depth > 0
            ORDER BY memory_id, depth ASC
            "#,
        )
        .bind(memory_id)
        .bind(depth as i32)
        .bind(type_filter)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<NeighborRow> {
                let depth: i32 = row.try_get("depth")?;
                let path: Vec<Uuid> = row.try_get("path")?;
                let relation_type: Option<String> = row.try_get("relation_type")?;
                Ok(NeighborRow {
                    memory_id: row.try_get("memory_id")?,
                    depth: depth as u32,
                    path,
                    relation_type: relation_type
                        .map(|s| RelationType::from_str(&s))
                        .transpose()?,
                })
            })
            .collect()
    }

    async fn find_path(&self, from_id: Uuid, to_id: Uuid, max_depth: u32) -> Result<Option<PathResult>> {
        let neighbors = self.get_neighbors(from_id, max_depth, None).await?;
        let Some(target) = neighbors.into_iter().find(|n| n.memory_id == to_id) else {
            return Ok(None);
        };

        let mut steps = Vec::with_capacity(target.path.len() - 1);
        let mut total_weight = 0.0f32;
        let mut cursor = from_id;
        for &next in target.path.iter().skip(1) {
            let relations = self
                .get_relations(cursor, Direction::Both, None)
                .await?;
            let Some(relation) = relations
                .iter()
                .find(|r| r.source_id == next || r.target_id == next)
            else {
                cursor = next;
                continue;
            };
            let direction = if relation.source_id == cursor {
                Direction::Out
            } else {
                Direction::In
            };
            total_weight += relation.weight;
            steps.push(PathStep {
                memory_id: next,
                relation_type: relation.relation_type,
                direction,
            });
            cursor = next;
        }

        Ok(Some(PathResult { steps, total_weight }))
    }

    async fn memory_ids_with_relations(&self) -> Result<HashSet<Uuid>> {
        let rows = sqlx::query("SELECT DISTINCT source_id AS id FROM memory_relations
                                 UNION SELECT DISTINCT target_id AS id FROM memory_relations")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| row.try_get::<Uuid, _>("id").map_err(MemoriaError::from))
            .collect()
    }

    async fn top_relation_hubs(&self, limit: usize) -> Result<Vec<(Uuid, u64)>> {
        let rows = sqlx::query(
            r#"
            SELECT id, COUNT(*) AS degree FROM (
                SELECT source_id AS id FROM memory_relations
                UNION ALL
                SELECT target_id AS id FROM memory_relations
            ) AS endpoints
            GROUP BY id
            ORDER BY degree DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<(Uuid, u64)> {
                let id: Uuid = row.try_get("id")?;
                let degree: i64 = row.try_get("degree")?;
                Ok((id, degree as u64))
            })
            .collect()
    }

    async fn is_rejected(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        relation_type: RelationType,
    ) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM rejected_suggestions
             WHERE source_id = $1 AND target_id = $2 AND relation_type = $3",
        )
        .bind(source_id)
        .bind(target_id)
        .bind(relation_type.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn reject_suggestion(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        relation_type: RelationType,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO rejected_suggestions (source_id, target_id, relation_type)
             VALUES ($1, $2, $3)
             ON CONFLICT (source_id, target_id, relation_type) DO NOTHING",
        )
        .bind(source_id)
        .bind(target_id)
        .bind(relation_type.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_relations_bulk(
        &self,
        relations: Vec<BulkRelation>,
        created_by: CreatedBy,
    ) -> Result<BulkResult> {
        let mut result = BulkResult::default();
        for item in relations {
            let relation = Relation::new(
                item.source_id,
                item.target_id,
                item.relation_type,
                item.weight,
                created_by,
                item.metadata,
            );
            match self.add_relation(&relation).await {
                Ok(()) => result.created += 1,
                Err(MemoriaError::DuplicateRelation { .. }) => result.duplicates += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "add_relations_bulk item failed");
                    result.errors += 1;
                }
            }
        }
        Ok(result)
    }
}

fn row_to_relation(row: sqlx::postgres::PgRow) -> Result<Relation> {
    let relation_type: String = row.try_get("relation_type")?;
    let created_by: String = row.try_get("created_by")?;
    let metadata: Value = row.try_get("metadata")?;
    let metadata: Metadata = match metadata {
        Value::Object(map) => map.into_iter().collect(),
        _ => Metadata::new(),
    };

    Ok(Relation {
        id: row.try_get("id")?,
        source_id: row.try_get("source_id")?,
        target_id: row.try_get("target_id")?,
        relation_type: RelationType::from_str(&relation_type)?,
        weight: row.try_get("weight")?,
        created_by: CreatedBy::from_str(&created_by)?,
        created_at: row.try_get("created_at")?,
        metadata,
    })
}
