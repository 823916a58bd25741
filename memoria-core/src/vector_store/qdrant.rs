use std::sync::Arc;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    value::Kind as QdrantKind, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance as QdrantDistance, FieldType, GetPointsBuilder, HnswConfigDiffBuilder,
    PointId, PointStruct, PointsIdsList, PointsSelector, ScrollPointsBuilder, SearchPointsBuilder,
    SetPayloadPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::Value;
use uuid::Uuid;

use super::filter::translate_filter;
use super::{CollectionInfo, Distance, Filter, HnswConfig, PayloadIndexKind, UpsertItem, VectorStoreAdapter};
use crate::config::VectorStoreConfig;
use crate::error::{MemoriaError, Result};
use crate::models::{Payload, ScoredPoint, StoredPoint};
use crate::resilience::{CircuitBreaker, RateLimiter};

/// Concrete adapter over Qdrant (spec §4.3 `[AMBIENT]`). Holds a single
/// shared handle, reference-counted, per §9 "shared handle, no cycle".
pub struct QdrantAdapter {
    client: Arc<Qdrant>,
    protection: Option<(RateLimiter, CircuitBreaker)>,
}

impl QdrantAdapter {
    /// Embedded/local mode: no network round-trip to protect, so calls are
    /// not wrapped by the rate limiter or circuit breaker.
    pub fn local(config: &VectorStoreConfig) -> Result<Self> {
        let url = config
            .local_path
            .clone()
            .ok_or_else(|| MemoriaError::StoreError("missing local_path for local mode".into()))?;
        let client = Qdrant::from_url(&url)
            .build()
            .map_err(|e| MemoriaError::StoreError(e.to_string()))?;
        Ok(Self {
            client: Arc::new(client),
            protection: None,
        })
    }

    /// Remote mode: every call site is wrapped by the rate limiter +
    /// circuit breaker (spec §4.3, §4.8).
    pub fn remote(
        config: &VectorStoreConfig,
        rate_limiter: RateLimiter,
        circuit_breaker: CircuitBreaker,
    ) -> Result<Self> {
        let host = config
            .remote_host
            .clone()
            .ok_or_else(|| MemoriaError::StoreError("missing remote_host for remote mode".into()))?;
        let port = config.remote_port.unwrap_or(6334);
        let url = format!("http://{host}:{port}");
        let client = Qdrant::from_url(&url)
            .build()
            .map_err(|e| MemoriaError::StoreError(e.to_string()))?;
        Ok(Self {
            client: Arc::new(client),
            protection: Some((rate_limiter, circuit_breaker)),
        })
    }

    async fn guard(&self) -> Result<()> {
        if let Some((limiter, _)) = &self.protection {
            limiter.acquire().await?;
        }
        Ok(())
    }

    async fn record_outcome(&self, ok: bool) {
        if let Some((_, breaker)) = &self.protection {
            if ok {
                breaker.record_success().await;
            } else {
                breaker.record_failure().await;
            }
        }
    }

    async fn circuit_check(&self) -> Result<()> {
        if let Some((_, breaker)) = &self.protection {
            breaker.check().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStoreAdapter for QdrantAdapter {
    async fn create_collection(
        &self,
        name: &str,
        dim: usize,
        distance: Distance,
        recreate: bool,
        hnsw: HnswConfig,
    ) -> Result<()> {
        if recreate {
            let _ = self.client.delete_collection(name).await;
        }
        let mut builder = CreateCollectionBuilder::new(name)
            .vectors_config(VectorParamsBuilder::new(dim as u64, to_qdrant_distance(distance)));
        if hnsw.m.is_some() || hnsw.ef_construct.is_some() {
            let mut hnsw_builder = HnswConfigDiffBuilder::default();
            if let Some(m) = hnsw.m {
                hnsw_builder = hnsw_builder.m(m);
            }
            if let Some(ef_construct) = hnsw.ef_construct {
                hnsw_builder = hnsw_builder.ef_construct(ef_construct);
            }
            builder = builder.hnsw_config(hnsw_builder);
        }
        self.client
            .create_collection(builder)
            .await
            .map_err(|e| MemoriaError::StoreError(e.to_string()))?;
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client
            .collection_exists(name)
            .await
            .map_err(|e| MemoriaError::StoreError(e.to_string()))
    }

    async fn get_collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let info = self
            .client
            .collection_info(name)
            .await
            .map_err(|e| MemoriaError::StoreError(e.to_string()))?;
        let result = info
            .result
            .ok_or_else(|| MemoriaError::StoreError("empty collection_info response".into()))?;
        Ok(CollectionInfo {
            name: name.to_string(),
            points_count: result.points_count.unwrap_or(0),
            dim: 0,
            distance: Distance::Cosine,
        })
    }

    async fn create_payload_index(
        &self,
        collection: &str,
        field: &str,
        kind: PayloadIndexKind,
    ) -> Result<()> {
        let field_type = match kind {
            PayloadIndexKind::Keyword => FieldType::Keyword,
            PayloadIndexKind::Float => FieldType::Float,
            PayloadIndexKind::Datetime => FieldType::Datetime,
            PayloadIndexKind::Text => FieldType::Text,
            PayloadIndexKind::Bool => FieldType::Bool,
        };
        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                collection,
                field,
                field_type,
            ))
            .await
            .map_err(|e| MemoriaError::StoreError(e.to_string()))?;
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        vector: Vec<f32>,
        payload: Payload,
        id: Option<Uuid>,
    ) -> Result<Uuid> {
        let ids = self
            .upsert_batch(collection, vec![UpsertItem { id, vector, payload }])
            .await?;
        ids.into_iter()
            .next()
            .ok_or_else(|| MemoriaError::StoreError("upsert returned no id".into()))
    }

    async fn upsert_batch(&self, collection: &str, items: Vec<UpsertItem>) -> Result<Vec<Uuid>> {
        self.guard().await?;
        self.circuit_check().await?;

        let mut ids = Vec::with_capacity(items.len());
        let mut points = Vec::with_capacity(items.len());
        for item in items {
            let id = item.id.unwrap_or_else(Uuid::new_v4);
            ids.push(id);
            points.push(PointStruct::new(
                id.to_string(),
                item.vector,
                payload_to_qdrant(item.payload),
            ));
        }

        let outcome = self
            .client
            .upsert_points(UpsertPointsBuilder::new(collection, points))
            .await;
        self.record_outcome(outcome.is_ok()).await;
        outcome.map_err(|e| MemoriaError::StoreError(e.to_string()))?;
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
        self.guard().await?;
        self.circuit_check().await?;

        let mut builder = SearchPointsBuilder::new(collection, vector, limit as u64)
            .with_payload(true)
            .with_vectors(with_vectors);
        if let Some(threshold) = score_threshold {
            builder = builder.score_threshold(threshold);
        }
        if let Some(filter) = filter {
            builder = builder.filter(translate_filter(&filter));
        }

        let outcome = self.client.search_points(builder).await;
        self.record_outcome(outcome.is_ok()).await;
        let response = outcome.map_err(|e| MemoriaError::StoreError(e.to_string()))?;

        response
            .result
            .into_iter()
            .map(|scored| {
                let score = scored.score;
                let point = qdrant_scored_to_stored(scored)?;
                Ok(ScoredPoint { point, score })
            })
            .collect()
    }

    async fn get(&self, collection: &str, ids: &[Uuid], with_vectors: bool) -> Result<Vec<StoredPoint>> {
        self.guard().await?;
        self.circuit_check().await?;

        let point_ids: Vec<PointId> = ids.iter().map(|id| PointId::from(id.to_string())).collect();
        let builder = GetPointsBuilder::new(collection, point_ids)
            .with_payload(true)
            .with_vectors(with_vectors);

        let outcome = self.client.get_points(builder).await;
        self.record_outcome(outcome.is_ok()).await;
        let response = outcome.map_err(|e| MemoriaError::StoreError(e.to_string()))?;

        response
            .result
            .into_iter()
            .map(qdrant_retrieved_to_stored)
            .collect()
    }

    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        offset: Option<Uuid>,
        filter: Option<Filter>,
        with_vectors: bool,
    ) -> Result<(Vec<StoredPoint>, Option<Uuid>)> {
        self.guard().await?;
        self.circuit_check().await?;

        let mut builder = ScrollPointsBuilder::new(collection)
            .limit(limit as u32)
            .with_payload(true)
            .with_vectors(with_vectors);
        if let Some(offset) = offset {
            builder = builder.offset(PointId::from(offset.to_string()));
        }
        if let Some(filter) = filter {
            builder = builder.filter(translate_filter(&filter));
        }

        let outcome = self.client.scroll(builder).await;
        self.record_outcome(outcome.is_ok()).await;
        let response = outcome.map_err(|e| MemoriaError::StoreError(e.to_string()))?;

        let points = response
            .result
            .into_iter()
            .map(qdrant_retrieved_to_stored)
            .collect::<Result<Vec<_>>>()?;
        let next_offset = response
            .next_page_offset
            .and_then(|id| point_id_to_uuid(&id));

        Ok((points, next_offset))
    }

    async fn count(&self, collection: &str, filter: Option<Filter>, exact: bool) -> Result<u64> {
        self.guard().await?;
        self.circuit_check().await?;

        let mut builder = CountPointsBuilder::new(collection).exact(exact);
        if let Some(filter) = filter {
            builder = builder.filter(translate_filter(&filter));
        }

        let outcome = self.client.count(builder).await;
        self.record_outcome(outcome.is_ok()).await;
        let response = outcome.map_err(|e| MemoriaError::StoreError(e.to_string()))?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    async fn update_payload(
        &self,
        collection: &str,
        id: Uuid,
        payload: Payload,
        merge: bool,
    ) -> Result<()> {
        self.guard().await?;
        self.circuit_check().await?;

        let selector = PointsIdsList {
            ids: vec![PointId::from(id.to_string())],
        };
        let builder = SetPayloadPointsBuilder::new(
            collection,
            payload_to_qdrant(payload),
        )
        .points_selector(PointsSelector::from(selector))
        .overwrite(!merge);

        let outcome = self.client.set_payload(builder).await;
        self.record_outcome(outcome.is_ok()).await;
        outcome.map_err(|e| MemoriaError::StoreError(e.to_string()))?;
        Ok(())
    }

    async fn delete(
        &self,
        collection: &str,
        ids: Option<Vec<Uuid>>,
        filter: Option<Filter>,
    ) -> Result<u64> {
        self.guard().await?;
        self.circuit_check().await?;

        let selector = match (ids, filter) {
            (Some(ids), _) => {
                let point_ids: Vec<PointId> =
                    ids.iter().map(|id| PointId::from(id.to_string())).collect();
                PointsSelector::from(PointsIdsList { ids: point_ids })
            }
            (None, Some(filter)) => PointsSelector::from(translate_filter(&filter)),
            (None, None) => {
                return Err(MemoriaError::InvalidInput(
                    "delete requires ids or filter".into(),
                ))
            }
        };

        let before = self.count(collection, None, true).await.unwrap_or(0);
        let outcome = self
            .client
            .delete_points(DeletePointsBuilder::new(collection).points(selector))
            .await;
        self.record_outcome(outcome.is_ok()).await;
        outcome.map_err(|e| MemoriaError::StoreError(e.to_string()))?;
        let after = self.count(collection, None, true).await.unwrap_or(0);
        Ok(before.saturating_sub(after))
    }
}

fn to_qdrant_distance(distance: Distance) -> QdrantDistance {
    match distance {
        Distance::Cosine => QdrantDistance::Cosine,
        Distance::Euclid => QdrantDistance::Euclid,
        Distance::Dot => QdrantDistance::Dot,
    }
}

fn payload_to_qdrant(payload: Payload) -> std::collections::HashMap<String, QdrantValue> {
    payload
        .into_iter()
        .map(|(k, v)| (k, json_to_qdrant_value(v)))
        .collect()
}

fn json_to_qdrant_value(value: Value) -> QdrantValue {
    QdrantValue::from(value)
}

fn qdrant_value_to_json(value: QdrantValue) -> Value {
    match value.kind {
        Some(QdrantKind::NullValue(_)) | None => Value::Null,
        Some(QdrantKind::BoolValue(b)) => Value::Bool(b),
        Some(QdrantKind::IntegerValue(i)) => Value::Number(i.into()),
        Some(QdrantKind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(QdrantKind::StringValue(s)) => Value::String(s),
        Some(QdrantKind::ListValue(list)) => {
            Value::Array(list.values.into_iter().map(qdrant_value_to_json).collect())
        }
        Some(QdrantKind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, qdrant_value_to_json(v)))
                .collect(),
        ),
    }
}

fn payload_from_qdrant(payload: std::collections::HashMap<String, QdrantValue>) -> Payload {
    payload
        .into_iter()
        .map(|(k, v)| (k, qdrant_value_to_json(v)))
        .collect()
}

fn point_id_to_uuid(id: &PointId) -> Option<Uuid> {
    id.point_id_options.as_ref().and_then(|opts| match opts {
        qdrant_client::qdrant::point_id::PointIdOptions::Uuid(s) => Uuid::parse_str(s).ok(),
        qdrant_client::qdrant::point_id::PointIdOptions::Num(_) => None,
    })
}

fn qdrant_scored_to_stored(scored: qdrant_client::qdrant::ScoredPoint) -> Result<StoredPoint> {
    let id = scored
        .id
        .as_ref()
        .and_then(point_id_to_uuid)
        .ok_or_else(|| MemoriaError::StoreError("scored point missing uuid id".into()))?;
    let vector = scored.vectors.and_then(extract_dense_vector);
    Ok(StoredPoint {
        id,
        payload: payload_from_qdrant(scored.payload),
        vector,
    })
}

fn qdrant_retrieved_to_stored(point: qdrant_client::qdrant::RetrievedPoint) -> Result<StoredPoint> {
    let id = point
        .id
        .as_ref()
        .and_then(point_id_to_uuid)
        .ok_or_else(|| MemoriaError::StoreError("retrieved point missing uuid id".into()))?;
    let vector = point.vectors.and_then(extract_dense_vector);
    Ok(StoredPoint {
        id,
        payload: payload_from_qdrant(point.payload),
        vector,
    })
}

fn extract_dense_vector(vectors: qdrant_client::qdrant::VectorsOutput) -> Option<Vec<f32>> {
    use qdrant_client::qdrant::vectors_output::VectorsOptions;
    match vectors.vectors_options {
        Some(VectorsOptions::Vector(v)) => Some(v.data),
        _ => None,
    }
}
