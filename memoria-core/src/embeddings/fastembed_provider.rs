use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::Mutex;

use super::{Embedder, EmbeddingCache, EmbeddingKind, EmbeddingResult};
use crate::config::EmbedderConfig;
use crate::error::{MemoriaError, Result};

const DEFAULT_QUERY_PREFIX: &str = "query: ";
const DEFAULT_DOCUMENT_PREFIX: &str = "passage: ";

/// Concrete, local embedding provider built on `fastembed` (spec §1.1 "this
/// crate still ships one concrete, local adapter").
pub struct FastEmbedProvider {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    dims: usize,
    query_prefix: String,
    document_prefix: String,
    cache: Option<Arc<EmbeddingCache>>,
}

impl FastEmbedProvider {
    pub fn new(config: &EmbedderConfig, cache: Option<Arc<EmbeddingCache>>) -> Result<Self> {
        let embedding_model = resolve_model(&config.model);

        let model = TextEmbedding::try_new(
            InitOptions::new(embedding_model).with_show_download_progress(false),
        )
        .map_err(|e| MemoriaError::EmbedError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_name: config.model.clone(),
            dims: config.dim,
            query_prefix: DEFAULT_QUERY_PREFIX.to_string(),
            document_prefix: DEFAULT_DOCUMENT_PREFIX.to_string(),
            cache: cache.filter(|_| config.cache_enabled),
        })
    }

    fn prefix_for(&self, kind: EmbeddingKind) -> &str {
        match kind {
            EmbeddingKind::Query => &self.query_prefix,
            EmbeddingKind::Document => &self.document_prefix,
        }
    }
}

#[async_trait]
impl Embedder for FastEmbedProvider {
    async fn embed(&self, text: &str, kind: EmbeddingKind) -> Result<EmbeddingResult> {
        let prefixed = format!("{}{}", self.prefix_for(kind), text);

        if let Some(cache) = &self.cache {
            if let Some(vector) = cache.get(&prefixed, &self.model_name).await {
                tracing::debug!(model = %self.model_name, "embedding cache hit");
                return Ok(EmbeddingResult {
                    dims: vector.len(),
                    vector,
                    model: self.model_name.clone(),
                    cached: true,
                });
            }
        }

        let vector = {
            let mut model = self.model.lock().await;
            model
                .embed(vec![prefixed.clone()], None)
                .map_err(|e| MemoriaError::EmbedError(e.to_string()))?
                .into_iter()
                .next()
                .ok_or_else(|| MemoriaError::EmbedError("no embedding returned".to_string()))?
        };

        if let Some(cache) = &self.cache {
            cache.set(&prefixed, &self.model_name, vector.clone()).await;
        }

        tracing::debug!(model = %self.model_name, dims = vector.len(), "embedded text");
        Ok(EmbeddingResult {
            dims: vector.len(),
            vector,
            model: self.model_name.clone(),
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
        &self.model_name
    }
}

fn resolve_model(name: &str) -> EmbeddingModel {
    match name {
        "BAAI/bge-small-en-v1.5" | "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
        "BAAI/bge-base-en-v1.5" | "bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
        "BAAI/bge-large-en-v1.5" | "bge-large-en-v1.5" => EmbeddingModel::BGELargeENV15,
        "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
            EmbeddingModel::AllMiniLML6V2
        }
        "all-MiniLM-L12-v2" | "sentence-transformers/all-MiniLM-L12-v2" => {
            EmbeddingModel::AllMiniLML12V2
        }
        "nomic-embed-text-v1" | "nomic-ai/nomic-embed-text-v1" => EmbeddingModel::NomicEmbedTextV1,
        "nomic-embed-text-v1.5" | "nomic-ai/nomic-embed-text-v1.5" => {
            EmbeddingModel::NomicEmbedTextV15
        }
        _ => EmbeddingModel::BGESmallENV15,
    }
}
