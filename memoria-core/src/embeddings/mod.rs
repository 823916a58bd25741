mod cache;
mod fastembed_provider;

pub use cache::{CacheStats, EmbeddingCache, MostAccessedEntry};
pub use fastembed_provider::FastEmbedProvider;

use async_trait::async_trait;

use crate::error::Result;

/// Whether text is embedded as a search query or a stored document; models
/// prepend a different prefix string to each (spec §6 "Embedding model contract").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingKind {
    Query,
    Document,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    pub vector: Vec<f32>,
    pub dims: usize,
    pub model: String,
    pub cached: bool,
}

/// External model runner the Lifecycle/Consolidation/Graph managers embed
/// through (spec §1 "out of scope" collaborator, shipped here as one concrete
/// local adapter behind this trait, per §1.1).
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str, kind: EmbeddingKind) -> Result<EmbeddingResult>;

    /// Liveness probe; must succeed during initialization.
    async fn check_connection(&self) -> Result<bool>;

    /// Best-effort model pull/warm-up.
    async fn ensure_model(&self) -> Result<bool>;

    fn dimensions(&self) -> usize;

    fn model_name(&self) -> &str;
}
