use std::env;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(var, val, error = %e, "invalid env value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(var, val, error = %e, "invalid env value, ignoring");
                None
            }
        },
        Err(_) => None,
    }
}

fn parse_env_list(var: &str, default: &[&str]) -> Vec<String> {
    match env::var(var) {
        Ok(val) if !val.is_empty() => val.split('|').map(|s| s.to_string()).collect(),
        _ => default.iter().map(|s| s.to_string()).collect(),
    }
}

/// Root configuration aggregate, assembled from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub vector_store: VectorStoreConfig,
    pub embedder: EmbedderConfig,
    pub chunking: ChunkingConfig,
    pub recall: RecallConfig,
    pub consolidation: ConsolidationConfig,
    pub relational_store: RelationalStoreConfig,
    pub working_memory: WorkingMemoryConfig,
    pub rate_limiter: RateLimiterTunings,
    pub circuit_breaker: CircuitBreakerTunings,
}

#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    pub local_path: Option<String>,
    pub remote_host: Option<String>,
    pub remote_port: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    pub host: Option<String>,
    pub model: String,
    pub dim: usize,
    pub cache_path: Option<String>,
    pub cache_enabled: bool,
}

/// §4.1 chunker knobs.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
    pub preserve_sentences: bool,
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            min_chunk_size: 50,
            preserve_sentences: true,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                ". ".to_string(),
                "! ".to_string(),
                "? ".to_string(),
                "; ".to_string(),
                ", ".to_string(),
                " ".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecallConfig {
    pub default_recall_limit: usize,
    pub min_similarity_score: f32,
}

/// §4.5 consolidation/forgetting/decay/boost knobs.
#[derive(Debug, Clone)]
pub struct ConsolidationConfig {
    pub consolidation_threshold: f32,
    pub max_cluster_size: usize,
    pub forgetting_days: i64,
    pub min_importance_threshold: f32,
    pub min_access_count_for_forgetting: i64,
    pub decay_rate: f64,
    pub min_days_since_access_for_decay: i64,
    pub boost_amount: f32,
    pub max_importance: f32,
    pub suggest_relations_limit: usize,
    pub discover_relations_limit: usize,
    pub auto_accept_threshold: f32,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            consolidation_threshold: 0.9,
            max_cluster_size: 10,
            forgetting_days: 30,
            min_importance_threshold: 0.3,
            min_access_count_for_forgetting: 2,
            decay_rate: 0.95,
            min_days_since_access_for_decay: 14,
            boost_amount: 0.05,
            max_importance: 1.0,
            suggest_relations_limit: 10,
            discover_relations_limit: 20,
            auto_accept_threshold: 0.92,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelationalStoreConfig {
    pub url: Option<String>,
    pub pool_min: u32,
    pub pool_max: u32,
    pub run_migrations: bool,
}

/// §4.7 working memory knobs. `history_max` is fixed per spec, not configurable.
#[derive(Debug, Clone)]
pub struct WorkingMemoryConfig {
    pub max_size: usize,
    pub history_max: usize,
}

/// §4.8 supplement: default per-service tunings. Not wired into the adapters
/// automatically — a deployment composing a remote adapter picks these up.
#[derive(Debug, Clone)]
pub struct RateLimiterTunings {
    pub embedder_max_requests: u32,
    pub embedder_window_secs: u64,
    pub vector_store_max_requests: u32,
    pub vector_store_window_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerTunings {
    pub embedder_failure_threshold: u32,
    pub embedder_recovery_timeout_secs: u64,
    pub embedder_success_threshold: u32,
    pub vector_store_failure_threshold: u32,
    pub vector_store_recovery_timeout_secs: u64,
    pub vector_store_success_threshold: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vector_store: VectorStoreConfig {
                local_path: env::var("QDRANT_LOCAL_PATH").ok(),
                remote_host: env::var("QDRANT_HOST").ok(),
                remote_port: parse_env_opt("QDRANT_PORT"),
            },
            embedder: EmbedderConfig {
                host: env::var("EMBEDDER_HOST").ok(),
                model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "BAAI/bge-small-en-v1.5".to_string()),
                dim: parse_env_or("EMBEDDING_DIM", 384),
                cache_path: env::var("EMBEDDING_CACHE_PATH").ok(),
                cache_enabled: parse_env_or("EMBEDDING_CACHE_ENABLED", true),
            },
            chunking: ChunkingConfig {
                chunk_size: parse_env_or("CHUNK_SIZE", 500),
                chunk_overlap: parse_env_or("CHUNK_OVERLAP", 50),
                min_chunk_size: parse_env_or("MIN_CHUNK_SIZE", 50),
                preserve_sentences: parse_env_or("PRESERVE_SENTENCES", true),
                separators: parse_env_list(
                    "CHUNK_SEPARATORS",
                    &["\n\n", "\n", ". ", "! ", "? ", "; ", ", ", " "],
                ),
            },
            recall: RecallConfig {
                default_recall_limit: parse_env_or("DEFAULT_RECALL_LIMIT", 5),
                min_similarity_score: parse_env_or("MIN_SIMILARITY_SCORE", 0.5),
            },
            consolidation: ConsolidationConfig {
                consolidation_threshold: parse_env_or("CONSOLIDATION_THRESHOLD", 0.9),
                max_cluster_size: parse_env_or("MAX_CLUSTER_SIZE", 10),
                forgetting_days: parse_env_or("FORGETTING_DAYS", 30),
                min_importance_threshold: parse_env_or("MIN_IMPORTANCE_THRESHOLD", 0.3),
                min_access_count_for_forgetting: parse_env_or("MIN_ACCESS_COUNT_FORGETTING", 2),
                decay_rate: parse_env_or("DECAY_RATE", 0.95),
                min_days_since_access_for_decay: parse_env_or("MIN_DAYS_SINCE_ACCESS_DECAY", 14),
                boost_amount: parse_env_or("BOOST_AMOUNT", 0.05),
                max_importance: parse_env_or("MAX_IMPORTANCE", 1.0),
                suggest_relations_limit: parse_env_or("SUGGEST_RELATIONS_LIMIT", 10),
                discover_relations_limit: parse_env_or("DISCOVER_RELATIONS_LIMIT", 20),
                auto_accept_threshold: parse_env_or("AUTO_ACCEPT_THRESHOLD", 0.92),
            },
            relational_store: RelationalStoreConfig {
                url: env::var("DATABASE_URL").ok(),
                pool_min: parse_env_or("DB_POOL_MIN", 2),
                pool_max: parse_env_or("DB_POOL_MAX", 10),
                run_migrations: parse_env_or("DB_RUN_MIGRATIONS", true),
            },
            working_memory: WorkingMemoryConfig {
                max_size: parse_env_or("WORKING_MEMORY_MAX_SIZE", 500),
                history_max: 100,
            },
            rate_limiter: RateLimiterTunings {
                embedder_max_requests: parse_env_or("RATE_LIMIT_EMBEDDER_MAX_REQUESTS", 100),
                embedder_window_secs: parse_env_or("RATE_LIMIT_EMBEDDER_WINDOW_SECS", 60),
                vector_store_max_requests: parse_env_or(
                    "RATE_LIMIT_VECTOR_STORE_MAX_REQUESTS",
                    500,
                ),
                vector_store_window_secs: parse_env_or("RATE_LIMIT_VECTOR_STORE_WINDOW_SECS", 60),
            },
            circuit_breaker: CircuitBreakerTunings {
                embedder_failure_threshold: parse_env_or("CB_EMBEDDER_FAILURE_THRESHOLD", 3),
                embedder_recovery_timeout_secs: parse_env_or(
                    "CB_EMBEDDER_RECOVERY_TIMEOUT_SECS",
                    30,
                ),
                embedder_success_threshold: parse_env_or("CB_EMBEDDER_SUCCESS_THRESHOLD", 1),
                vector_store_failure_threshold: parse_env_or(
                    "CB_VECTOR_STORE_FAILURE_THRESHOLD",
                    5,
                ),
                vector_store_recovery_timeout_secs: parse_env_or(
                    "CB_VECTOR_STORE_RECOVERY_TIMEOUT_SECS",
                    15,
                ),
                vector_store_success_threshold: parse_env_or(
                    "CB_VECTOR_STORE_SUCCESS_THRESHOLD",
                    2,
                ),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}
