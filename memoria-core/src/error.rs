use thiserror::Error;

/// Every error kind the core surfaces to callers (spec §7).
#[derive(Error, Debug)]
pub enum MemoriaError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("vector store error: {0}")]
    StoreError(String),

    #[error("relational store error: {0}")]
    RelationalError(#[from] RelationalError),

    #[error("embedding error: {0}")]
    EmbedError(String),

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("circuit open for {service}, retry after {retry_after_secs}s")]
    CircuitOpen {
        service: String,
        retry_after_secs: u64,
    },

    #[error("relation ({source_id}, {target_id}, {relation_type}) already exists")]
    DuplicateRelation {
        source_id: uuid::Uuid,
        target_id: uuid::Uuid,
        relation_type: String,
    },

    #[error("chunk invariant violated for memory {memory_id}: {detail}")]
    ChunkInvariantViolation {
        memory_id: uuid::Uuid,
        detail: String,
    },

    #[error("graph operations unavailable: no relational store adapter configured")]
    GraphUnavailable,
}

/// Subtypes of relational-store failure (spec §7).
#[derive(Error, Debug)]
pub enum RelationalError {
    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("connection pool exhausted after waiting {timeout_secs}s")]
    PoolExhausted { timeout_secs: u64 },

    #[error("query error: {0}")]
    QueryError(String),

    #[error("transaction error: {0}")]
    TransactionError(String),

    #[error("migration error: {0}")]
    MigrationError(String),

    #[error("record not found")]
    RecordNotFound,
}

impl From<sqlx::Error> for MemoriaError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => {
                MemoriaError::RelationalError(RelationalError::RecordNotFound)
            }
            sqlx::Error::PoolTimedOut => {
                MemoriaError::RelationalError(RelationalError::PoolExhausted { timeout_secs: 0 })
            }
            other => MemoriaError::RelationalError(RelationalError::QueryError(other.to_string())),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for MemoriaError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        MemoriaError::RelationalError(RelationalError::MigrationError(err.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, MemoriaError>;
