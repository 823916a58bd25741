use uuid::Uuid;

use super::memory::Payload;

/// Fixed namespace for deterministic chunk ids (SPEC_FULL §3.1). A chunk id is
/// `UUIDv5(POINT_NAMESPACE, "{memory_id}__chunk_{index}")`, which must be
/// reproducible across process restarts, so this constant is never derived at
/// runtime.
pub const POINT_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6d, 0x65, 0x6d, 0x6f, 0x72, 0x69, 0x61, 0x2d, 0x70, 0x6f, 0x69, 0x6e, 0x74, 0x2d, 0x6e, 0x73,
]);

/// Compute the deterministic id of chunk `index` belonging to `memory_id`.
pub fn chunk_point_id(memory_id: Uuid, index: usize) -> Uuid {
    Uuid::new_v5(
        &POINT_NAMESPACE,
        format!("{memory_id}__chunk_{index}").as_bytes(),
    )
}

/// A single row in the vector store, as returned by `get`/`scroll`/`search`.
#[derive(Debug, Clone)]
pub struct StoredPoint {
    pub id: Uuid,
    pub payload: Payload,
    pub vector: Option<Vec<f32>>,
}

/// A `StoredPoint` plus its similarity score, as returned by `search`.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub point: StoredPoint,
    pub score: f32,
}

impl StoredPoint {
    pub fn is_chunk(&self) -> bool {
        self.payload
            .get("is_chunk")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn chunk_index(&self) -> Option<usize> {
        self.payload
            .get("chunk_index")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
    }

    /// True for the chunk-0 point of a multi-chunk memory, or the sole point
    /// of a non-chunked memory — the "representative point" (glossary).
    pub fn is_representative(&self) -> bool {
        !self.is_chunk() || self.chunk_index() == Some(0)
    }

    pub fn parent_id(&self) -> Option<Uuid> {
        self.payload
            .get("parent_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    /// The logical memory id this point belongs to: `parent_id` if present,
    /// else the point's own id (spec §4.4 recall de-dup rule).
    pub fn logical_id(&self) -> Uuid {
        self.parent_id().unwrap_or(self.id)
    }
}
