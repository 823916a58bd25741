//! Export projection (spec §4.9, Testable Property 12): collapse every
//! point of a collection down to one entry per logical memory, independent
//! of any file or transport format. Writing the result to disk is left to
//! callers outside this crate.

use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{Payload, StoredPoint};

const STRIPPED_FIELDS: &[&str] = &["is_chunk", "parent_id", "chunk_index", "chunk_count", "full_content"];

/// One projected memory, ready for serialization by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportEntry {
    pub memory_id: Uuid,
    pub payload: Payload,
}

/// Group `points` by logical id (`parent_id` if present, else the point's
/// own id), keep the representative point of each group, substitute
/// `full_content` into `content` when present, and strip the physical-point
/// bookkeeping fields the vector store adds on top of a memory's payload.
pub fn project_for_export(points: Vec<StoredPoint>) -> Vec<ExportEntry> {
    let mut representatives: HashMap<Uuid, StoredPoint> = HashMap::new();

    for point in points {
        let logical_id = point.logical_id();
        match representatives.get(&logical_id) {
            Some(existing) if existing.is_representative() => {}
            _ => {
                representatives.insert(logical_id, point);
            }
        }
    }

    representatives
        .into_iter()
        .map(|(memory_id, point)| ExportEntry { memory_id, payload: project_payload(point.payload) })
        .collect()
}

fn project_payload(mut payload: Payload) -> Payload {
    if let Some(full_content) = payload.remove("full_content") {
        payload.insert("content".to_string(), full_content);
    }
    for field in STRIPPED_FIELDS {
        payload.remove(*field);
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(id: Uuid, parent_id: Option<Uuid>, is_chunk: bool, chunk_index: Option<u64>, content: &str) -> StoredPoint {
        let mut payload = Payload::new();
        payload.insert("content".to_string(), json!(content));
        payload.insert("is_chunk".to_string(), json!(is_chunk));
        if let Some(parent_id) = parent_id {
            payload.insert("parent_id".to_string(), json!(parent_id.to_string()));
        }
        if let Some(idx) = chunk_index {
            payload.insert("chunk_index".to_string(), json!(idx));
        }
        StoredPoint { id, payload, vector: None }
    }

    #[test]
    fn non_chunked_memory_passes_through_unchanged() {
        let id = Uuid::new_v4();
        let p = point(id, None, false, None, "hello");
        let exported = project_for_export(vec![p]);
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].memory_id, id);
        assert_eq!(exported[0].payload.get("content").unwrap(), "hello");
        assert!(!exported[0].payload.contains_key("is_chunk"));
    }

    #[test]
    fn chunked_memory_collapses_to_one_entry_using_full_content() {
        let memory_id = Uuid::new_v4();
        let chunk0_id = crate::models::chunk_point_id(memory_id, 0);
        let chunk1_id = crate::models::chunk_point_id(memory_id, 1);

        let mut chunk0 = point(chunk0_id, Some(memory_id), true, Some(0), "chunk one");
        chunk0.payload.insert("full_content".to_string(), json!("chunk one chunk two"));
        chunk0.payload.insert("chunk_count".to_string(), json!(2));
        let chunk1 = point(chunk1_id, Some(memory_id), true, Some(1), "chunk two");

        let exported = project_for_export(vec![chunk0, chunk1]);
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].memory_id, memory_id);
        assert_eq!(exported[0].payload.get("content").unwrap(), "chunk one chunk two");
        assert!(!exported[0].payload.contains_key("full_content"));
        assert!(!exported[0].payload.contains_key("parent_id"));
        assert!(!exported[0].payload.contains_key("chunk_count"));
    }

    #[test]
    fn multiple_memories_stay_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let exported = project_for_export(vec![point(a, None, false, None, "a"), point(b, None, false, None, "b")]);
        assert_eq!(exported.len(), 2);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(project_for_export(Vec::new()).is_empty());
    }
}
