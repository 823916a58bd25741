use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{MemoriaError, Result};

/// Free-form metadata: string keys to JSON scalars/arrays/objects.
pub type Metadata = HashMap<String, Value>;

/// The vector-store payload map a `Point` carries (spec §6 "memory point payload").
pub type Payload = HashMap<String, Value>;

/// `episodic | semantic | procedural` — one-to-one with a vector collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Episodic,
    Semantic,
    Procedural,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 3] = [
        MemoryKind::Episodic,
        MemoryKind::Semantic,
        MemoryKind::Procedural,
    ];

    /// Vector collection name this kind maps to (spec §6).
    pub fn collection_name(self) -> &'static str {
        match self {
            MemoryKind::Episodic => "episodic",
            MemoryKind::Semantic => "semantic",
            MemoryKind::Procedural => "procedural",
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.collection_name())
    }
}

impl std::str::FromStr for MemoryKind {
    type Err = MemoriaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "episodic" => Ok(Self::Episodic),
            "semantic" => Ok(Self::Semantic),
            "procedural" => Ok(Self::Procedural),
            other => Err(MemoriaError::InvalidInput(format!(
                "unknown memory kind: {other}"
            ))),
        }
    }
}

/// Per-kind optional fields, modeled as a tagged union (spec §9 design note)
/// rather than the source's untyped dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EpisodicFields {
    pub session_id: Option<String>,
    pub project: Option<String>,
    pub user_action: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SemanticFields {
    pub domain: Option<String>,
    pub source: Option<String>,
    pub confidence: Option<f32>,
    pub last_verified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProceduralFields {
    pub category: Option<String>,
    pub steps: Option<Vec<String>>,
    pub success_rate: Option<f32>,
    pub execution_count: Option<u64>,
    pub last_executed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KindFields {
    Episodic(EpisodicFields),
    Semantic(SemanticFields),
    Procedural(ProceduralFields),
}

impl KindFields {
    pub fn kind(&self) -> MemoryKind {
        match self {
            KindFields::Episodic(_) => MemoryKind::Episodic,
            KindFields::Semantic(_) => MemoryKind::Semantic,
            KindFields::Procedural(_) => MemoryKind::Procedural,
        }
    }

    fn default_for(kind: MemoryKind) -> Self {
        match kind {
            MemoryKind::Episodic => KindFields::Episodic(EpisodicFields::default()),
            MemoryKind::Semantic => KindFields::Semantic(SemanticFields::default()),
            MemoryKind::Procedural => KindFields::Procedural(ProceduralFields::default()),
        }
    }
}

/// A logical memory: the user-facing unit of remembered content (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    pub id: Uuid,
    pub content: String,
    pub tags: HashSet<String>,
    pub importance: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    pub access_count: u64,
    pub metadata: Metadata,
    pub kind_fields: KindFields,
    /// Advisory hint set by the Graph Manager; not an invariant.
    pub has_relations: bool,
}

impl Memory {
    pub fn new(kind: MemoryKind, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            tags: HashSet::new(),
            importance: 0.5,
            created_at: now,
            updated_at: now,
            accessed_at: now,
            access_count: 0,
            metadata: Metadata::new(),
            kind_fields: KindFields::default_for(kind),
            has_relations: false,
        }
    }

    pub fn kind(&self) -> MemoryKind {
        self.kind_fields.kind()
    }

    /// Validate invariants §3: `importance in [0,1]`, `created_at <= updated_at`,
    /// `access_count >= 0` (guaranteed by the unsigned type).
    pub fn validate(&self) -> Result<()> {
        if self.content.is_empty() {
            return Err(MemoriaError::InvalidInput("content must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.importance) {
            return Err(MemoriaError::InvalidInput(format!(
                "importance must be in [0,1], got {}",
                self.importance
            )));
        }
        if self.created_at > self.updated_at {
            return Err(MemoriaError::InvalidInput(
                "created_at must be <= updated_at".into(),
            ));
        }
        Ok(())
    }

    /// Sigmoid-curve episodic relevance (SPEC_FULL §4.5 supplement), independent
    /// of `decay_importance`'s linear decay. Non-episodic kinds always return 1.0.
    pub fn episode_relevance(&self, decay_days: f64, decay_factor: f64) -> f64 {
        if self.kind() != MemoryKind::Episodic {
            return 1.0;
        }

        let days_since_access = (Utc::now() - self.accessed_at).num_days() as f64;
        if days_since_access <= 0.0 {
            return 1.0;
        }

        let clamped_factor = decay_factor.clamp(0.01, 0.99);
        let steepness = -(1.0_f64 / clamped_factor - 1.0).ln() / decay_days;
        1.0 / (1.0 + ((days_since_access - decay_days) * steepness).exp())
    }

    /// The `project` field, if this memory carries one (episodic/semantic/procedural
    /// memories may all be tagged with a project via metadata for cross-kind grouping).
    pub fn project(&self) -> Option<&str> {
        match &self.kind_fields {
            KindFields::Episodic(f) => f.project.as_deref(),
            _ => self
                .metadata
                .get("project")
                .and_then(|v| v.as_str()),
        }
    }

    /// Serialize this memory's fields into the vector-store payload contract
    /// (spec §6), for a non-chunked, representative, or chunk point alike —
    /// callers add `is_chunk`/`parent_id`/`chunk_index`/`chunk_count`/
    /// `full_content` on top for chunked storage.
    pub fn to_base_payload(&self) -> Payload {
        let mut payload = Payload::new();
        payload.insert("content".into(), Value::String(self.content.clone()));
        payload.insert(
            "memory_type".into(),
            Value::String(self.kind().to_string()),
        );
        payload.insert(
            "created_at".into(),
            Value::String(self.created_at.to_rfc3339()),
        );
        payload.insert(
            "updated_at".into(),
            Value::String(self.updated_at.to_rfc3339()),
        );
        payload.insert(
            "accessed_at".into(),
            Value::String(self.accessed_at.to_rfc3339()),
        );
        payload.insert(
            "access_count".into(),
            Value::Number(self.access_count.into()),
        );
        payload.insert(
            "importance".into(),
            serde_json::Number::from_f64(self.importance as f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        );
        payload.insert(
            "tags".into(),
            Value::Array(
                self.tags
                    .iter()
                    .cloned()
                    .map(Value::String)
                    .collect::<Vec<_>>(),
            ),
        );
        payload.insert("has_relations".into(), Value::Bool(self.has_relations));

        match &self.kind_fields {
            KindFields::Episodic(f) => {
                insert_opt(&mut payload, "session_id", &f.session_id);
                insert_opt(&mut payload, "project", &f.project);
                insert_opt(&mut payload, "user_action", &f.user_action);
            }
            KindFields::Semantic(f) => {
                insert_opt(&mut payload, "domain", &f.domain);
                insert_opt(&mut payload, "source", &f.source);
                if let Some(c) = f.confidence {
                    payload.insert(
                        "confidence".into(),
                        serde_json::Number::from_f64(c as f64)
                            .map(Value::Number)
                            .unwrap_or(Value::Null),
                    );
                }
                if let Some(v) = f.last_verified {
                    payload.insert("last_verified".into(), Value::String(v.to_rfc3339()));
                }
            }
            KindFields::Procedural(f) => {
                insert_opt(&mut payload, "category", &f.category);
                if let Some(steps) = &f.steps {
                    payload.insert(
                        "steps".into(),
                        Value::Array(steps.iter().cloned().map(Value::String).collect()),
                    );
                }
                if let Some(sr) = f.success_rate {
                    payload.insert(
                        "success_rate".into(),
                        serde_json::Number::from_f64(sr as f64)
                            .map(Value::Number)
                            .unwrap_or(Value::Null),
                    );
                }
                if let Some(ec) = f.execution_count {
                    payload.insert("execution_count".into(), Value::Number(ec.into()));
                }
                if let Some(le) = f.last_executed {
                    payload.insert("last_executed".into(), Value::String(le.to_rfc3339()));
                }
            }
        }

        for (k, v) in &self.metadata {
            payload.entry(k.clone()).or_insert_with(|| v.clone());
        }

        payload
    }

    /// Reconstruct a `Memory` from a point payload (spec §4.4 `get`/`recall`):
    /// `id = parent_id`; `content` prefers `full_content` when present.
    pub fn from_payload(kind: MemoryKind, payload: &Payload) -> Result<Self> {
        let parent_id = payload
            .get("parent_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                MemoriaError::StoreError("payload missing parent_id".to_string())
            })?;

        let content = payload
            .get("full_content")
            .or_else(|| payload.get("content"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let created_at = parse_time(payload, "created_at").unwrap_or_else(Utc::now);
        let updated_at = parse_time(payload, "updated_at").unwrap_or(created_at);
        let accessed_at = parse_time(payload, "accessed_at").unwrap_or(created_at);

        let importance = payload
            .get("importance")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.5) as f32;
        let access_count = payload
            .get("access_count")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let tags: HashSet<String> = payload
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let has_relations = payload
            .get("has_relations")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let known_keys: HashSet<&str> = [
            "content",
            "memory_type",
            "created_at",
            "updated_at",
            "accessed_at",
            "access_count",
            "importance",
            "tags",
            "is_chunk",
            "parent_id",
            "chunk_index",
            "chunk_count",
            "full_content",
            "has_relations",
            "session_id",
            "project",
            "user_action",
            "domain",
            "source",
            "confidence",
            "last_verified",
            "category",
            "steps",
            "success_rate",
            "execution_count",
            "last_executed",
        ]
        .into_iter()
        .collect();

        let kind_fields = match kind {
            MemoryKind::Episodic => KindFields::Episodic(EpisodicFields {
                session_id: str_field(payload, "session_id"),
                project: str_field(payload, "project"),
                user_action: str_field(payload, "user_action"),
            }),
            MemoryKind::Semantic => KindFields::Semantic(SemanticFields {
                domain: str_field(payload, "domain"),
                source: str_field(payload, "source"),
                confidence: payload.get("confidence").and_then(|v| v.as_f64()).map(|f| f as f32),
                last_verified: parse_time(payload, "last_verified"),
            }),
            MemoryKind::Procedural => KindFields::Procedural(ProceduralFields {
                category: str_field(payload, "category"),
                steps: payload.get("steps").and_then(|v| v.as_array()).map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                }),
                success_rate: payload
                    .get("success_rate")
                    .and_then(|v| v.as_f64())
                    .map(|f| f as f32),
                execution_count: payload.get("execution_count").and_then(|v| v.as_u64()),
                last_executed: parse_time(payload, "last_executed"),
            }),
        };

        let metadata = payload
            .iter()
            .filter(|(k, _)| !known_keys.contains(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Memory {
            id: parent_id,
            content,
            tags,
            importance,
            created_at,
            updated_at,
            accessed_at,
            access_count,
            metadata,
            kind_fields,
            has_relations,
        })
    }
}

fn insert_opt(payload: &mut Payload, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        payload.insert(key.to_string(), Value::String(v.clone()));
    }
}

fn str_field(payload: &Payload, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn parse_time(payload: &Payload, key: &str) -> Option<DateTime<Utc>> {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_memory_has_valid_defaults() {
        let m = Memory::new(MemoryKind::Semantic, "hello world");
        assert!(m.validate().is_ok());
        assert_eq!(m.kind(), MemoryKind::Semantic);
        assert_eq!(m.access_count, 0);
    }

    #[test]
    fn validate_rejects_out_of_range_importance() {
        let mut m = Memory::new(MemoryKind::Semantic, "hi");
        m.importance = 1.5;
        assert!(m.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_content() {
        let m = Memory::new(MemoryKind::Semantic, "");
        assert!(m.validate().is_err());
    }

    #[test]
    fn roundtrip_through_payload() {
        let mut m = Memory::new(MemoryKind::Episodic, "did a thing");
        m.tags.insert("t1".into());
        if let KindFields::Episodic(f) = &mut m.kind_fields {
            f.project = Some("proj-x".into());
        }
        m.metadata.insert("custom".into(), Value::String("v".into()));

        let mut payload = m.to_base_payload();
        payload.insert("is_chunk".into(), Value::Bool(false));
        payload.insert("parent_id".into(), Value::String(m.id.to_string()));

        let reconstructed = Memory::from_payload(MemoryKind::Episodic, &payload).unwrap();
        assert_eq!(reconstructed.id, m.id);
        assert_eq!(reconstructed.content, m.content);
        assert_eq!(reconstructed.tags, m.tags);
        assert_eq!(reconstructed.project(), Some("proj-x"));
        assert_eq!(
            reconstructed.metadata.get("custom"),
            Some(&Value::String("v".into()))
        );
    }

    #[test]
    fn episode_relevance_non_episodic_always_one() {
        let m = Memory::new(MemoryKind::Procedural, "x");
        assert_eq!(m.episode_relevance(30.0, 0.9), 1.0);
    }

    #[test]
    fn episode_relevance_decays_over_time() {
        let mut m = Memory::new(MemoryKind::Episodic, "x");
        m.accessed_at = Utc::now() - chrono::Duration::days(60);
        let relevance = m.episode_relevance(30.0, 0.9);
        assert!(relevance < 0.3, "expected strong decay, got {relevance}");
    }
}
