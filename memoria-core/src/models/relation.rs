use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::memory::Metadata;
use crate::error::MemoriaError;

/// Typed relation kind between two memories (spec §3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Causes,
    Fixes,
    Supports,
    Opposes,
    Follows,
    Supersedes,
    Derives,
    PartOf,
    Related,
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RelationType::Causes => "causes",
            RelationType::Fixes => "fixes",
            RelationType::Supports => "supports",
            RelationType::Opposes => "opposes",
            RelationType::Follows => "follows",
            RelationType::Supersedes => "supersedes",
            RelationType::Derives => "derives",
            RelationType::PartOf => "part_of",
            RelationType::Related => "related",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for RelationType {
    type Err = MemoriaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "causes" => Ok(Self::Causes),
            "fixes" => Ok(Self::Fixes),
            "supports" => Ok(Self::Supports),
            "opposes" => Ok(Self::Opposes),
            "follows" => Ok(Self::Follows),
            "supersedes" => Ok(Self::Supersedes),
            "derives" => Ok(Self::Derives),
            "part_of" => Ok(Self::PartOf),
            "related" => Ok(Self::Related),
            other => Err(MemoriaError::InvalidInput(format!(
                "unknown relation type: {other}"
            ))),
        }
    }
}

/// Who/what created a relation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CreatedBy {
    User,
    Auto,
    System,
    AiSuggested,
}

impl std::fmt::Display for CreatedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CreatedBy::User => "user",
            CreatedBy::Auto => "auto",
            CreatedBy::System => "system",
            CreatedBy::AiSuggested => "ai_suggested",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for CreatedBy {
    type Err = MemoriaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "auto" => Ok(Self::Auto),
            "system" => Ok(Self::System),
            "ai_suggested" => Ok(Self::AiSuggested),
            other => Err(MemoriaError::InvalidInput(format!(
                "unknown created_by: {other}"
            ))),
        }
    }
}

/// A typed, weighted, directed edge between two logical memories (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relation {
    pub id: Uuid,
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub relation_type: RelationType,
    pub weight: f32,
    pub created_by: CreatedBy,
    pub created_at: DateTime<Utc>,
    pub metadata: Metadata,
}

impl Relation {
    pub fn new(
        source_id: Uuid,
        target_id: Uuid,
        relation_type: RelationType,
        weight: f32,
        created_by: CreatedBy,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            target_id,
            relation_type,
            weight,
            created_by,
            created_at: Utc::now(),
            metadata,
        }
    }
}

/// Direction of a relation relative to a pivot memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    Both,
}

/// A proposed-but-not-persisted relation offered by the Graph Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub source_id: Uuid,
    pub source_preview: String,
    pub source_kind: String,
    pub source_project: Option<String>,
    pub target_id: Uuid,
    pub target_preview: String,
    pub target_kind: String,
    pub target_project: Option<String>,
    pub relation_type: RelationType,
    pub confidence: f32,
    pub reason: String,
    pub shared_tags: Vec<String>,
}
