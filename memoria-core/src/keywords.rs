//! Relation-type heuristic keyword tables and the pure classification/
//! scoring functions the Graph Manager drives them with (spec §4.6). Kept
//! separate from `graph.rs` so the tables can be swapped from a config file
//! without touching traversal/CRUD code (spec §9 "Heuristic keyword sets").

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{MemoryKind, RelationType};

/// Literal keyword tables (English + Italian), ported verbatim from
/// `graph_manager.py::_infer_relation_type` (spec §4.6 SUPPLEMENT).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordSets {
    pub fix: Vec<String>,
    pub problem: Vec<String>,
    pub causal: Vec<String>,
    pub result: Vec<String>,
    pub oppose: Vec<String>,
    pub support: Vec<String>,
    pub supersede: Vec<String>,
    pub part_of: Vec<String>,
    pub derives: Vec<String>,
}

impl Default for KeywordSets {
    fn default() -> Self {
        Self {
            fix: strs(&[
                "fix", "fixed", "soluzione", "risolto", "resolved", "solved",
                "solution", "workaround", "patch", "corrected", "remedy",
            ]),
            problem: strs(&[
                "bug", "errore", "error", "problema", "problem", "issue",
                "crash", "fail", "broken", "not working", "exception", "traceback",
            ]),
            causal: strs(&[
                "decision", "decisione", "choose", "decided", "caused", "leads to",
                "results in", "because", "therefore", "consequently", "implemented",
            ]),
            result: strs(&[
                "result", "outcome", "consequence", "effect", "impact",
                "resulted", "caused by", "due to",
            ]),
            oppose: strs(&[
                "however", "but", "although", "instead", "contrary",
                "tuttavia", "invece", "contrario", "wrong", "incorrect",
                "disagree", "conflict", "contradicts",
            ]),
            support: strs(&[
                "confirms", "supports", "validates", "correct", "agree",
                "conferma", "supporta", "corretto", "consistent", "aligns with",
            ]),
            supersede: strs(&[
                "update", "new version", "replace", "deprecated", "obsolete",
                "aggiornamento", "nuova versione", "sostituisce", "superseded",
                "outdated", "old version", "previous version",
            ]),
            part_of: strs(&["part of", "parte di", "belongs to", "component of", "section of"]),
            derives: strs(&["derived", "deriva", "based on", "extended from", "consolidated"]),
        }
    }
}

impl KeywordSets {
    /// Load an override from a JSON file at startup (spec §9: "expose a
    /// mechanism to override at startup without recompilation"). Any field
    /// omitted in the file keeps its built-in default.
    pub fn load_override(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| crate::error::MemoriaError::InvalidInput(format!(
                "could not read keyword override file {}: {e}",
                path.display()
            )))?;
        serde_json::from_str(&raw).map_err(|e| crate::error::MemoriaError::InvalidInput(format!(
            "malformed keyword override file {}: {e}",
            path.display()
        )))
    }
}

fn strs(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|kw| haystack.contains(kw.as_str()))
}

/// Bidirectional keyword-rule classifier (spec §4.6), first match wins.
/// `source_content`/`target_content` need not be pre-lowercased.
#[allow(clippy::too_many_arguments)]
pub fn infer_relation_type(
    keywords: &KeywordSets,
    source_content: &str,
    target_content: &str,
    source_tags: &HashSet<String>,
    target_tags: &HashSet<String>,
    source_created_at: DateTime<Utc>,
    target_created_at: DateTime<Utc>,
) -> RelationType {
    let source = source_content.to_lowercase();
    let target = target_content.to_lowercase();

    let source_has_fix = contains_any(&source, &keywords.fix);
    let target_has_problem = contains_any(&target, &keywords.problem);
    if source_has_fix && target_has_problem {
        return RelationType::Fixes;
    }
    let target_has_fix = contains_any(&target, &keywords.fix);
    let source_has_problem = contains_any(&source, &keywords.problem);
    if source_has_problem && target_has_fix {
        return RelationType::Fixes;
    }

    let source_has_causal = contains_any(&source, &keywords.causal);
    let target_has_result = contains_any(&target, &keywords.result);
    if source_has_causal && target_has_result {
        return RelationType::Causes;
    }
    if source_has_causal {
        return RelationType::Causes;
    }

    if contains_any(&source, &keywords.oppose) || contains_any(&target, &keywords.oppose) {
        return RelationType::Opposes;
    }
    if contains_any(&source, &keywords.support) || contains_any(&target, &keywords.support) {
        return RelationType::Supports;
    }
    if contains_any(&source, &keywords.supersede) || contains_any(&target, &keywords.supersede) {
        return RelationType::Supersedes;
    }
    if contains_any(&source, &keywords.part_of) {
        return RelationType::PartOf;
    }
    if contains_any(&source, &keywords.derives) {
        return RelationType::Derives;
    }

    let delta_secs = (source_created_at - target_created_at).num_seconds().abs();
    let shares_tags = source_tags.intersection(target_tags).next().is_some();
    if source_created_at > target_created_at {
        if delta_secs < 3600 && shares_tags {
            return RelationType::Follows;
        }
        if delta_secs < 1800 {
            return RelationType::Follows;
        }
    }

    RelationType::Related
}

/// Composite confidence score (spec §4.6): vector similarity plus boosts for
/// a specific (non-generic) type, shared tags, same kind, and same project.
pub fn composite_confidence(
    base_score: f32,
    relation_type: RelationType,
    shared_tag_count: usize,
    source_kind: MemoryKind,
    target_kind: MemoryKind,
    source_project: Option<&str>,
    target_project: Option<&str>,
) -> f32 {
    let mut c = base_score;
    if relation_type != RelationType::Related {
        c = (c * 1.10).min(1.0);
    }

    let tag_boost = (0.03 * shared_tag_count as f32).min(0.15);
    c = (c + tag_boost).min(1.0);

    if source_kind == target_kind {
        c = (c + 0.02).min(1.0);
    }

    if let (Some(sp), Some(tp)) = (source_project, target_project) {
        if sp == tp {
            c = (c + 0.15).min(1.0);
        }
    }

    (c * 1000.0).round() / 1000.0
}

/// Human-readable explanation for a non-auto-accepted suggestion (spec §4.6
/// SUPPLEMENT, ported from `graph_manager.py::_explain_suggestion`). Surfaced
/// data only; it has no effect on ranking or acceptance.
pub fn explain_suggestion(
    relation_type: RelationType,
    shared_tags: &[String],
    source_project: Option<&str>,
    target_project: Option<&str>,
) -> String {
    let same_project = matches!((source_project, target_project), (Some(a), Some(b)) if a == b);
    let project_note = if same_project {
        format!(" (same project: {})", source_project.unwrap_or_default())
    } else {
        String::new()
    };

    let base = match relation_type {
        RelationType::Fixes => "Appears to be a solution to a problem".to_string(),
        RelationType::Causes => "Contains a decision or action leading to consequences".to_string(),
        RelationType::Follows => "Subsequent event in the same context".to_string(),
        RelationType::Opposes => "Contains potentially contradicting information".to_string(),
        RelationType::Supports => "Contains supporting or confirming information".to_string(),
        RelationType::Supersedes => "Appears to be an updated version".to_string(),
        RelationType::Derives => "Derived or consolidated content".to_string(),
        RelationType::PartOf => "Appears to be a component of a larger concept".to_string(),
        RelationType::Related => {
            if shared_tags.is_empty() {
                "Similar content".to_string()
            } else {
                format!(
                    "Similar content, shared tags: {}",
                    shared_tags.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
                )
            }
        }
    };

    format!("{base}{project_note}")
}
