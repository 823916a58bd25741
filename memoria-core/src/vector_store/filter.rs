use std::collections::HashMap;

use qdrant_client::qdrant::{Condition, FieldCondition, Filter as QdrantFilter, Range};
use serde_json::Value;

/// A field predicate in the vector-store filter contract (spec §4.3).
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Scalar → exact match.
    Eq(Value),
    /// List → any-of.
    AnyOf(Vec<Value>),
    /// Range dict → numeric range predicate.
    Range {
        gte: Option<f64>,
        lte: Option<f64>,
        gt: Option<f64>,
        lt: Option<f64>,
    },
    /// `__text_match` → whitespace-tokenized AND match against `content`.
    TextMatch(String),
}

pub type Filter = HashMap<String, FilterValue>;

/// Translate the core's field-predicate map into a Qdrant filter. Pure and
/// unit-testable without a live Qdrant instance (spec §4.3).
pub fn translate_filter(filter: &Filter) -> QdrantFilter {
    let mut must = Vec::with_capacity(filter.len());

    for (field, value) in filter {
        match value {
            FilterValue::Eq(v) => {
                if let Some(condition) = eq_condition(field, v) {
                    must.push(condition);
                }
            }
            FilterValue::AnyOf(values) => {
                let keywords: Vec<String> = values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                if !keywords.is_empty() {
                    must.push(Condition::matches(field, keywords));
                }
            }
            FilterValue::Range { gte, lte, gt, lt } => {
                must.push(Condition::field(FieldCondition {
                    key: field.clone(),
                    range: Some(Range {
                        gte: *gte,
                        lte: *lte,
                        gt: *gt,
                        lt: *lt,
                    }),
                    ..Default::default()
                }));
            }
            FilterValue::TextMatch(text) => {
                for token in text.split_whitespace() {
                    must.push(Condition::matches("content", token.to_string()));
                }
            }
        }
    }

    QdrantFilter {
        must,
        ..Default::default()
    }
}

fn eq_condition(field: &str, value: &Value) -> Option<Condition> {
    match value {
        Value::String(s) => Some(Condition::matches(field, s.clone())),
        Value::Bool(b) => Some(Condition::matches(field, *b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Condition::matches(field, i))
            } else {
                n.as_f64().map(|f| {
                    Condition::field(FieldCondition {
                        key: field.to_string(),
                        range: Some(Range {
                            gte: Some(f),
                            lte: Some(f),
                            gt: None,
                            lt: None,
                        }),
                        ..Default::default()
                    })
                })
            }
        }
        _ => None,
    }
}
