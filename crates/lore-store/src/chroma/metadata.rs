//! Typed view of the per-record metadata map stored in Chroma.
//!
//! Decoding never fails: a missing or mistyped field falls back to its zero
//! value so that one malformed record cannot break a whole listing.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::api::Metadata;
use crate::types::{Category, Learning, format_timestamp, parse_timestamp};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LearningMetadata {
    /// Raw category string as stored; decoded leniently into a [`Category`].
    pub category: String,
    pub tags: String,
    pub confidence: f64,
    pub use_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LearningMetadata {
    pub fn from_learning(learning: &Learning) -> Self {
        Self {
            category: learning.category.as_str().to_string(),
            tags: learning.tags.clone(),
            confidence: learning.confidence,
            use_count: learning.use_count,
            created_at: learning.created_at,
            updated_at: learning.updated_at,
        }
    }

    pub fn decode(map: Option<&Metadata>) -> Self {
        let field = |key: &str| map.and_then(|m| m.get(key));
        Self {
            category: field("category")
                .and_then(Value::as_str)
                .unwrap_or(Category::default().as_str())
                .to_string(),
            tags: field("tags")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            confidence: field("confidence").and_then(Value::as_f64).unwrap_or(0.0),
            use_count: field("use_count").map(coerce_count).unwrap_or(0),
            created_at: field("created_at").map(coerce_timestamp).unwrap_or_default(),
            updated_at: field("updated_at").map(coerce_timestamp).unwrap_or_default(),
        }
    }

    pub fn encode(&self) -> Metadata {
        let mut map = Metadata::new();
        map.insert("category".into(), Value::from(self.category.as_str()));
        map.insert("tags".into(), Value::from(self.tags.as_str()));
        map.insert("confidence".into(), Value::from(self.confidence));
        map.insert("use_count".into(), Value::from(self.use_count));
        map.insert("created_at".into(), Value::from(format_timestamp(&self.created_at)));
        map.insert("updated_at".into(), Value::from(format_timestamp(&self.updated_at)));
        map
    }

    pub fn into_learning(self, id: String, content: String) -> Learning {
        Learning {
            id,
            category: Category::parse_lenient(&self.category),
            content,
            tags: self.tags,
            confidence: self.confidence,
            use_count: self.use_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Integer as-is, float truncated toward zero, negatives clamped to zero.
fn coerce_count(value: &Value) -> u64 {
    if let Some(n) = value.as_u64() {
        n
    } else if value.as_i64().is_some() {
        0
    } else if let Some(f) = value.as_f64() {
        if f > 0.0 { f.trunc() as u64 } else { 0 }
    } else {
        0
    }
}

fn coerce_timestamp(value: &Value) -> DateTime<Utc> {
    value
        .as_str()
        .and_then(parse_timestamp)
        .unwrap_or_default()
}
