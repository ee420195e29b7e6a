//! The learning value type and its category set.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Confidence stored when the caller omits it or passes zero.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Result count used by `search` when the caller passes zero.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Result count used by `list` when the caller passes zero.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Count of learnings per category name, sorted by name.
pub type CategoryStats = BTreeMap<String, usize>;

/// Category of a learning. The set is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Communication style, format preferences.
    Preferences,
    /// Personal facts that help tailor responses.
    PersonalContext,
    /// Technical preferences and stack details.
    Technical,
    /// Growth patterns and ongoing personal work.
    PersonalGrowth,
    /// Things that went wrong and should be avoided.
    Mistakes,
    /// Catch-all.
    #[default]
    General,
}

impl Category {
    /// Every category, in catalog order.
    pub const ALL: [Category; 6] = [
        Self::Preferences,
        Self::PersonalContext,
        Self::Technical,
        Self::PersonalGrowth,
        Self::Mistakes,
        Self::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preferences => "preferences",
            Self::PersonalContext => "personal_context",
            Self::Technical => "technical",
            Self::PersonalGrowth => "personal_growth",
            Self::Mistakes => "mistakes",
            Self::General => "general",
        }
    }

    /// Parse a category, mapping empty or unrecognized input to `General`.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    /// Names of every category, in catalog order.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Category::as_str).collect()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the known categories.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category '{0}'")]
pub struct UnknownCategory(pub String);

impl std::str::FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// A persisted unit of knowledge about the user or past interactions.
///
/// Values handed out by a backend are detached snapshots: mutating one has no
/// effect on the stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Learning {
    /// Backend-assigned identifier. Opaque; never assume an encoding.
    pub id: String,
    pub category: Category,
    pub content: String,
    /// Comma-joined free-form labels.
    #[serde(default)]
    pub tags: String,
    pub confidence: f64,
    pub use_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Learning {
    /// Create a fresh learning with `use_count = 0` and both timestamps set to `now`.
    pub fn new(
        id: impl Into<String>,
        category: Category,
        content: impl Into<String>,
        tags: impl Into<String>,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            content: content.into(),
            tags: tags.into(),
            confidence,
            use_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Format a timestamp as fixed-width RFC 3339 (UTC, microseconds).
///
/// Fixed width keeps lexical order equal to chronological order, which the
/// SQLite schema relies on for `ORDER BY updated_at`.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// The current time at the precision timestamps are persisted with, so a
/// freshly built learning equals the one read back from storage.
pub(crate) fn current_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Parse an RFC 3339 timestamp into UTC.
pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
