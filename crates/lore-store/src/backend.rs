//! Backend trait for pluggable learning storage.
//!
//! Two implementations with opposite consistency and search models satisfy
//! the same contract:
//!
//! - [`SqliteBackend`](crate::SqliteBackend): embedded file, FTS5 ranking with
//!   a `LIKE` fallback, atomic counters.
//! - [`ChromaBackend`](crate::ChromaBackend): remote collection store, vector
//!   or text queries, whole-record rewrites.
//!
//! # Example
//!
//! ```ignore
//! use lore_store::{Backend, Category, SqliteBackend};
//!
//! let backend = SqliteBackend::open("/data/learnings.db")?;
//! let learning = backend
//!     .add(Category::Preferences, "Prefers concise answers", "formatting", 0.9)
//!     .await?;
//! let hits = backend.search("concise", None, 0).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Category, CategoryStats, Learning};

/// Trait for learning storage backends.
///
/// # Thread Safety
///
/// One instance is shared by every concurrent request for the lifetime of the
/// process, so implementations must be `Send + Sync`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;

    /// Persist a new learning. Assigns the id and both timestamps; the
    /// confidence is stored as given.
    async fn add(
        &self,
        category: Category,
        content: &str,
        tags: &str,
        confidence: f64,
    ) -> Result<Learning>;

    /// Return learnings relevant to `query`, optionally restricted to one
    /// category. A `limit` of zero means [`DEFAULT_SEARCH_LIMIT`](crate::DEFAULT_SEARCH_LIMIT).
    ///
    /// Ordering is backend-defined but deterministic for a fixed store state.
    async fn search(
        &self,
        query: &str,
        category: Option<Category>,
        limit: usize,
    ) -> Result<Vec<Learning>>;

    /// Return learnings newest-updated first. A `limit` of zero means
    /// [`DEFAULT_LIST_LIMIT`](crate::DEFAULT_LIST_LIMIT).
    async fn list(&self, category: Option<Category>, limit: usize) -> Result<Vec<Learning>>;

    /// Replace content, tags and confidence and refresh `updated_at`.
    /// Category and use count are preserved.
    async fn update(&self, id: &str, content: &str, tags: &str, confidence: f64) -> Result<()>;

    /// Remove a learning. Deletion is final.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Record that a learning was surfaced to a consumer.
    ///
    /// Fire-and-forget: failures are logged by the implementation and never
    /// reach the caller.
    async fn increment_use_count(&self, id: &str);

    /// Count learnings per category observed in the store.
    async fn stats(&self) -> Result<CategoryStats>;

    /// Release backend resources. Calling it more than once is harmless.
    async fn close(&self) -> Result<()>;
}

/// A backend shared across handlers.
pub type SharedBackend = Arc<dyn Backend>;

pub(crate) fn effective_limit(limit: usize, default: usize) -> usize {
    if limit == 0 { default } else { limit }
}

#[cfg(any(test, feature = "testing"))]
pub use mock::MockBackend;

#[cfg(any(test, feature = "testing"))]
mod mock {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;

    use super::{Backend, effective_limit};
    use crate::error::{Result, StoreError};
    use crate::types::{
        Category, CategoryStats, DEFAULT_LIST_LIMIT, DEFAULT_SEARCH_LIMIT, Learning,
    };

    /// In-memory backend for tests.
    ///
    /// Search is a case-insensitive substring match of any query word against
    /// content and tags. Can be switched into a failing mode to exercise error
    /// paths.
    #[derive(Debug, Default)]
    pub struct MockBackend {
        learnings: Mutex<BTreeMap<u64, Learning>>,
        next_id: Mutex<u64>,
        failure: Mutex<Option<String>>,
    }

    impl MockBackend {
        /// Create a new empty mock backend.
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every fallible operation return an error with this message.
        pub fn fail_with(&self, message: impl Into<String>) {
            *self.failure.lock() = Some(message.into());
        }

        /// Get a stored learning by id.
        pub fn get(&self, id: &str) -> Option<Learning> {
            let key = id.parse::<u64>().ok()?;
            self.learnings.lock().get(&key).cloned()
        }

        /// Number of stored learnings.
        pub fn len(&self) -> usize {
            self.learnings.lock().len()
        }

        /// Check if the backend is empty.
        pub fn is_empty(&self) -> bool {
            self.learnings.lock().is_empty()
        }

        fn check(&self) -> Result<()> {
            match self.failure.lock().as_ref() {
                Some(msg) => Err(StoreError::InvalidData(msg.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl Backend for MockBackend {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn add(
            &self,
            category: Category,
            content: &str,
            tags: &str,
            confidence: f64,
        ) -> Result<Learning> {
            self.check()?;
            let id = {
                let mut next = self.next_id.lock();
                *next += 1;
                *next
            };
            let learning =
                Learning::new(id.to_string(), category, content, tags, confidence, Utc::now());
            self.learnings.lock().insert(id, learning.clone());
            Ok(learning)
        }

        async fn search(
            &self,
            query: &str,
            category: Option<Category>,
            limit: usize,
        ) -> Result<Vec<Learning>> {
            self.check()?;
            let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
            let mut hits: Vec<Learning> = self
                .learnings
                .lock()
                .values()
                .filter(|l| category.is_none_or(|c| l.category == c))
                .filter(|l| {
                    let haystack = format!("{} {}", l.content, l.tags).to_lowercase();
                    words.is_empty() || words.iter().any(|w| haystack.contains(w.as_str()))
                })
                .cloned()
                .collect();
            hits.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
            hits.truncate(effective_limit(limit, DEFAULT_SEARCH_LIMIT));
            Ok(hits)
        }

        async fn list(&self, category: Option<Category>, limit: usize) -> Result<Vec<Learning>> {
            self.check()?;
            let mut all: Vec<Learning> = self
                .learnings
                .lock()
                .values()
                .filter(|l| category.is_none_or(|c| l.category == c))
                .cloned()
                .collect();
            all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            all.truncate(effective_limit(limit, DEFAULT_LIST_LIMIT));
            Ok(all)
        }

        async fn update(
            &self,
            id: &str,
            content: &str,
            tags: &str,
            confidence: f64,
        ) -> Result<()> {
            self.check()?;
            let Ok(key) = id.parse::<u64>() else {
                return Ok(());
            };
            if let Some(l) = self.learnings.lock().get_mut(&key) {
                l.content = content.to_string();
                l.tags = tags.to_string();
                l.confidence = confidence;
                l.updated_at = Utc::now();
            }
            Ok(())
        }

        async fn delete(&self, id: &str) -> Result<()> {
            self.check()?;
            if let Ok(key) = id.parse::<u64>() {
                self.learnings.lock().remove(&key);
            }
            Ok(())
        }

        async fn increment_use_count(&self, id: &str) {
            let Ok(key) = id.parse::<u64>() else {
                return;
            };
            if let Some(l) = self.learnings.lock().get_mut(&key) {
                l.use_count += 1;
                l.updated_at = Utc::now();
            }
        }

        async fn stats(&self) -> Result<CategoryStats> {
            self.check()?;
            let mut stats = CategoryStats::new();
            for l in self.learnings.lock().values() {
                *stats.entry(l.category.as_str().to_string()).or_default() += 1;
            }
            Ok(stats)
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_limit() {
        assert_eq!(effective_limit(0, 10), 10);
        assert_eq!(effective_limit(3, 10), 3);
    }

    #[tokio::test]
    async fn test_mock_backend_add_and_search() {
        let backend = MockBackend::new();
        let learning = backend
            .add(Category::Preferences, "Prefers concise answers", "formatting", 0.9)
            .await
            .unwrap();
        assert_eq!(learning.id, "1");

        let hits = backend.search("CONCISE", None, 0).await.unwrap();
        assert_eq!(hits.len(), 1);

        let hits = backend
            .search("concise", Some(Category::Technical), 0)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_mock_backend_failure_mode() {
        let backend = MockBackend::new();
        backend.fail_with("disk on fire");
        let err = backend.list(None, 0).await.unwrap_err();
        assert!(err.to_string().contains("disk on fire"));
    }

    #[tokio::test]
    async fn test_mock_backend_as_shared() {
        let backend: SharedBackend = Arc::new(MockBackend::new());
        backend
            .add(Category::General, "a", "", 0.8)
            .await
            .unwrap();
        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.get("general"), Some(&1));
    }
}
