//! Learning storage for Lore.
//!
//! A *learning* is a short piece of knowledge about the user (a preference, a
//! technical detail, a past mistake) that an assistant stores and recalls
//! across conversations. This crate defines the value type and a pluggable
//! [`Backend`] contract with two implementations:
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────────────┐
//! │  SqliteBackend               │   │  ChromaBackend                       │
//! │  - single file, WAL mode     │   │  - Chroma v2 HTTP API                │
//! │  - FTS5 index + LIKE scan    │   │  - vector or text queries            │
//! │  - atomic use counters       │   │  - optional Ollama embeddings        │
//! └──────────────────────────────┘   └──────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use lore_store::{BackendConfig, Category, open_backend};
//!
//! # async fn run() -> lore_store::Result<()> {
//! let backend = open_backend(&BackendConfig::Sqlite {
//!     path: "/data/learnings.db".into(),
//! })
//! .await?;
//!
//! backend
//!     .add(Category::Preferences, "Prefers concise answers", "formatting", 0.9)
//!     .await?;
//! let hits = backend.search("concise", None, 0).await?;
//! for hit in &hits {
//!     backend.increment_use_count(&hit.id).await;
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod chroma;
pub mod embedding;
pub mod error;
pub mod factory;
pub mod sqlite;
pub mod types;

pub use backend::{Backend, SharedBackend};
pub use chroma::{ChromaBackend, ChromaConfig};
pub use embedding::{Embedder, OllamaEmbedder, SharedEmbedder};
pub use error::{Result, StoreError};
pub use factory::{BackendConfig, open_backend};
pub use sqlite::{SqliteBackend, SqliteOptions};
pub use types::{
    Category, CategoryStats, DEFAULT_CONFIDENCE, DEFAULT_LIST_LIMIT, DEFAULT_SEARCH_LIMIT,
    Learning, UnknownCategory,
};

#[cfg(any(test, feature = "testing"))]
pub use backend::MockBackend;
#[cfg(any(test, feature = "testing"))]
pub use embedding::MockEmbedder;
