//! Backend selection at startup.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::backend::SharedBackend;
use crate::chroma::{ChromaBackend, ChromaConfig};
use crate::error::Result;
use crate::sqlite::SqliteBackend;

/// Which backend to open, with its settings.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendConfig {
    /// Embedded database file at `path` (parent directories are created).
    Sqlite { path: PathBuf },
    /// Remote Chroma collection.
    Chroma(ChromaConfig),
}

impl BackendConfig {
    /// Backend name as reported by [`Backend::name`](crate::Backend::name).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sqlite { .. } => "sqlite",
            Self::Chroma(_) => "chroma",
        }
    }
}

/// Open the configured backend. Called once; the result is shared for the
/// lifetime of the process.
pub async fn open_backend(config: &BackendConfig) -> Result<SharedBackend> {
    let backend: SharedBackend = match config {
        BackendConfig::Sqlite { path } => Arc::new(SqliteBackend::open(path)?),
        BackendConfig::Chroma(chroma) => Arc::new(ChromaBackend::connect(chroma).await?),
    };
    info!(backend = backend.name(), "Storage backend ready");
    Ok(backend)
}
