//! Embedding clients used by the remote backend for semantic search.
//!
//! - [`OllamaEmbedder`]: calls an Ollama server's `/api/embeddings` endpoint
//! - [`MockEmbedder`]: deterministic vectors for tests (`testing` feature)

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StoreError};

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for turning text into a dense vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the name of this embedder (usually the model name).
    fn name(&self) -> &str;
}

/// A shared embedder that can be used across threads.
pub type SharedEmbedder = Arc<dyn Embedder>;

// ─────────────────────────────────────────────────────────────────────────────
// Ollama Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Ollama embeddings API client.
///
/// Shares the caller's HTTP client, so it inherits that client's timeout.
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    /// Create a new embedder for `model` served at `base_url`.
    pub fn new(client: Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn embeddings_url(&self) -> String {
        format!("{}/api/embeddings", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(self.embeddings_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Http {
                method: "POST",
                path: "/api/embeddings".to_string(),
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Embedding(format!("failed to parse response: {e}")))?;

        if result.embedding.is_empty() {
            return Err(StoreError::Embedding(format!(
                "model '{}' returned an empty embedding",
                self.model
            )));
        }

        debug!(model = %self.model, dims = result.embedding.len(), "embedded text");
        Ok(result.embedding)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Embedder
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "testing"))]
pub use mock::MockEmbedder;

#[cfg(any(test, feature = "testing"))]
mod mock {
    use async_trait::async_trait;

    use super::Embedder;
    use crate::error::{Result, StoreError};

    /// Deterministic embedder for tests. Can be made to fail every call.
    #[derive(Debug, Clone, Default)]
    pub struct MockEmbedder {
        fail: bool,
    }

    impl MockEmbedder {
        pub fn new() -> Self {
            Self::default()
        }

        /// An embedder whose every call fails.
        pub fn failing() -> Self {
            Self { fail: true }
        }
    }

    #[async_trait]
    impl Embedder for MockEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.fail {
                return Err(StoreError::Embedding("mock embedder failure".to_string()));
            }
            let len = text.len() as f32;
            let sum: u32 = text.bytes().map(u32::from).sum();
            Ok(vec![len, sum as f32, 1.0])
        }

        fn name(&self) -> &str {
            "mock"
        }
    }
}
