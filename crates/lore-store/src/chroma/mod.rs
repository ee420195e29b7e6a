//! Remote backend over the Chroma v2 HTTP API.
//!
//! Every learning is one record in a single collection: the content is the
//! document, everything else lives in the metadata map. Search delegates to
//! Chroma's nearest-neighbour query, either with a vector computed locally by
//! an [`Embedder`](crate::Embedder) or with the raw query text.

mod api;
mod metadata;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use self::api::{
    AddRequest, Collection, CreateCollectionRequest, DeleteRequest, GetRequest, GetResponse,
    QueryRequest, QueryResponse, UpdateRequest, category_filter,
};
use self::metadata::LearningMetadata;
use crate::backend::{Backend, effective_limit};
use crate::embedding::{OllamaEmbedder, SharedEmbedder};
use crate::error::{Result, StoreError};
use crate::types::{
    Category, CategoryStats, DEFAULT_LIST_LIMIT, DEFAULT_SEARCH_LIMIT, Learning,
    current_timestamp,
};

pub use lore_config::{
    DEFAULT_CHROMA_URL, DEFAULT_COLLECTION, DEFAULT_DATABASE, DEFAULT_OLLAMA_URL, DEFAULT_TENANT,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(lore_config::DEFAULT_TIMEOUT_SECS);

const INCLUDE_RECORDS: [&str; 2] = ["documents", "metadatas"];

/// Connection settings for [`ChromaBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChromaConfig {
    /// Base URL of the Chroma server, e.g. `http://chroma:8000`.
    pub url: String,
    pub tenant: String,
    pub database: String,
    /// Collection name; created on first connect if absent.
    pub collection: String,
    /// Ollama model used for embeddings. `None` leaves embedding to Chroma.
    pub embedding_model: Option<String>,
    pub ollama_url: String,
    /// Applied to every outbound call, embedding calls included.
    pub timeout: Duration,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CHROMA_URL.to_string(),
            tenant: DEFAULT_TENANT.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            embedding_model: None,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ChromaConfig {
    /// Config for the server at `url` with every other setting defaulted.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP plumbing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct ChromaHttp {
    client: Client,
    base_url: String,
}

impl ChromaHttp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let response = self.client.get(self.url(path)).send().await?;
        let response = check_status("GET", path, response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let bytes = self.post(path, body).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// POST and return the raw response body.
    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Vec<u8>> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let response = check_status("POST", path, response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

async fn check_status(
    method: &'static str,
    path: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Http {
        method,
        path: path.to_string(),
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Learning store backed by a Chroma collection.
///
/// # Concurrency
///
/// Chroma offers neither conditional writes nor atomic field updates, so
/// `update` and `increment_use_count` are read-modify-write cycles over the
/// whole record. Two concurrent increments of the same id may both read the
/// same count and one of them is lost; two concurrent updates resolve as
/// last-writer-wins. Counts are advisory, so this is accepted.
///
/// `list` asks Chroma for at most `limit` records and orders that page
/// client-side; with more records than the limit, the page is not guaranteed
/// to be the globally newest.
pub struct ChromaBackend {
    http: ChromaHttp,
    collections_path: String,
    collection_id: String,
    embedder: Option<SharedEmbedder>,
}

impl std::fmt::Debug for ChromaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromaBackend")
            .field("base_url", &self.http.base_url)
            .field("collection_id", &self.collection_id)
            .field("embedder", &self.embedder.as_ref().map(|e| e.name().to_string()))
            .finish()
    }
}

impl ChromaBackend {
    /// Connect using `config`, embedding through Ollama when a model is set.
    pub async fn connect(config: &ChromaConfig) -> Result<Self> {
        let client = build_client(config)?;
        let embedder = config
            .embedding_model
            .as_deref()
            .filter(|model| !model.is_empty())
            .map(|model| {
                Arc::new(OllamaEmbedder::new(client.clone(), &config.ollama_url, model))
                    as SharedEmbedder
            });
        Self::connect_with_client(client, config, embedder).await
    }

    /// Connect with an explicit embedder (or none), ignoring the model settings.
    pub async fn connect_with_embedder(
        config: &ChromaConfig,
        embedder: Option<SharedEmbedder>,
    ) -> Result<Self> {
        let client = build_client(config)?;
        Self::connect_with_client(client, config, embedder).await
    }

    async fn connect_with_client(
        client: Client,
        config: &ChromaConfig,
        embedder: Option<SharedEmbedder>,
    ) -> Result<Self> {
        let http = ChromaHttp {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        };
        let collections_path = format!(
            "/api/v2/tenants/{}/databases/{}/collections",
            config.tenant, config.database
        );
        let collection_id = resolve_collection(&http, &collections_path, &config.collection).await?;

        info!(
            url = %http.base_url,
            collection = %config.collection,
            collection_id = %collection_id,
            embedder = embedder.as_ref().map(|e| e.name()).unwrap_or("chroma"),
            "Connected to Chroma"
        );

        Ok(Self {
            http,
            collections_path,
            collection_id,
            embedder,
        })
    }

    /// The resolved collection id. Fixed for the lifetime of the backend.
    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    fn op_path(&self, op: &str) -> String {
        format!("{}/{}/{}", self.collections_path, self.collection_id, op)
    }

    /// Embed `text` if an embedder is configured. Failures are logged and
    /// yield `None` so the caller can degrade to Chroma's own handling.
    async fn try_embed(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(text).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(model = embedder.name(), error = %e, "Embedding failed; continuing without vector");
                None
            }
        }
    }

    async fn fetch(&self, id: &str) -> Result<Learning> {
        let request = GetRequest {
            ids: Some(vec![id.to_string()]),
            include: INCLUDE_RECORDS.to_vec(),
            ..Default::default()
        };
        let response: GetResponse = self.http.post_json(&self.op_path("get"), &request).await?;
        decode_records(response)
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("learning {id}")))
    }

    /// Rewrite the whole record for `learning`.
    async fn write(&self, learning: &Learning, embedding: Option<Vec<f32>>) -> Result<()> {
        let request = UpdateRequest {
            ids: vec![learning.id.clone()],
            documents: vec![learning.content.clone()],
            metadatas: vec![LearningMetadata::from_learning(learning).encode()],
            embeddings: embedding.map(|v| vec![v]),
        };
        self.http.post(&self.op_path("update"), &request).await?;
        Ok(())
    }

    async fn try_increment(&self, id: &str) -> Result<()> {
        let mut learning = self.fetch(id).await?;
        learning.use_count += 1;
        learning.updated_at = current_timestamp();
        self.write(&learning, None).await
    }
}

fn build_client(config: &ChromaConfig) -> Result<Client> {
    Ok(Client::builder().timeout(config.timeout).build()?)
}

/// Find the collection by name, creating it when listing fails or it is absent.
async fn resolve_collection(http: &ChromaHttp, collections_path: &str, name: &str) -> Result<String> {
    match http.get_json::<Vec<Collection>>(collections_path).await {
        Ok(collections) => {
            if let Some(found) = collections.into_iter().find(|c| c.name == name) {
                debug!(collection = %found.name, id = %found.id, "Found existing collection");
                return Ok(found.id);
            }
        }
        Err(e) => debug!(error = %e, "Listing collections failed; creating instead"),
    }

    let request = CreateCollectionRequest {
        name,
        get_or_create: true,
    };
    let created: Collection = http.post_json(collections_path, &request).await?;
    debug!(collection = %created.name, id = %created.id, "Created collection");
    Ok(created.id)
}

fn decode_records(response: GetResponse) -> Vec<Learning> {
    response
        .records()
        .map(|(id, document, metadata)| {
            LearningMetadata::decode(metadata.as_ref()).into_learning(id, document.unwrap_or_default())
        })
        .collect()
}

#[async_trait]
impl Backend for ChromaBackend {
    fn name(&self) -> &'static str {
        "chroma"
    }

    async fn add(
        &self,
        category: Category,
        content: &str,
        tags: &str,
        confidence: f64,
    ) -> Result<Learning> {
        let now = current_timestamp();
        let id = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros())
            .to_string();
        let learning = Learning::new(id, category, content, tags, confidence, now);

        let embedding = self.try_embed(content).await;
        let request = AddRequest {
            ids: vec![learning.id.clone()],
            documents: vec![learning.content.clone()],
            metadatas: vec![LearningMetadata::from_learning(&learning).encode()],
            embeddings: embedding.map(|v| vec![v]),
        };
        self.http.post(&self.op_path("add"), &request).await?;

        debug!(id = %learning.id, category = %category, "Stored learning");
        Ok(learning)
    }

    async fn search(
        &self,
        query: &str,
        category: Option<Category>,
        limit: usize,
    ) -> Result<Vec<Learning>> {
        let (query_embeddings, query_texts) = match self.try_embed(query).await {
            Some(vector) => (Some(vec![vector]), None),
            None => (None, Some(vec![query.to_string()])),
        };
        let request = QueryRequest {
            query_embeddings,
            query_texts,
            n_results: effective_limit(limit, DEFAULT_SEARCH_LIMIT),
            filter: category.map(|c| category_filter(c.as_str())),
            include: INCLUDE_RECORDS.to_vec(),
        };
        let response: QueryResponse = self.http.post_json(&self.op_path("query"), &request).await?;
        Ok(decode_records(response.into_first_row()))
    }

    async fn list(&self, category: Option<Category>, limit: usize) -> Result<Vec<Learning>> {
        let request = GetRequest {
            filter: category.map(|c| category_filter(c.as_str())),
            limit: Some(effective_limit(limit, DEFAULT_LIST_LIMIT)),
            include: INCLUDE_RECORDS.to_vec(),
            ..Default::default()
        };
        let response: GetResponse = self.http.post_json(&self.op_path("get"), &request).await?;
        let mut learnings = decode_records(response);
        learnings.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(learnings)
    }

    async fn update(&self, id: &str, content: &str, tags: &str, confidence: f64) -> Result<()> {
        let mut learning = self.fetch(id).await?;
        learning.content = content.to_string();
        learning.tags = tags.to_string();
        learning.confidence = confidence;
        learning.updated_at = current_timestamp();

        let embedding = self.try_embed(content).await;
        self.write(&learning, embedding).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let request = DeleteRequest {
            ids: vec![id.to_string()],
        };
        self.http.post(&self.op_path("delete"), &request).await?;
        Ok(())
    }

    async fn increment_use_count(&self, id: &str) {
        if let Err(e) = self.try_increment(id).await {
            warn!(id, error = %e, "Failed to increment use count");
        }
    }

    async fn stats(&self) -> Result<CategoryStats> {
        let request = GetRequest {
            include: vec!["metadatas"],
            ..Default::default()
        };
        let response: GetResponse = self.http.post_json(&self.op_path("get"), &request).await?;

        let mut stats = CategoryStats::new();
        for (_, _, metadata) in response.records() {
            let category = LearningMetadata::decode(metadata.as_ref()).category;
            *stats.entry(category).or_default() += 1;
        }
        Ok(stats)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use wiremock::matchers::{any, method, path, path_regex};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    use super::*;
    use crate::embedding::MockEmbedder;

    const COLLECTIONS: &str = "/api/v2/tenants/default_tenant/databases/default_database/collections";

    /// In-memory stand-in for a Chroma server holding one collection.
    #[derive(Clone, Default)]
    struct FakeChroma {
        records: Arc<Mutex<BTreeMap<String, (String, Value)>>>,
        queries: Arc<Mutex<Vec<Value>>>,
    }

    impl FakeChroma {
        fn use_count(&self, id: &str) -> u64 {
            self.records.lock()[id].1["use_count"].as_u64().unwrap()
        }

        fn insert_raw(&self, id: &str, document: &str, metadata: Value) {
            self.records
                .lock()
                .insert(id.to_string(), (document.to_string(), metadata));
        }

        fn matching(&self, body: &Value) -> Vec<(String, String, Value)> {
            let wanted_ids: Option<Vec<&str>> = body["ids"]
                .as_array()
                .map(|ids| ids.iter().filter_map(Value::as_str).collect());
            let category = body["where"]["category"]["$eq"].as_str();
            self.records
                .lock()
                .iter()
                .filter(|(id, _)| wanted_ids.as_ref().is_none_or(|w| w.contains(&id.as_str())))
                .filter(|(_, (_, meta))| category.is_none_or(|c| meta["category"] == c))
                .map(|(id, (doc, meta))| (id.clone(), doc.clone(), meta.clone()))
                .collect()
        }
    }

    impl Respond for FakeChroma {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let path = request.url.path();
            let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);

            if path == COLLECTIONS {
                return if request.method.as_str() == "GET" {
                    ResponseTemplate::new(200).set_body_json(json!([]))
                } else {
                    ResponseTemplate::new(200).set_body_json(json!({"id": "col-1", "name": body["name"]}))
                };
            }

            match path.rsplit('/').next().unwrap_or_default() {
                op @ ("add" | "update") => {
                    let ids = body["ids"].as_array().cloned().unwrap_or_default();
                    let mut records = self.records.lock();
                    for (i, id) in ids.iter().enumerate() {
                        let id = id.as_str().unwrap_or_default().to_string();
                        if op == "update" && !records.contains_key(&id) {
                            continue;
                        }
                        let doc = body["documents"][i].as_str().unwrap_or_default().to_string();
                        records.insert(id, (doc, body["metadatas"][i].clone()));
                    }
                    ResponseTemplate::new(200).set_body_json(json!({}))
                }
                "get" => {
                    let mut rows = self.matching(&body);
                    if let Some(limit) = body["limit"].as_u64() {
                        rows.truncate(limit as usize);
                    }
                    let (ids, docs, metas): (Vec<_>, Vec<_>, Vec<_>) = rows.into_iter().fold(
                        (vec![], vec![], vec![]),
                        |(mut i, mut d, mut m), (id, doc, meta)| {
                            i.push(id);
                            d.push(doc);
                            m.push(meta);
                            (i, d, m)
                        },
                    );
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"ids": ids, "documents": docs, "metadatas": metas}))
                }
                "query" => {
                    self.queries.lock().push(body.clone());
                    let mut rows = self.matching(&body);
                    rows.truncate(body["n_results"].as_u64().unwrap_or(10) as usize);
                    let ids: Vec<_> = rows.iter().map(|r| r.0.clone()).collect();
                    let docs: Vec<_> = rows.iter().map(|r| r.1.clone()).collect();
                    let metas: Vec<_> = rows.iter().map(|r| r.2.clone()).collect();
                    ResponseTemplate::new(200).set_body_json(json!({
                        "ids": [ids], "documents": [docs], "metadatas": [metas]
                    }))
                }
                "delete" => {
                    for id in body["ids"].as_array().cloned().unwrap_or_default() {
                        self.records.lock().remove(id.as_str().unwrap_or_default());
                    }
                    ResponseTemplate::new(200).set_body_json(json!(null))
                }
                _ => ResponseTemplate::new(404).set_body_string("no such route"),
            }
        }
    }

    async fn fake_server() -> (MockServer, FakeChroma) {
        let server = MockServer::start().await;
        let fake = FakeChroma::default();
        Mock::given(any())
            .respond_with(fake.clone())
            .with_priority(10)
            .mount(&server)
            .await;
        (server, fake)
    }

    async fn connect(server: &MockServer, embedder: Option<SharedEmbedder>) -> ChromaBackend {
        ChromaBackend::connect_with_embedder(&ChromaConfig::new(server.uri()), embedder)
            .await
            .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = ChromaConfig::default();
        assert_eq!(config.tenant, "default_tenant");
        assert_eq!(config.database, "default_database");
        assert_eq!(config.collection, "self_improvement");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_resolves_existing_collection_without_creating() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COLLECTIONS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "other", "name": "unrelated"},
                {"id": "abc-123", "name": "self_improvement"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(COLLECTIONS))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let backend = connect(&server, None).await;
        assert_eq!(backend.collection_id(), "abc-123");
    }

    #[tokio::test]
    async fn test_creates_collection_when_listing_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COLLECTIONS))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(COLLECTIONS))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "new-id", "name": "self_improvement"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let backend = connect(&server, None).await;
        assert_eq!(backend.collection_id(), "new-id");
    }

    #[tokio::test]
    async fn test_connect_fails_when_create_fails() {
        let server = MockServer::start().await;
        Mock::given(path(COLLECTIONS))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = ChromaBackend::connect(&ChromaConfig::new(server.uri()))
            .await
            .unwrap_err();
        match err {
            StoreError::Http { method, status, .. } => {
                assert_eq!(method, "POST");
                assert_eq!(status, 503);
            }
            other => panic!("Expected HTTP error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_add_then_list_round_trip() {
        let (server, fake) = fake_server().await;
        let backend = connect(&server, None).await;

        let stored = backend
            .add(Category::Preferences, "Prefers concise answers", "formatting", 0.9)
            .await
            .unwrap();
        assert_eq!(stored.use_count, 0);
        assert_eq!(stored.created_at, stored.updated_at);
        assert!(stored.id.parse::<i64>().is_ok());
        assert_eq!(fake.records.lock().len(), 1);

        let listed = backend.list(None, 0).await.unwrap();
        assert_eq!(listed, vec![stored]);
    }

    #[tokio::test]
    async fn test_list_sorts_newest_first_with_id_tiebreak() {
        let (server, fake) = fake_server().await;
        let backend = connect(&server, None).await;
        let meta = |updated: &str| {
            json!({"category": "general", "tags": "", "confidence": 0.8, "use_count": 0,
                   "created_at": "2024-01-01T00:00:00Z", "updated_at": updated})
        };
        fake.insert_raw("a", "old", meta("2024-01-01T00:00:00Z"));
        fake.insert_raw("c", "tie", meta("2024-03-01T00:00:00Z"));
        fake.insert_raw("b", "tie", meta("2024-03-01T00:00:00Z"));
        fake.insert_raw("d", "mid", meta("2024-02-01T00:00:00Z"));

        let ids: Vec<String> = backend
            .list(None, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "d", "a"]);
    }

    #[tokio::test]
    async fn test_search_without_embedder_sends_text_and_filter() {
        let (server, fake) = fake_server().await;
        let backend = connect(&server, None).await;
        backend.add(Category::Technical, "uses rust", "", 0.8).await.unwrap();
        backend.add(Category::General, "likes tea", "", 0.8).await.unwrap();

        let hits = backend
            .search("rust", Some(Category::Technical), 0)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "uses rust");

        let query = fake.queries.lock()[0].clone();
        assert_eq!(query["query_texts"], json!(["rust"]));
        assert!(query.get("query_embeddings").is_none());
        assert_eq!(query["where"], json!({"category": {"$eq": "technical"}}));
        assert_eq!(query["n_results"], 10);
    }

    #[tokio::test]
    async fn test_search_with_embedder_sends_vector() {
        let (server, fake) = fake_server().await;
        let backend = connect(&server, Some(Arc::new(MockEmbedder::new()))).await;
        backend.search("rust", None, 3).await.unwrap();

        let query = fake.queries.lock()[0].clone();
        assert!(query["query_embeddings"].is_array());
        assert!(query.get("query_texts").is_none());
        assert!(query.get("where").is_none());
        assert_eq!(query["n_results"], 3);
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades_to_text() {
        let (server, fake) = fake_server().await;
        let backend = connect(&server, Some(Arc::new(MockEmbedder::failing()))).await;

        backend.add(Category::General, "still stored", "", 0.8).await.unwrap();
        backend.search("stored", None, 0).await.unwrap();

        assert_eq!(fake.records.lock().len(), 1);
        assert_eq!(fake.queries.lock()[0]["query_texts"], json!(["stored"]));
    }

    #[tokio::test]
    async fn test_connect_uses_ollama_when_model_configured() {
        let (server, fake) = fake_server().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [1.0, 2.0]})))
            .with_priority(1)
            .mount(&server)
            .await;

        let config = ChromaConfig {
            embedding_model: Some("nomic-embed-text".into()),
            ollama_url: server.uri(),
            ..ChromaConfig::new(server.uri())
        };
        let backend = ChromaBackend::connect(&config).await.unwrap();
        backend.search("rust", None, 0).await.unwrap();

        assert_eq!(fake.queries.lock()[0]["query_embeddings"], json!([[1.0, 2.0]]));
    }

    #[tokio::test]
    async fn test_update_merges_and_preserves_fields() {
        let (server, fake) = fake_server().await;
        let backend = connect(&server, None).await;
        let stored = backend.add(Category::Mistakes, "old", "a", 0.5).await.unwrap();
        backend.increment_use_count(&stored.id).await;

        backend.update(&stored.id, "new", "b", 0.7).await.unwrap();

        let listed = backend.list(None, 0).await.unwrap();
        let updated = &listed[0];
        assert_eq!(updated.content, "new");
        assert_eq!(updated.tags, "b");
        assert_eq!(updated.confidence, 0.7);
        assert_eq!(updated.category, Category::Mistakes);
        assert_eq!(updated.use_count, 1);
        assert_eq!(updated.created_at, stored.created_at);
        assert!(updated.updated_at >= stored.updated_at);
        assert_eq!(fake.use_count(&stored.id), 1);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (server, _fake) = fake_server().await;
        let backend = connect(&server, None).await;
        let err = backend.update("nope", "x", "", 0.8).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_then_absent() {
        let (server, fake) = fake_server().await;
        let backend = connect(&server, None).await;
        let stored = backend.add(Category::General, "temp", "", 0.8).await.unwrap();

        backend.delete(&stored.id).await.unwrap();
        backend.delete(&stored.id).await.unwrap();
        assert!(fake.records.lock().is_empty());
        assert!(backend.list(None, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sequential_increments_are_exact() {
        let (server, fake) = fake_server().await;
        let backend = connect(&server, None).await;
        let stored = backend.add(Category::General, "x", "", 0.8).await.unwrap();

        for _ in 0..3 {
            backend.increment_use_count(&stored.id).await;
        }
        assert_eq!(fake.use_count(&stored.id), 3);
    }

    #[tokio::test]
    async fn test_concurrent_increments_may_lose_one() {
        let (server, fake) = fake_server().await;
        let backend = Arc::new(connect(&server, None).await);
        let stored = backend.add(Category::General, "x", "", 0.8).await.unwrap();

        let a = {
            let backend = backend.clone();
            let id = stored.id.clone();
            tokio::spawn(async move { backend.increment_use_count(&id).await })
        };
        let b = {
            let backend = backend.clone();
            let id = stored.id.clone();
            tokio::spawn(async move { backend.increment_use_count(&id).await })
        };
        a.await.unwrap();
        b.await.unwrap();

        let count = fake.use_count(&stored.id);
        assert!((1..=2).contains(&count), "count = {count}");
    }

    #[tokio::test]
    async fn test_increment_swallows_errors() {
        let server = MockServer::start().await;
        Mock::given(path(COLLECTIONS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c", "name": "self_improvement"})))
            .mount(&server)
            .await;
        Mock::given(path_regex(r"/collections/c/get$"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let backend = connect(&server, None).await;
        backend.increment_use_count("123").await;
        backend.increment_use_count("missing").await;
    }

    #[tokio::test]
    async fn test_stats_tallies_raw_categories() {
        let (server, fake) = fake_server().await;
        let backend = connect(&server, None).await;
        backend.add(Category::Technical, "a", "", 0.8).await.unwrap();
        backend.add(Category::Technical, "b", "", 0.8).await.unwrap();
        backend.add(Category::Preferences, "c", "", 0.8).await.unwrap();
        fake.insert_raw("zzz", "no metadata", json!(null));

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.get("technical"), Some(&2));
        assert_eq!(stats.get("preferences"), Some(&1));
        assert_eq!(stats.get("general"), Some(&1));
        assert_eq!(stats.values().sum::<usize>(), 4);
    }

    #[tokio::test]
    async fn test_http_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(path(COLLECTIONS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c", "name": "self_improvement"})))
            .mount(&server)
            .await;
        Mock::given(path_regex(r"/collections/c/query$"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad where clause\n"))
            .mount(&server)
            .await;

        let backend = connect(&server, None).await;
        let err = backend.search("x", None, 0).await.unwrap_err();
        match err {
            StoreError::Http { status, body, path, .. } => {
                assert_eq!(status, 422);
                assert_eq!(body, "bad where clause");
                assert!(path.ends_with("/c/query"));
            }
            other => panic!("Expected HTTP error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_request_error() {
        let server = MockServer::start().await;
        Mock::given(path(COLLECTIONS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c", "name": "self_improvement"})))
            .mount(&server)
            .await;
        Mock::given(path_regex(r"/collections/c/get$"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let config = ChromaConfig {
            timeout: Duration::from_millis(100),
            ..ChromaConfig::new(server.uri())
        };
        let backend = ChromaBackend::connect(&config).await.unwrap();
        let err = backend.list(None, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::Request(_)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (server, _fake) = fake_server().await;
        let backend = connect(&server, None).await;
        backend.close().await.unwrap();
        backend.close().await.unwrap();
    }
}
