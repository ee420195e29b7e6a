//! Chroma v2 wire types.
//!
//! Response fields are optional or defaulted throughout: Chroma omits or nulls
//! whatever was not requested in `include`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub(crate) type Metadata = Map<String, Value>;

#[derive(Debug, Deserialize)]
pub(crate) struct Collection {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateCollectionRequest<'a> {
    pub name: &'a str,
    pub get_or_create: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddRequest {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<Vec<Vec<f32>>>,
}

/// Body of `.../update`. Same shape as an add.
pub(crate) type UpdateRequest = AddRequest;

#[derive(Debug, Serialize)]
pub(crate) struct QueryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_embeddings: Option<Vec<Vec<f32>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_texts: Option<Vec<String>>,
    pub n_results: usize,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    pub include: Vec<&'static str>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub ids: Vec<Vec<String>>,
    #[serde(default)]
    pub documents: Option<Vec<Option<Vec<Option<String>>>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Option<Vec<Option<Metadata>>>>>,
}

fn first_row<T>(rows: Option<Vec<Option<Vec<T>>>>) -> Option<Vec<T>> {
    rows.and_then(|rows| rows.into_iter().next().flatten())
}

impl QueryResponse {
    /// Flatten the first query row into a [`GetResponse`]-shaped record set.
    pub fn into_first_row(self) -> GetResponse {
        GetResponse {
            ids: self.ids.into_iter().next().unwrap_or_default(),
            documents: first_row(self.documents),
            metadatas: first_row(self.metadatas),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct GetRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    pub include: Vec<&'static str>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GetResponse {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Option<Metadata>>>,
}

impl GetResponse {
    /// Iterate `(id, document, metadata)` triples from the parallel arrays.
    /// Short or missing arrays yield `None` for the absent entries.
    pub fn records(self) -> impl Iterator<Item = (String, Option<String>, Option<Metadata>)> {
        let mut documents = self.documents.unwrap_or_default().into_iter();
        let mut metadatas = self.metadatas.unwrap_or_default().into_iter();
        self.ids.into_iter().map(move |id| {
            let document = documents.next().flatten();
            let metadata = metadatas.next().flatten();
            (id, document, metadata)
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DeleteRequest {
    pub ids: Vec<String>,
}

/// `where` clause restricting results to one category.
pub(crate) fn category_filter(category: &str) -> Value {
    serde_json::json!({ "category": { "$eq": category } })
}
