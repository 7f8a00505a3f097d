//! Semantic search over the internal document store.
//!
//! The store itself is opaque to the orchestrator: anything implementing
//! [`DocumentStore`] can back the `document_search` tool and the document
//! admin routes. A document is stored as one row per chunk, every row
//! carrying the document's metadata; `metadata.id` ties the chunks together.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use super::ingest::{CHUNK_OVERLAP, CHUNK_SIZE, split_text};
use super::registry::{ToolError, ToolFuture, ToolHandler, object_schema, parse_args};
use crate::config::Settings;
use crate::model::JsonObject;

fn default_k() -> usize {
    5
}

fn default_threshold() -> f64 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentQuery {
    pub query: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub filter: Option<JsonObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentHit {
    pub content: String,
    pub metadata: Value,
    pub relevance_score: f64,
}

/// One stored document as listed by the admin routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub metadata: Value,
}

impl StoredDocument {
    /// Collapse per-chunk metadata rows into one entry per document id,
    /// keeping first-seen order. Rows without an id are skipped.
    pub fn from_metadata_rows(rows: impl IntoIterator<Item = Value>) -> Vec<Self> {
        let mut documents: Vec<StoredDocument> = Vec::new();
        for metadata in rows {
            let Some(id) = metadata.get("id").and_then(Value::as_str) else {
                continue;
            };
            if documents.iter().any(|d| d.id == id) {
                continue;
            }
            documents.push(StoredDocument {
                id: id.to_string(),
                metadata,
            });
        }
        documents
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Return up to `k` hits scoring at least `threshold`, best first.
    async fn search(&self, query: &DocumentQuery) -> Result<Vec<DocumentHit>>;

    /// Split `content` into chunks and store each with `metadata`, which
    /// must carry a string `id`. Returns that id.
    async fn add_document(&self, content: &str, metadata: JsonObject) -> Result<String>;

    async fn list_documents(&self) -> Result<Vec<StoredDocument>>;

    async fn get_document(&self, id: &str) -> Result<Option<StoredDocument>>;

    /// Remove every chunk of the document; `false` if there was none.
    async fn delete_document(&self, id: &str) -> Result<bool>;
}

const UNCONFIGURED: &str = "Document store is not configured (set SUPABASE_URL and SUPABASE_SERVICE_KEY)";

/// Stand-in used when no vector store is configured; every operation fails.
pub struct UnconfiguredDocumentStore;

#[async_trait]
impl DocumentStore for UnconfiguredDocumentStore {
    async fn search(&self, _query: &DocumentQuery) -> Result<Vec<DocumentHit>> {
        anyhow::bail!(UNCONFIGURED)
    }

    async fn add_document(&self, _content: &str, _metadata: JsonObject) -> Result<String> {
        anyhow::bail!(UNCONFIGURED)
    }

    async fn list_documents(&self) -> Result<Vec<StoredDocument>> {
        anyhow::bail!(UNCONFIGURED)
    }

    async fn get_document(&self, _id: &str) -> Result<Option<StoredDocument>> {
        anyhow::bail!(UNCONFIGURED)
    }

    async fn delete_document(&self, _id: &str) -> Result<bool> {
        anyhow::bail!(UNCONFIGURED)
    }
}

/// The `id` a document's metadata must carry.
fn document_id(metadata: &JsonObject) -> Result<String> {
    metadata
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .context("Document metadata has no id")
}

/// Supabase pgvector store: rows are written to a table through PostgREST
/// and searched through a `match_documents`-style RPC.
pub struct SupabaseDocumentStore {
    client: Client,
    supabase_url: String,
    service_key: String,
    table_name: String,
    query_name: String,
    openai_api_key: String,
    openai_base_url: String,
    embedding_model: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct MetadataRow {
    #[serde(default)]
    metadata: Value,
}

#[derive(Debug, Deserialize)]
struct MatchRow {
    #[serde(default)]
    content: String,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    similarity: f64,
}

impl SupabaseDocumentStore {
    /// Build from settings when Supabase and OpenAI credentials are all present.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        Some(Self {
            client: Client::new(),
            supabase_url: settings.supabase_url.clone()?.trim_end_matches('/').to_string(),
            service_key: settings.supabase_service_key.clone()?,
            table_name: settings.vector_store_table.clone(),
            query_name: settings.vector_store_query.clone(),
            openai_api_key: settings.openai_api_key.clone()?,
            openai_base_url: settings.openai_base_url.trim_end_matches('/').to_string(),
            embedding_model: settings.embedding_model.clone(),
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.openai_base_url))
            .bearer_auth(&self.openai_api_key)
            .json(&json!({ "model": self.embedding_model, "input": text }))
            .send()
            .await
            .context("Failed to send embedding request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding request failed with status {}: {}", status, body);
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embedding response")?;
        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .context("Embedding response contained no data")
    }

    /// Table URL with PostgREST filter parameters.
    fn table_url(&self, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/rest/v1/{}", self.supabase_url, self.table_name))
            .context("Invalid SUPABASE_URL")?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    async fn metadata_rows(&self, params: &[(&str, &str)]) -> Result<Vec<Value>> {
        let response = self
            .client
            .get(self.table_url(params)?)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await
            .context("Failed to read document store")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Document store read failed with status {}: {}", status, body);
        }

        let rows: Vec<MetadataRow> = response
            .json()
            .await
            .context("Failed to parse document store rows")?;
        Ok(rows.into_iter().map(|r| r.metadata).collect())
    }
}

#[async_trait]
impl DocumentStore for SupabaseDocumentStore {
    async fn search(&self, query: &DocumentQuery) -> Result<Vec<DocumentHit>> {
        let embedding = self.embed(&query.query).await?;

        let url = format!("{}/rest/v1/rpc/{}", self.supabase_url, self.query_name);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&json!({
                "query_embedding": embedding,
                "match_count": query.k,
                "filter": query.filter.clone().unwrap_or_default(),
            }))
            .send()
            .await
            .context("Failed to query document store")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Document store query failed with status {}: {}", status, body);
        }

        let rows: Vec<MatchRow> = response
            .json()
            .await
            .context("Failed to parse document store response")?;

        let hits = filter_hits(rows, query.threshold, query.k);
        info!("Document search returned {} hits above threshold", hits.len());
        Ok(hits)
    }

    async fn add_document(&self, content: &str, metadata: JsonObject) -> Result<String> {
        let id = document_id(&metadata)?;
        let chunks = split_text(content, CHUNK_SIZE, CHUNK_OVERLAP);
        if chunks.is_empty() {
            anyhow::bail!("Document {} has no text to store", id);
        }

        let mut rows = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let embedding = self.embed(chunk).await?;
            rows.push(json!({
                "content": chunk,
                "metadata": metadata,
                "embedding": embedding,
            }));
        }

        let response = self
            .client
            .post(self.table_url(&[])?)
            .header("apikey", &self.service_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(&self.service_key)
            .json(&rows)
            .send()
            .await
            .context("Failed to write to document store")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Document store insert failed with status {}: {}", status, body);
        }

        info!(document = %id, chunks = chunks.len(), "Stored document");
        Ok(id)
    }

    async fn list_documents(&self) -> Result<Vec<StoredDocument>> {
        let rows = self.metadata_rows(&[("select", "metadata")]).await?;
        Ok(StoredDocument::from_metadata_rows(rows))
    }

    async fn get_document(&self, id: &str) -> Result<Option<StoredDocument>> {
        let filter = format!("eq.{}", id);
        let rows = self
            .metadata_rows(&[("select", "metadata"), ("metadata->>id", filter.as_str()), ("limit", "1")])
            .await?;
        Ok(StoredDocument::from_metadata_rows(rows).into_iter().next())
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let filter = format!("eq.{}", id);
        let response = self
            .client
            .delete(self.table_url(&[("metadata->>id", filter.as_str())])?)
            .header("apikey", &self.service_key)
            .header("Prefer", "return=representation")
            .bearer_auth(&self.service_key)
            .send()
            .await
            .context("Failed to delete from document store")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Document store delete failed with status {}: {}", status, body);
        }

        let deleted: Vec<Value> = response
            .json()
            .await
            .context("Failed to parse document store delete response")?;
        info!(document = %id, chunks = deleted.len(), "Deleted document");
        Ok(!deleted.is_empty())
    }
}

fn filter_hits(rows: Vec<MatchRow>, threshold: f64, k: usize) -> Vec<DocumentHit> {
    let mut hits: Vec<DocumentHit> = rows
        .into_iter()
        .filter(|r| r.similarity >= threshold)
        .map(|r| DocumentHit {
            content: r.content,
            metadata: r.metadata,
            relevance_score: r.similarity,
        })
        .collect();
    hits.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    hits.truncate(k);
    hits
}

/// Run a query and shape the result the way callers consume it.
pub async fn search_documents(store: &dyn DocumentStore, query: &DocumentQuery) -> Result<Value> {
    debug!(query = %query.query, k = query.k, threshold = query.threshold, "Searching documents");
    let hits = store.search(query).await?;
    Ok(json!({
        "query": query.query,
        "total_results": hits.len(),
        "results": hits,
    }))
}

/// Handler for the `document_search` tool.
pub struct DocumentSearchTool {
    store: Arc<dyn DocumentStore>,
}

impl DocumentSearchTool {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

impl ToolHandler for DocumentSearchTool {
    fn name(&self) -> &str {
        "document_search"
    }

    fn description(&self) -> &str {
        "Searches internal documents and the knowledge base for relevant information \
         about properties, markets, or past analyses. The search is semantic, and \
         results can optionally be filtered by metadata fields."
    }

    fn keywords(&self) -> &[&'static str] {
        &["document", "internal", "knowledge base", "our files", "report"]
    }

    fn input_schema(&self) -> JsonObject {
        object_schema(
            vec![
                ("query", json!({"type": "string", "description": "The search query to find relevant documents"})),
                ("k", json!({"type": "integer", "description": "Number of documents to return", "default": 5})),
                ("threshold", json!({"type": "number", "description": "Minimum similarity threshold (0-1)", "default": 0.5})),
                ("filter", json!({"type": "object", "description": "Optional metadata filter"})),
            ],
            &["query"],
        )
    }

    fn execute(&self, args: JsonObject) -> ToolFuture<'_> {
        Box::pin(async move {
            let query: DocumentQuery = parse_args(args)?;
            if query.query.trim().is_empty() {
                return Err(ToolError::InvalidArguments("query must not be empty".into()));
            }
            Ok(search_documents(self.store.as_ref(), &query).await?)
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use super::*;

    /// In-memory store. Seeded hits come back from every search; added
    /// documents are chunked like the real store and score 1.0.
    #[derive(Default)]
    pub struct MemoryDocumentStore {
        hits: Vec<DocumentHit>,
        chunks: Mutex<Vec<DocumentHit>>,
    }

    impl MemoryDocumentStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_hits(hits: Vec<DocumentHit>) -> Self {
            Self {
                hits,
                chunks: Mutex::new(Vec::new()),
            }
        }

        pub fn chunk_count(&self) -> usize {
            self.chunks.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DocumentStore for MemoryDocumentStore {
        async fn search(&self, query: &DocumentQuery) -> Result<Vec<DocumentHit>> {
            let chunks = self.chunks.lock().unwrap();
            Ok(self
                .hits
                .iter()
                .chain(chunks.iter())
                .filter(|h| h.relevance_score >= query.threshold)
                .take(query.k)
                .cloned()
                .collect())
        }

        async fn add_document(&self, content: &str, metadata: JsonObject) -> Result<String> {
            let id = document_id(&metadata)?;
            let pieces = split_text(content, CHUNK_SIZE, CHUNK_OVERLAP);
            if pieces.is_empty() {
                anyhow::bail!("Document {} has no text to store", id);
            }
            let mut chunks = self.chunks.lock().unwrap();
            for piece in pieces {
                chunks.push(DocumentHit {
                    content: piece,
                    metadata: Value::Object(metadata.clone()),
                    relevance_score: 1.0,
                });
            }
            Ok(id)
        }

        async fn list_documents(&self) -> Result<Vec<StoredDocument>> {
            let chunks = self.chunks.lock().unwrap();
            Ok(StoredDocument::from_metadata_rows(
                chunks.iter().map(|c| c.metadata.clone()),
            ))
        }

        async fn get_document(&self, id: &str) -> Result<Option<StoredDocument>> {
            Ok(self.list_documents().await?.into_iter().find(|d| d.id == id))
        }

        async fn delete_document(&self, id: &str) -> Result<bool> {
            let mut chunks = self.chunks.lock().unwrap();
            let before = chunks.len();
            chunks.retain(|c| c.metadata.get("id").and_then(Value::as_str) != Some(id));
            Ok(chunks.len() < before)
        }
    }
}
