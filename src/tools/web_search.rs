//! Web search through the Tavily API.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error};

use super::registry::{ToolError, ToolFuture, ToolHandler, object_schema, parse_args};
use crate::model::JsonObject;

pub const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// Domain filters arrive either as a list or a comma-separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DomainList {
    List(Vec<String>),
    Csv(String),
}

impl DomainList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            DomainList::List(items) => items,
            DomainList::Csv(s) => s
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Booleans that may arrive as `"true"`/`"false"` strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    pub fn value(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Text(s) => s.eq_ignore_ascii_case("true"),
        }
    }
}

/// Parameters of a Tavily search, as accepted from callers.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub max_results: Option<u32>,
    #[serde(default)]
    pub search_depth: Option<String>,
    #[serde(default)]
    pub include_answer: Option<Flag>,
    #[serde(default)]
    pub include_raw_content: Option<Flag>,
    #[serde(default)]
    pub include_images: Option<Flag>,
    #[serde(default)]
    pub include_domains: Option<DomainList>,
    #[serde(default)]
    pub exclude_domains: Option<DomainList>,
}

/// Normalized request body sent to Tavily.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchParams {
    pub query: String,
    pub max_results: u32,
    pub search_depth: String,
    pub include_answer: bool,
    pub include_raw_content: bool,
    pub include_images: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_domains: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_domains: Vec<String>,
}

impl SearchParams {
    /// Defaults for the agent-facing tool: three results, basic depth, no extras.
    pub fn basic(request: SearchRequest) -> Self {
        Self::resolve(request, 3, "basic", false)
    }

    /// Defaults for the advanced endpoint: five results, advanced depth,
    /// answer, raw content and images included.
    pub fn advanced(request: SearchRequest) -> Self {
        Self::resolve(request, 5, "advanced", true)
    }

    fn resolve(request: SearchRequest, max_results: u32, depth: &str, extras: bool) -> Self {
        let flag = |f: &Option<Flag>| f.as_ref().map(Flag::value).unwrap_or(extras);
        Self {
            max_results: request.max_results.filter(|n| *n > 0).unwrap_or(max_results),
            search_depth: request
                .search_depth
                .clone()
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| depth.to_string()),
            include_answer: flag(&request.include_answer),
            include_raw_content: flag(&request.include_raw_content),
            include_images: flag(&request.include_images),
            include_domains: request
                .include_domains
                .map(DomainList::into_vec)
                .unwrap_or_default(),
            exclude_domains: request
                .exclude_domains
                .map(DomainList::into_vec)
                .unwrap_or_default(),
            query: request.query,
        }
    }
}

/// Thin client for the Tavily search endpoint.
#[derive(Clone)]
pub struct TavilyClient {
    client: Client,
    api_key: Option<String>,
}

impl TavilyClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    /// Run a search and return Tavily's JSON response.
    pub async fn search(&self, params: &SearchParams) -> Result<Value, ToolError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ToolError::NotConfigured("TAVILY_API_KEY is not set".into()))?;

        debug!(query = %params.query, depth = %params.search_depth, "Tavily search");

        let response = self
            .client
            .post(TAVILY_ENDPOINT)
            .bearer_auth(api_key)
            .json(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Tavily search failed with status {}: {}", status, body);
            return Err(ToolError::Upstream(format!(
                "Failed to perform Tavily search: status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    /// The advanced search used by the custom web search endpoint.
    pub async fn custom_search(&self, request: SearchRequest) -> Result<Value, ToolError> {
        let params = SearchParams::advanced(request);
        let results = self.search(&params).await?;

        let mut metadata = serde_json::to_value(&params)
            .map_err(|e| ToolError::Internal(e.to_string()))?;
        if let Some(obj) = metadata.as_object_mut() {
            obj.retain(|_, v| !v.is_null());
        }

        Ok(json!({
            "status": "success",
            "results": results,
            "metadata": metadata,
        }))
    }
}

/// Reduce a Tavily response to the `{title, url, content, score}` list the
/// agent works with.
fn summarize_results(response: &Value) -> Value {
    let results = response
        .get("results")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|r| {
                    json!({
                        "title": r.get("title").cloned().unwrap_or(Value::Null),
                        "url": r.get("url").cloned().unwrap_or(Value::Null),
                        "content": r.get("content").cloned().unwrap_or(Value::Null),
                        "score": r.get("score").cloned().unwrap_or(Value::Null),
                    })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    Value::Array(results)
}

/// Handler for the `tavily_search` tool.
pub struct TavilySearchTool {
    client: TavilyClient,
}

impl TavilySearchTool {
    pub fn new(client: TavilyClient) -> Self {
        Self { client }
    }
}

impl ToolHandler for TavilySearchTool {
    fn name(&self) -> &str {
        "tavily_search"
    }

    fn description(&self) -> &str {
        "Search the web for real-time information using Tavily's AI-powered search engine."
    }

    fn keywords(&self) -> &[&'static str] {
        &["search", "news", "latest", "current", "web"]
    }

    fn input_schema(&self) -> JsonObject {
        object_schema(
            vec![
                ("query", json!({"type": "string", "description": "The search query to look up"})),
                ("max_results", json!({"type": "integer", "description": "Maximum number of results to return", "default": 3})),
                ("search_depth", json!({"type": "string", "description": "Search depth (basic or advanced)", "enum": ["basic", "advanced"]})),
            ],
            &["query"],
        )
    }

    fn execute(&self, args: JsonObject) -> ToolFuture<'_> {
        Box::pin(async move {
            let request: SearchRequest = parse_args(args)?;
            if request.query.trim().is_empty() {
                return Err(ToolError::InvalidArguments("query must not be empty".into()));
            }
            let response = self.client.search(&SearchParams::basic(request)).await?;
            Ok(summarize_results(&response))
        })
    }
}
