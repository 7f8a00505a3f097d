// REST API endpoints for the assistant

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{
        IntoResponse, Json, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post, put},
};
use futures::Stream;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::model::JsonObject;
use crate::orchestrator::{ChatRequest, Orchestrator};
use crate::prompts::{PromptError, SystemMessage};
use crate::tools::{
    DocumentStore, SearchRequest, StoredDocument, TavilyClient, ToolError, Upload, ingest_upload,
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Store behind the document admin routes; the same one `document_search` reads.
    pub documents: Arc<dyn DocumentStore>,
    /// Client for the advanced custom search endpoint.
    pub web_search: TavilyClient,
    /// Pause between streamed chunks.
    pub chunk_delay: Duration,
}

/// Errors surfaced to HTTP clients as `{"detail": ...}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(d) => (StatusCode::BAD_REQUEST, d),
            ApiError::NotFound(d) => (StatusCode::NOT_FOUND, d),
            ApiError::Internal(d) => (StatusCode::INTERNAL_SERVER_ERROR, d),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<ToolError> for ApiError {
    fn from(e: ToolError) -> Self {
        match e {
            ToolError::InvalidArguments(_) => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(format!("{:#}", e))
    }
}

impl From<PromptError> for ApiError {
    fn from(e: PromptError) -> Self {
        match e {
            PromptError::NotFound(_) => ApiError::NotFound(e.to_string()),
            PromptError::InvalidMessage(_) => ApiError::BadRequest(e.to_string()),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route("/tools/search", post(search_web))
        .route("/tools/economic-data", post(economic_data))
        .route("/tools/market-analysis", post(market_analysis))
        .route("/tools/property-analysis", post(property_analysis))
        .route("/tools/value-proposition", post(value_proposition))
        .route("/tools/document-search", post(document_search))
        .route("/tools/custom-web-search", post(custom_web_search))
        .route(
            "/admin/system-message",
            get(get_system_message).post(create_system_message),
        )
        .route(
            "/admin/system-message/{id}",
            put(update_system_message).delete(delete_system_message),
        )
        .route("/admin/documents", get(list_documents))
        .route("/admin/documents/upload", post(upload_document))
        .route(
            "/admin/documents/{id}",
            get(get_document).delete(delete_document),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": "CRE AI Assistant API is running",
        "version": "1.0.0"
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Split `text` on whitespace into chunks of `size` words.
pub fn chunk_words(text: &str, size: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words.chunks(size.max(1)).map(|c| c.join(" ")).collect()
}

/// Streams the answer three words per event, then `[DONE]`; a failure sends
/// one `ERROR: ...` event instead.
async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let (tx, rx) = mpsc::channel::<String>(16);
    tokio::spawn(async move {
        match state.orchestrator.respond(&request).await {
            Ok(outcome) => {
                for chunk in chunk_words(&outcome.answer, 3) {
                    if tx.send(chunk).await.is_err() {
                        info!("Chat client disconnected");
                        return;
                    }
                    tokio::time::sleep(state.chunk_delay).await;
                }
                let _ = tx.send("[DONE]".to_string()).await;
            }
            Err(e) => {
                error!("Error in chat: {:#}", e);
                let _ = tx.send(format!("ERROR: {}", e)).await;
            }
        }
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let data = rx.recv().await?;
        let event = Event::default().data(data.replace('\r', ""));
        Some((Ok::<_, Infallible>(event), rx))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn call_tool(state: &AppState, tool: &str, args: JsonObject) -> Result<Value, ApiError> {
    state
        .orchestrator
        .registry()
        .call_tool(tool, args)
        .await
        .map_err(|e| {
            error!(tool, "Direct tool call failed: {}", e);
            ApiError::from(e)
        })
}

async fn search_web(
    State(state): State<AppState>,
    Json(mut body): Json<JsonObject>,
) -> Result<Json<Value>, ApiError> {
    body.entry("max_results").or_insert(json!(5));
    let results = call_tool(&state, "tavily_search", body).await?;
    Ok(Json(json!({ "results": results })))
}

async fn economic_data(
    State(state): State<AppState>,
    Json(body): Json<JsonObject>,
) -> Result<Json<Value>, ApiError> {
    let data = call_tool(&state, "fred_economic_data", body).await?;
    Ok(Json(json!({ "data": data })))
}

#[derive(Debug, Deserialize)]
struct MarketAnalysisBody {
    location: String,
    property_type: String,
}

async fn market_analysis(
    State(state): State<AppState>,
    Json(body): Json<MarketAnalysisBody>,
) -> Result<Json<Value>, ApiError> {
    let args = json!({
        "market_area": body.location,
        "property_type": body.property_type,
        "timeframe": "12 months",
    });
    let analysis = call_tool(&state, "market_analysis", into_object(args)).await?;
    Ok(Json(json!({ "analysis": analysis })))
}

async fn property_analysis(
    State(state): State<AppState>,
    Json(body): Json<JsonObject>,
) -> Result<Json<Value>, ApiError> {
    let analysis = call_tool(&state, "property_analysis", body).await?;
    Ok(Json(json!({ "analysis": analysis })))
}

#[derive(Debug, Deserialize)]
struct ValuePropositionBody {
    #[serde(default)]
    property_details: JsonObject,
    #[serde(default)]
    target_audience: Option<String>,
}

async fn value_proposition(
    State(state): State<AppState>,
    Json(body): Json<ValuePropositionBody>,
) -> Result<Json<Value>, ApiError> {
    let details = &body.property_details;
    let args = json!({
        "property_type": details.get("type").cloned().unwrap_or(json!("")),
        "target_audience": body.target_audience.clone().filter(|a| !a.is_empty()).unwrap_or_else(|| "investors".to_string()),
        "property_features": details.get("features").cloned().unwrap_or(json!([])),
    });
    let proposition = call_tool(&state, "value_proposition", into_object(args)).await?;
    Ok(Json(json!({ "value_proposition": proposition })))
}

async fn document_search(
    State(state): State<AppState>,
    Json(body): Json<JsonObject>,
) -> Result<Json<Value>, ApiError> {
    let found = call_tool(&state, "document_search", body).await?;
    Ok(Json(json!({ "results": found })))
}

async fn custom_web_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Value>, ApiError> {
    let result = state.web_search.custom_search(request).await.map_err(|e| {
        error!("Error in custom web search: {}", e);
        ApiError::from(e)
    })?;
    Ok(Json(result))
}

fn into_object(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

/// The active system message, or the built-in default (reported inactive).
async fn get_system_message(State(state): State<AppState>) -> Json<SystemMessage> {
    Json(state.orchestrator.prompts().active_or_default().await)
}

#[derive(Debug, Deserialize)]
struct SystemMessageBody {
    message: String,
}

async fn create_system_message(
    State(state): State<AppState>,
    Json(body): Json<SystemMessageBody>,
) -> Result<Json<SystemMessage>, ApiError> {
    let created = state.orchestrator.prompts().create(body.message).await?;
    Ok(Json(created))
}

async fn update_system_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SystemMessageBody>,
) -> Result<Json<SystemMessage>, ApiError> {
    let updated = state.orchestrator.prompts().update(&id, body.message).await?;
    Ok(Json(updated))
}

async fn delete_system_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.orchestrator.prompts().delete(&id).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "System message deleted"
    })))
}

/// Accepts one multipart field named `file`.
async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let upload = Upload {
            filename: &filename,
            content_type: content_type.as_deref(),
            bytes: &bytes,
        };
        let stored = ingest_upload(state.documents.as_ref(), upload)
            .await
            .map_err(|e| {
                warn!(file = %filename, "Document upload failed: {}", e);
                ApiError::from(e)
            })?;
        return Ok(Json(stored));
    }
    Err(ApiError::BadRequest("Upload has no `file` field".into()))
}

async fn list_documents(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let documents = state.documents.list_documents().await?;
    Ok(Json(json!({ "documents": documents })))
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoredDocument>, ApiError> {
    state
        .documents
        .get_document(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Document not found: {}", id)))
}

async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.documents.delete_document(&id).await? {
        return Err(ApiError::NotFound(format!("Document not found: {}", id)));
    }
    Ok(Json(json!({
        "status": "success",
        "message": "Document deleted"
    })))
}
