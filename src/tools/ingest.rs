//! Turning uploaded files into stored documents.

use std::path::Path;

use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::document_search::DocumentStore;
use super::registry::ToolError;
use crate::model::JsonObject;

/// Characters per stored chunk.
pub const CHUNK_SIZE: usize = 1000;
/// Characters repeated at the start of the next chunk.
pub const CHUNK_OVERLAP: usize = 50;

/// File extensions accepted for upload; all are read as UTF-8 text.
const ACCEPTED_EXTENSIONS: [&str; 4] = ["txt", "md", "csv", "json"];

/// Split `text` into chunks of at most `chunk_size` characters, each
/// repeating up to `overlap` characters of the previous one.
///
/// A chunk ends at the last whitespace inside its window when there is one,
/// and the overlap starts on a word boundary, so words are only cut when a
/// single word is longer than the window. Chunks are trimmed and empty ones
/// dropped.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + chunk_size).min(chars.len());
        let mut cut_at_space = false;
        if end < chars.len() {
            if let Some(ws) = chars[start..end].iter().rposition(|c| c.is_whitespace()) {
                if ws > 0 {
                    end = start + ws;
                    cut_at_space = true;
                }
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        if end >= chars.len() {
            break;
        }

        let back = end.saturating_sub(overlap);
        let next = match chars[back..end].iter().position(|c| c.is_whitespace()) {
            Some(ws) => back + ws + 1,
            None if cut_at_space => end,
            None => back,
        };
        start = if next > start { next } else { end };
    }

    chunks
}

/// A file received by the upload route.
pub struct Upload<'a> {
    pub filename: &'a str,
    pub content_type: Option<&'a str>,
    pub bytes: &'a [u8],
}

/// Validate an upload, store it and return
/// `{"status": "success", "data": {"id", "metadata"}}`.
///
/// Unsupported or non-text files are `InvalidArguments`; store failures are
/// `Upstream`.
pub async fn ingest_upload(store: &dyn DocumentStore, upload: Upload<'_>) -> Result<Value, ToolError> {
    let extension = Path::new(upload.filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ToolError::InvalidArguments(format!(
            "Invalid file type: {} (accepted: .txt, .md, .csv, .json)",
            upload.filename
        )));
    }

    let text = std::str::from_utf8(upload.bytes).map_err(|_| {
        ToolError::InvalidArguments(format!("Invalid file type: {} is not UTF-8 text", upload.filename))
    })?;
    if text.trim().is_empty() {
        return Err(ToolError::InvalidArguments(format!(
            "{} contains no text",
            upload.filename
        )));
    }

    let mut metadata = JsonObject::new();
    metadata.insert("id".into(), json!(Uuid::new_v4().to_string()));
    metadata.insert("name".into(), json!(upload.filename));
    metadata.insert(
        "type".into(),
        json!(upload.content_type.unwrap_or("text/plain")),
    );
    metadata.insert("size".into(), json!(upload.bytes.len()));
    metadata.insert("source".into(), json!(upload.filename));
    metadata.insert("uploaded_at".into(), json!(chrono::Utc::now().to_rfc3339()));

    let id = store.add_document(text, metadata.clone()).await?;
    info!(document = %id, name = upload.filename, "Document uploaded");

    Ok(json!({
        "status": "success",
        "data": {
            "id": id,
            "metadata": metadata,
        }
    }))
}
