pub mod api;
pub mod config;
pub mod executor;
pub mod llm;
pub mod model;
pub mod orchestrator;
pub mod prompts;
pub mod tools;
pub mod types;

// Re-export key types and functions
pub use config::Settings;
pub use executor::{ToolExecutor, ToolOutput};
pub use llm::{LanguageModel, OpenAiChatModel};
pub use orchestrator::{AnswerPath, ChatOutcome, ChatRequest, Orchestrator};
pub use prompts::{PromptError, SystemMessage, SystemMessageStore};
pub use tools::{ToolError, ToolHandler, ToolRegistry, default_registry};

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use tools::{DocumentStore, SupabaseDocumentStore, UnconfiguredDocumentStore};

/// Document store from settings; without Supabase credentials every search fails.
pub fn create_document_store(settings: &Settings) -> Arc<dyn DocumentStore> {
    match SupabaseDocumentStore::from_settings(settings) {
        Some(store) => {
            info!("Document search backed by Supabase");
            Arc::new(store)
        }
        None => {
            warn!("Supabase is not configured; document search is unavailable");
            Arc::new(UnconfiguredDocumentStore)
        }
    }
}

/// Convenience function to create a fully configured orchestrator: the OpenAI
/// model, the default tool set and the document store.
pub fn create_orchestrator(settings: &Settings) -> Result<Orchestrator> {
    create_orchestrator_with_documents(settings, create_document_store(settings))
}

/// Like [`create_orchestrator`], with `document_search` reading from `documents`.
pub fn create_orchestrator_with_documents(
    settings: &Settings,
    documents: Arc<dyn DocumentStore>,
) -> Result<Orchestrator> {
    let model = OpenAiChatModel::from_settings(settings)?;
    info!("Using model {}", model.model());

    let registry = default_registry(settings, documents);
    info!("Registered {} tools", registry.len());

    Ok(Orchestrator::new(Arc::new(model), registry, settings))
}
