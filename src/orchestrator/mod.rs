//! Core orchestrator: routes a request to tools, runs them, and merges the
//! results into one answer.
//!
//! The pipeline is select -> extract -> execute -> synthesize. When it yields
//! no usable output, a single function-calling agent run answers instead.

mod agent;
mod extractor;
mod memory;
mod selector;
mod synthesizer;

pub use agent::{FallbackAgent, STOPPED_TEXT};
pub use extractor::{PlannedCall, apply_defaults, extract_all, extract_parameters, parse_json_object};
pub use memory::ConversationMemory;
pub use selector::select_tools;
pub use synthesizer::{format_results, synthesize};

use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use tracing::info;

use crate::config::Settings;
use crate::executor::ToolExecutor;
use crate::llm::LanguageModel;
use crate::prompts::SystemMessageStore;
use crate::tools::{ToolRegistry, resolve_aliases};
use crate::types::{SessionId, ToolName};

/// One chat turn.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Public tool aliases restricting this request; empty or absent means all.
    #[serde(default)]
    pub tools: Option<Vec<String>>,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            tools: None,
            session_id: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// How an answer was produced.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerPath {
    /// Tool outputs merged by the synthesizer.
    Synthesized { tools: Vec<ToolName> },
    /// The function-calling agent.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    pub answer: String,
    pub path: AnswerPath,
}

/// The core orchestrator.
pub struct Orchestrator {
    model: Arc<dyn LanguageModel>,
    registry: ToolRegistry,
    executor: ToolExecutor,
    agent: FallbackAgent,
    prompts: Arc<SystemMessageStore>,
    memory: ConversationMemory,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn LanguageModel>, registry: ToolRegistry, settings: &Settings) -> Self {
        Self {
            agent: FallbackAgent::new(
                model.clone(),
                settings.agent_max_iterations,
                settings.agent_max_execution(),
            ),
            model,
            registry,
            executor: ToolExecutor::new(settings.tool_timeout()),
            prompts: Arc::new(SystemMessageStore::new()),
            memory: ConversationMemory::new(
                settings.memory_max_messages,
                settings.memory_max_sessions,
            ),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn prompts(&self) -> &Arc<SystemMessageStore> {
        &self.prompts
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// The tools a request may use. The filter is per request; the shared
    /// registry is never modified.
    fn tools_for(&self, request: &ChatRequest) -> ToolRegistry {
        match &request.tools {
            Some(aliases) if !aliases.is_empty() => self.registry.subset(&resolve_aliases(aliases)),
            _ => self.registry.clone(),
        }
    }

    /// Answer one chat turn.
    pub async fn respond(&self, request: &ChatRequest) -> Result<ChatOutcome> {
        let registry = self.tools_for(request);
        let input = request.message.as_str();
        info!(tools = registry.len(), "Handling chat request");

        let selected = select_tools(input, &registry);
        let calls = extract_all(self.model.as_ref(), input, selected).await;
        let outputs = self.executor.run(calls).await;

        if !outputs.is_empty() {
            let tools: Vec<ToolName> = outputs.iter().map(|o| o.tool_name.clone()).collect();
            info!(tools = ?tools, "Synthesizing tool outputs");
            let answer = synthesize(self.model.as_ref(), input, &outputs).await;
            return Ok(ChatOutcome {
                answer,
                path: AnswerPath::Synthesized { tools },
            });
        }

        info!("No tool produced output; falling back to the agent");
        let session = request.session_id.clone().unwrap_or_default();
        let system_prompt = self.prompts.agent_prompt().await;
        let history = self.memory.history(&session).await;
        let answer = self
            .agent
            .run(&system_prompt, history, input, &registry)
            .await?;
        self.memory.append(&session, input, &answer).await;

        Ok(ChatOutcome {
            answer,
            path: AnswerPath::Fallback,
        })
    }
}
