//! System messages and prompt construction.
//!
//! The active system message steers the fallback agent. Messages are kept in
//! an in-memory store; creating one makes it the only active message. When no
//! message is active the built-in default applies.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::model::ParameterSpec;
use crate::types::SystemMessageId;

/// Error types for system message operations.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptError {
    /// No message with this id.
    NotFound(String),
    /// Message text rejected (e.g. empty).
    InvalidMessage(String),
}

impl std::fmt::Display for PromptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromptError::NotFound(id) => write!(f, "System message not found: {}", id),
            PromptError::InvalidMessage(msg) => write!(f, "Invalid system message: {}", msg),
        }
    }
}

impl std::error::Error for PromptError {}

pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are an expert commercial real estate AI assistant. \
You help analyze properties, market conditions, and create compelling value propositions. \
You have access to internal documents and can search through them for relevant information. \
You can perform real-time web searches for current market trends and news. \
You can access Federal Reserve economic data for deep market analysis.

When analyzing comparable properties:
1. Focus on the most relevant adjustments and their impact on value
2. Explain market trends and their implications clearly
3. Present value ranges with context and confidence levels
4. Highlight key factors influencing the analysis

You communicate professionally and focus on providing actionable insights backed by data.";

/// Appended to every system message handed to the agent.
pub const CALCULATOR_GUIDE: &str = "You have access to calculation tools for:

Financial Metrics (use financial_calculator):
- ROI (Return on Investment)
- Cap Rate (Capitalization Rate)
- NOI (Net Operating Income)

Market Metrics (use market_metrics_calculator):
- Vacancy Rate
- Absorption Rate
- Rent Growth Rate

Property Metrics (use property_metrics_calculator):
- Price per Square Foot
- Operating Expense Ratio
- DSCR (Debt Service Coverage Ratio)

Make sure to use the correct calculator for each metric.
Always show your calculations and explain the results in a clear, professional manner.";

/// Returned in place of a synthesized answer when synthesis fails.
pub const APOLOGY: &str = "I apologize, but I encountered an error while processing the results. \
Please try again or contact support.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemMessage {
    pub id: SystemMessageId,
    pub message: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SystemMessage {
    fn new(message: String, is_active: bool) -> Self {
        let now = Utc::now();
        Self {
            id: SystemMessageId::new(uuid::Uuid::new_v4().to_string()),
            message,
            is_active,
            created_at: now,
            updated_at: now,
        }
    }

    /// The built-in message, reported as inactive.
    pub fn builtin() -> Self {
        Self::new(DEFAULT_SYSTEM_MESSAGE.to_string(), false)
    }
}

fn validate(message: &str) -> Result<(), PromptError> {
    if message.trim().is_empty() {
        return Err(PromptError::InvalidMessage("message must not be empty".into()));
    }
    Ok(())
}

/// In-memory system message store.
#[derive(Default)]
pub struct SystemMessageStore {
    messages: RwLock<Vec<SystemMessage>>,
}

impl SystemMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The active message, if one has been created.
    pub async fn active(&self) -> Option<SystemMessage> {
        self.messages
            .read()
            .await
            .iter()
            .find(|m| m.is_active)
            .cloned()
    }

    /// The active message, or the built-in default.
    pub async fn active_or_default(&self) -> SystemMessage {
        self.active().await.unwrap_or_else(SystemMessage::builtin)
    }

    /// Text of the active message followed by the calculator guide.
    pub async fn agent_prompt(&self) -> String {
        let base = match self.active().await {
            Some(m) => m.message,
            None => DEFAULT_SYSTEM_MESSAGE.to_string(),
        };
        format!("{}\n\n{}", base, CALCULATOR_GUIDE)
    }

    pub async fn get(&self, id: &str) -> Result<SystemMessage, PromptError> {
        self.messages
            .read()
            .await
            .iter()
            .find(|m| m.id.as_str() == id)
            .cloned()
            .ok_or_else(|| PromptError::NotFound(id.to_string()))
    }

    /// Store a new message and make it the only active one.
    pub async fn create(&self, message: impl Into<String>) -> Result<SystemMessage, PromptError> {
        let message = message.into();
        validate(&message)?;

        let created = SystemMessage::new(message, true);
        let mut messages = self.messages.write().await;
        for m in messages.iter_mut() {
            m.is_active = false;
        }
        messages.push(created.clone());
        info!("Activated system message {}", created.id);
        Ok(created)
    }

    /// Replace a message's text; its active flag is unchanged.
    pub async fn update(
        &self,
        id: &str,
        message: impl Into<String>,
    ) -> Result<SystemMessage, PromptError> {
        let message = message.into();
        validate(&message)?;

        let mut messages = self.messages.write().await;
        let entry = messages
            .iter_mut()
            .find(|m| m.id.as_str() == id)
            .ok_or_else(|| PromptError::NotFound(id.to_string()))?;
        entry.message = message;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    /// Remove a message. Deleting the active one reverts to the built-in default.
    pub async fn delete(&self, id: &str) -> Result<(), PromptError> {
        let mut messages = self.messages.write().await;
        let pos = messages
            .iter()
            .position(|m| m.id.as_str() == id)
            .ok_or_else(|| PromptError::NotFound(id.to_string()))?;
        messages.remove(pos);
        Ok(())
    }

    /// All stored messages, oldest first.
    pub async fn list(&self) -> Vec<SystemMessage> {
        self.messages.read().await.clone()
    }
}

/// Prompt asking the model to fill a tool's required parameters from `input`.
pub fn extraction_prompt(
    input: &str,
    tool_name: &str,
    tool_description: &str,
    required: &[ParameterSpec],
) -> String {
    let names: Vec<&str> = required.iter().map(|p| p.name.as_str()).collect();
    let descriptions: Vec<String> = required
        .iter()
        .map(|p| {
            format!(
                "- {}: {}",
                p.name,
                p.description.as_deref().unwrap_or("No description")
            )
        })
        .collect();

    format!(
        "Based on the user input: \"{input}\"\n\
         Extract parameters for the tool: {tool_name}\n\
         Tool description: {tool_description}\n\n\
         Required parameters: {names:?}\n\
         Parameter descriptions:\n\
         {descriptions}\n\n\
         Return only the parameter values in valid JSON format.\n\
         If a required parameter cannot be extracted from the input, use a reasonable default value.",
        descriptions = descriptions.join("\n"),
    )
}

/// Prompt asking the model to merge formatted tool results into one answer.
pub fn synthesis_prompt(input: &str, results: &str) -> String {
    format!(
        "Based on the user input: \"{input}\"\n\
         And the following tool results:\n\
         {results}\n\n\
         Generate a comprehensive response that:\n\
         1. Synthesizes all the relevant information\n\
         2. Presents it in a clear, organized format using markdown\n\
         3. Highlights key insights and recommendations\n\
         4. Maintains a professional tone suitable for commercial real estate"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Ty;

    #[tokio::test]
    async fn test_default_when_empty() {
        let store = SystemMessageStore::new();
        assert!(store.active().await.is_none());

        let fallback = store.active_or_default().await;
        assert!(!fallback.is_active);
        assert_eq!(fallback.message, DEFAULT_SYSTEM_MESSAGE);

        let prompt = store.agent_prompt().await;
        assert!(prompt.starts_with(DEFAULT_SYSTEM_MESSAGE));
        assert!(prompt.ends_with(CALCULATOR_GUIDE));
    }

    #[tokio::test]
    async fn test_create_deactivates_others() {
        let store = SystemMessageStore::new();
        let first = store.create("first").await.unwrap();
        let second = store.create("second").await.unwrap();

        let all = store.list().await;
        assert_eq!(all.len(), 2);
        assert!(!all[0].is_active);
        assert!(all[1].is_active);
        assert_eq!(store.active().await.unwrap().id, second.id);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = SystemMessageStore::new();
        let msg = store.create("draft").await.unwrap();

        let updated = store.update(msg.id.as_str(), "final").await.unwrap();
        assert_eq!(updated.message, "final");
        assert!(updated.is_active);
        assert!(updated.updated_at >= updated.created_at);

        store.delete(msg.id.as_str()).await.unwrap();
        assert!(store.active().await.is_none());
        assert_eq!(
            store.delete(msg.id.as_str()).await,
            Err(PromptError::NotFound(msg.id.to_string()))
        );
        assert!(matches!(store.update("missing", "x").await, Err(PromptError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let store = SystemMessageStore::new();
        assert!(matches!(store.create("  ").await, Err(PromptError::InvalidMessage(_))));
    }

    #[test]
    fn test_extraction_prompt_lists_required() {
        let required = vec![ParameterSpec {
            name: "market_area".into(),
            description: Some("City or region".into()),
            ty: Ty::String,
            required: true,
        }];
        let prompt = extraction_prompt("Atlanta retail", "market_analysis", "Analyzes markets", &required);

        assert!(prompt.contains("Based on the user input: \"Atlanta retail\""));
        assert!(prompt.contains("Required parameters: [\"market_area\"]"));
        assert!(prompt.contains("- market_area: City or region"));
    }

    #[test]
    fn test_synthesis_prompt() {
        let prompt = synthesis_prompt("q", "- roi: 12");
        assert!(prompt.contains("- roi: 12"));
        assert!(prompt.contains("using markdown"));
    }
}
