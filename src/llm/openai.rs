// OpenAI Chat Completions client

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{AssistantTurn, ChatMessage, FunctionSpec, LanguageModel, Role, ToolCall};
use crate::config::Settings;

pub struct OpenAiChatModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: crate::config::DEFAULT_OPENAI_BASE_URL.to_string(),
            model: model.into(),
            temperature,
        }
    }

    /// Build from settings; fails when no API key is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings
            .openai_api_key
            .clone()
            .context("OPENAI_API_KEY is not set")?;
        Ok(Self::new(api_key, settings.model_name.clone(), settings.temperature)
            .with_base_url(settings.openai_base_url.clone()))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(&self, request: &WireRequest<'_>) -> Result<WireMessage> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .context("Failed to send OpenAI request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "OpenAI API request failed with status {}: {}",
                status,
                error_text
            );
        }

        let body: WireResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI response")?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| anyhow::anyhow!("No choices in OpenAI response"))
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = WireRequest {
            model: &self.model,
            messages: messages.iter().map(WireMessage::from_chat).collect(),
            temperature: self.temperature,
            tools: None,
        };
        let message = self.send(&request).await?;
        Ok(message.content.unwrap_or_default())
    }

    async fn complete_with_tools(
        &self,
        messages: &[ChatMessage],
        functions: &[FunctionSpec],
    ) -> Result<AssistantTurn> {
        let tools = (!functions.is_empty()).then(|| {
            functions
                .iter()
                .map(|f| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": f.name,
                            "description": f.description,
                            "parameters": f.parameters,
                        }
                    })
                })
                .collect()
        });

        let request = WireRequest {
            model: &self.model,
            messages: messages.iter().map(WireMessage::from_chat).collect(),
            temperature: self.temperature,
            tools,
        };
        Ok(self.send(&request).await?.into_turn())
    }
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: Role,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded arguments, as the API transmits them.
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

impl WireMessage {
    fn from_chat(msg: &ChatMessage) -> Self {
        let tool_calls = (!msg.tool_calls.is_empty()).then(|| {
            msg.tool_calls
                .iter()
                .map(|tc| WireToolCall {
                    id: tc.id.clone(),
                    kind: function_type(),
                    function: WireFunctionCall {
                        name: tc.name.clone(),
                        arguments: tc.arguments.to_string(),
                    },
                })
                .collect()
        });

        Self {
            role: msg.role,
            content: msg.content.clone(),
            tool_calls,
            tool_call_id: msg.tool_call_id.clone(),
        }
    }

    fn into_turn(self) -> AssistantTurn {
        let tool_calls = self
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                // Malformed argument JSON becomes an empty object so the tool
                // can still report what is missing.
                arguments: serde_json::from_str(&tc.function.arguments)
                    .unwrap_or_else(|_| json!({})),
            })
            .collect();

        AssistantTurn {
            content: self.content.filter(|c| !c.is_empty()),
            tool_calls,
        }
    }
}
