//! Language-model parameter extraction for selected tools.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::{ChatMessage, LanguageModel};
use crate::model::{JsonObject, ParameterSpec};
use crate::prompts::extraction_prompt;
use crate::tools::ToolHandler;

/// A tool paired with the arguments extracted for it.
pub struct PlannedCall {
    pub tool: Arc<dyn ToolHandler>,
    pub args: JsonObject,
}

/// Best-effort parse of a model reply into a JSON object.
///
/// A surrounding markdown fence is stripped first; failing that, the
/// outermost `{...}` span is tried.
pub fn parse_json_object(reply: &str) -> Option<JsonObject> {
    let trimmed = strip_fence(reply.trim());
    if let Ok(Value::Object(map)) = serde_json::from_str(trimmed) {
        return Some(map);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&trimmed[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Insert the type default for every required parameter the model left out.
pub fn apply_defaults(args: &mut JsonObject, params: &[ParameterSpec]) {
    for param in params.iter().filter(|p| p.required) {
        if !args.contains_key(&param.name) {
            args.insert(param.name.clone(), param.ty.default_value());
        }
    }
}

/// Ask the model for `tool`'s arguments. `None` means the tool should be
/// skipped: the model failed or did not return a JSON object.
pub async fn extract_parameters(
    model: &dyn LanguageModel,
    input: &str,
    tool: &dyn ToolHandler,
) -> Option<JsonObject> {
    let params = ParameterSpec::from_schema(&tool.input_schema());
    let required: Vec<ParameterSpec> = params.iter().filter(|p| p.required).cloned().collect();
    let prompt = extraction_prompt(input, tool.name(), tool.description(), &required);

    let reply = match model.complete(&[ChatMessage::user(prompt)]).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(tool = tool.name(), "Parameter extraction failed: {:#}", e);
            return None;
        }
    };

    let Some(mut args) = parse_json_object(&reply) else {
        warn!(tool = tool.name(), "Model reply was not a JSON object; skipping tool");
        return None;
    };
    apply_defaults(&mut args, &params);
    let shown = Value::Object(args.clone());
    debug!(tool = tool.name(), args = %shown, "Extracted parameters");
    Some(args)
}

/// Extract arguments for every tool concurrently, keeping selection order and
/// dropping tools whose extraction failed.
pub async fn extract_all(
    model: &dyn LanguageModel,
    input: &str,
    tools: Vec<Arc<dyn ToolHandler>>,
) -> Vec<PlannedCall> {
    let extracted = join_all(
        tools
            .iter()
            .map(|tool| extract_parameters(model, input, tool.as_ref())),
    )
    .await;

    tools
        .into_iter()
        .zip(extracted)
        .filter_map(|(tool, args)| args.map(|args| PlannedCall { tool, args }))
        .collect()
}
