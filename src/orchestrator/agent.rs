//! Function-calling agent used when the keyword fan-out produced nothing.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::llm::{ChatMessage, LanguageModel, ToolCall};
use crate::model::JsonObject;
use crate::tools::ToolRegistry;

/// Returned when the loop hits a limit before the model produced any text.
pub const STOPPED_TEXT: &str = "Agent stopped due to iteration limit or time limit.";

pub struct FallbackAgent {
    model: Arc<dyn LanguageModel>,
    max_iterations: usize,
    max_execution: Duration,
}

impl FallbackAgent {
    pub fn new(model: Arc<dyn LanguageModel>, max_iterations: usize, max_execution: Duration) -> Self {
        Self {
            model,
            max_iterations,
            max_execution,
        }
    }

    /// Run the tool-calling loop and return the final answer.
    ///
    /// Each iteration is one model call. Tool calls requested by the model are
    /// executed in order and their results (or errors) fed back as tool
    /// messages. The loop stops when the model answers without calling a tool,
    /// or when either limit is reached, in which case the latest assistant
    /// text is returned.
    pub async fn run(
        &self,
        system_prompt: &str,
        history: Vec<ChatMessage>,
        input: &str,
        registry: &ToolRegistry,
    ) -> Result<String> {
        let deadline = Instant::now() + self.max_execution;
        let functions = registry.to_function_specs();

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend(history);
        messages.push(ChatMessage::user(input));

        let mut latest_text: Option<String> = None;

        for iteration in 0..self.max_iterations {
            let turn = match tokio::time::timeout_at(
                deadline,
                self.model.complete_with_tools(&messages, &functions),
            )
            .await
            {
                Ok(turn) => turn?,
                Err(_) => {
                    warn!(iteration, "Agent hit its time limit waiting for the model");
                    return Ok(stopped(latest_text));
                }
            };

            if turn.tool_calls.is_empty() {
                debug!(iteration, "Agent finished");
                return Ok(turn.content.unwrap_or_default());
            }

            if let Some(text) = turn.content.as_ref().filter(|t| !t.trim().is_empty()) {
                latest_text = Some(text.clone());
            }

            messages.push(ChatMessage::assistant_tool_calls(
                turn.content.clone(),
                turn.tool_calls.clone(),
            ));

            for call in &turn.tool_calls {
                let Some(content) = self.invoke(call, registry, deadline).await else {
                    warn!(iteration, tool = %call.name, "Agent hit its time limit during a tool call");
                    return Ok(stopped(latest_text));
                };
                messages.push(ChatMessage::tool_result(call.id.clone(), content));
            }
        }

        info!(
            max_iterations = self.max_iterations,
            "Agent hit its iteration limit"
        );
        Ok(stopped(latest_text))
    }

    /// Tool result text for the model; `None` once the deadline passes.
    async fn invoke(&self, call: &ToolCall, registry: &ToolRegistry, deadline: Instant) -> Option<String> {
        let args: JsonObject = match &call.arguments {
            Value::Object(map) => map.clone(),
            _ => JsonObject::new(),
        };
        debug!(tool = %call.name, "Agent calling tool");

        let result = tokio::time::timeout_at(deadline, registry.call_tool(&call.name, args))
            .await
            .ok()?;
        Some(match result {
            Ok(Value::String(s)) => s,
            Ok(value) => value.to_string(),
            Err(e) => format!("Error: {}", e),
        })
    }
}

fn stopped(latest_text: Option<String>) -> String {
    latest_text.unwrap_or_else(|| STOPPED_TEXT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use crate::llm::{AssistantTurn, FunctionSpec, Role};
    use crate::tools::test_support::FnTool;
    use crate::tools::{ToolError, ToolFuture, ToolHandler, object_schema};
    use serde_json::json;

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .register_handler(FnTool::new("financial_calculator", |args| {
                let income = args.get("income").and_then(Value::as_f64).unwrap_or(0.0);
                Ok(json!({"noi": income - 40.0}))
            }))
            .register_handler(FnTool::new("tavily_search", |_| {
                Err(ToolError::NotConfigured("TAVILY_API_KEY is not set".into()))
            }))
    }

    fn tool_call(id: &str, name: &str, arguments: Value) -> AssistantTurn {
        AssistantTurn {
            content: None,
            tool_calls: vec![ToolCall {
                id: id.into(),
                name: name.into(),
                arguments,
            }],
        }
    }

    fn agent(model: Arc<ScriptedModel>, iterations: usize) -> FallbackAgent {
        FallbackAgent::new(model, iterations, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_tool_round_then_answer() {
        let model = Arc::new(ScriptedModel::replying("unused").with_turns(vec![
            tool_call("c1", "financial_calculator", json!({"income": 100.0})),
            AssistantTurn {
                content: Some("NOI is 60.".into()),
                tool_calls: vec![],
            },
        ]));
        let history = vec![ChatMessage::user("earlier"), ChatMessage::assistant("reply")];

        let answer = agent(model.clone(), 10)
            .run("system", history, "What is NOI?", &registry())
            .await
            .unwrap();
        assert_eq!(answer, "NOI is 60.");
        assert_eq!(model.tool_rounds(), 2);

        let seen = model.seen.lock().unwrap();
        let second = &seen[1];
        assert_eq!(second[0].role, Role::System);
        assert_eq!(second[1].content.as_deref(), Some("earlier"));
        assert_eq!(second[3].content.as_deref(), Some("What is NOI?"));
        let tool_msg = second.last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(tool_msg.content.as_deref(), Some("{\"noi\":60.0}"));
    }

    #[tokio::test]
    async fn test_tool_errors_are_reported_to_model() {
        let model = Arc::new(ScriptedModel::replying("unused").with_turns(vec![
            tool_call("c1", "tavily_search", json!({"query": "x"})),
            tool_call("c2", "no_such_tool", json!("not an object")),
            AssistantTurn {
                content: Some("Search is unavailable.".into()),
                tool_calls: vec![],
            },
        ]));

        let answer = agent(model.clone(), 10)
            .run("system", vec![], "news?", &registry())
            .await
            .unwrap();
        assert_eq!(answer, "Search is unavailable.");

        let seen = model.seen.lock().unwrap();
        let last = seen.last().unwrap();
        let errors: Vec<&str> = last
            .iter()
            .filter(|m| m.role == Role::Tool)
            .filter_map(|m| m.content.as_deref())
            .collect();
        assert!(errors[0].starts_with("Error: Not configured"));
        assert!(errors[1].contains("Tool not found: no_such_tool"));
    }

    #[tokio::test]
    async fn test_iteration_limit_stops_loop() {
        let model = Arc::new(
            ScriptedModel::replying("unused")
                .with_fallback_turn(tool_call("c", "financial_calculator", json!({}))),
        );
        let answer = agent(model.clone(), 3)
            .run("system", vec![], "loop forever", &registry())
            .await
            .unwrap();
        assert_eq!(answer, STOPPED_TEXT);
        assert_eq!(model.tool_rounds(), 3);
    }

    #[tokio::test]
    async fn test_limit_returns_latest_text() {
        let mut turn = tool_call("c", "financial_calculator", json!({}));
        turn.content = Some("Working on it".into());
        let model = Arc::new(ScriptedModel::replying("unused").with_fallback_turn(turn));

        let answer = agent(model, 2)
            .run("system", vec![], "q", &registry())
            .await
            .unwrap();
        assert_eq!(answer, "Working on it");
    }

    /// A model that never answers within any reasonable deadline.
    struct StalledModel;

    #[async_trait::async_trait]
    impl LanguageModel for StalledModel {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(String::new())
        }

        async fn complete_with_tools(
            &self,
            _messages: &[ChatMessage],
            _functions: &[FunctionSpec],
        ) -> Result<AssistantTurn> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(AssistantTurn {
                content: Some("too late".into()),
                tool_calls: vec![],
            })
        }
    }

    /// A tool that outlives any short deadline.
    struct StalledTool;

    impl ToolHandler for StalledTool {
        fn name(&self) -> &str {
            "rent_roll_lookup"
        }

        fn description(&self) -> &str {
            "Looks up a rent roll slowly"
        }

        fn input_schema(&self) -> JsonObject {
            object_schema(vec![], &[])
        }

        fn execute(&self, _args: JsonObject) -> ToolFuture<'_> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(json!("too late"))
            })
        }
    }

    #[tokio::test]
    async fn test_time_limit_while_waiting_for_model() {
        let agent = FallbackAgent::new(Arc::new(StalledModel), 10, Duration::from_millis(100));
        let started = std::time::Instant::now();

        let answer = agent
            .run("system", vec![], "cap rate trends?", &registry())
            .await
            .unwrap();
        assert_eq!(answer, STOPPED_TEXT);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_time_limit_during_tool_call() {
        let model = Arc::new(
            ScriptedModel::replying("unused")
                .with_fallback_turn(tool_call("c1", "rent_roll_lookup", json!({}))),
        );
        let registry = ToolRegistry::new().register_handler(StalledTool);
        let agent = FallbackAgent::new(model.clone(), 10, Duration::from_millis(100));
        let started = std::time::Instant::now();

        let answer = agent
            .run("system", vec![], "pull the rent roll", &registry)
            .await
            .unwrap();
        assert_eq!(answer, STOPPED_TEXT);
        assert_eq!(model.tool_rounds(), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_time_limit_during_tool_call_keeps_latest_text() {
        let mut turn = tool_call("c1", "rent_roll_lookup", json!({}));
        turn.content = Some("Pulling the rent roll".into());
        let model = Arc::new(ScriptedModel::replying("unused").with_fallback_turn(turn));
        let registry = ToolRegistry::new().register_handler(StalledTool);

        let answer = FallbackAgent::new(model, 10, Duration::from_millis(100))
            .run("system", vec![], "pull the rent roll", &registry)
            .await
            .unwrap();
        assert_eq!(answer, "Pulling the rent roll");
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let model = Arc::new(ScriptedModel::replying("unused"));
        let result = agent(model, 3).run("system", vec![], "q", &registry()).await;
        assert!(result.is_err());
    }
}
