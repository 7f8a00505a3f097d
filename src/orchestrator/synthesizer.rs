//! Merging tool outputs into one answer.

use serde_json::Value;
use tracing::error;

use crate::executor::ToolOutput;
use crate::llm::{ChatMessage, LanguageModel};
use crate::prompts::{APOLOGY, synthesis_prompt};

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten outputs into `- key: value` lines; non-object outputs take one
/// `- value` line each.
pub fn format_results(outputs: &[ToolOutput]) -> String {
    let mut lines = Vec::new();
    for output in outputs {
        match &output.value {
            Value::Object(map) => {
                for (key, value) in map {
                    lines.push(format!("- {}: {}", key, display(value)));
                }
            }
            other => lines.push(format!("- {}", display(other))),
        }
    }
    lines.join("\n")
}

/// One markdown answer from all outputs. Model failures yield the apology text.
pub async fn synthesize(model: &dyn LanguageModel, input: &str, outputs: &[ToolOutput]) -> String {
    let prompt = synthesis_prompt(input, &format_results(outputs));
    match model.complete(&[ChatMessage::user(prompt)]).await {
        Ok(answer) => answer,
        Err(e) => {
            error!("Synthesis failed: {:#}", e);
            APOLOGY.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use crate::types::ToolName;
    use serde_json::json;

    fn output(name: &str, value: Value) -> ToolOutput {
        ToolOutput {
            tool_name: ToolName::new(name),
            value,
        }
    }

    #[test]
    fn test_format_results() {
        let outputs = vec![
            output("financial_calculator", json!({"noi": 60000.0, "note": "annual"})),
            output("cold_call_script_generator", json!("Hello {name}")),
            output("tavily_search", json!([{"title": "T"}])),
        ];
        assert_eq!(
            format_results(&outputs),
            "- noi: 60000.0\n- note: annual\n- Hello {name}\n- [{\"title\":\"T\"}]"
        );
    }

    #[tokio::test]
    async fn test_synthesize_passes_results_to_model() {
        let model = ScriptedModel::new(|messages| {
            let prompt = crate::llm::testing::last_user_text(messages);
            assert!(prompt.contains("- cap_rate: 6.5"));
            Ok("## Summary".to_string())
        });
        let answer = synthesize(&model, "cap rate?", &[output("c", json!({"cap_rate": 6.5}))]).await;
        assert_eq!(answer, "## Summary");
    }

    #[tokio::test]
    async fn test_synthesize_failure_apologizes() {
        let model = ScriptedModel::new(|_| anyhow::bail!("timeout"));
        let answer = synthesize(&model, "q", &[output("c", json!(1))]).await;
        assert_eq!(answer, APOLOGY);
    }
}
