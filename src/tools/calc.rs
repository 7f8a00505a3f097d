//! Shared plumbing for the `operation` + `values` calculator tools.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Value, json};

use super::registry::{ToolError, object_schema};
use crate::model::JsonObject;

#[derive(Debug, Deserialize)]
pub struct CalculatorInput {
    pub operation: String,
    #[serde(default)]
    pub values: Option<HashMap<String, f64>>,
}

impl CalculatorInput {
    /// Look up a value, falling back to `default` when it is absent.
    pub fn value(&self, key: &str, default: f64) -> f64 {
        self.values
            .as_ref()
            .and_then(|v| v.get(key))
            .copied()
            .unwrap_or(default)
    }

    pub fn unsupported(&self) -> ToolError {
        ToolError::InvalidArguments(format!("Unsupported operation: {}", self.operation))
    }
}

pub fn calculator_schema(operations: &[&str], values_description: &str) -> JsonObject {
    object_schema(
        vec![
            (
                "operation",
                json!({
                    "type": "string",
                    "description": format!(
                        "Type of calculation to perform ({})",
                        operations.join(", ")
                    ),
                    "enum": operations,
                }),
            ),
            (
                "values",
                json!({
                    "type": "object",
                    "description": values_description,
                    "additionalProperties": {"type": "number"},
                }),
            ),
        ],
        &["operation", "values"],
    )
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn calc_error(msg: impl Into<String>) -> Value {
    json!({ "error": msg.into() })
}
