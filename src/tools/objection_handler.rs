//! Objection handling from keyword-matched response patterns.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Value, json};

use super::catalog::{fill_placeholders, load_json_dir};
use super::registry::{ToolFuture, ToolHandler, object_schema, parse_args};
use crate::model::JsonObject;

const DEFAULT_RESPONSE: &str = "I understand your concern about the cost and timing. Let me address both points:\n\n\
1. Regarding the budget: While $45/sqft might seem high initially, when we factor in the location and amenities, \
it's actually competitive for the current market. We can explore different financing options or space optimization strategies.\n\n\
2. About economic uncertainty: This is precisely why now might be a good time. We're seeing property owners offer more \
flexible terms and incentives. Your current lease might be working, but we could potentially secure better terms \
that provide both stability and room for growth.\n\n\
Would you be open to reviewing a detailed cost-benefit analysis comparing your current situation with this opportunity?";

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectionPattern {
    pub name: String,
    pub pattern: String,
    pub response_template: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub follow_up: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectionInput {
    objection_text: String,
    #[serde(default)]
    context: Option<JsonObject>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    custom_response: Option<String>,
}

/// Handler for the `objection_handler` tool.
pub struct ObjectionHandlerTool {
    patterns: BTreeMap<String, ObjectionPattern>,
}

impl ObjectionHandlerTool {
    pub fn new(patterns: BTreeMap<String, ObjectionPattern>) -> Self {
        Self { patterns }
    }

    /// Load patterns from a directory of JSON files.
    pub fn from_dir(dir: &Path) -> Self {
        Self::new(load_json_dir(dir, |p: &ObjectionPattern| p.name.clone()))
    }

    /// The pattern with the most keyword hits; ties keep the earlier pattern.
    /// A pattern needs at least one hit to match.
    fn best_match(&self, objection: &str, category: Option<&str>) -> Option<&ObjectionPattern> {
        if objection.is_empty() {
            return None;
        }
        let objection = objection.to_lowercase();

        let mut best = None;
        let mut best_hits = 0;
        for pattern in self.patterns.values() {
            if category.is_some_and(|c| pattern.category.as_deref() != Some(c)) {
                continue;
            }
            let hits = pattern
                .keywords
                .iter()
                .filter(|k| objection.contains(&k.to_lowercase()))
                .count();
            if hits > best_hits {
                best_hits = hits;
                best = Some(pattern);
            }
        }
        best
    }

    fn respond(&self, input: ObjectionInput) -> String {
        if let Some(custom) = input.custom_response.filter(|c| !c.is_empty()) {
            return custom;
        }

        let category = input.category.as_deref().filter(|c| !c.is_empty());
        let Some(pattern) = self.best_match(&input.objection_text, category) else {
            return DEFAULT_RESPONSE.to_string();
        };

        let context = input.context.unwrap_or_default();
        let mut response = fill_placeholders(
            &pattern.response_template,
            context.iter().map(|(k, v)| (k.as_str(), display_value(v))),
        );
        if let Some(follow_up) = &pattern.follow_up {
            response = format!("{}\n\n{}", response, follow_up);
        }
        response
    }
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ToolHandler for ObjectionHandlerTool {
    fn name(&self) -> &str {
        "objection_handler"
    }

    fn description(&self) -> &str {
        "Handles common objections in commercial real estate conversations. Provides \
         tailored responses to typical objections about pricing, timing, competition, etc."
    }

    fn keywords(&self) -> &[&'static str] {
        &["objection", "pushback", "too expensive", "not interested"]
    }

    fn input_schema(&self) -> JsonObject {
        object_schema(
            vec![
                ("objection_text", json!({"type": "string", "description": "The actual objection raised by the prospect"})),
                ("context", json!({"type": "object", "description": "Additional context about the prospect or situation"})),
                ("category", json!({"type": "string", "description": "Specific category of objection to look for (e.g., price, timing, competition)"})),
                ("custom_response", json!({"type": "string", "description": "Custom response to use instead of pattern matching"})),
            ],
            &["objection_text"],
        )
    }

    fn execute(&self, args: JsonObject) -> ToolFuture<'_> {
        Box::pin(async move {
            let input: ObjectionInput = parse_args(args)?;
            Ok(Value::String(self.respond(input)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(name: &str, category: &str, keywords: &[&str], follow_up: Option<&str>) -> ObjectionPattern {
        ObjectionPattern {
            name: name.to_string(),
            pattern: String::new(),
            response_template: format!("{} response for {{company}}", name),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            category: Some(category.to_string()),
            follow_up: follow_up.map(str::to_string),
        }
    }

    fn tool() -> ObjectionHandlerTool {
        let patterns = [
            pattern("price", "price", &["expensive", "cost", "budget"], Some("Shall we review the numbers?")),
            pattern("timing", "timing", &["not now", "next year", "budget"], None),
        ];
        ObjectionHandlerTool::new(patterns.into_iter().map(|p| (p.name.clone(), p)).collect())
    }

    fn input(v: Value) -> ObjectionInput {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_best_keyword_match() {
        let out = tool().respond(input(json!({
            "objection_text": "It's too EXPENSIVE and over budget",
            "context": {"company": "Acme"}
        })));
        assert_eq!(out, "price response for Acme\n\nShall we review the numbers?");
    }

    #[test]
    fn test_category_filter() {
        let out = tool().respond(input(json!({
            "objection_text": "over budget, maybe next year",
            "category": "timing"
        })));
        assert_eq!(out, "timing response for {company}");
    }

    #[test]
    fn test_custom_and_default() {
        let tool = tool();
        assert_eq!(
            tool.respond(input(json!({"objection_text": "x", "custom_response": "Sure."}))),
            "Sure."
        );
        assert_eq!(
            tool.respond(input(json!({"objection_text": "we love our broker"}))),
            DEFAULT_RESPONSE
        );
    }

    #[test]
    fn test_patterns_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("competition.json"),
            json!({
                "name": "competition",
                "pattern": "already working with someone",
                "response_template": "Happy to be a second opinion.",
                "keywords": ["broker", "already"],
                "category": "competition"
            })
            .to_string(),
        )
        .unwrap();

        let tool = ObjectionHandlerTool::from_dir(dir.path());
        assert_eq!(
            tool.respond(input(json!({"objection_text": "We already have a broker"}))),
            "Happy to be a second opinion."
        );
    }
}
