//! Cold-call script generation from JSON templates.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Value, json};

use super::catalog::{fill_placeholders, load_json_dir};
use super::registry::{ToolFuture, ToolHandler, object_schema, parse_args};
use crate::model::JsonObject;

const DEFAULT_TEMPLATE: &str = "Hello {contact_name}, this is [Your Name] from [Your Company]. \
     I noticed that {company_name} has commercial property interests in {location}. \
     I wanted to discuss how we could help address {pain_points} \
     and potentially improve your property portfolio's performance. \
     Would you have a few minutes to discuss this?";

#[derive(Debug, Clone, Deserialize)]
pub struct ColdCallTemplate {
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub industry_type: Option<String>,
    #[serde(default)]
    pub property_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProspectInfo {
    script_text: Option<String>,
    template_name: Option<String>,
    company_name: Option<String>,
    contact_name: Option<String>,
    property_type: Option<String>,
    location: Option<String>,
    pain_points: Option<String>,
    optimize_strategy: Option<String>,
}

/// Handler for the `cold_call_script_generator` tool.
pub struct ColdCallScriptTool {
    templates: BTreeMap<String, ColdCallTemplate>,
}

impl ColdCallScriptTool {
    pub fn new(templates: BTreeMap<String, ColdCallTemplate>) -> Self {
        Self { templates }
    }

    /// Load templates from a directory of JSON files.
    pub fn from_dir(dir: &Path) -> Self {
        Self::new(load_json_dir(dir, |t: &ColdCallTemplate| t.name.clone()))
    }

    /// Pick a template: by name, then by property type, then the first one.
    fn select_template(&self, info: &ProspectInfo) -> Option<&ColdCallTemplate> {
        if let Some(t) = info
            .template_name
            .as_deref()
            .and_then(|name| self.templates.get(name))
        {
            return Some(t);
        }

        if let Some(wanted) = info.property_type.as_deref() {
            let wanted = wanted.to_lowercase();
            if let Some(t) = self.templates.values().find(|t| {
                t.property_type
                    .as_deref()
                    .is_some_and(|p| p.to_lowercase() == wanted)
            }) {
                return Some(t);
            }
        }

        self.templates.values().next()
    }

    fn generate(&self, info: ProspectInfo) -> String {
        if let Some(script) = info.script_text.as_deref().filter(|s| !s.is_empty()) {
            return script.to_string();
        }

        let template = self
            .select_template(&info)
            .map(|t| t.template.as_str())
            .unwrap_or(DEFAULT_TEMPLATE);

        let fields = [
            ("company_name", &info.company_name),
            ("contact_name", &info.contact_name),
            ("property_type", &info.property_type),
            ("location", &info.location),
            ("pain_points", &info.pain_points),
            ("optimize_strategy", &info.optimize_strategy),
        ];
        fill_placeholders(
            template,
            fields
                .into_iter()
                .filter_map(|(key, value)| value.clone().map(|v| (key, v))),
        )
    }
}

impl ToolHandler for ColdCallScriptTool {
    fn name(&self) -> &str {
        "cold_call_script_generator"
    }

    fn description(&self) -> &str {
        "Generates or customizes cold call scripts for commercial real estate \
         prospects. Provide a complete script text or prospect details for \
         template-based generation."
    }

    fn keywords(&self) -> &[&'static str] {
        &["cold call", "script", "prospect", "outreach"]
    }

    fn input_schema(&self) -> JsonObject {
        let text = |description: &str| json!({"type": "string", "description": description});
        object_schema(
            vec![
                ("script_text", text("Direct script text to use instead of template-based generation")),
                ("template_name", text("Name of the template to use")),
                ("company_name", text("Name of the prospect's company")),
                ("contact_name", text("Name of the contact person")),
                ("property_type", text("Type of property (office, retail, industrial, etc.)")),
                ("location", text("Property location")),
                ("pain_points", text("Known pain points or needs")),
                ("optimize_strategy", text("Strategy for optimization (e.g., consolidate, expand, modernize)")),
            ],
            &[],
        )
    }

    fn execute(&self, args: JsonObject) -> ToolFuture<'_> {
        Box::pin(async move {
            let info: ProspectInfo = parse_args(args)?;
            Ok(Value::String(self.generate(info)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_template(dir: &Path, file: &str, body: Value) {
        std::fs::write(dir.join(file), body.to_string()).unwrap();
    }

    fn tool() -> (tempfile::TempDir, ColdCallScriptTool) {
        let dir = tempfile::tempdir().unwrap();
        write_template(
            dir.path(),
            "retail.json",
            json!({"name": "retail_intro", "template": "Retail pitch for {company_name} in {location}", "property_type": "Retail"}),
        );
        write_template(
            dir.path(),
            "general.json",
            json!({"name": "general", "template": "General pitch for {contact_name}"}),
        );
        let tool = ColdCallScriptTool::from_dir(dir.path());
        (dir, tool)
    }

    fn info(v: Value) -> ProspectInfo {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_script_text_wins() {
        let (_dir, tool) = tool();
        assert_eq!(tool.generate(info(json!({"script_text": "Read this"}))), "Read this");
    }

    #[test]
    fn test_template_by_name_and_type() {
        let (_dir, tool) = tool();
        assert_eq!(
            tool.generate(info(json!({"template_name": "general", "contact_name": "Sam"}))),
            "General pitch for Sam"
        );
        assert_eq!(
            tool.generate(info(json!({"property_type": "retail", "company_name": "Acme", "location": "Boise"}))),
            "Retail pitch for Acme in Boise"
        );
    }

    #[test]
    fn test_first_template_by_name_order() {
        let (_dir, tool) = tool();
        // "general" sorts before "retail_intro".
        assert_eq!(
            tool.generate(info(json!({"template_name": "missing"}))),
            "General pitch for {contact_name}"
        );
    }

    #[test]
    fn test_builtin_default() {
        let tool = ColdCallScriptTool::new(BTreeMap::new());
        let script = tool.generate(info(json!({"contact_name": "Lee", "location": "Ogden"})));
        assert!(script.starts_with("Hello Lee, this is [Your Name]"));
        assert!(script.contains("interests in Ogden"));
        assert!(script.contains("{company_name}"));
    }
}
