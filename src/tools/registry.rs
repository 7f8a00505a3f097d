//! Tool registry for the CRE analysis tools.
//!
//! Provides a `ToolHandler` trait for implementing tools and a `ToolRegistry`
//! for registering and invoking them. Registration order is preserved; the
//! selector and the fan-out both rely on it.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::llm::FunctionSpec;
use crate::model::JsonObject;

/// Errors a tool can report instead of a result.
#[derive(Debug)]
pub enum ToolError {
    /// Arguments did not match the tool's schema.
    InvalidArguments(String),
    /// The tool needs credentials or a backend that is not configured.
    NotConfigured(String),
    /// The external API failed or returned something unusable.
    Upstream(String),
    /// Anything else.
    Internal(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::InvalidArguments(msg) => write!(f, "Invalid arguments: {}", msg),
            ToolError::NotConfigured(msg) => write!(f, "Not configured: {}", msg),
            ToolError::Upstream(msg) => write!(f, "Upstream error: {}", msg),
            ToolError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ToolError {}

impl From<reqwest::Error> for ToolError {
    fn from(e: reqwest::Error) -> Self {
        ToolError::Upstream(e.to_string())
    }
}

impl From<anyhow::Error> for ToolError {
    fn from(e: anyhow::Error) -> Self {
        ToolError::Upstream(format!("{:#}", e))
    }
}

pub type ToolResult = Result<Value, ToolError>;

pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = ToolResult> + Send + 'a>>;

/// Trait for handling tool invocations.
///
/// Each tool implements this trait to define its schema and execution logic.
pub trait ToolHandler: Send + Sync {
    /// Returns the tool's name (e.g., "financial_calculator").
    fn name(&self) -> &str;

    /// Returns the tool's description.
    fn description(&self) -> &str;

    /// Extra words that route a request to this tool.
    fn keywords(&self) -> &[&'static str] {
        &[]
    }

    /// Returns the input schema for this tool.
    fn input_schema(&self) -> JsonObject;

    /// Executes the tool with the given arguments.
    fn execute(&self, args: JsonObject) -> ToolFuture<'_>;

    /// Converts this handler to a function description for the model.
    fn to_function_spec(&self) -> FunctionSpec {
        FunctionSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: Value::Object(self.input_schema()),
        }
    }
}

/// Registry for managing tool handlers.
#[derive(Clone)]
pub struct ToolRegistry {
    handlers: Vec<Arc<dyn ToolHandler>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool handler. A handler with an existing name replaces the
    /// earlier one in place.
    pub fn register(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        let name = handler.name().to_string();
        match self.index.get(&name) {
            Some(&pos) => self.handlers[pos] = handler,
            None => {
                self.index.insert(name, self.handlers.len());
                self.handlers.push(handler);
            }
        }
        self
    }

    /// Register a tool handler from a type that implements `ToolHandler`.
    pub fn register_handler<T: ToolHandler + 'static>(self, handler: T) -> Self {
        self.register(Arc::new(handler))
    }

    /// Get a tool handler by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.index.get(name).map(|&pos| self.handlers[pos].clone())
    }

    /// All handlers in registration order.
    pub fn handlers(&self) -> &[Arc<dyn ToolHandler>] {
        &self.handlers
    }

    /// List all registered tool names in registration order.
    pub fn list_names(&self) -> Vec<String> {
        self.handlers.iter().map(|h| h.name().to_string()).collect()
    }

    /// A registry holding only the named tools, in registration order.
    /// Unknown names are ignored.
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> ToolRegistry {
        self.handlers
            .iter()
            .filter(|h| names.iter().any(|n| n.as_ref() == h.name()))
            .cloned()
            .fold(ToolRegistry::new(), ToolRegistry::register)
    }

    /// Tool descriptions in function-calling format.
    pub fn to_function_specs(&self) -> Vec<FunctionSpec> {
        self.handlers.iter().map(|h| h.to_function_spec()).collect()
    }

    /// Execute a tool by name with the given arguments.
    pub async fn call_tool(&self, name: &str, args: JsonObject) -> ToolResult {
        let handler = self
            .get(name)
            .ok_or_else(|| ToolError::InvalidArguments(format!("Tool not found: {}", name)))?;
        handler.execute(args).await
    }

    /// Check if a tool with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Return the number of registered tools.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Return `true` if no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an object schema from `(name, property schema)` pairs.
pub fn object_schema(properties: Vec<(&str, Value)>, required: &[&str]) -> JsonObject {
    let mut props = serde_json::Map::new();
    for (name, schema) in properties {
        props.insert(name.to_string(), schema);
    }

    let mut schema = JsonObject::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(props));
    schema.insert("required".to_string(), json!(required));
    schema
}

/// Deserialize tool arguments into a typed input struct.
pub fn parse_args<T: DeserializeOwned>(args: JsonObject) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args))
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A handler whose behaviour is a plain closure over its arguments.
    pub struct FnTool<F> {
        pub name: &'static str,
        pub keywords: &'static [&'static str],
        pub schema: JsonObject,
        pub run: F,
    }

    impl<F> FnTool<F>
    where
        F: Fn(JsonObject) -> ToolResult + Send + Sync,
    {
        pub fn new(name: &'static str, run: F) -> Self {
            Self {
                name,
                keywords: &[],
                schema: object_schema(vec![], &[]),
                run,
            }
        }

        pub fn with_keywords(mut self, keywords: &'static [&'static str]) -> Self {
            self.keywords = keywords;
            self
        }

        pub fn with_schema(mut self, schema: JsonObject) -> Self {
            self.schema = schema;
            self
        }
    }

    impl<F> ToolHandler for FnTool<F>
    where
        F: Fn(JsonObject) -> ToolResult + Send + Sync,
    {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn keywords(&self) -> &[&'static str] {
            self.keywords
        }

        fn input_schema(&self) -> JsonObject {
            self.schema.clone()
        }

        fn execute(&self, args: JsonObject) -> ToolFuture<'_> {
            let result = (self.run)(args);
            Box::pin(async move { result })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FnTool;
    use super::*;

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .register_handler(FnTool::new("alpha", |_| Ok(json!("a"))))
            .register_handler(FnTool::new("beta", |_| Ok(json!("b"))))
            .register_handler(FnTool::new("gamma", |_| Ok(json!("c"))))
    }

    #[test]
    fn test_registration_order() {
        let registry = registry();
        assert_eq!(registry.list_names(), vec!["alpha", "beta", "gamma"]);
        assert_eq!(registry.len(), 3);
        assert!(registry.contains("beta"));
        assert!(!registry.contains("delta"));
    }

    #[test]
    fn test_duplicate_replaces_in_place() {
        let registry = registry().register_handler(FnTool::new("alpha", |_| Ok(json!("z"))));
        assert_eq!(registry.list_names(), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_subset_keeps_registry_order() {
        let subset = registry().subset(&["gamma", "alpha", "unknown"]);
        assert_eq!(subset.list_names(), vec!["alpha", "gamma"]);
        assert!(registry().subset::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_function_specs() {
        let specs = registry().to_function_specs();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].name, "alpha");
        assert_eq!(specs[0].parameters["type"], "object");
    }

    #[tokio::test]
    async fn test_call_tool() {
        let registry = registry();
        assert_eq!(registry.call_tool("beta", JsonObject::new()).await.unwrap(), json!("b"));
        assert!(matches!(
            registry.call_tool("nope", JsonObject::new()).await,
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_parse_args() {
        #[derive(serde::Deserialize)]
        struct Input {
            query: String,
        }

        let mut args = JsonObject::new();
        args.insert("query".into(), json!("office"));
        let input: Input = parse_args(args).unwrap();
        assert_eq!(input.query, "office");

        assert!(parse_args::<Input>(JsonObject::new()).is_err());
    }
}
