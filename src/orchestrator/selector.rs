//! Keyword routing from free text to tools.

use std::sync::Arc;

use tracing::debug;

use crate::tools::{ToolHandler, ToolRegistry};

/// Whether `input` (already lowercased) mentions this tool.
fn mentions(input: &str, tool: &dyn ToolHandler) -> bool {
    let name = tool.name().to_lowercase();
    input.contains(&name)
        || input.contains(&name.replace('_', " "))
        || tool
            .keywords()
            .iter()
            .any(|k| input.contains(&k.to_lowercase()))
}

/// Tools relevant to `input`, in registry order. When nothing matches every
/// tool is returned.
pub fn select_tools(input: &str, registry: &ToolRegistry) -> Vec<Arc<dyn ToolHandler>> {
    let lowered = input.to_lowercase();
    let matched: Vec<Arc<dyn ToolHandler>> = registry
        .handlers()
        .iter()
        .filter(|h| mentions(&lowered, h.as_ref()))
        .cloned()
        .collect();

    if matched.is_empty() {
        debug!("No tool matched the input; selecting all {} tools", registry.len());
        return registry.handlers().to_vec();
    }

    debug!(
        tools = ?matched.iter().map(|h| h.name()).collect::<Vec<_>>(),
        "Selected tools"
    );
    matched
}
