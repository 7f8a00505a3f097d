//! CRE analysis tools and the registry that holds them.
//!
//! Each tool is a `ToolHandler` with a JSON-Schema input returning JSON.
//! `default_registry` wires up the full set in a fixed order.

mod registry;

pub use registry::{
    ToolError, ToolFuture, ToolHandler, ToolRegistry, ToolResult, object_schema, parse_args,
};
#[cfg(test)]
pub(crate) use registry::test_support;

mod calc;
mod catalog;
mod cold_call;
mod comparable_analysis;
mod document_search;
mod economic_data;
mod ingest;
mod market_analysis;
mod objection_handler;
mod property_analysis;
mod sales_strategy;
mod value_proposition;
mod web_search;

pub use cold_call::{ColdCallScriptTool, ColdCallTemplate};
pub use comparable_analysis::ComparableAnalysisTool;
pub use document_search::{
    DocumentHit, DocumentQuery, DocumentSearchTool, DocumentStore, StoredDocument,
    SupabaseDocumentStore, UnconfiguredDocumentStore, search_documents,
};
#[cfg(test)]
pub(crate) use document_search::test_support as document_test_support;
pub use economic_data::{FredClient, FredEconomicTool, SeriesRequest};
pub use ingest::{Upload, ingest_upload};
pub use market_analysis::{MarketAnalysisTool, MarketMetricsCalculator};
pub use objection_handler::{ObjectionHandlerTool, ObjectionPattern};
pub use property_analysis::{PropertyAnalysisTool, PropertyMetricsCalculator};
pub use sales_strategy::SalesStrategyAdvisorTool;
pub use value_proposition::{FinancialCalculatorTool, ValuePropositionTool};
pub use web_search::{SearchRequest, TavilyClient, TavilySearchTool};

use std::sync::Arc;

use crate::config::Settings;

/// Public aliases accepted by `/chat`'s `tools` filter, mapped to tool names.
pub const TOOL_ALIASES: [(&str, &str); 6] = [
    ("search", "tavily_search"),
    ("economic-data", "fred_economic_data"),
    ("market-analysis", "market_analysis"),
    ("property-analysis", "property_analysis"),
    ("value-proposition", "value_proposition"),
    ("document-search", "document_search"),
];

/// Resolve a public alias to its tool name.
pub fn tool_alias(alias: &str) -> Option<&'static str> {
    TOOL_ALIASES
        .iter()
        .find(|(a, _)| *a == alias)
        .map(|(_, name)| *name)
}

/// Resolve a list of aliases, dropping unknown ones.
pub fn resolve_aliases<S: AsRef<str>>(aliases: &[S]) -> Vec<&'static str> {
    aliases.iter().filter_map(|a| tool_alias(a.as_ref())).collect()
}

/// The full CRE tool set, in routing order.
pub fn default_registry(settings: &Settings, documents: Arc<dyn DocumentStore>) -> ToolRegistry {
    ToolRegistry::new()
        .register_handler(PropertyAnalysisTool)
        .register_handler(MarketAnalysisTool)
        .register_handler(ValuePropositionTool)
        .register_handler(DocumentSearchTool::new(documents))
        .register_handler(TavilySearchTool::new(TavilyClient::new(
            settings.tavily_api_key.clone(),
        )))
        .register_handler(FredEconomicTool::new(FredClient::new(
            settings.fred_api_key.clone(),
        )))
        .register_handler(ColdCallScriptTool::from_dir(&settings.templates_dir))
        .register_handler(ObjectionHandlerTool::from_dir(&settings.patterns_dir))
        .register_handler(SalesStrategyAdvisorTool)
        .register_handler(ComparableAnalysisTool)
        .register_handler(PropertyMetricsCalculator)
        .register_handler(MarketMetricsCalculator)
        .register_handler(FinancialCalculatorTool)
}
