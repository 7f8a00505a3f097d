//! Value propositions and core financial calculations.

use serde::Deserialize;
use serde_json::{Value, json};

use super::calc::{CalculatorInput, calc_error, calculator_schema, round2};
use super::registry::{ToolFuture, ToolHandler, object_schema, parse_args};
use crate::model::JsonObject;

#[derive(Debug, Deserialize)]
struct ValuePropositionInput {
    property_type: String,
    target_audience: String,
    #[serde(default)]
    property_features: Vec<String>,
    #[serde(default)]
    location_benefits: Option<Vec<String>>,
    #[serde(default)]
    market_position: Option<String>,
}

/// Handler for the `value_proposition` tool.
pub struct ValuePropositionTool;

impl ValuePropositionTool {
    fn generate(input: ValuePropositionInput) -> Value {
        let benefit = match input.target_audience.to_lowercase().as_str() {
            "investors" => "strong ROI potential and stable cash flow",
            "tenants" => "prime location and modern amenities",
            "developers" => "development potential and market opportunity",
            _ => "exceptional value",
        };
        let highlights = input
            .property_features
            .iter()
            .take(2)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");

        let location_advantages = input
            .location_benefits
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| {
                vec![
                    "Excellent accessibility".to_string(),
                    "Strong market presence".to_string(),
                    "Growing neighborhood".to_string(),
                ]
            });

        let market_position = input
            .market_position
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| "Premium".to_string());

        json!({
            "core_value_proposition": format!(
                "A premium {} property offering {}, featuring {} in a strategic location.",
                input.property_type, benefit, highlights
            ),
            "key_benefits": {
                "property_benefits": input
                    .property_features
                    .iter()
                    .map(|f| feature_to_benefit(f))
                    .collect::<Vec<_>>(),
                "location_advantages": location_advantages,
            },
            "competitive_advantages": {
                "market_position": market_position,
                "unique_features": input.property_features,
                "differentiators": [
                    "Strategic location",
                    "Modern amenities",
                    "Flexible terms",
                    "Professional management",
                ],
            },
            "target_messaging": {
                "value_statements": [
                    format!(
                        "Ideal {} solution for {}",
                        input.property_type, input.target_audience
                    ),
                    "Proven track record of tenant satisfaction",
                    "Strategic location in growing market",
                ],
                "call_to_action": [
                    "Schedule a viewing today",
                    "Request detailed financial analysis",
                    "Explore investment opportunity",
                ],
            },
            "roi_potential": {
                "potential_returns": {
                    "cap_rate_range": "5.5% - 7.5%",
                    "cash_on_cash": "8% - 12%",
                    "irr_projection": "15% - 18%",
                },
                "value_add_opportunities": [
                    "Operational efficiency improvements",
                    "Amenity upgrades",
                    "Lease optimization",
                ],
            },
        })
    }
}

fn feature_to_benefit(feature: &str) -> String {
    const MAPPING: [(&str, &str); 5] = [
        ("parking", "Convenient parking for employees and visitors"),
        ("security", "Enhanced safety and peace of mind"),
        ("amenities", "Improved tenant satisfaction and retention"),
        ("location", "Reduced commute times and better accessibility"),
        ("modern", "Lower operating costs and improved efficiency"),
    ];

    let lower = feature.to_lowercase();
    MAPPING
        .iter()
        .find(|(key, _)| lower.contains(key))
        .map(|(_, benefit)| benefit.to_string())
        .unwrap_or_else(|| format!("Enhanced value through {}", feature))
}

impl ToolHandler for ValuePropositionTool {
    fn name(&self) -> &str {
        "value_proposition"
    }

    fn description(&self) -> &str {
        "Generates compelling value propositions for commercial properties. Creates \
         targeted messaging highlighting property benefits, features, and competitive \
         advantages. Use this for property marketing messages or investment pitches."
    }

    fn keywords(&self) -> &[&'static str] {
        &["pitch", "marketing", "messaging", "benefits"]
    }

    fn input_schema(&self) -> JsonObject {
        object_schema(
            vec![
                ("property_type", json!({"type": "string", "description": "Type of commercial property"})),
                ("target_audience", json!({"type": "string", "description": "Target audience (e.g., investors, tenants)"})),
                ("property_features", json!({"type": "array", "items": {"type": "string"}, "description": "Key features and amenities of the property"})),
                ("location_benefits", json!({"type": "array", "items": {"type": "string"}, "description": "Location-specific benefits"})),
                ("market_position", json!({"type": "string", "description": "Property's market positioning"})),
            ],
            &["property_type", "target_audience", "property_features"],
        )
    }

    fn execute(&self, args: JsonObject) -> ToolFuture<'_> {
        Box::pin(async move {
            let input: ValuePropositionInput = parse_args(args)?;
            Ok(Self::generate(input))
        })
    }
}

/// Handler for the `financial_calculator` tool.
pub struct FinancialCalculatorTool;

impl FinancialCalculatorTool {
    const OPERATIONS: [&'static str; 3] = ["roi", "cap_rate", "noi"];

    fn calculate(input: &CalculatorInput) -> super::ToolResult {
        let result = match input.operation.as_str() {
            "roi" => {
                let investment = input.value("initial_investment", 0.0);
                let profit = input.value("net_profit", 0.0);
                if investment == 0.0 {
                    return Ok(calc_error("Initial investment cannot be zero"));
                }
                json!({
                    "roi": round2(profit / investment * 100.0),
                    "initial_investment": investment,
                    "net_profit": profit,
                })
            }
            "cap_rate" => {
                let noi = input.value("noi", 0.0);
                let value = input.value("property_value", 0.0);
                if value == 0.0 {
                    return Ok(calc_error("Property value cannot be zero"));
                }
                json!({
                    "cap_rate": round2(noi / value * 100.0),
                    "noi": noi,
                    "property_value": value,
                })
            }
            "noi" => {
                let gross = input.value("gross_income", 0.0);
                let expenses = input.value("operating_expenses", 0.0);
                json!({
                    "noi": round2(gross - expenses),
                    "gross_income": gross,
                    "operating_expenses": expenses,
                })
            }
            _ => return Err(input.unsupported()),
        };
        Ok(result)
    }
}

impl ToolHandler for FinancialCalculatorTool {
    fn name(&self) -> &str {
        "financial_calculator"
    }

    fn description(&self) -> &str {
        "Performs financial calculations for commercial real estate analysis: ROI, \
         cap rate and NOI. Example: {\"operation\": \"cap_rate\", \"values\": \
         {\"noi\": 500000, \"property_value\": 5000000}}"
    }

    fn keywords(&self) -> &[&'static str] {
        &["roi", "return on investment", "cap rate", "noi", "net operating income"]
    }

    fn input_schema(&self) -> JsonObject {
        calculator_schema(
            &Self::OPERATIONS,
            "Values needed for the calculation. roi: initial_investment, net_profit; \
             cap_rate: noi, property_value; noi: gross_income, operating_expenses",
        )
    }

    fn execute(&self, args: JsonObject) -> ToolFuture<'_> {
        Box::pin(async move {
            let input: CalculatorInput = parse_args(args)?;
            Self::calculate(&input)
        })
    }
}
