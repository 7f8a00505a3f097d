//! Sale method and timing advice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::registry::{ToolFuture, ToolHandler, object_schema, parse_args};
use crate::model::JsonObject;

/// Properties at or above this value are steered towards a private sale.
const PREMIUM_VALUE: f64 = 50_000_000.0;
const DEFAULT_STRENGTH: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum SaleMethod {
    Public,
    Private,
    Auction,
}

#[derive(Debug, Clone, Serialize)]
struct MarketCondition {
    trend: String,
    /// 0.0 to 1.0
    strength: f64,
    factors: Vec<String>,
    recommendation: String,
}

#[derive(Debug, Deserialize)]
struct SalesStrategyInput {
    property_type: String,
    property_value: f64,
    location: String,
    #[serde(default)]
    market_conditions: Option<JsonObject>,
    #[serde(default)]
    timeline_constraints: Option<String>,
    #[serde(default)]
    special_conditions: Option<JsonObject>,
}

/// Handler for the `sales_strategy_advisor` tool.
pub struct SalesStrategyAdvisorTool;

impl SalesStrategyAdvisorTool {
    /// Callers may pass `trend` and `strength` in `market_conditions`;
    /// otherwise a stable market at 0.7 is assumed.
    fn market_condition(input: &SalesStrategyInput) -> MarketCondition {
        let given = input.market_conditions.as_ref();
        let strength = given
            .and_then(|m| m.get("strength"))
            .and_then(Value::as_f64)
            .map(|s| s.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_STRENGTH);
        let trend = given
            .and_then(|m| m.get("trend"))
            .and_then(Value::as_str)
            .unwrap_or("stable")
            .to_string();

        MarketCondition {
            trend,
            strength,
            factors: vec![
                format!("Strong demand in {}", input.location),
                format!("Growing interest in {} properties", input.property_type),
                "Favorable interest rates".to_string(),
            ],
            recommendation: "Current market conditions are favorable for sale".to_string(),
        }
    }

    fn sale_method(
        value: f64,
        market: &MarketCondition,
        special: Option<&JsonObject>,
    ) -> (SaleMethod, Vec<SaleMethod>) {
        let quick_sale = special
            .and_then(|s| s.get("quick_sale_required"))
            .is_some_and(is_truthy);

        if value >= PREMIUM_VALUE {
            (SaleMethod::Private, vec![SaleMethod::Public])
        } else if market.strength >= 0.8 {
            (SaleMethod::Public, vec![SaleMethod::Auction, SaleMethod::Private])
        } else if quick_sale {
            (SaleMethod::Auction, vec![SaleMethod::Private])
        } else {
            (SaleMethod::Public, vec![SaleMethod::Private, SaleMethod::Auction])
        }
    }

    fn timeline(
        market: &MarketCondition,
        constraints: Option<&str>,
        now: DateTime<Utc>,
    ) -> (String, String) {
        match constraints.filter(|c| !c.trim().is_empty()) {
            Some(c) => (
                format!("Based on your constraints: {}", c),
                "Adjusted to meet specified constraints".to_string(),
            ),
            None if market.strength >= 0.7 => (
                format!(
                    "Market conditions are favorable. Recommend initiating the sale process in {}",
                    now.format("%B")
                ),
                "Estimated 3-6 months for optimal execution".to_string(),
            ),
            None => (
                "Consider waiting for market conditions to improve".to_string(),
                "Monitor market for 2-3 months before initiating".to_string(),
            ),
        }
    }

    fn advise(input: SalesStrategyInput, now: DateTime<Utc>) -> Value {
        let market = Self::market_condition(&input);
        let (method, alternatives) = Self::sale_method(
            input.property_value,
            &market,
            input.special_conditions.as_ref(),
        );
        let (timing, estimated) =
            Self::timeline(&market, input.timeline_constraints.as_deref(), now);

        let mut considerations = vec![
            format!("Property Type: {} specific market dynamics", input.property_type),
            format!("Location: {} market conditions", input.location),
            format!(
                "Value Range: {} property considerations",
                if input.property_value >= PREMIUM_VALUE { "Premium" } else { "Standard" }
            ),
            format!(
                "Market Strength: {} market with {:.0}% confidence",
                title_case(&market.trend),
                market.strength * 100.0
            ),
        ];
        if let Some(special) = &input.special_conditions {
            considerations.extend(special.iter().map(|(k, v)| {
                let shown = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                format!("Special Consideration: {}: {}", k, shown)
            }));
        }

        json!({
            "recommended_method": method,
            "alternative_methods": alternatives,
            "timing_recommendation": timing,
            "rationale": format!("Based on {} and property characteristics", market.recommendation),
            "market_analysis": market,
            "estimated_timeline": estimated,
            "key_considerations": considerations,
        })
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.to_lowercase().as_str(), "true" | "yes" | "1"),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

impl ToolHandler for SalesStrategyAdvisorTool {
    fn name(&self) -> &str {
        "sales_strategy_advisor"
    }

    fn description(&self) -> &str {
        "Analyzes property details and market conditions to recommend optimal sales \
         strategies. Provides advice on sale method (public/private/auction) and timing."
    }

    fn keywords(&self) -> &[&'static str] {
        &["sell", "sale", "auction", "disposition", "listing"]
    }

    fn input_schema(&self) -> JsonObject {
        object_schema(
            vec![
                ("property_type", json!({"type": "string", "description": "Type of commercial property (e.g., office, retail, industrial)"})),
                ("property_value", json!({"type": "number", "description": "Estimated property value"})),
                ("location", json!({"type": "string", "description": "Property location"})),
                ("market_conditions", json!({"type": "object", "description": "Current market conditions and trends (optional trend and strength 0-1)"})),
                ("timeline_constraints", json!({"type": "string", "description": "Any specific timeline constraints or preferences"})),
                ("special_conditions", json!({"type": "object", "description": "Special conditions that might affect the sale, e.g. quick_sale_required"})),
            ],
            &["property_type", "property_value", "location"],
        )
    }

    fn execute(&self, args: JsonObject) -> ToolFuture<'_> {
        Box::pin(async move {
            let input: SalesStrategyInput = parse_args(args)?;
            Ok(Self::advise(input, Utc::now()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn advise(args: Value) -> Value {
        let input: SalesStrategyInput = serde_json::from_value(args).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        SalesStrategyAdvisorTool::advise(input, now)
    }

    #[test]
    fn test_premium_goes_private() {
        let out = advise(json!({"property_type": "office", "property_value": 60000000, "location": "NYC"}));
        assert_eq!(out["recommended_method"], "private");
        assert_eq!(out["alternative_methods"], json!(["public"]));
        assert_eq!(out["key_considerations"][2], "Value Range: Premium property considerations");
    }

    #[test]
    fn test_default_market_is_public_in_current_month() {
        let out = advise(json!({"property_type": "retail", "property_value": 5000000, "location": "Tampa"}));
        assert_eq!(out["recommended_method"], "public");
        assert_eq!(
            out["timing_recommendation"],
            "Market conditions are favorable. Recommend initiating the sale process in March"
        );
        assert_eq!(out["key_considerations"][3], "Market Strength: Stable market with 70% confidence");
        assert_eq!(out["market_analysis"]["factors"][0], "Strong demand in Tampa");
    }

    #[test]
    fn test_strong_market_beats_quick_sale() {
        let out = advise(json!({
            "property_type": "industrial",
            "property_value": 8000000,
            "location": "Memphis",
            "market_conditions": {"strength": 0.9},
            "special_conditions": {"quick_sale_required": true}
        }));
        assert_eq!(out["recommended_method"], "public");
    }

    #[test]
    fn test_quick_sale_auction() {
        let out = advise(json!({
            "property_type": "industrial",
            "property_value": 8000000,
            "location": "Memphis",
            "special_conditions": {"quick_sale_required": "yes"},
            "timeline_constraints": "close by Q3"
        }));
        assert_eq!(out["recommended_method"], "auction");
        assert_eq!(out["timing_recommendation"], "Based on your constraints: close by Q3");
        assert_eq!(
            out["key_considerations"][4],
            "Special Consideration: quick_sale_required: yes"
        );
    }

    #[test]
    fn test_weak_market_waits() {
        let out = advise(json!({
            "property_type": "office",
            "property_value": 1000000,
            "location": "Akron",
            "market_conditions": {"strength": 0.4, "trend": "declining"}
        }));
        assert_eq!(out["estimated_timeline"], "Monitor market for 2-3 months before initiating");
        assert_eq!(out["market_analysis"]["trend"], "declining");
    }
}
