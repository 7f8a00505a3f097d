//! Market analysis and market metric calculations.

use serde::Deserialize;
use serde_json::{Value, json};

use super::calc::{CalculatorInput, calc_error, calculator_schema, round2};
use super::registry::{ToolFuture, ToolHandler, object_schema, parse_args};
use crate::model::JsonObject;

fn default_timeframe() -> String {
    "12 months".to_string()
}

#[derive(Debug, Deserialize)]
struct MarketAnalysisInput {
    market_area: String,
    property_type: String,
    #[serde(default = "default_timeframe")]
    timeframe: String,
    #[serde(default)]
    specific_metrics: Option<Vec<String>>,
}

/// Handler for the `market_analysis` tool.
pub struct MarketAnalysisTool;

impl MarketAnalysisTool {
    fn analyze(input: MarketAnalysisInput) -> Value {
        let timeframe = if input.timeframe.trim().is_empty() {
            default_timeframe()
        } else {
            input.timeframe
        };

        json!({
            "market_area": input.market_area,
            "property_type": input.property_type,
            "market_overview": {
                "market_size": "Large metropolitan area",
                "market_phase": "Growth",
                "market_stability": "High",
                "key_drivers": [
                    "Strong job market",
                    "Population growth",
                    "Infrastructure development",
                ],
            },
            "market_metrics": {
                "vacancy_rate": "5.2%",
                "absorption_rate": "Positive",
                "average_lease_rate": "$25/sq ft/year",
                "cap_rate": "6.5%",
                "price_per_sqft": "$250",
                "inventory_levels": "15M sq ft",
                "requested_metrics": input.specific_metrics.unwrap_or_default(),
            },
            "trends": {
                "timeframe": timeframe,
                "price_trend": "Upward",
                "vacancy_trend": "Decreasing",
                "development_pipeline": "Moderate",
                "demand_indicators": "Strong",
                "rent_growth": "3.5% annually",
            },
            "competitive_analysis": {
                "competition_level": "Moderate",
                "market_saturation": "65%",
                "barriers_to_entry": "High",
                "major_players": [
                    "Local REIT holdings",
                    "Institutional investors",
                    "Private equity firms",
                ],
            },
            "opportunities_and_risks": {
                "opportunities": [
                    "Growing demand in tech sector",
                    "Redevelopment potential in submarkets",
                    "Strong rental growth prospects",
                ],
                "risks": [
                    "Potential interest rate increases",
                    "New supply in pipeline",
                    "Economic uncertainty",
                ],
                "recommendation": "Market conditions favorable for investment",
            },
        })
    }
}

impl ToolHandler for MarketAnalysisTool {
    fn name(&self) -> &str {
        "market_analysis"
    }

    fn description(&self) -> &str {
        "Analyzes commercial real estate market conditions for specific areas and \
         property types. Provides insights on market trends, vacancy rates, rental \
         rates, cap rates, and investment opportunities."
    }

    fn keywords(&self) -> &[&'static str] {
        &["market", "trend", "submarket", "competition"]
    }

    fn input_schema(&self) -> JsonObject {
        object_schema(
            vec![
                ("market_area", json!({"type": "string", "description": "Geographic area for market analysis (city, region, etc.)"})),
                ("property_type", json!({"type": "string", "description": "Type of commercial property to analyze"})),
                ("timeframe", json!({"type": "string", "description": "Timeframe for analysis (e.g., '6 months', '12 months')", "default": "12 months"})),
                ("specific_metrics", json!({"type": "array", "items": {"type": "string"}, "description": "Specific metrics to analyze"})),
            ],
            &["market_area", "property_type"],
        )
    }

    fn execute(&self, args: JsonObject) -> ToolFuture<'_> {
        Box::pin(async move {
            let input: MarketAnalysisInput = parse_args(args)?;
            Ok(Self::analyze(input))
        })
    }
}

/// Handler for the `market_metrics_calculator` tool.
pub struct MarketMetricsCalculator;

impl MarketMetricsCalculator {
    const OPERATIONS: [&'static str; 3] = ["vacancy_rate", "absorption_rate", "rent_growth"];

    fn calculate(input: &CalculatorInput) -> super::ToolResult {
        let result = match input.operation.as_str() {
            "vacancy_rate" => {
                let vacant = input.value("vacant_space", 0.0);
                let total = input.value("total_space", 0.0);
                if total == 0.0 {
                    return Ok(calc_error("Total space cannot be zero"));
                }
                json!({
                    "vacancy_rate": round2(vacant / total * 100.0),
                    "vacant_space": vacant,
                    "total_space": total,
                })
            }
            "absorption_rate" => {
                let leased = input.value("space_leased", 0.0);
                let vacated = input.value("space_vacated", 0.0);
                let months = input.value("time_period", 12.0);
                if months == 0.0 {
                    return Ok(calc_error("Time period cannot be zero"));
                }
                let net = leased - vacated;
                json!({
                    "net_absorption": round2(net),
                    "monthly_absorption": round2(net / months),
                    "time_period": months,
                })
            }
            "rent_growth" => {
                let initial = input.value("initial_rent", 0.0);
                let last = input.value("final_rent", 0.0);
                if initial == 0.0 {
                    return Ok(calc_error("Initial rent cannot be zero"));
                }
                json!({
                    "rent_growth_rate": round2((last - initial) / initial * 100.0),
                    "initial_rent": initial,
                    "final_rent": last,
                })
            }
            _ => return Err(input.unsupported()),
        };
        Ok(result)
    }
}

impl ToolHandler for MarketMetricsCalculator {
    fn name(&self) -> &str {
        "market_metrics_calculator"
    }

    fn description(&self) -> &str {
        "Calculates market-specific metrics for commercial real estate analysis: \
         vacancy rate, net and monthly absorption, and rent growth. Example: \
         {\"operation\": \"vacancy_rate\", \"values\": {\"vacant_space\": 5000, \
         \"total_space\": 50000}}"
    }

    fn keywords(&self) -> &[&'static str] {
        &["vacancy", "absorption", "rent growth"]
    }

    fn input_schema(&self) -> JsonObject {
        calculator_schema(
            &Self::OPERATIONS,
            "Values needed for the calculation. vacancy_rate: vacant_space, total_space; \
             absorption_rate: space_leased, space_vacated, time_period (months, default 12); \
             rent_growth: initial_rent, final_rent",
        )
    }

    fn execute(&self, args: JsonObject) -> ToolFuture<'_> {
        Box::pin(async move {
            let input: CalculatorInput = parse_args(args)?;
            Self::calculate(&input)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calc(operation: &str, values: Value) -> Value {
        let input: CalculatorInput =
            serde_json::from_value(json!({"operation": operation, "values": values})).unwrap();
        MarketMetricsCalculator::calculate(&input).unwrap()
    }

    #[test]
    fn test_vacancy_rate() {
        let out = calc("vacancy_rate", json!({"vacant_space": 5000, "total_space": 50000}));
        assert_eq!(out["vacancy_rate"], 10.0);

        let zero = calc("vacancy_rate", json!({"vacant_space": 5000}));
        assert_eq!(zero["error"], "Total space cannot be zero");
    }

    #[test]
    fn test_absorption_default_period() {
        let out = calc("absorption_rate", json!({"space_leased": 10000, "space_vacated": 3000}));
        assert_eq!(out["net_absorption"], 7000.0);
        assert_eq!(out["monthly_absorption"], 583.33);
        assert_eq!(out["time_period"], 12.0);
    }

    #[test]
    fn test_rent_growth() {
        let out = calc("rent_growth", json!({"initial_rent": 30, "final_rent": 35}));
        assert_eq!(out["rent_growth_rate"], 16.67);
    }

    #[test]
    fn test_market_analysis_timeframe_default() {
        let input: MarketAnalysisInput = serde_json::from_value(
            json!({"market_area": "Denver", "property_type": "industrial", "timeframe": ""}),
        )
        .unwrap();
        let out = MarketAnalysisTool::analyze(input);
        assert_eq!(out["trends"]["timeframe"], "12 months");
        assert_eq!(out["market_area"], "Denver");
        assert!(out["opportunities_and_risks"]["risks"].is_array());
    }
}
