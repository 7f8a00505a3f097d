//! Property analysis and property metric calculations.

use chrono::Datelike;
use serde::Deserialize;
use serde_json::{Value, json};

use super::calc::{CalculatorInput, calc_error, calculator_schema, round2};
use super::registry::{ToolFuture, ToolHandler, object_schema, parse_args};
use crate::model::JsonObject;

#[derive(Debug, Deserialize)]
struct PropertyAnalysisInput {
    property_type: String,
    location: String,
    #[serde(default)]
    size: Option<f64>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    year_built: Option<i32>,
    #[serde(default)]
    additional_details: Option<String>,
}

/// Handler for the `property_analysis` tool.
pub struct PropertyAnalysisTool;

impl PropertyAnalysisTool {
    fn analyze(input: PropertyAnalysisInput, current_year: i32) -> Value {
        let mut metrics = json!({
            "market_segment": capitalize(&input.property_type),
            "estimated_occupancy_rate": "95%",
        });
        if let (Some(size), Some(price)) = (input.size, input.price) {
            if size != 0.0 && price != 0.0 {
                metrics["price_per_sqft"] = json!(round2(price / size));
            }
        }

        json!({
            "property_overview": {
                "type": input.property_type,
                "location": input.location,
                "size": input.size,
                "price": input.price,
                "year_built": input.year_built,
                "additional_details": input.additional_details,
            },
            "location_analysis": {
                "accessibility": "High",
                "market_demand": "Strong",
                "development_potential": "Moderate",
            },
            "market_metrics": metrics,
            "condition_assessment": assess_condition(input.year_built, current_year),
            "recommendations": [
                format!(
                    "Consider market trends for {} properties in {}",
                    input.property_type, input.location
                ),
                "Conduct detailed property inspection",
                "Review tenant history and occupancy rates",
                "Analyze potential for value-add improvements",
            ],
        })
    }
}

/// Condition bucket by building age.
pub fn assess_condition(year_built: Option<i32>, current_year: i32) -> Value {
    let Some(year) = year_built.filter(|y| *y != 0) else {
        return json!({ "condition": "Unknown" });
    };

    let age = current_year - year;
    let condition = match age {
        a if a < 5 => "Excellent",
        a if a < 15 => "Good",
        a if a < 30 => "Fair",
        _ => "May need renovation",
    };

    json!({
        "condition": condition,
        "age": age,
        "renovation_needed": age > 30,
    })
}

fn capitalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl ToolHandler for PropertyAnalysisTool {
    fn name(&self) -> &str {
        "property_analysis"
    }

    fn description(&self) -> &str {
        "Analyzes commercial properties based on provided details. Evaluates key \
         metrics like location quality, price per square foot, potential ROI, and \
         market positioning. Use this when you need to assess a specific property's \
         characteristics and investment potential."
    }

    fn keywords(&self) -> &[&'static str] {
        &["property", "building", "price per square foot", "year built"]
    }

    fn input_schema(&self) -> JsonObject {
        object_schema(
            vec![
                ("property_type", json!({"type": "string", "description": "Type of commercial property (e.g., office, retail, industrial)"})),
                ("location", json!({"type": "string", "description": "Property location (address or area)"})),
                ("size", json!({"type": "number", "description": "Property size in square feet"})),
                ("price", json!({"type": "number", "description": "Property price or asking price"})),
                ("year_built", json!({"type": "integer", "description": "Year the property was built"})),
                ("additional_details", json!({"type": "string", "description": "Any additional property details"})),
            ],
            &["property_type", "location"],
        )
    }

    fn execute(&self, args: JsonObject) -> ToolFuture<'_> {
        Box::pin(async move {
            let input: PropertyAnalysisInput = parse_args(args)?;
            Ok(Self::analyze(input, chrono::Utc::now().year()))
        })
    }
}

/// Handler for the `property_metrics_calculator` tool.
pub struct PropertyMetricsCalculator;

impl PropertyMetricsCalculator {
    const OPERATIONS: [&'static str; 3] = ["price_per_sqft", "operating_expense_ratio", "dscr"];

    fn calculate(input: &CalculatorInput) -> super::ToolResult {
        let result = match input.operation.as_str() {
            "price_per_sqft" => {
                let price = input.value("price", 0.0);
                let square_feet = input.value("square_feet", 0.0);
                if square_feet == 0.0 {
                    return Ok(calc_error("Square footage cannot be zero"));
                }
                json!({
                    "price_per_sqft": round2(price / square_feet),
                    "price": price,
                    "square_feet": square_feet,
                })
            }
            "operating_expense_ratio" => {
                let expenses = input.value("operating_expenses", 0.0);
                let income = input.value("gross_operating_income", 0.0);
                if income == 0.0 {
                    return Ok(calc_error("Gross operating income cannot be zero"));
                }
                json!({
                    "operating_expense_ratio": round2(expenses / income * 100.0),
                    "operating_expenses": expenses,
                    "gross_operating_income": income,
                })
            }
            "dscr" => {
                let noi = input.value("noi", 0.0);
                let debt_service = input.value("debt_service", 0.0);
                if debt_service == 0.0 {
                    return Ok(calc_error("Debt service cannot be zero"));
                }
                let dscr = noi / debt_service;
                json!({
                    "dscr": round2(dscr),
                    "noi": noi,
                    "debt_service": debt_service,
                    "interpretation": interpret_dscr(dscr),
                })
            }
            _ => return Err(input.unsupported()),
        };
        Ok(result)
    }
}

fn interpret_dscr(dscr: f64) -> &'static str {
    if dscr >= 1.5 {
        "Strong debt service coverage"
    } else if dscr >= 1.25 {
        "Good debt service coverage"
    } else if dscr >= 1.0 {
        "Adequate debt service coverage"
    } else {
        "Poor debt service coverage - potential risk"
    }
}

impl ToolHandler for PropertyMetricsCalculator {
    fn name(&self) -> &str {
        "property_metrics_calculator"
    }

    fn description(&self) -> &str {
        "Calculates property-specific metrics for commercial real estate analysis: \
         price per square foot, operating expense ratio and debt service coverage \
         ratio. Example: {\"operation\": \"dscr\", \"values\": {\"noi\": 500000, \
         \"debt_service\": 400000}}"
    }

    fn keywords(&self) -> &[&'static str] {
        &["dscr", "debt service", "expense ratio", "per sqft", "per square foot"]
    }

    fn input_schema(&self) -> JsonObject {
        calculator_schema(
            &Self::OPERATIONS,
            "Values needed for the calculation. price_per_sqft: price, square_feet; \
             operating_expense_ratio: operating_expenses, gross_operating_income; \
             dscr: noi, debt_service",
        )
    }

    fn execute(&self, args: JsonObject) -> ToolFuture<'_> {
        Box::pin(async move {
            let input: CalculatorInput = parse_args(args)?;
            Self::calculate(&input)
        })
    }
}
