//! Comparable-sales valuation.
//!
//! Comps are generated around the subject property rather than fetched from a
//! sales database. Each comp gets one adjustment per factor; the adjusted
//! values drive the final value range.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::registry::{ToolFuture, ToolHandler, object_schema, parse_args};
use crate::model::JsonObject;

const MAX_COMPS: usize = 20;
const CONFIDENCE: f64 = 0.85;
/// Monthly appreciation applied for time since sale (3% a year).
const MONTHLY_APPRECIATION: f64 = 0.0025;
const LOCATION_FACTOR: f64 = 0.05;
/// Adjustment per 100% size difference.
const SIZE_FACTOR: f64 = -0.1;
const DAYS_PER_MONTH: f64 = 30.44;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Factor {
    MarketConditions,
    Location,
    Size,
    Age,
    Quality,
    Amenities,
    Parking,
    LeaseTerms,
}

impl Factor {
    const ALL: [Factor; 8] = [
        Factor::MarketConditions,
        Factor::Location,
        Factor::Size,
        Factor::Age,
        Factor::Quality,
        Factor::Amenities,
        Factor::Parking,
        Factor::LeaseTerms,
    ];

    fn key(self) -> &'static str {
        match self {
            Factor::MarketConditions => "market_conditions",
            Factor::Location => "location",
            Factor::Size => "size",
            Factor::Age => "age",
            Factor::Quality => "quality",
            Factor::Amenities => "amenities",
            Factor::Parking => "parking",
            Factor::LeaseTerms => "lease_terms",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Comparable {
    property_id: String,
    address: String,
    sale_date: NaiveDate,
    sale_price: f64,
    price_per_sf: f64,
    property_type: String,
    building_size: f64,
    year_built: i32,
    occupancy_rate: f64,
    quality_rating: i32,
    amenities: Vec<&'static str>,
    parking_ratio: f64,
    lease_type: &'static str,
    cap_rate: f64,
    noi: f64,
}

#[derive(Debug, Clone, Serialize)]
struct Adjustment {
    property_id: String,
    adjustment_type: Factor,
    percentage: f64,
    rationale: String,
    impact_value: f64,
}

fn default_max_comps() -> usize {
    5
}

#[derive(Debug, Deserialize)]
struct ComparableAnalysisInput {
    property_type: String,
    location: String,
    building_size: f64,
    year_built: i32,
    quality_rating: i32,
    #[serde(default = "default_max_comps")]
    max_comps: usize,
    #[serde(default)]
    max_age_years: Option<u32>,
    #[serde(default)]
    radius_miles: Option<f64>,
    #[serde(default)]
    specific_adjustments: Option<HashMap<String, f64>>,
}

/// Handler for the `comparable_analysis` tool.
pub struct ComparableAnalysisTool;

impl ComparableAnalysisTool {
    fn generate_comps(input: &ComparableAnalysisInput, today: NaiveDate) -> Vec<Comparable> {
        let count = input.max_comps.clamp(1, MAX_COMPS);
        (0..count)
            .map(|i| {
                let n = i as f64;
                Comparable {
                    property_id: format!("PROP{}", i),
                    address: format!("{} Main St, {}", i * 100, input.location),
                    sale_date: today - Duration::days(90 * i as i64),
                    sale_price: 10_000_000.0 + n * 500_000.0,
                    price_per_sf: 350.0 + n * 10.0,
                    property_type: input.property_type.clone(),
                    building_size: 25_000.0 + n * 1_000.0,
                    year_built: 2010 - i as i32,
                    occupancy_rate: 0.95 - n * 0.02,
                    quality_rating: 4,
                    amenities: vec!["Lobby", "Parking", "Security"],
                    parking_ratio: 3.0,
                    lease_type: "NNN",
                    cap_rate: 0.065 + n * 0.002,
                    noi: 650_000.0 + n * 25_000.0,
                }
            })
            .collect()
    }

    fn adjust(
        comp: &Comparable,
        subject_size: f64,
        factor: Factor,
        overrides: Option<&HashMap<String, f64>>,
        today: NaiveDate,
    ) -> Adjustment {
        let (percentage, rationale) = match overrides.and_then(|o| o.get(factor.key())) {
            Some(&pct) => (pct, format!("User-specified {} adjustment", factor.key())),
            None => match factor {
                Factor::MarketConditions => {
                    let months = (today - comp.sale_date).num_days() as f64 / DAYS_PER_MONTH;
                    (
                        months * MONTHLY_APPRECIATION,
                        format!("Market appreciation over {:.1} months", months),
                    )
                }
                Factor::Location => (LOCATION_FACTOR, "Location quality adjustment".to_string()),
                Factor::Size => {
                    let diff = (subject_size - comp.building_size) / comp.building_size;
                    (
                        diff * SIZE_FACTOR,
                        format!("Size difference adjustment: {:.1}%", diff * 100.0),
                    )
                }
                _ => (0.0, "No adjustment needed".to_string()),
            },
        };

        Adjustment {
            property_id: comp.property_id.clone(),
            adjustment_type: factor,
            percentage,
            rationale,
            impact_value: comp.sale_price * percentage,
        }
    }

    fn analyze(input: ComparableAnalysisInput, today: NaiveDate) -> Value {
        let comps = Self::generate_comps(&input, today);

        let mut adjusted_values = serde_json::Map::new();
        let mut adjusted: Vec<f64> = Vec::with_capacity(comps.len());
        let mut summarized: Vec<Adjustment> = Vec::new();

        for comp in &comps {
            let adjustments: Vec<Adjustment> = Factor::ALL
                .iter()
                .map(|&f| {
                    Self::adjust(
                        comp,
                        input.building_size,
                        f,
                        input.specific_adjustments.as_ref(),
                        today,
                    )
                })
                .collect();

            let value = comp.sale_price + adjustments.iter().map(|a| a.impact_value).sum::<f64>();
            adjusted_values.insert(comp.property_id.clone(), json!(value));
            adjusted.push(value);

            summarized.extend(
                adjustments
                    .into_iter()
                    .filter(|a| a.impact_value.abs() > 0.0)
                    .take(3),
            );
        }

        let mut primary: Vec<Factor> = Vec::new();
        for adj in &summarized {
            if !primary.contains(&adj.adjustment_type) {
                primary.push(adj.adjustment_type);
            }
        }

        let mut by_date: Vec<&Comparable> = comps.iter().collect();
        by_date.sort_by_key(|c| c.sale_date);
        let recent_trend = match (by_date.first(), by_date.last()) {
            (Some(oldest), Some(newest)) if newest.price_per_sf > oldest.price_per_sf => {
                "Increasing"
            }
            _ => "Decreasing",
        };

        let count = comps.len() as f64;
        json!({
            "subject_property": {
                "property_type": input.property_type,
                "location": input.location,
                "building_size": input.building_size,
                "year_built": input.year_built,
                "quality_rating": input.quality_rating,
                "radius_miles": input.radius_miles.unwrap_or(5.0),
                "max_age_years": input.max_age_years.unwrap_or(2),
            },
            "comparable_properties": comps.iter().take(3).collect::<Vec<_>>(),
            "adjustments": summarized,
            "adjusted_values": adjusted_values,
            "final_value_range": value_range(&adjusted),
            "market_trends": {
                "average_price_psf": comps.iter().map(|c| c.price_per_sf).sum::<f64>() / count,
                "average_cap_rate": comps.iter().map(|c| c.cap_rate).sum::<f64>() / count,
                "market_condition": "stable",
                "recent_trend": recent_trend,
            },
            "confidence_score": CONFIDENCE,
            "supporting_data": {
                "comp_count": comps.len(),
                "data_quality": "high",
                "primary_adjustments": primary,
            },
        })
    }
}

fn value_range(values: &[f64]) -> Value {
    if values.is_empty() {
        return json!({});
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    json!({
        "min": sorted[0],
        "max": sorted[sorted.len() - 1],
        "mean": sorted.iter().sum::<f64>() / sorted.len() as f64,
        "median": sorted[sorted.len() / 2],
    })
}

impl ToolHandler for ComparableAnalysisTool {
    fn name(&self) -> &str {
        "comparable_analysis"
    }

    fn description(&self) -> &str {
        "Analyzes comparable properties and generates market-adjusted valuations. \
         Provides recent sales data, market adjustments, and value ranges."
    }

    fn keywords(&self) -> &[&'static str] {
        &["comps", "comparable", "valuation", "appraisal", "worth"]
    }

    fn input_schema(&self) -> JsonObject {
        object_schema(
            vec![
                ("property_type", json!({"type": "string", "description": "Type of property (e.g., office, retail, industrial)"})),
                ("location", json!({"type": "string", "description": "Property location"})),
                ("building_size", json!({"type": "number", "description": "Building size in square feet"})),
                ("year_built", json!({"type": "integer", "description": "Year the property was built"})),
                ("quality_rating", json!({"type": "integer", "description": "Quality rating on a scale of 1-5"})),
                ("max_comps", json!({"type": "integer", "description": "Maximum number of comparables to return", "default": 5})),
                ("max_age_years", json!({"type": "integer", "description": "Maximum age of comparable sales in years", "default": 2})),
                ("radius_miles", json!({"type": "number", "description": "Search radius in miles", "default": 5.0})),
                ("specific_adjustments", json!({"type": "object", "description": "Adjustment overrides keyed by factor (market_conditions, location, size, age, quality, amenities, parking, lease_terms)", "additionalProperties": {"type": "number"}})),
            ],
            &["property_type", "location", "building_size", "year_built", "quality_rating"],
        )
    }

    fn execute(&self, args: JsonObject) -> ToolFuture<'_> {
        Box::pin(async move {
            let input: ComparableAnalysisInput = parse_args(args)?;
            Ok(Self::analyze(input, Utc::now().date_naive()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(extra: Value) -> ComparableAnalysisInput {
        let mut base = json!({
            "property_type": "office",
            "location": "Dallas, TX",
            "building_size": 25000,
            "year_built": 2005,
            "quality_rating": 4
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(base).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn test_first_comp_adjustments() {
        let out = ComparableAnalysisTool::analyze(input(json!({})), today());

        // PROP0 sold today at the subject's size: only the location factor applies.
        assert_eq!(out["adjusted_values"]["PROP0"], 10_500_000.0);
        assert_eq!(out["supporting_data"]["comp_count"], 5);
        assert_eq!(out["comparable_properties"].as_array().unwrap().len(), 3);
        assert_eq!(out["confidence_score"], 0.85);
        assert_eq!(out["market_trends"]["recent_trend"], "Decreasing");
    }

    #[test]
    fn test_market_conditions_adjustment() {
        let subject = input(json!({}));
        let comps = ComparableAnalysisTool::generate_comps(&subject, today());
        let adj = ComparableAnalysisTool::adjust(
            &comps[1],
            subject.building_size,
            Factor::MarketConditions,
            None,
            today(),
        );
        let expected = 90.0 / DAYS_PER_MONTH * MONTHLY_APPRECIATION;
        assert!((adj.percentage - expected).abs() < 1e-12);
        assert!((adj.impact_value - 10_500_000.0 * expected).abs() < 1e-6);
    }

    #[test]
    fn test_overrides_and_summaries() {
        let out = ComparableAnalysisTool::analyze(
            input(json!({"max_comps": 2, "specific_adjustments": {"location": 0.0, "quality": 0.1}})),
            today(),
        );

        // PROP0: quality +10% only.
        assert_eq!(out["adjusted_values"]["PROP0"], 11_000_000.0);

        let summarized = out["adjustments"].as_array().unwrap();
        assert!(summarized.iter().all(|a| a["impact_value"].as_f64().unwrap() != 0.0));
        assert!(
            summarized
                .iter()
                .filter(|a| a["property_id"] == "PROP1")
                .count()
                <= 3
        );
        assert!(
            out["supporting_data"]["primary_adjustments"]
                .as_array()
                .unwrap()
                .contains(&json!("quality"))
        );
    }

    #[test]
    fn test_max_comps_clamped() {
        let out = ComparableAnalysisTool::analyze(input(json!({"max_comps": 0})), today());
        assert_eq!(out["supporting_data"]["comp_count"], 1);
    }

    #[test]
    fn test_value_range() {
        let range = value_range(&[3.0, 1.0, 2.0, 4.0]);
        assert_eq!(range["min"], 1.0);
        assert_eq!(range["max"], 4.0);
        assert_eq!(range["mean"], 2.5);
        assert_eq!(range["median"], 3.0);
    }
}
