//! Economic series from FRED (Federal Reserve Economic Data).

use chrono::{Duration, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error};
use url::Url;

use super::registry::{ToolError, ToolFuture, ToolHandler, object_schema, parse_args};
use crate::model::JsonObject;

pub const FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred";
const DEFAULT_WINDOW_DAYS: i64 = 365;

fn default_units() -> String {
    "lin".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesRequest {
    pub series_id: String,
    #[serde(default)]
    pub observation_start: Option<String>,
    #[serde(default)]
    pub observation_end: Option<String>,
    #[serde(default = "default_units")]
    pub units: String,
}

impl SeriesRequest {
    /// Fill in the observation window: end defaults to `today`, start to a
    /// year before it.
    fn window(&self, today: NaiveDate) -> (String, String) {
        let non_empty = |s: &Option<String>| s.clone().filter(|v| !v.trim().is_empty());
        let end = non_empty(&self.observation_end)
            .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
        let start = non_empty(&self.observation_start).unwrap_or_else(|| {
            (today - Duration::days(DEFAULT_WINDOW_DAYS))
                .format("%Y-%m-%d")
                .to_string()
        });
        (start, end)
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    #[serde(default)]
    seriess: Vec<SeriesInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct SeriesInfo {
    #[serde(default)]
    title: String,
    #[serde(default)]
    units: String,
    #[serde(default)]
    frequency: String,
}

/// Client for the FRED REST API.
#[derive(Clone)]
pub struct FredClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl FredClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: FRED_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, ToolError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ToolError::NotConfigured("FRED_API_KEY is not set".into()))?;

        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| ToolError::Internal(format!("Invalid FRED URL: {}", e)))?;
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("api_key", api_key)
            .append_pair("file_type", "json");
        Ok(url)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, ToolError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("FRED request failed with status {}: {}", status, body);
            return Err(ToolError::Upstream(format!(
                "FRED request failed with status {}: {}",
                status, body
            )));
        }
        Ok(response.json().await?)
    }

    /// Fetch a series' observations and descriptive metadata.
    pub async fn fetch(&self, request: &SeriesRequest, today: NaiveDate) -> Result<Value, ToolError> {
        let (start, end) = request.window(today);
        debug!(series = %request.series_id, %start, %end, "Fetching FRED series");

        let observations: ObservationsResponse = self
            .get(self.url(
                "series/observations",
                &[
                    ("series_id", request.series_id.as_str()),
                    ("observation_start", start.as_str()),
                    ("observation_end", end.as_str()),
                    ("units", request.units.as_str()),
                ],
            )?)
            .await?;

        let info: SeriesResponse = self
            .get(self.url("series", &[("series_id", request.series_id.as_str())])?)
            .await?;
        let info = info.seriess.into_iter().next().unwrap_or_default();

        Ok(json!({
            "series_id": request.series_id,
            "title": info.title,
            "units": info.units,
            "frequency": info.frequency,
            "observation_start": start,
            "observation_end": end,
            "data": observations_to_map(observations.observations),
        }))
    }
}

/// Map observations by date; FRED's `"."` marks a missing value.
fn observations_to_map(observations: Vec<Observation>) -> Value {
    let data: serde_json::Map<String, Value> = observations
        .into_iter()
        .map(|o| {
            let value = o
                .value
                .parse::<f64>()
                .ok()
                .map(Value::from)
                .unwrap_or(Value::Null);
            (o.date, value)
        })
        .collect();
    Value::Object(data)
}

/// Handler for the `fred_economic_data` tool.
pub struct FredEconomicTool {
    client: FredClient,
}

impl FredEconomicTool {
    pub fn new(client: FredClient) -> Self {
        Self { client }
    }
}

impl ToolHandler for FredEconomicTool {
    fn name(&self) -> &str {
        "fred_economic_data"
    }

    fn description(&self) -> &str {
        "Fetch economic data from FRED (Federal Reserve Economic Data), e.g. GDP, \
         CPIAUCSL, UNRATE, FEDFUNDS or MORTGAGE30US."
    }

    fn keywords(&self) -> &[&'static str] {
        &["economic", "economy", "fred", "interest rate", "inflation", "gdp", "unemployment"]
    }

    fn input_schema(&self) -> JsonObject {
        object_schema(
            vec![
                ("series_id", json!({"type": "string", "description": "FRED series ID to look up (e.g., 'GDP' for Gross Domestic Product)"})),
                ("observation_start", json!({"type": "string", "description": "Start date for data (YYYY-MM-DD format)"})),
                ("observation_end", json!({"type": "string", "description": "End date for data (YYYY-MM-DD format)"})),
                ("units", json!({"type": "string", "description": "Data transformation (e.g., 'lin' for linear, 'chg' for change)", "default": "lin"})),
            ],
            &["series_id"],
        )
    }

    fn execute(&self, args: JsonObject) -> ToolFuture<'_> {
        Box::pin(async move {
            let request: SeriesRequest = parse_args(args)?;
            if request.series_id.trim().is_empty() {
                return Err(ToolError::InvalidArguments("series_id must not be empty".into()));
            }
            self.client.fetch(&request, Utc::now().date_naive()).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window() {
        let request: SeriesRequest = serde_json::from_value(json!({"series_id": "GDP"})).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(request.units, "lin");
        assert_eq!(
            request.window(today),
            ("2024-03-01".to_string(), "2025-03-01".to_string())
        );
    }

    #[test]
    fn test_explicit_window() {
        let request: SeriesRequest = serde_json::from_value(json!({
            "series_id": "UNRATE",
            "observation_start": "2020-01-01",
            "observation_end": ""
        }))
        .unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(
            request.window(today),
            ("2020-01-01".to_string(), "2025-03-01".to_string())
        );
    }

    #[test]
    fn test_missing_values_are_null() {
        let data = observations_to_map(vec![
            Observation { date: "2024-01-01".into(), value: "3.7".into() },
            Observation { date: "2024-02-01".into(), value: ".".into() },
        ]);
        assert_eq!(data["2024-01-01"], 3.7);
        assert!(data["2024-02-01"].is_null());
    }

    #[test]
    fn test_url_includes_key_and_format() {
        let client = FredClient::new(Some("k123".into())).with_base_url("http://localhost:1/fred/");
        let url = client.url("series", &[("series_id", "GDP")]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:1/fred/series?series_id=GDP&api_key=k123&file_type=json"
        );

        assert!(matches!(
            FredClient::new(None).url("series", &[]),
            Err(ToolError::NotConfigured(_))
        ));
    }
}
