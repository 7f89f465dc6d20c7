use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::{sanitize, FetchError};
use crate::models::metal::Metal;
use crate::models::period::Period;
use crate::models::price::{PricePoint, PriceSeries, PriceSnapshot};
use super::traits::PriceProvider;

const BASE_URL: &str = "https://api.metals.dev/v1";

/// metals.dev limits a single timeseries request to 30 days.
const MAX_TIMESERIES_DAYS: i64 = 30;

/// metals.dev API provider for precious metals prices.
///
/// - **Free tier**: 100 requests/month (no credit card required).
/// - **Requires**: API key (`METALS_API_KEY`).
/// - **Coverage**: gold, silver, platinum, palladium.
/// - **Strategy**: the dashboard caches every response for the configured
///   TTL, so one refresh per hour stays well inside the free quota.
///
/// All prices are USD per troy ounce.
pub struct MetalsDevProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl MetalsDevProvider {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the provider at a different host (self-hosted mirror, test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn request(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<serde_json::Value, FetchError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::InvalidResponse(format!("HTTP {status} from {endpoint}")));
        }

        let text = resp.text().await?;
        let body: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| FetchError::InvalidResponse(format!("Failed to parse {endpoint} response: {e}")))?;

        // metals.dev reports quota and auth problems in the body with HTTP 200
        if body.get("status").and_then(|s| s.as_str()) == Some("failure") {
            let message = body
                .get("error_message")
                .and_then(|m| m.as_str())
                .unwrap_or("request failed");
            if message.to_lowercase().contains("limit") {
                return Err(FetchError::RateLimited);
            }
            return Err(FetchError::InvalidResponse(sanitize(message)));
        }

        Ok(body)
    }
}

// ── metals.dev API response types ───────────────────────────────────

#[derive(Deserialize)]
struct SpotResponse {
    rate: SpotRate,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Deserialize)]
struct SpotRate {
    price: f64,
    #[serde(default)]
    bid: Option<f64>,
    #[serde(default)]
    ask: Option<f64>,
    #[serde(default)]
    change: Option<f64>,
    #[serde(default)]
    change_percent: Option<f64>,
}

#[derive(Deserialize)]
struct TimeseriesResponse {
    #[serde(default)]
    rates: HashMap<String, TimeseriesDay>,
}

#[derive(Deserialize)]
struct TimeseriesDay {
    #[serde(default)]
    metals: HashMap<String, f64>,
}

/// Parse a `/metal/spot` body into a snapshot.
pub fn parse_spot(metal: Metal, body: serde_json::Value, fetched_at: DateTime<Utc>) -> Result<PriceSnapshot, FetchError> {
    let resp: SpotResponse = serde_json::from_value(body)
        .map_err(|e| FetchError::InvalidResponse(format!("Failed to parse spot price: {e}")))?;

    let price = resp.rate.price;
    if !price.is_finite() || price <= 0.0 {
        return Err(FetchError::InvalidResponse(format!(
            "Invalid spot price for {metal}: {price}"
        )));
    }

    Ok(PriceSnapshot {
        metal,
        price_per_unit: price,
        currency: resp.currency.unwrap_or_else(|| "USD".to_string()),
        fetched_at,
        bid: resp.rate.bid,
        ask: resp.rate.ask,
        change: resp.rate.change.unwrap_or(0.0),
        change_pct: resp.rate.change_percent.unwrap_or(0.0),
    })
}

/// Extract one metal's daily prices from a `/timeseries` body.
/// Days without a (non-zero) price for the metal are skipped.
pub fn parse_timeseries(metal: Metal, body: serde_json::Value) -> Result<Vec<PricePoint>, FetchError> {
    let resp: TimeseriesResponse = serde_json::from_value(body)
        .map_err(|e| FetchError::InvalidResponse(format!("Failed to parse timeseries: {e}")))?;

    let mut points = Vec::new();
    for (date_str, day) in resp.rates {
        let Some(&price) = day.metals.get(metal.api_name()) else {
            continue;
        };
        if price <= 0.0 || !price.is_finite() {
            continue;
        }
        if let Ok(date) = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d") {
            points.push(PricePoint { date, price });
        }
    }
    points.sort_by_key(|p| p.date);
    Ok(points)
}

/// Split `[start, end]` into request windows of at most 30 days, newest first.
pub fn timeseries_windows(start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
    let mut windows = Vec::new();
    let mut current_end = end;
    while current_end >= start {
        let current_start = std::cmp::max(start, current_end - ChronoDuration::days(MAX_TIMESERIES_DAYS));
        windows.push((current_start, current_end));
        current_end = current_start - ChronoDuration::days(1);
    }
    windows
}

#[async_trait]
impl PriceProvider for MetalsDevProvider {
    fn name(&self) -> &str {
        "metals.dev"
    }

    async fn fetch_snapshot(&self, metal: Metal) -> Result<PriceSnapshot, FetchError> {
        let body = self
            .request("metal/spot", &[("metal", metal.api_name()), ("currency", "USD")])
            .await?;
        parse_spot(metal, body, Utc::now())
    }

    async fn fetch_series(&self, metal: Metal, period: Period) -> Result<PriceSeries, FetchError> {
        let today = Utc::now().date_naive();
        let start = period.start_date(today);

        let mut points = Vec::new();
        for (from, to) in timeseries_windows(start, today) {
            let from_str = from.format("%Y-%m-%d").to_string();
            let to_str = to.format("%Y-%m-%d").to_string();
            let body = self
                .request(
                    "timeseries",
                    &[
                        ("start_date", from_str.as_str()),
                        ("end_date", to_str.as_str()),
                        ("currency", "USD"),
                        ("unit", "toz"),
                    ],
                )
                .await?;
            points.extend(parse_timeseries(metal, body)?);
        }

        Ok(PriceSeries::from_unsorted(points))
    }
}
