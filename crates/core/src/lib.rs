pub mod cache;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use chrono::Utc;
use std::collections::BTreeMap;
use std::time::Duration;

use cache::{CacheKey, CachedValue, Lookup, PriceCache, Resolution};
use dashboard::dispatcher::{fetch_value, fetch_with_timeout};
use dashboard::event::{Command, DashboardEvent};
use dashboard::frame::{render_frame, Frame};
use dashboard::state::DashboardState;
use dashboard::view::Slot;
use errors::FetchError;
use models::holding::Holding;
use models::metal::Metal;
use models::period::Period;
use models::price::{PriceSeries, PriceSnapshot};
use models::settings::Settings;
use providers::traits::PriceProvider;

pub use config::AppConfig;
pub use errors::CoreError;

/// What a one-shot render should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewRequest {
    pub metal: Metal,
    pub period: Period,
    pub chart: bool,
    pub width: usize,
    pub height: usize,
}

/// Fetch timing shared by every entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub ttl_seconds: u64,
    pub timeout: Duration,
}

impl From<&AppConfig> for FetchPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            ttl_seconds: config.cache_ttl_seconds,
            timeout: config.fetch_timeout,
        }
    }
}

/// Render a single dashboard frame without entering the event loop.
///
/// Drives the same state machine as the interactive dashboard, but runs
/// every requested fetch to completion in turn before rendering. Fetch
/// failures end up in the frame, never in the return value.
pub async fn run_once(
    provider: &dyn PriceProvider,
    cache: &mut PriceCache,
    holdings: Vec<Holding>,
    request: ViewRequest,
    policy: FetchPolicy,
) -> Frame {
    let now = Utc::now();
    let settings = Settings {
        last_metal: request.metal,
        last_period: request.period,
    };
    let mut state = DashboardState::new(Some(settings), holdings, policy.ttl_seconds, now);

    let mut commands = state.start();
    if request.chart {
        // A fresh state is never terminated, so the toggle always applies.
        commands.extend(state.apply(DashboardEvent::ToggleChart, now).unwrap_or_default());
    }

    for command in commands {
        let (key, force) = match command {
            Command::FetchSnapshot { metal, force } => (CacheKey::Snapshot(metal), force),
            Command::FetchSeries { metal, period, force } => (CacheKey::Series(metal, period), force),
            Command::PersistSettings(_) | Command::Exit => continue,
        };
        let resolution = match cache.begin_fetch(key, force, now) {
            Lookup::Fresh(value) => Resolution::Fresh(value),
            Lookup::InFlight => continue,
            Lookup::Fetch => {
                let result = fetch_with_timeout(provider, key, policy.timeout).await;
                if let Err(e) = &result {
                    tracing::warn!(%key, "fetch failed: {e}");
                }
                cache.complete_fetch(key, result, policy.ttl_seconds, Utc::now())
            }
        };
        state.resolve(key, resolution);
    }

    render_frame(state.view(), request.width, request.height, Utc::now())
}

/// Spot snapshots for every metal, through the cache.
///
/// A metal whose fetch fails falls back to its last cached snapshot when
/// one exists; otherwise its entry holds the error.
pub async fn current_prices(
    provider: &dyn PriceProvider,
    cache: &mut PriceCache,
    policy: FetchPolicy,
) -> BTreeMap<Metal, Result<PriceSnapshot, FetchError>> {
    let mut prices = BTreeMap::new();
    for metal in Metal::ALL {
        let key = CacheKey::Snapshot(metal);
        let fetched = cache
            .get_or_fetch(key, policy.ttl_seconds, Utc::now(), move || async move {
                match tokio::time::timeout(policy.timeout, fetch_value(provider, key)).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout),
                }
            })
            .await;

        let snapshot = match fetched {
            Ok(CachedValue::Snapshot(snapshot)) => Ok(snapshot),
            Ok(CachedValue::Series(_)) => Err(FetchError::InvalidResponse(format!("{key} holds a series"))),
            Err(e) => {
                tracing::warn!(%key, "fetch failed: {e}");
                cache
                    .entry(&key)
                    .and_then(|entry| entry.value.as_snapshot().cloned())
                    .ok_or(e)
            }
        };
        prices.insert(metal, snapshot);
    }
    prices
}

/// One metal's price series for `period`, through the cache.
///
/// A failed fetch falls back to the last cached series, marked stale.
pub async fn price_history(
    provider: &dyn PriceProvider,
    cache: &mut PriceCache,
    metal: Metal,
    period: Period,
    policy: FetchPolicy,
) -> Slot<PriceSeries> {
    let key = CacheKey::Series(metal, period);
    let fetched = cache
        .get_or_fetch(key, policy.ttl_seconds, Utc::now(), move || {
            fetch_with_timeout(provider, key, policy.timeout)
        })
        .await;

    match fetched {
        Ok(CachedValue::Series(series)) => Slot::Ready(series),
        Ok(CachedValue::Snapshot(_)) => {
            Slot::Failed(FetchError::InvalidResponse(format!("{key} holds a snapshot")))
        }
        Err(reason) => {
            tracing::warn!(%key, "fetch failed: {reason}");
            match cache.entry(&key).and_then(|entry| entry.value.as_series().cloned()) {
                Some(value) => Slot::Stale { value, reason },
                None => Slot::Failed(reason),
            }
        }
    }
}
