// ═══════════════════════════════════════════════════════════════════
// Event Loop Tests — async dispatch, in-flight suppression, timer, run_once
// ═══════════════════════════════════════════════════════════════════

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

use metalstack_core::cache::{CacheKey, CachedValue, PriceCache};
use metalstack_core::dashboard::dispatcher::{fetch_value, fetch_with_timeout};
use metalstack_core::dashboard::frame::Frame;
use metalstack_core::dashboard::runtime::{Dashboard, FrameSink};
use metalstack_core::dashboard::view::Slot;
use metalstack_core::errors::{CoreError, FetchError};
use metalstack_core::models::holding::Holding;
use metalstack_core::models::metal::Metal;
use metalstack_core::models::period::Period;
use metalstack_core::models::price::{PricePoint, PriceSeries, PriceSnapshot};
use metalstack_core::models::settings::Settings;
use metalstack_core::providers::traits::PriceProvider;
use metalstack_core::storage::settings_store::SettingsStore;
use metalstack_core::{current_prices, price_history, run_once, FetchPolicy, ViewRequest};

const TTL: u64 = 3600;
const WAIT: Duration = Duration::from_secs(5);

// ═══════════════════════════════════════════════════════════════════
// Test doubles
// ═══════════════════════════════════════════════════════════════════

fn price_of(metal: Metal) -> f64 {
    match metal {
        Metal::Gold => 2000.0,
        Metal::Silver => 25.0,
        Metal::Platinum => 950.0,
        Metal::Palladium => 1000.0,
    }
}

/// Provider with per-key call counting, optional failures and an optional
/// gate that holds every fetch until permits are added.
#[derive(Default)]
struct MockProvider {
    calls: Mutex<HashMap<CacheKey, usize>>,
    failing: HashSet<Metal>,
    gate: Option<Arc<Semaphore>>,
}

impl MockProvider {
    fn failing(metal: Metal) -> Self {
        Self {
            failing: HashSet::from([metal]),
            ..Self::default()
        }
    }

    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    fn calls(&self, key: CacheKey) -> usize {
        self.calls.lock().unwrap().get(&key).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    async fn enter(&self, key: CacheKey) {
        *self.calls.lock().unwrap().entry(key).or_insert(0) += 1;
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }
    }
}

#[async_trait]
impl PriceProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_snapshot(&self, metal: Metal) -> Result<PriceSnapshot, FetchError> {
        self.enter(CacheKey::Snapshot(metal)).await;
        if self.failing.contains(&metal) {
            return Err(FetchError::Network("connection refused".into()));
        }
        Ok(PriceSnapshot::spot(metal, price_of(metal), Utc::now()))
    }

    async fn fetch_series(&self, metal: Metal, period: Period) -> Result<PriceSeries, FetchError> {
        self.enter(CacheKey::Series(metal, period)).await;
        if self.failing.contains(&metal) {
            return Err(FetchError::Network("connection refused".into()));
        }
        let day = |d| NaiveDate::from_ymd_opt(2026, 2, d).unwrap();
        let base = price_of(metal);
        Ok(PriceSeries::new(vec![
            PricePoint { date: day(26), price: base },
            PricePoint { date: day(27), price: base * 1.1 },
            PricePoint { date: day(28), price: base * 1.05 },
        ])
        .unwrap())
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl FrameSink for RecordingSink {
    fn size(&self) -> (usize, usize) {
        (80, 40)
    }

    fn draw(&mut self, frame: &Frame) -> Result<(), CoreError> {
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }
}

/// Records frames like `RecordingSink` but fails every draw after the first.
#[derive(Clone, Default)]
struct BrokenSink {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl FrameSink for BrokenSink {
    fn size(&self) -> (usize, usize) {
        (80, 40)
    }

    fn draw(&mut self, frame: &Frame) -> Result<(), CoreError> {
        let mut frames = self.frames.lock().unwrap();
        if !frames.is_empty() {
            return Err(CoreError::Terminal("broken pipe".into()));
        }
        frames.push(frame.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
struct MemorySettingsStore {
    saved: Arc<Mutex<Vec<Settings>>>,
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Option<Settings>, CoreError> {
        Ok(self.saved.lock().unwrap().last().copied())
    }

    fn save(&self, settings: &Settings) -> Result<(), CoreError> {
        self.saved.lock().unwrap().push(*settings);
        Ok(())
    }
}

/// A dashboard running on its own task, with handles to drive and observe it.
struct Harness {
    keys: mpsc::UnboundedSender<char>,
    frames: Arc<Mutex<Vec<Frame>>>,
    settings: MemorySettingsStore,
    task: tokio::task::JoinHandle<(PriceCache, Result<(), CoreError>)>,
}

impl Harness {
    fn start(provider: Arc<MockProvider>, cache: PriceCache, timeout: Duration) -> Self {
        Self::start_with_ttl(provider, cache, timeout, TTL)
    }

    fn start_with_ttl(provider: Arc<MockProvider>, cache: PriceCache, timeout: Duration, ttl: u64) -> Self {
        let settings = MemorySettingsStore::default();
        let mut dashboard = Dashboard::new(
            provider,
            Box::new(settings.clone()),
            None,
            Vec::new(),
            cache,
            ttl,
            timeout,
        );
        let (keys, rx) = mpsc::unbounded_channel();
        let mut sink = RecordingSink::default();
        let frames = Arc::clone(&sink.frames);
        let task = tokio::spawn(async move {
            let result = dashboard.run(rx, &mut sink).await;
            (dashboard.into_cache(), result)
        });
        Self {
            keys,
            frames,
            settings,
            task,
        }
    }

    fn press(&self, key: char) {
        self.keys.send(key).unwrap();
    }

    fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    async fn wait_for_frame(&self, what: &str) {
        let found = tokio::time::timeout(WAIT, async {
            loop {
                if self.frames.lock().unwrap().last().is_some_and(|f| f.contains(what)) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(found.is_ok(), "no frame containing {what:?}");
    }

    async fn wait_for_frames(&self, count: usize) {
        let found = tokio::time::timeout(WAIT, async {
            while self.frame_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(found.is_ok(), "fewer than {count} frames drawn");
    }

    async fn quit(self) -> PriceCache {
        self.press('q');
        let (cache, result) = tokio::time::timeout(WAIT, self.task)
            .await
            .expect("dashboard did not quit")
            .expect("dashboard task panicked");
        result.expect("dashboard returned an error");
        cache
    }
}

fn fresh_cache() -> PriceCache {
    let mut cache = PriceCache::new();
    for metal in Metal::ALL {
        cache.put(
            CacheKey::Snapshot(metal),
            CachedValue::Snapshot(PriceSnapshot::spot(metal, price_of(metal), Utc::now())),
            TTL,
            Utc::now(),
        );
    }
    cache
}

// ═══════════════════════════════════════════════════════════════════
// Interactive loop
// ═══════════════════════════════════════════════════════════════════

mod dashboard_loop {
    use super::*;

    #[tokio::test]
    async fn prices_arrive_asynchronously() {
        let provider = Arc::new(MockProvider::default());
        let harness = Harness::start(Arc::clone(&provider), PriceCache::new(), WAIT);

        harness.wait_for_frame("[Gold: $2,000.00]").await;
        harness.wait_for_frame("Pall: $1,000.00").await;
        let cache = harness.quit().await;

        assert_eq!(cache.len(), 4);
        for metal in Metal::ALL {
            assert_eq!(provider.calls(CacheKey::Snapshot(metal)), 1);
        }
    }

    #[tokio::test]
    async fn first_frame_shows_loading() {
        let gate = Arc::new(Semaphore::new(0));
        let provider = Arc::new(MockProvider::gated(Arc::clone(&gate)));
        let harness = Harness::start(provider, PriceCache::new(), WAIT);

        harness.wait_for_frames(1).await;
        assert!(harness.frames.lock().unwrap()[0].contains("Gold: Loading..."));
        harness.quit().await;
    }

    #[tokio::test]
    async fn network_error_is_shown_and_quit_still_works() {
        let provider = Arc::new(MockProvider::failing(Metal::Gold));
        let harness = Harness::start(Arc::clone(&provider), PriceCache::new(), WAIT);

        harness
            .wait_for_frame("Gold: price unavailable: network error: connection refused")
            .await;
        let cache = harness.quit().await;

        assert!(cache.entry(&CacheKey::Snapshot(Metal::Gold)).is_none());
        assert!(cache.entry(&CacheKey::Snapshot(Metal::Silver)).is_some());
    }

    #[tokio::test]
    async fn refresh_while_in_flight_is_suppressed() {
        let gate = Arc::new(Semaphore::new(0));
        let provider = Arc::new(MockProvider::gated(Arc::clone(&gate)));
        let harness = Harness::start(Arc::clone(&provider), PriceCache::new(), WAIT);

        harness.wait_for_frames(1).await;
        harness.press('r');
        harness.wait_for_frames(2).await;
        gate.add_permits(16);

        harness.wait_for_frame("[Gold: $2,000.00]").await;
        let cache = harness.quit().await;

        assert_eq!(provider.calls(CacheKey::Snapshot(Metal::Gold)), 1);
        assert_eq!(provider.total_calls(), 4);
        assert!(cache.get(&CacheKey::Snapshot(Metal::Gold), Utc::now()).is_some());
    }

    #[tokio::test]
    async fn fresh_cache_skips_provider() {
        let provider = Arc::new(MockProvider::default());
        let harness = Harness::start(Arc::clone(&provider), fresh_cache(), WAIT);

        harness.wait_for_frames(1).await;
        assert!(harness.frames.lock().unwrap()[0].contains("[Gold: $2,000.00]"));
        harness.quit().await;
        assert_eq!(provider.total_calls(), 0);
    }

    #[tokio::test]
    async fn explicit_refresh_bypasses_fresh_cache() {
        let provider = Arc::new(MockProvider::default());
        let harness = Harness::start(Arc::clone(&provider), fresh_cache(), WAIT);

        harness.wait_for_frames(1).await;
        harness.press('r');
        harness.wait_for_frames(3).await;
        harness.quit().await;

        assert_eq!(provider.calls(CacheKey::Snapshot(Metal::Gold)), 1);
        assert_eq!(provider.calls(CacheKey::Snapshot(Metal::Silver)), 0);
    }

    #[tokio::test]
    async fn fetch_timeout_becomes_error_marker() {
        let gate = Arc::new(Semaphore::new(0));
        let provider = Arc::new(MockProvider::gated(gate));
        let harness = Harness::start(provider, PriceCache::new(), Duration::from_millis(50));

        harness.wait_for_frame("Gold: price unavailable: timed out").await;
        harness.quit().await;
    }

    #[tokio::test]
    async fn quit_abandons_in_flight_fetches() {
        let gate = Arc::new(Semaphore::new(0));
        let provider = Arc::new(MockProvider::gated(gate));
        let harness = Harness::start(provider, PriceCache::new(), WAIT);

        harness.wait_for_frames(1).await;
        let cache = harness.quit().await;

        assert!(cache.is_empty());
        for metal in Metal::ALL {
            assert!(!cache.is_in_flight(&CacheKey::Snapshot(metal)));
        }
    }

    #[tokio::test]
    async fn selection_is_persisted() {
        let provider = Arc::new(MockProvider::default());
        let harness = Harness::start(provider, PriceCache::new(), WAIT);
        let saved = Arc::clone(&harness.settings.saved);

        harness.press('s');
        harness.wait_for_frame("[Silver:").await;
        harness.quit().await;

        assert_eq!(
            saved.lock().unwrap().as_slice(),
            &[Settings {
                last_metal: Metal::Silver,
                last_period: Period::OneMonth,
            }]
        );
    }

    #[tokio::test]
    async fn chart_toggle_and_period_fetch_series() {
        let provider = Arc::new(MockProvider::default());
        let harness = Harness::start(Arc::clone(&provider), PriceCache::new(), WAIT);

        harness.press('c');
        harness.wait_for_frame(" ┤").await;
        harness.press('>');
        harness.wait_for_frame("1w 1m [ytd] 1y 5y").await;
        harness.wait_for_frame(" ┤").await;
        harness.quit().await;

        assert_eq!(provider.calls(CacheKey::Series(Metal::Gold, Period::OneMonth)), 1);
        assert_eq!(provider.calls(CacheKey::Series(Metal::Gold, Period::YearToDate)), 1);
    }

    #[tokio::test]
    async fn unbound_keys_ignored_and_closed_input_quits() {
        let provider = Arc::new(MockProvider::default());
        let harness = Harness::start(provider, PriceCache::new(), WAIT);

        harness.press('x');
        harness.press('#');
        let Harness { keys, task, .. } = harness;
        drop(keys);

        let (_, result) = tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn expired_prices_refetched_without_keys() {
        let provider = Arc::new(MockProvider::default());
        let harness = Harness::start_with_ttl(Arc::clone(&provider), PriceCache::new(), WAIT, 1);

        let refetched = tokio::time::timeout(Duration::from_secs(10), async {
            while !Metal::ALL
                .iter()
                .all(|&metal| provider.calls(CacheKey::Snapshot(metal)) >= 2)
            {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(refetched.is_ok(), "timer never refetched every snapshot");

        harness.quit().await;
        assert_eq!(provider.calls(CacheKey::Series(Metal::Gold, Period::OneMonth)), 0);
    }

    #[tokio::test]
    async fn draw_error_still_yields_cache() {
        let provider = Arc::new(MockProvider::default());
        let mut dashboard = Dashboard::new(
            provider,
            Box::new(MemorySettingsStore::default()),
            None,
            Vec::new(),
            PriceCache::new(),
            TTL,
            WAIT,
        );
        let (_keys, rx) = mpsc::unbounded_channel();
        let mut sink = BrokenSink::default();

        let result = tokio::time::timeout(WAIT, dashboard.run(rx, &mut sink))
            .await
            .expect("draw error did not end the loop");

        assert!(matches!(result, Err(CoreError::Terminal(ref msg)) if msg == "broken pipe"));
        assert_eq!(sink.frames.lock().unwrap().len(), 1);
        let cache = dashboard.into_cache();
        assert_eq!(cache.len(), 1);
        for metal in Metal::ALL {
            assert!(!cache.is_in_flight(&CacheKey::Snapshot(metal)));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Dispatcher helpers
// ═══════════════════════════════════════════════════════════════════

mod dispatcher {
    use super::*;

    #[tokio::test]
    async fn fetch_value_by_key() {
        let provider = MockProvider::default();
        let snapshot = fetch_value(&provider, CacheKey::Snapshot(Metal::Silver)).await.unwrap();
        assert_eq!(snapshot.as_snapshot().map(|s| s.price_per_unit), Some(25.0));

        let series = fetch_value(&provider, CacheKey::Series(Metal::Gold, Period::OneWeek))
            .await
            .unwrap();
        assert_eq!(series.as_series().map(PriceSeries::len), Some(3));
    }

    #[tokio::test]
    async fn slow_fetch_times_out() {
        let provider = MockProvider::gated(Arc::new(Semaphore::new(0)));
        let result = fetch_with_timeout(
            &provider,
            CacheKey::Snapshot(Metal::Gold),
            Duration::from_millis(20),
        )
        .await;
        assert_eq!(result, Err(FetchError::Timeout));
    }
}

// ═══════════════════════════════════════════════════════════════════
// run_once / current_prices
// ═══════════════════════════════════════════════════════════════════

mod one_shot {
    use super::*;

    fn policy() -> FetchPolicy {
        FetchPolicy {
            ttl_seconds: TTL,
            timeout: WAIT,
        }
    }

    fn request(chart: bool) -> ViewRequest {
        ViewRequest {
            metal: Metal::Gold,
            period: Period::OneMonth,
            chart,
            width: 80,
            height: 40,
        }
    }

    #[tokio::test]
    async fn renders_prices_and_chart() {
        let provider = MockProvider::default();
        let mut cache = PriceCache::new();
        let holdings = vec![Holding::new("Eagle", Metal::Gold, 1.0, 2)];

        let frame = run_once(&provider, &mut cache, holdings, request(true), policy()).await;

        assert!(frame.contains("Gold Spot Price: $2,000.00 USD/oz"));
        assert!(frame.contains("Gold price history"));
        assert!(frame.contains(" ┤"));
        assert!(frame.contains("Total Value: $4,000.00"));
        assert_eq!(cache.len(), 5);
    }

    #[tokio::test]
    async fn second_run_uses_cache() {
        let provider = MockProvider::default();
        let mut cache = PriceCache::new();
        run_once(&provider, &mut cache, Vec::new(), request(true), policy()).await;
        let frame = run_once(&provider, &mut cache, Vec::new(), request(true), policy()).await;

        assert!(frame.contains("[Gold: $2,000.00]"));
        assert_eq!(provider.total_calls(), 5);
    }

    #[tokio::test]
    async fn chart_hidden_fetches_no_series() {
        let provider = MockProvider::default();
        let mut cache = PriceCache::new();
        let frame = run_once(&provider, &mut cache, Vec::new(), request(false), policy()).await;
        assert!(!frame.contains("price history"));
        assert_eq!(provider.total_calls(), 4);
    }

    #[tokio::test]
    async fn failure_falls_back_to_stale_entry() {
        let provider = MockProvider::failing(Metal::Gold);
        let mut cache = PriceCache::new();
        let long_ago = Utc::now() - ChronoDuration::hours(3);
        cache.put(
            CacheKey::Snapshot(Metal::Gold),
            CachedValue::Snapshot(PriceSnapshot::spot(Metal::Gold, 1900.0, long_ago)),
            TTL,
            long_ago,
        );

        let frame = run_once(&provider, &mut cache, Vec::new(), request(false), policy()).await;
        assert!(frame.contains("$1,900.00 USD/oz  (stale: network error: connection refused)"));
        assert!(frame.contains("[Gold: $1,900.00*]"));
    }

    #[tokio::test]
    async fn current_prices_reports_each_metal() {
        let provider = MockProvider::failing(Metal::Platinum);
        let mut cache = PriceCache::new();
        let prices = current_prices(&provider, &mut cache, policy()).await;

        assert_eq!(prices.len(), 4);
        assert_eq!(
            prices[&Metal::Gold].as_ref().map(|s| s.price_per_unit),
            Ok(2000.0)
        );
        assert_eq!(
            prices[&Metal::Platinum],
            Err(FetchError::Network("connection refused".into()))
        );
    }

    #[tokio::test]
    async fn current_prices_falls_back_to_old_snapshot() {
        let provider = MockProvider::failing(Metal::Gold);
        let mut cache = PriceCache::new();
        let long_ago = Utc::now() - ChronoDuration::hours(3);
        cache.put(
            CacheKey::Snapshot(Metal::Gold),
            CachedValue::Snapshot(PriceSnapshot::spot(Metal::Gold, 1900.0, long_ago)),
            TTL,
            long_ago,
        );
        let prices = current_prices(&provider, &mut cache, policy()).await;
        assert_eq!(
            prices[&Metal::Gold].as_ref().map(|s| s.price_per_unit),
            Ok(1900.0)
        );
    }

    #[tokio::test]
    async fn price_history_fetches_then_hits_cache() {
        let provider = MockProvider::default();
        let mut cache = PriceCache::new();

        let first = price_history(&provider, &mut cache, Metal::Silver, Period::OneYear, policy()).await;
        let second = price_history(&provider, &mut cache, Metal::Silver, Period::OneYear, policy()).await;

        assert!(matches!(&first, Slot::Ready(series) if series.len() == 3));
        assert_eq!(first, second);
        assert_eq!(provider.calls(CacheKey::Series(Metal::Silver, Period::OneYear)), 1);
        assert_eq!(provider.total_calls(), 1);
    }

    #[tokio::test]
    async fn price_history_falls_back_to_old_series() {
        let provider = MockProvider::failing(Metal::Gold);
        let mut cache = PriceCache::new();
        let long_ago = Utc::now() - ChronoDuration::hours(3);
        let old = PriceSeries::new(vec![PricePoint {
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            price: 1800.0,
        }])
        .unwrap();
        cache.put(
            CacheKey::Series(Metal::Gold, Period::OneMonth),
            CachedValue::Series(old.clone()),
            TTL,
            long_ago,
        );

        let slot = price_history(&provider, &mut cache, Metal::Gold, Period::OneMonth, policy()).await;
        assert_eq!(
            slot,
            Slot::Stale {
                value: old,
                reason: FetchError::Network("connection refused".into()),
            }
        );
    }

    #[tokio::test]
    async fn price_history_without_cache_reports_failure() {
        let provider = MockProvider::failing(Metal::Palladium);
        let mut cache = PriceCache::new();
        let slot = price_history(&provider, &mut cache, Metal::Palladium, Period::FiveYear, policy()).await;
        assert_eq!(slot, Slot::Failed(FetchError::Network("connection refused".into())));
        assert!(cache.is_empty());
    }
}
