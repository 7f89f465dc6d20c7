use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::future::Future;

use crate::errors::FetchError;
use crate::models::metal::Metal;
use crate::models::period::Period;
use crate::models::price::{PriceSeries, PriceSnapshot};

/// Cache key: a metal's spot snapshot, or its series for one period.
///
/// The key space is closed: 4 snapshot keys + 4 × 5 series keys, so the
/// cache never holds more than 24 entries and nothing is ever evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    Snapshot(Metal),
    Series(Metal, Period),
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Snapshot(metal) => write!(f, "snapshot/{}", metal.api_name()),
            CacheKey::Series(metal, period) => write!(f, "series/{}/{}", metal.api_name(), period),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CachedValue {
    Snapshot(PriceSnapshot),
    Series(PriceSeries),
}

impl CachedValue {
    pub fn as_snapshot(&self) -> Option<&PriceSnapshot> {
        match self {
            CachedValue::Snapshot(s) => Some(s),
            CachedValue::Series(_) => None,
        }
    }

    pub fn as_series(&self) -> Option<&PriceSeries> {
        match self {
            CachedValue::Series(s) => Some(s),
            CachedValue::Snapshot(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: CachedValue,
    pub stored_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl CacheEntry {
    /// Stale once strictly more than `ttl_seconds` have passed since storing.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.stored_at > ttl_duration(self.ttl_seconds)
    }
}

/// TTLs are capped at ten years so timestamp arithmetic cannot overflow.
const MAX_TTL_SECONDS: u64 = 10 * 365 * 24 * 3600;

pub(crate) fn ttl_duration(seconds: u64) -> Duration {
    Duration::seconds(seconds.min(MAX_TTL_SECONDS) as i64)
}

/// Serialized form of one entry, used by the cache file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub key: CacheKey,
    #[serde(flatten)]
    pub entry: CacheEntry,
}

/// What `begin_fetch` decided for a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Cached and not stale; no fetch needed.
    Fresh(CachedValue),
    /// A fetch for this key is already outstanding; do not start another.
    InFlight,
    /// The caller must fetch and report back through `complete_fetch`.
    Fetch,
}

/// What the view should show after a fetch completed.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Fresh(CachedValue),
    /// The fetch failed but an older entry exists.
    Stale { value: CachedValue, reason: FetchError },
    Failed(FetchError),
}

/// TTL cache of spot snapshots and price series.
///
/// Single owner: the event loop holds the only `&mut` and applies fetch
/// completions itself, so no two writers ever touch an entry. `in_flight`
/// enforces at most one outstanding fetch per key.
#[derive(Debug, Default)]
pub struct PriceCache {
    entries: HashMap<CacheKey, CacheEntry>,
    in_flight: HashSet<CacheKey>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a cache from persisted entries. In-flight state starts empty.
    pub fn from_entries(entries: Vec<PersistedEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|p| (p.key, p.entry)).collect(),
            in_flight: HashSet::new(),
        }
    }

    pub fn to_entries(&self) -> Vec<PersistedEntry> {
        self.entries
            .iter()
            .map(|(key, entry)| PersistedEntry { key: *key, entry: entry.clone() })
            .collect()
    }

    /// The cached value, or `None` when missing or stale.
    pub fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<&CachedValue> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_stale(now))
            .map(|entry| &entry.value)
    }

    /// The raw entry regardless of age.
    pub fn entry(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Store or overwrite, resetting the entry's age.
    pub fn put(&mut self, key: CacheKey, value: CachedValue, ttl_seconds: u64, now: DateTime<Utc>) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                ttl_seconds,
            },
        );
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.in_flight.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First half of a non-blocking fetch.
    ///
    /// `force` skips the freshness check (explicit refresh) but never the
    /// in-flight check. On `Lookup::Fetch` the key is marked in flight until
    /// `complete_fetch` or `abandon_fetch` is called for it.
    pub fn begin_fetch(&mut self, key: CacheKey, force: bool, now: DateTime<Utc>) -> Lookup {
        if self.in_flight.contains(&key) {
            tracing::debug!(%key, "fetch already in flight, suppressing duplicate");
            return Lookup::InFlight;
        }
        if !force {
            if let Some(value) = self.get(&key, now) {
                tracing::debug!(%key, "cache hit");
                return Lookup::Fresh(value.clone());
            }
        }
        tracing::debug!(%key, force, "cache miss, fetch required");
        self.in_flight.insert(key);
        Lookup::Fetch
    }

    /// Second half of a non-blocking fetch: store on success, keep any old
    /// entry untouched on failure.
    pub fn complete_fetch(
        &mut self,
        key: CacheKey,
        result: Result<CachedValue, FetchError>,
        ttl_seconds: u64,
        now: DateTime<Utc>,
    ) -> Resolution {
        self.in_flight.remove(&key);
        match result {
            Ok(value) => {
                self.put(key, value.clone(), ttl_seconds, now);
                Resolution::Fresh(value)
            }
            Err(reason) => match self.entries.get(&key) {
                Some(old) => Resolution::Stale {
                    value: old.value.clone(),
                    reason,
                },
                None => Resolution::Failed(reason),
            },
        }
    }

    /// Forget an in-flight marker without storing anything.
    pub fn abandon_fetch(&mut self, key: &CacheKey) {
        self.in_flight.remove(key);
    }

    /// Fetch-through lookup for sequential callers.
    ///
    /// Returns the fresh cached value, or runs `fetch`, stores its result
    /// and returns it. A failed fetch returns the error and leaves the old
    /// entry in place. If a non-blocking fetch for the key is outstanding,
    /// `fetch` is not called: the old value is returned when one exists.
    pub async fn get_or_fetch<F, Fut>(
        &mut self,
        key: CacheKey,
        ttl_seconds: u64,
        now: DateTime<Utc>,
        fetch: F,
    ) -> Result<CachedValue, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedValue, FetchError>>,
    {
        match self.begin_fetch(key, false, now) {
            Lookup::Fresh(value) => Ok(value),
            Lookup::InFlight => self
                .entries
                .get(&key)
                .map(|entry| entry.value.clone())
                .ok_or_else(|| FetchError::Network(format!("fetch for {key} already in progress"))),
            Lookup::Fetch => {
                let result = fetch().await;
                match self.complete_fetch(key, result, ttl_seconds, now) {
                    Resolution::Fresh(value) => Ok(value),
                    Resolution::Stale { reason, .. } | Resolution::Failed(reason) => Err(reason),
                }
            }
        }
    }
}
