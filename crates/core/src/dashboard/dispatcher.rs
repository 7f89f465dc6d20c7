use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cache::{CacheKey, CachedValue};
use crate::errors::FetchError;
use crate::providers::traits::PriceProvider;

/// Completion message sent back to the event loop by a fetch task.
#[derive(Debug)]
pub struct FetchOutcome {
    pub key: CacheKey,
    pub result: Result<CachedValue, FetchError>,
}

/// Fetch the value behind a cache key from the provider.
pub async fn fetch_value(provider: &dyn PriceProvider, key: CacheKey) -> Result<CachedValue, FetchError> {
    match key {
        CacheKey::Snapshot(metal) => provider.fetch_snapshot(metal).await.map(CachedValue::Snapshot),
        CacheKey::Series(metal, period) => provider.fetch_series(metal, period).await.map(CachedValue::Series),
    }
}

/// `fetch_value` bounded by `timeout`; running over is a `Timeout` failure.
pub async fn fetch_with_timeout(
    provider: &dyn PriceProvider,
    key: CacheKey,
    timeout: Duration,
) -> Result<CachedValue, FetchError> {
    match tokio::time::timeout(timeout, fetch_value(provider, key)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout),
    }
}

/// Runs fetches as detached tasks that report through a channel, so the
/// event loop keeps handling keys while the network is slow.
pub struct FetchDispatcher {
    provider: Arc<dyn PriceProvider>,
    timeout: Duration,
    tx: mpsc::UnboundedSender<FetchOutcome>,
}

impl FetchDispatcher {
    /// Create a dispatcher and the receiver its tasks report to.
    pub fn new(provider: Arc<dyn PriceProvider>, timeout: Duration) -> (Self, mpsc::UnboundedReceiver<FetchOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { provider, timeout, tx }, rx)
    }

    /// Spawn a fetch for `key`. The caller guarantees (through the cache's
    /// in-flight tracking) that no other fetch for `key` is running.
    pub fn dispatch(&self, key: CacheKey) -> JoinHandle<()> {
        let provider = Arc::clone(&self.provider);
        let tx = self.tx.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            let result = fetch_with_timeout(provider.as_ref(), key, timeout).await;
            if tx.send(FetchOutcome { key, result }).is_err() {
                tracing::debug!(%key, "event loop gone, dropping fetch result");
            }
        })
    }
}
