use async_trait::async_trait;

use crate::errors::FetchError;
use crate::models::metal::Metal;
use crate::models::period::Period;
use crate::models::price::{PriceSeries, PriceSnapshot};

/// Trait abstraction for spot-price data sources.
///
/// The dashboard only consumes this contract. metals.dev is the production
/// implementation; tests plug in scripted providers.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Current spot price of a metal.
    async fn fetch_snapshot(&self, metal: Metal) -> Result<PriceSnapshot, FetchError>;

    /// Price history of a metal over a period, sorted by date.
    async fn fetch_series(&self, metal: Metal, period: Period) -> Result<PriceSeries, FetchError>;
}
