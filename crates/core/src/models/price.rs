use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SeriesError;

use super::metal::Metal;

/// A single point-in-time spot reading for one metal.
///
/// **Note on precision**: prices are `f64`. That is plenty for display of
/// spot prices and holdings values; no ledger arithmetic happens here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub metal: Metal,

    /// Spot price per troy ounce
    pub price_per_unit: f64,

    /// ISO currency code (always "USD" from metals.dev)
    pub currency: String,

    /// When the provider produced this reading
    pub fetched_at: DateTime<Utc>,

    #[serde(default)]
    pub bid: Option<f64>,

    #[serde(default)]
    pub ask: Option<f64>,

    /// 24h absolute change in `currency`
    #[serde(default)]
    pub change: f64,

    /// 24h change in percent
    #[serde(default)]
    pub change_pct: f64,
}

impl PriceSnapshot {
    /// Snapshot with only a spot price; bid/ask unknown and no change.
    pub fn spot(metal: Metal, price_per_unit: f64, fetched_at: DateTime<Utc>) -> Self {
        Self {
            metal,
            price_per_unit,
            currency: "USD".to_string(),
            fetched_at,
            bid: None,
            ask: None,
            change: 0.0,
            change_pct: 0.0,
        }
    }
}

/// A single price data point (date → price).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Chronologically ordered price history for one metal.
///
/// Construction rejects out-of-order dates, so every `PriceSeries` in the
/// program is sorted. Equal consecutive dates are allowed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PricePoint>", into = "Vec<PricePoint>")]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Result<Self, SeriesError> {
        if let Some(index) = points.windows(2).position(|w| w[1].date < w[0].date) {
            return Err(SeriesError::OutOfOrder { index: index + 1 });
        }
        Ok(Self { points })
    }

    /// Build a series from unordered points: sorts by date and keeps the
    /// last price seen for any duplicated date.
    pub fn from_unsorted(mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }
        Self { points: deduped }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Lowest and highest price, `None` for an empty series.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        let first = self.points.first()?.price;
        Some(self.points.iter().fold((first, first), |(lo, hi), p| {
            (lo.min(p.price), hi.max(p.price))
        }))
    }

    /// Replace (or append) the point for `date` with a live price.
    /// Only applies when `date` is not earlier than the last point, so the
    /// ordering invariant holds.
    pub fn with_live_point(&self, date: NaiveDate, price: f64) -> PriceSeries {
        let mut points = self.points.clone();
        match points.last_mut() {
            Some(last) if last.date == date => last.price = price,
            Some(last) if last.date < date => points.push(PricePoint { date, price }),
            _ => {}
        }
        PriceSeries { points }
    }
}

impl TryFrom<Vec<PricePoint>> for PriceSeries {
    type Error = SeriesError;

    fn try_from(points: Vec<PricePoint>) -> Result<Self, Self::Error> {
        PriceSeries::new(points)
    }
}

impl From<PriceSeries> for Vec<PricePoint> {
    fn from(series: PriceSeries) -> Self {
        series.points
    }
}
