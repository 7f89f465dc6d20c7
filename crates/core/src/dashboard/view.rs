use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::errors::FetchError;
use crate::models::holding::HoldingsSummary;
use crate::models::metal::Metal;
use crate::models::period::Period;
use crate::models::price::{PriceSeries, PriceSnapshot};

static LOADING_SNAPSHOT: Slot<PriceSnapshot> = Slot::Loading;

/// Display state of one fetched value.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    Loading,
    Ready(T),
    /// Last known value, shown after a failed refresh.
    Stale { value: T, reason: FetchError },
    Failed(FetchError),
}

impl<T> Slot<T> {
    /// The value to display, fresh or stale.
    pub fn value(&self) -> Option<&T> {
        match self {
            Slot::Ready(value) | Slot::Stale { value, .. } => Some(value),
            Slot::Loading | Slot::Failed(_) => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Slot::Loading)
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Slot::Stale { reason, .. } | Slot::Failed(reason) => Some(reason),
            Slot::Loading | Slot::Ready(_) => None,
        }
    }
}

/// Render-ready projection of the dashboard.
///
/// Only `DashboardState` transitions mutate it; the frame renderer reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub metal: Metal,
    pub period: Period,
    pub chart_visible: bool,

    /// Spot snapshot per metal, every metal always present.
    pub snapshots: BTreeMap<Metal, Slot<PriceSnapshot>>,

    /// Series for the selected `(metal, period)`.
    pub series: Slot<PriceSeries>,

    pub holdings: HoldingsSummary,

    /// Newest `fetched_at` among displayed snapshots
    pub last_updated: Option<DateTime<Utc>>,

    /// When the auto-refresh timer fires next
    pub next_refresh: DateTime<Utc>,

    /// Most recent fetch failure, cleared by the next success
    pub last_error: Option<FetchError>,
}

impl DashboardView {
    /// Snapshot slot of the selected metal.
    pub fn snapshot(&self) -> &Slot<PriceSnapshot> {
        self.snapshot_of(self.metal)
    }

    pub fn snapshot_of(&self, metal: Metal) -> &Slot<PriceSnapshot> {
        self.snapshots.get(&metal).unwrap_or(&LOADING_SNAPSHOT)
    }
}
