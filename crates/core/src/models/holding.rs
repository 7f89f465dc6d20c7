use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metal::Metal;

/// One line of the user's collection, e.g. "American Gold Eagle, 1 oz × 3".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Unique identifier
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Item name, e.g. "American Gold Eagle"
    pub name: String,

    pub metal: Metal,

    /// Fine weight of a single item in troy ounces
    pub weight_oz: f64,

    /// Number of items
    #[serde(default = "default_quantity")]
    pub quantity: u32,

    /// Year of minting
    #[serde(default)]
    pub year: Option<i32>,
}

fn default_quantity() -> u32 {
    1
}

impl Holding {
    pub fn new(name: impl Into<String>, metal: Metal, weight_oz: f64, quantity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            metal,
            weight_oz,
            quantity,
            year: None,
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Total fine weight of all items in troy ounces.
    pub fn total_weight_oz(&self) -> f64 {
        self.weight_oz * f64::from(self.quantity)
    }

    /// Melt value at the given spot price per ounce.
    pub fn spot_value(&self, spot_price: f64) -> f64 {
        self.total_weight_oz() * spot_price
    }
}

/// Weight and value of everything held in one metal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetalHolding {
    pub metal: Metal,
    pub weight_oz: f64,
    /// `None` while no price is known for this metal
    pub value: Option<f64>,
}

/// Aggregate value of the collection at current spot prices.
///
/// Derived data: recomputed on every snapshot update, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HoldingsSummary {
    pub total_items: usize,

    /// Sum of weight × spot over metals with a known price
    pub total_value: f64,

    /// Sum of weight × 24h change over metals with a known price
    pub change_since_previous: f64,

    /// change / (total - change) × 100, 0 when there is no previous value
    pub change_pct: f64,

    /// Per-metal breakdown, only metals with a non-zero weight
    pub by_metal: Vec<MetalHolding>,
}
