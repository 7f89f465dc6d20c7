use std::collections::BTreeMap;

use crate::errors::CoreError;
use crate::models::holding::{Holding, HoldingsSummary, MetalHolding};
use crate::models::metal::Metal;
use crate::models::price::PriceSnapshot;

/// Collection bookkeeping and valuation.
///
/// Pure business logic: no I/O, no API calls. Easy to test.
pub struct HoldingsService;

impl HoldingsService {
    pub fn new() -> Self {
        Self
    }

    /// Reject holdings that would make valuation meaningless.
    pub fn validate(&self, holding: &Holding) -> Result<(), CoreError> {
        if holding.name.trim().is_empty() {
            return Err(CoreError::Validation("Item name must not be empty".into()));
        }
        if !holding.weight_oz.is_finite() || holding.weight_oz <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Weight must be a positive number of troy ounces, got {}",
                holding.weight_oz
            )));
        }
        if holding.quantity == 0 {
            return Err(CoreError::Validation("Quantity must be at least 1".into()));
        }
        Ok(())
    }

    pub fn add(&self, holdings: &mut Vec<Holding>, holding: Holding) -> Result<(), CoreError> {
        self.validate(&holding)?;
        holdings.push(holding);
        Ok(())
    }

    /// Remove by zero-based position.
    pub fn remove(&self, holdings: &mut Vec<Holding>, index: usize) -> Result<Holding, CoreError> {
        if index >= holdings.len() {
            return Err(CoreError::ItemNotFound(index + 1));
        }
        Ok(holdings.remove(index))
    }

    /// Apply `edit` to the holding at `index`, keeping the original if the
    /// edited version fails validation.
    pub fn update<F>(&self, holdings: &mut [Holding], index: usize, edit: F) -> Result<Holding, CoreError>
    where
        F: FnOnce(&mut Holding),
    {
        let current = holdings.get(index).ok_or(CoreError::ItemNotFound(index + 1))?;
        let mut edited = current.clone();
        edit(&mut edited);
        self.validate(&edited)?;
        holdings[index] = edited.clone();
        Ok(edited)
    }

    pub fn total_weight(&self, holdings: &[Holding], metal: Metal) -> f64 {
        holdings
            .iter()
            .filter(|h| h.metal == metal)
            .map(Holding::total_weight_oz)
            .sum()
    }

    /// Value the collection at the given snapshots.
    ///
    /// Metals without a snapshot contribute weight but no value.
    pub fn summarize(&self, holdings: &[Holding], prices: &BTreeMap<Metal, &PriceSnapshot>) -> HoldingsSummary {
        let mut total_value = 0.0;
        let mut total_change = 0.0;
        let mut by_metal = Vec::new();

        for metal in Metal::ALL {
            let weight = self.total_weight(holdings, metal);
            if weight <= 0.0 {
                continue;
            }
            let value = prices.get(&metal).map(|snapshot| {
                total_change += weight * snapshot.change;
                weight * snapshot.price_per_unit
            });
            total_value += value.unwrap_or(0.0);
            by_metal.push(MetalHolding {
                metal,
                weight_oz: weight,
                value,
            });
        }

        let previous_value = total_value - total_change;
        let change_pct = if previous_value.abs() > f64::EPSILON {
            total_change / previous_value * 100.0
        } else {
            0.0
        };

        HoldingsSummary {
            total_items: holdings.len(),
            total_value,
            change_since_previous: total_change,
            change_pct,
            by_metal,
        }
    }
}

impl Default for HoldingsService {
    fn default() -> Self {
        Self::new()
    }
}
