use std::sync::Arc;

use anyhow::{bail, Context};
use metalstack_core::dashboard::frame::{format_price, render_chart, Frame};
use metalstack_core::dashboard::runtime::Dashboard;
use metalstack_core::dashboard::view::Slot;
use metalstack_core::models::holding::Holding;
use metalstack_core::models::metal::Metal;
use metalstack_core::models::period::Period;
use metalstack_core::models::settings::Settings;
use metalstack_core::providers::metals_dev::MetalsDevProvider;
use metalstack_core::services::chart_renderer::DEFAULT_HEIGHT;
use metalstack_core::services::holdings_service::HoldingsService;
use metalstack_core::storage::cache_file;
use metalstack_core::storage::portfolio_store::{JsonPortfolioStore, PortfolioStore};
use metalstack_core::storage::settings_store::{JsonSettingsStore, SettingsStore};
use metalstack_core::{
    current_prices, price_history, run_once, AppConfig, CoreError, FetchPolicy, ViewRequest,
};

use crate::terminal::{self, TerminalSink};

/// Height given to `--once` frames so the chart gets its full size.
const ONCE_HEIGHT: usize = 40;

/// Width used when stdout is not a terminal.
const FALLBACK_WIDTH: usize = 80;

/// Optional field changes for `edit`.
#[derive(Debug, Default)]
pub struct ItemEdit {
    pub name: Option<String>,
    pub metal: Option<Metal>,
    pub weight: Option<f64>,
    pub quantity: Option<u32>,
    pub year: Option<i32>,
}

impl ItemEdit {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.metal.is_none()
            && self.weight.is_none()
            && self.quantity.is_none()
            && self.year.is_none()
    }

    fn apply(self, holding: &mut Holding) {
        if let Some(name) = self.name {
            holding.name = name;
        }
        if let Some(metal) = self.metal {
            holding.metal = metal;
        }
        if let Some(weight) = self.weight {
            holding.weight_oz = weight;
        }
        if let Some(quantity) = self.quantity {
            holding.quantity = quantity;
        }
        if let Some(year) = self.year {
            holding.year = Some(year);
        }
    }
}

fn provider(config: &AppConfig) -> Result<MetalsDevProvider, CoreError> {
    let api_key = config.require_api_key()?;
    Ok(MetalsDevProvider::new(api_key.to_string(), config.fetch_timeout))
}

fn initial_settings(saved: Option<Settings>, metal: Option<Metal>, period: Option<Period>) -> Settings {
    let mut settings = saved.unwrap_or_default();
    if let Some(metal) = metal {
        settings.last_metal = metal;
    }
    if let Some(period) = period {
        settings.last_period = period;
    }
    settings
}

fn output_width() -> usize {
    crossterm::terminal::size()
        .map(|(cols, _)| cols as usize)
        .unwrap_or(FALLBACK_WIDTH)
}

fn save_cache(config: &AppConfig, cache: &metalstack_core::cache::PriceCache) {
    if let Err(e) = cache_file::save(&config.price_cache_path(), cache) {
        tracing::warn!("Failed to save price cache: {e}");
    }
}

/// The interactive dashboard. Blocks until the user quits.
pub async fn dashboard(
    config: &AppConfig,
    metal: Option<Metal>,
    period: Option<Period>,
    chart: bool,
) -> anyhow::Result<()> {
    let provider = Arc::new(provider(config)?);
    let holdings = JsonPortfolioStore::new(config.collection_path())
        .current_holdings()
        .context("Failed to load collection")?;
    let settings_store = JsonSettingsStore::new(config.settings_path());
    let settings = initial_settings(settings_store.load()?, metal, period);
    let cache = cache_file::load(&config.price_cache_path());

    tracing::info!(
        metal = %settings.last_metal,
        period = %settings.last_period,
        holdings = holdings.len(),
        cached = cache.len(),
        "starting dashboard"
    );

    let mut dashboard = Dashboard::new(
        provider,
        Box::new(settings_store),
        Some(settings),
        holdings,
        cache,
        config.cache_ttl_seconds,
        config.fetch_timeout,
    );
    if chart {
        dashboard = dashboard.with_chart();
    }

    let mut sink = TerminalSink::enter()?;
    let (keys, reader) = terminal::spawn_key_reader();
    let result = dashboard.run(keys, &mut sink).await;
    reader.abort();
    drop(sink);

    save_cache(config, &dashboard.into_cache());
    result?;
    tracing::info!("dashboard closed");
    Ok(())
}

/// Render one frame to stdout and exit.
pub async fn once(
    config: &AppConfig,
    metal: Option<Metal>,
    period: Option<Period>,
    chart: bool,
) -> anyhow::Result<()> {
    let provider = provider(config)?;
    let holdings = JsonPortfolioStore::new(config.collection_path())
        .current_holdings()
        .context("Failed to load collection")?;
    let saved = JsonSettingsStore::new(config.settings_path()).load()?;
    let settings = initial_settings(saved, metal, period);
    let mut cache = cache_file::load(&config.price_cache_path());

    let request = ViewRequest {
        metal: settings.last_metal,
        period: settings.last_period,
        chart,
        width: output_width(),
        height: ONCE_HEIGHT,
    };

    let frame: Frame = run_once(&provider, &mut cache, holdings, request, FetchPolicy::from(config)).await;
    save_cache(config, &cache);
    println!("{}", frame.to_text());
    Ok(())
}

/// Print the price chart of one metal and exit.
pub async fn chart(config: &AppConfig, metal: Metal, period: Period) -> anyhow::Result<()> {
    let provider = provider(config)?;
    let mut cache = cache_file::load(&config.price_cache_path());
    let series = price_history(&provider, &mut cache, metal, period, FetchPolicy::from(config)).await;
    save_cache(config, &cache);

    if let Slot::Failed(reason) = &series {
        bail!("Failed to fetch {metal} price history: {reason}");
    }
    let frame = render_chart(metal, period, &series, output_width(), DEFAULT_HEIGHT);
    println!("{}", frame.to_text());
    Ok(())
}

/// Print the collection with values at current spot prices.
pub async fn list(config: &AppConfig) -> anyhow::Result<()> {
    let holdings = JsonPortfolioStore::new(config.collection_path())
        .current_holdings()
        .context("Failed to load collection")?;
    if holdings.is_empty() {
        println!("No items in collection. Use 'metalstack add' to add items.");
        return Ok(());
    }

    let prices = match provider(config) {
        Ok(provider) => {
            let mut cache = cache_file::load(&config.price_cache_path());
            let prices = current_prices(&provider, &mut cache, FetchPolicy::from(config)).await;
            save_cache(config, &cache);
            prices
        }
        Err(e) => {
            eprintln!("Note: {e}");
            Default::default()
        }
    };

    println!(
        "{:>3}  {:<28} {:<10} {:>10} {:>4} {:>5} {:>14}",
        "#", "Name", "Metal", "Weight oz", "Qty", "Year", "Value"
    );
    let mut total = 0.0;
    for (i, holding) in holdings.iter().enumerate() {
        let value = match prices.get(&holding.metal) {
            Some(Ok(snapshot)) => {
                let value = holding.spot_value(snapshot.price_per_unit);
                total += value;
                format_price(value)
            }
            Some(Err(e)) => format!("n/a ({e})"),
            None => "-".to_string(),
        };
        println!(
            "{:>3}  {:<28} {:<10} {:>10.3} {:>4} {:>5} {:>14}",
            i + 1,
            holding.name,
            holding.metal,
            holding.weight_oz,
            holding.quantity,
            holding.year.map(|y| y.to_string()).unwrap_or_default(),
            value
        );
    }
    println!("\nTotal value: {}", format_price(total));
    Ok(())
}

pub fn add(
    config: &AppConfig,
    name: String,
    metal: Metal,
    weight: f64,
    quantity: u32,
    year: Option<i32>,
) -> anyhow::Result<()> {
    let store = JsonPortfolioStore::new(config.collection_path());
    let mut holdings = store.current_holdings()?;

    let mut holding = Holding::new(name, metal, weight, quantity);
    if let Some(year) = year {
        holding = holding.with_year(year);
    }
    let summary = format!("{} ({} × {:.3} oz {})", holding.name, holding.quantity, holding.weight_oz, holding.metal);

    HoldingsService::new().add(&mut holdings, holding)?;
    store.save(&holdings)?;
    tracing::info!(items = holdings.len(), "collection saved");
    println!("Added {summary}");
    Ok(())
}

/// Remove by 1-based position.
pub fn remove(config: &AppConfig, index: usize) -> anyhow::Result<()> {
    let store = JsonPortfolioStore::new(config.collection_path());
    let mut holdings = store.current_holdings()?;
    let position = index.checked_sub(1).ok_or(CoreError::ItemNotFound(index))?;

    let removed = HoldingsService::new().remove(&mut holdings, position)?;
    store.save(&holdings)?;
    println!("Removed {}", removed.name);
    Ok(())
}

/// Edit by 1-based position.
pub fn edit(config: &AppConfig, index: usize, changes: ItemEdit) -> anyhow::Result<()> {
    if changes.is_empty() {
        bail!("Nothing to change: pass at least one of --name, --metal, --weight, --quantity, --year");
    }
    let store = JsonPortfolioStore::new(config.collection_path());
    let mut holdings = store.current_holdings()?;
    let position = index.checked_sub(1).ok_or(CoreError::ItemNotFound(index))?;

    let updated = HoldingsService::new().update(&mut holdings, position, |h| changes.apply(h))?;
    store.save(&holdings)?;
    println!("Updated {}", updated.name);
    Ok(())
}
