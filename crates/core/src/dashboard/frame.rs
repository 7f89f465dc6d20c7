use chrono::{DateTime, Local, Utc};

use crate::errors::FetchError;
use crate::models::holding::HoldingsSummary;
use crate::models::metal::Metal;
use crate::models::period::Period;
use crate::models::price::{PriceSeries, PriceSnapshot};
use crate::services::chart_renderer::{ChartRenderer, DEFAULT_HEIGHT, MIN_HEIGHT};

use super::keymap::KEY_HELP;
use super::view::{DashboardView, Slot};

/// Narrowest frame the renderer lays out for.
pub const MIN_FRAME_WIDTH: usize = 40;

/// Width of the y-axis label column left of the plot, e.g. `"   2345.67 ┤"`.
const LABEL_GUTTER: usize = 12;

/// Bottom rule and status line; always kept when the frame is cut to fit.
const TRAILER_ROWS: usize = 2;

const RULE: char = '─';

/// How much optional detail a frame carries. Denser layouts are tried
/// first; sparser ones give the chart room on short terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Density {
    Full,
    /// Per-metal holdings breakdown dropped.
    NoBreakdown,
    /// Bid/ask line dropped as well.
    Minimal,
}

const DENSITIES: [Density; 3] = [Density::Full, Density::NoBreakdown, Density::Minimal];

/// One fully composed screen, top line first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub lines: Vec<String>,
}

impl Frame {
    pub fn to_text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }

    /// The lines a `width` × `height` screen can show, each cut to `width`
    /// characters so nothing wraps onto the next row.
    pub fn visible_lines(&self, width: usize, height: usize) -> impl Iterator<Item = String> + '_ {
        self.lines
            .iter()
            .take(height)
            .map(move |line| line.chars().take(width).collect())
    }
}

/// Compose the full frame for `view` at a terminal of `width` × `height`.
///
/// Every line is cut to `width` characters (never less than
/// `MIN_FRAME_WIDTH`). The plot takes the rows the other sections leave
/// free; when even the smallest plot does not fit, optional rows are dropped,
/// and as a last resort the body is cut so the status line stays visible.
pub fn render_frame(view: &DashboardView, width: usize, height: usize, now: DateTime<Utc>) -> Frame {
    let width = width.max(MIN_FRAME_WIDTH);

    let mut lines = Vec::new();
    for density in DENSITIES {
        lines = compose(view, width, MIN_HEIGHT, density, now);
        if lines.len() <= height {
            if view.chart_visible {
                let plot_height = (MIN_HEIGHT + height - lines.len()).min(DEFAULT_HEIGHT);
                lines = compose(view, width, plot_height, density, now);
            }
            break;
        }
    }

    Frame {
        lines: fit_height(lines, height)
            .into_iter()
            .map(|line| line.chars().take(width).collect())
            .collect(),
    }
}

/// A standalone chart: title, period selector and the labelled plot.
pub fn render_chart(
    metal: Metal,
    period: Period,
    series: &Slot<PriceSeries>,
    width: usize,
    plot_height: usize,
) -> Frame {
    let width = width.max(MIN_FRAME_WIDTH);
    let lines = chart_lines(metal, period, series, &Slot::Loading, width, plot_height);
    Frame {
        lines: lines
            .into_iter()
            .map(|line| line.chars().take(width).collect())
            .collect(),
    }
}

fn compose(
    view: &DashboardView,
    width: usize,
    plot_height: usize,
    density: Density,
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut lines = vec![
        "METALSTACK".to_string(),
        KEY_HELP.to_string(),
        rule(width),
    ];
    lines.extend(prices_bar(view));
    lines.push(String::new());

    lines.extend(detail_panel(view.metal, view.snapshot(), density));

    if view.chart_visible {
        lines.push(String::new());
        lines.extend(chart_lines(
            view.metal,
            view.period,
            &view.series,
            view.snapshot(),
            width,
            plot_height,
        ));
    }

    lines.push(String::new());
    lines.extend(holdings_section(&view.holdings, density));
    lines.push(rule(width));
    lines.push(status_line(view, now));
    lines
}

/// Cut the body so that `lines` fits in `height`, keeping the trailer.
fn fit_height(mut lines: Vec<String>, height: usize) -> Vec<String> {
    if lines.len() <= height {
        return lines;
    }
    let trailer = lines.split_off(lines.len().saturating_sub(TRAILER_ROWS));
    lines.truncate(height.saturating_sub(TRAILER_ROWS));
    lines.extend(trailer.into_iter().skip(TRAILER_ROWS.saturating_sub(height)));
    lines
}

// ── Sections ───────────────────────────────────────────────────────

fn rule(width: usize) -> String {
    std::iter::repeat(RULE).take(width).collect()
}

/// All four prices on one line, the selected metal in brackets, with each
/// metal's 24h change lined up underneath.
fn prices_bar(view: &DashboardView) -> [String; 2] {
    let cells: Vec<(String, String)> = Metal::ALL
        .into_iter()
        .map(|metal| {
            let (price, change) = match view.snapshot_of(metal) {
                Slot::Loading => ("-".to_string(), "-".to_string()),
                Slot::Ready(snapshot) => (
                    format_price(snapshot.price_per_unit),
                    format_change(snapshot.change, snapshot.change_pct),
                ),
                Slot::Stale { value, .. } => (
                    format!("{}*", format_price(value.price_per_unit)),
                    format_change(value.change, value.change_pct),
                ),
                Slot::Failed(_) => ("n/a".to_string(), "-".to_string()),
            };
            let label = format!("{}: {}", metal.short_name(), price);
            let label = if metal == view.metal {
                format!("[{label}]")
            } else {
                format!(" {label} ")
            };
            (label, format!(" {change}"))
        })
        .collect();

    let mut prices = Vec::with_capacity(cells.len());
    let mut changes = Vec::with_capacity(cells.len());
    for (label, change) in cells {
        let cell_width = label.chars().count().max(change.chars().count());
        prices.push(format!("{label:<cell_width$}"));
        changes.push(format!("{change:<cell_width$}"));
    }
    [
        prices.join(" ").trim_end().to_string(),
        changes.join(" ").trim_end().to_string(),
    ]
}

fn detail_panel(metal: Metal, slot: &Slot<PriceSnapshot>, density: Density) -> Vec<String> {
    let (snapshot, stale) = match slot {
        Slot::Loading => return vec![format!("{metal}: Loading...")],
        Slot::Failed(reason) => return vec![format!("{metal}: price unavailable: {reason}")],
        Slot::Ready(snapshot) => (snapshot, None),
        Slot::Stale { value, reason } => (value, Some(reason)),
    };

    let mut spot = format!(
        "{metal} Spot Price: {} {}/oz",
        format_price(snapshot.price_per_unit),
        snapshot.currency
    );
    if let Some(reason) = stale {
        spot.push_str(&format!("  (stale: {reason})"));
    }

    let mut lines = vec![spot];
    let has_quotes = snapshot.bid.is_some() || snapshot.ask.is_some();
    if has_quotes && density != Density::Minimal {
        lines.push(format!(
            "  Bid: {}  Ask: {}",
            snapshot.bid.map(format_price).unwrap_or_else(|| "-".into()),
            snapshot.ask.map(format_price).unwrap_or_else(|| "-".into()),
        ));
    }
    lines.push(format!(
        "  24h Change: {}",
        format_change(snapshot.change, snapshot.change_pct)
    ));
    lines
}

fn chart_lines(
    metal: Metal,
    period: Period,
    series: &Slot<PriceSeries>,
    spot: &Slot<PriceSnapshot>,
    width: usize,
    plot_height: usize,
) -> Vec<String> {
    let mut lines = vec![format!("{metal} price history"), period_selector(period)];

    let (series, stale) = match series {
        Slot::Loading => {
            lines.push("Loading chart data...".to_string());
            return lines;
        }
        Slot::Failed(reason) => {
            lines.push(format!("chart unavailable: {reason}"));
            return lines;
        }
        Slot::Ready(series) => (series, None),
        Slot::Stale { value, reason } => (value, Some(reason)),
    };

    if let Some(reason) = stale {
        lines.push(format!("(stale: {reason})"));
    }

    let series = with_live_spot(series, spot);
    let renderer = ChartRenderer::new(width.saturating_sub(LABEL_GUTTER), plot_height);
    let rows = renderer.render(&series);

    let Some((min, max)) = series.bounds() else {
        let pad = " ".repeat(LABEL_GUTTER);
        lines.extend(rows.into_iter().map(|row| format!("{pad}{row}")));
        return lines;
    };

    let top = rows.len().saturating_sub(1).max(1) as f64;
    for (i, row) in rows.into_iter().enumerate() {
        let label = max - (max - min) * i as f64 / top;
        lines.push(format!("{label:>10.2} ┤{row}"));
    }

    if let (Some(first), Some(last)) = (series.first(), series.last()) {
        lines.push(format!("{}{} to {}", " ".repeat(LABEL_GUTTER), first.date, last.date));
    }
    lines
}

/// `1w [1m] ytd 1y 5y` with the active period bracketed.
fn period_selector(active: Period) -> String {
    Period::ALL
        .into_iter()
        .map(|period| {
            if period == active {
                format!("[{period}]")
            } else {
                period.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Today's chart point uses the live spot price when a fresh snapshot is in.
fn with_live_spot(series: &PriceSeries, snapshot: &Slot<PriceSnapshot>) -> PriceSeries {
    match snapshot {
        Slot::Ready(snapshot) if !series.is_empty() => {
            series.with_live_point(snapshot.fetched_at.date_naive(), snapshot.price_per_unit)
        }
        _ => series.clone(),
    }
}

fn holdings_section(summary: &HoldingsSummary, density: Density) -> Vec<String> {
    if summary.total_items == 0 {
        return vec!["No items in collection. Use 'metalstack add' to add items.".to_string()];
    }

    let mut lines = vec![
        format!("Collection: {} items", summary.total_items),
        format!("  Total Value: {}", format_price(summary.total_value)),
        format!(
            "  24h Change: {}",
            format_change(summary.change_since_previous, summary.change_pct)
        ),
    ];
    if density != Density::Full {
        return lines;
    }
    for holding in &summary.by_metal {
        let value = holding.value.map(format_price).unwrap_or_else(|| "-".into());
        lines.push(format!(
            "  {}: {:.3} oz  {}",
            holding.metal, holding.weight_oz, value
        ));
    }
    lines
}

fn status_line(view: &DashboardView, now: DateTime<Utc>) -> String {
    if let Some(error) = &view.last_error {
        return format!("Error: {}", error_hint(error));
    }
    match view.last_updated {
        Some(updated) => format!(
            "Updated {}  •  Next refresh {}",
            local_time(updated),
            local_time(view.next_refresh.max(now))
        ),
        None => "Fetching prices...".to_string(),
    }
}

fn error_hint(error: &FetchError) -> String {
    match error {
        FetchError::RateLimited => format!("{error} (press r to retry later)"),
        other => other.to_string(),
    }
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

// ── Number formatting ──────────────────────────────────────────────

/// `$1,234.56`, with a leading `-` for negative amounts.
pub fn format_price(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{sign}${grouped}.{cents}")
}

/// `+$12.30 (+0.53%)` / `-$4.10 (-0.18%)`.
pub fn format_change(change: f64, change_pct: f64) -> String {
    let sign = if change < 0.0 { '-' } else { '+' };
    format!(
        "{sign}{} ({sign}{:.2}%)",
        format_price(change.abs()),
        change_pct.abs()
    )
}
