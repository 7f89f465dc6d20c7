use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

use crate::cache::{CacheKey, CachedValue, Resolution};
use crate::errors::StateError;
use crate::models::holding::Holding;
use crate::models::metal::Metal;
use crate::models::price::PriceSnapshot;
use crate::models::settings::Settings;
use crate::services::holdings_service::HoldingsService;

use super::event::{Command, DashboardEvent};
use super::view::{DashboardView, Slot};

/// The dashboard as a Mealy machine: `apply` consumes one event, updates the
/// view and returns the side effects the event loop must carry out.
///
/// Fetch results come back through `resolve`; the machine never performs
/// I/O itself.
pub struct DashboardState {
    view: DashboardView,
    holdings: Vec<Holding>,
    holdings_service: HoldingsService,
    ttl_seconds: u64,
    last_auto_refresh: DateTime<Utc>,
    terminated: bool,
}

impl std::fmt::Debug for DashboardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardState")
            .field("metal", &self.view.metal)
            .field("period", &self.view.period)
            .field("chart_visible", &self.view.chart_visible)
            .field("holdings", &self.holdings.len())
            .field("last_auto_refresh", &self.last_auto_refresh)
            .field("terminated", &self.terminated)
            .finish()
    }
}

impl DashboardState {
    /// Initial state: selection from `settings` (Gold / 1m when absent),
    /// chart hidden, every price loading.
    pub fn new(settings: Option<Settings>, holdings: Vec<Holding>, ttl_seconds: u64, now: DateTime<Utc>) -> Self {
        let settings = settings.unwrap_or_default();
        let ttl_seconds = ttl_seconds.max(1);
        let holdings_service = HoldingsService::new();
        let holdings_summary = holdings_service.summarize(&holdings, &BTreeMap::new());

        let view = DashboardView {
            metal: settings.last_metal,
            period: settings.last_period,
            chart_visible: false,
            snapshots: Metal::ALL.into_iter().map(|m| (m, Slot::Loading)).collect(),
            series: Slot::Loading,
            holdings: holdings_summary,
            last_updated: None,
            next_refresh: now + ttl(ttl_seconds),
            last_error: None,
        };

        Self {
            view,
            holdings,
            holdings_service,
            ttl_seconds,
            last_auto_refresh: now,
            terminated: false,
        }
    }

    pub fn view(&self) -> &DashboardView {
        &self.view
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    pub fn settings(&self) -> Settings {
        Settings {
            last_metal: self.view.metal,
            last_period: self.view.period,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// When the next `TimerTick` is due.
    pub fn next_auto_refresh(&self) -> DateTime<Utc> {
        self.last_auto_refresh + ttl(self.ttl_seconds)
    }

    /// Restart the auto-refresh window, e.g. after fresh prices arrived.
    pub fn record_refresh(&mut self, now: DateTime<Utc>) {
        if now > self.last_auto_refresh {
            self.last_auto_refresh = now;
        }
        self.view.next_refresh = self.next_auto_refresh();
    }

    /// Commands for the first frame: every snapshot, through the cache.
    pub fn start(&mut self) -> Vec<Command> {
        self.snapshot_commands(None)
    }

    /// Apply one event.
    ///
    /// Events whose precondition does not hold (re-selecting the current
    /// metal, changing period with the chart hidden, an early tick) are
    /// no-ops returning no commands. Any event after `Quit` is rejected.
    pub fn apply(&mut self, event: DashboardEvent, now: DateTime<Utc>) -> Result<Vec<Command>, StateError> {
        if self.terminated {
            return Err(StateError::InvalidTransition {
                event: format!("{event:?}"),
                state: "Quit".to_string(),
            });
        }

        let commands = match event {
            DashboardEvent::SelectMetal(metal) => {
                if metal == self.view.metal {
                    return Ok(Vec::new());
                }
                self.view.metal = metal;
                if let Some(slot) = self.view.snapshots.get_mut(&metal) {
                    if slot.value().is_none() {
                        *slot = Slot::Loading;
                    }
                }
                // The series slot always belongs to the selected metal.
                self.view.series = Slot::Loading;
                let mut commands = vec![Command::FetchSnapshot { metal, force: false }];
                if self.view.chart_visible {
                    commands.push(self.series_command(false));
                }
                commands.push(Command::PersistSettings(self.settings()));
                commands
            }
            DashboardEvent::ToggleChart => {
                self.view.chart_visible = !self.view.chart_visible;
                if self.view.chart_visible {
                    if self.view.series.value().is_none() {
                        self.view.series = Slot::Loading;
                    }
                    vec![self.series_command(false)]
                } else {
                    Vec::new()
                }
            }
            DashboardEvent::NextPeriod | DashboardEvent::PrevPeriod => {
                if !self.view.chart_visible {
                    return Ok(Vec::new());
                }
                self.view.period = if event == DashboardEvent::NextPeriod {
                    self.view.period.next()
                } else {
                    self.view.period.prev()
                };
                self.view.series = Slot::Loading;
                vec![
                    self.series_command(false),
                    Command::PersistSettings(self.settings()),
                ]
            }
            DashboardEvent::Refresh => {
                let mut commands = self.snapshot_commands(Some(self.view.metal));
                if self.view.chart_visible {
                    commands.push(self.series_command(true));
                }
                commands
            }
            DashboardEvent::TimerTick => {
                if now < self.next_auto_refresh() {
                    return Ok(Vec::new());
                }
                self.record_refresh(now);
                let mut commands = self.snapshot_commands(None);
                if self.view.chart_visible {
                    commands.push(self.series_command(false));
                }
                commands
            }
            DashboardEvent::Quit => {
                self.terminated = true;
                vec![Command::Exit]
            }
        };

        Ok(commands)
    }

    /// Fold a fetch result (or cache hit) into the view.
    ///
    /// Series results for a `(metal, period)` that is no longer selected are
    /// dropped; they are still in the cache for when the user comes back.
    pub fn resolve(&mut self, key: CacheKey, resolution: Resolution) {
        match key {
            CacheKey::Snapshot(metal) => {
                let slot = match resolution {
                    Resolution::Fresh(CachedValue::Snapshot(snapshot)) => {
                        self.view.last_error = None;
                        Slot::Ready(snapshot)
                    }
                    Resolution::Stale {
                        value: CachedValue::Snapshot(snapshot),
                        reason,
                    } => {
                        self.view.last_error = Some(reason.clone());
                        Slot::Stale { value: snapshot, reason }
                    }
                    Resolution::Failed(reason) => {
                        self.view.last_error = Some(reason.clone());
                        Slot::Failed(reason)
                    }
                    other => {
                        tracing::warn!(%key, ?other, "mismatched cache value for snapshot key");
                        return;
                    }
                };
                self.view.snapshots.insert(metal, slot);
                self.recompute_derived();
            }
            CacheKey::Series(metal, period) => {
                if metal != self.view.metal || period != self.view.period {
                    tracing::debug!(%key, "series no longer selected, not shown");
                    return;
                }
                self.view.series = match resolution {
                    Resolution::Fresh(CachedValue::Series(series)) => Slot::Ready(series),
                    Resolution::Stale {
                        value: CachedValue::Series(series),
                        reason,
                    } => {
                        self.view.last_error = Some(reason.clone());
                        Slot::Stale { value: series, reason }
                    }
                    Resolution::Failed(reason) => {
                        self.view.last_error = Some(reason.clone());
                        Slot::Failed(reason)
                    }
                    other => {
                        tracing::warn!(%key, ?other, "mismatched cache value for series key");
                        return;
                    }
                };
            }
        }
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Snapshot requests for all metals; `forced` (if any) bypasses the TTL.
    fn snapshot_commands(&self, forced: Option<Metal>) -> Vec<Command> {
        let selected = self.view.metal;
        // Selected metal first so its price lands before the others.
        std::iter::once(selected)
            .chain(Metal::ALL.into_iter().filter(|m| *m != selected))
            .map(|metal| Command::FetchSnapshot {
                metal,
                force: forced == Some(metal),
            })
            .collect()
    }

    fn series_command(&self, force: bool) -> Command {
        Command::FetchSeries {
            metal: self.view.metal,
            period: self.view.period,
            force,
        }
    }

    fn recompute_derived(&mut self) {
        let prices: BTreeMap<Metal, &PriceSnapshot> = self
            .view
            .snapshots
            .iter()
            .filter_map(|(metal, slot)| slot.value().map(|s| (*metal, s)))
            .collect();
        self.view.last_updated = prices.values().map(|s| s.fetched_at).max();
        self.view.holdings = self.holdings_service.summarize(&self.holdings, &prices);
    }
}

fn ttl(seconds: u64) -> Duration {
    crate::cache::ttl_duration(seconds)
}
