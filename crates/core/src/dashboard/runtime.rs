use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::cache::{CacheKey, Lookup, PriceCache, Resolution};
use crate::errors::CoreError;
use crate::models::holding::Holding;
use crate::models::settings::Settings;
use crate::providers::traits::PriceProvider;
use crate::storage::settings_store::SettingsStore;

use super::dispatcher::{FetchDispatcher, FetchOutcome};
use super::event::{Command, DashboardEvent};
use super::frame::{render_frame, Frame};
use super::keymap::event_for_key;
use super::state::DashboardState;

/// Slack added to the timer deadline so the tick lands after the cache
/// entries written at the last refresh have gone stale.
const TICK_GRACE_SECONDS: i64 = 1;

/// Where frames go. The binary draws to the terminal; tests record them.
pub trait FrameSink: Send {
    /// Current drawable area as `(width, height)`.
    fn size(&self) -> (usize, usize);

    fn draw(&mut self, frame: &Frame) -> Result<(), CoreError>;
}

enum Wake {
    Fetched(FetchOutcome),
    Key(Option<char>),
    Tick,
}

/// The interactive event loop.
///
/// Owns the state machine and the cache outright; fetch tasks only ever
/// talk back through the dispatcher's channel, so every mutation happens
/// on the loop.
pub struct Dashboard {
    state: DashboardState,
    cache: PriceCache,
    dispatcher: FetchDispatcher,
    outcomes: UnboundedReceiver<FetchOutcome>,
    settings_store: Box<dyn SettingsStore>,
    tasks: HashMap<CacheKey, JoinHandle<()>>,
    /// Commands from setup events, carried out with the startup fetches.
    pending: Vec<Command>,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("state", &self.state)
            .field("cached", &self.cache.len())
            .field("in_flight", &self.tasks.len())
            .finish()
    }
}

impl Dashboard {
    pub fn new(
        provider: Arc<dyn PriceProvider>,
        settings_store: Box<dyn SettingsStore>,
        initial: Option<Settings>,
        holdings: Vec<Holding>,
        cache: PriceCache,
        ttl_seconds: u64,
        fetch_timeout: Duration,
    ) -> Self {
        let state = DashboardState::new(initial, holdings, ttl_seconds, Utc::now());
        let (dispatcher, outcomes) = FetchDispatcher::new(provider, fetch_timeout);
        Self {
            state,
            cache,
            dispatcher,
            outcomes,
            settings_store,
            tasks: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Start with the chart visible, as if `c` had been pressed first.
    pub fn with_chart(mut self) -> Self {
        if let Ok(commands) = self.state.apply(DashboardEvent::ToggleChart, Utc::now()) {
            self.pending.extend(commands);
        }
        self
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Run until `q` (or the key channel closing). Outstanding fetches are
    /// aborted on the way out, whether the loop ended cleanly or on a draw
    /// error; either way the cache is still available from `into_cache`.
    pub async fn run<S>(&mut self, mut keys: UnboundedReceiver<char>, sink: &mut S) -> Result<(), CoreError>
    where
        S: FrameSink + ?Sized,
    {
        let result = self.event_loop(&mut keys, sink).await;
        self.abandon_in_flight();
        result
    }

    /// The cache with everything fetched during the session, for persisting.
    pub fn into_cache(self) -> PriceCache {
        self.cache
    }

    async fn event_loop<S>(&mut self, keys: &mut UnboundedReceiver<char>, sink: &mut S) -> Result<(), CoreError>
    where
        S: FrameSink + ?Sized,
    {
        let mut commands = self.state.start();
        commands.append(&mut self.pending);
        let mut exit = self.execute(commands, Utc::now());
        self.draw(sink)?;

        while !exit {
            let wait = self.until_next_tick(Utc::now());
            let wake = tokio::select! {
                biased;
                Some(outcome) = self.outcomes.recv() => Wake::Fetched(outcome),
                key = keys.recv() => Wake::Key(key),
                _ = tokio::time::sleep(wait) => Wake::Tick,
            };

            let now = Utc::now();
            match wake {
                Wake::Fetched(outcome) => self.complete(outcome, now),
                Wake::Key(None) => {
                    tracing::debug!("key input closed, quitting");
                    exit = self.handle(DashboardEvent::Quit, now);
                }
                Wake::Key(Some(key)) => match event_for_key(key) {
                    Some(event) => exit = self.handle(event, now),
                    None => {
                        tracing::trace!(?key, "unbound key ignored");
                        continue;
                    }
                },
                Wake::Tick => exit = self.handle(DashboardEvent::TimerTick, now),
            }

            self.draw(sink)?;
        }

        Ok(())
    }

    /// Feed one event to the state machine; `true` when the loop must exit.
    fn handle(&mut self, event: DashboardEvent, now: DateTime<Utc>) -> bool {
        match self.state.apply(event, now) {
            Ok(commands) => self.execute(commands, now),
            Err(e) => {
                tracing::debug!("{e}");
                false
            }
        }
    }

    fn execute(&mut self, commands: Vec<Command>, now: DateTime<Utc>) -> bool {
        let mut exit = false;
        for command in commands {
            match command {
                Command::FetchSnapshot { metal, force } => self.request(CacheKey::Snapshot(metal), force, now),
                Command::FetchSeries { metal, period, force } => {
                    self.request(CacheKey::Series(metal, period), force, now)
                }
                Command::PersistSettings(settings) => match self.settings_store.save(&settings) {
                    Ok(()) => tracing::info!(metal = %settings.last_metal, period = %settings.last_period, "settings saved"),
                    Err(e) => tracing::warn!("Failed to save settings: {e}"),
                },
                Command::Exit => exit = true,
            }
        }
        exit
    }

    fn request(&mut self, key: CacheKey, force: bool, now: DateTime<Utc>) {
        match self.cache.begin_fetch(key, force, now) {
            Lookup::Fresh(value) => self.state.resolve(key, Resolution::Fresh(value)),
            Lookup::InFlight => {}
            Lookup::Fetch => {
                tracing::info!(%key, force, "dispatching fetch");
                let handle = self.dispatcher.dispatch(key);
                self.tasks.insert(key, handle);
            }
        }
    }

    fn complete(&mut self, outcome: FetchOutcome, now: DateTime<Utc>) {
        let FetchOutcome { key, result } = outcome;
        self.tasks.remove(&key);

        let succeeded = result.is_ok();
        if let Err(e) = &result {
            tracing::warn!(%key, "fetch failed: {e}");
        }

        let resolution = self.cache.complete_fetch(key, result, self.state.ttl_seconds(), now);
        if succeeded && matches!(key, CacheKey::Snapshot(_)) {
            self.state.record_refresh(now);
        }
        self.state.resolve(key, resolution);
    }

    fn until_next_tick(&self, now: DateTime<Utc>) -> Duration {
        let deadline = self.state.next_auto_refresh() + chrono::Duration::seconds(TICK_GRACE_SECONDS);
        (deadline - now).to_std().unwrap_or(Duration::ZERO)
    }

    fn draw<S>(&self, sink: &mut S) -> Result<(), CoreError>
    where
        S: FrameSink + ?Sized,
    {
        let (width, height) = sink.size();
        let frame = render_frame(self.state.view(), width, height, Utc::now());
        sink.draw(&frame)
    }

    fn abandon_in_flight(&mut self) {
        for (key, handle) in self.tasks.drain() {
            tracing::debug!(%key, "abandoning in-flight fetch");
            handle.abort();
            self.cache.abandon_fetch(&key);
        }
    }
}
