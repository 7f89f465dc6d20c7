use crate::models::metal::Metal;
use crate::models::period::Period;
use crate::models::settings::Settings;

/// Input to the dashboard state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardEvent {
    SelectMetal(Metal),
    ToggleChart,
    NextPeriod,
    PrevPeriod,
    /// Explicit user refresh: bypasses the cache TTL.
    Refresh,
    /// Periodic wake from the auto-refresh timer: respects the cache TTL.
    TimerTick,
    Quit,
}

/// Side effect requested by a transition. The event loop carries these out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    FetchSnapshot { metal: Metal, force: bool },
    FetchSeries { metal: Metal, period: Period, force: bool },
    PersistSettings(Settings),
    Exit,
}
