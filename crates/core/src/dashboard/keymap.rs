use crate::models::metal::Metal;

use super::event::DashboardEvent;

/// One-line key help shown at the top of every frame.
pub const KEY_HELP: &str = "1-4 or g/s/p/d: select metal  c: chart  < >: period  r: refresh  q: quit";

/// Map a key press to a dashboard event. Letters are case-insensitive.
/// Unbound keys return `None` and are ignored by the event loop.
pub fn event_for_key(key: char) -> Option<DashboardEvent> {
    let event = match key.to_ascii_lowercase() {
        '1' | 'g' => DashboardEvent::SelectMetal(Metal::Gold),
        '2' | 's' => DashboardEvent::SelectMetal(Metal::Silver),
        '3' | 'p' => DashboardEvent::SelectMetal(Metal::Platinum),
        '4' | 'd' => DashboardEvent::SelectMetal(Metal::Palladium),
        'c' => DashboardEvent::ToggleChart,
        '<' | ',' => DashboardEvent::PrevPeriod,
        '>' | '.' => DashboardEvent::NextPeriod,
        'r' => DashboardEvent::Refresh,
        'q' => DashboardEvent::Quit,
        _ => return None,
    };
    Some(event)
}
