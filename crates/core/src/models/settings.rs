use serde::{Deserialize, Serialize};

use super::metal::Metal;
use super::period::Period;

/// Dashboard selection remembered across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// The metal selected when the dashboard was last used.
    #[serde(rename = "last_selected_metal", default = "default_metal")]
    pub last_metal: Metal,

    /// The chart period selected when the dashboard was last used.
    #[serde(rename = "chart_period", default = "default_period")]
    pub last_period: Period,
}

fn default_metal() -> Metal {
    Metal::Gold
}

fn default_period() -> Period {
    Period::OneMonth
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            last_metal: default_metal(),
            last_period: default_period(),
        }
    }
}
