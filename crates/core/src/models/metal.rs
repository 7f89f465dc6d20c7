use serde::{Deserialize, Serialize};

/// A supported precious metal.
///
/// Serialized in lowercase ("gold", "silver", ...) which is also the name
/// metals.dev uses in its responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metal {
    Gold,
    Silver,
    Platinum,
    Palladium,
}

impl Metal {
    /// All metals in display order.
    pub const ALL: [Metal; 4] = [Metal::Gold, Metal::Silver, Metal::Platinum, Metal::Palladium];

    /// Name used by the metals.dev API and in settings files.
    pub fn api_name(self) -> &'static str {
        match self {
            Metal::Gold => "gold",
            Metal::Silver => "silver",
            Metal::Platinum => "platinum",
            Metal::Palladium => "palladium",
        }
    }

    /// Short label for the prices bar.
    pub fn short_name(self) -> &'static str {
        match self {
            Metal::Gold => "Gold",
            Metal::Silver => "Silver",
            Metal::Platinum => "Plat",
            Metal::Palladium => "Pall",
        }
    }

    /// Parse a metal from its API name, case-insensitive.
    pub fn from_name(name: &str) -> Option<Metal> {
        let lower = name.trim().to_lowercase();
        Metal::ALL.into_iter().find(|m| m.api_name() == lower)
    }
}

impl std::fmt::Display for Metal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metal::Gold => write!(f, "Gold"),
            Metal::Silver => write!(f, "Silver"),
            Metal::Platinum => write!(f, "Platinum"),
            Metal::Palladium => write!(f, "Palladium"),
        }
    }
}

impl std::str::FromStr for Metal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metal::from_name(s)
            .ok_or_else(|| format!("unknown metal '{s}' (expected gold, silver, platinum or palladium)"))
    }
}
