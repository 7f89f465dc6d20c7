use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Historical window requested for charting.
///
/// Cycling is defined by `next`/`prev` on the variants themselves and wraps
/// at both ends, so five steps in either direction return to the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "ytd")]
    YearToDate,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "5y")]
    FiveYear,
}

impl Period {
    /// All periods in selector order.
    pub const ALL: [Period; 5] = [
        Period::OneWeek,
        Period::OneMonth,
        Period::YearToDate,
        Period::OneYear,
        Period::FiveYear,
    ];

    pub fn next(self) -> Period {
        match self {
            Period::OneWeek => Period::OneMonth,
            Period::OneMonth => Period::YearToDate,
            Period::YearToDate => Period::OneYear,
            Period::OneYear => Period::FiveYear,
            Period::FiveYear => Period::OneWeek,
        }
    }

    pub fn prev(self) -> Period {
        match self {
            Period::OneWeek => Period::FiveYear,
            Period::OneMonth => Period::OneWeek,
            Period::YearToDate => Period::OneMonth,
            Period::OneYear => Period::YearToDate,
            Period::FiveYear => Period::OneYear,
        }
    }

    /// Short label shown in the period selector.
    pub fn label(self) -> &'static str {
        match self {
            Period::OneWeek => "1w",
            Period::OneMonth => "1m",
            Period::YearToDate => "ytd",
            Period::OneYear => "1y",
            Period::FiveYear => "5y",
        }
    }

    /// First day of the window ending at `today`.
    pub fn start_date(self, today: NaiveDate) -> NaiveDate {
        match self {
            Period::OneWeek => today - Duration::weeks(1),
            Period::OneMonth => today - Duration::days(30),
            Period::YearToDate => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
            Period::OneYear => today - Duration::days(365),
            Period::FiveYear => today - Duration::days(365 * 5),
        }
    }

    pub fn from_label(label: &str) -> Option<Period> {
        let lower = label.trim().to_lowercase();
        Period::ALL.into_iter().find(|p| p.label() == lower)
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::from_label(s).ok_or_else(|| format!("unknown period '{s}' (expected 1w, 1m, ytd, 1y or 5y)"))
    }
}
