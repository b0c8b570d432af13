use serde::{Deserialize, Serialize};
use std::fmt;

/// How bad a finding is. Variants are declared in ascending order so the
/// derived `Ord` is the grading order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    None,
    Low,
    Moderate,
    Severe,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::None,
        Severity::Low,
        Severity::Moderate,
        Severity::Severe,
        Severity::Critical,
    ];

    /// Numeric grade stored in the database.
    pub fn value(self) -> i16 {
        match self {
            Severity::None => 0,
            Severity::Low => 1,
            Severity::Moderate => 2,
            Severity::Severe => 3,
            Severity::Critical => 4,
        }
    }

    pub fn from_value(v: i16) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.value() == v)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "NONE",
            Severity::Low => "LOW",
            Severity::Moderate => "MODERATE",
            Severity::Severe => "SEVERE",
            Severity::Critical => "CRITICAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_uppercase();
        Self::ALL.into_iter().find(|sev| sev.as_str() == s)
    }

    /// Worst severity of the iterator, `None` when it is empty.
    pub fn worst<I: IntoIterator<Item = Severity>>(severities: I) -> Self {
        severities.into_iter().max().unwrap_or(Severity::None)
    }

    /// Grade a value where bigger is worse.
    pub fn ascending(value: f64, low: f64, moderate: f64, severe: f64, critical: f64) -> Self {
        if value >= critical {
            Severity::Critical
        } else if value >= severe {
            Severity::Severe
        } else if value >= moderate {
            Severity::Moderate
        } else if value >= low {
            Severity::Low
        } else {
            Severity::None
        }
    }

    /// Grade a value where smaller is worse.
    pub fn descending(value: f64, low: f64, moderate: f64, severe: f64, critical: f64) -> Self {
        if value <= critical {
            Severity::Critical
        } else if value <= severe {
            Severity::Severe
        } else if value <= moderate {
            Severity::Moderate
        } else if value <= low {
            Severity::Low
        } else {
            Severity::None
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
