use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable internal name for a statistic that upstream sources have published
/// under several field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalMetric {
    /// Total academic library expenses.
    LibraryExpenses,
    /// Number of licensed databases.
    DatabaseCount,
    /// Full-time-equivalent fall enrollment.
    Fte,
    /// Institution-wide total expenses (finance survey).
    InstitutionExpenses,
}

impl CanonicalMetric {
    pub const ALL: [CanonicalMetric; 4] = [
        CanonicalMetric::LibraryExpenses,
        CanonicalMetric::DatabaseCount,
        CanonicalMetric::Fte,
        CanonicalMetric::InstitutionExpenses,
    ];

    pub fn key(self) -> &'static str {
        match self {
            CanonicalMetric::LibraryExpenses => "library_expenses",
            CanonicalMetric::DatabaseCount => "database_count",
            CanonicalMetric::Fte => "fte",
            CanonicalMetric::InstitutionExpenses => "institution_expenses",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            CanonicalMetric::LibraryExpenses => "Total library expenses",
            CanonicalMetric::DatabaseCount => "Number of databases",
            CanonicalMetric::Fte => "Full-time equivalent fall enrollment",
            CanonicalMetric::InstitutionExpenses => "Total expenses-Total amount",
        }
    }
}

impl fmt::Display for CanonicalMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CanonicalMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.key() == s)
            .ok_or_else(|| format!("unknown metric '{s}'"))
    }
}
