use crate::domain::CanonicalMetric;

/// Priority-ordered raw field names for each canonical metric.
///
/// Earlier aliases win. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    entries: Vec<(CanonicalMetric, Vec<String>)>,
}

impl AliasTable {
    /// Field names seen across the API and the annual database releases.
    pub fn standard() -> Self {
        let raw: [(CanonicalMetric, &[&str]); 4] = [
            (
                CanonicalMetric::LibraryExpenses,
                &["total_expenses", "ltotexpn", "LEXPTOT"],
            ),
            (
                CanonicalMetric::DatabaseCount,
                &["database_count", "ldbs", "LDBS"],
            ),
            (CanonicalMetric::Fte, &["fte", "fte_total", "efytotlt", "FTE"]),
            (
                CanonicalMetric::InstitutionExpenses,
                &["F2E131", "f2e131", "total_expenses_institution"],
            ),
        ];
        Self {
            entries: raw
                .into_iter()
                .map(|(m, names)| (m, names.iter().map(|s| s.to_string()).collect()))
                .collect(),
        }
    }

    pub fn new(entries: Vec<(CanonicalMetric, Vec<String>)>) -> Self {
        Self { entries }
    }

    pub fn aliases(&self, metric: CanonicalMetric) -> &[String] {
        self.entries
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, names)| names.as_slice())
            .unwrap_or(&[])
    }

    /// Canonical metric for a raw field, if it is a known alias.
    ///
    /// Exact-case matches are preferred over case-insensitive ones.
    pub fn lookup(&self, raw: &str) -> Option<CanonicalMetric> {
        let exact = self
            .entries
            .iter()
            .find(|(_, names)| names.iter().any(|n| n == raw))
            .map(|(m, _)| *m);
        exact.or_else(|| {
            self.entries
                .iter()
                .find(|(_, names)| names.iter().any(|n| n.eq_ignore_ascii_case(raw)))
                .map(|(m, _)| *m)
        })
    }

    /// Position of `raw` in the metric's priority list (case-insensitive).
    pub fn priority(&self, metric: CanonicalMetric, raw: &str) -> Option<usize> {
        self.aliases(metric)
            .iter()
            .position(|n| n.eq_ignore_ascii_case(raw))
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::standard()
    }
}
