use super::aliases::AliasTable;
use crate::domain::{AcademicYear, CanonicalMetric};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One documented raw field for a survey year and the metric it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableNameEntry {
    pub year: AcademicYear,
    pub raw_field: String,
    pub metric: CanonicalMetric,
    pub title: String,
}

/// Per-year raw field -> canonical metric mapping, built from each year's
/// variable documentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableNameMap {
    by_year: BTreeMap<AcademicYear, Vec<VariableNameEntry>>,
}

impl VariableNameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build entries for one year from `(varName, varTitle)` pairs. Only
    /// fields that are known aliases of a canonical metric are kept, each at
    /// most once per year (first occurrence wins).
    pub fn add_year<'a, I>(&mut self, year: AcademicYear, documented: I, aliases: &AliasTable)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let entries = self.by_year.entry(year).or_default();
        for (raw, title) in documented {
            let Some(metric) = aliases.lookup(raw) else {
                continue;
            };
            if entries.iter().any(|e| e.raw_field.eq_ignore_ascii_case(raw)) {
                continue;
            }
            entries.push(VariableNameEntry {
                year,
                raw_field: raw.to_string(),
                metric,
                title: title.to_string(),
            });
        }
    }

    /// Insert an already-resolved entry (e.g. loaded back from the store).
    pub fn insert(&mut self, entry: VariableNameEntry) {
        let entries = self.by_year.entry(entry.year).or_default();
        if !entries
            .iter()
            .any(|e| e.raw_field.eq_ignore_ascii_case(&entry.raw_field))
        {
            entries.push(entry);
        }
    }

    pub fn has_year(&self, year: AcademicYear) -> bool {
        self.by_year.contains_key(&year)
    }

    pub fn years(&self) -> Vec<AcademicYear> {
        self.by_year.keys().copied().collect()
    }

    pub fn entries_for(&self, year: AcademicYear) -> &[VariableNameEntry] {
        self.by_year.get(&year).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn entries(&self) -> impl Iterator<Item = &VariableNameEntry> {
        self.by_year.values().flatten()
    }

    pub fn lookup(&self, year: AcademicYear, raw: &str) -> Option<&VariableNameEntry> {
        self.entries_for(year)
            .iter()
            .find(|e| e.raw_field.eq_ignore_ascii_case(raw))
    }

    pub fn is_empty(&self) -> bool {
        self.by_year.values().all(|v| v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_known_aliases_once() {
        let mut map = VariableNameMap::new();
        let year = AcademicYear(2021);
        map.add_year(
            year,
            [
                ("UNITID", "Unique identification number"),
                ("FTE", "Full-time equivalent fall enrollment"),
                ("LEXPTOT", "Total expenditures"),
                ("fte", "duplicate in lower case"),
            ],
            &AliasTable::standard(),
        );

        let entries = map.entries_for(year);
        assert_eq!(entries.len(), 2);
        assert_eq!(map.lookup(year, "fte").unwrap().title, "Full-time equivalent fall enrollment");
        assert_eq!(map.lookup(year, "lexptot").unwrap().metric, CanonicalMetric::LibraryExpenses);
        assert!(map.lookup(AcademicYear(2020), "FTE").is_none());
    }
}
