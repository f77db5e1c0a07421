//! In-memory tables read from structured database files.

use super::provider::{DataError, RawRecord};
use crate::domain::{AcademicYear, UnitId};
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the institution key column in every IPEDS table.
pub const UNITID: &str = "UNITID";
/// Institution name column in the directory (HD) table.
pub const INSTNM: &str = "INSTNM";

/// A single table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    /// Type a text value from a delimited export: integers, then reals,
    /// empty strings become `Null`.
    pub fn infer(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Cell::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return Cell::Real(f);
            }
        }
        Cell::Text(raw.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Real(f) => Some(*f),
            Cell::Text(s) => s.trim().replace(',', "").parse().ok(),
            Cell::Null => None,
        }
    }

    pub fn as_unit_id(&self) -> Option<UnitId> {
        match self {
            Cell::Int(i) => u32::try_from(*i).ok().map(UnitId),
            Cell::Real(f) => UnitId::from_f64(*f),
            Cell::Text(s) => s.parse().ok(),
            Cell::Null => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Null => serde_json::Value::Null,
            Cell::Int(i) => serde_json::Value::from(*i),
            Cell::Real(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Cell::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Real(v) => write!(f, "{v}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// A named table: column headers plus rows of cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Index of a column, compared case-insensitively.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep only rows whose `UNITID` belongs to the registry.
    ///
    /// Tables without a `UNITID` column are returned unchanged.
    pub fn filter_unit_ids(mut self, registry: &Registry) -> Self {
        if let Some(idx) = self.column_index(UNITID) {
            self.rows.retain(|row| {
                row.get(idx)
                    .and_then(Cell::as_unit_id)
                    .is_some_and(|id| registry.contains(id))
            });
        }
        self
    }

    /// Keep only the named columns (in the order given). Missing names are skipped.
    pub fn project(self, columns: &[&str]) -> Self {
        let indices: Vec<usize> = columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();
        let new_columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|&i| row.get(i).cloned().unwrap_or(Cell::Null))
                    .collect()
            })
            .collect();
        Self {
            name: self.name,
            columns: new_columns,
            rows,
        }
    }

    /// Unit id of a row, if the table has a key column.
    pub fn row_unit_id(&self, row: &[Cell]) -> Option<UnitId> {
        self.column_index(UNITID)
            .and_then(|idx| row.get(idx))
            .and_then(Cell::as_unit_id)
    }

    /// Convert a row into a raw record for the reconciler.
    pub fn row_record(&self, row: &[Cell]) -> RawRecord {
        self.columns
            .iter()
            .zip(row.iter())
            .map(|(c, v)| (c.clone(), v.to_json()))
            .collect()
    }

    /// Distinct unit ids present in the table.
    pub fn distinct_unit_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self
            .rows
            .iter()
            .filter_map(|r| self.row_unit_id(r))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// A read-only source of named tables (one database file).
pub trait TableSource {
    /// Human-readable label for log messages.
    fn label(&self) -> String;

    fn table_names(&self) -> Result<Vec<String>, DataError>;

    fn read_table(&self, name: &str) -> Result<Table, DataError>;

    /// Read a table if it exists (name compared case-insensitively).
    fn read_table_if_present(&self, name: &str) -> Result<Option<Table>, DataError> {
        let names = self.table_names()?;
        match names.iter().find(|n| n.eq_ignore_ascii_case(name)) {
            Some(actual) => self.read_table(actual).map(Some),
            None => Ok(None),
        }
    }
}

/// Kinds of IPEDS survey tables the pipelines care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TableKind {
    /// Derived fall enrollment (FTE).
    Drvef,
    /// Academic libraries.
    Al,
    /// Derived academic library variables.
    Drval,
    /// Finance (F2 form).
    Finance,
    /// Institutional directory.
    Hd,
}

impl TableKind {
    pub const DATA: [TableKind; 4] = [
        TableKind::Drvef,
        TableKind::Al,
        TableKind::Drval,
        TableKind::Finance,
    ];

    /// Short upper-case label used in report column names.
    pub fn label(self) -> &'static str {
        match self {
            TableKind::Drvef => "DRVEF",
            TableKind::Al => "AL",
            TableKind::Drval => "DRVAL",
            TableKind::Finance => "F",
            TableKind::Hd => "HD",
        }
    }

    /// Table name for a survey year, in the casing used by the distributed files.
    pub fn table_name(self, year: AcademicYear) -> String {
        match self {
            TableKind::Finance => year.finance_table(),
            other => format!("{}{}", other.label(), year),
        }
    }
}

/// A table name classified into kind and survey year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurveyTable {
    pub kind: TableKind,
    pub year: AcademicYear,
}

impl SurveyTable {
    /// Classify names such as `DRVEF2019`, `al2020`, `HD2022` or `f2223_f2`.
    pub fn parse(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();

        if let Some(rest) = lower.strip_prefix('f') {
            if let Some(span) = rest.strip_suffix("_f2") {
                if span.len() == 4 && span.chars().all(|c| c.is_ascii_digit()) {
                    let end: i32 = span[2..].parse().ok()?;
                    return Some(Self {
                        kind: TableKind::Finance,
                        year: AcademicYear(2000 + end),
                    });
                }
            }
            return None;
        }

        // Longest prefixes first so `drval` is not mistaken for something shorter.
        let kinds = [
            ("drvef", TableKind::Drvef),
            ("drval", TableKind::Drval),
            ("al", TableKind::Al),
            ("hd", TableKind::Hd),
        ];
        for (prefix, kind) in kinds {
            if let Some(rest) = lower.strip_prefix(prefix) {
                if rest.len() == 4 && rest.chars().all(|c| c.is_ascii_digit()) {
                    return Some(Self {
                        kind,
                        year: AcademicYear(rest.parse().ok()?),
                    });
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut t = Table::new(
            "DRVEF2020",
            vec!["UNITID".into(), "FTE".into(), "NOTE".into()],
        );
        t.rows.push(vec![Cell::Int(156189), Cell::Int(600), Cell::Null]);
        t.rows.push(vec![Cell::Real(100654.0), Cell::Int(9000), Cell::Text("x".into())]);
        t.rows.push(vec![Cell::Text("156295".into()), Cell::Real(1600.5), Cell::Null]);
        t
    }

    #[test]
    fn infer_types_cells() {
        assert_eq!(Cell::infer(""), Cell::Null);
        assert_eq!(Cell::infer("42"), Cell::Int(42));
        assert_eq!(Cell::infer("4.5"), Cell::Real(4.5));
        assert_eq!(Cell::infer("Berea"), Cell::Text("Berea".into()));
        assert_eq!(Cell::Text("1,234".into()).as_f64(), Some(1234.0));
    }

    #[test]
    fn filter_keeps_registry_members_only() {
        let t = sample().filter_unit_ids(&Registry::consortium());
        assert_eq!(t.len(), 2);
        assert_eq!(t.distinct_unit_ids(), vec![UnitId(156189), UnitId(156295)]);
    }

    #[test]
    fn project_reorders_and_skips_unknown() {
        let t = sample().project(&["fte", "UNITID", "MISSING"]);
        assert_eq!(t.columns, vec!["FTE".to_string(), "UNITID".to_string()]);
        assert_eq!(t.rows[0], vec![Cell::Int(600), Cell::Int(156189)]);
    }

    #[test]
    fn parses_survey_table_names() {
        assert_eq!(
            SurveyTable::parse("DRVEF2019"),
            Some(SurveyTable { kind: TableKind::Drvef, year: AcademicYear(2019) })
        );
        assert_eq!(
            SurveyTable::parse("drval2021").map(|t| t.kind),
            Some(TableKind::Drval)
        );
        assert_eq!(
            SurveyTable::parse("f2223_f2"),
            Some(SurveyTable { kind: TableKind::Finance, year: AcademicYear(2023) })
        );
        assert_eq!(SurveyTable::parse("hd2022").map(|t| t.kind), Some(TableKind::Hd));
        assert_eq!(SurveyTable::parse("variable_titles"), None);
        assert_eq!(SurveyTable::parse("flags2020"), None);
    }

    #[test]
    fn table_names_round_trip_through_parse() {
        let year = AcademicYear(2022);
        for kind in [
            TableKind::Drvef,
            TableKind::Al,
            TableKind::Drval,
            TableKind::Finance,
            TableKind::Hd,
        ] {
            let parsed = SurveyTable::parse(&kind.table_name(year)).unwrap();
            assert_eq!(parsed.kind, kind);
            assert_eq!(parsed.year, year);
        }
    }
}
