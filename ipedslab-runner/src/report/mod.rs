//! Spreadsheet reports built from the local store and Data Center exports.
//!
//! - Library report: wide table of every selected survey variable
//! - FTE & expenses report: FTE, total expenses and expenses per FTE
//! - Availability summary: institutions per table kind and year

pub mod fte;
pub mod library;
pub mod summary;
pub mod xlsx;

use anyhow::{Context, Result};
use ipedslab_core::data::{Cell, SurveyTable, TableKind};
use ipedslab_core::domain::AcademicYear;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::export::unique_artifact_path;

pub const UNITID_HEADER: &str = "UNITID";
pub const NAME_HEADER: &str = "Institution Name";

/// One report cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportCell {
    Empty,
    Number(f64),
    Text(String),
}

impl From<&Cell> for ReportCell {
    fn from(cell: &Cell) -> Self {
        match cell {
            Cell::Null => ReportCell::Empty,
            Cell::Int(i) => ReportCell::Number(*i as f64),
            Cell::Real(f) => ReportCell::Number(*f),
            Cell::Text(s) if s.trim().is_empty() => ReportCell::Empty,
            Cell::Text(s) => ReportCell::Text(s.clone()),
        }
    }
}

impl From<Option<f64>> for ReportCell {
    fn from(v: Option<f64>) -> Self {
        v.map(ReportCell::Number).unwrap_or(ReportCell::Empty)
    }
}

impl From<Option<&str>> for ReportCell {
    fn from(v: Option<&str>) -> Self {
        v.map(|s| ReportCell::Text(s.to_string()))
            .unwrap_or(ReportCell::Empty)
    }
}

impl fmt::Display for ReportCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportCell::Empty => Ok(()),
            ReportCell::Number(n) => write!(f, "{n}"),
            ReportCell::Text(s) => f.write_str(s),
        }
    }
}

/// A rectangular report: header row plus data rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportTable {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<ReportCell>>,
}

impl ReportTable {
    pub fn new(title: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            title: title.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&ReportCell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Which report files to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportLayout {
    /// All years in one file.
    Combined,
    /// One file per year.
    PerYear,
    Both,
}

impl ReportLayout {
    pub fn combined(self) -> bool {
        matches!(self, ReportLayout::Combined | ReportLayout::Both)
    }

    pub fn per_year(self) -> bool {
        matches!(self, ReportLayout::PerYear | ReportLayout::Both)
    }
}

/// `varName -> title`; unknown variables keep their raw name.
#[derive(Debug, Clone, Default)]
pub struct TitleLookup {
    titles: HashMap<String, String>,
}

impl TitleLookup {
    pub fn new(titles: HashMap<String, String>) -> Self {
        Self { titles }
    }

    pub fn title<'a>(&'a self, var_name: &'a str) -> &'a str {
        self.titles
            .get(var_name)
            .map(String::as_str)
            .unwrap_or(var_name)
    }
}

/// Variables kept in the library report, by table kind.
pub fn include_variable(kind: TableKind, var_name: &str) -> bool {
    match kind {
        TableKind::Drvef => var_name.eq_ignore_ascii_case("FTE"),
        TableKind::Finance => var_name.eq_ignore_ascii_case("F2E131"),
        TableKind::Al | TableKind::Drval | TableKind::Hd => true,
    }
}

/// Human-readable description of [`include_variable`].
pub fn filter_descriptions() -> Vec<String> {
    TableKind::DATA
        .iter()
        .map(|kind| match kind {
            TableKind::Drvef => "DRVEF: only FTE".to_string(),
            TableKind::Finance => "F: only F2E131".to_string(),
            other => format!("{}: all variables", other.label()),
        })
        .collect()
}

/// Header that does not collide with earlier ones: a repeated title gets the
/// raw variable name appended.
pub(crate) fn unique_header(used: &mut BTreeSet<String>, header: String, var_name: &str) -> String {
    if used.insert(header.clone()) {
        return header;
    }
    let mut candidate = format!("{header} ({var_name})");
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{header} ({var_name} {n})");
        n += 1;
    }
    candidate
}

/// Survey tables in a list of table names, grouped by year.
pub(crate) fn survey_tables(
    names: &[String],
) -> BTreeMap<AcademicYear, Vec<(SurveyTable, String)>> {
    let mut out: BTreeMap<AcademicYear, Vec<(SurveyTable, String)>> = BTreeMap::new();
    for name in names {
        if let Some(t) = SurveyTable::parse(name) {
            out.entry(t.year).or_default().push((t, name.clone()));
        }
    }
    out
}

/// Write the combined and per-year reports as timestamped workbooks:
/// `{prefix}_Combined_{stamp}.xlsx` and `{prefix}_{year}_{stamp}.xlsx`.
pub fn save_reports(
    combined: Option<&ReportTable>,
    per_year: &BTreeMap<AcademicYear, ReportTable>,
    output_dir: &Path,
    prefix: &str,
    stamp: &str,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let mut saved = Vec::new();
    if let Some(table) = combined {
        let path = unique_artifact_path(output_dir, &format!("{prefix}_Combined_{stamp}"), "xlsx");
        xlsx::write_report(table, &path)?;
        tracing::info!(path = %path.display(), "saved combined report");
        saved.push(path);
    }
    for (year, table) in per_year {
        let path = unique_artifact_path(output_dir, &format!("{prefix}_{year}_{stamp}"), "xlsx");
        xlsx::write_report(table, &path)?;
        tracing::info!(%year, path = %path.display(), "saved year report");
        saved.push(path);
    }
    Ok(saved)
}
