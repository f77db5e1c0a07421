//! Variable-title documentation (`IPEDS{span}TablesDoc.xlsx`, sheet `vartable{yy}`).
//!
//! Each year's workbook lists raw variable names (`varName`) and their
//! human-readable titles (`varTitle`). The yearly lists are consolidated into
//! one table that tracks how titles drift between releases.

use crate::domain::AcademicYear;
use crate::reconcile::{AliasTable, VariableNameMap};
use calamine::{open_workbook_auto, Data, Reader};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const VAR_NAME: &str = "varName";
pub const VAR_TITLE: &str = "varTitle";

#[derive(Debug, Error)]
pub enum TitlesError {
    #[error("cannot open workbook {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("sheet {sheet} not readable in {path}: {reason}")]
    Sheet {
        path: PathBuf,
        sheet: String,
        reason: String,
    },

    #[error("sheet {sheet} in {path} lacks varName/varTitle columns")]
    MissingColumns { path: PathBuf, sheet: String },
}

/// Documented variables for one survey year, in sheet order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearTitles {
    pub year: AcademicYear,
    pub entries: Vec<(String, String)>,
    /// Repeated `varName` rows dropped while reading.
    pub duplicates: usize,
}

impl YearTitles {
    /// Build from raw `(varName, varTitle)` rows; the first occurrence of a
    /// name wins and blank names are ignored.
    pub fn from_rows<I>(year: AcademicYear, rows: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut seen = BTreeSet::new();
        let mut entries = Vec::new();
        let mut duplicates = 0;
        for (name, title) in rows {
            let name = name.trim().to_string();
            if name.is_empty() {
                continue;
            }
            if !seen.insert(name.clone()) {
                duplicates += 1;
                continue;
            }
            entries.push((name, title.trim().to_string()));
        }
        Self {
            year,
            entries,
            duplicates,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) => Some(s.trim().to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Read one year's variable table from `dir`. A missing workbook yields
/// `Ok(None)` so callers can skip the year.
pub fn read_year_titles(dir: &Path, year: AcademicYear) -> Result<Option<YearTitles>, TitlesError> {
    let path = dir.join(year.tables_doc_file_name());
    if !path.is_file() {
        tracing::warn!(
            path = %path.display(),
            %year,
            "documentation workbook not found, skipping year"
        );
        return Ok(None);
    }
    read_workbook(&path, &year.vartable_sheet(), year).map(Some)
}

pub fn read_workbook(
    path: &Path,
    sheet: &str,
    year: AcademicYear,
) -> Result<YearTitles, TitlesError> {
    let mut workbook = open_workbook_auto(path).map_err(|source| TitlesError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| TitlesError::Sheet {
            path: path.to_path_buf(),
            sheet: sheet.to_string(),
            reason: e.to_string(),
        })?;

    let mut rows = range.rows();
    let header: Vec<Option<String>> = rows
        .next()
        .map(|r| r.iter().map(cell_text).collect())
        .unwrap_or_default();
    let position = |name: &str| header.iter().position(|h| h.as_deref() == Some(name));
    let (Some(name_col), Some(title_col)) = (position(VAR_NAME), position(VAR_TITLE)) else {
        return Err(TitlesError::MissingColumns {
            path: path.to_path_buf(),
            sheet: sheet.to_string(),
        });
    };

    let titles = YearTitles::from_rows(
        year,
        rows.filter_map(|row| {
            let name = row.get(name_col).and_then(cell_text)?;
            let title = row.get(title_col).and_then(cell_text).unwrap_or_default();
            Some((name, title))
        }),
    );
    if titles.duplicates > 0 {
        tracing::info!(
            %year,
            duplicates = titles.duplicates,
            "duplicate varName entries, keeping first occurrence"
        );
    }
    tracing::info!(%year, variables = titles.len(), "loaded variable titles");
    Ok(titles)
}

/// One variable across all documented years.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedTitle {
    /// 1-based, in first-seen order.
    pub id: u32,
    pub var_name: String,
    pub titles: BTreeMap<AcademicYear, String>,
    pub has_variations: bool,
    /// Title from the most recent year that documents the variable.
    pub current_title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidatedTitles {
    years: Vec<AcademicYear>,
    entries: Vec<ConsolidatedTitle>,
}

impl ConsolidatedTitles {
    pub fn build(years: &[YearTitles]) -> Self {
        let mut ordered: Vec<&YearTitles> = years.iter().collect();
        ordered.sort_by_key(|y| y.year);

        let mut index: HashMap<String, usize> = HashMap::new();
        let mut entries: Vec<ConsolidatedTitle> = Vec::new();
        // First-seen order follows the order the years were supplied.
        for doc in years {
            for (name, _) in &doc.entries {
                if index.contains_key(name) {
                    continue;
                }
                index.insert(name.clone(), entries.len());
                entries.push(ConsolidatedTitle {
                    id: entries.len() as u32 + 1,
                    var_name: name.clone(),
                    titles: BTreeMap::new(),
                    has_variations: false,
                    current_title: None,
                });
            }
        }
        for doc in &ordered {
            for (name, title) in &doc.entries {
                if let Some(&i) = index.get(name) {
                    entries[i].titles.insert(doc.year, title.clone());
                }
            }
        }
        for entry in &mut entries {
            let distinct: BTreeSet<&str> = entry.titles.values().map(String::as_str).collect();
            entry.has_variations = distinct.len() > 1;
            entry.current_title = entry.titles.values().next_back().cloned();
        }

        Self {
            years: ordered.iter().map(|y| y.year).collect(),
            entries,
        }
    }

    pub fn years(&self) -> &[AcademicYear] {
        &self.years
    }

    pub fn entries(&self) -> &[ConsolidatedTitle] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn variations(&self) -> usize {
        self.entries.iter().filter(|e| e.has_variations).count()
    }

    pub fn current_title(&self, var_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.var_name == var_name)
            .and_then(|e| e.current_title.as_deref())
    }

    /// Per-year raw field -> canonical metric mapping for the documented
    /// variables that are known aliases.
    pub fn name_map(&self, aliases: &AliasTable) -> VariableNameMap {
        let mut map = VariableNameMap::new();
        for &year in &self.years {
            let documented = self
                .entries
                .iter()
                .filter_map(|e| e.titles.get(&year).map(|t| (e.var_name.as_str(), t.as_str())));
            map.add_year(year, documented, aliases);
        }
        map
    }
}
