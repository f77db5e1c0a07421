//! Annual survey database import into the local store.
//!
//! For each configured year the release database (`IPEDS{span}.accdb`) is
//! opened, the fall enrollment, library, derived library, finance and
//! directory tables are pulled, reduced to registered institutions, and
//! written to the store.

use crate::store::Store;
use anyhow::{Context, Result};
use ipedslab_core::data::{DataError, Table, TableKind, TableSource, INSTNM, UNITID};
use ipedslab_core::domain::AcademicYear;
use ipedslab_core::Registry;
use std::path::{Path, PathBuf};

/// Tables pulled from each release, in extraction order.
pub const IMPORT_KINDS: [TableKind; 5] = [
    TableKind::Drvef,
    TableKind::Al,
    TableKind::Drval,
    TableKind::Finance,
    TableKind::Hd,
];

/// What happened to one survey year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YearStatus {
    Imported {
        /// (stored table name, rows)
        tables: Vec<(String, usize)>,
        missing_tables: Vec<String>,
    },
    MissingFile(PathBuf),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearImport {
    pub year: AcademicYear,
    pub status: YearStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub years: Vec<YearImport>,
}

impl ImportSummary {
    pub fn imported_years(&self) -> Vec<AcademicYear> {
        self.years
            .iter()
            .filter(|y| matches!(y.status, YearStatus::Imported { .. }))
            .map(|y| y.year)
            .collect()
    }

    pub fn tables_written(&self) -> usize {
        self.years
            .iter()
            .map(|y| match &y.status {
                YearStatus::Imported { tables, .. } => tables.len(),
                _ => 0,
            })
            .sum()
    }
}

/// Tables extracted from one release, already filtered to the registry.
#[derive(Debug, Clone)]
pub struct YearExtract {
    pub tables: Vec<Table>,
    pub missing: Vec<String>,
}

/// Pull the tables of interest from one release.
pub fn extract_year(
    source: &dyn TableSource,
    year: AcademicYear,
    registry: &Registry,
) -> Result<YearExtract, DataError> {
    // Listing tables up front surfaces an unreadable database before any reads.
    let available = source.table_names()?;
    tracing::debug!(source = %source.label(), tables = available.len(), "opened release");

    let mut extract = YearExtract {
        tables: Vec::new(),
        missing: Vec::new(),
    };
    for kind in IMPORT_KINDS {
        let name = kind.table_name(year);
        let table = match source.read_table_if_present(&name) {
            Ok(Some(table)) => table,
            Ok(None) => {
                tracing::warn!(%year, table = %name, "table not found in release, skipping");
                extract.missing.push(name);
                continue;
            }
            Err(e) => {
                tracing::warn!(%year, table = %name, "cannot read table, skipping: {e}");
                extract.missing.push(name);
                continue;
            }
        };
        let read = table.len();
        let mut table = table.filter_unit_ids(registry);
        if kind == TableKind::Hd {
            table = table.project(&[UNITID, INSTNM]);
        }
        tracing::info!(%year, table = %table.name, read, kept = table.len(), "extracted");
        extract.tables.push(table);
    }
    Ok(extract)
}

/// Years in `years` whose release file exists under `input_dir`.
pub fn present_release_years(input_dir: &Path, years: &[AcademicYear]) -> Vec<AcademicYear> {
    years
        .iter()
        .copied()
        .filter(|y| input_dir.join(y.accdb_file_name()).is_file())
        .collect()
}

/// Import every year whose release file exists under `input_dir`.
///
/// `open` turns a release path into a table source; a missing file skips the
/// year and an unreadable one is recorded as failed.
pub fn import_releases<S, F>(
    input_dir: &Path,
    years: &[AcademicYear],
    registry: &Registry,
    store: &mut Store,
    open: F,
) -> Result<ImportSummary>
where
    S: TableSource,
    F: Fn(&Path) -> Result<S, DataError>,
{
    let mut summary = ImportSummary::default();
    for &year in years {
        let path = input_dir.join(year.accdb_file_name());
        if !path.is_file() {
            tracing::warn!(
                %year,
                path = %path.display(),
                "release file not found, skipping year"
            );
            summary.years.push(YearImport {
                year,
                status: YearStatus::MissingFile(path),
            });
            continue;
        }

        let extract = match open(&path).and_then(|src| extract_year(&src, year, registry)) {
            Ok(extract) => extract,
            Err(e) => {
                tracing::error!(%year, path = %path.display(), "cannot read release: {e}");
                summary.years.push(YearImport {
                    year,
                    status: YearStatus::Failed(e.to_string()),
                });
                continue;
            }
        };

        let mut tables = Vec::with_capacity(extract.tables.len());
        for table in &extract.tables {
            let rows = store
                .write_table(table)
                .with_context(|| format!("failed to store {} for {year}", table.name))?;
            tables.push((table.name.to_ascii_lowercase(), rows));
        }
        tracing::info!(%year, tables = tables.len(), "completed year");
        summary.years.push(YearImport {
            year,
            status: YearStatus::Imported {
                tables,
                missing_tables: extract.missing,
            },
        });
    }
    Ok(summary)
}
