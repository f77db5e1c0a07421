//! Variable-titles import: per-year documentation workbooks -> store.

use crate::store::Store;
use anyhow::{bail, Context, Result};
use ipedslab_core::domain::AcademicYear;
use ipedslab_core::reconcile::AliasTable;
use ipedslab_core::titles::{read_year_titles, ConsolidatedTitles, YearTitles};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitlesSummary {
    pub loaded_years: Vec<AcademicYear>,
    pub skipped_years: Vec<AcademicYear>,
    pub variables: usize,
    pub variations: usize,
    pub name_map_entries: usize,
    /// First few `(varName, current title)` pairs for display.
    pub sample: Vec<(String, String)>,
}

/// Read every year's workbook that exists, consolidate, and store the
/// `variable_titles` table, its lookup view and the variable name map.
pub fn import_titles(
    docs_dir: &Path,
    years: &[AcademicYear],
    aliases: &AliasTable,
    store: &mut Store,
) -> Result<TitlesSummary> {
    let mut docs: Vec<YearTitles> = Vec::new();
    let mut skipped = Vec::new();
    for &year in years {
        match read_year_titles(docs_dir, year) {
            Ok(Some(doc)) => docs.push(doc),
            Ok(None) => skipped.push(year),
            Err(e) => {
                tracing::warn!(%year, "skipping documentation: {e}");
                skipped.push(year);
            }
        }
    }
    if docs.is_empty() {
        bail!(
            "no variable documentation loaded from {} (expected files like {})",
            docs_dir.display(),
            years
                .first()
                .map(|y| y.tables_doc_file_name())
                .unwrap_or_default()
        );
    }

    let titles = ConsolidatedTitles::build(&docs);
    tracing::info!(
        variables = titles.len(),
        variations = titles.variations(),
        "consolidated titles"
    );
    store
        .write_variable_titles(&titles)
        .context("failed to save variable titles")?;

    let map = titles.name_map(aliases);
    let name_map_entries = store
        .write_name_map(&map)
        .context("failed to save variable name map")?;

    Ok(TitlesSummary {
        loaded_years: docs.iter().map(|d| d.year).collect(),
        skipped_years: skipped,
        variables: titles.len(),
        variations: titles.variations(),
        name_map_entries,
        sample: titles
            .entries()
            .iter()
            .take(10)
            .map(|e| (e.var_name.clone(), e.current_title.clone().unwrap_or_default()))
            .collect(),
    })
}
