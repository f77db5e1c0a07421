//! Wide library report: one row per institution, one column per selected
//! survey variable.
//!
//! Combined headers read `"{year} - {TYPE} - {title}"`, per-year headers
//! `"{TYPE} - {title}"`. Rows are left-joined onto the institution list by
//! unit id.

use super::{
    include_variable, survey_tables, unique_header, ReportCell, ReportTable, TitleLookup,
    NAME_HEADER, UNITID_HEADER,
};
use ipedslab_core::data::{DataError, SurveyTable, Table, TableKind, TableSource, INSTNM, UNITID};
use ipedslab_core::domain::{AcademicYear, UnitId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

type Institutions = Vec<(UnitId, Option<String>)>;

/// Institutions from a directory table, sorted by unit id.
fn institutions_from_directory(table: &Table) -> Institutions {
    let name_idx = table.column_index(INSTNM);
    let mut seen = BTreeMap::new();
    for row in &table.rows {
        let Some(id) = table.row_unit_id(row) else {
            continue;
        };
        let name = name_idx.and_then(|i| row.get(i)).and_then(|c| c.as_text());
        seen.entry(id).or_insert(name);
    }
    seen.into_iter().collect()
}

fn institutions_without_names(table: &Table) -> Institutions {
    table.distinct_unit_ids().into_iter().map(|id| (id, None)).collect()
}

struct WideBuilder<'a> {
    institutions: Institutions,
    titles: &'a TitleLookup,
    used: BTreeSet<String>,
    columns: Vec<(String, Vec<ReportCell>)>,
}

impl<'a> WideBuilder<'a> {
    fn new(institutions: Institutions, titles: &'a TitleLookup) -> Self {
        let used = [UNITID_HEADER, NAME_HEADER].iter().map(|s| s.to_string()).collect();
        Self {
            institutions,
            titles,
            used,
            columns: Vec::new(),
        }
    }

    /// Left-join the selected variables of `table` onto the institution list.
    fn add_table(&mut self, table: &Table, kind: TableKind, header_prefix: &str) -> usize {
        let mut by_unit: HashMap<UnitId, usize> = HashMap::new();
        for (i, row) in table.rows.iter().enumerate() {
            if let Some(id) = table.row_unit_id(row) {
                by_unit.entry(id).or_insert(i);
            }
        }

        let mut included = 0;
        for (col, var_name) in table.columns.iter().enumerate() {
            if var_name.eq_ignore_ascii_case(UNITID) || !include_variable(kind, var_name) {
                continue;
            }
            included += 1;
            let title = self.titles.title(var_name);
            let header = format!("{header_prefix}{} - {title}", kind.label());
            let header = unique_header(&mut self.used, header, var_name);
            let values = self
                .institutions
                .iter()
                .map(|(id, _)| {
                    by_unit
                        .get(id)
                        .and_then(|&r| table.rows[r].get(col))
                        .map(ReportCell::from)
                        .unwrap_or(ReportCell::Empty)
                })
                .collect();
            self.columns.push((header, values));
        }
        included
    }

    fn finish(self, title: String) -> ReportTable {
        let mut headers = vec![UNITID_HEADER.to_string(), NAME_HEADER.to_string()];
        headers.extend(self.columns.iter().map(|(h, _)| h.clone()));
        let mut report = ReportTable::new(title, headers);
        for (i, (id, name)) in self.institutions.iter().enumerate() {
            let mut row = vec![
                ReportCell::Number(id.get() as f64),
                ReportCell::from(name.as_deref()),
            ];
            row.extend(self.columns.iter().map(|(_, values)| values[i].clone()));
            report.rows.push(row);
        }
        report
    }
}

fn is_data(kind: TableKind) -> bool {
    TableKind::DATA.contains(&kind)
}

/// Data tables sorted by lower-cased name.
fn sorted_data_tables<'a, I>(tables: I) -> Vec<(SurveyTable, String)>
where
    I: IntoIterator<Item = &'a (SurveyTable, String)>,
{
    let mut out: Vec<(SurveyTable, String)> = tables
        .into_iter()
        .filter(|(t, _)| is_data(t.kind))
        .cloned()
        .collect();
    out.sort_by_key(|(_, name)| name.to_ascii_lowercase());
    out
}

/// All years in one table. Institutions come from the most recent directory
/// table, or from the first data table when no directory was imported.
pub fn combined_report(
    source: &dyn TableSource,
    titles: &TitleLookup,
) -> Result<ReportTable, DataError> {
    let grouped = survey_tables(&source.table_names()?);
    let all: Vec<(SurveyTable, String)> = grouped.values().flatten().cloned().collect();
    let data_tables = sorted_data_tables(&all);

    let latest_hd = all
        .iter()
        .filter(|(t, _)| t.kind == TableKind::Hd)
        .max_by_key(|(t, _)| t.year);
    let institutions = match (latest_hd, data_tables.first()) {
        (Some((_, name)), _) => {
            tracing::info!(table = %name, "institution names from directory table");
            institutions_from_directory(&source.read_table(name)?)
        }
        (None, Some((_, name))) => {
            tracing::warn!("no directory table, using unit ids without names");
            institutions_without_names(&source.read_table(name)?)
        }
        (None, None) => Vec::new(),
    };

    let mut builder = WideBuilder::new(institutions, titles);
    for (t, name) in &data_tables {
        let table = source.read_table(name)?;
        let included = builder.add_table(&table, t.kind, &format!("{} - ", t.year));
        tracing::debug!(table = %name, included, "added variables");
    }
    let report = builder.finish("Combined".into());
    tracing::info!(
        rows = report.len(),
        columns = report.columns.len(),
        "combined library report"
    );
    Ok(report)
}

/// One table per survey year.
pub fn year_reports(
    source: &dyn TableSource,
    titles: &TitleLookup,
) -> Result<BTreeMap<AcademicYear, ReportTable>, DataError> {
    let grouped = survey_tables(&source.table_names()?);
    let mut reports = BTreeMap::new();
    for (year, tables) in &grouped {
        let data_tables = sorted_data_tables(tables);
        let hd = tables.iter().find(|(t, _)| t.kind == TableKind::Hd);
        let institutions = match (hd, data_tables.first()) {
            (Some((_, name)), _) => institutions_from_directory(&source.read_table(name)?),
            (None, Some((_, name))) => institutions_without_names(&source.read_table(name)?),
            (None, None) => continue,
        };

        let mut builder = WideBuilder::new(institutions, titles);
        for (t, name) in &data_tables {
            let table = source.read_table(name)?;
            builder.add_table(&table, t.kind, "");
        }
        let report = builder.finish(year.to_string());
        tracing::info!(
            %year,
            rows = report.len(),
            columns = report.columns.len(),
            "year library report"
        );
        reports.insert(*year, report);
    }
    Ok(reports)
}
