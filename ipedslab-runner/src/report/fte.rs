//! Member FTE and total expenses report.
//!
//! Values come from the store's fall enrollment and finance tables, resolved
//! through the schema reconciler. A Data Center export for a year replaces
//! that year's store values wholesale.

use super::{ReportCell, ReportTable, NAME_HEADER, UNITID_HEADER};
use ipedslab_core::data::{datacenter, DataError, SurveyTable, TableKind, TableSource, INSTNM};
use ipedslab_core::domain::{
    per_fte, AcademicYear, CanonicalMetric, DataSource, ObservationSet, UnitId,
};
use ipedslab_core::reconcile::SchemaReconciler;
use ipedslab_core::Registry;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

pub const FTE_COLUMN: &str = "DRVEF - Full-time equivalent fall enrollment";
pub const EXPENSES_COLUMN: &str = "F - Total expenses-Total amount";
pub const PER_FTE_COLUMN: &str = "Expenses per FTE";

/// FTE and total expenses for every available year, with names.
#[derive(Debug, Clone, Default)]
pub struct FteData {
    pub observations: ObservationSet,
    /// Which source supplied each year.
    pub sources: BTreeMap<AcademicYear, DataSource>,
    pub exports: BTreeMap<AcademicYear, PathBuf>,
}

impl FteData {
    pub fn years(&self) -> Vec<AcademicYear> {
        self.sources.keys().copied().collect()
    }

    /// Years that have fall enrollment or finance tables in `source`.
    pub fn store_years(source: &dyn TableSource) -> Result<Vec<AcademicYear>, DataError> {
        let years: BTreeSet<AcademicYear> = source
            .table_names()?
            .iter()
            .filter_map(|n| SurveyTable::parse(n))
            .filter(|t| matches!(t.kind, TableKind::Drvef | TableKind::Finance))
            .map(|t| t.year)
            .collect();
        Ok(years.into_iter().collect())
    }

    /// Load FTE and total expenses from imported survey tables.
    pub fn from_store(
        source: &dyn TableSource,
        registry: &Registry,
        reconciler: &SchemaReconciler,
    ) -> Result<Self, DataError> {
        let mut data = FteData::default();
        let names = source.table_names()?;
        let mut tables: Vec<SurveyTable> =
            names.iter().filter_map(|n| SurveyTable::parse(n)).collect();
        tables.sort();

        for t in &tables {
            let metric = match t.kind {
                TableKind::Drvef => CanonicalMetric::Fte,
                TableKind::Finance => CanonicalMetric::InstitutionExpenses,
                _ => continue,
            };
            let Some(name) = names.iter().find(|n| SurveyTable::parse(n) == Some(*t)) else {
                continue;
            };
            let table = source.read_table(name)?.filter_unit_ids(registry);
            for row in &table.rows {
                let Some(unit_id) = table.row_unit_id(row) else {
                    continue;
                };
                let normalized = reconciler.reconcile(t.year, &table.row_record(row));
                let source = DataSource::SqliteStore;
                for obs in normalized.observations(unit_id, &[metric], source, None) {
                    if let Err(e) = data.observations.insert(obs) {
                        tracing::warn!(table = %name, "{e}");
                    }
                }
            }
            data.sources.insert(t.year, DataSource::SqliteStore);
            tracing::debug!(table = %name, rows = table.len(), "loaded {}", metric.key());
        }

        // Most recent directory table names the institutions.
        if let Some(hd) = tables.iter().filter(|t| t.kind == TableKind::Hd).max_by_key(|t| t.year) {
            if let Some(name) = names.iter().find(|n| SurveyTable::parse(n) == Some(*hd)) {
                let table = source.read_table(name)?;
                if let Some(idx) = table.column_index(INSTNM) {
                    for row in &table.rows {
                        let name = row.get(idx).and_then(|c| c.as_text());
                        if let (Some(id), Some(n)) = (table.row_unit_id(row), name) {
                            data.observations.note_name(id, &n);
                        }
                    }
                }
            }
        }
        Ok(data)
    }

    /// Overlay Data Center exports. Each readable export replaces every store
    /// value for its year; unreadable ones are logged and skipped.
    pub fn apply_exports(
        &mut self,
        exports: &BTreeMap<AcademicYear, PathBuf>,
        registry: &Registry,
    ) -> usize {
        let mut applied = 0;
        for (&year, path) in exports {
            match datacenter::read_export(path, registry) {
                Ok((_, set)) => {
                    tracing::info!(%year, path = %path.display(), rows = set.len(), "using export");
                    self.observations.remove_year(year);
                    self.observations.merge_preferring(set);
                    self.sources.insert(year, DataSource::DataCenterCsv);
                    self.exports.insert(year, path.clone());
                    applied += 1;
                }
                Err(e) => tracing::warn!(%year, path = %path.display(), "skipping export: {e}"),
            }
        }
        applied
    }

    fn name(&self, unit_id: UnitId, registry: &Registry) -> Option<String> {
        self.observations
            .name_of(unit_id)
            .or_else(|| registry.name_of(unit_id))
            .map(str::to_string)
    }

    fn year_cells(&self, unit_id: UnitId, year: AcademicYear) -> [ReportCell; 3] {
        let fte = self.observations.value(unit_id, year, CanonicalMetric::Fte);
        let expenses = self.observations.value(unit_id, year, CanonicalMetric::InstitutionExpenses);
        [fte.into(), expenses.into(), per_fte(expenses, fte).into()]
    }

    /// Units with any observation for `year` (or any year when `None`),
    /// sorted by name then unit id.
    fn sorted_units(
        &self,
        year: Option<AcademicYear>,
        registry: &Registry,
    ) -> Vec<(UnitId, Option<String>)> {
        let ids: BTreeSet<UnitId> = self
            .observations
            .iter()
            .filter(|o| year.map_or(true, |y| o.year == y))
            .map(|o| o.unit_id)
            .collect();
        let mut units: Vec<(UnitId, Option<String>)> =
            ids.into_iter().map(|id| (id, self.name(id, registry))).collect();
        // Unnamed institutions sort last.
        units.sort_by(|a, b| match (&a.1, &b.1) {
            (Some(x), Some(y)) => x.cmp(y).then(a.0.cmp(&b.0)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });
        units
    }
}

fn year_headers(prefix: &str) -> [String; 3] {
    [
        format!("{prefix}{FTE_COLUMN}"),
        format!("{prefix}{EXPENSES_COLUMN}"),
        format!("{prefix}{PER_FTE_COLUMN}"),
    ]
}

fn base_row(unit_id: UnitId, name: Option<&str>) -> Vec<ReportCell> {
    vec![ReportCell::Number(unit_id.get() as f64), ReportCell::from(name)]
}

/// All years side by side, outer-joined on unit id.
pub fn combined_table(data: &FteData, registry: &Registry) -> ReportTable {
    let years = data.years();
    let mut columns = vec![UNITID_HEADER.to_string(), NAME_HEADER.to_string()];
    for year in &years {
        columns.extend(year_headers(&format!("{year} - ")));
    }
    let mut table = ReportTable::new("Combined", columns);
    for (id, name) in data.sorted_units(None, registry) {
        let mut row = base_row(id, name.as_deref());
        for &year in &years {
            row.extend(data.year_cells(id, year));
        }
        table.rows.push(row);
    }
    tracing::info!(rows = table.len(), years = years.len(), "combined FTE report");
    table
}

/// One table per year: institutions reported that year, no year prefix.
pub fn year_tables(data: &FteData, registry: &Registry) -> BTreeMap<AcademicYear, ReportTable> {
    let mut out = BTreeMap::new();
    for year in data.years() {
        let mut columns = vec![UNITID_HEADER.to_string(), NAME_HEADER.to_string()];
        columns.extend(year_headers(""));
        let mut table = ReportTable::new(year.to_string(), columns);
        for (id, name) in data.sorted_units(Some(year), registry) {
            let mut row = base_row(id, name.as_deref());
            row.extend(data.year_cells(id, year));
            table.rows.push(row);
        }
        if table.is_empty() {
            tracing::warn!(%year, "no FTE data");
            continue;
        }
        out.insert(year, table);
    }
    out
}
