//! IPEDS Data Center CSV exports (FTE + total expenses for one year).
//!
//! File names follow `<prefix>-<year>.csv`, e.g. `aca-ipeds-fte-f2e131-2024.csv`.
//! Column headers vary between exports, so columns are located by substring:
//! the unit id (`unitid`), institution name, total expenses (`total expenses`
//! or `f2e`) and FTE (`full-time equivalent` or `drvef`).

use super::provider::DataError;
use super::table::Cell;
use crate::domain::{
    AcademicYear, CanonicalMetric, DataSource, MetricObservation, ObservationSet, Provenance,
    UnitId,
};
use crate::registry::Registry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, PartialEq, Eq)]
struct ColumnMap {
    unit_id: Option<usize>,
    name: Option<usize>,
    expenses: Option<usize>,
    fte: Option<usize>,
}

impl ColumnMap {
    fn detect(headers: &csv::StringRecord) -> Self {
        let mut map = ColumnMap::default();
        for (i, header) in headers.iter().enumerate() {
            let lower = header.trim().to_ascii_lowercase();
            if lower.contains("unitid") {
                map.unit_id = Some(i);
            } else if lower.contains("institution name") {
                map.name = Some(i);
            } else if lower.contains("total expenses") || lower.contains("f2e") {
                map.expenses = Some(i);
            } else if lower.contains("full-time equivalent") || lower.contains("drvef") {
                map.fte = Some(i);
            }
        }
        map
    }

    fn missing(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.unit_id.is_none() {
            missing.push("unitid".to_string());
        }
        if self.expenses.is_none() {
            missing.push("total expenses".to_string());
        }
        if self.fte.is_none() {
            missing.push("full-time equivalent".to_string());
        }
        missing
    }
}

/// Year encoded in an export file name: the last `-`-separated component.
pub fn year_from_file_name(path: &Path) -> Option<AcademicYear> {
    let stem = path.file_stem()?.to_str()?;
    let last = stem.rsplit('-').next()?;
    if last.len() == 4 && last.chars().all(|c| c.is_ascii_digit()) {
        last.parse().ok().map(AcademicYear)
    } else {
        None
    }
}

/// Find `<prefix>-<year>.csv` files in `dir`, keyed by year.
pub fn find_exports(
    dir: &Path,
    prefix: &str,
) -> Result<BTreeMap<AcademicYear, PathBuf>, DataError> {
    let mut found = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(found);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(prefix) || !name.ends_with(".csv") {
            continue;
        }
        if let Some(year) = year_from_file_name(&path) {
            found.insert(year, path);
        }
    }
    Ok(found)
}

/// Read one export into observations (`Fte`, `InstitutionExpenses`) plus names.
///
/// Rows for institutions outside the registry are dropped.
pub fn read_export(
    path: &Path,
    registry: &Registry,
) -> Result<(AcademicYear, ObservationSet), DataError> {
    let label = path.display().to_string();
    let year = year_from_file_name(path).ok_or_else(|| DataError::Unreadable {
        source_name: label.clone(),
        reason: "no year in file name".into(),
    })?;
    let file = std::fs::File::open(path).map_err(|_| DataError::SourceMissing(label.clone()))?;
    let set = parse_export(file, year, &label, registry)?;
    Ok((year, set))
}

pub fn parse_export<R: std::io::Read>(
    reader: R,
    year: AcademicYear,
    label: &str,
    registry: &Registry,
) -> Result<ObservationSet, DataError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let map = ColumnMap::detect(&headers);
    let (Some(id_col), Some(exp_col), Some(fte_col)) = (map.unit_id, map.expenses, map.fte)
    else {
        return Err(DataError::MissingColumns {
            source_name: label.to_string(),
            columns: map.missing(),
        });
    };

    let mut set = ObservationSet::new();
    for record in rdr.records() {
        let record = record?;
        let Some(unit_id) = record.get(id_col).and_then(|v| v.parse::<UnitId>().ok()) else {
            continue;
        };
        if !registry.contains(unit_id) {
            continue;
        }
        if set.get(unit_id, year, CanonicalMetric::Fte).is_some() {
            tracing::warn!(
                source = %label,
                %unit_id,
                "repeated unit id in export, keeping first row"
            );
            continue;
        }
        if let Some(name) = map.name.and_then(|i| record.get(i)) {
            set.note_name(unit_id, name);
        }
        for (metric, col) in [
            (CanonicalMetric::InstitutionExpenses, exp_col),
            (CanonicalMetric::Fte, fte_col),
        ] {
            let value = record.get(col).map(Cell::infer).and_then(|c| c.as_f64());
            set.insert(MetricObservation {
                unit_id,
                year,
                metric,
                value,
                provenance: Provenance {
                    source: DataSource::DataCenterCsv,
                    raw_field: Some(headers[col].to_string()),
                    snapshot_hash: None,
                },
            })?;
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "UnitID,Institution Name,\
Total expenses-Total amount (F2324_F2),Full-time equivalent fall enrollment (DRVEF2024)\n\
156189,Alice Lloyd College,25000000,587\n\
156295,Berea College,,1600\n\
100654,Alabama A & M University,1,1\n";

    #[test]
    fn year_comes_from_last_component() {
        assert_eq!(
            year_from_file_name(Path::new("aca-ipeds-fte-f2e131-2024.csv")),
            Some(AcademicYear(2024))
        );
        assert_eq!(year_from_file_name(Path::new("aca-ipeds-fte-f2e131-latest.csv")), None);
    }

    #[test]
    fn parses_export_and_filters_registry() {
        let set =
            parse_export(EXPORT.as_bytes(), AcademicYear(2024), "test", &Registry::consortium())
                .unwrap();
        let y = AcademicYear(2024);
        assert_eq!(
            set.value(UnitId(156189), y, CanonicalMetric::InstitutionExpenses),
            Some(25_000_000.0)
        );
        assert_eq!(set.value(UnitId(156189), y, CanonicalMetric::Fte), Some(587.0));
        assert_eq!(set.value(UnitId(156295), y, CanonicalMetric::InstitutionExpenses), None);
        assert!(set.get(UnitId(156295), y, CanonicalMetric::InstitutionExpenses).is_some());
        assert!(set.get(UnitId(100654), y, CanonicalMetric::Fte).is_none());
        assert_eq!(set.name_of(UnitId(156295)), Some("Berea College"));
    }

    #[test]
    fn repeated_unit_id_keeps_first_row() {
        let export = format!("{EXPORT}156189,Alice Lloyd College,1,2\n");
        let set =
            parse_export(export.as_bytes(), AcademicYear(2024), "test", &Registry::consortium())
                .unwrap();
        let y = AcademicYear(2024);
        assert_eq!(set.value(UnitId(156189), y, CanonicalMetric::Fte), Some(587.0));
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn missing_columns_are_reported() {
        let err = parse_export(
            "UnitID,Institution Name,Something else\n1,A,2\n".as_bytes(),
            AcademicYear(2024),
            "bad.csv",
            &Registry::consortium(),
        )
        .unwrap_err();
        match err {
            DataError::MissingColumns { columns, .. } => {
                assert_eq!(columns, vec!["total expenses", "full-time equivalent"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn finds_exports_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("aca-ipeds-fte-f2e131-2024.csv"), EXPORT).unwrap();
        std::fs::write(dir.path().join("aca-ipeds-fte-f2e131-2023.csv"), EXPORT).unwrap();
        std::fs::write(dir.path().join("other-2024.csv"), EXPORT).unwrap();

        let found = find_exports(dir.path(), "aca-ipeds-fte-f2e131-").unwrap();
        assert_eq!(
            found.keys().copied().collect::<Vec<_>>(),
            vec![AcademicYear(2023), AcademicYear(2024)]
        );
    }
}
