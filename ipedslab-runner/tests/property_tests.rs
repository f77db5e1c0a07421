//! Property tests for artifact naming and CSV export.

use ipedslab_core::domain::{AcademicYear, CanonicalMetric, CanonicalRow, UnitId};
use ipedslab_runner::export::{export_rows_csv, unique_artifact_path};
use ipedslab_runner::API_METRICS;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever stamped files already exist, the chosen path is new.
    #[test]
    fn artifact_path_is_always_fresh(taken in proptest::collection::btree_set(0u32..6, 0..6)) {
        let dir = tempfile::tempdir().unwrap();
        for n in &taken {
            let name = if *n == 0 {
                "out_20250101_000000.csv".to_string()
            } else {
                format!("out_20250101_000000_{n}.csv")
            };
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let path = unique_artifact_path(dir.path(), "out_20250101_000000", "csv");
        prop_assert!(!path.exists());
        prop_assert_eq!(path.parent().unwrap(), dir.path());
    }

    /// One CSV line per row plus the header; missing values never become zero.
    #[test]
    fn csv_has_one_line_per_row(
        values in proptest::collection::vec(
            (proptest::option::of(0.0f64..1e7), proptest::option::of(1.0f64..5e4)),
            0..20,
        )
    ) {
        let rows: Vec<CanonicalRow> = values
            .iter()
            .enumerate()
            .map(|(i, (lib, fte))| {
                let mut row = CanonicalRow::new(UnitId(100000 + i as u32), AcademicYear(2020));
                if let Some(v) = lib {
                    row.values.insert(CanonicalMetric::LibraryExpenses, *v);
                }
                if let Some(v) = fte {
                    row.values.insert(CanonicalMetric::Fte, *v);
                }
                row
            })
            .collect();

        let csv = export_rows_csv(&rows, &API_METRICS).unwrap();
        let mut rdr = csv::Reader::from_reader(csv.as_bytes());
        let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        prop_assert_eq!(records.len(), rows.len());
        for (record, (lib, fte)) in records.iter().zip(&values) {
            prop_assert_eq!(record.get(3).unwrap().is_empty(), lib.is_none());
            prop_assert_eq!(record.get(5).unwrap().is_empty(), fte.is_none());
            prop_assert_eq!(record.get(6).unwrap().is_empty(), lib.is_none() || fte.is_none());
        }
    }
}
