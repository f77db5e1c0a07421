//! End-to-end pipeline tests: release import, titles import, reports and
//! collection artifacts, using in-memory sources and scratch directories.

use ipedslab_core::data::{
    Cell, DataError, Endpoint, FetchProgress, RawRecord, SurveyApi, Table, TableSource,
};
use ipedslab_core::domain::{AcademicYear, CanonicalMetric, UnitId};
use ipedslab_core::reconcile::{AliasTable, SchemaReconciler};
use ipedslab_core::Registry;
use ipedslab_runner::report::fte::{self, FteData};
use ipedslab_runner::report::{library, save_reports, ReportCell, TitleLookup};
use ipedslab_runner::{
    collect_all, import_releases, import_titles, save_collection, CollectOptions, Store,
    YearStatus, API_METRICS,
};
use rust_xlsxwriter::Workbook;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

// ─── Fixtures ───────────────────────────────────────────────────────

struct Release(BTreeMap<String, Table>);

impl TableSource for Release {
    fn label(&self) -> String {
        "release".into()
    }

    fn table_names(&self) -> Result<Vec<String>, DataError> {
        Ok(self.0.keys().cloned().collect())
    }

    fn read_table(&self, name: &str) -> Result<Table, DataError> {
        self.0.get(name).cloned().ok_or_else(|| DataError::TableMissing {
            table: name.into(),
            source_name: "release".into(),
        })
    }
}

/// A release where one table exists but cannot be read.
struct DamagedRelease {
    release: Release,
    damaged: &'static str,
}

impl TableSource for DamagedRelease {
    fn label(&self) -> String {
        "damaged".into()
    }

    fn table_names(&self) -> Result<Vec<String>, DataError> {
        self.release.table_names()
    }

    fn read_table(&self, name: &str) -> Result<Table, DataError> {
        if name == self.damaged {
            return Err(DataError::Unreadable {
                source_name: "damaged".into(),
                reason: "corrupt".into(),
            });
        }
        self.release.read_table(name)
    }
}

fn table(name: &str, columns: &[&str], rows: Vec<Vec<Cell>>) -> Table {
    let mut t = Table::new(name, columns.iter().map(|c| c.to_string()).collect());
    t.rows = rows;
    t
}

fn release_2021() -> Release {
    let tables = [
        table(
            "DRVEF2021",
            &["UNITID", "FTE", "EFTEUG", "EFYTOTLT"],
            vec![
                vec![Cell::Int(156189), Cell::Int(590), Cell::Int(585), Cell::Int(620)],
                vec![Cell::Int(156295), Cell::Int(1620), Cell::Int(1600), Cell::Int(1800)],
            ],
        ),
        table(
            "AL2021",
            &["UNITID", "LEXPTOT", "LDBS"],
            vec![vec![Cell::Int(156189), Cell::Real(240000.0), Cell::Int(38)]],
        ),
        table(
            "F2021_F2",
            &["UNITID", "F2E131"],
            vec![vec![Cell::Int(156295), Cell::Int(97_200_000)]],
        ),
        table(
            "HD2021",
            &["UNITID", "INSTNM", "CITY"],
            vec![
                vec![
                    Cell::Int(156189),
                    Cell::Text("Alice Lloyd College".into()),
                    Cell::Text("Pippa Passes".into()),
                ],
                vec![
                    Cell::Int(156295),
                    Cell::Text("Berea College".into()),
                    Cell::Text("Berea".into()),
                ],
                vec![
                    Cell::Int(100654),
                    Cell::Text("Alabama A & M University".into()),
                    Cell::Text("Normal".into()),
                ],
            ],
        ),
    ];
    Release(tables.into_iter().map(|t| (t.name.clone(), t)).collect())
}

fn write_titles_doc(dir: &Path, year: AcademicYear, rows: &[(&str, &str)]) {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name(year.vartable_sheet()).unwrap();
    ws.write_string(0, 0, "varName").unwrap();
    ws.write_string(0, 1, "varTitle").unwrap();
    for (i, (name, title)) in rows.iter().enumerate() {
        ws.write_string(i as u32 + 1, 0, *name).unwrap();
        ws.write_string(i as u32 + 1, 1, *title).unwrap();
    }
    wb.save(dir.join(year.tables_doc_file_name())).unwrap();
}

fn imported_store(dir: &Path) -> Store {
    std::fs::write(dir.join(AcademicYear(2021).accdb_file_name()), b"stub").unwrap();
    let mut store = Store::create(dir.join("library.sqlite"), false).unwrap();
    let summary = import_releases(
        dir,
        &[AcademicYear(2020), AcademicYear(2021)],
        &Registry::consortium(),
        &mut store,
        |_| Ok(release_2021()),
    )
    .unwrap();
    assert_eq!(summary.imported_years(), vec![AcademicYear(2021)]);
    store
}

// ─── Import + titles + library report ───────────────────────────────

#[test]
fn unreadable_table_keeps_rest_of_year() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(AcademicYear(2021).accdb_file_name()), b"stub").unwrap();
    let mut store = Store::create(dir.path().join("library.sqlite"), false).unwrap();

    let summary = import_releases(
        dir.path(),
        &[AcademicYear(2021)],
        &Registry::consortium(),
        &mut store,
        |_| {
            Ok(DamagedRelease {
                release: release_2021(),
                damaged: "AL2021",
            })
        },
    )
    .unwrap();

    assert_eq!(summary.imported_years(), vec![AcademicYear(2021)]);
    match &summary.years[0].status {
        YearStatus::Imported { tables, missing_tables } => {
            assert_eq!(tables.len(), 3);
            assert_eq!(missing_tables, &vec!["AL2021".to_string(), "DRVAL2021".to_string()]);
        }
        other => panic!("unexpected status: {other:?}"),
    }
    assert_eq!(store.table_names().unwrap(), vec!["drvef2021", "f2021_f2", "hd2021"]);
}

#[test]
fn import_titles_and_library_report() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = imported_store(dir.path());

    write_titles_doc(
        dir.path(),
        AcademicYear(2020),
        &[("FTE", "FTE enrollment"), ("LEXPTOT", "Total library expenditures")],
    );
    write_titles_doc(
        dir.path(),
        AcademicYear(2021),
        &[("FTE", "Full-time equivalent fall enrollment"), ("LDBS", "Databases")],
    );
    let titles = import_titles(
        dir.path(),
        &[AcademicYear(2019), AcademicYear(2020), AcademicYear(2021)],
        &AliasTable::standard(),
        &mut store,
    )
    .unwrap();
    assert_eq!(titles.loaded_years, vec![AcademicYear(2020), AcademicYear(2021)]);
    assert_eq!(titles.skipped_years, vec![AcademicYear(2019)]);
    assert_eq!(titles.variables, 3);
    assert_eq!(titles.variations, 1);
    assert_eq!(
        store.variable_title("FTE").unwrap().as_deref(),
        Some("Full-time equivalent fall enrollment")
    );

    let lookup = TitleLookup::new(store.title_lookup().unwrap());
    let report = library::combined_report(&store, &lookup).unwrap();
    assert_eq!(
        report.columns,
        vec![
            "UNITID",
            "Institution Name",
            "2021 - AL - Total library expenditures",
            "2021 - AL - Databases",
            "2021 - DRVEF - Full-time equivalent fall enrollment",
            "2021 - F - F2E131",
        ]
    );
    // Only members were imported; the directory table was projected.
    assert_eq!(report.len(), 2);
    let lib = report.column("2021 - AL - Total library expenditures").unwrap();
    assert_eq!(lib[0], &ReportCell::Number(240000.0));
    assert_eq!(lib[1], &ReportCell::Empty);

    let per_year = library::year_reports(&store, &lookup).unwrap();
    let out = dir.path().join("out");
    let stamp = "20250101_090000";
    let first = save_reports(Some(&report), &per_year, &out, "BCLA_Library", stamp).unwrap();
    let second = save_reports(Some(&report), &per_year, &out, "BCLA_Library", stamp).unwrap();
    assert_eq!(first.len(), 2);
    assert!(first[0].ends_with("BCLA_Library_Combined_20250101_090000.xlsx"));
    assert!(first[1].ends_with("BCLA_Library_2021_20250101_090000.xlsx"));
    assert!(second[0].ends_with("BCLA_Library_Combined_20250101_090000_1.xlsx"));
    assert!(first.iter().chain(&second).all(|p| p.is_file()));
}

#[test]
fn titles_import_without_docs_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::create(dir.path().join("s.sqlite"), false).unwrap();
    let err = import_titles(
        dir.path(),
        &[AcademicYear(2021)],
        &AliasTable::standard(),
        &mut store,
    )
    .unwrap_err();
    assert!(err.to_string().contains("no variable documentation"));
}

#[test]
fn existing_store_is_not_clobbered() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("library.sqlite");
    Store::create(&path, false).unwrap();
    assert!(Store::create(&path, false).is_err());
    assert!(Store::create(&path, true).is_ok());
}

// ─── FTE report ─────────────────────────────────────────────────────

#[test]
fn fte_report_prefers_exports() {
    let dir = tempfile::tempdir().unwrap();
    let store = imported_store(dir.path());
    std::fs::write(
        dir.path().join("aca-ipeds-fte-f2e131-2024.csv"),
        "UnitID,Institution Name,Total expenses-Total amount (F2324_F2),\
         Full-time equivalent fall enrollment (DRVEF2024)\n\
         156189,Alice Lloyd College,30000000,600\n\
         100654,Alabama A & M University,1,1\n",
    )
    .unwrap();

    let registry = Registry::consortium();
    let mut data = FteData::from_store(&store, &registry, &SchemaReconciler::standard()).unwrap();
    let exports =
        ipedslab_core::data::datacenter::find_exports(dir.path(), "aca-ipeds-fte-f2e131-")
            .unwrap();
    assert_eq!(data.apply_exports(&exports, &registry), 1);
    assert_eq!(data.years(), vec![AcademicYear(2021), AcademicYear(2024)]);

    let combined = fte::combined_table(&data, &registry);
    assert_eq!(combined.columns.len(), 2 + 2 * 3);
    assert_eq!(combined.len(), 2);
    assert_eq!(combined.rows[1][1], ReportCell::Text("Berea College".into()));
    assert_eq!(
        combined.column("2021 - Expenses per FTE").unwrap()[1],
        &ReportCell::Number(60_000.0)
    );
    assert_eq!(
        combined.column("2024 - Expenses per FTE").unwrap()[0],
        &ReportCell::Number(50_000.0)
    );
    // Berea is absent from the 2024 export.
    assert_eq!(
        combined.column("2024 - DRVEF - Full-time equivalent fall enrollment").unwrap()[1],
        &ReportCell::Empty
    );

    let years = fte::year_tables(&data, &registry);
    assert_eq!(years[&AcademicYear(2024)].len(), 1);
    assert_eq!(years[&AcademicYear(2021)].columns[2], fte::FTE_COLUMN);
}

#[test]
fn documented_field_outranks_standard_alias() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = imported_store(dir.path());
    let registry = Registry::consortium();
    let fte_2021 = |data: &FteData| {
        data.observations
            .value(UnitId(156189), AcademicYear(2021), CanonicalMetric::Fte)
    };

    // Before titles are imported the standard alias order picks FTE.
    let data = FteData::from_store(&store, &registry, &store.reconciler().unwrap()).unwrap();
    assert_eq!(fte_2021(&data), Some(590.0));

    // The 2021 documentation only lists the 12-month FTE field.
    write_titles_doc(
        dir.path(),
        AcademicYear(2021),
        &[("EFYTOTLT", "12-month full-time equivalent enrollment")],
    );
    import_titles(dir.path(), &[AcademicYear(2021)], &AliasTable::standard(), &mut store).unwrap();

    let data = FteData::from_store(&store, &registry, &store.reconciler().unwrap()).unwrap();
    assert_eq!(fte_2021(&data), Some(620.0));
    let obs = data
        .observations
        .get(UnitId(156189), AcademicYear(2021), CanonicalMetric::Fte)
        .unwrap();
    assert_eq!(obs.provenance.raw_field.as_deref(), Some("EFYTOTLT"));

    let standard = FteData::from_store(&store, &registry, &SchemaReconciler::standard()).unwrap();
    assert_eq!(fte_2021(&standard), Some(590.0));
}

// ─── Collection ─────────────────────────────────────────────────────

struct StaticApi;

impl SurveyApi for StaticApi {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch(
        &self,
        endpoint: Endpoint,
        unit_id: UnitId,
        _year: AcademicYear,
    ) -> Result<Vec<RawRecord>, DataError> {
        let record: RawRecord = match endpoint {
            Endpoint::AcademicLibraries => [
                ("unitid".to_string(), json!(unit_id.get())),
                ("ltotexpn".to_string(), json!(100000)),
                ("ldbs".to_string(), json!(25)),
            ]
            .into_iter()
            .collect(),
            Endpoint::FallEnrollment => {
                [("fte".to_string(), json!(400))].into_iter().collect()
            }
        };
        Ok(vec![record])
    }
}

struct Quiet;

impl FetchProgress for Quiet {
    fn on_start(&self, _: UnitId, _: AcademicYear, _: usize, _: usize) {}
    fn on_error(&self, _: UnitId, _: AcademicYear, _: Endpoint, _: &DataError) {}
    fn on_batch_complete(&self, _: usize, _: usize) {}
}

#[test]
fn collection_artifacts_never_overwrite() {
    let registry = Registry::consortium();
    let opts = CollectOptions {
        years: vec![AcademicYear(2013), AcademicYear(2014)],
        delay: Duration::ZERO,
    };
    let reconciler = SchemaReconciler::standard();
    let outcome = collect_all(&StaticApi, &registry, &reconciler, &opts, &Quiet);
    assert_eq!(outcome.rows.len(), registry.len() * 2);
    assert_eq!(outcome.summary.failed_calls, 0);
    assert_eq!(outcome.summary.missing_pct(CanonicalMetric::Fte), 0.0);

    let dir = tempfile::tempdir().unwrap();
    let save = || {
        save_collection(&outcome, &API_METRICS, dir.path(), "bcla_ipeds_data", "20250101_090000")
            .unwrap()
    };
    let a = save();
    let b = save();
    assert_ne!(a.csv, b.csv);
    assert_ne!(a.sqlite, b.sqlite);

    let csv = std::fs::read_to_string(&a.csv).unwrap();
    assert_eq!(csv.lines().count(), 1 + registry.len() * 2);
    assert!(csv
        .lines()
        .nth(1)
        .unwrap()
        .starts_with("156189,Alice Lloyd College,2013,100000,25,400,250,"));

    let stored = Store::open(&a.sqlite).unwrap();
    let obs = stored.read_table("observations").unwrap();
    assert_eq!(obs.len(), registry.len() * 2 * API_METRICS.len());
}
