//! Data availability: distinct institutions per survey table and year.

use super::{survey_tables, ReportCell, ReportTable};
use ipedslab_core::data::{DataError, TableKind, TableSource};
use ipedslab_core::domain::AcademicYear;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilitySummary {
    /// `None` when the table was not imported for that year.
    pub counts: BTreeMap<AcademicYear, BTreeMap<TableKind, Option<usize>>>,
}

impl AvailabilitySummary {
    pub fn from_source(source: &dyn TableSource) -> Result<Self, DataError> {
        let mut summary = AvailabilitySummary::default();
        for (year, tables) in survey_tables(&source.table_names()?) {
            let mut row = BTreeMap::new();
            for kind in TableKind::DATA {
                let count = match tables.iter().find(|(t, _)| t.kind == kind) {
                    Some((_, name)) => Some(source.read_table(name)?.distinct_unit_ids().len()),
                    None => None,
                };
                row.insert(kind, count);
            }
            summary.counts.insert(year, row);
        }
        Ok(summary)
    }

    pub fn get(&self, year: AcademicYear, kind: TableKind) -> Option<usize> {
        self.counts.get(&year).and_then(|r| r.get(&kind).copied().flatten())
    }

    pub fn to_report(&self) -> ReportTable {
        let mut columns = vec!["Year".to_string()];
        columns.extend(TableKind::DATA.iter().map(|k| k.label().to_string()));
        let mut table = ReportTable::new("Availability", columns);
        for (year, row) in &self.counts {
            let mut cells = vec![ReportCell::Number(year.get() as f64)];
            for kind in TableKind::DATA {
                cells.push(match row.get(&kind).copied().flatten() {
                    Some(n) => ReportCell::Number(n as f64),
                    None => ReportCell::Text("N/A".into()),
                });
            }
            table.rows.push(cells);
        }
        table
    }
}

impl fmt::Display for AvailabilitySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<6}", "Year")?;
        for kind in TableKind::DATA {
            write!(f, "{:>8}", kind.label())?;
        }
        writeln!(f)?;
        for (year, row) in &self.counts {
            write!(f, "{:<6}", year)?;
            for kind in TableKind::DATA {
                match row.get(&kind).copied().flatten() {
                    Some(n) => write!(f, "{n:>8}")?,
                    None => write!(f, "{:>8}", "N/A")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipedslab_core::data::{Cell, Table};

    struct Tables(Vec<Table>);

    impl TableSource for Tables {
        fn label(&self) -> String {
            "tables".into()
        }

        fn table_names(&self) -> Result<Vec<String>, DataError> {
            Ok(self.0.iter().map(|t| t.name.clone()).collect())
        }

        fn read_table(&self, name: &str) -> Result<Table, DataError> {
            self.0
                .iter()
                .find(|t| t.name == name)
                .cloned()
                .ok_or_else(|| DataError::TableMissing {
                    table: name.into(),
                    source_name: "tables".into(),
                })
        }
    }

    #[test]
    fn counts_distinct_institutions() {
        let mut al = Table::new("al2021", vec!["UNITID".into(), "LDBS".into()]);
        al.rows = vec![
            vec![Cell::Int(156189), Cell::Int(1)],
            vec![Cell::Int(156189), Cell::Int(2)],
            vec![Cell::Int(156295), Cell::Int(3)],
        ];
        let hd = Table::new("hd2021", vec!["UNITID".into(), "INSTNM".into()]);
        let summary = AvailabilitySummary::from_source(&Tables(vec![al, hd])).unwrap();

        assert_eq!(summary.get(AcademicYear(2021), TableKind::Al), Some(2));
        assert_eq!(summary.get(AcademicYear(2021), TableKind::Drvef), None);

        let text = summary.to_string();
        assert!(text.contains("N/A"));
        assert!(text.lines().nth(1).unwrap().starts_with("2021"));

        let report = summary.to_report();
        assert_eq!(report.columns, vec!["Year", "DRVEF", "AL", "DRVAL", "F"]);
        assert_eq!(report.rows[0][2], ReportCell::Number(2.0));
        assert_eq!(report.rows[0][1], ReportCell::Text("N/A".into()));
    }
}
