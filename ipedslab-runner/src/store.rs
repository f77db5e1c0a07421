//! Local SQLite store: imported survey tables, variable titles, the
//! per-year variable name map and canonical observations.

use ipedslab_core::data::sqlite::{cell_to_sql, list_tables, quote_ident, read_table};
use ipedslab_core::data::{Cell, DataError, Table, TableSource};
use ipedslab_core::domain::{AcademicYear, ObservationSet};
use ipedslab_core::reconcile::{
    AliasTable, SchemaReconciler, VariableNameEntry, VariableNameMap,
};
use ipedslab_core::titles::ConsolidatedTitles;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const VARIABLE_TITLES: &str = "variable_titles";
pub const VARIABLE_TITLES_LOOKUP: &str = "variable_titles_lookup";
pub const VARIABLE_NAME_MAP: &str = "variable_name_map";
pub const OBSERVATIONS: &str = "observations";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already exists (pass --force to overwrite)")]
    Exists(PathBuf),

    #[error("store {0} not found")]
    Missing(PathBuf),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Row and column counts for one stored table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub name: String,
    pub rows: usize,
    pub columns: Vec<String>,
}

pub struct Store {
    path: PathBuf,
    conn: Connection,
}

impl Store {
    /// Create a fresh store. An existing file is only replaced when `force` is set.
    pub fn create(path: impl Into<PathBuf>, force: bool) -> Result<Self, StoreError> {
        let path = path.into();
        if path.exists() {
            if !force {
                return Err(StoreError::Exists(path));
            }
            std::fs::remove_file(&path)?;
            tracing::info!(path = %path.display(), "removed existing store");
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        Ok(Self { path, conn })
    }

    /// Open an existing store for reading and writing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if !path.is_file() {
            return Err(StoreError::Missing(path));
        }
        let conn = Connection::open(&path)?;
        Ok(Self { path, conn })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace a table with `table`'s contents. The stored name is lower-cased.
    /// Returns the number of rows written.
    pub fn write_table(&mut self, table: &Table) -> Result<usize, StoreError> {
        let name = table.name.to_ascii_lowercase();
        let columns: Vec<String> = table
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} {}", quote_ident(c), column_affinity(table, i)))
            .collect();

        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {q}; CREATE TABLE {q} ({cols});",
            q = quote_ident(&name),
            cols = columns.join(", ")
        ))?;
        {
            let placeholders = vec!["?"; table.columns.len()].join(", ");
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} VALUES ({placeholders})",
                quote_ident(&name)
            ))?;
            for row in &table.rows {
                stmt.execute(params_from_iter(row.iter().map(cell_to_sql)))?;
            }
        }
        tx.commit()?;
        tracing::debug!(table = %name, rows = table.len(), "stored table");
        Ok(table.len())
    }

    pub fn table_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(list_tables(&self.conn)?)
    }

    pub fn has_table(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self
            .table_names()?
            .iter()
            .any(|t| t.eq_ignore_ascii_case(name)))
    }

    pub fn read_table(&self, name: &str) -> Result<Table, StoreError> {
        Ok(read_table(&self.conn, name)?)
    }

    /// Every table with its row count and column names.
    pub fn describe(&self) -> Result<Vec<TableSummary>, StoreError> {
        let mut out = Vec::new();
        for name in self.table_names()? {
            let rows: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_ident(&name)),
                [],
                |r| r.get(0),
            )?;
            let mut stmt = self
                .conn
                .prepare(&format!("PRAGMA table_info({})", quote_ident(&name)))?;
            let columns = stmt
                .query_map([], |r| r.get::<_, String>(1))?
                .collect::<Result<Vec<_>, _>>()?;
            out.push(TableSummary {
                name,
                rows: rows as usize,
                columns,
            });
        }
        Ok(out)
    }

    /// Replace `variable_titles` (one `varTitle_{year}` column per documented
    /// year) and its `variable_titles_lookup` view.
    pub fn write_variable_titles(&mut self, titles: &ConsolidatedTitles) -> Result<(), StoreError> {
        let years = titles.years();
        let mut columns = vec!["varName".to_string(), "id".to_string()];
        columns.extend(years.iter().map(|y| format!("varTitle_{y}")));
        columns.push("has_variations".into());
        columns.push("current_varTitle".into());

        let mut table = Table::new(VARIABLE_TITLES, columns);
        for entry in titles.entries() {
            let mut row = vec![Cell::Text(entry.var_name.clone()), Cell::Int(entry.id as i64)];
            row.extend(years.iter().map(|y| {
                entry
                    .titles
                    .get(y)
                    .map(|t| Cell::Text(t.clone()))
                    .unwrap_or(Cell::Null)
            }));
            row.push(Cell::Int(entry.has_variations as i64));
            row.push(
                entry
                    .current_title
                    .clone()
                    .map(Cell::Text)
                    .unwrap_or(Cell::Null),
            );
            table.rows.push(row);
        }

        self.conn.execute_batch(&format!(
            "DROP VIEW IF EXISTS {VARIABLE_TITLES_LOOKUP};"
        ))?;
        self.write_table(&table)?;
        self.conn.execute_batch(&format!(
            "CREATE UNIQUE INDEX idx_{t}_id ON {t} (id);
             CREATE UNIQUE INDEX idx_{t}_varName ON {t} (varName);
             CREATE VIEW {VARIABLE_TITLES_LOOKUP} AS SELECT varName, current_varTitle FROM {t};",
            t = VARIABLE_TITLES
        ))?;
        tracing::info!(rows = titles.len(), "saved {VARIABLE_TITLES}");
        Ok(())
    }

    /// `varName -> current_varTitle`. Empty when titles were never imported.
    pub fn title_lookup(&self) -> Result<HashMap<String, String>, StoreError> {
        if !self.has_table(VARIABLE_TITLES)? {
            tracing::warn!("no {VARIABLE_TITLES} table, raw variable names will be used");
            return Ok(HashMap::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT varName, current_varTitle FROM {VARIABLE_TITLES} \
             WHERE current_varTitle IS NOT NULL"
        ))?;
        let map = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(map)
    }

    pub fn variable_title(&self, var_name: &str) -> Result<Option<String>, StoreError> {
        if !self.has_table(VARIABLE_TITLES)? {
            return Ok(None);
        }
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT current_varTitle FROM {VARIABLE_TITLES} WHERE varName = ?1 LIMIT 1"
                ),
                [var_name],
                |r| r.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten())
    }

    pub fn write_name_map(&mut self, map: &VariableNameMap) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {VARIABLE_NAME_MAP};
             CREATE TABLE {VARIABLE_NAME_MAP} (year INTEGER NOT NULL, raw_field TEXT NOT NULL,
                                               metric TEXT NOT NULL, title TEXT,
                                               UNIQUE (year, raw_field));"
        ))?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {VARIABLE_NAME_MAP} (year, raw_field, metric, title) \
                 VALUES (?1, ?2, ?3, ?4)"
            ))?;
            for e in map.entries() {
                stmt.execute(params![e.year.get(), e.raw_field, e.metric.key(), e.title])?;
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// The stored name map; empty when titles were never imported.
    pub fn load_name_map(&self) -> Result<VariableNameMap, StoreError> {
        let mut map = VariableNameMap::new();
        if !self.has_table(VARIABLE_NAME_MAP)? {
            return Ok(map);
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT year, raw_field, metric, title FROM {VARIABLE_NAME_MAP} ORDER BY rowid"
        ))?;
        let rows = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, i32>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (year, raw_field, metric, title) in rows {
            let Ok(metric) = metric.parse() else {
                tracing::warn!(%metric, "unknown metric in {VARIABLE_NAME_MAP}, skipped");
                continue;
            };
            map.insert(VariableNameEntry {
                year: AcademicYear(year),
                raw_field,
                metric,
                title: title.unwrap_or_default(),
            });
        }
        Ok(map)
    }

    /// Reconciler over the standard aliases, seeded with the stored name map
    /// when titles have been imported.
    pub fn reconciler(&self) -> Result<SchemaReconciler, StoreError> {
        let map = self.load_name_map()?;
        if map.is_empty() {
            return Ok(SchemaReconciler::standard());
        }
        tracing::info!(years = map.years().len(), "reconciling with documented variable names");
        Ok(SchemaReconciler::new(AliasTable::standard(), map))
    }

    /// Replace the `observations` table.
    pub fn write_observations(&mut self, set: &ObservationSet) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {OBSERVATIONS};
             CREATE TABLE {OBSERVATIONS} (unitid INTEGER NOT NULL, year INTEGER NOT NULL,
                                          metric TEXT NOT NULL, value REAL, source TEXT NOT NULL,
                                          raw_field TEXT, snapshot_hash TEXT,
                                          PRIMARY KEY (unitid, year, metric));"
        ))?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {OBSERVATIONS} VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ))?;
            for o in set.iter() {
                stmt.execute(params![
                    o.unit_id.get(),
                    o.year.get(),
                    o.metric.key(),
                    o.value,
                    o.provenance.source.as_str(),
                    o.provenance.raw_field,
                    o.provenance.snapshot_hash,
                ])?;
            }
        }
        tx.commit()?;
        Ok(set.len())
    }
}

impl TableSource for Store {
    fn label(&self) -> String {
        self.path.display().to_string()
    }

    fn table_names(&self) -> Result<Vec<String>, DataError> {
        list_tables(&self.conn)
    }

    fn read_table(&self, name: &str) -> Result<Table, DataError> {
        read_table(&self.conn, name)
    }
}

/// Declared column type from the first non-null cell.
fn column_affinity(table: &Table, col: usize) -> &'static str {
    let first = table
        .rows
        .iter()
        .filter_map(|r| r.get(col))
        .find(|c| !c.is_null());
    match first {
        Some(Cell::Int(_)) => "INTEGER",
        Some(Cell::Real(_)) => "REAL",
        Some(Cell::Text(_)) => "TEXT",
        _ => "",
    }
}
