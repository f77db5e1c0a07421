//! Tables from a SQLite file (converted survey databases or the local store).

use super::provider::DataError;
use super::table::{Cell, Table, TableSource};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

pub struct SqliteTableSource {
    path: PathBuf,
    conn: Connection,
}

impl SqliteTableSource {
    /// Open a SQLite file read-only.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DataError> {
        let path = path.into();
        if !path.is_file() {
            return Err(DataError::SourceMissing(path.display().to_string()));
        }
        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self { path, conn })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableSource for SqliteTableSource {
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

/// Quote an identifier for use in SQL text.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// User tables in a connection, sorted by name.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>, DataError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master \
         WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Read a whole table into memory.
pub fn read_table(conn: &Connection, name: &str) -> Result<Table, DataError> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(name)))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();
    let mut table = Table::new(name, columns);

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(cell_from_sql(row.get_ref(i)?));
        }
        table.rows.push(cells);
    }
    Ok(table)
}

pub fn cell_from_sql(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(i) => Cell::Int(i),
        ValueRef::Real(f) => Cell::Real(f),
        ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => Cell::Null,
    }
}

pub fn cell_to_sql(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Int(i) => Value::Integer(*i),
        Cell::Real(f) => Value::Real(*f),
        Cell::Text(s) => Value::Text(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_tables_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.sqlite");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE drvef2020 (UNITID INTEGER, FTE REAL);
                 INSERT INTO drvef2020 VALUES (156189, 587.0), (156295, NULL);
                 CREATE TABLE hd2020 (UNITID INTEGER, INSTNM TEXT);",
            )
            .unwrap();
        }

        let src = SqliteTableSource::open(&path).unwrap();
        assert_eq!(src.table_names().unwrap(), vec!["drvef2020", "hd2020"]);

        let t = src.read_table_if_present("DRVEF2020").unwrap().unwrap();
        assert_eq!(t.columns, vec!["UNITID", "FTE"]);
        assert_eq!(t.rows[0], vec![Cell::Int(156189), Cell::Real(587.0)]);
        assert_eq!(t.rows[1][1], Cell::Null);

        assert!(src.read_table_if_present("al2020").unwrap().is_none());
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
