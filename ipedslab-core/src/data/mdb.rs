//! Access (`.accdb`) tables through the mdb-tools command-line utilities.
//!
//! `mdb-tables -1 <file>` lists one table per line and
//! `mdb-export <file> <table>` writes the table as CSV with a header row.

use super::provider::DataError;
use super::table::{Cell, Table, TableSource};
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct MdbToolsSource {
    path: PathBuf,
    bin_dir: Option<PathBuf>,
}

impl MdbToolsSource {
    /// Open a database file. Fails if the file does not exist.
    pub fn open(path: impl Into<PathBuf>, bin_dir: Option<PathBuf>) -> Result<Self, DataError> {
        let path = path.into();
        if !path.is_file() {
            return Err(DataError::SourceMissing(path.display().to_string()));
        }
        Ok(Self { path, bin_dir })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tool(&self, name: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    fn run(&self, tool: &str, args: &[&str]) -> Result<String, DataError> {
        let output = Command::new(self.tool(tool))
            .args(args)
            .arg(&self.path)
            .output()
            .map_err(|e| DataError::Unreadable {
                source_name: self.label(),
                reason: format!("failed to run {tool}: {e}"),
            })?;
        if !output.status.success() {
            return Err(DataError::Unreadable {
                source_name: self.label(),
                reason: format!(
                    "{tool} exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl TableSource for MdbToolsSource {
    fn label(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn table_names(&self) -> Result<Vec<String>, DataError> {
        let out = self.run("mdb-tables", &["-1"])?;
        Ok(parse_table_list(&out))
    }

    fn read_table(&self, name: &str) -> Result<Table, DataError> {
        let output = Command::new(self.tool("mdb-export"))
            .arg(&self.path)
            .arg(name)
            .output()
            .map_err(|e| DataError::Unreadable {
                source_name: self.label(),
                reason: format!("failed to run mdb-export: {e}"),
            })?;
        if !output.status.success() {
            return Err(DataError::TableMissing {
                table: name.to_string(),
                source_name: self.label(),
            });
        }
        let table = parse_export(name, &output.stdout)?;
        tracing::debug!(table = name, rows = table.len(), "read table");
        Ok(table)
    }
}

/// Parse `mdb-tables -1` output.
pub fn parse_table_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Parse `mdb-export` CSV output into a typed table.
pub fn parse_export(name: &str, bytes: &[u8]) -> Result<Table, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    let columns: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut table = Table::new(name, columns);
    for record in rdr.records() {
        let record = record?;
        let mut row: Vec<Cell> = record.iter().map(Cell::infer).collect();
        row.resize(table.columns.len(), Cell::Null);
        table.rows.push(row);
    }
    Ok(table)
}
