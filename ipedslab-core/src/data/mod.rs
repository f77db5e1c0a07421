//! Source extractors: REST API, structured-database tables, CSV exports.

pub mod datacenter;
pub mod mdb;
pub mod portal;
pub mod provider;
pub mod sqlite;
pub mod table;

pub use mdb::MdbToolsSource;
pub use portal::EducationDataPortal;
pub use provider::{
    snapshot_hash, DataError, Endpoint, FetchProgress, LogProgress, RawRecord, SurveyApi,
};
pub use sqlite::SqliteTableSource;
pub use table::{Cell, SurveyTable, Table, TableKind, TableSource, INSTNM, UNITID};
