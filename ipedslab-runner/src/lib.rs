//! ipedslab runner: collection and import pipelines, the SQLite store, and
//! CSV / spreadsheet output.
//!
//! This crate builds on `ipedslab-core` to provide:
//! - API collection over the consortium registry
//! - Survey database import into a local SQLite store
//! - Variable-title documentation import
//! - Library, FTE & expenses and availability reports
//! - TOML configuration

pub mod collect;
pub mod config;
pub mod export;
pub mod import;
pub mod report;
pub mod store;
pub mod titles;

pub use collect::{collect_all, CollectOptions, CollectOutcome, CollectSummary, API_METRICS};
pub use config::{ConfigError, HarvestConfig, YearRange};
pub use export::{save_collection, timestamp, unique_artifact_path, CollectionArtifacts};
pub use import::{import_releases, present_release_years, ImportSummary, YearStatus};
pub use report::{ReportLayout, ReportTable, TitleLookup};
pub use store::{Store, StoreError};
pub use titles::{import_titles, TitlesSummary};
