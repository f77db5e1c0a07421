//! Survey API trait and structured error types.
//!
//! The `SurveyApi` trait abstracts over the remote REST service so the
//! collection pipeline can be driven by an in-memory fake in tests.

use crate::domain::{AcademicYear, CanonicalMetric, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A raw source record: field name -> JSON value, exactly as delivered.
pub type RawRecord = BTreeMap<String, serde_json::Value>;

/// BLAKE3 digest of a raw record's canonical JSON (keys are sorted by the map).
pub fn snapshot_hash(record: &RawRecord) -> String {
    let json = serde_json::to_vec(record).unwrap_or_default();
    blake3::hash(&json).to_hex().to_string()
}

/// Structured error types for source operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("API returned status {status} for {context}")]
    HttpStatus { status: u16, context: String },

    #[error("response format changed: {0}")]
    ResponseFormat(String),

    #[error("source file not found: {0}")]
    SourceMissing(String),

    #[error("table {table} not found in {source_name}")]
    TableMissing { table: String, source_name: String },

    #[error("cannot read {source_name}: {reason}")]
    Unreadable { source_name: String, reason: String },

    #[error("missing required columns in {source_name}: {columns:?}")]
    MissingColumns {
        source_name: String,
        columns: Vec<String>,
    },

    #[error("duplicate observation for {unit_id} {year} {metric}")]
    DuplicateObservation {
        unit_id: UnitId,
        year: AcademicYear,
        metric: CanonicalMetric,
    },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Endpoints of the Education Data Portal used by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Endpoint {
    AcademicLibraries,
    FallEnrollment,
}

impl Endpoint {
    pub const ALL: [Endpoint; 2] = [Endpoint::AcademicLibraries, Endpoint::FallEnrollment];

    /// Path segment under the IPEDS base URL.
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::AcademicLibraries => "academic-libraries",
            Endpoint::FallEnrollment => "fall-enrollment",
        }
    }

    /// Label used for raw snapshot columns.
    pub fn raw_label(self) -> &'static str {
        match self {
            Endpoint::AcademicLibraries => "acad_lib_raw",
            Endpoint::FallEnrollment => "fall_enroll_raw",
        }
    }

    /// Metrics this endpoint is expected to carry.
    pub fn metrics(self) -> &'static [CanonicalMetric] {
        match self {
            Endpoint::AcademicLibraries => {
                &[CanonicalMetric::LibraryExpenses, CanonicalMetric::DatabaseCount]
            }
            Endpoint::FallEnrollment => &[CanonicalMetric::Fte],
        }
    }
}

/// Trait for the remote survey API.
pub trait SurveyApi {
    /// Human-readable name of this API.
    fn name(&self) -> &str;

    /// Fetch every result row for one (endpoint, institution, year) query,
    /// following pagination.
    fn fetch(
        &self,
        endpoint: Endpoint,
        unit_id: UnitId,
        year: AcademicYear,
    ) -> Result<Vec<RawRecord>, DataError>;
}

/// Progress callback for institution × year sweeps.
pub trait FetchProgress {
    fn on_start(&self, unit_id: UnitId, year: AcademicYear, index: usize, total: usize);

    fn on_error(&self, unit_id: UnitId, year: AcademicYear, endpoint: Endpoint, err: &DataError);

    fn on_batch_complete(&self, rows: usize, failed_calls: usize);
}

/// Progress reporter that emits `tracing` events.
pub struct LogProgress;

impl FetchProgress for LogProgress {
    fn on_start(&self, unit_id: UnitId, year: AcademicYear, index: usize, total: usize) {
        let pct = (index + 1) as f64 / total.max(1) as f64 * 100.0;
        tracing::info!(%unit_id, %year, "fetching ({}/{} - {:.1}%)", index + 1, total, pct);
    }

    fn on_error(&self, unit_id: UnitId, year: AcademicYear, endpoint: Endpoint, err: &DataError) {
        tracing::warn!(%unit_id, %year, endpoint = endpoint.path(), "skipped: {err}");
    }

    fn on_batch_complete(&self, rows: usize, failed_calls: usize) {
        tracing::info!(rows, failed_calls, "data collection complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_hash_is_order_independent() {
        let mut a = RawRecord::new();
        a.insert("fte".into(), json!(100));
        a.insert("unitid".into(), json!(1));
        let mut b = RawRecord::new();
        b.insert("unitid".into(), json!(1));
        b.insert("fte".into(), json!(100));
        assert_eq!(snapshot_hash(&a), snapshot_hash(&b));

        b.insert("fte".into(), json!(101));
        assert_ne!(snapshot_hash(&a), snapshot_hash(&b));
    }
}
