//! Collection artifacts: canonical-row CSV and the SQLite observations file.
//!
//! Every artifact name carries a `%Y%m%d_%H%M%S` stamp. If a file with the
//! stamped name already exists, `_1`, `_2`, ... is appended.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ipedslab_core::data::Endpoint;
use ipedslab_core::domain::{CanonicalMetric, CanonicalRow};

use crate::collect::CollectOutcome;
use crate::store::Store;

// ─── Naming ─────────────────────────────────────────────────────────

/// Local time stamp used in artifact names.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// `dir/stem.ext`, or the first free `dir/stem_N.ext`.
pub fn unique_artifact_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let first = dir.join(format!("{stem}.{ext}"));
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| dir.join(format!("{stem}_{n}.{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Canonical rows as CSV.
///
/// Columns: unitid, institution, year, one per metric key, expenses_per_fte,
/// then one raw JSON snapshot column per endpoint. Missing values are blank.
pub fn export_rows_csv(rows: &[CanonicalRow], metrics: &[CanonicalMetric]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header: Vec<&str> = vec!["unitid", "institution", "year"];
    header.extend(metrics.iter().map(|m| m.key()));
    header.push("expenses_per_fte");
    header.extend(Endpoint::ALL.iter().map(|e| e.raw_label()));
    wtr.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.unit_id.get().to_string(),
            row.name.clone().unwrap_or_default(),
            row.year.to_string(),
        ];
        record.extend(metrics.iter().map(|&m| fmt_value(row.get(m))));
        record.push(fmt_value(row.per_fte(CanonicalMetric::LibraryExpenses)));
        for endpoint in Endpoint::ALL {
            record.push(row.raw.get(endpoint.raw_label()).cloned().unwrap_or_default());
        }
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn fmt_value(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Paths written by [`save_collection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionArtifacts {
    pub csv: PathBuf,
    pub sqlite: PathBuf,
}

/// Save a sweep as `{prefix}_{stamp}.csv` plus `{prefix}_{stamp}.sqlite`
/// (the `observations` table, with provenance).
pub fn save_collection(
    outcome: &CollectOutcome,
    metrics: &[CanonicalMetric],
    output_dir: &Path,
    prefix: &str,
    stamp: &str,
) -> Result<CollectionArtifacts> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    let stem = format!("{prefix}_{stamp}");

    let csv_path = unique_artifact_path(output_dir, &stem, "csv");
    let csv = export_rows_csv(&outcome.rows, metrics)?;
    std::fs::write(&csv_path, csv)
        .with_context(|| format!("failed to write {}", csv_path.display()))?;
    tracing::info!(path = %csv_path.display(), rows = outcome.rows.len(), "saved CSV");

    let sqlite_path = unique_artifact_path(output_dir, &stem, "sqlite");
    let mut store = Store::create(&sqlite_path, false)?;
    let written = store.write_observations(&outcome.observations)?;
    tracing::info!(path = %sqlite_path.display(), observations = written, "saved observations");

    Ok(CollectionArtifacts {
        csv: csv_path,
        sqlite: sqlite_path,
    })
}
