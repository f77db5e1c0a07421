//! Institution × year sweep over the survey API.
//!
//! Calls are strictly sequential with a fixed pause after each pair. A failed
//! call is reported through the progress callback and its metrics stay
//! missing; nothing is retried.

use ipedslab_core::data::{snapshot_hash, Endpoint, FetchProgress, SurveyApi};
use ipedslab_core::domain::{
    AcademicYear, CanonicalMetric, CanonicalRow, DataSource, MetricObservation, ObservationSet,
    Provenance, UnitId,
};
use ipedslab_core::reconcile::SchemaReconciler;
use ipedslab_core::Registry;
use std::collections::BTreeMap;
use std::time::Duration;

/// Metrics carried by the API endpoints, in output column order.
pub const API_METRICS: [CanonicalMetric; 3] = [
    CanonicalMetric::LibraryExpenses,
    CanonicalMetric::DatabaseCount,
    CanonicalMetric::Fte,
];

#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub years: Vec<AcademicYear>,
    pub delay: Duration,
}

/// Counts reported after a sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectSummary {
    pub institutions: usize,
    pub years: usize,
    pub rows: usize,
    pub calls: usize,
    pub failed_calls: usize,
    /// Rows per year with at least one endpoint record.
    pub records_per_year: BTreeMap<AcademicYear, usize>,
    pub missing: BTreeMap<CanonicalMetric, usize>,
}

impl CollectSummary {
    pub fn missing_pct(&self, metric: CanonicalMetric) -> f64 {
        if self.rows == 0 {
            return 0.0;
        }
        *self.missing.get(&metric).unwrap_or(&0) as f64 / self.rows as f64 * 100.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectOutcome {
    /// One row per (institution, year), institution-major.
    pub rows: Vec<CanonicalRow>,
    pub observations: ObservationSet,
    pub summary: CollectSummary,
}

/// Fetch both endpoints for every registered institution and year.
pub fn collect_all(
    api: &dyn SurveyApi,
    registry: &Registry,
    reconciler: &SchemaReconciler,
    opts: &CollectOptions,
    progress: &dyn FetchProgress,
) -> CollectOutcome {
    let total = registry.len() * opts.years.len();
    tracing::info!(
        api = api.name(),
        institutions = registry.len(),
        years = opts.years.len(),
        calls = total * Endpoint::ALL.len(),
        "starting collection"
    );

    let mut outcome = CollectOutcome::default();
    let mut raw: BTreeMap<(UnitId, AcademicYear), BTreeMap<String, String>> = BTreeMap::new();
    let mut index = 0;
    for inst in registry.institutions() {
        for &year in &opts.years {
            progress.on_start(inst.unit_id, year, index, total);
            index += 1;

            let snapshots = raw.entry((inst.unit_id, year)).or_default();
            for endpoint in Endpoint::ALL {
                outcome.summary.calls += 1;
                let records = match api.fetch(endpoint, inst.unit_id, year) {
                    Ok(records) => records,
                    Err(e) => {
                        outcome.summary.failed_calls += 1;
                        progress.on_error(inst.unit_id, year, endpoint, &e);
                        Vec::new()
                    }
                };

                let Some(record) = records.first() else {
                    for &metric in endpoint.metrics() {
                        let obs = unresolved(inst.unit_id, year, metric);
                        insert_logged(&mut outcome.observations, obs);
                    }
                    continue;
                };

                let hash = snapshot_hash(record);
                let normalized = reconciler.reconcile(year, record);
                for obs in normalized.observations(
                    inst.unit_id,
                    endpoint.metrics(),
                    DataSource::EducationDataPortal,
                    Some(&hash),
                ) {
                    insert_logged(&mut outcome.observations, obs);
                }
                snapshots.insert(
                    endpoint.raw_label().to_string(),
                    serde_json::to_string(record).unwrap_or_default(),
                );
            }

            if !snapshots.is_empty() {
                *outcome.summary.records_per_year.entry(year).or_default() += 1;
            }
            if !opts.delay.is_zero() {
                std::thread::sleep(opts.delay);
            }
        }
    }

    outcome.rows = outcome.observations.rows(registry.institutions(), &opts.years);
    for row in &mut outcome.rows {
        if let Some(snapshots) = raw.remove(&(row.unit_id, row.year)) {
            row.raw = snapshots;
        }
        for metric in API_METRICS {
            if row.get(metric).is_none() {
                *outcome.summary.missing.entry(metric).or_default() += 1;
            }
        }
    }

    outcome.summary.institutions = registry.len();
    outcome.summary.years = opts.years.len();
    outcome.summary.rows = outcome.rows.len();
    progress.on_batch_complete(outcome.summary.rows, outcome.summary.failed_calls);
    outcome
}

fn unresolved(unit_id: UnitId, year: AcademicYear, metric: CanonicalMetric) -> MetricObservation {
    MetricObservation {
        unit_id,
        year,
        metric,
        value: None,
        provenance: Provenance::new(DataSource::EducationDataPortal),
    }
}

fn insert_logged(set: &mut ObservationSet, obs: MetricObservation) {
    if let Err(e) = set.insert(obs) {
        tracing::warn!("{e}");
    }
}
