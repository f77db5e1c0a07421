//! Metric observations and the keyed set that enforces one value per
//! (institution, year, metric).

use super::{AcademicYear, CanonicalMetric, InstitutionRecord, UnitId};
use crate::data::DataError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where an observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    EducationDataPortal,
    AccessDatabase,
    SqliteStore,
    DataCenterCsv,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DataSource::EducationDataPortal => "education_data_portal",
            DataSource::AccessDatabase => "access_database",
            DataSource::SqliteStore => "sqlite_store",
            DataSource::DataCenterCsv => "data_center_csv",
        }
    }
}

/// Provenance of a single value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: DataSource,
    /// Raw field the value was resolved from, if any alias matched.
    pub raw_field: Option<String>,
    /// BLAKE3 digest of the raw record the value was read from.
    pub snapshot_hash: Option<String>,
}

impl Provenance {
    pub fn new(source: DataSource) -> Self {
        Self {
            source,
            raw_field: None,
            snapshot_hash: None,
        }
    }
}

/// One (institution, year, metric) value. A missing value is `None`, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricObservation {
    pub unit_id: UnitId,
    pub year: AcademicYear,
    pub metric: CanonicalMetric,
    pub value: Option<f64>,
    pub provenance: Provenance,
}

pub type ObservationKey = (UnitId, AcademicYear, CanonicalMetric);

impl MetricObservation {
    pub fn key(&self) -> ObservationKey {
        (self.unit_id, self.year, self.metric)
    }
}

/// Observations keyed by (institution, year, metric).
#[derive(Debug, Clone, Default)]
pub struct ObservationSet {
    observations: BTreeMap<ObservationKey, MetricObservation>,
    names: BTreeMap<UnitId, String>,
}

impl ObservationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an observation. A second observation for the same key is rejected.
    pub fn insert(&mut self, obs: MetricObservation) -> Result<(), DataError> {
        let key = obs.key();
        if self.observations.contains_key(&key) {
            return Err(DataError::DuplicateObservation {
                unit_id: key.0,
                year: key.1,
                metric: key.2,
            });
        }
        self.observations.insert(key, obs);
        Ok(())
    }

    /// Record a display name for an institution (first non-empty name wins).
    pub fn note_name(&mut self, unit_id: UnitId, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        self.names
            .entry(unit_id)
            .or_insert_with(|| name.to_string());
    }

    pub fn name_of(&self, unit_id: UnitId) -> Option<&str> {
        self.names.get(&unit_id).map(|s| s.as_str())
    }

    pub fn get(
        &self,
        unit_id: UnitId,
        year: AcademicYear,
        metric: CanonicalMetric,
    ) -> Option<&MetricObservation> {
        self.observations.get(&(unit_id, year, metric))
    }

    pub fn value(
        &self,
        unit_id: UnitId,
        year: AcademicYear,
        metric: CanonicalMetric,
    ) -> Option<f64> {
        self.get(unit_id, year, metric).and_then(|o| o.value)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricObservation> {
        self.observations.values()
    }

    pub fn unit_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self.observations.keys().map(|k| k.0).collect();
        ids.extend(self.names.keys().copied());
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn years(&self) -> Vec<AcademicYear> {
        let mut years: Vec<AcademicYear> = self.observations.keys().map(|k| k.1).collect();
        years.sort();
        years.dedup();
        years
    }

    /// Merge `other` into `self`; on key collisions `other` wins.
    ///
    /// Names already known to `self` are kept; `other` fills gaps.
    pub fn merge_preferring(&mut self, other: ObservationSet) {
        for (key, obs) in other.observations {
            self.observations.insert(key, obs);
        }
        for (id, name) in other.names {
            self.names.entry(id).or_insert(name);
        }
    }

    /// Drop every observation for `year` (used when a preferred source
    /// replaces a whole survey year).
    pub fn remove_year(&mut self, year: AcademicYear) {
        self.observations.retain(|k, _| k.1 != year);
    }

    /// Pivot to one row per (institution, year) pair, institutions in the
    /// order given. Pairs with no observations still get a row.
    pub fn rows(
        &self,
        institutions: &[InstitutionRecord],
        years: &[AcademicYear],
    ) -> Vec<CanonicalRow> {
        let mut rows = Vec::with_capacity(institutions.len() * years.len());
        for inst in institutions {
            for &year in years {
                let mut row = CanonicalRow::new(inst.unit_id, year);
                row.name = Some(inst.name.clone());
                for metric in CanonicalMetric::ALL {
                    if let Some(v) = self.value(inst.unit_id, year, metric) {
                        row.values.insert(metric, v);
                    }
                }
                rows.push(row);
            }
        }
        rows
    }
}

/// One output row: every requested metric for an (institution, year) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRow {
    pub unit_id: UnitId,
    pub name: Option<String>,
    pub year: AcademicYear,
    pub values: BTreeMap<CanonicalMetric, f64>,
    /// Raw source snapshots keyed by endpoint/table label.
    pub raw: BTreeMap<String, String>,
}

impl CanonicalRow {
    pub fn new(unit_id: UnitId, year: AcademicYear) -> Self {
        Self {
            unit_id,
            name: None,
            year,
            values: BTreeMap::new(),
            raw: BTreeMap::new(),
        }
    }

    pub fn get(&self, metric: CanonicalMetric) -> Option<f64> {
        self.values.get(&metric).copied()
    }

    /// `metric / FTE`, or `None` when either side is missing or FTE is zero.
    pub fn per_fte(&self, metric: CanonicalMetric) -> Option<f64> {
        per_fte(self.get(metric), self.get(CanonicalMetric::Fte))
    }
}

/// Per-student ratio helper shared by row types and reports.
pub fn per_fte(numerator: Option<f64>, fte: Option<f64>) -> Option<f64> {
    match (numerator, fte) {
        (Some(n), Some(f)) if f != 0.0 => Some(n / f),
        _ => None,
    }
}
