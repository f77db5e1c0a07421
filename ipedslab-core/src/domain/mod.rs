//! Domain types: identifiers, institutions, canonical metrics, observations.

pub mod ids;
pub mod institution;
pub mod metric;
pub mod observation;

pub use ids::{AcademicYear, UnitId};
pub use institution::InstitutionRecord;
pub use metric::CanonicalMetric;
pub use observation::{
    per_fte, CanonicalRow, DataSource, MetricObservation, ObservationKey, ObservationSet,
    Provenance,
};
