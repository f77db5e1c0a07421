//! ipedslab core: domain types, institution registry, schema reconciliation
//! and source extractors for IPEDS survey data.
//!
//! - Domain types (unit ids, survey years, canonical metrics, observations)
//! - Consortium registry
//! - Schema reconciler mapping renamed raw fields onto canonical metrics
//! - Extractors: Education Data Portal API, survey database tables, Data Center
//!   CSV exports, variable-title workbooks

pub mod data;
pub mod domain;
pub mod reconcile;
pub mod registry;
pub mod titles;

pub use registry::Registry;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: domain and reconciler types are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::UnitId>();
        require_sync::<domain::UnitId>();
        require_send::<domain::AcademicYear>();
        require_sync::<domain::AcademicYear>();
        require_send::<domain::MetricObservation>();
        require_sync::<domain::MetricObservation>();
        require_send::<domain::ObservationSet>();
        require_sync::<domain::ObservationSet>();
        require_send::<domain::CanonicalRow>();
        require_sync::<domain::CanonicalRow>();

        require_send::<Registry>();
        require_sync::<Registry>();
        require_send::<reconcile::SchemaReconciler>();
        require_sync::<reconcile::SchemaReconciler>();
        require_send::<titles::ConsolidatedTitles>();
        require_sync::<titles::ConsolidatedTitles>();

        require_send::<data::EducationDataPortal>();
        require_sync::<data::EducationDataPortal>();
        require_send::<data::Table>();
        require_sync::<data::Table>();
    }

    /// The survey API is object-safe so pipelines can take `&dyn SurveyApi`.
    #[test]
    fn survey_api_is_object_safe() {
        fn _accepts(api: &dyn data::SurveyApi) -> &str {
            api.name()
        }
    }
}
