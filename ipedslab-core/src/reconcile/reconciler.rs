use super::aliases::AliasTable;
use super::name_map::VariableNameMap;
use crate::data::RawRecord;
use crate::domain::{
    AcademicYear, CanonicalMetric, DataSource, MetricObservation, Provenance, UnitId,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// A value resolved for one canonical metric, with the raw field it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedValue {
    pub value: f64,
    pub raw_field: String,
}

/// Canonical view of one raw record.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub year: AcademicYear,
    pub values: BTreeMap<CanonicalMetric, ResolvedValue>,
}

impl NormalizedRecord {
    pub fn get(&self, metric: CanonicalMetric) -> Option<f64> {
        self.values.get(&metric).map(|r| r.value)
    }

    /// One observation per requested metric; unresolved metrics become
    /// observations with no value.
    pub fn observations(
        &self,
        unit_id: UnitId,
        metrics: &[CanonicalMetric],
        source: DataSource,
        snapshot_hash: Option<&str>,
    ) -> Vec<MetricObservation> {
        metrics
            .iter()
            .map(|&metric| {
                let resolved = self.values.get(&metric);
                MetricObservation {
                    unit_id,
                    year: self.year,
                    metric,
                    value: resolved.map(|r| r.value),
                    provenance: Provenance {
                        source,
                        raw_field: resolved.map(|r| r.raw_field.clone()),
                        snapshot_hash: snapshot_hash.map(str::to_string),
                    },
                }
            })
            .collect()
    }
}

/// Maps year-specific raw field names onto canonical metrics.
#[derive(Debug, Clone, Default)]
pub struct SchemaReconciler {
    aliases: AliasTable,
    name_map: VariableNameMap,
}

impl SchemaReconciler {
    pub fn new(aliases: AliasTable, name_map: VariableNameMap) -> Self {
        Self { aliases, name_map }
    }

    /// Standard aliases only, no per-year documentation.
    pub fn standard() -> Self {
        Self::default()
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn name_map(&self) -> &VariableNameMap {
        &self.name_map
    }

    /// Canonical metric for `raw` in `year`. The year's documented fields are
    /// authoritative when that year is mapped.
    pub fn resolve_field(&self, year: AcademicYear, raw: &str) -> Option<CanonicalMetric> {
        if self.name_map.has_year(year) {
            if let Some(entry) = self.name_map.lookup(year, raw) {
                return Some(entry.metric);
            }
        }
        self.aliases.lookup(raw)
    }

    /// Raw field names to try for `metric` in `year`, highest priority first.
    pub fn candidates(&self, year: AcademicYear, metric: CanonicalMetric) -> Vec<String> {
        let mut documented: Vec<&str> = self
            .name_map
            .entries_for(year)
            .iter()
            .filter(|e| e.metric == metric)
            .map(|e| e.raw_field.as_str())
            .collect();
        documented.sort_by_key(|raw| self.aliases.priority(metric, raw).unwrap_or(usize::MAX));

        let mut out: Vec<String> = Vec::new();
        let known = |out: &[String], raw: &str| out.iter().any(|c| c.eq_ignore_ascii_case(raw));
        for raw in documented {
            if !known(&out, raw) {
                out.push(raw.to_string());
            }
        }
        for raw in self.aliases.aliases(metric) {
            if !known(&out, raw) {
                out.push(raw.clone());
            }
        }
        out
    }

    /// Resolve every canonical metric from a raw record. For each metric the
    /// first candidate present with a numeric value wins; anything else is
    /// left unresolved.
    pub fn reconcile(&self, year: AcademicYear, record: &RawRecord) -> NormalizedRecord {
        let mut values = BTreeMap::new();
        for metric in CanonicalMetric::ALL {
            for raw in self.candidates(year, metric) {
                let Some((field, value)) = find_field(record, &raw) else {
                    continue;
                };
                if let Some(v) = numeric(value) {
                    values.insert(
                        metric,
                        ResolvedValue {
                            value: v,
                            raw_field: field.to_string(),
                        },
                    );
                    break;
                }
            }
        }
        NormalizedRecord { year, values }
    }
}

/// Exact key first, then a case-insensitive match.
fn find_field<'a>(record: &'a RawRecord, raw: &str) -> Option<(&'a str, &'a Value)> {
    if let Some((k, v)) = record.get_key_value(raw) {
        return Some((k.as_str(), v));
    }
    record
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(raw))
        .map(|(k, v)| (k.as_str(), v))
}

/// Numbers and numeric strings; null, blanks and other types are absent.
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s
            .trim()
            .replace(',', "")
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn first_non_null_alias_wins() {
        let r = SchemaReconciler::standard();
        let rec = record(&[
            ("total_expenses", Value::Null),
            ("ltotexpn", json!(125000)),
            ("LEXPTOT", json!(999)),
        ]);
        let out = r.reconcile(AcademicYear(2020), &rec);
        let lib = &out.values[&CanonicalMetric::LibraryExpenses];
        assert_eq!(lib.value, 125000.0);
        assert_eq!(lib.raw_field, "ltotexpn");
    }

    #[test]
    fn zero_is_a_value_and_missing_is_absent() {
        let r = SchemaReconciler::standard();
        let rec = record(&[("database_count", json!(0)), ("unitid", json!(156189))]);
        let out = r.reconcile(AcademicYear(2020), &rec);
        assert_eq!(out.get(CanonicalMetric::DatabaseCount), Some(0.0));
        assert_eq!(out.get(CanonicalMetric::Fte), None);
        assert_eq!(out.get(CanonicalMetric::LibraryExpenses), None);
    }

    #[test]
    fn numeric_strings_are_parsed() {
        assert_eq!(numeric(&json!(" 1,234.5 ")), Some(1234.5));
        assert_eq!(numeric(&json!("n/a")), None);
        assert_eq!(numeric(&json!(true)), None);
        assert_eq!(numeric(&Value::Null), None);
    }

    #[test]
    fn renamed_fields_resolve_case_insensitively() {
        let r = SchemaReconciler::standard();
        let rec = record(&[("EFYTOTLT", json!("1450"))]);
        let out = r.reconcile(AcademicYear(2016), &rec);
        let fte = &out.values[&CanonicalMetric::Fte];
        assert_eq!(fte.value, 1450.0);
        assert_eq!(fte.raw_field, "EFYTOTLT");
    }

    #[test]
    fn documented_year_fields_come_first() {
        let mut map = VariableNameMap::new();
        let year = AcademicYear(2021);
        map.add_year(year, [("LEXPTOT", "Total expenditures")], &AliasTable::standard());
        let r = SchemaReconciler::new(AliasTable::standard(), map);

        let c = r.candidates(year, CanonicalMetric::LibraryExpenses);
        assert_eq!(c, vec!["LEXPTOT", "total_expenses", "ltotexpn"]);

        let rec = record(&[("total_expenses", json!(1)), ("LEXPTOT", json!(2))]);
        assert_eq!(r.reconcile(year, &rec).get(CanonicalMetric::LibraryExpenses), Some(2.0));
        // Other years still use the standard order.
        assert_eq!(
            r.reconcile(AcademicYear(2020), &rec).get(CanonicalMetric::LibraryExpenses),
            Some(1.0)
        );
    }

    #[test]
    fn resolve_field_prefers_year_map() {
        let r = SchemaReconciler::standard();
        assert_eq!(
            r.resolve_field(AcademicYear(2022), "ldbs"),
            Some(CanonicalMetric::DatabaseCount)
        );
        assert_eq!(r.resolve_field(AcademicYear(2022), "INSTNM"), None);
    }

    #[test]
    fn observations_keep_provenance() {
        let r = SchemaReconciler::standard();
        let rec = record(&[("fte", json!(587))]);
        let obs = r.reconcile(AcademicYear(2020), &rec).observations(
            UnitId(156189),
            &[CanonicalMetric::Fte, CanonicalMetric::LibraryExpenses],
            DataSource::EducationDataPortal,
            Some("abc"),
        );
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].value, Some(587.0));
        assert_eq!(obs[0].provenance.raw_field.as_deref(), Some("fte"));
        assert_eq!(obs[1].value, None);
        assert_eq!(obs[1].provenance.snapshot_hash.as_deref(), Some("abc"));
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            (-1.0e9f64..1.0e9).prop_map(|v| json!(v)),
            (0i64..100_000).prop_map(|v| json!(v.to_string())),
            "[a-z]{0,4}".prop_map(Value::String),
        ]
    }

    fn arb_record() -> impl Strategy<Value = RawRecord> {
        let keys = prop::sample::select(vec![
            "total_expenses", "LTOTEXPN", "LEXPTOT", "database_count", "LDBS", "fte",
            "FTE_TOTAL", "efytotlt", "F2E131", "unitid", "year", "inst_name",
        ]);
        prop::collection::btree_map(keys.prop_map(String::from), arb_value(), 0..10)
    }

    proptest! {
        #[test]
        fn reconcile_is_deterministic(rec in arb_record(), year in 2013i32..2025) {
            let r = SchemaReconciler::standard();
            let a = r.reconcile(AcademicYear(year), &rec);
            let b = r.reconcile(AcademicYear(year), &rec.clone());
            prop_assert_eq!(a, b);
        }

        #[test]
        fn resolved_fields_exist_in_record(rec in arb_record()) {
            let out = SchemaReconciler::standard().reconcile(AcademicYear(2020), &rec);
            for (metric, resolved) in &out.values {
                prop_assert!(rec.contains_key(&resolved.raw_field));
                let reconciler = SchemaReconciler::standard();
                prop_assert_eq!(
                    reconciler.resolve_field(AcademicYear(2020), &resolved.raw_field),
                    Some(*metric)
                );
            }
        }
    }
}
