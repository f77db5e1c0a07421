use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// IPEDS unit identifier: a fixed six-digit institution code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u32);

impl UnitId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Interpret a JSON value as a unit id.
    ///
    /// Desktop databases frequently export integer keys as floats (`156189.0`),
    /// so whole-valued floats are accepted; anything with a fractional part is not.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_u64() {
                    u32::try_from(i).ok().map(Self)
                } else {
                    n.as_f64().and_then(Self::from_f64)
                }
            }
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn from_f64(v: f64) -> Option<Self> {
        if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 {
            Some(Self(v as u32))
        } else {
            None
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

impl FromStr for UnitId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(i) = trimmed.parse::<u32>() {
            return Ok(Self(i));
        }
        trimmed
            .parse::<f64>()
            .ok()
            .and_then(Self::from_f64)
            .ok_or_else(|| format!("invalid unit id: {s:?}"))
    }
}

impl From<u32> for UnitId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// IPEDS survey year. `2023` is the 2022-23 academic year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AcademicYear(pub i32);

impl AcademicYear {
    pub fn new(year: i32) -> Self {
        Self(year)
    }

    pub fn get(self) -> i32 {
        self.0
    }

    /// Two-digit form: `2023` -> `"23"`.
    pub fn short(self) -> String {
        format!("{:02}", self.0.rem_euclid(100))
    }

    /// Release span used in database file names: `2019` -> `"201920"`.
    pub fn span(self) -> String {
        format!("{}{:02}", self.0, (self.0 + 1).rem_euclid(100))
    }

    /// `IPEDS201920.accdb` for 2019.
    pub fn accdb_file_name(self) -> String {
        format!("IPEDS{}.accdb", self.span())
    }

    /// `IPEDS201920TablesDoc.xlsx` for 2019.
    pub fn tables_doc_file_name(self) -> String {
        format!("IPEDS{}TablesDoc.xlsx", self.span())
    }

    /// Variable sheet inside the tables doc: `vartable19` for 2019.
    pub fn vartable_sheet(self) -> String {
        format!("vartable{}", self.short())
    }

    /// Finance table for the fiscal year ending in this survey year:
    /// `2023` -> `F2223_F2`.
    pub fn finance_table(self) -> String {
        format!(
            "F{:02}{:02}_F2",
            (self.0 - 1).rem_euclid(100),
            self.0.rem_euclid(100)
        )
    }
}

impl fmt::Display for AcademicYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for AcademicYear {
    fn from(year: i32) -> Self {
        Self(year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unit_id_displays_fixed_width() {
        assert_eq!(UnitId(156189).to_string(), "156189");
        assert_eq!(UnitId(1234).to_string(), "001234");
    }

    #[test]
    fn unit_id_accepts_whole_floats_only() {
        assert_eq!(UnitId::from_json(&json!(156189)), Some(UnitId(156189)));
        assert_eq!(UnitId::from_json(&json!(156189.0)), Some(UnitId(156189)));
        assert_eq!(UnitId::from_json(&json!("220473")), Some(UnitId(220473)));
        assert_eq!(UnitId::from_json(&json!(1.5)), None);
        assert_eq!(UnitId::from_json(&json!(null)), None);
        assert!("abc".parse::<UnitId>().is_err());
    }

    #[test]
    fn year_file_names() {
        let y = AcademicYear(2019);
        assert_eq!(y.accdb_file_name(), "IPEDS201920.accdb");
        assert_eq!(y.tables_doc_file_name(), "IPEDS201920TablesDoc.xlsx");
        assert_eq!(y.vartable_sheet(), "vartable19");
    }

    #[test]
    fn finance_table_uses_fiscal_span() {
        assert_eq!(AcademicYear(2023).finance_table(), "F2223_F2");
        assert_eq!(AcademicYear(2000).finance_table(), "F9900_F2");
    }
}
