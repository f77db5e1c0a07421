use super::UnitId;
use serde::{Deserialize, Serialize};

/// Reference data for one consortium member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionRecord {
    #[serde(rename = "unitid")]
    pub unit_id: UnitId,
    pub name: String,
}

impl InstitutionRecord {
    pub fn new(unit_id: impl Into<UnitId>, name: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            name: name.into(),
        }
    }
}
