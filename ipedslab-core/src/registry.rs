//! Institution registry — the fixed consortium membership list.
//!
//! The registry can be loaded from a TOML file:
//!
//! ```toml
//! [[institution]]
//! unitid = 156189
//! name = "Alice Lloyd College"
//! ```
//!
//! or taken from the built-in consortium list.

use crate::domain::{InstitutionRecord, UnitId};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("read registry file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse registry TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate unit id {0} in registry")]
    Duplicate(UnitId),

    #[error("registry is empty")]
    Empty,

    #[error("unit id {0} is not in the registry")]
    NotMember(UnitId),
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(rename = "institution")]
    institutions: Vec<InstitutionRecord>,
}

/// Ordered, duplicate-free list of member institutions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    institutions: Vec<InstitutionRecord>,
}

const CONSORTIUM: &[(u32, &str)] = &[
    (156189, "Alice Lloyd College"),
    (156295, "Berea College"),
    (237181, "Bethany College"),
    (231554, "Bluefield University"),
    (198066, "Brevard College"),
    (219790, "Bryan College-Dayton"),
    (156365, "Campbellsville University"),
    (219806, "Carson-Newman University"),
    (237358, "Davis & Elkins College"),
    (232025, "Emory & Henry University"),
    (232089, "Ferrum College"),
    (220473, "Johnson University"),
    (132879, "Johnson University Florida"),
    (157100, "Kentucky Christian University"),
    (220516, "King University"),
    (220613, "Lee University"),
    (198808, "Lees-McRae College"),
    (198835, "Lenoir-Rhyne University"),
    (220631, "Lincoln Memorial University"),
    (157216, "Lindsey Wilson College"),
    (198899, "Mars Hill University"),
    (220710, "Maryville College"),
    (486901, "Milligan University"),
    (199032, "Montreat College"),
    (221731, "Tennessee Wesleyan University"),
    (221519, "The University of the South"),
    (221953, "Tusculum University"),
    (157863, "Union College"),
    (237312, "University of Charleston"),
    (157535, "University of Pikeville"),
    (199865, "Warren Wilson College"),
    (237969, "West Virginia Wesleyan College"),
    (238078, "Wheeling University"),
    (141361, "Young Harris College"),
];

impl Registry {
    /// Build a registry, rejecting duplicates and empty lists.
    pub fn new(institutions: Vec<InstitutionRecord>) -> Result<Self, RegistryError> {
        if institutions.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut seen = HashSet::new();
        for inst in &institutions {
            if !seen.insert(inst.unit_id) {
                return Err(RegistryError::Duplicate(inst.unit_id));
            }
        }
        Ok(Self { institutions })
    }

    /// The built-in consortium membership.
    pub fn consortium() -> Self {
        Self {
            institutions: CONSORTIUM
                .iter()
                .map(|&(id, name)| InstitutionRecord::new(id, name))
                .collect(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = toml::from_str(content)?;
        Self::new(file.institutions)
    }

    pub fn institutions(&self) -> &[InstitutionRecord] {
        &self.institutions
    }

    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.institutions.iter().map(|i| i.unit_id).collect()
    }

    pub fn contains(&self, unit_id: UnitId) -> bool {
        self.institutions.iter().any(|i| i.unit_id == unit_id)
    }

    pub fn name_of(&self, unit_id: UnitId) -> Option<&str> {
        self.institutions
            .iter()
            .find(|i| i.unit_id == unit_id)
            .map(|i| i.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.institutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.institutions.is_empty()
    }

    /// Keep only the listed unit ids (order preserved).
    pub fn restricted_to(&self, ids: &[UnitId]) -> Result<Self, RegistryError> {
        Self::new(
            self.institutions
                .iter()
                .filter(|i| ids.contains(&i.unit_id))
                .cloned()
                .collect(),
        )
    }
}
