//! TOML harvest configuration.
//!
//! Every field has a default, so an empty file (or no file at all) gives the
//! standard consortium setup.

use ipedslab_core::data::portal::DEFAULT_BASE_URL;
use ipedslab_core::domain::{AcademicYear, UnitId};
use ipedslab_core::registry::{Registry, RegistryError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Inclusive range of survey years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub first: i32,
    pub last: i32,
}

impl YearRange {
    pub fn new(first: i32, last: i32) -> Self {
        Self { first, last }
    }

    pub fn years(&self) -> Vec<AcademicYear> {
        (self.first..=self.last).map(AcademicYear).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.first > self.last
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    /// Pause after each institution × year pair.
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
    /// Upper bound on `next` pages followed per query.
    pub max_pages: usize,
    pub years: YearRange,
    /// Registry members left out of API sweeps.
    pub exclude_units: Vec<UnitId>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_delay_ms: 500,
            timeout_secs: 30,
            max_pages: 20,
            years: YearRange::new(2013, 2024),
            // Johnson University Florida is only tracked through the release imports.
            exclude_units: vec![UnitId(132879)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub years: YearRange,
    /// Directory holding `mdb-tables` / `mdb-export`; `PATH` when unset.
    pub mdb_bin_dir: Option<PathBuf>,
    /// Years with `IPEDS{span}TablesDoc.xlsx` documentation.
    pub titles_years: YearRange,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            years: YearRange::new(2019, 2024),
            mdb_bin_dir: None,
            titles_years: YearRange::new(2019, 2024),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Where `.accdb` files, documentation workbooks and CSV exports live.
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub store: PathBuf,
    /// Institution list; the built-in consortium when unset.
    pub registry: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            store: PathBuf::from("bcla_library.sqlite"),
            registry: None,
        }
    }
}

/// Prefixes of generated and discovered files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactNames {
    pub collection: String,
    pub library_report: String,
    pub fte_report: String,
    pub data_center_export: String,
}

impl Default for ArtifactNames {
    fn default() -> Self {
        Self {
            collection: "bcla_ipeds_data".into(),
            library_report: "BCLA_Library".into(),
            fte_report: "ACA_Member_FTE_Expenses".into(),
            data_center_export: "aca-ipeds-fte-f2e131-".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub api: ApiSettings,
    pub database: DatabaseSettings,
    pub paths: PathSettings,
    pub names: ArtifactNames,
}

impl HarvestConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Load `path` if given, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (label, range) in [
            ("api.years", self.api.years),
            ("database.years", self.database.years),
            ("database.titles_years", self.database.titles_years),
        ] {
            if range.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{label}: first ({}) is after last ({})",
                    range.first, range.last
                )));
            }
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs must be positive".into()));
        }
        if self.api.max_pages == 0 {
            return Err(ConfigError::Invalid("api.max_pages must be positive".into()));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url is empty".into()));
        }
        Ok(())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.api.request_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn registry(&self) -> Result<Registry, RegistryError> {
        match &self.paths.registry {
            Some(path) => Registry::from_file(path),
            None => Ok(Registry::consortium()),
        }
    }

    /// Members swept by `collect`: the registry without `api.exclude_units`,
    /// narrowed to `only` when it is non-empty.
    pub fn collection_registry(&self, only: &[UnitId]) -> Result<Registry, RegistryError> {
        let registry = self.registry()?;
        if let Some(&unknown) = only.iter().find(|id| !registry.contains(**id)) {
            return Err(RegistryError::NotMember(unknown));
        }
        let keep: Vec<UnitId> = registry
            .unit_ids()
            .into_iter()
            .filter(|id| only.is_empty() || only.contains(id))
            .filter(|id| only.contains(id) || !self.api.exclude_units.contains(id))
            .collect();
        registry.restricted_to(&keep)
    }
}
