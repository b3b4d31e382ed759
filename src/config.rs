//! Engine configuration
//!
//! Read from `<config_dir>/prosopa/config.toml` unless a path is given. A
//! missing default file means built-in defaults. Configured checks and
//! cascade steps are appended after the built-in ones for their entity type;
//! configured relations replace built-in relations of the same name.

use crate::graph::EntityType;
use crate::guard::{CascadeStep, DependencyCheck, RuleSet};
use crate::merge::{RelationCatalog, RelationSpec};
use crate::storage::{StorageError, DEFAULT_BUSY_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] StorageError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
    #[serde(default)]
    pub cascades: Vec<CascadeEntry>,
    #[serde(default)]
    pub relations: Vec<RelationSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Defaults to [`default_db_path`]
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_busy_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_BUSY_TIMEOUT.as_millis()).unwrap_or(5000)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub entity: EntityType,
    #[serde(flatten)]
    pub check: DependencyCheck,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeEntry {
    pub entity: EntityType,
    #[serde(flatten)]
    pub step: CascadeStep,
}

impl FromStr for EngineConfig {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

impl EngineConfig {
    /// Load a configuration file; a missing file is an error here
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse().map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the per-user configuration, falling back to defaults
    pub fn load_default() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.database.path.clone().unwrap_or_else(default_db_path)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.database.busy_timeout_ms)
    }

    /// Built-in rules extended with the configured checks and cascade steps
    pub fn rule_set(&self) -> Result<RuleSet, ConfigError> {
        let mut rules = RuleSet::builtin();
        for entry in &self.dependencies {
            rules.add_check(entry.entity, entry.check.clone())?;
        }
        for entry in &self.cascades {
            rules.add_cascade(entry.entity, entry.step.clone())?;
        }
        Ok(rules)
    }

    /// Built-in relations extended with the configured ones
    pub fn relation_catalog(&self) -> Result<RelationCatalog, ConfigError> {
        let mut catalog = RelationCatalog::builtin();
        for spec in &self.relations {
            catalog.add(spec.clone())?;
        }
        Ok(catalog)
    }
}

/// `<config_dir>/prosopa/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("prosopa").join("config.toml"))
}

/// Default database path (~/.local/share/prosopa/prosopa.db)
pub fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir().unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("prosopa").join("prosopa.db")
}
