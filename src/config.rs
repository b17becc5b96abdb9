//! Configuration for quirk
//!
//! Two distinct pieces live here. `Settings` are session defaults (backend
//! URL, request timeout, poll schedule) loaded from an optional TOML file.
//! `DbConfig` is the ChromaDB connection target the user fills in during the
//! session; it is in-memory only and never persisted.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The five ChromaDB connection fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbField {
    Host,
    Port,
    Tenant,
    Database,
    CollectionId,
}

impl DbField {
    pub const ALL: [DbField; 5] = [
        DbField::Host,
        DbField::Port,
        DbField::Tenant,
        DbField::Database,
        DbField::CollectionId,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DbField::Host => "host",
            DbField::Port => "port",
            DbField::Tenant => "tenant",
            DbField::Database => "database",
            DbField::CollectionId => "collection_id",
        }
    }

    /// Placeholder shown next to an unset field.
    pub fn placeholder(&self) -> &'static str {
        match self {
            DbField::Host => "localhost",
            DbField::Port => "8000",
            DbField::Tenant => "default",
            DbField::Database => "default_db",
            DbField::CollectionId => "550e84...0000",
        }
    }
}

impl FromStr for DbField {
    type Err = crate::error::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "host" => Ok(DbField::Host),
            "port" => Ok(DbField::Port),
            "tenant" => Ok(DbField::Tenant),
            "database" | "db" => Ok(DbField::Database),
            "collection" | "collection_id" => Ok(DbField::CollectionId),
            _ => Err(crate::error::Error::Config(format!(
                "Unknown field '{}'; expected host, port, tenant, database or collection_id",
                value
            ))),
        }
    }
}

/// ChromaDB connection target, filled in field-by-field by the user.
///
/// No field-level format validation happens here (a non-numeric port is
/// passed through and surfaced by the backend's error response).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: String,
    pub tenant: String,
    pub database: String,
    pub collection_id: String,
}

impl DbConfig {
    pub fn set(&mut self, field: DbField, value: impl Into<String>) {
        let value = value.into();
        match field {
            DbField::Host => self.host = value,
            DbField::Port => self.port = value,
            DbField::Tenant => self.tenant = value,
            DbField::Database => self.database = value,
            DbField::CollectionId => self.collection_id = value,
        }
    }

    pub fn get(&self, field: DbField) -> &str {
        match field {
            DbField::Host => &self.host,
            DbField::Port => &self.port,
            DbField::Tenant => &self.tenant,
            DbField::Database => &self.database,
            DbField::CollectionId => &self.collection_id,
        }
    }

    pub fn clear(&mut self) {
        *self = DbConfig::default();
    }

    /// True iff every field is non-blank after trimming. Gates `store`.
    pub fn is_ready(&self) -> bool {
        DbField::ALL
            .iter()
            .all(|field| !self.get(*field).trim().is_empty())
    }

    /// True iff at least one field has been set. Gates `search`, which is
    /// deliberately looser than the `store` gate.
    pub fn is_set(&self) -> bool {
        DbField::ALL
            .iter()
            .any(|field| !self.get(*field).trim().is_empty())
    }
}

/// Session defaults, loaded from an optional TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the quirk backend
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Email to authenticate with at startup
    #[serde(default)]
    pub email: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Job polling schedule
    #[serde(default)]
    pub poll: PollSettings,
}

/// Polling schedule for job status checks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PollSettings {
    /// Delay before the first status check, in seconds
    #[serde(default = "default_poll_initial_delay_secs")]
    pub initial_delay_secs: u64,

    /// Interval between subsequent checks, in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    /// Maximum number of status checks before timing out
    #[serde(default = "default_poll_max_checks")]
    pub max_checks: u32,
}

fn default_backend_url() -> String {
    "http://localhost:9000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_poll_initial_delay_secs() -> u64 {
    5
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_poll_max_checks() -> u32 {
    4
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            email: None,
            timeout_secs: default_timeout_secs(),
            poll: PollSettings::default(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_poll_initial_delay_secs(),
            interval_secs: default_poll_interval_secs(),
            max_checks: default_poll_max_checks(),
        }
    }
}

impl Settings {
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quirk")
            .join("config.toml")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Load from the given path, the default path, or fall back to defaults
    /// when no file exists.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_config_path);

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Settings::default())
        }
    }
}
