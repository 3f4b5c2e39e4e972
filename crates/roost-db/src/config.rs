//! Configuration loading and typed config structures for the storage layer.
//!
//! The configuration selects exactly one backend for the life of the
//! process and carries the settings that backend needs. It is read from a
//! YAML file (or string); every field has a default, so an empty document
//! yields a working snapshot-file setup.
//!
//! ```yaml
//! backend: relational
//! snapshot:
//!   path: "roost.json"
//! relational:
//!   host: "localhost"
//!   port: 5432
//!   user: "roost"
//!   password: "roost_dev"
//!   database: "roost"
//! logging:
//!   level: "info"
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

use crate::postgres::PostgresConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An override carried a value that does not parse.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue {
        /// The environment variable name.
        key: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Which storage engine backs the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Flat snapshot file.
    #[default]
    Snapshot,
    /// `PostgreSQL` database.
    Relational,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snapshot" | "file" => Ok(Self::Snapshot),
            "relational" | "db" | "postgres" => Ok(Self::Relational),
            _ => Err(s.to_owned()),
        }
    }
}

/// Top-level storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Selected backend.
    #[serde(default)]
    pub backend: Backend,

    /// Snapshot-file backend settings.
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Relational backend settings.
    #[serde(default)]
    pub relational: RelationalConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StorageConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override file values, see
    /// [`StorageConfig::apply_overrides`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::InvalidValue`] if an override does not parse.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string and apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::InvalidValue`] if an override does not parse.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override values from a variable lookup (the process environment in
    /// [`StorageConfig::parse`]).
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `STORAGE_BACKEND` | `backend` |
    /// | `SNAPSHOT_PATH` | `snapshot.path` |
    /// | `PGHOST` | `relational.host` |
    /// | `PGPORT` | `relational.port` |
    /// | `PGUSER` | `relational.user` |
    /// | `PGPASSWORD` | `relational.password` |
    /// | `PGDATABASE` | `relational.database` |
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an unknown backend name or
    /// a non-numeric port.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("STORAGE_BACKEND") {
            self.backend = value.parse().map_err(|value| ConfigError::InvalidValue {
                key: "STORAGE_BACKEND",
                value,
            })?;
        }
        if let Some(value) = lookup("SNAPSHOT_PATH") {
            self.snapshot.path = PathBuf::from(value);
        }
        if let Some(value) = lookup("PGHOST") {
            self.relational.host = value;
        }
        if let Some(value) = lookup("PGPORT") {
            self.relational.port =
                value
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                        key: "PGPORT",
                        value: format!("{value} ({e})"),
                    })?;
        }
        if let Some(value) = lookup("PGUSER") {
            self.relational.user = value;
        }
        if let Some(value) = lookup("PGPASSWORD") {
            self.relational.password = value;
        }
        if let Some(value) = lookup("PGDATABASE") {
            self.relational.database = value;
        }
        Ok(())
    }
}

/// Snapshot-file backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SnapshotConfig {
    /// Location of the snapshot artifact.
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
        }
    }
}

/// Relational backend settings.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct RelationalConfig {
    /// Server host name.
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Login role.
    #[serde(default = "default_user")]
    pub user: String,

    /// Login password.
    #[serde(default = "default_password")]
    pub password: String,

    /// Database name.
    #[serde(default = "default_database")]
    pub database: String,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Milliseconds to wait for a connection before failing.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Milliseconds an idle connection is kept open.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl RelationalConfig {
    /// Connection options for this server and database.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }

    /// Pool configuration derived from these settings.
    pub fn pool_config(&self) -> PostgresConfig {
        PostgresConfig::new(self.connect_options())
            .with_max_connections(self.max_connections)
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_idle_timeout(Duration::from_millis(self.idle_timeout_ms))
    }
}

impl core::fmt::Debug for RelationalConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RelationalConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("idle_timeout_ms", &self.idle_timeout_ms)
            .finish()
    }
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: default_password(),
            database: default_database(),
            max_connections: default_max_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("roost.json")
}

fn default_host() -> String {
    "localhost".to_owned()
}

const fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "roost".to_owned()
}

fn default_password() -> String {
    "roost_dev".to_owned()
}

fn default_database() -> String {
    "roost".to_owned()
}

const fn default_max_connections() -> u32 {
    5
}

const fn default_connect_timeout_ms() -> u64 {
    5_000
}

const fn default_idle_timeout_ms() -> u64 {
    300_000
}

fn default_log_level() -> String {
    "info".to_owned()
}
