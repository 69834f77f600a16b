//! Handles settings for the application. Configuration is read from a YAML
//! (or TOML) file and can be overridden with `LEDGERSYNC__*` environment
//! variables, e.g. `LEDGERSYNC__DATABASE__PASSWORD`.
use std::time::Duration;

use clap::ValueEnum;
use config::{Config, ConfigError, Environment, File};
use engine::sinks::relational::PostgresTarget;
use serde::Deserialize;

use crate::error::{AppError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config/ledgersync.yaml";

/// Where a run sends the extracted register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Replace the `ledger` table of a SQL database.
    Relational,
    /// Append missing points to InfluxDB.
    TimeSeries,
    /// Serve the register as JSON over HTTP.
    Serve,
}

#[derive(Debug, Deserialize)]
pub struct Ledger {
    #[serde(default = "default_binary")]
    pub binary: String,
    pub data_dir: String,
    pub data_file: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Server {
    pub host: String,
    pub port: u16,
    pub static_dir: String,
    pub refresh_interval_secs: u64,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 8080,
            static_dir: "static".to_string(),
            refresh_interval_secs: engine::DEFAULT_REFRESH_INTERVAL.as_secs(),
        }
    }
}

impl Server {
    /// Listener address; an empty host binds every interface.
    pub fn bind(&self) -> String {
        let host = if self.host.is_empty() {
            "0.0.0.0"
        } else {
            self.host.as_str()
        };
        format!("{host}:{}", self.port)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub url: Option<String>,
    pub host: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default = "default_db_name")]
    pub name: String,
    #[serde(default = "default_sslmode")]
    pub sslmode: String,
}

impl Database {
    /// Explicit `url`, or a PostgreSQL URL assembled from the parts.
    pub fn url(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        let host = self
            .host
            .as_deref()
            .ok_or(AppError::MissingSetting("database.host"))?;

        Ok(PostgresTarget {
            host,
            user: &self.user,
            password: self.password.as_deref().unwrap_or_default(),
            database: &self.name,
            sslmode: &self.sslmode,
        }
        .url())
    }
}

#[derive(Debug, Deserialize)]
pub struct Influx {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    #[serde(default = "default_measurement")]
    pub measurement: String,
}

/// Deadlines in seconds; absent means wait forever.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub command_secs: Option<u64>,
    pub database_secs: Option<u64>,
    pub time_series_secs: Option<u64>,
}

impl Timeouts {
    pub fn command(&self) -> Option<Duration> {
        self.command_secs.map(Duration::from_secs)
    }

    pub fn database(&self) -> Option<Duration> {
        self.database_secs.map(Duration::from_secs)
    }

    pub fn time_series(&self) -> Option<Duration> {
        self.time_series_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub mode: Mode,
    #[serde(default = "default_level")]
    pub log_level: String,
    pub ledger: Ledger,
    #[serde(default)]
    pub server: Server,
    pub database: Option<Database>,
    pub influx: Option<Influx>,
    #[serde(default)]
    pub timeouts: Timeouts,
}

impl Settings {
    pub fn new(path: &str) -> std::result::Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("LEDGERSYNC").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

fn default_binary() -> String {
    "ledger".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

fn default_db_user() -> String {
    "admin".to_string()
}

fn default_db_name() -> String {
    "ledgerdb".to_string()
}

fn default_sslmode() -> String {
    "require".to_string()
}

fn default_measurement() -> String {
    engine::sinks::influx::DEFAULT_MEASUREMENT.to_string()
}
