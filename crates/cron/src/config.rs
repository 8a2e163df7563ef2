use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;

/// Built-in defaults, the lowest-priority configuration layer.
pub const DEFAULTS: &str = r#"
[database]
url = ""
max_connections = 2
min_connections = 0
connect_timeout_secs = 10
idle_timeout_secs = 600
statement_timeout_secs = 0

[logging]
level = "info"
format = "json"

[metrics]
enabled = false

[catalog]
external_jobs = ["fetch-adi-from-hive"]

[job]
list = false
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub job: JobRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default)]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Abort a procedure call running longer than this, 0 means no limit.
    #[serde(default)]
    pub statement_timeout_secs: u64,
}

impl From<&DatabaseConfig> for persistence::db::DatabaseConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connect_timeout_secs: config.connect_timeout_secs,
            idle_timeout_secs: config.idle_timeout_secs,
            statement_timeout_secs: config.statement_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Prometheus metrics written for the node exporter textfile collector.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// File the metrics are written to after the run
    #[serde(default)]
    pub textfile_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Jobs owned by other pipelines that catalog jobs may depend on
    #[serde(default = "default_external_jobs")]
    pub external_jobs: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            external_jobs: default_external_jobs(),
        }
    }
}

/// What the invocation was asked to do.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub run_date: Option<String>,

    #[serde(default)]
    pub list: bool,
}

impl JobRequest {
    /// Parse the requested run date.
    ///
    /// Accepts RFC 3339 (converted to UTC), `YYYY-MM-DDTHH:MM:SS`,
    /// `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD` (midnight).
    pub fn run_date(&self) -> Result<Option<NaiveDateTime>, ConfigValidationError> {
        let Some(raw) = self.run_date.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if raw.is_empty() {
            return Ok(None);
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Some(dt.naive_utc()));
        }
        for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
                return Ok(Some(dt));
            }
        }
        if let Some(dt) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Ok(Some(dt));
        }

        Err(ConfigValidationError::InvalidValue(format!(
            "job.run_date is not a date or datetime: {:?}",
            raw
        )))
    }
}

// Default value functions
fn default_max_connections() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_external_jobs() -> Vec<String> {
    domain::models::DEFAULT_EXTERNAL_JOBS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Settings {
    /// Load settings for testing from the built-in defaults plus overrides.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULTS, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        // Listing the catalog never touches the database
        if !self.job.list && self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "MATVIEW__DATABASE__URL environment variable or database.url must be set"
                    .to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "max_connections cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.metrics.enabled && self.metrics.textfile_path.is_none() {
            return Err(ConfigValidationError::MissingRequired(
                "metrics.textfile_path must be set when metrics are enabled".to_string(),
            ));
        }

        self.job.run_date()?;

        Ok(())
    }
}
