//! Worker configuration.
//!
//! Layered: built-in defaults, then an optional TOML file, then environment variables
//! prefixed `CRM__` (nested keys separated by `__`, e.g. `CRM__JOBS__REPORT__TIMEOUT_SECS`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::job::JobName;

pub const ENV_PREFIX: &str = "CRM";

/// File picked up from the working directory when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "crm-worker.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[from] config::ConfigError),

    #[error("config file not found: {0}")]
    MissingFile(PathBuf),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Per-job knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSettings {
    pub timeout_secs: u64,
    pub every_secs: u64,
    pub enabled: bool,
    pub run_on_start: bool,
}

impl JobSettings {
    fn with(timeout_secs: u64, every_secs: u64) -> Self {
        Self {
            timeout_secs,
            every_secs,
            enabled: true,
            run_on_start: false,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn every(&self) -> Duration {
        Duration::from_secs(self.every_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsConfig {
    pub heartbeat: JobSettings,
    pub low_stock: JobSettings,
    pub order_reminders: JobSettings,
    pub report: JobSettings,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            heartbeat: JobSettings::with(5, 5 * 60),
            low_stock: JobSettings::with(10, 12 * 60 * 60),
            order_reminders: JobSettings::with(10, 24 * 60 * 60),
            report: JobSettings::with(10, 7 * 24 * 60 * 60),
        }
    }
}

impl JobsConfig {
    pub fn get(&self, job: JobName) -> &JobSettings {
        match job {
            JobName::Heartbeat => &self.heartbeat,
            JobName::LowStock => &self.low_stock,
            JobName::OrderReminders => &self.order_reminders,
            JobName::Report => &self.report,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub endpoint_url: String,
    pub log_dir: PathBuf,
    /// Postgres URL used by the report fallback; no fallback store when unset.
    pub database_url: Option<String>,
    pub jobs: JobsConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://localhost:8000/graphql".to_string(),
            log_dir: PathBuf::from("/tmp"),
            database_url: None,
            jobs: JobsConfig::default(),
        }
    }
}

/// Longest accepted cadence or timeout (one leap year).
pub const MAX_INTERVAL_SECS: u64 = 366 * 24 * 60 * 60;

impl WorkerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint_url.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint_url must not be empty".to_string()));
        }

        if self.database_url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            return Err(ConfigError::Invalid("database_url must not be empty when set".to_string()));
        }

        for job in JobName::ALL {
            let settings = self.jobs.get(job);
            if settings.timeout_secs == 0 {
                return Err(ConfigError::Invalid(format!("jobs.{job}.timeout_secs must be positive")));
            }
            if settings.every_secs == 0 {
                return Err(ConfigError::Invalid(format!("jobs.{job}.every_secs must be positive")));
            }
            if settings.timeout_secs > MAX_INTERVAL_SECS || settings.every_secs > MAX_INTERVAL_SECS {
                return Err(ConfigError::Invalid(format!(
                    "jobs.{job} timeout_secs and every_secs must not exceed {MAX_INTERVAL_SECS}"
                )));
            }
        }

        Ok(())
    }
}

/// Load and validate the worker configuration.
///
/// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`] is read if present.
pub fn load_config(path: Option<&Path>) -> Result<WorkerConfig, ConfigError> {
    let file = match path {
        Some(path) if !path.exists() => return Err(ConfigError::MissingFile(path.to_path_buf())),
        Some(path) => File::from(path).format(FileFormat::Toml).required(true),
        None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
    };

    info!(path = ?path, "loading worker config");

    let config: WorkerConfig = Config::builder()
        .add_source(Config::try_from(&WorkerConfig::default())?)
        .add_source(file)
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true))
        .build()?
        .try_deserialize()?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_match_the_documented_cadence() {
        let config = WorkerConfig::default();

        assert_eq!(config.endpoint_url, "http://localhost:8000/graphql");
        assert_eq!(config.log_dir, PathBuf::from("/tmp"));
        assert!(config.database_url.is_none());
        assert_eq!(config.jobs.heartbeat.timeout(), Duration::from_secs(5));
        assert_eq!(config.jobs.heartbeat.every(), Duration::from_secs(300));
        assert_eq!(config.jobs.low_stock.every_secs, 43_200);
        assert_eq!(config.jobs.order_reminders.every_secs, 86_400);
        assert_eq!(config.jobs.report.every_secs, 604_800);
        assert!(JobName::ALL.iter().all(|job| config.jobs.get(*job).enabled));
        config.validate().unwrap();
    }

    #[test]
    fn file_overrides_only_the_keys_it_sets() {
        let file = write_config(
            r#"
            endpoint_url = "http://crm.internal:9000/graphql"
            database_url = "postgres://crm@db/crm"

            [jobs.report]
            timeout_secs = 30
            run_on_start = true
            "#,
        );

        let config = load_config(Some(file.path())).unwrap();

        assert_eq!(config.endpoint_url, "http://crm.internal:9000/graphql");
        assert_eq!(config.database_url.as_deref(), Some("postgres://crm@db/crm"));
        assert_eq!(config.log_dir, PathBuf::from("/tmp"));
        assert_eq!(config.jobs.report.timeout_secs, 30);
        assert!(config.jobs.report.run_on_start);
        assert_eq!(config.jobs.report.every_secs, 604_800);
        assert_eq!(config.jobs.heartbeat, WorkerConfig::default().jobs.heartbeat);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile(_)));
    }

    #[test]
    fn zero_values_are_rejected() {
        let file = write_config("[jobs.heartbeat]\nevery_secs = 0\n");
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("jobs.heartbeat.every_secs"));

        let mut config = WorkerConfig::default();
        config.jobs.low_stock.timeout_secs = 0;
        assert!(config.validate().is_err());

        let config = WorkerConfig {
            endpoint_url: " ".to_string(),
            ..WorkerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn intervals_longer_than_a_year_are_rejected() {
        let file = write_config(&format!("[jobs.report]\nevery_secs = {}\n", MAX_INTERVAL_SECS * 1000));
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.starts_with("jobs.report ")));

        let mut config = WorkerConfig::default();
        config.jobs.heartbeat.timeout_secs = MAX_INTERVAL_SECS + 1;
        assert!(config.validate().is_err());

        config.jobs.heartbeat.timeout_secs = MAX_INTERVAL_SECS;
        config.jobs.heartbeat.every_secs = MAX_INTERVAL_SECS;
        config.validate().unwrap();
    }
}
