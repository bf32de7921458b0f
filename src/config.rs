//! Configuration loading
//!
//! Configuration is read from the path given with `--config`, else
//! `review-pulse.toml` in the working directory. A missing file means
//! defaults. `DATABASE_URL` overrides `database.url`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::spikes::MAX_WINDOW_DAYS;

pub const DEFAULT_CONFIG_FILE: &str = "review-pulse.toml";

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub analytics: AnalyticsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Postgres connection string
    pub url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

/// Fetch caps and window lengths used by the CLI
#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    /// Max reviews fetched for windowed KPIs and trends
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,

    /// Max reviews scanned for recurring issues
    #[serde(default = "default_issue_sample_limit")]
    pub issue_sample_limit: usize,

    /// Spike detection: recent window in days
    #[serde(default = "default_recent_days")]
    pub recent_days: u32,

    /// Spike detection: baseline window in days
    #[serde(default = "default_baseline_days")]
    pub baseline_days: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            fetch_limit: default_fetch_limit(),
            issue_sample_limit: default_issue_sample_limit(),
            recent_days: default_recent_days(),
            baseline_days: default_baseline_days(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level filter, overridden by RUST_LOG
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

fn default_max_connections() -> u32 {
    5
}

fn default_fetch_limit() -> usize {
    2000
}

fn default_issue_sample_limit() -> usize {
    500
}

fn default_recent_days() -> u32 {
    7
}

fn default_baseline_days() -> u32 {
    90
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load from `path`, or from the default file when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path: Option<PathBuf> = match path {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.exists().then_some(default)
            }
        };

        let mut config = match path {
            Some(p) => {
                let contents = std::fs::read_to_string(&p)?;
                Self::parse(&contents)?
            }
            None => Self::default(),
        };

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = Some(url);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("database.max_connections", self.database.max_connections as usize),
            ("analytics.fetch_limit", self.analytics.fetch_limit),
            ("analytics.issue_sample_limit", self.analytics.issue_sample_limit),
            ("analytics.recent_days", self.analytics.recent_days as usize),
            ("analytics.baseline_days", self.analytics.baseline_days as usize),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }
        let windows = [
            ("analytics.recent_days", self.analytics.recent_days),
            ("analytics.baseline_days", self.analytics.baseline_days),
        ];
        for (name, days) in windows {
            if days > MAX_WINDOW_DAYS {
                return Err(Error::Config(format!(
                    "{name} must be at most {MAX_WINDOW_DAYS} days"
                )));
            }
        }
        Ok(())
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database.url.as_deref().ok_or_else(|| {
            Error::Config("set DATABASE_URL or database.url to a Postgres instance".to_string())
        })
    }
}
