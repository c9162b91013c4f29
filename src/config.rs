//! Production configuration system
//!
//! Provides centralized configuration management with:
//! - Environment variable support
//! - Config file loading (optional, behind the `basic` feature)
//! - Runtime defaults
//! - Validation and type safety

use crate::billing::REPORT_MONTHS_RANGE;
use crate::timestamp_parser::{CalendarMonth, TimestampParser};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::env;
#[cfg(feature = "basic")]
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

const LOG_FORMATS: [&str; 2] = ["pretty", "json"];
const LOG_OUTPUTS: [&str; 3] = ["console", "file", "both"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Report defaults
    pub report: ReportConfig,

    /// Output configuration
    pub output: OutputConfig,

    /// Paths configuration
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub top_limit: usize,
    pub default_report_months: u32,
    /// Earliest date client counts exist for: RFC3339 or `YYYY-MM`.
    pub counts_floor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub json_pretty: bool,
    pub timestamp_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub log_directory: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "WARN".to_string(),
            format: "pretty".to_string(),
            output: "console".to_string(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_limit: 10,
            default_report_months: 12,
            counts_floor: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_pretty: false,
            timestamp_format: "%Y-%m-%d".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_directory: PathBuf::from("logs"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            report: ReportConfig::default(),
            output: OutputConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment, file, and defaults
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        for path in Self::search_paths() {
            if path.exists() {
                info!(config_file = %path.display(), "Loading configuration from file");
                config = Self::load_from_file(&path)?;
                break;
            }
        }

        // Override with environment variables
        config.apply_env_overrides()?;

        config.validate()?;

        Ok(config)
    }

    /// Files checked in order; the first that exists wins.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("client-counts.toml"),
            PathBuf::from(".client-counts.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("client-counts").join("config.toml"));
        }
        paths
    }

    /// Load configuration from TOML file
    #[cfg(feature = "basic")]
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    #[cfg(not(feature = "basic"))]
    pub fn load_from_file(path: &Path) -> Result<Self> {
        warn!(config_file = %path.display(), "Config file support disabled, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        // Logging overrides
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        // Report overrides
        if let Ok(val) = env::var("CLIENT_COUNTS_TOP_LIMIT") {
            self.report.top_limit = val.parse().context("Invalid CLIENT_COUNTS_TOP_LIMIT")?;
        }
        if let Ok(val) = env::var("CLIENT_COUNTS_REPORT_MONTHS") {
            self.report.default_report_months =
                val.parse().context("Invalid CLIENT_COUNTS_REPORT_MONTHS")?;
        }
        if let Ok(val) = env::var("CLIENT_COUNTS_FLOOR") {
            self.report.counts_floor = Some(val);
        }

        // Path overrides
        if let Ok(val) = env::var("CLIENT_COUNTS_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.report.top_limit == 0 {
            return Err(anyhow::anyhow!("Top limit must be greater than 0"));
        }

        if !REPORT_MONTHS_RANGE.contains(&self.report.default_report_months) {
            return Err(anyhow::anyhow!(
                "Default report months must be in {:?}, got {}",
                REPORT_MONTHS_RANGE,
                self.report.default_report_months
            ));
        }

        self.counts_floor()?;

        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Unknown log format '{}', expected one of {:?}",
                self.logging.format,
                LOG_FORMATS
            ));
        }

        if !LOG_OUTPUTS.contains(&self.logging.output.as_str()) {
            return Err(anyhow::anyhow!(
                "Unknown log output '{}', expected one of {:?}",
                self.logging.output,
                LOG_OUTPUTS
            ));
        }

        if self.report.top_limit > 100 {
            warn!(
                top_limit = self.report.top_limit,
                "Top limit is very high, attribution tables may be hard to read"
            );
        }

        Ok(())
    }

    /// The configured counts floor as an instant. A bare `YYYY-MM` means the
    /// first instant of that month.
    pub fn counts_floor(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = self.report.counts_floor.as_deref() else {
            return Ok(None);
        };
        if let Ok(month) = raw.parse::<CalendarMonth>() {
            return Ok(Some(month.first_instant()));
        }
        TimestampParser::parse(raw)
            .map(Some)
            .with_context(|| format!("Invalid counts floor: {raw}"))
    }

    /// Save current configuration to file
    #[cfg(feature = "basic")]
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration saved to file");

        Ok(())
    }
}

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration instance, falling back to defaults if the
/// environment or config file is invalid.
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load configuration, using defaults");
            Config::default()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "WARN");
        assert_eq!(config.report.top_limit, 10);
        assert_eq!(config.report.default_report_months, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        env::set_var("CLIENT_COUNTS_TOP_LIMIT", "25");
        let mut config = Config::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.report.top_limit, 25);
        env::remove_var("CLIENT_COUNTS_TOP_LIMIT");
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.report.top_limit = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.report.default_report_months = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.output = "syslog".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_counts_floor_forms() {
        let mut config = Config::default();
        assert_eq!(config.counts_floor().unwrap(), None);

        config.report.counts_floor = Some("2023-04".to_string());
        assert_eq!(
            config.counts_floor().unwrap().map(|d| d.to_rfc3339()),
            Some("2023-04-01T00:00:00+00:00".to_string())
        );

        config.report.counts_floor = Some("2023-04-15T00:00:00Z".to_string());
        assert!(config.counts_floor().unwrap().is_some());

        config.report.counts_floor = Some("last spring".to_string());
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "basic")]
    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str("[report]\ntop_limit = 5\n").unwrap();
        assert_eq!(config.report.top_limit, 5);
        assert_eq!(config.report.default_report_months, 12);
        assert_eq!(config.logging.format, "pretty");
    }
}
