//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/clickstream/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/clickstream/` (~/.config/clickstream/)
//! - State/Logs: `$XDG_STATE_HOME/clickstream/` (~/.local/state/clickstream/)

use crate::analytics::clock::FixedOffsetClock;
use crate::analytics::pipeline::{Markers, PipelineConfig, ReportOptions, RoundingPolicy};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Page names that drive the analyses
    #[serde(default)]
    pub markers: Markers,

    /// Hour-of-day derivation
    #[serde(default)]
    pub time: TimeConfig,

    /// Report defaults
    #[serde(default)]
    pub report: ReportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Time configuration
#[derive(Debug, Deserialize)]
pub struct TimeConfig {
    /// Fixed offset used to bucket timestamps into hours ("UTC", "+05:30", ...)
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
        }
    }
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

/// Report configuration
#[derive(Debug, Deserialize)]
pub struct ReportConfig {
    /// How averages are rounded
    #[serde(default)]
    pub rounding: RoundingPolicy,

    /// Number of artists in the top-artists list
    #[serde(default = "default_top_artists")]
    pub top_artists: usize,

    /// Gender whose distinct users are counted (empty to skip)
    #[serde(default = "default_gender")]
    pub gender: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            rounding: RoundingPolicy::default(),
            top_artists: default_top_artists(),
            gender: default_gender(),
        }
    }
}

fn default_top_artists() -> usize {
    1
}

fn default_gender() -> String {
    "F".to_string()
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        let markers = [
            ("markers.song_play", &self.markers.song_play),
            ("markers.home", &self.markers.home),
            ("markers.downgrade", &self.markers.downgrade),
        ];
        for (name, value) in markers {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} must not be empty", name)));
            }
        }
        if self.markers.song_play == self.markers.home {
            return Err(Error::Config(
                "markers.song_play and markers.home must differ".to_string(),
            ));
        }

        FixedOffsetClock::parse(&self.time.utc_offset)?;
        Ok(())
    }

    /// Build the analysis configuration
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        self.validate()?;
        Ok(PipelineConfig::default()
            .with_markers(self.markers.clone())
            .with_clock(FixedOffsetClock::parse(&self.time.utc_offset)?)
            .with_rounding(self.report.rounding))
    }

    /// Report knobs from the `[report]` section
    pub fn report_options(&self) -> ReportOptions {
        let gender = self.report.gender.trim();
        ReportOptions {
            top_artists: self.report.top_artists,
            gender: (!gender.is_empty()).then(|| gender.to_string()),
        }
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/clickstream/config.toml` (~/.config/clickstream/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("clickstream").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/clickstream/` (~/.local/state/clickstream/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("clickstream")
    }
}
