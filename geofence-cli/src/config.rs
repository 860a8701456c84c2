//! Configuration loading and parsing

use anyhow::{Context, Result};
use geofence_engine::config::DEFAULT_TRACKING_INTERVAL_MS;
use geofence_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackingConfig {
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
    /// Stop after this many ticks (runs until interrupted if unset)
    pub max_ticks: Option<u64>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_TRACKING_INTERVAL_MS,
            max_ticks: None,
        }
    }
}

fn default_interval() -> u64 {
    DEFAULT_TRACKING_INTERVAL_MS
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
        }
    }
}

fn default_data_file() -> PathBuf {
    PathBuf::from("geofence-data.json")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
    /// Full width of the jitter box in degrees
    #[serde(default = "default_jitter")]
    pub jitter_degrees: f64,
    #[serde(default = "default_accuracy")]
    pub accuracy_m: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            latitude: default_latitude(),
            longitude: default_longitude(),
            jitter_degrees: default_jitter(),
            accuracy_m: default_accuracy(),
        }
    }
}

fn default_latitude() -> f64 {
    37.7749
}

fn default_longitude() -> f64 {
    -122.4194
}

fn default_jitter() -> f64 {
    0.01
}

fn default_accuracy() -> f64 {
    10.0
}

impl AppConfig {
    /// Engine settings derived from this configuration
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new()
            .with_tracking_interval_ms(self.tracking.interval_ms)
            .with_notifications(self.notifications.enabled)
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .engine_config()
        .validate()
        .with_context(|| format!("Invalid tracking settings in {:?}", path))?;

    Ok(config)
}
