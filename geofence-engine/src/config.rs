//! Engine configuration types
//!
//! This module defines the small amount of configuration the engine itself
//! needs. Storage locations, simulation settings and the like belong to the
//! application layer.

use crate::types::{GeofenceError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default sampling interval (5 seconds)
pub const DEFAULT_TRACKING_INTERVAL_MS: u64 = 5000;

/// Shortest sampling interval accepted by the scheduler
pub const MIN_TRACKING_INTERVAL_MS: u64 = 100;

/// Interval presets offered to users
pub const TRACKING_INTERVAL_PRESETS_MS: [u64; 6] = [1000, 2000, 5000, 10000, 30000, 60000];

/// Configuration for the geofence engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Time between location samples in milliseconds
    #[serde(default = "default_tracking_interval")]
    pub tracking_interval_ms: u64,

    /// Whether new alerts are passed to the notifier
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_tracking_interval() -> u64 {
    DEFAULT_TRACKING_INTERVAL_MS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tracking_interval_ms: DEFAULT_TRACKING_INTERVAL_MS,
            notifications_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Create a new engine configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the sampling interval
    pub fn with_tracking_interval_ms(mut self, interval_ms: u64) -> Self {
        self.tracking_interval_ms = interval_ms;
        self
    }

    /// Builder method: enable or disable notifications
    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications_enabled = enabled;
        self
    }

    /// Sampling interval as a `Duration`
    pub fn tracking_interval(&self) -> Duration {
        Duration::from_millis(self.tracking_interval_ms)
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        validate_interval_ms(self.tracking_interval_ms)
    }
}

/// Check a sampling interval against the accepted minimum
pub fn validate_interval_ms(interval_ms: u64) -> Result<()> {
    if interval_ms < MIN_TRACKING_INTERVAL_MS {
        return Err(GeofenceError::Scheduler(format!(
            "tracking interval {}ms is below the minimum of {}ms",
            interval_ms, MIN_TRACKING_INTERVAL_MS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::new();
        assert_eq!(config.tracking_interval_ms, 5000);
        assert!(config.notifications_enabled);
        assert_eq!(config.tracking_interval(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::new()
            .with_tracking_interval_ms(1000)
            .with_notifications(false);

        assert_eq!(config.tracking_interval_ms, 1000);
        assert!(!config.notifications_enabled);
    }

    #[test]
    fn test_interval_validation() {
        assert!(validate_interval_ms(0).is_err());
        assert!(validate_interval_ms(99).is_err());
        assert!(validate_interval_ms(100).is_ok());
        for preset in TRACKING_INTERVAL_PRESETS_MS {
            assert!(validate_interval_ms(preset).is_ok());
        }
    }

    #[test]
    fn test_engine_config_deserialization_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
