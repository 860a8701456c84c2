//! Location sources
//!
//! `ReplaySource` feeds a prepared sequence of samples, one per tick. Gaps
//! (`None`) stand for ticks where the device reported nothing.

use crate::collaborators::LocationSource;
use crate::types::{Location, Result};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

/// Replays recorded samples in order
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    samples: VecDeque<Option<Location>>,
}

impl ReplaySource {
    /// Create a source from samples with optional gaps
    pub fn new(samples: impl IntoIterator<Item = Option<Location>>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
        }
    }

    /// Create a source from samples without gaps
    pub fn from_samples(samples: impl IntoIterator<Item = Location>) -> Self {
        Self::new(samples.into_iter().map(Some))
    }

    /// Load a JSON array of samples; `null` entries become gaps
    ///
    /// # Example
    /// ```json
    /// [
    ///   { "latitude": 37.7749, "longitude": -122.4194, "accuracy": 10, "timestamp": 0 },
    ///   null,
    ///   { "latitude": 37.7800, "longitude": -122.4100, "accuracy": 10, "timestamp": 10000 }
    /// ]
    /// ```
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let samples: Vec<Option<Location>> = serde_json::from_str(&content)?;
        log::info!("Loaded {} samples from {:?}", samples.len(), path);
        Ok(Self::new(samples))
    }

    /// Number of ticks left, gaps included
    pub fn remaining(&self) -> usize {
        self.samples.len()
    }

    /// True once every tick has been replayed
    pub fn is_exhausted(&self) -> bool {
        self.samples.is_empty()
    }
}

impl LocationSource for ReplaySource {
    fn current_location(&mut self) -> Result<Option<Location>> {
        Ok(self.samples.pop_front().flatten())
    }
}
