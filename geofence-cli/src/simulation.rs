//! Simulated device location
//!
//! Stands in for a real positioning API: every request returns a point
//! jittered uniformly around a fixed center.

use crate::config::SimulationConfig;
use geofence_engine::{LocationSource, Location, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Demo location source that jitters around a fixed point
pub struct SimulatedSource {
    center_lat: f64,
    center_lon: f64,
    jitter: f64,
    accuracy: f64,
    rng: StdRng,
}

impl SimulatedSource {
    /// Create a source seeded from system entropy
    pub fn new(config: &SimulationConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create a reproducible source
    pub fn seeded(config: &SimulationConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &SimulationConfig, rng: StdRng) -> Self {
        Self {
            center_lat: config.latitude,
            center_lon: config.longitude,
            jitter: config.jitter_degrees.abs(),
            accuracy: config.accuracy_m,
            rng,
        }
    }

    fn offset(&mut self) -> f64 {
        if self.jitter == 0.0 {
            return 0.0;
        }
        (self.rng.gen::<f64>() - 0.5) * self.jitter
    }
}

impl LocationSource for SimulatedSource {
    fn current_location(&mut self) -> Result<Option<Location>> {
        let lat = self.center_lat + self.offset();
        let lon = self.center_lon + self.offset();
        Ok(Some(Location::now(lat, lon, self.accuracy)))
    }
}
