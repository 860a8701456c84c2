//! Transition tracking
//!
//! Keeps the last known containment state per geofence and turns raw
//! containment results into enter/exit transitions. A geofence that has never
//! been observed counts as outside.

use crate::evaluator;
use crate::types::{AlertType, Coordinate, Geofence, GeofenceType, Location, Result};
use std::collections::{HashMap, HashSet};

/// Containment state of a single geofence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ContainmentState {
    #[default]
    Outside,
    Inside,
}

impl ContainmentState {
    fn from_inside(inside: bool) -> Self {
        if inside {
            ContainmentState::Inside
        } else {
            ContainmentState::Outside
        }
    }
}

/// A detected change of containment for one geofence
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Geofence that changed state
    pub geofence_id: String,
    /// Geofence name at the time of the transition
    pub geofence_name: String,
    /// Geofence category at the time of the transition
    pub geofence_type: GeofenceType,
    /// Enter or exit
    pub kind: AlertType,
    /// Sample position that caused the change
    pub location: Coordinate,
    /// Sample timestamp (ms since epoch)
    pub sample_timestamp: i64,
}

/// Per-geofence containment state machine
#[derive(Debug, Default)]
pub struct TransitionTracker {
    states: HashMap<String, ContainmentState>,
}

impl TransitionTracker {
    /// Create a tracker with no observations
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known state of a geofence (`Outside` if never observed)
    pub fn state(&self, geofence_id: &str) -> ContainmentState {
        self.states.get(geofence_id).copied().unwrap_or_default()
    }

    /// Feed one sample for one geofence
    ///
    /// Disabled geofences are treated as never entered: their stored state is
    /// dropped and no event is produced. For enabled geofences the new state
    /// is stored whether or not it changed.
    ///
    /// # Returns
    /// * `Ok(Some(transition))` on an outside/inside edge
    /// * `Ok(None)` when the state is unchanged
    /// * `Err(_)` for a malformed geofence; the stored state is left untouched
    pub fn observe(&mut self, sample: &Location, geofence: &Geofence) -> Result<Option<Transition>> {
        if !geofence.enabled {
            if self.states.remove(&geofence.id).is_some() {
                log::debug!("Geofence {} disabled, containment state cleared", geofence.id);
            }
            return Ok(None);
        }

        let now = ContainmentState::from_inside(evaluator::is_inside(sample, geofence)?);
        let was = self.states.insert(geofence.id.clone(), now).unwrap_or_default();

        let kind = match (was, now) {
            (ContainmentState::Outside, ContainmentState::Inside) => AlertType::Enter,
            (ContainmentState::Inside, ContainmentState::Outside) => AlertType::Exit,
            _ => return Ok(None),
        };

        Ok(Some(Transition {
            geofence_id: geofence.id.clone(),
            geofence_name: geofence.name.clone(),
            geofence_type: geofence.kind,
            kind,
            location: sample.coordinate(),
            sample_timestamp: sample.timestamp,
        }))
    }

    /// Run one evaluation pass over every geofence
    ///
    /// Each geofence is handled independently. A malformed geofence is logged
    /// and skipped; it never stops the rest of the pass.
    pub fn process(&mut self, sample: &Location, geofences: &[Geofence]) -> Vec<Transition> {
        let mut transitions = Vec::new();

        for geofence in geofences {
            match self.observe(sample, geofence) {
                Ok(Some(transition)) => {
                    log::info!(
                        "{} geofence {} ({}) at {}",
                        transition.kind.verb(),
                        geofence.name,
                        geofence.id,
                        transition.location
                    );
                    transitions.push(transition);
                }
                Ok(None) => {}
                Err(e) => log::warn!("Skipping geofence {}: {}", geofence.id, e),
            }
        }

        transitions
    }

    /// Drop the state of a deleted geofence
    ///
    /// Returns true if the geofence had stored state.
    pub fn forget(&mut self, geofence_id: &str) -> bool {
        self.states.remove(geofence_id).is_some()
    }

    /// Keep only state for geofences that still exist
    pub fn retain_known(&mut self, geofences: &[Geofence]) {
        let known: HashSet<&str> = geofences.iter().map(|g| g.id.as_str()).collect();
        self.states.retain(|id, _| known.contains(id.as_str()));
    }

    /// Number of geofences with stored state
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True if no geofence has stored state
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Forget every observation
    pub fn reset(&mut self) {
        self.states.clear();
    }
}
