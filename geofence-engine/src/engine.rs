//! Main engine API
//!
//! `GeofenceEngine` is the entry point for evaluation passes. It owns the
//! transition tracker and the alert emitter; geofences, alert storage and
//! notifications are passed in by the caller on every sample, so the engine
//! can be driven directly without a timer or any I/O.

use crate::collaborators::{AlertSink, GeofenceRepository, Notifier};
use crate::config::EngineConfig;
use crate::emitter::AlertEmitter;
use crate::tracker::{Transition, TransitionTracker};
use crate::types::{Alert, Geofence, Location};

/// The evaluation engine: containment, transitions and alert emission
#[derive(Debug, Default)]
pub struct GeofenceEngine {
    /// Containment state per geofence
    tracker: TransitionTracker,
    /// Builds alerts and calls the collaborators
    emitter: AlertEmitter,
}

impl GeofenceEngine {
    /// Create an engine with no containment state
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            tracker: TransitionTracker::new(),
            emitter: AlertEmitter::new(config.notifications_enabled),
        }
    }

    /// Handle one location sample
    ///
    /// Reads the current geofence set from `store`, evaluates every geofence,
    /// and for each transition records an alert in `store` and asks
    /// `notifier` to show it.
    ///
    /// # Returns
    /// The alerts produced by this sample, in geofence order
    ///
    /// # Example
    /// ```
    /// use geofence_engine::{
    ///     Coordinate, EngineConfig, GeofenceDraft, GeofenceEngine, GeofenceStore,
    ///     GeofenceType, Location, MemoryPersistence, NullNotifier,
    /// };
    ///
    /// let mut store = GeofenceStore::new(Box::new(MemoryPersistence::new()));
    /// let center = Coordinate::new(37.7749, -122.4194);
    /// store
    ///     .add_geofence(GeofenceDraft::circle("HQ", GeofenceType::Custom, center, 100.0))
    ///     .unwrap();
    ///
    /// let mut engine = GeofenceEngine::new(&EngineConfig::default());
    /// let sample = Location::new(37.7749, -122.4194, 10.0, 0);
    /// let alerts = engine.on_sample(&sample, &mut store, &NullNotifier);
    /// assert_eq!(alerts[0].message, "Entered HQ (custom)");
    /// ```
    pub fn on_sample<R>(&mut self, sample: &Location, store: &mut R, notifier: &dyn Notifier) -> Vec<Alert>
    where
        R: GeofenceRepository + AlertSink,
    {
        let geofences = store.geofences();
        let transitions = self.evaluate(sample, &geofences);

        let mut alerts = Vec::with_capacity(transitions.len());
        for transition in &transitions {
            alerts.push(self.emitter.emit(transition, &mut *store, notifier));
        }
        alerts
    }

    /// Evaluate a sample against `geofences` and update containment state
    ///
    /// No alerts are built and no collaborator is called. State for geofences
    /// missing from `geofences` is dropped first.
    pub fn evaluate(&mut self, sample: &Location, geofences: &[Geofence]) -> Vec<Transition> {
        log::trace!(
            "Evaluating sample ({:.6}, {:.6}) against {} geofences",
            sample.latitude,
            sample.longitude,
            geofences.len()
        );
        self.tracker.retain_known(geofences);
        self.tracker.process(sample, geofences)
    }

    /// Clear the containment state of a deleted geofence
    pub fn forget_geofence(&mut self, geofence_id: &str) {
        if self.tracker.forget(geofence_id) {
            log::debug!("Cleared containment state for geofence {}", geofence_id);
        }
    }

    /// Read access to the containment state
    pub fn tracker(&self) -> &TransitionTracker {
        &self.tracker
    }

    /// Enable or disable notifications for future alerts
    pub fn set_notifications_enabled(&mut self, enabled: bool) {
        self.emitter.set_notifications_enabled(enabled);
    }
}
