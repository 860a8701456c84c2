//! Tracking session
//!
//! `GeofenceMonitor` wires a location source, the geofence store and the
//! engine together. Each `tick` asks the source for one sample and runs one
//! full evaluation pass. The monitor does no scheduling of its own; see
//! `SamplingScheduler` for timer-driven ticks.

use crate::collaborators::{LocationSource, Notifier};
use crate::config::EngineConfig;
use crate::engine::GeofenceEngine;
use crate::store::{GeofenceDraft, GeofenceStore, GeofenceUpdate};
use crate::tracker::ContainmentState;
use crate::types::{Alert, Geofence, Location, Result};

/// A running tracking session
pub struct GeofenceMonitor {
    engine: GeofenceEngine,
    store: GeofenceStore,
    source: Box<dyn LocationSource + Send>,
    notifier: Box<dyn Notifier + Send>,
    last_location: Option<Location>,
    passes: u64,
}

impl GeofenceMonitor {
    /// Create a monitor with fresh containment state
    pub fn new(
        config: &EngineConfig,
        store: GeofenceStore,
        source: Box<dyn LocationSource + Send>,
        notifier: Box<dyn Notifier + Send>,
    ) -> Self {
        Self {
            engine: GeofenceEngine::new(config),
            store,
            source,
            notifier,
            last_location: None,
            passes: 0,
        }
    }

    /// Request one sample and evaluate it
    ///
    /// When the source has no sample (or fails) the pass is skipped and the
    /// containment state is left exactly as it was.
    pub fn tick(&mut self) -> Vec<Alert> {
        match self.source.current_location() {
            Ok(Some(sample)) => self.process_sample(&sample),
            Ok(None) => {
                log::debug!("No location sample this tick, skipping pass");
                Vec::new()
            }
            Err(e) => {
                log::debug!("Location source failed, skipping pass: {}", e);
                Vec::new()
            }
        }
    }

    /// Evaluate a sample delivered by the caller
    ///
    /// The store is saved at most once, after the whole pass.
    pub fn process_sample(&mut self, sample: &Location) -> Vec<Alert> {
        self.last_location = Some(*sample);
        self.passes += 1;

        self.store.defer_saves();
        let alerts = self
            .engine
            .on_sample(sample, &mut self.store, self.notifier.as_ref());
        self.store.resume_saves();
        alerts
    }

    /// Add a geofence to the store
    pub fn add_geofence(&mut self, draft: GeofenceDraft) -> Result<Geofence> {
        self.store.add_geofence(draft)
    }

    /// Update a geofence in the store
    pub fn update_geofence(&mut self, id: &str, update: GeofenceUpdate) -> Result<Geofence> {
        self.store.update_geofence(id, update)
    }

    /// Delete a geofence and its containment state
    pub fn delete_geofence(&mut self, id: &str) -> Result<Geofence> {
        let removed = self.store.delete_geofence(id)?;
        self.engine.forget_geofence(id);
        Ok(removed)
    }

    /// Flip a geofence's enabled flag
    ///
    /// No event is synthesised; a geofence disabled while inside simply stops
    /// being tracked on the next pass.
    pub fn toggle_geofence(&mut self, id: &str) -> Result<bool> {
        self.store.toggle_geofence(id)
    }

    /// Last known containment state of a geofence
    pub fn containment(&self, geofence_id: &str) -> ContainmentState {
        self.engine.tracker().state(geofence_id)
    }

    /// Enable or disable notifications for future alerts
    pub fn set_notifications_enabled(&mut self, enabled: bool) {
        self.engine.set_notifications_enabled(enabled);
    }

    /// The most recent sample that was evaluated
    pub fn last_location(&self) -> Option<Location> {
        self.last_location
    }

    /// Number of evaluation passes run so far
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Read access to the store
    pub fn store(&self) -> &GeofenceStore {
        &self.store
    }

    /// Clear the alert history
    pub fn clear_alerts(&mut self) {
        self.store.clear_alerts();
    }

    /// Consume the monitor and return its store
    pub fn into_store(self) -> GeofenceStore {
        self.store
    }
}

impl std::fmt::Debug for GeofenceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeofenceMonitor")
            .field("engine", &self.engine)
            .field("store", &self.store)
            .field("last_location", &self.last_location)
            .field("passes", &self.passes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::NullNotifier;
    use crate::collaborators::Persistence;
    use crate::persistence::{MemoryPersistence, WriteBehindPersistence};
    use crate::sources::ReplaySource;
    use crate::types::{AlertType, Coordinate, GeofenceData, GeofenceError, GeofenceType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    /// Memory-backed persistence whose saves take a while
    struct SlowPersistence {
        memory: MemoryPersistence,
        saves: Arc<AtomicUsize>,
    }

    struct CountingPersistence {
        memory: MemoryPersistence,
        saves: Arc<AtomicUsize>,
    }

    impl Persistence for CountingPersistence {
        fn load(&self) -> Result<GeofenceData> {
            self.memory.load()
        }

        fn save(&self, data: &GeofenceData) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.memory.save(data)
        }
    }

    impl Persistence for SlowPersistence {
        fn load(&self) -> Result<GeofenceData> {
            self.memory.load()
        }

        fn save(&self, data: &GeofenceData) -> Result<()> {
            thread::sleep(Duration::from_millis(200));
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.memory.save(data)
        }
    }

    struct BrokenSource;

    impl LocationSource for BrokenSource {
        fn current_location(&mut self) -> Result<Option<Location>> {
            Err(GeofenceError::LocationUnavailable("no fix".to_string()))
        }
    }

    fn monitor(source: Box<dyn LocationSource + Send>) -> (GeofenceMonitor, String) {
        let mut store = GeofenceStore::new(Box::new(MemoryPersistence::new()));
        let fence = store
            .add_geofence(GeofenceDraft::circle(
                "Gate",
                GeofenceType::Factory,
                Coordinate::new(0.0, 0.0),
                1000.0,
            ))
            .unwrap();
        let monitor = GeofenceMonitor::new(
            &EngineConfig::default(),
            store,
            source,
            Box::new(NullNotifier),
        );
        (monitor, fence.id)
    }

    #[test]
    fn test_gap_preserves_state() {
        let inside = Location::new(0.0, 0.0, 5.0, 0);
        let source = ReplaySource::new(vec![Some(inside), None, Some(inside)]);
        let (mut monitor, id) = monitor(Box::new(source));

        assert_eq!(monitor.tick().len(), 1);
        assert!(monitor.tick().is_empty());
        assert_eq!(monitor.containment(&id), ContainmentState::Inside);
        assert!(monitor.tick().is_empty());
        assert_eq!(monitor.passes(), 2);
    }

    #[test]
    fn test_failing_source_skips_pass() {
        let (mut monitor, id) = monitor(Box::new(BrokenSource));
        assert!(monitor.tick().is_empty());
        assert_eq!(monitor.passes(), 0);
        assert!(monitor.last_location().is_none());
        assert_eq!(monitor.containment(&id), ContainmentState::Outside);
    }

    #[test]
    fn test_toggle_off_while_inside_is_silent() {
        let (mut monitor, id) = monitor(Box::new(ReplaySource::default()));
        let inside = Location::new(0.0, 0.0, 5.0, 0);
        monitor.process_sample(&inside);

        assert!(!monitor.toggle_geofence(&id).unwrap());
        assert!(monitor.process_sample(&inside).is_empty());
        assert_eq!(monitor.store().alerts().len(), 1);

        assert!(monitor.toggle_geofence(&id).unwrap());
        let alerts = monitor.process_sample(&inside);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertType::Enter);
    }

    #[test]
    fn test_delete_clears_state_and_alerts() {
        let (mut monitor, id) = monitor(Box::new(ReplaySource::default()));
        monitor.process_sample(&Location::new(0.0, 0.0, 5.0, 0));

        monitor.delete_geofence(&id).unwrap();
        assert_eq!(monitor.containment(&id), ContainmentState::Outside);
        assert!(monitor.store().alerts().is_empty());
    }

    #[test]
    fn test_pass_does_not_wait_for_storage() {
        let memory = MemoryPersistence::with_data(GeofenceData {
            geofences: vec![
                Geofence::circle("a", "A", GeofenceType::Factory, Coordinate::new(0.0, 0.0), 1000.0),
                Geofence::circle("b", "B", GeofenceType::School, Coordinate::new(0.0, 0.0), 500.0),
            ],
            alerts: Vec::new(),
        });
        let saves = Arc::new(AtomicUsize::new(0));
        let persistence = WriteBehindPersistence::spawn(SlowPersistence {
            memory: memory.clone(),
            saves: Arc::clone(&saves),
        })
        .unwrap();
        let store = GeofenceStore::open(Box::new(persistence));
        let mut monitor = GeofenceMonitor::new(
            &EngineConfig::default(),
            store,
            Box::new(ReplaySource::default()),
            Box::new(NullNotifier),
        );

        let started = Instant::now();
        let alerts = monitor.process_sample(&Location::new(0.0, 0.0, 5.0, 0));
        let elapsed = started.elapsed();

        assert_eq!(alerts.len(), 2);
        assert!(elapsed < Duration::from_millis(150), "pass took {:?}", elapsed);

        monitor.store().sync().unwrap();
        assert_eq!(saves.load(Ordering::SeqCst), 1);
        assert_eq!(memory.snapshot().alerts.len(), 2);
    }

    #[test]
    fn test_pass_saves_once() {
        let memory = MemoryPersistence::with_data(GeofenceData {
            geofences: vec![
                Geofence::circle("a", "A", GeofenceType::Factory, Coordinate::new(0.0, 0.0), 1000.0),
                Geofence::circle("b", "B", GeofenceType::School, Coordinate::new(0.0, 0.0), 500.0),
            ],
            alerts: Vec::new(),
        });
        let saves = Arc::new(AtomicUsize::new(0));
        let store = GeofenceStore::open(Box::new(CountingPersistence {
            memory: memory.clone(),
            saves: Arc::clone(&saves),
        }));
        let mut monitor = GeofenceMonitor::new(
            &EngineConfig::default(),
            store,
            Box::new(ReplaySource::default()),
            Box::new(NullNotifier),
        );

        assert_eq!(monitor.process_sample(&Location::new(0.0, 0.0, 5.0, 0)).len(), 2);
        assert_eq!(saves.load(Ordering::SeqCst), 1);
        assert!(monitor.process_sample(&Location::new(0.0, 0.0, 5.0, 1)).is_empty());
        assert_eq!(saves.load(Ordering::SeqCst), 1);
    }
}
