//! Geofence Engine Library
//!
//! Evaluates device location samples against user-defined geographic regions
//! ("geofences") and raises enter/exit alerts.
//!
//! # Architecture
//!
//! One location sample drives one evaluation pass:
//! - `geometry` computes haversine distances and ray-casting containment
//! - `evaluator` decides containment of a sample in one geofence
//! - `tracker` keeps per-geofence state and detects enter/exit transitions
//! - `emitter` turns transitions into alerts and calls the collaborators
//!
//! Everything with side effects (location source, geofence storage,
//! persistence, notifications) sits behind the traits in `collaborators`.
//! `GeofenceStore`, `GeofenceMonitor` and `SamplingScheduler` are ready-made
//! pieces built on those traits.
//!
//! The library does NOT:
//! - Render maps or any other UI
//! - Manage users, roles or permissions
//! - Synchronise state between devices
//!
//! # Example Usage
//!
//! ```no_run
//! use geofence_engine::{
//!     EngineConfig, GeofenceMonitor, GeofenceStore, JsonFilePersistence, NullNotifier,
//!     ReplaySource, SamplingScheduler, WriteBehindPersistence,
//! };
//! use std::path::Path;
//! use std::sync::{Arc, Mutex};
//!
//! let config = EngineConfig::new().with_tracking_interval_ms(5000);
//! let persistence =
//!     WriteBehindPersistence::spawn(JsonFilePersistence::new("geofence-data.json")).unwrap();
//! let store = GeofenceStore::open(Box::new(persistence));
//! let source = ReplaySource::from_json_file(Path::new("samples.json")).unwrap();
//!
//! let monitor = Arc::new(Mutex::new(GeofenceMonitor::new(
//!     &config,
//!     store,
//!     Box::new(source),
//!     Box::new(NullNotifier),
//! )));
//!
//! let mut scheduler =
//!     SamplingScheduler::for_monitor(config.tracking_interval_ms, Arc::clone(&monitor)).unwrap();
//! scheduler.start().unwrap();
//! ```

// Public modules
pub mod collaborators;
pub mod config;
pub mod emitter;
pub mod engine;
pub mod evaluator;
pub mod geometry;
pub mod monitor;
pub mod persistence;
pub mod scheduler;
pub mod sources;
pub mod store;
pub mod tracker;
pub mod types;

// Re-export main types for convenience
pub use collaborators::{
    AlertSink, GeofenceRepository, LocationSource, Notifier, NullNotifier, Persistence,
};
pub use config::EngineConfig;
pub use emitter::AlertEmitter;
pub use engine::GeofenceEngine;
pub use evaluator::is_inside;
pub use geometry::{distance_meters, point_in_polygon};
pub use monitor::GeofenceMonitor;
pub use persistence::{JsonFilePersistence, MemoryPersistence, WriteBehindPersistence};
pub use scheduler::SamplingScheduler;
pub use sources::ReplaySource;
pub use store::{GeofenceDraft, GeofenceStore, GeofenceUpdate};
pub use tracker::{ContainmentState, Transition, TransitionTracker};
pub use types::{
    Alert, AlertType, Coordinate, Geofence, GeofenceData, GeofenceError, GeofenceShape,
    GeofenceType, Location, Result, Timestamp,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
