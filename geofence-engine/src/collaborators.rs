//! Collaborator interfaces
//!
//! The engine never talks to a device, a file or a desktop directly. Every
//! side effect goes through one of these traits so the evaluation logic can be
//! driven and observed in tests without any I/O.

use crate::types::{Alert, Geofence, GeofenceData, Location, Result};

/// Supplies location samples, one request per tick
pub trait LocationSource {
    /// The current device position
    ///
    /// `Ok(None)` means "no sample this tick" and must never be read as
    /// zero coordinates. An error is treated the same way by the monitor.
    fn current_location(&mut self) -> Result<Option<Location>>;
}

/// Read access to the current geofence set
pub trait GeofenceRepository {
    /// Snapshot of every geofence, in insertion order
    fn geofences(&self) -> Vec<Geofence>;
}

/// Receives alerts produced by the emitter
pub trait AlertSink {
    /// Store an alert at the front of the history
    fn record_alert(&mut self, alert: Alert) -> Result<()>;
}

/// Saves and loads the geofence/alert document
pub trait Persistence {
    /// Load the saved document (empty if nothing was saved yet)
    fn load(&self) -> Result<GeofenceData>;

    /// Save the whole document
    ///
    /// Implementations may queue the write; `flush` waits for it.
    fn save(&self, data: &GeofenceData) -> Result<()>;

    /// Block until every queued save has been written
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// User-facing notification channel (fire-and-forget)
pub trait Notifier {
    /// Show a notification; failures are ignored by the caller
    fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// Notifier that drops every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, title: &str, _body: &str) -> Result<()> {
        log::trace!("Notification suppressed: {}", title);
        Ok(())
    }
}
