//! In-memory geofence store
//!
//! Owns the geofence list (insertion order) and the alert history (most
//! recent first). Every mutation hands the whole document to the persistence
//! collaborator. A failed save is logged as a warning and the in-memory state
//! stays authoritative; nothing is rolled back.
//!
//! If the saved document could not be loaded, saves are refused until a later
//! `load` succeeds, so the unread file is never replaced.

use crate::collaborators::{AlertSink, GeofenceRepository, Persistence};
use crate::geometry::centroid;
use crate::types::{
    Alert, Coordinate, Geofence, GeofenceData, GeofenceError, GeofenceShape, GeofenceType, Result,
};
use chrono::Utc;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Input for creating a geofence (id and creation time are assigned by the store)
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceDraft {
    pub name: String,
    pub kind: GeofenceType,
    pub shape: GeofenceShape,
    pub center: Option<Coordinate>,
    pub radius: Option<f64>,
    pub polygon: Vec<Coordinate>,
    pub color: Option<String>,
    pub enabled: bool,
    pub assigned_users: BTreeSet<String>,
}

impl GeofenceDraft {
    /// Draft a circular geofence
    pub fn circle(name: impl Into<String>, kind: GeofenceType, center: Coordinate, radius: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            shape: GeofenceShape::Circle,
            center: Some(center),
            radius: Some(radius),
            polygon: Vec::new(),
            color: None,
            enabled: true,
            assigned_users: BTreeSet::new(),
        }
    }

    /// Draft a polygonal geofence; an empty vertex list uses the type's template
    pub fn polygon(name: impl Into<String>, kind: GeofenceType, vertices: Vec<Coordinate>) -> Self {
        Self {
            name: name.into(),
            kind,
            shape: GeofenceShape::Polygon,
            center: None,
            radius: None,
            polygon: vertices,
            color: None,
            enabled: true,
            assigned_users: BTreeSet::new(),
        }
    }
}

/// Partial update: `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeofenceUpdate {
    pub name: Option<String>,
    pub kind: Option<GeofenceType>,
    pub shape: Option<GeofenceShape>,
    pub center: Option<Coordinate>,
    pub radius: Option<f64>,
    pub polygon: Option<Vec<Coordinate>>,
    pub color: Option<String>,
    pub enabled: Option<bool>,
    pub assigned_users: Option<BTreeSet<String>>,
}

impl GeofenceUpdate {
    fn apply(self, geofence: &mut Geofence) {
        if let Some(name) = self.name {
            geofence.name = name;
        }
        if let Some(kind) = self.kind {
            geofence.kind = kind;
        }
        if let Some(shape) = self.shape {
            geofence.shape = shape;
        }
        if let Some(center) = self.center {
            geofence.center = Some(center);
        }
        if let Some(radius) = self.radius {
            geofence.radius = Some(radius);
        }
        if let Some(polygon) = self.polygon {
            geofence.polygon = polygon;
        }
        if let Some(color) = self.color {
            geofence.color = color;
        }
        if let Some(enabled) = self.enabled {
            geofence.enabled = enabled;
        }
        if let Some(users) = self.assigned_users {
            geofence.assigned_users = users;
        }
    }
}

/// Reject definitions a management operation must not store
fn check_definition(geofence: &Geofence) -> Result<()> {
    if geofence.name.trim().is_empty() {
        return Err(GeofenceError::InvalidGeofence("name cannot be empty".to_string()));
    }
    if let Some(center) = geofence.center {
        if !center.is_valid() {
            return Err(GeofenceError::InvalidGeofence(format!(
                "center {} is out of range",
                center
            )));
        }
    }
    if let Some(radius) = geofence.radius {
        if !radius.is_finite() || radius < 0.0 {
            return Err(GeofenceError::InvalidGeofence(format!(
                "radius must be a non-negative number, got {}",
                radius
            )));
        }
    }
    if let Some(bad) = geofence.polygon.iter().find(|v| !v.is_valid()) {
        return Err(GeofenceError::InvalidGeofence(format!(
            "polygon vertex {} is out of range",
            bad
        )));
    }
    if geofence.shape == GeofenceShape::Circle && geofence.center.is_none() {
        return Err(GeofenceError::InvalidGeofence(
            "circle geofence needs a center".to_string(),
        ));
    }
    Ok(())
}

/// Geofence and alert collections with write-through persistence
pub struct GeofenceStore {
    geofences: Vec<Geofence>,
    alerts: Vec<Alert>,
    persistence: Box<dyn Persistence + Send>,
    load_failed: bool,
    deferred: bool,
    dirty: bool,
}

impl GeofenceStore {
    /// Create an empty store (call `load` to read saved data)
    pub fn new(persistence: Box<dyn Persistence + Send>) -> Self {
        Self {
            geofences: Vec::new(),
            alerts: Vec::new(),
            persistence,
            load_failed: false,
            deferred: false,
            dirty: false,
        }
    }

    /// Create a store and load the saved document
    pub fn open(persistence: Box<dyn Persistence + Send>) -> Self {
        let mut store = Self::new(persistence);
        store.load();
        store
    }

    /// Replace the in-memory collections with the saved document
    ///
    /// A failed load is logged, leaves the store empty and blocks saves.
    pub fn load(&mut self) {
        match self.persistence.load() {
            Ok(data) => {
                self.geofences = data.geofences;
                self.alerts = data.alerts;
                self.load_failed = false;
            }
            Err(e) => {
                log::warn!("Failed to load geofences, changes will not be saved: {}", e);
                self.geofences.clear();
                self.alerts.clear();
                self.load_failed = true;
            }
        }
    }

    /// True when the last load failed and saving is blocked
    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    /// Hold saves until `resume_saves`; mutations only mark the store dirty
    pub fn defer_saves(&mut self) {
        self.deferred = true;
    }

    /// Stop deferring and save once if anything changed meanwhile
    pub fn resume_saves(&mut self) {
        self.deferred = false;
        if self.dirty {
            self.persist();
        }
    }

    /// Wait until the persistence collaborator has written every queued save
    pub fn sync(&self) -> Result<()> {
        self.persistence.flush()
    }

    /// Save the current document; failures are logged, never propagated
    fn persist(&mut self) {
        if self.deferred {
            self.dirty = true;
            return;
        }
        self.dirty = false;

        if self.load_failed {
            log::warn!("Not saving: the stored document could not be loaded");
            return;
        }
        if let Err(e) = self.persistence.save(&self.document()) {
            log::warn!("Failed to save geofences: {}", e);
        }
    }

    /// All geofences in insertion order
    pub fn geofences(&self) -> &[Geofence] {
        &self.geofences
    }

    /// Alert history, most recent first
    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    /// Look up a geofence by id
    pub fn find(&self, id: &str) -> Option<&Geofence> {
        self.geofences.iter().find(|g| g.id == id)
    }

    /// Copy of the full document
    pub fn document(&self) -> GeofenceData {
        GeofenceData {
            geofences: self.geofences.clone(),
            alerts: self.alerts.clone(),
        }
    }

    /// Create a geofence from a draft
    ///
    /// Fills in the type's default color and radius, and the type's polygon
    /// template when a polygon draft has no vertices.
    pub fn add_geofence(&mut self, draft: GeofenceDraft) -> Result<Geofence> {
        let polygon = if draft.shape == GeofenceShape::Polygon && draft.polygon.is_empty() {
            draft.kind.default_polygon()
        } else {
            draft.polygon
        };
        let center = match draft.shape {
            GeofenceShape::Polygon => draft.center.or_else(|| centroid(&polygon)),
            GeofenceShape::Circle => draft.center,
        };

        let geofence = Geofence {
            id: Uuid::new_v4().to_string(),
            name: draft.name.trim().to_string(),
            shape: draft.shape,
            center,
            radius: Some(draft.radius.unwrap_or_else(|| draft.kind.default_radius())),
            polygon,
            color: draft
                .color
                .unwrap_or_else(|| draft.kind.default_color().to_string()),
            kind: draft.kind,
            enabled: draft.enabled,
            assigned_users: draft.assigned_users,
            created_at: Some(Utc::now()),
        };
        check_definition(&geofence)?;

        log::info!("Added geofence {} ({})", geofence.name, geofence.id);
        self.geofences.push(geofence.clone());
        self.persist();
        Ok(geofence)
    }

    /// Merge `update` into an existing geofence
    pub fn update_geofence(&mut self, id: &str, update: GeofenceUpdate) -> Result<Geofence> {
        let slot = self
            .geofences
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| GeofenceError::GeofenceNotFound(id.to_string()))?;

        let mut updated = slot.clone();
        update.apply(&mut updated);
        check_definition(&updated)?;
        *slot = updated.clone();

        log::info!("Updated geofence {} ({})", updated.name, updated.id);
        self.persist();
        Ok(updated)
    }

    /// Remove a geofence together with every alert that references it
    pub fn delete_geofence(&mut self, id: &str) -> Result<Geofence> {
        let index = self
            .geofences
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| GeofenceError::GeofenceNotFound(id.to_string()))?;

        let removed = self.geofences.remove(index);
        self.alerts.retain(|a| a.geofence_id != id);

        log::info!("Deleted geofence {} ({})", removed.name, removed.id);
        self.persist();
        Ok(removed)
    }

    /// Flip the enabled flag, returning the new value
    pub fn toggle_geofence(&mut self, id: &str) -> Result<bool> {
        let geofence = self
            .geofences
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| GeofenceError::GeofenceNotFound(id.to_string()))?;

        geofence.enabled = !geofence.enabled;
        let enabled = geofence.enabled;
        log::info!("Geofence {} is now {}", id, if enabled { "enabled" } else { "disabled" });

        self.persist();
        Ok(enabled)
    }

    /// Prepend an alert to the history
    pub fn add_alert(&mut self, alert: Alert) {
        self.alerts.insert(0, alert);
        self.persist();
    }

    /// Remove every alert
    pub fn clear_alerts(&mut self) {
        let count = self.alerts.len();
        self.alerts.clear();
        log::info!("Cleared {} alerts", count);
        self.persist();
    }
}

impl GeofenceRepository for GeofenceStore {
    fn geofences(&self) -> Vec<Geofence> {
        self.geofences.clone()
    }
}

impl AlertSink for GeofenceStore {
    fn record_alert(&mut self, alert: Alert) -> Result<()> {
        self.add_alert(alert);
        Ok(())
    }
}

impl std::fmt::Debug for GeofenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeofenceStore")
            .field("geofences", &self.geofences.len())
            .field("alerts", &self.alerts.len())
            .field("load_failed", &self.load_failed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPersistence;
    use crate::types::AlertType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FailingPersistence;

    /// Unreadable on load, counts every save
    struct UnreadablePersistence {
        saves: Arc<AtomicUsize>,
    }

    impl Persistence for UnreadablePersistence {
        fn load(&self) -> Result<GeofenceData> {
            Err(GeofenceError::Persistence("permission denied".to_string()))
        }

        fn save(&self, _data: &GeofenceData) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Persistence for FailingPersistence {
        fn load(&self) -> Result<GeofenceData> {
            Err(GeofenceError::Persistence("unreadable".to_string()))
        }

        fn save(&self, _data: &GeofenceData) -> Result<()> {
            Err(GeofenceError::Persistence("read-only".to_string()))
        }
    }

    fn store() -> (GeofenceStore, MemoryPersistence) {
        let persistence = MemoryPersistence::new();
        (GeofenceStore::new(Box::new(persistence.clone())), persistence)
    }

    fn alert_for(geofence_id: &str, id: &str) -> Alert {
        Alert {
            id: id.to_string(),
            geofence_id: geofence_id.to_string(),
            kind: AlertType::Enter,
            timestamp: Utc::now(),
            location: Coordinate::new(0.0, 0.0),
            message: "Entered X (custom)".to_string(),
        }
    }

    #[test]
    fn test_add_fills_defaults_and_persists() {
        let (mut store, persistence) = store();
        let mut draft = GeofenceDraft::circle("School", GeofenceType::School, Coordinate::new(1.0, 1.0), 0.0);
        draft.radius = None;

        let fence = store.add_geofence(draft).unwrap();
        assert_eq!(fence.radius, Some(50.0));
        assert_eq!(fence.color, "#3b82f6");
        assert!(fence.created_at.is_some());
        assert_eq!(persistence.snapshot().geofences, vec![fence]);
    }

    #[test]
    fn test_polygon_draft_uses_template() {
        let (mut store, _) = store();
        let fence = store
            .add_geofence(GeofenceDraft::polygon("Site", GeofenceType::Construction, Vec::new()))
            .unwrap();
        assert_eq!(fence.polygon, GeofenceType::Construction.default_polygon());
        assert!(fence.center.is_some());
        assert!(fence.has_valid_polygon());
    }

    #[test]
    fn test_add_rejects_invalid_drafts() {
        let (mut store, _) = store();
        let origin = Coordinate::new(0.0, 0.0);

        assert!(store
            .add_geofence(GeofenceDraft::circle("  ", GeofenceType::Custom, origin, 10.0))
            .is_err());
        assert!(store
            .add_geofence(GeofenceDraft::circle("Neg", GeofenceType::Custom, origin, -1.0))
            .is_err());
        assert!(store
            .add_geofence(GeofenceDraft::circle("Far", GeofenceType::Custom, Coordinate::new(95.0, 0.0), 1.0))
            .is_err());
        assert!(store.geofences().is_empty());
    }

    #[test]
    fn test_update_merges_fields() {
        let (mut store, _) = store();
        let fence = store
            .add_geofence(GeofenceDraft::circle("Old", GeofenceType::Custom, Coordinate::new(0.0, 0.0), 10.0))
            .unwrap();

        let updated = store
            .update_geofence(
                &fence.id,
                GeofenceUpdate {
                    name: Some("New".to_string()),
                    radius: Some(25.0),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.name, "New");
        assert_eq!(updated.radius, Some(25.0));
        assert_eq!(updated.center, fence.center);
        assert_eq!(store.find(&fence.id), Some(&updated));
    }

    #[test]
    fn test_invalid_update_leaves_geofence_unchanged() {
        let (mut store, _) = store();
        let fence = store
            .add_geofence(GeofenceDraft::circle("Keep", GeofenceType::Custom, Coordinate::new(0.0, 0.0), 10.0))
            .unwrap();

        let result = store.update_geofence(
            &fence.id,
            GeofenceUpdate {
                radius: Some(f64::NAN),
                ..Default::default()
            },
        );
        assert!(result.is_err());
        assert_eq!(store.find(&fence.id), Some(&fence));
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let (mut store, _) = store();
        assert!(matches!(store.toggle_geofence("x"), Err(GeofenceError::GeofenceNotFound(_))));
        assert!(matches!(store.delete_geofence("x"), Err(GeofenceError::GeofenceNotFound(_))));
        assert!(store.update_geofence("x", GeofenceUpdate::default()).is_err());
    }

    #[test]
    fn test_delete_removes_related_alerts() {
        let (mut store, persistence) = store();
        let keep = store
            .add_geofence(GeofenceDraft::circle("Keep", GeofenceType::Custom, Coordinate::new(0.0, 0.0), 10.0))
            .unwrap();
        let gone = store
            .add_geofence(GeofenceDraft::circle("Gone", GeofenceType::Custom, Coordinate::new(1.0, 1.0), 10.0))
            .unwrap();
        store.add_alert(alert_for(&keep.id, "a1"));
        store.add_alert(alert_for(&gone.id, "a2"));

        store.delete_geofence(&gone.id).unwrap();
        assert_eq!(store.geofences().len(), 1);
        assert_eq!(store.alerts().len(), 1);
        assert_eq!(store.alerts()[0].id, "a1");
        assert_eq!(persistence.snapshot().alerts.len(), 1);
    }

    #[test]
    fn test_alerts_are_most_recent_first() {
        let (mut store, _) = store();
        store.add_alert(alert_for("g", "first"));
        store.add_alert(alert_for("g", "second"));
        assert_eq!(store.alerts()[0].id, "second");

        store.clear_alerts();
        assert!(store.alerts().is_empty());
    }

    #[test]
    fn test_toggle_flips_enabled() {
        let (mut store, _) = store();
        let fence = store
            .add_geofence(GeofenceDraft::circle("T", GeofenceType::Custom, Coordinate::new(0.0, 0.0), 10.0))
            .unwrap();
        assert!(!store.toggle_geofence(&fence.id).unwrap());
        assert!(store.toggle_geofence(&fence.id).unwrap());
    }

    #[test]
    fn test_save_failure_keeps_memory_state() {
        let mut store = GeofenceStore::open(Box::new(FailingPersistence));
        assert!(store.geofences().is_empty());

        let fence = store
            .add_geofence(GeofenceDraft::circle("Mem", GeofenceType::Custom, Coordinate::new(0.0, 0.0), 10.0))
            .unwrap();
        assert_eq!(store.find(&fence.id).map(|g| g.name.as_str()), Some("Mem"));
    }

    #[test]
    fn test_open_loads_saved_document() {
        let persistence = MemoryPersistence::new();
        {
            let mut store = GeofenceStore::new(Box::new(persistence.clone()));
            store
                .add_geofence(GeofenceDraft::circle("Saved", GeofenceType::Custom, Coordinate::new(0.0, 0.0), 10.0))
                .unwrap();
        }
        let reopened = GeofenceStore::open(Box::new(persistence));
        assert_eq!(reopened.geofences().len(), 1);
    }

    #[test]
    fn test_failed_load_blocks_saves() {
        let saves = Arc::new(AtomicUsize::new(0));
        let mut store = GeofenceStore::open(Box::new(UnreadablePersistence {
            saves: Arc::clone(&saves),
        }));
        assert!(store.load_failed());

        store
            .add_geofence(GeofenceDraft::circle("Mem", GeofenceType::Custom, Coordinate::new(0.0, 0.0), 10.0))
            .unwrap();
        store.add_alert(alert_for("g", "a1"));
        assert_eq!(store.geofences().len(), 1);
        assert_eq!(saves.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_deferred_saves_are_batched() {
        let (mut store, persistence) = store();
        store.defer_saves();
        store.add_alert(alert_for("g", "a1"));
        store.add_alert(alert_for("g", "a2"));
        assert!(persistence.snapshot().alerts.is_empty());

        store.resume_saves();
        assert_eq!(persistence.snapshot().alerts.len(), 2);
        assert!(store.sync().is_ok());
    }
}
