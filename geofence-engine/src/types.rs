//! Core types for the geofence engine
//!
//! This module defines the data model shared by every stage of an evaluation
//! pass: location samples, geofence definitions, alerts and the persisted
//! document. The records serialise with camelCase keys so a saved document
//! can be loaded by any client that speaks the same format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Timestamp type used for alert and geofence records
pub type Timestamp = DateTime<Utc>;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, GeofenceError>;

/// A point on the globe in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees (-90..=90)
    pub latitude: f64,
    /// Longitude in degrees (-180..=180)
    pub longitude: f64,
}

impl Coordinate {
    /// Create a new coordinate
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// True if both components are finite and inside the valid degree ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// A single location sample reported by the device
///
/// Samples are produced by a location source on a fixed cadence and never
/// modified afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Reported accuracy radius in meters
    #[serde(default)]
    pub accuracy: f64,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub timestamp: i64,
}

impl Location {
    /// Create a sample with explicit accuracy and timestamp
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            timestamp,
        }
    }

    /// Create a sample stamped with the current wall-clock time
    pub fn now(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self::new(latitude, longitude, accuracy, Utc::now().timestamp_millis())
    }

    /// The sample position without accuracy and timestamp
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Geometric shape of a geofence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeofenceShape {
    /// Center point plus radius in meters
    #[default]
    Circle,
    /// Ordered ring of vertices (closed implicitly from last to first)
    Polygon,
}

impl fmt::Display for GeofenceShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeofenceShape::Circle => write!(f, "circle"),
            GeofenceShape::Polygon => write!(f, "polygon"),
        }
    }
}

/// Category of a geofence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeofenceType {
    Factory,
    School,
    Construction,
    #[default]
    Custom,
}

impl GeofenceType {
    /// Every known geofence type, in catalogue order
    pub const ALL: [GeofenceType; 4] = [
        GeofenceType::Factory,
        GeofenceType::School,
        GeofenceType::Construction,
        GeofenceType::Custom,
    ];

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            GeofenceType::Factory => "Factory",
            GeofenceType::School => "School",
            GeofenceType::Construction => "Construction",
            GeofenceType::Custom => "Custom",
        }
    }

    /// Icon shown next to the label
    pub fn icon(&self) -> &'static str {
        match self {
            GeofenceType::Factory => "🏭",
            GeofenceType::School => "🏫",
            GeofenceType::Construction => "🚧",
            GeofenceType::Custom => "📍",
        }
    }

    /// Default display color (hex)
    pub fn default_color(&self) -> &'static str {
        match self {
            GeofenceType::Factory => "#ef4444",
            GeofenceType::School => "#3b82f6",
            GeofenceType::Construction => "#f59e0b",
            GeofenceType::Custom => "#8b5cf6",
        }
    }

    /// Default radius in meters for newly created geofences of this type
    pub fn default_radius(&self) -> f64 {
        match self {
            GeofenceType::Factory => 100.0,
            GeofenceType::School => 50.0,
            GeofenceType::Construction => 200.0,
            GeofenceType::Custom => 100.0,
        }
    }

    /// Default square polygon template for this type
    pub fn default_polygon(&self) -> Vec<Coordinate> {
        let (lat, lon, size) = match self {
            GeofenceType::Factory => (37.7749, -122.4194, 0.001),
            GeofenceType::School => (37.7849, -122.4094, 0.001),
            GeofenceType::Construction => (37.7649, -122.4294, 0.002),
            GeofenceType::Custom => (37.7549, -122.4394, 0.001),
        };
        vec![
            Coordinate::new(lat, lon),
            Coordinate::new(lat + size, lon),
            Coordinate::new(lat + size, lon + size),
            Coordinate::new(lat, lon + size),
        ]
    }
}

impl fmt::Display for GeofenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeofenceType::Factory => write!(f, "factory"),
            GeofenceType::School => write!(f, "school"),
            GeofenceType::Construction => write!(f, "construction"),
            GeofenceType::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for GeofenceType {
    type Err = GeofenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "factory" => Ok(GeofenceType::Factory),
            "school" => Ok(GeofenceType::School),
            "construction" => Ok(GeofenceType::Construction),
            "custom" => Ok(GeofenceType::Custom),
            other => Err(GeofenceError::InvalidGeofence(format!(
                "unknown geofence type '{}'",
                other
            ))),
        }
    }
}

fn default_true() -> bool {
    true
}

/// A named geographic region
///
/// `center` and `radius` are optional in storage so that a malformed record
/// survives loading; the evaluator rejects it per pass instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geofence {
    /// Unique identifier
    pub id: String,
    /// Display name, used in alert messages
    pub name: String,
    /// Circle or polygon
    #[serde(default)]
    pub shape: GeofenceShape,
    /// Circle center, or label position for polygons
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<Coordinate>,
    /// Radius in meters (circle, and fallback for degenerate polygons)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    /// Polygon vertices in edge order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub polygon: Vec<Coordinate>,
    /// Display color (hex)
    #[serde(default)]
    pub color: String,
    /// Category
    #[serde(rename = "type", default)]
    pub kind: GeofenceType,
    /// Disabled geofences are evaluated as if absent
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// User ids this geofence applies to
    #[serde(default)]
    pub assigned_users: BTreeSet<String>,
    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

impl Geofence {
    /// Build an enabled circular geofence
    pub fn circle(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: GeofenceType,
        center: Coordinate,
        radius: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            shape: GeofenceShape::Circle,
            center: Some(center),
            radius: Some(radius),
            polygon: Vec::new(),
            color: kind.default_color().to_string(),
            kind,
            enabled: true,
            assigned_users: BTreeSet::new(),
            created_at: None,
        }
    }

    /// Build an enabled polygonal geofence
    ///
    /// The center is set to the vertex centroid and the radius to the type's
    /// default so a degenerate ring still has something to fall back on.
    pub fn polygon(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: GeofenceType,
        vertices: Vec<Coordinate>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            shape: GeofenceShape::Polygon,
            center: crate::geometry::centroid(&vertices),
            radius: Some(kind.default_radius()),
            polygon: vertices,
            color: kind.default_color().to_string(),
            kind,
            enabled: true,
            assigned_users: BTreeSet::new(),
            created_at: None,
        }
    }

    /// Builder method: set the enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder method: override center and radius
    pub fn with_circle(mut self, center: Coordinate, radius: f64) -> Self {
        self.center = Some(center);
        self.radius = Some(radius);
        self
    }

    /// True if this geofence is a polygon with enough vertices to test
    pub fn has_valid_polygon(&self) -> bool {
        self.shape == GeofenceShape::Polygon && self.polygon.len() >= 3
    }
}

/// Direction of a containment transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    /// Outside -> inside
    Enter,
    /// Inside -> outside
    Exit,
}

impl AlertType {
    /// Past-tense verb used in alert messages
    pub fn verb(&self) -> &'static str {
        match self {
            AlertType::Enter => "Entered",
            AlertType::Exit => "Exited",
        }
    }

    /// Notification title for this kind of alert
    pub fn title(&self) -> &'static str {
        match self {
            AlertType::Enter => "Geofence Enter",
            AlertType::Exit => "Geofence Exit",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertType::Enter => write!(f, "enter"),
            AlertType::Exit => write!(f, "exit"),
        }
    }
}

impl std::str::FromStr for AlertType {
    type Err = GeofenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "enter" => Ok(AlertType::Enter),
            "exit" => Ok(AlertType::Exit),
            other => Err(GeofenceError::InvalidGeofence(format!(
                "unknown alert type '{}'",
                other
            ))),
        }
    }
}

/// A recorded enter/exit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Unique identifier
    pub id: String,
    /// Geofence that was entered or exited
    pub geofence_id: String,
    /// Enter or exit
    #[serde(rename = "type")]
    pub kind: AlertType,
    /// When the transition was detected
    pub timestamp: Timestamp,
    /// Sample position that triggered the transition
    pub location: Coordinate,
    /// "<Entered|Exited> <name> (<type>)"
    pub message: String,
}

/// The persisted document: every geofence plus the alert history
///
/// Alerts are kept most recent first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeofenceData {
    #[serde(default)]
    pub geofences: Vec<Geofence>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

/// Errors raised by the engine and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum GeofenceError {
    #[error("Malformed geofence '{id}': {reason}")]
    MalformedGeofence { id: String, reason: String },

    #[error("Geofence not found: {0}")]
    GeofenceNotFound(String),

    #[error("Invalid geofence: {0}")]
    InvalidGeofence(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl GeofenceError {
    /// Shorthand for a malformed-geofence error
    pub fn malformed(id: &str, reason: impl Into<String>) -> Self {
        GeofenceError::MalformedGeofence {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}
