//! Containment evaluation
//!
//! Decides whether a single location sample lies inside a single geofence.
//! The evaluator only reads geofence records; it never mutates them and keeps
//! no state between calls.

use crate::geometry::{distance_meters, point_in_polygon};
use crate::types::{Coordinate, Geofence, GeofenceError, Location, Result};

/// Evaluate containment of `sample` in `geofence`
///
/// # Returns
/// * `Ok(false)` for disabled geofences, whatever the position
/// * `Ok(inside)` from the ray-casting test for polygons with at least three vertices
/// * `Ok(distance <= radius)` for circles and for degenerate polygons
/// * `Err(MalformedGeofence)` if the data needed for the chosen test is missing or invalid
pub fn is_inside(sample: &Location, geofence: &Geofence) -> Result<bool> {
    if !geofence.enabled {
        return Ok(false);
    }

    let point = sample.coordinate();

    if geofence.has_valid_polygon() {
        if let Some(bad) = geofence.polygon.iter().find(|v| !v.is_valid()) {
            return Err(GeofenceError::malformed(
                &geofence.id,
                format!("polygon vertex {} is out of range", bad),
            ));
        }
        return Ok(point_in_polygon(&point, &geofence.polygon));
    }

    // Circles, plus polygons with fewer than three vertices, use the radius test
    let (center, radius) = circle_parameters(geofence)?;
    Ok(distance_meters(&point, &center) <= radius)
}

/// Check a geofence for the fields its containment test needs
pub fn validate(geofence: &Geofence) -> Result<()> {
    if geofence.has_valid_polygon() {
        if geofence.polygon.iter().all(Coordinate::is_valid) {
            return Ok(());
        }
        return Err(GeofenceError::malformed(
            &geofence.id,
            "polygon has out-of-range vertices",
        ));
    }
    circle_parameters(geofence).map(|_| ())
}

fn circle_parameters(geofence: &Geofence) -> Result<(Coordinate, f64)> {
    let center = geofence
        .center
        .ok_or_else(|| GeofenceError::malformed(&geofence.id, "missing center"))?;
    if !center.is_valid() {
        return Err(GeofenceError::malformed(
            &geofence.id,
            format!("center {} is out of range", center),
        ));
    }

    let radius = geofence
        .radius
        .ok_or_else(|| GeofenceError::malformed(&geofence.id, "missing radius"))?;
    if !radius.is_finite() || radius < 0.0 {
        return Err(GeofenceError::malformed(
            &geofence.id,
            format!("invalid radius {}", radius),
        ));
    }

    Ok((center, radius))
}
