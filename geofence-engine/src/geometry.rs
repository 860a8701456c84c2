//! Geometry primitives
//!
//! Great-circle distance on a spherical Earth and an even-odd point-in-polygon
//! test on plain latitude/longitude coordinates.

use crate::types::Coordinate;

/// Mean Earth radius in meters used by the haversine formula
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters (haversine formula)
///
/// NaN components propagate to a NaN result.
pub fn distance_meters(a: &Coordinate, b: &Coordinate) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Even-odd ray casting test
///
/// Vertices are treated as plane coordinates with longitude as x and latitude
/// as y. Edges join consecutive vertices and wrap from the last back to the
/// first. A ring with fewer than three vertices contains nothing.
///
/// Points exactly on an edge follow the half-open crossing rule and may land
/// on either side.
pub fn point_in_polygon(point: &Coordinate, vertices: &[Coordinate]) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let (x, y) = (point.longitude, point.latitude);
    let mut inside = false;
    let mut j = vertices.len() - 1;

    for i in 0..vertices.len() {
        let (xi, yi) = (vertices[i].longitude, vertices[i].latitude);
        let (xj, yj) = (vertices[j].longitude, vertices[j].latitude);

        // (yi > y) != (yj > y) also rules out horizontal edges, so no division by zero
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Arithmetic mean of the vertices, or `None` for an empty ring
pub fn centroid(vertices: &[Coordinate]) -> Option<Coordinate> {
    if vertices.is_empty() {
        return None;
    }
    let n = vertices.len() as f64;
    let (lat, lon) = vertices
        .iter()
        .fold((0.0, 0.0), |(lat, lon), v| (lat + v.latitude, lon + v.longitude));
    Some(Coordinate::new(lat / n, lon / n))
}
