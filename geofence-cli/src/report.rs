//! Text report generation
//!
//! Renders the geofence list and the alert history as plain-text tables.

use chrono::Local;
use geofence_engine::{Alert, AlertType, Geofence, GeofenceShape};
use std::fmt::Write;

/// Summary counts for an alert history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertStats {
    pub total: usize,
    pub enters: usize,
    pub exits: usize,
}

impl AlertStats {
    pub fn from_alerts(alerts: &[Alert]) -> Self {
        let enters = alerts.iter().filter(|a| a.kind == AlertType::Enter).count();
        Self {
            total: alerts.len(),
            enters,
            exits: alerts.len() - enters,
        }
    }
}

/// Keep alerts of one kind (all if `kind` is `None`), newest first, at most `limit`
pub fn filter_alerts<'a>(alerts: &'a [Alert], kind: Option<AlertType>, limit: Option<usize>) -> Vec<&'a Alert> {
    alerts
        .iter()
        .filter(|a| kind.map_or(true, |k| a.kind == k))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// Render the alert history
pub fn render_alerts(alerts: &[&Alert], stats: AlertStats) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Alert History");
    let _ = writeln!(
        out,
        "  Total: {}   Enter: {}   Exit: {}",
        stats.total, stats.enters, stats.exits
    );
    let _ = writeln!(out, "{}", "─".repeat(78));

    if alerts.is_empty() {
        let _ = writeln!(out, "  (no alerts)");
        return out;
    }

    for alert in alerts {
        let marker = match alert.kind {
            AlertType::Enter => "→ ENTER",
            AlertType::Exit => "← EXIT ",
        };
        let _ = writeln!(
            out,
            "{}  {}  {}  {}",
            alert.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
            marker,
            alert.message,
            alert.location
        );
    }

    out
}

/// Render the geofence list
pub fn render_geofences(geofences: &[Geofence]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Geofences ({})", geofences.len());
    let _ = writeln!(out, "{}", "─".repeat(78));

    if geofences.is_empty() {
        let _ = writeln!(out, "  (no geofences)");
        return out;
    }

    for geofence in geofences {
        let state = if geofence.enabled { "on " } else { "off" };
        let area = match geofence.shape {
            GeofenceShape::Polygon => format!("polygon, {} vertices", geofence.polygon.len()),
            GeofenceShape::Circle => match (geofence.center, geofence.radius) {
                (Some(center), Some(radius)) => format!("circle, {:.0} m around {}", radius, center),
                _ => "circle, incomplete".to_string(),
            },
        };
        let _ = writeln!(
            out,
            "[{}] {} {} ({})  {}  id={}",
            state,
            geofence.kind.icon(),
            geofence.name,
            geofence.kind.label(),
            area,
            geofence.id
        );
    }

    out
}
