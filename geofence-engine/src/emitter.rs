//! Alert emission
//!
//! Turns transitions into alert records and hands them to the collaborators:
//! first the alert sink (history, persistence), then the notifier. Both calls
//! are best-effort and a failure in one never prevents the other.

use crate::collaborators::{AlertSink, Notifier};
use crate::tracker::Transition;
use crate::types::{Alert, AlertType, GeofenceType};
use chrono::Utc;
use uuid::Uuid;

/// Format the alert message, e.g. "Entered Plant 4 (factory)"
pub fn format_message(kind: AlertType, geofence_name: &str, geofence_type: GeofenceType) -> String {
    format!("{} {} ({})", kind.verb(), geofence_name, geofence_type)
}

/// Builds alert records and dispatches their side effects
#[derive(Debug, Clone)]
pub struct AlertEmitter {
    notifications_enabled: bool,
}

impl AlertEmitter {
    /// Create an emitter
    pub fn new(notifications_enabled: bool) -> Self {
        Self {
            notifications_enabled,
        }
    }

    /// Whether the notifier is called for new alerts
    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled
    }

    /// Enable or disable notifications (alerts are still recorded)
    pub fn set_notifications_enabled(&mut self, enabled: bool) {
        self.notifications_enabled = enabled;
    }

    /// Build the alert record for a transition, stamped with the current time
    pub fn build_alert(&self, transition: &Transition) -> Alert {
        Alert {
            id: Uuid::new_v4().to_string(),
            geofence_id: transition.geofence_id.clone(),
            kind: transition.kind,
            timestamp: Utc::now(),
            location: transition.location,
            message: format_message(
                transition.kind,
                &transition.geofence_name,
                transition.geofence_type,
            ),
        }
    }

    /// Build an alert and dispatch it to the sink and the notifier
    ///
    /// # Returns
    /// The alert that was built, whether or not the collaborators succeeded
    pub fn emit(
        &self,
        transition: &Transition,
        sink: &mut dyn AlertSink,
        notifier: &dyn Notifier,
    ) -> Alert {
        let alert = self.build_alert(transition);

        if let Err(e) = sink.record_alert(alert.clone()) {
            log::warn!("Failed to record alert {}: {}", alert.id, e);
        }

        if self.notifications_enabled {
            if let Err(e) = notifier.notify(alert.kind.title(), &alert.message) {
                log::debug!("Notification failed for alert {}: {}", alert.id, e);
            }
        }

        alert
    }
}

impl Default for AlertEmitter {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coordinate, GeofenceError, Result};
    use std::cell::RefCell;

    #[derive(Default)]
    struct VecSink {
        alerts: Vec<Alert>,
        fail: bool,
    }

    impl AlertSink for VecSink {
        fn record_alert(&mut self, alert: Alert) -> Result<()> {
            if self.fail {
                return Err(GeofenceError::Persistence("disk full".to_string()));
            }
            self.alerts.insert(0, alert);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: RefCell<Vec<(String, String)>>,
        fail: bool,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, body: &str) -> Result<()> {
            self.sent.borrow_mut().push((title.to_string(), body.to_string()));
            if self.fail {
                return Err(GeofenceError::Notification("unsupported".to_string()));
            }
            Ok(())
        }
    }

    fn transition(kind: AlertType) -> Transition {
        Transition {
            geofence_id: "gf-1".to_string(),
            geofence_name: "Plant 4".to_string(),
            geofence_type: GeofenceType::Factory,
            kind,
            location: Coordinate::new(1.5, 2.5),
            sample_timestamp: 42,
        }
    }

    #[test]
    fn test_message_format() {
        assert_eq!(
            format_message(AlertType::Enter, "Plant 4", GeofenceType::Factory),
            "Entered Plant 4 (factory)"
        );
        assert_eq!(
            format_message(AlertType::Exit, "Elm St", GeofenceType::School),
            "Exited Elm St (school)"
        );
    }

    #[test]
    fn test_emit_records_then_notifies() {
        let emitter = AlertEmitter::default();
        let mut sink = VecSink::default();
        let notifier = RecordingNotifier::default();

        let alert = emitter.emit(&transition(AlertType::Exit), &mut sink, &notifier);

        assert_eq!(alert.geofence_id, "gf-1");
        assert_eq!(alert.location, Coordinate::new(1.5, 2.5));
        assert_eq!(sink.alerts, vec![alert.clone()]);
        assert_eq!(
            notifier.sent.borrow().as_slice(),
            &[("Geofence Exit".to_string(), "Exited Plant 4 (factory)".to_string())]
        );
    }

    #[test]
    fn test_sink_failure_does_not_block_notification() {
        let emitter = AlertEmitter::default();
        let mut sink = VecSink {
            fail: true,
            ..Default::default()
        };
        let notifier = RecordingNotifier::default();

        emitter.emit(&transition(AlertType::Enter), &mut sink, &notifier);
        assert!(sink.alerts.is_empty());
        assert_eq!(notifier.sent.borrow().len(), 1);
    }

    #[test]
    fn test_notifier_failure_is_ignored() {
        let emitter = AlertEmitter::default();
        let mut sink = VecSink::default();
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };

        let alert = emitter.emit(&transition(AlertType::Enter), &mut sink, &notifier);
        assert_eq!(sink.alerts[0].id, alert.id);
    }

    #[test]
    fn test_disabled_notifications_still_record() {
        let emitter = AlertEmitter::new(false);
        let mut sink = VecSink::default();
        let notifier = RecordingNotifier::default();

        emitter.emit(&transition(AlertType::Enter), &mut sink, &notifier);
        assert_eq!(sink.alerts.len(), 1);
        assert!(notifier.sent.borrow().is_empty());
    }

    #[test]
    fn test_alert_ids_are_unique() {
        let emitter = AlertEmitter::default();
        let a = emitter.build_alert(&transition(AlertType::Enter));
        let b = emitter.build_alert(&transition(AlertType::Enter));
        assert_ne!(a.id, b.id);
    }
}
