//! Console notifications

use geofence_engine::{Notifier, Result};
use std::io::{self, Write};

/// Prints notifications to stdout
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        log::info!("Notification: {} - {}", title, body);
        let mut out = io::stdout().lock();
        writeln!(out, "🔔 {}: {}", title, body)?;
        out.flush()?;
        Ok(())
    }
}
