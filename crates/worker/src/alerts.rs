//! Best-effort alert persistence.

use pipeline_core::{Alert, DocumentStore};
use telemetry::metrics;
use tracing::{error, warn};

/// Writes alerts to the document store.
///
/// Failures are logged and counted, never returned: a reading that reached
/// both stores stays processed even if its alerts are lost.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertSink;

impl AlertSink {
    pub fn new() -> Self {
        Self
    }

    /// Writes each alert once. Returns how many were stored.
    pub async fn write(&self, documents: &dyn DocumentStore, alerts: &[Alert]) -> usize {
        let m = metrics();
        let mut stored = 0;

        for alert in alerts {
            m.alerts_generated.inc();
            match documents.insert_alert(alert).await {
                Ok(()) => {
                    stored += 1;
                    warn!(
                        alert_type = alert.alert_type.as_str(),
                        sensor_id = %alert.sensor_id,
                        value = alert.value,
                        "Alert generated"
                    );
                }
                Err(e) => {
                    m.alert_write_errors.inc();
                    error!(
                        alert_type = alert.alert_type.as_str(),
                        sensor_id = %alert.sensor_id,
                        error = %e,
                        "Failed to store alert"
                    );
                }
            }
        }

        stored
    }
}
