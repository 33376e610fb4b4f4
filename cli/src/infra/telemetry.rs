//! `TelemetrySink` that reports operations through `tracing`.

use crate::application::ports::{TelemetryEvent, TelemetrySink};

pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record(&self, event: &TelemetryEvent) {
        tracing::debug!(
            target: "rediacc::telemetry",
            operation = %event.operation,
            success = event.success,
            duration_ms = u64::try_from(event.duration.as_millis()).unwrap_or(u64::MAX),
            status_code = event.status_code,
            "operation finished"
        );
    }
}
