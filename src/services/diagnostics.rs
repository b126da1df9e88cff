//! Diagnostics snapshot: a point-in-time read of table sizes across the
//! other services, for the `diagnostics.query` route (SPEC_FULL expansion).

use serde_json::{Value, json};

use super::Services;

pub struct DiagnosticsService;

impl DiagnosticsService {
    pub fn new() -> Self {
        Self
    }

    pub fn snapshot(&self, services: &Services) -> Value {
        json!({
            "queuedResponses": services.queued_responses.len(),
            "openFileDescriptors": services.fs.open_descriptor_count(),
            "openSockets": services.udp.socket_count(),
            "runningProcesses": services.process.process_count(),
            "activeTimers": services.timers.timer_count(),
        })
    }
}

impl Default for DiagnosticsService {
    fn default() -> Self {
        Self::new()
    }
}
