//! Permission query/request tracking, keyed by permission name.
//!
//! `permissions.query`/`.request` expose a simple `granted | denied |
//! prompt` tri-state store; no platform permission dialog is linked.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
}

impl PermissionState {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
            PermissionState::Prompt => "prompt",
        }
    }
}

#[derive(Default)]
pub struct PermissionsService {
    states: Mutex<HashMap<String, PermissionState>>,
}

impl PermissionsService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self, name: &str) -> PermissionState {
        self.states
            .lock()
            .get(name)
            .copied()
            .unwrap_or(PermissionState::Prompt)
    }

    /// Requesting a permission that hasn't been decided yet grants it;
    /// re-requesting returns the previously recorded decision unchanged.
    pub fn request(&self, name: &str) -> PermissionState {
        let mut table = self.states.lock();
        *table.entry(name.to_string()).or_insert(PermissionState::Granted)
    }

    pub fn set(&self, name: &str, state: PermissionState) {
        self.states.lock().insert(name.to_string(), state);
    }
}

pub type SharedPermissionsService = Arc<PermissionsService>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrequested_permission_is_prompt() {
        let svc = PermissionsService::new();
        assert_eq!(svc.query("geolocation"), PermissionState::Prompt);
    }

    #[test]
    fn request_grants_then_persists() {
        let svc = PermissionsService::new();
        assert_eq!(svc.request("geolocation"), PermissionState::Granted);
        svc.set("geolocation", PermissionState::Denied);
        assert_eq!(svc.request("geolocation"), PermissionState::Denied);
    }
}
