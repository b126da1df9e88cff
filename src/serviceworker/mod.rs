//! The Service-Worker Container: registration store, longest-prefix scope
//! resolution, fetch request/response correlation, and protocol-scheme
//! bindings.
//!
//! Grounded in spec §4.2.5 directly (no teacher precedent for service
//! workers specifically); the registration/fetch-correlation table shape
//! follows the same `Mutex<HashMap<id, Entry>>` idiom as every other
//! service in this crate (`fs.rs`'s descriptor table, `udp.rs`'s socket
//! table).

pub mod registration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::RouteError;
use crate::result::IdGenerator;
use registration::{Registration, RegistrationState, Scope};

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: String,
    pub host: String,
    pub scheme: String,
    pub pathname: String,
    pub query: String,
    pub headers: Value,
    pub client: String,
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status_code: u16,
    pub headers: Value,
    pub body: Bytes,
}

struct PendingFetch {
    request: FetchRequest,
}

pub struct ServiceWorkerContainer {
    ids: IdGenerator,
    registrations: Mutex<HashMap<u64, Registration>>,
    pending_fetches: Mutex<HashMap<u64, PendingFetch>>,
    protocol_scopes: Mutex<HashMap<String, u64>>,
    protocol_data: Mutex<HashMap<String, Value>>,
}

impl Default for ServiceWorkerContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceWorkerContainer {
    pub fn new() -> Self {
        Self {
            ids: IdGenerator::new(),
            registrations: Mutex::new(HashMap::new()),
            pending_fetches: Mutex::new(HashMap::new()),
            protocol_scopes: Mutex::new(HashMap::new()),
            protocol_data: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, scheme: &str, pathname: &str, script_url: &str) -> u64 {
        let id = self.ids.next();
        let scope = Scope::new(scheme, pathname);
        let mut registration = Registration::new(id, scope, script_url);
        registration.advance_to_installing();
        registration.advance_to_installed();
        self.registrations.lock().insert(id, registration);
        id
    }

    pub fn unregister(&self, id: u64) -> Result<(), RouteError> {
        self.registrations
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RouteError::not_found(format!("no registration {id}")))
    }

    pub fn skip_waiting(&self, id: u64) -> Result<(), RouteError> {
        let mut table = self.registrations.lock();
        let reg = table
            .get_mut(&id)
            .ok_or_else(|| RouteError::not_found(format!("no registration {id}")))?;
        reg.skip_waiting();
        Ok(())
    }

    pub fn activate(&self, id: u64) -> Result<(), RouteError> {
        let mut table = self.registrations.lock();
        let reg = table
            .get_mut(&id)
            .ok_or_else(|| RouteError::not_found(format!("no registration {id}")))?;
        reg.advance_to_activated();
        Ok(())
    }

    pub fn state_of(&self, id: u64) -> Option<RegistrationState> {
        self.registrations.lock().get(&id).map(|r| r.state)
    }

    /// Resets every registration to `Registered`, as on container
    /// (re)initialization.
    pub fn reset_all(&self) {
        for registration in self.registrations.lock().values_mut() {
            registration.reset();
        }
    }

    /// Longest-prefix scope match among registrations whose scheme is `*`
    /// or matches `scheme`.
    pub fn resolve(&self, scheme: &str, pathname: &str) -> Option<u64> {
        let table = self.registrations.lock();
        table
            .values()
            .filter(|r| r.scope.matches(scheme, pathname))
            .max_by_key(|r| r.scope.pathname.len())
            .map(|r| r.id)
    }

    pub fn allocate_fetch(&self, request: FetchRequest) -> u64 {
        let id = self.ids.next();
        self.pending_fetches.lock().insert(id, PendingFetch { request });
        id
    }

    pub fn fetch_request(&self, id: u64) -> Option<FetchRequest> {
        self.pending_fetches.lock().get(&id).map(|p| p.request.clone())
    }

    /// Completes the fetch, erasing its side-table entry; returns the
    /// response so the caller can relay it back to the original requester.
    pub fn complete_fetch(&self, id: u64, response: FetchResponse) -> Result<FetchResponse, RouteError> {
        self.pending_fetches
            .lock()
            .remove(&id)
            .ok_or_else(|| RouteError::not_found(format!("no pending fetch {id}")))?;
        Ok(response)
    }

    pub fn register_protocol(&self, scheme: &str, registration_id: Option<u64>) {
        if let Some(id) = registration_id {
            self.protocol_scopes.lock().insert(scheme.to_string(), id);
        } else {
            self.protocol_scopes.lock().remove(scheme);
        }
    }

    pub fn protocol_registration(&self, scheme: &str) -> Option<u64> {
        self.protocol_scopes.lock().get(scheme).copied()
    }

    pub fn set_protocol_data(&self, scheme: &str, data: Value) {
        self.protocol_data.lock().insert(scheme.to_string(), data);
    }

    pub fn protocol_data(&self, scheme: &str) -> Option<Value> {
        self.protocol_data.lock().get(scheme).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_longest_matching_scope() {
        let container = ServiceWorkerContainer::new();
        let root = container.register("app", "/", "root.js");
        let nested = container.register("app", "/static", "static.js");

        assert_eq!(container.resolve("app", "/static/a.png"), Some(nested));
        assert_eq!(container.resolve("app", "/other"), Some(root));
    }

    #[test]
    fn fetch_round_trip_erases_pending_entry() {
        let container = ServiceWorkerContainer::new();
        let id = container.allocate_fetch(FetchRequest {
            method: "GET".into(),
            host: "app".into(),
            scheme: "app".into(),
            pathname: "/x".into(),
            query: String::new(),
            headers: json!({}),
            client: "client-1".into(),
        });
        assert!(container.fetch_request(id).is_some());

        container
            .complete_fetch(
                id,
                FetchResponse {
                    status_code: 200,
                    headers: json!({}),
                    body: Bytes::from_static(b"ok"),
                },
            )
            .unwrap();
        assert!(container.fetch_request(id).is_none());
        assert!(container.complete_fetch(id, FetchResponse {
            status_code: 200,
            headers: json!({}),
            body: Bytes::new(),
        }).is_err());
    }

    #[test]
    fn skip_waiting_then_activate() {
        let container = ServiceWorkerContainer::new();
        let id = container.register("app", "/", "worker.js");
        container.skip_waiting(id).unwrap();
        assert_eq!(container.state_of(id), Some(RegistrationState::Activating));
        container.activate(id).unwrap();
        assert_eq!(container.state_of(id), Some(RegistrationState::Activated));
    }
}
