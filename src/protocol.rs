//! Custom-scheme protocol handler registration, the seam a web view's
//! resource loader calls into to resolve `app://`, `socket://`-style
//! requests — either straight from the filesystem or by routing through a
//! service worker (spec §4.2.5 "Protocol handlers").

use mime_guess::MimeGuess;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::RouteError;
use crate::serviceworker::ServiceWorkerContainer;

/// A resolved protocol response: status, content type and body. The
/// web-view host is responsible for feeding this into its resource
/// loader; this crate only resolves it.
#[derive(Debug, Clone)]
pub struct ProtocolResponse {
    pub status_code: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Implemented once per registered scheme; `handle` is called for every
/// request whose scheme matches during registration.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, pathname: &str) -> Result<ProtocolResponse, RouteError>;
}

/// Serves files relative to a root directory, guessing content type from
/// extension.
pub struct FileRequestHandler {
    root: std::path::PathBuf,
}

impl FileRequestHandler {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl RequestHandler for FileRequestHandler {
    fn handle(&self, pathname: &str) -> Result<ProtocolResponse, RouteError> {
        let relative = pathname.trim_start_matches('/');
        let path = self.root.join(relative);
        let body = std::fs::read(&path)?;
        let content_type = MimeGuess::from_path(&path)
            .first_or_octet_stream()
            .to_string();
        Ok(ProtocolResponse {
            status_code: 200,
            content_type,
            body,
        })
    }
}

/// Wrapped in a `Mutex` (rather than taking `&mut self`) so it can live as
/// `Arc<ProtocolRegistry>` inside `Services` and be reached from route
/// handlers, which only ever see `&Bridge`.
pub struct ProtocolRegistry {
    handlers: Mutex<std::collections::HashMap<String, Box<dyn RequestHandler>>>,
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(std::collections::HashMap::new()),
        }
    }

    pub fn register(&self, scheme: impl Into<String>, handler: Box<dyn RequestHandler>) {
        self.handlers.lock().insert(scheme.into(), handler);
    }

    pub fn unregister(&self, scheme: &str) {
        self.handlers.lock().remove(scheme);
    }

    /// Resolves a request: if the scheme has a service-worker registration
    /// bound to it, the caller is expected to route through
    /// `ServiceWorkerContainer::resolve`/`allocate_fetch` instead; this
    /// returns `None` to signal that handoff, matching
    /// `protocol.getServiceWorkerRegistration`'s precedence over a direct
    /// file handler.
    pub fn resolve(
        &self,
        scheme: &str,
        pathname: &str,
        service_workers: &ServiceWorkerContainer,
    ) -> Result<Option<ProtocolResponse>, RouteError> {
        if service_workers.protocol_registration(scheme).is_some() {
            return Ok(None);
        }
        match self.handlers.lock().get(scheme) {
            Some(handler) => handler.handle(pathname).map(Some),
            None => Err(RouteError::not_found(format!("no handler registered for scheme '{scheme}'"))),
        }
    }

    pub fn data(&self, scheme: &str, service_workers: &ServiceWorkerContainer) -> Option<Value> {
        service_workers.protocol_data(scheme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_handler_serves_from_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), b"<html></html>").unwrap();

        let registry = ProtocolRegistry::new();
        registry.register("app", Box::new(FileRequestHandler::new(dir.path())));
        let service_workers = ServiceWorkerContainer::new();

        let response = registry
            .resolve("app", "/index.html", &service_workers)
            .unwrap()
            .unwrap();
        assert_eq!(response.body, b"<html></html>");
        assert_eq!(response.content_type, "text/html");
    }

    #[test]
    fn service_worker_bound_scheme_defers_to_fetch() {
        let registry = ProtocolRegistry::new();
        registry.register("app", Box::new(FileRequestHandler::new(".")));
        let service_workers = ServiceWorkerContainer::new();
        let reg_id = service_workers.register("app", "/", "worker.js");
        service_workers.register_protocol("app", Some(reg_id));

        let resolved = registry.resolve("app", "/index.html", &service_workers).unwrap();
        assert!(resolved.is_none());
    }
}
