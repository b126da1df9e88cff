//! The IPC route table and dispatcher.
//!
//! Grounded in `original_source/src/runtime/ipc/routes.cc`'s
//! `mapIPCRoutes`/`router->map(name, closure)` pattern: routes are
//! registered into a flat name -> handler table (aliases map to the same
//! handler), and `Router::dispatch` is the single place that turns a
//! `Message` into an `IpcResult`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RouteError;
use crate::message::Message;
use crate::result::IpcResult;

/// A route handler receives the parsed message and the bridge it was
/// dispatched through, and returns either a success payload or a
/// `RouteError`. Boxed so the table can hold handlers of different
/// capturing closures/services uniformly behind one trait object.
pub type RouteHandler =
    Arc<dyn Fn(&crate::bridge::Bridge, &Message) -> Result<IpcResult, RouteError> + Send + Sync>;

#[derive(Default, Clone)]
pub struct Router {
    routes: HashMap<&'static str, RouteHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Registers a handler under `name`. Re-registering a name replaces the
    /// previous handler, matching `router->map`'s last-registration-wins
    /// behavior.
    pub fn map(&mut self, name: &'static str, handler: RouteHandler) -> &mut Self {
        self.routes.insert(name, handler);
        self
    }

    /// Registers the same handler under every name in `names`, used for the
    /// `dnsLookup`/`dns.lookup`-style dotted/camelCase aliasing the original
    /// router exposes for backward compatibility.
    pub fn map_aliases(&mut self, names: &[&'static str], handler: RouteHandler) -> &mut Self {
        for name in names {
            self.routes.insert(name, handler.clone());
        }
        self
    }

    pub fn has_route(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Looks up and invokes the handler for `message.name`. A miss is a
    /// `NotFoundError` per spec §4.1's invocation protocol; a handler that
    /// returns `Err` is translated straight into an `IpcResult::err`.
    pub fn dispatch(&self, bridge: &crate::bridge::Bridge, message: &Message) -> IpcResult {
        match self.routes.get(message.name.as_str()) {
            Some(handler) => match handler(bridge, message) {
                Ok(result) => result,
                Err(err) => IpcResult::err(message, &err),
            },
            None => IpcResult::err(
                message,
                &RouteError::not_found(format!("'{}' is not a recognized route", message.name)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    fn ping_handler() -> RouteHandler {
        Arc::new(|_bridge, message| Ok(IpcResult::ok(message, json!("pong"))))
    }

    #[test]
    fn unregistered_route_is_not_found() {
        let router = Router::new();
        let bridge = crate::bridge::Bridge::for_test();
        let message = Message::parse("nope?seq=1", Bytes::new());
        let result = router.dispatch(&bridge, &message);
        assert!(result.is_err());
    }

    #[test]
    fn registered_route_dispatches() {
        let mut router = Router::new();
        router.map("ping", ping_handler());
        let bridge = crate::bridge::Bridge::for_test();
        let message = Message::parse("ping?seq=1", Bytes::new());
        let result = router.dispatch(&bridge, &message);
        assert!(!result.is_err());
    }

    #[test]
    fn aliases_share_a_handler() {
        let mut router = Router::new();
        router.map_aliases(&["dns.lookup", "dnsLookup"], ping_handler());
        assert!(router.has_route("dns.lookup"));
        assert!(router.has_route("dnsLookup"));
    }
}
