//! The per-window `Bridge`: owns that window's `Router`, holds a shared
//! reference to the runtime-wide `Services`, and knows its own window
//! index so routes can target `window.send`/`window.eval` and service-
//! worker fetch correlation.
//!
//! Grounded in spec §9's prescribed cycle-breaking order: `Router` owns
//! route handlers and holds a non-owning back-reference to the `Bridge`
//! (here, simply: handlers receive `&Bridge` as an argument rather than
//! storing one); `Bridge` is owned by `Window` and reaches the wider
//! runtime only through `Arc`/`Weak`-shared, not owned, state. The `windows`
//! field is the same pattern applied to the window manager itself: a
//! `Weak` handle, never an owning one, so `window.*` routes can reach the
//! real `WindowManager` without the manager<->window<->bridge cycle
//! leaking into reference counts.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::result::{IdGenerator, SharedQueuedResponseStore};
use crate::router::Router;
use crate::serviceworker::ServiceWorkerContainer;
use crate::services::Services;
use crate::window::WindowManager;

#[derive(Clone)]
pub struct Bridge {
    pub router: Router,
    pub services: Arc<Services>,
    pub service_workers: Arc<ServiceWorkerContainer>,
    pub window_index: i32,
    pub queued_responses: SharedQueuedResponseStore,
    pub ids: Arc<IdGenerator>,
    pub windows: Weak<Mutex<WindowManager>>,
}

impl Bridge {
    pub fn new(
        router: Router,
        services: Arc<Services>,
        service_workers: Arc<ServiceWorkerContainer>,
        window_index: i32,
        windows: Weak<Mutex<WindowManager>>,
    ) -> Self {
        let queued_responses = services.queued_responses.clone();
        Self {
            router,
            services,
            service_workers,
            window_index,
            queued_responses,
            ids: Arc::new(IdGenerator::new()),
            windows,
        }
    }

    /// A self-contained bridge with fresh default services and no backing
    /// `WindowManager`, for tests that only need something to dispatch
    /// through and don't care about sharing state across windows.
    pub fn for_test() -> Self {
        let services = Services::new();
        let service_workers = Arc::new(ServiceWorkerContainer::new());
        Self::new(Router::new(), services, service_workers, 0, Weak::new())
    }

    pub fn dispatch(&self, message: &crate::message::Message) -> crate::result::IpcResult {
        self.router.dispatch(self, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn dispatch_through_an_empty_router_is_not_found() {
        let bridge = Bridge::for_test();
        let message = crate::message::Message::parse("ping?seq=1", Bytes::new());
        let result = bridge.dispatch(&message);
        assert!(result.is_err());
    }
}
