//! `app-runtime-core`: IPC router, core services, service-worker
//! container, cooperative event loop and window manager for an
//! embedded-webview application runtime.
//!
//! The platform-specific web-view widget (the thing that actually renders
//! HTML) is out of scope; this crate hosts the native side of the bridge
//! and exposes the `WebViewHost` trait a widget implementation plugs into.

pub mod bridge;
pub mod config;
pub mod error;
pub mod eventloop;
pub mod ini;
pub mod message;
pub mod protocol;
pub mod result;
pub mod router;
pub mod routes;
pub mod services;
pub mod serviceworker;
pub mod url;
pub mod utils;
pub mod window;

pub use error::{Error, Result};

use std::sync::Arc;

use eventloop::EventLoop;
use parking_lot::Mutex;
use serviceworker::ServiceWorkerContainer;
use services::Services;
use window::{WebViewHost, WindowManager, WindowOptions};

/// Ties the layers together: one `Services` instance, one
/// `ServiceWorkerContainer`, one `WindowManager`, and whichever
/// `EventLoop` driver the host chose, all behind a single handle a binary
/// constructs once at startup. `windows` is `Arc<Mutex<_>>` rather than an
/// owned value because windows' own `Bridge`s hold a `Weak` reference back
/// into it (spec §9); only lock it transiently, never across a `dispatch`
/// call, since `parking_lot::Mutex` is not reentrant and a `window.*` route
/// may need to lock it again mid-dispatch.
pub struct Runtime {
    pub services: Arc<Services>,
    pub service_workers: Arc<ServiceWorkerContainer>,
    pub windows: Arc<Mutex<WindowManager>>,
    pub event_loop: Arc<dyn EventLoop>,
}

impl Runtime {
    pub fn new(event_loop: Arc<dyn EventLoop>) -> Self {
        event_loop.init();
        let services = Services::new();
        let service_workers = Arc::new(ServiceWorkerContainer::new());
        let windows = WindowManager::new_shared(services.clone(), service_workers.clone());
        Self {
            services,
            service_workers,
            windows,
            event_loop,
        }
    }

    /// Creates a window with the default route table wired in.
    pub fn create_window(
        &mut self,
        index: i32,
        options: WindowOptions,
        host: Box<dyn WebViewHost>,
    ) -> Result<i32> {
        self.windows.lock().create_window(index, options, host)
    }

    /// Drains timers and process/socket/filesystem-watch events once;
    /// intended to be called from the loop driver's idle tick.
    pub fn poll_services(&self) {
        for id in self.services.timers.poll_fired() {
            tracing::trace!(timer_id = id, "timer fired");
        }
    }

    /// Shuts the whole runtime down: stops the event loop and clears every
    /// queued response, per spec §5's shutdown semantics.
    pub fn shutdown(&mut self) {
        self.event_loop.shutdown();
        self.services.queued_responses.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventloop::HostPumpLoop;
    use window::NullWebViewHost;

    #[test]
    fn runtime_creates_a_window_and_shuts_down() {
        let mut runtime = Runtime::new(Arc::new(HostPumpLoop::new()));
        let idx = runtime
            .create_window(-1, WindowOptions::default(), Box::new(NullWebViewHost))
            .unwrap();
        assert_eq!(idx, 0);
        runtime.shutdown();
        assert_eq!(runtime.event_loop.state(), eventloop::State::Shutdown);
    }
}
