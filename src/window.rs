//! The fixed-capacity window registry and the minimal host boundary a
//! web-view widget implements.
//!
//! Grounded in `46bc732c_fcannizzaro-native-window__packages-native-window-
//! src-window_manager.rs.rs`'s `Command` enum for the registry/command
//! shape, and in a `WebViewHandler`/`RuntimeHandler`-style trait pair
//! for the host boundary (`WebViewHost`) plus its accompanying test double.
//!
//! `WindowManager` is the one piece of this crate that is itself
//! self-referential (spec §9): route handlers reach it through a `Bridge`
//! held by the very windows it owns, so it is built with `Arc::new_cyclic`
//! and keeps a `Weak` back-reference to hand to each `Bridge` it creates.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::{Arc, Weak};

use crate::bridge::Bridge;
use crate::error::{Error, Result};
use crate::serviceworker::ServiceWorkerContainer;
use crate::services::Services;

/// Total addressable slots: `[0, MAX_WINDOWS)` are user-created windows,
/// `[MAX_WINDOWS, MAX_WINDOWS + RESERVED)` are reserved for
/// internally-created utility windows (service-worker hosts, picker
/// dialogs).
pub const MAX_WINDOWS: usize = 32;
pub const RESERVED_WINDOWS: usize = 4;
pub const TOTAL_WINDOW_SLOTS: usize = MAX_WINDOWS + RESERVED_WINDOWS;

/// Status only ever advances (spec §4.4); there is no path back to an
/// earlier variant short of clearing the slot entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WindowStatus {
    None,
    Creating,
    Created,
    Hiding,
    Hidden,
    Showing,
    Shown,
    Closing,
    Closed,
    Exiting,
    Exited,
    Killing,
    Killed,
}

#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub url: String,
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub min_width: Option<u32>,
    pub min_height: Option<u32>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub debug: bool,
    pub headless: bool,
    pub preload: Option<String>,
    pub should_exit_application_on_close: bool,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            title: String::new(),
            width: 1024,
            height: 768,
            min_width: None,
            min_height: None,
            max_width: None,
            max_height: None,
            debug: false,
            headless: false,
            preload: None,
            should_exit_application_on_close: true,
        }
    }
}

/// The minimal interface a concrete web-view widget must satisfy. The
/// platform-specific widget implementation itself is out of scope (spec
/// §1); this trait is the seam it would plug into.
pub trait WebViewHost: Send {
    fn navigate(&mut self, url: &str);
    fn eval(&mut self, script: &str) -> Value;
    fn show(&mut self);
    fn hide(&mut self);
    fn close(&mut self);
    fn maximize(&mut self);
    fn minimize(&mut self);
    fn restore(&mut self);
    fn set_title(&mut self, title: &str);
    fn title(&self) -> String;
    fn set_geometry(&mut self, width: u32, height: u32);
    fn set_position(&mut self, x: i32, y: i32);
    fn set_background_color(&mut self, color: &str);
    fn background_color(&self) -> String;
    fn set_context_menu(&mut self, items: &Value);
    fn show_inspector(&mut self);
    /// Delivers an event to the page's render process, the counterpart of
    /// `emitToRenderProcess`.
    fn emit(&mut self, event: &str, value: &Value);

    /// Lets tests downcast to a concrete host (e.g. `FakeWebViewHost`) to
    /// assert on recorded calls.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// A host that discards every call; the default for windows created in
/// headless mode or in unit tests that don't assert on widget calls.
#[derive(Default)]
pub struct NullWebViewHost;

impl WebViewHost for NullWebViewHost {
    fn navigate(&mut self, _url: &str) {}
    fn eval(&mut self, _script: &str) -> Value {
        Value::Null
    }
    fn show(&mut self) {}
    fn hide(&mut self) {}
    fn close(&mut self) {}
    fn maximize(&mut self) {}
    fn minimize(&mut self) {}
    fn restore(&mut self) {}
    fn set_title(&mut self, _title: &str) {}
    fn title(&self) -> String {
        String::new()
    }
    fn set_geometry(&mut self, _width: u32, _height: u32) {}
    fn set_position(&mut self, _x: i32, _y: i32) {}
    fn set_background_color(&mut self, _color: &str) {}
    fn background_color(&self) -> String {
        String::new()
    }
    fn set_context_menu(&mut self, _items: &Value) {}
    fn show_inspector(&mut self) {}
    fn emit(&mut self, _event: &str, _value: &Value) {}
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Navigate(String),
    Eval(String),
    Show,
    Hide,
    Close,
    Maximize,
    Minimize,
    Restore,
    SetTitle(String),
    SetGeometry(u32, u32),
    SetPosition(i32, i32),
    SetBackgroundColor(String),
    SetContextMenu(Value),
    ShowInspector,
    Emit(String, Value),
}

/// Records every call for assertions in tests.
#[derive(Default)]
pub struct FakeWebViewHost {
    pub calls: Vec<RecordedCall>,
    pub title: String,
    pub background_color: String,
}

impl WebViewHost for FakeWebViewHost {
    fn navigate(&mut self, url: &str) {
        self.calls.push(RecordedCall::Navigate(url.to_string()));
    }
    fn eval(&mut self, script: &str) -> Value {
        self.calls.push(RecordedCall::Eval(script.to_string()));
        Value::Null
    }
    fn show(&mut self) {
        self.calls.push(RecordedCall::Show);
    }
    fn hide(&mut self) {
        self.calls.push(RecordedCall::Hide);
    }
    fn close(&mut self) {
        self.calls.push(RecordedCall::Close);
    }
    fn maximize(&mut self) {
        self.calls.push(RecordedCall::Maximize);
    }
    fn minimize(&mut self) {
        self.calls.push(RecordedCall::Minimize);
    }
    fn restore(&mut self) {
        self.calls.push(RecordedCall::Restore);
    }
    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
        self.calls.push(RecordedCall::SetTitle(title.to_string()));
    }
    fn title(&self) -> String {
        self.title.clone()
    }
    fn set_geometry(&mut self, width: u32, height: u32) {
        self.calls.push(RecordedCall::SetGeometry(width, height));
    }
    fn set_position(&mut self, x: i32, y: i32) {
        self.calls.push(RecordedCall::SetPosition(x, y));
    }
    fn set_background_color(&mut self, color: &str) {
        self.background_color = color.to_string();
        self.calls.push(RecordedCall::SetBackgroundColor(color.to_string()));
    }
    fn background_color(&self) -> String {
        self.background_color.clone()
    }
    fn set_context_menu(&mut self, items: &Value) {
        self.calls.push(RecordedCall::SetContextMenu(items.clone()));
    }
    fn show_inspector(&mut self) {
        self.calls.push(RecordedCall::ShowInspector);
    }
    fn emit(&mut self, event: &str, value: &Value) {
        self.calls.push(RecordedCall::Emit(event.to_string(), value.clone()));
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub struct ManagedWindow {
    pub index: i32,
    pub status: WindowStatus,
    pub options: WindowOptions,
    pub bridge: Bridge,
    pub host: Box<dyn WebViewHost>,
}

impl ManagedWindow {
    /// Advances `status` if `next` is strictly greater, matching the
    /// monotonic invariant (status only advances).
    fn advance(&mut self, next: WindowStatus) {
        if next > self.status {
            self.status = next;
        }
    }
}

pub struct WindowManager {
    slots: Vec<Option<ManagedWindow>>,
    services: Arc<Services>,
    service_workers: Arc<ServiceWorkerContainer>,
    self_ref: Weak<Mutex<WindowManager>>,
}

impl WindowManager {
    /// Builds the manager behind the `Arc<Mutex<_>>` every window's
    /// `Bridge` needs a `Weak` handle back into, so `window.*` routes can
    /// reach the real manager instead of being stubbed out (spec §9).
    pub fn new_shared(
        services: Arc<Services>,
        service_workers: Arc<ServiceWorkerContainer>,
    ) -> Arc<Mutex<WindowManager>> {
        Arc::new_cyclic(|weak: &Weak<Mutex<WindowManager>>| {
            let mut slots = Vec::with_capacity(TOTAL_WINDOW_SLOTS);
            slots.resize_with(TOTAL_WINDOW_SLOTS, || None);
            Mutex::new(WindowManager {
                slots,
                services,
                service_workers,
                self_ref: weak.clone(),
            })
        })
    }

    fn free_slot(&self, reserved: bool) -> Option<usize> {
        let range = if reserved {
            MAX_WINDOWS..TOTAL_WINDOW_SLOTS
        } else {
            0..MAX_WINDOWS
        };
        range.into_iter().find(|&i| self.slots[i].is_none())
    }

    /// `index = -1` means "pick a random free slot" (spec §4.4); any other
    /// value requires that exact slot to be free. Builds its own
    /// `Router`/`Bridge` for the new window, handing the bridge a `Weak`
    /// reference back to this manager.
    pub fn create_window(
        &mut self,
        index: i32,
        options: WindowOptions,
        host: Box<dyn WebViewHost>,
    ) -> Result<i32> {
        let slot = if index < 0 {
            self.free_slot(false).ok_or(Error::WindowTableFull)?
        } else {
            let slot = index as usize;
            if slot >= MAX_WINDOWS {
                return Err(Error::InvalidWindowIndex(index));
            }
            if self.slots[slot].is_some() {
                return Err(Error::InvalidWindowIndex(index));
            }
            slot
        };

        let router = crate::routes::default_router();
        let bridge = Bridge::new(
            router,
            self.services.clone(),
            self.service_workers.clone(),
            slot as i32,
            self.self_ref.clone(),
        );

        self.slots[slot] = Some(ManagedWindow {
            index: slot as i32,
            status: WindowStatus::Creating,
            options,
            bridge,
            host,
        });
        if let Some(window) = &mut self.slots[slot] {
            window.advance(WindowStatus::Created);
        }
        Ok(slot as i32)
    }

    pub fn get(&self, index: i32) -> Option<&ManagedWindow> {
        self.slots.get(index as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, index: i32) -> Option<&mut ManagedWindow> {
        self.slots.get_mut(index as usize)?.as_mut()
    }

    fn window_mut(&mut self, index: i32) -> Result<&mut ManagedWindow> {
        self.get_mut(index).ok_or(Error::InvalidWindowIndex(index))
    }

    pub fn show(&mut self, index: i32) -> Result<()> {
        let window = self.window_mut(index)?;
        window.advance(WindowStatus::Showing);
        window.host.show();
        window.advance(WindowStatus::Shown);
        Ok(())
    }

    pub fn hide(&mut self, index: i32) -> Result<()> {
        let window = self.window_mut(index)?;
        window.advance(WindowStatus::Hiding);
        window.host.hide();
        window.advance(WindowStatus::Hidden);
        Ok(())
    }

    /// Tears down the bridge first, then clears the slot, breaking the
    /// `Window <-> Bridge <-> Router` cycle at destruction time (spec §9).
    pub fn close(&mut self, index: i32) -> Result<()> {
        let slot = self
            .slots
            .get_mut(index as usize)
            .ok_or(Error::InvalidWindowIndex(index))?;
        let window = slot.as_mut().ok_or(Error::InvalidWindowIndex(index))?;
        window.advance(WindowStatus::Closing);
        window.host.close();
        window.advance(WindowStatus::Closed);
        window.advance(WindowStatus::Exited);
        *slot = None;
        Ok(())
    }

    pub fn maximize(&mut self, index: i32) -> Result<()> {
        self.window_mut(index)?.host.maximize();
        Ok(())
    }

    pub fn minimize(&mut self, index: i32) -> Result<()> {
        self.window_mut(index)?.host.minimize();
        Ok(())
    }

    pub fn restore(&mut self, index: i32) -> Result<()> {
        self.window_mut(index)?.host.restore();
        Ok(())
    }

    pub fn navigate(&mut self, index: i32, url: &str) -> Result<()> {
        let window = self.window_mut(index)?;
        window.options.url = url.to_string();
        window.host.navigate(url);
        Ok(())
    }

    pub fn set_title(&mut self, index: i32, title: &str) -> Result<()> {
        let window = self.window_mut(index)?;
        window.options.title = title.to_string();
        window.host.set_title(title);
        Ok(())
    }

    pub fn get_title(&mut self, index: i32) -> Result<String> {
        Ok(self.window_mut(index)?.host.title())
    }

    pub fn set_position(&mut self, index: i32, x: i32, y: i32) -> Result<()> {
        self.window_mut(index)?.host.set_position(x, y);
        Ok(())
    }

    pub fn set_size(&mut self, index: i32, width: u32, height: u32) -> Result<()> {
        let window = self.window_mut(index)?;
        window.options.width = width;
        window.options.height = height;
        window.host.set_geometry(width, height);
        Ok(())
    }

    pub fn set_background_color(&mut self, index: i32, color: &str) -> Result<()> {
        self.window_mut(index)?.host.set_background_color(color);
        Ok(())
    }

    pub fn get_background_color(&mut self, index: i32) -> Result<String> {
        Ok(self.window_mut(index)?.host.background_color())
    }

    pub fn set_context_menu(&mut self, index: i32, items: &Value) -> Result<()> {
        self.window_mut(index)?.host.set_context_menu(items);
        Ok(())
    }

    pub fn show_inspector(&mut self, index: i32) -> Result<()> {
        self.window_mut(index)?.host.show_inspector();
        Ok(())
    }

    /// No native file-picker dialog is linked (spec §1 scopes the
    /// platform-specific widget out); the route exists so callers get a
    /// well-formed `NotSupportedError` rather than a missing route.
    pub fn show_file_system_picker(&mut self, index: i32) -> Result<()> {
        self.window_mut(index)?;
        Err(Error::InvalidConfig("no file-system picker dialog is linked".to_string()))
    }

    /// `window.send(targetIndex, event, value)`: evaluates
    /// `emitToRenderProcess` in the target window. The manager never
    /// forwards IPC, only this render-process event (spec §4.4).
    pub fn send(&mut self, target_index: i32, event: &str, value: &Value) -> Result<()> {
        let window = self.window_mut(target_index)?;
        window.host.emit(event, value);
        Ok(())
    }

    pub fn eval(&mut self, index: i32, script: &str) -> Result<Value> {
        Ok(self.window_mut(index)?.host.eval(script))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|w| w.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> Arc<Mutex<WindowManager>> {
        WindowManager::new_shared(Services::new(), Arc::new(ServiceWorkerContainer::new()))
    }

    #[test]
    fn create_window_picks_free_slot_on_negative_index() {
        let manager = manager();
        let mut guard = manager.lock();
        let idx = guard
            .create_window(-1, WindowOptions::default(), Box::new(NullWebViewHost))
            .unwrap();
        assert_eq!(idx, 0);
        assert_eq!(guard.get(idx).unwrap().status, WindowStatus::Created);
    }

    #[test]
    fn create_window_rejects_occupied_slot() {
        let manager = manager();
        let mut guard = manager.lock();
        guard
            .create_window(0, WindowOptions::default(), Box::new(NullWebViewHost))
            .unwrap();
        let err = guard.create_window(0, WindowOptions::default(), Box::new(NullWebViewHost));
        assert!(err.is_err());
    }

    #[test]
    fn status_advances_monotonically_through_show_hide() {
        let manager = manager();
        let mut guard = manager.lock();
        let idx = guard
            .create_window(-1, WindowOptions::default(), Box::new(FakeWebViewHost::default()))
            .unwrap();
        guard.show(idx).unwrap();
        assert_eq!(guard.get(idx).unwrap().status, WindowStatus::Shown);
        guard.hide(idx).unwrap();
        // Shown (6) > Hidden (4): hide still recorded a call but status does not regress.
        assert_eq!(guard.get(idx).unwrap().status, WindowStatus::Shown);
    }

    #[test]
    fn close_clears_the_slot() {
        let manager = manager();
        let mut guard = manager.lock();
        let idx = guard
            .create_window(-1, WindowOptions::default(), Box::new(NullWebViewHost))
            .unwrap();
        guard.close(idx).unwrap();
        assert!(guard.get(idx).is_none());
    }

    #[test]
    fn send_emits_to_target_window_only() {
        let manager = manager();
        let mut guard = manager.lock();
        let idx = guard
            .create_window(-1, WindowOptions::default(), Box::new(FakeWebViewHost::default()))
            .unwrap();
        guard.send(idx, "ping", &Value::String("hi".into())).unwrap();
        let window = guard.get(idx).unwrap();
        let fake = window.host.as_any().downcast_ref::<FakeWebViewHost>().unwrap();
        assert_eq!(fake.calls.len(), 1);
    }

    #[test]
    fn set_and_get_title_round_trip() {
        let manager = manager();
        let mut guard = manager.lock();
        let idx = guard
            .create_window(-1, WindowOptions::default(), Box::new(FakeWebViewHost::default()))
            .unwrap();
        guard.set_title(idx, "hello").unwrap();
        assert_eq!(guard.get_title(idx).unwrap(), "hello");
    }

    #[test]
    fn a_window_can_reach_its_own_manager_through_its_bridge() {
        let manager = manager();
        let idx = {
            let mut guard = manager.lock();
            guard
                .create_window(-1, WindowOptions::default(), Box::new(NullWebViewHost))
                .unwrap()
        };
        let bridge = manager.lock().get(idx).unwrap().bridge.clone();
        assert!(bridge.windows.upgrade().is_some());
    }

    #[test]
    fn show_file_system_picker_reports_not_supported() {
        let manager = manager();
        let mut guard = manager.lock();
        let idx = guard
            .create_window(-1, WindowOptions::default(), Box::new(NullWebViewHost))
            .unwrap();
        assert!(guard.show_file_system_picker(idx).is_err());
    }
}
