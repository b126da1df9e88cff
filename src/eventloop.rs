//! The cooperative event loop: one `EventLoop` trait satisfied by two
//! concrete drivers, matching the original runtime's dedicated-thread vs.
//! host-main-loop integration modes (spec §4.3).
//!
//! Grounded directly in `original_source/src/runtime/loop.hh`: the `State`
//! enum and its ordering, `init`/idempotence, `dispatch` as the single
//! cross-thread entry point, and `shutdown` as a terminal, irreversible
//! transition.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// A unit of work posted to the loop. `FnOnce` boxed so arbitrary
/// closures can be dispatched, matching `dispatch(cb)`'s shape.
pub type DispatchFn = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum State {
    None = 0,
    Init = 1,
    Idle = 2,
    Polling = 3,
    Paused = 4,
    Stopped = 5,
    Shutdown = 6,
}

impl State {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => State::None,
            1 => State::Init,
            2 => State::Idle,
            3 => State::Polling,
            4 => State::Paused,
            5 => State::Stopped,
            _ => State::Shutdown,
        }
    }
}

/// Shared atomic state cell, so both driver kinds can expose the same
/// `state()`/`init()`/`shutdown()` semantics without duplicating the
/// bookkeeping.
#[derive(Default)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(State::None as u8))
    }

    fn get(&self) -> State {
        State::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: State) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// `init()` is idempotent: returns true iff state is already `>= Init`
    /// and `< Shutdown` (no-op), or iff the transition to `Init` succeeds.
    fn init(&self) -> bool {
        let current = self.get();
        if current >= State::Init && current < State::Shutdown {
            return true;
        }
        if current == State::Shutdown {
            return false;
        }
        self.set(State::Init);
        true
    }
}

/// The single cross-driver interface services and the router dispatch
/// work through.
pub trait EventLoop: Send + Sync {
    fn state(&self) -> State;
    fn init(&self) -> bool;
    fn dispatch(&self, work: DispatchFn);
    fn pause(&self);
    fn resume(&self);
    fn stop(&self);
    fn shutdown(&self);
}

/// Owns a `tokio` current-thread runtime on a spawned OS thread, matching
/// the Android/Windows deployment mode. `dispatch` sends over an
/// unbounded channel the loop's own task drains.
pub struct DedicatedThreadLoop {
    state: Arc<StateCell>,
    sender: UnboundedSender<DispatchFn>,
    _handle: std::thread::JoinHandle<()>,
}

impl DedicatedThreadLoop {
    pub fn spawn() -> Self {
        let state = Arc::new(StateCell::new());
        state.init();
        let (sender, mut receiver): (_, UnboundedReceiver<DispatchFn>) = unbounded_channel();
        let loop_state = state.clone();

        let handle = std::thread::Builder::new()
            .name("app-runtime-loop".into())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build loop runtime");
                runtime.block_on(async move {
                    loop_state.set(State::Idle);
                    while let Some(work) = receiver.recv().await {
                        if loop_state.get() == State::Shutdown {
                            break;
                        }
                        loop_state.set(State::Polling);
                        work();
                        if loop_state.get() != State::Shutdown {
                            loop_state.set(State::Idle);
                        }
                    }
                });
            })
            .expect("failed to spawn loop thread");

        Self {
            state,
            sender,
            _handle: handle,
        }
    }
}

impl EventLoop for DedicatedThreadLoop {
    fn state(&self) -> State {
        self.state.get()
    }

    fn init(&self) -> bool {
        self.state.init()
    }

    fn dispatch(&self, work: DispatchFn) {
        if self.state.get() == State::Shutdown {
            return;
        }
        let _ = self.sender.send(work);
    }

    fn pause(&self) {
        if self.state.get() < State::Shutdown {
            self.state.set(State::Paused);
        }
    }

    fn resume(&self) {
        if self.state.get() == State::Paused {
            self.state.set(State::Idle);
        }
    }

    fn stop(&self) {
        if self.state.get() < State::Shutdown {
            self.state.set(State::Stopped);
        }
    }

    fn shutdown(&self) {
        self.state.set(State::Shutdown);
    }
}

/// Exposes a `poll` method a host main loop calls repeatedly (the
/// `MessagePumpLoop` analogue): `dispatch` pushes into a queue drained on
/// each `poll`. No dedicated thread — matches Linux GTK / Apple dispatch
/// queue integration.
pub struct HostPumpLoop {
    state: StateCell,
    queue: Mutex<VecDeque<DispatchFn>>,
}

impl Default for HostPumpLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl HostPumpLoop {
    pub fn new() -> Self {
        let state = StateCell::new();
        state.init();
        state.set(State::Idle);
        Self {
            state,
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Drains and runs every pending dispatched closure; called by the
    /// host's own main-loop tick.
    pub fn poll(&self) {
        if self.state.get() == State::Shutdown {
            return;
        }
        self.state.set(State::Polling);
        loop {
            let work = self.queue.lock().pop_front();
            match work {
                Some(work) => work(),
                None => break,
            }
        }
        if self.state.get() != State::Shutdown {
            self.state.set(State::Idle);
        }
    }
}

impl EventLoop for HostPumpLoop {
    fn state(&self) -> State {
        self.state.get()
    }

    fn init(&self) -> bool {
        self.state.init()
    }

    fn dispatch(&self, work: DispatchFn) {
        if self.state.get() == State::Shutdown {
            return;
        }
        self.queue.lock().push_back(work);
    }

    fn pause(&self) {
        if self.state.get() < State::Shutdown {
            self.state.set(State::Paused);
        }
    }

    fn resume(&self) {
        if self.state.get() == State::Paused {
            self.state.set(State::Idle);
        }
    }

    fn stop(&self) {
        if self.state.get() < State::Shutdown {
            self.state.set(State::Stopped);
        }
    }

    fn shutdown(&self) {
        self.state.set(State::Shutdown);
        self.queue.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn host_pump_runs_dispatched_work_in_order() {
        let event_loop = HostPumpLoop::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let a = order.clone();
        event_loop.dispatch(Box::new(move || a.lock().push(1)));
        let b = order.clone();
        event_loop.dispatch(Box::new(move || b.lock().push(2)));

        event_loop.poll();
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn shutdown_is_terminal_and_drops_queued_work() {
        let event_loop = HostPumpLoop::new();
        let ran = Arc::new(AtomicUsize::new(0));
        event_loop.shutdown();

        let flag = ran.clone();
        event_loop.dispatch(Box::new(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        }));
        event_loop.poll();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(event_loop.state(), State::Shutdown);
        assert!(!event_loop.init());
    }

    #[test]
    fn dedicated_thread_loop_dispatches_across_threads() {
        let event_loop = DedicatedThreadLoop::spawn();
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = ran.clone();
        event_loop.dispatch(Box::new(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        }));

        for _ in 0..100 {
            if ran.load(Ordering::SeqCst) == 1 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        event_loop.shutdown();
    }
}
