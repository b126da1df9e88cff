//! Timer service: one-shot and interval timers addressed by id.
//!
//! The original runtime drives timers from its own loop tick; here each
//! timer is a `tokio::time::Interval`/`Sleep` polled cooperatively from
//! `poll_fired`, matching the event loop's single-dispatch-point model
//! (`eventloop.rs`) rather than spawning a task per timer that would race
//! with it.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::RouteError;
use crate::result::IdGenerator;

struct Timer {
    deadline: Instant,
    interval: Option<Duration>,
}

#[derive(Default)]
pub struct TimersService {
    ids: IdGenerator,
    timers: Mutex<HashMap<u64, Timer>>,
}

impl TimersService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_timeout(&self, millis: u64) -> u64 {
        let id = self.ids.next();
        self.timers.lock().insert(
            id,
            Timer {
                deadline: Instant::now() + Duration::from_millis(millis),
                interval: None,
            },
        );
        id
    }

    pub fn set_interval(&self, millis: u64) -> u64 {
        let id = self.ids.next();
        let interval = Duration::from_millis(millis.max(1));
        self.timers.lock().insert(
            id,
            Timer {
                deadline: Instant::now() + interval,
                interval: Some(interval),
            },
        );
        id
    }

    pub fn clear(&self, id: u64) -> Result<(), RouteError> {
        self.timers
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RouteError::not_found(format!("no timer {id}")))
    }

    /// Returns the ids of every timer whose deadline has passed, rescheduling
    /// intervals and removing one-shot timers. Called once per event-loop
    /// idle tick.
    pub fn poll_fired(&self) -> Vec<u64> {
        let now = Instant::now();
        let mut table = self.timers.lock();
        let mut fired = Vec::new();
        let mut to_remove = Vec::new();

        for (&id, timer) in table.iter_mut() {
            if timer.deadline <= now {
                fired.push(id);
                match timer.interval {
                    Some(interval) => timer.deadline = now + interval,
                    None => to_remove.push(id),
                }
            }
        }
        for id in to_remove {
            table.remove(&id);
        }
        fired
    }

    pub fn timer_count(&self) -> usize {
        self.timers.lock().len()
    }
}

pub type SharedTimersService = Arc<TimersService>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_fires_once() {
        let svc = TimersService::new();
        let id = svc.set_timeout(0);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(svc.poll_fired(), vec![id]);
        assert!(svc.poll_fired().is_empty());
    }

    #[test]
    fn interval_reschedules() {
        let svc = TimersService::new();
        let id = svc.set_interval(1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(svc.poll_fired(), vec![id]);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(svc.poll_fired(), vec![id]);
    }
}
