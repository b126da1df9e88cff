//! In-process broadcast channels: named topics, fan-out to every window
//! subscribed to a name.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct BroadcastChannelService {
    /// name -> set of subscribed window indices
    subscribers: Mutex<HashMap<String, Vec<i32>>>,
}

impl BroadcastChannelService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, name: &str, window_index: i32) {
        let mut table = self.subscribers.lock();
        let entry = table.entry(name.to_string()).or_default();
        if !entry.contains(&window_index) {
            entry.push(window_index);
        }
    }

    pub fn unsubscribe(&self, name: &str, window_index: i32) {
        if let Some(entry) = self.subscribers.lock().get_mut(name) {
            entry.retain(|&w| w != window_index);
        }
    }

    /// Returns every window index subscribed to `name` other than `from`,
    /// the set a `postMessage` should be echoed to.
    pub fn recipients(&self, name: &str, from: i32) -> Vec<i32> {
        self.subscribers
            .lock()
            .get(name)
            .map(|v| v.iter().copied().filter(|&w| w != from).collect())
            .unwrap_or_default()
    }

    pub fn post(&self, name: &str, from: i32, _message: &Value) -> Vec<i32> {
        self.recipients(name, from)
    }
}

pub type SharedBroadcastChannelService = Arc<BroadcastChannelService>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn post_excludes_sender() {
        let svc = BroadcastChannelService::new();
        svc.subscribe("chat", 0);
        svc.subscribe("chat", 1);
        let recipients = svc.post("chat", 0, &json!("hi"));
        assert_eq!(recipients, vec![1]);
    }

    #[test]
    fn unsubscribe_removes_recipient() {
        let svc = BroadcastChannelService::new();
        svc.subscribe("chat", 1);
        svc.unsubscribe("chat", 1);
        assert!(svc.recipients("chat", 0).is_empty());
    }
}
