//! Desktop notification presentation and acknowledgement tracking.
//!
//! No native notification center is linked; this records show/dismiss
//! transitions without a backing OS call, so route behavior stays testable.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RouteError;
use crate::result::IdGenerator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationStatus {
    Shown,
    Dismissed,
}

#[derive(Default)]
pub struct NotificationsService {
    ids: IdGenerator,
    notifications: Mutex<HashMap<u64, NotificationStatus>>,
}

impl NotificationsService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&self, _title: &str, _body: &str) -> u64 {
        let id = self.ids.next();
        self.notifications.lock().insert(id, NotificationStatus::Shown);
        id
    }

    pub fn dismiss(&self, id: u64) -> Result<(), RouteError> {
        let mut table = self.notifications.lock();
        let status = table
            .get_mut(&id)
            .ok_or_else(|| RouteError::not_found(format!("no notification {id}")))?;
        *status = NotificationStatus::Dismissed;
        Ok(())
    }

    pub fn status(&self, id: u64) -> Option<NotificationStatus> {
        self.notifications.lock().get(&id).cloned()
    }
}

pub type SharedNotificationsService = Arc<NotificationsService>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_then_dismiss() {
        let svc = NotificationsService::new();
        let id = svc.show("hi", "body");
        assert_eq!(svc.status(id), Some(NotificationStatus::Shown));
        svc.dismiss(id).unwrap();
        assert_eq!(svc.status(id), Some(NotificationStatus::Dismissed));
    }
}
