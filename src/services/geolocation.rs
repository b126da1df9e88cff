//! Geolocation position cache. No platform location provider is linked
//! (out of scope per spec §1); a position is only available once the host
//! has pushed one in via `set_position`, mirroring how the original runtime
//! waits on a platform callback before a `getCurrentPosition` route can
//! reply with data.

use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
}

impl Position {
    pub fn to_json(self) -> Value {
        json!({
            "latitude": self.latitude,
            "longitude": self.longitude,
            "accuracy": self.accuracy,
        })
    }
}

#[derive(Default)]
pub struct GeolocationService {
    last_known: Mutex<Option<Position>>,
}

impl GeolocationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_position(&self, position: Position) {
        *self.last_known.lock() = Some(position);
    }

    pub fn current_position(&self) -> Option<Position> {
        *self.last_known.lock()
    }
}

pub type SharedGeolocationService = Arc<GeolocationService>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_last_pushed_position() {
        let svc = GeolocationService::new();
        assert!(svc.current_position().is_none());
        svc.set_position(Position {
            latitude: 1.0,
            longitude: 2.0,
            accuracy: 5.0,
        });
        assert!(svc.current_position().is_some());
    }
}
