//! `Result` (an IPC reply) and the `QueuedResponse` large-payload handoff.

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::RouteError;
use crate::message::Message;

/// A binary payload handed back to the web view by id rather than by
/// string-encoding it into the reply (spec §3, `QueuedResponse`).
#[derive(Debug, Clone)]
pub struct QueuedResponse {
    pub id: u64,
    pub length: u64,
    pub body: Bytes,
    pub headers: String,
}

impl QueuedResponse {
    pub fn new(id: u64, body: Bytes, headers: impl Into<String>) -> Self {
        Self {
            id,
            length: body.len() as u64,
            body,
            headers: headers.into(),
        }
    }

    pub fn octet_stream(id: u64, body: Bytes) -> Self {
        let headers = format!("Content-Type: application/octet-stream\nContent-Length: {}", body.len());
        Self::new(id, body, headers)
    }
}

/// One reply to a `Message`: a JSON payload (`data` or `err`) plus an
/// optional `QueuedResponse` side channel.
#[derive(Debug, Clone)]
pub struct IpcResult {
    pub seq: String,
    pub source: String,
    pub payload: Value,
    pub queued_response: Option<QueuedResponse>,
}

impl IpcResult {
    pub fn ok(message: &Message, data: Value) -> Self {
        Self {
            seq: message.seq.clone(),
            source: message.name.clone(),
            payload: json!({ "data": data }),
            queued_response: None,
        }
    }

    pub fn ok_with_queued(message: &Message, data: Value, queued: QueuedResponse) -> Self {
        Self {
            seq: message.seq.clone(),
            source: message.name.clone(),
            payload: json!({ "data": data }),
            queued_response: Some(queued),
        }
    }

    pub fn err(message: &Message, error: &RouteError) -> Self {
        Self {
            seq: message.seq.clone(),
            source: message.name.clone(),
            payload: json!({ "err": error.to_json() }),
            queued_response: None,
        }
    }

    /// The `{"source": ..., "data"|"err": {...}}` wire envelope (spec §6.2).
    pub fn to_wire(&self) -> Value {
        let mut obj = json!({ "source": self.source });
        if let Value::Object(ref mut map) = obj {
            if let Value::Object(payload) = &self.payload {
                for (k, v) in payload {
                    map.insert(k.clone(), v.clone());
                }
            }
        }
        obj
    }

    pub fn is_err(&self) -> bool {
        self.payload.get("err").is_some()
    }
}

/// Process-wide unique id generator used for descriptors, sockets, queued
/// responses, registrations, fetch correlation ids and windows (invariant a).
#[derive(Debug, Default)]
pub struct IdGenerator(AtomicU64);

impl IdGenerator {
    pub const fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Runtime-wide map of pending `QueuedResponse` bodies, keyed by id. A body
/// is consumed at most once (invariant d): `take` removes the entry.
#[derive(Debug, Default)]
pub struct QueuedResponseStore {
    entries: Mutex<HashMap<u64, QueuedResponse>>,
}

impl QueuedResponseStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, response: QueuedResponse) {
        self.entries.lock().insert(response.id, response);
    }

    pub fn take(&self, id: u64) -> Option<QueuedResponse> {
        self.entries.lock().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

pub type SharedQueuedResponseStore = Arc<QueuedResponseStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_response_consumed_once() {
        let store = QueuedResponseStore::new();
        store.insert(QueuedResponse::octet_stream(1, Bytes::from_static(b"hi")));
        assert!(store.take(1).is_some());
        assert!(store.take(1).is_none());
    }

    #[test]
    fn wire_envelope_shapes_data_and_err() {
        let msg = Message::parse("ping?seq=1", Bytes::new());
        let ok = IpcResult::ok(&msg, json!("pong"));
        assert_eq!(ok.to_wire()["data"], json!("pong"));

        let err = RouteError::not_found("no such route");
        let failure = IpcResult::err(&msg, &err);
        assert_eq!(failure.to_wire()["err"]["type"], json!("NotFoundError"));
    }
}
