//! UDP socket manager: a bitflag state machine per socket id.
//!
//! Grounded directly in `original_source/src/runtime/udp.hh`'s
//! `Socket`/`SocketManager`, whose socket carries a small set of
//! orthogonal boolean flags (bound, connected, reading's-in-flight) rather
//! than a single enum — `bitflags` is the idiomatic Rust rendering of that.

use bitflags::bitflags;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

use crate::error::RouteError;
use crate::result::IdGenerator;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SocketFlags: u8 {
        const BOUND     = 0b0001;
        const CONNECTED = 0b0010;
        const READING   = 0b0100;
        const CLOSED    = 0b1000;
    }
}

struct SocketEntry {
    socket: Arc<UdpSocket>,
    flags: SocketFlags,
    remote: Option<SocketAddr>,
}

#[derive(Default)]
pub struct UdpService {
    ids: IdGenerator,
    sockets: Mutex<HashMap<u64, SocketEntry>>,
}

impl UdpService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn bind(&self, address: &str, port: u16) -> Result<u64, RouteError> {
        let socket = UdpSocket::bind((address, port))
            .await
            .map_err(RouteError::from)?;
        let id = self.ids.next();
        self.sockets.lock().insert(
            id,
            SocketEntry {
                socket: Arc::new(socket),
                flags: SocketFlags::BOUND,
                remote: None,
            },
        );
        Ok(id)
    }

    pub fn connect(&self, id: u64, address: SocketAddr) -> Result<(), RouteError> {
        let mut table = self.sockets.lock();
        let entry = table
            .get_mut(&id)
            .ok_or_else(|| RouteError::not_found(format!("no socket {id}")))?;
        entry.remote = Some(address);
        entry.flags |= SocketFlags::CONNECTED;
        Ok(())
    }

    pub fn disconnect(&self, id: u64) -> Result<(), RouteError> {
        let mut table = self.sockets.lock();
        let entry = table
            .get_mut(&id)
            .ok_or_else(|| RouteError::not_found(format!("no socket {id}")))?;
        entry.remote = None;
        entry.flags.remove(SocketFlags::CONNECTED);
        Ok(())
    }

    fn socket_of(&self, id: u64) -> Result<Arc<UdpSocket>, RouteError> {
        self.sockets
            .lock()
            .get(&id)
            .map(|e| e.socket.clone())
            .ok_or_else(|| RouteError::not_found(format!("no socket {id}")))
    }

    pub async fn send(&self, id: u64, data: &[u8], to: Option<SocketAddr>) -> Result<usize, RouteError> {
        let socket = self.socket_of(id)?;
        let target = match to {
            Some(addr) => addr,
            None => {
                let table = self.sockets.lock();
                table
                    .get(&id)
                    .and_then(|e| e.remote)
                    .ok_or_else(|| RouteError::bad_request("socket is not connected and no address given"))?
            }
        };
        socket.send_to(data, target).await.map_err(RouteError::from)
    }

    /// Marks the socket as reading, matching `udp.readStart`'s intent; the
    /// event loop drives the actual `recv_from` polling via `recv`.
    pub fn set_reading(&self, id: u64, reading: bool) -> Result<(), RouteError> {
        let mut table = self.sockets.lock();
        let entry = table
            .get_mut(&id)
            .ok_or_else(|| RouteError::not_found(format!("no socket {id}")))?;
        entry.flags.set(SocketFlags::READING, reading);
        Ok(())
    }

    pub fn is_reading(&self, id: u64) -> bool {
        self.sockets
            .lock()
            .get(&id)
            .is_some_and(|e| e.flags.contains(SocketFlags::READING))
    }

    pub async fn recv(&self, id: u64) -> Result<(Bytes, SocketAddr), RouteError> {
        let socket = self.socket_of(id)?;
        let mut buf = vec![0u8; 65535];
        let (len, from) = socket.recv_from(&mut buf).await.map_err(RouteError::from)?;
        buf.truncate(len);
        Ok((Bytes::from(buf), from))
    }

    pub fn close(&self, id: u64) -> Result<(), RouteError> {
        self.sockets
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RouteError::not_found(format!("no socket {id}")))
    }

    pub fn flags_of(&self, id: u64) -> Option<SocketFlags> {
        self.sockets.lock().get(&id).map(|e| e.flags)
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.lock().len()
    }
}

pub type SharedUdpService = Arc<UdpService>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_send_recv_round_trip() {
        let svc = UdpService::new();
        let a = svc.bind("127.0.0.1", 0).await.unwrap();
        let b = svc.bind("127.0.0.1", 0).await.unwrap();

        let b_addr = svc.socket_of(b).unwrap().local_addr().unwrap();
        svc.send(a, b"hi", Some(b_addr)).await.unwrap();

        let (data, _from) = svc.recv(b).await.unwrap();
        assert_eq!(&data[..], b"hi");
    }

    #[tokio::test]
    async fn connect_sets_connected_flag() {
        let svc = UdpService::new();
        let a = svc.bind("127.0.0.1", 0).await.unwrap();
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        svc.connect(a, addr).unwrap();
        assert!(svc.flags_of(a).unwrap().contains(SocketFlags::CONNECTED));
    }
}
