// OPC UA server — SPDX-License-Identifier: MPL-2.0

//! TCP realization of the Connection Manager contract (spec §4.3):
//! [`TcpConnectionManager`] is an [`EventSource`] that accepts `opc.tcp`
//! connections and exposes each as a [`Connection`], over non-blocking
//! `std::net` sockets polled from the single EventLoop thread rather than
//! an async runtime — this crate has exactly one thread driving I/O (spec
//! §5), so there is nothing for a reactor to buy us.
//!
//! This layer only moves bytes: establishment, payload, remote-close and
//! error are reported upward via a callback exactly as spec §4.3
//! describes. Turning those bytes into HEL/ACK/chunks is C4's job, still
//! to be built in `opcua-core` alongside `SecureChannel`.

use std::{
    collections::HashMap,
    io::{ErrorKind, Read, Write},
    net::{TcpListener, TcpStream, ToSocketAddrs},
    time::Duration,
};

use log::{debug, error, warn};
use opcua_core::{
    connection::{Connection, ConnectionId, ConnectionStatus, SendBuffer},
    eventloop::{EventLoopState, EventSource},
};
use opcua_types::status_code::StatusCode;

/// Called with `(connection_id, status, bytes)` whenever a connection has
/// something to report (spec §4.3). `bytes` is empty except for
/// `ConnectionStatus::Data`.
pub type ConnectionCallback = Box<dyn FnMut(ConnectionId, ConnectionStatus, &[u8]) + Send>;

/// Sizing knobs for accepted sockets, independent of the negotiated
/// UA-TCP buffer sizes C4 will apply on top.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-connection outgoing high-water mark (spec §4.3 backpressure).
    pub send_high_water_mark: usize,
    /// Scratch size used to `read()` off the socket each poll.
    pub read_chunk_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            send_high_water_mark: 1024 * 1024,
            read_chunk_size: 65_536,
        }
    }
}

struct TcpConnection {
    id: ConnectionId,
    stream: TcpStream,
    send_buffer: SendBuffer,
    closing: bool,
    dead: bool,
}

impl Connection for TcpConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), StatusCode> {
        self.send_buffer.push(bytes)
    }

    fn close(&mut self) {
        self.closing = true;
    }

    fn acquire_send_buffer(&mut self, size: usize) -> Vec<u8> {
        vec![0u8; size]
    }

    fn release_send_buffer(&mut self, _buf: Vec<u8>) {}
}

impl TcpConnection {
    /// Flushes whatever is queued, then reads whatever is available,
    /// reporting both through `on_event`. Returns `false` once the
    /// connection is fully gone and should be dropped.
    fn poll(&mut self, config: &TransportConfig, on_event: &mut ConnectionCallback) -> bool {
        if self.dead {
            return false;
        }

        self.flush_pending();
        if self.dead {
            on_event(self.id, ConnectionStatus::RemoteClosed, &[]);
            return false;
        }

        if self.closing && self.send_buffer.pending_len() == 0 {
            let _ = self.stream.shutdown(std::net::Shutdown::Both);
            on_event(self.id, ConnectionStatus::RemoteClosed, &[]);
            return false;
        }

        let mut buf = vec![0u8; config.read_chunk_size];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    on_event(self.id, ConnectionStatus::RemoteClosed, &[]);
                    return false;
                }
                Ok(n) => on_event(self.id, ConnectionStatus::Data, &buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("connection {} read error: {e}", self.id.0);
                    on_event(self.id, ConnectionStatus::Error(StatusCode::BadCommunicationError), &[]);
                    return false;
                }
            }
        }
        true
    }

    fn flush_pending(&mut self) {
        let pending = self.send_buffer.drain();
        if pending.is_empty() {
            return;
        }
        let mut written = 0;
        while written < pending.len() {
            match self.stream.write(&pending[written..]) {
                Ok(0) => {
                    self.dead = true;
                    return;
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("connection {} write error: {e}", self.id.0);
                    self.dead = true;
                    return;
                }
            }
        }
        if written < pending.len() {
            // Requeue the unwritten remainder; the high-water mark still
            // applies to it, but a partial flush of our own data can never
            // itself trip it since it only shrinks what's pending.
            let _ = self.send_buffer.push(&pending[written..]);
        }
    }
}

/// The TCP [`EventSource`]: one non-blocking listener plus every connection
/// accepted from it (spec §4.3 Connection Manager).
pub struct TcpConnectionManager {
    listener: Option<TcpListener>,
    addr: String,
    config: TransportConfig,
    connections: HashMap<u64, TcpConnection>,
    next_id: u64,
    state: EventLoopState,
    on_event: ConnectionCallback,
}

impl TcpConnectionManager {
    /// Constructs a manager bound to `host:port` lazily — the socket isn't
    /// opened until [`EventSource::start`] runs, matching every other
    /// `EventSource`'s `Fresh` contract.
    pub fn new(host: &str, port: u16, config: TransportConfig, on_event: ConnectionCallback) -> Self {
        TcpConnectionManager {
            listener: None,
            addr: format!("{host}:{port}"),
            config,
            connections: HashMap::new(),
            next_id: 1,
            state: EventLoopState::Fresh,
            on_event,
        }
    }

    /// The port actually bound, once started — useful when configured with
    /// port 0 for tests.
    pub fn local_port(&self) -> Option<u16> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok()).map(|a| a.port())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Queues `bytes` for `id`, if it is still open (spec §4.3 `send`).
    pub fn send(&mut self, id: ConnectionId, bytes: &[u8]) -> Result<(), StatusCode> {
        self.connections
            .get_mut(&id.0)
            .ok_or(StatusCode::BadConnectionClosed)?
            .send(bytes)
    }

    /// Begins closing `id`; its last callback will be `RemoteClosed`.
    pub fn close_connection(&mut self, id: ConnectionId) {
        if let Some(conn) = self.connections.get_mut(&id.0) {
            conn.close();
        }
    }

    fn accept_pending(&mut self) {
        let Some(listener) = &self.listener else { return };
        loop {
            match listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nonblocking(true) {
                        error!("failed to set accepted socket non-blocking: {e}");
                        continue;
                    }
                    let id = ConnectionId(self.next_id);
                    self.next_id += 1;
                    debug!("accepted connection {} from {addr}", id.0);
                    self.connections.insert(
                        id.0,
                        TcpConnection {
                            id,
                            stream,
                            send_buffer: SendBuffer::new(self.config.send_high_water_mark),
                            closing: false,
                            dead: false,
                        },
                    );
                    (self.on_event)(id, ConnectionStatus::Established, &[]);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!("accept failed: {e}");
                    break;
                }
            }
        }
    }
}

impl EventSource for TcpConnectionManager {
    fn state(&self) -> EventLoopState {
        self.state
    }

    fn start(&mut self) -> Result<(), StatusCode> {
        let addr = self
            .addr
            .to_socket_addrs()
            .map_err(|_| StatusCode::BadTcpEndpointUrlInvalid)?
            .next()
            .ok_or(StatusCode::BadTcpEndpointUrlInvalid)?;
        let listener = TcpListener::bind(addr).map_err(|e| {
            error!("failed to bind {addr}: {e}");
            StatusCode::BadTcpNotEnoughResources
        })?;
        listener.set_nonblocking(true).map_err(|_| StatusCode::BadTcpInternalError)?;
        self.listener = Some(listener);
        self.state = EventLoopState::Started;
        Ok(())
    }

    fn stop(&mut self) {
        self.listener = None;
        for conn in self.connections.values_mut() {
            conn.close();
        }
        self.state = EventLoopState::Stopping;
    }

    fn poll(&mut self, _timeout: Duration) {
        if self.state == EventLoopState::Stopped {
            return;
        }
        if self.state == EventLoopState::Started {
            self.accept_pending();
        }

        let mut to_drop = Vec::new();
        for (&raw_id, conn) in self.connections.iter_mut() {
            if !conn.poll(&self.config, &mut self.on_event) {
                to_drop.push(raw_id);
            }
        }
        for id in to_drop {
            self.connections.remove(&id);
        }

        if self.state == EventLoopState::Stopping && self.connections.is_empty() {
            self.state = EventLoopState::Stopped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (ConnectionCallback, Arc<Mutex<Vec<(ConnectionId, ConnectionStatus, Vec<u8>)>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        let cb: ConnectionCallback = Box::new(move |id, status, bytes| {
            events_clone.lock().unwrap().push((id, status, bytes.to_vec()));
        });
        (cb, events)
    }

    #[test]
    fn accepts_and_echoes_data() {
        let (cb, events) = recorder();
        let mut mgr = TcpConnectionManager::new("127.0.0.1", 0, TransportConfig::default(), cb);
        mgr.start().unwrap();
        let port = mgr.local_port().unwrap();

        let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        client.write_all(b"hello").unwrap();

        // Give the OS a moment to deliver the bytes to the non-blocking side.
        std::thread::sleep(Duration::from_millis(50));
        mgr.poll(Duration::from_millis(10));
        mgr.poll(Duration::from_millis(10));

        let events = events.lock().unwrap();
        assert!(events.iter().any(|(_, s, _)| *s == ConnectionStatus::Established));
        assert!(events
            .iter()
            .any(|(_, s, b)| *s == ConnectionStatus::Data && b == b"hello"));
    }

    #[test]
    fn send_past_high_water_mark_is_rejected() {
        let (cb, _events) = recorder();
        let config = TransportConfig {
            send_high_water_mark: 4,
            ..TransportConfig::default()
        };
        let mut mgr = TcpConnectionManager::new("127.0.0.1", 0, config, cb);
        mgr.start().unwrap();
        let port = mgr.local_port().unwrap();
        let _client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        mgr.poll(Duration::from_millis(10));

        let id = ConnectionId(1);
        mgr.send(id, &[1, 2]).unwrap();
        assert_eq!(mgr.send(id, &[3, 4, 5]), Err(StatusCode::BadOutOfMemory));
    }

    #[test]
    fn remote_close_is_reported_and_connection_dropped() {
        let (cb, events) = recorder();
        let mut mgr = TcpConnectionManager::new("127.0.0.1", 0, TransportConfig::default(), cb);
        mgr.start().unwrap();
        let port = mgr.local_port().unwrap();
        let client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        mgr.poll(Duration::from_millis(10));
        assert_eq!(mgr.connection_count(), 1);

        drop(client);
        std::thread::sleep(Duration::from_millis(50));
        mgr.poll(Duration::from_millis(10));

        assert_eq!(mgr.connection_count(), 0);
        assert!(events
            .lock()
            .unwrap()
            .iter()
            .any(|(_, s, _)| *s == ConnectionStatus::RemoteClosed));
    }
}
