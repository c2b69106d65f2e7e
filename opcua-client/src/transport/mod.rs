// OPC UA client — SPDX-License-Identifier: MPL-2.0

//! TCP realization of the client side of the Connection Manager contract
//! (spec §4.3): one outbound `opc.tcp` connection, polled from the single
//! EventLoop thread the same way `opcua_server`'s listener side is.

use std::{
    io::{ErrorKind, Read, Write},
    net::TcpStream,
    time::Duration,
};

use log::{error, warn};
use opcua_core::{
    connection::{ConnectionId, ConnectionStatus, SendBuffer},
    eventloop::{EventLoopState, EventSource},
};
use opcua_types::status_code::StatusCode;

/// Called with `(connection_id, status, bytes)` whenever the connection has
/// something to report (spec §4.3). `bytes` is empty except for
/// `ConnectionStatus::Data`.
pub type ConnectionCallback = Box<dyn FnMut(ConnectionId, ConnectionStatus, &[u8]) + Send>;

/// The only connection id a client transport ever reports — it never has
/// more than one connection open at a time.
pub const CLIENT_CONNECTION_ID: ConnectionId = ConnectionId(1);

/// Sizing knobs for the socket, independent of the negotiated UA-TCP
/// buffer sizes the channel driver applies on top.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub send_high_water_mark: usize,
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

/// The TCP [`EventSource`] for one outbound connection (spec §4.3, client
/// side). Connects synchronously in [`EventSource::start`]: unlike the
/// listener side there is only ever one connection to make, so a
/// non-blocking connect-in-progress state machine buys nothing here.
pub struct TcpClientTransport {
    addr: String,
    config: TransportConfig,
    stream: Option<TcpStream>,
    send_buffer: SendBuffer,
    state: EventLoopState,
    closing: bool,
    on_event: ConnectionCallback,
}

impl TcpClientTransport {
    pub fn new(host: &str, port: u16, config: TransportConfig, on_event: ConnectionCallback) -> Self {
        TcpClientTransport {
            addr: format!("{host}:{port}"),
            send_buffer: SendBuffer::new(config.send_high_water_mark),
            config,
            stream: None,
            state: EventLoopState::Fresh,
            closing: false,
            on_event,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Queues `bytes` for sending, if the connection is still up.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), StatusCode> {
        if self.stream.is_none() {
            return Err(StatusCode::BadConnectionClosed);
        }
        self.send_buffer.push(bytes)
    }

    /// Begins closing the connection; the final callback will be
    /// `RemoteClosed`.
    pub fn close(&mut self) {
        self.closing = true;
    }

    /// Returns `false` once the stream has died and should be dropped.
    fn flush_pending(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else { return true };
        let pending = self.send_buffer.drain();
        if pending.is_empty() {
            return true;
        }
        let mut written = 0;
        while written < pending.len() {
            match stream.write(&pending[written..]) {
                Ok(0) => return false,
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("client connection write error: {e}");
                    return false;
                }
            }
        }
        if written < pending.len() {
            let _ = self.send_buffer.push(&pending[written..]);
        }
        true
    }
}

impl EventSource for TcpClientTransport {
    fn state(&self) -> EventLoopState {
        self.state
    }

    fn start(&mut self) -> Result<(), StatusCode> {
        let stream = TcpStream::connect(&self.addr).map_err(|e| {
            error!("failed to connect to {}: {e}", self.addr);
            StatusCode::BadCommunicationError
        })?;
        stream.set_nonblocking(true).map_err(|_| StatusCode::BadTcpInternalError)?;
        let _ = stream.set_nodelay(true);
        self.stream = Some(stream);
        self.state = EventLoopState::Started;
        (self.on_event)(CLIENT_CONNECTION_ID, ConnectionStatus::Established, &[]);
        Ok(())
    }

    fn stop(&mut self) {
        self.closing = true;
        self.state = EventLoopState::Stopping;
    }

    fn poll(&mut self, _timeout: Duration) {
        if self.state == EventLoopState::Stopped || self.stream.is_none() {
            return;
        }

        if !self.flush_pending() {
            self.stream = None;
            self.state = EventLoopState::Stopped;
            (self.on_event)(CLIENT_CONNECTION_ID, ConnectionStatus::RemoteClosed, &[]);
            return;
        }

        if self.closing && self.send_buffer.pending_len() == 0 {
            if let Some(stream) = self.stream.take() {
                let _ = stream.shutdown(std::net::Shutdown::Both);
            }
            self.state = EventLoopState::Stopped;
            (self.on_event)(CLIENT_CONNECTION_ID, ConnectionStatus::RemoteClosed, &[]);
            return;
        }

        let Some(stream) = self.stream.as_mut() else { return };
        let mut buf = vec![0u8; self.config.read_chunk_size];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => {
                    self.stream = None;
                    self.state = EventLoopState::Stopped;
                    (self.on_event)(CLIENT_CONNECTION_ID, ConnectionStatus::RemoteClosed, &[]);
                    return;
                }
                Ok(n) => (self.on_event)(CLIENT_CONNECTION_ID, ConnectionStatus::Data, &buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("client connection read error: {e}");
                    self.stream = None;
                    self.state = EventLoopState::Stopped;
                    (self.on_event)(
                        CLIENT_CONNECTION_ID,
                        ConnectionStatus::Error(StatusCode::BadCommunicationError),
                        &[],
                    );
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{net::TcpListener, sync::{Arc, Mutex}};

    fn recorder() -> (ConnectionCallback, Arc<Mutex<Vec<(ConnectionId, ConnectionStatus, Vec<u8>)>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        let cb: ConnectionCallback = Box::new(move |id, status, bytes| {
            events_clone.lock().unwrap().push((id, status, bytes.to_vec()));
        });
        (cb, events)
    }

    #[test]
    fn connects_and_receives_data() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"ack").unwrap();
        });

        let (cb, events) = recorder();
        let mut transport = TcpClientTransport::new("127.0.0.1", port, TransportConfig::default(), cb);
        transport.start().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        transport.poll(Duration::from_millis(10));
        server.join().unwrap();

        let events = events.lock().unwrap();
        assert!(events.iter().any(|(_, s, _)| *s == ConnectionStatus::Established));
        assert!(events.iter().any(|(_, s, b)| *s == ConnectionStatus::Data && b == b"ack"));
    }
}
