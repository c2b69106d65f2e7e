// OPC UA server — SPDX-License-Identifier: MPL-2.0

//! [`Server`]: ties the TCP transport, per-connection SecureChannel
//! handshake, and service dispatch together into one server polled from a
//! single thread (spec §1, §5). One [`TcpConnectionManager`] accepts
//! connections; each becomes a [`ChannelDriver`] that turns its bytes into
//! [`opcua_core::messages::RequestMessage`]s for the shared [`Dispatcher`]
//! to answer.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use log::{error, warn};
use opcua_core::{
    comms::{
        channel_driver::{ChannelDriver, ChannelState, ServerChannelContext, ServerLimits},
        secure_channel::{Role, SecureChannel},
    },
    connection::{ConnectionId, ConnectionStatus},
    eventloop::{EventLoop, EventSource, TimerMode},
    sync::Mutex,
    Config,
};
use opcua_crypto::CertificateStore;
use opcua_types::{encoding::BinaryEncodable, status_code::StatusCode};

use crate::{
    config::ServerConfig,
    dispatch::{DispatchOutcome, Dispatcher},
    info::ServerInfo,
    node_store::{AccessControl, CertificateVerification, Logger, NodeStore},
    transport::{ConnectionCallback, TcpConnectionManager, TransportConfig},
};

impl ServerChannelContext for ServerInfo {
    fn limits(&self) -> ServerLimits {
        let limits = &self.config.limits;
        ServerLimits {
            receive_buffer_size: limits.receive_buffer_size as u32,
            send_buffer_size: limits.send_buffer_size as u32,
            max_message_size: limits.max_message_size as u32,
            max_chunk_count: limits.max_chunk_count as u32,
            max_channel_token_lifetime_ms: limits.max_channel_token_lifetime_ms,
        }
    }

    fn validate_endpoint_url(&self, url: &str) -> bool {
        url.starts_with(&self.base_endpoint())
    }

    fn allocate_channel_id(&self) -> u32 {
        self.secure_channel_id_handle.next()
    }
}

type IncomingEvent = (ConnectionId, ConnectionStatus, Vec<u8>);

/// Period between publish-cycle timer ticks (spec §4.6 runs this on every
/// EventLoop pass rather than tying it to a client's requested interval,
/// which each `Subscription` tracks itself and compares against).
const PUBLISH_TICK_INTERVAL: Duration = Duration::from_millis(100);
/// Period between session idle-timeout sweeps (spec §4.5).
const SESSION_EXPIRY_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// The server: one listening transport, one [`ChannelDriver`] per live
/// connection, one shared [`Dispatcher`]. Owned and polled by a single
/// thread via [`Self::tick`] (spec §5) — nothing here is `Sync`.
pub struct Server {
    info: Arc<ServerInfo>,
    certificate_store: Arc<CertificateStore>,
    dispatcher: Dispatcher,
    transport: TcpConnectionManager,
    event_loop: EventLoop,
    channels: HashMap<ConnectionId, ChannelDriver>,
    /// Which connection a parked Publish request's eventual response goes
    /// to, keyed by `request_id` (spec §4.6 step 4).
    pending_publish: HashMap<u32, ConnectionId>,
    incoming: Arc<Mutex<VecDeque<IncomingEvent>>>,
    publish_due: Arc<AtomicBool>,
    expire_due: Arc<AtomicBool>,
}

impl Server {
    /// Validates `config`, loads the server certificate from
    /// `certificate_store`, and wires up the transport and dispatcher.
    /// Does not bind a socket yet — call [`Self::start`] for that.
    pub fn new(
        config: ServerConfig,
        certificate_store: CertificateStore,
        node_store: Arc<dyn NodeStore>,
        cert_verification: Arc<dyn CertificateVerification>,
        access_control: Arc<dyn AccessControl>,
        logger: Arc<dyn Logger>,
    ) -> Result<Self, StatusCode> {
        if let Err(errors) = config.validate() {
            for e in &errors {
                error!("server config invalid: {e}");
            }
            return Err(StatusCode::BadInvalidState);
        }

        let certificate_store = Arc::new(certificate_store);
        let info = ServerInfo::new(config, &certificate_store)?;
        let dispatcher = Dispatcher::new(info.clone(), node_store, cert_verification, access_control, logger);

        let incoming: Arc<Mutex<VecDeque<IncomingEvent>>> = Arc::new(Mutex::new(VecDeque::new()));
        let incoming_for_callback = incoming.clone();
        let on_event: ConnectionCallback = Box::new(move |id, status, bytes| {
            incoming_for_callback.lock().push_back((id, status, bytes.to_vec()));
        });
        let transport = TcpConnectionManager::new(&info.config.host, info.config.port, TransportConfig::default(), on_event);

        let mut event_loop = EventLoop::new();
        let publish_due = Arc::new(AtomicBool::new(false));
        let publish_flag = publish_due.clone();
        event_loop.add_timer(PUBLISH_TICK_INTERVAL, TimerMode::Periodic, move || {
            publish_flag.store(true, Ordering::Relaxed);
        });
        let expire_due = Arc::new(AtomicBool::new(false));
        let expire_flag = expire_due.clone();
        event_loop.add_timer(SESSION_EXPIRY_TICK_INTERVAL, TimerMode::Periodic, move || {
            expire_flag.store(true, Ordering::Relaxed);
        });
        event_loop.start()?;

        Ok(Server {
            info,
            certificate_store,
            dispatcher,
            transport,
            event_loop,
            channels: HashMap::new(),
            pending_publish: HashMap::new(),
            incoming,
            publish_due,
            expire_due,
        })
    }

    /// Binds the listening socket. The transport is polled directly from
    /// [`Self::tick`] rather than registered with the `EventLoop`, since
    /// registering it would hand away the ownership `tick` needs to call
    /// `send` on it (spec §4.2, §4.3).
    pub fn start(&mut self) -> Result<(), StatusCode> {
        self.transport.start()
    }

    pub fn stop(&mut self) {
        self.transport.stop();
        self.event_loop.stop();
    }

    /// The port actually bound, once started — useful with a configured
    /// port of `0` in tests.
    pub fn local_port(&self) -> Option<u16> {
        self.transport.local_port()
    }

    pub fn session_count(&self) -> usize {
        self.dispatcher.session_count()
    }

    pub fn connection_count(&self) -> usize {
        self.transport.connection_count()
    }

    /// One iteration: gives the transport up to `timeout_ms` to perform
    /// I/O, runs any `EventLoop` timers now due, then processes everything
    /// the transport reported during this poll (spec §5).
    pub fn tick(&mut self, timeout_ms: u64) {
        self.transport.poll(Duration::from_millis(timeout_ms));
        self.event_loop.run(0);
        self.drain_incoming();

        if self.publish_due.swap(false, Ordering::Relaxed) {
            self.run_publish_cycle();
        }
        if self.expire_due.swap(false, Ordering::Relaxed) {
            self.dispatcher.expire_sessions();
        }
    }

    fn drain_incoming(&mut self) {
        loop {
            let next = self.incoming.lock().pop_front();
            let Some((id, status, bytes)) = next else { break };
            self.handle_connection_event(id, status, &bytes);
        }
    }

    fn handle_connection_event(&mut self, id: ConnectionId, status: ConnectionStatus, bytes: &[u8]) {
        match status {
            ConnectionStatus::Established => {
                let secure_channel = SecureChannel::new(&self.certificate_store, Role::Server);
                self.channels.insert(id, ChannelDriver::new_server(secure_channel));
            }
            ConnectionStatus::Data => self.handle_data(id, bytes),
            ConnectionStatus::RemoteClosed | ConnectionStatus::Error(_) => {
                self.channels.remove(&id);
                self.pending_publish.retain(|_, conn_id| *conn_id != id);
            }
        }
    }

    fn handle_data(&mut self, id: ConnectionId, bytes: &[u8]) {
        let Some(driver) = self.channels.get_mut(&id) else {
            warn!("data reported for unknown connection {}", id.0);
            return;
        };

        let mut out = Vec::new();
        let events = match driver.receive(bytes, self.info.as_ref(), &mut out) {
            Ok(events) => events,
            Err(err) => {
                let mut error_bytes = Vec::new();
                if let Err(e) = err.encode(&mut error_bytes) {
                    error!("failed to encode ERR message: {e}");
                } else {
                    let _ = self.transport.send(id, &error_bytes);
                }
                self.transport.close_connection(id);
                self.channels.remove(&id);
                return;
            }
        };

        for event in events {
            match self.dispatcher.dispatch(driver.secure_channel_mut(), event.request_id, event.message) {
                DispatchOutcome::Response(response) => {
                    if let Err(status) = driver.send_response(event.request_id, &response, &mut out) {
                        error!("failed to encode response for request {}: {status}", event.request_id);
                    }
                }
                DispatchOutcome::Parked => {
                    self.pending_publish.insert(event.request_id, id);
                }
            }
        }

        let closing = driver.state() == ChannelState::Closing;
        if !out.is_empty() {
            if let Err(status) = self.transport.send(id, &out) {
                warn!("send to connection {} failed: {status}", id.0);
                self.transport.close_connection(id);
                self.channels.remove(&id);
                return;
            }
        }
        if closing {
            self.transport.close_connection(id);
            self.channels.remove(&id);
            self.pending_publish.retain(|_, conn_id| *conn_id != id);
        }
    }

    /// One publish-cycle tick (spec §4.6 steps 1-4): asks the dispatcher to
    /// fill whatever parked Publish requests it can, then routes each
    /// filled response back out through the connection it arrived on.
    fn run_publish_cycle(&mut self) {
        for (request_id, response) in self.dispatcher.run_publish_cycle() {
            let Some(conn_id) = self.pending_publish.remove(&request_id) else {
                continue;
            };
            let Some(driver) = self.channels.get_mut(&conn_id) else { continue };
            let mut out = Vec::new();
            match driver.send_response(request_id, &response, &mut out) {
                Ok(()) if !out.is_empty() => {
                    let _ = self.transport.send(conn_id, &out);
                }
                Ok(()) => {}
                Err(status) => error!("failed to encode publish response for request {request_id}: {status}"),
            }
        }
    }
}
