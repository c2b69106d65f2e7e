// OPC UA client — SPDX-License-Identifier: MPL-2.0

//! [`Client`]: ties the TCP transport, the SecureChannel handshake, Session
//! and Subscription bookkeeping together into one client polled from a
//! single thread (spec §1, §5, §4.4 worked example E1). Owns exactly one
//! connection, one channel, one session — the cardinality a single `Client`
//! instance represents (spec §4.3).

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use log::{error, warn};
use opcua_core::{
    comms::{
        channel_driver::{ClientChannelDriver, ClientChannelState, ClientLimits},
        secure_channel::{Role, SecureChannel},
    },
    connection::{ConnectionId, ConnectionStatus},
    eventloop::{EventLoop, EventSource, TimerMode},
    sync::Mutex,
    Config, RequestMessage, ResponseMessage,
};
use opcua_crypto::CertificateStore;
use opcua_types::{
    byte_string::ByteString,
    service_types::{IdentityToken, NotificationMessage, SecurityTokenRequestType},
    status_code::StatusCode,
};

use crate::{
    config::ClientConfig,
    session::Session,
    subscriptions::{SubscriptionHandle, SubscriptionManager},
    transport::{ConnectionCallback, TcpClientTransport, TransportConfig, CLIENT_CONNECTION_ID},
};

/// Error surfaced by [`Client`] operations; wraps the `StatusCode`s the wire
/// protocol and services report, plus the handshake-ordering mistakes a
/// caller can make by calling a method before the client is `Ready`.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    Status(#[from] StatusCode),
    #[error("client is not ready: currently in phase {0:?}")]
    NotReady(Phase),
}

/// Where the client is in the overall `HEL -> ACK -> OPN -> CreateSession ->
/// ActivateSession -> ready` bring-up sequence (spec §4.4 E1, §4.5). Unlike
/// [`ClientChannelState`]/[`SessionState`], which track one layer each, this
/// is the single state machine [`Client::tick`] drives end to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connecting,
    AwaitingAck,
    AwaitingChannelOpen,
    CreatingSession,
    ActivatingSession,
    Ready,
    Closing,
    Closed,
}

type CallbackResult<T> = Box<dyn FnOnce(Result<T, StatusCode>) + Send>;

/// A user-issued subscription call waiting on its response, keyed by the
/// wire `request_id` the request was sent under.
enum PendingCall {
    CreateSubscription(CallbackResult<SubscriptionHandle>),
    SetPublishingMode(CallbackResult<()>),
    DeleteSubscriptions(CallbackResult<()>),
}

type IncomingEvent = (ConnectionId, ConnectionStatus, Vec<u8>);

/// Interval the client polls its own Publish backlog and channel-renewal
/// deadline, independent of any particular subscription's publishing
/// interval (spec §4.6 SUPPLEMENT, mirroring the server's own fixed poll
/// cadence).
const MAINTENANCE_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// The client: one outbound connection, one `ClientChannelDriver`, one
/// `Session`, one `SubscriptionManager`. Owned and polled by a single
/// thread via [`Self::tick`] (spec §5) — nothing here is `Sync`.
pub struct Client {
    config: Arc<ClientConfig>,
    certificate_store: Arc<CertificateStore>,
    transport: TcpClientTransport,
    event_loop: EventLoop,
    channel: Option<ClientChannelDriver>,
    session: Session,
    subscriptions: SubscriptionManager,
    phase: Phase,
    pending_calls: HashMap<u32, PendingCall>,
    incoming: Arc<Mutex<VecDeque<IncomingEvent>>>,
    on_notification: Option<Box<dyn FnMut(u32, NotificationMessage) + Send>>,
    maintenance_due: Arc<std::sync::atomic::AtomicBool>,
}

impl Client {
    /// Loads the client certificate from `certificate_store` (if the
    /// configured security policy needs one) and wires up the transport.
    /// Does not connect yet — call [`Self::start`] for that.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if let Err(errors) = config.validate() {
            for e in &errors {
                error!("client config invalid: {e}");
            }
            return Err(ClientError::Status(StatusCode::BadInvalidState));
        }

        let certificate_store = Arc::new(CertificateStore::new(
            config.certificate_path.clone(),
            config.private_key_path.clone(),
        ));

        let incoming: Arc<Mutex<VecDeque<IncomingEvent>>> = Arc::new(Mutex::new(VecDeque::new()));
        let incoming_for_callback = incoming.clone();
        let on_event: ConnectionCallback = Box::new(move |id, status, bytes: &[u8]| {
            incoming_for_callback.lock().push_back((id, status, bytes.to_vec()));
        });
        let transport = TcpClientTransport::new(&config.host, config.port, TransportConfig::default(), on_event);

        let mut event_loop = EventLoop::new();
        let maintenance_due = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let maintenance_flag = maintenance_due.clone();
        event_loop.add_timer(MAINTENANCE_TICK_INTERVAL, TimerMode::Periodic, move || {
            maintenance_flag.store(true, std::sync::atomic::Ordering::Relaxed);
        });
        event_loop.start().map_err(ClientError::Status)?;

        Ok(Client {
            config: Arc::new(config),
            certificate_store,
            transport,
            event_loop,
            channel: None,
            session: Session::new(),
            subscriptions: SubscriptionManager::new(1),
            phase: Phase::Disconnected,
            pending_calls: HashMap::new(),
            incoming,
            on_notification: None,
            maintenance_due,
        })
    }

    /// Registers the callback invoked whenever a `PublishResponse` carries a
    /// non-keep-alive `NotificationMessage` (spec §4.6 step 3). Replaces any
    /// previously registered callback.
    pub fn on_notification(&mut self, callback: impl FnMut(u32, NotificationMessage) + Send + 'static) {
        self.on_notification = Some(Box::new(callback));
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    /// Begins connecting. The handshake (`HEL`/`ACK`/`OPN`) and session
    /// bring-up (`CreateSession`/`ActivateSession`, anonymous identity)
    /// proceed automatically across subsequent [`Self::tick`] calls.
    pub fn start(&mut self) -> Result<(), ClientError> {
        self.transport.start().map_err(ClientError::Status)?;
        self.phase = Phase::Connecting;
        Ok(())
    }

    pub fn stop(&mut self) {
        self.transport.close();
        self.event_loop.stop();
        self.phase = Phase::Closing;
    }

    /// One iteration: gives the transport up to `timeout_ms` to perform
    /// I/O, runs any due maintenance, then processes everything the
    /// transport reported during this poll (spec §5).
    pub fn tick(&mut self, timeout_ms: u64) {
        self.transport.poll(Duration::from_millis(timeout_ms));
        self.event_loop.run(0);
        self.drain_incoming();

        if self.maintenance_due.swap(false, std::sync::atomic::Ordering::Relaxed) {
            self.run_maintenance();
        }
    }

    fn drain_incoming(&mut self) {
        loop {
            let next = self.incoming.lock().pop_front();
            let Some((id, status, bytes)) = next else { break };
            if id != CLIENT_CONNECTION_ID {
                continue;
            }
            self.handle_connection_event(status, &bytes);
        }
    }

    fn handle_connection_event(&mut self, status: ConnectionStatus, bytes: &[u8]) {
        match status {
            ConnectionStatus::Established => self.begin_handshake(),
            ConnectionStatus::Data => self.handle_data(bytes),
            ConnectionStatus::RemoteClosed | ConnectionStatus::Error(_) => {
                self.channel = None;
                self.phase = Phase::Closed;
            }
        }
    }

    fn begin_handshake(&mut self) {
        let secure_channel = SecureChannel::new(&self.certificate_store, Role::Client);
        let mut channel = ClientChannelDriver::new(secure_channel, self.config.endpoint_url());
        let limits = ClientLimits {
            receive_buffer_size: self.config.limits.receive_buffer_size as u32,
            send_buffer_size: self.config.limits.send_buffer_size as u32,
            max_message_size: self.config.limits.max_message_size as u32,
            max_chunk_count: self.config.limits.max_chunk_count as u32,
        };
        let mut out = Vec::new();
        if let Err(status) = channel.hello(limits, &mut out) {
            error!("failed to encode HEL: {status}");
            return;
        }
        if let Err(status) = self.transport.send(&out) {
            error!("failed to send HEL: {status}");
            return;
        }
        self.channel = Some(channel);
        self.phase = Phase::AwaitingAck;
    }

    fn handle_data(&mut self, bytes: &[u8]) {
        let Some(mut channel) = self.channel.take() else {
            warn!("data reported with no channel established");
            return;
        };

        let mut out = Vec::new();
        let events = match channel.receive(bytes, &mut out) {
            Ok(events) => events,
            Err(err) => {
                error!("channel error: {}", err.reason);
                self.phase = Phase::Closed;
                return;
            }
        };

        if channel.state() == ClientChannelState::AckReceived && self.phase == Phase::AwaitingAck {
            let mut open_out = Vec::new();
            match channel.open_secure_channel(SecurityTokenRequestType::Issue, self.config.requested_channel_lifetime_ms, &mut open_out) {
                Ok(_) => out.extend_from_slice(&open_out),
                Err(status) => error!("failed to send OpenSecureChannel: {status}"),
            }
            self.phase = Phase::AwaitingChannelOpen;
        }

        if channel.state() == ClientChannelState::Open && self.phase == Phase::AwaitingChannelOpen {
            let nonce_len = channel.secure_channel().security_policy().secure_channel_nonce_length().max(32);
            let client_nonce = if channel.secure_channel().security_policy() == opcua_crypto::SecurityPolicy::None {
                ByteString::null()
            } else {
                opcua_crypto::random::byte_string(nonce_len)
            };
            let request = self.session.create_session_request(&self.config, client_nonce, ByteString::null());
            let request_id = channel.next_request_id();
            if let Err(status) = channel.send_request(request_id, &RequestMessage::from(request), &mut out) {
                error!("failed to send CreateSessionRequest: {status}");
            }
            self.phase = Phase::CreatingSession;
        }

        for event in events {
            self.handle_response(&mut channel, event.message, &mut out);
        }

        if !out.is_empty() {
            if let Err(status) = self.transport.send(&out) {
                error!("send failed: {status}");
                self.phase = Phase::Closed;
                self.channel = None;
                return;
            }
        }
        self.channel = Some(channel);
    }

    fn handle_response(&mut self, channel: &mut ClientChannelDriver, message: ResponseMessage, out: &mut Vec<u8>) {
        match message {
            ResponseMessage::CreateSession(response) => {
                if let Err(status) = self.session.accept_create_session_response(&response) {
                    error!("CreateSession rejected: {status}");
                    self.phase = Phase::Closed;
                    return;
                }
                let identity = IdentityToken::Anonymous(Default::default());
                match self.session.activate_session_request(None, identity) {
                    Ok(request) => {
                        let request_id = channel.next_request_id();
                        if let Err(status) = channel.send_request(request_id, &RequestMessage::from(request), out) {
                            error!("failed to send ActivateSessionRequest: {status}");
                        }
                        self.phase = Phase::ActivatingSession;
                    }
                    Err(status) => error!("failed to build ActivateSessionRequest: {status}"),
                }
            }
            ResponseMessage::ActivateSession(response) => {
                if let Err(status) = self.session.accept_activate_session_response(&response) {
                    error!("ActivateSession rejected: {status}");
                    self.phase = Phase::Closed;
                    return;
                }
                self.phase = Phase::Ready;
            }
            ResponseMessage::CreateSubscription(response) => {
                let request_id = response.response_header.request_handle;
                let result = self.subscriptions.accept_create_subscription_response(&response);
                if let Some(PendingCall::CreateSubscription(cb)) = self.pending_calls.remove(&request_id) {
                    cb(result);
                }
            }
            ResponseMessage::SetPublishingMode(response) => {
                let request_id = response.response_header.request_handle;
                let result = self.subscriptions.accept_set_publishing_mode_response(&response);
                if let Some(PendingCall::SetPublishingMode(cb)) = self.pending_calls.remove(&request_id) {
                    cb(result);
                }
            }
            ResponseMessage::DeleteSubscriptions(response) => {
                let request_id = response.response_header.request_handle;
                self.subscriptions.accept_delete_subscriptions_response(&response);
                if let Some(PendingCall::DeleteSubscriptions(cb)) = self.pending_calls.remove(&request_id) {
                    cb(Ok(()));
                }
            }
            ResponseMessage::Publish(response) => match self.subscriptions.accept_publish_response(&response) {
                Ok(notification) => {
                    if notification.notification_data.is_some() {
                        if let Some(callback) = self.on_notification.as_mut() {
                            callback(response.subscription_id, notification);
                        }
                    }
                }
                Err(status) => warn!("Publish response carried {status}"),
            },
            ResponseMessage::ServiceFault(fault) => {
                warn!("service fault: {}", fault.response_header.service_result);
            }
            other => warn!("unhandled response variant: {other:?}"),
        }
    }

    fn run_maintenance(&mut self) {
        if self.phase != Phase::Ready {
            return;
        }
        let Some(mut channel) = self.channel.take() else { return };

        if channel.secure_channel().should_renew_security_token() {
            let mut out = Vec::new();
            match channel.open_secure_channel(SecurityTokenRequestType::Renew, self.config.requested_channel_lifetime_ms, &mut out) {
                Ok(_) if !out.is_empty() => {
                    let _ = self.transport.send(&out);
                }
                Ok(_) => {}
                Err(status) => error!("failed to renew SecureChannel: {status}"),
            }
        }

        while self.subscriptions.needs_publish_request() {
            let request = self.subscriptions.publish_request(self.session.authentication_token().clone());
            let request_id = channel.next_request_id();
            let mut out = Vec::new();
            if let Err(status) = channel.send_request(request_id, &RequestMessage::from(request), &mut out) {
                error!("failed to send PublishRequest: {status}");
                break;
            }
            if !out.is_empty() {
                let _ = self.transport.send(&out);
            }
        }

        self.channel = Some(channel);
    }

    /// Sends `CreateSubscriptionRequest`; `callback` runs once the matching
    /// response arrives on a later [`Self::tick`] (spec §4.6 step 1).
    pub fn create_subscription(
        &mut self,
        requested_publishing_interval: f64,
        requested_lifetime_count: u32,
        requested_max_keep_alive_count: u32,
        max_notifications_per_publish: u32,
        publishing_enabled: bool,
        priority: u8,
        callback: impl FnOnce(Result<SubscriptionHandle, StatusCode>) + Send + 'static,
    ) -> Result<(), ClientError> {
        let Some(mut channel) = self.channel.take() else {
            return Err(ClientError::NotReady(self.phase));
        };
        if self.phase != Phase::Ready {
            self.channel = Some(channel);
            return Err(ClientError::NotReady(self.phase));
        }
        let request = self.subscriptions.create_subscription_request(
            self.session.authentication_token().clone(),
            requested_publishing_interval,
            requested_lifetime_count,
            requested_max_keep_alive_count,
            max_notifications_per_publish,
            publishing_enabled,
            priority,
        );
        let handle = request.request_header.request_handle;
        let request_id = channel.next_request_id();
        let mut out = Vec::new();
        let result = channel
            .send_request(request_id, &RequestMessage::from(request), &mut out)
            .map_err(ClientError::Status);
        self.channel = Some(channel);
        result?;
        if !out.is_empty() {
            self.transport.send(&out).map_err(ClientError::Status)?;
        }
        self.pending_calls.insert(handle, PendingCall::CreateSubscription(Box::new(callback)));
        Ok(())
    }
}
