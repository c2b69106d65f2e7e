// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! Drives one connection's [`SecureChannel`] through `HEL -> ACK -> OPN`
//! and the ongoing chunk assembly needed to decode service requests off of
//! it (spec §4.4's state machine and worked example E1). This is the piece
//! that turns the raw byte stream a [`crate::connection::Connection`]
//! delivers into decoded [`RequestMessage`]s, and turns responses back into
//! bytes — everything below it only knows about bytes, everything above it
//! only knows about messages.

use std::io::Cursor;

use log::trace;
use opcua_crypto::SecurityPolicy;
use opcua_types::{
    encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions},
    node_id::NodeId,
    service_types::{
        ChannelSecurityToken, OpenSecureChannelRequest, OpenSecureChannelResponse, RequestHeader,
        ResponseHeader, SecurityTokenRequestType,
    },
    status_code::StatusCode,
};

use crate::{
    comms::{
        message_chunk::MessageIsFinalType,
        secure_channel::SecureChannel,
        tcp_types::{
            peek_message_kind, AcknowledgeMessage, ErrorMessage, HelloMessage, RawMessageKind,
            MIN_CHUNK_SIZE, PROTOCOL_VERSION, RAW_MESSAGE_HEADER_SIZE,
        },
        Chunker,
    },
    messages::{RequestMessage, ResponseMessage},
};

/// Where a [`ChannelDriver`] is in the handshake/lifecycle state machine
/// (spec §4.4: `fresh -> hel_received -> open -> closing -> closed`, the
/// server-side half of the full client/server state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Fresh,
    HelReceived,
    Open,
    Closing,
    Closed,
}

/// One decoded request ready for dispatch. `OpenSecureChannel` and
/// `CloseSecureChannel` are handled internally by the driver and never
/// surface here — they belong to the channel layer, not service dispatch.
#[derive(Debug)]
pub struct ChannelEvent {
    pub request_id: u32,
    pub message: RequestMessage,
}

/// Server-side policy the driver needs but does not own: the limits a Hello
/// negotiates against, whether an endpoint URL is one this server answers
/// on, and how secure channel ids are allocated. Implemented by the
/// embedder's server info type — keeps this crate ignorant of
/// `opcua-server`'s configuration shape.
pub trait ServerChannelContext {
    fn limits(&self) -> ServerLimits;
    fn validate_endpoint_url(&self, url: &str) -> bool;
    fn allocate_channel_id(&self) -> u32;
}

/// Buffer/message-size ceilings this server is configured with, clamped
/// against whatever the client's Hello requests (spec §4.4).
#[derive(Debug, Clone, Copy)]
pub struct ServerLimits {
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
    pub max_channel_token_lifetime_ms: u32,
}

/// Buffer/message-size negotiation rule (Part 6 §7.1.2.4): `0` means
/// "unlimited"; otherwise the smaller of the two sides wins.
fn min_zero_infinite(a: u32, b: u32) -> u32 {
    if a == 0 {
        b
    } else if b == 0 {
        a
    } else {
        a.min(b)
    }
}

/// Advances `current` by `increment`, wrapping to `1` rather than `0` once
/// it would reach the reserved top of the range (spec §4.4 sequence number
/// rule).
fn advance_sequence_number(current: u32, increment: u32) -> u32 {
    let next = current.wrapping_add(increment);
    if next == 0 || next >= 4_294_966_271 {
        1
    } else {
        next
    }
}

/// Drives one connection's `SecureChannel` through the handshake and every
/// subsequent chunked exchange. Owned by the single EventLoop thread (spec
/// §5) — every method takes `&mut self` directly.
pub struct ChannelDriver {
    state: ChannelState,
    secure_channel: SecureChannel,
    recv_buffer: Vec<u8>,
    pending_chunks: Vec<crate::comms::MessageChunk>,
    last_received_sequence_number: u32,
    next_send_sequence_number: u32,
    max_chunk_count: usize,
    negotiated_send_chunk_size: usize,
    negotiated_send_message_size: usize,
    endpoint_url: String,
}

impl ChannelDriver {
    pub fn new_server(secure_channel: SecureChannel) -> Self {
        ChannelDriver {
            state: ChannelState::Fresh,
            secure_channel,
            recv_buffer: Vec::new(),
            pending_chunks: Vec::new(),
            last_received_sequence_number: 0,
            next_send_sequence_number: 1,
            max_chunk_count: 0,
            negotiated_send_chunk_size: 0,
            negotiated_send_message_size: 0,
            endpoint_url: String::new(),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn secure_channel(&self) -> &SecureChannel {
        &self.secure_channel
    }

    pub fn secure_channel_mut(&mut self) -> &mut SecureChannel {
        &mut self.secure_channel
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    /// Appends freshly-received bytes and parses out as many complete raw
    /// messages/chunks as are now available, feeding any bytes this side
    /// owes the peer (`ACK`, an `OPN` response) into `out`. `HEL`, `OPN`
    /// and `CLO` are consumed here; only ordinary service requests are
    /// handed back.
    pub fn receive(
        &mut self,
        bytes: &[u8],
        ctx: &dyn ServerChannelContext,
        out: &mut Vec<u8>,
    ) -> Result<Vec<ChannelEvent>, ErrorMessage> {
        self.recv_buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        loop {
            if self.recv_buffer.len() < RAW_MESSAGE_HEADER_SIZE {
                break;
            }
            let total_len = u32::from_le_bytes([
                self.recv_buffer[4],
                self.recv_buffer[5],
                self.recv_buffer[6],
                self.recv_buffer[7],
            ]) as usize;
            if total_len < RAW_MESSAGE_HEADER_SIZE {
                return Err(ErrorMessage::new(
                    StatusCode::BadTcpMessageTypeInvalid,
                    "Message size smaller than its own header",
                ));
            }
            if self.recv_buffer.len() < total_len {
                break;
            }

            let frame: Vec<u8> = self.recv_buffer.drain(..total_len).collect();
            match peek_message_kind(&frame) {
                RawMessageKind::Hello => self.handle_hello(&frame, ctx, out)?,
                RawMessageKind::Chunk => {
                    if let Some(event) = self.handle_chunk(&frame, ctx, out)? {
                        events.push(event);
                    }
                }
                RawMessageKind::Acknowledge | RawMessageKind::Error => {
                    return Err(ErrorMessage::new(
                        StatusCode::BadTcpMessageTypeInvalid,
                        "Server does not expect ACK/ERR from a client",
                    ));
                }
                RawMessageKind::Unknown => {
                    return Err(ErrorMessage::new(
                        StatusCode::BadTcpMessageTypeInvalid,
                        "Unrecognized message type code",
                    ));
                }
            }
        }
        Ok(events)
    }

    fn handle_hello(
        &mut self,
        frame: &[u8],
        ctx: &dyn ServerChannelContext,
        out: &mut Vec<u8>,
    ) -> Result<(), ErrorMessage> {
        if self.state != ChannelState::Fresh {
            return Err(ErrorMessage::new(StatusCode::BadTcpMessageTypeInvalid, "HEL received twice"));
        }
        let hello = HelloMessage::decode(&mut Cursor::new(frame), &DecodingOptions::default())
            .map_err(|e| ErrorMessage::new(StatusCode::BadCommunicationError, &e.to_string()))?;

        if hello.protocol_version > PROTOCOL_VERSION {
            return Err(ErrorMessage::new(
                StatusCode::BadTcpInternalError,
                "Unsupported protocol version",
            ));
        }
        if !hello.is_valid_buffer_sizes() {
            return Err(ErrorMessage::new(
                StatusCode::BadCommunicationError,
                "Hello buffer sizes below the minimum chunk size",
            ));
        }
        let endpoint_url = hello.endpoint_url.as_ref().to_string();
        if !ctx.validate_endpoint_url(&endpoint_url) {
            return Err(ErrorMessage::new(StatusCode::BadTcpEndpointUrlInvalid, "Unknown endpoint"));
        }
        self.endpoint_url = endpoint_url;

        let limits = ctx.limits();
        self.negotiated_send_message_size =
            min_zero_infinite(limits.max_message_size, hello.max_message_size) as usize;
        self.max_chunk_count = min_zero_infinite(limits.max_chunk_count, hello.max_chunk_count) as usize;
        let send_buffer_size = limits.send_buffer_size.min(hello.receive_buffer_size);
        let receive_buffer_size = limits.receive_buffer_size.min(hello.send_buffer_size);
        self.negotiated_send_chunk_size = (send_buffer_size as usize).max(MIN_CHUNK_SIZE);

        let ack = AcknowledgeMessage::new(
            PROTOCOL_VERSION,
            receive_buffer_size,
            send_buffer_size,
            self.negotiated_send_message_size as u32,
            self.max_chunk_count as u32,
        );
        ack.encode(out)
            .map_err(|e| ErrorMessage::new(StatusCode::BadEncodingError, &e.to_string()))?;
        self.state = ChannelState::HelReceived;
        trace!("HEL accepted for endpoint {}", self.endpoint_url);
        Ok(())
    }

    fn handle_chunk(
        &mut self,
        frame: &[u8],
        ctx: &dyn ServerChannelContext,
        out: &mut Vec<u8>,
    ) -> Result<Option<ChannelEvent>, ErrorMessage> {
        if self.state == ChannelState::Fresh {
            return Err(ErrorMessage::new(StatusCode::BadCommunicationError, "Chunk received before HEL"));
        }

        let decrypted = self
            .secure_channel
            .verify_and_remove_security(frame)
            .map_err(|e| ErrorMessage::new(StatusCode::BadSecurityChecksFailed, &e.to_string()))?;
        let header = decrypted
            .message_header(&self.secure_channel.decoding_options())
            .map_err(|e| ErrorMessage::new(StatusCode::BadDecodingError, &e.to_string()))?;

        if header.is_final == MessageIsFinalType::FinalError {
            self.pending_chunks.clear();
            return Ok(None);
        }

        self.pending_chunks.push(decrypted);
        if self.max_chunk_count > 0 && self.pending_chunks.len() > self.max_chunk_count {
            self.pending_chunks.clear();
            return Err(ErrorMessage::new(StatusCode::BadTcpMessageTooLarge, "Too many chunks for one message"));
        }
        if header.is_final != MessageIsFinalType::Final {
            return Ok(None);
        }

        let chunks = std::mem::take(&mut self.pending_chunks);
        let starting_sequence_number = advance_sequence_number(self.last_received_sequence_number, 1);
        let last_sequence_number = Chunker::validate_chunks(starting_sequence_number, &self.secure_channel, &chunks)
            .map_err(|e| ErrorMessage::new(StatusCode::BadSequenceNumberInvalid, &e.to_string()))?;
        self.last_received_sequence_number = last_sequence_number;

        let request_id = chunks[0]
            .chunk_info(&self.secure_channel)
            .map_err(|e| ErrorMessage::new(StatusCode::BadDecodingError, &e.to_string()))?
            .sequence_header
            .request_id;

        let message: RequestMessage = Chunker::decode(&chunks, &self.secure_channel, None)
            .map_err(|e| ErrorMessage::new(StatusCode::BadDecodingError, &e.to_string()))?;

        match message {
            RequestMessage::OpenSecureChannel(request) => {
                self.handle_open_secure_channel(request_id, *request, ctx, out)?;
                Ok(None)
            }
            RequestMessage::CloseSecureChannel(_) => {
                self.state = ChannelState::Closing;
                Ok(None)
            }
            other => Ok(Some(ChannelEvent { request_id, message: other })),
        }
    }

    fn handle_open_secure_channel(
        &mut self,
        request_id: u32,
        request: OpenSecureChannelRequest,
        ctx: &dyn ServerChannelContext,
        out: &mut Vec<u8>,
    ) -> Result<(), ErrorMessage> {
        if request.client_protocol_version > PROTOCOL_VERSION {
            return Err(ErrorMessage::new(
                StatusCode::BadTcpInternalError,
                "Unsupported protocol version",
            ));
        }
        self.secure_channel.set_security_mode(request.security_mode);

        if request.request_type == SecurityTokenRequestType::Issue {
            self.secure_channel.set_secure_channel_id(ctx.allocate_channel_id());
        }

        if self.secure_channel.security_policy() != SecurityPolicy::None {
            self.secure_channel
                .set_remote_nonce_from_byte_string(&request.client_nonce)
                .map_err(|_| ErrorMessage::new(StatusCode::BadNonceInvalid, "Invalid client nonce"))?;
            self.secure_channel.create_random_nonce();
            self.secure_channel.derive_keys();
        }

        let limits = ctx.limits();
        let revised_lifetime = if request.requested_lifetime == 0 {
            limits.max_channel_token_lifetime_ms
        } else {
            request.requested_lifetime.min(limits.max_channel_token_lifetime_ms)
        };
        let token = ChannelSecurityToken {
            channel_id: self.secure_channel.secure_channel_id(),
            token_id: self.secure_channel.token_id().wrapping_add(1).max(1),
            created_at: opcua_types::date_time::DateTime::now(),
            revised_lifetime,
        };
        self.secure_channel.set_security_token(token.clone());

        let response: ResponseMessage = OpenSecureChannelResponse {
            response_header: ResponseHeader::new_good(&request),
            server_protocol_version: PROTOCOL_VERSION,
            security_token: token,
            server_nonce: self.secure_channel.local_nonce_as_byte_string(),
        }
        .into();
        self.send_response_chunks(request_id, &response, out)?;
        self.state = ChannelState::Open;
        Ok(())
    }

    /// Encodes and queues `response` as chunks for `request_id`, for
    /// ordinary service responses dispatched above this layer.
    pub fn send_response(
        &mut self,
        request_id: u32,
        response: &ResponseMessage,
        out: &mut Vec<u8>,
    ) -> Result<(), StatusCode> {
        self.send_response_chunks(request_id, response, out)
            .map_err(|e| e.error)
    }

    fn send_response_chunks(
        &mut self,
        request_id: u32,
        response: &ResponseMessage,
        out: &mut Vec<u8>,
    ) -> Result<(), ErrorMessage> {
        let starting_sequence_number = self.next_send_sequence_number;
        let chunks = Chunker::encode(
            starting_sequence_number,
            request_id,
            self.negotiated_send_message_size,
            self.negotiated_send_chunk_size,
            &self.secure_channel,
            response,
        )
        .map_err(|e| ErrorMessage::new(StatusCode::BadEncodingError, &e.to_string()))?;
        self.next_send_sequence_number = advance_sequence_number(starting_sequence_number, chunks.len() as u32 - 1);
        for chunk in &chunks {
            chunk
                .encode(out)
                .map_err(|e| ErrorMessage::new(StatusCode::BadEncodingError, &e.to_string()))?;
        }
        Ok(())
    }

    /// Marks the channel as closing; the caller is responsible for
    /// actually tearing down the underlying connection.
    pub fn close(&mut self) {
        self.state = ChannelState::Closing;
    }
}

/// Where a [`ClientChannelDriver`] is in the handshake/lifecycle state
/// machine (spec §4.4: `fresh -> hel_sent -> ack_received -> opn_sent ->
/// open -> closing -> closed`, the client-side half of the full state
/// machine `ChannelDriver` implements the server half of).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientChannelState {
    Fresh,
    HelSent,
    AckReceived,
    OpnSent,
    Open,
    Closing,
    Closed,
}

/// One decoded response ready for the caller to match against the
/// `request_id` it sent the corresponding request under.
/// `OpenSecureChannelResponse` is handled internally and never surfaces
/// here — renewal is this driver's job, not the session layer's.
#[derive(Debug)]
pub struct ClientChannelEvent {
    pub request_id: u32,
    pub message: ResponseMessage,
}

/// Buffer/message-size ceilings this client advertises in `HEL` (spec
/// §4.4); the server clamps them against its own before replying in `ACK`.
#[derive(Debug, Clone, Copy)]
pub struct ClientLimits {
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
}

/// Drives one connection's `SecureChannel` from the client side: sends
/// `HEL`, waits for `ACK`, opens (and later renews) the channel, and turns
/// subsequent chunks back into [`ResponseMessage`]s. Owned by the single
/// EventLoop thread (spec §5) — every method takes `&mut self` directly.
pub struct ClientChannelDriver {
    state: ClientChannelState,
    secure_channel: SecureChannel,
    recv_buffer: Vec<u8>,
    pending_chunks: Vec<crate::comms::MessageChunk>,
    last_received_sequence_number: u32,
    next_send_sequence_number: u32,
    next_request_id: u32,
    max_chunk_count: usize,
    negotiated_send_chunk_size: usize,
    negotiated_send_message_size: usize,
    endpoint_url: String,
    /// The request id of an outstanding `OpenSecureChannelRequest`, so an
    /// `OpenSecureChannelResponse` can be matched before being consumed.
    open_request_id: Option<u32>,
}

impl ClientChannelDriver {
    pub fn new(secure_channel: SecureChannel, endpoint_url: impl Into<String>) -> Self {
        ClientChannelDriver {
            state: ClientChannelState::Fresh,
            secure_channel,
            recv_buffer: Vec::new(),
            pending_chunks: Vec::new(),
            last_received_sequence_number: 0,
            next_send_sequence_number: 1,
            next_request_id: 1,
            max_chunk_count: 0,
            negotiated_send_chunk_size: 0,
            negotiated_send_message_size: 0,
            endpoint_url: endpoint_url.into(),
            open_request_id: None,
        }
    }

    pub fn state(&self) -> ClientChannelState {
        self.state
    }

    pub fn secure_channel(&self) -> &SecureChannel {
        &self.secure_channel
    }

    pub fn secure_channel_mut(&mut self) -> &mut SecureChannel {
        &mut self.secure_channel
    }

    pub fn is_open(&self) -> bool {
        self.state == ClientChannelState::Open
    }

    /// Allocates the next request id, wrapping to `1` rather than `0`.
    /// Callers use the returned value to match a sent request against the
    /// [`ClientChannelEvent`] its response later arrives as.
    pub fn next_request_id(&mut self) -> u32 {
        let id = self.next_request_id;
        self.next_request_id = if self.next_request_id == u32::MAX {
            1
        } else {
            self.next_request_id + 1
        };
        id
    }

    /// Encodes `HEL` into `out`. Must be called exactly once, before
    /// anything else.
    pub fn hello(&mut self, limits: ClientLimits, out: &mut Vec<u8>) -> Result<(), StatusCode> {
        if self.state != ClientChannelState::Fresh {
            return Err(StatusCode::BadInvalidState);
        }
        let hello = HelloMessage {
            protocol_version: PROTOCOL_VERSION,
            receive_buffer_size: limits.receive_buffer_size,
            send_buffer_size: limits.send_buffer_size,
            max_message_size: limits.max_message_size,
            max_chunk_count: limits.max_chunk_count,
            endpoint_url: self.endpoint_url.as_str().into(),
        };
        hello.encode(out).map_err(|_| StatusCode::BadEncodingError)?;
        self.state = ClientChannelState::HelSent;
        Ok(())
    }

    /// Builds and queues the `OpenSecureChannelRequest` that issues a
    /// fresh token (`request_type == Issue`, only once `ACK` has been
    /// received) or renews the current one (`Renew`, only once the
    /// channel is already `Open`). Returns the request id to match the
    /// eventual response against.
    pub fn open_secure_channel(
        &mut self,
        request_type: SecurityTokenRequestType,
        requested_lifetime: u32,
        out: &mut Vec<u8>,
    ) -> Result<u32, StatusCode> {
        match (self.state, request_type) {
            (ClientChannelState::AckReceived, SecurityTokenRequestType::Issue) => {}
            (ClientChannelState::Open, SecurityTokenRequestType::Renew) => {}
            _ => return Err(StatusCode::BadInvalidState),
        }

        if self.secure_channel.security_policy() != SecurityPolicy::None {
            self.secure_channel.create_random_nonce();
        }
        let request_id = self.next_request_id();
        let request = OpenSecureChannelRequest {
            request_header: RequestHeader::new(NodeId::null(), request_id, 0),
            client_protocol_version: PROTOCOL_VERSION,
            request_type,
            security_mode: self.secure_channel.security_mode(),
            client_nonce: self.secure_channel.local_nonce_as_byte_string(),
            requested_lifetime,
        };
        self.send_request_chunks(request_id, &RequestMessage::from(request), out)
            .map_err(|e| e.error)?;
        self.open_request_id = Some(request_id);
        if request_type == SecurityTokenRequestType::Issue {
            self.state = ClientChannelState::OpnSent;
        }
        Ok(request_id)
    }

    /// Appends freshly-received bytes and parses out as many complete raw
    /// messages/chunks as are now available. `ACK` and
    /// `OpenSecureChannelResponse` are consumed here; everything else is
    /// handed back for the session layer to match against its request id.
    pub fn receive(&mut self, bytes: &[u8], out: &mut Vec<u8>) -> Result<Vec<ClientChannelEvent>, ErrorMessage> {
        self.recv_buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        loop {
            if self.recv_buffer.len() < RAW_MESSAGE_HEADER_SIZE {
                break;
            }
            let total_len = u32::from_le_bytes([
                self.recv_buffer[4],
                self.recv_buffer[5],
                self.recv_buffer[6],
                self.recv_buffer[7],
            ]) as usize;
            if total_len < RAW_MESSAGE_HEADER_SIZE {
                return Err(ErrorMessage::new(
                    StatusCode::BadTcpMessageTypeInvalid,
                    "Message size smaller than its own header",
                ));
            }
            if self.recv_buffer.len() < total_len {
                break;
            }

            let frame: Vec<u8> = self.recv_buffer.drain(..total_len).collect();
            match peek_message_kind(&frame) {
                RawMessageKind::Acknowledge => self.handle_ack(&frame)?,
                RawMessageKind::Chunk => {
                    if let Some(event) = self.handle_chunk(&frame, out)? {
                        events.push(event);
                    }
                }
                RawMessageKind::Error => {
                    let err = ErrorMessage::decode(&mut Cursor::new(frame.as_slice()), &DecodingOptions::default())
                        .map_err(|e| ErrorMessage::new(StatusCode::BadCommunicationError, &e.to_string()))?;
                    self.state = ClientChannelState::Closing;
                    return Err(err);
                }
                RawMessageKind::Hello | RawMessageKind::Unknown => {
                    return Err(ErrorMessage::new(
                        StatusCode::BadTcpMessageTypeInvalid,
                        "Client does not expect HEL from a server",
                    ));
                }
            }
        }
        Ok(events)
    }

    fn handle_ack(&mut self, frame: &[u8]) -> Result<(), ErrorMessage> {
        if self.state != ClientChannelState::HelSent {
            return Err(ErrorMessage::new(StatusCode::BadTcpMessageTypeInvalid, "ACK received twice"));
        }
        let ack = AcknowledgeMessage::decode(&mut Cursor::new(frame), &DecodingOptions::default())
            .map_err(|e| ErrorMessage::new(StatusCode::BadCommunicationError, &e.to_string()))?;
        if ack.protocol_version > PROTOCOL_VERSION {
            return Err(ErrorMessage::new(StatusCode::BadTcpInternalError, "Unsupported protocol version"));
        }
        self.negotiated_send_chunk_size = (ack.receive_buffer_size as usize).max(MIN_CHUNK_SIZE);
        self.negotiated_send_message_size = ack.max_message_size as usize;
        self.max_chunk_count = ack.max_chunk_count as usize;
        self.state = ClientChannelState::AckReceived;
        trace!("ACK received for endpoint {}", self.endpoint_url);
        Ok(())
    }

    fn handle_chunk(&mut self, frame: &[u8], out: &mut Vec<u8>) -> Result<Option<ClientChannelEvent>, ErrorMessage> {
        if self.state == ClientChannelState::Fresh || self.state == ClientChannelState::HelSent {
            return Err(ErrorMessage::new(StatusCode::BadCommunicationError, "Chunk received before ACK"));
        }

        let decrypted = self
            .secure_channel
            .verify_and_remove_security(frame)
            .map_err(|e| ErrorMessage::new(StatusCode::BadSecurityChecksFailed, &e.to_string()))?;
        let header = decrypted
            .message_header(&self.secure_channel.decoding_options())
            .map_err(|e| ErrorMessage::new(StatusCode::BadDecodingError, &e.to_string()))?;

        if header.is_final == MessageIsFinalType::FinalError {
            self.pending_chunks.clear();
            return Ok(None);
        }

        self.pending_chunks.push(decrypted);
        if self.max_chunk_count > 0 && self.pending_chunks.len() > self.max_chunk_count {
            self.pending_chunks.clear();
            return Err(ErrorMessage::new(StatusCode::BadTcpMessageTooLarge, "Too many chunks for one message"));
        }
        if header.is_final != MessageIsFinalType::Final {
            return Ok(None);
        }

        let chunks = std::mem::take(&mut self.pending_chunks);
        let starting_sequence_number = advance_sequence_number(self.last_received_sequence_number, 1);
        let last_sequence_number = Chunker::validate_chunks(starting_sequence_number, &self.secure_channel, &chunks)
            .map_err(|e| ErrorMessage::new(StatusCode::BadSequenceNumberInvalid, &e.to_string()))?;
        self.last_received_sequence_number = last_sequence_number;

        let request_id = chunks[0]
            .chunk_info(&self.secure_channel)
            .map_err(|e| ErrorMessage::new(StatusCode::BadDecodingError, &e.to_string()))?
            .sequence_header
            .request_id;

        let message: ResponseMessage = Chunker::decode(&chunks, &self.secure_channel, None)
            .map_err(|e| ErrorMessage::new(StatusCode::BadDecodingError, &e.to_string()))?;

        match message {
            ResponseMessage::OpenSecureChannel(response) => {
                self.complete_open_secure_channel(request_id, *response)?;
                Ok(None)
            }
            other => Ok(Some(ClientChannelEvent { request_id, message: other })),
        }
    }

    fn complete_open_secure_channel(
        &mut self,
        request_id: u32,
        response: OpenSecureChannelResponse,
    ) -> Result<(), ErrorMessage> {
        if self.open_request_id != Some(request_id) {
            return Err(ErrorMessage::new(
                StatusCode::BadSequenceNumberUnknown,
                "Unexpected OpenSecureChannelResponse",
            ));
        }
        self.open_request_id = None;
        if response.response_header.service_result != StatusCode::Good {
            self.state = ClientChannelState::Closing;
            return Err(ErrorMessage::new(
                response.response_header.service_result,
                "Server rejected OpenSecureChannel",
            ));
        }

        self.secure_channel.set_secure_channel_id(response.security_token.channel_id);
        if self.secure_channel.security_policy() != SecurityPolicy::None {
            self.secure_channel
                .set_remote_nonce_from_byte_string(&response.server_nonce)
                .map_err(|_| ErrorMessage::new(StatusCode::BadNonceInvalid, "Invalid server nonce"))?;
            self.secure_channel.derive_keys();
        }
        self.secure_channel.set_security_token(response.security_token);
        self.state = ClientChannelState::Open;
        trace!("SecureChannel open for endpoint {}", self.endpoint_url);
        Ok(())
    }

    /// Encodes and queues `request` as chunks under `request_id` (obtained
    /// from [`Self::next_request_id`]), for ordinary service calls issued
    /// above this layer.
    pub fn send_request(&mut self, request_id: u32, request: &RequestMessage, out: &mut Vec<u8>) -> Result<(), StatusCode> {
        self.send_request_chunks(request_id, request, out).map_err(|e| e.error)
    }

    fn send_request_chunks(&mut self, request_id: u32, request: &RequestMessage, out: &mut Vec<u8>) -> Result<(), ErrorMessage> {
        let starting_sequence_number = self.next_send_sequence_number;
        let chunks = Chunker::encode(
            starting_sequence_number,
            request_id,
            self.negotiated_send_message_size,
            self.negotiated_send_chunk_size,
            &self.secure_channel,
            request,
        )
        .map_err(|e| ErrorMessage::new(StatusCode::BadEncodingError, &e.to_string()))?;
        self.next_send_sequence_number = advance_sequence_number(starting_sequence_number, chunks.len() as u32 - 1);
        for chunk in &chunks {
            chunk
                .encode(out)
                .map_err(|e| ErrorMessage::new(StatusCode::BadEncodingError, &e.to_string()))?;
        }
        Ok(())
    }

    /// Marks the channel as closing; the caller is responsible for
    /// actually sending `CloseSecureChannelRequest` and tearing down the
    /// underlying connection.
    pub fn close(&mut self) {
        self.state = ClientChannelState::Closing;
    }
}
