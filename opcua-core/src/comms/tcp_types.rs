// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! Byte-level constants and the raw pre-SecureChannel messages (Hello,
//! Acknowledge, Error) for the UA-TCP transport framing (Part 6 §7.1, spec
//! §4.4). Unlike `OPN`/`CLO`/`MSG` chunks, these three never carry a secure
//! channel id or security header — they are exchanged before a channel
//! exists at all.

use std::io::{Cursor, Read, Write};

use opcua_types::{
    encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult, Error},
    status_code::StatusCode,
    UAString,
};

/// Smallest chunk size a conforming implementation must accept.
pub const MIN_CHUNK_SIZE: usize = 8192;

/// 3-byte message type code for a Hello message.
pub const HELLO_MESSAGE: &[u8] = b"HEL";
/// 3-byte message type code for an Acknowledge message.
pub const ACKNOWLEDGE_MESSAGE: &[u8] = b"ACK";
/// 3-byte message type code for an Error message.
pub const ERROR_MESSAGE: &[u8] = b"ERR";
/// 3-byte message type code for an OpenSecureChannel message chunk.
pub const OPEN_SECURE_CHANNEL_MESSAGE: &[u8] = b"OPN";
/// 3-byte message type code for a CloseSecureChannel message chunk.
pub const CLOSE_SECURE_CHANNEL_MESSAGE: &[u8] = b"CLO";
/// 3-byte message type code for a regular service message chunk.
pub const CHUNK_MESSAGE: &[u8] = b"MSG";

/// Chunk-is-final byte: more chunks follow.
pub const CHUNK_INTERMEDIATE: u8 = b'C';
/// Chunk-is-final byte: this is the last chunk of the message.
pub const CHUNK_FINAL: u8 = b'F';
/// Chunk-is-final byte: the sender aborted the message; the body is an error.
pub const CHUNK_FINAL_ERROR: u8 = b'A';

/// Size of the header shared by Hello/Acknowledge/Error: 3-byte type code +
/// 1-byte chunk flag (always `F`, these are never chunked) + 4-byte size.
/// No secure channel id — that field only appears once a channel exists.
pub const RAW_MESSAGE_HEADER_SIZE: usize = 3 + 1 + 4;

/// The UA-TCP protocol version this stack speaks (spec §4.4, Part 6 §7.1.2.2).
pub const PROTOCOL_VERSION: u32 = 0;

fn write_raw_message<S: Write + ?Sized>(
    stream: &mut S,
    type_code: &[u8],
    body: &[u8],
) -> EncodingResult<usize> {
    stream
        .write_all(type_code)
        .map_err(|e| Error::encoding(e.to_string()))?;
    stream
        .write_all(&[CHUNK_FINAL])
        .map_err(|e| Error::encoding(e.to_string()))?;
    let size = (RAW_MESSAGE_HEADER_SIZE + body.len()) as u32;
    size.encode(stream)?;
    stream.write_all(body).map_err(|e| Error::encoding(e.to_string()))?;
    Ok(RAW_MESSAGE_HEADER_SIZE + body.len())
}

/// Reads the 8-byte raw header, checking `expected_type` and returning the
/// body length. Does not consume the body.
fn read_raw_message_header<S: Read + ?Sized>(
    stream: &mut S,
    expected_type: &[u8],
    opts: &DecodingOptions,
) -> EncodingResult<usize> {
    let mut type_code = [0u8; 3];
    stream
        .read_exact(&mut type_code)
        .map_err(|e| Error::decoding(e.to_string()))?;
    if type_code != *expected_type {
        return Err(Error::new(
            StatusCode::BadTcpMessageTypeInvalid,
            format!("Expected message type {expected_type:?}, got {type_code:?}"),
        ));
    }
    let mut flag = [0u8; 1];
    stream
        .read_exact(&mut flag)
        .map_err(|e| Error::decoding(e.to_string()))?;
    if flag[0] != CHUNK_FINAL {
        return Err(Error::new(
            StatusCode::BadTcpMessageTypeInvalid,
            format!("Raw message chunk flag must be 'F', got {:?}", flag[0] as char),
        ));
    }
    let size = u32::decode(stream, opts)? as usize;
    if size < RAW_MESSAGE_HEADER_SIZE {
        return Err(Error::decoding(format!("Raw message size {size} is smaller than its own header")));
    }
    Ok(size - RAW_MESSAGE_HEADER_SIZE)
}

/// `HEL`: the first message a client ever sends on a new connection (spec
/// §4.4). Advertises the buffer sizes the client is willing to use and the
/// endpoint it is dialing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloMessage {
    pub protocol_version: u32,
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
    pub endpoint_url: UAString,
}

impl HelloMessage {
    /// `0` for any of `receive_buffer_size`/`send_buffer_size` is a
    /// malformed Hello (unlike `max_message_size`/`max_chunk_count`, where
    /// `0` legitimately means "unlimited").
    pub fn is_valid_buffer_sizes(&self) -> bool {
        self.receive_buffer_size >= MIN_CHUNK_SIZE as u32 && self.send_buffer_size >= MIN_CHUNK_SIZE as u32
    }
}

impl BinaryEncodable for HelloMessage {
    fn byte_len(&self) -> usize {
        RAW_MESSAGE_HEADER_SIZE + 4 * 4 + self.endpoint_url.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut body = Vec::new();
        self.protocol_version.encode(&mut body)?;
        self.receive_buffer_size.encode(&mut body)?;
        self.send_buffer_size.encode(&mut body)?;
        self.max_message_size.encode(&mut body)?;
        self.max_chunk_count.encode(&mut body)?;
        self.endpoint_url.encode(&mut body)?;
        write_raw_message(stream, HELLO_MESSAGE, &body)
    }
}

impl BinaryDecodable for HelloMessage {
    fn decode<S: Read + ?Sized>(stream: &mut S, opts: &DecodingOptions) -> EncodingResult<Self> {
        let body_len = read_raw_message_header(stream, HELLO_MESSAGE, opts)?;
        let mut body = vec![0u8; body_len];
        stream.read_exact(&mut body).map_err(|e| Error::decoding(e.to_string()))?;
        let mut body = Cursor::new(body);
        Ok(HelloMessage {
            protocol_version: u32::decode(&mut body, opts)?,
            receive_buffer_size: u32::decode(&mut body, opts)?,
            send_buffer_size: u32::decode(&mut body, opts)?,
            max_message_size: u32::decode(&mut body, opts)?,
            max_chunk_count: u32::decode(&mut body, opts)?,
            endpoint_url: UAString::decode(&mut body, opts)?,
        })
    }
}

/// `ACK`: the server's reply to `HEL`, carrying the buffer parameters
/// actually in force for the connection (each side's request, clamped by
/// the other's limit — spec §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcknowledgeMessage {
    pub protocol_version: u32,
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
}

impl AcknowledgeMessage {
    pub fn new(
        protocol_version: u32,
        receive_buffer_size: u32,
        send_buffer_size: u32,
        max_message_size: u32,
        max_chunk_count: u32,
    ) -> Self {
        AcknowledgeMessage {
            protocol_version,
            receive_buffer_size,
            send_buffer_size,
            max_message_size,
            max_chunk_count,
        }
    }
}

impl BinaryEncodable for AcknowledgeMessage {
    fn byte_len(&self) -> usize {
        RAW_MESSAGE_HEADER_SIZE + 4 * 5
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut body = Vec::new();
        self.protocol_version.encode(&mut body)?;
        self.receive_buffer_size.encode(&mut body)?;
        self.send_buffer_size.encode(&mut body)?;
        self.max_message_size.encode(&mut body)?;
        self.max_chunk_count.encode(&mut body)?;
        write_raw_message(stream, ACKNOWLEDGE_MESSAGE, &body)
    }
}

impl BinaryDecodable for AcknowledgeMessage {
    fn decode<S: Read + ?Sized>(stream: &mut S, opts: &DecodingOptions) -> EncodingResult<Self> {
        let body_len = read_raw_message_header(stream, ACKNOWLEDGE_MESSAGE, opts)?;
        let mut body = vec![0u8; body_len];
        stream.read_exact(&mut body).map_err(|e| Error::decoding(e.to_string()))?;
        let mut body = Cursor::new(body);
        Ok(AcknowledgeMessage {
            protocol_version: u32::decode(&mut body, opts)?,
            receive_buffer_size: u32::decode(&mut body, opts)?,
            send_buffer_size: u32::decode(&mut body, opts)?,
            max_message_size: u32::decode(&mut body, opts)?,
            max_chunk_count: u32::decode(&mut body, opts)?,
        })
    }
}

/// `ERR`: sent in place of `ACK`/`OPN` when the handshake can't continue,
/// immediately followed by the sender closing the connection (spec §4.4,
/// §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub error: StatusCode,
    pub reason: UAString,
}

impl ErrorMessage {
    pub fn new(error: StatusCode, reason: &str) -> Self {
        ErrorMessage {
            error,
            reason: UAString::from(reason),
        }
    }
}

impl BinaryEncodable for ErrorMessage {
    fn byte_len(&self) -> usize {
        RAW_MESSAGE_HEADER_SIZE + 4 + self.reason.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut body = Vec::new();
        self.error.encode(&mut body)?;
        self.reason.encode(&mut body)?;
        write_raw_message(stream, ERROR_MESSAGE, &body)
    }
}

impl BinaryDecodable for ErrorMessage {
    fn decode<S: Read + ?Sized>(stream: &mut S, opts: &DecodingOptions) -> EncodingResult<Self> {
        let body_len = read_raw_message_header(stream, ERROR_MESSAGE, opts)?;
        let mut body = vec![0u8; body_len];
        stream.read_exact(&mut body).map_err(|e| Error::decoding(e.to_string()))?;
        let mut body = Cursor::new(body);
        Ok(ErrorMessage {
            error: StatusCode::decode(&mut body, opts)?,
            reason: UAString::decode(&mut body, opts)?,
        })
    }
}

/// Peeks the 3-byte type code at the front of `bytes` without consuming
/// anything, so a caller can decide which of [`HelloMessage`],
/// [`AcknowledgeMessage`], [`ErrorMessage`] or
/// [`crate::comms::MessageChunk`] to decode next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawMessageKind {
    Hello,
    Acknowledge,
    Error,
    Chunk,
    Unknown,
}

pub fn peek_message_kind(bytes: &[u8]) -> RawMessageKind {
    match bytes.get(..3) {
        Some(HELLO_MESSAGE) => RawMessageKind::Hello,
        Some(ACKNOWLEDGE_MESSAGE) => RawMessageKind::Acknowledge,
        Some(ERROR_MESSAGE) => RawMessageKind::Error,
        Some(OPEN_SECURE_CHANNEL_MESSAGE) | Some(CLOSE_SECURE_CHANNEL_MESSAGE) | Some(CHUNK_MESSAGE) => {
            RawMessageKind::Chunk
        }
        _ => RawMessageKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_round_trips() {
        let hello = HelloMessage {
            protocol_version: 0,
            receive_buffer_size: 65536,
            send_buffer_size: 65536,
            max_message_size: 0,
            max_chunk_count: 0,
            endpoint_url: UAString::from("opc.tcp://localhost:4840/"),
        };
        let bytes = hello.encode_to_vec();
        assert_eq!(peek_message_kind(&bytes), RawMessageKind::Hello);
        let decoded = HelloMessage::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, hello);
    }

    #[test]
    fn hello_rejects_undersized_buffers() {
        let hello = HelloMessage {
            protocol_version: 0,
            receive_buffer_size: 100,
            send_buffer_size: 65536,
            max_message_size: 0,
            max_chunk_count: 0,
            endpoint_url: UAString::from("opc.tcp://localhost:4840/"),
        };
        assert!(!hello.is_valid_buffer_sizes());
    }

    #[test]
    fn acknowledge_round_trips() {
        let ack = AcknowledgeMessage::new(0, 65536, 65536, 16_777_216, 5000);
        let bytes = ack.encode_to_vec();
        let decoded = AcknowledgeMessage::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, ack);
    }

    #[test]
    fn error_round_trips() {
        let err = ErrorMessage::new(StatusCode::BadTcpEndpointUrlInvalid, "no such endpoint");
        let bytes = err.encode_to_vec();
        let decoded = ErrorMessage::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, err);
    }

    #[test]
    fn wrong_type_code_is_rejected() {
        let ack = AcknowledgeMessage::new(0, 65536, 65536, 0, 0);
        let bytes = ack.encode_to_vec();
        assert!(HelloMessage::decode(&mut bytes.as_slice(), &DecodingOptions::test()).is_err());
    }
}
