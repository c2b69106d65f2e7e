// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! UA-TCP transport: chunking, security and the handshake messages
//! exchanged before a `SecureChannel` carries service traffic (spec §4.4).

pub mod channel_driver;
pub mod chunker;
pub mod message_chunk;
pub mod message_chunk_info;
pub mod secure_channel;
pub mod security_header;
pub mod tcp_types;
pub mod url;

pub use channel_driver::{
    ChannelDriver, ChannelEvent, ChannelState, ClientChannelDriver, ClientChannelEvent,
    ClientChannelState, ClientLimits,
};
pub use chunker::Chunker;
pub use message_chunk::{MessageChunk, MessageChunkHeader, MessageChunkType, MessageIsFinalType};
pub use message_chunk_info::ChunkInfo;
pub use secure_channel::{Role, SecureChannel};
pub use security_header::{AsymmetricSecurityHeader, SecurityHeader, SymmetricSecurityHeader};
pub use tcp_types::{AcknowledgeMessage, ErrorMessage, HelloMessage, RawMessageKind};
