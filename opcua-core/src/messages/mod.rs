// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! [`Message`]: anything that can ride inside a chunk's extension-object
//! body — every request and response the session/subscription services
//! exchange (spec §4.5, §4.6).

use std::io::Read;

use opcua_types::{
    encoding::{BinaryEncodable, DecodingOptions, EncodingResult},
    node_id::NodeId,
    object_id::ObjectId,
};

use crate::comms::message_chunk::MessageChunkType;

mod request;
mod response;

pub use request::RequestMessage;
pub use response::ResponseMessage;

/// Tags a message with the chunk type it travels in: only OPN/CLO get
/// their own message type, everything else is a plain `Message` chunk.
pub trait MessageType {
    fn message_type(&self) -> MessageChunkType;
}

/// Anything exchanged as a chunk body: a request or a response.
pub trait Message: BinaryEncodable + MessageType {
    /// The client-assigned handle correlating a request with its response.
    fn request_handle(&self) -> u32;

    /// Numeric id naming this message's `DefaultBinary` encoding, written
    /// as an extension object type id just before the message body.
    fn type_id(&self) -> NodeId;

    /// Decode the body following a `NodeId` that resolved to `object_id`.
    fn decode_by_object_id<S: Read + ?Sized>(
        stream: &mut S,
        object_id: ObjectId,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self>
    where
        Self: Sized;
}
