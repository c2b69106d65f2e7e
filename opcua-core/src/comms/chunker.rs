// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! Turns messages into chunks and chunks back into messages (spec §4.4).

use std::io::{Cursor, Read, Write};

use log::{debug, error, trace};
use opcua_crypto::SecurityPolicy;
use opcua_types::{
    encoding::{BinaryDecodable, BinaryEncodable, Error},
    node_id::NodeId,
    object_id::ObjectId,
    status_code::StatusCode,
};

use crate::{
    comms::{
        message_chunk::{MessageChunk, MessageIsFinalType},
        secure_channel::SecureChannel,
    },
    messages::Message,
};

/// `Read` adapter over a sequence of message chunks: reads to the end of
/// each chunk's body, then steps into the next one. Avoids copying every
/// chunk's body into one contiguous buffer before decoding.
struct ReceiveStream<'a, T> {
    buffer: &'a [u8],
    channel: &'a SecureChannel,
    items: T,
    num_items: usize,
    pos: usize,
    index: usize,
}

impl<'a, T: Iterator<Item = &'a MessageChunk>> ReceiveStream<'a, T> {
    fn new(channel: &'a SecureChannel, mut items: T, num_items: usize) -> Result<Self, Error> {
        let Some(chunk) = items.next() else {
            return Err(Error::new(
                StatusCode::BadUnexpectedError,
                "Stream contained no chunks",
            ));
        };

        let chunk_info = chunk.chunk_info(channel)?;
        let expected_is_final = if num_items == 1 {
            MessageIsFinalType::Final
        } else {
            MessageIsFinalType::Intermediate
        };
        if chunk_info.message_header.is_final != expected_is_final {
            return Err(Error::new(
                StatusCode::BadDecodingError,
                "Last chunk not marked as final",
            ));
        }

        let body_start = chunk_info.body_offset;
        let body_end = body_start + chunk_info.body_length;
        Ok(Self {
            buffer: &chunk.data[body_start..body_end],
            channel,
            items,
            pos: 0,
            num_items,
            index: 0,
        })
    }
}

impl<'a, T: Iterator<Item = &'a MessageChunk>> Read for ReceiveStream<'a, T> {
    fn read(&mut self, mut buf: &mut [u8]) -> std::io::Result<usize> {
        if self.buffer.len() == self.pos {
            let Some(chunk) = self.items.next() else {
                return Ok(0);
            };
            self.index += 1;
            let chunk_info = chunk.chunk_info(self.channel)?;
            let expected_is_final = if self.index == self.num_items - 1 {
                MessageIsFinalType::Final
            } else {
                MessageIsFinalType::Intermediate
            };
            if chunk_info.message_header.is_final != expected_is_final {
                return Err(StatusCode::BadDecodingError.into());
            }

            let body_start = chunk_info.body_offset;
            let body_end = body_start + chunk_info.body_length;
            self.buffer = &chunk.data[body_start..body_end];
            self.pos = 0;
        }
        let written = buf.write(&self.buffer[self.pos..])?;
        self.pos += written;
        Ok(written)
    }
}

/// Turns messages into chunks for sending, and chunks back into messages
/// on receipt.
pub struct Chunker;

impl Chunker {
    /// Checks that `chunks` carry the expected secure channel id and a
    /// strictly incrementing sequence of sequence/request ids, starting at
    /// or after `starting_sequence_number`. Returns the last sequence
    /// number on success.
    pub fn validate_chunks(
        starting_sequence_number: u32,
        secure_channel: &SecureChannel,
        chunks: &[MessageChunk],
    ) -> Result<u32, Error> {
        let first_sequence_number = {
            let chunk_info = chunks[0].chunk_info(secure_channel)?;
            chunk_info.sequence_header.sequence_number
        };
        trace!("Received chunk with sequence number {first_sequence_number}");
        if first_sequence_number < starting_sequence_number {
            return Err(Error::new(
                StatusCode::BadSequenceNumberInvalid,
                format!(
                    "First sequence number of {first_sequence_number} is less than last value {starting_sequence_number}"
                ),
            ));
        }

        let secure_channel_id = secure_channel.secure_channel_id();
        let mut expected_request_id: u32 = 0;
        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_info = chunk.chunk_info(secure_channel)?;

            if secure_channel_id != 0
                && chunk_info.message_header.secure_channel_id != secure_channel_id
            {
                return Err(Error::new(
                    StatusCode::BadSecureChannelIdInvalid,
                    format!(
                        "Secure channel id {} does not match expected id {secure_channel_id}",
                        chunk_info.message_header.secure_channel_id
                    ),
                ));
            }

            let sequence_number = chunk_info.sequence_header.sequence_number;
            let expected_sequence_number = first_sequence_number + i as u32;
            if sequence_number != expected_sequence_number {
                return Err(Error::new(
                    StatusCode::BadSequenceNumberInvalid,
                    format!(
                        "Chunk sequence number of {sequence_number} is not the expected value of {expected_sequence_number}, idx {i}"
                    ),
                ));
            }

            if i == 0 {
                expected_request_id = chunk_info.sequence_header.request_id;
            } else if chunk_info.sequence_header.request_id != expected_request_id {
                return Err(Error::new(
                    StatusCode::BadSequenceNumberInvalid,
                    format!(
                        "Chunk sequence number of {sequence_number} has a request id {} which is not the expected value of {expected_request_id}, idx {i}",
                        chunk_info.sequence_header.request_id
                    ),
                ));
            }
        }
        Ok(first_sequence_number + chunks.len() as u32 - 1)
    }

    /// Encodes `message` using the given sequence number and splits the
    /// result across as many chunks as `max_chunk_size` requires. A zero
    /// `max_message_size`/`max_chunk_size` disables the respective limit.
    pub fn encode(
        sequence_number: u32,
        request_id: u32,
        max_message_size: usize,
        max_chunk_size: usize,
        secure_channel: &SecureChannel,
        message: &impl Message,
    ) -> Result<Vec<MessageChunk>, Error> {
        let security_policy = secure_channel.security_policy();
        if security_policy == SecurityPolicy::Unknown {
            panic!("Security policy cannot be unknown");
        }

        let mut message_size = message.byte_len();
        if max_message_size > 0 && message_size > max_message_size {
            error!("Max message size is {max_message_size} and message {message_size} exceeds that");
            return Err(Error::new(
                if secure_channel.is_client_role() {
                    StatusCode::BadRequestTooLarge
                } else {
                    StatusCode::BadResponseTooLarge
                },
                format!("Max message size is {max_message_size} and message {message_size} exceeds that"),
            ));
        }

        let node_id: NodeId = message.type_id();
        message_size += node_id.byte_len();

        let message_type = message.message_type();
        let mut stream = Cursor::new(vec![0u8; message_size]);

        trace!("Encoding node id {node_id:?}");
        node_id.encode(&mut stream)?;
        message.encode(&mut stream)?;
        let data = stream.into_inner();

        if max_chunk_size > 0 {
            let max_body_per_chunk =
                MessageChunk::body_size_from_message_size(message_type, secure_channel, max_chunk_size)
                    .map_err(|_| {
                        Error::new(
                            StatusCode::BadTcpInternalError,
                            format!("body_size_from_message_size error for max_chunk_size = {max_chunk_size}"),
                        )
                    })?;

            let data_chunks = data.chunks(max_body_per_chunk);
            let data_chunks_len = data_chunks.len();
            trace!("Split message into {data_chunks_len} chunks of {max_body_per_chunk} length max");
            let mut chunks = Vec::with_capacity(data_chunks_len);
            for (i, data_chunk) in data_chunks.enumerate() {
                let is_final = if i == data_chunks_len - 1 {
                    MessageIsFinalType::Final
                } else {
                    MessageIsFinalType::Intermediate
                };
                chunks.push(MessageChunk::new(
                    sequence_number + i as u32,
                    request_id,
                    message_type,
                    is_final,
                    secure_channel,
                    data_chunk,
                )?);
            }
            Ok(chunks)
        } else {
            Ok(vec![MessageChunk::new(
                sequence_number,
                request_id,
                message_type,
                MessageIsFinalType::Final,
                secure_channel,
                &data,
            )?])
        }
    }

    /// Decodes a series of chunks back into a message of type `T`.
    /// `expected_node_id`, when given, must match the type id encoded in
    /// the chunk stream.
    pub fn decode<T: Message>(
        chunks: &[MessageChunk],
        secure_channel: &SecureChannel,
        expected_node_id: Option<NodeId>,
    ) -> Result<T, Error> {
        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_info = chunk.chunk_info(secure_channel)?;
            let expected_is_final = if i == chunks.len() - 1 {
                MessageIsFinalType::Final
            } else {
                MessageIsFinalType::Intermediate
            };
            if chunk_info.message_header.is_final != expected_is_final {
                return Err(Error::decoding("Last message in sequence is not marked as final"));
            }
        }

        let mut stream = ReceiveStream::new(secure_channel, chunks.iter(), chunks.len())?;
        let decoding_options = secure_channel.decoding_options();

        // The extension object prefix is just the node id — the spec doesn't
        // elaborate on this, it's easy to end up a byte off without testing it.
        let node_id = NodeId::decode(&mut stream, &decoding_options)?;
        let object_id = Self::object_id_from_node_id(node_id, expected_node_id)?;

        match T::decode_by_object_id(&mut stream, object_id, &decoding_options) {
            Ok(decoded_message) => Ok(decoded_message),
            Err(err) => {
                debug!("Cannot decode message {object_id:?}, err = {err:?}");
                Err(err)
            }
        }
    }

    fn object_id_from_node_id(
        node_id: NodeId,
        expected_node_id: Option<NodeId>,
    ) -> Result<ObjectId, Error> {
        if let Some(id) = expected_node_id {
            if node_id != id {
                return Err(Error::decoding(format!(
                    "The message ID {node_id} is not the expected value {id}"
                )));
            }
        }
        node_id
            .as_object_id()
            .map_err(|_| Error::decoding(format!("The message id {node_id} is not an object id")))
    }
}

#[cfg(test)]
mod tests {
    use opcua_types::service_types::{CloseSecureChannelRequest, RequestHeader};

    use super::*;
    use crate::messages::RequestMessage;

    #[test]
    fn round_trips_single_chunk_message() {
        let secure_channel = SecureChannel::new_no_certificate_store();
        let request: RequestMessage = CloseSecureChannelRequest {
            request_header: RequestHeader::default(),
        }
        .into();

        let chunks = Chunker::encode(1, 1, 0, 0, &secure_channel, &request).unwrap();
        assert_eq!(chunks.len(), 1);

        Chunker::validate_chunks(1, &secure_channel, &chunks).unwrap();

        let decoded: RequestMessage =
            Chunker::decode(&chunks, &secure_channel, Some(request.type_id())).unwrap();
        assert_eq!(decoded, request);
    }
}
