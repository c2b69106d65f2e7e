// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! A message chunk is a message, or a portion of one, optionally signed and
//! encrypted, prepared for transmission over UA-TCP (spec §4.4, Part 6 §6.7).

use std::io::{Cursor, Read, Write};

use log::{error, trace};
use opcua_types::{
    encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult, Error},
    status_code::StatusCode,
};

use super::{
    message_chunk_info::ChunkInfo,
    secure_channel::SecureChannel,
    security_header::{SecurityHeader, SequenceHeader},
    tcp_types::{
        CHUNK_FINAL, CHUNK_FINAL_ERROR, CHUNK_INTERMEDIATE, CHUNK_MESSAGE,
        CLOSE_SECURE_CHANNEL_MESSAGE, MIN_CHUNK_SIZE, OPEN_SECURE_CHANNEL_MESSAGE,
    },
};

/// Size of a chunk header: 3-byte type + 1-byte final flag + 4-byte size + 4-byte channel id.
pub const MESSAGE_CHUNK_HEADER_SIZE: usize = 3 + 1 + 4 + 4;
/// Byte offset of the message size field within a chunk header.
pub const MESSAGE_SIZE_OFFSET: usize = 3 + 1;

/// Which kind of message a chunk carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageChunkType {
    Message,
    OpenSecureChannel,
    CloseSecureChannel,
}

impl MessageChunkType {
    pub fn is_open_secure_channel(&self) -> bool {
        *self == MessageChunkType::OpenSecureChannel
    }
}

/// Whether this chunk is the last one making up its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageIsFinalType {
    Intermediate,
    Final,
    FinalError,
}

/// The 12-byte fixed header present at the start of every chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageChunkHeader {
    pub message_type: MessageChunkType,
    pub is_final: MessageIsFinalType,
    pub message_size: u32,
    pub secure_channel_id: u32,
}

impl BinaryEncodable for MessageChunkHeader {
    fn byte_len(&self) -> usize {
        MESSAGE_CHUNK_HEADER_SIZE
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let message_type = match self.message_type {
            MessageChunkType::Message => CHUNK_MESSAGE,
            MessageChunkType::OpenSecureChannel => OPEN_SECURE_CHANNEL_MESSAGE,
            MessageChunkType::CloseSecureChannel => CLOSE_SECURE_CHANNEL_MESSAGE,
        };
        let is_final = match self.is_final {
            MessageIsFinalType::Intermediate => CHUNK_INTERMEDIATE,
            MessageIsFinalType::Final => CHUNK_FINAL,
            MessageIsFinalType::FinalError => CHUNK_FINAL_ERROR,
        };

        stream
            .write_all(message_type)
            .map_err(|e| Error::encoding(e.to_string()))?;
        let mut size = 3;
        size += is_final.encode(stream)?;
        size += self.message_size.encode(stream)?;
        size += self.secure_channel_id.encode(stream)?;
        Ok(size)
    }
}

impl BinaryDecodable for MessageChunkHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, opts: &DecodingOptions) -> EncodingResult<Self> {
        let mut message_type_code = [0u8; 3];
        stream
            .read_exact(&mut message_type_code)
            .map_err(|e| Error::decoding(e.to_string()))?;
        let message_type = match &message_type_code as &[u8] {
            CHUNK_MESSAGE => MessageChunkType::Message,
            OPEN_SECURE_CHANNEL_MESSAGE => MessageChunkType::OpenSecureChannel,
            CLOSE_SECURE_CHANNEL_MESSAGE => MessageChunkType::CloseSecureChannel,
            r => return Err(Error::decoding(format!("Invalid message chunk type: {r:?}"))),
        };

        let chunk_type_code = u8::decode(stream, opts)?;
        let is_final = match chunk_type_code {
            CHUNK_FINAL => MessageIsFinalType::Final,
            CHUNK_INTERMEDIATE => MessageIsFinalType::Intermediate,
            CHUNK_FINAL_ERROR => MessageIsFinalType::FinalError,
            r => return Err(Error::decoding(format!("Invalid message final type: {r}"))),
        };

        let message_size = u32::decode(stream, opts)?;
        let secure_channel_id = u32::decode(stream, opts)?;

        Ok(MessageChunkHeader {
            message_type,
            is_final,
            message_size,
            secure_channel_id,
        })
    }
}

/// A chunk: header, security header, sequence header, body, padding and
/// signature, all flattened into one buffer. Reassembling a message requires
/// every chunk in sequence.
#[derive(Debug)]
pub struct MessageChunk {
    pub data: Vec<u8>,
}

impl BinaryEncodable for MessageChunk {
    fn byte_len(&self) -> usize {
        self.data.len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        stream
            .write_all(&self.data)
            .map_err(|e| Error::encoding(format!("Writing message chunk to stream: {e}")))?;
        Ok(self.data.len())
    }
}

impl BinaryDecodable for MessageChunk {
    fn decode<S: Read + ?Sized>(
        in_stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let chunk_header = MessageChunkHeader::decode(in_stream, decoding_options).map_err(|e| {
            Error::new(
                StatusCode::BadCommunicationError,
                format!("Cannot decode chunk header: {e}"),
            )
        })?;

        let message_size = chunk_header.message_size as usize;
        if decoding_options.max_message_size > 0 && message_size > decoding_options.max_message_size
        {
            return Err(Error::new(
                StatusCode::BadTcpMessageTooLarge,
                format!(
                    "Message size {} exceeds maximum message size {}",
                    message_size, decoding_options.max_message_size
                ),
            ));
        }

        let data = vec![0u8; message_size];
        let mut stream = Cursor::new(data);
        let chunk_header_size = chunk_header.byte_len();
        chunk_header.encode(&mut stream)?;

        let mut data = stream.into_inner();
        in_stream
            .read_exact(&mut data[chunk_header_size..])
            .map_err(|e| Error::decoding(e.to_string()))?;

        Ok(MessageChunk { data })
    }
}

/// Returned when the configured chunk size is below `MIN_CHUNK_SIZE`.
#[derive(Debug)]
pub struct MessageChunkTooSmall;

impl MessageChunk {
    pub fn new(
        sequence_number: u32,
        request_id: u32,
        message_type: MessageChunkType,
        is_final: MessageIsFinalType,
        secure_channel: &SecureChannel,
        data: &[u8],
    ) -> EncodingResult<MessageChunk> {
        let security_header = secure_channel.make_security_header(message_type);
        let sequence_header = SequenceHeader {
            sequence_number,
            request_id,
        };

        let mut message_size = MESSAGE_CHUNK_HEADER_SIZE;
        message_size += security_header.byte_len();
        message_size += sequence_header.byte_len();
        message_size += data.len();

        trace!(
            "Creating a chunk with a size of {}, data excluding padding & signature",
            message_size
        );
        let secure_channel_id = secure_channel.secure_channel_id();
        let chunk_header = MessageChunkHeader {
            message_type,
            is_final,
            message_size: message_size as u32,
            secure_channel_id,
        };

        let mut buf = vec![0u8; message_size];
        let mut stream = Cursor::new(&mut buf as &mut [u8]);
        chunk_header.encode(&mut stream)?;
        security_header.encode(&mut stream)?;
        sequence_header.encode(&mut stream)?;
        stream
            .write_all(data)
            .map_err(|e| Error::encoding(e.to_string()))?;

        Ok(MessageChunk { data: buf })
    }

    /// The largest body that fits within `max_chunk_size`, once headers,
    /// signature and minimum padding for `message_type` are accounted for.
    pub fn body_size_from_message_size(
        message_type: MessageChunkType,
        secure_channel: &SecureChannel,
        max_chunk_size: usize,
    ) -> Result<usize, MessageChunkTooSmall> {
        if max_chunk_size < MIN_CHUNK_SIZE {
            error!(
                "chunk size {} is less than minimum allowed by the spec",
                max_chunk_size
            );
            return Err(MessageChunkTooSmall);
        }
        let security_header = secure_channel.make_security_header(message_type);

        let mut header_size = MESSAGE_CHUNK_HEADER_SIZE;
        header_size += security_header.byte_len();
        header_size += (SequenceHeader {
            sequence_number: 0,
            request_id: 0,
        })
        .byte_len();

        let signature_size = secure_channel.signature_size(&security_header);
        let (plain_text_block_size, minimum_padding) =
            secure_channel.get_padding_block_sizes(&security_header, signature_size, message_type);

        let aligned_max_chunk_size = if plain_text_block_size > 0 {
            max_chunk_size - (max_chunk_size % plain_text_block_size)
        } else {
            max_chunk_size
        };

        Ok(aligned_max_chunk_size - header_size - signature_size - minimum_padding)
    }

    pub fn message_header(
        &self,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<MessageChunkHeader> {
        let mut stream = Cursor::new(&self.data);
        MessageChunkHeader::decode(&mut stream, decoding_options)
    }

    pub fn is_open_secure_channel(&self, decoding_options: &DecodingOptions) -> bool {
        self.message_header(decoding_options)
            .map(|h| h.message_type.is_open_secure_channel())
            .unwrap_or(false)
    }

    pub fn chunk_info(&self, secure_channel: &SecureChannel) -> EncodingResult<ChunkInfo> {
        ChunkInfo::new(self, secure_channel)
    }

    pub(crate) fn encrypted_data_offset(
        &self,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<usize> {
        let mut stream = Cursor::new(&self.data);
        let message_header = MessageChunkHeader::decode(&mut stream, decoding_options)?;
        SecurityHeader::decode_from_stream(
            &mut stream,
            message_header.message_type.is_open_secure_channel(),
            decoding_options,
        )?;
        Ok(stream.position() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_header_round_trip() {
        let header = MessageChunkHeader {
            message_type: MessageChunkType::Message,
            is_final: MessageIsFinalType::Final,
            message_size: 128,
            secure_channel_id: 42,
        };
        let bytes = header.encode_to_vec();
        assert_eq!(bytes.len(), MESSAGE_CHUNK_HEADER_SIZE);
        let decoded =
            MessageChunkHeader::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn rejects_oversized_message() {
        let mut opts = DecodingOptions::test();
        opts.max_message_size = 64;
        let header = MessageChunkHeader {
            message_type: MessageChunkType::Message,
            is_final: MessageIsFinalType::Final,
            message_size: 4096,
            secure_channel_id: 1,
        };
        let mut bytes = header.encode_to_vec();
        bytes.extend(std::iter::repeat(0u8).take(4096 - bytes.len()));
        let result = MessageChunk::decode(&mut bytes.as_slice(), &opts);
        assert!(result.is_err());
    }
}
