// OPC UA PubSub codec — SPDX-License-Identifier: MPL-2.0

//! `NetworkMessage`: the self-contained publisher-to-subscriber datagram a
//! PubSub transport carries (spec §4.8, GLOSSARY). Encoding/decoding here
//! is transport-independent — the bytes this module produces are handed to
//! whatever UDP/Ethernet/TSN transport is configured (out of scope, spec
//! §1), and the bytes it consumes came from there unmodified.

use std::io::{Read, Write};

use bitflags::bitflags;
use log::warn;
use opcua_types::{
    byte_string::ByteString,
    date_time::DateTime,
    encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult, Error},
    guid::Guid,
};

use crate::{dataset_message::DataSetMessage, metadata::DataSetMetaData};

bitflags! {
    /// Which optional header sections follow the fixed version byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NetworkMessageFlags: u8 {
        const PUBLISHER_ID = 0x01;
        const GROUP_HEADER = 0x02;
        const PAYLOAD_HEADER = 0x04;
        const EXTENDED_HEADER = 0x08;
        const SECURITY = 0x10;
    }
}

/// Writer-group identity and ordering counters (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupHeader {
    pub writer_group_id: u16,
    /// Bumped whenever the writer group's configuration changes; a
    /// subscriber uses this to detect it needs fresh `DataSetMetaData`.
    pub group_version: u32,
    /// Wraps independently of `sequence_number`; detects datagram loss at
    /// the network-message granularity rather than per-DataSet.
    pub network_message_number: u16,
    pub sequence_number: u16,
}

impl GroupHeader {
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        Ok(self.writer_group_id.encode(stream)?
            + self.group_version.encode(stream)?
            + self.network_message_number.encode(stream)?
            + self.sequence_number.encode(stream)?)
    }

    fn decode<S: Read + ?Sized>(stream: &mut S, opts: &DecodingOptions) -> EncodingResult<Self> {
        Ok(GroupHeader {
            writer_group_id: u16::decode(stream, opts)?,
            group_version: u32::decode(stream, opts)?,
            network_message_number: u16::decode(stream, opts)?,
            sequence_number: u16::decode(stream, opts)?,
        })
    }
}

/// Which `DataSetWriter` produced each entry of the payload, in order
/// (spec §4.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadHeader {
    pub dataset_writer_ids: Vec<u16>,
}

impl PayloadHeader {
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = (self.dataset_writer_ids.len() as u8).encode(stream)?;
        for id in &self.dataset_writer_ids {
            size += id.encode(stream)?;
        }
        Ok(size)
    }

    fn decode<S: Read + ?Sized>(stream: &mut S, opts: &DecodingOptions) -> EncodingResult<Self> {
        let count = u8::decode(stream, opts)? as usize;
        let mut dataset_writer_ids = Vec::with_capacity(count.min(opts.max_array_length));
        for _ in 0..count {
            dataset_writer_ids.push(u16::decode(stream, opts)?);
        }
        Ok(PayloadHeader { dataset_writer_ids })
    }
}

/// Symmetric-security framing for the message, mirroring `SecureChannel`'s
/// own token/nonce scheme (spec §4.8: "Symmetric security mirrors
/// SecureChannel symmetric crypto"). [`crate::security`] uses these fields
/// to sign/encrypt and verify/decrypt the payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityHeader {
    pub security_token_id: u32,
    pub nonce: ByteString,
    /// Set once the message is known to be encrypted as well as signed.
    pub encrypted: bool,
}

impl SecurityHeader {
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        Ok(self.security_token_id.encode(stream)?
            + self.encrypted.encode(stream)?
            + self.nonce.encode(stream)?)
    }

    fn decode<S: Read + ?Sized>(stream: &mut S, opts: &DecodingOptions) -> EncodingResult<Self> {
        Ok(SecurityHeader {
            security_token_id: u32::decode(stream, opts)?,
            encrypted: bool::decode(stream, opts)?,
            nonce: ByteString::decode(stream, opts)?,
        })
    }
}

/// Dataset-class identity and fine-grained timing, present only when the
/// writer group's configuration asks for it (spec §4.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedNetworkMessageHeader {
    pub dataset_class_id: Guid,
    pub timestamp: Option<DateTime>,
    pub picoseconds: Option<u16>,
}

impl ExtendedNetworkMessageHeader {
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = self.dataset_class_id.encode(stream)?;
        size += self.timestamp.is_some().encode(stream)?;
        if let Some(ts) = &self.timestamp {
            size += ts.encode(stream)?;
        }
        size += self.picoseconds.is_some().encode(stream)?;
        if let Some(ps) = self.picoseconds {
            size += ps.encode(stream)?;
        }
        Ok(size)
    }

    fn decode<S: Read + ?Sized>(stream: &mut S, opts: &DecodingOptions) -> EncodingResult<Self> {
        let dataset_class_id = Guid::decode(stream, opts)?;
        let timestamp = bool::decode(stream, opts)?
            .then(|| DateTime::decode(stream, opts))
            .transpose()?;
        let picoseconds = bool::decode(stream, opts)?
            .then(|| u16::decode(stream, opts))
            .transpose()?;
        Ok(ExtendedNetworkMessageHeader { dataset_class_id, timestamp, picoseconds })
    }
}

/// UADP protocol version this codec speaks.
pub const NETWORK_MESSAGE_VERSION: u8 = 1;

/// A complete publisher-to-subscriber datagram: optional headers plus one
/// or more [`DataSetMessage`]s (spec §4.8).
#[derive(Debug, Clone)]
pub struct NetworkMessage {
    pub version: u8,
    /// `None` when [`NetworkMessageFlags::PUBLISHER_ID`] is not set.
    pub publisher_id: Option<u16>,
    pub group_header: Option<GroupHeader>,
    pub payload_header: Option<PayloadHeader>,
    pub extended_header: Option<ExtendedNetworkMessageHeader>,
    pub security_header: Option<SecurityHeader>,
    pub messages: Vec<DataSetMessage>,
}

impl NetworkMessage {
    pub fn new(messages: Vec<DataSetMessage>) -> Self {
        NetworkMessage {
            version: NETWORK_MESSAGE_VERSION,
            publisher_id: None,
            group_header: None,
            payload_header: None,
            extended_header: None,
            security_header: None,
            messages,
        }
    }

    fn flags(&self) -> NetworkMessageFlags {
        let mut flags = NetworkMessageFlags::empty();
        if self.publisher_id.is_some() {
            flags |= NetworkMessageFlags::PUBLISHER_ID;
        }
        if self.group_header.is_some() {
            flags |= NetworkMessageFlags::GROUP_HEADER;
        }
        if self.payload_header.is_some() {
            flags |= NetworkMessageFlags::PAYLOAD_HEADER;
        }
        if self.extended_header.is_some() {
            flags |= NetworkMessageFlags::EXTENDED_HEADER;
        }
        if self.security_header.is_some() {
            flags |= NetworkMessageFlags::SECURITY;
        }
        flags
    }

    /// Encodes every `DataSetMessage` with `Variant` field encoding; any
    /// message using `Raw` encoding must go through
    /// [`Self::encode_with_metadata`] instead.
    pub fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        self.encode_with_metadata(stream, &[])
    }

    /// `dataset_metadata[i]` is consulted only for messages at index `i`
    /// using `DataSetFieldEncoding::Raw`; pass `&[]` if none do.
    pub fn encode_with_metadata<S: Write + ?Sized>(
        &self,
        stream: &mut S,
        dataset_metadata: &[Option<&DataSetMetaData>],
    ) -> EncodingResult<usize> {
        let mut size = self.version.encode(stream)?;
        size += self.flags().bits().encode(stream)?;
        if let Some(id) = self.publisher_id {
            size += id.encode(stream)?;
        }
        if let Some(group_header) = &self.group_header {
            size += group_header.encode(stream)?;
        }
        if let Some(payload_header) = &self.payload_header {
            size += payload_header.encode(stream)?;
        }
        if let Some(extended_header) = &self.extended_header {
            size += extended_header.encode(stream)?;
        }
        if let Some(security_header) = &self.security_header {
            size += security_header.encode(stream)?;
        }
        size += (self.messages.len() as u8).encode(stream)?;
        for (index, message) in self.messages.iter().enumerate() {
            let metadata = dataset_metadata.get(index).copied().flatten();
            size += message.encode_with_metadata(stream, metadata)?;
        }
        Ok(size)
    }

    pub fn decode<S: Read + ?Sized>(stream: &mut S, opts: &DecodingOptions) -> EncodingResult<Self> {
        Self::decode_with_metadata(stream, opts, &[])
    }

    pub fn decode_with_metadata<S: Read + ?Sized>(
        stream: &mut S,
        opts: &DecodingOptions,
        dataset_metadata: &[Option<&DataSetMetaData>],
    ) -> EncodingResult<Self> {
        let version = u8::decode(stream, opts)?;
        if version != NETWORK_MESSAGE_VERSION {
            warn!("rejecting NetworkMessage with unsupported version {version}");
            return Err(Error::decoding(format!("unsupported NetworkMessage version {version}")));
        }
        let flags = NetworkMessageFlags::from_bits_truncate(u8::decode(stream, opts)?);
        let publisher_id = flags
            .contains(NetworkMessageFlags::PUBLISHER_ID)
            .then(|| u16::decode(stream, opts))
            .transpose()?;
        let group_header = flags
            .contains(NetworkMessageFlags::GROUP_HEADER)
            .then(|| GroupHeader::decode(stream, opts))
            .transpose()?;
        let payload_header = flags
            .contains(NetworkMessageFlags::PAYLOAD_HEADER)
            .then(|| PayloadHeader::decode(stream, opts))
            .transpose()?;
        let extended_header = flags
            .contains(NetworkMessageFlags::EXTENDED_HEADER)
            .then(|| ExtendedNetworkMessageHeader::decode(stream, opts))
            .transpose()?;
        let security_header = flags
            .contains(NetworkMessageFlags::SECURITY)
            .then(|| SecurityHeader::decode(stream, opts))
            .transpose()?;

        let message_count = u8::decode(stream, opts)? as usize;
        let mut messages = Vec::with_capacity(message_count);
        for index in 0..message_count {
            let metadata = dataset_metadata.get(index).copied().flatten();
            messages.push(DataSetMessage::decode_with_metadata(stream, opts, metadata)?);
        }

        Ok(NetworkMessage {
            version,
            publisher_id,
            group_header,
            payload_header,
            extended_header,
            security_header,
            messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset_message::DataSetMessage;
    use opcua_types::variant::Variant;

    #[test]
    fn round_trips_with_every_optional_header() {
        let message = NetworkMessage {
            publisher_id: Some(7),
            group_header: Some(GroupHeader {
                writer_group_id: 1,
                group_version: 100,
                network_message_number: 0,
                sequence_number: 42,
            }),
            payload_header: Some(PayloadHeader { dataset_writer_ids: vec![1, 2] }),
            extended_header: Some(ExtendedNetworkMessageHeader {
                dataset_class_id: Guid::new(),
                timestamp: Some(DateTime::now()),
                picoseconds: None,
            }),
            security_header: None,
            ..NetworkMessage::new(vec![
                DataSetMessage::key_frame(vec![Variant::UInt32(1)]),
                DataSetMessage::key_frame(vec![Variant::Boolean(true)]),
            ])
        };
        let mut buf = Vec::new();
        message.encode(&mut buf).unwrap();
        let decoded = NetworkMessage::decode(&mut buf.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded.publisher_id, Some(7));
        assert_eq!(decoded.group_header.unwrap().sequence_number, 42);
        assert_eq!(decoded.payload_header.unwrap().dataset_writer_ids, vec![1, 2]);
        assert_eq!(decoded.messages.len(), 2);
    }

    #[test]
    fn rejects_unknown_version() {
        let buf = vec![7u8, 0u8, 0u8];
        let err = NetworkMessage::decode(&mut buf.as_slice(), &DecodingOptions::test()).unwrap_err();
        assert_eq!(err.status(), opcua_types::status_code::StatusCode::BadDecodingError);
    }
}
