// OPC UA PubSub codec — SPDX-License-Identifier: MPL-2.0

//! `DataSetMessage`: one DataSet's worth of field values, as carried inside
//! a [`crate::network_message::NetworkMessage`] payload (spec §4.8).

use std::io::{Read, Write};

use bitflags::bitflags;
use opcua_types::{
    encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult, Error},
    status_code::StatusCode,
    variant::Variant,
    variant_type_id::VariantScalarTypeId,
};

use crate::metadata::DataSetMetaData;

bitflags! {
    /// First flags byte: what optional fields follow, and the field
    /// encoding in bits 1-2.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct DataSetFlags1: u8 {
        const VALID = 0x01;
        const FIELD_ENCODING_RAW = 0x02;
        const FIELD_ENCODING_DATA_VALUE = 0x04;
        const SEQUENCE_NUMBER = 0x08;
        const STATUS = 0x10;
        const CONFIG_VERSION_MAJOR = 0x20;
        const CONFIG_VERSION_MINOR = 0x40;
        const FLAGS2_PRESENT = 0x80;
    }
}

bitflags! {
    /// Second flags byte, present only when [`DataSetFlags1::FLAGS2_PRESENT`]
    /// is set: message type in bits 0-3, timestamp/picoseconds presence.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct DataSetFlags2: u8 {
        const MESSAGE_TYPE_MASK = 0x0F;
        const TIMESTAMP = 0x10;
        const PICOSECONDS = 0x20;
    }
}

/// How field values are laid out on the wire (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSetFieldEncoding {
    /// Each field is a full tagged `Variant`.
    Variant,
    /// Each field is the bare scalar bytes, with type/order taken from an
    /// out-of-band [`DataSetMetaData`].
    Raw,
    /// Each field is a `DataValue` (value + status + timestamps).
    DataValue,
}

/// What kind of DataSet content this message carries (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSetMessageType {
    /// Every configured field, a full snapshot.
    KeyFrame,
    /// Only fields that changed since the last KeyFrame/DeltaFrame.
    DeltaFrame,
    /// An Event notification rather than a periodic DataSet sample.
    Event,
    /// No field data; sent to prove the writer is still alive.
    KeepAlive,
}

impl DataSetMessageType {
    fn from_bits(bits: u8) -> EncodingResult<Self> {
        match bits {
            0 => Ok(DataSetMessageType::KeyFrame),
            1 => Ok(DataSetMessageType::DeltaFrame),
            2 => Ok(DataSetMessageType::Event),
            7 => Ok(DataSetMessageType::KeepAlive),
            other => Err(Error::decoding(format!("unknown DataSetMessageType {other}"))),
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            DataSetMessageType::KeyFrame => 0,
            DataSetMessageType::DeltaFrame => 1,
            DataSetMessageType::Event => 2,
            DataSetMessageType::KeepAlive => 7,
        }
    }
}

/// `ConfigurationVersion`: bumped whenever the publisher's DataSet layout
/// changes, so a subscriber can detect it needs fresh `DataSetMetaData`
/// before trusting a `Raw`-encoded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigurationVersion {
    pub major_version: u32,
    pub minor_version: u32,
}

/// The values a DataSetMessage carries, shaped by its
/// [`DataSetFieldEncoding`]. `KeepAlive` messages carry none.
#[derive(Debug, Clone)]
pub enum DataSetPayload {
    Fields(Vec<Variant>),
    KeepAlive,
}

#[derive(Debug, Clone)]
pub struct DataSetMessage {
    pub message_type: DataSetMessageType,
    pub field_encoding: DataSetFieldEncoding,
    pub sequence_number: Option<u16>,
    pub status: Option<StatusCode>,
    pub configuration_version: Option<ConfigurationVersion>,
    pub timestamp: Option<opcua_types::date_time::DateTime>,
    pub picoseconds: Option<u16>,
    pub payload: DataSetPayload,
}

impl DataSetMessage {
    pub fn keep_alive(message_type: DataSetMessageType) -> Self {
        DataSetMessage {
            message_type,
            field_encoding: DataSetFieldEncoding::Variant,
            sequence_number: None,
            status: None,
            configuration_version: None,
            timestamp: None,
            picoseconds: None,
            payload: DataSetPayload::KeepAlive,
        }
    }

    pub fn key_frame(fields: Vec<Variant>) -> Self {
        DataSetMessage {
            message_type: DataSetMessageType::KeyFrame,
            field_encoding: DataSetFieldEncoding::Variant,
            sequence_number: None,
            status: None,
            configuration_version: None,
            timestamp: None,
            picoseconds: None,
            payload: DataSetPayload::Fields(fields),
        }
    }

    fn flags1(&self) -> DataSetFlags1 {
        let mut flags = DataSetFlags1::VALID | DataSetFlags1::FLAGS2_PRESENT;
        match self.field_encoding {
            DataSetFieldEncoding::Variant => {}
            DataSetFieldEncoding::Raw => flags |= DataSetFlags1::FIELD_ENCODING_RAW,
            DataSetFieldEncoding::DataValue => flags |= DataSetFlags1::FIELD_ENCODING_DATA_VALUE,
        }
        if self.sequence_number.is_some() {
            flags |= DataSetFlags1::SEQUENCE_NUMBER;
        }
        if self.status.is_some() {
            flags |= DataSetFlags1::STATUS;
        }
        if self.configuration_version.is_some() {
            flags |= DataSetFlags1::CONFIG_VERSION_MAJOR | DataSetFlags1::CONFIG_VERSION_MINOR;
        }
        flags
    }

    fn flags2(&self) -> DataSetFlags2 {
        let mut flags = DataSetFlags2::from_bits_truncate(self.message_type.to_bits());
        if self.timestamp.is_some() {
            flags |= DataSetFlags2::TIMESTAMP;
        }
        if self.picoseconds.is_some() {
            flags |= DataSetFlags2::PICOSECONDS;
        }
        flags
    }

    /// Encodes using [`DataSetFieldEncoding::Variant`] regardless of
    /// `self.field_encoding` being `Raw` (raw encoding needs the matching
    /// [`DataSetMetaData`] supplied via [`Self::encode_with_metadata`]).
    pub fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        if self.field_encoding == DataSetFieldEncoding::Raw {
            return Err(Error::encoding("raw field encoding requires encode_with_metadata"));
        }
        self.encode_header_and_fields(stream, None)
    }

    pub fn encode_with_metadata<S: Write + ?Sized>(
        &self,
        stream: &mut S,
        metadata: Option<&DataSetMetaData>,
    ) -> EncodingResult<usize> {
        self.encode_header_and_fields(stream, metadata)
    }

    fn encode_header_and_fields<S: Write + ?Sized>(
        &self,
        stream: &mut S,
        metadata: Option<&DataSetMetaData>,
    ) -> EncodingResult<usize> {
        let mut size = self.flags1().bits().encode(stream)?;
        size += self.flags2().bits().encode(stream)?;
        if let Some(seq) = self.sequence_number {
            size += seq.encode(stream)?;
        }
        if let Some(status) = self.status {
            size += status.encode(stream)?;
        }
        if let Some(version) = self.configuration_version {
            size += version.major_version.encode(stream)?;
            size += version.minor_version.encode(stream)?;
        }
        if let Some(timestamp) = &self.timestamp {
            size += timestamp.encode(stream)?;
        }
        if let Some(ps) = self.picoseconds {
            size += ps.encode(stream)?;
        }
        if let DataSetPayload::Fields(fields) = &self.payload {
            size += (fields.len() as u16).encode(stream)?;
            for field in fields {
                size += match self.field_encoding {
                    DataSetFieldEncoding::Variant => field.encode(stream)?,
                    DataSetFieldEncoding::DataValue => encode_as_data_value(field, stream)?,
                    DataSetFieldEncoding::Raw => {
                        let meta = metadata.ok_or_else(|| Error::encoding("raw encoding requires DataSetMetaData"))?;
                        encode_raw_field(field, stream, meta)?
                    }
                };
            }
        }
        Ok(size)
    }

    /// Decodes using the wire's own field-encoding flag; fails with
    /// `BadDecodingError` if that flag says `Raw` (spec §4.8) — call
    /// [`Self::decode_with_metadata`] instead once the matching
    /// `DataSetMetaData` is known.
    pub fn decode<S: Read + ?Sized>(stream: &mut S, opts: &DecodingOptions) -> EncodingResult<Self> {
        Self::decode_with_metadata(stream, opts, None)
    }

    pub fn decode_with_metadata<S: Read + ?Sized>(
        stream: &mut S,
        opts: &DecodingOptions,
        metadata: Option<&DataSetMetaData>,
    ) -> EncodingResult<Self> {
        let flags1 = DataSetFlags1::from_bits_truncate(u8::decode(stream, opts)?);
        if !flags1.contains(DataSetFlags1::VALID) {
            return Err(Error::decoding("DataSetMessage flags1 missing VALID bit"));
        }
        let flags2 = if flags1.contains(DataSetFlags1::FLAGS2_PRESENT) {
            DataSetFlags2::from_bits_truncate(u8::decode(stream, opts)?)
        } else {
            DataSetFlags2::empty()
        };
        let message_type = DataSetMessageType::from_bits((flags2.bits()) & DataSetFlags2::MESSAGE_TYPE_MASK.bits())?;
        let field_encoding = if flags1.contains(DataSetFlags1::FIELD_ENCODING_RAW) {
            DataSetFieldEncoding::Raw
        } else if flags1.contains(DataSetFlags1::FIELD_ENCODING_DATA_VALUE) {
            DataSetFieldEncoding::DataValue
        } else {
            DataSetFieldEncoding::Variant
        };
        let sequence_number = flags1
            .contains(DataSetFlags1::SEQUENCE_NUMBER)
            .then(|| u16::decode(stream, opts))
            .transpose()?;
        let status = flags1
            .contains(DataSetFlags1::STATUS)
            .then(|| StatusCode::decode(stream, opts))
            .transpose()?;
        let configuration_version = if flags1.contains(DataSetFlags1::CONFIG_VERSION_MAJOR) {
            Some(ConfigurationVersion {
                major_version: u32::decode(stream, opts)?,
                minor_version: u32::decode(stream, opts)?,
            })
        } else {
            None
        };
        let timestamp = flags2
            .contains(DataSetFlags2::TIMESTAMP)
            .then(|| opcua_types::date_time::DateTime::decode(stream, opts))
            .transpose()?;
        let picoseconds = flags2
            .contains(DataSetFlags2::PICOSECONDS)
            .then(|| u16::decode(stream, opts))
            .transpose()?;

        let payload = if message_type == DataSetMessageType::KeepAlive {
            DataSetPayload::KeepAlive
        } else {
            let field_count = u16::decode(stream, opts)? as usize;
            let mut fields = Vec::with_capacity(field_count.min(opts.max_array_length));
            for _ in 0..field_count {
                let field = match field_encoding {
                    DataSetFieldEncoding::Variant => Variant::decode(stream, opts)?,
                    DataSetFieldEncoding::DataValue => decode_data_value_as_variant(stream, opts)?,
                    DataSetFieldEncoding::Raw => {
                        let meta = metadata.ok_or_else(|| {
                            Error::decoding("raw-encoded DataSetMessage needs DataSetMetaData")
                        })?;
                        let index = fields.len();
                        let field_meta = meta.fields.get(index).ok_or_else(|| {
                            Error::decoding(format!("DataSetMetaData has no field at index {index}"))
                        })?;
                        decode_raw_field(stream, opts, field_meta.built_in_type)?
                    }
                };
                fields.push(field);
            }
            DataSetPayload::Fields(fields)
        };

        Ok(DataSetMessage {
            message_type,
            field_encoding,
            sequence_number,
            status,
            configuration_version,
            timestamp,
            picoseconds,
            payload,
        })
    }
}

fn encode_as_data_value<S: Write + ?Sized>(value: &Variant, stream: &mut S) -> EncodingResult<usize> {
    let data_value = opcua_types::data_value::DataValue {
        value: Some(value.clone()),
        status: Some(StatusCode::Good),
        source_timestamp: None,
        source_picoseconds: None,
        server_timestamp: None,
        server_picoseconds: None,
    };
    data_value.encode(stream)
}

fn decode_data_value_as_variant<S: Read + ?Sized>(
    stream: &mut S,
    opts: &DecodingOptions,
) -> EncodingResult<Variant> {
    let data_value = opcua_types::data_value::DataValue::decode(stream, opts)?;
    Ok(data_value.value.unwrap_or(Variant::Empty))
}

/// Encodes `value`'s scalar bytes with no type tag, matching the scalar
/// type `field`'s `DataSetMetaData` entry declares (spec §4.8 raw encoding).
fn encode_raw_field<S: Write + ?Sized>(
    value: &Variant,
    stream: &mut S,
    _metadata: &DataSetMetaData,
) -> EncodingResult<usize> {
    match value {
        Variant::Boolean(v) => v.encode(stream),
        Variant::SByte(v) => v.encode(stream),
        Variant::Byte(v) => v.encode(stream),
        Variant::Int16(v) => v.encode(stream),
        Variant::UInt16(v) => v.encode(stream),
        Variant::Int32(v) => v.encode(stream),
        Variant::UInt32(v) => v.encode(stream),
        Variant::Int64(v) => v.encode(stream),
        Variant::UInt64(v) => v.encode(stream),
        Variant::Float(v) => v.encode(stream),
        Variant::Double(v) => v.encode(stream),
        Variant::String(v) => v.encode(stream),
        Variant::ByteString(v) => v.encode(stream),
        Variant::DateTime(v) => v.encode(stream),
        Variant::Guid(v) => v.encode(stream),
        Variant::StatusCode(v) => v.encode(stream),
        other => Err(Error::encoding(format!("raw encoding of {other:?} is not supported"))),
    }
}

fn decode_raw_field<S: Read + ?Sized>(
    stream: &mut S,
    opts: &DecodingOptions,
    built_in_type: VariantScalarTypeId,
) -> EncodingResult<Variant> {
    Ok(match built_in_type {
        VariantScalarTypeId::Boolean => Variant::Boolean(bool::decode(stream, opts)?),
        VariantScalarTypeId::SByte => Variant::SByte(i8::decode(stream, opts)?),
        VariantScalarTypeId::Byte => Variant::Byte(u8::decode(stream, opts)?),
        VariantScalarTypeId::Int16 => Variant::Int16(i16::decode(stream, opts)?),
        VariantScalarTypeId::UInt16 => Variant::UInt16(u16::decode(stream, opts)?),
        VariantScalarTypeId::Int32 => Variant::Int32(i32::decode(stream, opts)?),
        VariantScalarTypeId::UInt32 => Variant::UInt32(u32::decode(stream, opts)?),
        VariantScalarTypeId::Int64 => Variant::Int64(i64::decode(stream, opts)?),
        VariantScalarTypeId::UInt64 => Variant::UInt64(u64::decode(stream, opts)?),
        VariantScalarTypeId::Float => Variant::Float(f32::decode(stream, opts)?),
        VariantScalarTypeId::Double => Variant::Double(f64::decode(stream, opts)?),
        VariantScalarTypeId::String => Variant::String(opcua_types::UAString::decode(stream, opts)?),
        VariantScalarTypeId::ByteString => {
            Variant::ByteString(opcua_types::byte_string::ByteString::decode(stream, opts)?)
        }
        VariantScalarTypeId::DateTime => {
            Variant::DateTime(Box::new(opcua_types::date_time::DateTime::decode(stream, opts)?))
        }
        VariantScalarTypeId::Guid => Variant::Guid(Box::new(opcua_types::guid::Guid::decode(stream, opts)?)),
        VariantScalarTypeId::StatusCode => Variant::StatusCode(StatusCode::decode(stream, opts)?),
        other => return Err(Error::decoding(format!("raw decoding of {other:?} is not supported"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FieldMetaData;

    #[test]
    fn key_frame_round_trips_with_variant_encoding() {
        let message = DataSetMessage {
            sequence_number: Some(42),
            status: Some(StatusCode::Good),
            configuration_version: Some(ConfigurationVersion { major_version: 1, minor_version: 0 }),
            ..DataSetMessage::key_frame(vec![Variant::UInt32(7), Variant::Double(2.5)])
        };
        let mut buf = Vec::new();
        message.encode(&mut buf).unwrap();
        let decoded = DataSetMessage::decode(&mut buf.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded.sequence_number, Some(42));
        assert_eq!(decoded.configuration_version, Some(ConfigurationVersion { major_version: 1, minor_version: 0 }));
        match decoded.payload {
            DataSetPayload::Fields(fields) => assert_eq!(fields, vec![Variant::UInt32(7), Variant::Double(2.5)]),
            DataSetPayload::KeepAlive => panic!("expected fields"),
        }
    }

    #[test]
    fn keep_alive_carries_no_fields() {
        let message = DataSetMessage::keep_alive(DataSetMessageType::KeepAlive);
        let mut buf = Vec::new();
        message.encode(&mut buf).unwrap();
        let decoded = DataSetMessage::decode(&mut buf.as_slice(), &DecodingOptions::test()).unwrap();
        assert!(matches!(decoded.payload, DataSetPayload::KeepAlive));
    }

    #[test]
    fn raw_encoding_requires_metadata() {
        let mut message = DataSetMessage::key_frame(vec![Variant::UInt32(9)]);
        message.field_encoding = DataSetFieldEncoding::Raw;
        let mut buf = Vec::new();
        assert!(message.encode(&mut buf).is_err());

        let meta = DataSetMetaData::new("set", vec![FieldMetaData::scalar("value", VariantScalarTypeId::UInt32)]);
        message.encode_with_metadata(&mut buf, Some(&meta)).unwrap();
        let err = DataSetMessage::decode(&mut buf.as_slice(), &DecodingOptions::test()).unwrap_err();
        assert_eq!(err.status(), StatusCode::BadDecodingError);

        let decoded = DataSetMessage::decode_with_metadata(&mut buf.as_slice(), &DecodingOptions::test(), Some(&meta)).unwrap();
        match decoded.payload {
            DataSetPayload::Fields(fields) => assert_eq!(fields, vec![Variant::UInt32(9)]),
            DataSetPayload::KeepAlive => panic!("expected fields"),
        }
    }
}
