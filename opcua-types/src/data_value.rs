// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `DataValue`: a `Variant` plus independently-optional status and
//! timestamp metadata (spec §3, §4.1). Each of the five optional fields has
//! its own presence bit in the encoding mask; all-absent (mask `0x00`) is a
//! legal, fully empty `DataValue`.

use std::io::{Read, Write};

use crate::{encoding::*, status_code::StatusCode, variant::Variant};

const HAS_VALUE: u8 = 0x01;
const HAS_STATUS: u8 = 0x02;
const HAS_SOURCE_TIMESTAMP: u8 = 0x04;
const HAS_SERVER_TIMESTAMP: u8 = 0x08;
const HAS_SOURCE_PICOSECONDS: u8 = 0x10;
const HAS_SERVER_PICOSECONDS: u8 = 0x20;
const RESERVED_MASK: u8 = !(HAS_VALUE
    | HAS_STATUS
    | HAS_SOURCE_TIMESTAMP
    | HAS_SERVER_TIMESTAMP
    | HAS_SOURCE_PICOSECONDS
    | HAS_SERVER_PICOSECONDS);

/// A value read from or written to an attribute, with quality and timing
/// metadata. Every field is independently optional.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    /// The value itself, or `None` if omitted.
    pub value: Option<Variant>,
    /// Quality of the value, or `None` if omitted (callers should treat a
    /// missing status as `Good`).
    pub status: Option<StatusCode>,
    /// When the value was obtained at the source, or `None` if omitted.
    pub source_timestamp: Option<crate::date_time::DateTime>,
    /// Sub-100ns component of `source_timestamp`, 0-9999.
    pub source_picoseconds: Option<u16>,
    /// When the server recorded the value, or `None` if omitted.
    pub server_timestamp: Option<crate::date_time::DateTime>,
    /// Sub-100ns component of `server_timestamp`, 0-9999.
    pub server_picoseconds: Option<u16>,
}

impl DataValue {
    /// Build a `DataValue` carrying only a value, both timestamps set to
    /// `now` and status `Good` left implicit.
    pub fn new_now(value: Variant) -> Self {
        let now = crate::date_time::DateTime::now();
        DataValue {
            value: Some(value),
            status: None,
            source_timestamp: Some(now.clone()),
            source_picoseconds: None,
            server_timestamp: Some(now),
            server_picoseconds: None,
        }
    }

    /// `true` if every field is absent.
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
            && self.status.is_none()
            && self.source_timestamp.is_none()
            && self.server_timestamp.is_none()
            && self.source_picoseconds.is_none()
            && self.server_picoseconds.is_none()
    }
}

impl BinaryEncodable for DataValue {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        if let Some(v) = &self.value {
            size += v.byte_len();
        }
        if self.status.is_some() {
            size += 4;
        }
        if self.source_timestamp.is_some() {
            size += 8;
        }
        if self.source_picoseconds.is_some() {
            size += 2;
        }
        if self.server_timestamp.is_some() {
            size += 8;
        }
        if self.server_picoseconds.is_some() {
            size += 2;
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut mask = 0u8;
        if self.value.is_some() {
            mask |= HAS_VALUE;
        }
        if self.status.is_some() {
            mask |= HAS_STATUS;
        }
        if self.source_timestamp.is_some() {
            mask |= HAS_SOURCE_TIMESTAMP;
        }
        if self.server_timestamp.is_some() {
            mask |= HAS_SERVER_TIMESTAMP;
        }
        if self.source_picoseconds.is_some() {
            mask |= HAS_SOURCE_PICOSECONDS;
        }
        if self.server_picoseconds.is_some() {
            mask |= HAS_SERVER_PICOSECONDS;
        }

        let mut size = write_u8(stream, mask)?;
        if let Some(v) = &self.value {
            size += v.encode(stream)?;
        }
        if let Some(s) = &self.status {
            size += s.encode(stream)?;
        }
        if let Some(t) = &self.source_timestamp {
            size += t.encode(stream)?;
        }
        if let Some(p) = self.source_picoseconds {
            size += write_u16(stream, p)?;
        }
        if let Some(t) = &self.server_timestamp {
            size += t.encode(stream)?;
        }
        if let Some(p) = self.server_picoseconds {
            size += write_u16(stream, p)?;
        }
        Ok(size)
    }
}

impl BinaryDecodable for DataValue {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let mask = read_u8(stream)?;
        if mask & RESERVED_MASK != 0 {
            return Err(Error::decoding(format!(
                "DataValue encoding mask has reserved bits set: {mask:#x}"
            )));
        }
        let value = if mask & HAS_VALUE != 0 {
            Some(Variant::decode(stream, decoding_options)?)
        } else {
            None
        };
        let status = if mask & HAS_STATUS != 0 {
            Some(StatusCode::decode(stream, decoding_options)?)
        } else {
            None
        };
        let source_timestamp = if mask & HAS_SOURCE_TIMESTAMP != 0 {
            Some(crate::date_time::DateTime::decode(stream, decoding_options)?)
        } else {
            None
        };
        let source_picoseconds = if mask & HAS_SOURCE_PICOSECONDS != 0 {
            Some(read_u16(stream)?)
        } else {
            None
        };
        let server_timestamp = if mask & HAS_SERVER_TIMESTAMP != 0 {
            Some(crate::date_time::DateTime::decode(stream, decoding_options)?)
        } else {
            None
        };
        let server_picoseconds = if mask & HAS_SERVER_PICOSECONDS != 0 {
            Some(read_u16(stream)?)
        } else {
            None
        };
        Ok(DataValue {
            value,
            status,
            source_timestamp,
            source_picoseconds,
            server_timestamp,
            server_picoseconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_absent_is_legal() {
        let dv = DataValue::default();
        assert!(dv.is_empty());
        let bytes = dv.encode_to_vec();
        assert_eq!(bytes, vec![0x00]);
        let decoded = DataValue::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, dv);
    }

    #[test]
    fn value_only_round_trip() {
        let dv = DataValue {
            value: Some(Variant::Int32(7)),
            ..Default::default()
        };
        let bytes = dv.encode_to_vec();
        assert_eq!(bytes[0], HAS_VALUE);
        let decoded = DataValue::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, dv);
    }

    #[test]
    fn fields_are_independently_optional() {
        let dv = DataValue {
            value: None,
            status: Some(StatusCode::BadTimeout),
            source_timestamp: None,
            source_picoseconds: None,
            server_timestamp: Some(crate::date_time::DateTime::now()),
            server_picoseconds: Some(42),
        };
        let bytes = dv.encode_to_vec();
        let decoded = DataValue::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, dv);
    }

    #[test]
    fn reserved_bits_rejected() {
        let bytes = [0xC0u8];
        assert!(DataValue::decode(&mut bytes.as_slice(), &DecodingOptions::test()).is_err());
    }
}
