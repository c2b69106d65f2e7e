// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `Guid`: a 128-bit identifier, wire layout matching Microsoft's mixed
//! little/big-endian GUID encoding (data1/data2/data3 little-endian,
//! data4 as raw bytes).

use std::{
    fmt,
    io::{Read, Write},
    str::FromStr,
};

use uuid::Uuid;

use crate::encoding::*;

/// A 128-bit globally unique identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid(Uuid);

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Guid {
    fn default() -> Self {
        Guid(Uuid::nil())
    }
}

impl FromStr for Guid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s).map(Guid)
    }
}

impl Guid {
    /// Generate a new random (v4) GUID.
    pub fn new() -> Self {
        Guid(Uuid::new_v4())
    }

    /// Wrap an existing `uuid::Uuid`.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Guid(uuid)
    }

    /// Borrow the underlying `uuid::Uuid`.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl BinaryEncodable for Guid {
    fn byte_len(&self) -> usize {
        16
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let fields = self.0.as_fields();
        write_u32(stream, fields.0)?;
        write_u16(stream, fields.1)?;
        write_u16(stream, fields.2)?;
        stream.write_all(fields.3)?;
        Ok(16)
    }
}

impl BinaryDecodable for Guid {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let data1 = read_u32(stream)?;
        let data2 = read_u16(stream)?;
        let data3 = read_u16(stream)?;
        let mut data4 = [0u8; 8];
        stream.read_exact(&mut data4)?;
        Ok(Guid(Uuid::from_fields(data1, data2, data3, &data4)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let guid = Guid::new();
        let bytes = guid.encode_to_vec();
        assert_eq!(bytes.len(), 16);
        let decoded = Guid::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, guid);
    }

    #[test]
    fn string_round_trip() {
        let guid = Guid::new();
        let s = guid.to_string();
        assert_eq!(Guid::from_str(&s).unwrap(), guid);
    }
}
