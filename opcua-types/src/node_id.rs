// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `NodeId`: namespace index + {numeric | string | guid | opaque} identifier
//! (spec §3). Wire encoding uses one of four compact forms depending on the
//! identifier kind and the namespace index's magnitude (Part 6 §5.2.2.9).

use std::{
    fmt,
    io::{Read, Write},
    str::FromStr,
};

use crate::{byte_string::ByteString, encoding::*, guid::Guid, string::UAString};

const ENCODING_TWO_BYTE: u8 = 0x00;
const ENCODING_FOUR_BYTE: u8 = 0x01;
const ENCODING_NUMERIC: u8 = 0x02;
const ENCODING_STRING: u8 = 0x03;
const ENCODING_GUID: u8 = 0x04;
const ENCODING_BYTE_STRING: u8 = 0x05;

/// The identifier payload of a `NodeId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// `i=123`
    Numeric(u32),
    /// `s=...`
    String(UAString),
    /// `g=...`
    Guid(Guid),
    /// `b=...` (base64 opaque bytes)
    ByteString(ByteString),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(v) => write!(f, "i={v}"),
            Identifier::String(v) => write!(f, "s={v}"),
            Identifier::Guid(v) => write!(f, "g={v}"),
            Identifier::ByteString(v) => write!(f, "b={}", v.as_base64()),
        }
    }
}

impl From<u32> for Identifier {
    fn from(v: u32) -> Self {
        Identifier::Numeric(v)
    }
}

impl From<&str> for Identifier {
    fn from(v: &str) -> Self {
        Identifier::String(UAString::from(v))
    }
}

impl From<String> for Identifier {
    fn from(v: String) -> Self {
        Identifier::String(UAString::from(v))
    }
}

impl From<Guid> for Identifier {
    fn from(v: Guid) -> Self {
        Identifier::Guid(v)
    }
}

impl From<ByteString> for Identifier {
    fn from(v: ByteString) -> Self {
        Identifier::ByteString(v)
    }
}

/// A namespace-qualified identifier naming a node in the address space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    /// Index into the server's namespace table.
    pub namespace: u16,
    /// The identifier itself.
    pub identifier: Identifier,
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};{}", self.namespace, self.identifier)
        } else {
            write!(f, "{}", self.identifier)
        }
    }
}

impl FromStr for NodeId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut namespace = 0u16;
        let mut rest = s;
        if let Some(r) = s.strip_prefix("ns=") {
            let (ns_str, tail) = r.split_once(';').ok_or(())?;
            namespace = ns_str.parse().map_err(|_| ())?;
            rest = tail;
        }
        if rest.len() < 2 {
            return Err(());
        }
        let (kind, value) = rest.split_at(2);
        let identifier = match kind {
            "i=" => Identifier::Numeric(value.parse().map_err(|_| ())?),
            "s=" => Identifier::String(UAString::from(value)),
            "g=" => Identifier::Guid(Guid::from_str(value).map_err(|_| ())?),
            "b=" => Identifier::ByteString(ByteString::from_base64(value).ok_or(())?),
            _ => return Err(()),
        };
        Ok(NodeId {
            namespace,
            identifier,
        })
    }
}

impl NodeId {
    /// Build a new `NodeId` from a namespace index and anything convertible
    /// into an `Identifier`.
    pub fn new<T: Into<Identifier>>(namespace: u16, identifier: T) -> Self {
        NodeId {
            namespace,
            identifier: identifier.into(),
        }
    }

    /// The null node id: namespace 0, numeric identifier 0.
    pub fn null() -> Self {
        NodeId {
            namespace: 0,
            identifier: Identifier::Numeric(0),
        }
    }

    /// `true` for the null node id.
    pub fn is_null(&self) -> bool {
        self.namespace == 0 && matches!(self.identifier, Identifier::Numeric(0))
    }
}

impl BinaryEncodable for NodeId {
    fn byte_len(&self) -> usize {
        match &self.identifier {
            Identifier::Numeric(v) if self.namespace == 0 && *v <= 255 => 2,
            Identifier::Numeric(v) if self.namespace <= 255 && *v <= 65535 => 4,
            Identifier::Numeric(_) => 7,
            Identifier::String(s) => 3 + s.byte_len(),
            Identifier::Guid(g) => 3 + g.byte_len(),
            Identifier::ByteString(b) => 3 + b.byte_len(),
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        match &self.identifier {
            Identifier::Numeric(v) if self.namespace == 0 && *v <= 255 => {
                let mut n = write_u8(stream, ENCODING_TWO_BYTE)?;
                n += write_u8(stream, *v as u8)?;
                Ok(n)
            }
            Identifier::Numeric(v) if self.namespace <= 255 && *v <= 65535 => {
                let mut n = write_u8(stream, ENCODING_FOUR_BYTE)?;
                n += write_u8(stream, self.namespace as u8)?;
                n += write_u16(stream, *v as u16)?;
                Ok(n)
            }
            Identifier::Numeric(v) => {
                let mut n = write_u8(stream, ENCODING_NUMERIC)?;
                n += write_u16(stream, self.namespace)?;
                n += write_u32(stream, *v)?;
                Ok(n)
            }
            Identifier::String(s) => {
                let mut n = write_u8(stream, ENCODING_STRING)?;
                n += write_u16(stream, self.namespace)?;
                n += s.encode(stream)?;
                Ok(n)
            }
            Identifier::Guid(g) => {
                let mut n = write_u8(stream, ENCODING_GUID)?;
                n += write_u16(stream, self.namespace)?;
                n += g.encode(stream)?;
                Ok(n)
            }
            Identifier::ByteString(b) => {
                let mut n = write_u8(stream, ENCODING_BYTE_STRING)?;
                n += write_u16(stream, self.namespace)?;
                n += b.encode(stream)?;
                Ok(n)
            }
        }
    }
}

impl BinaryDecodable for NodeId {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let encoding = read_u8(stream)?;
        match encoding {
            ENCODING_TWO_BYTE => Ok(NodeId::new(0, read_u8(stream)? as u32)),
            ENCODING_FOUR_BYTE => {
                let namespace = read_u8(stream)? as u16;
                let value = read_u16(stream)? as u32;
                Ok(NodeId::new(namespace, value))
            }
            ENCODING_NUMERIC => {
                let namespace = read_u16(stream)?;
                let value = read_u32(stream)?;
                Ok(NodeId::new(namespace, value))
            }
            ENCODING_STRING => {
                let namespace = read_u16(stream)?;
                let value = UAString::decode(stream, decoding_options)?;
                Ok(NodeId::new(namespace, value.to_string()))
            }
            ENCODING_GUID => {
                let namespace = read_u16(stream)?;
                let value = Guid::decode(stream, decoding_options)?;
                Ok(NodeId::new(namespace, value))
            }
            ENCODING_BYTE_STRING => {
                let namespace = read_u16(stream)?;
                let value = ByteString::decode(stream, decoding_options)?;
                Ok(NodeId::new(namespace, value))
            }
            _ => Err(Error::decoding(format!(
                "Unrecognized node id encoding byte {encoding}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_byte_form() {
        let id = NodeId::new(0, 5u32);
        let bytes = id.encode_to_vec();
        assert_eq!(bytes, vec![ENCODING_TWO_BYTE, 5]);
        assert_eq!(NodeId::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap(), id);
    }

    #[test]
    fn string_form_round_trip() {
        let id = NodeId::new(2, "temperature");
        let bytes = id.encode_to_vec();
        let decoded = NodeId::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn display_and_parse_round_trip() {
        let id = NodeId::new(2, "temperature");
        assert_eq!(id.to_string(), "ns=2;s=temperature");
        assert_eq!(NodeId::from_str("ns=2;s=temperature").unwrap(), id);
        assert_eq!(NodeId::from_str("i=84").unwrap(), NodeId::new(0, 84u32));
    }
}
