// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `ExtensionObject`: a type id plus an opaque encoded body, used to carry
//! structured payloads (service requests/responses, complex attribute
//! values) inside a `Variant` without the codec needing to know every
//! concrete type (spec §3, §4.1).

use std::io::{Read, Write};

use crate::{byte_string::ByteString, encoding::*, node_id::NodeId, string::UAString};

const ENCODING_NONE: u8 = 0x00;
const ENCODING_BYTE_STRING: u8 = 0x01;
const ENCODING_XML_ELEMENT: u8 = 0x02;

/// The body of an `ExtensionObject`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExtensionObjectEncoding {
    /// No body; `node_id` is typically the null node id.
    #[default]
    None,
    /// Binary-encoded body, opaque to this crate unless the caller knows
    /// `node_id` and decodes it with the matching type's codec.
    ByteString(ByteString),
    /// XML body, rarely used on the binary transport.
    XmlElement(UAString),
}

/// A type id plus an encoded body whose concrete type the codec layer does
/// not need to know about. Unknown type ids are retained verbatim rather
/// than rejected, so a server can forward payloads for types it does not
/// itself implement (spec §4.1 Non-goals: no dynamic type registry).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtensionObject {
    /// Identifies the structured type the body decodes as.
    pub node_id: NodeId,
    /// The encoded body.
    pub body: ExtensionObjectEncoding,
}

impl ExtensionObject {
    /// The null extension object: null type id, no body.
    pub fn null() -> Self {
        Self::default()
    }

    /// `true` if this carries neither a meaningful type id nor a body.
    pub fn is_null(&self) -> bool {
        self.node_id.is_null() && matches!(self.body, ExtensionObjectEncoding::None)
    }

    /// Wrap an already-encoded binary body under `node_id`.
    pub fn from_encoded(node_id: NodeId, bytes: Vec<u8>) -> Self {
        ExtensionObject {
            node_id,
            body: ExtensionObjectEncoding::ByteString(ByteString::from(bytes)),
        }
    }

    /// Encode `value` and wrap the bytes under `node_id`.
    pub fn from_binary_body<T: BinaryEncodable>(node_id: NodeId, value: &T) -> Self {
        Self::from_encoded(node_id, value.encode_to_vec())
    }

    /// Decode the body as `T`, using minimal decoding limits since the body
    /// of an unknown type could be adversarial.
    pub fn decode_body<T: BinaryDecodable>(&self) -> EncodingResult<T> {
        match &self.body {
            ExtensionObjectEncoding::ByteString(bs) => {
                let bytes = bs.as_bytes();
                T::decode(&mut std::io::Cursor::new(bytes), &DecodingOptions::minimal())
            }
            ExtensionObjectEncoding::None => {
                Err(Error::decoding("ExtensionObject has no body to decode"))
            }
            ExtensionObjectEncoding::XmlElement(_) => Err(Error::decoding(
                "ExtensionObject body is XML, binary decode not supported",
            )),
        }
    }
}

impl BinaryEncodable for ExtensionObject {
    fn byte_len(&self) -> usize {
        let body_len = match &self.body {
            ExtensionObjectEncoding::None => 0,
            ExtensionObjectEncoding::ByteString(bs) => bs.byte_len(),
            ExtensionObjectEncoding::XmlElement(s) => s.byte_len(),
        };
        self.node_id.byte_len() + 1 + body_len
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = self.node_id.encode(stream)?;
        match &self.body {
            ExtensionObjectEncoding::None => {
                size += write_u8(stream, ENCODING_NONE)?;
            }
            ExtensionObjectEncoding::ByteString(bs) => {
                size += write_u8(stream, ENCODING_BYTE_STRING)?;
                size += bs.encode(stream)?;
            }
            ExtensionObjectEncoding::XmlElement(s) => {
                size += write_u8(stream, ENCODING_XML_ELEMENT)?;
                size += s.encode(stream)?;
            }
        }
        Ok(size)
    }
}

impl BinaryDecodable for ExtensionObject {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let node_id = NodeId::decode(stream, decoding_options)?;
        let encoding = read_u8(stream)?;
        let body = match encoding {
            ENCODING_NONE => ExtensionObjectEncoding::None,
            ENCODING_BYTE_STRING => {
                ExtensionObjectEncoding::ByteString(ByteString::decode(stream, decoding_options)?)
            }
            ENCODING_XML_ELEMENT => {
                ExtensionObjectEncoding::XmlElement(UAString::decode(stream, decoding_options)?)
            }
            _ => {
                return Err(Error::decoding(format!(
                    "Unrecognized ExtensionObject encoding byte {encoding}"
                )))
            }
        };
        Ok(ExtensionObject { node_id, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_round_trip() {
        let obj = ExtensionObject::null();
        assert!(obj.is_null());
        let bytes = obj.encode_to_vec();
        let decoded = ExtensionObject::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, obj);
    }

    #[test]
    fn binary_body_round_trip() {
        let inner = crate::string::UAString::from("payload");
        let obj = ExtensionObject::from_binary_body(NodeId::new(1, 99u32), &inner);
        let bytes = obj.encode_to_vec();
        let decoded = ExtensionObject::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        let roundtripped: UAString = decoded.decode_body().unwrap();
        assert_eq!(roundtripped, inner);
    }

    #[test]
    fn unknown_type_id_retains_opaque_bytes() {
        let obj = ExtensionObject::from_encoded(NodeId::new(5, 12345u32), vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let bytes = obj.encode_to_vec();
        let decoded = ExtensionObject::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, obj);
    }
}
