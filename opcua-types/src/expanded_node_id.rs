// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `ExpandedNodeId`: a `NodeId` plus an optional namespace URI and server
//! index, used when a node id needs to be resolved across servers (spec §3).

use std::io::{Read, Write};

use crate::{
    encoding::*,
    node_id::{Identifier, NodeId},
    string::UAString,
};

const NAMESPACE_URI_FLAG: u8 = 0x80;
const SERVER_INDEX_FLAG: u8 = 0x40;
const ENCODING_BYTE_MASK: u8 = 0x3F;

/// A `NodeId` that may additionally carry a namespace URI (instead of, or in
/// addition to, a namespace index) and a server index for cross-server
/// references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ExpandedNodeId {
    /// The local node id.
    pub node_id: NodeId,
    /// Namespace URI, if the namespace is identified by URI rather than index.
    pub namespace_uri: UAString,
    /// Index of the server owning this node, 0 for the local server.
    pub server_index: u32,
}

impl From<NodeId> for ExpandedNodeId {
    fn from(node_id: NodeId) -> Self {
        ExpandedNodeId {
            node_id,
            namespace_uri: UAString::null(),
            server_index: 0,
        }
    }
}

impl ExpandedNodeId {
    /// `true` if the underlying node id is null.
    pub fn is_null(&self) -> bool {
        self.node_id.is_null()
    }
}

impl BinaryEncodable for ExpandedNodeId {
    fn byte_len(&self) -> usize {
        // Encoding byte + identifier payload, re-using NodeId's byte_len
        // minus its own encoding byte since we write a combined one.
        let node_id_len = self.node_id.byte_len();
        let mut len = node_id_len;
        if !self.namespace_uri.is_null() {
            len += self.namespace_uri.byte_len();
        }
        if self.server_index != 0 {
            len += 4;
        }
        len
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let has_uri = !self.namespace_uri.is_null();
        let has_server_index = self.server_index != 0;

        // Re-encode the NodeId body, then OR the extra flag bits into its
        // leading encoding byte before writing.
        let mut node_id_bytes = self.node_id.encode_to_vec();
        let mut flags = node_id_bytes[0] & ENCODING_BYTE_MASK;
        if has_uri {
            flags |= NAMESPACE_URI_FLAG;
        }
        if has_server_index {
            flags |= SERVER_INDEX_FLAG;
        }
        node_id_bytes[0] = flags;

        let mut size = 0;
        stream.write_all(&node_id_bytes)?;
        size += node_id_bytes.len();

        if has_uri {
            size += self.namespace_uri.encode(stream)?;
        }
        if has_server_index {
            size += write_u32(stream, self.server_index)?;
        }
        Ok(size)
    }
}

impl BinaryDecodable for ExpandedNodeId {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let encoding = read_u8(stream)?;
        let has_uri = encoding & NAMESPACE_URI_FLAG != 0;
        let has_server_index = encoding & SERVER_INDEX_FLAG != 0;
        let node_id_encoding = encoding & ENCODING_BYTE_MASK;

        // Reassemble a stream that looks like a plain NodeId to reuse its decoder.
        let node_id = decode_node_id_body(node_id_encoding, stream, decoding_options)?;

        let namespace_uri = if has_uri {
            UAString::decode(stream, decoding_options)?
        } else {
            UAString::null()
        };
        let server_index = if has_server_index {
            read_u32(stream)?
        } else {
            0
        };

        Ok(ExpandedNodeId {
            node_id,
            namespace_uri,
            server_index,
        })
    }
}

fn decode_node_id_body<S: Read + ?Sized>(
    encoding: u8,
    stream: &mut S,
    decoding_options: &DecodingOptions,
) -> EncodingResult<NodeId> {
    // Mirrors NodeId::decode's match arms, operating on an encoding byte
    // already consumed by the caller (ExpandedNodeId packs extra flag bits
    // into that byte).
    match encoding {
        0x00 => Ok(NodeId::new(0, read_u8(stream)? as u32)),
        0x01 => {
            let namespace = read_u8(stream)? as u16;
            let value = read_u16(stream)? as u32;
            Ok(NodeId::new(namespace, value))
        }
        0x02 => {
            let namespace = read_u16(stream)?;
            let value = read_u32(stream)?;
            Ok(NodeId::new(namespace, value))
        }
        0x03 => {
            let namespace = read_u16(stream)?;
            let value = UAString::decode(stream, decoding_options)?;
            Ok(NodeId {
                namespace,
                identifier: Identifier::String(value),
            })
        }
        0x04 => {
            let namespace = read_u16(stream)?;
            let value = crate::guid::Guid::decode(stream, decoding_options)?;
            Ok(NodeId::new(namespace, value))
        }
        0x05 => {
            let namespace = read_u16(stream)?;
            let value = crate::byte_string::ByteString::decode(stream, decoding_options)?;
            Ok(NodeId::new(namespace, value))
        }
        _ => Err(Error::decoding(format!(
            "Unrecognized node id encoding byte {encoding}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_without_extras() {
        let id = ExpandedNodeId::from(NodeId::new(2, "x"));
        let bytes = id.encode_to_vec();
        let decoded = ExpandedNodeId::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn round_trip_with_uri_and_server_index() {
        let id = ExpandedNodeId {
            node_id: NodeId::new(0, 42u32),
            namespace_uri: UAString::from("urn:example"),
            server_index: 7,
        };
        let bytes = id.encode_to_vec();
        let decoded = ExpandedNodeId::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, id);
    }
}
