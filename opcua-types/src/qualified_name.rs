// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `QualifiedName`: a namespace-qualified name (spec §3).

use std::io::{Read, Write};

use crate::{encoding::*, string::UAString};

/// A name qualified by a namespace index, used for browse names and similar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QualifiedName {
    /// Namespace index the name is scoped to.
    pub namespace_index: u16,
    /// The name itself.
    pub name: UAString,
}

impl QualifiedName {
    /// Build a qualified name in namespace `namespace_index`.
    pub fn new(namespace_index: u16, name: impl Into<UAString>) -> Self {
        QualifiedName {
            namespace_index,
            name: name.into(),
        }
    }

    /// `true` if the name is the null string.
    pub fn is_null(&self) -> bool {
        self.name.is_null()
    }
}

impl BinaryEncodable for QualifiedName {
    fn byte_len(&self) -> usize {
        2 + self.name.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = write_u16(stream, self.namespace_index)?;
        size += self.name.encode(stream)?;
        Ok(size)
    }
}

impl BinaryDecodable for QualifiedName {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let namespace_index = read_u16(stream)?;
        let name = UAString::decode(stream, decoding_options)?;
        Ok(QualifiedName {
            namespace_index,
            name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let qn = QualifiedName::new(3, "Temperature");
        let bytes = qn.encode_to_vec();
        let decoded = QualifiedName::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, qn);
    }
}
