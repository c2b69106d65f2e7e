// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `ByteString`: length-prefixed raw bytes, null distinct from empty (spec
//! §3), same framing rule as `UAString`.

use std::io::{Read, Write};

use base64::Engine;

use crate::encoding::*;

/// A length-prefixed byte string. `None` is null (length `-1`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct ByteString {
    /// The raw bytes, or `None` for the null byte string.
    pub value: Option<Vec<u8>>,
}

impl From<&[u8]> for ByteString {
    fn from(v: &[u8]) -> Self {
        ByteString {
            value: Some(v.to_vec()),
        }
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(v: Vec<u8>) -> Self {
        ByteString { value: Some(v) }
    }
}

impl ByteString {
    /// The null byte string.
    pub fn null() -> Self {
        ByteString { value: None }
    }

    /// `true` for the null byte string.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Borrow the contents as a slice; empty for both null and zero-length.
    pub fn as_bytes(&self) -> &[u8] {
        self.value.as_deref().unwrap_or(&[])
    }

    /// Base64-encode the contents (empty string if null).
    pub fn as_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.as_bytes())
    }

    /// Decode a base64 string into a `ByteString`.
    pub fn from_base64(s: &str) -> Option<Self> {
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .ok()
            .map(ByteString::from)
    }
}

impl BinaryEncodable for ByteString {
    fn byte_len(&self) -> usize {
        4 + self.value.as_ref().map(|v| v.len()).unwrap_or(0)
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        match &self.value {
            None => write_i32(stream, -1),
            Some(v) => {
                let mut size = write_i32(stream, v.len() as i32)?;
                stream.write_all(v)?;
                size += v.len();
                Ok(size)
            }
        }
    }
}

impl BinaryDecodable for ByteString {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let len = read_i32(stream)?;
        if len < -1 {
            return Err(Error::decoding(format!("Invalid byte string length {len}")));
        }
        if len == -1 {
            return Ok(ByteString::null());
        }
        let len = len as usize;
        if decoding_options.max_byte_string_length > 0
            && len > decoding_options.max_byte_string_length
        {
            return Err(Error::decoding(format!(
                "ByteString length {len} exceeds configured max of {}",
                decoding_options.max_byte_string_length
            )));
        }
        Ok(ByteString {
            value: Some(read_bytes(stream, len)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_vs_empty_distinct() {
        assert_ne!(ByteString::null(), ByteString::from(Vec::new()));
        assert_eq!(ByteString::null().encode_to_vec(), (-1i32).to_le_bytes());
        assert_eq!(ByteString::from(Vec::new()).encode_to_vec(), 0i32.to_le_bytes());
    }

    #[test]
    fn base64_round_trip() {
        let bs = ByteString::from(vec![1, 2, 3, 4]);
        let b64 = bs.as_base64();
        assert_eq!(ByteString::from_base64(&b64).unwrap(), bs);
    }
}
