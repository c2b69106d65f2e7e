// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `UAString`: a length-prefixed UTF-8 string distinguishing null from empty
//! (spec §3: length `-1` is null, `0` is empty-but-present).

use std::{
    fmt,
    io::{Read, Write},
    ops::Deref,
};

use crate::encoding::*;

/// A length-prefixed OPC UA string. `None` is the wire-null value (encodes
/// as length `-1`); `Some(String::new())` is the empty string (length `0`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash, PartialOrd, Ord)]
pub struct UAString {
    value: Option<String>,
}

impl fmt::Display for UAString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value.as_deref().unwrap_or(""))
    }
}

impl Deref for UAString {
    type Target = str;

    fn deref(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }
}

impl AsRef<str> for UAString {
    fn as_ref(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }
}

impl From<&str> for UAString {
    fn from(v: &str) -> Self {
        UAString {
            value: Some(v.to_string()),
        }
    }
}

impl From<String> for UAString {
    fn from(v: String) -> Self {
        UAString { value: Some(v) }
    }
}

impl From<&String> for UAString {
    fn from(v: &String) -> Self {
        UAString {
            value: Some(v.clone()),
        }
    }
}

impl UAString {
    /// The null string (distinct from empty).
    pub fn null() -> Self {
        UAString { value: None }
    }

    /// `true` for the null string, `false` for empty or non-empty.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// `true` for null or zero-length.
    pub fn is_empty(&self) -> bool {
        self.value.as_ref().is_none_or(|v| v.is_empty())
    }

    /// Borrow the contents, or `None` if this is the null string.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl BinaryEncodable for UAString {
    fn byte_len(&self) -> usize {
        4 + self.value.as_ref().map(|v| v.len()).unwrap_or(0)
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        match &self.value {
            None => write_i32(stream, -1),
            Some(v) => {
                let bytes = v.as_bytes();
                let mut size = write_i32(stream, bytes.len() as i32)?;
                stream.write_all(bytes)?;
                size += bytes.len();
                Ok(size)
            }
        }
    }
}

impl BinaryDecodable for UAString {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let len = read_i32(stream)?;
        if len < -1 {
            return Err(Error::decoding(format!("Invalid string length {len}")));
        }
        if len == -1 {
            return Ok(UAString::null());
        }
        let len = len as usize;
        if decoding_options.max_string_length > 0 && len > decoding_options.max_string_length {
            return Err(Error::decoding(format!(
                "String length {len} exceeds configured max of {}",
                decoding_options.max_string_length
            )));
        }
        let bytes = read_bytes(stream, len)?;
        let s = String::from_utf8(bytes)
            .map_err(|e| Error::decoding(format!("Invalid UTF-8 in string: {e}")))?;
        Ok(UAString { value: Some(s) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_vs_empty_round_trip_distinctly() {
        let null = UAString::null();
        let empty = UAString::from("");
        assert_ne!(null.encode_to_vec(), empty.encode_to_vec());
        assert_eq!(null.encode_to_vec(), (-1i32).to_le_bytes());
        assert_eq!(empty.encode_to_vec(), 0i32.to_le_bytes());

        let decoded_null =
            UAString::decode(&mut null.encode_to_vec().as_slice(), &DecodingOptions::test())
                .unwrap();
        assert!(decoded_null.is_null());
        let decoded_empty =
            UAString::decode(&mut empty.encode_to_vec().as_slice(), &DecodingOptions::test())
                .unwrap();
        assert!(!decoded_empty.is_null());
        assert!(decoded_empty.is_empty());
    }

    #[test]
    fn rejects_length_beyond_limit() {
        let mut buf = Vec::new();
        write_i32(&mut buf, 1_000_000).unwrap();
        buf.extend(std::iter::repeat(b'x').take(10));
        let mut opts = DecodingOptions::test();
        opts.max_string_length = 100;
        assert!(UAString::decode(&mut buf.as_slice(), &opts).is_err());
    }

    #[test]
    fn truncated_input_fails() {
        let mut buf = Vec::new();
        write_i32(&mut buf, 10).unwrap();
        buf.extend_from_slice(b"abc");
        assert!(UAString::decode(&mut buf.as_slice(), &DecodingOptions::test()).is_err());
    }
}
