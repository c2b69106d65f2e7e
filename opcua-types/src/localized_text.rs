// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `LocalizedText`: a locale tag plus localized text, each independently
//! optional (spec §3). The encoding mask's low 2 bits signal which of the
//! two fields is present.

use std::io::{Read, Write};

use crate::{encoding::*, string::UAString};

const HAS_LOCALE: u8 = 0x01;
const HAS_TEXT: u8 = 0x02;
const RESERVED_MASK: u8 = !(HAS_LOCALE | HAS_TEXT);

/// Human-readable text tagged with an optional locale (e.g. `"en-US"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LocalizedText {
    /// Locale identifier, e.g. `"en-US"`. Null if unset.
    pub locale: UAString,
    /// The text itself. Null if unset.
    pub text: UAString,
}

impl LocalizedText {
    /// Build a `LocalizedText` with no locale.
    pub fn new(text: impl Into<UAString>) -> Self {
        LocalizedText {
            locale: UAString::null(),
            text: text.into(),
        }
    }

    /// Build a `LocalizedText` with an explicit locale.
    pub fn new_with_locale(locale: impl Into<UAString>, text: impl Into<UAString>) -> Self {
        LocalizedText {
            locale: locale.into(),
            text: text.into(),
        }
    }
}

impl BinaryEncodable for LocalizedText {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        if !self.locale.is_null() {
            size += self.locale.byte_len();
        }
        if !self.text.is_null() {
            size += self.text.byte_len();
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut mask = 0u8;
        if !self.locale.is_null() {
            mask |= HAS_LOCALE;
        }
        if !self.text.is_null() {
            mask |= HAS_TEXT;
        }
        let mut size = write_u8(stream, mask)?;
        if mask & HAS_LOCALE != 0 {
            size += self.locale.encode(stream)?;
        }
        if mask & HAS_TEXT != 0 {
            size += self.text.encode(stream)?;
        }
        Ok(size)
    }
}

impl BinaryDecodable for LocalizedText {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let mask = read_u8(stream)?;
        if mask & RESERVED_MASK != 0 {
            return Err(Error::decoding(format!(
                "LocalizedText encoding mask has reserved bits set: {mask:#x}"
            )));
        }
        let locale = if mask & HAS_LOCALE != 0 {
            UAString::decode(stream, decoding_options)?
        } else {
            UAString::null()
        };
        let text = if mask & HAS_TEXT != 0 {
            UAString::decode(stream, decoding_options)?
        } else {
            UAString::null()
        };
        Ok(LocalizedText { locale, text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_both_present() {
        let lt = LocalizedText::new_with_locale("en-US", "Temperature");
        let bytes = lt.encode_to_vec();
        assert_eq!(bytes[0], HAS_LOCALE | HAS_TEXT);
        let decoded = LocalizedText::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, lt);
    }

    #[test]
    fn reserved_bits_rejected() {
        let bytes = [0xF0u8];
        assert!(LocalizedText::decode(&mut bytes.as_slice(), &DecodingOptions::test()).is_err());
    }
}
