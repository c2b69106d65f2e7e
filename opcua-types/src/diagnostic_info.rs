// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `DiagnosticInfo`: optional extended diagnostics attached to a result,
//! recursively nestable via `inner_diagnostic_info` (spec §3). Recursion is
//! bounded by the shared `DepthGauge`, same as nested `Variant`s.

use std::io::{Read, Write};

use crate::{encoding::*, status_code::StatusCode, string::UAString};

const HAS_SYMBOLIC_ID: u8 = 0x01;
const HAS_NAMESPACE_URI: u8 = 0x02;
const HAS_LOCALIZED_TEXT: u8 = 0x04;
const HAS_LOCALE: u8 = 0x08;
const HAS_ADDITIONAL_INFO: u8 = 0x10;
const HAS_INNER_STATUS_CODE: u8 = 0x20;
const HAS_INNER_DIAGNOSTIC_INFO: u8 = 0x40;
const RESERVED_MASK: u8 = 0x80;

/// Extended diagnostics: indexes into the enclosing response's string
/// tables plus free text, optionally chained to further diagnostics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiagnosticInfo {
    /// Index into the response's string table, or `None`.
    pub symbolic_id: Option<i32>,
    /// Index into the response's namespace URI table, or `None`.
    pub namespace_uri: Option<i32>,
    /// Index identifying the locale used for `localized_text`, or `None`.
    pub locale: Option<i32>,
    /// Index into the response's string table for human-readable text.
    pub localized_text: Option<i32>,
    /// Free-form diagnostic text, e.g. a stack trace.
    pub additional_info: Option<UAString>,
    /// A status code from an underlying system, when this diagnostic wraps
    /// a lower-level failure.
    pub inner_status_code: Option<StatusCode>,
    /// Further diagnostics from the same underlying failure.
    pub inner_diagnostic_info: Option<Box<DiagnosticInfo>>,
}

impl BinaryEncodable for DiagnosticInfo {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        if self.symbolic_id.is_some() {
            size += 4;
        }
        if self.namespace_uri.is_some() {
            size += 4;
        }
        if self.locale.is_some() {
            size += 4;
        }
        if self.localized_text.is_some() {
            size += 4;
        }
        if let Some(info) = &self.additional_info {
            size += info.byte_len();
        }
        if self.inner_status_code.is_some() {
            size += 4;
        }
        if let Some(inner) = &self.inner_diagnostic_info {
            size += inner.byte_len();
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut mask = 0u8;
        if self.symbolic_id.is_some() {
            mask |= HAS_SYMBOLIC_ID;
        }
        if self.namespace_uri.is_some() {
            mask |= HAS_NAMESPACE_URI;
        }
        if self.localized_text.is_some() {
            mask |= HAS_LOCALIZED_TEXT;
        }
        if self.locale.is_some() {
            mask |= HAS_LOCALE;
        }
        if self.additional_info.is_some() {
            mask |= HAS_ADDITIONAL_INFO;
        }
        if self.inner_status_code.is_some() {
            mask |= HAS_INNER_STATUS_CODE;
        }
        if self.inner_diagnostic_info.is_some() {
            mask |= HAS_INNER_DIAGNOSTIC_INFO;
        }

        let mut size = write_u8(stream, mask)?;
        if let Some(v) = self.symbolic_id {
            size += write_i32(stream, v)?;
        }
        if let Some(v) = self.namespace_uri {
            size += write_i32(stream, v)?;
        }
        if let Some(v) = self.locale {
            size += write_i32(stream, v)?;
        }
        if let Some(v) = self.localized_text {
            size += write_i32(stream, v)?;
        }
        if let Some(v) = &self.additional_info {
            size += v.encode(stream)?;
        }
        if let Some(v) = &self.inner_status_code {
            size += v.encode(stream)?;
        }
        if let Some(v) = &self.inner_diagnostic_info {
            size += v.encode(stream)?;
        }
        Ok(size)
    }
}

impl BinaryDecodable for DiagnosticInfo {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let mask = read_u8(stream)?;
        if mask & RESERVED_MASK != 0 {
            return Err(Error::decoding(format!(
                "DiagnosticInfo encoding mask has reserved bits set: {mask:#x}"
            )));
        }
        let symbolic_id = if mask & HAS_SYMBOLIC_ID != 0 {
            Some(read_i32(stream)?)
        } else {
            None
        };
        let namespace_uri = if mask & HAS_NAMESPACE_URI != 0 {
            Some(read_i32(stream)?)
        } else {
            None
        };
        let locale = if mask & HAS_LOCALE != 0 {
            Some(read_i32(stream)?)
        } else {
            None
        };
        let localized_text = if mask & HAS_LOCALIZED_TEXT != 0 {
            Some(read_i32(stream)?)
        } else {
            None
        };
        let additional_info = if mask & HAS_ADDITIONAL_INFO != 0 {
            Some(UAString::decode(stream, decoding_options)?)
        } else {
            None
        };
        let inner_status_code = if mask & HAS_INNER_STATUS_CODE != 0 {
            Some(StatusCode::decode(stream, decoding_options)?)
        } else {
            None
        };
        let inner_diagnostic_info = if mask & HAS_INNER_DIAGNOSTIC_INFO != 0 {
            let _lease = decoding_options.decoding_depth_gauge.enter()?;
            Some(Box::new(DiagnosticInfo::decode(stream, decoding_options)?))
        } else {
            None
        };
        Ok(DiagnosticInfo {
            symbolic_id,
            namespace_uri,
            locale,
            localized_text,
            additional_info,
            inner_status_code,
            inner_diagnostic_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_round_trip() {
        let di = DiagnosticInfo::default();
        let bytes = di.encode_to_vec();
        assert_eq!(bytes, vec![0x00]);
        let decoded = DiagnosticInfo::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, di);
    }

    #[test]
    fn chained_inner_diagnostics_round_trip() {
        let inner = DiagnosticInfo {
            additional_info: Some(UAString::from("root cause")),
            ..Default::default()
        };
        let outer = DiagnosticInfo {
            symbolic_id: Some(3),
            inner_diagnostic_info: Some(Box::new(inner)),
            ..Default::default()
        };
        let bytes = outer.encode_to_vec();
        let decoded = DiagnosticInfo::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, outer);
    }

    #[test]
    fn recursion_bounded_by_depth_gauge() {
        let opts = DecodingOptions {
            decoding_depth_gauge: DepthGauge::new(1),
            ..DecodingOptions::test()
        };
        let level2 = DiagnosticInfo {
            symbolic_id: Some(2),
            ..Default::default()
        };
        let level1 = DiagnosticInfo {
            symbolic_id: Some(1),
            inner_diagnostic_info: Some(Box::new(level2)),
            ..Default::default()
        };
        let bytes = level1.encode_to_vec();
        assert!(DiagnosticInfo::decode(&mut bytes.as_slice(), &opts).is_err());
    }

    #[test]
    fn reserved_bit_rejected() {
        let bytes = [0x80u8];
        assert!(DiagnosticInfo::decode(&mut bytes.as_slice(), &DecodingOptions::test()).is_err());
    }
}
