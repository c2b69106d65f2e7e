// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! [`SecurityHeader`] and related utilities: the part of an OPC UA TCP
//! message chunk identifying the security token and, for OPN chunks, the
//! sender's certificate (spec §4.4).

use std::io::{Read, Write};

use opcua_crypto::{SecurityPolicy, Thumbprint, X509};
use opcua_types::{
    byte_string::ByteString,
    constants,
    encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult, Error},
    status_code::StatusCode,
    string::UAString,
};

/// Chunks use an asymmetric security header while the channel is being
/// opened, a symmetric one for every subsequent message.
#[derive(Debug, Clone, PartialEq)]
pub enum SecurityHeader {
    Asymmetric(AsymmetricSecurityHeader),
    Symmetric(SymmetricSecurityHeader),
}

impl BinaryEncodable for SecurityHeader {
    fn byte_len(&self) -> usize {
        match self {
            SecurityHeader::Asymmetric(v) => v.byte_len(),
            SecurityHeader::Symmetric(v) => v.byte_len(),
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        match self {
            SecurityHeader::Asymmetric(v) => v.encode(stream),
            SecurityHeader::Symmetric(v) => v.encode(stream),
        }
    }
}

impl SecurityHeader {
    /// The chunk header's message type tells us which variant to expect;
    /// this can't be a plain `BinaryDecodable` impl.
    pub fn decode_from_stream<S: Read + ?Sized>(
        stream: &mut S,
        is_open_secure_channel: bool,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        if is_open_secure_channel {
            let header = AsymmetricSecurityHeader::decode(stream, decoding_options)?;
            let policy = if header.security_policy_uri.is_null() {
                SecurityPolicy::None
            } else {
                SecurityPolicy::from_uri(&header.security_policy_uri)
            };
            if policy == SecurityPolicy::Unknown {
                return Err(Error::new(
                    StatusCode::BadSecurityPolicyRejected,
                    format!("Unknown security policy URI {:?}", header.security_policy_uri),
                ));
            }
            Ok(SecurityHeader::Asymmetric(header))
        } else {
            Ok(SecurityHeader::Symmetric(SymmetricSecurityHeader::decode(
                stream,
                decoding_options,
            )?))
        }
    }
}

/// Security header for MSG/CLO chunks: just the current token id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymmetricSecurityHeader {
    pub token_id: u32,
}

impl BinaryEncodable for SymmetricSecurityHeader {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        self.token_id.encode(stream)
    }
}

impl BinaryDecodable for SymmetricSecurityHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, opts: &DecodingOptions) -> EncodingResult<Self> {
        Ok(SymmetricSecurityHeader {
            token_id: u32::decode(stream, opts)?,
        })
    }
}

/// Security header for OPN chunks: names the policy and carries the
/// sender's certificate plus the thumbprint of whichever certificate the
/// sender expects the receiver to be using.
#[derive(Debug, Clone, PartialEq)]
pub struct AsymmetricSecurityHeader {
    pub security_policy_uri: UAString,
    pub sender_certificate: ByteString,
    pub receiver_certificate_thumbprint: ByteString,
}

impl BinaryEncodable for AsymmetricSecurityHeader {
    fn byte_len(&self) -> usize {
        self.security_policy_uri.byte_len()
            + self.sender_certificate.byte_len()
            + self.receiver_certificate_thumbprint.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = self.security_policy_uri.encode(stream)?;
        size += self.sender_certificate.encode(stream)?;
        size += self.receiver_certificate_thumbprint.encode(stream)?;
        Ok(size)
    }
}

impl BinaryDecodable for AsymmetricSecurityHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, opts: &DecodingOptions) -> EncodingResult<Self> {
        let security_policy_uri = UAString::decode(stream, opts)?;
        let sender_certificate = ByteString::decode(stream, opts)?;
        let receiver_certificate_thumbprint = ByteString::decode(stream, opts)?;

        if sender_certificate.as_bytes().len() >= constants::MAX_CERTIFICATE_LENGTH {
            return Err(Error::new(
                StatusCode::BadEncodingLimitsExceeded,
                format!(
                    "Sender certificate has length {}, exceeds max {}",
                    sender_certificate.as_bytes().len(),
                    constants::MAX_CERTIFICATE_LENGTH
                ),
            ));
        }
        let thumbprint_len = receiver_certificate_thumbprint.as_bytes().len();
        if thumbprint_len > 0 && thumbprint_len != Thumbprint::THUMBPRINT_SIZE {
            return Err(Error::decoding(format!(
                "Receiver certificate thumbprint is {} bytes, expected {}",
                thumbprint_len,
                Thumbprint::THUMBPRINT_SIZE
            )));
        }
        Ok(AsymmetricSecurityHeader {
            security_policy_uri,
            sender_certificate,
            receiver_certificate_thumbprint,
        })
    }
}

impl AsymmetricSecurityHeader {
    /// Header for a channel secured with `SecurityPolicy::None`.
    pub fn none() -> Self {
        Self {
            security_policy_uri: SecurityPolicy::None.to_uri().into(),
            sender_certificate: ByteString::null(),
            receiver_certificate_thumbprint: ByteString::null(),
        }
    }

    /// Header naming `security_policy`, carrying `sender_certificate` and
    /// the thumbprint of the certificate the receiver should use to decrypt.
    pub fn new(
        security_policy: SecurityPolicy,
        sender_certificate: &X509,
        receiver_certificate_thumbprint: ByteString,
    ) -> Self {
        Self {
            security_policy_uri: security_policy.to_uri().into(),
            sender_certificate: sender_certificate.as_byte_string(),
            receiver_certificate_thumbprint,
        }
    }
}

/// Sequence number and request id carried by every chunk, immediately after
/// the security header (spec §4.4; sequence numbers wrap per Part 6 §6.7.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceHeader {
    pub sequence_number: u32,
    pub request_id: u32,
}

impl BinaryEncodable for SequenceHeader {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = self.sequence_number.encode(stream)?;
        size += self.request_id.encode(stream)?;
        Ok(size)
    }
}

impl BinaryDecodable for SequenceHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, opts: &DecodingOptions) -> EncodingResult<Self> {
        Ok(SequenceHeader {
            sequence_number: u32::decode(stream, opts)?,
            request_id: u32::decode(stream, opts)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_round_trip() {
        let header = SymmetricSecurityHeader { token_id: 7 };
        let bytes = header.encode_to_vec();
        let decoded =
            SymmetricSecurityHeader::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn oversized_certificate_rejected() {
        let mut bytes = Vec::new();
        UAString::from(SecurityPolicy::Basic256Sha256.to_uri())
            .encode(&mut bytes)
            .unwrap();
        let huge = vec![0u8; constants::MAX_CERTIFICATE_LENGTH];
        ByteString::from(huge).encode(&mut bytes).unwrap();
        ByteString::null().encode(&mut bytes).unwrap();
        let result = AsymmetricSecurityHeader::decode(&mut bytes.as_slice(), &DecodingOptions::test());
        assert!(result.is_err());
    }
}
