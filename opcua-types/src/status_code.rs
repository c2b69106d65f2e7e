// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `StatusCode`, the 32-bit result code carried on (almost) every wire
//! message. Top 2 bits are severity (spec §3): `00` good, `01` uncertain,
//! `10`/`11` bad.

#![allow(non_upper_case_globals)]

use std::fmt;

use crate::encoding::{read_u32, write_u32, BinaryDecodable, BinaryEncodable, EncodingResult};

/// Top 2 bits of a `StatusCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// `00`
    Good,
    /// `01`
    Uncertain,
    /// `10` or `11`
    Bad,
}

/// A 32-bit OPC UA status/result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusCode(pub u32);

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.description(), self.0)
    }
}

impl StatusCode {
    /// Severity encoded in the top 2 bits of the code.
    pub fn severity(&self) -> Severity {
        match self.0 >> 30 {
            0b00 => Severity::Good,
            0b01 => Severity::Uncertain,
            _ => Severity::Bad,
        }
    }

    /// `true` for a `Good` severity code.
    pub fn is_good(&self) -> bool {
        self.severity() == Severity::Good
    }

    /// `true` for an `Uncertain` severity code.
    pub fn is_uncertain(&self) -> bool {
        self.severity() == Severity::Uncertain
    }

    /// `true` for a `Bad` severity code.
    pub fn is_bad(&self) -> bool {
        self.severity() == Severity::Bad
    }

    /// Strip the sub-code bits (low 16 bits), leaving only severity + code,
    /// as required before putting a status on the wire in some contexts.
    pub fn mask_sub_code(&self) -> StatusCode {
        StatusCode(self.0 & 0xFFFF_0000)
    }
}

macro_rules! status_codes {
    ($( $name:ident = $value:expr ),* $(,)?) => {
        impl StatusCode {
            $(
                #[doc = stringify!($name)]
                pub const $name: StatusCode = StatusCode($value);
            )*

            /// Human-readable name for this code, falling back to the raw
            /// hex value if it isn't one of the known constants.
            pub fn description(&self) -> &'static str {
                match self.0 {
                    $( $value => stringify!($name), )*
                    _ => "Unknown",
                }
            }
        }
    };
}

status_codes! {
    Good = 0x0000_0000,
    GoodCallAgain = 0x00A6_0000,
    GoodSubscriptionTransferred = 0x002D_0000,
    Uncertain = 0x4000_0000,

    Bad = 0x8000_0000,
    BadUnexpectedError = 0x8001_0000,
    BadOutOfMemory = 0x8002_0000,
    BadNotImplemented = 0x8004_0000,
    BadTimeout = 0x800A_0000,
    BadInvalidState = 0x8011_0000,
    BadDecodingError = 0x8007_0000,
    BadEncodingError = 0x8008_0000,
    BadEncodingLimitsExceeded = 0x8009_0000,
    BadRequestTooLarge = 0x80B8_0000,
    BadResponseTooLarge = 0x80B9_0000,
    BadUnknownResponse = 0x8001_4000,
    BadInternalError = 0x8029_0000,
    BadOutOfRange = 0x803C_0000,
    BadNotSupported = 0x803D_0000,
    BadNoMatch = 0x803E_0000,

    BadTcpServerTooBusy = 0x807B_0000,
    BadTcpMessageTypeInvalid = 0x807C_0000,
    BadTcpSecureChannelUnknown = 0x807D_0000,
    BadTcpMessageTooLarge = 0x807E_0000,
    BadTcpNotEnoughResources = 0x807F_0000,
    BadTcpInternalError = 0x8080_0000,
    BadTcpEndpointUrlInvalid = 0x8081_0000,

    BadSecurityChecksFailed = 0x8130_0000,
    BadCertificateInvalid = 0x8082_0000,
    BadSecurityPolicyRejected = 0x80E1_0000,
    BadSecurityModeRejected = 0x80E0_0000,
    BadNoValidCertificates = 0x80E2_0000,
    BadSecureChannelClosed = 0x8086_0000,
    BadSecureChannelIdInvalid = 0x8087_0000,
    BadSequenceNumberInvalid = 0x80E6_0000,
    BadNonceInvalid = 0x8088_0000,
    BadSessionIdInvalid = 0x8089_0000,
    BadSessionClosed = 0x808A_0000,
    BadSessionNotActivated = 0x808B_0000,
    BadSubscriptionIdInvalid = 0x808C_0000,
    BadRequestHeaderInvalid = 0x802E_0000,
    BadTimestampsToReturnInvalid = 0x802F_0000,
    BadRequestCancelledByClient = 0x8033_0000,
    BadTooManyOperations = 0x80E5_0000,
    BadTooManySessions = 0x80F1_0000,
    BadTooManySubscriptions = 0x80EE_0000,
    BadTooManyPublishRequests = 0x80C8_0000,
    BadTooManyMonitoredItems = 0x80DB_0000,
    BadMonitoredItemIdInvalid = 0x80A2_0000,
    BadMonitoringModeInvalid = 0x8199_0000,
    BadSequenceNumberUnknown = 0x80C6_0000,
    BadMessageNotAvailable = 0x80C7_0000,
    BadNodeIdUnknown = 0x8034_0000,
    BadNodeIdInvalid = 0x8035_0000,
    BadAttributeIdInvalid = 0x8038_0000,
    BadIdentityTokenInvalid = 0x8044_0000,
    BadIdentityTokenRejected = 0x8045_0000,
    BadUserAccessDenied = 0x801F_0000,
    BadUserSignatureInvalid = 0x8047_0000,
    BadApplicationSignatureInvalid = 0x8046_0000,
    BadDataEncodingInvalid = 0x8039_0000,
    BadDataEncodingUnsupported = 0x803A_0000,
    BadConnectionClosed = 0x80AE_0000,
    BadConnectionRejected = 0x80AF_0000,
    BadServerHalted = 0x800E_0000,
    BadCommunicationError = 0x8050_0000,
    BadDeadbandFilterInvalid = 0x80DD_0000,
    BadFilterNotAllowed = 0x8045_4000,
    BadEventFilterInvalid = 0x8061_0000,
    BadEventIdUnknown = 0x80BF_0000,
}

impl BinaryEncodable for StatusCode {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: std::io::Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_u32(stream, self.0)
    }
}

impl BinaryDecodable for StatusCode {
    fn decode<S: std::io::Read + ?Sized>(
        stream: &mut S,
        _: &crate::encoding::DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(StatusCode(read_u32(stream)?))
    }
}

impl From<StatusCode> for u32 {
    fn from(value: StatusCode) -> Self {
        value.0
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        StatusCode(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_bits() {
        assert_eq!(StatusCode::Good.severity(), Severity::Good);
        assert_eq!(StatusCode::GoodCallAgain.severity(), Severity::Good);
        assert_eq!(StatusCode::Uncertain.severity(), Severity::Uncertain);
        assert_eq!(StatusCode::BadDecodingError.severity(), Severity::Bad);
        assert_eq!(StatusCode::BadTimeout.severity(), Severity::Bad);
    }

    #[test]
    fn round_trip() {
        let mut buf = Vec::new();
        StatusCode::BadSequenceNumberUnknown.encode(&mut buf).unwrap();
        let decoded = StatusCode::decode(&mut buf.as_slice(), &crate::encoding::DecodingOptions::test()).unwrap();
        assert_eq!(decoded, StatusCode::BadSequenceNumberUnknown);
    }
}
