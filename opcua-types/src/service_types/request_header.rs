// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `RequestHeader`, present at the front of every service request (spec §4.5).

use opcua_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    date_time::DateTime, extension_object::ExtensionObject, node_id::NodeId, string::UAString,
};

/// Bit of `return_diagnostics` asking for the symbolic id of a failure.
pub const DIAGNOSTICS_SYMBOLIC_ID: u32 = 0x0000_0001;
/// Bit asking for a human-readable localized description of a failure.
pub const DIAGNOSTICS_LOCALIZED_TEXT: u32 = 0x0000_0002;
/// Bit asking for the additional-info string of a failure.
pub const DIAGNOSTICS_ADDITIONAL_INFO: u32 = 0x0000_0004;
/// Bit asking for the inner status code of a failure.
pub const DIAGNOSTICS_INNER_STATUS_CODE: u32 = 0x0000_0008;
/// Bit asking for the full recursive inner `DiagnosticInfo` of a failure.
pub const DIAGNOSTICS_INNER_DIAGNOSTICS: u32 = 0x0000_0010;

/// Common envelope carried by every service request.
#[derive(Debug, Clone, PartialEq, BinaryEncodable, BinaryDecodable)]
pub struct RequestHeader {
    /// Session this request belongs to, or null before a session exists
    /// (e.g. `CreateSessionRequest`, `OpenSecureChannelRequest`).
    pub authentication_token: NodeId,
    /// Client clock time the request was sent.
    pub timestamp: DateTime,
    /// Client-assigned handle, echoed back on the matching response so
    /// callers can correlate out-of-order replies.
    pub request_handle: u32,
    /// Bitmask of `DIAGNOSTICS_*` flags asking the server to include extra
    /// `DiagnosticInfo` detail in its response.
    pub return_diagnostics: u32,
    /// Opaque id a client can correlate against its own audit log.
    pub audit_entry_id: UAString,
    /// Milliseconds the client is willing to wait before giving up, or 0
    /// for no limit.
    pub timeout_hint: u32,
    /// Reserved extension point, unused by the core services.
    pub additional_header: ExtensionObject,
}

impl Default for RequestHeader {
    fn default() -> Self {
        Self {
            authentication_token: NodeId::null(),
            timestamp: DateTime::now(),
            request_handle: 0,
            return_diagnostics: 0,
            audit_entry_id: UAString::null(),
            timeout_hint: 0,
            additional_header: ExtensionObject::null(),
        }
    }
}

impl RequestHeader {
    /// Build a header for `authentication_token` with the given handle,
    /// timestamped now.
    pub fn new(authentication_token: NodeId, request_handle: u32, timeout_hint: u32) -> Self {
        Self {
            authentication_token,
            request_handle,
            timeout_hint,
            ..Default::default()
        }
    }
}

/// Implemented by every request type so service dispatch can extract the
/// client-assigned handle without matching on the concrete request type.
pub trait AsRequestHandle {
    /// The `request_handle` from this request's `RequestHeader`.
    fn request_handle(&self) -> u32;
}

impl AsRequestHandle for RequestHeader {
    fn request_handle(&self) -> u32 {
        self.request_handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};

    #[test]
    fn round_trip() {
        let header = RequestHeader::new(NodeId::null(), 42, 30_000);
        let bytes = header.encode_to_vec();
        let decoded = RequestHeader::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn default_has_null_authentication_token() {
        assert!(RequestHeader::default().authentication_token.is_null());
    }
}
