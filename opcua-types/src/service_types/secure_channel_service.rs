// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `OpenSecureChannel`/`CloseSecureChannel`, the services that establish and
//! tear down a `SecureChannel`'s token (spec §4.4).

use opcua_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    byte_string::ByteString,
    service_types::{
        channel_security_token::ChannelSecurityToken,
        enums::{MessageSecurityMode, SecurityTokenRequestType},
        request_header::{AsRequestHandle, RequestHeader},
        response_header::ResponseHeader,
    },
};

/// Request to open a new channel, or renew the token of an existing one.
#[derive(Debug, Clone, PartialEq, BinaryEncodable, BinaryDecodable)]
pub struct OpenSecureChannelRequest {
    pub request_header: RequestHeader,
    /// Spec version this client implements; servers reject unrecognized values.
    pub client_protocol_version: u32,
    pub request_type: SecurityTokenRequestType,
    pub security_mode: MessageSecurityMode,
    /// Nonce the server mixes with its own to derive symmetric keys
    /// (ignored when `security_mode` is `None`).
    pub client_nonce: ByteString,
    /// Lifetime the client is requesting for the token, in milliseconds.
    pub requested_lifetime: u32,
}

impl AsRequestHandle for OpenSecureChannelRequest {
    fn request_handle(&self) -> u32 {
        self.request_header.request_handle
    }
}

#[derive(Debug, Clone, PartialEq, BinaryEncodable, BinaryDecodable)]
pub struct OpenSecureChannelResponse {
    pub response_header: ResponseHeader,
    pub server_protocol_version: u32,
    pub security_token: ChannelSecurityToken,
    /// Nonce the client mixes with its own to derive symmetric keys.
    pub server_nonce: ByteString,
}

#[derive(Debug, Clone, PartialEq, BinaryEncodable, BinaryDecodable)]
pub struct CloseSecureChannelRequest {
    pub request_header: RequestHeader,
}

impl AsRequestHandle for CloseSecureChannelRequest {
    fn request_handle(&self) -> u32 {
        self.request_header.request_handle
    }
}

#[derive(Debug, Clone, PartialEq, BinaryEncodable, BinaryDecodable)]
pub struct CloseSecureChannelResponse {
    pub response_header: ResponseHeader,
}

/// URI of the anonymous (no security) policy, used by `Hello`/`Acknowledge`
/// and as the default when none is negotiated.
pub const SECURITY_POLICY_NONE_URI: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};

    #[test]
    fn open_secure_channel_request_round_trip() {
        let request = OpenSecureChannelRequest {
            request_header: RequestHeader::default(),
            client_protocol_version: 0,
            request_type: SecurityTokenRequestType::Issue,
            security_mode: MessageSecurityMode::None,
            client_nonce: ByteString::null(),
            requested_lifetime: 60_000,
        };
        let bytes = request.encode_to_vec();
        let decoded =
            OpenSecureChannelRequest::decode(&mut bytes.as_slice(), &DecodingOptions::test())
                .unwrap();
        assert_eq!(decoded, request);
    }
}
