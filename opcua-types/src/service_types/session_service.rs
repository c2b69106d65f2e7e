// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! CreateSession / ActivateSession / CloseSession messages (spec §4.5).

use opcua_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    byte_string::ByteString,
    date_time::DateTime,
    extension_object::ExtensionObject,
    node_id::NodeId,
    service_types::{
        application_description::ApplicationDescription,
        channel_security_token::SignatureData,
        request_header::{AsRequestHandle, RequestHeader},
        response_header::ResponseHeader,
    },
    string::UAString,
};

/// Opens a new `Session` bound to the SecureChannel the request arrives on
/// (spec §3, §4.5). The session is not usable until `ActivateSessionRequest`
/// succeeds.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CreateSessionRequest {
    /// Common request envelope. `authentication_token` is null: no session
    /// exists yet.
    pub request_header: RequestHeader,
    /// Identifies the requesting client application.
    pub client_description: ApplicationDescription,
    /// URL the client used to reach this endpoint, echoed back so the
    /// server can detect endpoint-URL spoofing.
    pub server_uri: UAString,
    pub endpoint_url: UAString,
    /// Human-readable name for this session, not required to be unique.
    pub session_name: UAString,
    /// Random bytes the server must sign (with its private key) in its
    /// response, proving possession of the certificate it presented at
    /// channel-open time.
    pub client_nonce: ByteString,
    /// DER-encoded client certificate, present when the endpoint requires
    /// sender authentication.
    pub client_certificate: ByteString,
    /// Requested maximum time a session may be idle before the server may
    /// discard it. The server may revise this down.
    pub requested_session_timeout: f64,
    /// Largest response (including all chunks) the client is willing to
    /// receive for any single service call.
    pub max_response_message_size: u32,
}

impl AsRequestHandle for CreateSessionRequest {
    fn request_handle(&self) -> u32 {
        self.request_header.request_handle
    }
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CreateSessionResponse {
    pub response_header: ResponseHeader,
    /// Identifies the new session internally; used as the
    /// `authentication_token` once activated.
    pub session_id: NodeId,
    /// The value to use as `authentication_token` in subsequent requests
    /// on this session, until `ActivateSessionResponse` issues a new one.
    pub authentication_token: NodeId,
    /// The session timeout actually granted.
    pub revised_session_timeout: f64,
    /// Random bytes the client must sign in `ActivateSessionRequest`.
    pub server_nonce: ByteString,
    /// DER-encoded server certificate.
    pub server_certificate: ByteString,
    /// Endpoints the server considers equally valid for this session, used
    /// by the client to detect a man-in-the-middle substituting the
    /// endpoint list during discovery.
    pub server_endpoints: Option<Vec<crate::service_types::application_description::EndpointDescription>>,
    /// DER-encoded certificates forming the signing chain for
    /// `server_certificate`, if any.
    pub server_software_certificates: Option<Vec<ByteString>>,
    /// Signs `client_certificate || client_nonce` with the server's private
    /// key.
    pub server_signature: SignatureData,
    /// Largest request the server is willing to accept for any single
    /// service call.
    pub max_request_message_size: u32,
}

impl CreateSessionResponse {
    /// Build a response for `request`, timestamped now, carrying a `Good`
    /// result.
    pub fn new(
        request: &CreateSessionRequest,
        session_id: NodeId,
        authentication_token: NodeId,
        revised_session_timeout: f64,
        server_nonce: ByteString,
    ) -> Self {
        Self {
            response_header: ResponseHeader::new_good(request),
            session_id,
            authentication_token,
            revised_session_timeout,
            server_nonce,
            ..Default::default()
        }
    }
}

/// Proves the client's identity and supplies a user identity token,
/// transitioning a freshly created session into a usable one (spec §4.5).
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ActivateSessionRequest {
    /// `authentication_token` here is the session's id from
    /// `CreateSessionResponse`.
    pub request_header: RequestHeader,
    /// Signs `server_certificate || server_nonce` with the client's private
    /// key, proving possession of the certificate named in
    /// `CreateSessionRequest`.
    pub client_signature: SignatureData,
    /// DER-encoded certificates of any software layered between the
    /// application and the stack, for audit purposes.
    pub client_software_certificates: Option<Vec<ByteString>>,
    /// Locale preferences, most preferred first, used to pick
    /// `LocalizedText` translations in subsequent responses.
    pub locale_ids: Option<Vec<UAString>>,
    /// One of the `UserTokenPolicy` ids the endpoint advertised, plus
    /// credential data appropriate to that policy.
    pub user_identity_token: ExtensionObject,
    /// Signs the previous `server_nonce` with the user credential's key,
    /// when the token type supports it.
    pub user_token_signature: SignatureData,
}

impl AsRequestHandle for ActivateSessionRequest {
    fn request_handle(&self) -> u32 {
        self.request_header.request_handle
    }
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ActivateSessionResponse {
    pub response_header: ResponseHeader,
    /// Fresh nonce the client must use when signing future
    /// `ActivateSessionRequest`s on this session, e.g. after a transfer.
    pub server_nonce: ByteString,
    /// One entry per token in `client_software_certificates`, in order.
    pub results: Option<Vec<crate::status_code::StatusCode>>,
    pub diagnostic_infos: Option<Vec<crate::diagnostic_info::DiagnosticInfo>>,
}

impl ActivateSessionResponse {
    /// Build a `Good` response for `request` with a freshly issued nonce.
    pub fn new(request: &ActivateSessionRequest, server_nonce: ByteString) -> Self {
        Self {
            response_header: ResponseHeader::new_good(request),
            server_nonce,
            ..Default::default()
        }
    }
}

/// Ends a session, optionally deleting every `Subscription` owned by it
/// (spec §4.5).
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CloseSessionRequest {
    pub request_header: RequestHeader,
    /// If false, subscriptions outlive the session for possible transfer to
    /// another session (spec §4.6, §7).
    pub delete_subscriptions: bool,
}

impl AsRequestHandle for CloseSessionRequest {
    fn request_handle(&self) -> u32 {
        self.request_header.request_handle
    }
}

#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CloseSessionResponse {
    pub response_header: ResponseHeader,
}

impl CloseSessionResponse {
    /// Build a `Good` response for `request`.
    pub fn new(request: &CloseSessionRequest) -> Self {
        Self {
            response_header: ResponseHeader::new_good(request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};

    #[test]
    fn create_session_round_trip() {
        let req = CreateSessionRequest {
            request_header: RequestHeader::new(NodeId::null(), 1, 10_000),
            session_name: "test-session".into(),
            requested_session_timeout: 60_000.0,
            max_response_message_size: 1 << 20,
            ..Default::default()
        };
        let bytes = req.encode_to_vec();
        let decoded =
            CreateSessionRequest::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn close_session_response_echoes_good() {
        let req = CloseSessionRequest {
            request_header: RequestHeader::new(NodeId::null(), 3, 0),
            delete_subscriptions: true,
        };
        let resp = CloseSessionResponse::new(&req);
        assert_eq!(resp.response_header.request_handle, 3);
        assert_eq!(resp.response_header.service_result, crate::status_code::StatusCode::Good);
    }
}
