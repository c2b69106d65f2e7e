// OPC UA client — SPDX-License-Identifier: MPL-2.0

//! Client-side Session state machine: builds `CreateSession` /
//! `ActivateSession` / `CloseSession` requests and tracks what a response
//! grants (spec §4.5).

use opcua_core::config::Config;
use opcua_crypto::PrivateKey;
use opcua_types::{
    byte_string::ByteString,
    localized_text::LocalizedText,
    node_id::NodeId,
    service_types::{
        ActivateSessionRequest, ActivateSessionResponse, ApplicationDescription, CloseSessionRequest,
        CreateSessionRequest, CreateSessionResponse, IdentityToken, RequestHeader, SignatureData,
    },
    status_code::StatusCode,
};

use crate::config::ClientConfig;

const RSA_SHA256_SIGNATURE_ALGORITHM: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

/// Where this session sits in the CreateSession -> ActivateSession ->
/// (use) -> CloseSession lifecycle (spec §4.5), from the client's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No `CreateSessionRequest` sent yet.
    Fresh,
    /// `CreateSessionRequest` sent, response not yet seen.
    CreatePending,
    /// `CreateSessionResponse` accepted; `ActivateSessionRequest` not yet
    /// sent or not yet acknowledged.
    Created,
    /// `ActivateSessionRequest` sent, response not yet seen.
    ActivatePending,
    /// At least one successful `ActivateSessionResponse`; every session
    /// service is legal.
    Activated,
    Closed,
}

/// Client-side session: owns the handles a `CreateSessionResponse` grants
/// and signs the nonces `ActivateSessionRequest` requires.
pub struct Session {
    state: SessionState,
    session_id: NodeId,
    authentication_token: NodeId,
    server_nonce: ByteString,
    server_certificate: ByteString,
    revised_session_timeout: f64,
    max_request_message_size: u32,
    next_request_handle: u32,
}

impl Default for Session {
    fn default() -> Self {
        Session {
            state: SessionState::Fresh,
            session_id: NodeId::null(),
            authentication_token: NodeId::null(),
            server_nonce: ByteString::null(),
            server_certificate: ByteString::null(),
            revised_session_timeout: 0.0,
            max_request_message_size: 0,
            next_request_handle: 1,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> &NodeId {
        &self.session_id
    }

    pub fn authentication_token(&self) -> &NodeId {
        &self.authentication_token
    }

    pub fn revised_session_timeout(&self) -> f64 {
        self.revised_session_timeout
    }

    /// Largest request the server will accept for any single service call
    /// on this session, or `0` for no limit.
    pub fn max_request_message_size(&self) -> u32 {
        self.max_request_message_size
    }

    /// Allocates the next `RequestHeader.request_handle`, wrapping to 1
    /// rather than 0 (0 is reserved to mean "no handle" in diagnostics
    /// cross-references).
    fn next_handle(&mut self) -> u32 {
        let handle = self.next_request_handle;
        self.next_request_handle = if handle == u32::MAX { 1 } else { handle + 1 };
        handle
    }

    fn request_header(&mut self, timeout_hint: u32) -> RequestHeader {
        RequestHeader::new(self.authentication_token.clone(), self.next_handle(), timeout_hint)
    }

    /// Builds a `CreateSessionRequest` against `config`'s identity and
    /// endpoint, generating a fresh client nonce to send. Before the
    /// channel has sent `HEL`/`OPN`, `authentication_token` is null, which
    /// is correct: no session exists yet.
    pub fn create_session_request(
        &mut self,
        config: &ClientConfig,
        client_nonce: ByteString,
        client_certificate: ByteString,
    ) -> CreateSessionRequest {
        self.state = SessionState::CreatePending;
        CreateSessionRequest {
            request_header: self.request_header(0),
            client_description: ApplicationDescription {
                application_uri: config.application_uri(),
                product_uri: config.product_uri(),
                application_name: LocalizedText::new(config.application_name.as_str()),
                application_type: config.application_type(),
                gateway_server_uri: Default::default(),
                discovery_profile_uri: Default::default(),
                discovery_urls: None,
            },
            server_uri: Default::default(),
            endpoint_url: config.endpoint_url().as_str().into(),
            session_name: format!("{}-session", config.application_name).into(),
            client_nonce,
            client_certificate,
            requested_session_timeout: config.requested_session_timeout_ms,
            max_response_message_size: config.max_response_message_size,
        }
    }

    /// Records what `CreateSessionResponse` granted. The session is not yet
    /// usable: `ActivateSessionRequest` must still succeed.
    pub fn accept_create_session_response(&mut self, response: &CreateSessionResponse) -> Result<(), StatusCode> {
        if !response.response_header.service_result.is_good() {
            self.state = SessionState::Fresh;
            return Err(response.response_header.service_result);
        }
        self.session_id = response.session_id.clone();
        self.authentication_token = response.authentication_token.clone();
        self.server_nonce = response.server_nonce.clone();
        self.server_certificate = response.server_certificate.clone();
        self.revised_session_timeout = response.revised_session_timeout;
        self.max_request_message_size = response.max_request_message_size;
        self.state = SessionState::Created;
        Ok(())
    }

    /// Builds an `ActivateSessionRequest`, signing `server_certificate ||
    /// server_nonce` with `client_private_key` when one is configured
    /// (required once the channel's `SecurityPolicy` is not `None`), and
    /// carrying `identity` as the user credential. The signature over the
    /// server's certificate proves possession of the private key matching
    /// the certificate presented at channel-open time; no client
    /// certificate is carried in this request itself.
    pub fn activate_session_request(
        &mut self,
        client_private_key: Option<&PrivateKey>,
        identity: IdentityToken,
    ) -> Result<ActivateSessionRequest, StatusCode> {
        let client_signature = match client_private_key {
            Some(pkey) => {
                let mut data = self.server_certificate.as_bytes().to_vec();
                data.extend_from_slice(self.server_nonce.as_bytes());
                let signature = pkey.sign_sha256(&data).map_err(|_| StatusCode::BadSecurityChecksFailed)?;
                SignatureData {
                    algorithm: RSA_SHA256_SIGNATURE_ALGORITHM.into(),
                    signature: ByteString::from(signature),
                }
            }
            None => SignatureData::default(),
        };
        self.state = SessionState::ActivatePending;
        Ok(ActivateSessionRequest {
            request_header: self.request_header(0),
            client_signature,
            client_software_certificates: None,
            locale_ids: None,
            user_identity_token: identity.to_extension_object(),
            user_token_signature: SignatureData::default(),
        })
    }

    /// Records a fresh `server_nonce` and marks the session usable.
    pub fn accept_activate_session_response(&mut self, response: &ActivateSessionResponse) -> Result<(), StatusCode> {
        if !response.response_header.service_result.is_good() {
            self.state = SessionState::Created;
            return Err(response.response_header.service_result);
        }
        self.server_nonce = response.server_nonce.clone();
        self.state = SessionState::Activated;
        Ok(())
    }

    pub fn close_session_request(&mut self, delete_subscriptions: bool) -> CloseSessionRequest {
        CloseSessionRequest {
            request_header: self.request_header(0),
            delete_subscriptions,
        }
    }

    pub fn mark_closed(&mut self) {
        self.state = SessionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_types::service_types::ResponseHeader;

    fn good_header() -> ResponseHeader {
        ResponseHeader {
            service_result: StatusCode::Good,
            ..Default::default()
        }
    }

    #[test]
    fn create_then_activate_transitions_state() {
        let mut session = Session::new();
        let config = ClientConfig::default();
        let request = session.create_session_request(&config, ByteString::from(b"nonce".to_vec()), ByteString::null());
        assert_eq!(session.state(), SessionState::CreatePending);
        assert!(request.request_header.authentication_token.is_null());

        let response = CreateSessionResponse {
            response_header: good_header(),
            session_id: NodeId::new(1, 7u32),
            authentication_token: NodeId::new(0, 9u32),
            revised_session_timeout: 30_000.0,
            server_nonce: ByteString::from(b"server-nonce".to_vec()),
            server_certificate: ByteString::null(),
            server_endpoints: None,
            server_software_certificates: None,
            server_signature: SignatureData::default(),
            max_request_message_size: 0,
        };
        session.accept_create_session_response(&response).unwrap();
        assert_eq!(session.state(), SessionState::Created);
        assert_eq!(session.authentication_token(), &NodeId::new(0, 9u32));

        let activate = session
            .activate_session_request(None, IdentityToken::Anonymous(Default::default()))
            .unwrap();
        assert_eq!(session.state(), SessionState::ActivatePending);
        assert_eq!(activate.request_header.authentication_token, NodeId::new(0, 9u32));

        let activate_response = ActivateSessionResponse {
            response_header: good_header(),
            server_nonce: ByteString::from(b"server-nonce-2".to_vec()),
            results: None,
            diagnostic_infos: None,
        };
        session.accept_activate_session_response(&activate_response).unwrap();
        assert_eq!(session.state(), SessionState::Activated);
    }
}
