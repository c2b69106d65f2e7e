// OPC UA server — SPDX-License-Identifier: MPL-2.0

//! [`SessionManager`]: create/activate/close/expire for every session on
//! this server (spec §4.5). Owned by the single EventLoop thread (spec
//! §5) — every method takes `&mut self` directly, no internal locking.

use std::collections::HashMap;
use std::sync::Arc;

use opcua_core::comms::secure_channel::SecureChannel;
use opcua_crypto::{random, SecurityPolicy, X509};
use opcua_types::{
    byte_string::ByteString,
    node_id::NodeId,
    service_types::{
        ActivateSessionRequest, ActivateSessionResponse, CloseSessionRequest, CloseSessionResponse,
        CreateSessionRequest, CreateSessionResponse, IdentityToken, SignatureData,
    },
    status_code::StatusCode,
};

use crate::identity::ResolvedIdentity;
use crate::info::ServerInfo;
use crate::node_store::{AccessControl, CertificateVerification};
use crate::session::entity::Session;

const RSA_SHA256_SIGNATURE_ALGORITHM: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

/// Signs `data` with `pkey`, tagging the result with the algorithm URI this
/// stack always uses (RSA-SHA256, the only asymmetric signature
/// [`opcua_crypto::PrivateKey`] implements).
fn sign(pkey: &opcua_crypto::PrivateKey, data: &[u8]) -> Result<SignatureData, StatusCode> {
    let signature = pkey.sign_sha256(data).map_err(|_| StatusCode::BadSecurityChecksFailed)?;
    Ok(SignatureData {
        algorithm: RSA_SHA256_SIGNATURE_ALGORITHM.into(),
        signature: ByteString::from(signature),
    })
}

/// Verifies a [`SignatureData`] produced by [`sign`] against `cert`'s
/// public key.
fn verify(cert: &X509, data: &[u8], signature: &SignatureData) -> Result<(), StatusCode> {
    let public_key = cert.public_key().map_err(|_| StatusCode::BadCertificateInvalid)?;
    public_key
        .verify_sha256(data, signature.signature.as_bytes())
        .map_err(|_| StatusCode::BadApplicationSignatureInvalid)
}

/// Owns every session on this server. Sessions are keyed by
/// `authentication_token` for `O(1)` lookup on every subsequent request
/// (spec §4.5: every request after CreateSession carries this as its
/// `RequestHeader.authentication_token`).
pub struct SessionManager {
    sessions: HashMap<NodeId, Session>,
    info: Arc<ServerInfo>,
}

impl SessionManager {
    pub fn new(info: Arc<ServerInfo>) -> Self {
        SessionManager {
            sessions: HashMap::new(),
            info,
        }
    }

    pub fn find_by_token(&self, token: &NodeId) -> Option<&Session> {
        self.sessions.get(token)
    }

    pub fn find_by_token_mut(&mut self, token: &NodeId) -> Option<&mut Session> {
        self.sessions.get_mut(token)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// `CreateSessionRequest` (spec §4.5): validates the endpoint and (if
    /// the channel is secured) the client certificate, then allocates a new
    /// session bound to `channel`.
    pub fn create_session(
        &mut self,
        channel: &mut SecureChannel,
        cert_verification: &dyn CertificateVerification,
        request: &CreateSessionRequest,
    ) -> Result<CreateSessionResponse, StatusCode> {
        if self.sessions.len() >= self.info.config.limits.max_sessions {
            return Err(StatusCode::BadTooManySessions);
        }
        if !self
            .info
            .endpoint_exists(channel.security_policy(), channel.security_mode())
        {
            return Err(StatusCode::BadTcpEndpointUrlInvalid);
        }

        let security_policy = channel.security_policy();
        let mut client_certificate = None;
        if security_policy != SecurityPolicy::None {
            let cert = X509::from_byte_string(&request.client_certificate)
                .map_err(|_| StatusCode::BadCertificateInvalid)?;
            cert_verification.verify_certificate(&cert, security_policy)?;
            cert_verification.verify_application_uri(&cert, request.client_description.application_uri.as_ref())?;
            client_certificate = Some(cert);
        }

        let server_signature = if let Some(cert) = &client_certificate {
            let mut data = cert.as_der().to_vec();
            data.extend_from_slice(request.client_nonce.as_bytes());
            sign(&self.info.server_pkey, &data)?
        } else {
            SignatureData::default()
        };

        let session_timeout = if request.requested_session_timeout <= 0.0 {
            self.info.config.default_session_timeout_ms
        } else {
            request
                .requested_session_timeout
                .min(self.info.config.max_session_timeout_ms)
        };

        let nonce_len = security_policy.secure_channel_nonce_length().max(32);
        let session_id = NodeId::new(1, random::byte_string(16));
        let authentication_token = NodeId::new(0, random::byte_string(32));
        let server_nonce = random::byte_string(nonce_len);

        let session = Session::new(
            session_id.clone(),
            authentication_token.clone(),
            request.session_name.as_ref().to_string(),
            channel.secure_channel_id(),
            client_certificate,
            server_nonce.clone(),
            session_timeout,
            request.max_response_message_size,
        );
        self.sessions.insert(authentication_token.clone(), session);

        let mut response = CreateSessionResponse::new(
            request,
            session_id,
            authentication_token,
            session_timeout,
            server_nonce,
        );
        response.server_certificate = self.info.server_certificate_as_byte_string();
        response.server_endpoints = Some(self.info.new_endpoint_descriptions());
        response.server_signature = server_signature;
        response.max_request_message_size = self.info.config.limits.max_message_size as u32;
        Ok(response)
    }

    /// `ActivateSessionRequest` (spec §4.5): verifies the client's
    /// application-certificate signature over `server_certificate ||
    /// server_nonce`, resolves the presented identity into a role set, and
    /// marks the session activated — possibly on a *different* SecureChannel
    /// than it was created on (session transfer).
    pub fn activate_session(
        &mut self,
        channel: &mut SecureChannel,
        access_control: &dyn AccessControl,
        request: &ActivateSessionRequest,
    ) -> Result<ActivateSessionResponse, StatusCode> {
        let token = request.request_header.authentication_token.clone();
        let session = self
            .sessions
            .get_mut(&token)
            .ok_or(StatusCode::BadSessionIdInvalid)?;

        if session.state() == crate::session::entity::SessionState::Created
            && session.secure_channel_id() != channel.secure_channel_id()
        {
            return Err(StatusCode::BadSecureChannelIdInvalid);
        }

        if let Some(cert) = &session.client_certificate {
            let mut data = self.info.server_certificate_as_byte_string().as_bytes().to_vec();
            data.extend_from_slice(session.server_nonce().as_bytes());
            verify(cert, &data, &request.client_signature)?;
        }

        let identity_token = IdentityToken::from_extension_object(&request.user_identity_token)?;
        let identity = ResolvedIdentity {
            certificate_subject: session
                .client_certificate
                .as_ref()
                .and_then(|c| c.common_name()),
            certificate_thumbprint: session
                .client_certificate
                .as_ref()
                .map(|c| hex_thumbprint(c)),
            application_uri: channel.remote_cert().and_then(|c| c.common_name()),
            held_roles: Vec::new(),
            token: identity_token,
        };
        let roles = access_control.get_roles_for_identity(&identity);

        let nonce_len = channel.security_policy().secure_channel_nonce_length().max(32);
        let new_server_nonce = random::byte_string(nonce_len);
        session.activate(channel.secure_channel_id(), identity, roles, new_server_nonce.clone());

        Ok(ActivateSessionResponse::new(request, new_server_nonce))
    }

    /// `CloseSessionRequest` (spec §4.5). Returns the ids of subscriptions
    /// that must be destroyed by the subscription engine when
    /// `delete_subscriptions` is set; otherwise they are left owned by no
    /// session, adoptable later via `TransferSubscriptions`.
    pub fn close_session(
        &mut self,
        channel: &SecureChannel,
        request: &CloseSessionRequest,
    ) -> Result<(CloseSessionResponse, Vec<u32>), StatusCode> {
        let token = request.request_header.authentication_token.clone();
        let session = self
            .sessions
            .get(&token)
            .ok_or(StatusCode::BadSessionIdInvalid)?;
        if session.secure_channel_id() != channel.secure_channel_id() {
            return Err(StatusCode::BadSecureChannelIdInvalid);
        }
        let session = self.sessions.remove(&token).expect("just looked up above");
        let to_delete = if request.delete_subscriptions {
            session.owned_subscriptions
        } else {
            Vec::new()
        };
        Ok((CloseSessionResponse::new(request), to_delete))
    }

    /// Every session idle past its granted timeout (spec §4.5), removed
    /// from the manager. The caller (the subscription engine) still owns
    /// deciding whether each one's subscriptions are destroyed or orphaned
    /// via `ServerConfig::delete_subscriptions_on_timeout`.
    pub fn expire_sessions(&mut self) -> Vec<Session> {
        let expired_tokens: Vec<NodeId> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.has_expired())
            .map(|(token, _)| token.clone())
            .collect();
        expired_tokens
            .into_iter()
            .filter_map(|token| self.sessions.remove(&token))
            .collect()
    }
}

fn hex_thumbprint(cert: &X509) -> String {
    cert.thumbprint()
        .0
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_thumbprint_is_lowercase_and_right_length() {
        let thumbprint = opcua_crypto::Thumbprint::new(b"arbitrary bytes standing in for a DER certificate");
        let hex = thumbprint
            .0
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>();
        assert_eq!(hex.len(), 40);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
