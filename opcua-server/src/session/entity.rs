// OPC UA server — SPDX-License-Identifier: MPL-2.0

//! [`Session`]: server-side session state (spec §3, §4.5).

use std::time::Instant;

use opcua_crypto::X509;
use opcua_types::{byte_string::ByteString, date_time::DateTime, node_id::NodeId};

use crate::identity::{ResolvedIdentity, Role};

/// Where a session sits in the CreateSession -> ActivateSession -> (use) ->
/// CloseSession/timeout lifecycle (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// `CreateSessionResponse` returned, `ActivateSessionRequest` not yet
    /// accepted. Only `ActivateSession` and `CloseSession` are legal.
    Created,
    /// At least one successful `ActivateSession`. Every session service is
    /// legal subject to role-based access control.
    Activated,
}

/// A server-side OPC UA session. Owned by [`crate::session::manager::SessionManager`];
/// never directly `Clone`d since `authentication_token` must stay unique.
pub struct Session {
    pub session_id: NodeId,
    pub authentication_token: NodeId,
    pub session_name: String,
    state: SessionState,
    /// The SecureChannel this session is currently bound to. `ActivateSession`
    /// may move a session to a different channel (session transfer, spec
    /// §4.5); every other service requires the request to arrive on this
    /// channel.
    secure_channel_id: u32,
    /// Client certificate presented at `CreateSession`, retained so a
    /// transfer's `client_signature` can be verified against it.
    pub client_certificate: Option<X509>,
    /// Most recent nonce this server generated; the client must sign it in
    /// its next `ActivateSessionRequest` (spec §4.5).
    server_nonce: ByteString,
    /// Timeout granted at creation, in milliseconds.
    pub session_timeout: f64,
    last_activity: Instant,
    pub identity: Option<ResolvedIdentity>,
    pub roles: Vec<Role>,
    /// Subscriptions this session currently owns, by id (spec §4.6).
    pub owned_subscriptions: Vec<u32>,
    pub max_request_message_size: u32,
}

impl Session {
    pub fn new(
        session_id: NodeId,
        authentication_token: NodeId,
        session_name: String,
        secure_channel_id: u32,
        client_certificate: Option<X509>,
        server_nonce: ByteString,
        session_timeout: f64,
        max_request_message_size: u32,
    ) -> Self {
        Session {
            session_id,
            authentication_token,
            session_name,
            state: SessionState::Created,
            secure_channel_id,
            client_certificate,
            server_nonce,
            session_timeout,
            last_activity: Instant::now(),
            identity: None,
            roles: Vec::new(),
            owned_subscriptions: Vec::new(),
            max_request_message_size,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn secure_channel_id(&self) -> u32 {
        self.secure_channel_id
    }

    pub fn server_nonce(&self) -> &ByteString {
        &self.server_nonce
    }

    /// Marks the session activated (or re-activated) on `secure_channel_id`,
    /// recording the identity/roles resolved from this call and issuing a
    /// fresh nonce for the next activation.
    pub fn activate(
        &mut self,
        secure_channel_id: u32,
        identity: ResolvedIdentity,
        roles: Vec<Role>,
        new_server_nonce: ByteString,
    ) {
        self.state = SessionState::Activated;
        self.secure_channel_id = secure_channel_id;
        self.identity = Some(identity);
        self.roles = roles;
        self.server_nonce = new_server_nonce;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// `true` once this session has been idle (no request touching it)
    /// longer than its granted timeout (spec §4.5).
    pub fn has_expired(&self) -> bool {
        self.last_activity.elapsed().as_secs_f64() * 1000.0 > self.session_timeout
    }

    pub fn deadline(&self) -> Instant {
        self.last_activity + std::time::Duration::from_secs_f64(self.session_timeout / 1000.0)
    }

    pub fn created_at(&self) -> DateTime {
        DateTime::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(
            NodeId::new(0, 1u32),
            NodeId::new(0, 2u32),
            "test".into(),
            7,
            None,
            ByteString::null(),
            50.0,
            1 << 16,
        )
    }

    #[test]
    fn created_session_has_not_expired_immediately() {
        assert!(!session().has_expired());
    }

    #[test]
    fn activate_transitions_state_and_rebinds_channel() {
        let mut s = session();
        s.activate(
            9,
            ResolvedIdentity {
                token: opcua_types::service_types::IdentityToken::Anonymous(Default::default()),
                certificate_subject: None,
                certificate_thumbprint: None,
                application_uri: None,
                held_roles: Vec::new(),
            },
            Vec::new(),
            ByteString::from(vec![1, 2, 3]),
        );
        assert_eq!(s.state(), SessionState::Activated);
        assert_eq!(s.secure_channel_id(), 9);
    }
}
