// OPC UA server — SPDX-License-Identifier: MPL-2.0

//! [`ServerInfo`]: the server's own identity, certificate, and runtime
//! limits, shared read-only by every session and the subscription engine.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use opcua_core::config::Config;
use opcua_crypto::{CertificateStore, PrivateKey, SecurityPolicy, X509};
use opcua_types::service_types::{
    ApplicationDescription, EndpointDescription, MessageSecurityMode, UserTokenPolicy,
};
use opcua_types::{encoding::DecodingOptions, status_code::StatusCode, UAString};

use crate::config::{ServerConfig, ServerEndpoint};

/// Generates monotonically increasing ids for subscriptions, monitored
/// items, and secure channels. Wraps on overflow rather than panicking —
/// an id colliding with a still-live one after 2^32 allocations is not this
/// crate's problem to solve, matching the teacher's `AtomicHandle`.
#[derive(Debug, Default)]
pub struct IdGenerator(AtomicU32);

impl IdGenerator {
    pub fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}

/// The server's identity, certificate, and negotiated limits — constructed
/// once at startup and shared (`Arc`) by every session and the subscription
/// engine.
pub struct ServerInfo {
    pub config: ServerConfig,
    pub server_certificate: X509,
    pub server_pkey: PrivateKey,
    pub monitored_item_id_handle: IdGenerator,
    pub secure_channel_id_handle: IdGenerator,
    start_time: opcua_types::date_time::DateTime,
}

impl ServerInfo {
    pub fn new(
        config: ServerConfig,
        certificate_store: &CertificateStore,
    ) -> Result<Arc<Self>, StatusCode> {
        let server_certificate = certificate_store
            .read_own_cert()
            .map_err(|_| StatusCode::BadCertificateInvalid)?;
        let server_pkey = certificate_store
            .read_own_pkey()
            .map_err(|_| StatusCode::BadCertificateInvalid)?;
        Ok(Arc::new(ServerInfo {
            config,
            server_certificate,
            server_pkey,
            monitored_item_id_handle: IdGenerator::default(),
            secure_channel_id_handle: IdGenerator::default(),
            start_time: opcua_types::date_time::DateTime::now(),
        }))
    }

    pub fn start_time(&self) -> opcua_types::date_time::DateTime {
        self.start_time.clone()
    }

    pub fn decoding_options(&self) -> DecodingOptions {
        DecodingOptions {
            max_message_size: self.config.limits.max_message_size,
            max_chunk_count: self.config.limits.max_chunk_count,
            ..DecodingOptions::default()
        }
    }

    pub fn server_certificate_as_byte_string(&self) -> opcua_types::byte_string::ByteString {
        self.server_certificate.as_byte_string()
    }

    pub fn base_endpoint(&self) -> String {
        self.config.base_endpoint()
    }

    /// Looks up the configured endpoint matching a requested
    /// `(path, security_policy, security_mode)`, as used to validate the
    /// HELLO/endpoint-url and `CreateSessionRequest.endpoint_url` (spec
    /// §4.4, §4.5).
    pub fn endpoint_exists(
        &self,
        security_policy: SecurityPolicy,
        security_mode: MessageSecurityMode,
    ) -> bool {
        self.config
            .endpoints
            .iter()
            .any(|e| e.security_policy() == security_policy && e.message_security_mode() == security_mode)
    }

    pub fn find_endpoint(
        &self,
        security_policy: SecurityPolicy,
        security_mode: MessageSecurityMode,
    ) -> Option<&ServerEndpoint> {
        self.config
            .endpoints
            .iter()
            .find(|e| e.security_policy() == security_policy && e.message_security_mode() == security_mode)
    }

    /// Builds the `EndpointDescription` list returned by GetEndpoints and
    /// carried in a Hello/ACK-adjacent discovery response.
    pub fn new_endpoint_descriptions(&self) -> Vec<EndpointDescription> {
        self.config
            .endpoints
            .iter()
            .map(|e| self.new_endpoint_description(e))
            .collect()
    }

    pub fn new_endpoint_description(&self, endpoint: &ServerEndpoint) -> EndpointDescription {
        let server_certificate = if endpoint.message_security_mode() == MessageSecurityMode::None {
            opcua_types::byte_string::ByteString::null()
        } else {
            self.server_certificate_as_byte_string()
        };
        EndpointDescription {
            endpoint_url: UAString::from(endpoint.endpoint_url(&self.base_endpoint()).as_str()),
            server: self.config.application_description(),
            server_certificate,
            security_mode: endpoint.message_security_mode(),
            security_policy_uri: UAString::from(endpoint.security_policy.as_str()),
            user_identity_tokens: Some(
                endpoint
                    .user_token_ids
                    .iter()
                    .map(|id| UserTokenPolicy {
                        policy_id: UAString::from(id.as_str()),
                        ..Default::default()
                    })
                    .collect(),
            ),
            transport_profile_uri: UAString::from(
                "http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary",
            ),
            security_level: endpoint.security_level,
        }
    }

    pub fn application_description(&self) -> ApplicationDescription {
        self.config.application_description()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_generator_never_issues_zero() {
        let gen = IdGenerator::default();
        assert_ne!(gen.next(), 0);
        assert_ne!(gen.next(), gen.next());
    }
}
