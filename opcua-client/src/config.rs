// OPC UA client — SPDX-License-Identifier: MPL-2.0

//! Client configuration: endpoint to dial, security to use, and the
//! [`opcua_core::config::Config`] surface loaded from a YAML file.

use opcua_core::config::Config;
use opcua_crypto::SecurityPolicy;
use opcua_types::service_types::{ApplicationType, MessageSecurityMode};
use opcua_types::UAString;
use serde::{Deserialize, Serialize};

/// Buffer/message-size limits this client advertises in `HEL` (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_message_size: usize,
    pub max_chunk_count: usize,
    pub send_buffer_size: usize,
    pub receive_buffer_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_message_size: opcua_types::constants::MAX_MESSAGE_SIZE,
            max_chunk_count: opcua_types::constants::MAX_CHUNK_COUNT,
            send_buffer_size: 65_536,
            receive_buffer_size: 65_536,
        }
    }
}

/// Top-level client configuration, loaded from YAML via
/// [`opcua_core::config::Config`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub application_name: String,
    pub application_uri: String,
    pub product_uri: String,
    pub host: String,
    pub port: u16,
    /// Path component appended to `opc.tcp://host:port` to form the
    /// endpoint url sent in `HEL`/`CreateSessionRequest`.
    pub endpoint_path: String,
    pub certificate_path: String,
    pub private_key_path: String,
    /// `"None"`, `"Basic256Sha256"`, `"Aes128-Sha256-RsaOaep"`, or
    /// `"Aes256-Sha256-RsaPss"` (spec §4.4).
    pub security_policy: String,
    /// One of `"None"`, `"Sign"`, `"SignAndEncrypt"`.
    pub security_mode: String,
    pub limits: Limits,
    /// Requested `OpenSecureChannelRequest.requested_lifetime`; `0` lets
    /// the server pick.
    pub requested_channel_lifetime_ms: u32,
    /// Requested `CreateSessionRequest.requested_session_timeout`.
    pub requested_session_timeout_ms: f64,
    /// Cap on the response size the client accepts for any single call.
    pub max_response_message_size: u32,
    /// How many `PublishRequest`s to keep outstanding per session, unless
    /// a subscription asks to hold fewer (spec §4.6).
    pub max_pending_publish_requests: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            application_name: "opcua-client".into(),
            application_uri: "urn:opcua-client".into(),
            product_uri: "urn:opcua-client:product".into(),
            host: "127.0.0.1".into(),
            port: 4840,
            endpoint_path: String::new(),
            certificate_path: "client.der".into(),
            private_key_path: "client.pem".into(),
            security_policy: "None".into(),
            security_mode: "None".into(),
            limits: Limits::default(),
            requested_channel_lifetime_ms: 3_600_000,
            requested_session_timeout_ms: 600_000.0,
            max_response_message_size: 0,
            max_pending_publish_requests: 10,
        }
    }
}

impl ClientConfig {
    pub fn base_endpoint(&self) -> String {
        format!("opc.tcp://{}:{}", self.host, self.port)
    }

    pub fn endpoint_url(&self) -> String {
        if self.endpoint_path.is_empty() || self.endpoint_path == "/" {
            self.base_endpoint()
        } else {
            format!("{}/{}", self.base_endpoint(), self.endpoint_path.trim_start_matches('/'))
        }
    }

    pub fn security_policy(&self) -> SecurityPolicy {
        SecurityPolicy::from_uri(&self.security_policy)
    }

    pub fn message_security_mode(&self) -> MessageSecurityMode {
        match self.security_mode.as_str() {
            "None" => MessageSecurityMode::None,
            "Sign" => MessageSecurityMode::Sign,
            "SignAndEncrypt" => MessageSecurityMode::SignAndEncrypt,
            _ => MessageSecurityMode::Invalid,
        }
    }
}

impl Config for ClientConfig {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self
            .security_policy()
            .is_valid_for_mode(self.message_security_mode() == MessageSecurityMode::None)
            .is_err()
        {
            errors.push(format!(
                "security policy {} is incompatible with mode {}",
                self.security_policy, self.security_mode
            ));
        }
        if self.limits.receive_buffer_size < opcua_core::comms::tcp_types::MIN_CHUNK_SIZE
            || self.limits.send_buffer_size < opcua_core::comms::tcp_types::MIN_CHUNK_SIZE
        {
            errors.push(format!(
                "limits.receive_buffer_size/send_buffer_size must be at least {}",
                opcua_core::comms::tcp_types::MIN_CHUNK_SIZE
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn application_name(&self) -> UAString {
        UAString::from(self.application_name.as_str())
    }

    fn application_uri(&self) -> UAString {
        UAString::from(self.application_uri.as_str())
    }

    fn product_uri(&self) -> UAString {
        UAString::from(self.product_uri.as_str())
    }

    fn application_type(&self) -> ApplicationType {
        ApplicationType::Client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_joins_path() {
        let mut config = ClientConfig::default();
        config.port = 4840;
        config.endpoint_path = "secure".into();
        assert_eq!(config.endpoint_url(), "opc.tcp://127.0.0.1:4840/secure");
    }

    #[test]
    fn incompatible_policy_and_mode_is_rejected() {
        let mut config = ClientConfig::default();
        config.security_policy = "Basic256Sha256".into();
        config.security_mode = "None".into();
        assert!(config.validate().is_err());
    }
}
