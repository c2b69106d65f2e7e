// OPC UA server — SPDX-License-Identifier: MPL-2.0

//! Server configuration: endpoints, operational limits, and the
//! [`opcua_core::config::Config`] surface loaded from a YAML file.

use std::collections::BTreeSet;

use opcua_core::config::{Config, ConfigError};
use opcua_crypto::SecurityPolicy;
use opcua_types::service_types::{ApplicationType, MessageSecurityMode};
use opcua_types::{LocalizedText, UAString};
use serde::{Deserialize, Serialize};

/// One combination of transport path, security policy/mode, and accepted
/// user tokens a server listens on (spec §4.4). Mirrors the fields a
/// `GetEndpoints`/Hello exchange needs to build an `EndpointDescription`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEndpoint {
    /// Path component appended to the server's base `opc.tcp://host:port`.
    pub path: String,
    /// Security policy URI, or the bare "None" for no security.
    pub security_policy: String,
    /// One of `"None"`, `"Sign"`, `"SignAndEncrypt"`.
    pub security_mode: String,
    /// Relative trust ranking advertised in the `EndpointDescription`.
    pub security_level: u8,
    /// Policy ids (matching `UserTokenPolicy::policy_id`) this endpoint
    /// accepts.
    pub user_token_ids: BTreeSet<String>,
}

impl ServerEndpoint {
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

    /// Checks this endpoint is internally consistent: the security
    /// policy/mode pair is legal and every referenced user token id is
    /// actually defined (spec §4.4).
    pub fn validate(&self, known_user_token_ids: &BTreeSet<String>) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self
            .security_policy()
            .is_valid_for_mode(self.message_security_mode() == MessageSecurityMode::None)
            .is_err()
        {
            errors.push(format!(
                "endpoint {}: security policy {} is incompatible with mode {}",
                self.path, self.security_policy, self.security_mode
            ));
        }
        for id in &self.user_token_ids {
            if !known_user_token_ids.contains(id) {
                errors.push(format!(
                    "endpoint {}: references unknown user token policy {id}",
                    self.path
                ));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn endpoint_url(&self, base_endpoint: &str) -> String {
        if self.path.is_empty() || self.path == "/" {
            base_endpoint.to_string()
        } else {
            format!("{}/{}", base_endpoint.trim_end_matches('/'), self.path.trim_start_matches('/'))
        }
    }
}

/// Subscription/MonitoredItem bounds (spec §4.6), defaulted to the values
/// the spec's worked examples assume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionLimits {
    pub max_subscriptions_per_session: usize,
    /// Bound on the per-session publish-request FIFO (spec §4.6: "default 10").
    pub max_pending_publish_requests: usize,
    pub max_monitored_items_per_sub: usize,
    pub max_monitored_item_queue_size: usize,
    pub max_keep_alive_count: u32,
    pub default_keep_alive_count: u32,
    /// `lifetime_counter`'s starting value; spec §4.6 requires at least 3x
    /// the keep-alive count.
    pub max_lifetime_count: u32,
    pub max_notifications_per_publish: u32,
    /// Retransmission queue bound (spec §4.6: "default 100").
    pub max_queued_notifications: usize,
    pub min_publishing_interval_ms: f64,
    pub min_sampling_interval_ms: f64,
}

impl Default for SubscriptionLimits {
    fn default() -> Self {
        SubscriptionLimits {
            max_subscriptions_per_session: 100,
            max_pending_publish_requests: 10,
            max_monitored_items_per_sub: 1000,
            max_monitored_item_queue_size: 100,
            max_keep_alive_count: 10,
            default_keep_alive_count: 10,
            max_lifetime_count: 30,
            max_notifications_per_publish: 1000,
            max_queued_notifications: 100,
            min_publishing_interval_ms: 100.0,
            min_sampling_interval_ms: 100.0,
        }
    }
}

/// Per-request item-count quotas enforced by the service dispatch shim
/// (spec §4.7). Read/Write/Browse bodies themselves are out of scope
/// (spec §1); these quotas still apply to the request envelopes this crate
/// does dispatch (CreateMonitoredItems et al).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationalLimits {
    pub max_monitored_items_per_call: usize,
    pub max_nodes_per_read: usize,
    pub max_nodes_per_write: usize,
    pub max_nodes_per_browse: usize,
}

impl Default for OperationalLimits {
    fn default() -> Self {
        OperationalLimits {
            max_monitored_items_per_call: 1000,
            max_nodes_per_read: 1000,
            max_nodes_per_write: 1000,
            max_nodes_per_browse: 1000,
        }
    }
}

/// Resource limits and buffer sizing (spec §4.2-§4.7), grouping the
/// subscription and per-call quota tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_message_size: usize,
    pub max_chunk_count: usize,
    pub send_buffer_size: usize,
    pub receive_buffer_size: usize,
    pub max_sessions: usize,
    /// Ceiling applied to a client's requested SecureChannel token lifetime
    /// (spec §4.4 `OpenSecureChannelRequest.requested_lifetime`); `0` in the
    /// request is revised up to this value.
    pub max_channel_token_lifetime_ms: u32,
    pub subscriptions: SubscriptionLimits,
    pub operational: OperationalLimits,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_message_size: opcua_types::constants::MAX_MESSAGE_SIZE,
            max_chunk_count: opcua_types::constants::MAX_CHUNK_COUNT,
            send_buffer_size: 65_536,
            receive_buffer_size: 65_536,
            max_sessions: 100,
            max_channel_token_lifetime_ms: 3_600_000,
            subscriptions: SubscriptionLimits::default(),
            operational: OperationalLimits::default(),
        }
    }
}

/// Server-advertised capabilities (spec §6 `ServerCapabilities` surface).
/// History capabilities are out of scope (spec §1) and not modeled.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Conformance-unit profile URIs this server claims to implement.
    pub profiles: Vec<String>,
}

/// Top-level server configuration, loaded from YAML via
/// [`opcua_core::config::Config`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub application_name: String,
    pub application_uri: String,
    pub product_uri: String,
    pub host: String,
    pub port: u16,
    pub certificate_path: String,
    pub private_key_path: String,
    pub endpoints: Vec<ServerEndpoint>,
    pub user_token_ids: BTreeSet<String>,
    pub limits: Limits,
    pub capabilities: ServerCapabilities,
    /// If a session's SecureChannel is idle past this many milliseconds
    /// with no activity, it is expired (spec §4.5 session timeout).
    pub max_session_timeout_ms: f64,
    /// Default session timeout requested on `CreateSessionRequest` with
    /// `requested_session_timeout == 0`.
    pub default_session_timeout_ms: f64,
    /// Whether a session's subscriptions are destroyed (`true`) or become
    /// session-less and adoptable (`false`) when it times out (spec §4.5).
    pub delete_subscriptions_on_timeout: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            application_name: "opcua-server".into(),
            application_uri: "urn:opcua-server".into(),
            product_uri: "urn:opcua-server:product".into(),
            host: "127.0.0.1".into(),
            port: 4840,
            certificate_path: "server.der".into(),
            private_key_path: "server.pem".into(),
            endpoints: Vec::new(),
            user_token_ids: BTreeSet::new(),
            limits: Limits::default(),
            capabilities: ServerCapabilities::default(),
            max_session_timeout_ms: 3_600_000.0,
            default_session_timeout_ms: 600_000.0,
            delete_subscriptions_on_timeout: true,
        }
    }
}

impl ServerConfig {
    pub fn base_endpoint(&self) -> String {
        format!("opc.tcp://{}:{}", self.host, self.port)
    }
}

impl Config for ServerConfig {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        for endpoint in &self.endpoints {
            if let Err(mut e) = endpoint.validate(&self.user_token_ids) {
                errors.append(&mut e);
            }
        }
        if self.limits.subscriptions.max_lifetime_count
            < 3 * self.limits.subscriptions.max_keep_alive_count
        {
            errors.push(
                "limits.subscriptions.max_lifetime_count must be at least 3x max_keep_alive_count"
                    .into(),
            );
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
        ApplicationType::Server
    }

    fn discovery_urls(&self) -> Option<Vec<UAString>> {
        Some(vec![UAString::from(self.base_endpoint().as_str())])
    }
}

impl ServerConfig {
    /// `ApplicationDescription.application_name` with an explicit locale,
    /// matching [`Config::application_description`]'s use of
    /// `LocalizedText::new_with_locale`.
    pub fn application_name_localized(&self) -> LocalizedText {
        LocalizedText::new_with_locale("", &self.application_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifetime_count_below_3x_keep_alive_is_rejected() {
        let mut config = ServerConfig::default();
        config.limits.subscriptions.max_keep_alive_count = 10;
        config.limits.subscriptions.max_lifetime_count = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn endpoint_url_joins_path() {
        let endpoint = ServerEndpoint {
            path: "secure".into(),
            security_policy: "http://opcfoundation.org/UA/SecurityPolicy#None".into(),
            security_mode: "None".into(),
            security_level: 0,
            user_token_ids: BTreeSet::new(),
        };
        assert_eq!(
            endpoint.endpoint_url("opc.tcp://localhost:4840"),
            "opc.tcp://localhost:4840/secure"
        );
    }
}
