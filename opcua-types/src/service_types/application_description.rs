// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `ApplicationDescription`, `EndpointDescription` and `UserTokenPolicy` —
//! the discovery-time structures a client needs to pick an endpoint and a
//! security policy before opening a SecureChannel (spec §4.4, §4.5).

use opcua_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    byte_string::ByteString,
    service_types::enums::{ApplicationType, MessageSecurityMode},
    string::UAString,
};

/// Identifies the application at one end of a SecureChannel.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ApplicationDescription {
    /// Globally unique URI for this application instance.
    pub application_uri: UAString,
    /// URI of the product, shared by every instance of the same software.
    pub product_uri: UAString,
    /// Human-readable name, not necessarily localized.
    pub application_name: crate::localized_text::LocalizedText,
    /// Server, client, or both.
    pub application_type: ApplicationType,
    /// Only meaningful for `ApplicationType::Client`.
    pub gateway_server_uri: UAString,
    /// Only meaningful for a discovery server: the URI of the profile
    /// describing how to query it.
    pub discovery_profile_uri: UAString,
    /// URLs (one per supported transport) at which discovery can be
    /// performed.
    pub discovery_urls: Option<Vec<UAString>>,
}

/// Identifies one security-policy/token combination a server endpoint
/// accepts. A single `ApplicationDescription` typically advertises several.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct UserTokenPolicy {
    /// Server-chosen identifier referenced by `ActivateSessionRequest`.
    pub policy_id: UAString,
    /// Kind of credential this policy accepts (anonymous, username/password,
    /// X509 certificate, issued token). Represented as the raw `Int32`
    /// discriminant used on the wire; higher layers map it to an enum.
    pub token_type: i32,
    /// For issued tokens, the URI identifying the token's format.
    pub issued_token_type: UAString,
    /// URI of the endpoint the token should be validated against, if
    /// different from the securing endpoint.
    pub issuer_endpoint_url: UAString,
    /// Security policy used to encrypt the token on the wire. Empty means
    /// "use the channel's policy".
    pub security_policy_uri: UAString,
}

/// One combination of transport, security policy, and accepted user tokens
/// at which a server can be reached. Returned by GetEndpoints/FindServers
/// and by the Hello/ACK discovery exchange.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct EndpointDescription {
    /// The URL a client should connect to in order to use this endpoint.
    pub endpoint_url: UAString,
    /// The application offering the endpoint.
    pub server: ApplicationDescription,
    /// DER-encoded server certificate, present unless
    /// `security_mode == MessageSecurityMode::None`.
    pub server_certificate: ByteString,
    /// Signing/encryption posture required on this endpoint.
    pub security_mode: MessageSecurityMode,
    /// URI identifying the cryptographic suite, e.g.
    /// `http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256`.
    pub security_policy_uri: UAString,
    /// User identity tokens accepted once the channel is open.
    pub user_identity_tokens: Option<Vec<UserTokenPolicy>>,
    /// Transport profile URI, e.g. the UA-TCP binary profile.
    pub transport_profile_uri: UAString,
    /// Relative trust ranking among endpoints with the same URL; clients
    /// should prefer a higher value.
    pub security_level: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};

    #[test]
    fn endpoint_round_trip() {
        let endpoint = EndpointDescription {
            endpoint_url: "opc.tcp://localhost:4840".into(),
            server: ApplicationDescription {
                application_uri: "urn:test:server".into(),
                application_type: ApplicationType::Server,
                discovery_urls: Some(vec!["opc.tcp://localhost:4840".into()]),
                ..Default::default()
            },
            security_mode: MessageSecurityMode::SignAndEncrypt,
            security_policy_uri: "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256".into(),
            user_identity_tokens: Some(vec![UserTokenPolicy {
                policy_id: "anonymous".into(),
                ..Default::default()
            }]),
            security_level: 1,
            ..Default::default()
        };
        let bytes = endpoint.encode_to_vec();
        let decoded =
            EndpointDescription::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, endpoint);
    }
}
