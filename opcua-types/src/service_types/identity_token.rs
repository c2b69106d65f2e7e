// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! User identity tokens carried in `ActivateSessionRequest.user_identity_token`
//! (spec §4.5). Each wire struct mirrors one `UserTokenType`; [`IdentityToken`]
//! is the decoded union a session manager actually matches against.

use opcua_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    byte_string::ByteString,
    encoding::Error,
    extension_object::ExtensionObject,
    object_id::ObjectId,
    status_code::StatusCode,
    string::UAString,
};

/// No credentials beyond the policy id; accepted only by endpoints whose
/// `UserTokenPolicy` advertises `UserTokenType::Anonymous`.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct AnonymousIdentityToken {
    pub policy_id: UAString,
}

/// Username/password, with the password opaque-encrypted under the
/// policy's `security_policy_uri` (or the channel's, if empty) per Part 4
/// §7.36.4.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct UserNameIdentityToken {
    pub policy_id: UAString,
    pub user_name: UAString,
    pub password: ByteString,
    pub encryption_algorithm: UAString,
}

/// A client X.509 certificate, proven by a `ActivateSessionRequest.user_token_signature`
/// over the server's nonce.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct X509IdentityToken {
    pub policy_id: UAString,
    pub certificate_data: ByteString,
}

/// An opaque token (e.g. a SAML/JWT assertion) whose format is named by the
/// policy's `issued_token_type`.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct IssuedIdentityToken {
    pub policy_id: UAString,
    pub token_data: ByteString,
    pub encryption_algorithm: UAString,
}

/// The decoded union of every identity token this stack accepts, resolved
/// from an `ActivateSessionRequest`'s `user_identity_token` extension object.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityToken {
    Anonymous(AnonymousIdentityToken),
    UserName(UserNameIdentityToken),
    X509(X509IdentityToken),
    Issued(IssuedIdentityToken),
}

impl IdentityToken {
    /// The `policy_id` every variant carries, naming which of the
    /// endpoint's `UserTokenPolicy` entries it was issued against.
    pub fn policy_id(&self) -> &UAString {
        match self {
            IdentityToken::Anonymous(t) => &t.policy_id,
            IdentityToken::UserName(t) => &t.policy_id,
            IdentityToken::X509(t) => &t.policy_id,
            IdentityToken::Issued(t) => &t.policy_id,
        }
    }

    /// Decode `obj` by its `ObjectId`-tagged `node_id`. A null/empty
    /// extension object decodes as an anonymous token with an empty policy
    /// id, matching how many clients encode "no identity chosen".
    pub fn from_extension_object(obj: &ExtensionObject) -> Result<Self, Error> {
        if obj.is_null() {
            return Ok(IdentityToken::Anonymous(AnonymousIdentityToken::default()));
        }
        let Ok(object_id) = obj.node_id.as_object_id() else {
            return Err(Error::new(
                StatusCode::BadIdentityTokenInvalid,
                "Unrecognized identity token type id",
            ));
        };
        match object_id {
            ObjectId::AnonymousIdentityToken_Encoding_DefaultBinary => {
                Ok(IdentityToken::Anonymous(obj.decode_body()?))
            }
            ObjectId::UserNameIdentityToken_Encoding_DefaultBinary => {
                Ok(IdentityToken::UserName(obj.decode_body()?))
            }
            ObjectId::X509IdentityToken_Encoding_DefaultBinary => {
                Ok(IdentityToken::X509(obj.decode_body()?))
            }
            ObjectId::IssuedIdentityToken_Encoding_DefaultBinary => {
                Ok(IdentityToken::Issued(obj.decode_body()?))
            }
            _ => Err(Error::new(
                StatusCode::BadIdentityTokenInvalid,
                "Extension object does not carry an identity token",
            )),
        }
    }

    /// Re-encode as the `ExtensionObject` an `ActivateSessionRequest` carries.
    pub fn to_extension_object(&self) -> ExtensionObject {
        match self {
            IdentityToken::Anonymous(t) => ExtensionObject::from_binary_body(
                ObjectId::AnonymousIdentityToken_Encoding_DefaultBinary.into(),
                t,
            ),
            IdentityToken::UserName(t) => ExtensionObject::from_binary_body(
                ObjectId::UserNameIdentityToken_Encoding_DefaultBinary.into(),
                t,
            ),
            IdentityToken::X509(t) => ExtensionObject::from_binary_body(
                ObjectId::X509IdentityToken_Encoding_DefaultBinary.into(),
                t,
            ),
            IdentityToken::Issued(t) => ExtensionObject::from_binary_body(
                ObjectId::IssuedIdentityToken_Encoding_DefaultBinary.into(),
                t,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_extension_object_is_anonymous() {
        let token = IdentityToken::from_extension_object(&ExtensionObject::null()).unwrap();
        assert!(matches!(token, IdentityToken::Anonymous(_)));
    }

    #[test]
    fn user_name_token_round_trips() {
        let token = IdentityToken::UserName(UserNameIdentityToken {
            policy_id: "username_basic256sha256".into(),
            user_name: "alice".into(),
            password: ByteString::from(b"hunter2".to_vec()),
            encryption_algorithm: UAString::null(),
        });
        let obj = token.to_extension_object();
        let decoded = IdentityToken::from_extension_object(&obj).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn unknown_type_id_is_rejected() {
        let obj = ExtensionObject::from_binary_body(
            ObjectId::CreateSessionRequest_Encoding_DefaultBinary.into(),
            &AnonymousIdentityToken::default(),
        );
        assert!(IdentityToken::from_extension_object(&obj).is_err());
    }
}
