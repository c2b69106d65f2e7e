// OPC UA server — SPDX-License-Identifier: MPL-2.0

//! Role resolution (spec §4.5): a server holds an ordered list of roles,
//! each carrying identity-mapping rules; activation resolves the presented
//! identity against every rule, and the union of matching roles becomes the
//! session's role set. Permission enforcement itself lives behind
//! [`crate::node_store::AccessControl`].

use opcua_types::service_types::IdentityToken;

/// A server-configured role name, e.g. `"operator"` or the well-known
/// `"anonymous"`/`"authenticated-user"` roles every server defines.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Role(pub String);

/// One rule an identity must satisfy to be granted a [`Role`] (spec §4.5).
/// A role's rule set is a disjunction: any one matching rule grants it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityMappingRule {
    /// Matches every `AnonymousIdentityToken`.
    Anonymous,
    /// Matches any token that isn't anonymous.
    AuthenticatedUser,
    /// Matches a `UserNameIdentityToken` with this exact username.
    Username(String),
    /// Matches an `X509IdentityToken` whose certificate subject equals
    /// this string.
    X509Subject(String),
    /// Matches a certificate with this SHA-1 thumbprint (hex, lowercase).
    Thumbprint(String),
    /// Matches an identity known (by the `AccessControl` collaborator) to
    /// belong to this external group.
    Group(String),
    /// Matches a session whose channel's client `application_uri` equals
    /// this string.
    Application(String),
    /// Matches an identity already holding this role, letting one role
    /// extend another.
    InRole(String),
}

/// A role plus the rules that grant it, as held in a server's ordered role
/// list (spec §4.5).
#[derive(Debug, Clone)]
pub struct RoleDefinition {
    pub role: Role,
    pub rules: Vec<IdentityMappingRule>,
}

/// The session-facing view of a presented identity, resolved from an
/// `ActivateSessionRequest.user_identity_token` plus the channel's peer
/// certificate (for `Application`/`Thumbprint`/`X509Subject` rules).
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub token: IdentityToken,
    pub certificate_subject: Option<String>,
    pub certificate_thumbprint: Option<String>,
    pub application_uri: Option<String>,
    /// Roles already held, for `InRole` rules — resolved iteratively by the
    /// `AccessControl` collaborator, not by this crate.
    pub held_roles: Vec<Role>,
}

impl ResolvedIdentity {
    /// `true` if `self` was presented with an `AnonymousIdentityToken`.
    pub fn is_anonymous(&self) -> bool {
        matches!(self.token, IdentityToken::Anonymous(_))
    }

    /// The username, for `UserNameIdentityToken` presentations.
    pub fn username(&self) -> Option<&str> {
        match &self.token {
            IdentityToken::UserName(t) => Some(t.user_name.as_ref()),
            _ => None,
        }
    }

    /// Evaluates a single rule against this identity. Used by an
    /// `AccessControl` implementation building `get_roles_for_identity`;
    /// this crate does not itself hold the server's role list (that's
    /// configuration the collaborator owns), only the matching logic for
    /// one rule at a time.
    pub fn matches(&self, rule: &IdentityMappingRule) -> bool {
        match rule {
            IdentityMappingRule::Anonymous => self.is_anonymous(),
            IdentityMappingRule::AuthenticatedUser => !self.is_anonymous(),
            IdentityMappingRule::Username(name) => self.username() == Some(name.as_str()),
            IdentityMappingRule::X509Subject(subject) => {
                self.certificate_subject.as_deref() == Some(subject.as_str())
            }
            IdentityMappingRule::Thumbprint(thumbprint) => {
                self.certificate_thumbprint.as_deref() == Some(thumbprint.as_str())
            }
            IdentityMappingRule::Application(uri) => self.application_uri.as_deref() == Some(uri.as_str()),
            IdentityMappingRule::InRole(name) => self.held_roles.iter().any(|r| r.0 == *name),
            // Group membership is resolved externally (an identity provider
            // lookup); this crate has no group directory of its own.
            IdentityMappingRule::Group(_) => false,
        }
    }
}

/// Resolves `identity` against an ordered role list, returning every role
/// with at least one matching rule, in list order. A default
/// [`crate::node_store::AccessControl`] implementation can call this
/// directly; a richer one (with `Group` support) replaces it.
pub fn resolve_roles(identity: &ResolvedIdentity, roles: &[RoleDefinition]) -> Vec<Role> {
    roles
        .iter()
        .filter(|def| def.rules.iter().any(|rule| identity.matches(rule)))
        .map(|def| def.role.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_types::service_types::AnonymousIdentityToken;

    fn anon() -> ResolvedIdentity {
        ResolvedIdentity {
            token: IdentityToken::Anonymous(AnonymousIdentityToken::default()),
            certificate_subject: None,
            certificate_thumbprint: None,
            application_uri: None,
            held_roles: Vec::new(),
        }
    }

    #[test]
    fn anonymous_rule_matches_only_anonymous_token() {
        let identity = anon();
        assert!(identity.matches(&IdentityMappingRule::Anonymous));
        assert!(!identity.matches(&IdentityMappingRule::AuthenticatedUser));
    }

    #[test]
    fn resolve_roles_returns_every_matching_role_in_order() {
        let identity = anon();
        let roles = vec![
            RoleDefinition {
                role: Role("anonymous".into()),
                rules: vec![IdentityMappingRule::Anonymous],
            },
            RoleDefinition {
                role: Role("operator".into()),
                rules: vec![IdentityMappingRule::Username("alice".into())],
            },
        ];
        let resolved = resolve_roles(&identity, &roles);
        assert_eq!(resolved, vec![Role("anonymous".into())]);
    }
}
