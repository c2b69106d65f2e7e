// OPC UA server — SPDX-License-Identifier: MPL-2.0

//! The external collaborators this stack consumes by trait rather than
//! implements (spec §6): the information-model node store, certificate
//! verification, access control, and a side-effecting logger. A server
//! wires concrete implementations of these in; this crate only calls
//! through them.

use opcua_crypto::X509;
use opcua_types::{data_value::DataValue, node_id::NodeId, status_code::StatusCode};

use crate::identity::Role;

/// A single in-progress or completed node mutation handed to
/// [`NodeStore::iterate`]'s visitor.
pub trait NodeVisitor {
    /// Called once per node in the store. Returning `false` stops iteration
    /// early.
    fn visit(&mut self, id: &NodeId) -> bool;
}

/// The up-call interface to the address-space/information-model node store
/// (spec §6). This crate never loads, validates or persists nodes itself —
/// Read/Write/Browse/Call service bodies and XML NodeSet loading are
/// explicitly out of scope (spec §1).
pub trait NodeStore: Send + Sync {
    /// `true` if `id` names a node currently in the store.
    fn get_node(&self, id: &NodeId) -> bool;

    /// Adds a new node under `parent`. `node` is opaque to this crate; the
    /// collaborator owns its own node representation.
    fn add_node(&self, parent: &NodeId, node: &NodeId) -> Result<(), StatusCode>;

    /// Removes `id` and anything the collaborator considers owned by it.
    fn remove_node(&self, id: &NodeId) -> Result<(), StatusCode>;

    /// Visits every node currently in the store, in unspecified order.
    fn iterate(&self, visitor: &mut dyn NodeVisitor);

    /// Reads one attribute of one node, as driven by MonitoredItem sampling
    /// (spec §4.6) or a session-level Read this crate does not itself
    /// implement.
    fn read_attribute(&self, id: &NodeId, attribute_id: u32) -> Result<DataValue, StatusCode>;

    /// Writes one attribute of one node.
    fn write_attribute(
        &self,
        id: &NodeId,
        attribute_id: u32,
        value: DataValue,
    ) -> Result<(), StatusCode>;
}

/// Certificate trust decisions a server delegates rather than makes itself
/// (spec §6) — this crate only parses certificates (`opcua-crypto::X509`)
/// and checks signatures against them; whether to trust one is a deployment
/// policy (a trust list, a CA chain, TPM-backed attestation, ...).
pub trait CertificateVerification: Send + Sync {
    /// Decide whether `cert` should be accepted for a SecureChannel/Session
    /// under `security_policy`.
    fn verify_certificate(&self, cert: &X509, security_policy: opcua_crypto::SecurityPolicy) -> Result<(), StatusCode>;

    /// Decide whether `cert`'s subject alternative name matches
    /// `application_uri`, as required by Part 4 §5.6.2.
    fn verify_application_uri(&self, cert: &X509, application_uri: &str) -> Result<(), StatusCode>;
}

/// Resolves the roles a session's presented identity maps to (spec §4.5)
/// and enforces what those roles allow, once a role set is attached to the
/// session. RBAC plugin internals and the permission taxonomy itself are
/// out of scope (spec §1); this crate only calls through the trait.
pub trait AccessControl: Send + Sync {
    /// Every role whose identity-mapping rule set matches `identity`,
    /// evaluated against the server's ordered role list (spec §4.5).
    fn get_roles_for_identity(&self, identity: &crate::identity::ResolvedIdentity) -> Vec<Role>;

    /// `true` if any role in `roles` grants `permission` on `node`.
    fn check_permissions(&self, roles: &[Role], node: &NodeId, permission: Permission) -> bool;
}

/// The operation a caller is attempting, checked against a session's roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
    Browse,
    Call,
    ReceiveEvents,
}

/// Side-effecting log sink (spec §6): level + category + message, with no
/// return value. Deployments typically forward this to the `log` facade;
/// it is its own trait only so a collaborator can additionally route
/// protocol-level events (e.g. to an audit log) without this crate knowing
/// about that destination.
pub trait Logger: Send + Sync {
    fn log(&self, level: log::Level, category: &str, message: &str);
}

/// A [`Logger`] that forwards straight to the `log` facade under a fixed
/// target, for deployments with no separate audit-log requirement.
pub struct StdLogger;

impl Logger for StdLogger {
    fn log(&self, level: log::Level, category: &str, message: &str) {
        log::log!(target: "opcua_server", level, "[{category}] {message}");
    }
}
