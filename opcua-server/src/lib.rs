// OPC UA server — SPDX-License-Identifier: MPL-2.0

//! Server-side Session and Subscription engine, service dispatch, and TCP
//! listener for an OPC UA SecureChannel/Session/Subscription stack (spec
//! §1). The node store, certificate trust, and role-to-permission policy
//! are supplied by the embedder through the traits in [`node_store`].

pub mod config;
pub mod dispatch;
pub mod identity;
pub mod info;
pub mod node_store;
pub mod server;
pub mod session;
pub mod subscriptions;
pub mod transport;

pub use config::ServerConfig;
pub use info::ServerInfo;
pub use node_store::{AccessControl, CertificateVerification, Logger, NodeStore, Permission};
pub use server::Server;
