// OPC UA client — SPDX-License-Identifier: MPL-2.0

//! Client-side realization of the spec: dial a server's `opc.tcp` endpoint,
//! drive the SecureChannel handshake, open a Session, and manage
//! Subscriptions/Publish bookkeeping on top (spec §4.3-§4.7).

pub mod config;
pub mod session;
pub mod subscriptions;
pub mod transport;

mod client;

pub use client::{Client, ClientError};
pub use config::ClientConfig;
