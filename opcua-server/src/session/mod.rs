// OPC UA server — SPDX-License-Identifier: MPL-2.0

//! Server-side Session lifecycle: CreateSession/ActivateSession/CloseSession
//! and idle-timeout expiry (spec §4.5).

pub mod entity;
pub mod manager;

pub use entity::{Session, SessionState};
pub use manager::SessionManager;
