// OPC UA PubSub codec — SPDX-License-Identifier: MPL-2.0

//! Transport-independent encode/decode for UADP `NetworkMessage`s and the
//! `DataSetMessage`s they carry (spec §4.8, C8). Nothing here opens a
//! socket: a transport (UDP, Ethernet/TSN — out of scope per spec §1) hands
//! this crate datagram bytes and gets a [`network_message::NetworkMessage`]
//! back, or the reverse for publishing.

pub mod dataset_message;
pub mod metadata;
pub mod network_message;
pub mod security;

pub use dataset_message::{DataSetFieldEncoding, DataSetMessage, DataSetMessageType};
pub use metadata::{DataSetMetaData, FieldMetaData};
pub use network_message::{
    ExtendedNetworkMessageHeader, GroupHeader, NetworkMessage, NetworkMessageFlags, PayloadHeader,
    SecurityHeader,
};
pub use security::{PubSubSecurityError, SecurityKeys};
