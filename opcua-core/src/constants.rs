// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! Protocol-level defaults shared by the client and server stacks.

/// Default TCP port for the `opc.tcp` binary protocol (Part 6 §7.1.2.2).
pub const DEFAULT_OPC_UA_SERVER_PORT: u16 = 4840;

/// Default interval, in milliseconds, between keep-alive publish requests
/// when a subscription has nothing to report.
pub const DEFAULT_KEEP_ALIVE_COUNT: u32 = 10;

/// Default number of chunks a single message may be split across before
/// decoding gives up (spec §4.4, `max_chunk_count`).
pub const DEFAULT_MAX_CHUNK_COUNT: usize = 5;

/// Default maximum size, in bytes, of a single message body.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 32 << 20;

/// Default size, in bytes, of a single chunk sent over the wire.
pub const DEFAULT_SEND_BUFFER_SIZE: usize = 65536;
pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = 65536;
