// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! Wire and decoding limits shared across the stack.

/// Default maximum size of a reassembled message, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
/// Default maximum number of chunks making up one message.
pub const MAX_CHUNK_COUNT: usize = 5_000;
/// Default maximum length of a `String`, in bytes.
pub const MAX_STRING_LENGTH: usize = 1 << 20;
/// Default maximum length of a `ByteString`, in bytes.
pub const MAX_BYTE_STRING_LENGTH: usize = 1 << 20;
/// Default maximum number of elements in an array.
pub const MAX_ARRAY_LENGTH: usize = 1 << 20;
/// Maximum recursion depth for `Variant`, `ExtensionObject` and
/// `DiagnosticInfo` decoding (spec §3, §8).
pub const MAX_DECODING_DEPTH: u64 = 100;
/// Maximum size in bytes of a DER certificate accepted in a security header.
pub const MAX_CERTIFICATE_LENGTH: usize = 16 * 1024;
/// Sentinel length prefix denoting a null `String`/`ByteString`/array.
pub const NULL_LENGTH: i32 = -1;

/// Default OPC UA TCP port.
pub const DEFAULT_OPC_UA_PORT: u16 = 4840;
