// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! The `BinaryEncodable`/`BinaryDecodable` traits and the primitives every
//! built-in and structured type is encoded/decoded through.

use std::{
    fmt,
    io::{Read, Write},
    sync::atomic::{AtomicU64, Ordering},
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::status_code::StatusCode;

/// Result of an encoding or decoding operation.
pub type EncodingResult<T> = std::result::Result<T, Error>;

/// A codec-level error: a `StatusCode` plus a human-readable cause.
///
/// `From<Error> for StatusCode` is how callers normally consume this — the
/// message is for logs, the status code is what goes on the wire.
#[derive(Debug, Clone)]
pub struct Error {
    status: StatusCode,
    message: String,
}

impl Error {
    /// Build an error with an explicit status code.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// `BadDecodingError` with the given context.
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BadDecodingError, message)
    }

    /// `BadEncodingError` with the given context.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BadEncodingError, message)
    }

    /// `BadOutOfMemory` with the given context.
    pub fn out_of_memory(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BadOutOfMemory, message)
    }

    /// The status code carried by this error.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for Error {}

impl From<Error> for StatusCode {
    fn from(value: Error) -> Self {
        value.status
    }
}

impl From<StatusCode> for Error {
    fn from(value: StatusCode) -> Self {
        Self::new(value, value.description())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::decoding(value.to_string())
    }
}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, value.to_string())
    }
}

/// Tracks current recursion depth for `Variant`, `ExtensionObject` and
/// `DiagnosticInfo` decoding. Default max depth is 100 (spec: §3, §8).
///
/// Cloning resets current depth to zero — clones are for sharing the *limit*
/// across independent decode calls, not the in-flight counter.
#[derive(Debug)]
pub struct DepthGauge {
    max_depth: u64,
    current_depth: AtomicU64,
}

impl Clone for DepthGauge {
    fn clone(&self) -> Self {
        Self {
            max_depth: self.max_depth,
            current_depth: AtomicU64::new(0),
        }
    }
}

impl Default for DepthGauge {
    fn default() -> Self {
        Self::new(crate::constants::MAX_DECODING_DEPTH)
    }
}

impl DepthGauge {
    /// Create a new gauge with the given max depth.
    pub fn new(max_depth: u64) -> Self {
        Self {
            max_depth,
            current_depth: AtomicU64::new(0),
        }
    }

    /// Take a depth lease for the duration of one recursive decode step.
    pub fn enter(&self) -> EncodingResult<DepthLease<'_>> {
        let prev = self.current_depth.fetch_add(1, Ordering::Acquire);
        if prev >= self.max_depth {
            self.current_depth.fetch_sub(1, Ordering::Release);
            return Err(Error::decoding(format!(
                "Recursion limit of {} exceeded while decoding",
                self.max_depth
            )));
        }
        Ok(DepthLease { gauge: self })
    }
}

/// RAII guard returned by [`DepthGauge::enter`]; decrements the depth
/// counter on drop, including on unwind, so a failed decode never leaks
/// depth.
pub struct DepthLease<'a> {
    gauge: &'a DepthGauge,
}

impl Drop for DepthLease<'_> {
    fn drop(&mut self) {
        self.gauge.current_depth.fetch_sub(1, Ordering::Release);
    }
}

/// Limits and context applied while decoding. Constructed once per
/// SecureChannel/connection from negotiated buffer sizes, then threaded
/// through every decode call.
#[derive(Debug, Clone)]
pub struct DecodingOptions {
    /// Maximum size of a complete message in bytes. 0 = no limit.
    pub max_message_size: usize,
    /// Maximum number of chunks making up one message. 0 = no limit.
    pub max_chunk_count: usize,
    /// Maximum length in bytes of a `String`.
    pub max_string_length: usize,
    /// Maximum length in bytes of a `ByteString`.
    pub max_byte_string_length: usize,
    /// Maximum number of elements in an array.
    pub max_array_length: usize,
    /// Recursion depth gauge shared across one decode call tree.
    pub decoding_depth_gauge: DepthGauge,
}

impl Default for DecodingOptions {
    fn default() -> Self {
        Self {
            max_message_size: crate::constants::MAX_MESSAGE_SIZE,
            max_chunk_count: crate::constants::MAX_CHUNK_COUNT,
            max_string_length: crate::constants::MAX_STRING_LENGTH,
            max_byte_string_length: crate::constants::MAX_BYTE_STRING_LENGTH,
            max_array_length: crate::constants::MAX_ARRAY_LENGTH,
            decoding_depth_gauge: DepthGauge::default(),
        }
    }
}

impl DecodingOptions {
    /// Options with tight limits, useful for decoding untrusted payloads
    /// such as an `ExtensionObject` body of unknown type.
    pub fn minimal() -> Self {
        Self {
            max_string_length: 8192,
            max_byte_string_length: 8192,
            max_array_length: 8192,
            decoding_depth_gauge: DepthGauge::new(1),
            ..Default::default()
        }
    }

    /// Shorthand used by tests.
    pub fn test() -> Self {
        Self::default()
    }
}

/// Implemented by every OPC UA built-in and structured type. Encoding is a
/// pure function of `&self` and the output stream — it never touches global
/// state (spec §4.1).
pub trait BinaryEncodable {
    /// Exact number of bytes `encode` will write.
    fn byte_len(&self) -> usize;

    /// Write this value to `stream`. Implementations must use `write_all`
    /// (directly or transitively) so a short write never silently succeeds.
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize>;

    /// Convenience for tests: encode into a fresh `Vec<u8>`.
    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.byte_len());
        let _ = self.encode(&mut buf);
        buf
    }
}

/// Implemented by every OPC UA built-in and structured type.
pub trait BinaryDecodable: Sized {
    /// Read a value from `stream`, honoring the limits in `decoding_options`.
    /// Must fail with `BadDecodingError` (or a more specific code) rather
    /// than allocate unboundedly on attacker-controlled length prefixes.
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self>;
}

pub(crate) fn read_u8<S: Read + ?Sized>(stream: &mut S) -> EncodingResult<u8> {
    Ok(stream.read_u8()?)
}

pub(crate) fn write_u8<S: Write + ?Sized>(stream: &mut S, value: u8) -> EncodingResult<usize> {
    stream.write_u8(value)?;
    Ok(1)
}

macro_rules! rw_primitive {
    ($read:ident, $write:ident, $ty:ty, $read_fn:ident, $write_fn:ident, $len:expr) => {
        pub(crate) fn $read<S: Read + ?Sized>(stream: &mut S) -> EncodingResult<$ty> {
            Ok(stream.$read_fn::<LittleEndian>()?)
        }

        pub(crate) fn $write<S: Write + ?Sized>(
            stream: &mut S,
            value: $ty,
        ) -> EncodingResult<usize> {
            stream.$write_fn::<LittleEndian>(value)?;
            Ok($len)
        }
    };
}

rw_primitive!(read_i16, write_i16, i16, read_i16, write_i16, 2);
rw_primitive!(read_u16, write_u16, u16, read_u16, write_u16, 2);
rw_primitive!(read_i32, write_i32, i32, read_i32, write_i32, 4);
rw_primitive!(read_u32, write_u32, u32, read_u32, write_u32, 4);
rw_primitive!(read_i64, write_i64, i64, read_i64, write_i64, 8);
rw_primitive!(read_u64, write_u64, u64, read_u64, write_u64, 8);
rw_primitive!(read_f32, write_f32, f32, read_f32, write_f32, 4);
rw_primitive!(read_f64, write_f64, f64, read_f64, write_f64, 8);

/// A null array (`None`) is distinct from an empty one (`Some(vec![])`),
/// same null-vs-empty rule as `String`/`ByteString` (spec §3). This is the
/// plain element-sequence encoding used by structured-type array fields;
/// `Variant`'s own array form additionally carries a type-id mask (see
/// `variant.rs`).
impl<T: BinaryEncodable> BinaryEncodable for Option<Vec<T>> {
    fn byte_len(&self) -> usize {
        match self {
            None => 4,
            Some(v) => 4 + v.iter().map(BinaryEncodable::byte_len).sum::<usize>(),
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        match self {
            None => write_i32(stream, -1),
            Some(v) => {
                let mut size = write_i32(stream, v.len() as i32)?;
                for item in v {
                    size += item.encode(stream)?;
                }
                Ok(size)
            }
        }
    }
}

impl<T: BinaryDecodable> BinaryDecodable for Option<Vec<T>> {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let len = read_i32(stream)?;
        if len < -1 {
            return Err(Error::decoding(format!("Invalid array length {len}")));
        }
        if len == -1 {
            return Ok(None);
        }
        let len = len as usize;
        if decoding_options.max_array_length > 0 && len > decoding_options.max_array_length {
            return Err(Error::decoding(format!(
                "Array length {len} exceeds configured max of {}",
                decoding_options.max_array_length
            )));
        }
        let mut v = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            v.push(T::decode(stream, decoding_options)?);
        }
        Ok(Some(v))
    }
}

/// Read exactly `len` bytes, failing with `BadDecodingError` on a short read
/// rather than blocking. Guards against allocating `len` bytes before the
/// buffer is known to actually contain them.
pub(crate) fn read_bytes<S: Read + ?Sized>(stream: &mut S, len: usize) -> EncodingResult<Vec<u8>> {
    let mut buf = vec![0u8; len];
    stream
        .read_exact(&mut buf)
        .map_err(|e| Error::decoding(format!("short read of {len} bytes: {e}")))?;
    Ok(buf)
}
