// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

#![warn(missing_docs)]

//! Functionality shared by the client and server stacks: message chunking,
//! the `SecureChannel`, the single-threaded `EventLoop` that drives them,
//! and the handshake messages exchanged before either is built.

/// Hex-dumps a buffer at trace level, gated behind the `hex` log target so
/// it costs nothing unless explicitly enabled.
pub mod debug {
    use log::{log_enabled, trace};

    pub fn log_buffer(message: &str, buf: &[u8]) {
        if !log_enabled!(target: "hex", log::Level::Trace) {
            return;
        }

        let line_len = 32;
        let len = buf.len();
        let last_line_padding = ((len / line_len) + 1) * line_len - len;

        trace!(target: "hex", "{}", message);

        let mut char_line = String::new();
        let mut hex_line = format!("{:08x}: ", 0);

        for (i, b) in buf.iter().enumerate() {
            if i > 0 && i % line_len == 0 {
                trace!(target: "hex", "{} {}", hex_line, char_line);
                hex_line = format!("{:08}: ", i);
                char_line.clear();
            }
            hex_line = format!("{} {:02x}", hex_line, b);
            char_line.push(if (32..=126).contains(b) { *b as char } else { '.' });
        }
        if last_line_padding > 0 {
            for _ in 0..last_line_padding {
                hex_line.push_str("   ");
            }
            trace!(target: "hex", "{} {}", hex_line, char_line);
        }
    }
}

pub mod comms;
pub mod config;
pub mod connection;
pub mod constants;
pub mod errors;
pub mod eventloop;
pub mod messages;

pub use config::Config;
pub use connection::{Connection, ConnectionId, ConnectionStatus};
pub use eventloop::{EventLoop, EventLoopState, EventSource, TimerMode};
pub use messages::{Message, MessageType, RequestMessage, ResponseMessage};

/// Common synchronous locks, re-exported from `parking_lot` so the rest of
/// the stack doesn't depend on it directly.
pub mod sync {
    pub type RwLock<T> = parking_lot::RwLock<T>;
    pub type Mutex<T> = parking_lot::Mutex<T>;
}
