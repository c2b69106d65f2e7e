// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! Small enumerations used by the session/subscription service messages.
//! Each travels on the wire as its `Int32` representation (Part 4).

use std::io::{Read, Write};

use crate::encoding::*;

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $( $variant:ident = $value:expr ),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $(
                #[doc = stringify!($variant)]
                $variant,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                wire_enum!(@first $( $name::$variant ),*)
            }
        }

        impl $name {
            fn to_i32(self) -> i32 {
                match self {
                    $( $name::$variant => $value, )*
                }
            }

            fn try_from_i32(value: i32) -> EncodingResult<Self> {
                match value {
                    $( $value => Ok($name::$variant), )*
                    _ => Err(Error::decoding(format!(
                        concat!(stringify!($name), " has no variant with value {}"),
                        value
                    ))),
                }
            }
        }

        impl BinaryEncodable for $name {
            fn byte_len(&self) -> usize {
                4
            }

            fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
                write_i32(stream, self.to_i32())
            }
        }

        impl BinaryDecodable for $name {
            fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
                Self::try_from_i32(read_i32(stream)?)
            }
        }
    };
    (@first $head:expr $(, $rest:expr)*) => { $head };
}

wire_enum!(
    /// Which timestamps a Read/Subscription service should return.
    TimestampsToReturn {
        Source = 0,
        Server = 1,
        Both = 2,
        Neither = 3,
        Invalid = 4,
    }
);

wire_enum!(
    /// Monitoring state of a `MonitoredItem` (spec §3).
    MonitoringMode {
        Disabled = 0,
        Sampling = 1,
        Reporting = 2,
    }
);

wire_enum!(
    /// Whether an OPN request issues a brand new token or renews the current one.
    SecurityTokenRequestType {
        Issue = 0,
        Renew = 1,
    }
);

wire_enum!(
    /// Signing/encryption posture of a SecureChannel.
    MessageSecurityMode {
        Invalid = 0,
        None = 1,
        Sign = 2,
        SignAndEncrypt = 3,
    }
);

wire_enum!(
    /// Kind of application presented in an `ApplicationDescription`.
    ApplicationType {
        Server = 0,
        Client = 1,
        ClientAndServer = 2,
        DiscoveryServer = 3,
    }
);

wire_enum!(
    /// What counts as a reportable change for a `DataChangeFilter` (spec §4.6).
    DataChangeTrigger {
        Status = 0,
        StatusValue = 1,
        StatusValueTimestamp = 2,
    }
);

wire_enum!(
    /// How a `DataChangeFilter`'s deadband value is interpreted.
    DeadbandType {
        None = 0,
        Absolute = 1,
        Percent = 2,
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let bytes = MonitoringMode::Reporting.encode_to_vec();
        assert_eq!(bytes, 2i32.to_le_bytes());
        let decoded =
            MonitoringMode::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, MonitoringMode::Reporting);
    }

    #[test]
    fn unknown_value_rejected() {
        let bytes = 99i32.to_le_bytes();
        assert!(TimestampsToReturn::decode(&mut bytes.as_slice(), &DecodingOptions::test()).is_err());
    }
}
