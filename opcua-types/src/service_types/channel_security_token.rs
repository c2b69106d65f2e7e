// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! `ChannelSecurityToken` and `SignatureData`, carried in OPN responses and
//! ActivateSession requests respectively (spec §3, §4.4, §4.5).

use opcua_macros::{BinaryDecodable, BinaryEncodable};

use crate::{byte_string::ByteString, date_time::DateTime, string::UAString};

/// Identifies one generation of symmetric key material for a SecureChannel.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ChannelSecurityToken {
    /// The channel this token belongs to.
    pub channel_id: u32,
    /// Identifies this generation of keys; distinct across RENEW.
    pub token_id: u32,
    /// When the token was issued.
    pub created_at: DateTime,
    /// Lifetime in milliseconds, possibly revised down from the request.
    pub revised_lifetime: u32,
}

/// A signature produced over some previously agreed data (e.g. the server
/// nonce in ActivateSession), plus the algorithm URI used to produce it.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct SignatureData {
    /// URI of the signing algorithm, e.g.
    /// `http://www.w3.org/2000/09/xmldsig#rsa-sha1`.
    pub algorithm: UAString,
    /// The signature bytes.
    pub signature: ByteString,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions};

    #[test]
    fn token_round_trip() {
        let token = ChannelSecurityToken {
            channel_id: 1,
            token_id: 7,
            created_at: DateTime::now(),
            revised_lifetime: 3_600_000,
        };
        let bytes = token.encode_to_vec();
        let decoded =
            ChannelSecurityToken::decode(&mut bytes.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, token);
    }
}
