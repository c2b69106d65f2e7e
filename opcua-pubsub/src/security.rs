// OPC UA PubSub codec — SPDX-License-Identifier: MPL-2.0

//! Symmetric message security for PubSub network messages: the same
//! sign-then-encrypt scheme `SecureChannel` uses for symmetric chunks,
//! keyed per `SecurityTokenId` instead of per secure channel (spec §4.8:
//! "Symmetric security mirrors SecureChannel symmetric crypto").
//!
//! A writer group and its subscribers derive [`SecurityKeys`] out of band
//! (from the same nonce exchange a SecureChannel or a PubSub
//! `SecurityGroup` configuration would use) and keep them around by
//! [`crate::network_message::SecurityHeader::security_token_id`]. This
//! module only signs/encrypts and verifies/decrypts already-encoded
//! bytes; it does not negotiate the keys themselves.

use log::warn;
use opcua_crypto::{security_policy::SecurityPolicy, AesKey};
use opcua_types::status_code::StatusCode;

/// Error produced while signing/encrypting or verifying/decrypting a
/// network message.
#[derive(Debug, thiserror::Error)]
pub enum PubSubSecurityError {
    #[error("message is shorter than the expected signature")]
    MessageTooShort,
    #[error("message signature verification failed")]
    VerificationFailed,
    #[error("{0}")]
    Status(#[from] StatusCode),
}

/// One direction's derived symmetric keys for one `SecurityTokenId`,
/// mirroring `SecureChannel`'s own `(signing_key, AesKey, iv)` triple
/// (`SecurityPolicy::make_secure_channel_keys`).
#[derive(Debug)]
pub struct SecurityKeys {
    policy: SecurityPolicy,
    signing_key: Vec<u8>,
    encrypting_key: AesKey,
    iv: Vec<u8>,
}

impl SecurityKeys {
    /// Derives keys from `secret`/`seed` (e.g. a publisher/subscriber nonce
    /// pair) the same way a SecureChannel derives its symmetric keys.
    pub fn derive(policy: SecurityPolicy, secret: &[u8], seed: &[u8]) -> Self {
        let (signing_key, encrypting_key, iv) = policy.make_secure_channel_keys(secret, seed);
        SecurityKeys { policy, signing_key, encrypting_key, iv }
    }

    pub fn policy(&self) -> SecurityPolicy {
        self.policy
    }
}

/// Pads `data` to a multiple of `block_size` with the repeated-byte scheme
/// CBC block ciphers need (Part 6 §6.7.2's padding byte, simplified to a
/// single padding byte since PubSub payloads never approach the 256-byte
/// threshold that needs a two-byte extra-padding count).
fn pad_to_block_size(mut data: Vec<u8>, block_size: usize) -> Vec<u8> {
    let padding_size = block_size - (data.len() % block_size);
    let padding_byte = (padding_size - 1) as u8;
    data.resize(data.len() + padding_size, padding_byte);
    data
}

fn strip_padding(mut data: Vec<u8>) -> Result<Vec<u8>, PubSubSecurityError> {
    let padding_byte = *data.last().ok_or(PubSubSecurityError::MessageTooShort)?;
    let padding_size = padding_byte as usize + 1;
    if padding_size > data.len() {
        return Err(PubSubSecurityError::VerificationFailed);
    }
    let padding_start = data.len() - padding_size;
    if data[padding_start..].iter().any(|b| *b != padding_byte) {
        return Err(PubSubSecurityError::VerificationFailed);
    }
    data.truncate(padding_start);
    Ok(data)
}

/// Signs `plaintext` (and encrypts it first, if `encrypt` is true),
/// returning the bytes to place in the network message's payload:
/// `[ciphertext-or-plaintext][signature]`.
pub fn sign_and_encrypt(
    keys: &SecurityKeys,
    plaintext: &[u8],
    encrypt: bool,
) -> Result<Vec<u8>, PubSubSecurityError> {
    let mut body = if encrypt {
        let padded = pad_to_block_size(plaintext.to_vec(), keys.policy.plain_block_size());
        let mut ciphertext = vec![0u8; padded.len()];
        let written = keys
            .policy
            .symmetric_encrypt(&keys.encrypting_key, &keys.iv, &padded, &mut ciphertext)
            .map_err(PubSubSecurityError::Status)?;
        ciphertext.truncate(written);
        ciphertext
    } else {
        plaintext.to_vec()
    };

    let signature_size = keys.policy.symmetric_signature_size();
    if signature_size > 0 {
        let mut signature = vec![0u8; signature_size];
        keys.policy
            .symmetric_sign(&keys.signing_key, &body, &mut signature)
            .map_err(PubSubSecurityError::Status)?;
        body.extend_from_slice(&signature);
    }
    Ok(body)
}

/// Inverse of [`sign_and_encrypt`]: verifies the trailing signature, then
/// decrypts if `encrypted` is true, returning the plaintext payload.
pub fn verify_and_decrypt(
    keys: &SecurityKeys,
    message: &[u8],
    encrypted: bool,
) -> Result<Vec<u8>, PubSubSecurityError> {
    let signature_size = keys.policy.symmetric_signature_size();
    if message.len() < signature_size {
        return Err(PubSubSecurityError::MessageTooShort);
    }
    let (body, signature) = message.split_at(message.len() - signature_size);
    if signature_size > 0 {
        keys.policy
            .symmetric_verify_signature(&keys.signing_key, body, signature)
            .map_err(|_| {
                warn!("dropping network message with bad signature under token");
                PubSubSecurityError::VerificationFailed
            })?;
    }

    if !encrypted {
        return Ok(body.to_vec());
    }
    let mut padded = vec![0u8; body.len()];
    let written = keys
        .policy
        .symmetric_decrypt(&keys.encrypting_key, &keys.iv, body, &mut padded)
        .map_err(|_| PubSubSecurityError::VerificationFailed)?;
    padded.truncate(written);
    strip_padding(padded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keys() -> (SecurityKeys, SecurityKeys) {
        let policy = SecurityPolicy::Basic256Sha256;
        let publisher_nonce = opcua_crypto::random::byte_string(32).value.unwrap();
        let subscriber_nonce = opcua_crypto::random::byte_string(32).value.unwrap();
        (
            SecurityKeys::derive(policy, &publisher_nonce, &subscriber_nonce),
            SecurityKeys::derive(policy, &publisher_nonce, &subscriber_nonce),
        )
    }

    #[test]
    fn signs_and_verifies_without_encryption() {
        let (publisher_keys, subscriber_keys) = test_keys();
        let signed = sign_and_encrypt(&publisher_keys, b"hello dataset", false).unwrap();
        let plaintext = verify_and_decrypt(&subscriber_keys, &signed, false).unwrap();
        assert_eq!(plaintext, b"hello dataset");
    }

    #[test]
    fn encrypts_and_decrypts() {
        let (publisher_keys, subscriber_keys) = test_keys();
        let signed = sign_and_encrypt(&publisher_keys, b"hello dataset!!!", true).unwrap();
        let plaintext = verify_and_decrypt(&subscriber_keys, &signed, true).unwrap();
        assert_eq!(plaintext, b"hello dataset!!!");
    }

    #[test]
    fn rejects_tampered_signature() {
        let (publisher_keys, subscriber_keys) = test_keys();
        let mut signed = sign_and_encrypt(&publisher_keys, b"hello dataset", false).unwrap();
        let last = signed.len() - 1;
        signed[last] ^= 0xFF;
        assert!(matches!(
            verify_and_decrypt(&subscriber_keys, &signed, false),
            Err(PubSubSecurityError::VerificationFailed)
        ));
    }
}
