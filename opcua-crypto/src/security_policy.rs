// OPC UA cryptography — SPDX-License-Identifier: MPL-2.0

//! `SecurityPolicy`: the URI-identified bundle of algorithms a SecureChannel
//! negotiates at OPN time (spec §4.4).

use std::fmt;

use opcua_types::{status_code::StatusCode, Error};

use crate::{
    aeskey::AesKey,
    hash,
    pkey::{PrivateKey, PublicKey, RsaPadding},
};

/// One of the fixed algorithm suites a server/client may advertise. Ordered
/// roughly weakest-to-strongest; `None` carries no algorithms at all and is
/// only legal when the channel's `MessageSecurityMode` is also `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityPolicy {
    #[default]
    Unknown,
    None,
    Basic128Rsa15,
    Basic256,
    Basic256Sha256,
    Aes128Sha256RsaOaep,
    Aes256Sha256RsaPss,
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

const URI_NONE: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";
const URI_BASIC_128_RSA_15: &str = "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15";
const URI_BASIC_256: &str = "http://opcfoundation.org/UA/SecurityPolicy#Basic256";
const URI_BASIC_256_SHA_256: &str = "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256";
const URI_AES_128_SHA_256_RSA_OAEP: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep";
const URI_AES_256_SHA_256_RSA_PSS: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss";

impl SecurityPolicy {
    /// The policy's URI, as carried in an `EndpointDescription` or an OPN
    /// security header.
    pub fn to_uri(self) -> &'static str {
        match self {
            SecurityPolicy::None => URI_NONE,
            SecurityPolicy::Basic128Rsa15 => URI_BASIC_128_RSA_15,
            SecurityPolicy::Basic256 => URI_BASIC_256,
            SecurityPolicy::Basic256Sha256 => URI_BASIC_256_SHA_256,
            SecurityPolicy::Aes128Sha256RsaOaep => URI_AES_128_SHA_256_RSA_OAEP,
            SecurityPolicy::Aes256Sha256RsaPss => URI_AES_256_SHA_256_RSA_PSS,
            SecurityPolicy::Unknown => "http://opcfoundation.org/UA/SecurityPolicy#Unknown",
        }
    }

    /// Parse a policy URI as advertised by a server's `EndpointDescription`.
    /// An empty string means `None` (spec §4.4: absent security policy URI
    /// implies no security).
    pub fn from_uri(uri: &str) -> SecurityPolicy {
        match uri {
            "" | URI_NONE => SecurityPolicy::None,
            URI_BASIC_128_RSA_15 => SecurityPolicy::Basic128Rsa15,
            URI_BASIC_256 => SecurityPolicy::Basic256,
            URI_BASIC_256_SHA_256 => SecurityPolicy::Basic256Sha256,
            URI_AES_128_SHA_256_RSA_OAEP => SecurityPolicy::Aes128Sha256RsaOaep,
            URI_AES_256_SHA_256_RSA_PSS => SecurityPolicy::Aes256Sha256RsaPss,
            _ => SecurityPolicy::Unknown,
        }
    }

    /// Length in bytes of the derived HMAC signing key.
    pub fn signing_key_length(self) -> usize {
        match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => 24,
            SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep
            | SecurityPolicy::Aes256Sha256RsaPss => 32,
            SecurityPolicy::None | SecurityPolicy::Unknown => 0,
        }
    }

    /// Length in bytes of the derived AES encrypting key.
    pub fn encrypting_key_length(self) -> usize {
        match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Aes128Sha256RsaOaep => 16,
            SecurityPolicy::Basic256
            | SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes256Sha256RsaPss => 32,
            SecurityPolicy::None | SecurityPolicy::Unknown => 0,
        }
    }

    /// AES block size, which also doubles as the IV length for CBC mode.
    pub fn encrypting_block_size(self) -> usize {
        match self {
            SecurityPolicy::Basic128Rsa15
            | SecurityPolicy::Basic256
            | SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep
            | SecurityPolicy::Aes256Sha256RsaPss => 16,
            SecurityPolicy::None | SecurityPolicy::Unknown => 0,
        }
    }

    /// Size in bytes of a symmetric HMAC signature under this policy.
    pub fn symmetric_signature_size(self) -> usize {
        match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => 20,
            SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep
            | SecurityPolicy::Aes256Sha256RsaPss => 32,
            SecurityPolicy::None | SecurityPolicy::Unknown => 0,
        }
    }

    /// Length in bytes of the client/server nonce exchanged at OPN time
    /// (equal to the encrypting key length for every defined policy).
    pub fn secure_channel_nonce_length(self) -> usize {
        match self {
            SecurityPolicy::None | SecurityPolicy::Unknown => 0,
            _ => self.encrypting_key_length(),
        }
    }

    /// Derive one direction's signing key, AES encrypting key, and IV from
    /// `secret`/`seed` via the PRF of Part 6 §6.7.5 (Table 33). Call once
    /// with `(remote_nonce, local_nonce)` for the local keys and once with
    /// `(local_nonce, remote_nonce)` for the remote keys.
    pub fn make_secure_channel_keys(self, secret: &[u8], seed: &[u8]) -> (Vec<u8>, AesKey, Vec<u8>) {
        let signing_key_length = self.signing_key_length();
        let encrypting_key_length = self.encrypting_key_length();
        let encrypting_block_size = self.encrypting_block_size();

        let signing_key = hash::p_sha(self, secret, seed, 0, signing_key_length);
        let encrypting_key = hash::p_sha(
            self,
            secret,
            seed,
            signing_key_length,
            encrypting_key_length,
        );
        let iv = hash::p_sha(
            self,
            secret,
            seed,
            signing_key_length + encrypting_key_length,
            encrypting_block_size,
        );

        (signing_key, AesKey::new(self, &encrypting_key), iv)
    }

    /// Validate that `mode`'s combination with this policy is legal: `None`
    /// mode requires `None` policy and vice versa (spec §4.4).
    pub fn is_valid_for_mode(self, message_security_mode_is_none: bool) -> Result<(), Error> {
        if self == SecurityPolicy::Unknown {
            return Err(Error::new(
                StatusCode::BadSecurityPolicyRejected,
                "Unknown security policy",
            ));
        }
        match (self == SecurityPolicy::None, message_security_mode_is_none) {
            (true, true) | (false, false) => Ok(()),
            (true, false) => Err(Error::new(
                StatusCode::BadSecurityModeRejected,
                "SecurityPolicy::None cannot be used with a non-None MessageSecurityMode",
            )),
            (false, true) => Err(Error::new(
                StatusCode::BadSecurityModeRejected,
                "A non-None SecurityPolicy requires a non-None MessageSecurityMode",
            )),
        }
    }

    /// `true` for every policy this crate can actually drive crypto for.
    /// `None`/`Unknown` carry no algorithms and fail this check.
    pub fn is_supported(self) -> bool {
        !matches!(self, SecurityPolicy::None | SecurityPolicy::Unknown)
    }

    /// Plaintext block size used when computing symmetric padding; equal to
    /// the AES block size for every defined policy.
    pub fn plain_block_size(self) -> usize {
        self.encrypting_block_size()
    }

    /// RSA padding scheme used for the asymmetric encrypt/decrypt performed
    /// during the OPN handshake (spec §4.4, Part 6 Table 31).
    pub fn asymmetric_encryption_padding(self) -> RsaPadding {
        match self {
            SecurityPolicy::Aes128Sha256RsaOaep | SecurityPolicy::Aes256Sha256RsaPss => {
                RsaPadding::OaepSha256
            }
            _ => RsaPadding::Pkcs1V15,
        }
    }

    /// HMAC-sign `data` with the derived symmetric signing key, writing the
    /// signature into `signature` (must be `symmetric_signature_size()` long).
    pub fn symmetric_sign(
        self,
        signing_key: &[u8],
        data: &[u8],
        signature: &mut [u8],
    ) -> Result<(), StatusCode> {
        let sig = hash::sign_hmac(self, signing_key, data);
        signature.copy_from_slice(&sig);
        Ok(())
    }

    /// Verify an HMAC signature produced by [`Self::symmetric_sign`].
    pub fn symmetric_verify_signature(
        self,
        verification_key: &[u8],
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Error> {
        if hash::verify_hmac(self, verification_key, data, signature) {
            Ok(())
        } else {
            Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                "Symmetric signature verification failed",
            ))
        }
    }

    /// AES-CBC encrypt `src` into `dst` using the derived encrypting key/IV.
    pub fn symmetric_encrypt(
        self,
        key: &AesKey,
        iv: &[u8],
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        key.encrypt(src, iv, dst).map_err(StatusCode::from)
    }

    /// AES-CBC decrypt `src` into `dst` using the derived decrypting key/IV.
    pub fn symmetric_decrypt(
        self,
        key: &AesKey,
        iv: &[u8],
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, Error> {
        key.decrypt(src, iv, dst)
    }

    /// RSA-sign `data` with `signing_key`, writing the signature into
    /// `signature` (must be at least `signing_key.size()` long).
    pub fn asymmetric_sign(
        self,
        signing_key: &PrivateKey,
        data: &[u8],
        signature: &mut [u8],
    ) -> Result<(), StatusCode> {
        let sig = signing_key.sign_sha256(data).map_err(StatusCode::from)?;
        signature[..sig.len()].copy_from_slice(&sig);
        Ok(())
    }

    /// Verify an RSA signature produced by [`Self::asymmetric_sign`].
    pub fn asymmetric_verify_signature(
        self,
        verification_key: &PublicKey,
        data: &[u8],
        signature: &[u8],
        _their_key: Option<PrivateKey>,
    ) -> Result<(), Error> {
        verification_key.verify_sha256(data, signature)
    }

    /// RSA-encrypt `src` (one block) with the peer's public key.
    pub fn asymmetric_encrypt(
        self,
        encryption_key: &PublicKey,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        let out = encryption_key
            .public_encrypt(src, self.asymmetric_encryption_padding())
            .map_err(StatusCode::from)?;
        dst[..out.len()].copy_from_slice(&out);
        Ok(out.len())
    }

    /// RSA-decrypt `src` (one block) with our own private key.
    pub fn asymmetric_decrypt(
        self,
        decryption_key: &PrivateKey,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, Error> {
        let out = decryption_key.private_decrypt(src, self.asymmetric_encryption_padding())?;
        dst[..out.len()].copy_from_slice(&out);
        Ok(out.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_round_trip() {
        for policy in [
            SecurityPolicy::None,
            SecurityPolicy::Basic128Rsa15,
            SecurityPolicy::Basic256,
            SecurityPolicy::Basic256Sha256,
            SecurityPolicy::Aes128Sha256RsaOaep,
            SecurityPolicy::Aes256Sha256RsaPss,
        ] {
            assert_eq!(SecurityPolicy::from_uri(policy.to_uri()), policy);
        }
    }

    #[test]
    fn empty_uri_is_none() {
        assert_eq!(SecurityPolicy::from_uri(""), SecurityPolicy::None);
    }

    #[test]
    fn derived_keys_have_policy_lengths() {
        let policy = SecurityPolicy::Basic256Sha256;
        let (signing_key, encrypting_key, iv) =
            policy.make_secure_channel_keys(&[1u8; 32], &[2u8; 32]);
        assert_eq!(signing_key.len(), policy.signing_key_length());
        assert_eq!(encrypting_key.value().len(), policy.encrypting_key_length());
        assert_eq!(iv.len(), policy.encrypting_block_size());
    }
}
