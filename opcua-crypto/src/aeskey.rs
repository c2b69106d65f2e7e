// OPC UA cryptography — SPDX-License-Identifier: MPL-2.0

//! Symmetric encryption / decryption wrapper.

use aes::cipher::{
    block_padding::NoPadding, generic_array::GenericArray, BlockDecryptMut, BlockEncryptMut,
    KeyIvInit,
};

use opcua_types::{status_code::StatusCode, Error};

use crate::SecurityPolicy;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const AES_BLOCK_SIZE: usize = 16;

type AesArray128 = GenericArray<u8, <aes::Aes128 as aes::cipher::BlockSizeUser>::BlockSize>;
type AesArray256 = GenericArray<u8, <aes::Aes256 as aes::cipher::KeySizeUser>::KeySize>;

type EncryptResult = Result<usize, Error>;

/// Wrapper around a raw AES key, tagged with the security policy it was
/// derived for so the caller never has to track block/IV sizes separately.
#[derive(Debug)]
pub struct AesKey {
    value: Vec<u8>,
    security_policy: SecurityPolicy,
}

impl AesKey {
    /// Create a new AES key with the given security policy and raw value.
    pub fn new(security_policy: SecurityPolicy, value: &[u8]) -> AesKey {
        AesKey {
            value: value.to_vec(),
            security_policy,
        }
    }

    /// The raw key bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    fn validate_aes_args(&self, src: &[u8], iv: &[u8], dst: &[u8]) -> Result<(), Error> {
        if dst.len() < src.len() + self.block_size() {
            Err(Error::new(
                StatusCode::BadUnexpectedError,
                format!(
                    "Dst buffer is too small {} vs {} + {}",
                    src.len(),
                    dst.len(),
                    self.block_size()
                ),
            ))
        } else if iv.len() != self.encrypting_block_size() {
            Err(Error::new(
                StatusCode::BadUnexpectedError,
                format!("IV is not an expected size, len = {}", iv.len()),
            ))
        } else if src.len() % self.block_size() != 0 {
            Err(Error::new(
                StatusCode::BadUnexpectedError,
                format!("Source length {} is not a multiple of the block size", src.len()),
            ))
        } else {
            Ok(())
        }
    }

    fn encrypt_aes128_cbc(&self, src: &[u8], iv: &[u8], dst: &mut [u8]) -> EncryptResult {
        self.validate_aes_args(src, iv, dst)?;
        Aes128CbcEnc::new(AesArray128::from_slice(&self.value), AesArray128::from_slice(iv))
            .encrypt_padded_b2b_mut::<NoPadding>(src, dst)
            .map_err(|e| Error::new(StatusCode::BadUnexpectedError, e.to_string()))?;
        Ok(src.len())
    }

    fn encrypt_aes256_cbc(&self, src: &[u8], iv: &[u8], dst: &mut [u8]) -> EncryptResult {
        self.validate_aes_args(src, iv, dst)?;
        Aes256CbcEnc::new(AesArray256::from_slice(&self.value), AesArray128::from_slice(iv))
            .encrypt_padded_b2b_mut::<NoPadding>(src, dst)
            .map_err(|e| Error::new(StatusCode::BadUnexpectedError, e.to_string()))?;
        Ok(src.len())
    }

    fn decrypt_aes128_cbc(&self, src: &[u8], iv: &[u8], dst: &mut [u8]) -> EncryptResult {
        self.validate_aes_args(src, iv, dst)?;
        Aes128CbcDec::new(AesArray128::from_slice(&self.value), AesArray128::from_slice(iv))
            .decrypt_padded_b2b_mut::<NoPadding>(src, dst)
            .map_err(|e| Error::new(StatusCode::BadUnexpectedError, e.to_string()))?;
        Ok(src.len())
    }

    fn decrypt_aes256_cbc(&self, src: &[u8], iv: &[u8], dst: &mut [u8]) -> EncryptResult {
        self.validate_aes_args(src, iv, dst)?;
        Aes256CbcDec::new(AesArray256::from_slice(&self.value), AesArray128::from_slice(iv))
            .decrypt_padded_b2b_mut::<NoPadding>(src, dst)
            .map_err(|e| Error::new(StatusCode::BadUnexpectedError, e.to_string()))?;
        Ok(src.len())
    }

    /// Block size of the associated security policy for this key.
    pub fn block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }

    /// IV length, equal to the AES block size for every CBC policy.
    pub fn encrypting_block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }

    /// Length of this key in bytes, per its security policy.
    pub fn key_length(&self) -> usize {
        self.security_policy.encrypting_key_length()
    }

    /// Encrypt `src` into `dst` using CBC under `iv`.
    pub fn encrypt(&self, src: &[u8], iv: &[u8], dst: &mut [u8]) -> EncryptResult {
        match self.security_policy {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Aes128Sha256RsaOaep => {
                self.encrypt_aes128_cbc(src, iv, dst)
            }
            SecurityPolicy::Basic256
            | SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes256Sha256RsaPss => self.encrypt_aes256_cbc(src, iv, dst),
            _ => Err(Error::new(StatusCode::BadUnexpectedError, "Unsupported security policy")),
        }
    }

    /// Decrypt `src` into `dst` using CBC under `iv`.
    pub fn decrypt(&self, src: &[u8], iv: &[u8], dst: &mut [u8]) -> EncryptResult {
        match self.security_policy {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Aes128Sha256RsaOaep => {
                self.decrypt_aes128_cbc(src, iv, dst)
            }
            SecurityPolicy::Basic256
            | SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes256Sha256RsaPss => self.decrypt_aes256_cbc(src, iv, dst),
            _ => Err(Error::new(StatusCode::BadUnexpectedError, "Unsupported security policy")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let policy = SecurityPolicy::Basic256Sha256;
        let key = AesKey::new(policy, &[7u8; 32]);
        let iv = [3u8; 16];
        let src = [1u8; 32];
        let mut ciphertext = vec![0u8; src.len() + key.block_size()];
        let n = key.encrypt(&src, &iv, &mut ciphertext).unwrap();
        let mut plaintext = vec![0u8; n + key.block_size()];
        key.decrypt(&ciphertext[..n], &iv, &mut plaintext).unwrap();
        assert_eq!(&plaintext[..n], &src[..]);
    }

    #[test]
    fn key_length_matches_policy() {
        let key = AesKey::new(SecurityPolicy::Basic128Rsa15, &[0u8; 16]);
        assert_eq!(key.key_length(), 16);
    }
}
