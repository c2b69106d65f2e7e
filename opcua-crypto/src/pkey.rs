// OPC UA cryptography — SPDX-License-Identifier: MPL-2.0

//! RSA asymmetric sign/verify/encrypt/decrypt, used during the OPN handshake
//! before symmetric keys exist (spec §4.4).

use rsa::{
    pkcs1v15::{Signature, SigningKey, VerifyingKey},
    pkcs8::{DecodePrivateKey, DecodePublicKey},
    signature::{RandomizedSigner, SignatureEncoding, Verifier},
    Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey,
};
use sha2::Sha256;

use opcua_types::{status_code::StatusCode, Error};

/// Asymmetric encryption padding scheme. `Pkcs1V15` is used by
/// Basic128Rsa15/Basic256/Basic256Sha256, `OaepSha256` by the newer
/// Sha256-RsaOaep/RsaPss policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaPadding {
    Pkcs1V15,
    OaepSha256,
}

/// Wraps an RSA private key, used by a server to decrypt the client's nonce
/// at OPN time and to sign responses.
pub struct PrivateKey(RsaPrivateKey);

impl PrivateKey {
    /// Parse a PKCS#8 PEM/DER-encoded private key.
    pub fn from_pem(pem: &str) -> Result<Self, Error> {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .map(PrivateKey)
            .map_err(|e| Error::new(StatusCode::BadCertificateInvalid, e.to_string()))
    }

    /// Size of the modulus in bytes; determines block sizes for padding.
    pub fn size(&self) -> usize {
        rsa::traits::PublicKeyParts::size(&self.0)
    }

    /// Decrypt `data` (the whole ciphertext, one RSA block) with `padding`.
    pub fn private_decrypt(&self, data: &[u8], padding: RsaPadding) -> Result<Vec<u8>, Error> {
        let result = match padding {
            RsaPadding::Pkcs1V15 => self.0.decrypt(Pkcs1v15Encrypt, data),
            RsaPadding::OaepSha256 => self.0.decrypt(Oaep::new::<Sha256>(), data),
        };
        result.map_err(|e| Error::new(StatusCode::BadSecurityChecksFailed, e.to_string()))
    }

    /// Sign `data` with PKCS#1 v1.5 / SHA-256, as used for `SignatureData`
    /// in CreateSession/ActivateSession (spec §4.5).
    pub fn sign_sha256(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        let signing_key = SigningKey::<Sha256>::new(self.0.clone());
        let signature: Signature = signing_key.sign_with_rng(&mut rand::thread_rng(), data);
        Ok(signature.to_vec())
    }
}

/// Wraps an RSA public key extracted from a peer's certificate.
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    /// Size of the modulus in bytes.
    pub fn size(&self) -> usize {
        rsa::traits::PublicKeyParts::size(&self.0)
    }

    /// Encrypt `data` (must fit in one RSA block for the chosen padding).
    pub fn public_encrypt(&self, data: &[u8], padding: RsaPadding) -> Result<Vec<u8>, Error> {
        let mut rng = rand::thread_rng();
        let result = match padding {
            RsaPadding::Pkcs1V15 => self.0.encrypt(&mut rng, Pkcs1v15Encrypt, data),
            RsaPadding::OaepSha256 => self.0.encrypt(&mut rng, Oaep::new::<Sha256>(), data),
        };
        result.map_err(|e| Error::new(StatusCode::BadSecurityChecksFailed, e.to_string()))
    }

    /// Verify a PKCS#1 v1.5 / SHA-256 signature produced by
    /// [`PrivateKey::sign_sha256`].
    pub fn verify_sha256(&self, data: &[u8], signature: &[u8]) -> Result<(), Error> {
        let verifying_key = VerifyingKey::<Sha256>::new(self.0.clone());
        let signature = Signature::try_from(signature)
            .map_err(|e| Error::new(StatusCode::BadSecurityChecksFailed, e.to_string()))?;
        verifying_key
            .verify(data, &signature)
            .map_err(|e| Error::new(StatusCode::BadSecurityChecksFailed, e.to_string()))
    }

    pub(crate) fn from_der(der: &[u8]) -> Result<Self, Error> {
        RsaPublicKey::from_public_key_der(der)
            .map(PublicKey)
            .map_err(|e| Error::new(StatusCode::BadCertificateInvalid, e.to_string()))
    }
}
