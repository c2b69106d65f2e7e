// OPC UA cryptography — SPDX-License-Identifier: MPL-2.0

//! Thin wrapper over a peer's DER-encoded X.509 certificate, as carried in
//! an asymmetric `SecurityHeader` or a `CreateSessionRequest` (spec §4.4,
//! §4.5).

use sha1::{Digest, Sha1};
use x509_cert::{
    der::{Decode, Encode},
    Certificate,
};

use opcua_types::{byte_string::ByteString, status_code::StatusCode, Error};

use crate::pkey::PublicKey;

/// SHA-1 thumbprint of a DER-encoded certificate, as carried in a
/// `receiver_certificate_thumbprint` security-header field (spec §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbprint(pub [u8; Thumbprint::THUMBPRINT_SIZE]);

impl Thumbprint {
    /// Fixed length of a SHA-1 thumbprint.
    pub const THUMBPRINT_SIZE: usize = 20;

    /// Compute the thumbprint of `der`.
    pub fn new(der: &[u8]) -> Self {
        let digest = Sha1::digest(der);
        let mut bytes = [0u8; Self::THUMBPRINT_SIZE];
        bytes.copy_from_slice(&digest);
        Thumbprint(bytes)
    }

    /// The thumbprint as a `ByteString`, ready to embed in a security header.
    pub fn as_byte_string(&self) -> ByteString {
        ByteString::from(self.0.to_vec())
    }
}

/// A parsed certificate plus its original DER bytes (signature checks need
/// the exact encoding, not a round-tripped one).
pub struct X509 {
    der: Vec<u8>,
    certificate: Certificate,
}

impl X509 {
    /// Parse `der` as a DER-encoded X.509 certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        let certificate = Certificate::from_der(der)
            .map_err(|e| Error::new(StatusCode::BadCertificateInvalid, e.to_string()))?;
        Ok(Self {
            der: der.to_vec(),
            certificate,
        })
    }

    /// Parse the DER payload of a `ByteString` certificate field, rejecting
    /// a null/empty one with `BadCertificateInvalid`.
    pub fn from_byte_string(bytes: &ByteString) -> Result<Self, Error> {
        if bytes.is_null() {
            return Err(Error::new(StatusCode::BadCertificateInvalid, "Certificate is null"));
        }
        Self::from_der(bytes.as_bytes())
    }

    /// The original DER bytes, suitable for embedding in a `ByteString`.
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// The original DER bytes wrapped as a `ByteString`, as carried in a
    /// `sender_certificate` security-header field.
    pub fn as_byte_string(&self) -> ByteString {
        ByteString::from(self.der.clone())
    }

    /// SHA-1 thumbprint of this certificate's DER encoding.
    pub fn thumbprint(&self) -> Thumbprint {
        Thumbprint::new(&self.der)
    }

    /// The certificate's RSA public key, used to verify signatures or
    /// encrypt the client nonce during OPN.
    pub fn public_key(&self) -> Result<PublicKey, Error> {
        let spki = &self.certificate.tbs_certificate.subject_public_key_info;
        let der = spki
            .to_der()
            .map_err(|e| Error::new(StatusCode::BadCertificateInvalid, e.to_string()))?;
        PublicKey::from_der(&der)
    }

    /// The certificate's subject `CN`, used to derive the server's
    /// `ApplicationDescription.application_name` when none is configured.
    /// Best-effort: parses the subject's `Display` form rather than
    /// re-decoding individual RDN attribute values.
    pub fn common_name(&self) -> Option<String> {
        let subject = self.certificate.tbs_certificate.subject.to_string();
        subject.split(',').find_map(|rdn| {
            let rdn = rdn.trim();
            rdn.strip_prefix("CN=").map(str::to_string)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_byte_string_is_rejected() {
        let result = X509::from_byte_string(&ByteString::null());
        assert!(result.is_err());
    }
}
