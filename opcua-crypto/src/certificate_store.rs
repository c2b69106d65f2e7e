// OPC UA cryptography — SPDX-License-Identifier: MPL-2.0

//! Loads and holds the application instance certificate and private key used
//! to secure this end of every `SecureChannel` (spec §4.4, §6).

use std::path::{Path, PathBuf};

use opcua_types::{status_code::StatusCode, Error};

use crate::{pkey::PrivateKey, x509::X509};

/// Where the application's own certificate and private key live on disk.
/// Trust/rejected-list handling is a server-level concern (`CertificateVerification`);
/// this type only manages the identity this process presents to peers.
#[derive(Debug, Clone)]
pub struct CertificateStore {
    cert_path: PathBuf,
    private_key_path: PathBuf,
}

impl CertificateStore {
    /// Point the store at a PEM certificate and a PKCS#8 PEM private key.
    pub fn new(cert_path: impl Into<PathBuf>, private_key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            private_key_path: private_key_path.into(),
        }
    }

    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    pub fn private_key_path(&self) -> &Path {
        &self.private_key_path
    }

    /// Read the application's own certificate from `cert_path`.
    pub fn read_own_cert(&self) -> Result<X509, Error> {
        let der = std::fs::read(&self.cert_path).map_err(|e| {
            Error::new(
                StatusCode::BadCertificateInvalid,
                format!("Cannot read certificate at {:?}: {e}", self.cert_path),
            )
        })?;
        X509::from_der(&der)
    }

    /// Read the application's own private key from `private_key_path`.
    pub fn read_own_pkey(&self) -> Result<PrivateKey, Error> {
        let pem = std::fs::read_to_string(&self.private_key_path).map_err(|e| {
            Error::new(
                StatusCode::BadCertificateInvalid,
                format!(
                    "Cannot read private key at {:?}: {e}",
                    self.private_key_path
                ),
            )
        })?;
        PrivateKey::from_pem(&pem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cert_file_is_reported() {
        let store = CertificateStore::new("/nonexistent/cert.der", "/nonexistent/key.pem");
        assert!(store.read_own_cert().is_err());
    }
}
