// OPC UA cryptography — SPDX-License-Identifier: MPL-2.0

//! Security policies, symmetric/asymmetric crypto, and certificate handling
//! for the SecureChannel handshake (spec §4.4).

pub mod aeskey;
pub mod certificate_store;
pub mod hash;
pub mod pkey;
pub mod random;
pub mod security_policy;
pub mod x509;

pub use aeskey::AesKey;
pub use certificate_store::CertificateStore;
pub use pkey::{PrivateKey, PublicKey, RsaPadding};
pub use security_policy::SecurityPolicy;
pub use x509::{Thumbprint, X509};
