// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! [`SecureChannel`]: the security state of one OPC UA TCP connection —
//! negotiated policy/mode, current token, derived keys, and the sign/encrypt
//! operations applied to outgoing/incoming chunks (spec §4.4).

use std::{
    collections::HashMap,
    io::{Cursor, Write},
    ops::Range,
    time::Instant,
};

use chrono::Duration;
use log::{error, trace};

use opcua_crypto::{AesKey, CertificateStore, PrivateKey, SecurityPolicy, X509};
use opcua_types::{
    byte_string::ByteString,
    date_time::DateTime,
    encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions, Error},
    service_types::{ChannelSecurityToken, MessageSecurityMode},
    status_code::StatusCode,
};

use super::{
    message_chunk::{MessageChunk, MessageChunkHeader, MessageChunkType, MESSAGE_SIZE_OFFSET},
    security_header::{AsymmetricSecurityHeader, SecurityHeader, SymmetricSecurityHeader},
};

/// Which side of the channel this instance represents; a few behaviors
/// (who signs with which key) depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Unknown,
    Client,
    Server,
}

#[derive(Debug)]
struct RemoteKeys {
    keys: (Vec<u8>, AesKey, Vec<u8>),
    expires_at: DateTime,
}

/// All security state for one connection: negotiated policy/mode, the
/// current token, our and the peer's certificates, and derived symmetric
/// keys for both directions.
///
/// Old tokens are kept in [`Self::remote_keys`] for 125% of their lifetime
/// so a message signed just before a renewal still verifies (spec §5.5.2).
#[derive(Debug)]
pub struct SecureChannel {
    role: Role,
    security_policy: SecurityPolicy,
    security_mode: MessageSecurityMode,
    secure_channel_id: u32,
    token_created_at: DateTime,
    token_lifetime: u32,
    token_id: u32,
    cert: Option<X509>,
    private_key: Option<PrivateKey>,
    remote_cert: Option<X509>,
    remote_nonce: Vec<u8>,
    local_nonce: Vec<u8>,
    remote_keys: HashMap<u32, RemoteKeys>,
    local_keys: Option<(Vec<u8>, AesKey, Vec<u8>)>,
    decoding_options: DecodingOptions,
}

impl SecureChannel {
    /// For tests: a channel with `SecurityPolicy::None` and no certificate.
    pub fn new_no_certificate_store() -> SecureChannel {
        SecureChannel {
            role: Role::Unknown,
            security_policy: SecurityPolicy::None,
            security_mode: MessageSecurityMode::None,
            secure_channel_id: 0,
            token_id: 0,
            token_created_at: DateTime::now(),
            token_lifetime: 0,
            local_nonce: Vec::new(),
            remote_nonce: Vec::new(),
            cert: None,
            private_key: None,
            remote_cert: None,
            local_keys: None,
            decoding_options: DecodingOptions::default(),
            remote_keys: HashMap::new(),
        }
    }

    /// Load our certificate/private key from `certificate_store` and build
    /// a fresh, unsecured channel for `role`.
    pub fn new(certificate_store: &CertificateStore, role: Role) -> SecureChannel {
        let cert = match certificate_store.read_own_cert() {
            Err(e) => {
                error!("Failed to read own certificate: {e}. Check paths, crypto won't work");
                None
            }
            Ok(r) => Some(r),
        };
        let private_key = match certificate_store.read_own_pkey() {
            Err(e) => {
                error!("Failed to read own private key: {e}. Check paths, crypto won't work");
                None
            }
            Ok(r) => Some(r),
        };
        SecureChannel {
            role,
            security_mode: MessageSecurityMode::None,
            security_policy: SecurityPolicy::None,
            secure_channel_id: 0,
            token_id: 0,
            token_created_at: DateTime::now(),
            token_lifetime: 0,
            local_nonce: Vec::new(),
            remote_nonce: Vec::new(),
            cert,
            private_key,
            remote_cert: None,
            local_keys: None,
            decoding_options: DecodingOptions::default(),
            remote_keys: HashMap::new(),
        }
    }

    pub fn is_client_role(&self) -> bool {
        self.role == Role::Client
    }

    pub fn set_cert(&mut self, cert: Option<X509>) {
        self.cert = cert;
    }

    pub fn cert(&self) -> Option<&X509> {
        self.cert.as_ref()
    }

    pub fn set_remote_cert(&mut self, remote_cert: Option<X509>) {
        self.remote_cert = remote_cert;
    }

    pub fn remote_cert(&self) -> Option<&X509> {
        self.remote_cert.as_ref()
    }

    pub fn set_private_key(&mut self, private_key: Option<PrivateKey>) {
        self.private_key = private_key;
    }

    pub fn security_mode(&self) -> MessageSecurityMode {
        self.security_mode
    }

    pub fn set_security_mode(&mut self, security_mode: MessageSecurityMode) {
        self.security_mode = security_mode;
    }

    pub fn security_policy(&self) -> SecurityPolicy {
        self.security_policy
    }

    pub fn set_security_policy(&mut self, security_policy: SecurityPolicy) {
        self.security_policy = security_policy;
    }

    pub fn clear_security_token(&mut self) {
        self.secure_channel_id = 0;
        self.token_id = 0;
        self.token_created_at = DateTime::now();
        self.token_lifetime = 0;
    }

    pub fn set_security_token(&mut self, channel_token: ChannelSecurityToken) {
        self.secure_channel_id = channel_token.channel_id;
        self.token_id = channel_token.token_id;
        self.token_created_at = channel_token.created_at;
        self.token_lifetime = channel_token.revised_lifetime;
    }

    pub fn set_secure_channel_id(&mut self, secure_channel_id: u32) {
        self.secure_channel_id = secure_channel_id;
    }

    pub fn secure_channel_id(&self) -> u32 {
        self.secure_channel_id
    }

    pub fn token_created_at(&self) -> DateTime {
        self.token_created_at
    }

    pub fn token_lifetime(&self) -> u32 {
        self.token_lifetime
    }

    pub fn set_token_id(&mut self, token_id: u32) {
        self.token_id = token_id;
    }

    pub fn token_id(&self) -> u32 {
        self.token_id
    }

    pub fn set_decoding_options(&mut self, decoding_options: DecodingOptions) {
        self.decoding_options = decoding_options;
    }

    pub fn decoding_options(&self) -> DecodingOptions {
        self.decoding_options.clone()
    }

    /// `true` once 75% of the token's lifetime has elapsed (spec §5.5.2).
    pub fn should_renew_security_token(&self) -> bool {
        if self.token_id() == 0 {
            false
        } else {
            let renew_lifetime = (self.token_lifetime * 3) / 4;
            let renew_lifetime = Duration::milliseconds(renew_lifetime as i64);
            DateTime::now() - self.token_created_at > renew_lifetime
        }
    }

    /// Build the security header for a chunk of `message_type`: asymmetric
    /// while opening the channel, symmetric otherwise.
    pub fn make_security_header(&self, message_type: MessageChunkType) -> SecurityHeader {
        match message_type {
            MessageChunkType::OpenSecureChannel => {
                let asymmetric_security_header = if self.security_policy == SecurityPolicy::None {
                    AsymmetricSecurityHeader::none()
                } else {
                    let receiver_certificate_thumbprint = self
                        .remote_cert
                        .as_ref()
                        .map(|c| c.thumbprint().as_byte_string())
                        .unwrap_or_else(ByteString::null);
                    AsymmetricSecurityHeader::new(
                        self.security_policy,
                        self.cert.as_ref().expect("local certificate required to open a secured channel"),
                        receiver_certificate_thumbprint,
                    )
                };
                SecurityHeader::Asymmetric(asymmetric_security_header)
            }
            _ => SecurityHeader::Symmetric(SymmetricSecurityHeader {
                token_id: self.token_id,
            }),
        }
    }

    /// Generate a fresh local nonce sized for the current security policy.
    pub fn create_random_nonce(&mut self) {
        self.local_nonce
            .resize(self.security_policy.secure_channel_nonce_length(), 0);
        opcua_crypto::random::bytes(&mut self.local_nonce);
    }

    pub fn set_remote_cert_from_byte_string(
        &mut self,
        remote_cert: &ByteString,
    ) -> Result<(), StatusCode> {
        self.remote_cert = if remote_cert.is_null() {
            None
        } else {
            Some(X509::from_byte_string(remote_cert).map_err(StatusCode::from)?)
        };
        Ok(())
    }

    pub fn remote_cert_as_byte_string(&self) -> ByteString {
        self.remote_cert
            .as_ref()
            .map(X509::as_byte_string)
            .unwrap_or_else(ByteString::null)
    }

    pub fn set_remote_nonce_from_byte_string(
        &mut self,
        remote_nonce: &ByteString,
    ) -> Result<(), StatusCode> {
        match &remote_nonce.value {
            Some(nonce) => {
                if self.security_policy != SecurityPolicy::None
                    && nonce.len() != self.security_policy.secure_channel_nonce_length()
                {
                    error!(
                        "Remote nonce is invalid length {}, expecting {}",
                        nonce.len(),
                        self.security_policy.secure_channel_nonce_length()
                    );
                    Err(StatusCode::BadNonceInvalid)
                } else {
                    self.remote_nonce = nonce.clone();
                    Ok(())
                }
            }
            None if self.security_policy != SecurityPolicy::None => {
                error!("Remote nonce is null but security policy requires one");
                Err(StatusCode::BadNonceInvalid)
            }
            None => Ok(()),
        }
    }

    /// Derive both directions' signing/encrypting keys from the exchanged
    /// nonces (Part 6 §6.7.5 Table 33).
    pub fn derive_keys(&mut self) {
        self.insert_remote_keys(
            self.security_policy
                .make_secure_channel_keys(&self.local_nonce, &self.remote_nonce),
        );
        self.local_keys = Some(
            self.security_policy
                .make_secure_channel_keys(&self.remote_nonce, &self.local_nonce),
        );
        trace!("Derived keys for token {}", self.token_id);
    }

    /// Deadline by which the token should be renewed (4/3 of its lifetime
    /// past creation), clamped to not-before-now.
    pub fn token_renewal_deadline(&self) -> Instant {
        let deadline =
            self.token_created_at + Duration::seconds((self.token_lifetime as i64) * 4 / 3);
        let until_expiration = (deadline - DateTime::now()).num_milliseconds();
        if until_expiration < 0 {
            Instant::now()
        } else {
            Instant::now() + std::time::Duration::from_millis(until_expiration as u64)
        }
    }

    /// Signature length for a chunk secured with `security_header`: the
    /// sender's RSA key size for asymmetric, the policy's HMAC size for
    /// symmetric.
    pub fn signature_size(&self, security_header: &SecurityHeader) -> usize {
        match security_header {
            SecurityHeader::Asymmetric(security_header) => {
                if !security_header.sender_certificate.is_null() {
                    X509::from_byte_string(&security_header.sender_certificate)
                        .ok()
                        .and_then(|x509| x509.public_key().ok())
                        .map(|k| k.size())
                        .unwrap_or(0)
                } else {
                    0
                }
            }
            SecurityHeader::Symmetric(_) => self.security_policy.symmetric_signature_size(),
        }
    }

    fn minimum_padding(key_length: usize) -> usize {
        if key_length <= 256 {
            1
        } else {
            2
        }
    }

    /// Plaintext block size and minimum padding length for this channel,
    /// given the current mode/policy; `(0, 0)` when nothing is encrypted.
    pub fn get_padding_block_sizes(
        &self,
        security_header: &SecurityHeader,
        signature_size: usize,
        message_type: MessageChunkType,
    ) -> (usize, usize) {
        if self.security_policy == SecurityPolicy::None
            || (self.security_mode != MessageSecurityMode::SignAndEncrypt
                && !message_type.is_open_secure_channel())
        {
            return (0, 0);
        }

        match security_header {
            SecurityHeader::Asymmetric(security_header) => {
                if security_header.sender_certificate.is_null() {
                    (self.security_policy.plain_block_size(), signature_size)
                } else {
                    match self.remote_cert().and_then(|c| c.public_key().ok()) {
                        Some(pk) => (pk.size(), Self::minimum_padding(pk.size())),
                        None => (self.security_policy.plain_block_size(), signature_size),
                    }
                }
            }
            SecurityHeader::Symmetric(_) => (
                self.security_policy.plain_block_size(),
                Self::minimum_padding(signature_size),
            ),
        }
    }

    /// `(padding_size, minimum_padding)` needed to pad a body of
    /// `body_size` bytes up to a whole number of encryption blocks.
    pub fn padding_size(
        &self,
        security_header: &SecurityHeader,
        body_size: usize,
        signature_size: usize,
        message_type: MessageChunkType,
    ) -> (usize, usize) {
        let (plain_text_block_size, minimum_padding) =
            self.get_padding_block_sizes(security_header, signature_size, message_type);

        if plain_text_block_size == 0 {
            return (0, 0);
        }

        let encrypt_size = 8 + body_size + signature_size + minimum_padding;
        let padding_size = if encrypt_size % plain_text_block_size != 0 {
            plain_text_block_size - (encrypt_size % plain_text_block_size)
        } else {
            0
        };
        (minimum_padding + padding_size, minimum_padding)
    }

    fn add_space_for_padding_and_signature(
        &self,
        message_chunk: &MessageChunk,
    ) -> Result<Vec<u8>, Error> {
        let chunk_info = message_chunk.chunk_info(self)?;
        let data = &message_chunk.data[..];
        let security_header = chunk_info.security_header;
        let signature_size = self.signature_size(&security_header);
        let body_size = chunk_info.body_length;

        let (padding_size, minimum_padding) = self.padding_size(
            &security_header,
            body_size,
            signature_size,
            chunk_info.message_header.message_type,
        );

        let buffer = Vec::with_capacity(message_chunk.data.len() + padding_size + signature_size);
        let mut stream = Cursor::new(buffer);
        stream.write_all(data)?;

        if padding_size > 0 {
            if minimum_padding == 1 {
                let padding_byte = ((padding_size - 1) & 0xff) as u8;
                stream.write_all(&vec![padding_byte; padding_size])?;
            } else {
                let padding_byte = ((padding_size - 2) & 0xff) as u8;
                let extra_padding_byte = ((padding_size - 2) >> 8) as u8;
                stream.write_all(&vec![padding_byte; padding_size - 1])?;
                extra_padding_byte.encode(&mut stream)?;
            }
        }
        stream.write_all(&vec![0u8; signature_size])?;

        let message_size = data.len() + padding_size + signature_size;
        Self::update_message_size_and_truncate(stream.into_inner(), message_size)
    }

    fn update_message_size(data: &mut [u8], message_size: usize) -> Result<(), Error> {
        let mut stream = Cursor::new(data);
        stream.set_position(MESSAGE_SIZE_OFFSET as u64);
        (message_size as u32).encode(&mut stream)?;
        Ok(())
    }

    /// Patch a chunk's `message_size` header field and truncate the buffer
    /// to match, once padding/signature have been added.
    pub fn update_message_size_and_truncate(
        mut data: Vec<u8>,
        message_size: usize,
    ) -> Result<Vec<u8>, Error> {
        Self::update_message_size(&mut data[..], message_size)?;
        data.truncate(message_size);
        Ok(data)
    }

    /// Sign (and encrypt, if the mode requires it) `message_chunk` into
    /// `dst`, returning the number of bytes written.
    pub fn apply_security(
        &self,
        message_chunk: &MessageChunk,
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        let size = if self.security_policy != SecurityPolicy::None
            && (self.security_mode == MessageSecurityMode::Sign
                || self.security_mode == MessageSecurityMode::SignAndEncrypt)
        {
            let encrypted_data_offset =
                message_chunk.encrypted_data_offset(&self.decoding_options())
                    .map_err(StatusCode::from)?;

            let data = self
                .add_space_for_padding_and_signature(message_chunk)
                .map_err(StatusCode::from)?;
            let encrypted_range = encrypted_data_offset..data.len();

            let mut data = data;
            let encrypted_size = if message_chunk.is_open_secure_channel(&self.decoding_options()) {
                self.asymmetric_sign_and_encrypt(&mut data, encrypted_range, dst)?
            } else {
                let signed_range =
                    0..(data.len() - self.security_policy.symmetric_signature_size());
                self.symmetric_sign_and_encrypt(&mut data, signed_range, encrypted_range, dst)?
            };
            encrypted_size
        } else {
            let size = message_chunk.data.len();
            if size > dst.len() {
                error!(
                    "Message chunk size {} exceeds destination buffer {}",
                    size,
                    dst.len()
                );
                return Err(StatusCode::BadEncodingLimitsExceeded);
            }
            dst[..size].copy_from_slice(&message_chunk.data[..]);
            size
        };
        Ok(size)
    }

    fn asymmetric_sign_and_encrypt(
        &self,
        src: &mut [u8],
        encrypted_range: Range<usize>,
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        let header_size = encrypted_range.start;
        let signing_key = self
            .private_key
            .as_ref()
            .ok_or(StatusCode::BadCertificateInvalid)?;
        let signing_key_size = signing_key.size();

        let signed_range = 0..(encrypted_range.end - signing_key_size);
        let encryption_key = self
            .remote_cert
            .as_ref()
            .ok_or(StatusCode::BadCertificateInvalid)?
            .public_key()
            .map_err(StatusCode::from)?;

        let (l, r) = src.split_at_mut(signed_range.end);
        self.security_policy
            .asymmetric_sign(signing_key, l, &mut r[0..signing_key_size])?;

        let encrypted_size = self.security_policy.asymmetric_encrypt(
            &encryption_key,
            &src[encrypted_range.start..encrypted_range.end],
            &mut dst[encrypted_range.start..],
        )?;
        dst[0..encrypted_range.start].copy_from_slice(&src[0..encrypted_range.start]);
        Self::update_message_size(dst, header_size + encrypted_size).map_err(StatusCode::from)?;

        Ok(header_size + encrypted_size)
    }

    fn check_padding_bytes(padding_bytes: &[u8], expected_padding_byte: u8) -> Result<(), Error> {
        if padding_bytes.iter().any(|b| *b != expected_padding_byte) {
            return Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                "Padding byte mismatch",
            ));
        }
        Ok(())
    }

    fn verify_padding(
        &self,
        src: &[u8],
        key_size: usize,
        padding_end: usize,
    ) -> Result<Range<usize>, Error> {
        let padding_range = if key_size > 256 {
            let padding_byte = src[padding_end - 2];
            let extra_padding_byte = src[padding_end - 1];
            let padding_size = ((extra_padding_byte as usize) << 8) + (padding_byte as usize);
            let padding_range = (padding_end - padding_size - 2)..padding_end;
            Self::check_padding_bytes(&src[padding_range.start..(padding_range.end - 1)], padding_byte)?;
            padding_range
        } else {
            let padding_byte = src[padding_end - 1];
            let padding_size = padding_byte as usize;
            let padding_range = (padding_end - padding_size - 1)..padding_end;
            Self::check_padding_bytes(&src[padding_range.clone()], padding_byte)?;
            padding_range
        };
        Ok(padding_range)
    }

    /// Decrypt and verify `src`, returning a plain [`MessageChunk`].
    pub fn verify_and_remove_security(&mut self, src: &[u8]) -> Result<MessageChunk, Error> {
        let decoding_options = self.decoding_options();
        let (message_header, security_header, encrypted_data_offset) = {
            let mut stream = Cursor::new(src);
            let message_header = MessageChunkHeader::decode(&mut stream, &decoding_options)?;
            let security_header = SecurityHeader::decode_from_stream(
                &mut stream,
                message_header.message_type.is_open_secure_channel(),
                &decoding_options,
            )?;
            (message_header, security_header, stream.position() as usize)
        };

        let message_size = message_header.message_size as usize;
        if message_size != src.len() {
            return Err(Error::new(
                StatusCode::BadUnexpectedError,
                format!(
                    "Message size {} does not match supplied buffer {}",
                    message_size,
                    src.len()
                ),
            ));
        }

        let data = if message_header.message_type.is_open_secure_channel() {
            let encrypted_range = encrypted_data_offset..message_size;
            let SecurityHeader::Asymmetric(security_header) = security_header else {
                return Err(Error::new(
                    StatusCode::BadUnexpectedError,
                    "Expected asymmetric security header on OpenSecureChannel chunk",
                ));
            };

            let security_policy_uri = security_header.security_policy_uri.as_ref();
            let security_policy = SecurityPolicy::from_uri(security_policy_uri);
            match security_policy {
                SecurityPolicy::Unknown => {
                    return Err(Error::new(
                        StatusCode::BadSecurityPolicyRejected,
                        format!("Security policy {security_policy_uri} is unknown"),
                    ));
                }
                SecurityPolicy::None => {
                    return Ok(MessageChunk { data: src.to_vec() });
                }
                _ => {}
            }
            self.security_policy = security_policy;

            if security_header.sender_certificate.is_null() {
                return Err(Error::new(StatusCode::BadCertificateInvalid, "Sender certificate is null"));
            }
            let sender_certificate = X509::from_byte_string(&security_header.sender_certificate)?;
            let verification_key = sender_certificate.public_key()?;
            let receiver_thumbprint = security_header.receiver_certificate_thumbprint;

            let mut decrypted_data = vec![0u8; message_size];
            let decrypted_size = self.asymmetric_decrypt_and_verify(
                security_policy,
                &verification_key,
                receiver_thumbprint,
                src,
                encrypted_range,
                &mut decrypted_data,
            )?;
            Self::update_message_size_and_truncate(decrypted_data, decrypted_size)?
        } else if self.security_policy != SecurityPolicy::None
            && (self.security_mode == MessageSecurityMode::Sign
                || self.security_mode == MessageSecurityMode::SignAndEncrypt)
        {
            let signature_size = self.security_policy.symmetric_signature_size();
            let encrypted_range = encrypted_data_offset..message_size;
            let signed_range = 0..(message_size - signature_size);

            let SecurityHeader::Symmetric(security_header) = security_header else {
                return Err(Error::new(
                    StatusCode::BadUnexpectedError,
                    "Expected symmetric security header",
                ));
            };

            let mut decrypted_data = vec![0u8; message_size];
            let decrypted_size = self.symmetric_decrypt_and_verify(
                src,
                signed_range,
                encrypted_range,
                security_header.token_id,
                &mut decrypted_data,
            )?;
            Self::update_message_size_and_truncate(decrypted_data, decrypted_size)?
        } else {
            src.to_vec()
        };

        Ok(MessageChunk { data })
    }

    #[allow(clippy::too_many_arguments)]
    fn asymmetric_decrypt_and_verify(
        &self,
        security_policy: SecurityPolicy,
        verification_key: &opcua_crypto::PublicKey,
        receiver_thumbprint: ByteString,
        src: &[u8],
        encrypted_range: Range<usize>,
        dst: &mut [u8],
    ) -> Result<usize, Error> {
        if !security_policy.is_supported() {
            return Err(Error::new(
                StatusCode::BadSecurityPolicyRejected,
                format!("Security policy {security_policy} is not supported"),
            ));
        }

        let our_cert = self
            .cert
            .as_ref()
            .ok_or_else(|| Error::new(StatusCode::BadCertificateInvalid, "No local certificate"))?;
        let our_thumbprint = our_cert.thumbprint();
        if our_thumbprint.as_byte_string() != receiver_thumbprint {
            return Err(Error::new(
                StatusCode::BadNoValidCertificates,
                "Supplied thumbprint does not match application certificate's thumbprint",
            ));
        }

        dst[..encrypted_range.start].copy_from_slice(&src[..encrypted_range.start]);

        let encrypted_size = encrypted_range.end - encrypted_range.start;
        let mut decrypted_tmp = vec![0u8; encrypted_size];
        let private_key = self
            .private_key
            .as_ref()
            .ok_or_else(|| Error::new(StatusCode::BadCertificateInvalid, "No local private key"))?;
        let decrypted_size = security_policy.asymmetric_decrypt(
            private_key,
            &src[encrypted_range.clone()],
            &mut decrypted_tmp,
        )?;

        let verification_key_signature_size = verification_key.size();
        dst[encrypted_range.start..(encrypted_range.start + decrypted_size)]
            .copy_from_slice(&decrypted_tmp[0..decrypted_size]);

        let signature_dst_offset =
            encrypted_range.start + decrypted_size - verification_key_signature_size;
        let signature_range_dst =
            signature_dst_offset..(signature_dst_offset + verification_key_signature_size);
        let signed_range_dst = 0..signature_dst_offset;

        let key_size = our_cert.public_key().map(|k| k.size()).unwrap_or_else(|_| verification_key.size());
        security_policy.asymmetric_verify_signature(
            verification_key,
            &dst[signed_range_dst],
            &dst[signature_range_dst.clone()],
            None,
        )?;

        let padding_range = self.verify_padding(dst, key_size, signature_range_dst.start)?;
        Ok(padding_range.start)
    }

    pub fn local_nonce(&self) -> &[u8] {
        &self.local_nonce
    }

    pub fn set_local_nonce(&mut self, local_nonce: &[u8]) {
        self.local_nonce.clear();
        self.local_nonce.extend_from_slice(local_nonce);
    }

    pub fn local_nonce_as_byte_string(&self) -> ByteString {
        if self.local_nonce.is_empty() {
            ByteString::null()
        } else {
            ByteString::from(self.local_nonce.clone())
        }
    }

    pub fn set_remote_nonce(&mut self, remote_nonce: &[u8]) {
        self.remote_nonce.clear();
        self.remote_nonce.extend_from_slice(remote_nonce);
    }

    pub fn remote_nonce(&self) -> &[u8] {
        &self.remote_nonce
    }

    pub fn remote_nonce_as_byte_string(&self) -> ByteString {
        if self.remote_nonce.is_empty() {
            ByteString::null()
        } else {
            ByteString::from(self.remote_nonce.clone())
        }
    }

    fn local_keys(&self) -> &(Vec<u8>, AesKey, Vec<u8>) {
        self.local_keys.as_ref().expect("local keys derived before first secured message")
    }

    fn insert_remote_keys(&mut self, keys: (Vec<u8>, AesKey, Vec<u8>)) {
        self.remote_keys.retain(|_, v| DateTime::now() < v.expires_at);
        let expires_at = (self.token_lifetime as f32 * 1.25).ceil();
        let expires_at = Duration::milliseconds(expires_at as i64);
        self.remote_keys.insert(
            self.token_id,
            RemoteKeys {
                keys,
                expires_at: self.token_created_at + expires_at,
            },
        );
    }

    fn get_remote_keys(&self, token_id: u32) -> Option<&(Vec<u8>, AesKey, Vec<u8>)> {
        self.remote_keys.get(&token_id).map(|k| &k.keys)
    }

    fn encryption_keys(&self) -> (&AesKey, &[u8]) {
        let keys = self.local_keys();
        (&keys.1, &keys.2)
    }

    fn signing_key(&self) -> &[u8] {
        &self.local_keys().0
    }

    fn decryption_keys(&self, token_id: u32) -> Option<(&AesKey, &[u8])> {
        let keys = self.get_remote_keys(token_id)?;
        Some((&keys.1, &keys.2))
    }

    fn verification_key(&self, token_id: u32) -> Option<&[u8]> {
        Some(&self.get_remote_keys(token_id)?.0)
    }

    /// Sign (and, in `SignAndEncrypt` mode, encrypt) one chunk symmetrically.
    pub fn symmetric_sign_and_encrypt(
        &self,
        src: &mut [u8],
        signed_range: Range<usize>,
        encrypted_range: Range<usize>,
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        let encrypted_size = match self.security_mode {
            MessageSecurityMode::None => {
                dst.copy_from_slice(src);
                src.len()
            }
            MessageSecurityMode::Sign => {
                let size = self.symmetric_sign_in_place(src, signed_range)?;
                dst[0..size].copy_from_slice(&src[0..size]);
                size
            }
            MessageSecurityMode::SignAndEncrypt => {
                self.symmetric_sign_in_place(src, signed_range)?;
                let (key, iv) = self.encryption_keys();
                let encrypted_size = self.security_policy.symmetric_encrypt(
                    key,
                    iv,
                    &src[encrypted_range.clone()],
                    &mut dst[encrypted_range.start..],
                )?;
                dst[..encrypted_range.start].copy_from_slice(&src[..encrypted_range.start]);
                encrypted_range.start + encrypted_size
            }
            MessageSecurityMode::Invalid => {
                return Err(StatusCode::BadSecurityModeRejected);
            }
        };
        Ok(encrypted_size)
    }

    fn symmetric_sign_in_place(
        &self,
        buf: &mut [u8],
        signed_range: Range<usize>,
    ) -> Result<usize, StatusCode> {
        let signature_size = self.security_policy.symmetric_signature_size();
        let signing_key = self.signing_key();
        let (l, r) = buf.split_at_mut(signed_range.end);
        self.security_policy
            .symmetric_sign(signing_key, l, &mut r[0..signature_size])?;
        Ok(signed_range.end + signature_size)
    }

    /// Decrypt and verify one symmetrically-secured chunk.
    pub fn symmetric_decrypt_and_verify(
        &self,
        src: &[u8],
        signed_range: Range<usize>,
        encrypted_range: Range<usize>,
        token_id: u32,
        dst: &mut [u8],
    ) -> Result<usize, Error> {
        match self.security_mode {
            MessageSecurityMode::None => {
                dst[..].copy_from_slice(src);
                Ok(src.len())
            }
            MessageSecurityMode::Sign => {
                dst.copy_from_slice(src);
                let signature_range = signed_range.end..src.len();
                let verification_key = self.verification_key(token_id).ok_or_else(|| {
                    Error::new(StatusCode::BadSecureChannelClosed, "Missing verification key")
                })?;
                self.security_policy.symmetric_verify_signature(
                    verification_key,
                    &dst[signed_range.clone()],
                    &dst[signature_range],
                )?;
                Ok(signed_range.end)
            }
            MessageSecurityMode::SignAndEncrypt => {
                let ciphertext_size = encrypted_range.end - encrypted_range.start;
                dst[..encrypted_range.start].copy_from_slice(&src[..encrypted_range.start]);

                let mut decrypted_tmp = vec![0u8; ciphertext_size + 16];
                let (key, iv) = self.decryption_keys(token_id).ok_or_else(|| {
                    Error::new(StatusCode::BadSecureChannelClosed, "Missing decryption keys")
                })?;
                let decrypted_size = self.security_policy.symmetric_decrypt(
                    key,
                    iv,
                    &src[encrypted_range.clone()],
                    &mut decrypted_tmp[..],
                )?;

                let encrypted_range =
                    encrypted_range.start..(encrypted_range.start + decrypted_size);
                dst[encrypted_range.clone()].copy_from_slice(&decrypted_tmp[..decrypted_size]);

                let signature_range = (encrypted_range.end
                    - self.security_policy.symmetric_signature_size())
                    ..encrypted_range.end;
                let verification_key = self.verification_key(token_id).ok_or_else(|| {
                    Error::new(StatusCode::BadSecureChannelClosed, "Missing verification key")
                })?;
                let signature_start = signature_range.start;
                self.security_policy.symmetric_verify_signature(
                    verification_key,
                    &dst[signed_range],
                    &dst[signature_range],
                )?;

                let key_size = key.key_length();
                let padding_range = self.verify_padding(dst, key_size, signature_start)?;
                Ok(padding_range.start)
            }
            MessageSecurityMode::Invalid => Err(Error::new(
                StatusCode::BadSecurityModeRejected,
                "Message security mode is invalid",
            )),
        }
    }

    pub fn set_token_lifetime(&mut self, token_lifetime: u32) {
        self.token_lifetime = token_lifetime;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_channel_has_no_token() {
        let channel = SecureChannel::new_no_certificate_store();
        assert_eq!(channel.token_id(), 0);
        assert!(!channel.should_renew_security_token());
    }

    #[test]
    fn none_policy_chunk_passes_through_unsecured() {
        let mut channel = SecureChannel::new_no_certificate_store();
        channel.set_secure_channel_id(7);
        let chunk = MessageChunk::new(
            1,
            1,
            MessageChunkType::Message,
            super::super::message_chunk::MessageIsFinalType::Final,
            &channel,
            b"hello",
        )
        .unwrap();
        let mut dst = vec![0u8; chunk.data.len()];
        let size = channel.apply_security(&chunk, &mut dst).unwrap();
        assert_eq!(&dst[..size], &chunk.data[..]);
    }
}
