//! AES-256-GCM encryption of secret payloads
//!
//! Every call to [`SecretCipher::encrypt`] draws a fresh random 96-bit nonce
//! from the system RNG. The authentication tag is appended to the
//! ciphertext, so tampering with either stored column makes decryption fail.

use crate::config::EncryptionConfig;
use crate::errors::{PasswordPalError, Result};
use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use zeroize::Zeroizing;

/// Size of AES-256-GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of AES-256-GCM tag in bytes
const TAG_SIZE: usize = 16;

/// Ciphertext and nonce as stored in `passwords.encrypted_password` and
/// `passwords.encryption_iv`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub ciphertext_hex: String,
    pub nonce_hex: String,
}

/// Single-use nonce sequence for AES-GCM
struct SingleNonce {
    nonce: Option<[u8; NONCE_SIZE]>,
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.nonce.take().map(Nonce::assume_unique_for_key).ok_or(ring::error::Unspecified)
    }
}

/// Symmetric cipher holding the process-wide key
#[derive(Clone)]
pub struct SecretCipher {
    key: Arc<Zeroizing<[u8; 32]>>,
    rng: Arc<SystemRandom>,
}

impl fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCipher").field("key", &"<redacted>").finish()
    }
}

impl SecretCipher {
    /// Build from configuration. Fails if the key is missing or not 32 bytes.
    pub fn from_config(config: &EncryptionConfig) -> Result<Self> {
        Ok(Self::new(config.key_bytes()?))
    }

    pub fn new(key: Zeroizing<[u8; 32]>) -> Self {
        Self { key: Arc::new(key), rng: Arc::new(SystemRandom::new()) }
    }

    fn unbound_key(&self) -> Result<UnboundKey> {
        UnboundKey::new(&AES_256_GCM, &self.key[..]).map_err(|_| {
            error!("Failed to create AES-256-GCM key");
            PasswordPalError::crypto("Failed to create encryption key")
        })
    }

    /// Encrypt raw bytes, returning (ciphertext || tag, nonce)
    #[instrument(skip(self, plaintext), fields(plaintext_len = plaintext.len()))]
    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_SIZE])> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        self.rng.fill(&mut nonce_bytes).map_err(|_| {
            error!("Failed to generate random nonce");
            PasswordPalError::crypto("Failed to generate random nonce for encryption")
        })?;

        let mut sealing_key =
            aead::SealingKey::new(self.unbound_key()?, SingleNonce { nonce: Some(nonce_bytes) });

        let mut buffer = Vec::with_capacity(plaintext.len() + TAG_SIZE);
        buffer.extend_from_slice(plaintext);

        sealing_key.seal_in_place_append_tag(Aad::empty(), &mut buffer).map_err(|_| {
            error!("Encryption failed");
            PasswordPalError::crypto("Failed to encrypt secret data")
        })?;

        debug!(ciphertext_len = buffer.len(), "Encrypted secret payload");
        Ok((buffer, nonce_bytes))
    }

    /// Decrypt bytes produced by [`encrypt_bytes`](Self::encrypt_bytes)
    #[instrument(skip(self, ciphertext, nonce), fields(ciphertext_len = ciphertext.len()))]
    pub fn decrypt_bytes(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let nonce_bytes: [u8; NONCE_SIZE] = nonce.try_into().map_err(|_| {
            PasswordPalError::crypto(format!(
                "Invalid nonce length: expected {} bytes, got {} bytes",
                NONCE_SIZE,
                nonce.len()
            ))
        })?;

        if ciphertext.len() < TAG_SIZE {
            return Err(PasswordPalError::crypto(
                "Ciphertext too short (missing authentication tag)",
            ));
        }

        let mut opening_key =
            aead::OpeningKey::new(self.unbound_key()?, SingleNonce { nonce: Some(nonce_bytes) });

        let mut buffer = Zeroizing::new(ciphertext.to_vec());
        let plaintext_len = opening_key
            .open_in_place(Aad::empty(), &mut buffer[..])
            .map_err(|_| {
                error!("Decryption failed: authentication tag mismatch");
                PasswordPalError::crypto("Failed to decrypt secret data")
            })?
            .len();
        buffer.truncate(plaintext_len);

        Ok(buffer)
    }

    /// Encrypt a UTF-8 secret into its hex-encoded stored form
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedPayload> {
        let (ciphertext, nonce) = self.encrypt_bytes(plaintext.as_bytes())?;
        Ok(EncryptedPayload { ciphertext_hex: hex::encode(ciphertext), nonce_hex: hex::encode(nonce) })
    }

    /// Decrypt the hex-encoded stored form back into the secret
    pub fn decrypt(&self, ciphertext_hex: &str, nonce_hex: &str) -> Result<Zeroizing<String>> {
        let ciphertext = hex::decode(ciphertext_hex)
            .map_err(|_| PasswordPalError::crypto("Stored ciphertext is not valid hex"))?;
        let nonce = hex::decode(nonce_hex)
            .map_err(|_| PasswordPalError::crypto("Stored nonce is not valid hex"))?;

        let plaintext = self.decrypt_bytes(&ciphertext, &nonce)?;
        let text = std::str::from_utf8(&plaintext)
            .map_err(|_| PasswordPalError::crypto("Decrypted secret is not valid UTF-8"))?;
        Ok(Zeroizing::new(text.to_string()))
    }
}
