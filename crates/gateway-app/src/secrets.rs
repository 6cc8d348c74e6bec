//! # Secret Box
//!
//! AES-256-GCM encryption for gateway secrets at rest.
//!
//! ```text
//! v1:<nonce hex>:<ciphertext ‖ tag hex>
//!
//! key   = SHA-256(GATEWAY_ENCRYPTION_KEY)
//! nonce = 12 random bytes per secret
//! ```
//!
//! Nothing is returned unless the GCM tag verifies.

use std::sync::Arc;

use gateway_core::{GatewayError, GatewayResult, SecretDecryptor};
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, NONCE_LEN};
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};

const VERSION: &str = "v1";

#[derive(Clone)]
pub struct SecretBox {
    key: Arc<LessSafeKey>,
    rng: SystemRandom,
}

impl SecretBox {
    pub fn new(key: impl AsRef<[u8]>) -> GatewayResult<Self> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(GatewayError::Configuration(
                "Encryption key must not be empty".to_string(),
            ));
        }
        let key_bytes = digest::digest(&digest::SHA256, key);
        let unbound = UnboundKey::new(&aead::AES_256_GCM, key_bytes.as_ref())
            .map_err(|_| GatewayError::Configuration("Invalid encryption key".to_string()))?;
        Ok(Self {
            key: Arc::new(LessSafeKey::new(unbound)),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt `plaintext` under a fresh random nonce
    pub fn seal(&self, plaintext: &str) -> GatewayResult<String> {
        let mut nonce = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce)
            .map_err(|_| GatewayError::Encryption("Failed to generate nonce".to_string()))?;
        self.seal_with_nonce(nonce, plaintext)
    }

    fn seal_with_nonce(&self, nonce: [u8; NONCE_LEN], plaintext: &str) -> GatewayResult<String> {
        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
            .map_err(|_| GatewayError::Encryption("Failed to encrypt secret".to_string()))?;

        Ok(format!(
            "{}:{}:{}",
            VERSION,
            hex::encode(nonce),
            hex::encode(&in_out)
        ))
    }

    /// Decrypt a value produced by [`SecretBox::seal`]
    pub fn open(&self, ciphertext: &str) -> GatewayResult<String> {
        let malformed = |reason: &str| GatewayError::Decryption(reason.to_string());

        let mut parts = ciphertext.trim().split(':');
        let (Some(version), Some(nonce), Some(body), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed("expected v1:<nonce>:<ciphertext>"));
        };

        if version != VERSION {
            return Err(GatewayError::Decryption(format!(
                "unsupported secret version {}",
                version
            )));
        }

        let nonce = hex::decode(nonce).map_err(|_| malformed("nonce is not hex"))?;
        let mut in_out = hex::decode(body).map_err(|_| malformed("ciphertext is not hex"))?;

        let nonce = Nonce::try_assume_unique_for_key(&nonce)
            .map_err(|_| malformed("nonce has the wrong length"))?;

        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| malformed("authentication failed"))?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| malformed("plaintext is not UTF-8"))
    }
}

impl SecretDecryptor for SecretBox {
    fn decrypt(&self, ciphertext: &str) -> GatewayResult<String> {
        self.open(ciphertext)
    }
}

/// Decryptor used when no encryption key is configured; every secret fails
pub struct NoKeyDecryptor;

impl SecretDecryptor for NoKeyDecryptor {
    fn decrypt(&self, _ciphertext: &str) -> GatewayResult<String> {
        Err(GatewayError::Decryption(
            "GATEWAY_ENCRYPTION_KEY is not set".to_string(),
        ))
    }
}
