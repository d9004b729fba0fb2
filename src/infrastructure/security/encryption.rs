/// Mailbox credential encryption
///
/// AES-256-GCM with a base64 envelope of `nonce (12 bytes) || ciphertext`.
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::credential_store::CredentialStore;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid encrypted data format")]
    InvalidFormat,
}

impl From<EncryptionError> for DomainError {
    fn from(err: EncryptionError) -> Self {
        DomainError::Decryption(err.to_string())
    }
}

/// Turn the configured key material into a 256-bit key.
///
/// Accepts 32 bytes as hex, then 32 bytes as base64; anything else is treated
/// as a passphrase and hashed with SHA-256.
pub fn derive_key(material: &str) -> [u8; 32] {
    if let Ok(bytes) = hex::decode(material) {
        if let Ok(key) = <[u8; 32]>::try_from(bytes.as_slice()) {
            return key;
        }
    }

    if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(material) {
        if let Ok(key) = <[u8; 32]>::try_from(bytes.as_slice()) {
            return key;
        }
    }

    let digest = Sha256::digest(material.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

#[derive(Clone)]
pub struct AesGcmCredentialStore {
    cipher: Aes256Gcm,
}

impl AesGcmCredentialStore {
    pub fn new(key_material: &str) -> Self {
        let key = derive_key(key_material);
        Self {
            cipher: Aes256Gcm::new(&key.into()),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        if plaintext.is_empty() {
            return Err(EncryptionError::EncryptionFailed(
                "Cannot encrypt empty password".to_string(),
            ));
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| EncryptionError::EncryptionFailed(e.to_string()))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
    }

    pub fn decrypt_password(&self, encrypted: &str) -> Result<String, EncryptionError> {
        if encrypted.is_empty() {
            return Err(EncryptionError::DecryptionFailed(
                "Cannot decrypt empty string".to_string(),
            ));
        }

        let combined = base64::engine::general_purpose::STANDARD
            .decode(encrypted)
            .map_err(|_| EncryptionError::InvalidFormat)?;
        if combined.len() <= NONCE_LEN {
            return Err(EncryptionError::InvalidFormat);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| EncryptionError::DecryptionFailed(e.to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| EncryptionError::DecryptionFailed("Invalid UTF-8".to_string()))
    }
}

impl CredentialStore for AesGcmCredentialStore {
    fn decrypt(&self, encrypted: &str) -> DomainResult<String> {
        Ok(self.decrypt_password(encrypted)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX_KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let store = AesGcmCredentialStore::new(HEX_KEY);
        let encrypted = store.encrypt("my-secret-password").unwrap();
        assert_eq!(store.decrypt(&encrypted).unwrap(), "my-secret-password");
    }

    #[test]
    fn test_encrypted_values_differ() {
        let store = AesGcmCredentialStore::new(HEX_KEY);
        let a = store.encrypt("same-password").unwrap();
        let b = store.encrypt("same-password").unwrap();

        // Random nonces
        assert_ne!(a, b);
        assert_eq!(store.decrypt(&a).unwrap(), "same-password");
        assert_eq!(store.decrypt(&b).unwrap(), "same-password");
    }

    #[test]
    fn test_invalid_envelopes_are_decryption_errors() {
        let store = AesGcmCredentialStore::new(HEX_KEY);
        assert!(matches!(
            store.decrypt("not-valid-base64!!!"),
            Err(DomainError::Decryption(_))
        ));
        assert!(matches!(store.decrypt("YWJj"), Err(DomainError::Decryption(_))));
        assert!(matches!(store.decrypt(""), Err(DomainError::Decryption(_))));
    }

    #[test]
    fn test_wrong_key_fails_decryption() {
        let encrypted = AesGcmCredentialStore::new("a".repeat(64).as_str())
            .encrypt("secret")
            .unwrap();
        let other = AesGcmCredentialStore::new("b".repeat(64).as_str());
        assert!(matches!(
            other.decrypt(&encrypted),
            Err(DomainError::Decryption(_))
        ));
    }

    #[test]
    fn test_key_derivation_formats() {
        let hex_key = derive_key(HEX_KEY);
        assert_eq!(hex_key[0], 0x01);

        let b64 = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
        assert_eq!(derive_key(&b64), [7u8; 32]);

        let passphrase = derive_key("correct horse battery staple");
        assert_eq!(passphrase, derive_key("correct horse battery staple"));
        assert_ne!(passphrase, derive_key("another passphrase"));
    }
}
