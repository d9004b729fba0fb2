use crate::domain::errors::DomainResult;

pub trait CredentialStore: Send + Sync {
    /// Recover the plaintext mailbox password. Fails with `DomainError::Decryption`.
    fn decrypt(&self, encrypted: &str) -> DomainResult<String>;
}
