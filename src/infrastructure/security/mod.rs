pub mod encryption;

pub use encryption::AesGcmCredentialStore;
