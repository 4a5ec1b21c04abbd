use thiserror::Error;

/// Errors from chain construction, key derivation and key encryption.
///
/// `DecryptionFailed` deliberately carries no detail: truncated input and a
/// failed tag check look the same to callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid client root key: must be 32 bytes")]
    InvalidRootKey,

    #[error("invalid client ID: must be a valid UUID v4")]
    InvalidClientId,

    #[error("invalid server seed: must be at least 32 bytes")]
    InvalidServerSeed,

    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed")]
    DecryptionFailed,
}
