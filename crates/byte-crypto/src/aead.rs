//! AES-256-GCM sealing of opaque key material
//!
//! Sealed format (binary):
//! ```text
//! [N bytes: ciphertext][12 bytes: random nonce][16 bytes: GCM tag]
//! ```
//!
//! The nonce and tag trail the ciphertext. Every client (Go, Swift, Rust)
//! reads and writes exactly this layout; there is no associated data.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use thiserror::Error;
use zeroize::Zeroize;

use crate::error::KeyError;
use crate::kdf::DerivedKey;
use crate::ports::{OsRandom, RandomSource};
use crate::{NONCE_SIZE, TAG_SIZE};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecryptError {
    #[error("malformed ciphertext: shorter than nonce + tag")]
    MalformedCiphertext,

    #[error("authentication failed: wrong key or corrupted data")]
    AuthenticationFailed,
}

impl From<DecryptError> for KeyError {
    fn from(_: DecryptError) -> Self {
        KeyError::DecryptionFailed
    }
}

/// Seal `plaintext` under `key` with a fresh nonce from the OS CSPRNG.
///
/// Returns `ciphertext || nonce || tag`.
pub fn encrypt(plaintext: &[u8], key: &DerivedKey) -> Result<Vec<u8>, KeyError> {
    encrypt_with(plaintext, key, &OsRandom)
}

/// [`encrypt`] with an explicit nonce source.
pub fn encrypt_with(
    plaintext: &[u8],
    key: &DerivedKey,
    rng: &dyn RandomSource,
) -> Result<Vec<u8>, KeyError> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rng.fill(&mut nonce_bytes)
        .map_err(|e| KeyError::EncryptionFailed(format!("nonce generation: {e}")))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    // aes-gcm emits `ciphertext || tag`; move the tag behind the nonce.
    let mut sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| KeyError::EncryptionFailed(format!("AES-GCM seal: {e}")))?;
    let tag = sealed.split_off(sealed.len() - TAG_SIZE);

    sealed.reserve_exact(NONCE_SIZE + TAG_SIZE);
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&tag);
    Ok(sealed)
}

/// Open a `ciphertext || nonce || tag` blob sealed by [`encrypt`].
///
/// Never returns plaintext unless the GCM tag verifies.
pub fn decrypt(sealed: &[u8], key: &DerivedKey) -> Result<Vec<u8>, DecryptError> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(DecryptError::MalformedCiphertext);
    }

    let (ciphertext, trailer) = sealed.split_at(sealed.len() - NONCE_SIZE - TAG_SIZE);
    let (nonce_bytes, tag) = trailer.split_at(NONCE_SIZE);

    let mut framed = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
    framed.extend_from_slice(ciphertext);
    framed.extend_from_slice(tag);

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let result = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), framed.as_ref())
        .map_err(|_| DecryptError::AuthenticationFailed);
    framed.zeroize();
    result
}
