//! Key derivation: HKDF-SHA256 with empty salt and a domain-separation `info`

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::KeyError;
use crate::{KEY_SIZE, ROOT_KEY_SIZE};

/// `info` for the PASETO v4.local token key
pub const TOKEN_KEY_DOMAIN: &str = "client.token.paseto-v4.v1";

/// `info` for the AES-256-GCM key-encryption key
pub const KEY_ENCRYPTION_KEY_DOMAIN: &str = "client.key-encryption-key.v1";

/// A 256-bit client root secret.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct RootKey {
    bytes: [u8; ROOT_KEY_SIZE],
}

impl RootKey {
    pub fn from_bytes(bytes: [u8; ROOT_KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Copy a root key out of a slice; fails unless it is exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; ROOT_KEY_SIZE] = bytes.try_into().map_err(|_| KeyError::InvalidRootKey)?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; ROOT_KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for RootKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for RootKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A purpose-bound key derived from a root. Never cached or serialized.
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive a 32-byte key for `domain` from a root secret.
///
/// Deterministic: client and server must agree without exchanging keys.
pub fn derive_key(root: &RootKey, domain: &str) -> Result<DerivedKey, KeyError> {
    hkdf_derive(root.as_bytes(), domain.as_bytes()).map(DerivedKey::from_bytes)
}

/// HKDF-SHA256 (extract with empty salt, then expand) to 32 bytes.
pub(crate) fn hkdf_derive(ikm: &[u8], info: &[u8]) -> Result<[u8; KEY_SIZE], KeyError> {
    let hkdf = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(info, &mut okm)
        .map_err(|e| KeyError::KeyDerivationFailed(format!("HKDF expand: {e}")))?;
    Ok(okm)
}
