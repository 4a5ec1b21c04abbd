//! The per-device client chain: one root secret bound to one identity.

use chrono::{DateTime, Utc};
use tracing::debug;

use byte_core::ClientId;

use crate::aead::{self, DecryptError};
use crate::error::KeyError;
use crate::kdf::{derive_key, DerivedKey, RootKey, KEY_ENCRYPTION_KEY_DOMAIN, TOKEN_KEY_DOMAIN};
use crate::ports::{Clock, OsRandom, RandomSource, SystemClock};
use crate::token::{self, TokenClaims, TokenError};

/// A device's root secret together with its validated client id.
///
/// Holds no mutable state, so a single chain can be shared across threads
/// (behind an `Arc`) and mint tokens concurrently. The root secret is zeroed
/// when the chain is dropped. Not `Clone`: share it instead of copying the root.
#[derive(Debug)]
pub struct ClientChain {
    root: RootKey,
    client_id: ClientId,
}

impl ClientChain {
    /// Build a chain from a raw 32-byte root secret and a UUID-v4 client id.
    pub fn new(root: &[u8], client_id: &str) -> Result<Self, KeyError> {
        let root = RootKey::from_slice(root)?;
        let client_id = ClientId::parse(client_id).map_err(|_| KeyError::InvalidClientId)?;
        Ok(Self::from_parts(root, client_id))
    }

    pub fn from_parts(root: RootKey, client_id: ClientId) -> Self {
        Self { root, client_id }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Key that seals this device's PASETO tokens.
    pub fn token_key(&self) -> Result<DerivedKey, KeyError> {
        derive_key(&self.root, TOKEN_KEY_DOMAIN)
    }

    /// Key that seals opaque key material with [`ClientChain::encrypt_key`].
    pub fn key_encryption_key(&self) -> Result<DerivedKey, KeyError> {
        derive_key(&self.root, KEY_ENCRYPTION_KEY_DOMAIN)
    }

    /// Mint a fresh token valid from now for 30 seconds.
    pub fn token(&self) -> Result<String, TokenError> {
        self.token_with(&SystemClock, &OsRandom)
    }

    pub fn token_with(
        &self,
        clock: &dyn Clock,
        rng: &dyn RandomSource,
    ) -> Result<String, TokenError> {
        self.issue_token(clock.now(), rng)
    }

    /// Mint a token whose claims are anchored at `now`.
    pub fn issue_token(
        &self,
        now: DateTime<Utc>,
        rng: &dyn RandomSource,
    ) -> Result<String, TokenError> {
        let key = self.token_key()?;
        let claims = TokenClaims::new(now);
        token::issue(&key, &claims, self.client_id.as_bytes(), rng)
    }

    /// Check a token minted by this device. Used by the server, which
    /// rebuilds the chain from its seed.
    pub fn verify_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, TokenError> {
        let key = self.token_key()?;
        token::verify(&key, token, self.client_id.as_bytes(), now)
    }

    /// Seal `plaintext` under the key-encryption key.
    ///
    /// Output is `ciphertext || nonce(12) || tag(16)`.
    pub fn encrypt_key(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyError> {
        self.encrypt_key_with(plaintext, &OsRandom)
    }

    pub fn encrypt_key_with(
        &self,
        plaintext: &[u8],
        rng: &dyn RandomSource,
    ) -> Result<Vec<u8>, KeyError> {
        let kek = self.key_encryption_key()?;
        aead::encrypt_with(plaintext, &kek, rng)
    }

    pub fn decrypt_key(&self, sealed: &[u8]) -> Result<Vec<u8>, KeyError> {
        let kek = self.key_encryption_key()?;
        aead::decrypt(sealed, &kek).map_err(|e: DecryptError| {
            debug!(device_id = %self.client_id, reason = %e, "key decryption rejected");
            KeyError::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, FixedRandom};
    use base64::{engine::general_purpose::STANDARD, Engine};
    use chrono::TimeZone;
    use hex_literal::hex;

    const CLIENT_ID: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn chain() -> ClientChain {
        ClientChain::new(&[0x42u8; 32], CLIENT_ID).unwrap()
    }

    fn at(s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 4, 12, 0, s).unwrap()
    }

    #[test]
    fn test_new_valid() {
        let chain = chain();
        assert_eq!(chain.client_id().as_str(), CLIENT_ID);
    }

    #[test]
    fn test_new_short_root_key() {
        assert_eq!(
            ClientChain::new(&[0x42u8; 16], CLIENT_ID).unwrap_err(),
            KeyError::InvalidRootKey
        );
    }

    #[test]
    fn test_new_invalid_client_id() {
        assert_eq!(
            ClientChain::new(&[0x42u8; 32], "not-a-uuid").unwrap_err(),
            KeyError::InvalidClientId
        );
        // v1 UUID
        assert_eq!(
            ClientChain::new(&[0x42u8; 32], "6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap_err(),
            KeyError::InvalidClientId
        );
    }

    #[test]
    fn test_token_key_golden() {
        let key = chain().token_key().unwrap();
        assert_eq!(
            key.as_bytes(),
            &hex!("6c764f81cad7ead22a1c9d79d48992642f0cad8297bf418fc91ad698b3ea7f46")
        );
        assert_eq!(
            STANDARD.encode(key.as_bytes()),
            "bHZPgcrX6tIqHJ151ImSZC8MrYKXv0GPyRrWmLPqf0Y="
        );
        assert_eq!(chain().token_key().unwrap().as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_key_encryption_key_golden() {
        assert_eq!(
            chain().key_encryption_key().unwrap().as_bytes(),
            &hex!("3517a08756c6453db050b501d2d695d6cad131bd209341164fb36d2adbf7492e")
        );
    }

    #[test]
    fn test_encrypt_key_golden() {
        let sealed = chain()
            .encrypt_key_with(b"Hello, World!", &FixedRandom::new(vec![0x24u8]))
            .unwrap();
        assert_eq!(
            sealed,
            hex!("64bea17d82764359081fd1b67f242424242424242424242424beec40e385f480f8ff953343ec6c6bb2")
        );
    }

    #[test]
    fn test_encrypt_decrypt_key() {
        let chain = chain();
        let a = chain.encrypt_key(b"Hello, World!").unwrap();
        let b = chain.encrypt_key(b"Hello, World!").unwrap();
        assert_ne!(a, b);
        assert_eq!(chain.decrypt_key(&a).unwrap(), b"Hello, World!");
        assert_eq!(chain.decrypt_key(&b).unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_decrypt_key_failures_collapse() {
        let chain = chain();
        assert_eq!(
            chain.decrypt_key(&[0u8; 10]).unwrap_err(),
            KeyError::DecryptionFailed
        );

        let other = ClientChain::new(&[0x43u8; 32], CLIENT_ID).unwrap();
        let sealed = other.encrypt_key(b"secret").unwrap();
        assert_eq!(
            chain.decrypt_key(&sealed).unwrap_err(),
            KeyError::DecryptionFailed
        );
    }

    #[test]
    fn test_token_golden() {
        let token = chain()
            .token_with(&FixedClock(at(0)), &FixedRandom::new(vec![0x11u8]))
            .unwrap();
        assert_eq!(
            token,
            "v4.local.ERERERERERERERERERERERERERERERERERERERERERE04ECKNWcuYZYOmxPU_oNLVaNyHnnO3yyky8KLiUHweVt2kaFfZovNCLVSo3BiaKbNkLYaVBVOHWjKvU2huGv4u3qJFvSxoqVAmkWy6yF90i2mmsiGTzfOv1zNnY2u_H1ipxTutesoVXZW0cO-Teg6SExvVoj87S0"
        );
    }

    #[test]
    fn test_token_roundtrip() {
        let chain = chain();
        let token = chain.issue_token(at(0), &OsRandom).unwrap();
        let claims = chain.verify_token(&token, at(5)).unwrap();
        assert_eq!(claims.issued_at, at(0));
        assert_eq!(claims.not_before, at(0));
        assert_eq!(claims.expiration, at(30));
    }

    #[test]
    fn test_tokens_are_unique() {
        let chain = chain();
        let a = chain.token().unwrap();
        let b = chain.token().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_bound_to_identity() {
        let a = chain();
        let b = ClientChain::new(&[0x42u8; 32], "9b2c1a4e-7f3d-4e8a-b5c6-0d1e2f3a4b5c").unwrap();
        let token = a.issue_token(at(0), &OsRandom).unwrap();
        assert_eq!(
            b.verify_token(&token, at(1)).unwrap_err(),
            TokenError::Authentication
        );
    }

    #[test]
    fn test_chain_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClientChain>();
    }

    #[test]
    fn test_chain_is_not_clone() {
        use std::marker::PhantomData;

        trait NotClone {
            const IS_CLONE: bool = false;
        }
        impl<T> NotClone for T {}

        struct Check<T>(PhantomData<T>);
        impl<T: Clone> Check<T> {
            const IS_CLONE: bool = true;
        }

        assert!(Check::<RootKey>::IS_CLONE);
        assert!(!Check::<ClientChain>::IS_CLONE);
    }

    #[test]
    fn test_shared_chain_mints_across_threads() {
        let chain = std::sync::Arc::new(chain());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let chain = std::sync::Arc::clone(&chain);
                std::thread::spawn(move || chain.issue_token(at(0), &OsRandom).unwrap())
            })
            .collect();
        for handle in handles {
            let token = handle.join().unwrap();
            assert!(chain.verify_token(&token, at(1)).is_ok());
        }
    }
}
