//! PASETO v4.local device tokens.
//!
//! Token format:
//! ```text
//! "v4.local." || base64url(nonce(32) || ciphertext || tag(32)) [ "." || base64url(footer) ]
//! ```
//!
//! The payload is the JSON claims `{"exp","iat","nbf"}` (RFC 3339, whole
//! seconds, UTC). The device id is bound as the implicit assertion, so a
//! token minted for one device never authenticates another.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use blake2::{
    digest::{
        consts::{U24, U32, U56},
        generic_array::GenericArray,
        Mac,
    },
    Blake2bMac,
};
use chacha20::{
    cipher::{KeyIvInit, StreamCipher},
    XChaCha20,
};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::error::KeyError;
use crate::kdf::DerivedKey;
use crate::ports::RandomSource;

const LOCAL_HEADER: &str = "v4.local.";

const DOMAIN_ENCRYPT: &[u8] = b"paseto-encryption-key";
const DOMAIN_AUTH: &[u8] = b"paseto-auth-key-for-aead";

/// Size of the v4.local nonce
pub const TOKEN_NONCE_SIZE: usize = 32;

const TAG_SIZE: usize = 32;

/// Tokens are minted per request, so the lifetime only has to cover one
/// round trip. Kept short to shrink the replay window of a leaked token.
pub const TOKEN_LIFETIME_SECS: i64 = 30;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token creation failed: {0}")]
    Creation(String),

    #[error("token key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("malformed token")]
    Malformed,

    #[error("token authentication failed")]
    Authentication,

    #[error("invalid token claims: {0}")]
    Claims(String),

    #[error("token expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("token issued in the future")]
    IssuedInFuture,
}

impl From<KeyError> for TokenError {
    fn from(e: KeyError) -> Self {
        TokenError::KeyDerivation(e.to_string())
    }
}

/// Registered claims carried by every device token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "exp", with = "rfc3339")]
    pub expiration: DateTime<Utc>,
    #[serde(rename = "iat", with = "rfc3339")]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "nbf", with = "rfc3339")]
    pub not_before: DateTime<Utc>,
}

impl TokenClaims {
    /// Claims for a token issued at `now`: valid immediately, for 30 seconds.
    pub fn new(now: DateTime<Utc>) -> Self {
        let now = now.trunc_subsecs(0);
        Self {
            expiration: now + Duration::seconds(TOKEN_LIFETIME_SECS),
            issued_at: now,
            not_before: now,
        }
    }

    /// Time checks applied by the verifier: `iat <= now`, `nbf <= now <= exp`.
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), TokenError> {
        if now > self.expiration {
            return Err(TokenError::Expired);
        }
        if now < self.not_before {
            return Err(TokenError::NotYetValid);
        }
        if self.issued_at > now {
            return Err(TokenError::IssuedInFuture);
        }
        Ok(())
    }
}

mod rfc3339 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Seal `claims` into a v4.local token bound to `implicit`.
pub fn issue(
    key: &DerivedKey,
    claims: &TokenClaims,
    implicit: &[u8],
    rng: &dyn RandomSource,
) -> Result<String, TokenError> {
    let mut message = serde_json::to_vec(claims)
        .map_err(|e| TokenError::Creation(format!("encoding claims: {e}")))?;

    let mut nonce = [0u8; TOKEN_NONCE_SIZE];
    rng.fill(&mut nonce)
        .map_err(|e| TokenError::Creation(format!("nonce generation: {e}")))?;

    let token = encrypt_message(key, &message, &nonce, None, implicit);
    message.zeroize();
    token
}

/// Authenticate and decrypt `token`, then check its time claims against `now`.
pub fn verify(
    key: &DerivedKey,
    token: &str,
    implicit: &[u8],
    now: DateTime<Utc>,
) -> Result<TokenClaims, TokenError> {
    let message = decrypt_message(key, token, implicit)?;
    let claims: TokenClaims =
        serde_json::from_slice(&message).map_err(|e| TokenError::Claims(e.to_string()))?;
    claims.validate_at(now)?;
    Ok(claims)
}

/// Split the key into the XChaCha20 key, its nonce, and the MAC key.
fn split_key(
    key: &DerivedKey,
    nonce: &[u8],
) -> Result<(Zeroizing<[u8; 32]>, [u8; 24], Zeroizing<[u8; 32]>), TokenError> {
    let init =
        |e: blake2::digest::InvalidLength| TokenError::KeyDerivation(format!("BLAKE2b key setup: {e}"));

    let mut enc_hash = Blake2bMac::<U56>::new_from_slice(key.as_bytes())
        .map_err(init)?
        .chain_update(DOMAIN_ENCRYPT)
        .chain_update(nonce)
        .finalize()
        .into_bytes();
    let mut enc_key = Zeroizing::new([0u8; 32]);
    enc_key.copy_from_slice(&enc_hash[..32]);
    let mut n2 = [0u8; 24];
    n2.copy_from_slice(&enc_hash[32..]);
    enc_hash.as_mut_slice().zeroize();

    let mut auth_hash = Blake2bMac::<U32>::new_from_slice(key.as_bytes())
        .map_err(init)?
        .chain_update(DOMAIN_AUTH)
        .chain_update(nonce)
        .finalize()
        .into_bytes();
    let mut auth_key = Zeroizing::new([0u8; 32]);
    auth_key.copy_from_slice(&auth_hash);
    auth_hash.as_mut_slice().zeroize();

    Ok((enc_key, n2, auth_key))
}

fn apply_keystream(enc_key: &[u8; 32], n2: &[u8; 24], buf: &mut [u8]) {
    XChaCha20::new(
        GenericArray::<u8, U32>::from_slice(enc_key),
        GenericArray::<u8, U24>::from_slice(n2),
    )
    .apply_keystream(buf);
}

fn auth_mac(auth_key: &[u8; 32]) -> Result<Blake2bMac<U32>, TokenError> {
    Blake2bMac::<U32>::new_from_slice(auth_key)
        .map_err(|e| TokenError::KeyDerivation(format!("BLAKE2b key setup: {e}")))
}

pub(crate) fn encrypt_message(
    key: &DerivedKey,
    message: &[u8],
    nonce: &[u8; TOKEN_NONCE_SIZE],
    footer: Option<&[u8]>,
    implicit: &[u8],
) -> Result<String, TokenError> {
    let (enc_key, n2, auth_key) = split_key(key, nonce)?;

    let mut ciphertext = message.to_vec();
    apply_keystream(&enc_key, &n2, &mut ciphertext);

    let tag = auth_mac(&auth_key)?
        .chain_update(pre_auth_encode(&[
            LOCAL_HEADER.as_bytes(),
            nonce.as_slice(),
            ciphertext.as_slice(),
            footer.unwrap_or_default(),
            implicit,
        ]))
        .finalize()
        .into_bytes();

    let mut raw = Vec::with_capacity(TOKEN_NONCE_SIZE + ciphertext.len() + TAG_SIZE);
    raw.extend_from_slice(nonce);
    raw.extend_from_slice(&ciphertext);
    raw.extend_from_slice(&tag);

    let mut token = String::from(LOCAL_HEADER);
    token.push_str(&URL_SAFE_NO_PAD.encode(&raw));
    if let Some(footer) = footer.filter(|f| !f.is_empty()) {
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(footer));
    }
    Ok(token)
}

pub(crate) fn decrypt_message(
    key: &DerivedKey,
    token: &str,
    implicit: &[u8],
) -> Result<Vec<u8>, TokenError> {
    let body = token
        .strip_prefix(LOCAL_HEADER)
        .ok_or(TokenError::Malformed)?;

    let (payload, footer) = match body.split_once('.') {
        Some((_, "")) => return Err(TokenError::Malformed),
        Some((payload, footer)) => {
            let footer = URL_SAFE_NO_PAD
                .decode(footer)
                .map_err(|_| TokenError::Malformed)?;
            (payload, footer)
        }
        None => (body, Vec::new()),
    };

    let raw = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenError::Malformed)?;
    if raw.len() < TOKEN_NONCE_SIZE + TAG_SIZE {
        return Err(TokenError::Malformed);
    }

    let (nonce, rest) = raw.split_at(TOKEN_NONCE_SIZE);
    let (ciphertext, tag) = rest.split_at(rest.len() - TAG_SIZE);

    let (enc_key, n2, auth_key) = split_key(key, nonce)?;

    auth_mac(&auth_key)?
        .chain_update(pre_auth_encode(&[
            LOCAL_HEADER.as_bytes(),
            nonce,
            ciphertext,
            footer.as_slice(),
            implicit,
        ]))
        .verify_slice(tag)
        .map_err(|_| TokenError::Authentication)?;

    let mut message = ciphertext.to_vec();
    apply_keystream(&enc_key, &n2, &mut message);
    Ok(message)
}

/// PASETO pre-authentication encoding: LE64(count) || (LE64(len) || piece)*
fn pre_auth_encode(pieces: &[&[u8]]) -> Vec<u8> {
    let len = 8 + pieces.iter().map(|p| 8 + p.len()).sum::<usize>();
    let mut out = Vec::with_capacity(len);
    out.extend_from_slice(&le64(pieces.len()));
    for piece in pieces {
        out.extend_from_slice(&le64(piece.len()));
        out.extend_from_slice(piece);
    }
    out
}

fn le64(n: usize) -> [u8; 8] {
    // MSB must be clear
    ((n as u64) & (u64::MAX >> 1)).to_le_bytes()
}
