//! byte-crypto: per-device key hierarchy and request tokens
//!
//! Key hierarchy:
//! ```text
//! Server seed (>= 32 bytes, operator supplied)
//!   └── Server root (HKDF, info="server.root.v1")
//!       └── Client root (HKDF, info="client.root.v1." || client_id)   <- device secret
//!           ├── Token key (HKDF, info="client.token.paseto-v4.v1")
//!           │   └── PASETO v4.local, implicit assertion = client_id, 30s lifetime
//!           └── Key-encryption key (HKDF, info="client.key-encryption-key.v1")
//!               └── AES-256-GCM: ciphertext || nonce(12) || tag(16)
//! ```
//!
//! Derived keys are recomputed for every operation and zeroized on drop.

pub mod aead;
pub mod chain;
pub mod error;
pub mod kdf;
pub mod ports;
pub mod server;
pub mod token;

pub use aead::{decrypt, encrypt, DecryptError};
pub use chain::ClientChain;
pub use error::KeyError;
pub use kdf::{derive_key, DerivedKey, RootKey};
pub use ports::{Clock, FixedClock, FixedRandom, OsRandom, RandomSource, SystemClock};
pub use server::ServerChain;
pub use token::{TokenClaims, TokenError};

pub use byte_core::ROOT_KEY_SIZE;

/// Size of every derived key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of an AES-GCM authentication tag
pub const TAG_SIZE: usize = 16;
