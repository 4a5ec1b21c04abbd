//! byte-core: shared types for the byte client chain
//!
//! - [`types::ClientId`]: a validated UUID v4 device identity
//! - [`config::ClientConfig`]: server URL, device id and base64 root secret
//! - [`error`]: identity/config errors and the crate-wide [`ByteError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::ClientConfig;
pub use error::{ByteError, ByteResult, ConfigError, IdentityError};
pub use types::{validate_client_identity, ClientId, ROOT_KEY_SIZE};
