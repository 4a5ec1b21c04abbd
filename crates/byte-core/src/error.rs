use thiserror::Error;

pub type ByteResult<T> = Result<T, ByteError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid client identity: must be a canonical UUID v4")]
    InvalidIdentity,
}

/// Configuration rejected before any key material is touched.
///
/// `InvalidSecret` carries a reason only, never the secret itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid device ID: {0}. Must be a valid UUID v4")]
    InvalidDeviceId(String),

    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    #[error("invalid server URL: {0:?}")]
    InvalidServerUrl(String),

    #[error("loading configuration: {0}")]
    Load(String),
}

#[derive(Debug, Error)]
pub enum ByteError {
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("secrets error: {0}")]
    Secrets(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
