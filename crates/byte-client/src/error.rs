use byte_core::ConfigError;
use byte_crypto::KeyError;
use thiserror::Error;

/// Why a request failed authentication, on either side of the wire.
///
/// Never sent to the peer verbatim by the server; see
/// [`crate::ServerAuthenticator`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("failed to create authentication token: {0}")]
    TokenCreationFailed(String),

    #[error("missing device-id header")]
    MissingDeviceId,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("unknown device")]
    UnknownDevice,

    #[error("device registry: {0}")]
    Registry(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("building client chain: {0}")]
    Key(#[from] KeyError),

    #[error("transport: {0}")]
    Transport(#[from] tonic::transport::Error),
}
