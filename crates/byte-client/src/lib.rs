//! byte-client: authenticated gRPC plumbing for devices and the server
//!
//! - [`AuthInterceptor`]: signs every outbound request with a fresh token
//! - [`ServerAuthenticator`]: verifies those requests on the server
//! - [`connect_lazy`]: builds an authenticated [`tonic`] channel from a
//!   validated [`byte_core::ClientConfig`]

pub mod channel;
pub mod error;
pub mod interceptor;
pub mod server;

pub use channel::{connect_lazy, AuthenticatedChannel};
pub use error::{AuthError, ChannelError};
pub use interceptor::AuthInterceptor;
pub use server::{authenticated_device, AuthenticatedDevice, DeviceRegistry, ServerAuthenticator};
