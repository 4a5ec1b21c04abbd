use std::sync::Arc;

use byte_core::ClientConfig;
use byte_crypto::ClientChain;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::{Channel, Endpoint};
use tracing::info;

use crate::error::ChannelError;
use crate::interceptor::AuthInterceptor;

/// A channel whose every request carries device credentials.
pub type AuthenticatedChannel = InterceptedService<Channel, AuthInterceptor>;

/// Validate `config` and open a lazily connecting, authenticated channel.
///
/// Must be called from within a Tokio runtime. No connection is attempted
/// until the first request.
pub fn connect_lazy(config: &ClientConfig) -> Result<AuthenticatedChannel, ChannelError> {
    config.validate()?;

    let root = config.root_key()?;
    let chain = Arc::new(ClientChain::new(root.as_slice(), &config.device_id)?);

    let channel = Endpoint::from_shared(config.server_url.clone())?
        .timeout(config.timeout())
        .connect_lazy();

    info!(
        server = %config.server_url,
        device_id = %chain.client_id(),
        timeout_secs = config.timeout_secs,
        "configured authenticated channel"
    );

    Ok(InterceptedService::new(channel, AuthInterceptor::new(chain)))
}
