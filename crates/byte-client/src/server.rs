//! Server side verification of device requests.

use std::collections::HashSet;
use std::sync::Arc;

use byte_core::ClientId;
use byte_crypto::{Clock, ServerChain, SystemClock};
use tonic::service::Interceptor;
use tonic::{Request, Status};
use tracing::{debug, error, warn};

use crate::error::AuthError;
use crate::interceptor::{AUTHORIZATION_HEADER, BEARER_PREFIX, DEVICE_ID_HEADER};

/// Lookup of provisioned devices.
pub trait DeviceRegistry: Send + Sync {
    fn device_exists(&self, device_id: &ClientId) -> anyhow::Result<bool>;
}

impl DeviceRegistry for HashSet<ClientId> {
    fn device_exists(&self, device_id: &ClientId) -> anyhow::Result<bool> {
        Ok(self.contains(device_id))
    }
}

/// Request extension set once a request has been authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedDevice(pub ClientId);

/// The device a request was authenticated as, if any.
pub fn authenticated_device<T>(request: &Request<T>) -> Option<&ClientId> {
    request
        .extensions()
        .get::<AuthenticatedDevice>()
        .map(|device| &device.0)
}

/// Verifies `authorization` / `device-id` on incoming requests.
///
/// The device's chain is re-derived from the server seed, so no per-device
/// secret is stored. The registry is only consulted after the token has
/// authenticated, keeping unauthenticated input away from storage. Every
/// rejection is a bare `UNAUTHENTICATED`; the reason is logged.
#[derive(Clone)]
pub struct ServerAuthenticator {
    chain: Arc<ServerChain>,
    registry: Arc<dyn DeviceRegistry>,
    clock: Arc<dyn Clock>,
}

impl ServerAuthenticator {
    pub fn new(chain: Arc<ServerChain>, registry: Arc<dyn DeviceRegistry>) -> Self {
        Self::with_clock(chain, registry, Arc::new(SystemClock))
    }

    pub fn with_clock(
        chain: Arc<ServerChain>,
        registry: Arc<dyn DeviceRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            chain,
            registry,
            clock,
        }
    }

    pub fn authenticate<T>(&self, request: &Request<T>) -> Result<ClientId, AuthError> {
        let metadata = request.metadata();

        let token = metadata
            .get(AUTHORIZATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix(BEARER_PREFIX))
            .ok_or_else(|| AuthError::InvalidToken("missing bearer token".into()))?;

        let device_id = metadata
            .get(DEVICE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::MissingDeviceId)?;

        let chain = self
            .chain
            .client_chain(device_id)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        chain
            .verify_token(token, self.clock.now())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let device_id = chain.client_id();
        match self.registry.device_exists(device_id) {
            Ok(true) => Ok(device_id.clone()),
            Ok(false) => Err(AuthError::UnknownDevice),
            Err(e) => Err(AuthError::Registry(e.to_string())),
        }
    }
}

impl std::fmt::Debug for ServerAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerAuthenticator").finish_non_exhaustive()
    }
}

impl Interceptor for ServerAuthenticator {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        match self.authenticate(&request) {
            Ok(device_id) => {
                debug!(device_id = %device_id, "authenticated request");
                request
                    .extensions_mut()
                    .insert(AuthenticatedDevice(device_id));
                Ok(request)
            }
            Err(e) => {
                match &e {
                    AuthError::Registry(_) => error!("server auth: {e}"),
                    AuthError::UnknownDevice | AuthError::MissingDeviceId => {
                        warn!("server auth: {e}")
                    }
                    _ => debug!("server auth: {e}"),
                }
                Err(Status::unauthenticated("unauthenticated"))
            }
        }
    }
}
