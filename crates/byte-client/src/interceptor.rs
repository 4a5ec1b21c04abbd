//! Client side request authentication.
//!
//! Every outbound call gets a freshly minted token. Nothing is cached, so
//! there is no refresh logic and a leaked token is only good for 30 seconds.

use std::sync::Arc;

use byte_crypto::{ClientChain, Clock, OsRandom, RandomSource, SystemClock};
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::Interceptor;
use tonic::{Request, Status};
use tracing::warn;

use crate::error::AuthError;

pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const DEVICE_ID_HEADER: &str = "device-id";
pub const BEARER_PREFIX: &str = "Bearer ";

/// Adds `authorization: Bearer <token>` and `device-id` to every request.
///
/// If a token cannot be minted the call is rejected with `UNAUTHENTICATED`
/// before it reaches the transport. There is no retry: a failed mint is a
/// configuration or crypto problem.
#[derive(Clone)]
pub struct AuthInterceptor {
    chain: Arc<ClientChain>,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
}

impl AuthInterceptor {
    pub fn new(chain: Arc<ClientChain>) -> Self {
        Self::with_ports(chain, Arc::new(SystemClock), Arc::new(OsRandom))
    }

    pub fn with_ports(
        chain: Arc<ClientChain>,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self { chain, clock, rng }
    }

    pub fn chain(&self) -> &ClientChain {
        &self.chain
    }

    fn authenticate<T>(&self, request: &mut Request<T>) -> Result<(), AuthError> {
        let token = self
            .chain
            .token_with(self.clock.as_ref(), self.rng.as_ref())
            .map_err(|e| AuthError::TokenCreationFailed(e.to_string()))?;

        let bearer = format!("{BEARER_PREFIX}{token}")
            .parse::<MetadataValue<Ascii>>()
            .map_err(|e| AuthError::TokenCreationFailed(e.to_string()))?;
        let device_id = self
            .chain
            .client_id()
            .as_str()
            .parse::<MetadataValue<Ascii>>()
            .map_err(|e| AuthError::TokenCreationFailed(e.to_string()))?;

        let metadata = request.metadata_mut();
        metadata.insert(AUTHORIZATION_HEADER, bearer);
        metadata.insert(DEVICE_ID_HEADER, device_id);
        Ok(())
    }
}

impl std::fmt::Debug for AuthInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInterceptor")
            .field("device_id", self.chain.client_id())
            .finish_non_exhaustive()
    }
}

impl Interceptor for AuthInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        match self.authenticate(&mut request) {
            Ok(()) => Ok(request),
            Err(e) => {
                warn!(device_id = %self.chain.client_id(), "rejecting outbound request: {e}");
                Err(Status::unauthenticated(e.to_string()))
            }
        }
    }
}
