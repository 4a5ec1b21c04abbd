//! Server side of the key hierarchy.
//!
//! The server never stores device secrets. It keeps one seed and re-derives
//! any device's root on demand from the device id.

use byte_core::ClientId;
use tracing::debug;

use crate::chain::ClientChain;
use crate::error::KeyError;
use crate::kdf::{hkdf_derive, RootKey};

const SERVER_ROOT_DOMAIN: &str = "server.root.v1";
const CLIENT_ROOT_DOMAIN_PREFIX: &str = "client.root.v1.";

/// Minimum length of the operator supplied seed.
pub const MIN_SERVER_SEED_SIZE: usize = 32;

#[derive(Debug, Clone)]
pub struct ServerChain {
    root: RootKey,
}

impl ServerChain {
    pub fn new(raw_seed: &[u8]) -> Result<Self, KeyError> {
        if raw_seed.len() < MIN_SERVER_SEED_SIZE {
            return Err(KeyError::InvalidServerSeed);
        }
        let root = hkdf_derive(raw_seed, SERVER_ROOT_DOMAIN.as_bytes())?;
        Ok(Self {
            root: RootKey::from_bytes(root),
        })
    }

    /// Root secret handed to the device at provisioning time.
    pub fn client_root(&self, client_id: &ClientId) -> Result<RootKey, KeyError> {
        let info = format!("{CLIENT_ROOT_DOMAIN_PREFIX}{client_id}");
        hkdf_derive(self.root.as_bytes(), info.as_bytes()).map(RootKey::from_bytes)
    }

    /// Rebuild the chain a device holds, so its tokens can be verified.
    pub fn client_chain(&self, client_id: &str) -> Result<ClientChain, KeyError> {
        let client_id = ClientId::parse(client_id).map_err(|_| KeyError::InvalidClientId)?;
        let root = self.client_root(&client_id)?;
        debug!(device_id = %client_id, "derived client chain");
        Ok(ClientChain::from_parts(root, client_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::OsRandom;
    use chrono::{TimeZone, Utc};
    use hex_literal::hex;

    const SEED: &[u8] = b"server-seed-material-at-least-32-bytes!";
    const CLIENT_ID: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn test_short_seed_rejected() {
        assert_eq!(
            ServerChain::new(&[0u8; 31]).unwrap_err(),
            KeyError::InvalidServerSeed
        );
        assert!(ServerChain::new(&[0u8; 32]).is_ok());
    }

    #[test]
    fn test_server_root_golden() {
        let server = ServerChain::new(SEED).unwrap();
        assert_eq!(
            server.root.as_bytes(),
            &hex!("7ea03fa029891d089a99344f3cf27d842842bc63b99b01cfff8f504ad8a3a6e0")
        );
    }

    #[test]
    fn test_client_root_golden() {
        let server = ServerChain::new(SEED).unwrap();
        let id = ClientId::parse(CLIENT_ID).unwrap();
        assert_eq!(
            server.client_root(&id).unwrap().as_bytes(),
            &hex!("f6f991d05a093fbb15084845500503726e2423649a7c65ac8f01f915a85e79dc")
        );
    }

    #[test]
    fn test_client_chain_invalid_id() {
        let server = ServerChain::new(SEED).unwrap();
        assert_eq!(
            server.client_chain("not-a-uuid").unwrap_err(),
            KeyError::InvalidClientId
        );
    }

    #[test]
    fn test_server_verifies_device_token() {
        let server = ServerChain::new(SEED).unwrap();
        let id = ClientId::parse(CLIENT_ID).unwrap();

        // The device only ever sees its own root.
        let root = server.client_root(&id).unwrap();
        let device = ClientChain::new(root.as_bytes(), CLIENT_ID).unwrap();

        let now = Utc.with_ymd_and_hms(2025, 10, 4, 12, 0, 0).unwrap();
        let token = device.issue_token(now, &OsRandom).unwrap();

        let rebuilt = server.client_chain(CLIENT_ID).unwrap();
        assert!(rebuilt.verify_token(&token, now).is_ok());
    }

    #[test]
    fn test_devices_get_distinct_roots() {
        let server = ServerChain::new(SEED).unwrap();
        let a = server.client_root(&ClientId::generate()).unwrap();
        let b = server.client_root(&ClientId::generate()).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }
}
