//! Platform keychain backed [`SecretStore`].
//!
//! Uses the `keyring` crate for cross-platform access:
//! - macOS / iOS: Keychain Services
//! - Linux: GNOME Keyring / Secret Service (D-Bus)
//! - Windows: Credential Manager (DPAPI)

use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::SecretStore;

/// Keychain service every byte client stores its session under.
pub const SERVICE_NAME: &str = "com.byte.app";

#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Check if the platform keychain is available.
    pub fn is_available(&self) -> bool {
        keyring::Entry::new(&self.service, "__byte_probe__").is_ok()
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, key)
            .map_err(|e| anyhow::anyhow!("keychain entry creation: {e}"))
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl SecretStore for KeyringStore {
    fn save(&self, key: &str, value: &SecretString) -> Result<()> {
        self.entry(key)?
            .set_password(value.expose_secret())
            .map_err(|e| anyhow::anyhow!("keychain store for '{key}': {e}"))?;
        tracing::debug!(service = %self.service, key, "stored secret in platform keychain");
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<SecretString>> {
        match self.entry(key)?.get_password() {
            Ok(mut password) => {
                let secret = SecretString::from(password.clone());
                password.zeroize();
                Ok(Some(secret))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("keychain get for '{key}': {e}")),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => {
                tracing::debug!(service = %self.service, key, "deleted secret from platform keychain");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()), // already deleted
            Err(e) => Err(anyhow::anyhow!("keychain delete for '{key}': {e}")),
        }
    }
}
