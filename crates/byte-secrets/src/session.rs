//! Persisting a provisioned device session in a [`SecretStore`].
//!
//! A session is the three configuration strings a device needs to talk to
//! its server. They are stored as separate entries so every platform client
//! (desktop, mobile, CLI) reads the same keys.

use anyhow::{Context, Result};
use byte_core::ClientConfig;
use secrecy::{ExposeSecret, SecretString};

use crate::SecretStore;

/// Well-known store key names
pub mod keys {
    pub const SERVER_URL: &str = "serverURL";
    pub const DEVICE_ID: &str = "deviceID";
    pub const SECRET: &str = "secret";

    pub const ALL: [&str; 3] = [SERVER_URL, DEVICE_ID, SECRET];
}

/// Validate `config` and write it to `store`.
///
/// Nothing is written if validation fails. If a write fails part way, the
/// entries already written are put back to what they held before the call.
pub fn save_config(store: &dyn SecretStore, config: &ClientConfig) -> Result<()> {
    config.validate().context("refusing to store invalid configuration")?;

    let entries = [
        (keys::SERVER_URL, SecretString::from(config.server_url.clone())),
        (keys::DEVICE_ID, SecretString::from(config.device_id.clone())),
        (
            keys::SECRET,
            SecretString::from(config.secret.expose_secret().to_owned()),
        ),
    ];

    let mut previous = Vec::with_capacity(entries.len());
    for (key, _) in &entries {
        let value = store
            .load(key)
            .with_context(|| format!("reading current '{key}'"))?;
        previous.push(value);
    }

    for (written, (key, value)) in entries.iter().enumerate() {
        if let Err(e) = store.save(key, value) {
            restore(store, &entries[..written], &previous);
            return Err(e.context(format!("saving '{key}'")));
        }
    }

    tracing::debug!(device_id = %config.device_id, "saved device session");
    Ok(())
}

fn restore(
    store: &dyn SecretStore,
    written: &[(&str, SecretString)],
    previous: &[Option<SecretString>],
) {
    for ((key, _), old) in written.iter().zip(previous) {
        let result = match old {
            Some(old) => store.save(key, old),
            None => store.delete(key),
        };
        if let Err(cleanup) = result {
            tracing::warn!(key, "rollback after failed save: {cleanup}");
        }
    }
}

/// Load a stored session. `Ok(None)` unless all three entries are present.
pub fn load_config(store: &dyn SecretStore) -> Result<Option<ClientConfig>> {
    let (Some(server_url), Some(device_id), Some(secret)) = (
        store.load(keys::SERVER_URL)?,
        store.load(keys::DEVICE_ID)?,
        store.load(keys::SECRET)?,
    ) else {
        return Ok(None);
    };

    let config = ClientConfig::new(
        server_url.expose_secret(),
        device_id.expose_secret(),
        secret,
    );
    config.validate().context("stored configuration is invalid")?;
    Ok(Some(config))
}

/// Remove every session entry. Missing entries are not an error.
pub fn clear_config(store: &dyn SecretStore) -> Result<()> {
    for key in keys::ALL {
        store.delete(key)?;
    }
    tracing::debug!("cleared device session");
    Ok(())
}
