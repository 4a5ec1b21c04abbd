//! byte-secrets: secure storage for a device's session
//!
//! The client core never talks to a keychain directly. It is handed a
//! [`SecretStore`] and treats it as an opaque string key-value store.

pub mod keychain;
pub mod memory;
pub mod session;

pub use keychain::KeyringStore;
pub use memory::MemoryStore;
pub use session::{clear_config, load_config, save_config};

use anyhow::Result;
use secrecy::SecretString;

/// Key-value store for secret strings.
pub trait SecretStore: Send + Sync {
    /// Insert or overwrite `key`.
    fn save(&self, key: &str, value: &SecretString) -> Result<()>;

    /// `Ok(None)` if `key` was never stored.
    fn load(&self, key: &str) -> Result<Option<SecretString>>;

    /// Deleting a missing key succeeds.
    fn delete(&self, key: &str) -> Result<()>;
}
