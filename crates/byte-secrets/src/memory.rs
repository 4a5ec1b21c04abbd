use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};

use crate::SecretStore;

/// Process-local [`SecretStore`] for tests and headless runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, SecretString>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SecretString>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.len())
            .finish()
    }
}

impl SecretStore for MemoryStore {
    fn save(&self, key: &str, value: &SecretString) -> Result<()> {
        let copy = SecretString::from(value.expose_secret().to_owned());
        self.lock()?.insert(key.to_owned(), copy);
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<SecretString>> {
        Ok(self
            .lock()?
            .get(key)
            .map(|v| SecretString::from(v.expose_secret().to_owned())))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
