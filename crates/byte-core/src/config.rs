use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use tonic::transport::Uri;
use zeroize::{Zeroize, Zeroizing};

use crate::error::ConfigError;
use crate::types::{validate_client_identity, ROOT_KEY_SIZE};

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client configuration (loaded from ~/.byte/config.toml or secure storage)
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server base URL, e.g. `http://localhost:8080`
    pub server_url: String,
    /// Device id (UUID v4)
    #[serde(alias = "id")]
    pub device_id: String,
    /// Base64 (standard alphabet) 32-byte root secret
    #[serde(deserialize_with = "deserialize_secret")]
    pub secret: SecretString,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".into(),
            device_id: String::new(),
            secret: SecretString::from(String::new()),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    pub fn new(
        server_url: impl Into<String>,
        device_id: impl Into<String>,
        secret: SecretString,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            device_id: device_id.into(),
            secret,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Default config file location: `~/.byte/config.toml`
    pub fn default_path() -> PathBuf {
        expand_tilde(Path::new("~/.byte/config.toml"))
    }

    /// Parse a TOML config file. Does not validate; call [`ClientConfig::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let path = expand_tilde(path);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Load(format!("reading {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::Load(format!("parsing {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), device_id = %config.device_id, "loaded client config");
        Ok(config)
    }

    /// Build a config from the JSON provisioning payload printed (or shown
    /// as a QR code) by the server when a device is created.
    pub fn from_provisioning_json(json: &str) -> Result<Self, ConfigError> {
        let mut payload: ProvisioningPayload = serde_json::from_str(json)
            .map_err(|e| ConfigError::Load(format!("parsing provisioning payload: {e}")))?;
        let config = Self::new(
            std::mem::take(&mut payload.server_url),
            std::mem::take(&mut payload.device_id),
            SecretString::from(std::mem::take(&mut payload.secret)),
        );
        config.validate()?;
        Ok(config)
    }

    /// Validate every field, failing on the first violated rule.
    ///
    /// Order: device id, secret, server URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_client_identity(&self.device_id)
            .map_err(|_| ConfigError::InvalidDeviceId(self.device_id.clone()))?;

        // Decode only to check; the buffer is zeroized on drop.
        self.root_key()?;

        validate_server_url(&self.server_url)?;

        Ok(())
    }

    /// Decode the base64 secret into the 32-byte root key.
    pub fn root_key(&self) -> Result<Zeroizing<[u8; ROOT_KEY_SIZE]>, ConfigError> {
        decode_root_key(self.secret.expose_secret())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Decode a standard-alphabet base64 secret that must hold exactly 32 bytes.
pub fn decode_root_key(secret: &str) -> Result<Zeroizing<[u8; ROOT_KEY_SIZE]>, ConfigError> {
    let mut raw = STANDARD
        .decode(secret)
        .map_err(|_| ConfigError::InvalidSecret("must be valid base64".into()))?;

    if raw.len() != ROOT_KEY_SIZE {
        let len = raw.len();
        raw.zeroize();
        return Err(ConfigError::InvalidSecret(format!(
            "decodes to {len} bytes, expected {ROOT_KEY_SIZE}"
        )));
    }

    let mut key = Zeroizing::new([0u8; ROOT_KEY_SIZE]);
    key.copy_from_slice(&raw);
    raw.zeroize();
    Ok(key)
}

/// Server URL must be non-empty and parse as an absolute URI (scheme + authority).
pub fn validate_server_url(url: &str) -> Result<(), ConfigError> {
    if url.is_empty() {
        return Err(ConfigError::InvalidServerUrl(url.into()));
    }

    let uri: Uri = url
        .parse()
        .map_err(|_| ConfigError::InvalidServerUrl(url.into()))?;

    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(ConfigError::InvalidServerUrl(url.into()));
    }

    Ok(())
}

/// Device provisioning payload: `{"serverUrl": .., "deviceId": .., "secret": ..}`
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningPayload {
    pub server_url: String,
    pub device_id: String,
    pub secret: String,
}

impl std::fmt::Debug for ProvisioningPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningPayload")
            .field("server_url", &self.server_url)
            .field("device_id", &self.device_id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl Drop for ProvisioningPayload {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE_ID: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn secret_b64() -> String {
        STANDARD.encode([0x42u8; ROOT_KEY_SIZE])
    }

    fn valid_config() -> ClientConfig {
        ClientConfig::new(
            "http://localhost:8080",
            DEVICE_ID,
            SecretString::from(secret_b64()),
        )
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        config.validate().unwrap();
        assert_eq!(*config.root_key().unwrap(), [0x42u8; ROOT_KEY_SIZE]);
    }

    #[test]
    fn test_invalid_base64_secret() {
        let mut config = valid_config();
        config.secret = SecretString::from("not-base64!@#");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSecret(_))
        ));
    }

    #[test]
    fn test_wrong_length_secret() {
        let mut config = valid_config();
        config.secret = SecretString::from(STANDARD.encode([0x42u8; 16]));
        let err = config.validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidSecret("decodes to 16 bytes, expected 32".into())
        );
    }

    #[test]
    fn test_secret_never_in_error() {
        let mut config = valid_config();
        config.secret = SecretString::from("c2VjcmV0LXZhbHVl");
        let err = config.validate().unwrap_err();
        assert!(!err.to_string().contains("c2VjcmV0LXZhbHVl"));
    }

    #[test]
    fn test_empty_server_url() {
        let mut config = valid_config();
        config.server_url = String::new();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidServerUrl(String::new()))
        );
    }

    #[test]
    fn test_server_url_needs_scheme() {
        assert!(validate_server_url("localhost:8080").is_err());
        assert!(validate_server_url("not a url").is_err());
        assert!(validate_server_url("https://byte.example.com").is_ok());
        assert!(validate_server_url("http://[::1]:8080").is_ok());
    }

    #[test]
    fn test_invalid_device_id() {
        let mut config = valid_config();
        config.device_id = "not-a-uuid".into();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidDeviceId("not-a-uuid".into()))
        );
    }

    #[test]
    fn test_first_violation_wins() {
        let config = ClientConfig::new("", "not-a-uuid", SecretString::from("!!"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDeviceId(_))
        ));

        let config = ClientConfig::new("", DEVICE_ID, SecretString::from("!!"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSecret(_))
        ));
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = format!(
            r#"
server_url = "https://files.example.com"
device_id = "{DEVICE_ID}"
secret = "{}"
timeout_secs = 10
"#,
            secret_b64()
        );
        let config: ClientConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.server_url, "https://files.example.com");
        assert_eq!(config.device_id, DEVICE_ID);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();

        assert_eq!(config.server_url, "http://localhost:8080");
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.device_id.is_empty());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_id_alias() {
        let config: ClientConfig = toml::from_str(&format!("id = \"{DEVICE_ID}\"")).unwrap();
        assert_eq!(config.device_id, DEVICE_ID);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            format!("device_id = \"{DEVICE_ID}\"\nsecret = \"{}\"\n", secret_b64()),
        )
        .unwrap();

        let config = ClientConfig::load(&path).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_provisioning_payload() {
        let json = format!(
            r#"{{"serverUrl":"http://127.0.0.1:8080","deviceId":"{DEVICE_ID}","secret":"{}"}}"#,
            secret_b64()
        );
        let config = ClientConfig::from_provisioning_json(&json).unwrap();
        assert_eq!(config.server_url, "http://127.0.0.1:8080");
        assert_eq!(config.device_id, DEVICE_ID);
    }

    #[test]
    fn test_provisioning_payload_validated() {
        let json = r#"{"serverUrl":"http://127.0.0.1:8080","deviceId":"nope","secret":"AAAA"}"#;
        assert!(matches!(
            ClientConfig::from_provisioning_json(json),
            Err(ConfigError::InvalidDeviceId(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = valid_config();
        let debug = format!("{config:?}");
        assert!(!debug.contains(&secret_b64()));
    }
}
