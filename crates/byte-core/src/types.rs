use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdentityError;

/// Size of a client root secret in bytes (256-bit)
pub const ROOT_KEY_SIZE: usize = 32;

/// Client ids are random UUIDs.
pub const CLIENT_ID_UUID_VERSION: usize = 4;

/// Check that `id` is a canonical hyphenated UUID whose version nibble is 4.
///
/// Braced, URN and simple (unhyphenated) forms are rejected even though they
/// name a valid UUID: the id is sent verbatim as a header and bound into
/// tokens, so only one textual form may exist per device.
pub fn validate_client_identity(id: &str) -> Result<(), IdentityError> {
    let uuid = Uuid::try_parse(id).map_err(|_| IdentityError::InvalidIdentity)?;

    if !uuid.hyphenated().to_string().eq_ignore_ascii_case(id) {
        return Err(IdentityError::InvalidIdentity);
    }

    if uuid.get_version_num() != CLIENT_ID_UUID_VERSION {
        return Err(IdentityError::InvalidIdentity);
    }

    Ok(())
}

/// A validated device identity. Immutable once constructed.
///
/// The input spelling is kept (including letter case) because both the
/// `Device-ID` header and the token's implicit assertion use these exact bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(String);

impl ClientId {
    pub fn parse(id: &str) -> Result<Self, IdentityError> {
        validate_client_identity(id)?;
        Ok(Self(id.to_owned()))
    }

    /// Generate a fresh random (v4) client id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClientId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ClientId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_client_identity(&value)?;
        Ok(Self(value))
    }
}

impl From<ClientId> for String {
    fn from(id: ClientId) -> Self {
        id.0
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
