//! Capabilities injected into token minting and key encryption.
//!
//! Production code uses [`SystemClock`] and [`OsRandom`]. Tests and the
//! interop CLI substitute [`FixedClock`] / [`FixedRandom`] so tokens and
//! sealed payloads can be compared byte for byte against other clients.

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};

/// Source of the current time for token claims.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Source of nonces. Production implementations must be a CSPRNG.
pub trait RandomSource: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Operating system CSPRNG (`getrandom`).
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error> {
        OsRng.try_fill_bytes(dest)
    }
}

/// Deterministic "randomness" for golden vectors: fills every request with
/// the configured bytes, repeating them if the request is longer.
///
/// Never use this outside tests and interop tooling.
#[derive(Debug, Clone)]
pub struct FixedRandom {
    bytes: Vec<u8>,
}

impl FixedRandom {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl RandomSource for FixedRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error> {
        if self.bytes.is_empty() {
            dest.fill(0);
            return Ok(());
        }
        for (d, s) in dest.iter_mut().zip(self.bytes.iter().cycle()) {
            *d = *s;
        }
        Ok(())
    }
}
