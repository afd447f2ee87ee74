//! Host collaborators: where credentials and wall-clock time come from.

use std::time::{SystemTime, UNIX_EPOCH};

/// Token used when the host has no stored credential.
pub const DEFAULT_TOKEN: &str = "guest";

/// Supplies the auth token attached at the session handshake.
pub trait CredentialSource: Send + Sync {
    fn token(&self) -> String;
}

/// A fixed token, falling back to [`DEFAULT_TOKEN`].
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.is_empty() {
            return Self::default();
        }
        Self { token }
    }
}

impl Default for StaticCredentials {
    fn default() -> Self {
        Self {
            token: DEFAULT_TOKEN.to_string(),
        }
    }
}

impl CredentialSource for StaticCredentials {
    fn token(&self) -> String {
        self.token.clone()
    }
}

/// Wall-clock source for request timestamps.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn unix_seconds(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}
