//! Client configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid config:
//!
//! ```toml
//! base_url = "https://api.example.com"
//! session_url = "wss://api.example.com/session"
//! secret = "shared-secret"
//! max_retries = 3
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefix for every dispatcher endpoint.
    pub base_url: String,
    /// Persistent session endpoint (`ws://` or `wss://`).
    pub session_url: String,
    /// Shared secret for signing and the default cipher.
    pub secret: String,
    pub client_version: String,
    pub platform: String,
    pub request_timeout_ms: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Linear backoff unit: retry `n` waits `unit * (n + 1)`.
    pub retry_delay_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// Limit on the session handshake; a stalled upgrade counts as a failed connect.
    pub connect_timeout_ms: u64,
    pub reconnect_interval_ms: u64,
    /// Age after which an unanswered session request is resolved as a timeout.
    pub pending_reply_ttl_ms: u64,
    pub tick_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            session_url: "ws://127.0.0.1:8080/session".to_string(),
            secret: "conduit-shared-secret".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: std::env::consts::OS.to_string(),
            request_timeout_ms: 10_000,
            max_retries: 3,
            retry_delay_ms: 1_000,
            heartbeat_interval_ms: 30_000,
            connect_timeout_ms: 10_000,
            reconnect_interval_ms: 5_000,
            pending_reply_ttl_ms: 60_000,
            tick_interval_ms: 50,
        }
    }
}

impl ClientConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "loaded client config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(invalid("base_url", "must not be empty"));
        }
        if !self.session_url.starts_with("ws://") && !self.session_url.starts_with("wss://") {
            return Err(invalid(
                "session_url",
                format!("expected a ws:// or wss:// url, got {:?}", self.session_url),
            ));
        }
        if self.secret.is_empty() {
            return Err(invalid("secret", "must not be empty"));
        }
        let durations = [
            ("request_timeout_ms", self.request_timeout_ms),
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("reconnect_interval_ms", self.reconnect_interval_ms),
            ("pending_reply_ttl_ms", self.pending_reply_ttl_ms),
            ("tick_interval_ms", self.tick_interval_ms),
        ];
        for (field, value) in durations {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn pending_reply_ttl(&self) -> Duration {
        Duration::from_millis(self.pending_reply_ttl_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
