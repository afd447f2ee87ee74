//! Core types and contracts for Conduit.
//!
//! This crate holds everything the request dispatcher and the session
//! manager share without touching the network: the [`Response`] value
//! every outcome is reported as, the session wire types, the
//! [`SecurityProvider`] contract, ordered request [`Params`], host
//! collaborator traits, and [`ClientConfig`].

mod config;
mod host;
mod message;
mod params;
mod response;
mod security;

pub use config::{ClientConfig, ConfigError};
pub use host::{Clock, CredentialSource, DEFAULT_TOKEN, StaticCredentials, SystemClock};
pub use message::{HEARTBEAT_TYPE, SessionMessage};
pub use params::Params;
pub use response::{ErrorKind, Response};
pub use security::{SecurityProvider, SharedSecretCipher};

/// Persistent session lifecycle state.
///
/// `Disconnected -> Connecting -> Connected`, and back to `Disconnected`
/// on any error or close event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection and no attempt in progress.
    #[default]
    Disconnected,
    /// A connect attempt has been issued and not yet acknowledged.
    Connecting,
    /// The session is open.
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}
