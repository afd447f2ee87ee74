//! Client-side network access layer for Conduit.
//!
//! Two independent components share a [`SecurityProvider`]:
//!
//! - [`RequestDispatcher`]: a priority-ordered backlog of HTTP requests,
//!   executed one at a time with signing, encryption and linear-backoff
//!   retry.
//! - [`SessionManager`]: a single persistent WebSocket session with
//!   reconnection, idle heartbeat and reply correlation.
//!
//! [`NetworkClient`] wires both from a [`ClientConfig`].
//!
//! [`SecurityProvider`]: conduit_core::SecurityProvider
//! [`ClientConfig`]: conduit_core::ClientConfig

mod client;
mod dispatcher;
mod handle;
mod session;
mod transport;

pub use client::{NetworkClient, NetworkClientBuilder};
pub use dispatcher::{
    CLIENT_VERSION_HEADER, NONCE_PARAM, PLATFORM_HEADER, Priority, RequestDispatcher, SIGN_PARAM,
    TIMESTAMP_PARAM,
};
pub use handle::ResponseHandle;
pub use session::{Inbound, SessionError, SessionManager};
pub use transport::{
    ENCRYPTED_CONTENT_TYPE, HttpReply, HttpRequest, HttpTransport, Method, ReqwestTransport,
    TransportError,
};

pub use conduit_core;
