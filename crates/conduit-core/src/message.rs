//! Session message carried inside a [`Response`](crate::Response) envelope.

use serde::{Deserialize, Serialize};

/// Reserved message type for idle heartbeats.
pub const HEARTBEAT_TYPE: &str = "heartbeat";

/// Inner session message: `{type, data, callbackId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Correlation id linking a request to its reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
}

impl SessionMessage {
    /// Create a message with no correlation id.
    pub fn new(kind: impl Into<String>, data: Option<String>) -> Self {
        Self {
            kind: kind.into(),
            data,
            callback_id: None,
        }
    }

    /// The idle heartbeat, serialized as `{"type":"heartbeat"}`.
    pub fn heartbeat() -> Self {
        Self::new(HEARTBEAT_TYPE, None)
    }

    pub fn is_heartbeat(&self) -> bool {
        self.kind == HEARTBEAT_TYPE
    }

    /// Return the message tagged with a correlation id.
    pub fn with_callback_id(mut self, id: impl Into<String>) -> Self {
        self.callback_id = Some(id.into());
        self
    }
}
