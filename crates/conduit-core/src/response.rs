//! Request and reply outcomes.
//!
//! A [`Response`] doubles as the outer session envelope, so its serde
//! shape is the wire shape: `{success, data, errorType, errorMessage,
//! responseCode}`.

use serde::{Deserialize, Serialize};

/// Failure taxonomy shared by the dispatcher and the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorKind {
    #[default]
    None,
    Timeout,
    /// No route to the server; the connection was never established.
    NoInternet,
    /// The server answered with a failure (non-2xx or protocol error).
    ServerError,
    /// Local encode/decode failure, including empty decryption output.
    DataParsingError,
    /// Only produced around the session handshake.
    AuthenticationError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Timeout => "timeout",
            Self::NoInternet => "no internet",
            Self::ServerError => "server error",
            Self::DataParsingError => "data parsing error",
            Self::AuthenticationError => "authentication error",
        };
        f.write_str(name)
    }
}

/// Outcome of one request or one inbound session message.
///
/// Build values through [`Response::ok`] and [`Response::failure`] so that
/// `success` always agrees with `error_kind` and the presence of `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, rename = "errorType")]
    pub error_kind: ErrorKind,
    #[serde(default)]
    pub error_message: String,
    /// HTTP status, or 0 when the server was never reached.
    #[serde(default, rename = "responseCode")]
    pub status_code: u16,
}

impl Response {
    /// A successful outcome carrying `data`.
    pub fn ok(data: impl Into<String>, status_code: u16) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            error_kind: ErrorKind::None,
            error_message: String::new(),
            status_code,
        }
    }

    /// A failed outcome. `kind` must not be [`ErrorKind::None`]; it is
    /// coerced to [`ErrorKind::ServerError`] if it is.
    pub fn failure(kind: ErrorKind, message: impl Into<String>, status_code: u16) -> Self {
        let error_kind = if kind == ErrorKind::None {
            ErrorKind::ServerError
        } else {
            kind
        };
        Self {
            success: false,
            data: None,
            error_kind,
            error_message: message.into(),
            status_code,
        }
    }

    /// The payload, if this is a success with a non-empty body.
    pub fn payload(&self) -> Option<&str> {
        self.data.as_deref().filter(|d| !d.is_empty())
    }

    /// Restore the success/failure invariant on a value received from the
    /// wire. A success always carries data (possibly empty) and
    /// [`ErrorKind::None`]; a failure carries no data and a real error kind.
    pub fn normalized(self) -> Self {
        if self.success {
            Self {
                success: true,
                data: Some(self.data.unwrap_or_default()),
                error_kind: ErrorKind::None,
                error_message: String::new(),
                status_code: self.status_code,
            }
        } else {
            Self::failure(self.error_kind, self.error_message, self.status_code)
        }
    }

    pub fn is_retryable_status(&self) -> bool {
        self.status_code == 0 || self.status_code >= 500
    }
}
