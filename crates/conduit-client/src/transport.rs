//! HTTP transport seam used by the dispatcher.
//!
//! The dispatcher only needs "send this request, give me status and body";
//! [`ReqwestTransport`] is the production implementation and tests plug in
//! scripted ones.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

/// Content type of encrypted request bodies.
pub const ENCRYPTED_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A fully built outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    /// Already encrypted.
    pub body: Option<String>,
    pub timeout: Duration,
}

/// Status and raw (still encrypted) body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Why an exchange produced no reply.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The server was never reached.
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out")]
    Timeout,
    /// Headers arrived but the body could not be read.
    #[error("failed to read response body (status {status}): {message}")]
    Body { status: u16, message: String },
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpReply, TransportError>;
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpReply, TransportError> {
        let mut builder = match (request.method, request.body) {
            (Method::Post, Some(body)) => self
                .client
                .post(&request.url)
                .header(CONTENT_TYPE, ENCRYPTED_CONTENT_TYPE)
                .body(body),
            (Method::Post, None) => self.client.post(&request.url),
            (Method::Get, _) => self.client.get(&request.url),
        };
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .timeout(request.timeout)
            .send()
            .await
            .map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Body {
                    status,
                    message: e.to_string(),
                }
            }
        })?;
        Ok(HttpReply { status, body })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
