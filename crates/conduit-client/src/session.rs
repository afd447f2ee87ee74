//! Persistent duplex session.
//!
//! One WebSocket connection, driven through `Disconnected -> Connecting ->
//! Connected`. Any error or close event drops back to `Disconnected` and
//! starts a reconnect loop that retries at a fixed interval until the
//! session is open again. At most one reconnect loop runs at a time.
//!
//! Every frame is an encrypted [`Response`] envelope whose payload is a
//! [`SessionMessage`]. Requests sent with [`SessionManager::send_with_reply`]
//! carry a correlation id; the inbound reply with the same id resolves the
//! caller's handle.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use conduit_core::{
    ClientConfig, ConnectionState, CredentialSource, ErrorKind, Response, SecurityProvider,
    SessionMessage,
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::handle::{Responder, ResponseHandle, response_channel};

const INBOUND_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session is not connected")]
    NotConnected,
    #[error("failed to encode session message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to encrypt session message")]
    Encrypt,
    #[error("failed to transmit session message: {0}")]
    Transmit(String),
}

/// Unsolicited inbound traffic: decoded frames that carry no correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub envelope: Response,
    pub message: Option<SessionMessage>,
}

struct Link {
    state: ConnectionState,
    /// Bumped on every connect attempt; events from older connections are ignored.
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<String>>,
    last_activity: Instant,
}

struct PendingReply {
    responder: Responder,
    registered: Instant,
}

struct Inner {
    url: String,
    heartbeat_interval: Duration,
    connect_timeout: Duration,
    reconnect_interval: Duration,
    reply_ttl: Duration,
    security: Arc<dyn SecurityProvider>,
    credentials: Arc<dyn CredentialSource>,
    link: Mutex<Link>,
    pending: Mutex<HashMap<String, PendingReply>>,
    reconnect: Mutex<Option<JoinHandle<()>>>,
    reconnect_loops: AtomicU64,
    inbound: broadcast::Sender<Inbound>,
}

/// Owner of the persistent session. Cheap to clone; clones share the
/// connection.
///
/// Methods that may start tasks (`connect`, the `on_*` events, `tick`) must
/// be called inside a Tokio runtime.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        config: &ClientConfig,
        security: Arc<dyn SecurityProvider>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        let (inbound, _) = broadcast::channel(INBOUND_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                url: config.session_url.clone(),
                heartbeat_interval: config.heartbeat_interval(),
                connect_timeout: config.connect_timeout(),
                reconnect_interval: config.reconnect_interval(),
                reply_ttl: config.pending_reply_ttl(),
                security,
                credentials,
                link: Mutex::new(Link {
                    state: ConnectionState::Disconnected,
                    generation: 0,
                    outbound: None,
                    last_activity: Instant::now(),
                }),
                pending: Mutex::new(HashMap::new()),
                reconnect: Mutex::new(None),
                reconnect_loops: AtomicU64::new(0),
                inbound,
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.link.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_replies(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Whether a reconnect loop is currently scheduled.
    pub fn is_reconnecting(&self) -> bool {
        self.inner
            .reconnect
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Receive unsolicited messages (those without a correlation id).
    pub fn subscribe(&self) -> broadcast::Receiver<Inbound> {
        self.inner.inbound.subscribe()
    }

    /// Start a connect attempt. No-op unless `Disconnected`.
    pub fn connect(&self) {
        let generation = {
            let mut link = self.inner.link.lock();
            if link.state != ConnectionState::Disconnected {
                trace!(state = %link.state, "connect ignored");
                return;
            }
            link.state = ConnectionState::Connecting;
            link.generation += 1;
            link.generation
        };

        info!(url = %self.inner.url, generation, "connecting session");
        let manager = self.clone();
        drop(tokio::spawn(async move {
            manager.run_connection(generation).await;
        }));
    }

    /// The connection was acknowledged.
    pub fn on_open(&self) {
        {
            let mut link = self.inner.link.lock();
            link.state = ConnectionState::Connected;
            link.last_activity = Instant::now();
        }
        if let Some(handle) = self.inner.reconnect.lock().take() {
            handle.abort();
        }
        info!(url = %self.inner.url, "session connected");
    }

    /// Handle one raw inbound frame. Frames that cannot be decrypted or
    /// parsed are logged and dropped.
    pub fn on_message(&self, raw: &str) {
        self.inner.link.lock().last_activity = Instant::now();

        let Some(plaintext) = self.inner.security.try_decrypt(raw) else {
            warn!(len = raw.len(), "dropping undecryptable session frame");
            return;
        };
        let envelope: Response = match serde_json::from_str(&plaintext) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping malformed session envelope");
                return;
            }
        };
        let message = match envelope.payload() {
            Some(payload) => match serde_json::from_str::<SessionMessage>(payload) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(error = %e, "dropping envelope with malformed session message");
                    return;
                }
            },
            None => None,
        };
        // Correlation reads the raw payload; failure replies still reach their caller.
        let envelope = envelope.normalized();

        if let Some(id) = message.as_ref().and_then(|m| m.callback_id.as_deref()) {
            let pending = self.inner.pending.lock().remove(id);
            match pending {
                Some(reply) => {
                    debug!(callback_id = id, "resolving session reply");
                    reply.responder.resolve(envelope);
                }
                None => debug!(callback_id = id, "no pending request for reply, dropping"),
            }
            return;
        }

        if message.as_ref().is_some_and(SessionMessage::is_heartbeat) {
            trace!("heartbeat received");
            return;
        }
        // No subscribers is fine.
        let _ = self.inner.inbound.send(Inbound { envelope, message });
    }

    pub fn on_error(&self, reason: &str) {
        warn!(reason, "session error");
        self.disconnected();
    }

    pub fn on_close(&self) {
        info!("session closed");
        self.disconnected();
    }

    /// Per-cycle housekeeping: expire unanswered requests and send a
    /// heartbeat once the session has been idle for the heartbeat interval.
    pub fn tick(&self) {
        self.evict_expired_replies();

        let due = {
            let mut link = self.inner.link.lock();
            let idle = link.last_activity.elapsed() > self.inner.heartbeat_interval;
            if link.state == ConnectionState::Connected && idle {
                link.last_activity = Instant::now();
                true
            } else {
                false
            }
        };
        if due {
            debug!("session idle, sending heartbeat");
            if let Err(e) = self.transmit(&SessionMessage::heartbeat()) {
                warn!(error = %e, "failed to send heartbeat");
            }
        }
    }

    /// Send a message without expecting a reply. Never queues.
    pub fn send(&self, message: &SessionMessage) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        self.transmit(message)
    }

    /// Send a message tagged with a fresh correlation id and wait for the
    /// matching reply.
    ///
    /// When the session is down, or the frame cannot be transmitted, the
    /// returned handle is already resolved with a failure.
    pub fn send_with_reply(&self, message: SessionMessage) -> ResponseHandle {
        if !self.is_connected() {
            return ResponseHandle::resolved(Response::failure(
                ErrorKind::NoInternet,
                "session is not connected",
                0,
            ));
        }

        let id = Uuid::now_v7().to_string();
        let (responder, handle) = response_channel();
        let _ = self.inner.pending.lock().insert(
            id.clone(),
            PendingReply {
                responder,
                registered: Instant::now(),
            },
        );

        if let Err(e) = self.transmit(&message.with_callback_id(id.clone())) {
            warn!(callback_id = %id, error = %e, "session send failed");
            if let Some(reply) = self.inner.pending.lock().remove(&id) {
                reply
                    .responder
                    .resolve(Response::failure(ErrorKind::ServerError, e.to_string(), 0));
            }
        }
        handle
    }

    fn transmit(&self, message: &SessionMessage) -> Result<(), SessionError> {
        let json = serde_json::to_string(message)?;
        let sealed = self.inner.security.encrypt(&json);
        if sealed.is_empty() {
            return Err(SessionError::Encrypt);
        }

        let link = self.inner.link.lock();
        let outbound = link.outbound.as_ref().ok_or(SessionError::NotConnected)?;
        outbound
            .send(sealed)
            .map_err(|_| SessionError::Transmit("session writer has shut down".into()))
    }

    fn evict_expired_replies(&self) {
        let ttl = self.inner.reply_ttl;
        let expired: Vec<(String, PendingReply)> = {
            let mut pending = self.inner.pending.lock();
            let ids: Vec<String> = pending
                .iter()
                .filter(|(_, reply)| reply.registered.elapsed() >= ttl)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| pending.remove_entry(&id))
                .collect()
        };

        for (id, reply) in expired {
            warn!(callback_id = %id, "session reply not received in time");
            reply.responder.resolve(Response::failure(
                ErrorKind::Timeout,
                format!("no reply within {ttl:?}"),
                0,
            ));
        }
    }

    fn disconnected(&self) {
        {
            let mut link = self.inner.link.lock();
            link.state = ConnectionState::Disconnected;
            link.outbound = None;
        }
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&self) {
        let mut slot = self.inner.reconnect.lock();
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            trace!("reconnect already scheduled");
            return;
        }
        let n = self.inner.reconnect_loops.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            loop_id = n,
            interval_ms = self.inner.reconnect_interval.as_millis() as u64,
            "scheduling reconnect"
        );
        let manager = self.clone();
        *slot = Some(tokio::spawn(async move { manager.reconnect_loop().await }));
    }

    async fn reconnect_loop(&self) {
        loop {
            tokio::time::sleep(self.inner.reconnect_interval).await;
            if self.is_connected() {
                break;
            }
            debug!("attempting reconnect");
            self.connect();
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.link.lock().generation == generation
    }

    fn handshake_request(&self) -> Result<Request, tungstenite::Error> {
        let mut request = self.inner.url.as_str().into_client_request()?;
        let token = self.inner.credentials.token();
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => {
                let _ = request.headers_mut().insert(AUTHORIZATION, value);
            }
            Err(_) => warn!("credential token is not a valid header value, connecting without it"),
        }
        Ok(request)
    }

    /// Perform the WebSocket handshake within the connect timeout.
    async fn open_socket(&self) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>, String> {
        let request = self.handshake_request().map_err(|e| {
            log_connect_failure(&e);
            e.to_string()
        })?;
        let limit = self.inner.connect_timeout;
        match tokio::time::timeout(limit, connect_async(request)).await {
            Ok(Ok((ws, _))) => Ok(ws),
            Ok(Err(e)) => {
                log_connect_failure(&e);
                Err(e.to_string())
            }
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, "session handshake timed out");
                Err(format!("handshake timed out after {limit:?}"))
            }
        }
    }

    async fn run_connection(&self, generation: u64) {
        let ws = match self.open_socket().await {
            Ok(ws) => ws,
            Err(reason) => {
                if self.is_current(generation) {
                    self.on_error(&reason);
                }
                return;
            }
        };

        let (mut sink, mut stream) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        {
            let mut link = self.inner.link.lock();
            if link.generation != generation {
                debug!(generation, "connection superseded before open");
                return;
            }
            link.outbound = Some(tx);
        }
        self.on_open();

        let writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = sink.send(Message::Text(frame.into())).await {
                    debug!(error = %e, "session writer stopped");
                    return;
                }
            }
            let _ = sink.close().await;
        });

        let failure = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => self.on_message(text.as_str()),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "server closed session");
                    break None;
                }
                // Ping/pong is answered by tungstenite; binary frames are not part of the protocol.
                Some(Ok(_)) => {}
                Some(Err(e)) => break Some(e.to_string()),
                None => break None,
            }
        };
        writer.abort();

        if !self.is_current(generation) {
            return;
        }
        match failure {
            Some(reason) => self.on_error(&reason),
            None => self.on_close(),
        }
    }
}

fn log_connect_failure(err: &tungstenite::Error) {
    if let tungstenite::Error::Http(response) = err {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(
                kind = %ErrorKind::AuthenticationError,
                status = status.as_u16(),
                "session handshake rejected"
            );
            return;
        }
    }
    warn!(error = %err, "session connect failed");
}
