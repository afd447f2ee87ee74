//! Composition root tying the dispatcher and the session together.

use std::sync::Arc;

use conduit_core::{
    ClientConfig, Clock, ConnectionState, CredentialSource, Params, SecurityProvider,
    SessionMessage, SharedSecretCipher, StaticCredentials, SystemClock,
};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::dispatcher::{Priority, RequestDispatcher};
use crate::handle::ResponseHandle;
use crate::session::{SessionError, SessionManager};
use crate::transport::{HttpTransport, ReqwestTransport};

/// The host application's network access layer.
///
/// Owns one [`RequestDispatcher`] and one [`SessionManager`]. The two share
/// the security provider but no state. Construct it once at startup and
/// pass it (or clones of its parts) to whoever needs it.
pub struct NetworkClient {
    config: ClientConfig,
    dispatcher: RequestDispatcher,
    session: SessionManager,
}

impl NetworkClient {
    /// A client with the default collaborators: [`SharedSecretCipher`] keyed
    /// by `config.secret`, [`StaticCredentials`], [`SystemClock`] and
    /// [`ReqwestTransport`].
    pub fn new(config: ClientConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> NetworkClientBuilder {
        NetworkClientBuilder {
            config,
            security: None,
            credentials: None,
            clock: None,
            transport: None,
        }
    }

    /// Open the session. Must be called inside a Tokio runtime.
    pub fn start(&self) {
        self.session.connect();
    }

    /// One host cycle: admit the next request and run session housekeeping.
    ///
    /// Requests are only admitted when called inside a Tokio runtime.
    pub fn tick(&self) {
        let _ = self.dispatcher.tick();
        self.session.tick();
    }

    /// Drive [`tick`](Self::tick) from a background task at the configured
    /// cadence, for hosts without their own loop.
    pub fn spawn_ticker(&self) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        let session = self.session.clone();
        let interval = self.config.tick_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                let _ = ticker.tick().await;
                let _ = dispatcher.tick();
                session.tick();
            }
        })
    }

    pub fn submit(
        &self,
        endpoint: impl Into<String>,
        params: Params,
        body: Option<String>,
        priority: Priority,
    ) -> ResponseHandle {
        self.dispatcher.submit(endpoint, params, body, priority)
    }

    pub fn send(&self, message: &SessionMessage) -> Result<(), SessionError> {
        self.session.send(message)
    }

    pub fn send_with_reply(&self, message: SessionMessage) -> ResponseHandle {
        self.session.send_with_reply(message)
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }
}

/// Overrides for the collaborators of a [`NetworkClient`].
pub struct NetworkClientBuilder {
    config: ClientConfig,
    security: Option<Arc<dyn SecurityProvider>>,
    credentials: Option<Arc<dyn CredentialSource>>,
    clock: Option<Arc<dyn Clock>>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl NetworkClientBuilder {
    pub fn security(mut self, security: Arc<dyn SecurityProvider>) -> Self {
        self.security = Some(security);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> NetworkClient {
        let security: Arc<dyn SecurityProvider> = match self.security {
            Some(security) => security,
            None => Arc::new(SharedSecretCipher::new(self.config.secret.clone())),
        };
        let credentials: Arc<dyn CredentialSource> = match self.credentials {
            Some(credentials) => credentials,
            None => Arc::new(StaticCredentials::default()),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::default()),
        };

        let dispatcher =
            RequestDispatcher::new(&self.config, transport, Arc::clone(&security), clock);
        let session = SessionManager::new(&self.config, security, credentials);

        NetworkClient {
            config: self.config,
            dispatcher,
            session,
        }
    }
}
