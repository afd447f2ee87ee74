//! Serialized, priority-ordered request pipeline.
//!
//! Jobs wait in a backlog until [`RequestDispatcher::tick`] admits the head
//! job. Exactly one job is in flight at a time; it runs all of its retries
//! to completion before the next tick can admit another.
//!
//! The backlog has two ordering classes. `High` jobs are pushed to the
//! front, so a later `High` submission overtakes an earlier one still
//! waiting. `Normal` and `Low` are both appended at the back and stay FIFO
//! relative to each other.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use conduit_core::{ClientConfig, Clock, ErrorKind, Params, Response, SecurityProvider};
use parking_lot::Mutex;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::handle::{Responder, ResponseHandle, response_channel};
use crate::transport::{HttpReply, HttpRequest, HttpTransport, Method, TransportError};

/// RFC 3986 unreserved characters stay literal in query values.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const NONCE_LEN: usize = 16;

pub const TIMESTAMP_PARAM: &str = "timestamp";
pub const NONCE_PARAM: &str = "nonce";
pub const SIGN_PARAM: &str = "sign";
pub const CLIENT_VERSION_HEADER: &str = "X-Client-Version";
pub const PLATFORM_HEADER: &str = "X-Platform";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// One queued outbound call. Owned by the dispatcher until it resolves.
struct RequestJob {
    endpoint: String,
    params: Params,
    body: Option<String>,
    attempt: u32,
    responder: Responder,
}

struct DispatchSettings {
    base_url: String,
    client_version: String,
    platform: String,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

struct Inner {
    backlog: Mutex<VecDeque<RequestJob>>,
    in_flight: AtomicBool,
    transport: Arc<dyn HttpTransport>,
    security: Arc<dyn SecurityProvider>,
    clock: Arc<dyn Clock>,
    settings: DispatchSettings,
}

/// Handle to the request pipeline. Cheap to clone; clones share the backlog.
#[derive(Clone)]
pub struct RequestDispatcher {
    inner: Arc<Inner>,
}

impl RequestDispatcher {
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn HttpTransport>,
        security: Arc<dyn SecurityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let settings = DispatchSettings {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_version: config.client_version.clone(),
            platform: config.platform.clone(),
            timeout: config.request_timeout(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        };
        Self {
            inner: Arc::new(Inner {
                backlog: Mutex::new(VecDeque::new()),
                in_flight: AtomicBool::new(false),
                transport,
                security,
                clock,
                settings,
            }),
        }
    }

    /// Queue a request. A `body` turns the request into an encrypted POST.
    ///
    /// May be called from any thread, concurrently with [`tick`](Self::tick).
    pub fn submit(
        &self,
        endpoint: impl Into<String>,
        params: Params,
        body: Option<String>,
        priority: Priority,
    ) -> ResponseHandle {
        let (responder, handle) = response_channel();
        let job = RequestJob {
            endpoint: endpoint.into(),
            params,
            body,
            attempt: 0,
            responder,
        };
        let endpoint = job.endpoint.clone();

        let mut backlog = self.inner.backlog.lock();
        if priority == Priority::High {
            backlog.push_front(job);
        } else {
            backlog.push_back(job);
        }
        debug!(%endpoint, ?priority, queued = backlog.len(), "request queued");
        handle
    }

    /// Admit the head job if nothing is in flight. Returns whether a job was
    /// started. Never blocks.
    ///
    /// Jobs run on the current Tokio runtime. Outside a runtime nothing is
    /// admitted and the backlog is left untouched.
    pub fn tick(&self) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            warn!(queued = self.backlog_len(), "tick outside a tokio runtime, nothing admitted");
            return false;
        };
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let Some(job) = self.inner.backlog.lock().pop_front() else {
            self.inner.in_flight.store(false, Ordering::Release);
            return false;
        };

        let inner = Arc::clone(&self.inner);
        drop(runtime.spawn(inner.run(job)));
        true
    }

    /// Tick on a fixed cadence from a background task.
    pub fn spawn_ticker(&self, interval: Duration) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                let _ = ticker.tick().await;
                let _ = dispatcher.tick();
            }
        })
    }

    pub fn backlog_len(&self) -> usize {
        self.inner.backlog.lock().len()
    }

    pub fn is_in_flight(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }
}

/// Clears the in-flight marker when the running job is done, including
/// when its task unwinds.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Inner {
    async fn run(self: Arc<Self>, mut job: RequestJob) {
        let _in_flight = InFlight(&self.in_flight);
        let response = self.execute(&mut job).await;
        job.responder.resolve(response);
    }

    async fn execute(&self, job: &mut RequestJob) -> Response {
        let body = match job.body.as_deref() {
            Some(plain) => {
                let sealed = self.security.encrypt(plain);
                if sealed.is_empty() && !plain.is_empty() {
                    warn!(endpoint = %job.endpoint, "failed to encrypt request body");
                    return Response::failure(
                        ErrorKind::DataParsingError,
                        "failed to encrypt request body",
                        0,
                    );
                }
                Some(sealed)
            }
            None => None,
        };

        loop {
            let response = self.attempt(job, body.clone()).await;
            if response.success {
                debug!(endpoint = %job.endpoint, attempt = job.attempt, "request succeeded");
                return response;
            }

            if job.attempt >= self.settings.max_retries || !response.is_retryable_status() {
                warn!(
                    endpoint = %job.endpoint,
                    attempt = job.attempt,
                    status = response.status_code,
                    kind = %response.error_kind,
                    "request failed: {}",
                    response.error_message
                );
                return response;
            }

            let delay = self.settings.retry_delay * (job.attempt + 1);
            info!(
                endpoint = %job.endpoint,
                attempt = job.attempt + 1,
                delay_ms = delay.as_millis() as u64,
                status = response.status_code,
                "retrying request"
            );
            tokio::time::sleep(delay).await;
            job.attempt += 1;
        }
    }

    async fn attempt(&self, job: &mut RequestJob, body: Option<String>) -> Response {
        self.sign(&mut job.params);

        let request = HttpRequest {
            method: if body.is_some() {
                Method::Post
            } else {
                Method::Get
            },
            url: self.url_for(&job.endpoint, &job.params),
            headers: vec![
                (CLIENT_VERSION_HEADER, self.settings.client_version.clone()),
                (PLATFORM_HEADER, self.settings.platform.clone()),
            ],
            body,
            timeout: self.settings.timeout,
        };

        match self.transport.execute(request).await {
            Ok(reply) => self.interpret(reply),
            Err(err) => self.classify(err),
        }
    }

    /// Refresh `timestamp` and `nonce`, then sign everything else.
    fn sign(&self, params: &mut Params) {
        let _ = params.insert(TIMESTAMP_PARAM, self.clock.unix_seconds().to_string());
        let _ = params.insert(NONCE_PARAM, nonce());
        let _ = params.remove(SIGN_PARAM);
        let sign = self.security.generate_sign(params);
        let _ = params.insert(SIGN_PARAM, sign);
    }

    fn url_for(&self, endpoint: &str, params: &Params) -> String {
        let mut url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!(
                "{}/{}",
                self.settings.base_url,
                endpoint.trim_start_matches('/')
            )
        };

        let mut separator = if url.contains('?') { '&' } else { '?' };
        for (key, value) in params.iter() {
            url.push(separator);
            url.push_str(key);
            url.push('=');
            url.extend(utf8_percent_encode(value, QUERY_VALUE));
            separator = '&';
        }
        url
    }

    fn interpret(&self, reply: HttpReply) -> Response {
        if !(200..300).contains(&reply.status) {
            return Response::failure(
                ErrorKind::ServerError,
                format!("server returned status {}", reply.status),
                reply.status,
            );
        }
        match self.security.try_decrypt(&reply.body) {
            Some(payload) => Response::ok(payload, reply.status),
            None => Response::failure(
                ErrorKind::DataParsingError,
                "failed to decrypt response body",
                reply.status,
            ),
        }
    }

    fn classify(&self, err: TransportError) -> Response {
        let message = err.to_string();
        match err {
            TransportError::Connect(_) => Response::failure(ErrorKind::NoInternet, message, 0),
            TransportError::Timeout => Response::failure(
                ErrorKind::Timeout,
                format!("request timed out after {:?}", self.settings.timeout),
                0,
            ),
            TransportError::Body { status, .. } => {
                Response::failure(ErrorKind::DataParsingError, message, status)
            }
            TransportError::Other(_) => Response::failure(ErrorKind::DataParsingError, message, 0),
        }
    }
}

fn nonce() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conduit_core::SharedSecretCipher;
    use percent_encoding::percent_decode_str;
    use tokio::sync::Notify;
    use tokio::time::Instant;

    const SECRET: &str = "dispatch-secret";

    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn unix_seconds(&self) -> u64 {
            self.0
        }
    }

    type Script = Box<dyn Fn(&HttpRequest) -> Result<HttpReply, TransportError> + Send + Sync>;

    /// Answers every request through `script` and records what was sent.
    struct ScriptedTransport {
        script: Script,
        gate: Option<Arc<Notify>>,
        log: Mutex<Vec<(Instant, HttpRequest)>>,
    }

    impl ScriptedTransport {
        fn new<F>(script: F) -> Arc<Self>
        where
            F: Fn(&HttpRequest) -> Result<HttpReply, TransportError> + Send + Sync + 'static,
        {
            Arc::new(Self {
                script: Box::new(script),
                gate: None,
                log: Mutex::new(Vec::new()),
            })
        }

        fn gated(gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                script: Box::new(|_| Ok(sealed_reply(200, "ok"))),
                gate: Some(gate),
                log: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.log.lock().iter().map(|(_, r)| r.clone()).collect()
        }

        fn paths(&self) -> Vec<String> {
            self.requests()
                .iter()
                .map(|r| {
                    let path = r.url.split('?').next().unwrap_or_default();
                    path.rsplit('/').next().unwrap_or_default().to_string()
                })
                .collect()
        }

        fn instants(&self) -> Vec<Instant> {
            self.log.lock().iter().map(|(at, _)| *at).collect()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpReply, TransportError> {
            self.log.lock().push((Instant::now(), request.clone()));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            (self.script)(&request)
        }
    }

    fn sealed_reply(status: u16, plain: &str) -> HttpReply {
        HttpReply {
            status,
            body: SharedSecretCipher::new(SECRET).encrypt(plain),
        }
    }

    fn config() -> ClientConfig {
        ClientConfig {
            base_url: "http://api.test/".into(),
            secret: SECRET.into(),
            client_version: "1.2.3".into(),
            platform: "test".into(),
            max_retries: 3,
            retry_delay_ms: 1_000,
            ..ClientConfig::default()
        }
    }

    fn dispatcher(transport: Arc<dyn HttpTransport>) -> RequestDispatcher {
        RequestDispatcher::new(
            &config(),
            transport,
            Arc::new(SharedSecretCipher::new(SECRET)),
            Arc::new(FixedClock(1_700_000_000)),
        )
    }

    async fn drain(dispatcher: &RequestDispatcher) {
        while dispatcher.backlog_len() > 0 || dispatcher.is_in_flight() {
            let _ = dispatcher.tick();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn query(url: &str) -> Params {
        url.split_once('?')
            .map(|(_, q)| q)
            .unwrap_or_default()
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| {
                let value = percent_decode_str(v).decode_utf8_lossy().into_owned();
                (k.to_string(), value)
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn high_priority_jumps_the_queue() {
        let transport = ScriptedTransport::new(|_| Ok(sealed_reply(200, "ok")));
        let d = dispatcher(transport.clone());

        let a = d.submit("a", Params::new(), None, Priority::Normal);
        let b = d.submit("b", Params::new(), None, Priority::High);
        let c = d.submit("c", Params::new(), None, Priority::Low);
        drain(&d).await;

        assert_eq!(transport.paths(), vec!["b", "a", "c"]);
        for handle in [a, b, c] {
            assert!(handle.await.success);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn later_high_runs_before_earlier_high() {
        let transport = ScriptedTransport::new(|_| Ok(sealed_reply(200, "ok")));
        let d = dispatcher(transport.clone());

        let _n1 = d.submit("n1", Params::new(), None, Priority::Normal);
        let _h1 = d.submit("h1", Params::new(), None, Priority::High);
        let _l1 = d.submit("l1", Params::new(), None, Priority::Low);
        let _h2 = d.submit("h2", Params::new(), None, Priority::High);
        let _n2 = d.submit("n2", Params::new(), None, Priority::Normal);
        drain(&d).await;

        assert_eq!(transport.paths(), vec!["h2", "h1", "n1", "l1", "n2"]);
    }

    #[test]
    fn tick_outside_runtime_keeps_the_job() {
        let transport = ScriptedTransport::new(|_| Ok(sealed_reply(200, "ok")));
        let d = dispatcher(transport.clone());
        let handle = d.submit("later", Params::new(), None, Priority::Normal);

        assert!(!d.tick());
        assert_eq!(d.backlog_len(), 1);
        assert!(!d.is_in_flight());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let response = runtime.block_on(async {
            assert!(d.tick());
            handle.await
        });
        assert!(response.success);
        assert_eq!(transport.paths(), vec!["later"]);
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_job_in_flight() {
        let gate = Arc::new(Notify::new());
        let transport = ScriptedTransport::gated(gate.clone());
        let d = dispatcher(transport.clone());

        let first = d.submit("first", Params::new(), None, Priority::Normal);
        let _second = d.submit("second", Params::new(), None, Priority::Normal);

        assert!(d.tick());
        tokio::task::yield_now().await;
        assert!(d.is_in_flight());
        assert!(!d.tick(), "tick must be a no-op while a job is in flight");
        assert_eq!(d.backlog_len(), 1);

        gate.notify_one();
        let response = first.await;
        assert!(response.success);
        // Let the finished job release the in-flight marker.
        tokio::task::yield_now().await;
        assert!(!d.is_in_flight());
        assert!(d.tick());
        tokio::task::yield_now().await;
        assert_eq!(transport.paths(), vec!["first", "second"]);
        gate.notify_one();
    }

    #[tokio::test(start_paused = true)]
    async fn tick_on_empty_backlog_is_noop() {
        let transport = ScriptedTransport::new(|_| Ok(sealed_reply(200, "ok")));
        let d = dispatcher(transport.clone());
        assert!(!d.tick());
        assert!(!d.is_in_flight());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_retry_with_linear_backoff() {
        let transport = ScriptedTransport::new(|_| {
            Ok(HttpReply {
                status: 503,
                body: String::new(),
            })
        });
        let d = dispatcher(transport.clone());

        let handle = d.submit("flaky", Params::new(), None, Priority::Normal);
        drain(&d).await;
        let response = handle.await;

        assert!(!response.success);
        assert_eq!(response.error_kind, ErrorKind::ServerError);
        assert_eq!(response.status_code, 503);

        let at = transport.instants();
        assert_eq!(at.len(), 4, "one attempt plus max_retries retries");
        for (i, pair) in at.windows(2).enumerate() {
            let gap = pair[1] - pair[0];
            let expected = Duration::from_secs(i as u64 + 1);
            assert!(
                gap >= expected && gap < expected + Duration::from_millis(20),
                "retry {i} waited {gap:?}, expected {expected:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let transport = ScriptedTransport::new(|_| {
            Ok(HttpReply {
                status: 404,
                body: String::new(),
            })
        });
        let d = dispatcher(transport.clone());

        let handle = d.submit("missing", Params::new(), None, Priority::Normal);
        drain(&d).await;
        let response = handle.await;

        assert!(!response.success);
        assert_eq!(response.status_code, 404);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_server_retries_then_reports_no_internet() {
        let transport =
            ScriptedTransport::new(|_| Err(TransportError::Connect("refused".into())));
        let d = dispatcher(transport.clone());

        let handle = d.submit("offline", Params::new(), None, Priority::Normal);
        drain(&d).await;
        let response = handle.await;

        assert_eq!(response.error_kind, ErrorKind::NoInternet);
        assert_eq!(response.status_code, 0);
        assert_eq!(transport.requests().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_are_reported_and_retried() {
        let transport = ScriptedTransport::new(|_| Err(TransportError::Timeout));
        let d = dispatcher(transport.clone());

        let handle = d.submit("slow", Params::new(), None, Priority::Normal);
        drain(&d).await;
        let response = handle.await;

        assert_eq!(response.error_kind, ErrorKind::Timeout);
        assert_eq!(transport.requests().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let calls = Arc::new(Mutex::new(0u32));
        let counter = calls.clone();
        let transport = ScriptedTransport::new(move |_| {
            let mut n = counter.lock();
            *n += 1;
            if *n == 1 {
                Ok(HttpReply {
                    status: 502,
                    body: String::new(),
                })
            } else {
                Ok(sealed_reply(200, "second time lucky"))
            }
        });
        let d = dispatcher(transport.clone());

        let handle = d.submit("retry", Params::new(), None, Priority::Normal);
        drain(&d).await;
        let response = handle.await;

        assert_eq!(response, Response::ok("second time lucky", 200));
        assert_eq!(*calls.lock(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn undecryptable_body_is_a_parsing_error() {
        let transport = ScriptedTransport::new(|_| {
            Ok(HttpReply {
                status: 200,
                body: String::new(),
            })
        });
        let d = dispatcher(transport.clone());

        let handle = d.submit("empty", Params::new(), None, Priority::Normal);
        drain(&d).await;
        let response = handle.await;

        assert_eq!(response.error_kind, ErrorKind::DataParsingError);
        assert_eq!(response.status_code, 200);
        assert!(response.data.is_none());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn requests_are_signed_and_encoded() {
        let transport = ScriptedTransport::new(|_| Ok(sealed_reply(200, "ok")));
        let d = dispatcher(transport.clone());

        let params = Params::new().with("query", "a b&c").with("user", "42");
        let _handle = d.submit("/v1/search", params, None, Priority::Normal);
        drain(&d).await;

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Get);
        assert!(request.url.starts_with("http://api.test/v1/search?"));
        assert!(request.url.contains("query=a%20b%26c"));
        assert!(request.body.is_none());
        assert!(
            request
                .headers
                .contains(&(CLIENT_VERSION_HEADER, "1.2.3".to_string()))
        );
        assert!(request.headers.contains(&(PLATFORM_HEADER, "test".to_string())));

        let sent = query(&request.url);
        assert_eq!(sent.get("timestamp"), Some("1700000000"));
        assert_eq!(sent.get("nonce").map(str::len), Some(NONCE_LEN));
        let mut unsigned = sent.clone();
        let sign = unsigned.remove("sign").unwrap();
        assert_eq!(sign, SharedSecretCipher::new(SECRET).generate_sign(&unsigned));
    }

    #[tokio::test(start_paused = true)]
    async fn each_retry_is_freshly_signed() {
        let transport = ScriptedTransport::new(|_| {
            Ok(HttpReply {
                status: 500,
                body: String::new(),
            })
        });
        let d = dispatcher(transport.clone());

        let _handle = d.submit("again", Params::new(), None, Priority::Normal);
        drain(&d).await;

        let cipher = SharedSecretCipher::new(SECRET);
        let nonces: Vec<String> = transport
            .requests()
            .iter()
            .map(|r| {
                let mut sent = query(&r.url);
                let sign = sent.remove("sign").unwrap();
                assert_eq!(sign, cipher.generate_sign(&sent));
                sent.get("nonce").unwrap().to_string()
            })
            .collect();
        assert_eq!(nonces.len(), 4);
        assert_ne!(nonces[0], nonces[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn body_is_encrypted_and_posted() {
        let transport = ScriptedTransport::new(|_| Ok(sealed_reply(200, "{\"saved\":true}")));
        let d = dispatcher(transport.clone());

        let handle = d.submit(
            "save",
            Params::new(),
            Some("{\"name\":\"conduit\"}".into()),
            Priority::High,
        );
        drain(&d).await;

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Post);
        let body = request.body.as_deref().unwrap();
        assert_ne!(body, "{\"name\":\"conduit\"}");
        assert_eq!(
            SharedSecretCipher::new(SECRET).decrypt(body),
            "{\"name\":\"conduit\"}"
        );
        assert_eq!(handle.await.data.as_deref(), Some("{\"saved\":true}"));
    }

    #[tokio::test(start_paused = true)]
    async fn absolute_endpoints_bypass_base_url() {
        let transport = ScriptedTransport::new(|_| Ok(sealed_reply(200, "ok")));
        let d = dispatcher(transport.clone());

        let _handle = d.submit("https://cdn.test/asset?v=2", Params::new(), None, Priority::Low);
        drain(&d).await;

        let url = &transport.requests()[0].url;
        assert!(url.starts_with("https://cdn.test/asset?v=2&"), "{url}");
    }

    #[tokio::test(start_paused = true)]
    async fn background_ticker_drains_backlog() {
        let transport = ScriptedTransport::new(|_| Ok(sealed_reply(200, "ok")));
        let d = dispatcher(transport.clone());
        let ticker = d.spawn_ticker(Duration::from_millis(20));

        let first = d.submit("one", Params::new(), None, Priority::Normal);
        let second = d.submit("two", Params::new(), None, Priority::Normal);
        assert!(first.await.success);
        assert!(second.await.success);
        ticker.abort();

        assert_eq!(transport.paths(), vec!["one", "two"]);
    }
}
