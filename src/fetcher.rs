//! Page fetching with retry and timeout escalation.
//!
//! The network sits behind the [`Transport`] trait so the retry policy can be
//! exercised without sockets. [`ReqwestTransport`] is the production
//! implementation: browser-like default headers, a bounded redirect policy and
//! a per-request timeout.
//!
//! # Retry Policy
//!
//! Only transport-level failures are retried:
//!
//! | Outcome | Behavior |
//! |---------|----------|
//! | status 404 | `NotFound`, no retry |
//! | status ≥ 500 | `ServerUnavailable`, no retry |
//! | other status | returned to the caller as-is |
//! | client timeout | retry after `retry_delay`, next timeout × 1.5 |
//! | no response | retry after `retry_delay`, same timeout |
//!
//! At most `1 + max_retries` attempts are made; the last transport error is
//! returned unchanged once the budget is spent.

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, redirect};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};
use url::Url;

/// Factor applied to the timeout after each timed-out attempt.
const TIMEOUT_ESCALATION: f64 = 1.5;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A raw HTTP response with a status below 500.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedPage {
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The client gave up waiting.
    Timeout,
    /// Connection refused/reset, DNS failure: no response at all.
    NoResponse,
    /// Redirect loops, malformed responses. Not retried.
    Protocol,
}

/// A failure below the HTTP status level, classified by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TransportFailure {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: message.into(),
        }
    }

    pub fn no_response(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::NoResponse,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, FailureKind::Timeout | FailureKind::NoResponse)
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<TransportFailure> for Error {
    fn from(failure: TransportFailure) -> Self {
        match failure.kind {
            FailureKind::Timeout => Error::Timeout(failure.message),
            FailureKind::NoResponse | FailureKind::Protocol => Error::Transport(failure.message),
        }
    }
}

/// One HTTP GET, without retries.
pub trait Transport {
    async fn get(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> std::result::Result<FetchedPage, TransportFailure>;
}

/// Headers sent with every page request, mimicking a desktop browser.
/// `Accept-Encoding` is left to reqwest so it can decode what it asks for.
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));
    headers.insert("Sec-Fetch-User", HeaderValue::from_static("?1"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers
}

/// Next timeout after a timed-out attempt, saturating at [`Duration::MAX`].
fn escalate(timeout: Duration) -> Duration {
    Duration::try_from_secs_f64(timeout.as_secs_f64() * TIMEOUT_ESCALATION).unwrap_or(Duration::MAX)
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(max_redirects: usize) -> Result<Self> {
        let client = Client::builder()
            .default_headers(default_headers())
            .redirect(redirect::Policy::limited(max_redirects))
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn classify(e: &reqwest::Error) -> TransportFailure {
    if e.is_timeout() {
        TransportFailure::timeout(format!("Request timed out: {e}"))
    } else if e.is_redirect() || e.is_decode() || e.is_builder() {
        TransportFailure {
            kind: FailureKind::Protocol,
            message: e.to_string(),
        }
    } else {
        TransportFailure::no_response(e.to_string())
    }
}

impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> std::result::Result<FetchedPage, TransportFailure> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(&e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(|e| classify(&e))?;

        Ok(FetchedPage {
            status,
            content_type,
            body,
        })
    }
}

/// Retrying page fetcher over a [`Transport`].
#[derive(Debug, Clone)]
pub struct Fetcher<T = ReqwestTransport> {
    transport: T,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl Fetcher<ReqwestTransport> {
    /// Production fetcher configured from [`FetchConfig`].
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        Ok(Self::new(ReqwestTransport::new(config.max_redirects)?, config))
    }
}

impl<T: Transport> Fetcher<T> {
    /// Wrap `transport` with the retry policy from `config`.
    ///
    /// # Arguments
    /// * `transport` - Performs the single GET attempts
    /// * `config` - Default timeout, retry count and delay between attempts
    pub fn new(transport: T, config: &FetchConfig) -> Self {
        Self {
            transport,
            timeout: config.timeout(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch with the configured default timeout.
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        self.fetch_with_timeout(url, self.timeout).await
    }

    /// GET `url`, retrying connection failures and timeouts.
    ///
    /// # Arguments
    /// * `url` - Absolute http(s) URL
    /// * `timeout` - Budget for the first attempt; each timed-out attempt
    ///   raises the next one by half
    ///
    /// # Returns
    /// Any page below 500 other than 404. A 404 is [`Error::NotFound`] and a
    /// 5xx is [`Error::ServerUnavailable`], neither retried. Once retries run
    /// out, the last failure is returned as [`Error::Timeout`] or
    /// [`Error::Transport`].
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn fetch_with_timeout(&self, url: &Url, timeout: Duration) -> Result<FetchedPage> {
        let total_t0 = Instant::now();
        let mut timeout = timeout;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.transport.get(url, timeout).await {
                Ok(page) if page.status == 404 => {
                    warn!(attempt, "Page not found");
                    return Err(Error::NotFound(
                        "The requested article was not found (404)".to_string(),
                    ));
                }
                Ok(page) if page.status >= 500 => {
                    warn!(attempt, status = page.status, "Server error");
                    return Err(Error::ServerUnavailable {
                        status: page.status,
                        url: url.to_string(),
                    });
                }
                Ok(page) => {
                    debug!(
                        attempt,
                        status = page.status,
                        bytes = page.body.len(),
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        "Fetched page"
                    );
                    return Ok(page);
                }
                Err(failure) => {
                    if !failure.is_retryable() || attempt > self.max_retries {
                        warn!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %failure,
                            "fetch() giving up"
                        );
                        return Err(failure.into());
                    }

                    let next_timeout = match failure.kind {
                        FailureKind::Timeout => escalate(timeout),
                        _ => timeout,
                    };
                    warn!(
                        attempt,
                        remaining = self.max_retries + 1 - attempt,
                        ?next_timeout,
                        error = %failure,
                        "fetch() attempt failed; retrying"
                    );
                    sleep(self.retry_delay).await;
                    timeout = next_timeout;
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Scripted transport: pops one outcome per call and records the timeout
    /// it was asked to use. Once the script runs out it keeps timing out.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        pub script: Mutex<VecDeque<std::result::Result<FetchedPage, TransportFailure>>>,
        pub timeouts: Mutex<Vec<Duration>>,
    }

    impl ScriptedTransport {
        pub fn new(
            script: Vec<std::result::Result<FetchedPage, TransportFailure>>,
        ) -> Self {
            Self {
                script: Mutex::new(script.into()),
                timeouts: Mutex::new(Vec::new()),
            }
        }

        pub fn attempts(&self) -> usize {
            self.timeouts.lock().unwrap().len()
        }

        pub fn recorded_timeouts(&self) -> Vec<Duration> {
            self.timeouts.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        async fn get(
            &self,
            _url: &Url,
            timeout: Duration,
        ) -> std::result::Result<FetchedPage, TransportFailure> {
            self.timeouts.lock().unwrap().push(timeout);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportFailure::timeout("timed out")))
        }
    }

    pub(crate) fn html_page(status: u16, body: &str) -> FetchedPage {
        FetchedPage {
            status,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: body.to_string(),
        }
    }

    fn config(max_retries: u32) -> FetchConfig {
        FetchConfig {
            max_retries,
            retry_delay_ms: 10,
            timeout_ms: 1_000,
            ..FetchConfig::default()
        }
    }

    fn url() -> Url {
        Url::parse("https://example.com/blog/post").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_refused_twice_then_success() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportFailure::no_response("connection refused")),
            Err(TransportFailure::no_response("connection refused")),
            Ok(html_page(200, "<p>ok</p>")),
        ]);
        let fetcher = Fetcher::new(transport, &config(2));
        let page = fetcher.fetch(&url()).await.unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(fetcher.transport.attempts(), 3);
        // no-response retries keep the same timeout
        let timeouts = fetcher.transport.timeouts.lock().unwrap().clone();
        assert!(timeouts.iter().all(|t| *t == Duration::from_millis(1_000)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_escalate_and_budget_is_respected() {
        let fetcher = Fetcher::new(ScriptedTransport::default(), &config(2));
        let err = fetcher.fetch(&url()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));

        let timeouts = fetcher.transport.timeouts.lock().unwrap().clone();
        assert_eq!(timeouts.len(), 3);
        assert!(timeouts.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(timeouts[1], Duration::from_millis(1_500));
        assert_eq!(timeouts[2], Duration::from_millis(2_250));
    }

    #[test]
    fn test_escalate_saturates() {
        assert_eq!(escalate(Duration::from_secs(2)), Duration::from_secs(3));
        assert_eq!(escalate(Duration::MAX), Duration::MAX);
        assert_eq!(escalate(Duration::from_secs(u64::MAX / 4 * 3)), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_timeout_does_not_overflow_on_retry() {
        let fetcher = Fetcher::new(ScriptedTransport::default(), &config(2));
        let err = fetcher.fetch_with_timeout(&url(), Duration::MAX).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(
            fetcher.transport.recorded_timeouts(),
            vec![Duration::MAX, Duration::MAX, Duration::MAX]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_returns_last_error() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportFailure::timeout("first")),
            Err(TransportFailure::no_response("last one")),
        ]);
        let fetcher = Fetcher::new(transport, &config(1));
        let err = fetcher.fetch(&url()).await.unwrap_err();
        match err {
            Error::Transport(msg) => assert_eq!(msg, "last one"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fetcher.transport.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Ok(html_page(404, "missing"))]);
        let fetcher = Fetcher::new(transport, &config(2));
        let err = fetcher.fetch(&url()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(fetcher.transport.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Ok(html_page(503, "down"))]);
        let fetcher = Fetcher::new(transport, &config(2));
        let err = fetcher.fetch(&url()).await.unwrap_err();
        assert!(matches!(err, Error::ServerUnavailable { status: 503, .. }));
        assert_eq!(fetcher.transport.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_returned_to_caller() {
        let transport = ScriptedTransport::new(vec![Ok(html_page(403, "forbidden"))]);
        let fetcher = Fetcher::new(transport, &config(2));
        let page = fetcher.fetch(&url()).await.unwrap();
        assert_eq!(page.status, 403);
    }

    #[tokio::test(start_paused = true)]
    async fn test_protocol_failure_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Err(TransportFailure {
            kind: FailureKind::Protocol,
            message: "too many redirects".into(),
        })]);
        let fetcher = Fetcher::new(transport, &config(2));
        assert!(matches!(
            fetcher.fetch(&url()).await,
            Err(Error::Transport(_))
        ));
        assert_eq!(fetcher.transport.attempts(), 1);
    }

    #[test]
    fn test_is_html() {
        assert!(html_page(200, "").is_html());
        let json = FetchedPage {
            status: 200,
            content_type: Some("application/json".into()),
            body: "{}".into(),
        };
        assert!(!json.is_html());
    }

    #[tokio::test]
    async fn test_reqwest_transport_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("Location", "/new"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>moved</body></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::from_config(&config(0)).unwrap();
        let url = Url::parse(&format!("{}/old", server.uri())).unwrap();
        let page = fetcher.fetch(&url).await.unwrap();
        assert_eq!(page.status, 200);
        assert!(page.is_html());
        assert!(page.body.contains("moved"));
    }

    #[tokio::test]
    async fn test_reqwest_transport_sends_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(wiremock::matchers::header("Sec-Fetch-Mode", "navigate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::from_config(&config(0)).unwrap();
        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        assert_eq!(fetcher.fetch(&url).await.unwrap().body, "ok");
    }

    #[tokio::test]
    async fn test_reqwest_404_single_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::from_config(&config(2)).unwrap();
        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        assert!(matches!(
            fetcher.fetch(&url).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reqwest_slow_server_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(5).unwrap();
        let url = Url::parse(&format!("{}/slow", server.uri())).unwrap();
        let failure = transport
            .get(&url, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn test_reqwest_refused_connection_is_no_response() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = ReqwestTransport::new(5).unwrap();
        let url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
        let failure = transport
            .get(&url, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::NoResponse);
    }
}
