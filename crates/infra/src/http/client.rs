//! Shared HTTP client for the ledger integrations.
//!
//! Reads and queries go through [`HttpClient::send`], which retries 5xx
//! responses and connect/timeout failures. Creates and uploads use
//! [`HttpClient::send_once`] so a slow success is never replayed.

use std::time::Duration;

use ledgersync_domain::SyncError;
use reqwest::{Client as ReqwestClient, Method, Request, RequestBuilder, Response};
use tracing::debug;

use crate::errors::InfraError;

const USER_AGENT: &str = concat!("ledgersync/", env!("CARGO_PKG_VERSION"));

/// Attempt budget and exponential backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RetryPolicy {
    max_attempts: usize,
    base_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry `n` (1-based): base, 2x base, 4x base, capped at 256x.
    fn delay_before(&self, retry: usize) -> Duration {
        let exponent = u32::try_from(retry.saturating_sub(1).min(8)).unwrap_or(8);
        self.base_backoff.saturating_mul(1 << exponent)
    }

    fn has_attempts_after(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }
}

/// HTTP client with bounded retry and a per-request timeout.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    policy: RetryPolicy,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute a request whose body can be cloned, retrying transient failures.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, SyncError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = builder
                .try_clone()
                .ok_or_else(|| SyncError::Internal("request body is not clonable; use send_once".into()))
                .and_then(build_request)?;
            let (method, url) = describe(&request);

            match self.client.execute(request).await {
                Ok(response) if response.status().is_server_error() => {
                    if !self.policy.has_attempts_after(attempt) {
                        return Ok(response);
                    }
                    debug!(attempt, %method, %url, status = %response.status(), "server error; retrying");
                }
                Ok(response) => {
                    debug!(attempt, %method, %url, status = %response.status(), "HTTP response");
                    return Ok(response);
                }
                Err(err) if is_transient(&err) && self.policy.has_attempts_after(attempt) => {
                    debug!(attempt, %method, %url, error = %err, "transient HTTP failure; retrying");
                }
                Err(err) => return Err(InfraError::from(err).into()),
            }

            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Execute the request exactly once.
    pub async fn send_once(&self, builder: RequestBuilder) -> Result<Response, SyncError> {
        let request = build_request(builder)?;
        let (method, url) = describe(&request);

        let response = self.client.execute(request).await.map_err(InfraError::from)?;
        debug!(%method, %url, status = %response.status(), "HTTP response (single attempt)");
        Ok(response)
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    policy: RetryPolicy,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            policy: RetryPolicy { max_attempts: 3, base_backoff: Duration::from_millis(200) },
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total number of attempts, the first one included.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.policy.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.policy.base_backoff = backoff;
        self
    }

    pub fn build(self) -> Result<HttpClient, SyncError> {
        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .no_proxy()
            .build()
            .map_err(InfraError::from)?;
        Ok(HttpClient { client, policy: self.policy })
    }
}

fn build_request(builder: RequestBuilder) -> Result<Request, SyncError> {
    builder.build().map_err(|err| InfraError::from(err).into())
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Method and URL for logging. Query strings can carry customer names, so
/// they are masked.
fn describe(request: &Request) -> (Method, String) {
    let mut shown = request.url().clone();
    if shown.query().is_some() {
        shown.set_query(Some("redacted"));
    }
    (request.method().clone(), shown.to_string())
}
