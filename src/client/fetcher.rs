//! HTTP fetcher with retry and backoff policy
//!
//! One `Fetcher` call is one logical request: the rate limiter is acquired
//! before every attempt, 429s are retried after the server's `Retry-After`
//! hint scaled exponentially, transport errors use plain exponential
//! backoff, and everything else fails without retrying.

use crate::auth::TokenProvider;
use crate::ratelimit::RateLimiter;
use crate::{FetchError, FetchResult};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default Retry-After when the 429 response omits the header, in seconds
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Builds the HTTP client shared by all fetch paths
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("discograph/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs single authenticated JSON GETs under the rate limiter
///
/// Cheap to clone; clones share the limiter and token provider.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    tokens: Arc<dyn TokenProvider>,
    max_retries: u32,
}

impl Fetcher {
    pub fn new(
        client: Client,
        limiter: Arc<RateLimiter>,
        tokens: Arc<dyn TokenProvider>,
        max_retries: u32,
    ) -> Self {
        Self {
            client,
            limiter,
            tokens,
            max_retries,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetches a URL and decodes the body as JSON
    ///
    /// # Retry policy
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 429 | Sleep `Retry-After * 2^attempt`, retry up to the limit |
    /// | Transport error (reset, timeout) | Sleep `2^attempt`, retry up to the limit |
    /// | Other non-2xx | Fail immediately (`PermanentHttp`) |
    /// | Non-JSON body | Fail immediately (`MalformedResponse`) |
    ///
    /// The retry budget is an explicit bounded loop; exhaustion returns the
    /// last recoverable error as a typed failure.
    pub async fn get_json(&self, url: &str) -> FetchResult<serde_json::Value> {
        let mut last_error = FetchError::TransientTransport("no attempts made".to_string());

        for attempt in 0..self.max_retries {
            self.limiter.acquire().await;
            let token = self.tokens.get_access_token().await?;

            let started = Instant::now();
            let response = match self.client.get(url).bearer_auth(&token).send().await {
                Ok(response) => response,
                Err(e) => {
                    let kind = if e.is_timeout() {
                        "timeout"
                    } else if e.is_connect() {
                        "connect"
                    } else {
                        "transport"
                    };
                    tracing::warn!("Transport error ({}) fetching {}: {}", kind, url, e);
                    last_error = FetchError::TransientTransport(e.to_string());
                    self.backoff(attempt, 1).await;
                    continue;
                }
            };
            self.limiter.record_latency(started.elapsed());

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = parse_retry_after(&response);
                tracing::warn!(
                    "HTTP 429 for {}: retrying in {}s (attempt {}/{})",
                    url,
                    retry_after << attempt,
                    attempt + 1,
                    self.max_retries
                );
                last_error = FetchError::RateLimited { retry_after };
                self.backoff(attempt, retry_after).await;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::PermanentHttp {
                    status: status.as_u16(),
                });
            }

            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    last_error = FetchError::TransientTransport(e.to_string());
                    self.backoff(attempt, 1).await;
                    continue;
                }
            };

            return serde_json::from_str(&body)
                .map_err(|e| FetchError::MalformedResponse(e.to_string()));
        }

        Err(last_error)
    }

    /// Sleeps `base * 2^attempt` seconds, skipping the final-attempt sleep
    async fn backoff(&self, attempt: u32, base_secs: u64) {
        if attempt + 1 < self.max_retries {
            let secs = base_secs.saturating_mul(1 << attempt.min(16));
            tokio::time::sleep(Duration::from_secs(secs)).await;
        }
    }
}

/// Reads the Retry-After header in seconds, defaulting to 1
fn parse_retry_after(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}
