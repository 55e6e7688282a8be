//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building the shared HTTP client from the fetch configuration
//! - Bounded retries with backoff for non-200 responses and transport errors
//! - Detection of anti-automation challenge pages
//! - The caller-supplied politeness delay after each fetch

use crate::config::{Config, FetchConfig};
use crate::crawler::pacing::Pacer;
use crate::crawler::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Final result of fetching one URL, after the retry policy has concluded
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The URL that was requested
    pub url: Url,

    /// HTTP status of the last attempt; 0 when every attempt failed
    pub status: u16,

    /// Size of the response body in bytes
    pub size: usize,

    /// Response body, present only on success
    pub body: Option<String>,

    /// When the last attempt completed
    pub fetched_at: DateTime<Utc>,

    /// Number of attempts made
    pub attempts: u32,

    /// Reason for the failure, if any
    pub error: Option<String>,
}

impl FetchResult {
    fn success(url: &Url, body: String, attempts: u32) -> Self {
        Self {
            url: url.clone(),
            status: StatusCode::OK.as_u16(),
            size: body.len(),
            body: Some(body),
            fetched_at: Utc::now(),
            attempts,
            error: None,
        }
    }

    fn failed(url: &Url, attempts: u32, error: String) -> Self {
        Self {
            url: url.clone(),
            status: 0,
            size: 0,
            body: None,
            fetched_at: Utc::now(),
            attempts,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StatusCode::OK.as_u16()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Human-readable failure reason
    pub fn failure_reason(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown error")
    }
}

/// An anti-automation challenge page was served instead of content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedSignal {
    pub url: Url,
    /// The marker found in the body
    pub marker: String,
    /// HTTP status the challenge page was served with
    pub status: u16,
}

/// Outcome of [`Fetcher::fetch`]
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The retry policy concluded, successfully or not
    Fetched(FetchResult),

    /// A challenge page was detected; never retried
    Blocked(BlockedSignal),
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetch configuration (user agent and per-attempt timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::config::FetchConfig;
/// use sumi_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout())
        .connect_timeout(config.timeout().min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Issues GET requests under a retry policy and an aggregate rate ceiling
///
/// Holds no state beyond the shared transport, the policy objects and the
/// list of challenge-page markers. Cloning is cheap and clones share the
/// connection pool and the rate ceiling.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    retry: RetryPolicy,
    block_markers: Vec<String>,
    pacer: Pacer,
}

impl Fetcher {
    pub fn new(client: Client, retry: RetryPolicy, block_markers: Vec<String>, pacer: Pacer) -> Self {
        Self {
            client,
            retry,
            block_markers,
            pacer,
        }
    }

    /// Builds a fetcher from the run configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.fetch)?;
        Ok(Self::new(
            client,
            RetryPolicy::linear(config.fetch.max_attempts, config.fetch.backoff_base()),
            config.fetch.block_markers.clone(),
            Pacer::per_second(config.pacing.max_requests_per_second),
        ))
    }

    /// Fetches a URL, then waits `delay` before returning
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 200 | Success |
    /// | Any other status | Retry with backoff until attempts run out |
    /// | Transport error or timeout | Retry with backoff until attempts run out |
    /// | Challenge marker in body | Immediate → `Blocked`, no retry |
    /// | Attempts exhausted | `Fetched` with status 0 |
    ///
    /// Network failures never surface as errors; they are recorded in the
    /// returned [`FetchResult`].
    pub async fn fetch(&self, url: &Url, delay: Duration) -> FetchOutcome {
        let outcome = self.fetch_with_retry(url).await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    async fn fetch_with_retry(&self, url: &Url) -> FetchOutcome {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.pacer.acquire().await;

            let error = match self.client.get(url.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    match response.text().await {
                        Ok(body) => {
                            if let Some(marker) = self.find_block_marker(&body) {
                                return FetchOutcome::Blocked(BlockedSignal {
                                    url: url.clone(),
                                    marker: marker.to_string(),
                                    status: status.as_u16(),
                                });
                            }
                            if status == StatusCode::OK {
                                debug!("Fetched {} ({} bytes, attempt {})", url, body.len(), attempt);
                                return FetchOutcome::Fetched(FetchResult::success(url, body, attempt));
                            }
                            format!("HTTP {}", status.as_u16())
                        }
                        Err(e) => format!("failed to read body: {}", e),
                    }
                }
                Err(e) => classify_error(&e),
            };

            match self.retry.delay_after(attempt) {
                Some(backoff) => {
                    warn!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        attempt,
                        self.retry.max_attempts(),
                        url,
                        error,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                None => {
                    warn!("Giving up on {} after {} attempts: {}", url, attempt, error);
                    return FetchOutcome::Fetched(FetchResult::failed(url, attempt, error));
                }
            }
        }
    }

    /// Performs a single GET with no retries and no challenge detection
    ///
    /// Used for best-effort lookups such as robots.txt, where any status is
    /// informative.
    pub async fn fetch_once(&self, url: &Url) -> FetchResult {
        self.pacer.acquire().await;
        match self.client.get(url.clone()).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                match response.text().await {
                    Ok(body) => FetchResult {
                        url: url.clone(),
                        status,
                        size: body.len(),
                        body: Some(body),
                        fetched_at: Utc::now(),
                        attempts: 1,
                        error: None,
                    },
                    Err(e) => FetchResult::failed(url, 1, format!("failed to read body: {}", e)),
                }
            }
            Err(e) => FetchResult::failed(url, 1, classify_error(&e)),
        }
    }

    fn find_block_marker(&self, body: &str) -> Option<&str> {
        self.block_markers
            .iter()
            .find(|marker| body.contains(marker.as_str()))
            .map(String::as_str)
    }
}

fn classify_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection refused".to_string()
    } else {
        e.to_string()
    }
}
