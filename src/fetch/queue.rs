//! Per-host request queue with adaptive spacing and retry.
//!
//! `queue_request` appends to the FIFO for the URL's host and resolves when
//! the request finally succeeds or permanently fails. Dispatchers are
//! re-armed on enqueue and after every completion; spacing between dispatch
//! releases adapts from observed latencies and errors. Retries for
//! transient statuses happen inside the dispatch slot, so they never lose
//! their place in the per-host FIFO.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::debug;
use url::Url;

use crate::error::FetchError;

use super::host_state::{redispatch_delay_ms, spacing_jitter, HostState, ReplySink};
use super::response::QueueResponse;

const USER_AGENT: &str = concat!("media-inliner/", env!("CARGO_PKG_VERSION"));

/// How often the drain barrier re-checks for idleness.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Construction options for the request queue.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueOptions {
    /// Base retry delay in milliseconds; scaled by attempt number and jitter.
    #[serde(default = "default_base_wait_on_retry")]
    pub base_wait_on_retry: u64,
    /// Initial per-host spacing in milliseconds.
    #[serde(default = "default_request_interval")]
    pub default_request_interval: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests_per_domain: usize,
    /// Spacing ceiling for ordinary adaptation, in milliseconds.
    #[serde(default = "default_max_request_interval")]
    pub max_request_interval: u64,
    /// Spacing floor, in milliseconds.
    #[serde(default = "default_min_request_interval")]
    pub min_request_interval: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Latency threshold dividing "fast" from "slow" responses, in milliseconds.
    #[serde(default = "default_min_expected_response_time")]
    pub min_expected_response_time: u64,
    #[serde(default = "default_retryable_status_codes")]
    pub retryable_status_codes: HashSet<u16>,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            base_wait_on_retry: default_base_wait_on_retry(),
            default_request_interval: default_request_interval(),
            max_concurrent_requests_per_domain: default_max_concurrent(),
            max_request_interval: default_max_request_interval(),
            min_request_interval: default_min_request_interval(),
            max_retries: default_max_retries(),
            min_expected_response_time: default_min_expected_response_time(),
            retryable_status_codes: default_retryable_status_codes(),
        }
    }
}

fn default_base_wait_on_retry() -> u64 {
    1_000
}
fn default_request_interval() -> u64 {
    500
}
fn default_max_concurrent() -> usize {
    4
}
fn default_max_request_interval() -> u64 {
    60_000
}
fn default_min_request_interval() -> u64 {
    100
}
fn default_max_retries() -> u32 {
    3
}
fn default_min_expected_response_time() -> u64 {
    500
}
fn default_retryable_status_codes() -> HashSet<u16> {
    [429, 408, 502, 503, 504].into_iter().collect()
}

/// Opaque per-request parameters.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

/// A request waiting in a host's FIFO.
#[derive(Debug)]
pub struct PendingRequest {
    pub url: String,
    pub options: RequestOptions,
    pub reply: ReplySink,
}

/// Point-in-time view of one host's stats, for introspection.
#[derive(Debug, Clone)]
pub struct HostStatsSnapshot {
    pub min_request_interval: u64,
    pub requests_in_flight: usize,
    pub queued: usize,
    pub success_count: u64,
    pub error_count: u64,
    pub consecutive_errors: u64,
}

/// Per-host FIFO of pending fetches with spacing and concurrency caps.
#[derive(Clone)]
pub struct RequestQueue {
    options: QueueOptions,
    client: Client,
    hosts: Arc<Mutex<HashMap<String, HostState>>>,
}

impl RequestQueue {
    pub fn new(options: QueueOptions) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            options,
            client,
            hosts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    /// Enqueue a request for the URL's host and wait for its outcome.
    ///
    /// Resolves exactly once: with the response on success, or with the
    /// final error after retries are exhausted.
    pub async fn queue_request(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<QueueResponse, FetchError> {
        let host = host_of(url)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut hosts = self.hosts.lock().await;
            let state = hosts
                .entry(host.clone())
                .or_insert_with(|| HostState::new(&self.options));
            state.queue.push_back(PendingRequest {
                url: url.to_string(),
                options,
                reply: tx,
            });
        }

        self.schedule_dispatch(&host, Duration::ZERO);

        rx.await.map_err(|_| FetchError::QueueClosed)?
    }

    /// True iff every per-host queue is empty.
    pub async fn are_all_queues_empty(&self) -> bool {
        let hosts = self.hosts.lock().await;
        hosts.values().all(|state| state.queue.is_empty())
    }

    /// True iff every queue is empty and no request occupies a slot.
    pub async fn is_idle(&self) -> bool {
        let hosts = self.hosts.lock().await;
        hosts
            .values()
            .all(|state| state.queue.is_empty() && state.active == 0)
    }

    /// Termination barrier: returns once every queue has drained and every
    /// in-flight request has completed.
    pub async fn wait_for_all_queues(&self) {
        loop {
            if self.is_idle().await {
                return;
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }

    /// Snapshot the adaptive state of every host seen so far.
    pub async fn host_stats(&self) -> HashMap<String, HostStatsSnapshot> {
        let hosts = self.hosts.lock().await;
        hosts
            .iter()
            .map(|(host, state)| {
                (
                    host.clone(),
                    HostStatsSnapshot {
                        min_request_interval: state.stats.min_request_interval,
                        requests_in_flight: state.stats.requests_in_flight,
                        queued: state.queue.len(),
                        success_count: state.stats.success_count,
                        error_count: state.stats.error_count,
                        consecutive_errors: state.stats.consecutive_errors,
                    },
                )
            })
            .collect()
    }

    fn schedule_dispatch(&self, host: &str, delay: Duration) {
        let queue = self.clone();
        let host = host.to_string();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            queue.dispatch(host).await;
        });
    }

    /// One dispatch attempt for a host. Pops at most one request.
    async fn dispatch(&self, host: String) {
        let pending = {
            let mut hosts = self.hosts.lock().await;
            let Some(state) = hosts.get_mut(&host) else {
                return;
            };

            if state.active >= self.options.max_concurrent_requests_per_domain {
                // A completion will re-arm this host.
                return;
            }

            let wait = state.stats.wait_remaining_ms();
            if wait > 0 {
                let delay = (wait as f64 * spacing_jitter()) as u64;
                drop(hosts);
                self.schedule_dispatch(&host, Duration::from_millis(delay));
                return;
            }

            let Some(pending) = state.queue.pop_front() else {
                return;
            };
            state.active += 1;
            state.stats.requests_in_flight += 1;
            state.stats.last_request_time = Some(Instant::now());
            pending
        };

        let started = Instant::now();
        let result = self
            .request_with_retry(&host, &pending.url, &pending.options)
            .await;
        let response_time = started.elapsed().as_millis() as u64;

        {
            let mut hosts = self.hosts.lock().await;
            if let Some(state) = hosts.get_mut(&host) {
                match &result {
                    Ok(_) => state.stats.record_success(response_time, &self.options),
                    Err(err) => state.stats.record_error(err.status(), &self.options),
                }
                state.active -= 1;
                state.stats.requests_in_flight -= 1;
            }
        }

        // The receiver may have gone away; completion is still final.
        let _ = pending.reply.send(result);

        self.schedule_dispatch(&host, Duration::from_millis(redispatch_delay_ms()));
    }

    /// Perform the request, retrying retryable statuses in place.
    ///
    /// Each retryable attempt penalizes the host's spacing before sleeping,
    /// so a rate-limited host slows down even when the retry eventually
    /// succeeds. Transport errors are never retried.
    async fn request_with_retry(
        &self,
        host: &str,
        url: &str,
        options: &RequestOptions,
    ) -> Result<QueueResponse, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            match self.execute(url, options).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    let retryable = err
                        .status()
                        .is_some_and(|s| self.options.retryable_status_codes.contains(&s));
                    if retryable && attempt < self.options.max_retries {
                        {
                            let mut hosts = self.hosts.lock().await;
                            if let Some(state) = hosts.get_mut(host) {
                                state.stats.apply_rate_limit_penalty();
                            }
                        }
                        let wait = retry_wait_ms(self.options.base_wait_on_retry, attempt);
                        debug!(
                            url,
                            attempt = attempt + 1,
                            wait_ms = wait,
                            "retrying after retryable status"
                        );
                        tokio::time::sleep(Duration::from_millis(wait)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn execute(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<QueueResponse, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }

        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?
            .to_vec();

        Ok(QueueResponse {
            status,
            headers,
            body,
        })
    }
}

/// Extract the rate-limit partition key from a URL.
fn host_of(url: &str) -> Result<String, FetchError> {
    let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    parsed
        .host_str()
        .map(|h| h.to_string())
        .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))
}

fn retry_wait_ms(base: u64, attempt: u32) -> u64 {
    (base as f64 * (attempt + 1) as f64 * spacing_jitter()).floor() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_extraction() {
        assert_eq!(
            host_of("https://substackcdn.com/image/a.png").unwrap(),
            "substackcdn.com"
        );
        assert!(matches!(
            host_of("not a url"),
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(
            host_of("data:text/plain,hello"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn retry_wait_scales_with_attempt() {
        for _ in 0..20 {
            let first = retry_wait_ms(100, 0);
            assert!((115..=150).contains(&first));
            let second = retry_wait_ms(100, 1);
            assert!((230..=300).contains(&second));
        }
    }

    #[tokio::test]
    async fn queue_request_rejects_invalid_url_immediately() {
        let queue = RequestQueue::new(QueueOptions::default());
        let err = queue
            .queue_request("::not-a-url::", RequestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
        // Nothing was enqueued for it.
        assert!(queue.are_all_queues_empty().await);
        assert!(queue.is_idle().await);
    }

    #[tokio::test]
    async fn fresh_queue_is_idle() {
        let queue = RequestQueue::new(QueueOptions::default());
        assert!(queue.are_all_queues_empty().await);
        queue.wait_for_all_queues().await;
        assert!(queue.host_stats().await.is_empty());
    }
}
