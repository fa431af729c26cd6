//! Per-host adaptive spacing state.

use std::collections::VecDeque;
use std::time::Instant;

use rand::Rng;
use tokio::sync::oneshot;

use crate::error::FetchError;

use super::queue::{PendingRequest, QueueOptions};
use super::response::QueueResponse;

/// Spacing forced on a host whose very first contact was rate limited.
pub const FIRST_CONTACT_PENALTY_MS: u64 = 10_000;

/// Ceiling for the multiplicative rate-limit penalty.
pub const RATE_LIMIT_CEILING_MS: u64 = 30_000;

/// Adaptive state for a single remote host.
#[derive(Debug, Clone)]
pub struct HostStats {
    /// Current minimum gap between dispatch releases, in milliseconds.
    pub min_request_interval: u64,
    /// When the most recent dispatch was released.
    pub last_request_time: Option<Instant>,
    pub requests_in_flight: usize,
    pub success_count: u64,
    pub error_count: u64,
    pub consecutive_errors: u64,
}

impl HostStats {
    pub fn new(options: &QueueOptions) -> Self {
        Self {
            min_request_interval: options.default_request_interval,
            last_request_time: None,
            requests_in_flight: 0,
            success_count: 0,
            error_count: 0,
            consecutive_errors: 0,
        }
    }

    /// Record a completed request and adapt spacing toward faster dispatch.
    ///
    /// Fast responses shrink the interval by 5% but never below a jittered
    /// configured minimum; slow responses grow it by 10% up to a jittered
    /// configured maximum.
    pub fn record_success(&mut self, response_time_ms: u64, options: &QueueOptions) {
        self.success_count += 1;
        self.consecutive_errors = self.consecutive_errors.saturating_sub(1);

        let jitter = adapt_jitter();
        let current = self.min_request_interval as f64;
        self.min_request_interval = if response_time_ms <= options.min_expected_response_time {
            (options.min_request_interval as f64 * jitter).max(current * 0.95) as u64
        } else {
            (options.max_request_interval as f64 * jitter).min(current * 1.10) as u64
        };
    }

    /// Record a failed request and back the spacing off.
    pub fn record_error(&mut self, status: Option<u16>, options: &QueueOptions) {
        self.error_count += 1;
        self.consecutive_errors += 1;

        let current = self.min_request_interval;
        if status.is_some_and(|s| options.retryable_status_codes.contains(&s)) {
            self.apply_rate_limit_penalty();
        } else if self.consecutive_errors >= 2 {
            self.min_request_interval = (current * 2).min(options.max_request_interval);
        } else if self.error_count > 0 && self.success_count == 0 {
            self.min_request_interval =
                ((current as f64) * 1.5).min(options.max_request_interval as f64) as u64;
        }
    }

    /// Penalty for a retryable status (429 and friends).
    ///
    /// A host that rate limits on first contact gets a fixed 10s spacing;
    /// an established host gets tripled spacing capped at 30s. Applied per
    /// observation, including for the in-slot retries.
    pub fn apply_rate_limit_penalty(&mut self) {
        self.min_request_interval = if self.success_count == 0 {
            FIRST_CONTACT_PENALTY_MS
        } else {
            (self.min_request_interval * 3).min(RATE_LIMIT_CEILING_MS)
        };
    }

    /// Milliseconds until this host may dispatch again. Zero when ready.
    pub fn wait_remaining_ms(&self) -> u64 {
        match self.last_request_time {
            Some(last) => {
                let elapsed = last.elapsed().as_millis() as u64;
                self.min_request_interval.saturating_sub(elapsed)
            }
            None => 0,
        }
    }
}

/// Everything the queue tracks for one host: stats, pending FIFO, and the
/// count of requests occupying dispatch slots.
#[derive(Debug)]
pub struct HostState {
    pub stats: HostStats,
    pub queue: VecDeque<PendingRequest>,
    pub active: usize,
}

impl HostState {
    pub fn new(options: &QueueOptions) -> Self {
        Self {
            stats: HostStats::new(options),
            queue: VecDeque::new(),
            active: 0,
        }
    }
}

/// One-shot reply channel bridging enqueue and dispatch.
pub type ReplySink = oneshot::Sender<Result<QueueResponse, FetchError>>;

/// Jitter for spacing waits and retry sleeps: uniform in [1.15, 1.50].
pub fn spacing_jitter() -> f64 {
    1.0 + 0.15 + rand::rng().random_range(0.0..0.35)
}

/// Jitter for interval adaptation: uniform in [1.15, 1.70].
pub fn adapt_jitter() -> f64 {
    1.0 + 0.15 + rand::rng().random_range(0.0..0.55)
}

/// Delay before re-arming a host dispatcher after a completion.
pub fn redispatch_delay_ms() -> u64 {
    rand::rng().random_range(0..1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng as _;

    fn options() -> QueueOptions {
        QueueOptions {
            min_request_interval: 100,
            max_request_interval: 60_000,
            default_request_interval: 500,
            min_expected_response_time: 500,
            ..QueueOptions::default()
        }
    }

    #[test]
    fn fast_success_shrinks_toward_jittered_floor() {
        let opts = options();
        let mut stats = HostStats::new(&opts);
        stats.min_request_interval = 10_000;

        stats.record_success(50, &opts);

        // 0.95 * 10_000 beats the jittered floor (at most 170).
        assert_eq!(stats.min_request_interval, 9_500);
        assert_eq!(stats.success_count, 1);
    }

    #[test]
    fn fast_success_never_drops_below_jittered_minimum() {
        let opts = options();
        let mut stats = HostStats::new(&opts);
        stats.min_request_interval = 100;

        stats.record_success(50, &opts);

        // max(100 * [1.15, 1.70], 95) stays within the jitter band.
        assert!(stats.min_request_interval >= 115);
        assert!(stats.min_request_interval <= 170);
    }

    #[test]
    fn slow_success_grows_ten_percent() {
        let opts = options();
        let mut stats = HostStats::new(&opts);
        stats.min_request_interval = 1_000;

        stats.record_success(5_000, &opts);

        assert_eq!(stats.min_request_interval, 1_100);
    }

    #[test]
    fn success_decays_consecutive_errors() {
        let opts = options();
        let mut stats = HostStats::new(&opts);
        stats.consecutive_errors = 3;

        stats.record_success(50, &opts);
        assert_eq!(stats.consecutive_errors, 2);

        stats.consecutive_errors = 0;
        stats.record_success(50, &opts);
        assert_eq!(stats.consecutive_errors, 0);
    }

    #[test]
    fn first_contact_rate_limit_forces_ten_seconds() {
        let opts = options();
        let mut stats = HostStats::new(&opts);

        stats.record_error(Some(429), &opts);

        assert_eq!(stats.min_request_interval, FIRST_CONTACT_PENALTY_MS);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.consecutive_errors, 1);
    }

    #[test]
    fn established_host_rate_limit_triples_capped() {
        let opts = options();
        let mut stats = HostStats::new(&opts);
        stats.success_count = 5;
        stats.min_request_interval = 4_000;

        stats.record_error(Some(429), &opts);
        assert_eq!(stats.min_request_interval, 12_000);

        stats.record_error(Some(503), &opts);
        assert_eq!(stats.min_request_interval, RATE_LIMIT_CEILING_MS);
    }

    #[test]
    fn consecutive_errors_double_spacing() {
        let opts = options();
        let mut stats = HostStats::new(&opts);
        stats.success_count = 1;
        stats.consecutive_errors = 1;
        stats.min_request_interval = 800;

        // Non-retryable status, second consecutive error.
        stats.record_error(Some(500), &opts);

        assert_eq!(stats.min_request_interval, 1_600);
    }

    #[test]
    fn early_errors_without_success_grow_one_and_a_half() {
        let opts = options();
        let mut stats = HostStats::new(&opts);
        stats.min_request_interval = 1_000;

        // First error ever, non-retryable, no success yet.
        stats.record_error(Some(404), &opts);

        assert_eq!(stats.min_request_interval, 1_500);
    }

    #[test]
    fn retry_penalty_then_success_resets_from_penalized_level() {
        let opts = options();
        let mut stats = HostStats::new(&opts);

        // Two rate-limited attempts before the first ever success.
        stats.apply_rate_limit_penalty();
        stats.apply_rate_limit_penalty();
        assert_eq!(stats.min_request_interval, FIRST_CONTACT_PENALTY_MS);

        stats.record_success(50, &opts);
        assert_eq!(stats.min_request_interval, 9_500);
        assert!(stats.min_request_interval >= 3 * opts.default_request_interval);
    }

    #[test]
    fn wait_remaining_is_zero_before_first_dispatch() {
        let opts = options();
        let stats = HostStats::new(&opts);
        assert_eq!(stats.wait_remaining_ms(), 0);
    }

    #[test]
    fn jitter_bands() {
        for _ in 0..100 {
            let s = spacing_jitter();
            assert!((1.15..=1.50).contains(&s));
            let a = adapt_jitter();
            assert!((1.15..=1.70).contains(&a));
            assert!(redispatch_delay_ms() < 1000);
        }
        // Sanity check the rng call shape itself.
        let n: u64 = rand::rng().random_range(0..10);
        assert!(n < 10);
    }
}
