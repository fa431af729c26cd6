//! Adaptive, per-host rate-limited HTTP fetch layer.
//!
//! Outbound requests are partitioned by remote host. Each host gets a FIFO
//! queue, a concurrency cap, and an inter-request spacing that adapts from
//! observed response latencies and errors. The media fetcher sits on top as
//! a thin facade that normalizes URLs and classifies failures.

mod fetcher;
mod host_state;
mod queue;
mod response;

pub use fetcher::{normalize_url, FetchedResource, MediaFetcher};
pub use host_state::{HostStats, FIRST_CONTACT_PENALTY_MS, RATE_LIMIT_CEILING_MS};
pub use queue::{HostStatsSnapshot, QueueOptions, RequestOptions, RequestQueue};
pub use response::QueueResponse;
