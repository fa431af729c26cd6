//! Media fetcher: URL normalization plus failure classification on top of
//! the request queue.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{error, warn};

use super::queue::{RequestOptions, RequestQueue};
use super::response::QueueResponse;

/// Characters left untouched by JavaScript's `encodeURI`, beyond
/// alphanumerics: the URI reserved set plus the unescaped marks.
const ENCODE_URI: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b';')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b',')
    .remove(b'#');

/// Normalize a raw media reference into the form used for both the HTTP
/// request and the shared cache key.
///
/// Protocol-relative references are pinned to `http://` (external CDNs
/// redirect upward to https, never downward), then the whole URL is
/// percent-encoded the way `encodeURI` would.
pub fn normalize_url(raw: &str) -> String {
    let with_protocol = match raw.strip_prefix("//") {
        Some(rest) => format!("http://{rest}"),
        None => raw.to_string(),
    };
    utf8_percent_encode(&with_protocol, ENCODE_URI).to_string()
}

/// The response to a media fetch, together with the URL actually requested.
#[derive(Debug)]
pub struct FetchedResource {
    pub request_url: String,
    pub response: QueueResponse,
}

/// Thin facade over the request queue for media downloads.
#[derive(Clone)]
pub struct MediaFetcher {
    queue: RequestQueue,
}

impl MediaFetcher {
    pub fn new(queue: RequestQueue) -> Self {
        Self { queue }
    }

    /// Fetch a media reference as raw bytes.
    ///
    /// Any unrecoverable failure is logged and collapsed to `None` so the
    /// caller can move on to other references. Retryable statuses that
    /// exhausted their retries log at warn level; everything else at error.
    pub async fn fetch(&self, src: &str) -> Option<FetchedResource> {
        let request_url = normalize_url(src);

        match self
            .queue
            .queue_request(&request_url, RequestOptions::default())
            .await
        {
            Ok(response) => Some(FetchedResource {
                request_url,
                response,
            }),
            Err(err) => {
                let retryable = err.status().is_some_and(|s| {
                    self.queue.options().retryable_status_codes.contains(&s)
                });
                if retryable {
                    warn!(url = %src, error = %err, "media fetch gave up on retryable status");
                } else {
                    error!(url = %src, error = %err, "media fetch failed");
                }
                None
            }
        }
    }
}
