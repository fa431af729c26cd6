//! Buffered HTTP response handed back by the request queue.

use std::collections::HashMap;

use reqwest::StatusCode;

/// A fully buffered response: status, headers, and body bytes.
///
/// Media payloads are buffered whole before type detection, so the body is
/// owned rather than streamed.
#[derive(Debug)]
pub struct QueueResponse {
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl QueueResponse {
    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }

    /// Get the Content-Length header.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get("content-length")
            .and_then(|s| s.parse().ok())
    }
}
