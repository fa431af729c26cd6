//! Job-scoped cache mapping normalized URLs to stored paths.

use std::collections::HashMap;

use tokio::sync::Mutex;

/// Shared across every scan path of one migration job so a URL seen in a
/// scalar field and again inside a document body is fetched exactly once -
/// and both references resolve to the same stored path.
///
/// Keys are the normalized form produced by `fetch::normalize_url`; every
/// producer and consumer must use that exact string.
#[derive(Debug, Default)]
pub struct UrlCache {
    entries: Mutex<HashMap<String, String>>,
}

impl UrlCache {
    pub async fn get(&self, normalized_url: &str) -> Option<String> {
        self.entries.lock().await.get(normalized_url).cloned()
    }

    pub async fn insert(&self, normalized_url: String, stored_path: String) {
        self.entries
            .lock()
            .await
            .insert(normalized_url, stored_path);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Cleared at job end; entries never outlive the migration run.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}
