//! Scan-fetch-store-rewrite orchestration across CMS resources.

mod cache;
pub mod scanner;

pub use cache::UrlCache;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, error, info};

use crate::config::Settings;
use crate::error::InlineError;
use crate::fetch::{normalize_url, MediaFetcher, RequestQueue};
use crate::media;
use crate::models::{CmsModels, Resource, ResourceModel};
use crate::storage::StorageRouter;

/// Sentinel prefix for rewritten references, expanded by the CMS at serve
/// time.
pub const REFERENCE_TOKEN_PREFIX: &str = "__GHOST_URL__";

const POST_IMAGE_FIELDS: &[&str] = &["feature_image"];
const POST_CONTENT_FIELDS: &[&str] = &["mobiledoc", "lexical"];
const POST_META_FIELDS: &[&str] = &["og_image", "twitter_image"];
const TAG_FIELDS: &[&str] = &["feature_image", "og_image", "twitter_image"];
const USER_FIELDS: &[&str] = &["profile_image", "cover_image"];

/// Counters for one inline run.
#[derive(Debug, Default, Clone)]
pub struct InlineReport {
    pub posts_updated: usize,
    pub post_meta_updated: usize,
    pub tags_updated: usize,
    pub users_updated: usize,
    pub media_stored: usize,
    pub cache_hits: usize,
    pub failures: usize,
}

/// Drives the migration: walks every resource, inlines references, and
/// drains the fetch queue before returning.
pub struct MediaInliner {
    queue: RequestQueue,
    fetcher: MediaFetcher,
    storage: StorageRouter,
    cache: UrlCache,
    media_stored: AtomicUsize,
    cache_hits: AtomicUsize,
    failures: AtomicUsize,
}

impl MediaInliner {
    pub fn new(settings: &Settings) -> Self {
        let queue = RequestQueue::new(settings.queue.clone());
        let fetcher = MediaFetcher::new(queue.clone());
        Self {
            queue,
            fetcher,
            storage: StorageRouter::local(&settings.storage),
            cache: UrlCache::default(),
            media_stored: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Run the whole job against the given models and source domains.
    ///
    /// Individual media or resource failures are logged and skipped; the
    /// run always covers the full resource list.
    pub async fn run(&self, models: &CmsModels, domains: &[String]) -> anyhow::Result<InlineReport> {
        let posts_updated = self.inline_posts(models, domains).await?;
        let post_meta_updated = self
            .inline_scalar_model(&models.post_meta, POST_META_FIELDS, domains, "post meta")
            .await?;
        let tags_updated = self
            .inline_scalar_model(&models.tags, TAG_FIELDS, domains, "tag")
            .await?;
        let users_updated = self
            .inline_scalar_model(&models.users, USER_FIELDS, domains, "user")
            .await?;

        self.queue.wait_for_all_queues().await;
        self.cache.clear().await;

        let report = InlineReport {
            posts_updated,
            post_meta_updated,
            tags_updated,
            users_updated,
            media_stored: self.media_stored.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        };
        info!(?report, "inline run complete");
        Ok(report)
    }

    async fn inline_posts(
        &self,
        models: &CmsModels,
        domains: &[String],
    ) -> anyhow::Result<usize> {
        let posts = models.posts.find_all().await?;
        info!(count = posts.len(), "inlining media in posts");

        let mut updated = 0;
        for post in &posts {
            match self.inline_post(models, post, domains).await {
                Ok(true) => updated += 1,
                Ok(false) => {}
                Err(err) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    let err = InlineError::new(format!("post {}", post.id), err);
                    error!(error = %err, "resource skipped");
                }
            }
        }
        Ok(updated)
    }

    async fn inline_post(
        &self,
        models: &CmsModels,
        post: &Resource,
        domains: &[String],
    ) -> anyhow::Result<bool> {
        let mut changes = self.inline_fields(post, POST_IMAGE_FIELDS, domains).await;

        for field in POST_CONTENT_FIELDS {
            let Some(content) = post.get(field) else {
                continue;
            };
            let rewritten = self.inline_content(content, domains).await;
            if rewritten != content {
                changes.insert((*field).to_string(), rewritten);
            }
        }

        if changes.is_empty() {
            return Ok(false);
        }
        models.posts.edit(&post.id, changes).await?;
        Ok(true)
    }

    /// Walk one scalar-field model (post meta, tags, users).
    async fn inline_scalar_model(
        &self,
        model: &std::sync::Arc<dyn ResourceModel>,
        fields: &[&str],
        domains: &[String],
        label: &str,
    ) -> anyhow::Result<usize> {
        let resources = model.find_all().await?;
        debug!(count = resources.len(), "inlining media in {label}s");

        let mut updated = 0;
        for resource in &resources {
            let changes = self.inline_fields(resource, fields, domains).await;
            if changes.is_empty() {
                continue;
            }
            match model.edit(&resource.id, changes).await {
                Ok(()) => updated += 1,
                Err(err) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    let err = InlineError::new(format!("{label} {}", resource.id), err);
                    error!(error = %err, "resource skipped");
                }
            }
        }
        Ok(updated)
    }

    /// Inline every `(field, domain)` pair of a resource's scalar fields.
    ///
    /// Returns the changed field values; untouched fields are absent.
    async fn inline_fields(
        &self,
        resource: &Resource,
        fields: &[&str],
        domains: &[String],
    ) -> HashMap<String, String> {
        let mut changes = HashMap::new();
        for field in fields {
            for domain in domains {
                let Some(src) = resource.get(field) else {
                    continue;
                };
                if !src.starts_with(domain.as_str()) {
                    continue;
                }

                let normalized = normalize_url(src);
                if let Some(path) = self.cache.get(&normalized).await {
                    self.cache_hits.fetch_add(1, Ordering::Relaxed);
                    changes.insert((*field).to_string(), reference_token(&path));
                    continue;
                }

                if let Some(path) = self.fetch_and_store(src).await {
                    self.cache.insert(normalized, path.clone()).await;
                    changes.insert((*field).to_string(), reference_token(&path));
                }
            }
        }
        changes
    }

    /// Inline every reference to the domains inside a document body string.
    ///
    /// Cache keys use the normalized URL; the rewrite replaces the original
    /// match text so surrounding characters stay byte-identical.
    async fn inline_content(&self, content: &str, domains: &[String]) -> String {
        let mut result = content.to_string();
        for domain in domains {
            let matches = dedupe(scanner::find_references(&result, domain));
            for src in matches {
                let normalized = normalize_url(&src);
                let path = match self.cache.get(&normalized).await {
                    Some(path) => {
                        self.cache_hits.fetch_add(1, Ordering::Relaxed);
                        Some(path)
                    }
                    None => {
                        let stored = self.fetch_and_store(&src).await;
                        if let Some(path) = &stored {
                            self.cache.insert(normalized, path.clone()).await;
                        }
                        stored
                    }
                };
                if let Some(path) = path {
                    result = result.replace(&src, &reference_token(&path));
                }
            }
        }
        result
    }

    /// Fetch, type-detect, and store one reference. `None` on any failure
    /// (already logged downstream).
    async fn fetch_and_store(&self, src: &str) -> Option<String> {
        let fetched = self.fetcher.fetch(src).await?;
        let media = media::prepare(&fetched.request_url, fetched.response).await?;

        match self.storage.store(&media).await {
            Ok(Some(path)) => {
                self.media_stored.fetch_add(1, Ordering::Relaxed);
                debug!(src, path = %path, "media stored");
                Some(path)
            }
            Ok(None) => None,
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(src, error = %err, "failed to store media");
                None
            }
        }
    }

    /// The queue handle, for callers that want stats or the drain barrier.
    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    /// The shared URL cache (cleared at the end of every run).
    pub fn cache(&self) -> &UrlCache {
        &self.cache
    }
}

/// Build the rewritten reference for a stored path.
pub fn reference_token(stored_path: &str) -> String {
    format!("{REFERENCE_TOKEN_PREFIX}{stored_path}")
}

fn dedupe(references: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    references
        .into_iter()
        .filter(|r| seen.insert(r.clone()))
        .collect()
}
