//! Media inliner - migrates externally hosted media into CMS-managed storage.
//!
//! Scans CMS resources (posts, post metadata, tags, users) for media URLs
//! rooted at a set of source domains, fetches each asset through an adaptive
//! per-host rate-limited request queue, detects its file type, stores it
//! under a stable local path, and rewrites every reference in the content to
//! a storage-relative token.

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod inliner;
pub mod jobs;
pub mod media;
pub mod models;
pub mod storage;
