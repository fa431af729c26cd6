//! Job entry surface for the media inliner.
//!
//! The job runs inline (not offloaded to a worker pool): usage is
//! migrational, one shot per legacy domain set.

use tracing::info;

use crate::config::Settings;
use crate::inliner::{InlineReport, MediaInliner};
use crate::models::CmsModels;

/// Background-job name the migration is registered under.
pub const JOB_NAME: &str = "external-media-inliner";

/// Outcome handed back to the job-entry caller.
#[derive(Debug, Clone)]
pub struct JobReceipt {
    pub status: &'static str,
    pub report: InlineReport,
}

/// Start the external media inliner job.
///
/// An empty `domains` list falls back to the configured defaults (the
/// built-in legacy CDN pair unless settings override them).
pub async fn start_media_inliner(
    models: CmsModels,
    settings: &Settings,
    domains: Vec<String>,
) -> anyhow::Result<JobReceipt> {
    let domains = if domains.is_empty() {
        info!(defaults = ?settings.domains, "no domains supplied, using defaults");
        settings.domains.clone()
    } else {
        domains
    };

    info!(job = JOB_NAME, ?domains, "starting media inline job");
    let inliner = MediaInliner::new(settings);
    let report = inliner.run(&models, &domains).await?;

    Ok(JobReceipt {
        status: "success",
        report,
    })
}
