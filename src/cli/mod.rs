//! CLI for running the media inliner against a CMS JSON export.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

use crate::config::Settings;
use crate::inliner::scanner;
use crate::jobs;
use crate::models::{JsonExport, Resource};

#[derive(Parser)]
#[command(name = "media-inliner")]
#[command(about = "Migrate externally hosted media referenced in a CMS export into local storage")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch referenced media, store it locally, and rewrite the export
    Inline {
        /// CMS JSON export to migrate
        export: PathBuf,
        /// Source domain to migrate away from (repeatable; defaults to the
        /// built-in legacy CDNs)
        #[arg(short, long = "domain")]
        domains: Vec<String>,
        /// Storage base directory (default: ./content)
        #[arg(long)]
        storage_dir: Option<PathBuf>,
        /// Write the rewritten export here instead of in place
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Settings file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List matching media references without fetching anything
    Scan {
        /// CMS JSON export to scan
        export: PathBuf,
        /// Source domain to look for (repeatable)
        #[arg(short, long = "domain")]
        domains: Vec<String>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inline {
            export,
            domains,
            storage_dir,
            output,
            config,
        } => {
            let mut settings = match config {
                Some(path) => Settings::load(&path)?,
                None => Settings::default(),
            };
            if let Some(dir) = storage_dir {
                settings.storage.base_dir = dir;
            }

            let loaded = JsonExport::load(&export)?;
            let receipt =
                jobs::start_media_inliner(loaded.models(), &settings, domains).await?;

            let destination = output.unwrap_or(export);
            loaded.write(&destination).await?;

            let report = &receipt.report;
            println!(
                "{} media inlined into {}",
                style("✓").green(),
                settings.storage.base_dir.display()
            );
            println!(
                "  stored {} assets ({} cache hits, {} failures)",
                report.media_stored, report.cache_hits, report.failures
            );
            println!(
                "  updated {} posts, {} post meta, {} tags, {} users",
                report.posts_updated,
                report.post_meta_updated,
                report.tags_updated,
                report.users_updated
            );
            println!("  rewritten export: {}", destination.display());
        }

        Commands::Scan { export, domains } => {
            let domains = if domains.is_empty() {
                Settings::default().domains
            } else {
                domains
            };
            let loaded = JsonExport::load(&export)?;

            let groups = [
                ("posts", loaded.posts.snapshot().await),
                ("posts_meta", loaded.posts_meta.snapshot().await),
                ("tags", loaded.tags.snapshot().await),
                ("users", loaded.users.snapshot().await),
            ];

            let mut total = 0;
            for (label, resources) in groups {
                for resource in resources {
                    let refs = collect_references(&resource, &domains);
                    if refs.is_empty() {
                        continue;
                    }
                    println!("{} {} {}", style(label).cyan(), resource.id, style(refs.len()).bold());
                    for reference in &refs {
                        println!("    {reference}");
                    }
                    total += refs.len();
                }
            }
            println!("{} {} references found", style("✓").green(), total);
        }
    }

    Ok(())
}

/// Every domain-rooted reference in one resource: scalar fields and
/// document bodies alike.
fn collect_references(resource: &Resource, domains: &[String]) -> Vec<String> {
    let mut refs = Vec::new();
    for (field, value) in &resource.fields {
        let Some(value) = value.as_deref() else {
            continue;
        };
        for domain in domains {
            if field == "mobiledoc" || field == "lexical" {
                refs.extend(scanner::find_references(value, domain));
            } else if value.starts_with(domain.as_str()) {
                refs.push(value.to_string());
            }
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_references_covers_scalars_and_content() {
        let domains = vec!["https://substackcdn.com".to_string()];
        let resource = Resource::new("p1")
            .with_field("feature_image", Some("https://substackcdn.com/a.png"))
            .with_field(
                "lexical",
                Some(r#"{"src":"https://substackcdn.com/b.png"}"#),
            )
            .with_field("title", Some("unrelated"));

        let mut refs = collect_references(&resource, &domains);
        refs.sort();
        assert_eq!(
            refs,
            vec![
                "https://substackcdn.com/a.png",
                "https://substackcdn.com/b.png",
            ]
        );
    }
}
