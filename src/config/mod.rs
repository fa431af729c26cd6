//! Job configuration.
//!
//! All settings carry serde defaults so a job can run with an empty config
//! file or none at all. Queue options are documented on the request queue
//! itself; storage settings describe the local adapter roots and the
//! extension classification used to select an adapter.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::fetch::QueueOptions;

/// Built-in source domains used when the caller supplies none.
pub const DEFAULT_DOMAINS: &[&str] = &["https://s3.amazonaws.com/revue", "https://substackcdn.com"];

/// Top-level settings for an inline job.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub queue: QueueOptions,
    #[serde(default)]
    pub storage: StorageSettings,
    /// Default source domains to migrate away from.
    #[serde(default = "default_domains")]
    pub domains: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            queue: QueueOptions::default(),
            storage: StorageSettings::default(),
            domains: default_domains(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&raw)?;
        Ok(settings)
    }
}

fn default_domains() -> Vec<String> {
    DEFAULT_DOMAINS.iter().map(|d| d.to_string()).collect()
}

/// Storage roots and extension classification.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Base directory the per-class storage roots live under.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Public path prefix the stored relative paths are reported under.
    #[serde(default = "default_public_root")]
    pub public_root: String,
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,
    #[serde(default = "default_file_extensions")]
    pub file_extensions: Vec<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            public_root: default_public_root(),
            image_extensions: default_image_extensions(),
            media_extensions: default_media_extensions(),
            file_extensions: default_file_extensions(),
        }
    }
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_public_root() -> String {
    "/content".to_string()
}

fn default_image_extensions() -> Vec<String> {
    // heic/heif stay listed so a failed transcode still has a home.
    ["jpg", "jpeg", "png", "gif", "webp", "svg", "avif", "ico", "bmp", "heic", "heif"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

fn default_media_extensions() -> Vec<String> {
    ["mp4", "webm", "ogv", "mov", "mp3", "wav", "ogg", "m4a"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

fn default_file_extensions() -> Vec<String> {
    ["pdf", "json", "csv", "txt", "zip"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}
