//! Local filesystem storage adapter.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use tokio::fs;

use crate::error::StorageError;

use super::StorageAdapter;

/// Stores files under `<root>/<year>/<month>/` and reports them under a
/// public path prefix (e.g. `/content/images`).
pub struct LocalStorageAdapter {
    root: PathBuf,
    public_prefix: String,
}

impl LocalStorageAdapter {
    pub fn new(root: PathBuf, public_prefix: String) -> Self {
        Self {
            root,
            public_prefix,
        }
    }
}

#[async_trait]
impl StorageAdapter for LocalStorageAdapter {
    fn storage_path(&self) -> &Path {
        &self.root
    }

    fn target_dir(&self) -> PathBuf {
        let now = Utc::now();
        self.root
            .join(format!("{:04}", now.year()))
            .join(format!("{:02}", now.month()))
    }

    async fn unique_file_name(
        &self,
        filename: &str,
        target_dir: &Path,
    ) -> Result<PathBuf, StorageError> {
        let (stem, ext) = match filename.rsplit_once('.') {
            Some((stem, ext)) => (stem, ext),
            None => (filename, ""),
        };

        let mut candidate = target_dir.join(filename);
        let mut suffix = 0u32;
        while fs::try_exists(&candidate).await? {
            suffix += 1;
            let name = if ext.is_empty() {
                format!("{stem}-{suffix}")
            } else {
                format!("{stem}-{suffix}.{ext}")
            };
            candidate = target_dir.join(name);
        }
        Ok(candidate)
    }

    async fn save_raw(&self, bytes: &[u8], relative_path: &Path) -> Result<String, StorageError> {
        let full = self.root.join(relative_path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, bytes).await?;
        Ok(format!(
            "{}/{}",
            self.public_prefix,
            relative_path.display()
        ))
    }
}
