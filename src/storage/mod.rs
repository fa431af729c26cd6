//! Storage adapter seam and extension-based adapter selection.
//!
//! One adapter per media class (images / media / files). The inliner only
//! ever talks to the narrow `StorageAdapter` surface: target directory,
//! unique name, raw write.

mod local;

pub use local::LocalStorageAdapter;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::config::StorageSettings;
use crate::error::StorageError;
use crate::media::FetchedMedia;

/// Narrow storage surface the CMS exposes per media class.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Root this adapter stores under.
    fn storage_path(&self) -> &Path;

    /// Directory new files land in (absolute, under the storage root).
    fn target_dir(&self) -> PathBuf;

    /// A collision-free absolute path for `filename` inside `target_dir`.
    async fn unique_file_name(
        &self,
        filename: &str,
        target_dir: &Path,
    ) -> Result<PathBuf, StorageError>;

    /// Write bytes at a root-relative path; returns the stored public path.
    async fn save_raw(&self, bytes: &[u8], relative_path: &Path) -> Result<String, StorageError>;
}

/// Selects a storage adapter by file extension class.
#[derive(Clone)]
pub struct StorageRouter {
    images: Arc<dyn StorageAdapter>,
    media: Arc<dyn StorageAdapter>,
    files: Arc<dyn StorageAdapter>,
    settings: StorageSettings,
}

impl StorageRouter {
    /// Build a router over local filesystem adapters rooted per class.
    pub fn local(settings: &StorageSettings) -> Self {
        let adapter = |class: &str| -> Arc<dyn StorageAdapter> {
            Arc::new(LocalStorageAdapter::new(
                settings.base_dir.join(class),
                format!("{}/{}", settings.public_root, class),
            ))
        };
        Self {
            images: adapter("images"),
            media: adapter("media"),
            files: adapter("files"),
            settings: settings.clone(),
        }
    }

    /// Resolve the adapter for a (dot-prefixed or bare) extension.
    pub fn for_extension(&self, extension: &str) -> Option<Arc<dyn StorageAdapter>> {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        if self.settings.image_extensions.contains(&ext) {
            Some(self.images.clone())
        } else if self.settings.media_extensions.contains(&ext) {
            Some(self.media.clone())
        } else if self.settings.file_extensions.contains(&ext) {
            Some(self.files.clone())
        } else {
            None
        }
    }

    /// Store fetched media and return its public relative path.
    ///
    /// `Ok(None)` means no adapter handles the extension; the caller leaves
    /// the reference unrewritten.
    pub async fn store(&self, media: &FetchedMedia) -> Result<Option<String>, StorageError> {
        let Some(adapter) = self.for_extension(&media.extension) else {
            warn!(
                extension = %media.extension,
                filename = %media.filename,
                "no storage adapter for extension, skipping rewrite"
            );
            return Ok(None);
        };

        let target_dir = adapter.target_dir();
        let unique = adapter.unique_file_name(&media.filename, &target_dir).await?;
        let relative = unique
            .strip_prefix(adapter.storage_path())
            .map_err(|_| StorageError::OutsideRoot(unique.display().to_string()))?
            .to_path_buf();

        let stored = adapter.save_raw(&media.file_buffer, &relative).await?;
        Ok(Some(stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> StorageRouter {
        StorageRouter::local(&StorageSettings::default())
    }

    #[test]
    fn extension_classes_route_to_their_adapter() {
        let router = router();
        assert!(router.for_extension(".jpg").is_some());
        assert!(router.for_extension("mp4").is_some());
        assert!(router.for_extension(".pdf").is_some());
        assert!(router.for_extension(".exe").is_none());
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        let router = router();
        assert!(router.for_extension(".JPG").is_some());
    }

    #[tokio::test]
    async fn unknown_extension_skips_without_error() {
        let media = FetchedMedia {
            file_buffer: vec![1, 2, 3],
            filename: "payload.exe".to_string(),
            extension: ".exe".to_string(),
        };
        let stored = router().store(&media).await.unwrap();
        assert!(stored.is_none());
    }
}
