//! Media type detection, transcoding, and filename derivation.

pub mod convert;
pub mod detect;
pub mod namer;

use tracing::warn;

use crate::fetch::QueueResponse;

/// A fetched media asset ready for storage.
///
/// Ephemeral: lives only until the bytes are handed to a storage adapter.
#[derive(Debug)]
pub struct FetchedMedia {
    pub file_buffer: Vec<u8>,
    /// Slug-safe filename, `<slug>.<ext>`.
    pub filename: String,
    /// Dot-prefixed extension, e.g. `.jpg`.
    pub extension: String,
}

/// Turn a raw response into storable media: detect the file type, transcode
/// HEIC payloads to JPEG, and derive a slug-safe filename.
///
/// Returns `None` when no file type could be determined at all; the
/// reference is then left unrewritten.
pub async fn prepare(request_url: &str, response: QueueResponse) -> Option<FetchedMedia> {
    let detected = detect::detect_extension(request_url, response.content_type(), &response.body);
    let Some(mut extension) = detected else {
        warn!(url = %request_url, "could not determine media type, skipping");
        return None;
    };

    let mut buffer = response.body;
    if extension == "heic" || extension == "heif" {
        match convert::to_jpeg(buffer.clone()).await {
            Ok(jpeg) => {
                buffer = jpeg;
                extension = "jpg".to_string();
            }
            Err(err) => {
                // Best effort: keep the original bytes and extension.
                warn!(url = %request_url, error = %err, "HEIC transcode failed, storing original");
            }
        }
    }

    let filename = namer::derive_filename(request_url, &extension);
    Some(FetchedMedia {
        file_buffer: buffer,
        filename,
        extension: format!(".{extension}"),
    })
}
