//! Best-effort JPEG transcoding for HEIC payloads.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};
use thiserror::Error;
use tokio::task;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("image decode/encode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("conversion worker failed: {0}")]
    Join(#[from] task::JoinError),
}

/// Re-encode an image buffer as JPEG on a blocking thread.
///
/// JPEG has no alpha channel, so frames are flattened to RGB first.
pub async fn to_jpeg(bytes: Vec<u8>) -> Result<Vec<u8>, ConvertError> {
    task::spawn_blocking(move || {
        let decoded = image::load_from_memory(&bytes)?;
        let flattened = DynamicImage::ImageRgb8(decoded.to_rgb8());
        let mut out = Cursor::new(Vec::new());
        flattened.write_to(&mut out, ImageFormat::Jpeg)?;
        Ok(out.into_inner())
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([120, 40, 200, 128]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn transcodes_to_jpeg_magic() {
        let jpeg = to_jpeg(encoded_png()).await.unwrap();
        assert_eq!(&jpeg[..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn garbage_input_is_an_error() {
        let result = to_jpeg(vec![0u8; 32]).await;
        assert!(matches!(result, Err(ConvertError::Image(_))));
    }
}
